//! Shared types for ensemble-core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sender id of the single human participant
pub const USER_ID: &str = "user";

/// Sender id of the seeded welcome message
pub const SYSTEM_ID: &str = "system";

/// Which team an agent belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Research,
    Creative,
}

impl Team {
    /// Parse a team name, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "research" => Some(Self::Research),
            "creative" => Some(Self::Creative),
            _ => None,
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Research => write!(f, "research"),
            Self::Creative => write!(f, "creative"),
        }
    }
}

/// Who wrote a message, as shown next to the bubble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sender {
    pub id: String,
    pub name: String,
    pub avatar_glyph: String,
    pub role: String,
}

impl Sender {
    /// The human participant
    pub fn user() -> Self {
        Self {
            id: USER_ID.to_string(),
            name: "You".to_string(),
            avatar_glyph: "U".to_string(),
            role: "User".to_string(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.id == USER_ID
    }
}

/// One entry in the conversation log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub created_at: DateTime<Utc>,
}

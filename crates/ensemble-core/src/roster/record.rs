//! Agent record: one member of the team roster

use serde::{Deserialize, Serialize};

use crate::types::{Sender, Team};

/// A scripted agent as listed in the team selector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    pub role: String,
    #[serde(alias = "avatar")]
    pub avatar_glyph: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub removable: bool,
    pub team: Team,
}

fn default_true() -> bool {
    true
}

impl AgentRecord {
    /// New active, removable agent. The avatar glyph defaults to the first
    /// letter of the name.
    pub fn new(id: impl Into<String>, name: impl Into<String>, team: Team) -> Self {
        let name = name.into();
        let avatar_glyph = name
            .chars()
            .next()
            .map(|c| c.to_uppercase().to_string())
            .unwrap_or_default();
        Self {
            id: id.into(),
            name,
            role: String::new(),
            avatar_glyph,
            description: String::new(),
            active: true,
            removable: true,
            team,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_avatar(mut self, glyph: impl Into<String>) -> Self {
        self.avatar_glyph = glyph.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn locked(mut self) -> Self {
        self.removable = false;
        self
    }

    /// Whether a toggle would be accepted right now
    pub fn can_toggle(&self) -> bool {
        self.removable || !self.active
    }

    /// Sender block for messages written by this agent
    pub fn sender(&self) -> Sender {
        Sender {
            id: self.id.clone(),
            name: self.name.clone(),
            avatar_glyph: self.avatar_glyph.clone(),
            role: self.role.clone(),
        }
    }

    /// Short icon label for the agent's role, used by roster listings
    pub fn role_icon(&self) -> &'static str {
        match self.role.as_str() {
            "Researcher" => "search",
            "Writer" => "pen",
            "Editor" => "check",
            "Illustrator" => "image",
            "Audio" => "headphones",
            "Animator" => "video",
            _ => "brain",
        }
    }
}

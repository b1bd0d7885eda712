//! Domain packs: a roster, its reply table, and a welcome line, bundled
//!
//! The dispatcher never looks inside a pack; sessions are built from one.
//! Two packs ship with the crate and more can be loaded from TOML files.

pub mod marketing;
pub mod studio;

use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::error::PackError;
use crate::lookup::StaticTable;
use crate::roster::{AgentRecord, Roster};
use crate::types::{SYSTEM_ID, Sender, Team};

/// Names of the packs compiled into the crate
pub const BUILTIN_PACKS: &[&str] = &[marketing::NAME, studio::NAME];

/// The seeded first message of a session
#[derive(Debug, Clone)]
pub struct Welcome {
    pub sender: Sender,
    pub content: String,
}

impl Welcome {
    pub fn system(
        name: impl Into<String>,
        avatar: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender: Sender {
                id: SYSTEM_ID.to_string(),
                name: name.into(),
                avatar_glyph: avatar.into(),
                role: "Assistant".to_string(),
            },
            content: content.into(),
        }
    }
}

/// Everything a session needs to know about one team of agents
#[derive(Debug, Clone)]
pub struct DomainPack {
    pub name: String,
    pub welcome: Option<Welcome>,
    pub roster: Roster,
    pub lookup: StaticTable,
}

impl DomainPack {
    /// Look up a built-in pack by name
    pub fn builtin(name: &str) -> Result<Self, PackError> {
        match name {
            marketing::NAME => Ok(marketing::pack()),
            studio::NAME => Ok(studio::pack()),
            other => Err(PackError::UnknownPack(other.to_string())),
        }
    }

    /// Drop the welcome line so sessions built from this pack start empty
    pub fn without_welcome(mut self) -> Self {
        self.welcome = None;
        self
    }

    /// Parse a pack definition from TOML
    pub fn from_toml_str(src: &str) -> Result<Self, PackError> {
        let file: PackFile = toml::from_str(src)?;
        file.into_pack()
    }

    /// Load a pack definition from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, PackError> {
        let src = std::fs::read_to_string(path).map_err(|source| PackError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let pack = Self::from_toml_str(&src)?;
        info!(
            "Loaded pack '{}' from {} ({} agents)",
            pack.name,
            path.display(),
            pack.roster.len()
        );
        Ok(pack)
    }
}

// ── TOML pack format ──

#[derive(Debug, Deserialize)]
struct PackFile {
    name: String,
    #[serde(default = "default_fallback")]
    fallback: String,
    #[serde(default)]
    welcome: Option<WelcomeEntry>,
    #[serde(default)]
    agents: Vec<AgentEntry>,
}

fn default_fallback() -> String {
    "I'm here to help. What would you like to work on?".to_string()
}

#[derive(Debug, Deserialize)]
struct WelcomeEntry {
    name: String,
    #[serde(default = "default_welcome_avatar")]
    avatar: String,
    content: String,
}

fn default_welcome_avatar() -> String {
    "T".to_string()
}

#[derive(Debug, Deserialize)]
struct AgentEntry {
    id: String,
    name: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default = "default_true")]
    removable: bool,
    team: Team,
    #[serde(default)]
    response: Option<String>,
}

fn default_true() -> bool {
    true
}

impl PackFile {
    fn into_pack(self) -> Result<DomainPack, PackError> {
        let mut lookup = StaticTable::new(self.fallback);
        let mut agents = Vec::with_capacity(self.agents.len());

        for entry in self.agents {
            if let Some(response) = entry.response {
                lookup.insert(entry.id.clone(), response);
            }
            let mut record = AgentRecord::new(entry.id, entry.name, entry.team)
                .with_role(entry.role)
                .with_description(entry.description);
            if let Some(avatar) = entry.avatar {
                record = record.with_avatar(avatar);
            }
            record.active = entry.active;
            record.removable = entry.removable;
            agents.push(record);
        }

        Ok(DomainPack {
            name: self.name,
            welcome: self
                .welcome
                .map(|w| Welcome::system(w.name, w.avatar, w.content)),
            roster: Roster::new(agents)?,
            lookup,
        })
    }
}

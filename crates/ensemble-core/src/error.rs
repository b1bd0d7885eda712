//! Error types for roster edits and domain pack loading

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("no agent with id '{0}' in the roster")]
    NotFound(String),

    /// The agent is active and marked non-removable
    #[error("agent '{0}' cannot be deactivated")]
    ToggleRejected(String),

    #[error("duplicate agent id '{0}'")]
    DuplicateAgent(String),

    #[error("agent id '{0}' is reserved")]
    ReservedId(String),
}

#[derive(Debug, Error)]
pub enum PackError {
    #[error("unknown domain pack '{0}'")]
    UnknownPack(String),

    #[error("failed to read pack file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pack definition: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Roster(#[from] RosterError),
}

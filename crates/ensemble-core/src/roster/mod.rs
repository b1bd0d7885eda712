//! Agent roster: agent records, activation state, and toggle rules

pub mod manager;
pub mod record;

pub use manager::Roster;
pub use record::AgentRecord;

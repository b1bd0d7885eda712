//! ensemble-core - the session engine behind the ensemble chat
//!
//! This crate provides:
//! - The agent roster with activation rules and team listings
//! - Response lookup and the built-in / file-based domain packs
//! - The append-only conversation log
//! - The turn dispatcher that staggers agent replies after a thinking phase
//! - `ChatSession`, the owned state container tying them together, and its event bus

pub mod dispatcher;
pub mod error;
pub mod events;
pub mod log;
pub mod lookup;
pub mod packs;
pub mod roster;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use dispatcher::{
    BatchId, DispatchBatch, DispatchConfig, DispatchState, MAX_TIMING, TurnDispatcher,
};
pub use error::{PackError, RosterError};
pub use events::{EventBus, SessionEvent};
pub use log::ConversationLog;
pub use lookup::{ResponseLookup, StaticTable};
pub use packs::{BUILTIN_PACKS, DomainPack};
pub use roster::{AgentRecord, Roster};
pub use session::ChatSession;
pub use types::{Message, Sender, Team};

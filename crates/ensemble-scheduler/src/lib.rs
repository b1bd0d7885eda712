//! ensemble-scheduler - deferred work for the ensemble session
//!
//! This crate provides:
//! - A `Clock` abstraction with a tokio-backed clock and a manual clock for tests
//! - `TimerQueue`, a deadline-ordered queue of plain-data tasks
//! - `TimerRunner`, a tokio task that polls shared state whenever a deadline passes

pub mod clock;
pub mod queue;
pub mod runner;

pub use clock::{Clock, ManualClock, TokioClock};
pub use queue::{TimerEntry, TimerQueue};
pub use runner::{Scheduled, TimerRunner, drive_until_idle};

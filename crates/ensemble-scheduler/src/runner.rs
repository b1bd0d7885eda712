//! Tokio task runner for timer-driven state
//!
//! The runner owns no work itself. It sleeps until the earliest deadline the
//! shared state reports, polls the state at that time, and repeats. Callers
//! that push new work call [`TimerRunner::notify`] so the loop re-reads the
//! deadline instead of sleeping through it.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep_until;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::{Clock, TokioClock};

/// State whose pending work is keyed by deadlines
pub trait Scheduled: Send + 'static {
    /// Run everything due at or before `now`
    fn poll(&mut self, now: DateTime<Utc>);

    /// Earliest pending deadline, `None` when nothing is scheduled
    fn next_deadline(&self) -> Option<DateTime<Utc>>;
}

/// Drives a shared [`Scheduled`] value from a background tokio task
pub struct TimerRunner<S: Scheduled> {
    state: Arc<Mutex<S>>,
    wake: Arc<Notify>,
    shutdown_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl<S: Scheduled> TimerRunner<S> {
    /// Spawn the timer loop for `state`. `clock` must be the clock the
    /// state itself uses to stamp new work.
    pub fn spawn(state: Arc<Mutex<S>>, clock: TokioClock) -> Self {
        let wake = Arc::new(Notify::new());
        let shutdown_token = CancellationToken::new();

        let handle = tokio::spawn(run_loop(
            state.clone(),
            clock,
            wake.clone(),
            shutdown_token.clone(),
        ));

        info!("Timer runner started");
        Self {
            state,
            wake,
            shutdown_token,
            handle,
        }
    }

    /// Shared state handle
    pub fn state(&self) -> &Arc<Mutex<S>> {
        &self.state
    }

    /// Tell the loop that new work may have an earlier deadline
    pub fn notify(&self) {
        self.wake.notify_one();
    }

    /// Whether the background loop is still alive
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the loop and wait for it to exit. Pending deadlines are dropped.
    pub async fn shutdown(self) {
        info!("Stopping timer runner");
        self.shutdown_token.cancel();
        if let Err(e) = self.handle.await {
            debug!("Timer runner task ended abnormally: {}", e);
        }
    }
}

async fn run_loop<S: Scheduled>(
    state: Arc<Mutex<S>>,
    clock: TokioClock,
    wake: Arc<Notify>,
    shutdown_token: CancellationToken,
) {
    loop {
        let deadline = state.lock().await.next_deadline();
        let wake_at = deadline.map(|at| clock.instant_at(at));

        if let Some(at) = deadline {
            debug!("Timer runner sleeping until {}", at);
        }

        let sleep = async {
            match wake_at {
                Some(instant) => sleep_until(instant).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = shutdown_token.cancelled() => {
                debug!("Timer runner cancelled");
                break;
            }
            _ = wake.notified() => {
                continue;
            }
            _ = sleep => {
                let now = clock.now();
                state.lock().await.poll(now);
            }
        }
    }
    debug!("Timer runner task ended");
}

/// Run the timer loop inline until nothing is scheduled any more
pub async fn drive_until_idle<S: Scheduled>(state: &Arc<Mutex<S>>, clock: &TokioClock) {
    loop {
        let Some(deadline) = state.lock().await.next_deadline() else {
            break;
        };
        sleep_until(clock.instant_at(deadline)).await;
        state.lock().await.poll(clock.now());
    }
}

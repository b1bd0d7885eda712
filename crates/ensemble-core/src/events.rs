//! Session events and the broadcast bus that carries them to observers

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::dispatcher::{BatchId, DispatchState};
use crate::types::Message;

/// Something an observer (renderer, transcript printer) may care about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum SessionEvent {
    #[serde(rename = "message.appended")]
    MessageAppended(Message),
    #[serde(rename = "thinking.changed")]
    ThinkingChanged { thinking: bool },
    #[serde(rename = "state.changed")]
    StateChanged { state: DispatchState },
    #[serde(rename = "batch.completed")]
    BatchCompleted { batch: BatchId, emitted: usize },
    #[serde(rename = "agent.toggled")]
    AgentToggled { agent_id: String, active: bool },
}

impl SessionEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageAppended(_) => "message.appended",
            Self::ThinkingChanged { .. } => "thinking.changed",
            Self::StateChanged { .. } => "state.changed",
            Self::BatchCompleted { .. } => "batch.completed",
            Self::AgentToggled { .. } => "agent.toggled",
        }
    }
}

/// Fan-out of a session's events to transcript printers and other views.
///
/// The session holds one clone and publishes after every command or timer
/// tick. A view that falls more than `capacity` events behind sees
/// `RecvError::Lagged` and resumes from the oldest retained event.
#[derive(Clone)]
pub struct EventBus {
    tx: Arc<broadcast::Sender<SessionEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx: Arc::new(tx) }
    }

    /// Attach a view. It only sees events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Hand an event to every attached view. Dropped when none is attached.
    pub fn publish(&self, event: SessionEvent) {
        let views = self.tx.receiver_count();
        if views == 0 {
            return;
        }
        debug!("Session event '{}' -> {} views", event.name(), views);
        // A view detaching before the send is not an error
        let _ = self.tx.send(event);
    }

    /// Views currently attached
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_publish() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(SessionEvent::ThinkingChanged { thinking: true });

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert_eq!(e1, SessionEvent::ThinkingChanged { thinking: true });
        assert_eq!(e2.name(), "thinking.changed");
    }

    #[test]
    fn test_event_bus_no_receivers() {
        let bus = EventBus::new(16);
        bus.publish(SessionEvent::StateChanged {
            state: DispatchState::Idle,
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_bus_subscriber_count() {
        let bus = EventBus::new(16);
        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_event_serialize() {
        let event = SessionEvent::AgentToggled {
            agent_id: "writer".to_string(),
            active: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"agent.toggled\""));
        assert!(json.contains("\"agent_id\":\"writer\""));

        let state = serde_json::to_value(SessionEvent::StateChanged {
            state: DispatchState::Emitting,
        })
        .unwrap();
        assert_eq!(state["data"]["state"], "emitting");
    }
}

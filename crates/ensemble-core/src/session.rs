//! Chat session: the single owned state container for one conversation
//!
//! Holds the roster, the log, and the dispatcher together with the reply
//! source and clock they run against. Every command updates the state and
//! publishes the resulting events to the attached [`EventBus`], if any.

use chrono::{DateTime, Utc};
use ensemble_scheduler::{Clock, Scheduled};
use std::sync::Arc;
use tracing::info;

use crate::dispatcher::{
    BatchId, DispatchConfig, DispatchContext, DispatchEvent, DispatchState, TurnDispatcher,
};
use crate::error::RosterError;
use crate::events::{EventBus, SessionEvent};
use crate::log::ConversationLog;
use crate::lookup::ResponseLookup;
use crate::packs::{DomainPack, Welcome};
use crate::roster::Roster;
use crate::types::Message;

/// Id of the seeded welcome message
pub const WELCOME_MESSAGE_ID: &str = "welcome";

pub struct ChatSession {
    id: String,
    pack_name: String,
    roster: Roster,
    log: ConversationLog,
    dispatcher: TurnDispatcher,
    lookup: Arc<dyn ResponseLookup>,
    clock: Arc<dyn Clock>,
    events: Option<EventBus>,
}

impl ChatSession {
    pub fn new(
        roster: Roster,
        lookup: Arc<dyn ResponseLookup>,
        config: DispatchConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        info!(
            "Created session {} ({} agents, {} active)",
            id,
            roster.len(),
            roster.active_count()
        );
        Self {
            id,
            pack_name: String::new(),
            roster,
            log: ConversationLog::new(),
            dispatcher: TurnDispatcher::new(config),
            lookup,
            clock,
            events: None,
        }
    }

    /// Build a session from a domain pack, seeding its welcome message
    pub fn from_pack(pack: DomainPack, config: DispatchConfig, clock: Arc<dyn Clock>) -> Self {
        let DomainPack {
            name,
            welcome,
            roster,
            lookup,
        } = pack;
        let mut session = Self::new(roster, Arc::new(lookup), config, clock);
        session.pack_name = name;
        if let Some(welcome) = welcome {
            session.seed_welcome(welcome);
        }
        session
    }

    /// Attach an event bus; later commands publish to it
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    fn seed_welcome(&mut self, welcome: Welcome) {
        self.log.append(Message {
            id: WELCOME_MESSAGE_ID.to_string(),
            content: welcome.content,
            sender: welcome.sender,
            created_at: self.clock.now(),
        });
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pack_name(&self) -> &str {
        &self.pack_name
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn messages(&self) -> &[Message] {
        self.log.all()
    }

    pub fn state(&self) -> DispatchState {
        self.dispatcher.state()
    }

    pub fn is_thinking(&self) -> bool {
        self.dispatcher.is_thinking()
    }

    pub fn is_idle(&self) -> bool {
        self.dispatcher.is_idle()
    }

    pub fn dispatcher(&self) -> &TurnDispatcher {
        &self.dispatcher
    }

    /// Submit a user utterance. Blank input is ignored and returns `None`.
    pub fn submit(&mut self, utterance: &str) -> Option<BatchId> {
        let now = self.clock.now();
        let mut ctx = DispatchContext {
            roster: &self.roster,
            lookup: self.lookup.as_ref(),
            log: &mut self.log,
        };
        let batch = self.dispatcher.submit(utterance, now, &mut ctx);
        self.flush_events();
        batch
    }

    /// Toggle an agent on or off and return its new activation state
    pub fn toggle(&mut self, agent_id: &str) -> Result<bool, RosterError> {
        let active = self.roster.toggle(agent_id)?;
        self.publish(SessionEvent::AgentToggled {
            agent_id: agent_id.to_string(),
            active,
        });
        Ok(active)
    }

    /// Run whatever is due at the clock's current time
    pub fn advance(&mut self) {
        let now = self.clock.now();
        self.poll_at(now);
    }

    fn poll_at(&mut self, now: DateTime<Utc>) {
        let mut ctx = DispatchContext {
            roster: &self.roster,
            lookup: self.lookup.as_ref(),
            log: &mut self.log,
        };
        self.dispatcher.poll(now, &mut ctx);
        self.flush_events();
    }

    fn flush_events(&mut self) {
        for event in self.dispatcher.take_events() {
            let event = match event {
                DispatchEvent::MessageAppended(message) => SessionEvent::MessageAppended(message),
                DispatchEvent::ThinkingChanged(thinking) => {
                    SessionEvent::ThinkingChanged { thinking }
                }
                DispatchEvent::StateChanged(state) => SessionEvent::StateChanged { state },
                DispatchEvent::BatchCompleted { batch, emitted } => {
                    SessionEvent::BatchCompleted { batch, emitted }
                }
            };
            self.publish(event);
        }
    }

    fn publish(&self, event: SessionEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

impl Scheduled for ChatSession {
    fn poll(&mut self, now: DateTime<Utc>) {
        self.poll_at(now);
    }

    fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.dispatcher.next_deadline()
    }
}

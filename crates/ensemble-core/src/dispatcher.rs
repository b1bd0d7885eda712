//! Turn dispatcher: turns one user utterance into staggered agent replies
//!
//! A submit appends the user message at once and queues the end of the
//! thinking phase. When that fires, the active roster is snapshotted into the
//! batch and one emission per snapshotted agent is queued at
//! `submitted_at + thinking_latency + (k + 1) * stagger`. Emissions use the
//! snapshot, so roster edits after that point never touch the batch.
//!
//! Overlapping submits run as independent batches. Nothing is ever
//! cancelled once queued.

use chrono::{DateTime, Utc};
use ensemble_scheduler::TimerQueue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::log::ConversationLog;
use crate::lookup::ResponseLookup;
use crate::roster::{AgentRecord, Roster};
use crate::types::{Message, Sender};

/// Longest thinking latency or stagger the dispatcher accepts
pub const MAX_TIMING: Duration = Duration::from_secs(24 * 60 * 60);

/// Identifier of one dispatch cycle
pub type BatchId = u64;

/// Timing of a dispatch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// How long the team "thinks" before anyone replies
    pub thinking_latency: Duration,
    /// Gap between consecutive agent replies. Must be non-zero.
    pub stagger: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            thinking_latency: Duration::from_millis(1500),
            stagger: Duration::from_millis(1000),
        }
    }
}

impl DispatchConfig {
    /// Offset from submit at which the agent at `index` replies
    pub fn emission_offset(&self, index: usize) -> Duration {
        let slot = u32::try_from(index + 1).unwrap_or(u32::MAX);
        self.thinking_latency + self.stagger.saturating_mul(slot)
    }

    /// Time from submit until a batch of `agents` replies has fully emitted
    pub fn total_duration(&self, agents: usize) -> Duration {
        if agents == 0 {
            self.thinking_latency
        } else {
            self.emission_offset(agents - 1)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchState {
    Idle,
    Thinking,
    Emitting,
}

impl std::fmt::Display for DispatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Thinking => write!(f, "thinking"),
            Self::Emitting => write!(f, "emitting"),
        }
    }
}

/// One in-flight dispatch cycle
#[derive(Debug, Clone)]
pub struct DispatchBatch {
    pub id: BatchId,
    pub triggering_user_message_id: String,
    pub utterance: String,
    pub submitted_at: DateTime<Utc>,
    /// Taken when thinking ends; `None` while still thinking
    pub agent_snapshot: Option<Vec<AgentRecord>>,
    pub emitted_count: usize,
}

impl DispatchBatch {
    pub fn is_thinking(&self) -> bool {
        self.agent_snapshot.is_none()
    }

    fn is_complete(&self) -> bool {
        self.agent_snapshot
            .as_ref()
            .is_some_and(|agents| self.emitted_count >= agents.len())
    }
}

/// What happened while handling a command or a timer
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    MessageAppended(Message),
    ThinkingChanged(bool),
    StateChanged(DispatchState),
    BatchCompleted { batch: BatchId, emitted: usize },
}

/// Collaborators the dispatcher reads and writes but does not own
pub struct DispatchContext<'a> {
    pub roster: &'a Roster,
    pub lookup: &'a dyn ResponseLookup,
    pub log: &'a mut ConversationLog,
}

#[derive(Debug, Clone, Copy)]
enum Task {
    EndThinking { batch: BatchId },
    Emit { batch: BatchId, index: usize },
}

pub struct TurnDispatcher {
    config: DispatchConfig,
    queue: TimerQueue<Task>,
    batches: BTreeMap<BatchId, DispatchBatch>,
    state: DispatchState,
    next_batch_id: BatchId,
    next_message_seq: u64,
    outbox: Vec<DispatchEvent>,
}

impl TurnDispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        let mut config = config;
        if config.stagger.is_zero() {
            warn!("Dispatcher: zero stagger would tie replies, using 1ms");
            config.stagger = Duration::from_millis(1);
        }
        if config.stagger > MAX_TIMING {
            warn!("Dispatcher: stagger {:?} capped at {:?}", config.stagger, MAX_TIMING);
            config.stagger = MAX_TIMING;
        }
        if config.thinking_latency > MAX_TIMING {
            warn!(
                "Dispatcher: thinking latency {:?} capped at {:?}",
                config.thinking_latency, MAX_TIMING
            );
            config.thinking_latency = MAX_TIMING;
        }
        Self {
            config,
            queue: TimerQueue::new(),
            batches: BTreeMap::new(),
            state: DispatchState::Idle,
            next_batch_id: 1,
            next_message_seq: 1,
            outbox: Vec::new(),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn is_thinking(&self) -> bool {
        self.state == DispatchState::Thinking
    }

    pub fn is_idle(&self) -> bool {
        self.state == DispatchState::Idle
    }

    /// Batches still thinking or emitting, oldest first
    pub fn batches(&self) -> impl Iterator<Item = &DispatchBatch> {
        self.batches.values()
    }

    /// Queued timers (thinking ends and emissions)
    pub fn pending_tasks(&self) -> usize {
        self.queue.len()
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.queue.next_deadline()
    }

    /// Take the events produced since the last call
    pub fn take_events(&mut self) -> Vec<DispatchEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Start a dispatch cycle for `utterance`.
    ///
    /// Blank input is ignored and returns `None`. Work already due at `now`
    /// runs first so the log stays in time order.
    pub fn submit(
        &mut self,
        utterance: &str,
        now: DateTime<Utc>,
        ctx: &mut DispatchContext<'_>,
    ) -> Option<BatchId> {
        if utterance.trim().is_empty() {
            debug!("Dispatcher: ignoring blank utterance");
            return None;
        }

        self.poll(now, ctx);

        let message = Message {
            id: self.next_message_id(None),
            content: utterance.to_string(),
            sender: Sender::user(),
            created_at: now,
        };
        let message_id = message.id.clone();
        self.append(message, ctx.log);

        let id = self.next_batch_id;
        self.next_batch_id += 1;
        self.batches.insert(
            id,
            DispatchBatch {
                id,
                triggering_user_message_id: message_id,
                utterance: utterance.to_string(),
                submitted_at: now,
                agent_snapshot: None,
                emitted_count: 0,
            },
        );
        let thinking_ends = after(now, self.config.thinking_latency);
        self.queue.push(thinking_ends, Task::EndThinking { batch: id });

        info!(
            "Dispatcher: batch {} submitted ({} batches in flight)",
            id,
            self.batches.len()
        );
        self.refresh_state();
        Some(id)
    }

    /// Run every queued task due at or before `now`, in deadline order
    pub fn poll(&mut self, now: DateTime<Utc>, ctx: &mut DispatchContext<'_>) {
        while let Some(entry) = self.queue.pop_due(now) {
            match entry.payload {
                Task::EndThinking { batch } => self.end_thinking(batch, ctx.roster),
                Task::Emit { batch, index } => self.emit(batch, index, entry.fire_at, ctx),
            }
        }
    }

    fn end_thinking(&mut self, batch_id: BatchId, roster: &Roster) {
        let Some(batch) = self.batches.get_mut(&batch_id) else {
            warn!("Dispatcher: thinking ended for unknown batch {}", batch_id);
            return;
        };

        let snapshot = roster.active_agents();
        debug!(
            "Dispatcher: batch {} snapshot [{}]",
            batch_id,
            snapshot
                .iter()
                .map(|a| a.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        for index in 0..snapshot.len() {
            let fire_at = after(batch.submitted_at, self.config.emission_offset(index));
            self.queue.push(fire_at, Task::Emit { batch: batch_id, index });
        }
        batch.agent_snapshot = Some(snapshot);

        self.refresh_state();
        self.finish_if_complete(batch_id);
    }

    fn emit(
        &mut self,
        batch_id: BatchId,
        index: usize,
        fire_at: DateTime<Utc>,
        ctx: &mut DispatchContext<'_>,
    ) {
        let Some(batch) = self.batches.get(&batch_id) else {
            warn!("Dispatcher: emission for unknown batch {}", batch_id);
            return;
        };
        let Some(agent) = batch
            .agent_snapshot
            .as_ref()
            .and_then(|agents| agents.get(index))
            .cloned()
        else {
            warn!(
                "Dispatcher: batch {} has no snapshot entry {}",
                batch_id, index
            );
            return;
        };

        let content = ctx.lookup.respond(&agent.id, &batch.utterance);
        let message = Message {
            id: self.next_message_id(Some(&agent.id)),
            content,
            sender: agent.sender(),
            created_at: fire_at,
        };
        debug!(
            "Dispatcher: batch {} reply {} from '{}'",
            batch_id,
            index + 1,
            agent.id
        );
        self.append(message, ctx.log);

        if let Some(batch) = self.batches.get_mut(&batch_id) {
            batch.emitted_count += 1;
        }
        self.finish_if_complete(batch_id);
    }

    fn finish_if_complete(&mut self, batch_id: BatchId) {
        let complete = self
            .batches
            .get(&batch_id)
            .is_some_and(DispatchBatch::is_complete);
        if !complete {
            return;
        }
        if let Some(batch) = self.batches.remove(&batch_id) {
            info!(
                "Dispatcher: batch {} complete ({} replies)",
                batch_id, batch.emitted_count
            );
            self.outbox.push(DispatchEvent::BatchCompleted {
                batch: batch_id,
                emitted: batch.emitted_count,
            });
        }
        self.refresh_state();
    }

    /// Derive the shared state from the batches in flight: thinking while
    /// any batch is still thinking, emitting while any batch has replies
    /// left, idle otherwise.
    fn refresh_state(&mut self) {
        let next = if self.batches.values().any(DispatchBatch::is_thinking) {
            DispatchState::Thinking
        } else if !self.batches.is_empty() {
            DispatchState::Emitting
        } else {
            DispatchState::Idle
        };

        if next == self.state {
            return;
        }
        let was_thinking = self.is_thinking();
        self.state = next;
        debug!("Dispatcher: state -> {}", next);
        self.outbox.push(DispatchEvent::StateChanged(next));
        if was_thinking != self.is_thinking() {
            self.outbox.push(DispatchEvent::ThinkingChanged(self.is_thinking()));
        }
    }

    fn append(&mut self, message: Message, log: &mut ConversationLog) {
        log.append(message.clone());
        self.outbox.push(DispatchEvent::MessageAppended(message));
    }

    fn next_message_id(&mut self, agent_id: Option<&str>) -> String {
        let seq = self.next_message_seq;
        self.next_message_seq += 1;
        match agent_id {
            Some(agent) => format!("msg-{seq}-{agent}"),
            None => format!("msg-{seq}"),
        }
    }
}

/// `at + offset`, saturating at the latest representable time
fn after(at: DateTime<Utc>, offset: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(offset)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::StaticTable;
    use crate::types::{Team, USER_ID};

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn at(ms: i64) -> DateTime<Utc> {
        t0() + chrono::Duration::milliseconds(ms)
    }

    fn roster() -> Roster {
        Roster::new(vec![
            AgentRecord::new("writer", "Script Wizard", Team::Creative).with_role("Writer"),
            AgentRecord::new("illustrator", "DALL·E Artist", Team::Creative)
                .with_role("Illustrator"),
        ])
        .unwrap()
    }

    fn lookup() -> StaticTable {
        StaticTable::new("fallback")
            .with("writer", "writer reply")
            .with("illustrator", "illustrator reply")
    }

    struct Fixture {
        dispatcher: TurnDispatcher,
        roster: Roster,
        lookup: StaticTable,
        log: ConversationLog,
    }

    impl Fixture {
        fn new(roster: Roster) -> Self {
            Self {
                dispatcher: TurnDispatcher::new(DispatchConfig::default()),
                roster,
                lookup: lookup(),
                log: ConversationLog::new(),
            }
        }

        fn submit(&mut self, text: &str, now: DateTime<Utc>) -> Option<BatchId> {
            let mut ctx = DispatchContext {
                roster: &self.roster,
                lookup: &self.lookup,
                log: &mut self.log,
            };
            self.dispatcher.submit(text, now, &mut ctx)
        }

        fn poll(&mut self, now: DateTime<Utc>) {
            let mut ctx = DispatchContext {
                roster: &self.roster,
                lookup: &self.lookup,
                log: &mut self.log,
            };
            self.dispatcher.poll(now, &mut ctx);
        }

        fn senders(&self) -> Vec<&str> {
            self.log.all().iter().map(|m| m.sender.id.as_str()).collect()
        }
    }

    #[test]
    fn test_blank_utterance_is_ignored() {
        let mut fx = Fixture::new(roster());
        assert_eq!(fx.submit("   \n\t", t0()), None);
        assert!(fx.log.is_empty());
        assert!(fx.dispatcher.is_idle());
        assert_eq!(fx.dispatcher.pending_tasks(), 0);
        assert!(fx.dispatcher.take_events().is_empty());
    }

    #[test]
    fn test_user_message_appended_immediately() {
        let mut fx = Fixture::new(roster());
        fx.submit("launch campaign", t0()).unwrap();

        assert_eq!(fx.log.len(), 1);
        let user = &fx.log.all()[0];
        assert_eq!(user.sender.id, USER_ID);
        assert_eq!(user.content, "launch campaign");
        assert_eq!(user.created_at, t0());
        assert_eq!(fx.dispatcher.state(), DispatchState::Thinking);
        assert!(fx.dispatcher.is_thinking());
    }

    #[test]
    fn test_launch_campaign_timeline() {
        let mut fx = Fixture::new(roster());
        fx.submit("launch campaign", t0()).unwrap();

        fx.poll(at(1499));
        assert!(fx.dispatcher.is_thinking());
        assert_eq!(fx.log.len(), 1);

        fx.poll(at(1500));
        assert!(!fx.dispatcher.is_thinking());
        assert_eq!(fx.dispatcher.state(), DispatchState::Emitting);
        assert_eq!(fx.log.len(), 1);

        fx.poll(at(2499));
        assert_eq!(fx.log.len(), 1);

        fx.poll(at(2500));
        assert_eq!(fx.log.len(), 2);
        let writer = &fx.log.all()[1];
        assert_eq!(writer.sender.id, "writer");
        assert_eq!(writer.content, "writer reply");
        assert_eq!(writer.created_at, at(2500));

        fx.poll(at(3499));
        assert_eq!(fx.log.len(), 2);
        assert_eq!(fx.dispatcher.state(), DispatchState::Emitting);

        fx.poll(at(3500));
        assert_eq!(fx.log.len(), 3);
        let illustrator = &fx.log.all()[2];
        assert_eq!(illustrator.sender.id, "illustrator");
        assert_eq!(illustrator.created_at, at(3500));
        assert!(fx.dispatcher.is_idle());
        assert_eq!(fx.dispatcher.batches().count(), 0);
    }

    #[test]
    fn test_event_sequence_for_one_batch() {
        let mut fx = Fixture::new(roster());
        let batch = fx.submit("launch campaign", t0()).unwrap();
        fx.poll(at(10_000));

        let events = fx.dispatcher.take_events();
        let kinds: Vec<String> = events
            .iter()
            .map(|e| match e {
                DispatchEvent::MessageAppended(m) => format!("msg:{}", m.sender.id),
                DispatchEvent::ThinkingChanged(b) => format!("thinking:{b}"),
                DispatchEvent::StateChanged(s) => format!("state:{s}"),
                DispatchEvent::BatchCompleted { emitted, .. } => format!("done:{emitted}"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "msg:user",
                "state:thinking",
                "thinking:true",
                "state:emitting",
                "thinking:false",
                "msg:writer",
                "msg:illustrator",
                "done:2",
                "state:idle",
            ]
        );
        assert!(events.contains(&DispatchEvent::BatchCompleted { batch, emitted: 2 }));
    }

    #[test]
    fn test_empty_snapshot_goes_idle_after_thinking() {
        let mut roster = roster();
        roster.toggle("writer").unwrap();
        roster.toggle("illustrator").unwrap();
        let mut fx = Fixture::new(roster);

        fx.submit("hello", t0()).unwrap();
        fx.poll(at(1500));

        assert!(fx.dispatcher.is_idle());
        assert_eq!(fx.senders(), vec![USER_ID]);
        assert_eq!(fx.dispatcher.pending_tasks(), 0);

        let states: Vec<_> = fx
            .dispatcher
            .take_events()
            .into_iter()
            .filter_map(|e| match e {
                DispatchEvent::StateChanged(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                DispatchState::Thinking,
                DispatchState::Emitting,
                DispatchState::Idle
            ]
        );
    }

    #[test]
    fn test_snapshot_isolation() {
        let mut fx = Fixture::new(roster());
        fx.submit("launch campaign", t0()).unwrap();
        fx.poll(at(1500));

        // Deactivated after the snapshot: the pending reply still arrives
        fx.roster.toggle("illustrator").unwrap();
        fx.poll(at(3500));

        assert_eq!(fx.senders(), vec![USER_ID, "writer", "illustrator"]);
    }

    #[test]
    fn test_toggle_before_snapshot_is_respected() {
        let mut fx = Fixture::new(roster());
        fx.submit("launch campaign", t0()).unwrap();
        fx.poll(at(1000));
        fx.roster.toggle("writer").unwrap();
        fx.poll(at(10_000));

        assert_eq!(fx.senders(), vec![USER_ID, "illustrator"]);
        // The only reply takes the first slot
        assert_eq!(fx.log.all()[1].created_at, at(2500));
    }

    #[test]
    fn test_sender_comes_from_snapshot() {
        let mut fx = Fixture::new(roster());
        fx.submit("go", t0()).unwrap();
        fx.poll(at(1500));

        let snapshot = fx.dispatcher.batches().next().unwrap().agent_snapshot.clone().unwrap();
        fx.poll(at(5000));

        let replies: Vec<_> = fx.log.all()[1..].iter().map(|m| m.sender.clone()).collect();
        let expected: Vec<_> = snapshot.iter().map(AgentRecord::sender).collect();
        assert_eq!(replies, expected);
    }

    #[test]
    fn test_overlapping_batches_interleave() {
        let mut fx = Fixture::new(roster());
        let first = fx.submit("one", t0()).unwrap();
        let second = fx.submit("two", at(2000)).unwrap();
        assert_ne!(first, second);

        // Batch 1 snapshot at 1500, batch 2 thinking from 2000
        assert!(fx.dispatcher.is_thinking());
        assert_eq!(fx.dispatcher.batches().count(), 2);

        fx.poll(at(20_000));
        let timeline: Vec<(i64, &str)> = fx
            .log
            .all()
            .iter()
            .map(|m| ((m.created_at - t0()).num_milliseconds(), m.sender.id.as_str()))
            .collect();
        assert_eq!(
            timeline,
            vec![
                (0, "user"),
                (2000, "user"),
                (2500, "writer"),
                (3500, "illustrator"),
                (4500, "writer"),
                (5500, "illustrator"),
            ]
        );
        assert!(fx.dispatcher.is_idle());
    }

    #[test]
    fn test_late_poll_keeps_log_in_time_order() {
        let mut fx = Fixture::new(roster());
        fx.submit("one", t0()).unwrap();
        // Second submit arrives after the first batch is long due
        fx.submit("two", at(9000)).unwrap();

        let times: Vec<_> = fx.log.all().iter().map(|m| m.created_at).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
        assert_eq!(fx.senders(), vec!["user", "writer", "illustrator", "user"]);
    }

    #[test]
    fn test_message_ids_unique() {
        let mut fx = Fixture::new(roster());
        fx.submit("one", t0()).unwrap();
        fx.submit("two", at(100)).unwrap();
        fx.poll(at(20_000));

        let mut ids: Vec<_> = fx.log.all().iter().map(|m| m.id.clone()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn test_batch_records_trigger() {
        let mut fx = Fixture::new(roster());
        fx.submit("launch campaign", t0()).unwrap();
        let batch = fx.dispatcher.batches().next().unwrap();
        assert_eq!(batch.triggering_user_message_id, fx.log.all()[0].id);
        assert_eq!(batch.emitted_count, 0);
        assert!(batch.is_thinking());
    }

    #[test]
    fn test_emission_offsets() {
        let config = DispatchConfig::default();
        assert_eq!(config.emission_offset(0), Duration::from_millis(2500));
        assert_eq!(config.emission_offset(1), Duration::from_millis(3500));
        assert_eq!(config.total_duration(0), Duration::from_millis(1500));
        assert_eq!(config.total_duration(10), Duration::from_millis(11_500));
    }

    #[test]
    fn test_zero_stagger_is_bumped() {
        let dispatcher = TurnDispatcher::new(DispatchConfig {
            thinking_latency: Duration::ZERO,
            stagger: Duration::ZERO,
        });
        assert_eq!(dispatcher.config().stagger, Duration::from_millis(1));
    }

    #[test]
    fn test_oversized_timings_are_capped() {
        let dispatcher = TurnDispatcher::new(DispatchConfig {
            thinking_latency: Duration::from_millis(9_000_000_000_000_000),
            stagger: Duration::from_secs(u64::MAX),
        });
        assert_eq!(dispatcher.config().thinking_latency, MAX_TIMING);
        assert_eq!(dispatcher.config().stagger, MAX_TIMING);
    }

    #[test]
    fn test_huge_latency_submit_schedules_without_overflow() {
        let mut fx = Fixture::new(roster());
        fx.dispatcher = TurnDispatcher::new(DispatchConfig {
            thinking_latency: Duration::from_millis(9_000_000_000_000_000),
            stagger: Duration::from_millis(1000),
        });

        fx.submit("launch campaign", t0()).unwrap();
        assert!(fx.dispatcher.is_thinking());
        assert_eq!(
            fx.dispatcher.next_deadline(),
            Some(t0() + chrono::Duration::hours(24))
        );
    }

    #[test]
    fn test_deadline_saturates_at_latest_time() {
        let late = DateTime::<Utc>::MAX_UTC - chrono::Duration::seconds(1);
        assert_eq!(after(late, MAX_TIMING), DateTime::<Utc>::MAX_UTC);
        assert_eq!(after(t0(), Duration::from_millis(1500)), at(1500));
    }
}

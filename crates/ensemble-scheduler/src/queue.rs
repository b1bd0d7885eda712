//! Time-ordered task queue
//!
//! Pending work is stored as plain data keyed by its fire time. Entries with
//! the same deadline come out in the order they were pushed. There is no way
//! to withdraw an entry once pushed.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A queued entry: payload plus its deadline
#[derive(Debug, Clone)]
pub struct TimerEntry<T> {
    pub fire_at: DateTime<Utc>,
    seq: u64,
    pub payload: T,
}

impl<T> PartialEq for TimerEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl<T> Eq for TimerEntry<T> {}

impl<T> PartialOrd for TimerEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for TimerEntry<T> {
    // Reversed so the max-heap pops the earliest deadline first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of timers ordered by `(fire_at, push order)`
#[derive(Debug)]
pub struct TimerQueue<T> {
    heap: BinaryHeap<TimerEntry<T>>,
    next_seq: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `payload` to fire at `fire_at`
    pub fn push(&mut self, fire_at: DateTime<Utc>, payload: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(TimerEntry {
            fire_at,
            seq,
            payload,
        });
    }

    /// Pop the earliest entry if it is due at `now`
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<TimerEntry<T>> {
        if self.heap.peek()?.fire_at <= now {
            self.heap.pop()
        } else {
            None
        }
    }

    /// Deadline of the earliest pending entry
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.heap.peek().map(|entry| entry.fire_at)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

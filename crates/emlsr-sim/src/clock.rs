//! Virtual-time scheduler
//!
//! Events are kept in a min-heap ordered by (deadline, sequence number), so
//! events due at the same instant come out in the order they were scheduled.
//! Cancellation removes the event body immediately; the heap entry left
//! behind is skipped when it surfaces.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use emlsr_mux::{EventHandle, ScheduledEvent, Scheduler};
use emlsr_types::Timestamp;

/// Deterministic scheduler whose clock only moves when the simulation runs
#[derive(Debug, Default)]
pub struct VirtualScheduler {
    now: Timestamp,
    next_seq: u64,
    queue: BinaryHeap<Reverse<(Timestamp, u64)>>,
    events: HashMap<u64, ScheduledEvent>,
    delivered: u64,
}

impl VirtualScheduler {
    /// Create a scheduler at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline of the next live event
    pub fn next_deadline(&mut self) -> Option<Timestamp> {
        self.skip_cancelled();
        self.queue.peek().map(|Reverse((at, _))| *at)
    }

    /// Pop the next event due at or before `until`, moving the clock to it
    pub fn pop_due(&mut self, until: Timestamp) -> Option<(Timestamp, ScheduledEvent)> {
        self.skip_cancelled();
        let Reverse((at, seq)) = *self.queue.peek()?;
        if at > until {
            return None;
        }
        self.queue.pop();
        let event = self.events.remove(&seq)?;
        self.now = self.now.max(at);
        self.delivered += 1;
        Some((at, event))
    }

    /// Move the clock forward to `to` (never backwards)
    pub fn advance_to(&mut self, to: Timestamp) {
        self.now = self.now.max(to);
    }

    /// Number of live events
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    /// Number of events handed out so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    fn skip_cancelled(&mut self) {
        while let Some(Reverse((_, seq))) = self.queue.peek() {
            if self.events.contains_key(seq) {
                break;
            }
            self.queue.pop();
        }
    }
}

impl Scheduler for VirtualScheduler {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn schedule_after(&mut self, delay: Duration, event: ScheduledEvent) -> EventHandle {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.queue.push(Reverse((self.now + delay, seq)));
        self.events.insert(seq, event);
        EventHandle(seq)
    }

    fn cancel(&mut self, handle: EventHandle) -> bool {
        self.events.remove(&handle.0).is_some()
    }
}

//! Minimal collaborators for unit tests

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use emlsr_types::{LinkId, MediumSnapshot, PhyState, RadioId, Timestamp};

use crate::platform::{EventHandle, PhyInterface, ScheduledEvent, Scheduler, SwitchHandle};

/// Scheduler whose clock only moves when told to
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Timestamp,
    next_id: u64,
    pending: BTreeMap<(Timestamp, EventHandle), ScheduledEvent>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_now(&mut self, now: Timestamp) {
        self.now = now;
    }

    /// Pop everything due up to `until`, in (time, scheduling order)
    pub fn advance_to(&mut self, until: Timestamp) -> Vec<(Timestamp, ScheduledEvent)> {
        let later = self.pending.split_off(&(until, EventHandle(u64::MAX)));
        let due = std::mem::replace(&mut self.pending, later);
        self.now = until;
        due.into_iter().map(|((at, _), ev)| (at, ev)).collect()
    }

    /// Pop the earliest pending event at or before `until`
    pub fn pop_next(&mut self, until: Timestamp) -> Option<(Timestamp, ScheduledEvent)> {
        let (&(at, handle), _) = self.pending.iter().next()?;
        if at > until {
            return None;
        }
        let event = self.pending.remove(&(at, handle))?;
        self.now = at;
        Some((at, event))
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn schedule_after(&mut self, delay: Duration, event: ScheduledEvent) -> EventHandle {
        self.next_id += 1;
        let handle = EventHandle(self.next_id);
        self.pending.insert((self.now + delay, handle), event);
        handle
    }

    fn cancel(&mut self, handle: EventHandle) -> bool {
        let key = self.pending.keys().find(|(_, h)| *h == handle).copied();
        key.and_then(|k| self.pending.remove(&k)).is_some()
    }
}

/// PHY whose state is set directly by the test
#[derive(Debug, Default)]
pub struct StaticPhy {
    pub states: HashMap<RadioId, PhyState>,
    pub media: HashMap<LinkId, MediumSnapshot>,
    pub switches: Vec<(RadioId, LinkId, Duration)>,
}

impl PhyInterface for StaticPhy {
    fn radio_state(&self, radio: RadioId) -> PhyState {
        self.states.get(&radio).copied().unwrap_or(PhyState::Idle)
    }

    fn begin_switch(&mut self, radio: RadioId, target: LinkId, duration: Duration) -> SwitchHandle {
        self.switches.push((radio, target, duration));
        SwitchHandle(self.switches.len() as u64)
    }

    fn link_medium_state(&self, link: LinkId) -> MediumSnapshot {
        self.media.get(&link).cloned().unwrap_or_default()
    }
}

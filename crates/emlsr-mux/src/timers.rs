//! Timer set
//!
//! Three independent timers govern switching:
//!
//! - **Transition Delay**: applies a negotiated enable/disable after a fixed delay
//! - **Medium Sync Delay** (per link): restricts access on a link the main
//!   radio was pulled away from
//! - **Switch-Main-Radio-Back**: bounds how long the main radio dwells on a
//!   link other than its preferred one
//!
//! Each arm bumps a generation counter that travels with the scheduled event.
//! An expiry whose generation no longer matches is ignored, so a timer
//! cancelled in the same instant it was due can never fire.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use emlsr_types::{LinkId, Timestamp};
use tracing::debug;

use crate::platform::{EventHandle, ScheduledEvent, Scheduler};

/// Number of ended timers kept for inspection
const HISTORY_LEN: usize = 64;

/// Which timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    TransitionDelay,
    MediumSyncDelay(LinkId),
    SwitchMainRadioBack,
}

/// Why a timer stopped running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElapsedReason {
    /// Nominal deadline reached
    Deadline,
    /// The transmit/receive opportunity on the link ended
    OpportunityEnded,
    /// A more urgent trigger needed the radio elsewhere
    Preempted,
    /// A peeked header revealed an earlier end of the frame on air
    FrameEndKnown,
    /// The radio came back to the link
    RadioReturned,
    /// Elapsed time passed the configured maximum before an access attempt
    MaxElapsedExceeded,
    /// A fresh arm replaced the running instance
    Restarted,
    /// Coordination was disabled on the link
    LinkDisabled,
    /// Stopped without any of the above
    Cancelled,
}

/// A running timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    pub kind: TimerKind,
    pub armed_at: Timestamp,
    pub duration: Duration,
    pub deadline: Timestamp,
    /// Reason recorded if the timer fires at its current deadline
    pub fire_reason: ElapsedReason,
    generation: u64,
    handle: EventHandle,
}

impl Timer {
    /// Time left until the deadline
    pub fn remaining(&self, now: Timestamp) -> Duration {
        self.deadline.saturating_since(now)
    }

    /// Time since the timer was armed
    pub fn elapsed(&self, now: Timestamp) -> Duration {
        now.saturating_since(self.armed_at)
    }
}

/// An ended timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRecord {
    pub kind: TimerKind,
    pub armed_at: Timestamp,
    /// Deadline the timer had when armed
    pub nominal_deadline: Timestamp,
    pub ended_at: Timestamp,
    pub elapsed_reason: ElapsedReason,
}

/// Pending enable/disable of a link set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub links: BTreeSet<LinkId>,
    pub enable: bool,
}

/// Result of evaluating a medium sync timer at an access attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediumSyncDecision {
    /// No restriction in force
    Normal,
    /// Access permitted under the stricter policy; one attempt consumed
    Restricted { attempts_left: u8 },
    /// No attempts left until the timer ends
    Exhausted,
}

/// A timer that has just reached its deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fired {
    TransitionDelay { record: TimerRecord, target: Transition },
    MediumSyncDelay { record: TimerRecord },
    SwitchMainRadioBack { record: TimerRecord },
}

impl Fired {
    /// Record of the fired timer
    pub fn record(&self) -> &TimerRecord {
        match self {
            Fired::TransitionDelay { record, .. }
            | Fired::MediumSyncDelay { record }
            | Fired::SwitchMainRadioBack { record } => record,
        }
    }
}

/// Comparable view of the running timers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSetSnapshot {
    pub transition: Option<(Timestamp, Timestamp, Transition)>,
    pub medium_sync: Vec<(LinkId, Timestamp, Timestamp, u8)>,
    pub switch_back: Option<(Timestamp, Timestamp)>,
}

#[derive(Debug, Clone)]
struct MediumSync {
    timer: Timer,
    attempts_left: u8,
}

/// The three coordinator timers
#[derive(Debug, Default)]
pub struct TimerSet {
    next_generation: u64,
    transition: Option<(Timer, Transition)>,
    medium_sync: BTreeMap<LinkId, MediumSync>,
    switch_back: Option<Timer>,
    history: VecDeque<TimerRecord>,
}

impl TimerSet {
    /// Create an empty timer set
    pub fn new() -> Self {
        Self::default()
    }

    fn start<S: Scheduler + ?Sized>(
        &mut self,
        sched: &mut S,
        kind: TimerKind,
        duration: Duration,
    ) -> Timer {
        self.next_generation += 1;
        let generation = self.next_generation;
        let now = sched.now();
        let handle = sched.schedule_after(duration, ScheduledEvent::TimerExpired { kind, generation });
        debug!("Armed {:?} for {:?} (gen {})", kind, duration, generation);
        Timer {
            kind,
            armed_at: now,
            duration,
            deadline: now + duration,
            fire_reason: ElapsedReason::Deadline,
            generation,
            handle,
        }
    }

    fn take(&mut self, kind: TimerKind) -> Option<Timer> {
        match kind {
            TimerKind::TransitionDelay => self.transition.take().map(|(t, _)| t),
            TimerKind::MediumSyncDelay(link) => self.medium_sync.remove(&link).map(|m| m.timer),
            TimerKind::SwitchMainRadioBack => self.switch_back.take(),
        }
    }

    fn record(&mut self, timer: &Timer, ended_at: Timestamp, reason: ElapsedReason) -> TimerRecord {
        let record = TimerRecord {
            kind: timer.kind,
            armed_at: timer.armed_at,
            nominal_deadline: timer.armed_at + timer.duration,
            ended_at,
            elapsed_reason: reason,
        };
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(record);
        record
    }

    /// Arm the transition delay, replacing any outstanding one
    pub fn arm_transition<S: Scheduler + ?Sized>(
        &mut self,
        sched: &mut S,
        duration: Duration,
        target: Transition,
    ) -> Timestamp {
        self.finish(sched, TimerKind::TransitionDelay, ElapsedReason::Restarted);
        let timer = self.start(sched, TimerKind::TransitionDelay, duration);
        let deadline = timer.deadline;
        self.transition = Some((timer, target));
        deadline
    }

    /// Arm the medium sync delay of `link`
    ///
    /// A timer already running on the link is left untouched and `false` is
    /// returned.
    pub fn arm_medium_sync<S: Scheduler + ?Sized>(
        &mut self,
        sched: &mut S,
        link: LinkId,
        duration: Duration,
        max_attempts: u8,
    ) -> bool {
        if self.medium_sync.contains_key(&link) {
            debug!("Medium sync delay on {} already running, not restarted", link);
            return false;
        }
        let timer = self.start(sched, TimerKind::MediumSyncDelay(link), duration);
        self.medium_sync.insert(
            link,
            MediumSync {
                timer,
                attempts_left: max_attempts,
            },
        );
        true
    }

    /// Arm the switch-main-radio-back timer, replacing any running one
    pub fn arm_switch_back<S: Scheduler + ?Sized>(
        &mut self,
        sched: &mut S,
        duration: Duration,
    ) -> Timestamp {
        self.finish(sched, TimerKind::SwitchMainRadioBack, ElapsedReason::Restarted);
        let timer = self.start(sched, TimerKind::SwitchMainRadioBack, duration);
        let deadline = timer.deadline;
        self.switch_back = Some(timer);
        deadline
    }

    /// Pull a running timer's deadline in to `deadline`
    ///
    /// Only moves the deadline earlier. When the timer later fires it records
    /// `reason` instead of [`ElapsedReason::Deadline`].
    pub fn shorten<S: Scheduler + ?Sized>(
        &mut self,
        sched: &mut S,
        kind: TimerKind,
        deadline: Timestamp,
        reason: ElapsedReason,
    ) -> bool {
        let now = sched.now();
        let Some(current) = self.get(kind).map(|t| t.deadline) else {
            return false;
        };
        if deadline >= current {
            return false;
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let handle = sched.schedule_after(
            deadline.saturating_since(now),
            ScheduledEvent::TimerExpired { kind, generation },
        );
        let Some(timer) = self.get_mut(kind) else {
            return false;
        };
        let stale = timer.handle;
        timer.deadline = deadline;
        timer.fire_reason = reason;
        timer.generation = generation;
        timer.handle = handle;
        sched.cancel(stale);
        debug!("Shortened {:?} to {} ({:?})", kind, deadline, reason);
        true
    }

    /// Stop a running timer before its deadline
    pub fn finish<S: Scheduler + ?Sized>(
        &mut self,
        sched: &mut S,
        kind: TimerKind,
        reason: ElapsedReason,
    ) -> Option<TimerRecord> {
        let timer = self.take(kind)?;
        sched.cancel(timer.handle);
        let record = self.record(&timer, sched.now(), reason);
        debug!("{:?} ended early: {:?}", kind, reason);
        Some(record)
    }

    /// Handle a delivered expiry event
    ///
    /// Returns `None` for stale generations.
    pub fn expire(&mut self, kind: TimerKind, generation: u64, now: Timestamp) -> Option<Fired> {
        if self.get(kind).map(|t| t.generation) != Some(generation) {
            debug!("Ignoring stale expiry of {:?} (gen {})", kind, generation);
            return None;
        }
        let fired = match kind {
            TimerKind::TransitionDelay => {
                let (timer, target) = self.transition.take()?;
                let record = self.record(&timer, now, timer.fire_reason);
                Fired::TransitionDelay { record, target }
            }
            TimerKind::MediumSyncDelay(link) => {
                let msd = self.medium_sync.remove(&link)?;
                let record = self.record(&msd.timer, now, msd.timer.fire_reason);
                Fired::MediumSyncDelay { record }
            }
            TimerKind::SwitchMainRadioBack => {
                let timer = self.switch_back.take()?;
                let record = self.record(&timer, now, timer.fire_reason);
                Fired::SwitchMainRadioBack { record }
            }
        };
        Some(fired)
    }

    /// Evaluate the medium sync timer of `link` for an access attempt
    ///
    /// A timer that has already run for `max_elapsed` or longer is treated as
    /// expired and removed; it is not re-armed.
    pub fn medium_sync_attempt<S: Scheduler + ?Sized>(
        &mut self,
        sched: &mut S,
        link: LinkId,
        max_elapsed: Duration,
    ) -> MediumSyncDecision {
        let now = sched.now();
        let Some(msd) = self.medium_sync.get_mut(&link) else {
            return MediumSyncDecision::Normal;
        };
        if msd.timer.elapsed(now) >= max_elapsed {
            self.finish(
                sched,
                TimerKind::MediumSyncDelay(link),
                ElapsedReason::MaxElapsedExceeded,
            );
            return MediumSyncDecision::Normal;
        }
        if msd.attempts_left == 0 {
            return MediumSyncDecision::Exhausted;
        }
        msd.attempts_left -= 1;
        MediumSyncDecision::Restricted {
            attempts_left: msd.attempts_left,
        }
    }

    /// Running timer of the given kind
    pub fn get(&self, kind: TimerKind) -> Option<&Timer> {
        match kind {
            TimerKind::TransitionDelay => self.transition.as_ref().map(|(t, _)| t),
            TimerKind::MediumSyncDelay(link) => self.medium_sync.get(&link).map(|m| &m.timer),
            TimerKind::SwitchMainRadioBack => self.switch_back.as_ref(),
        }
    }

    fn get_mut(&mut self, kind: TimerKind) -> Option<&mut Timer> {
        match kind {
            TimerKind::TransitionDelay => self.transition.as_mut().map(|(t, _)| t),
            TimerKind::MediumSyncDelay(link) => {
                self.medium_sync.get_mut(&link).map(|m| &mut m.timer)
            }
            TimerKind::SwitchMainRadioBack => self.switch_back.as_mut(),
        }
    }

    /// Whether a timer of the given kind is running
    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.get(kind).is_some()
    }

    /// Time left on a running timer
    pub fn remaining(&self, kind: TimerKind, now: Timestamp) -> Option<Duration> {
        self.get(kind).map(|t| t.remaining(now))
    }

    /// Time since a running timer was armed
    pub fn elapsed(&self, kind: TimerKind, now: Timestamp) -> Option<Duration> {
        self.get(kind).map(|t| t.elapsed(now))
    }

    /// Access attempts left under a running medium sync delay
    pub fn medium_sync_attempts_left(&self, link: LinkId) -> Option<u8> {
        self.medium_sync.get(&link).map(|m| m.attempts_left)
    }

    /// Target of the outstanding transition delay
    pub fn pending_transition(&self) -> Option<&Transition> {
        self.transition.as_ref().map(|(_, target)| target)
    }

    /// Ended timers, oldest first
    pub fn history(&self) -> impl Iterator<Item = &TimerRecord> {
        self.history.iter()
    }

    /// Most recent record for `kind`
    pub fn last_record(&self, kind: TimerKind) -> Option<&TimerRecord> {
        self.history.iter().rev().find(|r| r.kind == kind)
    }

    /// Comparable view of the running timers
    pub fn snapshot(&self) -> TimerSetSnapshot {
        TimerSetSnapshot {
            transition: self
                .transition
                .as_ref()
                .map(|(t, target)| (t.armed_at, t.deadline, target.clone())),
            medium_sync: self
                .medium_sync
                .iter()
                .map(|(link, m)| (*link, m.timer.armed_at, m.timer.deadline, m.attempts_left))
                .collect(),
            switch_back: self.switch_back.as_ref().map(|t| (t.armed_at, t.deadline)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::ManualScheduler;

    fn fire_due(timers: &mut TimerSet, sched: &mut ManualScheduler, until: Timestamp) -> Vec<Fired> {
        sched
            .advance_to(until)
            .into_iter()
            .filter_map(|(at, event)| match event {
                ScheduledEvent::TimerExpired { kind, generation } => {
                    timers.expire(kind, generation, at)
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_switch_back_fires_at_deadline() {
        let mut sched = ManualScheduler::new();
        let mut timers = TimerSet::new();

        let deadline = timers.arm_switch_back(&mut sched, Duration::from_micros(500));
        assert_eq!(deadline, Timestamp::from_micros(500));
        assert_eq!(
            timers.remaining(TimerKind::SwitchMainRadioBack, Timestamp::from_micros(200)),
            Some(Duration::from_micros(300))
        );

        assert!(fire_due(&mut timers, &mut sched, Timestamp::from_micros(499)).is_empty());
        let fired = fire_due(&mut timers, &mut sched, Timestamp::from_micros(500));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].record().elapsed_reason, ElapsedReason::Deadline);
        assert!(!timers.is_pending(TimerKind::SwitchMainRadioBack));
    }

    #[test]
    fn test_finish_in_same_instant_never_fires() {
        let mut sched = ManualScheduler::new();
        let mut timers = TimerSet::new();
        timers.arm_switch_back(&mut sched, Duration::from_micros(100));

        sched.set_now(Timestamp::from_micros(100));
        let record = timers
            .finish(
                &mut sched,
                TimerKind::SwitchMainRadioBack,
                ElapsedReason::OpportunityEnded,
            )
            .unwrap();
        assert_eq!(record.elapsed_reason, ElapsedReason::OpportunityEnded);
        assert!(fire_due(&mut timers, &mut sched, Timestamp::from_micros(100)).is_empty());
    }

    #[test]
    fn test_stale_generation_ignored() {
        let mut sched = ManualScheduler::new();
        let mut timers = TimerSet::new();
        timers.arm_switch_back(&mut sched, Duration::from_micros(100));
        // Re-arm at t=50: the first expiry must not end the second instance
        sched.set_now(Timestamp::from_micros(50));
        timers.arm_switch_back(&mut sched, Duration::from_micros(100));

        assert!(timers
            .expire(TimerKind::SwitchMainRadioBack, 1, Timestamp::from_micros(100))
            .is_none());
        assert!(timers.is_pending(TimerKind::SwitchMainRadioBack));
        assert_eq!(
            timers.last_record(TimerKind::SwitchMainRadioBack).unwrap().elapsed_reason,
            ElapsedReason::Restarted
        );
    }

    #[test]
    fn test_shorten_records_reason() {
        let mut sched = ManualScheduler::new();
        let mut timers = TimerSet::new();
        timers.arm_switch_back(&mut sched, Duration::from_micros(1000));

        sched.set_now(Timestamp::from_micros(100));
        // Later deadlines are ignored
        assert!(!timers.shorten(
            &mut sched,
            TimerKind::SwitchMainRadioBack,
            Timestamp::from_micros(2000),
            ElapsedReason::FrameEndKnown
        ));
        assert!(timers.shorten(
            &mut sched,
            TimerKind::SwitchMainRadioBack,
            Timestamp::from_micros(300),
            ElapsedReason::FrameEndKnown
        ));

        let fired = fire_due(&mut timers, &mut sched, Timestamp::from_micros(1000));
        assert_eq!(fired.len(), 1);
        let record = fired[0].record();
        assert_eq!(record.ended_at, Timestamp::from_micros(300));
        assert_eq!(record.nominal_deadline, Timestamp::from_micros(1000));
        assert_eq!(record.elapsed_reason, ElapsedReason::FrameEndKnown);
    }

    #[test]
    fn test_transition_restart() {
        let mut sched = ManualScheduler::new();
        let mut timers = TimerSet::new();
        let target = Transition {
            links: [LinkId(1), LinkId(2)].into_iter().collect(),
            enable: true,
        };
        timers.arm_transition(&mut sched, Duration::from_micros(128), target.clone());
        sched.set_now(Timestamp::from_micros(64));
        timers.arm_transition(&mut sched, Duration::from_micros(128), target.clone());

        let fired = fire_due(&mut timers, &mut sched, Timestamp::from_micros(500));
        assert_eq!(fired.len(), 1);
        match &fired[0] {
            Fired::TransitionDelay { record, target: t } => {
                assert_eq!(record.ended_at, Timestamp::from_micros(192));
                assert_eq!(t, &target);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_medium_sync_second_arm_untouched() {
        let mut sched = ManualScheduler::new();
        let mut timers = TimerSet::new();
        let link = LinkId(0);
        assert!(timers.arm_medium_sync(&mut sched, link, Duration::from_micros(5000), 1));
        sched.set_now(Timestamp::from_micros(1000));
        assert!(!timers.arm_medium_sync(&mut sched, link, Duration::from_micros(5000), 1));
        assert_eq!(
            timers.get(TimerKind::MediumSyncDelay(link)).unwrap().armed_at,
            Timestamp::ZERO
        );
    }

    #[test]
    fn test_medium_sync_attempts() {
        let mut sched = ManualScheduler::new();
        let mut timers = TimerSet::new();
        let link = LinkId(0);
        let max = Duration::from_micros(4000);
        timers.arm_medium_sync(&mut sched, link, Duration::from_micros(5000), 1);

        assert_eq!(
            timers.medium_sync_attempt(&mut sched, link, max),
            MediumSyncDecision::Restricted { attempts_left: 0 }
        );
        assert_eq!(
            timers.medium_sync_attempt(&mut sched, link, max),
            MediumSyncDecision::Exhausted
        );
        assert_eq!(
            timers.medium_sync_attempt(&mut sched, LinkId(9), max),
            MediumSyncDecision::Normal
        );
    }

    #[test]
    fn test_medium_sync_past_max_elapsed_is_expired() {
        let mut sched = ManualScheduler::new();
        let mut timers = TimerSet::new();
        let link = LinkId(0);
        timers.arm_medium_sync(&mut sched, link, Duration::from_micros(5000), 1);

        sched.set_now(Timestamp::from_micros(4000));
        assert_eq!(
            timers.medium_sync_attempt(&mut sched, link, Duration::from_micros(4000)),
            MediumSyncDecision::Normal
        );
        assert!(!timers.is_pending(TimerKind::MediumSyncDelay(link)));
        assert_eq!(
            timers
                .last_record(TimerKind::MediumSyncDelay(link))
                .unwrap()
                .elapsed_reason,
            ElapsedReason::MaxElapsedExceeded
        );
        // Nothing fires later either
        assert!(fire_due(&mut timers, &mut sched, Timestamp::from_micros(6000)).is_empty());
    }
}

//! Collaborator interfaces
//!
//! The coordinator does not simulate radios or keep time. It consumes a PHY
//! that reports radio and medium state and executes channel switches, and a
//! scheduler that runs [`ScheduledEvent`]s after a delay. Whoever drives the
//! coordinator (the simulator, the async actor, a test harness) feeds fired
//! events back through [`Coordinator::handle_scheduled`](crate::Coordinator::handle_scheduled).

use std::time::Duration;

use emlsr_types::{LinkId, MediumSnapshot, PartialHeader, PhyState, RadioId, SwitchId, Timestamp};

use crate::timers::TimerKind;

/// Handle to a scheduled event, used to cancel it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventHandle(pub u64);

/// Handle returned by the PHY for a switch command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwitchHandle(pub u64);

/// Work the coordinator asks to be re-entered with later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledEvent {
    /// The radio finished tuning to its destination
    SwitchComplete { radio: RadioId, switch: SwitchId },
    /// One PIFS before the planned transmission start
    LastPifsCheck { radio: RadioId, switch: SwitchId },
    /// A timer reached its deadline
    TimerExpired { kind: TimerKind, generation: u64 },
}

/// Radio and medium access provided by the PHY/MAC layer
pub trait PhyInterface {
    /// Momentary state of a radio
    fn radio_state(&self, radio: RadioId) -> PhyState;

    /// Start retuning `radio` to `target`; takes exactly `duration`
    fn begin_switch(&mut self, radio: RadioId, target: LinkId, duration: Duration) -> SwitchHandle;

    /// NAV and CCA bookkeeping of a link
    fn link_medium_state(&self, link: LinkId) -> MediumSnapshot;
}

/// Virtual-time callback scheduler
///
/// Events due at the same instant must run in the order they were scheduled,
/// and a cancelled event must never be delivered.
pub trait Scheduler {
    /// Current virtual time
    fn now(&self) -> Timestamp;

    /// Deliver `event` after `delay`
    fn schedule_after(&mut self, delay: Duration, event: ScheduledEvent) -> EventHandle;

    /// Remove a pending event; returns false if it already ran or was cancelled
    fn cancel(&mut self, handle: EventHandle) -> bool;
}

/// State-change notifications pushed by the PHY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioNotification {
    /// Radio left its channel
    Disconnected,
    /// Radio is operating on `link`
    Connected { link: LinkId },
    /// Preamble detected on the radio's link
    ReceptionStarted,
    /// MAC header fields of the frame being received are available
    HeaderAvailable(PartialHeader),
    /// Radio finished its transmission or reception
    BecameIdle,
}

//! Coordinator event stream and trigger outcomes
//!
//! Every state change the coordinator makes is also pushed onto an event
//! buffer that the driver drains after each call. The MAC layer learns from
//! it when a radio is ready to transmit or receive; tests and the scenario
//! runner use it as a trace.

use std::time::Duration;

use emlsr_types::{LinkId, RadioId, SwitchInfo, Timestamp};

use crate::admission::AdmissionDeferred;
use crate::timers::{ElapsedReason, TimerKind, TimerRecord};

/// Unified event enum for all coordinator activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    // -------------------------------------------------------------------------
    // Switching
    // -------------------------------------------------------------------------
    /// A radio started switching
    SwitchStarted { radio: RadioId, info: SwitchInfo },

    /// An in-flight switch was given a new destination
    SwitchRedirected {
        radio: RadioId,
        /// Destination before the redirection
        previous: Option<LinkId>,
        info: SwitchInfo,
    },

    /// A radio finished switching and is bound to `link`
    SwitchCompleted {
        radio: RadioId,
        link: LinkId,
        info: SwitchInfo,
    },

    /// A radio finished switching but its destination was taken
    SwitchAbandoned { radio: RadioId, link: LinkId },

    /// An auxiliary radio gave its link up to the main radio
    RadioParked { radio: RadioId, link: LinkId },

    /// An auxiliary radio took its link back
    RadioRestored { radio: RadioId, link: LinkId },

    // -------------------------------------------------------------------------
    // Frame exchange readiness
    // -------------------------------------------------------------------------
    /// The radio may start the transmission it switched for
    TransmissionReady { radio: RadioId, link: LinkId },

    /// The radio is in place to answer the frame it switched for
    ReadyToReceive { radio: RadioId, link: LinkId },

    /// The last-PIFS check found the link busy; backoff retries later
    AccessDeferred {
        radio: RadioId,
        deferred: AdmissionDeferred,
    },

    // -------------------------------------------------------------------------
    // Timers
    // -------------------------------------------------------------------------
    /// A timer was armed
    TimerArmed { kind: TimerKind, deadline: Timestamp },

    /// A timer ended, early or at its deadline
    TimerEnded(TimerRecord),

    /// Switch-back is due but the main radio is still exchanging frames
    ReturnHeld { reason: ElapsedReason },

    // -------------------------------------------------------------------------
    // Link control
    // -------------------------------------------------------------------------
    /// Coordination enabled on links
    LinksEnabled(Vec<LinkId>),

    /// Coordination disabled on links
    LinksDisabled(Vec<LinkId>),
}

impl CoordinatorEvent {
    /// Check if this is a switch lifecycle event
    pub fn is_switch(&self) -> bool {
        matches!(
            self,
            CoordinatorEvent::SwitchStarted { .. }
                | CoordinatorEvent::SwitchRedirected { .. }
                | CoordinatorEvent::SwitchCompleted { .. }
                | CoordinatorEvent::SwitchAbandoned { .. }
        )
    }

    /// Check if this is a timer event
    pub fn is_timer(&self) -> bool {
        matches!(
            self,
            CoordinatorEvent::TimerArmed { .. }
                | CoordinatorEvent::TimerEnded(_)
                | CoordinatorEvent::ReturnHeld { .. }
        )
    }

    /// Get the radio if this event is about a specific radio
    pub fn radio(&self) -> Option<RadioId> {
        match self {
            CoordinatorEvent::SwitchStarted { radio, .. }
            | CoordinatorEvent::SwitchRedirected { radio, .. }
            | CoordinatorEvent::SwitchCompleted { radio, .. }
            | CoordinatorEvent::SwitchAbandoned { radio, .. }
            | CoordinatorEvent::RadioParked { radio, .. }
            | CoordinatorEvent::RadioRestored { radio, .. }
            | CoordinatorEvent::TransmissionReady { radio, .. }
            | CoordinatorEvent::ReadyToReceive { radio, .. }
            | CoordinatorEvent::AccessDeferred { radio, .. } => Some(*radio),
            _ => None,
        }
    }
}

/// CCA policy an access attempt runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcaPolicy {
    Normal,
    /// Medium sync delay in force on the link
    MediumSync { attempts_left: u8 },
}

/// Why an access request did not lead to a grant or a switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    /// The radio that would serve the link is transmitting or receiving
    RadioBusy,
    /// An in-flight switch has higher priority
    LowerPriority,
    /// Coordination disabled on the link and no local radio can serve it
    CoordinationDisabled,
    /// Medium sync delay running with no attempts left
    MediumSyncExhausted,
}

/// Result of [`Coordinator::request_access`](crate::Coordinator::request_access)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    /// A radio is on the link and idle; transmit now
    Granted { radio: RadioId, policy: CcaPolicy },
    /// The main radio is switching to the link
    SwitchScheduled { info: SwitchInfo, policy: CcaPolicy },
    /// An in-flight switch was redirected to the link
    Redirected { info: SwitchInfo, policy: CcaPolicy },
    /// The main radio was already switching to the link
    InFlight(SwitchInfo),
    /// Retry at the next opportunity
    Deferred(DeferReason),
}

impl AccessOutcome {
    /// Switch issued or redirected by this request
    pub fn switch_info(&self) -> Option<&SwitchInfo> {
        match self {
            AccessOutcome::SwitchScheduled { info, .. }
            | AccessOutcome::Redirected { info, .. }
            | AccessOutcome::InFlight(info) => Some(info),
            _ => None,
        }
    }
}

/// Why an incoming frame caused no switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The main radio is already switching to the link
    MainAlreadyHeading,
    /// The in-flight switch continues as planned
    SwitchContinues,
    /// A radio able to handle the frame is already on the link
    ServedLocally,
    /// The main radio is busy on another link
    MainBusy,
    /// No header, or the frame does not need an answer from us
    NotForUs,
    /// Coordination disabled on the link
    CoordinationDisabled,
}

/// Result of [`Coordinator::notify_incoming_frame`](crate::Coordinator::notify_incoming_frame)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecision {
    Ignored(IgnoreReason),
    /// The main radio starts switching to the link
    SwitchScheduled(SwitchInfo),
    /// The main radio's switch now goes to the link
    Redirected(SwitchInfo),
    /// The switch-back timer now ends when the frame ends
    SwitchBackShortened { fires_in: Duration },
}

//! EMLSR Switch Coordinator
//!
//! This crate decides which radio of a multi-link device is tuned to which
//! link. The device has one fully capable main radio and one limited
//! auxiliary radio per extra link. When a transmit opportunity or an
//! incoming frame shows up on a link the main radio is not on, the
//! coordinator switches the main radio there and later brings it back.
//!
//! # Architecture
//!
//! The [`Coordinator`] owns three pieces of state:
//!
//! - **Binding table**: the one-to-one radio <-> link assignment
//! - **Timer set**: transition delay, per-link medium sync delay and
//!   switch-main-radio-back
//! - **Admission checker**: the last-PIFS medium check before a transmission
//!
//! It never blocks and keeps no clock. Radio state comes from a
//! [`PhyInterface`]; everything that must happen later is registered on a
//! [`Scheduler`] as [`ScheduledEvent`] data and handed back through
//! [`Coordinator::handle_scheduled`]. State changes are buffered as
//! [`CoordinatorEvent`]s and collected with [`Coordinator::drain_events`].
//!
//! The [`actor`] module wraps a coordinator in a tokio task for async callers.
//!
//! # Example
//!
//! ```rust,ignore
//! use emlsr_mux::{AccessOutcome, Coordinator, CoordinatorConfig};
//! use emlsr_types::LinkId;
//!
//! let mut coordinator = Coordinator::new(CoordinatorConfig::default(), phy, scheduler)?;
//!
//! match coordinator.request_access(LinkId(1))? {
//!     AccessOutcome::Granted { radio, .. } => { /* transmit on radio */ }
//!     AccessOutcome::SwitchScheduled { info, .. } => { /* wait for TransmissionReady */ }
//!     _ => { /* retry at the next backoff */ }
//! }
//! for event in coordinator.drain_events() {
//!     println!("{:?}", event);
//! }
//! ```

pub mod actor;
pub mod admission;
pub mod binding;
pub mod engine;
pub mod error;
pub mod events;
pub mod platform;
pub mod state;
mod switching;
pub mod timers;

#[cfg(test)]
mod test_util;

// Re-export actor types
pub use actor::{run_coordinator_actor, CoordinatorCommand, TokioScheduler};

// Re-export engine types
pub use admission::{AdmissionChecker, AdmissionDeferred, DeferCause};
pub use binding::BindingTable;
pub use engine::{Coordinator, CoordinatorConfig, TimerConfig};
pub use error::{ConfigError, CoordinatorError};
pub use events::{
    AccessOutcome, CcaPolicy, CoordinatorEvent, DeferReason, FrameDecision, IgnoreReason,
};
pub use platform::{
    EventHandle, PhyInterface, RadioNotification, ScheduledEvent, Scheduler, SwitchHandle,
};
pub use state::{ActiveSwitch, AdmissionStatus, LinkConfig, LinkState, RadioConfig, RadioState};
pub use timers::{
    ElapsedReason, Fired, MediumSyncDecision, Timer, TimerKind, TimerRecord, TimerSet,
    TimerSetSnapshot, Transition,
};

//! Error types for the coordinator

use std::time::Duration;

use emlsr_types::{LinkId, RadioId};
use thiserror::Error;

use crate::admission::AdmissionDeferred;

/// Errors returned by coordinator operations
///
/// `AlreadyBound` and the unknown-id variants point at a bug in the calling
/// layer. `SwitchBusy` and `AdmissionDeferred` are ordinary outcomes that the
/// caller resolves on its next backoff cycle or notification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// Radio or link already bound to something else
    #[error("{radio} cannot bind to {link}: already bound")]
    AlreadyBound {
        /// Radio that was being bound
        radio: RadioId,
        /// Link it was being bound to
        link: LinkId,
    },

    /// A non-interruptible switch is in flight on the radio
    #[error("{radio} is busy switching: {remaining_us}us remaining")]
    SwitchBusy {
        /// Radio that is switching
        radio: RadioId,
        /// Time until the current switch completes (microseconds)
        remaining_us: u64,
    },

    /// No radio with this id
    #[error("unknown radio: {0}")]
    UnknownRadio(RadioId),

    /// No link with this id
    #[error("unknown link: {0}")]
    UnknownLink(LinkId),

    /// Medium on the destination link not free at the planned start
    #[error(transparent)]
    AdmissionDeferred(#[from] AdmissionDeferred),
}

impl CoordinatorError {
    pub(crate) fn switch_busy(radio: RadioId, remaining: Duration) -> Self {
        CoordinatorError::SwitchBusy {
            radio,
            remaining_us: u64::try_from(remaining.as_micros()).unwrap_or(u64::MAX),
        }
    }

    /// Whether the caller should simply retry at its next opportunity
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoordinatorError::SwitchBusy { .. } | CoordinatorError::AdmissionDeferred(_)
        )
    }
}

/// Errors detected while validating a [`CoordinatorConfig`](crate::CoordinatorConfig)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Two radios share an id
    #[error("duplicate radio id: {0}")]
    DuplicateRadio(RadioId),

    /// Two links share an id
    #[error("duplicate link id: {0}")]
    DuplicateLink(LinkId),

    /// A radio prefers a link that is not configured
    #[error("{radio} prefers unknown {link}")]
    UnknownPreferredLink {
        /// Radio with the bad preference
        radio: RadioId,
        /// Link it names
        link: LinkId,
    },

    /// Two radios prefer the same link
    #[error("{link} is preferred by more than one radio")]
    PreferredLinkTaken {
        /// Contested link
        link: LinkId,
    },

    /// A link that no radio prefers
    #[error("no radio prefers {0}")]
    NoPreferredRadio(LinkId),

    /// Main radio cannot transmit
    #[error("main {0} must be transmit capable")]
    MainCannotTransmit(RadioId),

    /// A switch delay of zero or above the bound
    #[error("switch delay for {radio} out of range: {delay_us}us")]
    SwitchDelayOutOfRange {
        /// Radio with the bad delay
        radio: RadioId,
        /// Configured delay (microseconds)
        delay_us: u64,
    },

    /// A timer duration of zero or above the bound
    #[error("timer {name} out of range: {value_us}us")]
    TimerOutOfRange {
        /// Config field name
        name: &'static str,
        /// Configured value (microseconds)
        value_us: u64,
    },
}

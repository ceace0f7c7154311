//! Last-PIFS admission check
//!
//! A radio that is busy switching cannot sense the destination link, so just
//! before the planned transmission start the link's NAV and CCA are looked at
//! once more. If either shows activity the transmission is not started and
//! the caller's backoff takes the next opportunity.

use std::time::Duration;

use emlsr_types::{ChannelWidth, LinkId, MediumSnapshot, Timestamp};
use thiserror::Error;

/// What blocked admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferCause {
    /// NAV set beyond the planned start
    Nav { until: Timestamp },
    /// CCA busy inside the PIFS window on the sensed width
    Cca { until: Timestamp, width: ChannelWidth },
}

/// A planned transmission that must wait for the next backoff opportunity
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("transmission on {link} at {planned_start} deferred: {cause:?}")]
pub struct AdmissionDeferred {
    pub link: LinkId,
    pub planned_start: Timestamp,
    pub cause: DeferCause,
}

/// Evaluates the last PIFS before a planned transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionChecker {
    pifs: Duration,
}

impl AdmissionChecker {
    /// Create a checker for the given SIFS and slot time
    pub fn new(sifs: Duration, slot: Duration) -> Self {
        Self { pifs: sifs + slot }
    }

    /// PIFS = SIFS + one slot
    pub fn pifs(&self) -> Duration {
        self.pifs
    }

    /// Instant at which the check for `planned_start` should run
    pub fn check_time(&self, planned_start: Timestamp) -> Timestamp {
        planned_start.saturating_sub(self.pifs)
    }

    /// Decide whether a transmission may start on `link` at `planned_start`
    ///
    /// `sensing_width` is the width over which CCA is trusted: the link width,
    /// or the narrower width of the auxiliary radio that monitored the link.
    pub fn check(
        &self,
        link: LinkId,
        planned_start: Timestamp,
        sensing_width: ChannelWidth,
        medium: &MediumSnapshot,
    ) -> Result<(), AdmissionDeferred> {
        if let Some(until) = medium.nav_until.filter(|nav| *nav > planned_start) {
            return Err(AdmissionDeferred {
                link,
                planned_start,
                cause: DeferCause::Nav { until },
            });
        }

        let window_start = self.check_time(planned_start);
        if let Some(until) = medium
            .cca_busy_until(sensing_width)
            .filter(|busy| *busy > window_start)
        {
            return Err(AdmissionDeferred {
                link,
                planned_start,
                cause: DeferCause::Cca {
                    until,
                    width: sensing_width,
                },
            });
        }

        Ok(())
    }
}

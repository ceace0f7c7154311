//! Link identity and medium state

use std::fmt;

use crate::radio::ChannelWidth;
use crate::time::Timestamp;

/// Identifier of a logical link of the multi-link device
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkId(pub u8);

impl LinkId {
    /// Get the raw id value
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link{}", self.0)
    }
}

/// Busy/idle condition of a link at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MediumState {
    Idle,
    /// Virtual carrier sense reserved until the given time
    NavBusy(Timestamp),
    /// Physical carrier sense busy until the given time
    CcaBusy(Timestamp),
}

/// CCA busy indication on one channel width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CcaBusy {
    /// Width the indication applies to
    pub width: ChannelWidth,
    /// Until when the medium is busy
    pub until: Timestamp,
}

/// NAV and CCA bookkeeping of a link, as reported by the PHY/MAC
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediumSnapshot {
    /// End of the current NAV reservation, if any
    pub nav_until: Option<Timestamp>,
    /// Busy indications per channel width
    pub cca_busy: Vec<CcaBusy>,
}

impl MediumSnapshot {
    /// Snapshot of an idle medium
    pub fn idle() -> Self {
        Self::default()
    }

    /// Set the NAV reservation end
    pub fn with_nav_until(mut self, until: Timestamp) -> Self {
        self.nav_until = Some(until);
        self
    }

    /// Add a CCA busy indication on the given width
    pub fn with_cca_busy(mut self, width: ChannelWidth, until: Timestamp) -> Self {
        self.cca_busy.push(CcaBusy { width, until });
        self
    }

    /// Latest CCA busy end visible to a radio sensing `width`
    ///
    /// A radio only sees activity on subchannels it covers, so indications on
    /// wider channels than `width` are ignored.
    pub fn cca_busy_until(&self, width: ChannelWidth) -> Option<Timestamp> {
        self.cca_busy
            .iter()
            .filter(|b| b.width <= width)
            .map(|b| b.until)
            .max()
    }

    /// Classify the medium at `now` as seen on `width`
    pub fn state_at(&self, now: Timestamp, width: ChannelWidth) -> MediumState {
        if let Some(nav) = self.nav_until.filter(|nav| *nav > now) {
            return MediumState::NavBusy(nav);
        }
        match self.cca_busy_until(width) {
            Some(until) if until > now => MediumState::CcaBusy(until),
            _ => MediumState::Idle,
        }
    }
}

//! Radio and link state tracking

use std::time::Duration;

use emlsr_types::{Capability, ChannelWidth, LinkId, RadioId, RadioRole, SwitchInfo};
use serde::{Deserialize, Serialize};

use crate::admission::AdmissionDeferred;
use crate::platform::{EventHandle, SwitchHandle};

/// Static description of a radio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Radio id
    pub id: RadioId,
    /// Capability profile
    pub capability: Capability,
    /// Channel switch delay (microseconds)
    pub switch_delay_us: u64,
    /// Link the radio occupies when not switched away
    pub preferred_link: LinkId,
}

/// Static description of a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Link id
    pub id: LinkId,
    /// Operating channel width
    pub channel_width: ChannelWidth,
    /// Whether the link starts with coordination enabled
    #[serde(default = "default_true")]
    pub emlsr_enabled: bool,
    /// Switch delay into this link, overriding the radio's (microseconds)
    #[serde(default)]
    pub switch_delay_us: Option<u64>,
}

fn default_true() -> bool {
    true
}

/// Outcome of the last-PIFS check for an access switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionStatus {
    /// Switch is not for an access, or the check is disabled
    NotRequired,
    /// Check scheduled
    Pending,
    /// Medium found free
    Cleared,
    /// Medium found busy
    Deferred(AdmissionDeferred),
}

/// A switch the coordinator has issued and not yet completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSwitch {
    pub info: SwitchInfo,
    /// Handle the PHY returned for the switch command
    pub phy_handle: SwitchHandle,
    pub(crate) completion: EventHandle,
    pub(crate) pifs_check: Option<EventHandle>,
    pub admission: AdmissionStatus,
}

/// Coordinator-owned state of a radio
#[derive(Debug, Clone)]
pub struct RadioState {
    pub id: RadioId,
    pub role: RadioRole,
    pub capability: Capability,
    pub switch_delay: Duration,
    pub preferred_link: LinkId,
    /// Switch in flight, if any
    pub switch: Option<ActiveSwitch>,
}

impl RadioState {
    /// Create from config
    pub fn new(config: &RadioConfig, role: RadioRole) -> Self {
        Self {
            id: config.id,
            role,
            capability: config.capability,
            switch_delay: Duration::from_micros(config.switch_delay_us),
            preferred_link: config.preferred_link,
            switch: None,
        }
    }

    /// Whether this is the main radio
    pub fn is_main(&self) -> bool {
        self.role == RadioRole::Main
    }

    /// Whether a switch is in flight
    pub fn is_switching(&self) -> bool {
        self.switch.is_some()
    }

    /// Whether this radio can run a frame exchange on a link of `width`
    ///
    /// The main radio is always eligible: nothing better exists.
    pub fn can_serve(&self, width: ChannelWidth) -> bool {
        self.is_main() || self.capability.covers(width)
    }
}

/// Coordinator-owned state of a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkState {
    pub id: LinkId,
    pub preferred_radio: RadioId,
    pub channel_width: ChannelWidth,
    pub switch_delay: Option<Duration>,
    pub emlsr_enabled: bool,
}

impl LinkState {
    /// Create from config
    pub fn new(config: &LinkConfig, preferred_radio: RadioId) -> Self {
        Self {
            id: config.id,
            preferred_radio,
            channel_width: config.channel_width,
            switch_delay: config.switch_delay_us.map(Duration::from_micros),
            emlsr_enabled: config.emlsr_enabled,
        }
    }
}

//! Simulated PHY
//!
//! Holds per-radio activity and per-link medium state set by the scenario,
//! and records every switch command it receives.

use std::collections::HashMap;
use std::time::Duration;

use emlsr_mux::{PhyInterface, SwitchHandle};
use emlsr_types::{LinkId, MediumSnapshot, PhyState, RadioId};

/// A switch command as received by the PHY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchCommand {
    pub handle: SwitchHandle,
    pub radio: RadioId,
    pub target: LinkId,
    pub duration: Duration,
}

/// Scriptable PHY
#[derive(Debug, Default)]
pub struct SimPhy {
    radios: HashMap<RadioId, PhyState>,
    media: HashMap<LinkId, MediumSnapshot>,
    switch_log: Vec<SwitchCommand>,
}

impl SimPhy {
    /// Create a PHY with every radio idle and every medium free
    pub fn new() -> Self {
        Self::default()
    }

    /// Set what a radio is doing
    pub fn set_radio_state(&mut self, radio: RadioId, state: PhyState) {
        self.radios.insert(radio, state);
    }

    /// Set the NAV/CCA bookkeeping of a link
    pub fn set_medium(&mut self, link: LinkId, medium: MediumSnapshot) {
        self.media.insert(link, medium);
    }

    /// Forget any NAV/CCA state of a link
    pub fn clear_medium(&mut self, link: LinkId) {
        self.media.remove(&link);
    }

    /// Switch commands received so far, oldest first
    pub fn switch_log(&self) -> &[SwitchCommand] {
        &self.switch_log
    }
}

impl PhyInterface for SimPhy {
    fn radio_state(&self, radio: RadioId) -> PhyState {
        self.radios.get(&radio).copied().unwrap_or(PhyState::Idle)
    }

    fn begin_switch(&mut self, radio: RadioId, target: LinkId, duration: Duration) -> SwitchHandle {
        let handle = SwitchHandle(self.switch_log.len() as u64 + 1);
        self.switch_log.push(SwitchCommand {
            handle,
            radio,
            target,
            duration,
        });
        handle
    }

    fn link_medium_state(&self, link: LinkId) -> MediumSnapshot {
        self.media.get(&link).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emlsr_types::{ChannelWidth, Timestamp};

    #[test]
    fn test_defaults_idle() {
        let phy = SimPhy::new();
        assert_eq!(phy.radio_state(RadioId(3)), PhyState::Idle);
        assert_eq!(phy.link_medium_state(LinkId(1)), MediumSnapshot::idle());
    }

    #[test]
    fn test_switch_log() {
        let mut phy = SimPhy::new();
        let h1 = phy.begin_switch(RadioId(0), LinkId(2), Duration::from_micros(64));
        let h2 = phy.begin_switch(RadioId(0), LinkId(1), Duration::from_micros(64));
        assert_ne!(h1, h2);
        assert_eq!(phy.switch_log().len(), 2);
        assert_eq!(phy.switch_log()[1].target, LinkId(1));
    }

    #[test]
    fn test_medium_override() {
        let mut phy = SimPhy::new();
        let busy = MediumSnapshot::idle().with_cca_busy(ChannelWidth::Mhz20, Timestamp::from_micros(9));
        phy.set_medium(LinkId(1), busy.clone());
        assert_eq!(phy.link_medium_state(LinkId(1)), busy);
        phy.clear_medium(LinkId(1));
        assert_eq!(phy.link_medium_state(LinkId(1)), MediumSnapshot::idle());
    }
}

//! Radio identity, capability and operating state

use std::fmt;

use crate::error::TypesError;
use crate::switch::SwitchInfo;
use crate::time::Timestamp;

/// Opaque identifier of a physical transceiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RadioId(pub u8);

impl RadioId {
    /// Get the raw id value
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for RadioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "radio{}", self.0)
    }
}

/// Role of a radio within the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RadioRole {
    /// The single fully capable transceiver
    Main,
    /// A reduced-capability transceiver dedicated to one link
    Auxiliary,
}

/// Operating channel width
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelWidth {
    Mhz20,
    Mhz40,
    Mhz80,
    Mhz160,
    Mhz320,
}

impl ChannelWidth {
    /// Width in MHz
    pub fn mhz(&self) -> u16 {
        match self {
            ChannelWidth::Mhz20 => 20,
            ChannelWidth::Mhz40 => 40,
            ChannelWidth::Mhz80 => 80,
            ChannelWidth::Mhz160 => 160,
            ChannelWidth::Mhz320 => 320,
        }
    }

    /// Parse a width given in MHz
    pub fn from_mhz(mhz: u16) -> Result<Self, TypesError> {
        match mhz {
            20 => Ok(ChannelWidth::Mhz20),
            40 => Ok(ChannelWidth::Mhz40),
            80 => Ok(ChannelWidth::Mhz80),
            160 => Ok(ChannelWidth::Mhz160),
            320 => Ok(ChannelWidth::Mhz320),
            other => Err(TypesError::InvalidChannelWidth(other)),
        }
    }
}

impl TryFrom<u16> for ChannelWidth {
    type Error = TypesError;

    fn try_from(mhz: u16) -> Result<Self, Self::Error> {
        Self::from_mhz(mhz)
    }
}

impl fmt::Display for ChannelWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} MHz", self.mhz())
    }
}

/// Highest PHY generation a radio can decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModulationTier {
    /// Non-HT only, enough to exchange initial control frames
    #[default]
    Legacy,
    Ht,
    Vht,
    He,
    Eht,
}

impl ModulationTier {
    /// Parse a tier from its ordinal (0 = legacy .. 4 = EHT)
    pub fn from_ordinal(n: u8) -> Result<Self, TypesError> {
        match n {
            0 => Ok(ModulationTier::Legacy),
            1 => Ok(ModulationTier::Ht),
            2 => Ok(ModulationTier::Vht),
            3 => Ok(ModulationTier::He),
            4 => Ok(ModulationTier::Eht),
            other => Err(TypesError::InvalidModulationTier(other)),
        }
    }
}

/// Static capability profile of a radio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Capability {
    /// Whether the radio may start a transmission on its own
    pub can_transmit: bool,
    /// Widest channel the radio can operate on
    pub max_channel_width: ChannelWidth,
    /// Highest modulation the radio can decode
    pub modulation_tier: ModulationTier,
}

impl Capability {
    /// Profile of a fully capable main radio
    pub fn full(max_channel_width: ChannelWidth) -> Self {
        Self {
            can_transmit: true,
            max_channel_width,
            modulation_tier: ModulationTier::Eht,
        }
    }

    /// Profile of a listen-only auxiliary radio
    pub fn listen_only(max_channel_width: ChannelWidth) -> Self {
        Self {
            can_transmit: false,
            max_channel_width,
            modulation_tier: ModulationTier::Legacy,
        }
    }

    /// Whether this radio can run a full frame exchange on a link of the given width
    pub fn covers(&self, width: ChannelWidth) -> bool {
        self.can_transmit && self.max_channel_width >= width
    }
}

/// Details of an ongoing reception
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReceptionInfo {
    /// When the preamble was detected
    pub started_at: Timestamp,
    /// End of the PPDU, once known from the PHY header
    pub ends_at: Option<Timestamp>,
}

/// Momentary radio state as reported by the PHY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PhyState {
    Idle,
    Transmitting,
    Receiving(ReceptionInfo),
    /// Medium sensed busy but nothing being decoded
    ChannelBusy,
}

impl PhyState {
    /// Whether the radio is in the middle of a frame exchange
    pub fn is_busy_exchanging(&self) -> bool {
        matches!(self, PhyState::Transmitting | PhyState::Receiving(_))
    }
}

/// Operating state of a radio as seen by the coordinator
///
/// The coordinator tracks switching itself; every other state is the PHY's
/// latest report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingState {
    Idle,
    Transmitting,
    Receiving(ReceptionInfo),
    ChannelBusy,
    Switching(SwitchInfo),
}

impl From<PhyState> for OperatingState {
    fn from(state: PhyState) -> Self {
        match state {
            PhyState::Idle => OperatingState::Idle,
            PhyState::Transmitting => OperatingState::Transmitting,
            PhyState::Receiving(info) => OperatingState::Receiving(info),
            PhyState::ChannelBusy => OperatingState::ChannelBusy,
        }
    }
}

impl OperatingState {
    /// Switch details if the radio is switching
    pub fn switch_info(&self) -> Option<&SwitchInfo> {
        match self {
            OperatingState::Switching(info) => Some(info),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_width_parse() {
        assert_eq!(ChannelWidth::from_mhz(80), Ok(ChannelWidth::Mhz80));
        assert_eq!(
            ChannelWidth::try_from(60),
            Err(TypesError::InvalidChannelWidth(60))
        );
        assert!(ChannelWidth::Mhz20 < ChannelWidth::Mhz320);
    }

    #[test]
    fn test_capability_covers() {
        let main = Capability::full(ChannelWidth::Mhz160);
        assert!(main.covers(ChannelWidth::Mhz80));
        assert!(!main.covers(ChannelWidth::Mhz320));

        let aux = Capability::listen_only(ChannelWidth::Mhz20);
        assert!(!aux.covers(ChannelWidth::Mhz20));

        let tx_aux = Capability {
            can_transmit: true,
            ..aux
        };
        assert!(tx_aux.covers(ChannelWidth::Mhz20));
        assert!(!tx_aux.covers(ChannelWidth::Mhz40));
    }

    #[test]
    fn test_modulation_tier_ordinal() {
        assert_eq!(ModulationTier::from_ordinal(4), Ok(ModulationTier::Eht));
        assert!(ModulationTier::from_ordinal(9).is_err());
    }
}

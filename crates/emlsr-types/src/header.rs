//! Partially decoded MAC header
//!
//! The PHY can hand up the first few fields of a MAC header before the
//! PPDU ends. That is enough to tell who the frame is for, whether it
//! expects a response and how long the medium stays occupied.

use std::time::Duration;

/// Frame class, as far as the coordinator cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameKind {
    /// MU-RTS / BSRP style trigger opening a frame exchange
    InitialControl,
    Data,
    Management,
    Control,
}

/// Fields peeked from an in-flight frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PartialHeader {
    pub kind: FrameKind,
    /// Receiver address matches this device
    pub addressed_to_us: bool,
    /// Frame expects an immediate response from the receiver
    pub solicits_response: bool,
    /// Time from the peek until the end of the PPDU
    pub remaining: Duration,
}

impl PartialHeader {
    /// Initial control frame addressed to this device
    pub fn initial_control(remaining: Duration) -> Self {
        Self {
            kind: FrameKind::InitialControl,
            addressed_to_us: true,
            solicits_response: true,
            remaining,
        }
    }

    /// Frame addressed to another station
    pub fn other_station(kind: FrameKind, remaining: Duration) -> Self {
        Self {
            kind,
            addressed_to_us: false,
            solicits_response: false,
            remaining,
        }
    }

    /// Whether this device must answer the frame
    pub fn needs_answer(&self) -> bool {
        self.addressed_to_us && self.solicits_response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_answer() {
        assert!(PartialHeader::initial_control(Duration::from_micros(40)).needs_answer());
        assert!(!PartialHeader::other_station(FrameKind::Data, Duration::ZERO).needs_answer());

        let broadcast = PartialHeader {
            kind: FrameKind::Management,
            addressed_to_us: true,
            solicits_response: false,
            remaining: Duration::from_micros(100),
        };
        assert!(!broadcast.needs_answer());
    }
}

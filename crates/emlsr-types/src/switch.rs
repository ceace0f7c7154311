//! In-flight channel switch description

use std::fmt;
use std::time::Duration;

use crate::link::LinkId;
use crate::time::Timestamp;

/// Monotonic identifier of a switch, unique per coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwitchId(pub u64);

/// EDCA access category, lowest to highest priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessCategory {
    Background,
    #[default]
    BestEffort,
    Video,
    Voice,
}

/// Why a radio is switching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SwitchPurpose {
    /// Going to the destination to contend for or start a transmission
    Access { category: AccessCategory },
    /// Going to the destination to answer a frame announced there
    Reception,
    /// Going home to the preferred link
    ReturnToPreferred,
}

impl SwitchPurpose {
    /// Ordering used to decide whether a new trigger may redirect a switch
    pub fn rank(&self) -> u8 {
        match self {
            SwitchPurpose::ReturnToPreferred => 0,
            SwitchPurpose::Access { category } => 1 + *category as u8,
            SwitchPurpose::Reception => 5,
        }
    }

    /// Whether `self` is urgent enough to redirect a switch made for `other`
    pub fn outranks(&self, other: &SwitchPurpose) -> bool {
        self.rank() > other.rank()
    }
}

/// State attached to a radio while it is switching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwitchInfo {
    pub id: SwitchId,
    /// Link the radio left, `None` if it was already disconnected
    pub from_link: Option<LinkId>,
    pub to_link: Option<LinkId>,
    /// When the switch (or its latest redirection) started
    pub start_time: Timestamp,
    pub expected_end_time: Timestamp,
    /// Whether the switch may be aborted and redirected before completion
    pub interruptible: bool,
    pub purpose: SwitchPurpose,
}

impl SwitchInfo {
    /// Fixed duration of this switch
    pub fn duration(&self) -> Duration {
        self.expected_end_time - self.start_time
    }

    /// Time left until completion
    pub fn remaining(&self, now: Timestamp) -> Duration {
        self.expected_end_time.saturating_since(now)
    }

    /// Whether the switch targets `link`
    pub fn is_heading_to(&self, link: LinkId) -> bool {
        self.to_link == Some(link)
    }
}

impl fmt::Display for SwitchInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |l: Option<LinkId>| l.map_or_else(|| "-".to_string(), |l| l.to_string());
        write!(
            f,
            "switch#{} {} -> {} [{}..{}]",
            self.id.0,
            show(self.from_link),
            show(self.to_link),
            self.start_time,
            self.expected_end_time
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purpose_ranking() {
        let back = SwitchPurpose::ReturnToPreferred;
        let be = SwitchPurpose::Access {
            category: AccessCategory::BestEffort,
        };
        let vo = SwitchPurpose::Access {
            category: AccessCategory::Voice,
        };
        assert!(be.outranks(&back));
        assert!(vo.outranks(&be));
        assert!(!be.outranks(&be));
        assert!(SwitchPurpose::Reception.outranks(&vo));
    }

    #[test]
    fn test_duration_and_remaining() {
        let info = SwitchInfo {
            id: SwitchId(1),
            from_link: Some(LinkId(0)),
            to_link: Some(LinkId(2)),
            start_time: Timestamp::from_micros(100),
            expected_end_time: Timestamp::from_micros(164),
            interruptible: true,
            purpose: SwitchPurpose::ReturnToPreferred,
        };
        assert_eq!(info.duration(), Duration::from_micros(64));
        assert_eq!(
            info.remaining(Timestamp::from_micros(132)),
            Duration::from_micros(32)
        );
        assert_eq!(info.remaining(Timestamp::from_micros(200)), Duration::ZERO);
        assert_eq!(info.to_string(), "switch#1 link0 -> link2 [100us..164us]");
    }
}

//! Scenario files
//!
//! A scenario is a coordinator config plus a time-ordered script of actions,
//! stored as JSON:
//!
//! ```json
//! {
//!   "script": [
//!     { "at_us": 0,   "action": "request_access", "link": 2 },
//!     { "at_us": 500, "action": "opportunity_ended", "link": 2 }
//!   ],
//!   "run_until_us": 2000
//! }
//! ```
//!
//! Times are plain microsecond integers so files stay readable.

use std::time::Duration;

use emlsr_mux::CoordinatorConfig;
use emlsr_types::{
    AccessCategory, ChannelWidth, FrameKind, LinkId, MediumSnapshot, PartialHeader, PhyState,
    RadioId, ReceptionInfo, SwitchPurpose, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// How long a scenario keeps running after its last step when no end is given
const DEFAULT_TAIL_US: u64 = 10_000;

/// Radio activity a script can set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Idle,
    Transmitting,
    Receiving,
    ChannelBusy,
}

impl Activity {
    /// PHY state for this activity starting at `now`
    pub fn to_phy_state(self, now: Timestamp) -> PhyState {
        match self {
            Activity::Idle => PhyState::Idle,
            Activity::Transmitting => PhyState::Transmitting,
            Activity::Receiving => PhyState::Receiving(ReceptionInfo {
                started_at: now,
                ends_at: None,
            }),
            Activity::ChannelBusy => PhyState::ChannelBusy,
        }
    }
}

/// Peeked header fields as written in a script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSpec {
    pub kind: FrameKind,
    pub addressed_to_us: bool,
    pub solicits_response: bool,
    /// Time until the end of the frame (microseconds)
    pub remaining_us: u64,
}

impl HeaderSpec {
    pub fn to_header(self) -> PartialHeader {
        PartialHeader {
            kind: self.kind,
            addressed_to_us: self.addressed_to_us,
            solicits_response: self.solicits_response,
            remaining: Duration::from_micros(self.remaining_us),
        }
    }
}

/// CCA busy indication as written in a script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CcaSpec {
    pub width: ChannelWidth,
    pub until_us: u64,
}

/// One thing a script does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    RequestAccess {
        link: LinkId,
        #[serde(default)]
        category: AccessCategory,
    },
    IncomingFrame {
        link: LinkId,
        #[serde(default)]
        header: Option<HeaderSpec>,
    },
    OpportunityEnded {
        link: LinkId,
    },
    SetActivity {
        radio: RadioId,
        activity: Activity,
    },
    SetMedium {
        link: LinkId,
        #[serde(default)]
        nav_until_us: Option<u64>,
        #[serde(default)]
        cca_busy: Vec<CcaSpec>,
    },
    EnableLinks {
        links: Vec<LinkId>,
    },
    DisableLinks {
        links: Vec<LinkId>,
    },
    NegotiationComplete {
        links: Vec<LinkId>,
        enable: bool,
    },
    SwitchRadio {
        radio: RadioId,
        link: LinkId,
        purpose: SwitchPurpose,
    },
}

impl Action {
    /// Medium snapshot described by a `SetMedium` action
    pub(crate) fn medium(nav_until_us: Option<u64>, cca_busy: &[CcaSpec]) -> MediumSnapshot {
        let mut medium = MediumSnapshot::idle();
        if let Some(us) = nav_until_us {
            medium = medium.with_nav_until(Timestamp::from_micros(us));
        }
        for cca in cca_busy {
            medium = medium.with_cca_busy(cca.width, Timestamp::from_micros(cca.until_us));
        }
        medium
    }
}

/// An action at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStep {
    pub at_us: u64,
    #[serde(flatten)]
    pub action: Action,
}

impl ScriptStep {
    pub fn at(&self) -> Timestamp {
        Timestamp::from_micros(self.at_us)
    }
}

/// Config plus script
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScenarioFile {
    #[serde(default)]
    pub config: CoordinatorConfig,
    #[serde(default)]
    pub script: Vec<ScriptStep>,
    /// End of the run; defaults to a short tail after the last step
    #[serde(default)]
    pub run_until_us: Option<u64>,
}

impl ScenarioFile {
    /// Parse and validate a scenario
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let file: ScenarioFile = serde_json::from_str(json)?;
        file.validate()?;
        Ok(file)
    }

    /// Check the config and the script order
    pub fn validate(&self) -> Result<(), SimError> {
        self.config.validate()?;
        for (index, pair) in self.script.windows(2).enumerate() {
            if pair[1].at_us < pair[0].at_us {
                return Err(SimError::UnsortedScript {
                    index: index + 1,
                    at_us: pair[1].at_us,
                });
            }
        }
        Ok(())
    }

    /// Time at which the run stops
    pub fn end_time(&self) -> Timestamp {
        let end = self.run_until_us.unwrap_or_else(|| {
            self.script.last().map_or(0, |s| s.at_us) + DEFAULT_TAIL_US
        });
        Timestamp::from_micros(end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_scenario() {
        let json = r#"{
            "script": [
                { "at_us": 0, "action": "request_access", "link": 2 },
                { "at_us": 10, "action": "request_access", "link": 1, "category": "Voice" },
                { "at_us": 500, "action": "opportunity_ended", "link": 1 }
            ]
        }"#;
        let file = ScenarioFile::from_json(json).unwrap();
        assert_eq!(file.config, CoordinatorConfig::default());
        assert_eq!(
            file.script[0].action,
            Action::RequestAccess {
                link: LinkId(2),
                category: AccessCategory::BestEffort
            }
        );
        assert_eq!(
            file.script[1].action,
            Action::RequestAccess {
                link: LinkId(1),
                category: AccessCategory::Voice
            }
        );
        assert_eq!(file.end_time(), Timestamp::from_micros(10_500));
    }

    #[test]
    fn test_unsorted_script_rejected() {
        let json = r#"{
            "script": [
                { "at_us": 100, "action": "opportunity_ended", "link": 1 },
                { "at_us": 50, "action": "opportunity_ended", "link": 1 }
            ]
        }"#;
        assert!(matches!(
            ScenarioFile::from_json(json),
            Err(SimError::UnsortedScript { index: 1, at_us: 50 })
        ));
    }

    #[test]
    fn test_header_and_medium_actions() {
        let json = r#"{
            "script": [
                { "at_us": 0, "action": "set_medium", "link": 2, "nav_until_us": 80,
                  "cca_busy": [{ "width": "Mhz20", "until_us": 40 }] },
                { "at_us": 5, "action": "incoming_frame", "link": 1,
                  "header": { "kind": "InitialControl", "addressed_to_us": true,
                              "solicits_response": true, "remaining_us": 30 } }
            ],
            "run_until_us": 1000
        }"#;
        let file = ScenarioFile::from_json(json).unwrap();
        let Action::IncomingFrame { header: Some(h), .. } = &file.script[1].action else {
            panic!("expected an incoming frame");
        };
        assert!(h.to_header().needs_answer());

        let Action::SetMedium { nav_until_us, cca_busy, .. } = &file.script[0].action else {
            panic!("expected a medium update");
        };
        let medium = Action::medium(*nav_until_us, cca_busy);
        assert_eq!(medium.nav_until, Some(Timestamp::from_micros(80)));
        assert_eq!(
            medium.cca_busy_until(ChannelWidth::Mhz80),
            Some(Timestamp::from_micros(40))
        );
    }

    #[test]
    fn test_bad_config_rejected() {
        let mut file = ScenarioFile::default();
        file.config.timers.transition_delay_us = 0;
        assert!(matches!(file.validate(), Err(SimError::Config(_))));
    }
}

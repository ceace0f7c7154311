//! EMLSR Coordinator Simulation Library
//!
//! This crate runs the switch coordinator on virtual time, without a real
//! PHY or wall clock. It includes:
//!
//! - **VirtualScheduler**: deterministic event queue, FIFO at equal instants
//! - **SimPhy**: scriptable radio activity and link medium state
//! - **Simulation**: drives both and records a timestamped event trace
//! - **ScenarioFile**: JSON config plus a time-ordered action script
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use emlsr_mux::{CoordinatorConfig, CoordinatorEvent};
//! use emlsr_sim::Simulation;
//! use emlsr_types::LinkId;
//!
//! let mut sim = Simulation::new(CoordinatorConfig::default()).unwrap();
//!
//! // Transmit opportunity on a link the main radio is not on
//! let outcome = sim.trigger(|c| c.request_access(LinkId(2))).unwrap();
//! assert!(outcome.switch_info().is_some());
//!
//! sim.advance(Duration::from_micros(100));
//! for entry in sim.trace() {
//!     println!("[{}] {:?}", entry.at, entry.event);
//! }
//! assert!(sim
//!     .trace()
//!     .iter()
//!     .any(|e| matches!(e.event, CoordinatorEvent::SwitchCompleted { .. })));
//! ```

pub mod clock;
pub mod error;
pub mod phy;
pub mod script;
pub mod simulation;

pub use clock::VirtualScheduler;
pub use error::SimError;
pub use phy::{SimPhy, SwitchCommand};
pub use script::{Action, Activity, CcaSpec, HeaderSpec, ScenarioFile, ScriptStep};
pub use simulation::{ActionOutcome, SimCoordinator, Simulation, StepReport, TraceEntry};

//! Simulation driver
//!
//! Couples a [`Coordinator`] with the virtual clock and the simulated PHY,
//! delivers scheduled events in order and keeps a timestamped trace of
//! everything the coordinator reported.

use std::time::Duration;

use emlsr_mux::{
    AccessOutcome, ConfigError, Coordinator, CoordinatorConfig, CoordinatorError,
    CoordinatorEvent, FrameDecision, RadioNotification, Scheduler,
};
use emlsr_types::{SwitchInfo, Timestamp};
use tracing::{debug, info};

use crate::clock::VirtualScheduler;
use crate::phy::SimPhy;
use crate::script::{Action, Activity, ScriptStep};

/// Coordinator running on simulated collaborators
pub type SimCoordinator = Coordinator<SimPhy, VirtualScheduler>;

/// A coordinator event and when it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub at: Timestamp,
    pub event: CoordinatorEvent,
}

/// What an applied action returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Access(AccessOutcome),
    Frame(FrameDecision),
    Switch(SwitchInfo),
    /// Negotiated change takes effect at this time
    TransitionAt(Timestamp),
    /// PHY notification handled, with the frame decision it led to if any
    Notified(Option<FrameDecision>),
    Applied,
}

/// Result of one script step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub at: Timestamp,
    pub action: Action,
    pub outcome: Result<ActionOutcome, CoordinatorError>,
}

/// Deterministic simulation
pub struct Simulation {
    coordinator: SimCoordinator,
    trace: Vec<TraceEntry>,
}

impl Simulation {
    /// Create a simulation at time zero
    pub fn new(config: CoordinatorConfig) -> Result<Self, ConfigError> {
        let coordinator = Coordinator::new(config, SimPhy::new(), VirtualScheduler::new())?;
        Ok(Self {
            coordinator,
            trace: Vec::new(),
        })
    }

    /// Get the coordinator
    pub fn coordinator(&self) -> &SimCoordinator {
        &self.coordinator
    }

    /// Get the simulated PHY mutably
    pub fn phy_mut(&mut self) -> &mut SimPhy {
        self.coordinator.phy_mut()
    }

    /// Current virtual time
    pub fn now(&self) -> Timestamp {
        self.coordinator.now()
    }

    /// Call into the coordinator and record the events it produced
    pub fn trigger<R>(&mut self, f: impl FnOnce(&mut SimCoordinator) -> R) -> R {
        let result = f(&mut self.coordinator);
        self.collect();
        result
    }

    /// Deliver every event due up to `until` and move the clock there
    ///
    /// Returns the number of events delivered.
    pub fn run_until(&mut self, until: Timestamp) -> usize {
        let mut delivered = 0;
        while let Some((at, event)) = self.coordinator.scheduler_mut().pop_due(until) {
            debug!("[{}] {:?}", at, event);
            self.coordinator.handle_scheduled(event);
            self.collect();
            delivered += 1;
        }
        self.coordinator.scheduler_mut().advance_to(until);
        delivered
    }

    /// Run for `by` from the current time
    pub fn advance(&mut self, by: Duration) -> usize {
        let until = self.now().saturating_add(by);
        self.run_until(until)
    }

    /// Apply one script action at the current time
    pub fn apply(&mut self, action: &Action) -> Result<ActionOutcome, CoordinatorError> {
        let now = self.now();
        match action {
            Action::RequestAccess { link, category } => self
                .trigger(|c| c.request_access_with_priority(*link, *category))
                .map(ActionOutcome::Access),
            Action::IncomingFrame { link, header } => {
                let header = header.as_ref().map(|h| h.to_header());
                self.trigger(|c| c.notify_incoming_frame(*link, header))
                    .map(ActionOutcome::Frame)
            }
            Action::OpportunityEnded { link } => self
                .trigger(|c| c.notify_opportunity_ended(*link))
                .map(|()| ActionOutcome::Applied),
            Action::SetActivity { radio, activity } => {
                let state = activity.to_phy_state(now);
                self.phy_mut().set_radio_state(*radio, state);
                let notification = match activity {
                    Activity::Idle => Some(RadioNotification::BecameIdle),
                    Activity::Receiving => Some(RadioNotification::ReceptionStarted),
                    Activity::Transmitting | Activity::ChannelBusy => None,
                };
                match notification {
                    Some(n) => self
                        .trigger(|c| c.on_radio_state_changed(*radio, n))
                        .map(ActionOutcome::Notified),
                    None => Ok(ActionOutcome::Applied),
                }
            }
            Action::SetMedium {
                link,
                nav_until_us,
                cca_busy,
            } => {
                let medium = Action::medium(*nav_until_us, cca_busy);
                self.phy_mut().set_medium(*link, medium);
                Ok(ActionOutcome::Applied)
            }
            Action::EnableLinks { links } => self
                .trigger(|c| c.enable_links(links))
                .map(|()| ActionOutcome::Applied),
            Action::DisableLinks { links } => self
                .trigger(|c| c.disable_links(links))
                .map(|()| ActionOutcome::Applied),
            Action::NegotiationComplete { links, enable } => self
                .trigger(|c| c.notify_negotiation_complete(links, *enable))
                .map(ActionOutcome::TransitionAt),
            Action::SwitchRadio {
                radio,
                link,
                purpose,
            } => self
                .trigger(|c| c.switch_radio(*radio, *link, *purpose))
                .map(ActionOutcome::Switch),
        }
    }

    /// Run a time-ordered script
    pub fn run_script(&mut self, steps: &[ScriptStep]) -> Vec<StepReport> {
        let mut reports = Vec::with_capacity(steps.len());
        for step in steps {
            self.run_until(step.at());
            let outcome = self.apply(&step.action);
            info!("[{}] {:?} -> {:?}", self.now(), step.action, outcome);
            reports.push(StepReport {
                at: self.now(),
                action: step.action.clone(),
                outcome,
            });
        }
        reports
    }

    /// Events recorded so far
    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// Take the recorded events, leaving the trace empty
    pub fn take_trace(&mut self) -> Vec<TraceEntry> {
        std::mem::take(&mut self.trace)
    }

    fn collect(&mut self) {
        let at = self.coordinator.now();
        self.trace.extend(
            self.coordinator
                .drain_events()
                .into_iter()
                .map(|event| TraceEntry { at, event }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emlsr_types::{LinkId, RadioId};

    #[test]
    fn test_run_until_moves_clock() {
        let mut sim = Simulation::new(CoordinatorConfig::default()).unwrap();
        assert_eq!(sim.run_until(Timestamp::from_micros(500)), 0);
        assert_eq!(sim.now(), Timestamp::from_micros(500));
    }

    #[test]
    fn test_trace_stamped_with_delivery_time() {
        let mut sim = Simulation::new(CoordinatorConfig::default()).unwrap();
        sim.trigger(|c| c.request_access(LinkId(2))).unwrap();
        sim.advance(Duration::from_micros(100));

        let completed = sim
            .trace()
            .iter()
            .find(|e| matches!(e.event, CoordinatorEvent::SwitchCompleted { .. }))
            .unwrap();
        assert_eq!(completed.at, Timestamp::from_micros(64));
        assert_eq!(completed.event.radio(), Some(RadioId(0)));
    }

    #[test]
    fn test_set_activity_notifies() {
        let mut sim = Simulation::new(CoordinatorConfig::default()).unwrap();
        let outcome = sim
            .apply(&Action::SetActivity {
                radio: RadioId(1),
                activity: Activity::Receiving,
            })
            .unwrap();
        // No header peeked: nothing to answer
        assert!(matches!(outcome, ActionOutcome::Notified(Some(FrameDecision::Ignored(_)))));
        assert_eq!(sim.coordinator().scheduler().pending(), 0);
    }
}

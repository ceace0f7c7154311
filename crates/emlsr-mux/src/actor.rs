//! Coordinator Actor
//!
//! Async front end that owns a [`Coordinator`] and serialises every trigger
//! through a command channel. Scheduled work runs on tokio timers and is fed
//! back into the same loop, so the coordinator itself stays single-threaded.
//!
//! # Example
//!
//! ```rust,ignore
//! use emlsr_mux::actor::{run_coordinator_actor, CoordinatorCommand};
//! use emlsr_mux::CoordinatorConfig;
//! use tokio::sync::{mpsc, oneshot};
//!
//! let (cmd_tx, cmd_rx) = mpsc::channel(256);
//! let (event_tx, mut event_rx) = mpsc::channel(256);
//!
//! tokio::spawn(run_coordinator_actor(CoordinatorConfig::default(), phy, cmd_rx, event_tx));
//!
//! let (response, rx) = oneshot::channel();
//! cmd_tx.send(CoordinatorCommand::RequestAccess { link, category, response }).await?;
//! let outcome = rx.await?;
//! ```

use std::collections::HashMap;

use emlsr_types::{
    AccessCategory, LinkId, OperatingState, PartialHeader, RadioId, SwitchInfo, SwitchPurpose,
    Timestamp,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, info, warn};

use crate::engine::{Coordinator, CoordinatorConfig};
use crate::error::{ConfigError, CoordinatorError};
use crate::events::{AccessOutcome, CoordinatorEvent, FrameDecision};
use crate::platform::{EventHandle, PhyInterface, RadioNotification, ScheduledEvent, Scheduler};

type Reply<T> = oneshot::Sender<Result<T, CoordinatorError>>;

/// Commands sent to the coordinator actor
#[derive(Debug)]
pub enum CoordinatorCommand {
    /// Transmit opportunity on a link
    RequestAccess {
        link: LinkId,
        category: AccessCategory,
        response: Reply<AccessOutcome>,
    },

    /// Frame arriving on a link
    IncomingFrame {
        link: LinkId,
        /// Peeked MAC header fields, if available
        header: Option<PartialHeader>,
        response: Reply<FrameDecision>,
    },

    /// Opportunity on a link ended
    OpportunityEnded { link: LinkId },

    /// Notification pushed by the PHY
    RadioStateChanged {
        radio: RadioId,
        notification: RadioNotification,
    },

    /// Enable coordination on links
    EnableLinks {
        links: Vec<LinkId>,
        response: Reply<()>,
    },

    /// Disable coordination on links
    DisableLinks {
        links: Vec<LinkId>,
        response: Reply<()>,
    },

    /// Capability negotiation finished; returns when it takes effect
    NegotiationComplete {
        links: Vec<LinkId>,
        enable: bool,
        response: Reply<Timestamp>,
    },

    /// Explicit switch command
    SwitchRadio {
        radio: RadioId,
        link: LinkId,
        purpose: SwitchPurpose,
        response: Reply<SwitchInfo>,
    },

    /// Query a radio's operating state
    QueryRadioState {
        radio: RadioId,
        response: Reply<OperatingState>,
    },

    /// Query the running medium sync delay of a link
    QueryMediumSyncElapsed {
        link: LinkId,
        response: Reply<Option<Duration>>,
    },

    /// Query the radio to link assignments
    QueryBinding {
        response: oneshot::Sender<Vec<(RadioId, LinkId)>>,
    },

    /// Shutdown the actor
    Shutdown,
}

/// Scheduler backed by tokio timers
///
/// Each scheduled event is a sleeping task that posts the event back to the
/// actor when it wakes. Cancelling aborts the task; an event that was already
/// posted is discarded by [`TokioScheduler::claim`].
#[derive(Debug)]
pub struct TokioScheduler {
    epoch: Instant,
    next_id: u64,
    tasks: HashMap<EventHandle, JoinHandle<()>>,
    fired_tx: mpsc::UnboundedSender<(EventHandle, ScheduledEvent)>,
}

impl TokioScheduler {
    /// Create a scheduler and the receiver its events arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(EventHandle, ScheduledEvent)>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            epoch: Instant::now(),
            next_id: 0,
            tasks: HashMap::new(),
            fired_tx,
        };
        (scheduler, fired_rx)
    }

    /// Take ownership of a delivered event
    ///
    /// Returns false if the event was cancelled after its task posted it.
    pub fn claim(&mut self, handle: EventHandle) -> bool {
        self.tasks.remove(&handle).is_some()
    }

    /// Number of events not yet delivered
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> Timestamp {
        Timestamp::from_offset(self.epoch.elapsed())
    }

    fn schedule_after(&mut self, delay: Duration, event: ScheduledEvent) -> EventHandle {
        self.next_id += 1;
        let handle = EventHandle(self.next_id);
        let deadline = Instant::now() + delay;
        let tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            sleep_until(deadline).await;
            let _ = tx.send((handle, event));
        });
        self.tasks.insert(handle, task);
        handle
    }

    fn cancel(&mut self, handle: EventHandle) -> bool {
        match self.tasks.remove(&handle) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

/// Apply one command; returns false on shutdown
fn handle_command<P: PhyInterface>(
    coordinator: &mut Coordinator<P, TokioScheduler>,
    cmd: CoordinatorCommand,
) -> bool {
    match cmd {
        CoordinatorCommand::RequestAccess {
            link,
            category,
            response,
        } => {
            let _ = response.send(coordinator.request_access_with_priority(link, category));
        }

        CoordinatorCommand::IncomingFrame {
            link,
            header,
            response,
        } => {
            let _ = response.send(coordinator.notify_incoming_frame(link, header));
        }

        CoordinatorCommand::OpportunityEnded { link } => {
            if let Err(e) = coordinator.notify_opportunity_ended(link) {
                warn!("Opportunity end on {} rejected: {}", link, e);
            }
        }

        CoordinatorCommand::RadioStateChanged {
            radio,
            notification,
        } => match coordinator.on_radio_state_changed(radio, notification) {
            Ok(Some(decision)) => debug!("{} notification: {:?}", radio, decision),
            Ok(None) => {}
            Err(e) => warn!("Notification from {} rejected: {}", radio, e),
        },

        CoordinatorCommand::EnableLinks { links, response } => {
            let _ = response.send(coordinator.enable_links(&links));
        }

        CoordinatorCommand::DisableLinks { links, response } => {
            let _ = response.send(coordinator.disable_links(&links));
        }

        CoordinatorCommand::NegotiationComplete {
            links,
            enable,
            response,
        } => {
            let _ = response.send(coordinator.notify_negotiation_complete(&links, enable));
        }

        CoordinatorCommand::SwitchRadio {
            radio,
            link,
            purpose,
            response,
        } => {
            let _ = response.send(coordinator.switch_radio(radio, link, purpose));
        }

        CoordinatorCommand::QueryRadioState { radio, response } => {
            let _ = response.send(coordinator.radio_state(radio));
        }

        CoordinatorCommand::QueryMediumSyncElapsed { link, response } => {
            let _ = response.send(coordinator.elapsed_medium_sync_delay(link));
        }

        CoordinatorCommand::QueryBinding { response } => {
            let _ = response.send(coordinator.binding().pairs());
        }

        CoordinatorCommand::Shutdown => {
            info!("Coordinator actor shutting down");
            return false;
        }
    }
    true
}

/// Run the coordinator actor
///
/// Returns once `Shutdown` is received or every command sender is dropped.
/// Fails only if `config` does not validate.
pub async fn run_coordinator_actor<P>(
    config: CoordinatorConfig,
    phy: P,
    mut cmd_rx: mpsc::Receiver<CoordinatorCommand>,
    event_tx: mpsc::Sender<CoordinatorEvent>,
) -> Result<(), ConfigError>
where
    P: PhyInterface + Send + 'static,
{
    let (scheduler, mut fired_rx) = TokioScheduler::new();
    let mut coordinator = Coordinator::new(config, phy, scheduler)?;
    info!("Coordinator actor started");

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break; };
                if !handle_command(&mut coordinator, cmd) {
                    break;
                }
            }
            Some((handle, event)) = fired_rx.recv() => {
                if coordinator.scheduler_mut().claim(handle) {
                    coordinator.handle_scheduled(event);
                } else {
                    debug!("Dropping cancelled event {:?}", event);
                }
            }
        }

        for event in coordinator.drain_events() {
            let _ = event_tx.send(event).await;
        }
    }

    info!("Coordinator actor stopped");
    Ok(())
}

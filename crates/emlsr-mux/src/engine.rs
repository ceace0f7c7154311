//! Coordinator engine
//!
//! The core decision logic: which radio serves which link, when the main
//! radio switches, and how triggers interact with in-flight switches and
//! the timer set. Switch mechanics live in [`crate::switching`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::iter;
use std::time::Duration;

use emlsr_types::{
    AccessCategory, Capability, ChannelWidth, LinkId, MediumState, OperatingState, PartialHeader,
    RadioId, RadioRole, SwitchInfo, SwitchPurpose, Timestamp,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::admission::AdmissionChecker;
use crate::binding::BindingTable;
use crate::error::{ConfigError, CoordinatorError};
use crate::events::{
    AccessOutcome, CcaPolicy, CoordinatorEvent, DeferReason, FrameDecision, IgnoreReason,
};
use crate::platform::{PhyInterface, RadioNotification, ScheduledEvent, Scheduler};
use crate::state::{LinkConfig, LinkState, RadioConfig, RadioState};
use crate::timers::{ElapsedReason, Fired, MediumSyncDecision, TimerKind, TimerSet, Transition};

/// Upper bound for any configured delay (1 s)
const MAX_DELAY_US: u64 = 1_000_000;

/// Timer durations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Delay between negotiation and the enable/disable taking effect (us)
    pub transition_delay_us: u64,
    /// Nominal medium sync delay (us)
    pub medium_sync_duration_us: u64,
    /// Access attempts permitted while the medium sync delay runs
    pub medium_sync_max_attempts: u8,
    /// Elapsed time after which a medium sync delay no longer restricts access (us)
    pub medium_sync_max_elapsed_us: u64,
    /// Maximum dwell of the main radio on a non-preferred link (us)
    pub switch_back_delay_us: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            transition_delay_us: 128,
            medium_sync_duration_us: 5484,
            medium_sync_max_attempts: 1,
            medium_sync_max_elapsed_us: 5484,
            switch_back_delay_us: 1000,
        }
    }
}

impl TimerConfig {
    pub fn transition_delay(&self) -> Duration {
        Duration::from_micros(self.transition_delay_us)
    }

    pub fn medium_sync_duration(&self) -> Duration {
        Duration::from_micros(self.medium_sync_duration_us)
    }

    pub fn medium_sync_max_elapsed(&self) -> Duration {
        Duration::from_micros(self.medium_sync_max_elapsed_us)
    }

    pub fn switch_back_delay(&self) -> Duration {
        Duration::from_micros(self.switch_back_delay_us)
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// The fully capable radio
    pub main_radio: RadioConfig,
    /// One limited radio per extra link
    pub aux_radios: Vec<RadioConfig>,
    /// Links of the device
    pub links: Vec<LinkConfig>,
    /// Timer durations
    #[serde(default)]
    pub timers: TimerConfig,
    /// SIFS (us)
    pub sifs_us: u64,
    /// Slot time (us)
    pub slot_us: u64,
    /// Allow in-flight switches to be redirected
    pub interrupt_switch: bool,
    /// React to MAC header fields peeked before the end of a frame
    pub use_notified_header: bool,
    /// Run the last-PIFS admission check before access switches complete
    pub check_last_pifs: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let aux = |id: u8| RadioConfig {
            id: RadioId(id),
            capability: Capability::listen_only(ChannelWidth::Mhz20),
            switch_delay_us: 64,
            preferred_link: LinkId(id),
        };
        let link = |id: u8| LinkConfig {
            id: LinkId(id),
            channel_width: ChannelWidth::Mhz80,
            emlsr_enabled: true,
            switch_delay_us: None,
        };
        Self {
            main_radio: RadioConfig {
                id: RadioId(0),
                capability: Capability::full(ChannelWidth::Mhz160),
                switch_delay_us: 64,
                preferred_link: LinkId(0),
            },
            aux_radios: vec![aux(1), aux(2)],
            links: vec![link(0), link(1), link(2)],
            timers: TimerConfig::default(),
            sifs_us: 16,
            slot_us: 9,
            interrupt_switch: true,
            use_notified_header: true,
            check_last_pifs: true,
        }
    }
}

impl CoordinatorConfig {
    /// All radios, main first
    pub fn radios(&self) -> impl Iterator<Item = &RadioConfig> {
        iter::once(&self.main_radio).chain(self.aux_radios.iter())
    }

    pub fn sifs(&self) -> Duration {
        Duration::from_micros(self.sifs_us)
    }

    pub fn slot(&self) -> Duration {
        Duration::from_micros(self.slot_us)
    }

    /// Check ids, link preferences and delay bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut link_ids = BTreeSet::new();
        for link in &self.links {
            if !link_ids.insert(link.id) {
                return Err(ConfigError::DuplicateLink(link.id));
            }
            if let Some(us) = link.switch_delay_us {
                check_range("links.switch_delay_us", us)?;
            }
        }

        let mut radio_ids = BTreeSet::new();
        let mut preferred = BTreeSet::new();
        for radio in self.radios() {
            if !radio_ids.insert(radio.id) {
                return Err(ConfigError::DuplicateRadio(radio.id));
            }
            if !link_ids.contains(&radio.preferred_link) {
                return Err(ConfigError::UnknownPreferredLink {
                    radio: radio.id,
                    link: radio.preferred_link,
                });
            }
            if !preferred.insert(radio.preferred_link) {
                return Err(ConfigError::PreferredLinkTaken {
                    link: radio.preferred_link,
                });
            }
            if radio.switch_delay_us == 0 || radio.switch_delay_us > MAX_DELAY_US {
                return Err(ConfigError::SwitchDelayOutOfRange {
                    radio: radio.id,
                    delay_us: radio.switch_delay_us,
                });
            }
        }
        if let Some(orphan) = link_ids.difference(&preferred).next() {
            return Err(ConfigError::NoPreferredRadio(*orphan));
        }
        if !self.main_radio.capability.can_transmit {
            return Err(ConfigError::MainCannotTransmit(self.main_radio.id));
        }

        let t = &self.timers;
        check_range("timers.transition_delay_us", t.transition_delay_us)?;
        check_range("timers.medium_sync_duration_us", t.medium_sync_duration_us)?;
        check_range("timers.medium_sync_max_elapsed_us", t.medium_sync_max_elapsed_us)?;
        check_range("timers.switch_back_delay_us", t.switch_back_delay_us)?;
        check_range("sifs_us", self.sifs_us)?;
        check_range("slot_us", self.slot_us)?;
        Ok(())
    }
}

fn check_range(name: &'static str, value_us: u64) -> Result<(), ConfigError> {
    if value_us == 0 || value_us > MAX_DELAY_US {
        return Err(ConfigError::TimerOutOfRange { name, value_us });
    }
    Ok(())
}

/// The switch coordinator
///
/// Owns the binding table and timer set. Every trigger returns immediately;
/// anything that has to happen later is registered on the scheduler and
/// comes back through [`Coordinator::handle_scheduled`].
pub struct Coordinator<P, S> {
    pub(crate) config: CoordinatorConfig,
    pub(crate) phy: P,
    pub(crate) scheduler: S,
    pub(crate) main: RadioId,
    pub(crate) radios: HashMap<RadioId, RadioState>,
    pub(crate) links: BTreeMap<LinkId, LinkState>,
    pub(crate) binding: BindingTable,
    pub(crate) timers: TimerSet,
    pub(crate) admission: AdmissionChecker,
    pub(crate) next_switch_id: u64,
    /// Switch-back that fired while the main radio was still exchanging frames
    pub(crate) held_return: Option<ElapsedReason>,
    pub(crate) event_buffer: Vec<CoordinatorEvent>,
}

impl<P: PhyInterface, S: Scheduler> Coordinator<P, S> {
    /// Build a coordinator with every radio bound to its preferred link
    pub fn new(config: CoordinatorConfig, phy: P, scheduler: S) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut radios = HashMap::new();
        radios.insert(
            config.main_radio.id,
            RadioState::new(&config.main_radio, RadioRole::Main),
        );
        for aux in &config.aux_radios {
            radios.insert(aux.id, RadioState::new(aux, RadioRole::Auxiliary));
        }

        let mut links = BTreeMap::new();
        for link in &config.links {
            let preferred = config
                .radios()
                .find(|r| r.preferred_link == link.id)
                .map(|r| r.id)
                .ok_or(ConfigError::NoPreferredRadio(link.id))?;
            links.insert(link.id, LinkState::new(link, preferred));
        }

        let mut binding = BindingTable::new();
        for radio in config.radios() {
            binding
                .bind(radio.id, radio.preferred_link)
                .map_err(|_| ConfigError::PreferredLinkTaken {
                    link: radio.preferred_link,
                })?;
        }

        info!(
            "Coordinator ready: main {} on {}, {} aux radios, {} links",
            config.main_radio.id,
            config.main_radio.preferred_link,
            config.aux_radios.len(),
            links.len()
        );

        Ok(Self {
            main: config.main_radio.id,
            admission: AdmissionChecker::new(config.sifs(), config.slot()),
            config,
            phy,
            scheduler,
            radios,
            links,
            binding,
            timers: TimerSet::new(),
            next_switch_id: 0,
            held_return: None,
            event_buffer: Vec::new(),
        })
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Get the configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Get the PHY collaborator
    pub fn phy(&self) -> &P {
        &self.phy
    }

    /// Get the PHY collaborator mutably
    pub fn phy_mut(&mut self) -> &mut P {
        &mut self.phy
    }

    /// Get the scheduler
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Get the scheduler mutably
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Current virtual time
    pub fn now(&self) -> Timestamp {
        self.scheduler.now()
    }

    /// Id of the main radio
    pub fn main_radio(&self) -> RadioId {
        self.main
    }

    /// Get a radio's state
    pub fn radio(&self, radio: RadioId) -> Option<&RadioState> {
        self.radios.get(&radio)
    }

    /// Iterate over all radios
    pub fn radios(&self) -> impl Iterator<Item = &RadioState> {
        self.radios.values()
    }

    /// Get a link's state
    pub fn link(&self, link: LinkId) -> Option<&LinkState> {
        self.links.get(&link)
    }

    /// Iterate over all links in id order
    pub fn links(&self) -> impl Iterator<Item = &LinkState> {
        self.links.values()
    }

    /// Radio to link assignments
    pub fn binding(&self) -> &BindingTable {
        &self.binding
    }

    /// Timer set
    pub fn timers(&self) -> &TimerSet {
        &self.timers
    }

    pub(crate) fn radio_entry(&self, radio: RadioId) -> Result<&RadioState, CoordinatorError> {
        self.radios
            .get(&radio)
            .ok_or(CoordinatorError::UnknownRadio(radio))
    }

    pub(crate) fn link_state(&self, link: LinkId) -> Result<&LinkState, CoordinatorError> {
        self.links.get(&link).ok_or(CoordinatorError::UnknownLink(link))
    }

    /// Operating state of a radio
    pub fn radio_state(&self, radio: RadioId) -> Result<OperatingState, CoordinatorError> {
        let state = self.radio_entry(radio)?;
        Ok(match state.switch {
            Some(active) => OperatingState::Switching(active.info),
            None => self.phy.radio_state(radio).into(),
        })
    }

    /// Medium state of a link at the current instant, over its full width
    pub fn link_medium_state(&self, link: LinkId) -> Result<MediumState, CoordinatorError> {
        let width = self.link_state(link)?.channel_width;
        Ok(self
            .phy
            .link_medium_state(link)
            .state_at(self.now(), width))
    }

    /// Time since the medium sync delay of `link` was armed, if it is running
    pub fn elapsed_medium_sync_delay(
        &self,
        link: LinkId,
    ) -> Result<Option<Duration>, CoordinatorError> {
        self.link_state(link)?;
        Ok(self
            .timers
            .elapsed(TimerKind::MediumSyncDelay(link), self.now()))
    }

    /// Run the last-PIFS check for a transmission on `link` at `planned_start`
    ///
    /// Pure query: nothing is bound, switched or recorded.
    pub fn check_admission(
        &self,
        link: LinkId,
        planned_start: Timestamp,
    ) -> Result<(), CoordinatorError> {
        let state = self.link_state(link)?;
        self.evaluate_admission(state, planned_start)?;
        Ok(())
    }

    /// Drain pending events
    pub fn drain_events(&mut self) -> Vec<CoordinatorEvent> {
        std::mem::take(&mut self.event_buffer)
    }

    // -------------------------------------------------------------------------
    // Triggers
    // -------------------------------------------------------------------------

    /// A transmit opportunity arose on `link` (best-effort priority)
    pub fn request_access(&mut self, link: LinkId) -> Result<AccessOutcome, CoordinatorError> {
        self.request_access_with_priority(link, AccessCategory::default())
    }

    /// A transmit opportunity arose on `link` for traffic of `category`
    pub fn request_access_with_priority(
        &mut self,
        link: LinkId,
        category: AccessCategory,
    ) -> Result<AccessOutcome, CoordinatorError> {
        let (width, enabled) = {
            let state = self.link_state(link)?;
            (state.channel_width, state.emlsr_enabled)
        };

        if let Some(radio) = self.binding.radio_for(link) {
            if self.radio_entry(radio)?.can_serve(width) {
                if self.phy.radio_state(radio).is_busy_exchanging() {
                    return Ok(AccessOutcome::Deferred(DeferReason::RadioBusy));
                }
                debug!("Access on {} granted to {}", link, radio);
                return Ok(AccessOutcome::Granted {
                    radio,
                    policy: CcaPolicy::Normal,
                });
            }
        }

        if !enabled {
            return Ok(AccessOutcome::Deferred(DeferReason::CoordinationDisabled));
        }

        let main = self.main;
        let purpose = SwitchPurpose::Access { category };

        if let Some(active) = self.radio_entry(main)?.switch {
            let current = active.info;
            if current.is_heading_to(link) {
                return Ok(AccessOutcome::InFlight(current));
            }
            if !current.interruptible {
                return Err(CoordinatorError::switch_busy(
                    main,
                    current.remaining(self.now()),
                ));
            }
            if !purpose.outranks(&current.purpose) {
                debug!(
                    "Access on {} ({:?}) does not outrank {}",
                    link, category, current
                );
                return Ok(AccessOutcome::Deferred(DeferReason::LowerPriority));
            }
            let Some(policy) = self.medium_sync_policy(link) else {
                return Ok(AccessOutcome::Deferred(DeferReason::MediumSyncExhausted));
            };
            let info = self.redirect_switch(main, link, purpose)?;
            return Ok(AccessOutcome::Redirected { info, policy });
        }

        if self.phy.radio_state(main).is_busy_exchanging() {
            return Ok(AccessOutcome::Deferred(DeferReason::RadioBusy));
        }
        let Some(policy) = self.medium_sync_policy(link) else {
            return Ok(AccessOutcome::Deferred(DeferReason::MediumSyncExhausted));
        };
        self.stop_timer(TimerKind::SwitchMainRadioBack, ElapsedReason::Preempted);
        let info = self.start_switch(main, link, purpose)?;
        Ok(AccessOutcome::SwitchScheduled { info, policy })
    }

    /// A frame started arriving on `link`
    ///
    /// `header` carries the MAC header fields if the PHY could peek them.
    pub fn notify_incoming_frame(
        &mut self,
        link: LinkId,
        header: Option<PartialHeader>,
    ) -> Result<FrameDecision, CoordinatorError> {
        let (width, enabled) = {
            let state = self.link_state(link)?;
            (state.channel_width, state.emlsr_enabled)
        };
        let main = self.main;
        let needs_answer = header.is_some_and(|h| h.needs_answer());

        if let Some(active) = self.radio_entry(main)?.switch {
            let current = active.info;
            if current.is_heading_to(link) {
                return Ok(FrameDecision::Ignored(IgnoreReason::MainAlreadyHeading));
            }
            let redirect = current.interruptible
                && self.config.use_notified_header
                && needs_answer
                && enabled
                && SwitchPurpose::Reception.outranks(&current.purpose);
            if redirect {
                let info = self.redirect_switch(main, link, SwitchPurpose::Reception)?;
                return Ok(FrameDecision::Redirected(info));
            }
            return Ok(FrameDecision::Ignored(IgnoreReason::SwitchContinues));
        }

        if self.binding.link_for(main) == Some(link) {
            let preferred = self.radio_entry(main)?.preferred_link;
            if let Some(h) = header.filter(|h| !h.addressed_to_us) {
                if self.config.use_notified_header && link != preferred {
                    let frame_end = self.now().saturating_add(h.remaining);
                    if self.timers.shorten(
                        &mut self.scheduler,
                        TimerKind::SwitchMainRadioBack,
                        frame_end,
                        ElapsedReason::FrameEndKnown,
                    ) {
                        debug!("Frame on {} for another station ends at {}", link, frame_end);
                        return Ok(FrameDecision::SwitchBackShortened {
                            fires_in: h.remaining,
                        });
                    }
                }
            }
            return Ok(FrameDecision::Ignored(IgnoreReason::ServedLocally));
        }

        if let Some(radio) = self.binding.radio_for(link) {
            if self.radio_entry(radio)?.can_serve(width) {
                return Ok(FrameDecision::Ignored(IgnoreReason::ServedLocally));
            }
        }
        if !needs_answer {
            return Ok(FrameDecision::Ignored(IgnoreReason::NotForUs));
        }
        if !enabled {
            return Ok(FrameDecision::Ignored(IgnoreReason::CoordinationDisabled));
        }
        if self.phy.radio_state(main).is_busy_exchanging() {
            return Ok(FrameDecision::Ignored(IgnoreReason::MainBusy));
        }

        self.stop_timer(TimerKind::SwitchMainRadioBack, ElapsedReason::Preempted);
        let info = self.start_switch(main, link, SwitchPurpose::Reception)?;
        Ok(FrameDecision::SwitchScheduled(info))
    }

    /// The transmit/receive opportunity on `link` ended
    pub fn notify_opportunity_ended(&mut self, link: LinkId) -> Result<(), CoordinatorError> {
        self.link_state(link)?;
        if self.binding.link_for(self.main) != Some(link) {
            return Ok(());
        }
        if let Some(record) = self.stop_timer(
            TimerKind::SwitchMainRadioBack,
            ElapsedReason::OpportunityEnded,
        ) {
            self.return_main_home(record.elapsed_reason);
        } else if let Some(reason) = self.held_return {
            self.return_main_home(reason);
        }
        Ok(())
    }

    /// State change pushed by the PHY
    pub fn on_radio_state_changed(
        &mut self,
        radio: RadioId,
        notification: RadioNotification,
    ) -> Result<Option<FrameDecision>, CoordinatorError> {
        self.radio_entry(radio)?;
        match notification {
            RadioNotification::Disconnected => {
                if let Some(link) = self.binding.link_for(radio) {
                    warn!("{} reported disconnected while bound to {}", radio, link);
                }
                Ok(None)
            }
            RadioNotification::Connected { link } => {
                self.link_state(link)?;
                if self.binding.link_for(radio) != Some(link) {
                    debug!("{} reports {} ahead of switch completion", radio, link);
                }
                Ok(None)
            }
            RadioNotification::ReceptionStarted => match self.binding.link_for(radio) {
                Some(link) => self.notify_incoming_frame(link, None).map(Some),
                None => Ok(None),
            },
            RadioNotification::HeaderAvailable(header) => match self.binding.link_for(radio) {
                Some(link) => self.notify_incoming_frame(link, Some(header)).map(Some),
                None => Ok(None),
            },
            RadioNotification::BecameIdle => {
                if radio == self.main {
                    if let Some(reason) = self.held_return {
                        self.return_main_home(reason);
                    }
                }
                Ok(None)
            }
        }
    }

    /// Enable coordination on `links`
    pub fn enable_links(&mut self, links: &[LinkId]) -> Result<(), CoordinatorError> {
        for link in links {
            self.link_state(*link)?;
        }
        self.apply_link_flags(links, true);
        Ok(())
    }

    /// Disable coordination on `links`
    ///
    /// If the main radio is on, or switching to, a link that gets disabled it
    /// is sent back to its preferred link.
    pub fn disable_links(&mut self, links: &[LinkId]) -> Result<(), CoordinatorError> {
        for link in links {
            self.link_state(*link)?;
        }
        self.apply_link_flags(links, false);
        Ok(())
    }

    /// A capability negotiation for `links` completed
    ///
    /// The enable/disable takes effect after the transition delay. A new
    /// negotiation restarts the delay.
    pub fn notify_negotiation_complete(
        &mut self,
        links: &[LinkId],
        enable: bool,
    ) -> Result<Timestamp, CoordinatorError> {
        for link in links {
            self.link_state(*link)?;
        }
        self.stop_timer(TimerKind::TransitionDelay, ElapsedReason::Restarted);
        let target = Transition {
            links: links.iter().copied().collect(),
            enable,
        };
        let delay = self.config.timers.transition_delay();
        let deadline = self
            .timers
            .arm_transition(&mut self.scheduler, delay, target);
        self.event_buffer.push(CoordinatorEvent::TimerArmed {
            kind: TimerKind::TransitionDelay,
            deadline,
        });
        info!(
            "Negotiation done: {} {:?} at {}",
            if enable { "enable" } else { "disable" },
            links,
            deadline
        );
        Ok(deadline)
    }

    /// Switch `radio` to `link` on request of the caller
    ///
    /// Fails with `SwitchBusy` while a non-interruptible switch is in flight,
    /// leaving that switch untouched.
    pub fn switch_radio(
        &mut self,
        radio: RadioId,
        link: LinkId,
        purpose: SwitchPurpose,
    ) -> Result<SwitchInfo, CoordinatorError> {
        self.link_state(link)?;
        let state = self.radio_entry(radio)?;
        let is_main = state.is_main();

        if let Some(active) = state.switch {
            if !active.info.interruptible {
                return Err(CoordinatorError::switch_busy(
                    radio,
                    active.info.remaining(self.now()),
                ));
            }
            if active.info.is_heading_to(link) {
                return Ok(active.info);
            }
            return self.redirect_switch(radio, link, purpose);
        }

        if self.binding.link_for(radio) == Some(link) {
            return Err(CoordinatorError::AlreadyBound { radio, link });
        }
        if let Some(occupant) = self.binding.radio_for(link) {
            let displaceable = is_main && !self.radio_entry(occupant)?.is_main();
            if !displaceable {
                return Err(CoordinatorError::AlreadyBound { radio, link });
            }
        }
        self.start_switch(radio, link, purpose)
    }

    /// Deliver an event that the scheduler fired
    pub fn handle_scheduled(&mut self, event: ScheduledEvent) {
        match event {
            ScheduledEvent::SwitchComplete { radio, switch } => self.complete_switch(radio, switch),
            ScheduledEvent::LastPifsCheck { radio, switch } => {
                self.run_last_pifs_check(radio, switch)
            }
            ScheduledEvent::TimerExpired { kind, generation } => {
                let now = self.now();
                let Some(fired) = self.timers.expire(kind, generation, now) else {
                    return;
                };
                self.event_buffer
                    .push(CoordinatorEvent::TimerEnded(*fired.record()));
                match fired {
                    Fired::TransitionDelay { target, .. } => {
                        let links: Vec<LinkId> = target.links.into_iter().collect();
                        info!("Transition delay elapsed, applying to {:?}", links);
                        self.apply_link_flags(&links, target.enable);
                    }
                    Fired::MediumSyncDelay { record } => {
                        debug!("{:?} elapsed", record.kind);
                    }
                    Fired::SwitchMainRadioBack { record } => {
                        self.return_main_home(record.elapsed_reason);
                    }
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    /// Evaluate the medium sync delay for an access attempt on `link`
    ///
    /// `None` means the attempt must be deferred.
    fn medium_sync_policy(&mut self, link: LinkId) -> Option<CcaPolicy> {
        let kind = TimerKind::MediumSyncDelay(link);
        let was_running = self.timers.is_pending(kind);
        let max_elapsed = self.config.timers.medium_sync_max_elapsed();
        match self
            .timers
            .medium_sync_attempt(&mut self.scheduler, link, max_elapsed)
        {
            MediumSyncDecision::Normal => {
                if was_running {
                    if let Some(record) = self.timers.last_record(kind) {
                        self.event_buffer.push(CoordinatorEvent::TimerEnded(*record));
                    }
                }
                Some(CcaPolicy::Normal)
            }
            MediumSyncDecision::Restricted { attempts_left } => {
                debug!(
                    "Access on {} under medium sync policy, {} attempts left",
                    link, attempts_left
                );
                Some(CcaPolicy::MediumSync { attempts_left })
            }
            MediumSyncDecision::Exhausted => {
                debug!("Access on {} refused: medium sync attempts exhausted", link);
                None
            }
        }
    }

    pub(crate) fn apply_link_flags(&mut self, links: &[LinkId], enable: bool) {
        let mut changed = Vec::new();
        for link in links {
            if let Some(state) = self.links.get_mut(link) {
                if state.emlsr_enabled != enable {
                    state.emlsr_enabled = enable;
                    changed.push(*link);
                }
            }
        }
        if changed.is_empty() {
            return;
        }

        info!(
            "Coordination {} on {:?}",
            if enable { "enabled" } else { "disabled" },
            changed
        );
        if enable {
            self.event_buffer.push(CoordinatorEvent::LinksEnabled(changed));
        } else {
            self.event_buffer
                .push(CoordinatorEvent::LinksDisabled(changed));
            self.rebalance_after_disable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{ManualScheduler, StaticPhy};
    use emlsr_types::PhyState;

    type TestCoordinator = Coordinator<StaticPhy, ManualScheduler>;

    fn coordinator() -> TestCoordinator {
        Coordinator::new(
            CoordinatorConfig::default(),
            StaticPhy::default(),
            ManualScheduler::new(),
        )
        .unwrap()
    }

    fn run_until(c: &mut TestCoordinator, until: Timestamp) {
        while let Some((_, event)) = c.scheduler_mut().pop_next(until) {
            c.handle_scheduled(event);
        }
        c.scheduler_mut().set_now(until);
    }

    #[test]
    fn test_initial_binding() {
        let c = coordinator();
        assert_eq!(
            c.binding().pairs(),
            vec![
                (RadioId(0), LinkId(0)),
                (RadioId(1), LinkId(1)),
                (RadioId(2), LinkId(2))
            ]
        );
        assert_eq!(c.link(LinkId(2)).unwrap().preferred_radio, RadioId(2));
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let mut config = CoordinatorConfig::default();
        config.aux_radios[1].preferred_link = LinkId(1);
        assert_eq!(
            config.validate(),
            Err(ConfigError::PreferredLinkTaken { link: LinkId(1) })
        );

        let mut config = CoordinatorConfig::default();
        config.links.push(LinkConfig {
            id: LinkId(3),
            channel_width: ChannelWidth::Mhz20,
            emlsr_enabled: true,
            switch_delay_us: None,
        });
        assert_eq!(config.validate(), Err(ConfigError::NoPreferredRadio(LinkId(3))));

        let mut config = CoordinatorConfig::default();
        config.timers.switch_back_delay_us = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TimerOutOfRange { name: "timers.switch_back_delay_us", .. })
        ));

        let mut config = CoordinatorConfig::default();
        config.main_radio.capability.can_transmit = false;
        assert_eq!(
            config.validate(),
            Err(ConfigError::MainCannotTransmit(RadioId(0)))
        );
    }

    #[test]
    fn test_access_on_main_link_granted() {
        let mut c = coordinator();
        assert_eq!(
            c.request_access(LinkId(0)).unwrap(),
            AccessOutcome::Granted {
                radio: RadioId(0),
                policy: CcaPolicy::Normal
            }
        );
    }

    #[test]
    fn test_access_on_aux_link_switches_main() {
        let mut c = coordinator();
        let outcome = c.request_access(LinkId(2)).unwrap();
        let info = *outcome.switch_info().unwrap();
        assert_eq!(info.from_link, Some(LinkId(0)));
        assert_eq!(info.to_link, Some(LinkId(2)));
        assert_eq!(info.duration(), Duration::from_micros(64));
        assert_eq!(c.binding().link_for(RadioId(0)), None);
        assert!(matches!(
            c.radio_state(RadioId(0)).unwrap(),
            OperatingState::Switching(_)
        ));

        run_until(&mut c, Timestamp::from_micros(64));
        assert_eq!(c.binding().link_for(RadioId(0)), Some(LinkId(2)));
        // Aux radio gave up the link
        assert_eq!(c.binding().link_for(RadioId(2)), None);
        assert!(c.timers().is_pending(TimerKind::SwitchMainRadioBack));

        let events = c.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            CoordinatorEvent::TransmissionReady { radio: RadioId(0), link: LinkId(2) }
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            CoordinatorEvent::RadioParked { radio: RadioId(2), link: LinkId(2) }
        )));
    }

    #[test]
    fn test_unknown_ids() {
        let mut c = coordinator();
        assert_eq!(
            c.request_access(LinkId(7)),
            Err(CoordinatorError::UnknownLink(LinkId(7)))
        );
        assert_eq!(
            c.radio_state(RadioId(9)),
            Err(CoordinatorError::UnknownRadio(RadioId(9)))
        );
        assert!(c.disable_links(&[LinkId(1), LinkId(8)]).is_err());
        // Nothing was disabled by the failing call
        assert!(c.link(LinkId(1)).unwrap().emlsr_enabled);
    }

    #[test]
    fn test_busy_main_defers() {
        let mut c = coordinator();
        c.phy_mut().states.insert(RadioId(0), PhyState::Transmitting);
        assert_eq!(
            c.request_access(LinkId(1)).unwrap(),
            AccessOutcome::Deferred(DeferReason::RadioBusy)
        );
        assert!(c.drain_events().is_empty());
    }

    #[test]
    fn test_disabled_link_not_served_by_main() {
        let mut c = coordinator();
        c.disable_links(&[LinkId(1)]).unwrap();
        assert_eq!(
            c.request_access(LinkId(1)).unwrap(),
            AccessOutcome::Deferred(DeferReason::CoordinationDisabled)
        );
    }

    #[test]
    fn test_negotiation_applies_after_transition_delay() {
        let mut c = coordinator();
        let deadline = c
            .notify_negotiation_complete(&[LinkId(1), LinkId(2)], false)
            .unwrap();
        assert_eq!(deadline, Timestamp::from_micros(128));

        run_until(&mut c, Timestamp::from_micros(127));
        assert!(c.link(LinkId(1)).unwrap().emlsr_enabled);

        run_until(&mut c, Timestamp::from_micros(128));
        assert!(!c.link(LinkId(1)).unwrap().emlsr_enabled);
        assert!(!c.link(LinkId(2)).unwrap().emlsr_enabled);
        assert!(!c.timers().is_pending(TimerKind::TransitionDelay));
    }

    #[test]
    fn test_incoming_initial_control_frame_pulls_main() {
        let mut c = coordinator();
        let header = PartialHeader::initial_control(Duration::from_micros(40));
        let decision = c.notify_incoming_frame(LinkId(1), Some(header)).unwrap();
        let FrameDecision::SwitchScheduled(info) = decision else {
            panic!("expected a switch, got {:?}", decision);
        };
        assert_eq!(info.purpose, SwitchPurpose::Reception);

        // No header: nothing to act on
        let mut c = coordinator();
        assert_eq!(
            c.notify_incoming_frame(LinkId(1), None).unwrap(),
            FrameDecision::Ignored(IgnoreReason::NotForUs)
        );
    }

    #[test]
    fn test_reception_started_forwarded_from_aux() {
        let mut c = coordinator();
        let decision = c
            .on_radio_state_changed(
                RadioId(1),
                RadioNotification::HeaderAvailable(PartialHeader::initial_control(
                    Duration::from_micros(20),
                )),
            )
            .unwrap();
        assert!(matches!(decision, Some(FrameDecision::SwitchScheduled(_))));
    }
}

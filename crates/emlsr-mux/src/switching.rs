//! Switch mechanics
//!
//! Starting, redirecting and completing channel switches, plus the
//! bookkeeping that hangs off them: parking and restoring auxiliary radios,
//! arming the medium sync and switch-back timers, and the last-PIFS check.

use std::time::Duration;

use emlsr_types::{LinkId, RadioId, SwitchId, SwitchInfo, SwitchPurpose, Timestamp};
use tracing::{debug, info, warn};

use crate::admission::AdmissionDeferred;
use crate::engine::Coordinator;
use crate::error::CoordinatorError;
use crate::events::CoordinatorEvent;
use crate::platform::{PhyInterface, ScheduledEvent, Scheduler};
use crate::state::{ActiveSwitch, AdmissionStatus, LinkState};
use crate::timers::{ElapsedReason, TimerKind, TimerRecord};

impl<P: PhyInterface, S: Scheduler> Coordinator<P, S> {
    /// Duration of a switch of `radio` into `link`
    pub(crate) fn switch_delay(
        &self,
        radio: RadioId,
        link: LinkId,
    ) -> Result<Duration, CoordinatorError> {
        let radio_delay = self.radio_entry(radio)?.switch_delay;
        Ok(self.link_state(link)?.switch_delay.unwrap_or(radio_delay))
    }

    fn allocate_switch_id(&mut self) -> SwitchId {
        self.next_switch_id += 1;
        SwitchId(self.next_switch_id)
    }

    /// Unbind `radio` and start retuning it to `link`
    pub(crate) fn start_switch(
        &mut self,
        radio: RadioId,
        link: LinkId,
        purpose: SwitchPurpose,
    ) -> Result<SwitchInfo, CoordinatorError> {
        let duration = self.switch_delay(radio, link)?;
        if radio == self.main {
            self.stop_timer(TimerKind::SwitchMainRadioBack, ElapsedReason::Cancelled);
            self.held_return = None;
        }

        let from_link = self.depart(radio, purpose);
        let now = self.now();
        let info = SwitchInfo {
            id: self.allocate_switch_id(),
            from_link,
            to_link: Some(link),
            start_time: now,
            expected_end_time: now + duration,
            interruptible: self.config.interrupt_switch,
            purpose,
        };
        let active = self.launch(radio, link, info);
        if let Some(state) = self.radios.get_mut(&radio) {
            state.switch = Some(active);
        }

        info!("{} switching: {} ({:?})", radio, info, purpose);
        self.event_buffer
            .push(CoordinatorEvent::SwitchStarted { radio, info });
        Ok(info)
    }

    /// Give an in-flight switch a new destination
    ///
    /// The switch restarts from the current instant with the full delay of
    /// the new destination and a fresh id.
    pub(crate) fn redirect_switch(
        &mut self,
        radio: RadioId,
        link: LinkId,
        purpose: SwitchPurpose,
    ) -> Result<SwitchInfo, CoordinatorError> {
        let Some(current) = self.radio_entry(radio)?.switch else {
            return self.start_switch(radio, link, purpose);
        };
        let duration = self.switch_delay(radio, link)?;

        self.scheduler.cancel(current.completion);
        if let Some(check) = current.pifs_check {
            self.scheduler.cancel(check);
        }

        let now = self.now();
        let info = SwitchInfo {
            id: self.allocate_switch_id(),
            from_link: current.info.from_link,
            to_link: Some(link),
            start_time: now,
            expected_end_time: now + duration,
            interruptible: self.config.interrupt_switch,
            purpose,
        };
        let active = self.launch(radio, link, info);
        if let Some(state) = self.radios.get_mut(&radio) {
            state.switch = Some(active);
        }

        info!("{} redirected: {} ({:?})", radio, info, purpose);
        self.event_buffer.push(CoordinatorEvent::SwitchRedirected {
            radio,
            previous: current.info.to_link,
            info,
        });
        Ok(info)
    }

    /// Command the PHY and schedule completion (and the last-PIFS check)
    fn launch(&mut self, radio: RadioId, link: LinkId, info: SwitchInfo) -> ActiveSwitch {
        let duration = info.duration();
        let phy_handle = self.phy.begin_switch(radio, link, duration);
        let completion = self.scheduler.schedule_after(
            duration,
            ScheduledEvent::SwitchComplete {
                radio,
                switch: info.id,
            },
        );

        let needs_check =
            matches!(info.purpose, SwitchPurpose::Access { .. }) && self.config.check_last_pifs;
        let (pifs_check, admission) = if needs_check {
            let at = self.admission.check_time(info.expected_end_time);
            let handle = self.scheduler.schedule_after(
                at.saturating_since(self.now()),
                ScheduledEvent::LastPifsCheck {
                    radio,
                    switch: info.id,
                },
            );
            (Some(handle), AdmissionStatus::Pending)
        } else {
            (None, AdmissionStatus::NotRequired)
        };

        ActiveSwitch {
            info,
            phy_handle,
            completion,
            pifs_check,
            admission,
        }
    }

    /// Release the link `radio` is leaving
    fn depart(&mut self, radio: RadioId, purpose: SwitchPurpose) -> Option<LinkId> {
        let from = self.binding.unbind(radio)?;
        self.restore_aux(from, Some(radio));

        let left_empty = self.binding.radio_for(from).is_none();
        let enabled = self.links.get(&from).is_some_and(|l| l.emlsr_enabled);
        if radio == self.main
            && purpose != SwitchPurpose::ReturnToPreferred
            && left_empty
            && enabled
        {
            let duration = self.config.timers.medium_sync_duration();
            let attempts = self.config.timers.medium_sync_max_attempts;
            let kind = TimerKind::MediumSyncDelay(from);
            if self
                .timers
                .arm_medium_sync(&mut self.scheduler, from, duration, attempts)
            {
                if let Some(deadline) = self.timers.get(kind).map(|t| t.deadline) {
                    self.event_buffer
                        .push(CoordinatorEvent::TimerArmed { kind, deadline });
                }
            }
        }
        Some(from)
    }

    /// Rebind the auxiliary radio that prefers `link` if it is free
    ///
    /// `departing` is the radio leaving `link` right now; it stays unbound.
    fn restore_aux(&mut self, link: LinkId, departing: Option<RadioId>) {
        let Some(preferred) = self.links.get(&link).map(|l| l.preferred_radio) else {
            return;
        };
        if preferred == self.main
            || Some(preferred) == departing
            || self.binding.radio_for(link).is_some()
        {
            return;
        }
        let idle = self
            .radios
            .get(&preferred)
            .is_some_and(|r| !r.is_switching())
            && self.binding.link_for(preferred).is_none();
        if idle && self.binding.bind(preferred, link).is_ok() {
            debug!("{} back on {}", preferred, link);
            self.event_buffer.push(CoordinatorEvent::RadioRestored {
                radio: preferred,
                link,
            });
        }
    }

    /// A switch reached its expected end
    pub(crate) fn complete_switch(&mut self, radio: RadioId, switch: SwitchId) {
        let Some(active) = self.radios.get(&radio).and_then(|r| r.switch) else {
            debug!("Stale completion for {} ({:?})", radio, switch);
            return;
        };
        if active.info.id != switch {
            debug!("Stale completion for {} ({:?})", radio, switch);
            return;
        }
        if let Some(state) = self.radios.get_mut(&radio) {
            state.switch = None;
        }
        let Some(link) = active.info.to_link else {
            return;
        };
        let is_main = radio == self.main;

        if let Some(occupant) = self.binding.radio_for(link) {
            if is_main && occupant != radio {
                self.binding.unbind(occupant);
                debug!("{} parked, {} taken by main radio", occupant, link);
                self.event_buffer.push(CoordinatorEvent::RadioParked {
                    radio: occupant,
                    link,
                });
            }
        }
        if let Err(err) = self.binding.bind(radio, link) {
            warn!("Switch of {} abandoned: {}", radio, err);
            self.event_buffer
                .push(CoordinatorEvent::SwitchAbandoned { radio, link });
            if let Some(home) = self.radios.get(&radio).map(|r| r.preferred_link) {
                self.restore_aux(home, None);
            }
            return;
        }

        info!("{} on {} ({})", radio, link, active.info);
        self.event_buffer.push(CoordinatorEvent::SwitchCompleted {
            radio,
            link,
            info: active.info,
        });

        if is_main {
            self.stop_timer(TimerKind::MediumSyncDelay(link), ElapsedReason::RadioReturned);
            let preferred = self.radios.get(&radio).map(|r| r.preferred_link);
            if preferred != Some(link) {
                if self.is_disabled(link) {
                    self.return_main_home(ElapsedReason::LinkDisabled);
                    return;
                }
                let delay = self.config.timers.switch_back_delay();
                let deadline = self.timers.arm_switch_back(&mut self.scheduler, delay);
                self.event_buffer.push(CoordinatorEvent::TimerArmed {
                    kind: TimerKind::SwitchMainRadioBack,
                    deadline,
                });
            }
        }

        match active.info.purpose {
            SwitchPurpose::Access { .. } => match active.admission {
                AdmissionStatus::Deferred(deferred) => {
                    self.event_buffer
                        .push(CoordinatorEvent::AccessDeferred { radio, deferred });
                }
                _ => {
                    self.event_buffer
                        .push(CoordinatorEvent::TransmissionReady { radio, link });
                }
            },
            SwitchPurpose::Reception => {
                self.event_buffer
                    .push(CoordinatorEvent::ReadyToReceive { radio, link });
            }
            SwitchPurpose::ReturnToPreferred => {}
        }
    }

    /// One PIFS before an access switch completes
    pub(crate) fn run_last_pifs_check(&mut self, radio: RadioId, switch: SwitchId) {
        let Some(active) = self.radios.get(&radio).and_then(|r| r.switch) else {
            return;
        };
        if active.info.id != switch {
            debug!("Stale PIFS check for {} ({:?})", radio, switch);
            return;
        }
        let Some(link) = active.info.to_link.and_then(|l| self.links.get(&l)) else {
            return;
        };

        let status = match self.evaluate_admission(link, active.info.expected_end_time) {
            Ok(()) => AdmissionStatus::Cleared,
            Err(deferred) => {
                info!("{}", deferred);
                AdmissionStatus::Deferred(deferred)
            }
        };
        if let Some(active) = self.radios.get_mut(&radio).and_then(|r| r.switch.as_mut()) {
            active.admission = status;
        }
    }

    /// Medium check for a transmission on `link` at `planned_start`
    ///
    /// CCA is trusted over the narrower of the link width and the width of
    /// the radio currently monitoring the link.
    pub(crate) fn evaluate_admission(
        &self,
        link: &LinkState,
        planned_start: Timestamp,
    ) -> Result<(), AdmissionDeferred> {
        let sensing_width = self
            .binding
            .radio_for(link.id)
            .and_then(|r| self.radios.get(&r))
            .map_or(link.channel_width, |r| {
                r.capability.max_channel_width.min(link.channel_width)
            });
        let medium = self.phy.link_medium_state(link.id);
        self.admission
            .check(link.id, planned_start, sensing_width, &medium)
    }

    /// Send the main radio back to its preferred link
    ///
    /// Held if the radio is still exchanging frames; the return then happens
    /// when it reports idle or the opportunity ends.
    pub(crate) fn return_main_home(&mut self, reason: ElapsedReason) {
        let main = self.main;
        let Some((preferred, switching)) = self
            .radios
            .get(&main)
            .map(|r| (r.preferred_link, r.is_switching()))
        else {
            return;
        };
        if switching || self.binding.link_for(main) == Some(preferred) {
            self.held_return = None;
            return;
        }
        if self.phy.radio_state(main).is_busy_exchanging() {
            if self.held_return.is_none() {
                debug!("Return of {} held ({:?}): radio busy", main, reason);
                self.event_buffer
                    .push(CoordinatorEvent::ReturnHeld { reason });
            }
            self.held_return = Some(reason);
            return;
        }

        info!("Returning {} to {} ({:?})", main, preferred, reason);
        if let Err(err) = self.start_switch(main, preferred, SwitchPurpose::ReturnToPreferred) {
            warn!("Could not return {} to {}: {}", main, preferred, err);
        }
    }

    /// Send the main radio home from links that were just disabled
    pub(crate) fn rebalance_after_disable(&mut self) {
        let main = self.main;
        let Some((preferred, switch)) = self
            .radios
            .get(&main)
            .map(|r| (r.preferred_link, r.switch))
        else {
            return;
        };

        if let Some(active) = switch {
            let target = active.info.to_link.filter(|l| *l != preferred);
            if let Some(target) = target.filter(|l| self.is_disabled(*l)) {
                if active.info.interruptible {
                    debug!("{} disabled while {} heading there", target, main);
                    if let Err(err) =
                        self.redirect_switch(main, preferred, SwitchPurpose::ReturnToPreferred)
                    {
                        warn!("Could not redirect {} home: {}", main, err);
                    }
                }
            }
            return;
        }

        if let Some(link) = self.binding.link_for(main) {
            if link != preferred && self.is_disabled(link) {
                self.stop_timer(TimerKind::SwitchMainRadioBack, ElapsedReason::LinkDisabled);
                self.return_main_home(ElapsedReason::LinkDisabled);
            }
        }
    }

    fn is_disabled(&self, link: LinkId) -> bool {
        self.links.get(&link).is_some_and(|l| !l.emlsr_enabled)
    }

    /// Stop a running timer and report it
    pub(crate) fn stop_timer(
        &mut self,
        kind: TimerKind,
        reason: ElapsedReason,
    ) -> Option<TimerRecord> {
        let record = self.timers.finish(&mut self.scheduler, kind, reason)?;
        self.event_buffer.push(CoordinatorEvent::TimerEnded(record));
        Some(record)
    }
}

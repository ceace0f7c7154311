//! Integration tests for the switch coordinator building blocks
//!
//! These tests drive the public API with a minimal in-file scheduler:
//! - Binding table invariants under arbitrary bind/unbind sequences
//! - Timer set cancellation racing a due expiry
//! - Configuration loading from JSON

use std::collections::BTreeMap;
use std::time::Duration;

use emlsr_mux::{
    BindingTable, ConfigError, CoordinatorConfig, CoordinatorError, ElapsedReason, EventHandle,
    ScheduledEvent, Scheduler, TimerKind, TimerSet,
};
use emlsr_types::{ChannelWidth, LinkId, RadioId, Timestamp};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Scheduler that only moves when the test fires events
    #[derive(Default)]
    pub struct QueueScheduler {
        pub now: Timestamp,
        next_id: u64,
        pending: BTreeMap<(Timestamp, u64), ScheduledEvent>,
    }

    impl QueueScheduler {
        /// Pop every event due up to `until`
        pub fn fire_until(&mut self, until: Timestamp) -> Vec<(Timestamp, ScheduledEvent)> {
            let later = self.pending.split_off(&(until, u64::MAX));
            let due = std::mem::replace(&mut self.pending, later);
            self.now = until;
            due.into_iter().map(|((at, _), ev)| (at, ev)).collect()
        }
    }

    impl Scheduler for QueueScheduler {
        fn now(&self) -> Timestamp {
            self.now
        }

        fn schedule_after(&mut self, delay: Duration, event: ScheduledEvent) -> EventHandle {
            self.next_id += 1;
            self.pending.insert((self.now + delay, self.next_id), event);
            EventHandle(self.next_id)
        }

        fn cancel(&mut self, handle: EventHandle) -> bool {
            let key = self.pending.keys().find(|(_, id)| *id == handle.0).copied();
            key.and_then(|k| self.pending.remove(&k)).is_some()
        }
    }
}

// ============================================================================
// Binding Table Tests
// ============================================================================

mod binding_tests {
    use super::*;

    #[test]
    fn rebinding_same_pair_is_noop() {
        let mut table = BindingTable::new();
        table.bind(RadioId(0), LinkId(0)).unwrap();
        table.bind(RadioId(0), LinkId(0)).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn failed_bind_leaves_table_untouched() {
        let mut table = BindingTable::new();
        table.bind(RadioId(0), LinkId(0)).unwrap();
        table.bind(RadioId(1), LinkId(1)).unwrap();
        let before = table.clone();

        assert_eq!(
            table.bind(RadioId(0), LinkId(1)),
            Err(CoordinatorError::AlreadyBound {
                radio: RadioId(0),
                link: LinkId(1)
            })
        );
        assert_eq!(table, before);
    }

    #[test]
    fn unbind_unbound_is_noop() {
        let mut table = BindingTable::new();
        assert_eq!(table.unbind(RadioId(3)), None);
        assert!(table.is_empty());
    }
}

// ============================================================================
// Timer Set Tests
// ============================================================================

mod timer_tests {
    use super::*;

    #[test]
    fn cancelled_timer_never_fires_even_when_due() {
        let mut sched = helpers::QueueScheduler::default();
        let mut timers = TimerSet::new();
        timers.arm_switch_back(&mut sched, Duration::from_micros(1000));

        sched.now = Timestamp::from_micros(1000);
        timers.finish(
            &mut sched,
            TimerKind::SwitchMainRadioBack,
            ElapsedReason::Preempted,
        );

        for (at, event) in sched.fire_until(Timestamp::from_micros(5000)) {
            if let ScheduledEvent::TimerExpired { kind, generation } = event {
                assert!(timers.expire(kind, generation, at).is_none());
            }
        }
        assert_eq!(
            timers
                .last_record(TimerKind::SwitchMainRadioBack)
                .unwrap()
                .elapsed_reason,
            ElapsedReason::Preempted
        );
    }

    #[test]
    fn snapshot_reflects_running_timers() {
        let mut sched = helpers::QueueScheduler::default();
        let mut timers = TimerSet::new();
        timers.arm_medium_sync(&mut sched, LinkId(0), Duration::from_micros(5484), 1);
        timers.arm_switch_back(&mut sched, Duration::from_micros(1000));

        let snapshot = timers.snapshot();
        assert_eq!(snapshot.transition, None);
        assert_eq!(
            snapshot.medium_sync,
            vec![(
                LinkId(0),
                Timestamp::ZERO,
                Timestamp::from_micros(5484),
                1
            )]
        );
        assert_eq!(
            snapshot.switch_back,
            Some((Timestamp::ZERO, Timestamp::from_micros(1000)))
        );
    }
}

// ============================================================================
// Configuration Tests
// ============================================================================

mod config_tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert_eq!(CoordinatorConfig::default().validate(), Ok(()));
    }

    #[test]
    fn config_loads_from_json() {
        let json = r#"{
            "main_radio": {
                "id": 0,
                "capability": { "can_transmit": true, "max_channel_width": "Mhz160", "modulation_tier": "Eht" },
                "switch_delay_us": 64,
                "preferred_link": 0
            },
            "aux_radios": [{
                "id": 1,
                "capability": { "can_transmit": false, "max_channel_width": "Mhz20", "modulation_tier": "Legacy" },
                "switch_delay_us": 32,
                "preferred_link": 1
            }],
            "links": [
                { "id": 0, "channel_width": "Mhz160" },
                { "id": 1, "channel_width": "Mhz80", "emlsr_enabled": false }
            ],
            "sifs_us": 16,
            "slot_us": 9,
            "interrupt_switch": false,
            "use_notified_header": true,
            "check_last_pifs": true
        }"#;

        let config: CoordinatorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.timers.switch_back_delay_us, 1000);
        assert_eq!(config.links[0].channel_width, ChannelWidth::Mhz160);
        assert!(!config.links[1].emlsr_enabled);
        assert!(!config.interrupt_switch);
    }

    #[test]
    fn out_of_range_switch_delay_rejected() {
        let mut config = CoordinatorConfig::default();
        config.aux_radios[0].switch_delay_us = 2_000_000;
        assert_eq!(
            config.validate(),
            Err(ConfigError::SwitchDelayOutOfRange {
                radio: RadioId(1),
                delay_us: 2_000_000
            })
        );
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Bind(u8, u8),
        Unbind(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4, 0u8..4).prop_map(|(r, l)| Op::Bind(r, l)),
            (0u8..4).prop_map(Op::Unbind),
        ]
    }

    proptest! {
        #[test]
        fn binding_stays_one_to_one(ops in prop::collection::vec(op(), 0..64)) {
            let mut table = BindingTable::new();
            for op in ops {
                match op {
                    Op::Bind(r, l) => {
                        let before = table.clone();
                        if table.bind(RadioId(r), LinkId(l)).is_err() {
                            prop_assert_eq!(&table, &before);
                        } else {
                            prop_assert_eq!(table.link_for(RadioId(r)), Some(LinkId(l)));
                            prop_assert_eq!(table.radio_for(LinkId(l)), Some(RadioId(r)));
                        }
                    }
                    Op::Unbind(r) => {
                        let old = table.link_for(RadioId(r));
                        prop_assert_eq!(table.unbind(RadioId(r)), old);
                        prop_assert_eq!(table.link_for(RadioId(r)), None);
                    }
                }
                prop_assert!(table.is_consistent());
            }
        }

        #[test]
        fn finish_at_any_instant_suppresses_expiry(
            duration_us in 1u64..5000,
            finish_frac in 0.0f64..=1.0,
        ) {
            let mut sched = helpers::QueueScheduler::default();
            let mut timers = TimerSet::new();
            timers.arm_switch_back(&mut sched, Duration::from_micros(duration_us));

            let finish_at = (duration_us as f64 * finish_frac) as u64;
            sched.now = Timestamp::from_micros(finish_at);
            timers.finish(&mut sched, TimerKind::SwitchMainRadioBack, ElapsedReason::OpportunityEnded);

            for (at, event) in sched.fire_until(Timestamp::from_micros(duration_us * 2)) {
                if let ScheduledEvent::TimerExpired { kind, generation } = event {
                    prop_assert!(timers.expire(kind, generation, at).is_none());
                }
            }
            prop_assert!(!timers.is_pending(TimerKind::SwitchMainRadioBack));
        }
    }
}

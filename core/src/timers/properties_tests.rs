//! Property-based tests for the tick loop
//!
//! A controlled clock that never advances during a tick means the checker
//! never yields, so every due timer must fire on the first tick at or after
//! its due date.

use chrono::TimeDelta;
use proptest::prelude::*;

use super::{
    InfrastructureError, OwnerScope, TimerCallbacks, TimerDefinition, TimerManager,
    TriggerOutcome, VariableEvaluator, Variables,
};
use crate::clock::{ControlledClock, timestamp_from_millis};
use crate::config::EngineConfig;

struct Accept;

impl TimerCallbacks for Accept {
    fn on_timer_due(
        &mut self,
        _: &OwnerScope,
        _: &str,
        _: u64,
    ) -> Result<TriggerOutcome, InfrastructureError> {
        Ok(TriggerOutcome::ElementActivated {
            element_instance_key: 0,
        })
    }
}

fn manager() -> TimerManager {
    TimerManager::new(
        &EngineConfig::default(),
        ControlledClock::at_millis(0),
        VariableEvaluator,
    )
}

/// Strictly increasing tick instants, in milliseconds
fn tick_times() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1i64..2_000, 1..40).prop_map(|gaps| {
        gaps.into_iter()
            .scan(0i64, |now, gap| {
                *now += gap;
                Some(*now)
            })
            .collect()
    })
}

proptest! {
    /// Property: every one-shot timer fires exactly once, on the first tick
    /// at or after its due date.
    #[test]
    fn prop_no_timer_is_skipped(
        delays in prop::collection::vec(-5_000i64..20_000, 1..30),
        ticks in tick_times(),
    ) {
        let mut manager = manager();
        for (element, delay) in delays.iter().enumerate() {
            manager
                .create_timer(
                    &TimerDefinition::FixedDuration(TimeDelta::milliseconds(*delay)),
                    OwnerScope::element(1, element as u64),
                    1,
                    "wait",
                    timestamp_from_millis(0),
                    &Variables::new(),
                )
                .unwrap();
        }

        let mut fired_at = vec![None; delays.len()];
        for tick in &ticks {
            let now = timestamp_from_millis(*tick);
            let report = manager.tick(now, &mut Accept).unwrap();
            prop_assert!(!report.yielded());
            for triggered in report.triggered {
                prop_assert!(triggered.timer.due_date <= now);
                let OwnerScope::Element(r) = triggered.timer.owner else {
                    panic!("unexpected start timer");
                };
                let slot = &mut fired_at[r.element_instance_key as usize];
                prop_assert!(slot.is_none(), "timer fired twice");
                *slot = Some(*tick);
            }
        }

        let last = *ticks.last().unwrap();
        for (delay, fired) in delays.iter().zip(&fired_at) {
            let expected = ticks.iter().copied().find(|tick| tick >= delay);
            prop_assert_eq!(*fired, expected);
            if *delay > last {
                prop_assert!(fired.is_none());
            }
        }
    }

    /// Property: the k-th firing of a cycle is due at `anchor + k·interval`,
    /// however late the ticks arrive.
    #[test]
    fn prop_cycles_do_not_drift(
        interval_ms in 1i64..3_000,
        ticks in tick_times(),
    ) {
        let mut manager = manager();
        let definition = TimerDefinition::RepeatingCycle {
            repetitions: None,
            anchor: Some(timestamp_from_millis(0)),
            interval: TimeDelta::milliseconds(interval_ms),
        };
        manager
            .create_timer(
                &definition,
                OwnerScope::element(1, 1),
                1,
                "poll",
                timestamp_from_millis(0),
                &Variables::new(),
            )
            .unwrap();

        let mut firings = 0i64;
        for tick in ticks {
            let report = manager.tick(timestamp_from_millis(tick), &mut Accept).unwrap();
            // re-armed instances wait for the next tick
            prop_assert!(report.triggered.len() <= 1);
            for triggered in report.triggered {
                prop_assert_eq!(
                    triggered.timer.due_date,
                    timestamp_from_millis(firings * interval_ms)
                );
                firings += 1;
            }
        }
        prop_assert_eq!(manager.store().len(), 1);
    }

    /// Property: `R<n>` fires exactly n times given enough ticks.
    #[test]
    fn prop_bounded_cycle_fires_n_times(repetitions in 1u32..8) {
        let mut manager = manager();
        let definition = TimerDefinition::RepeatingCycle {
            repetitions: Some(repetitions),
            anchor: None,
            interval: TimeDelta::seconds(1),
        };
        manager
            .create_timer(
                &definition,
                OwnerScope::element(1, 1),
                1,
                "poll",
                timestamp_from_millis(0),
                &Variables::new(),
            )
            .unwrap();

        let mut fired = 0;
        for second in 1..=20 {
            let report = manager
                .tick(timestamp_from_millis(second * 1000), &mut Accept)
                .unwrap();
            fired += report.triggered.len();
        }
        prop_assert_eq!(fired, repetitions as usize);
        prop_assert!(manager.store().is_empty());
    }
}

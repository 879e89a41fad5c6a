//! Due-date timer checker
//!
//! Time-boxed scan over the store. Each invocation visits due timers in
//! `(due_date, key)` order until either nothing due is left or the per-tick
//! budget is spent. Timers that are not visited stay due and are picked up by
//! the next invocation, so yielding defers work but never drops it.

use chrono::{DateTime, TimeDelta, Utc};

use crate::clock::{Clock, Timestamp};

use super::active::TimerInstance;
use super::store::TimerStore;

/// Whether a scan should go on after a visit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    Stop,
}

/// How a scan ended. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every due timer was visited
    Completed,
    /// The budget ran out (or the visitor stopped) with due timers left
    Yielded,
}

/// Per-timer callback of a scan. It gets the store back so it can remove or
/// re-arm the timer it was handed.
pub trait TimerVisitor {
    type Error;

    fn visit(&mut self, store: &mut TimerStore, timer: TimerInstance) -> Result<Visit, Self::Error>;
}

impl<F, E> TimerVisitor for F
where
    F: FnMut(&mut TimerStore, TimerInstance) -> Result<Visit, E>,
{
    type Error = E;

    fn visit(&mut self, store: &mut TimerStore, timer: TimerInstance) -> Result<Visit, E> {
        self(store, timer)
    }
}

/// Wraps a visitor and enforces a deadline.
///
/// The deadline is checked before every delegate call. Once it has passed the
/// wrapper answers [`Visit::Stop`] and never calls the delegate again.
pub struct YieldingVisitor<'c, V> {
    clock: &'c dyn Clock,
    deadline: Timestamp,
    delegate: V,
    yielded: bool,
}

impl<'c, V> YieldingVisitor<'c, V> {
    pub fn new(clock: &'c dyn Clock, deadline: Timestamp, delegate: V) -> Self {
        Self {
            clock,
            deadline,
            delegate,
            yielded: false,
        }
    }

    pub fn has_yielded(&self) -> bool {
        self.yielded
    }

    pub fn into_inner(self) -> V {
        self.delegate
    }
}

impl<V: TimerVisitor> TimerVisitor for YieldingVisitor<'_, V> {
    type Error = V::Error;

    fn visit(&mut self, store: &mut TimerStore, timer: TimerInstance) -> Result<Visit, V::Error> {
        if self.yielded || self.clock.now() >= self.deadline {
            self.yielded = true;
            return Ok(Visit::Stop);
        }
        self.delegate.visit(store, timer)
    }
}

/// Result of one checker invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckReport {
    pub outcome: ScanOutcome,
    /// Timers handed to the delegate
    pub visited: usize,
    /// Earliest due date left in the store after the scan
    pub next_due: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy)]
pub struct DueDateChecker {
    yield_budget: TimeDelta,
}

impl DueDateChecker {
    /// `yield_budget` must be positive, otherwise every scan yields before
    /// visiting anything.
    pub fn new(yield_budget: TimeDelta) -> Self {
        Self { yield_budget }
    }

    pub fn yield_budget(&self) -> TimeDelta {
        self.yield_budget
    }

    /// Visit every timer with `due_date <= now`, within the time budget
    pub fn check<V: TimerVisitor>(
        &self,
        store: &mut TimerStore,
        clock: &dyn Clock,
        now: Timestamp,
        visitor: V,
    ) -> Result<CheckReport, V::Error> {
        let deadline = clock
            .now()
            .checked_add_signed(self.yield_budget)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut visitor = YieldingVisitor::new(clock, deadline, visitor);
        let mut cursor = store.scan_due_ascending(now);
        let mut visited = 0;

        let outcome = loop {
            let Some(timer) = cursor.next(store) else {
                break ScanOutcome::Completed;
            };
            match visitor.visit(store, timer)? {
                Visit::Continue => visited += 1,
                Visit::Stop => {
                    if !visitor.has_yielded() {
                        visited += 1;
                    }
                    break ScanOutcome::Yielded;
                }
            }
        };

        Ok(CheckReport {
            outcome,
            visited,
            next_due: store.earliest_due_date(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::clock::{ControlledClock, timestamp_from_millis};
    use crate::timers::active::{OwnerScope, TimerKey};

    fn timer(store: &mut TimerStore, due_ms: i64, element: u64) -> TimerKey {
        let key = store.next_key();
        store
            .insert(TimerInstance {
                key,
                due_date: timestamp_from_millis(due_ms),
                owner: OwnerScope::element(1, element),
                process_definition_key: 1,
                target_element_id: "timer".to_string(),
                repetitions_remaining: Some(0),
                repetition: None,
            })
            .unwrap();
        key
    }

    #[test]
    fn visits_due_timers_in_order_and_skips_future_ones() {
        let mut store = TimerStore::new();
        let late = timer(&mut store, 2_000, 1);
        let early = timer(&mut store, 1_000, 2);
        timer(&mut store, 9_000, 3);

        let clock = ControlledClock::at_millis(0);
        let checker = DueDateChecker::new(TimeDelta::milliseconds(100));
        let mut seen = Vec::new();
        let report = checker
            .check(&mut store, &clock, timestamp_from_millis(5_000), |store: &mut TimerStore, t: TimerInstance| {
                seen.push(t.key);
                store.remove(t.key);
                Ok::<_, Infallible>(Visit::Continue)
            })
            .unwrap();

        assert_eq!(seen, vec![early, late]);
        assert_eq!(report.outcome, ScanOutcome::Completed);
        assert_eq!(report.visited, 2);
        assert_eq!(report.next_due, Some(timestamp_from_millis(9_000)));
    }

    #[test]
    fn yielding_visitor_never_calls_delegate_past_deadline() {
        let mut store = TimerStore::new();
        for element in 0..5 {
            timer(&mut store, 0, element);
        }

        // every visit costs 40ms of a 100ms budget
        let clock = ControlledClock::at_millis(0);
        let ticking = clock.clone();
        let checker = DueDateChecker::new(TimeDelta::milliseconds(100));
        let mut calls = 0;
        let report = checker
            .check(&mut store, &clock, timestamp_from_millis(0), |store: &mut TimerStore, t: TimerInstance| {
                calls += 1;
                ticking.advance(TimeDelta::milliseconds(40));
                store.remove(t.key);
                Ok::<_, Infallible>(Visit::Continue)
            })
            .unwrap();

        assert_eq!(calls, 3);
        assert_eq!(report.outcome, ScanOutcome::Yielded);
        assert_eq!(report.visited, 3);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn unvisited_timers_are_found_by_the_next_scan() {
        let mut store = TimerStore::new();
        let first = timer(&mut store, 0, 1);
        let second = timer(&mut store, 0, 2);

        let clock = ControlledClock::at_millis(0);
        let ticking = clock.clone();
        let checker = DueDateChecker::new(TimeDelta::milliseconds(10));
        let mut fired = Vec::new();
        let mut fire = |store: &mut TimerStore, t: TimerInstance| {
            fired.push(t.key);
            ticking.advance(TimeDelta::milliseconds(10));
            store.remove(t.key);
            Ok::<_, Infallible>(Visit::Continue)
        };

        let report = checker
            .check(&mut store, &clock, timestamp_from_millis(0), &mut fire)
            .unwrap();
        assert_eq!(report.outcome, ScanOutcome::Yielded);

        let report = checker
            .check(&mut store, &clock, timestamp_from_millis(0), &mut fire)
            .unwrap();
        assert_eq!(report.outcome, ScanOutcome::Completed);
        assert_eq!(fired, vec![first, second]);
    }

    #[test]
    fn visitor_can_stop_a_scan() {
        let mut store = TimerStore::new();
        timer(&mut store, 0, 1);
        timer(&mut store, 0, 2);

        let clock = ControlledClock::at_millis(0);
        let checker = DueDateChecker::new(TimeDelta::seconds(1));
        let report = checker
            .check(&mut store, &clock, timestamp_from_millis(0), |_: &mut TimerStore, _: TimerInstance| {
                Ok::<_, Infallible>(Visit::Stop)
            })
            .unwrap();

        assert_eq!(report.outcome, ScanOutcome::Yielded);
        assert_eq!(report.visited, 1);
        assert_eq!(store.len(), 2);
    }
}

//! Timer lifecycle management
//!
//! `TimerManager` owns the timer store of one partition and is the only
//! writer to it. It creates timers when catch points are entered or process
//! definitions are deployed, cancels them with their owners, and runs the
//! checker on every tick to trigger due timers and re-arm cycles.

use chrono::TimeDelta;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, Timestamp};
use crate::config::EngineConfig;

use super::active::{
    ElementInstanceRef, LineageKey, OwnerScope, TimerHandle, TimerInstance,
};
use super::calculator::{self, DueDate};
use super::checker::{DueDateChecker, ScanOutcome, TimerVisitor, Visit};
use super::collaborators::{DeploymentRegistry, TimerCallbacks, TriggerOutcome};
use super::definition::TimerDefinition;
use super::deployment::{ProcessDeployment, StartTimerDeployment};
use super::error::{CalculationError, StoreError, TimerError};
use super::evaluator::{ExpressionEvaluator, Variables};
use super::events::{Incident, TimerEvent};
use super::store::TimerStore;

/// A timer handed to the owner during a tick
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredTimer {
    pub timer: TimerInstance,
    pub outcome: TriggerOutcome,
    /// Next instance of the lineage, for cycles with repetitions left
    pub successor: Option<TimerHandle>,
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub outcome: ScanOutcome,
    pub triggered: Vec<TriggeredTimer>,
    /// Earliest due date still in the store. Hosts may tick early for it.
    pub next_due: Option<Timestamp>,
}

impl TickReport {
    pub fn yielded(&self) -> bool {
        self.outcome == ScanOutcome::Yielded
    }
}

pub struct TimerManager {
    store: TimerStore,
    checker: DueDateChecker,
    clock: Box<dyn Clock + Send>,
    evaluator: Box<dyn ExpressionEvaluator + Send>,
    /// Journal entries not yet taken by the host
    events: Vec<TimerEvent>,
    last_tick: Option<Timestamp>,
}

impl TimerManager {
    pub fn new(
        config: &EngineConfig,
        clock: impl Clock + Send + 'static,
        evaluator: impl ExpressionEvaluator + Send + 'static,
    ) -> Self {
        Self::with_store(config, clock, evaluator, TimerStore::new())
    }

    /// Rebuild a manager from a previously taken event journal
    pub fn restore<'a>(
        config: &EngineConfig,
        clock: impl Clock + Send + 'static,
        evaluator: impl ExpressionEvaluator + Send + 'static,
        journal: impl IntoIterator<Item = &'a TimerEvent>,
    ) -> Result<Self, StoreError> {
        let store = TimerStore::replay(journal)?;
        info!(timers = store.len(), "Timer store restored from journal");
        Ok(Self::with_store(config, clock, evaluator, store))
    }

    fn with_store(
        config: &EngineConfig,
        clock: impl Clock + Send + 'static,
        evaluator: impl ExpressionEvaluator + Send + 'static,
        store: TimerStore,
    ) -> Self {
        let yield_budget = TimeDelta::from_std(config.yield_budget()).unwrap_or(TimeDelta::MAX);
        Self {
            store,
            checker: DueDateChecker::new(yield_budget),
            clock: Box::new(clock),
            evaluator: Box::new(evaluator),
            events: Vec::new(),
            last_tick: None,
        }
    }

    pub fn store(&self) -> &TimerStore {
        &self.store
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Journal entries recorded since the last call
    pub fn take_events(&mut self) -> Vec<TimerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[TimerEvent] {
        &self.events
    }

    // ─── Create ─────────────────────────────────────────────────────────────

    /// Create a timer for a catch point.
    ///
    /// On a [`CalculationError`] nothing is stored; the caller is expected to
    /// raise an incident (see [`TimerManager::raise_incident`]).
    pub fn create_timer(
        &mut self,
        definition: &TimerDefinition,
        owner: OwnerScope,
        process_definition_key: u64,
        target_element_id: &str,
        now: Timestamp,
        variables: &Variables,
    ) -> Result<TimerHandle, TimerError> {
        let due = calculator::compute(definition, now, variables, self.evaluator.as_ref())?;
        self.insert_timer(due, owner, process_definition_key, target_element_id)
    }

    fn insert_timer(
        &mut self,
        due: DueDate,
        owner: OwnerScope,
        process_definition_key: u64,
        target_element_id: &str,
    ) -> Result<TimerHandle, TimerError> {
        let timer = TimerInstance {
            key: self.store.next_key(),
            due_date: due.due_date,
            owner,
            process_definition_key,
            target_element_id: target_element_id.to_string(),
            repetitions_remaining: due.repetitions_remaining,
            repetition: due.repetition,
        };
        let handle = timer.handle();

        if let Err(err) = self.store.insert(timer.clone()) {
            error!(error = %err, "Refusing to create timer");
            return Err(err.into());
        }
        debug!(
            key = %handle.key,
            due_date = %handle.due_date,
            target = target_element_id,
            owner = %owner,
            "Timer created"
        );
        self.events.push(TimerEvent::Created(timer));
        Ok(handle)
    }

    /// Record an incident for a timer that could not be created
    pub fn raise_incident(
        &mut self,
        owner: OwnerScope,
        process_definition_key: u64,
        target_element_id: &str,
        error: &CalculationError,
    ) -> Incident {
        let incident =
            Incident::from_calculation_error(owner, process_definition_key, target_element_id, error);
        warn!(
            owner = %owner,
            target = target_element_id,
            reason = %incident.message,
            "Timer incident raised"
        );
        self.events.push(TimerEvent::IncidentRaised(incident.clone()));
        incident
    }

    // ─── Deploy ─────────────────────────────────────────────────────────────

    /// Create the start timer of a deployed process definition, unless the
    /// definition was redeployed unchanged and its lineage already exists.
    ///
    /// A live lineage of a changed definition under the same key is replaced,
    /// but only once the new due date is known.
    pub fn deploy_start_timer(
        &mut self,
        registry: &dyn DeploymentRegistry,
        process_definition_key: u64,
        target_element_id: &str,
        definition: &TimerDefinition,
        now: Timestamp,
        variables: &Variables,
    ) -> Result<StartTimerDeployment, TimerError> {
        let planned = self.plan_start_timer(
            registry,
            process_definition_key,
            target_element_id,
            definition,
            now,
            variables,
        )?;
        self.apply_start_timer(process_definition_key, target_element_id, planned)
    }

    /// Deploy every start timer of a process version. Start timers of the
    /// version it supersedes are canceled.
    ///
    /// All due dates are computed first. If any of them fails, the store is
    /// left untouched and the previous version keeps its start timers.
    pub fn deploy_process(
        &mut self,
        registry: &dyn DeploymentRegistry,
        deployment: &ProcessDeployment,
        now: Timestamp,
        variables: &Variables,
    ) -> Result<Vec<StartTimerDeployment>, TimerError> {
        let key = deployment.process_definition_key;
        let planned = deployment
            .start_timers
            .iter()
            .map(|start| {
                self.plan_start_timer(
                    registry,
                    key,
                    &start.target_element_id,
                    &start.definition,
                    now,
                    variables,
                )
            })
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|err| {
                warn!(
                    process_definition_key = key,
                    error = %err,
                    "Deployment rejected, start timers unchanged"
                );
            })?;

        if let Some(previous) = deployment.previous_version_key.filter(|previous| *previous != key) {
            let canceled = self.cancel_start_timers(previous);
            if canceled > 0 {
                info!(
                    previous,
                    current = key,
                    canceled,
                    "Start timers of superseded version canceled"
                );
            }
        }

        deployment
            .start_timers
            .iter()
            .zip(planned)
            .map(|(start, due)| self.apply_start_timer(key, &start.target_element_id, due))
            .collect()
    }

    /// Due date of a start timer to create, or `None` when the dedup rule
    /// keeps the existing lineage. Never touches the store.
    fn plan_start_timer(
        &self,
        registry: &dyn DeploymentRegistry,
        process_definition_key: u64,
        target_element_id: &str,
        definition: &TimerDefinition,
        now: Timestamp,
        variables: &Variables,
    ) -> Result<Option<DueDate>, TimerError> {
        if registry.is_latest_equivalent_definition(process_definition_key)
            && self
                .store
                .has_started_lineage(process_definition_key, target_element_id)
        {
            info!(
                process_definition_key,
                target = target_element_id,
                "Duplicate deployment, keeping existing start timer lineage"
            );
            return Ok(None);
        }
        let due = calculator::compute(definition, now, variables, self.evaluator.as_ref())?;
        Ok(Some(due))
    }

    fn apply_start_timer(
        &mut self,
        process_definition_key: u64,
        target_element_id: &str,
        planned: Option<DueDate>,
    ) -> Result<StartTimerDeployment, TimerError> {
        let Some(due) = planned else {
            return Ok(StartTimerDeployment::Skipped);
        };
        self.cancel_lineage(&LineageKey::Start {
            process_definition_key,
            target_element_id: target_element_id.to_string(),
        });
        let handle =
            self.insert_timer(due, OwnerScope::Unbound, process_definition_key, target_element_id)?;
        Ok(StartTimerDeployment::Created(handle))
    }

    // ─── Cancel ─────────────────────────────────────────────────────────────

    /// Cancel the live timer of one catch point. No-op if none is live.
    pub fn cancel_timer(
        &mut self,
        owner: ElementInstanceRef,
        target_element_id: &str,
    ) -> Option<TimerInstance> {
        self.cancel_lineage(&LineageKey::CatchPoint {
            owner,
            target_element_id: target_element_id.to_string(),
        })
    }

    fn cancel_lineage(&mut self, lineage: &LineageKey) -> Option<TimerInstance> {
        let key = self.store.by_lineage(lineage)?.key;
        let timer = self.store.remove(key)?;
        self.record_canceled(&timer);
        Some(timer)
    }

    /// Cancel every live timer of an owner, e.g. when its process instance is
    /// canceled. Returns how many were removed.
    pub fn cancel_all_timers(&mut self, owner: &OwnerScope) -> usize {
        let canceled = self.store.cancel_all_for_scope(owner);
        for timer in &canceled {
            self.record_canceled(timer);
        }
        canceled.len()
    }

    /// Cancel every live start timer of a process definition
    pub fn cancel_start_timers(&mut self, process_definition_key: u64) -> usize {
        let canceled = self.store.cancel_start_timers(process_definition_key);
        for timer in &canceled {
            self.record_canceled(timer);
        }
        canceled.len()
    }

    fn record_canceled(&mut self, timer: &TimerInstance) {
        debug!(key = %timer.key, target = %timer.target_element_id, "Timer canceled");
        self.events.push(TimerEvent::Canceled(timer.clone()));
    }

    // ─── Tick ───────────────────────────────────────────────────────────────

    /// Trigger every timer due at `now`, within the per-tick budget.
    ///
    /// An infrastructure failure of the callbacks aborts the tick; the timer
    /// being triggered stays live.
    pub fn tick(
        &mut self,
        now: Timestamp,
        callbacks: &mut dyn TimerCallbacks,
    ) -> Result<TickReport, TimerError> {
        if self.last_tick.is_some_and(|last| now < last) {
            warn!(now = %now, "Tick time moved backwards");
        }
        self.last_tick = Some(now);

        let mut triggered = Vec::new();
        let visitor = TriggerVisitor {
            callbacks,
            events: &mut self.events,
            triggered: &mut triggered,
        };
        let report = self
            .checker
            .check(&mut self.store, self.clock.as_ref(), now, visitor)?;

        if report.outcome == ScanOutcome::Yielded {
            info!(
                triggered = triggered.len(),
                remaining_due = self.store.iter_due(now).count(),
                "Timer checker yielded, remaining timers deferred to next tick"
            );
        }

        Ok(TickReport {
            outcome: report.outcome,
            triggered,
            next_due: report.next_due,
        })
    }

    /// [`TimerManager::tick`] at the clock's current time
    pub fn tick_now(&mut self, callbacks: &mut dyn TimerCallbacks) -> Result<TickReport, TimerError> {
        let now = self.clock.now();
        self.tick(now, callbacks)
    }
}

/// Checker delegate that triggers each visited timer
struct TriggerVisitor<'a> {
    callbacks: &'a mut dyn TimerCallbacks,
    events: &'a mut Vec<TimerEvent>,
    triggered: &'a mut Vec<TriggeredTimer>,
}

impl TimerVisitor for TriggerVisitor<'_> {
    type Error = TimerError;

    fn visit(&mut self, store: &mut TimerStore, timer: TimerInstance) -> Result<Visit, TimerError> {
        let triggered = trigger(store, self.events, self.callbacks, timer)?;
        self.triggered.push(triggered);
        Ok(Visit::Continue)
    }
}

fn trigger(
    store: &mut TimerStore,
    events: &mut Vec<TimerEvent>,
    callbacks: &mut dyn TimerCallbacks,
    timer: TimerInstance,
) -> Result<TriggeredTimer, TimerError> {
    let outcome = callbacks
        .on_timer_due(&timer.owner, &timer.target_element_id, timer.process_definition_key)
        .inspect_err(|err| {
            error!(key = %timer.key, error = %err, "Timer callback failed, aborting tick");
        })?;

    store.remove(timer.key);
    let successor = if timer.repeats_again() {
        let next = timer.rearmed(store.next_key());
        if next.is_none() {
            warn!(key = %timer.key, "Next due date out of range, ending timer cycle");
        }
        next
    } else {
        None
    };

    debug!(
        key = %timer.key,
        due_date = %timer.due_date,
        target = %timer.target_element_id,
        "Timer triggered"
    );
    events.push(TimerEvent::Triggered {
        timer: timer.clone(),
        outcome,
    });

    if let Some(next) = &successor {
        store.insert(next.clone())?;
        debug!(key = %next.key, due_date = %next.due_date, "Timer cycle re-armed");
        events.push(TimerEvent::Created(next.clone()));
    }

    Ok(TriggeredTimer {
        timer,
        outcome,
        successor: successor.map(|next| next.handle()),
    })
}

//! Scripted scenarios
//!
//! A scenario is a TOML file with an optional start time and a list of
//! steps that drive the engine against the simulated clock:
//!
//! ```toml
//! start = "2024-01-01T00:00:00Z"
//!
//! [[step]]
//! action = "create"
//! instance = 1
//! element = 10
//! target = "reminder"
//! kind = "duration"
//! definition = "PT10S"
//!
//! [[step]]
//! action = "advance"
//! by = "PT10S"
//! ```

use std::path::Path;

use duetimer_core::timers::iso;
use duetimer_core::{ControlledClock, ExpressionKind, OwnerScope, StartTimer};
use serde::Deserialize;

use crate::context::{Creation, Engine, parse_definition, parse_iso_duration};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// RFC 3339 start of simulated time; keeps the current clock when unset
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartTimerSpec {
    pub target: String,
    pub kind: ExpressionKind,
    pub definition: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Deploy {
        process: String,
        #[serde(default)]
        start_timers: Vec<StartTimerSpec>,
    },
    Undeploy {
        process: String,
    },
    Create {
        instance: u64,
        element: u64,
        target: String,
        kind: ExpressionKind,
        definition: String,
    },
    Cancel {
        instance: u64,
        element: u64,
        #[serde(default)]
        target: Option<String>,
    },
    Set {
        name: String,
        value: String,
    },
    /// Move the clock forward, then tick
    Advance {
        by: String,
    },
    Tick,
    /// Fail the next interpreter call
    FailNext,
    /// Check the number of live timers
    Expect {
        live: usize,
    },
}

/// Counters reported after a scenario run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub steps: usize,
    pub triggered: usize,
    pub incidents: usize,
    pub failed_ticks: usize,
}

impl Scenario {
    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        Self::from_toml(&text)
    }

    pub fn run(&self, engine: &mut Engine, clock: &ControlledClock) -> Result<Summary, String> {
        if let Some(start) = &self.start {
            clock.set(iso::parse_date_time(start).map_err(|e| e.to_string())?);
        }

        let mut summary = Summary::default();
        for (index, step) in self.steps.iter().enumerate() {
            run_step(step, engine, clock, &mut summary)
                .map_err(|e| format!("step {}: {}", index + 1, e))?;
            summary.steps += 1;
        }
        Ok(summary)
    }
}

fn run_step(
    step: &Step,
    engine: &mut Engine,
    clock: &ControlledClock,
    summary: &mut Summary,
) -> Result<(), String> {
    match step {
        Step::Deploy {
            process,
            start_timers,
        } => {
            let start_timers = start_timers
                .iter()
                .map(|spec| {
                    parse_definition(spec.kind, &spec.definition)
                        .map(|definition| StartTimer::new(spec.target.clone(), definition))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let (key, _) = engine
                .deploy(process, start_timers)
                .map_err(|e| e.to_string())?;
            tracing::debug!(process, key, "Scenario deployed process");
        }
        Step::Undeploy { process } => {
            engine
                .undeploy(process)
                .ok_or_else(|| format!("process '{process}' was never deployed"))?;
        }
        Step::Create {
            instance,
            element,
            target,
            kind,
            definition,
        } => {
            let definition = parse_definition(*kind, definition)?;
            let owner = OwnerScope::element(*instance, *element);
            match engine
                .create(owner, target, &definition)
                .map_err(|e| e.to_string())?
            {
                Creation::Created(_) => {}
                Creation::Incident(_) => summary.incidents += 1,
            }
        }
        Step::Cancel {
            instance,
            element,
            target,
        } => {
            engine.cancel(OwnerScope::element(*instance, *element), target.as_deref());
        }
        Step::Set { name, value } => engine.set_variable(name, value),
        Step::Advance { by } => {
            clock.advance(parse_iso_duration(by)?);
            tick(engine, summary);
        }
        Step::Tick => tick(engine, summary),
        Step::FailNext => engine.interpreter.fail_next(),
        Step::Expect { live } => {
            let actual = engine.manager.store().len();
            if actual != *live {
                return Err(format!("expected {live} live timers, found {actual}"));
            }
        }
    }
    Ok(())
}

/// A failed tick is reported, not fatal; the timer stays live
fn tick(engine: &mut Engine, summary: &mut Summary) {
    match engine.tick() {
        Ok(report) => summary.triggered += report.triggered.len(),
        Err(e) => {
            tracing::warn!(error = %e, "Scenario tick failed");
            summary.failed_ticks += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duetimer_core::EngineConfig;

    fn run(text: &str) -> Result<(Summary, Engine), String> {
        let clock = ControlledClock::at_millis(0);
        let mut engine = Engine::new(&EngineConfig::default(), clock.clone());
        let summary = Scenario::from_toml(text)?.run(&mut engine, &clock)?;
        Ok((summary, engine))
    }

    #[test]
    fn cycle_scenario_fires_three_times() {
        let (summary, _) = run(r#"
            start = "1970-01-01T00:00:00Z"

            [[step]]
            action = "create"
            instance = 1
            element = 2
            target = "poll"
            kind = "cycle"
            definition = "R3/1970-01-01T00:00:00Z/PT1S"

            [[step]]
            action = "advance"
            by = "PT1S"

            [[step]]
            action = "advance"
            by = "PT1S"

            [[step]]
            action = "advance"
            by = "PT1S"

            [[step]]
            action = "expect"
            live = 0
        "#)
        .unwrap();

        assert_eq!(summary.triggered, 3);
        assert_eq!(summary.steps, 5);
    }

    #[test]
    fn type_mismatch_becomes_an_incident() {
        let (summary, engine) = run(r#"
            [[step]]
            action = "set"
            name = "deadline"
            value = "2030-01-01T00:00:00Z"

            [[step]]
            action = "create"
            instance = 1
            element = 2
            target = "wait"
            kind = "duration"
            definition = "=deadline"

            [[step]]
            action = "expect"
            live = 0
        "#)
        .unwrap();

        assert_eq!(summary.incidents, 1);
        assert!(matches!(
            engine.journal.last(),
            Some(duetimer_core::TimerEvent::IncidentRaised(_))
        ));
    }

    #[test]
    fn identical_redeploy_does_not_duplicate_start_timers() {
        let (summary, engine) = run(r#"
            [[step]]
            action = "deploy"
            process = "billing"
            start_timers = [{ target = "nightly", kind = "cycle", definition = "R/PT1H" }]

            [[step]]
            action = "deploy"
            process = "billing"
            start_timers = [{ target = "nightly", kind = "cycle", definition = "R/PT1H" }]

            [[step]]
            action = "expect"
            live = 1

            [[step]]
            action = "advance"
            by = "PT1H"
        "#)
        .unwrap();

        assert_eq!(summary.triggered, 1);
        assert_eq!(engine.interpreter.activations(), 1);
    }

    #[test]
    fn redeploy_after_undeploy_recreates_start_timer() {
        let (summary, engine) = run(r#"
            [[step]]
            action = "deploy"
            process = "billing"
            start_timers = [{ target = "nightly", kind = "cycle", definition = "R/PT1H" }]

            [[step]]
            action = "undeploy"
            process = "billing"

            [[step]]
            action = "expect"
            live = 0

            [[step]]
            action = "deploy"
            process = "billing"
            start_timers = [{ target = "nightly", kind = "cycle", definition = "R/PT1H" }]

            [[step]]
            action = "expect"
            live = 1

            [[step]]
            action = "advance"
            by = "PT1H"
        "#)
        .unwrap();

        assert_eq!(summary.triggered, 1);
        assert_eq!(engine.deployments.processes(), vec![("billing", 2)]);
    }

    #[test]
    fn failed_tick_keeps_timer_for_the_next_one() {
        let (summary, _) = run(r#"
            [[step]]
            action = "create"
            instance = 1
            element = 2
            target = "wait"
            kind = "duration"
            definition = "PT1S"

            [[step]]
            action = "fail_next"

            [[step]]
            action = "advance"
            by = "PT1S"

            [[step]]
            action = "expect"
            live = 1

            [[step]]
            action = "tick"

            [[step]]
            action = "expect"
            live = 0
        "#)
        .unwrap();

        assert_eq!(summary.failed_ticks, 1);
        assert_eq!(summary.triggered, 1);
    }

    #[test]
    fn failing_expectation_names_the_step() {
        let err = run(r#"
            [[step]]
            action = "expect"
            live = 3
        "#)
        .err()
        .unwrap();
        assert_eq!(err, "step 1: expected 3 live timers, found 0");
    }
}

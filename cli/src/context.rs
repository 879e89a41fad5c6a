use std::sync::Arc;

use chrono::TimeDelta;
use duetimer_core::{
    CalculationError, ControlledClock, EngineConfig, EngineConfigExt, ExpressionKind, Incident,
    OwnerScope, StartTimer, StartTimerDeployment, TickReport, TimerDefinition, TimerError,
    TimerEvent, TimerHandle, TimerManager, Timestamp, Value, VariableEvaluator, Variables,
};
use tokio::sync::{Mutex, RwLock};

use crate::deployments::DeploymentLedger;
use crate::driver::DriverHandle;
use crate::interpreter::LoggingInterpreter;

/// Process definition key used for timers created outside a deployment
pub const ADHOC_DEFINITION_KEY: u64 = 0;

/// Result of asking the engine to create a catch-point timer
#[derive(Debug)]
pub enum Creation {
    Created(TimerHandle),
    /// The due date could not be computed; the scope is suspended
    Incident(Incident),
}

/// One simulated partition: the timer manager plus the engine pieces it
/// calls back into.
pub struct Engine {
    pub manager: TimerManager,
    pub interpreter: LoggingInterpreter,
    pub deployments: DeploymentLedger,
    pub variables: Variables,
    /// Every event the manager produced, in order
    pub journal: Vec<TimerEvent>,
}

impl Engine {
    pub fn new(config: &EngineConfig, clock: ControlledClock) -> Self {
        Self {
            manager: TimerManager::new(config, clock, VariableEvaluator),
            interpreter: LoggingInterpreter::default(),
            deployments: DeploymentLedger::default(),
            variables: Variables::new(),
            journal: Vec::new(),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.manager.now()
    }

    pub fn set_variable(&mut self, name: &str, value: &str) {
        self.variables
            .insert(name.to_string(), Value::from_literal(value));
    }

    pub fn create(
        &mut self,
        owner: OwnerScope,
        target_element_id: &str,
        definition: &TimerDefinition,
    ) -> Result<Creation, TimerError> {
        let now = self.now();
        let result = self.manager.create_timer(
            definition,
            owner,
            ADHOC_DEFINITION_KEY,
            target_element_id,
            now,
            &self.variables,
        );
        let creation = match result {
            Ok(handle) => Ok(Creation::Created(handle)),
            Err(TimerError::Calculation(error)) => Ok(Creation::Incident(self.incident(
                owner,
                target_element_id,
                &error,
            ))),
            Err(err) => Err(err),
        };
        self.collect_events();
        creation
    }

    fn incident(&mut self, owner: OwnerScope, target: &str, error: &CalculationError) -> Incident {
        self.manager
            .raise_incident(owner, ADHOC_DEFINITION_KEY, target, error)
    }

    pub fn deploy(
        &mut self,
        process_id: &str,
        start_timers: Vec<StartTimer>,
    ) -> Result<(u64, Vec<StartTimerDeployment>), TimerError> {
        let deployment = self.deployments.deploy(process_id, start_timers);
        let now = self.now();
        let result =
            self.manager
                .deploy_process(&self.deployments, &deployment, now, &self.variables);
        self.collect_events();
        Ok((deployment.process_definition_key, result?))
    }

    pub fn cancel(&mut self, owner: OwnerScope, target_element_id: Option<&str>) -> usize {
        let canceled = match (owner, target_element_id) {
            (OwnerScope::Element(owner), Some(target)) => {
                self.manager.cancel_timer(owner, target).map_or(0, |_| 1)
            }
            // start timers are canceled by undeploying their process
            (OwnerScope::Unbound, Some(_)) => 0,
            (_, None) => self.manager.cancel_all_timers(&owner),
        };
        self.collect_events();
        canceled
    }

    /// Retire the latest version of a process and cancel its start timers.
    /// Deploying it again creates a new version.
    pub fn undeploy(&mut self, process_id: &str) -> Option<usize> {
        let key = self.deployments.undeploy(process_id)?;
        let canceled = self.manager.cancel_start_timers(key);
        self.collect_events();
        Some(canceled)
    }

    pub fn tick(&mut self) -> Result<TickReport, TimerError> {
        let result = self.manager.tick_now(&mut self.interpreter);
        self.collect_events();
        result
    }

    fn collect_events(&mut self) {
        self.journal.extend(self.manager.take_events());
    }
}

/// Parse timer definition text; `=name` is an expression
pub fn parse_definition(kind: ExpressionKind, text: &str) -> Result<TimerDefinition, String> {
    TimerDefinition::parse(kind, text).map_err(|e| e.to_string())
}

/// Parse an ISO-8601 duration such as `PT5S`
pub fn parse_iso_duration(text: &str) -> Result<TimeDelta, String> {
    duetimer_core::timers::iso::parse_duration(text).map_err(|e| e.to_string())
}

/// Holds all shared state for the CLI application.
#[derive(Clone)]
pub struct CliContext {
    pub config: Arc<RwLock<EngineConfig>>,
    /// Simulated time. Only moved by `advance` or by the background driver.
    pub clock: ControlledClock,
    pub engine: Arc<Mutex<Engine>>,
    pub driver: Arc<Mutex<Option<DriverHandle>>>,
}

impl CliContext {
    pub fn new(config: EngineConfig, start: Timestamp) -> Self {
        let clock = ControlledClock::new(start);
        let engine = Engine::new(&config, clock.clone());
        Self {
            config: Arc::new(RwLock::new(config)),
            clock,
            engine: Arc::new(Mutex::new(engine)),
            driver: Arc::new(Mutex::new(None)),
        }
    }

    /// Load the config file, starting the simulated clock at wall-clock time
    pub fn load() -> Self {
        Self::new(EngineConfig::load_or_default(), chrono::Utc::now())
    }
}

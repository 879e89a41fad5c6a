pub mod clock;
pub mod config;
pub mod timers;

// Re-exports for convenience
pub use clock::{Clock, ControlledClock, SystemClock, Timestamp, timestamp_from_millis};
pub use config::{ConfigError, EngineConfig, EngineConfigExt, LoggingConfig};
pub use timers::{
    CalculationError, DeploymentRegistry, ExpressionEvaluator, ExpressionKind, Incident,
    OwnerScope, ProcessDeployment, StartTimer, StartTimerDeployment, TickReport, TimerCallbacks,
    TimerDefinition, TimerError, TimerEvent, TimerHandle, TimerInstance, TimerKey, TimerManager,
    TimerStore, TriggerOutcome, Value, VariableEvaluator, Variables,
};

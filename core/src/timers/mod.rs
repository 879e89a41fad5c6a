//! Due-date timer subsystem
//!
//! This module provides:
//! - **Definitions**: When a timer fires (duration, date-time, cycle, expression)
//! - **Calculator**: Resolves a definition to its first due date
//! - **Store**: Ordered index of live timers, rebuilt from the event journal
//! - **Checker**: Time-boxed scan that hands due timers to a visitor
//! - **Manager**: Creates, cancels and triggers timers, and re-arms cycles
//!
//! # Timer Owners
//!
//! Timers belong either to a catch point of a running process instance
//! (intermediate catch events, boundary events) or to a deployed process
//! definition (start timers, which create a new instance when they fire).

mod active;
mod calculator;
mod checker;
mod collaborators;
mod definition;
mod deployment;
mod error;
mod evaluator;
mod events;
pub mod iso;
mod manager;
mod store;

pub use active::{
    ElementInstanceRef, KeyGenerator, LineageKey, OwnerScope, Repetition, TimerHandle,
    TimerInstance, TimerKey,
};
pub use calculator::{DueDate, compute as compute_due_date};
pub use checker::{CheckReport, DueDateChecker, ScanOutcome, TimerVisitor, Visit, YieldingVisitor};
pub use collaborators::{DeploymentRegistry, TimerCallbacks, TriggerOutcome};
pub use definition::TimerDefinition;
pub use deployment::{ProcessDeployment, StartTimer, StartTimerDeployment};
pub use error::{
    CalculationError, DefinitionError, EvalError, InfrastructureError, StoreError, TimerError,
};
pub use evaluator::{
    CycleValue, ExpressionEvaluator, ExpressionKind, Value, ValueKind, VariableEvaluator,
    Variables,
};
pub use events::{Incident, TimerEvent};
pub use manager::{TickReport, TimerManager, TriggeredTimer};
pub use store::{DueCursor, TimerStore};

#[cfg(test)]
mod properties_tests;

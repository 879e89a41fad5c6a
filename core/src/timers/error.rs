//! Error types for timer operations

use thiserror::Error;

use super::active::{LineageKey, TimerKey};
use super::evaluator::ValueKind;

/// Errors while parsing the textual timer grammar (ISO-8601 durations,
/// RFC 3339 date-times, `R<n>/<anchor>/<interval>` cycles)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("invalid duration '{text}': {reason}")]
    InvalidDuration { text: String, reason: &'static str },

    #[error("invalid date-time '{text}'")]
    InvalidDateTime {
        text: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid cycle '{text}': {reason}")]
    InvalidCycle { text: String, reason: &'static str },
}

/// Failures reported by an expression evaluator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("no variable with name '{name}' in scope")]
    UnknownVariable { name: String },

    #[error("failed to evaluate expression '{expression}': {message}")]
    Failed { expression: String, message: String },
}

/// Why a due date could not be computed. Never creates a timer; the caller
/// turns it into an incident on the owning scope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalculationError {
    #[error(
        "expected the timer expression to evaluate to one of [{}], but was {actual}",
        kind_list(.expected)
    )]
    TypeMismatch {
        expected: Vec<ValueKind>,
        actual: ValueKind,
    },

    #[error("timer expression could not be evaluated")]
    EvaluationFailed(#[from] EvalError),

    #[error("timer expression produced an unparsable value")]
    InvalidLiteral(#[from] DefinitionError),

    #[error("repeating interval must be positive, was {interval_ms}ms")]
    InvalidCycle { interval_ms: i64 },

    #[error("due date is outside the representable time range")]
    OutOfRange,
}

fn kind_list(kinds: &[ValueKind]) -> String {
    kinds
        .iter()
        .map(ValueKind::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Store invariant violations. These indicate a caller defect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("timer {existing} is already live for {lineage}")]
    DuplicateLineage {
        lineage: LineageKey,
        existing: TimerKey,
    },

    #[error("timer {key} is already stored")]
    DuplicateKey { key: TimerKey },
}

/// Failure of the surrounding engine while handling a due timer. Fatal for
/// the current tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("infrastructure failure while triggering timer: {message}")]
pub struct InfrastructureError {
    pub message: String,
}

impl InfrastructureError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Top-level error for [`TimerManager`](super::TimerManager) operations
#[derive(Debug, Error)]
pub enum TimerError {
    #[error(transparent)]
    Calculation(#[from] CalculationError),

    #[error("timer store invariant violated")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),
}

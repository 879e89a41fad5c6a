//! Timer event journal
//!
//! Every store mutation made by the [`TimerManager`](super::TimerManager) is
//! recorded as a `TimerEvent`. Replaying the journal in order reproduces the
//! store exactly, so the journal is the durable record and the store is a
//! cache over it.

use super::active::{OwnerScope, TimerInstance};
use super::collaborators::TriggerOutcome;
use super::error::CalculationError;

#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    Created(TimerInstance),
    Triggered {
        timer: TimerInstance,
        outcome: TriggerOutcome,
    },
    Canceled(TimerInstance),
    IncidentRaised(Incident),
}

impl TimerEvent {
    pub fn timer(&self) -> Option<&TimerInstance> {
        match self {
            Self::Created(timer) | Self::Canceled(timer) | Self::Triggered { timer, .. } => {
                Some(timer)
            }
            Self::IncidentRaised(_) => None,
        }
    }
}

/// Failure attached to the owning scope when a timer cannot be created.
/// The scope stays suspended until the incident is resolved externally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incident {
    pub owner: OwnerScope,
    pub process_definition_key: u64,
    pub target_element_id: String,
    pub error: CalculationError,
    pub message: String,
}

impl Incident {
    pub fn from_calculation_error(
        owner: OwnerScope,
        process_definition_key: u64,
        target_element_id: &str,
        error: &CalculationError,
    ) -> Self {
        Self {
            owner,
            process_definition_key,
            target_element_id: target_element_id.to_string(),
            error: error.clone(),
            message: error_chain(error),
        }
    }
}

/// `outer: inner: innermost`
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timers::error::EvalError;

    #[test]
    fn incident_message_includes_the_cause() {
        let error = CalculationError::EvaluationFailed(EvalError::UnknownVariable {
            name: "wait".to_string(),
        });
        let incident =
            Incident::from_calculation_error(OwnerScope::element(1, 2), 9, "timer", &error);

        assert_eq!(
            incident.message,
            "timer expression could not be evaluated: no variable with name 'wait' in scope"
        );
        assert_eq!(incident.error, error);
    }
}

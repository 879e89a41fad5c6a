//! Interfaces of the engine components the timer subsystem calls back into

use super::active::OwnerScope;
use super::error::InfrastructureError;

/// What the process interpreter did with a due timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A catch point of a running instance was activated
    ElementActivated { element_instance_key: u64 },
    /// A start timer created a new process instance
    ProcessInstanceCreated { process_instance_key: u64 },
}

/// Notification hook of the process interpreter.
///
/// Called exactly once per triggered timer, synchronously. Business
/// conditions must not fail the call; an error means the engine itself is
/// broken and aborts the tick.
pub trait TimerCallbacks {
    fn on_timer_due(
        &mut self,
        owner: &OwnerScope,
        target_element_id: &str,
        process_definition_key: u64,
    ) -> Result<TriggerOutcome, InfrastructureError>;
}

/// Deployment identity queries
pub trait DeploymentRegistry {
    /// Whether this process definition is the latest version of its process
    /// and was (re)deployed with identical content
    fn is_latest_equivalent_definition(&self, process_definition_key: u64) -> bool;
}

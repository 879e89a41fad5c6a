//! Start timers of deployed process definitions

use super::active::TimerHandle;
use super::definition::TimerDefinition;

/// Timer start event of a process definition
#[derive(Debug, Clone, PartialEq)]
pub struct StartTimer {
    pub target_element_id: String,
    pub definition: TimerDefinition,
}

impl StartTimer {
    pub fn new(target_element_id: impl Into<String>, definition: TimerDefinition) -> Self {
        Self {
            target_element_id: target_element_id.into(),
            definition,
        }
    }
}

/// One deployed process definition version, as seen by the timer subsystem
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessDeployment {
    pub process_definition_key: u64,
    /// Key of the version this deployment replaces as "latest", if any.
    /// Its start timers are canceled.
    pub previous_version_key: Option<u64>,
    pub start_timers: Vec<StartTimer>,
}

/// What happened to one start timer of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTimerDeployment {
    Created(TimerHandle),
    /// The definition was redeployed unchanged; its lineage already exists
    Skipped,
}

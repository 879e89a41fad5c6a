//! Stand-in process interpreter
//!
//! Prints every due timer and hands out process instance keys for start
//! timers. It can be told to fail the next call to simulate a broken engine.

use duetimer_core::timers::InfrastructureError;
use duetimer_core::{OwnerScope, TimerCallbacks, TriggerOutcome};

/// First key handed out for instances created by start timers
const FIRST_INSTANCE_KEY: u64 = 1_000;

#[derive(Debug)]
pub struct LoggingInterpreter {
    next_instance_key: u64,
    fail_next: bool,
    activations: usize,
}

impl Default for LoggingInterpreter {
    fn default() -> Self {
        Self {
            next_instance_key: FIRST_INSTANCE_KEY,
            fail_next: false,
            activations: 0,
        }
    }
}

impl LoggingInterpreter {
    pub fn fail_next(&mut self) {
        self.fail_next = true;
    }

    pub fn activations(&self) -> usize {
        self.activations
    }
}

impl TimerCallbacks for LoggingInterpreter {
    fn on_timer_due(
        &mut self,
        owner: &OwnerScope,
        target_element_id: &str,
        process_definition_key: u64,
    ) -> Result<TriggerOutcome, InfrastructureError> {
        if std::mem::take(&mut self.fail_next) {
            return Err(InfrastructureError::new("simulated interpreter failure"));
        }
        self.activations += 1;

        let outcome = match owner {
            OwnerScope::Unbound => {
                let process_instance_key = self.next_instance_key;
                self.next_instance_key += 1;
                println!(
                    "  start '{target_element_id}' of definition {process_definition_key} -> instance {process_instance_key}"
                );
                TriggerOutcome::ProcessInstanceCreated {
                    process_instance_key,
                }
            }
            OwnerScope::Element(element) => {
                println!("  activate '{target_element_id}' ({owner})");
                TriggerOutcome::ElementActivated {
                    element_instance_key: element.element_instance_key,
                }
            }
        };
        tracing::info!(target = target_element_id, owner = %owner, "Timer delivered");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_timers_get_fresh_instance_keys() {
        let mut interpreter = LoggingInterpreter::default();
        let first = interpreter.on_timer_due(&OwnerScope::Unbound, "start", 1).unwrap();
        let second = interpreter.on_timer_due(&OwnerScope::Unbound, "start", 1).unwrap();

        assert_eq!(
            first,
            TriggerOutcome::ProcessInstanceCreated {
                process_instance_key: FIRST_INSTANCE_KEY
            }
        );
        assert_ne!(first, second);
        assert_eq!(interpreter.activations(), 2);
    }

    #[test]
    fn simulated_failure_affects_one_call() {
        let mut interpreter = LoggingInterpreter::default();
        interpreter.fail_next();
        let owner = OwnerScope::element(1, 2);

        assert!(interpreter.on_timer_due(&owner, "wait", 1).is_err());
        assert_eq!(
            interpreter.on_timer_due(&owner, "wait", 1),
            Ok(TriggerOutcome::ElementActivated {
                element_instance_key: 2
            })
        );
    }
}

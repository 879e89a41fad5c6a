//! In-memory deployment registry
//!
//! Assigns process definition keys the way a deployment service does:
//! redeploying a process with identical start timers keeps its key, any
//! change creates a new version with a new key that supersedes the old one.

use std::hash::{DefaultHasher, Hash, Hasher};

use duetimer_core::{DeploymentRegistry, ProcessDeployment, StartTimer};
use hashbrown::HashMap;

const FIRST_DEFINITION_KEY: u64 = 1;

#[derive(Debug, Clone, Copy)]
struct Version {
    key: u64,
    checksum: u64,
    /// Last deployment of this version repeated the previous content
    redeployed_unchanged: bool,
}

#[derive(Debug)]
pub struct DeploymentLedger {
    latest: HashMap<String, Version>,
    next_key: u64,
}

impl Default for DeploymentLedger {
    fn default() -> Self {
        Self {
            latest: HashMap::new(),
            next_key: FIRST_DEFINITION_KEY,
        }
    }
}

impl DeploymentLedger {
    /// Register a deployment of `process_id` and describe it for the timer
    /// subsystem
    pub fn deploy(&mut self, process_id: &str, start_timers: Vec<StartTimer>) -> ProcessDeployment {
        let checksum = checksum(&start_timers);

        if let Some(version) = self.latest.get_mut(process_id)
            && version.checksum == checksum
        {
            version.redeployed_unchanged = true;
            return ProcessDeployment {
                process_definition_key: version.key,
                previous_version_key: None,
                start_timers,
            };
        }

        let key = self.next_key;
        self.next_key += 1;
        let previous = self.latest.insert(
            process_id.to_string(),
            Version {
                key,
                checksum,
                redeployed_unchanged: false,
            },
        );
        tracing::debug!(process_id, key, "New process definition version");

        ProcessDeployment {
            process_definition_key: key,
            previous_version_key: previous.map(|v| v.key),
            start_timers,
        }
    }

    /// Retire the latest version of `process_id`, returning its key. The next
    /// deployment of the process gets a fresh key even if unchanged.
    pub fn undeploy(&mut self, process_id: &str) -> Option<u64> {
        let version = self.latest.remove(process_id)?;
        tracing::debug!(process_id, key = version.key, "Process definition undeployed");
        Some(version.key)
    }

    pub fn latest_key(&self, process_id: &str) -> Option<u64> {
        self.latest.get(process_id).map(|v| v.key)
    }

    /// `(process id, latest key)` pairs, sorted by process id
    pub fn processes(&self) -> Vec<(&str, u64)> {
        let mut processes: Vec<_> = self
            .latest
            .iter()
            .map(|(id, version)| (id.as_str(), version.key))
            .collect();
        processes.sort_unstable();
        processes
    }
}

impl DeploymentRegistry for DeploymentLedger {
    fn is_latest_equivalent_definition(&self, process_definition_key: u64) -> bool {
        self.latest
            .values()
            .any(|v| v.key == process_definition_key && v.redeployed_unchanged)
    }
}

fn checksum(start_timers: &[StartTimer]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for start in start_timers {
        start.target_element_id.hash(&mut hasher);
        start.definition.to_string().hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use duetimer_core::TimerDefinition;

    fn hourly() -> Vec<StartTimer> {
        vec![StartTimer::new("start", TimerDefinition::cycle("R/PT1H").unwrap())]
    }

    #[test]
    fn identical_redeploy_keeps_key() {
        let mut ledger = DeploymentLedger::default();
        let first = ledger.deploy("order", hourly());
        assert!(!ledger.is_latest_equivalent_definition(first.process_definition_key));

        let second = ledger.deploy("order", hourly());
        assert_eq!(second.process_definition_key, first.process_definition_key);
        assert_eq!(second.previous_version_key, None);
        assert!(ledger.is_latest_equivalent_definition(second.process_definition_key));
    }

    #[test]
    fn changed_redeploy_supersedes() {
        let mut ledger = DeploymentLedger::default();
        let first = ledger.deploy("order", hourly());
        let daily = vec![StartTimer::new("start", TimerDefinition::cycle("R/P1D").unwrap())];
        let second = ledger.deploy("order", daily);

        assert_ne!(second.process_definition_key, first.process_definition_key);
        assert_eq!(second.previous_version_key, Some(first.process_definition_key));
        assert!(!ledger.is_latest_equivalent_definition(second.process_definition_key));
        assert_eq!(ledger.latest_key("order"), Some(second.process_definition_key));
    }

    #[test]
    fn redeploy_after_undeploy_gets_fresh_key() {
        let mut ledger = DeploymentLedger::default();
        let first = ledger.deploy("order", hourly());
        assert_eq!(ledger.undeploy("order"), Some(first.process_definition_key));
        assert_eq!(ledger.undeploy("order"), None);
        assert!(ledger.processes().is_empty());

        let again = ledger.deploy("order", hourly());
        assert_ne!(again.process_definition_key, first.process_definition_key);
        assert_eq!(again.previous_version_key, None);
        assert!(!ledger.is_latest_equivalent_definition(again.process_definition_key));
    }
}

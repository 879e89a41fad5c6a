//! Timer state store
//!
//! Ordered index of live timers. The primary index is `(due_date, key)`,
//! which gives a total, replay-stable scan order. Secondary indexes serve
//! point lookups by key, by lineage, by owner scope and by process
//! definition (start timers).
//!
//! The store is a derived structure: it can be rebuilt from the timer event
//! journal with [`TimerStore::replay`].

use std::collections::BTreeSet;
use std::ops::Bound;

use hashbrown::{HashMap, HashSet};

use crate::clock::Timestamp;

use super::active::{
    ElementInstanceRef, KeyGenerator, LineageKey, OwnerScope, TimerInstance, TimerKey,
};
use super::error::StoreError;
use super::events::TimerEvent;

#[derive(Debug, Default)]
pub struct TimerStore {
    timers: HashMap<TimerKey, TimerInstance>,
    due_index: BTreeSet<(Timestamp, TimerKey)>,
    lineages: HashMap<LineageKey, TimerKey>,
    by_scope: HashMap<OwnerScope, BTreeSet<TimerKey>>,
    start_timers: HashMap<u64, BTreeSet<TimerKey>>,
    /// `(process definition, start event)` pairs that ever had a start timer
    started_lineages: HashSet<(u64, String)>,
    keys: KeyGenerator,
}

impl TimerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from its event journal, in log order
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a TimerEvent>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for event in events {
            store.apply(event)?;
        }
        Ok(store)
    }

    /// Apply one journal entry
    pub fn apply(&mut self, event: &TimerEvent) -> Result<(), StoreError> {
        match event {
            TimerEvent::Created(timer) => self.insert(timer.clone()),
            TimerEvent::Triggered { timer, .. } | TimerEvent::Canceled(timer) => {
                self.remove(timer.key);
                Ok(())
            }
            TimerEvent::IncidentRaised(_) => Ok(()),
        }
    }

    pub fn next_key(&mut self) -> TimerKey {
        self.keys.next_key()
    }

    pub fn insert(&mut self, timer: TimerInstance) -> Result<(), StoreError> {
        if self.timers.contains_key(&timer.key) {
            return Err(StoreError::DuplicateKey { key: timer.key });
        }
        let lineage = timer.lineage();
        if let Some(&existing) = self.lineages.get(&lineage) {
            return Err(StoreError::DuplicateLineage { lineage, existing });
        }

        self.keys.observe(timer.key);
        self.due_index.insert((timer.due_date, timer.key));
        self.by_scope.entry(timer.owner).or_default().insert(timer.key);
        if timer.is_start_timer() {
            self.start_timers
                .entry(timer.process_definition_key)
                .or_default()
                .insert(timer.key);
            self.started_lineages
                .insert((timer.process_definition_key, timer.target_element_id.clone()));
        }
        self.lineages.insert(lineage, timer.key);
        self.timers.insert(timer.key, timer);
        Ok(())
    }

    /// Remove a timer. Removing an unknown key is a no-op.
    pub fn remove(&mut self, key: TimerKey) -> Option<TimerInstance> {
        let timer = self.timers.remove(&key)?;

        self.due_index.remove(&(timer.due_date, key));
        let lineage = timer.lineage();
        if self.lineages.get(&lineage) == Some(&key) {
            self.lineages.remove(&lineage);
        }
        remove_from_index(&mut self.by_scope, &timer.owner, key);
        if timer.is_start_timer() {
            remove_from_index(&mut self.start_timers, &timer.process_definition_key, key);
        }
        Some(timer)
    }

    pub fn get(&self, key: TimerKey) -> Option<&TimerInstance> {
        self.timers.get(&key)
    }

    /// Live timer of a lineage
    pub fn by_lineage(&self, lineage: &LineageKey) -> Option<&TimerInstance> {
        self.lineages.get(lineage).and_then(|key| self.timers.get(key))
    }

    /// Live timer of one catch point of a running element
    pub fn by_owner_and_target(
        &self,
        owner: ElementInstanceRef,
        target_element_id: &str,
    ) -> Option<&TimerInstance> {
        self.by_lineage(&LineageKey::CatchPoint {
            owner,
            target_element_id: target_element_id.to_string(),
        })
    }

    /// Live start timer of one start event
    pub fn start_timer(
        &self,
        process_definition_key: u64,
        target_element_id: &str,
    ) -> Option<&TimerInstance> {
        self.by_lineage(&LineageKey::Start {
            process_definition_key,
            target_element_id: target_element_id.to_string(),
        })
    }

    /// Live timers of one owner, in key order
    pub fn by_scope(&self, owner: &OwnerScope) -> impl Iterator<Item = &TimerInstance> {
        self.by_scope
            .get(owner)
            .into_iter()
            .flatten()
            .filter_map(|key| self.timers.get(key))
    }

    /// Live start timers of one process definition, in key order
    pub fn start_timers_of(&self, process_definition_key: u64) -> impl Iterator<Item = &TimerInstance> {
        self.start_timers
            .get(&process_definition_key)
            .into_iter()
            .flatten()
            .filter_map(|key| self.timers.get(key))
    }

    /// Whether a start timer for this start event was ever created,
    /// including lineages that already ran to completion
    pub fn has_started_lineage(&self, process_definition_key: u64, target_element_id: &str) -> bool {
        self.started_lineages
            .contains(&(process_definition_key, target_element_id.to_string()))
    }

    /// Remove every live timer of an owner
    pub fn cancel_all_for_scope(&mut self, owner: &OwnerScope) -> Vec<TimerInstance> {
        let keys: Vec<TimerKey> = self
            .by_scope
            .get(owner)
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default();
        keys.into_iter().filter_map(|key| self.remove(key)).collect()
    }

    /// Remove every live start timer of a process definition
    pub fn cancel_start_timers(&mut self, process_definition_key: u64) -> Vec<TimerInstance> {
        let keys: Vec<TimerKey> = self
            .start_timers
            .get(&process_definition_key)
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default();
        keys.into_iter().filter_map(|key| self.remove(key)).collect()
    }

    /// Start a due-order scan over timers with `due_date <= upper`.
    ///
    /// The cursor only yields timers that exist when the scan starts, so a
    /// timer re-armed while the scan is running is first seen by the next
    /// scan.
    pub fn scan_due_ascending(&self, upper: Timestamp) -> DueCursor {
        DueCursor {
            upper,
            watermark: self.keys.watermark(),
            position: None,
        }
    }

    /// Read-only view of the due timers in scan order
    pub fn iter_due(&self, upper: Timestamp) -> impl Iterator<Item = &TimerInstance> {
        self.due_index
            .range(..=(upper, TimerKey(u64::MAX)))
            .filter_map(|(_, key)| self.timers.get(key))
    }

    /// All live timers in scan order
    pub fn iter(&self) -> impl Iterator<Item = &TimerInstance> {
        self.due_index.iter().filter_map(|(_, key)| self.timers.get(key))
    }

    pub fn earliest_due_date(&self) -> Option<Timestamp> {
        self.due_index.first().map(|(due, _)| *due)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

fn remove_from_index<K>(index: &mut HashMap<K, BTreeSet<TimerKey>>, slot: &K, key: TimerKey)
where
    K: std::hash::Hash + Eq,
{
    if let Some(keys) = index.get_mut(slot) {
        keys.remove(&key);
        if keys.is_empty() {
            index.remove(slot);
        }
    }
}

/// Live cursor over due timers.
///
/// The cursor holds no borrow of the store. Each step re-reads the store from
/// the last visited position, so timers removed between steps are never
/// returned. Dropping it mid-scan is always safe.
#[derive(Debug, Clone)]
pub struct DueCursor {
    upper: Timestamp,
    watermark: TimerKey,
    position: Option<(Timestamp, TimerKey)>,
}

impl DueCursor {
    pub fn next(&mut self, store: &TimerStore) -> Option<TimerInstance> {
        let lower = match self.position {
            Some(position) => Bound::Excluded(position),
            None => Bound::Unbounded,
        };
        let upper = Bound::Included((self.upper, TimerKey(u64::MAX)));

        let found = store
            .due_index
            .range((lower, upper))
            .find(|(_, key)| *key < self.watermark)
            .copied()?;
        self.position = Some(found);
        store.timers.get(&found.1).cloned()
    }
}

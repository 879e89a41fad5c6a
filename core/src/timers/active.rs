//! Live timer instances (runtime state)
//!
//! A `TimerInstance` is one scheduled firing of a timer. Cyclic timers are a
//! lineage of instances: each firing removes the current instance and, if
//! repetitions remain, inserts a successor with a fresh key.
//!
//! # Lifecycle
//!
//! 1. Catch point entered / process deployed → `TimerInstance` created
//! 2. Due date passes → checker triggers it
//! 3. Triggered → removed, successor inserted for cycles
//! 4. Owner canceled → removed

use std::fmt;

use chrono::TimeDelta;

use crate::clock::Timestamp;

/// Unique, monotonically assigned timer identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerKey(pub u64);

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Running element instance a timer is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementInstanceRef {
    pub process_instance_key: u64,
    pub element_instance_key: u64,
}

/// Who owns a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerScope {
    /// Process-definition-level start timer; firing creates a new instance
    Unbound,
    /// Catch point of a running process instance
    Element(ElementInstanceRef),
}

impl OwnerScope {
    pub fn element(process_instance_key: u64, element_instance_key: u64) -> Self {
        Self::Element(ElementInstanceRef {
            process_instance_key,
            element_instance_key,
        })
    }

    pub fn is_unbound(&self) -> bool {
        matches!(self, Self::Unbound)
    }
}

impl fmt::Display for OwnerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound => write!(f, "unbound"),
            Self::Element(r) => write!(
                f,
                "process {} / element {}",
                r.process_instance_key, r.element_instance_key
            ),
        }
    }
}

/// Identifies a timer lineage. At most one instance per lineage is live.
///
/// Start timers are distinguished by process definition, since versions of
/// different processes may share a start event id. A catch point of a running
/// element is identified by its owner and target alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LineageKey {
    Start {
        process_definition_key: u64,
        target_element_id: String,
    },
    CatchPoint {
        owner: ElementInstanceRef,
        target_element_id: String,
    },
}

impl LineageKey {
    pub fn of(owner: OwnerScope, process_definition_key: u64, target_element_id: &str) -> Self {
        let target_element_id = target_element_id.to_string();
        match owner {
            OwnerScope::Unbound => Self::Start {
                process_definition_key,
                target_element_id,
            },
            OwnerScope::Element(owner) => Self::CatchPoint {
                owner,
                target_element_id,
            },
        }
    }
}

impl fmt::Display for LineageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start {
                process_definition_key,
                target_element_id,
            } => write!(
                f,
                "start event '{target_element_id}' of definition {process_definition_key}"
            ),
            Self::CatchPoint {
                owner,
                target_element_id,
            } => write!(
                f,
                "'{target_element_id}' ({})",
                OwnerScope::Element(*owner)
            ),
        }
    }
}

/// Schedule of a cyclic timer.
///
/// Due dates are always derived from the original anchor, never from the
/// time a previous firing was processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repetition {
    pub anchor: Timestamp,
    pub interval: TimeDelta,
    /// Number of firings before this instance (0 for the first)
    pub firing_index: u32,
}

impl Repetition {
    pub fn first(anchor: Timestamp, interval: TimeDelta) -> Self {
        Self {
            anchor,
            interval,
            firing_index: 0,
        }
    }

    /// `anchor + firing_index · interval`, `None` on overflow
    pub fn due_date(&self) -> Option<Timestamp> {
        let steps = i32::try_from(self.firing_index).ok()?;
        let offset = self.interval.checked_mul(steps)?;
        self.anchor.checked_add_signed(offset)
    }

    pub fn next(&self) -> Option<Self> {
        Some(Self {
            firing_index: self.firing_index.checked_add(1)?,
            ..*self
        })
    }
}

/// A live timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerInstance {
    pub key: TimerKey,
    pub due_date: Timestamp,
    pub owner: OwnerScope,
    pub process_definition_key: u64,
    /// Catch point activated when the timer fires
    pub target_element_id: String,
    /// Firings left including this one (`None` = unbounded).
    /// `Some(0)` and `Some(1)` both end the lineage on trigger.
    pub repetitions_remaining: Option<u32>,
    pub repetition: Option<Repetition>,
}

impl TimerInstance {
    pub fn lineage(&self) -> LineageKey {
        LineageKey::of(self.owner, self.process_definition_key, &self.target_element_id)
    }

    pub fn handle(&self) -> TimerHandle {
        TimerHandle {
            key: self.key,
            due_date: self.due_date,
        }
    }

    pub fn is_due(&self, now: Timestamp) -> bool {
        self.due_date <= now
    }

    pub fn is_start_timer(&self) -> bool {
        self.owner.is_unbound()
    }

    /// Whether triggering this instance continues the lineage
    pub fn repeats_again(&self) -> bool {
        self.repetition.is_some()
            && match self.repetitions_remaining {
                None => true,
                Some(n) => n > 1,
            }
    }

    /// Successor instance for the next firing, or `None` when the lineage
    /// ends (no repetitions left, or the next due date overflows).
    pub fn rearmed(&self, key: TimerKey) -> Option<TimerInstance> {
        if !self.repeats_again() {
            return None;
        }
        let repetition = self.repetition?.next()?;
        Some(TimerInstance {
            key,
            due_date: repetition.due_date()?,
            owner: self.owner,
            process_definition_key: self.process_definition_key,
            target_element_id: self.target_element_id.clone(),
            repetitions_remaining: self.repetitions_remaining.map(|n| n - 1),
            repetition: Some(repetition),
        })
    }
}

/// Returned to callers when a timer is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    pub key: TimerKey,
    pub due_date: Timestamp,
}

/// Monotonic key allocator
#[derive(Debug, Clone, Default)]
pub struct KeyGenerator {
    next: u64,
}

impl KeyGenerator {
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    pub fn next_key(&mut self) -> TimerKey {
        let key = TimerKey(self.next);
        self.next += 1;
        key
    }

    /// First key not yet handed out
    pub fn watermark(&self) -> TimerKey {
        TimerKey(self.next)
    }

    /// Keep the generator ahead of a key seen during replay
    pub fn observe(&mut self, key: TimerKey) {
        self.next = self.next.max(key.0 + 1);
    }
}

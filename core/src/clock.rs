//! Time sources for the timer engine
//!
//! The engine never reads the system time directly. Production hosts pass a
//! [`SystemClock`]; tests and simulations pass a [`ControlledClock`] and move
//! it forward explicitly.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};

/// Absolute point in time used for due dates (UTC, millisecond precision)
pub type Timestamp = DateTime<Utc>;

/// Convert epoch milliseconds into a [`Timestamp`], saturating at the
/// representable range.
pub fn timestamp_from_millis(millis: i64) -> Timestamp {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(if millis < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Source of "now". Read-only from the engine's point of view.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Manually driven clock.
///
/// Clones share the same underlying instant, so a test can keep a handle and
/// advance the time the engine observes.
#[derive(Debug, Clone, Default)]
pub struct ControlledClock {
    millis: Arc<AtomicI64>,
}

impl ControlledClock {
    pub fn new(start: Timestamp) -> Self {
        Self::at_millis(start.timestamp_millis())
    }

    pub fn at_millis(millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(millis)),
        }
    }

    pub fn set(&self, instant: Timestamp) {
        self.millis
            .store(instant.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: TimeDelta) {
        self.millis
            .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }

    pub fn millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

impl Clock for ControlledClock {
    fn now(&self) -> Timestamp {
        timestamp_from_millis(self.millis())
    }
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

//! Logical timestamps for last-writer-wins ordering.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time in nanoseconds since the Unix epoch.
pub type WallClock = Box<dyn Fn() -> i64 + Send + Sync>;

/// Issues strictly increasing timestamps derived from wall-clock time.
///
/// When the wall clock has moved past the last issued value, the wall clock
/// reading is returned. Otherwise (rapid successive calls, or the clock went
/// backwards) the last issued value plus one is returned.
///
/// This is a scalar clock. It carries no cross-node causality: if two nodes'
/// clocks drift, last-writer-wins can discard a causally later write from
/// the lagging node.
pub struct LogicalClock {
    last_issued: Mutex<i64>,
    wall: WallClock,
}

impl LogicalClock {
    /// Creates a clock backed by the system time, seeded with the current time.
    pub fn new() -> Self {
        Self::with_wall_clock(Box::new(system_nanos))
    }

    /// Creates a clock backed by a custom time source, seeded from it.
    pub fn with_wall_clock(wall: WallClock) -> Self {
        let seed = wall();
        Self {
            last_issued: Mutex::new(seed),
            wall,
        }
    }

    /// Returns a timestamp greater than every value previously returned.
    pub fn next_timestamp(&self) -> i64 {
        let now = (self.wall)();
        let mut last = self
            .last_issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let next = if now > *last { now } else { *last + 1 };
        *last = next;
        next
    }

    /// The most recently issued timestamp (or the seed if none was issued yet).
    pub fn last_issued(&self) -> i64 {
        *self
            .last_issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LogicalClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogicalClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicalClock")
            .field("last_issued", &self.last_issued())
            .finish_non_exhaustive()
    }
}

fn system_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

//! In-memory key-value storage with last-writer-wins merge.
//!
//! Every node owns one `LocalStore`. Client writes coordinated by this node
//! and writes replicated from peers both land here, and both go through the
//! same merge rule, so the order in which they arrive does not matter except
//! for equal timestamps.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// A payload stamped with the logical time it was written at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    pub payload: String,
    pub timestamp: i64,
}

impl Value {
    pub fn new(payload: impl Into<String>, timestamp: i64) -> Self {
        Self {
            payload: payload.into(),
            timestamp,
        }
    }
}

/// Thread-safe key-value store used by each node.
///
/// # Why RwLock?
///
/// Reads (local GETs, the local leg of a read quorum, status snapshots) are
/// expected to outnumber writes, and they never conflict with each other.
/// Writers take the lock exclusively. The lock is never held across an
/// `.await`, so the std lock is fine inside async handlers.
#[derive(Debug, Default)]
pub struct LocalStore {
    data: RwLock<HashMap<String, Value>>,
}

impl LocalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieves the current value for a key, or `None` if it was never written.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Merges `value` into the store under last-writer-wins.
    ///
    /// The incoming value replaces the stored one iff its timestamp is greater
    /// than or equal to the stored timestamp. Equal timestamps therefore favor
    /// whichever write is applied last. Returns `true` when the value was
    /// accepted.
    pub fn put(&self, key: String, value: Value) -> bool {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        match data.get(&key) {
            Some(current) if current.timestamp > value.timestamp => false,
            _ => {
                data.insert(key, value);
                true
            }
        }
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.data.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a sorted copy of all entries.
    ///
    /// Clones the map so the lock is released before the caller iterates.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

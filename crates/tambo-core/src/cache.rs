//! # Time-Boxed Cache
//!
//! Key/value entries that are fresh for `ttl` after insertion.
//!
//! Expired entries are not dropped on read: `peek_stale` still returns them.
//! The ledger uses that to remember the last session state it saw before the
//! store went away, so an offline sale can still be refused against a
//! register known to be closed.
//!
//! Like the limiter, every method takes `now` explicitly.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
}

#[derive(Debug, Clone)]
pub struct TimedCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, Entry<V>>,
}

impl<K: Eq + Hash, V: Clone> TimedCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, if any.
    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        self.entries
            .get(key)
            .filter(|e| now.saturating_duration_since(e.stored_at) < self.ttl)
            .map(|e| e.value.clone())
    }

    /// Last stored value for `key`, however old, with its age.
    pub fn peek_stale(&self, key: &K, now: Instant) -> Option<(V, Duration)> {
        self.entries
            .get(key)
            .map(|e| (e.value.clone(), now.saturating_duration_since(e.stored_at)))
    }

    pub fn insert_at(&mut self, key: K, value: V, now: Instant) {
        self.entries.insert(
            key,
            Entry {
                value,
                stored_at: now,
            },
        );
    }

    pub fn invalidate(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops expired entries; returns how many were removed.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.stored_at) < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

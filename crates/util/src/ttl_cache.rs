//! Keyed cache with a fixed time-to-live per entry.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry<T> {
    value: T,
    stored_at: Instant,
}

/// A small thread-safe cache where each entry expires `ttl` after insertion.
///
/// Owned by whichever component needs it; there is no global instance.
pub struct TtlCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return a clone of the entry if it is still fresh.
    pub fn get(&self, key: &str) -> Option<T> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<T> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        if now.saturating_duration_since(entry.stored_at) < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: T) {
        self.insert_at(key.into(), value, Instant::now());
    }

    fn insert_at(&self, key: String, value: T, stored_at: Instant) {
        let mut entries = self.entries.lock();
        entries.retain(|_, e| stored_at.saturating_duration_since(e.stored_at) < self.ttl);
        entries.insert(key, Entry { value, stored_at });
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

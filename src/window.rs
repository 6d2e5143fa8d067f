//! # Window Store
//! Recently accepted goal events, keyed by their raw announcement text.
//!
//! Entries are only created by a novel classification (or restored from disk)
//! and only removed by eviction. Insert and eviction share one write lock, so
//! a check-and-insert can never interleave with the removal of the same key.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::goal::GoalEvent;

/// Default retention horizon (5 minutes).
pub const DEFAULT_HORIZON: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct StoredEvent {
    event: Arc<GoalEvent>,
    inserted_at: DateTime<Utc>,
}

/// Thread-safe map of recent goal events.
#[derive(Debug)]
pub struct WindowStore {
    inner: RwLock<HashMap<String, StoredEvent>>,
    horizon: Duration,
}

impl Default for WindowStore {
    fn default() -> Self {
        Self::with_horizon(DEFAULT_HORIZON)
    }
}

impl WindowStore {
    pub fn with_horizon(horizon: Duration) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            horizon,
        }
    }

    pub fn horizon(&self) -> Duration {
        self.horizon
    }

    /// Insert `event` under `key` unless the key is already present.
    ///
    /// Returns `false` (and leaves the store untouched) when the key exists.
    /// An entry already past the horizon counts as absent and is replaced.
    pub fn try_insert_if_absent(&self, key: &str, event: Arc<GoalEvent>, now: DateTime<Utc>) -> bool {
        use std::collections::hash_map::Entry;

        let mut map = self.inner.write();
        match map.entry(key.to_string()) {
            Entry::Occupied(mut slot) if age(now, slot.get().inserted_at) > self.horizon => {
                slot.insert(StoredEvent {
                    event,
                    inserted_at: now,
                });
                true
            }
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(StoredEvent {
                    event,
                    inserted_at: now,
                });
                true
            }
        }
    }

    /// Point-in-time copy of entries no older than the horizon.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Vec<(Arc<GoalEvent>, DateTime<Utc>)> {
        let map = self.inner.read();
        map.values()
            .filter(|s| age(now, s.inserted_at) <= self.horizon)
            .map(|s| (Arc::clone(&s.event), s.inserted_at))
            .collect()
    }

    /// Entry stored under `key`, regardless of age.
    pub fn get(&self, key: &str) -> Option<(Arc<GoalEvent>, DateTime<Utc>)> {
        self.inner
            .read()
            .get(key)
            .map(|s| (Arc::clone(&s.event), s.inserted_at))
    }

    /// Remove entries older than `horizon`. Returns how many were removed.
    pub fn evict_older_than(&self, now: DateTime<Utc>, horizon: Duration) -> usize {
        let mut map = self.inner.write();
        let before = map.len();
        map.retain(|_, s| age(now, s.inserted_at) <= horizon);
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// `(key, source_url, inserted_at)` triples for the persistence layer.
    pub fn persisted(&self) -> Vec<(String, String, DateTime<Utc>)> {
        let map = self.inner.read();
        let mut out: Vec<_> = map
            .iter()
            .map(|(k, s)| (k.clone(), s.event.source_url.clone(), s.inserted_at))
            .collect();
        out.sort_by(|a, b| a.2.cmp(&b.2));
        out
    }

    /// Load previously persisted entries. Existing keys are kept as they are.
    /// Returns how many entries were added.
    pub fn restore<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (String, Arc<GoalEvent>, DateTime<Utc>)>,
    {
        let mut map = self.inner.write();
        let mut added = 0usize;
        for (key, event, inserted_at) in entries {
            if !map.contains_key(&key) {
                map.insert(key, StoredEvent { event, inserted_at });
                added += 1;
            }
        }
        added
    }
}

/// Age of an entry; entries stamped in the future count as age zero.
fn age(now: DateTime<Utc>, inserted_at: DateTime<Utc>) -> Duration {
    (now - inserted_at).to_std().unwrap_or(Duration::ZERO)
}

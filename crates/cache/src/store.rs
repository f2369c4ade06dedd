//! In-process LRU cache backend with TTL eviction, plus the
//! `ExternalCacheBackend` trait a deployment can plug in ahead of it
//! (§4.4: "two backends ... selected by config").

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

/// A pluggable external key/value store (e.g. Redis) with its own TTL
/// support. No concrete implementation ships in this crate — see
/// DESIGN.md for why — but the trait lets a deployment provide one
/// without touching `Cache` itself.
#[async_trait]
pub trait ExternalCacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, String>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), String>;
}

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
    inserted_at: Instant,
}

/// In-process, single-map cache: reads take a shared lock, writes and the
/// sweep take an exclusive lock (§5 locking discipline). Capacity is
/// enforced by evicting the oldest entries once the map exceeds
/// `max_entries`.
pub struct InProcessCache {
    entries: RwLock<HashMap<String, Entry>>,
    max_entries: usize,
}

impl InProcessCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn set(&self, key: String, value: Vec<u8>, ttl: Duration) {
        let mut entries = self.entries.write();
        let now = Instant::now();
        entries.insert(
            key,
            Entry {
                value,
                expires_at: now + ttl,
                inserted_at: now,
            },
        );
        let len = entries.len();
        if len > self.max_entries {
            Self::evict_oldest(&mut entries, len - self.max_entries);
        }
    }

    fn evict_oldest(entries: &mut HashMap<String, Entry>, count: usize) {
        let mut keys: Vec<(String, Instant)> = entries
            .iter()
            .map(|(k, v)| (k.clone(), v.inserted_at))
            .collect();
        keys.sort_by_key(|(_, inserted_at)| *inserted_at);
        for (key, _) in keys.into_iter().take(count) {
            entries.remove(&key);
        }
    }

    /// Removes expired entries. Called periodically by a background task
    /// (§4.4: "sweep cadence >= 1 minute").
    pub fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, v| v.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! TTL + LRU cache for resolved key material.
//!
//! Keyed by `(did, key_id)`. Lookups take the read lock and bump a
//! monotonic use counter; expiry eviction and inserts take the write lock.
//! Capacity eviction removes the least-recently-used entry.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry {
    key: Vec<u8>,
    stored_at: Instant,
    last_used: AtomicU64,
}

/// Bounded cache with per-entry TTL.
#[derive(Debug)]
pub struct KeyCache {
    entries: RwLock<HashMap<(String, Option<String>), Entry>>,
    clock: AtomicU64,
    ttl: Duration,
    capacity: usize,
}

impl KeyCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Returns the cached key bytes if present and fresh. Expired entries
    /// are evicted on access.
    pub fn get(&self, did: &str, key_id: Option<&str>) -> Option<Vec<u8>> {
        let lookup = (did.to_string(), key_id.map(str::to_string));

        {
            let entries = self.entries.read();
            if let Some(entry) = entries.get(&lookup) {
                if entry.stored_at.elapsed() < self.ttl {
                    let tick = self.clock.fetch_add(1, Ordering::Relaxed);
                    entry.last_used.store(tick, Ordering::Relaxed);
                    return Some(entry.key.clone());
                }
            } else {
                return None;
            }
        }

        // Entry exists but is stale; take the write lock to drop it.
        self.entries.write().remove(&lookup);
        None
    }

    /// Stores key bytes, evicting the least-recently-used entry when at
    /// capacity.
    pub fn insert(&self, did: &str, key_id: Option<&str>, key: Vec<u8>) {
        let mut entries = self.entries.write();

        if entries.len() >= self.capacity {
            let victim = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                entries.remove(&victim);
            }
        }

        let tick = self.clock.fetch_add(1, Ordering::Relaxed);
        entries.insert(
            (did.to_string(), key_id.map(str::to_string)),
            Entry {
                key,
                stored_at: Instant::now(),
                last_used: AtomicU64::new(tick),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

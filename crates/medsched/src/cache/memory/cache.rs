//! In-memory cache implementation with LRU eviction.
//!
//! Thread-safe cache with sliding TTL support using tokio synchronization
//! primitives and LRU eviction policy.
//!
//! Group tagging works the same way here as it would against a shared cache:
//! - Every key is tracked under each of its group keys
//! - Evicting a group removes the group's keys and their tracking in one
//!   critical section, so concurrent writers of the same group never observe
//!   a half-evicted group
//! - Keys evicted by LRU pressure are untracked as they fall out

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use medsched_core::cache::{Cache, Expiration, Result};

/// A single cache entry with group tags and optional sliding expiration.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    groups: Vec<String>,
    expiration: Expiration,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: Vec<u8>, groups: Vec<String>, expiration: Expiration) -> Self {
        let expires_at = match expiration {
            Expiration::None => None,
            Expiration::Sliding(ttl) => Some(Instant::now() + ttl),
        };
        Self {
            value,
            groups,
            expiration,
            expires_at,
        }
    }

    /// Returns true if this entry has expired.
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }

    /// Restarts a sliding TTL. Called on every read of a live entry.
    fn touch(&mut self) {
        if let Expiration::Sliding(ttl) = self.expiration {
            self.expires_at = Some(Instant::now() + ttl);
        }
    }
}

/// In-memory cache implementation with LRU eviction and group tracking.
///
/// Uses `Arc<RwLock<LruCache>>` for the store and a group → keys map for
/// eviction by group key. Expired entries are cleaned up lazily on access.
///
/// Lock order is always store then tracking.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    /// Main key-value store with LRU eviction.
    store: Arc<RwLock<LruCache<String, CacheEntry>>>,
    /// Maps group key -> set of cache keys tagged with it.
    tracking: Arc<RwLock<HashMap<String, HashSet<String>>>>,
}

impl MemoryCache {
    /// Creates a new in-memory cache with LRU eviction.
    ///
    /// # Panics
    ///
    /// Panics if `max_entries` is 0.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).expect("max_entries must be > 0");
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
            tracking: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn untrack(&self, key: &str, groups: &[String]) {
        let mut tracking = self.tracking.write().await;
        for group in groups {
            if let Some(keys) = tracking.get_mut(group) {
                keys.remove(key);
                if keys.is_empty() {
                    tracking.remove(group);
                }
            }
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let expired_groups = {
            let mut store = self.store.write().await;

            match store.get_mut(key) {
                Some(entry) if entry.is_expired() => {
                    let groups = entry.groups.clone();
                    store.pop(key);
                    Some(groups)
                }
                Some(entry) => {
                    entry.touch();
                    return Ok(Some(entry.value.clone()));
                }
                None => return Ok(None),
            }
        };

        if let Some(groups) = expired_groups {
            self.untrack(key, &groups).await;
        }
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        groups: &[String],
        expiration: Expiration,
    ) -> Result<()> {
        // Both locks held for the whole write, so a concurrent `evict_group`
        // sees the entry and its tracking together or not at all.
        let mut store = self.store.write().await;
        let mut tracking = self.tracking.write().await;

        let entry = CacheEntry::new(value.to_vec(), groups.to_vec(), expiration);

        // An entry pushed out by LRU pressure (or replaced under the same
        // key) must not linger in the tracking map.
        if let Some((evicted_key, evicted_entry)) = store.push(key.to_string(), entry) {
            for group in &evicted_entry.groups {
                if let Some(keys) = tracking.get_mut(group) {
                    keys.remove(&evicted_key);
                    if keys.is_empty() {
                        tracking.remove(group);
                    }
                }
            }
        }

        for group in groups {
            tracking
                .entry(group.clone())
                .or_default()
                .insert(key.to_string());
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let removed = {
            let mut store = self.store.write().await;
            store.pop(key)
        };

        if let Some(entry) = removed {
            self.untrack(key, &entry.groups).await;
        }
        Ok(())
    }

    async fn evict_group(&self, group: &str) -> Result<()> {
        // Both locks held for the whole eviction: a concurrent `set` into the
        // same group lands either entirely before or entirely after it.
        let mut store = self.store.write().await;
        let mut tracking = self.tracking.write().await;

        let Some(keys) = tracking.remove(group) else {
            return Ok(());
        };

        for key in &keys {
            if let Some(entry) = store.pop(key) {
                for other_group in entry.groups.iter().filter(|g| g.as_str() != group) {
                    if let Some(other_keys) = tracking.get_mut(other_group) {
                        other_keys.remove(key);
                        if other_keys.is_empty() {
                            tracking.remove(other_group);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

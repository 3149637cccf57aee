//! TTL-bounded LRU store of annotated comment pages.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::comments::AnnotatedComment;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const METRIC_CACHE_HIT: &str = "feddit_cache_hit_total";
const METRIC_CACHE_MISS: &str = "feddit_cache_miss_total";
const METRIC_CACHE_EXPIRED: &str = "feddit_cache_expired_total";
const METRIC_CACHE_EVICT: &str = "feddit_cache_evict_total";

/// The full annotated page fetched for one key.
///
/// Entries are never mutated; a refresh replaces the whole `Arc`.
#[derive(Debug)]
pub struct CacheEntry {
    subfeddit_id: i64,
    comments: Vec<AnnotatedComment>,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    pub fn new(subfeddit_id: i64, comments: Vec<AnnotatedComment>, ttl: Duration) -> Self {
        Self {
            subfeddit_id,
            comments,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    pub fn subfeddit_id(&self) -> i64 {
        self.subfeddit_id
    }

    /// Comments in upstream order.
    pub fn comments(&self) -> &[AnnotatedComment] {
        &self.comments
    }

    /// An entry exactly `ttl` old is still fresh.
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) <= self.ttl
    }
}

/// Bounded result cache.
///
/// Expiry is checked on every read; capacity overflow evicts the least
/// recently used entry. Reads share the map lock and only writers take it
/// exclusively, each for a single map operation. Readers receive a shared
/// `Arc`, so no reader ever observes a partially written entry.
pub struct ResultCache {
    ttl: Duration,
    entries: RwLock<LruCache<CacheKey, Arc<CacheEntry>>>,
}

impl ResultCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ttl: config.ttl,
            entries: RwLock::new(LruCache::new(config.max_entries_non_zero())),
        }
    }

    /// TTL stamped onto entries built for this cache.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        rw_read(&self.entries, "capacity").cap().get()
    }

    /// Return the entry for `key` if it is still fresh; an expired entry is
    /// removed and reported as absent.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let now = Instant::now();
        let lookup = rw_read(&self.entries, "get")
            .peek(key)
            .map(|entry| (entry.is_fresh_at(now), Arc::clone(entry)));

        match lookup {
            Some((true, entry)) => {
                self.touch(key);
                counter!(METRIC_CACHE_HIT).increment(1);
                Some(entry)
            }
            Some((false, stale)) => {
                let mut entries = rw_write(&self.entries, "get.expire");
                // A concurrent put may already have replaced the stale entry.
                if entries
                    .peek(key)
                    .is_some_and(|current| Arc::ptr_eq(current, &stale))
                {
                    entries.pop(key);
                }
                counter!(METRIC_CACHE_EXPIRED).increment(1);
                counter!(METRIC_CACHE_MISS).increment(1);
                debug!(key = %key, "Cache entry expired");
                None
            }
            None => {
                counter!(METRIC_CACHE_MISS).increment(1);
                None
            }
        }
    }

    /// Mark `key` as most recently used. Skipped while another thread holds
    /// the map, so recency is exact only without contention.
    fn touch(&self, key: &CacheKey) {
        if let Ok(mut entries) = self.entries.try_write() {
            entries.promote(key);
        }
    }

    /// Insert or replace the entry for `key`.
    ///
    /// Returns the key evicted to make room, if any. Replacing an existing key
    /// never evicts.
    pub fn put(&self, key: CacheKey, entry: Arc<CacheEntry>) -> Option<CacheKey> {
        let displaced = rw_write(&self.entries, "put").push(key.clone(), entry);

        let evicted = displaced
            .map(|(displaced_key, _)| displaced_key)
            .filter(|displaced_key| *displaced_key != key);

        if let Some(evicted_key) = evicted.as_ref() {
            counter!(METRIC_CACHE_EVICT).increment(1);
            debug!(evicted = %evicted_key, inserted = %key, "Cache entry evicted");
        }

        evicted
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, "purge_expired");
        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }

        if !expired.is_empty() {
            counter!(METRIC_CACHE_EXPIRED).increment(expired.len() as u64);
        }

        expired.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! In-memory result cache keyed by the content hash of the prompt text.
//!
//! Entries expire after `cache.ttl_secs`. Expired entries are dropped on read
//! and by the periodic [`ResultCache::sweep`]. TTL and capacity are read from
//! the dynamic config on every call so settings changes apply immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::analysis::Analysis;
use crate::config::RuntimeConfig;
use crate::llm::Provider;

/// A finished simplification, as served from the cache
#[derive(Debug, Clone)]
pub struct CachedSimplification {
    pub text: String,
    pub provider: Provider,
    pub model: String,
    pub analysis: Analysis,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedSimplification,
    inserted_at: Instant,
}

#[derive(Debug, Clone)]
struct ClientEntry {
    hash: String,
    seen_at: Instant,
}

/// Hit/miss counters and current size
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
    last_by_client: DashMap<String, ClientEntry>,
    runtime_config: Arc<RuntimeConfig>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new(runtime_config: Arc<RuntimeConfig>) -> Self {
        Self {
            entries: DashMap::new(),
            last_by_client: DashMap::new(),
            runtime_config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn ttl(&self) -> Duration {
        self.runtime_config.dynamic().cache.ttl()
    }

    /// Look up a live entry. Expired entries are removed.
    pub fn get(&self, hash: &str) -> Option<CachedSimplification> {
        let ttl = self.ttl();
        let found = self.entries.get(hash).map(|entry| {
            if entry.inserted_at.elapsed() < ttl {
                Some(entry.value.clone())
            } else {
                None
            }
        });

        match found {
            Some(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Some(None) => {
                // Guard dropped above; removing while holding it would deadlock
                self.entries
                    .remove_if(hash, |_, entry| entry.inserted_at.elapsed() >= ttl);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a result, evicting the oldest entry when full.
    pub fn insert(&self, hash: String, value: CachedSimplification) {
        let max_entries = self.runtime_config.dynamic().cache.max_entries;
        if max_entries == 0 {
            return;
        }

        if !self.entries.contains_key(&hash) {
            while self.entries.len() >= max_entries {
                let oldest = self
                    .entries
                    .iter()
                    .min_by_key(|entry| entry.inserted_at)
                    .map(|entry| entry.key().clone());
                match oldest {
                    Some(key) => {
                        debug!(hash = %key, "Evicting oldest cache entry");
                        self.entries.remove(&key);
                    }
                    None => break,
                }
            }
        }

        self.entries.insert(
            hash,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Remove expired entries and stale client pointers. Returns entries removed.
    pub fn sweep(&self) -> usize {
        let ttl = self.ttl();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        self.last_by_client
            .retain(|_, entry| entry.seen_at.elapsed() < ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "Swept expired cache entries");
        }
        removed
    }

    /// Remember the last result produced for a client.
    pub fn remember_for_client(&self, client: &str, hash: &str) {
        self.last_by_client.insert(
            client.to_string(),
            ClientEntry {
                hash: hash.to_string(),
                seen_at: Instant::now(),
            },
        );
    }

    /// Hash of the last result produced for a client, if still remembered.
    pub fn last_for_client(&self, client: &str) -> Option<String> {
        self.last_by_client
            .get(client)
            .map(|entry| entry.hash.clone())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

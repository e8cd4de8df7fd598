//! Cache-aside layer for hot read paths.
//!
//! Read paths check the cache first and populate it on miss; write paths
//! invalidate the affected entity key and the collection key. The cache is
//! held by `AppState` and handed to the components that need it, so a
//! different backing store can replace this in-process one behind the same
//! surface.

use dashmap::DashMap;
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::config::CacheConfig;

/// Collection key for the full challenge listing
pub const CHALLENGES_COLLECTION_KEY: &str = "challenges:all";

/// Entity key for a single challenge
pub fn challenge_key(id: &str) -> String {
    format!("challenge:{id}")
}

struct CacheEntry {
    value: Value,
    inserted_at: Instant,
}

pub struct ReadCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    enabled: bool,
}

impl ReadCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::from_secs(config.ttl_seconds),
            enabled: config.enabled,
        }
    }

    /// Fetch a cached value, dropping it if its TTL has lapsed. Staleness
    /// here is best-effort only; writers must still invalidate.
    pub fn get(&self, key: &str) -> Option<Value> {
        if !self.enabled {
            return None;
        }

        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.inserted_at.elapsed() < self.ttl {
                    return Some(entry.value.clone());
                }
                true
            }
            None => false,
        };

        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        if !self.enabled {
            return;
        }
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Number of live entries (for monitoring)
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

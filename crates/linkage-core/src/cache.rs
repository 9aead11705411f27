//! Relation cache invalidation.
//!
//! Cached relations are kept as one hash per collection, under
//! `relations:<collection>`, mapping field name to the serialized relation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

use crate::error::Error;

/// Cache key prefix for per-collection relation hashes.
pub const RELATIONS_KEY_PREFIX: &str = "relations";

/// Cache key holding the relations of `collection`.
pub fn relations_cache_key(collection: &str) -> String {
    format!("{}:{}", RELATIONS_KEY_PREFIX, collection)
}

/// Invalidation capability of the process-wide cache.
pub trait CacheInvalidator: Send + Sync {
    /// Replace the whole hash stored at `key`.
    fn set_hash_full(&self, key: &str, value: HashMap<String, String>) -> Result<(), Error>;

    /// Drop one field of the hash stored at `key`.
    fn invalidate_field(&self, key: &str, field: &str) -> Result<(), Error>;
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Full replacements plus field invalidations.
    pub invalidations: u64,
}

/// In-memory cache backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, HashMap<String, String>>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the hash stored at `key`.
    pub fn get_hash(&self, key: &str) -> Option<HashMap<String, String>> {
        let value = self.entries.get(key).map(|entry| entry.value().clone());
        self.record_lookup(value.is_some());
        value
    }

    /// Get one field of the hash stored at `key`.
    pub fn get_field(&self, key: &str, field: &str) -> Option<String> {
        let value = self
            .entries
            .get(key)
            .and_then(|entry| entry.get(field).cloned());
        self.record_lookup(value.is_some());
        value
    }

    /// Number of cached hashes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    fn record_lookup(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl CacheInvalidator for MemoryCache {
    fn set_hash_full(&self, key: &str, value: HashMap<String, String>) -> Result<(), Error> {
        debug!(key, fields = value.len(), "cache hash replaced");
        self.entries.insert(key.to_string(), value);
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn invalidate_field(&self, key: &str, field: &str) -> Result<(), Error> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.remove(field);
        }
        debug!(key, field, "cache field invalidated");
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

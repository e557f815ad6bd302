//! In-memory implementation of the cache port for testing and development

use crate::core::cache::{Cache, CacheError, key_matches_pattern};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory cache with per-entry expiry
///
/// Expired entries are dropped lazily on access and on invalidation.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|entries| entries.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a live entry exists under `key`
    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .map(|entries| entries.get(key).is_some_and(|e| e.is_live(now)))
            .unwrap_or(false)
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        {
            let entries = self
                .entries
                .read()
                .map_err(|e| CacheError::Backend(format!("Failed to acquire read lock: {}", e)))?;
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                None => return Ok(None),
                Some(_) => {}
            }
        }

        let mut entries = self
            .entries
            .write()
            .map_err(|e| CacheError::Backend(format!("Failed to acquire write lock: {}", e)))?;
        entries.retain(|k, entry| k != key || entry.is_live(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| CacheError::Backend(format!("Failed to acquire write lock: {}", e)))?;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete_by_pattern(&self, base: &str) -> Result<u64, CacheError> {
        let now = Instant::now();
        let mut entries = self
            .entries
            .write()
            .map_err(|e| CacheError::Backend(format!("Failed to acquire write lock: {}", e)))?;

        let mut removed = 0;
        entries.retain(|key, entry| {
            if key_matches_pattern(key, base) {
                removed += 1;
                false
            } else {
                entry.is_live(now)
            }
        });
        Ok(removed)
    }
}

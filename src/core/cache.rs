//! Cache port and key derivation
//!
//! A narrow key/value interface the repository uses for cache-aside reads.
//! Values are serialized entity snapshots. Invalidation works on an identity
//! pattern so every preload variant of a record is purged together.

use crate::core::entity::Id;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Separator between key segments
pub const KEY_SEPARATOR: char = ':';

/// Separator between preload names inside a key
pub const PRELOAD_SEPARATOR: &str = "-";

/// Errors raised by cache adapters. Never surfaced by the repository.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache value could not be (de)serialized: {0}")]
    Serialization(String),
}

/// Key/value cache with pattern invalidation
#[async_trait]
pub trait Cache: Send + Sync {
    /// Value stored under `key`, `None` on miss or expiry
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `value` under `key` for `ttl`
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Remove `base` and every key of the form `base:...`.
    ///
    /// Returns the number of keys removed.
    async fn delete_by_pattern(&self, base: &str) -> Result<u64, CacheError>;
}

/// Whether `key` is `base` itself or one of its `base:` variants
pub fn key_matches_pattern(key: &str, base: &str) -> bool {
    match key.strip_prefix(base) {
        Some("") => true,
        Some(rest) => rest.starts_with(KEY_SEPARATOR),
        None => false,
    }
}

/// Cache key derivation
pub struct CacheKey;

impl CacheKey {
    /// `prefix type:id`, the pattern covering every variant of one record
    pub fn identity_pattern(prefix: &str, type_name: &str, id: Id) -> String {
        format!("{}{}{}{}", prefix, type_name, KEY_SEPARATOR, id)
    }

    /// `prefix type:id[:p1-p2]`, the key for one preload variant
    pub fn for_entity(prefix: &str, type_name: &str, id: Id, preloads: &[String]) -> String {
        let mut key = Self::identity_pattern(prefix, type_name, id);
        if !preloads.is_empty() {
            key.push(KEY_SEPARATOR);
            key.push_str(&preloads.join(PRELOAD_SEPARATOR));
        }
        key
    }
}

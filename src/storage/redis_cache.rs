//! Redis cache using a deadpool connection pool
//!
//! Gated behind the `redis` feature flag. Pattern invalidation deletes the
//! base key directly and walks `base:*` with `SCAN`, never `KEYS`.

use crate::core::cache::{Cache, CacheError, KEY_SEPARATOR};
use async_trait::async_trait;
use deadpool_redis::{Config as DeadpoolConfig, Pool, Runtime};
use std::ops::DerefMut;
use std::time::Duration;

/// Keys requested per `SCAN` round trip
const SCAN_BATCH: usize = 100;

/// Escape glob metacharacters so a key matches only itself in `MATCH`
fn escape_glob(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for c in key.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `SCAN` pattern covering the preload variants of `base`
fn variants_pattern(base: &str) -> String {
    format!("{}{}*", escape_glob(base), KEY_SEPARATOR)
}

/// Redis-backed cache
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
}

impl RedisCache {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool for `url` (e.g. `redis://127.0.0.1:6379`)
    pub fn connect(url: &str) -> Result<Self, CacheError> {
        let pool = DeadpoolConfig::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Backend(format!("Failed to create Redis pool: {}", e)))?;
        tracing::info!("Redis cache pool created");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Backend(format!("Redis connection failed: {}", e)))
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<Vec<u8>>>(conn.deref_mut())
            .await
            .map_err(|e| CacheError::Backend(format!("Redis GET failed: {}", e)))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        // EX rejects zero
        let seconds = ttl.as_secs().max(1);
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(seconds)
            .query_async::<()>(conn.deref_mut())
            .await
            .map_err(|e| CacheError::Backend(format!("Redis SET failed: {}", e)))
    }

    async fn delete_by_pattern(&self, base: &str) -> Result<u64, CacheError> {
        let mut conn = self.connection().await?;

        let mut keys = vec![base.to_string()];
        let pattern = variants_pattern(base);
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(conn.deref_mut())
                .await
                .map_err(|e| CacheError::Backend(format!("Redis SCAN failed: {}", e)))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        let removed: u64 = redis::cmd("DEL")
            .arg(&keys)
            .query_async(conn.deref_mut())
            .await
            .map_err(|e| CacheError::Backend(format!("Redis DEL failed: {}", e)))?;

        tracing::debug!(pattern = %pattern, removed, "redis keys deleted");
        Ok(removed)
    }
}

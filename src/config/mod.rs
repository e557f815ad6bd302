//! Configuration loading and management

use crate::core::compiler::OrderPolicy;
use crate::core::query::DEFAULT_PAGE_SIZE;
use crate::core::repository::{DEFAULT_CACHE_KEY_PREFIX, DEFAULT_CACHE_TTL, RepositoryConfig};
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Cache-aside settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Global switch; entity types must still opt in
    pub enabled: bool,

    /// Lifetime of a cached snapshot, in seconds
    pub ttl_secs: u64,

    /// Namespace prepended to every key
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            key_prefix: DEFAULT_CACHE_KEY_PREFIX.to_string(),
        }
    }
}

/// Page sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Size used when a request asks for zero
    pub default_page_size: u64,

    /// Upper bound on requested sizes (unbounded when absent)
    pub max_page_size: Option<u64>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: None,
        }
    }
}

/// Complete engine configuration
///
/// ```yaml
/// cache:
///   enabled: true
///   ttl_secs: 3600
///   key_prefix: "shop:"
/// pagination:
///   default_page_size: 20
///   max_page_size: 100
/// order_policy: strict
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub pagination: PaginationConfig,
    pub order_policy: OrderPolicy,
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the repository cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.pagination.default_page_size == 0 {
            bail!("pagination.default_page_size must be positive");
        }
        if let Some(max) = self.pagination.max_page_size {
            if max < self.pagination.default_page_size {
                bail!(
                    "pagination.max_page_size ({}) is below default_page_size ({})",
                    max,
                    self.pagination.default_page_size
                );
            }
        }
        Ok(())
    }

    /// Per-repository settings derived from this configuration
    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            cache_enabled: self.cache.enabled,
            cache_ttl: Duration::from_secs(self.cache.ttl_secs),
            cache_key_prefix: self.cache.key_prefix.clone(),
            default_page_size: self.pagination.default_page_size,
            max_page_size: self.pagination.max_page_size,
            order_policy: self.order_policy,
        }
    }
}

//! # crudkit
//!
//! A generic entity query and persistence engine for building CRUD services in Rust.
//!
//! ## Features
//!
//! - **Filter Language**: `field / operator / value` triples compiled into typed constraints
//! - **Safe by Construction**: column names are validated, values always travel as binds
//! - **Pagination**: count and fetch share one compiled query
//! - **Soft Delete**: tombstoning, restore, and a `deleted` filter to widen visibility
//! - **Cache-Aside**: opt-in per entity type, purged across every preload variant on write
//! - **Pluggable Ports**: in-memory, PostgreSQL (`postgres`) and Redis (`redis`) adapters
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crudkit::prelude::*;
//! use std::sync::Arc;
//!
//! impl_entity!(User, "user", "users", cache = true, {
//!     name: String,
//!     age: i64,
//! });
//!
//! let repository = Repository::new(Arc::new(InMemoryStore::<User>::new()))
//!     .with_cache(Arc::new(InMemoryCache::new()));
//!
//! let ada = repository.create(User::new("Ada".into(), 36)).await?;
//!
//! let adults = repository
//!     .page(&PageRequest::new(
//!         FilterRequest::new().filter("age", ">=", 18).with_order("name"),
//!         1,
//!         20,
//!     ))
//!     .await?;
//!
//! repository.remove(ada.id).await?;  // soft delete
//! repository.restore(ada.id).await?; // and back
//! ```

pub mod config;
pub mod core;
pub mod entities;
pub mod logging;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core Traits ===
    pub use crate::core::{
        cache::{Cache, CacheError, CacheKey},
        compiler::{CompileOptions, CompiledQuery, Constraint, Order, OrderPolicy, Visibility},
        entity::{Entity, Id},
        error::{CrudError, CrudResult},
        query::{Filter, FilterRequest, IdRequest, Operator, Page, PageRequest, Pagination},
        repository::{Repository, RepositoryConfig},
        response::Response,
        store::{Store, StoreError, Window},
    };

    // === Macros ===
    pub use crate::impl_entity;

    // === Storage ===
    #[cfg(feature = "in-memory")]
    pub use crate::storage::{InMemoryCache, InMemoryStore};
    #[cfg(feature = "postgres")]
    pub use crate::storage::PostgresStore;
    #[cfg(feature = "redis")]
    pub use crate::storage::RedisCache;

    // === Config ===
    pub use crate::config::{CacheConfig, EngineConfig, PaginationConfig};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Map, Value, json};
}

//! Store port
//!
//! The relational store the repository executes compiled queries against.
//! Implementations own durable entity lifecycle: identity assignment,
//! timestamps and soft-delete markers. They perform no caching and no
//! retries beyond what their connection layer already does.

use crate::core::compiler::{CompiledQuery, Visibility};
use crate::core::entity::{Entity, Id};
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Primary-key column
pub const PRIMARY_KEY_COLUMN: &str = "id";

/// Creation timestamp column, written by the store on insert
pub const CREATED_AT_COLUMN: &str = "created_at";

/// Modification timestamp column, written by the store on every write
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Tombstone column; null for live rows
pub const DELETED_AT_COLUMN: &str = "deleted_at";

/// Row window for bounded queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

impl Window {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// First row only
    pub fn first() -> Self {
        Self::new(0, 1)
    }
}

/// Errors raised by store adapters
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to connect to {backend}: {message}")]
    Connection { backend: String, message: String },

    #[error("{backend} query error: {message}")]
    Query { backend: String, message: String },

    #[error("{backend} constraint violation: {message}")]
    Constraint { backend: String, message: String },

    #[error("{backend} row could not be (de)serialized: {message}")]
    Serialization { backend: String, message: String },

    #[error("Storage backend '{backend}' is not available")]
    Unavailable { backend: String },
}

impl StoreError {
    pub fn backend(&self) -> &str {
        match self {
            StoreError::Connection { backend, .. }
            | StoreError::Query { backend, .. }
            | StoreError::Constraint { backend, .. }
            | StoreError::Serialization { backend, .. }
            | StoreError::Unavailable { backend } => backend,
        }
    }
}

/// Relational store for one entity type.
///
/// Mutating methods return the number of rows affected so the repository
/// can tell "no such row" apart from success.
#[async_trait]
pub trait Store<T: Entity>: Send + Sync {
    /// Identity lookup honouring the given soft-delete visibility
    async fn find_by_id(
        &self,
        id: Id,
        preloads: &[String],
        visibility: Visibility,
    ) -> Result<Option<T>, StoreError>;

    /// Rows matching the query, optionally windowed
    async fn query(&self, query: &CompiledQuery, window: Option<Window>)
    -> Result<Vec<T>, StoreError>;

    /// `count(*)` under the query's constraints and visibility
    async fn count(&self, query: &CompiledQuery) -> Result<u64, StoreError>;

    /// Persist a new row; the returned entity carries the assigned identity
    async fn insert(&self, entity: T) -> Result<T, StoreError>;

    /// Overwrite every persisted field of the row with the entity's identity
    async fn save(&self, entity: &T) -> Result<u64, StoreError>;

    /// Overwrite only the given columns
    async fn update_fields(&self, id: Id, fields: &Map<String, Value>) -> Result<u64, StoreError>;

    /// Set the tombstone marker
    async fn soft_delete(&self, id: Id) -> Result<u64, StoreError>;

    /// Clear the tombstone marker
    async fn clear_tombstone(&self, id: Id) -> Result<u64, StoreError>;

    /// Remove the row regardless of tombstone state
    async fn hard_delete(&self, id: Id) -> Result<u64, StoreError>;
}

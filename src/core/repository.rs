//! Generic repository (CRUD engine)
//!
//! [`Repository`] is stateless between calls. It compiles requests, runs them
//! against its [`Store`], and keeps an optional [`Cache`] coherent with the
//! store for entity types that opt in through [`Entity::supports_cache`].
//!
//! Consistency notes:
//!
//! - `update`, `update_fields`, `remove` and `restore` write and then re-read
//!   in two separate store calls. Concurrent writers to the same identity
//!   race at the store (last write wins) and the re-read may observe another
//!   caller's write.
//! - Cache invalidation is best-effort and not atomic with the write. A
//!   reader that misses between the write and the invalidation can still
//!   repopulate the cache with the pre-write snapshot until the entry expires.

use crate::core::cache::{Cache, CacheKey};
use crate::core::compiler::{self, CompileOptions, CompiledQuery, OrderPolicy, Visibility};
use crate::core::entity::{Entity, Id};
use crate::core::error::{CrudError, CrudResult};
use crate::core::query::{DEFAULT_PAGE_SIZE, FilterRequest, IdRequest, Page, PageRequest};
use crate::core::store::{DELETED_AT_COLUMN, PRIMARY_KEY_COLUMN, Store, Window};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Default lifetime of a cached snapshot
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default namespace prepended to every cache key
pub const DEFAULT_CACHE_KEY_PREFIX: &str = "crudkit:";

/// Per-repository settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Global switch; types must still opt in individually
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub cache_key_prefix: String,
    pub default_page_size: u64,
    pub max_page_size: Option<u64>,
    pub order_policy: OrderPolicy,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_key_prefix: DEFAULT_CACHE_KEY_PREFIX.to_string(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: None,
            order_policy: OrderPolicy::default(),
        }
    }
}

/// CRUD engine for one entity type
///
/// # Example
///
/// ```rust,ignore
/// let repository = Repository::new(Arc::new(InMemoryStore::<User>::new()))
///     .with_cache(Arc::new(InMemoryCache::new()));
///
/// let user = repository.create(User::new("alice".into())).await?;
/// let same = repository.get(user.id).await?;
/// ```
pub struct Repository<T: Entity> {
    store: Arc<dyn Store<T>>,
    cache: Option<Arc<dyn Cache>>,
    config: RepositoryConfig,
}

impl<T: Entity> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: self.cache.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(store: Arc<dyn Store<T>>) -> Self {
        Self {
            store,
            cache: None,
            config: RepositoryConfig::default(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store<T>> {
        &self.store
    }

    /// Cache to use for this entity type, if any
    fn type_cache(&self) -> Option<&Arc<dyn Cache>> {
        if self.config.cache_enabled && T::supports_cache() {
            self.cache.as_ref()
        } else {
            None
        }
    }

    fn compile(&self, request: &FilterRequest) -> CrudResult<CompiledQuery> {
        let options = CompileOptions::for_entity::<T>(self.config.order_policy);
        compiler::compile(request, &options)
    }

    fn not_found(id: Option<Id>) -> CrudError {
        CrudError::NotFound {
            entity_type: T::type_name().to_string(),
            id,
        }
    }

    fn require_identity(id: Id, operation: &'static str) -> CrudResult<()> {
        if id == 0 {
            Err(CrudError::MissingIdentity {
                entity_type: T::type_name().to_string(),
                operation,
            })
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Shorthand for [`get_by_id`](Self::get_by_id) without preloads
    pub async fn get(&self, id: Id) -> CrudResult<T> {
        self.get_by_id(&IdRequest::new(id)).await
    }

    /// Single live record by identity, served from the cache when possible
    pub async fn get_by_id(&self, request: &IdRequest) -> CrudResult<T> {
        if request.id == 0 {
            return Err(Self::not_found(Some(0)));
        }
        if let Some(relation) = request
            .preloads
            .iter()
            .find(|p| !compiler::is_relation_path(p))
        {
            return Err(CrudError::InvalidFilter {
                field: relation.clone(),
                message: "preload is not a relation path".to_string(),
            });
        }

        let cache = self.type_cache();
        let key = CacheKey::for_entity(
            &self.config.cache_key_prefix,
            T::type_name(),
            request.id,
            &request.preloads,
        );

        if let Some(cache) = cache {
            if let Some(entity) = self.read_cached(cache.as_ref(), &key).await {
                return Ok(entity);
            }
        }

        let entity = self
            .store
            .find_by_id(request.id, &request.preloads, Visibility::Active)
            .await?
            .ok_or_else(|| {
                tracing::debug!(entity_type = T::type_name(), id = request.id, "record not found");
                Self::not_found(Some(request.id))
            })?;

        if let Some(cache) = cache {
            self.write_cached(cache.as_ref(), &key, &entity).await;
        }

        Ok(entity)
    }

    /// First record matching the filter
    pub async fn first(&self, request: &FilterRequest) -> CrudResult<T> {
        let query = self.compile(request)?;
        self.store
            .query(&query, Some(Window::first()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                tracing::debug!(entity_type = T::type_name(), "no record matched filter");
                Self::not_found(None)
            })
    }

    /// Every record matching the filter; empty is not an error
    pub async fn list(&self, request: &FilterRequest) -> CrudResult<Vec<T>> {
        let query = self.compile(request)?;
        Ok(self.store.query(&query, None).await?)
    }

    /// One page of matching records plus the total match count.
    ///
    /// Count and fetch run the same compiled query.
    pub async fn page(&self, request: &PageRequest) -> CrudResult<Page<T>> {
        let query = self.compile(&request.filter)?;
        let mut pagination = request
            .pagination
            .normalized(self.config.default_page_size, self.config.max_page_size);

        pagination.total = self.store.count(&query).await?;

        let records = if pagination.offset() < pagination.total {
            let window = Window::new(pagination.offset(), pagination.limit());
            self.store.query(&query, Some(window)).await?
        } else {
            Vec::new()
        };

        tracing::debug!(
            entity_type = T::type_name(),
            page_index = pagination.page_index,
            page_size = pagination.page_size,
            total = pagination.total,
            returned = records.len(),
            "page fetched"
        );

        Ok(Page {
            records,
            pagination,
        })
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Persist a new record; the store assigns its identity
    pub async fn create(&self, entity: T) -> CrudResult<T> {
        if !entity.is_new() {
            return Err(CrudError::NotNewRecord {
                entity_type: T::type_name().to_string(),
                id: entity.primary_key(),
            });
        }

        let created = self.store.insert(entity).await?;
        if created.is_new() {
            return Err(CrudError::StoreFailed {
                entity_type: T::type_name().to_string(),
                operation: "create",
                message: "store did not assign an identity".to_string(),
            });
        }

        tracing::debug!(entity_type = T::type_name(), id = created.primary_key(), "record created");
        Ok(created)
    }

    /// Overwrite the record `id` with `entity` and return the stored state
    pub async fn update(&self, entity: T, id: Id) -> CrudResult<T> {
        if entity.primary_key() != id {
            return Err(CrudError::IdentityMismatch {
                entity_type: T::type_name().to_string(),
                expected: id,
                actual: entity.primary_key(),
            });
        }
        Self::require_identity(id, "update")?;

        if self.store.save(&entity).await? == 0 {
            return Err(Self::not_found(Some(id)));
        }
        self.invalidate(id).await;

        self.reload(id, Visibility::Active).await
    }

    /// Overwrite only `fields` of the record identified by `entity`
    pub async fn update_fields(&self, entity: &T, fields: Map<String, Value>) -> CrudResult<T> {
        let id = entity.primary_key();
        Self::require_identity(id, "update")?;

        if fields.is_empty() {
            return Err(CrudError::InvalidField {
                field: String::new(),
                message: "no fields to update".to_string(),
            });
        }
        for field in fields.keys() {
            let message = if !compiler::is_column_identifier(field) {
                "not a column identifier"
            } else if field == PRIMARY_KEY_COLUMN {
                "identity cannot be changed"
            } else if field == DELETED_AT_COLUMN {
                "use remove or restore to change deletion state"
            } else {
                continue;
            };
            return Err(CrudError::InvalidField {
                field: field.clone(),
                message: message.to_string(),
            });
        }

        if self.store.update_fields(id, &fields).await? == 0 {
            return Err(Self::not_found(Some(id)));
        }
        self.invalidate(id).await;

        self.reload(id, Visibility::Active).await
    }

    /// Soft delete: tombstone the row and return its tombstoned state
    pub async fn remove(&self, id: Id) -> CrudResult<T> {
        Self::require_identity(id, "remove")?;

        let affected = self.store.soft_delete(id).await?;
        self.invalidate(id).await;
        tracing::debug!(entity_type = T::type_name(), id, affected, "record removed");

        self.reload(id, Visibility::All).await
    }

    /// Clear the tombstone; a no-op on a live row
    pub async fn restore(&self, id: Id) -> CrudResult<T> {
        Self::require_identity(id, "restore")?;

        let affected = self.store.clear_tombstone(id).await?;
        self.invalidate(id).await;
        tracing::debug!(entity_type = T::type_name(), id, affected, "record restored");

        self.reload(id, Visibility::Active).await
    }

    /// Hard delete: remove the row irrecoverably
    pub async fn destroy(&self, id: Id) -> CrudResult<()> {
        Self::require_identity(id, "destroy")?;

        let affected = self.store.hard_delete(id).await?;
        self.invalidate(id).await;
        tracing::debug!(entity_type = T::type_name(), id, affected, "record destroyed");

        Ok(())
    }

    async fn reload(&self, id: Id, visibility: Visibility) -> CrudResult<T> {
        self.store
            .find_by_id(id, &[], visibility)
            .await?
            .ok_or_else(|| Self::not_found(Some(id)))
    }

    // ------------------------------------------------------------------
    // Cache-aside
    // ------------------------------------------------------------------

    async fn read_cached(&self, cache: &dyn Cache, key: &str) -> Option<T> {
        match cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(entity) => {
                    tracing::debug!(key, "cache hit");
                    Some(entity)
                }
                Err(e) => {
                    tracing::warn!(key, error = %e, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => {
                tracing::debug!(key, "cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed, falling back to store");
                None
            }
        }
    }

    async fn write_cached(&self, cache: &dyn Cache, key: &str, entity: &T) {
        let bytes = match serde_json::to_vec(entity) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key, error = %e, "could not serialize record for cache");
                return;
            }
        };
        if let Err(e) = cache.set(key, bytes, self.config.cache_ttl).await {
            tracing::warn!(key, error = %e, "cache write failed");
        }
    }

    async fn invalidate(&self, id: Id) {
        let Some(cache) = self.type_cache() else {
            return;
        };
        let pattern =
            CacheKey::identity_pattern(&self.config.cache_key_prefix, T::type_name(), id);
        match cache.delete_by_pattern(&pattern).await {
            Ok(purged) => tracing::debug!(pattern = %pattern, purged, "cache invalidated"),
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "cache invalidation failed")
            }
        }
    }
}

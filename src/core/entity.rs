//! Entity capability trait
//!
//! Any record type persisted through the [`Repository`](crate::core::repository::Repository)
//! implements [`Entity`]. The trait is the statically-checked replacement for
//! runtime capability probing: identity access is mandatory, while cache
//! participation, response naming and sortable columns are optional
//! capabilities expressed as provided methods with neutral defaults.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Primary-key type. Zero means "not persisted yet".
pub type Id = u64;

/// Default singular response key for types without their own naming
pub const DEFAULT_SINGULAR_KEY: &str = "record";

/// Default plural response key for types without their own naming
pub const DEFAULT_PLURAL_KEY: &str = "records";

/// Base trait for all persisted record types.
///
/// Only identity access is required. Everything else has a default that
/// stands for "capability not implemented":
///
/// | capability          | default                    |
/// |---------------------|----------------------------|
/// | `supports_cache`    | `false`                    |
/// | `response_keys`     | `("record", "records")`    |
/// | `sortable_fields`   | empty (any column)         |
///
/// # Example
///
/// ```rust,ignore
/// impl Entity for User {
///     fn type_name() -> &'static str { "user" }
///     fn primary_key(&self) -> Id { self.id }
///     fn set_primary_key(&mut self, id: Id) { self.id = id }
///     fn supports_cache() -> bool { true }
/// }
/// ```
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Type name used to namespace cache keys and in diagnostics
    fn type_name() -> &'static str;

    /// Current primary-key value
    fn primary_key(&self) -> Id;

    /// Assign the primary-key value (used by stores on insert)
    fn set_primary_key(&mut self, id: Id);

    /// Whether single-record reads of this type go through the cache
    fn supports_cache() -> bool {
        false
    }

    /// Singular and plural keys used when this type is placed in a response
    fn response_keys() -> (&'static str, &'static str) {
        (DEFAULT_SINGULAR_KEY, DEFAULT_PLURAL_KEY)
    }

    /// Allow-list of columns accepted in sort clauses.
    ///
    /// Empty means any well-formed column name is accepted.
    fn sortable_fields() -> &'static [&'static str] {
        &[]
    }

    /// Whether this value has never been persisted
    fn is_new(&self) -> bool {
        self.primary_key() == 0
    }
}

/// Primary key of any entity value
pub fn primary_key_of<T: Entity>(entity: &T) -> Id {
    entity.primary_key()
}

/// Assign the primary key of any entity value
pub fn set_primary_key_of<T: Entity>(entity: &mut T, id: Id) {
    entity.set_primary_key(id);
}

/// Cache opt-in of an entity's type
pub fn supports_cache_of<T: Entity>(_entity: &T) -> bool {
    T::supports_cache()
}

/// Response keys of an entity's type
pub fn response_keys_of<T: Entity>(_entity: &T) -> (&'static str, &'static str) {
    T::response_keys()
}

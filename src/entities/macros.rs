//! Macros for reducing boilerplate when defining entities
//!
//! `impl_entity!` generates a struct carrying the standard persisted columns
//! (`id`, `created_at`, `updated_at`, `deleted_at`, all owned by the store)
//! plus its own fields, and implements [`Entity`](crate::core::entity::Entity)
//! for it.

/// Create an entity type with automatic trait implementations
///
/// # Example
///
/// ```rust,ignore
/// use crudkit::prelude::*;
///
/// impl_entity!(
///     User,
///     "user",
///     "users",
///     cache = true,
///     {
///         name: String,
///         email: String,
///         age: i64,
///     }
/// );
///
/// let user = User::new("Ada".to_string(), "ada@example.com".to_string(), 36);
/// assert!(user.is_new());
/// ```
///
/// An optional `sortable = ["name", "age"]` argument after `cache` restricts
/// sort clauses to the listed columns.
#[macro_export]
macro_rules! impl_entity {
    (
        $type:ident,
        $singular:expr,
        $plural:expr,
        cache = $cache:expr,
        {
            $( $field:ident : $field_type:ty ),* $(,)?
        }
    ) => {
        $crate::impl_entity!(
            $type,
            $singular,
            $plural,
            cache = $cache,
            sortable = [],
            { $( $field : $field_type ),* }
        );
    };
    (
        $type:ident,
        $singular:expr,
        $plural:expr,
        cache = $cache:expr,
        sortable = [ $( $sortable:expr ),* $(,)? ],
        {
            $( $field:ident : $field_type:ty ),* $(,)?
        }
    ) => {
        #[derive(Debug, Clone, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
        pub struct $type {
            /// Primary key, zero until persisted
            #[serde(default)]
            pub id: u64,

            /// When this record was created
            #[serde(default)]
            pub created_at: Option<::chrono::DateTime<::chrono::Utc>>,

            /// When this record was last written
            #[serde(default)]
            pub updated_at: Option<::chrono::DateTime<::chrono::Utc>>,

            /// When this record was soft-deleted (if applicable)
            #[serde(default)]
            pub deleted_at: Option<::chrono::DateTime<::chrono::Utc>>,

            $( pub $field : $field_type ),*
        }

        impl $crate::core::entity::Entity for $type {
            fn type_name() -> &'static str {
                $singular
            }

            fn primary_key(&self) -> $crate::core::entity::Id {
                self.id
            }

            fn set_primary_key(&mut self, id: $crate::core::entity::Id) {
                self.id = id;
            }

            fn supports_cache() -> bool {
                $cache
            }

            fn response_keys() -> (&'static str, &'static str) {
                ($singular, $plural)
            }

            fn sortable_fields() -> &'static [&'static str] {
                &[ $( $sortable ),* ]
            }
        }

        impl $type {
            /// Create an unpersisted instance
            pub fn new( $( $field: $field_type ),* ) -> Self {
                Self {
                    id: 0,
                    created_at: None,
                    updated_at: None,
                    deleted_at: None,
                    $( $field ),*
                }
            }

            /// Whether the store has tombstoned this record
            pub fn is_deleted(&self) -> bool {
                self.deleted_at.is_some()
            }
        }
    };
}

//! Store and cache implementations for different backends

#[cfg(feature = "in-memory")]
pub mod in_memory;
#[cfg(feature = "in-memory")]
pub mod memory_cache;
pub mod sql;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "redis")]
pub mod redis_cache;

#[cfg(feature = "in-memory")]
pub use in_memory::InMemoryStore;
#[cfg(feature = "in-memory")]
pub use memory_cache::InMemoryCache;
pub use sql::{Dialect, SqlStatement};

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;

//! Core module containing the engine's traits and types

pub mod cache;
pub mod compiler;
pub mod entity;
pub mod error;
pub mod query;
pub mod repository;
pub mod response;
pub mod store;

pub use cache::{Cache, CacheError, CacheKey};
pub use compiler::{CompileOptions, CompiledQuery, Constraint, Order, OrderPolicy, Visibility};
pub use entity::{Entity, Id};
pub use error::{CrudError, CrudResult};
pub use query::{Filter, FilterRequest, IdRequest, Operator, Page, PageRequest, Pagination};
pub use repository::{Repository, RepositoryConfig};
pub use response::Response;
pub use store::{Store, StoreError, Window};

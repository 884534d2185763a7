//! # tierstore-storage
//!
//! The authoritative record store behind the tierstore cache.
//!
//! The cache is a derived view: everything here is the system of record, and
//! the cache-miss path of the record service falls back to it.
//!
//! ## Overview
//!
//! - [`Record`]: an entity that can be stored and cached (`Product`, `User`)
//! - [`Repository`]: CRUD contract every backend implements
//! - [`memory::MemoryRepository`]: in-process backend for tests and demos
//! - [`postgres::PostgresStore`]: PostgreSQL backend
//!
//! ## Example
//!
//! ```ignore
//! use tierstore_storage::{Product, Repository, StorageError};
//!
//! async fn price_of(repo: &dyn Repository<Product>, id: i64) -> Result<f64, StorageError> {
//!     repo.find_by_id(id)
//!         .await?
//!         .map(|p| p.price)
//!         .ok_or_else(|| StorageError::not_found("product", id))
//! }
//! ```

mod error;
pub mod memory;
pub mod postgres;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::MemoryRepository;
pub use postgres::{PgPool, PgProductRepository, PgUserRepository, PostgresStore};
pub use record::{Product, Record, User};
pub use traits::Repository;

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared repository trait object.
pub type DynRepository<R> = std::sync::Arc<dyn Repository<R>>;

//! Repository trait implemented by every storage backend.

use async_trait::async_trait;

use crate::StorageResult;
use crate::record::Record;

/// CRUD access to one record type.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait Repository<R: Record>: Send + Sync {
    /// Inserts a new record and returns it with its assigned ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidInput` if the record fails validation.
    async fn create(&self, record: R) -> StorageResult<R>;

    /// Reads a record by ID.
    ///
    /// Returns `None` if the record does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing records.
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<R>>;

    /// Replaces an existing record, keeping its original `created_at`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn update(&self, record: &R) -> StorageResult<R>;

    /// Deletes a record by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn delete(&self, id: i64) -> StorageResult<()>;

    /// Lists every record ordered by ID.
    async fn find_all(&self) -> StorageResult<Vec<R>>;
}

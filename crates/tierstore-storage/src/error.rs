//! Storage error types.

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested record was not found.
    #[error("Record not found: {entity}/{id}")]
    NotFound {
        /// Entity name, e.g. `"product"`.
        entity: &'static str,
        /// The ID that was not found.
        id: i64,
    },

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// The record data is invalid.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Creates a new `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("product", 42);
        assert_eq!(err.to_string(), "Record not found: product/42");
        assert!(err.is_not_found());

        let err = StorageError::invalid_input("price must not be negative");
        assert_eq!(err.to_string(), "Invalid input: price must not be negative");
        assert!(!err.is_not_found());
    }
}

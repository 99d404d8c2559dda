//! Storage-specific error type wrapping sqlx errors.

use tillguard_domain::error::TillguardError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to serialize a JSON column.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for TillguardError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_wrap_storage_error_into_domain_storage_variant() {
        let err: TillguardError = StorageError::Database(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, TillguardError::Storage(_)));
        assert_eq!(err.to_string(), "storage error");
    }
}

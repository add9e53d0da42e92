//! Error types for the persistence layer.
//!
//! Storage errors are split into validation failures (the aggregate was
//! rejected before touching storage), transaction failures (a multi-step
//! write could not be applied as one unit) and backend failures (the store
//! itself reported a problem). A point lookup that misses is never an error.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all repository operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The aggregate violates an invariant this layer enforces.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A transaction or atomic batch could not be applied.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Backend-specific errors.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors raised when an aggregate is rejected before it reaches storage.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Missing required field.
    #[error("missing required field: {field}")]
    MissingRequiredField { field: String },

    /// The report date could not be parsed.
    #[error("invalid report date '{value}': expected DD/MM/YYYY or YYYY-MM-DD")]
    InvalidDate { value: String },
}

/// Errors related to transactions and atomic batches.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// Transaction was rolled back.
    #[error("transaction rolled back: {reason}")]
    RolledBack { reason: String },

    /// More writes were staged than the backend can commit atomically.
    #[error("atomic batch too large: {staged} writes staged, maximum is {max}")]
    BatchTooLarge { staged: usize, max: usize },
}

/// Errors originating from the storage backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend was selected but a required connection parameter is missing.
    #[error("{backend_name} backend not configured: missing {parameter}")]
    NotConfigured {
        backend_name: String,
        parameter: String,
    },

    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}: {message}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// No pooled connection became free within the pool timeout.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// The requested backend was not compiled into this build.
    #[error("backend '{backend_name}' is not available in this build (enable the '{feature}' feature)")]
    FeatureDisabled {
        backend_name: String,
        feature: String,
    },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Result type alias for repository operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Builds an internal backend error without an underlying source.
    pub fn internal(backend_name: &str, message: impl Into<String>) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: backend_name.to_string(),
            message: message.into(),
            source: None,
        })
    }

    /// Returns true if this is a not-configured error.
    pub fn is_not_configured(&self) -> bool {
        matches!(self, StorageError::Backend(BackendError::NotConfigured { .. }))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(_err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = StorageError::Validation(ValidationError::MissingRequiredField {
            field: "diagnostico".to_string(),
        });
        assert_eq!(err.to_string(), "missing required field: diagnostico");

        let err = ValidationError::InvalidDate {
            value: "2024/13/45".to_string(),
        };
        assert!(err.to_string().contains("2024/13/45"));
    }

    #[test]
    fn test_batch_too_large_display() {
        let err = TransactionError::BatchTooLarge {
            staged: 612,
            max: 500,
        };
        assert_eq!(
            err.to_string(),
            "atomic batch too large: 612 writes staged, maximum is 500"
        );
    }

    #[test]
    fn test_not_configured() {
        let err: StorageError = BackendError::NotConfigured {
            backend_name: "mongodb".to_string(),
            parameter: "mongodb_uri".to_string(),
        }
        .into();
        assert!(err.is_not_configured());
        assert!(err.to_string().contains("mongodb_uri"));

        let err = StorageError::internal("sqlite", "boom");
        assert!(!err.is_not_configured());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_pool_timeout_is_pool_exhausted() {
        let pool = r2d2::Pool::builder()
            .max_size(1)
            .connection_timeout(std::time::Duration::from_millis(50))
            .build(r2d2_sqlite::SqliteConnectionManager::memory())
            .unwrap();
        let _held = pool.get().unwrap();

        let err: StorageError = pool.get().unwrap_err().into();
        assert!(matches!(
            err,
            StorageError::Backend(BackendError::PoolExhausted { .. })
        ));
    }

    #[test]
    fn test_from_serde_json() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: StorageError = parse_err.into();
        assert!(matches!(
            err,
            StorageError::Backend(BackendError::SerializationError { .. })
        ));
    }
}

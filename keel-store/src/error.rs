//! Store error types
//!
//! Every engine operation surfaces one of these verbatim. Nothing here is
//! retried; callers decide whether to retry, log, or report.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors returned by the storage engine
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required field is missing or malformed; nothing was written
    #[error("invalid {entity}: {field} {reason}")]
    Validation {
        entity: &'static str,
        field: &'static str,
        reason: String,
    },

    /// A uniqueness constraint rejected the write
    #[error("{entity} already exists: {detail}")]
    Conflict { entity: &'static str, detail: String },

    /// The key or scope resolved to zero rows
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// The backend is unreachable or rejected the statement
    #[error("database error: {0}")]
    Connection(#[source] sqlx::Error),

    /// The caller's deadline expired before the statement finished
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// A stored value could not be decoded
    #[error("corrupt {entity}.{column}: {reason}")]
    CorruptData {
        entity: &'static str,
        column: &'static str,
        reason: String,
    },
}

impl StoreError {
    pub fn validation(
        entity: &'static str,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation {
            entity,
            field,
            reason: reason.into(),
        }
    }

    /// Shorthand for a required field that was left at its zero value
    pub fn missing(entity: &'static str, field: &'static str) -> Self {
        Self::validation(entity, field, "is required")
    }

    pub fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn corrupt(
        entity: &'static str,
        column: &'static str,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::CorruptData {
            entity,
            column,
            reason: reason.to_string(),
        }
    }

    /// Map a driver error raised while operating on `entity`
    pub fn from_sqlx(entity: &'static str, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict {
                entity,
                detail: db.message().to_string(),
            },
            sqlx::Error::RowNotFound => Self::NotFound {
                entity,
                key: "no rows".to_string(),
            },
            sqlx::Error::ColumnDecode { index, source } => Self::CorruptData {
                entity,
                column: "column",
                reason: format!("{index}: {source}"),
            },
            sqlx::Error::Decode(source) => Self::CorruptData {
                entity,
                column: "row",
                reason: source.to_string(),
            },
            other => Self::Connection(other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err = StoreError::from_sqlx("build", sqlx::Error::RowNotFound);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_pool_errors_map_to_connection() {
        let err = StoreError::from_sqlx("build", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Connection(_)));

        let err = StoreError::from_sqlx("build", sqlx::Error::PoolClosed);
        assert!(matches!(err, StoreError::Connection(_)));
    }

    #[test]
    fn test_validation_message_names_field() {
        let err = StoreError::missing("secret", "value");
        assert_eq!(err.to_string(), "invalid secret: value is required");
        assert!(err.is_validation());
    }
}

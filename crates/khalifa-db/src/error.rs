//! # Database Error Types
//!
//! Everything a repository call can fail with.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)       Business rule (CoreError)            │
//! │       │                                │                                │
//! │       ▼                                ▼                                │
//! │  DbError (this module) ← one type for the UI to match on               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UI layer maps to a user-facing message                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use khalifa_core::{CoreError, ValidationError};
use thiserror::Error;

/// Storage operation errors.
///
/// These errors wrap sqlx errors and business-rule failures so callers deal
/// with a single type.
#[derive(Debug, Error)]
pub enum DbError {
    /// No row for the requested id or business key.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - ID doesn't exist
    /// - UPDATE/DELETE affected no rows
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Duplicate business key.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU
    /// - Inserting a customer whose phone is already registered
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The store could not be opened or is closed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Pool already closed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Any other statement failure.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (connection acquire timed out).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A stored row could not be turned into a domain record.
    ///
    /// ## When This Occurs
    /// - Negative money or quantity where none is allowed
    /// - Unknown enum text
    /// - Invoice totals that disagree with its items
    #[error("Corrupt {entity} record {id}: {reason}")]
    CorruptRecord {
        entity: String,
        id: String,
        reason: String,
    },

    /// Input rejected before anything was written.
    #[error("Validation failed: {0}")]
    Validation(ValidationError),

    /// Business rule refused the operation (stock, returns, payments).
    #[error(transparent)]
    Core(CoreError),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error (backups, config file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// `{entity} not found: {id}`.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// A business key (SKU, phone) is already taken.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// A stored row failed conversion.
    pub fn corrupt(
        entity: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DbError::CorruptRecord {
            entity: entity.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller's input rather than the store.
    pub fn is_validation(&self) -> bool {
        matches!(self, DbError::Validation(_))
    }
}

/// Classifies driver errors.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → UniqueViolation / ForeignKeyViolation by message
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::QueryFailed
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite reports "UNIQUE constraint failed: products.sku" and
                // "FOREIGN KEY constraint failed".
                if let Some(column) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    let field = column
                        .rsplit_once('.')
                        .map(|(_, col)| col)
                        .unwrap_or(column)
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::ColumnDecode { index, source } => {
                DbError::corrupt("Row", index, source.to_string())
            }

            _ => DbError::QueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Validation(err)
    }
}

/// Validation failures inside a `CoreError` surface as `DbError::Validation`
/// so callers check one variant for bad input.
impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => DbError::Validation(v),
            CoreError::Corrupt { entity, id, reason } => DbError::CorruptRecord { entity, id, reason },
            other => DbError::Core(other),
        }
    }
}

/// Result alias for repository calls.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

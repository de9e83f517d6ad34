//! Unified error types for the stats engine.
//!
//! Error codes:
//! - VALID_001: Validation errors
//! - DB_001-003: Store errors (transient, schema not ready, other)
//! - COMPACT_001: Compaction integrity errors
//! - ROLLUP_001: One or more rollup families failed for a date
//! - CONFIG_001: Configuration errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Store error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorCode {
    /// DB_001: Busy, locked or I/O failure; safe to retry later
    Transient,
    /// DB_002: A required table does not exist yet
    SchemaNotReady,
    /// DB_003: Any other store failure
    Failed,
}

impl DbErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transient => "DB_001",
            Self::SchemaNotReady => "DB_002",
            Self::Failed => "DB_003",
        }
    }
}

/// Unified error type for the stats engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("[VALID_001] {0}")]
    Validation(String),

    /// Store error with code.
    #[error("[{code}] {message}")]
    Database {
        code: &'static str,
        message: String,
        transient: bool,
    },

    /// Summary rows for a date could not be confirmed before deletion.
    #[error("[COMPACT_001] compaction of {date} aborted: {message}")]
    CompactionIntegrity { date: chrono::NaiveDate, message: String },

    /// Some rollup families for a date failed; the others were written.
    #[error("[ROLLUP_001] rollup of {date} incomplete: {}", .failures.join("; "))]
    RollupIncomplete {
        date: chrono::NaiveDate,
        failures: Vec<String>,
    },

    #[error("[CONFIG_001] {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a store error.
    pub fn database(code: DbErrorCode, msg: impl Into<String>) -> Self {
        Self::Database {
            code: code.code(),
            message: msg.into(),
            transient: code == DbErrorCode::Transient,
        }
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::database(DbErrorCode::Transient, msg)
    }

    pub fn schema_not_ready(msg: impl Into<String>) -> Self {
        Self::database(DbErrorCode::SchemaNotReady, msg)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn compaction_integrity(date: chrono::NaiveDate, msg: impl Into<String>) -> Self {
        Self::CompactionIntegrity {
            date,
            message: msg.into(),
        }
    }

    /// Whether the failure is worth retrying on the next request or trigger.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database { transient: true, .. })
    }

    /// Whether the failure means a table has not been created yet.
    pub fn is_schema_not_ready(&self) -> bool {
        matches!(self, Self::Database { code, .. } if *code == DbErrorCode::SchemaNotReady.code())
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Validation(_) => Some("VALID_001"),
            Self::Database { code, .. } => Some(code),
            Self::CompactionIntegrity { .. } => Some("COMPACT_001"),
            Self::RollupIncomplete { .. } => Some("ROLLUP_001"),
            Self::Config(_) => Some("CONFIG_001"),
            _ => None,
        }
    }
}

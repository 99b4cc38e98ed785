//! Error types for heropath
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad arguments, invalid task input, unknown task)
//! - 4: Operation failed (storage, migration, serialization)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the heropath CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for heropath operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid difficulty level: {0}")]
    InvalidDifficulty(String),

    #[error("Level must be at least 1, got: {0}")]
    InvalidLevel(i64),

    #[error("Total XP cannot be negative, got: {0}")]
    NegativeXp(i64),

    #[error("{0}")]
    Validation(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Storage failures (exit code 4)
    #[error("Storage quota exceeded while writing \"{key}\". Please free up some space.")]
    QuotaExceeded { key: String },

    #[error("Storage is not available: {0}")]
    StorageUnavailable(String),

    #[error("Invalid data under \"{key}\": {reason}")]
    InvalidData { key: String, reason: String },

    #[error("Migration failed for {key} to version {version}: {reason}")]
    MigrationFailed {
        key: String,
        version: u32,
        reason: String,
    },

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidDifficulty(_)
            | Error::InvalidLevel(_)
            | Error::NegativeXp(_)
            | Error::Validation(_)
            | Error::TaskNotFound(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_) => exit_codes::USER_ERROR,

            Error::QuotaExceeded { .. }
            | Error::StorageUnavailable(_)
            | Error::InvalidData { .. }
            | Error::MigrationFailed { .. }
            | Error::LockFailed(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Stable machine-readable code for storage-layer errors.
    pub fn storage_code(&self) -> &'static str {
        match self {
            Error::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Error::StorageUnavailable(_) | Error::LockFailed(_) => "STORAGE_DISABLED",
            Error::InvalidData { .. } | Error::Json(_) => "INVALID_DATA",
            Error::MigrationFailed { .. } => "MIGRATION_FAILED",
            _ => "UNKNOWN",
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Error::QuotaExceeded { .. })
    }

    /// Structured details for JSON output.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::QuotaExceeded { key } | Error::InvalidData { key, .. } => Some(
                serde_json::json!({ "storage_code": self.storage_code(), "key": key }),
            ),
            Error::MigrationFailed { key, version, .. } => Some(serde_json::json!({
                "storage_code": self.storage_code(),
                "key": key,
                "version": version,
            })),
            Error::StorageUnavailable(_) | Error::LockFailed(_) => {
                Some(serde_json::json!({ "storage_code": self.storage_code() }))
            }
            Error::TaskNotFound(id) => Some(serde_json::json!({ "task_id": id })),
            _ => None,
        }
    }
}

/// Result type alias for heropath operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}

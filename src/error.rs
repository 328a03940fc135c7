//! Error types for tasktrack
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task, duplicate id)
//! - 4: Operation failed (storage, serialization)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the tasktrack CLI
pub mod exit_codes {
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tasktrack operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task already exists: {0}")]
    DuplicateTask(String),

    // Operation failures (exit code 4)
    #[error("Malformed task record: {0}")]
    MalformedRecord(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::TaskNotFound(_)
            | Error::DuplicateTask(_) => exit_codes::USER_ERROR,

            Error::MalformedRecord(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for machine-readable output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::TaskNotFound(id) | Error::DuplicateTask(id) => {
                Some(serde_json::json!({ "id": id }))
            }
            Error::InvalidArgument(message)
            | Error::InvalidConfig(message)
            | Error::MalformedRecord(message) => {
                Some(serde_json::json!({ "message": message }))
            }
            Error::LockFailed(path) => Some(serde_json::json!({ "path": path })),
            _ => None,
        }
    }
}

/// Result type alias for tasktrack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error body of the JSON output envelope
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub message: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        let code = err.exit_code();
        JsonError {
            message: err.to_string(),
            code,
            kind: if code == exit_codes::USER_ERROR {
                "user_error"
            } else {
                "operation_failed"
            },
            details: err.details(),
        }
    }
}

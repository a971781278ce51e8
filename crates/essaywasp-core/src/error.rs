//! Core error types for essaywasp-core.
//!
//! Session operations never panic or throw past their boundary: every
//! failure is reduced to a [`SessionError`] value that tells the caller
//! whether retrying makes sense.

use std::path::PathBuf;
use thiserror::Error;

use crate::session::Phase;

/// Core error type for essaywasp-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Session operation errors
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failure of a session operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Wrong phase, insufficient credit or a conflicting operation.
    /// Never worth retrying as-is.
    #[error("{0}")]
    Precondition(#[from] PreconditionError),

    /// AI or persistence failure. In-memory state is untouched and the
    /// whole operation may be retried.
    #[error("{0}")]
    Gateway(#[from] GatewayError),

    /// Malformed input.
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

impl SessionError {
    /// Whether the caller may retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Gateway(_))
    }
}

/// Rejections decided before any I/O happens (or after, for stale results).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("Operation '{operation}' requires phase {expected:?}, session is {actual:?}")]
    InvalidPhase {
        operation: &'static str,
        expected: Phase,
        actual: Phase,
    },

    #[error("Insufficient credits: {balance} available, {required} required")]
    InsufficientCredits { balance: u32, required: u32 },

    /// Another mutating operation has not resolved yet.
    #[error("Operation '{operation}' rejected: another session operation is in flight")]
    Busy { operation: &'static str },

    /// The session moved on while the operation was suspended; its result
    /// was discarded.
    #[error("Result of '{operation}' discarded: session changed while it was in flight")]
    Stale { operation: &'static str },

    #[error("Session has already been saved")]
    AlreadyCommitted,

    #[error("Time is up: the essay can no longer be edited")]
    TimeExpired,
}

/// Failures reported by external collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("AI request failed: {message}")]
    Ai { message: String },

    #[error("Persistence failed: {message}")]
    Persistence { message: String },
}

impl GatewayError {
    pub fn ai(message: impl Into<String>) -> Self {
        GatewayError::Ai {
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        GatewayError::Persistence {
            message: message.into(),
        }
    }
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field was empty or whitespace only
    #[error("'{field}' must not be empty")]
    EmptyField { field: &'static str },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Connection mutex was poisoned by a panicking holder
    #[error("Database connection poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Could not determine or create the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(String),

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key not present in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<DatabaseError> for GatewayError {
    fn from(err: DatabaseError) -> Self {
        GatewayError::persistence(err.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::ai(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

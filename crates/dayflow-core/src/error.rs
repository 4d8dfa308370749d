//! Core error types for dayflow-core.
//!
//! Every engine operation returns a typed result; there are no silent
//! no-ops. Persistence errors are surfaced to the caller unchanged -- the
//! engine never retries on its own.

use std::path::PathBuf;
use thiserror::Error;

use crate::block::BlockStatus;

/// Core error type for dayflow-core.
#[derive(Error, Debug)]
pub enum EngineError {
    /// An action was issued against a block whose status does not allow it.
    #[error("block '{block_id}' is {status:?} and cannot accept this action")]
    InvalidState {
        block_id: String,
        status: BlockStatus,
    },

    /// A minute value was non-positive or out of range for the operation.
    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    /// A reorder request violated the structural rules of the ledger.
    #[error("invalid reorder: {0}")]
    InvalidReorder(String),

    /// A second disposition was submitted for a block that is already done.
    #[error("block '{block_id}' has already been resolved")]
    AlreadyResolved { block_id: String },

    /// Inserted or derived blocks would break the ledger's ordering rules.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// The referenced block does not exist in the ledger.
    #[error("unknown block: {0}")]
    UnknownBlock(String),

    /// The referenced task does not exist.
    #[error("unknown task: {0}")]
    UnknownTask(String),

    /// Collaborator I/O error. Never retried by the engine itself.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    /// Configuration-related errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Store-specific errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the database file
    #[error("failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// A stored row could not be decoded into an engine type
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Injected or simulated write failure (used by tests and demos)
    #[error("write rejected: {0}")]
    WriteRejected(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::QueryFailed(err.to_string())
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Result type alias for EngineError
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

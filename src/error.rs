//! Error types for logrelay
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using RelayError
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type for logrelay operations
#[derive(Debug, Error)]
pub enum RelayError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Engine closed")]
    EngineClosed,

    #[error("Not found")]
    NotFound,

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    // -------------------------------------------------------------------------
    // Repository Validation Errors
    // -------------------------------------------------------------------------
    #[error("Empty ID")]
    EmptyId,

    #[error("Empty external chat ID")]
    EmptyChatId,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Listener / Bot Errors
    // -------------------------------------------------------------------------
    #[error("Listener failure: {0}")]
    ListenerFailure(String),

    #[error("Bot API error: {0}")]
    Bot(String),

    #[error("Unauthorized to use command")]
    Unauthorized,

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Context cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// True for the empty-identifier family (`EmptyId`, `EmptyChatId`)
    pub fn is_empty_identifier(&self) -> bool {
        matches!(self, RelayError::EmptyId | RelayError::EmptyChatId)
    }

    /// True when the error is the cancellation of a context
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RelayError::Cancelled(_))
    }

    /// Collapse engine-internal failures into `StorageUnavailable`.
    ///
    /// Outcomes callers branch on (`NotFound`, `EngineClosed`, ...) pass through.
    pub(crate) fn into_storage(self) -> RelayError {
        match self {
            RelayError::Io(e) => RelayError::StorageUnavailable(e.to_string()),
            RelayError::WalCorruption(msg)
            | RelayError::Storage(msg)
            | RelayError::Serialization(msg) => RelayError::StorageUnavailable(msg),
            other => other,
        }
    }
}

impl From<bincode::Error> for RelayError {
    fn from(e: bincode::Error) -> Self {
        RelayError::Serialization(e.to_string())
    }
}

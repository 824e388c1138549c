//! Global error types for the FoodLog application.
//!
//! All error categories across the application are unified into a single
//! `FlError` enum with conversions from underlying library errors. Each
//! variant maps to an [`ErrorKind`], a plain serializable tag that survives
//! the trip across a worker boundary so the receiving side can rebuild the
//! same variant.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience type alias for Results using FlError.
pub type FlResult<T> = Result<T, FlError>;

/// Unified error type covering all error categories in FoodLog.
#[derive(Error, Debug)]
pub enum FlError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    // -- Storage errors --
    /// The record store is unavailable or rejected the operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// The record store ran out of space.
    #[error("storage full: {0}")]
    StorageFull(String),

    /// Database migration failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// Database connection pool error.
    #[error("connection pool error: {0}")]
    Pool(String),

    /// Database integrity check failed.
    #[error("database integrity check failed: {0}")]
    IntegrityCheck(String),

    /// Operation targeted an id that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    // -- Imaging errors --
    /// The source image could not be decoded.
    #[error("image decode error: {0}")]
    ImageDecode(String),

    /// The encoder refused to produce an output image.
    #[error("encode error: {0}")]
    Encode(String),

    // -- Worker errors --
    /// The background execution context crashed, exited, or is unsupported.
    #[error("worker transport error: {0}")]
    WorkerTransport(String),

    // -- Import errors --
    /// An import document is malformed.
    #[error("validation error: {0}")]
    Validation(String),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Serializable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Storage,
    StorageFull,
    NotFound,
    ImageDecode,
    Encode,
    WorkerTransport,
    Validation,
    Io,
    Serialization,
    Internal,
}

impl FlError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlError::Config(_) => ErrorKind::Config,
            FlError::Storage(_)
            | FlError::Migration(_)
            | FlError::Pool(_)
            | FlError::IntegrityCheck(_) => ErrorKind::Storage,
            FlError::StorageFull(_) => ErrorKind::StorageFull,
            FlError::NotFound(_) => ErrorKind::NotFound,
            FlError::ImageDecode(_) => ErrorKind::ImageDecode,
            FlError::Encode(_) => ErrorKind::Encode,
            FlError::WorkerTransport(_) => ErrorKind::WorkerTransport,
            FlError::Validation(_) => ErrorKind::Validation,
            FlError::Io(_) => ErrorKind::Io,
            FlError::Serialization(_) => ErrorKind::Serialization,
            FlError::Internal(_) | FlError::Other(_) => ErrorKind::Internal,
        }
    }

    /// Rebuild an error from a category and message, e.g. after it crossed a
    /// worker boundary as plain data.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Config => FlError::Config(message),
            ErrorKind::Storage => FlError::Storage(message),
            ErrorKind::StorageFull => FlError::StorageFull(message),
            ErrorKind::NotFound => FlError::NotFound(message),
            ErrorKind::ImageDecode => FlError::ImageDecode(message),
            ErrorKind::Encode => FlError::Encode(message),
            ErrorKind::WorkerTransport => FlError::WorkerTransport(message),
            ErrorKind::Validation => FlError::Validation(message),
            ErrorKind::Io => FlError::Io(std::io::Error::other(message)),
            ErrorKind::Serialization => FlError::Serialization(message),
            ErrorKind::Internal => FlError::Internal(message),
        }
    }

    /// The message carried by this error, without the category prefix.
    pub fn detail(&self) -> String {
        match self {
            FlError::Config(m)
            | FlError::Storage(m)
            | FlError::StorageFull(m)
            | FlError::Migration(m)
            | FlError::Pool(m)
            | FlError::IntegrityCheck(m)
            | FlError::NotFound(m)
            | FlError::ImageDecode(m)
            | FlError::Encode(m)
            | FlError::WorkerTransport(m)
            | FlError::Validation(m)
            | FlError::Serialization(m)
            | FlError::Internal(m) => m.clone(),
            FlError::Io(e) => e.to_string(),
            FlError::Other(e) => e.to_string(),
        }
    }

    /// Message suitable for showing to the user, phrased per category.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::StorageFull => {
                "Storage is full. Delete some records or free disk space and try again.".to_string()
            }
            ErrorKind::Storage => format!("The food log could not be accessed: {}", self.detail()),
            ErrorKind::NotFound => format!("No such record ({})", self.detail()),
            ErrorKind::ImageDecode => "The photo could not be read. Is it a valid image file?".to_string(),
            ErrorKind::Encode => format!("The photo could not be compressed: {}", self.detail()),
            ErrorKind::WorkerTransport => {
                format!("Background processing failed: {}", self.detail())
            }
            ErrorKind::Validation => format!("The backup file is not valid: {}", self.detail()),
            ErrorKind::Config => format!("Configuration problem: {}", self.detail()),
            _ => self.to_string(),
        }
    }
}

impl From<serde_json::Error> for FlError {
    fn from(e: serde_json::Error) -> Self {
        FlError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for FlError {
    fn from(e: toml::de::Error) -> Self {
        FlError::Config(e.to_string())
    }
}

impl From<rusqlite::Error> for FlError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DiskFull) => FlError::StorageFull(e.to_string()),
            _ => FlError::Storage(e.to_string()),
        }
    }
}

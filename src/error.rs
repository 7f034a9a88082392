//! Error types for the telemetry service.

use thiserror::Error;

/// Main error type for store and ingestion operations.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid body: {0}")]
    InvalidBody(String),

    #[error("no delete criteria provided")]
    MissingCriteria,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid store format: {0}")]
    InvalidFormat(String),

    #[error("checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("store is locked by another process")]
    Locked,

    #[error("store not initialized")]
    NotInitialized,
}

impl From<serde_json::Error> for TelemetryError {
    fn from(e: serde_json::Error) -> Self {
        TelemetryError::Serialization(e.to_string())
    }
}

/// Result type for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

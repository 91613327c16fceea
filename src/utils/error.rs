//! Error handling for mediagrab

use thiserror::Error;

/// Main error type for mediagrab
#[derive(Debug, Error)]
pub enum MediagrabError {
    /// The download endpoint answered with a non-success status.
    /// Displays only the reason so it can go straight into the error slot.
    #[error("{reason}")]
    RequestRejected { status: u16, reason: String },

    #[error("Readable stream not supported for this response")]
    StreamUnsupported,

    #[error("{0}")]
    Transfer(String),

    #[error("A transfer is already in progress")]
    TransferInProgress,

    #[error("Unknown format '{0}', expected video or audio")]
    InvalidFormat(String),

    #[error("Quality '{quality}' is not available for {format}")]
    InvalidQuality { format: String, quality: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    MetadataUnavailable(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl MediagrabError {
    /// Collapse any failure that happened mid-transfer into a `Transfer` error,
    /// keeping the variants the orchestrator reports on their own.
    pub fn into_transfer(self) -> Self {
        match self {
            e @ (MediagrabError::RequestRejected { .. }
            | MediagrabError::StreamUnsupported
            | MediagrabError::Transfer(_)) => e,
            other => MediagrabError::Transfer(other.to_string()),
        }
    }
}

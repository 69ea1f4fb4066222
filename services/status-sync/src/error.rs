//! Error types for the status synchronization client

/// Errors that can occur while synchronizing node status
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Not connected to backend")]
    NotConnected,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Failed to send message: {0}")]
    SendError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for status synchronization operations
pub type Result<T> = std::result::Result<T, SyncError>;

//! Huginn error types

/// Huginn error types
#[derive(Debug, thiserror::Error)]
pub enum HuginnError {
    // Upstream/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("empty response from upstream")]
    EmptyResponse,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data error: {0}")]
    DataError(String),

    // Storage errors
    #[error("cache backend error: {0}")]
    Cache(String),

    #[error("upload failed: {0}")]
    Upload(String),

    /// The store cannot hold this record (e.g. raw bytes handed to a
    /// pointer-only store).
    #[error("unsupported record for {store} store: {reason}")]
    UnsupportedRecord { store: &'static str, reason: String },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for HuginnError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => HuginnError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => HuginnError::Http(err.to_string()),
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for HuginnError {
    fn from(err: redis::RedisError) -> Self {
        HuginnError::Cache(err.to_string())
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;

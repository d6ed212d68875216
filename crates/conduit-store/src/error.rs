//! Error types for the store

/// Result type for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for store operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Backend connection error
    #[error("Backend connection error: {0}")]
    Connection(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Key not found
    #[error("Key not found: {0}")]
    NotFound(String),

    /// A stored value did not have the expected shape
    #[error("Conflict on key {key}: {reason}")]
    Conflict {
        /// Offending key
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// Backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Backend(err.to_string())
    }
}

impl From<Error> for conduit_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(key) => conduit_core::Error::NotFound(format!("{key} not found")),
            other => conduit_core::Error::Storage(other.to_string()),
        }
    }
}

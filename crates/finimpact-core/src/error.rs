//! Error types for the FinImpact data layer

use thiserror::Error;

/// Core error type for database and configuration operations
#[derive(Error, Debug)]
pub enum FinImpactError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Connection pool exhausted after waiting {waited_ms}ms")]
    PoolExhausted { waited_ms: u64 },

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl FinImpactError {
    /// Whether the process can keep running after this error.
    ///
    /// Configuration errors surface at startup and mean there is no usable
    /// data access at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FinImpactError::Configuration(_))
    }
}

/// Result type alias for FinImpact data operations
pub type Result<T> = std::result::Result<T, FinImpactError>;

//! Error types for the synchronization engine
//!
//! Two families of failures exist: run-fatal errors (no feed, destination
//! unreachable) that abort a run before any batch starts, and per-record
//! errors that are counted and carried in the final report without ever
//! interrupting sibling records.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for the synchronization engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Every configured feed source was tried and failed
    #[error("all {} feed sources failed: [{}]", tried.len(), errors.join("; "))]
    FeedUnavailable {
        tried: Vec<String>,
        errors: Vec<String>,
    },

    /// One feed source failed; recorded and the next source is tried
    #[error("feed source failed: {0}")]
    Source(String),

    /// Destination catalog unreachable at run start
    #[error("destination unreachable: {0}")]
    Connectivity(String),

    /// Transient destination failure (5xx, malformed body); retried
    #[error("destination API error: {0}")]
    Api(String),

    /// Definitive destination failure (401/403/404-class); never retried
    #[error("destination rejected call ({status}): {message}")]
    DefinitiveApi { status: u16, message: String },

    /// Create collided with an existing SKU on the destination
    #[error("duplicate key on create: {0}")]
    DuplicateKey(String),

    /// A run is already fetching or processing
    #[error("sync already running")]
    AlreadyRunning,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl EngineError {
    /// Whether a destination call failing with this error must not be retried
    pub fn is_definitive(&self) -> bool {
        matches!(
            self,
            EngineError::DefinitiveApi { .. }
                | EngineError::DuplicateKey(_)
                | EngineError::AlreadyRunning
                | EngineError::Parse(_)
                | EngineError::Config(_)
        )
    }

    /// Whether this error aborts the whole run before any batch starts
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::FeedUnavailable { .. } | EngineError::Connectivity(_)
        )
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Parse(err.to_string())
    }
}

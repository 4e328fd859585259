//! Error taxonomy shared by every peloton component.

use thiserror::Error;

/// Main error type for peloton.
#[derive(Error, Debug)]
pub enum PelotonError {
    /// Malformed GPX or other unparseable input.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid timestamp: {0}. Expected yyyy-MM-ddTHH:mm:ssZ")]
    Timestamp(String),

    /// A pipeline invariant does not hold. Indicates a bug in chunking,
    /// dispatch or aggregation and must never be retried.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PelotonError>;

impl PelotonError {
    /// Create a parse error from a message
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an invariant violation from a message
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}

use thiserror::Error;

/// Errors produced by type construction and decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

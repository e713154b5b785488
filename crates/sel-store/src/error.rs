use crate::document::Version;
use crate::key::DocKey;

/// Errors from document store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A precondition no longer holds: another commit changed the document
    /// after this transaction read it.
    #[error("write conflict on {key}: expected {expected:?}, found {actual:?}")]
    Conflict {
        key: DocKey,
        expected: Option<Version>,
        actual: Option<Version>,
    },

    /// The access rules rejected a read or write.
    #[error("permission denied: {principal} may not {access}")]
    PermissionDenied { principal: String, access: String },

    /// The store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A key failed path validation.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Contention and unavailability are transient; everything else is not.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Unavailable(_))
    }
}

impl From<sel_types::TypeError> for StoreError {
    fn from(err: sel_types::TypeError) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

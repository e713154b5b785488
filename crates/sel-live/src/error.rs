use sel_store::StoreError;
use sel_types::TypeError;

/// Terminal failures of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiveViewError {
    /// Read access to a watched document was denied or revoked.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("subscriber lagged by {0} change sets")]
    Lagged(u64),

    /// The store closed the watch without reporting a cause.
    #[error("watch closed")]
    Closed,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<StoreError> for LiveViewError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied { .. } => Self::PermissionDenied(err.to_string()),
            StoreError::Unavailable(reason) => Self::Unavailable(reason),
            StoreError::InvalidKey { .. } => Self::InvalidKey(err.to_string()),
            StoreError::Serialization(msg) => Self::Serialization(msg),
            // Watches never commit, so a conflict can only come from a
            // misbehaving store.
            StoreError::Conflict { .. } => Self::Unavailable(err.to_string()),
        }
    }
}

impl From<TypeError> for LiveViewError {
    fn from(err: TypeError) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type LiveViewResult<T> = Result<T, LiveViewError>;

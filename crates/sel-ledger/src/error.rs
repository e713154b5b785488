use sel_store::StoreError;
use sel_types::TypeError;

/// Errors produced by ledger operations.
///
/// No variant ever leaves a transaction partially applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Rejected before touching the store: self-reference or malformed id.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Store-level authorization rejection. Terminal.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Contention; safe to retry with identical inputs.
    #[error("transaction aborted after {attempts} attempt(s): {reason}")]
    TransactionAborted { attempts: u32, reason: String },

    /// Transient connectivity failure; safe to retry with backoff.
    #[error("store unavailable after {attempts} attempt(s): {reason}")]
    Unavailable { attempts: u32, reason: String },

    /// Stored state contradicts an invariant; the transaction was aborted.
    #[error("integrity violation at {key}: {reason}")]
    IntegrityViolation { key: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::TransactionAborted { .. } | Self::Unavailable { .. }
        )
    }

    /// Record how many attempts were made before giving up.
    pub(crate) fn with_attempts(self, n: u32) -> Self {
        match self {
            Self::TransactionAborted { reason, .. } => Self::TransactionAborted {
                attempts: n,
                reason,
            },
            Self::Unavailable { reason, .. } => Self::Unavailable {
                attempts: n,
                reason,
            },
            other => other,
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => Self::TransactionAborted {
                attempts: 1,
                reason: err.to_string(),
            },
            StoreError::PermissionDenied { .. } => Self::PermissionDenied(err.to_string()),
            StoreError::Unavailable(reason) => Self::Unavailable {
                attempts: 1,
                reason,
            },
            StoreError::InvalidKey { .. } => Self::InvalidOperation(err.to_string()),
            StoreError::Serialization(msg) => Self::Serialization(msg),
        }
    }
}

impl From<TypeError> for LedgerError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidId { .. } => Self::InvalidOperation(err.to_string()),
            TypeError::Serialization(msg) => Self::Serialization(msg),
        }
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use sel_store::DocKey;

    #[test]
    fn store_errors_map_to_taxonomy() {
        let conflict = StoreError::Conflict {
            key: DocKey::parse("users/a").unwrap(),
            expected: None,
            actual: None,
        };
        assert!(matches!(
            LedgerError::from(conflict),
            LedgerError::TransactionAborted { attempts: 1, .. }
        ));
        assert!(matches!(
            LedgerError::from(StoreError::Unavailable("down".into())),
            LedgerError::Unavailable { .. }
        ));
        let denied = LedgerError::from(StoreError::PermissionDenied {
            principal: "user:a".into(),
            access: "write:users/b".into(),
        });
        assert!(matches!(denied, LedgerError::PermissionDenied(_)));
        assert!(!denied.is_retriable());
    }

    #[test]
    fn with_attempts_only_touches_retriable() {
        let err = LedgerError::Unavailable {
            attempts: 1,
            reason: "x".into(),
        }
        .with_attempts(5);
        assert_eq!(
            err,
            LedgerError::Unavailable {
                attempts: 5,
                reason: "x".into()
            }
        );
        let other = LedgerError::InvalidOperation("self".into()).with_attempts(5);
        assert_eq!(other, LedgerError::InvalidOperation("self".into()));
    }
}

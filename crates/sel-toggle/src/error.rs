use sel_ledger::LedgerError;

/// Errors surfaced to toggle callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToggleError {
    /// The caller tried to follow themselves. A specific invalid operation:
    /// [`ToggleError::is_invalid_operation`] reports it as one.
    #[error("cannot follow yourself: {0}")]
    SelfReference(String),

    #[error("caller is not authenticated")]
    NotAuthenticated,

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("transaction aborted after {attempts} attempt(s): {reason}")]
    TransactionAborted { attempts: u32, reason: String },

    #[error("store unavailable after {attempts} attempt(s): {reason}")]
    Unavailable { attempts: u32, reason: String },

    /// Ledger state could not be read or contradicts an invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ToggleError {
    /// Whether retrying the identical call may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::TransactionAborted { .. } | Self::Unavailable { .. }
        )
    }

    /// Whether the request itself is invalid, self-follows included.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, Self::InvalidOperation(_) | Self::SelfReference(_))
    }
}

impl From<LedgerError> for ToggleError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidOperation(msg) => Self::InvalidOperation(msg),
            LedgerError::NotFound { kind, id } => Self::NotFound { kind, id },
            LedgerError::PermissionDenied(msg) => Self::PermissionDenied(msg),
            LedgerError::TransactionAborted { attempts, reason } => {
                Self::TransactionAborted { attempts, reason }
            }
            LedgerError::Unavailable { attempts, reason } => Self::Unavailable { attempts, reason },
            LedgerError::IntegrityViolation { .. } | LedgerError::Serialization(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

pub type ToggleResult<T> = Result<T, ToggleError>;

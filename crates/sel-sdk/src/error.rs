use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid id: {0}")]
    InvalidId(#[from] sel_types::TypeError),

    #[error("toggle failed: {0}")]
    Toggle(#[from] sel_toggle::ToggleError),

    #[error("ledger error: {0}")]
    Ledger(#[from] sel_ledger::LedgerError),

    #[error("live view error: {0}")]
    Live(#[from] sel_live::LiveViewError),

    #[error("tracing already initialized: {0}")]
    Telemetry(String),
}

impl SdkError {
    /// Whether retrying the identical call may succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Toggle(err) => err.is_retriable(),
            Self::Ledger(err) => err.is_retriable(),
            Self::Live(err) => matches!(err, sel_live::LiveViewError::Unavailable(_)),
            _ => false,
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

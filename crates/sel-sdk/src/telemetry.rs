use tracing::Level;

use crate::config::LoggingConfig;
use crate::error::{SdkError, SdkResult};

/// Install a `fmt` subscriber at the configured level.
///
/// Fails with [`SdkError::Telemetry`] if a global subscriber is already set,
/// which callers embedding the ledger in a larger process can ignore.
pub fn init_tracing(config: &LoggingConfig) -> SdkResult<()> {
    let level: Level = config
        .level
        .parse()
        .map_err(|_| SdkError::Config(format!("unknown log level: {}", config.level)))?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| SdkError::Telemetry(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_level() {
        let err = init_tracing(&LoggingConfig {
            level: "loud".into(),
        })
        .unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
    }

    #[test]
    fn second_init_reports_instead_of_panicking() {
        let config = LoggingConfig::default();
        let _ = init_tracing(&config);
        assert!(matches!(init_tracing(&config), Err(SdkError::Telemetry(_))));
    }
}

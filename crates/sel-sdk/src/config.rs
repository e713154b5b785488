use serde::{Deserialize, Serialize};

use sel_ledger::RetryConfig;
use sel_live::LiveViewConfig;
use sel_store::StoreConfig;

use crate::error::{SdkError, SdkResult};

/// Top-level configuration. Every section and field is optional in TOML.
///
/// ```toml
/// [store]
/// node_id = 3
/// watch_capacity = 64
///
/// [retry]
/// max_attempts = 8
/// base_delay_ms = 10
///
/// [live]
/// resync_on_lag = true
///
/// [logging]
/// level = "debug"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub store: StoreConfig,
    pub retry: RetryConfig,
    pub live: LiveViewConfig,
    pub logging: LoggingConfig,
}

impl LedgerConfig {
    pub fn from_toml_str(s: &str) -> SdkResult<Self> {
        toml::from_str(s).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string(self).map_err(|e| SdkError::Config(e.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `trace`, `debug`, `info`, `warn`, `error`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = LedgerConfig::default();
        assert_eq!(c.store.watch_capacity, 256);
        assert_eq!(c.retry.max_attempts, 5);
        assert!(c.live.resync_on_lag);
        assert_eq!(c.logging.level, "info");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = LedgerConfig::from_toml_str(
            r#"
            [retry]
            max_attempts = 8
            jitter = false

            [store]
            node_id = 3
            "#,
        )
        .unwrap();
        assert_eq!(c.retry.max_attempts, 8);
        assert!(!c.retry.jitter);
        assert_eq!(c.retry.base_delay_ms, RetryConfig::default().base_delay_ms);
        assert_eq!(c.store.node_id, 3);
        assert_eq!(c.store.watch_capacity, 256);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(LedgerConfig::from_toml_str("").unwrap(), LedgerConfig::default());
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = LedgerConfig::from_toml_str("[retry]\nmax_attempts = \"many\"").unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
    }

    #[test]
    fn toml_round_trip() {
        let mut c = LedgerConfig::default();
        c.logging.level = "debug".into();
        let text = c.to_toml_string().unwrap();
        assert_eq!(LedgerConfig::from_toml_str(&text).unwrap(), c);
    }
}

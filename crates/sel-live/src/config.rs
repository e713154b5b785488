use serde::{Deserialize, Serialize};

/// Live view tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveViewConfig {
    /// Re-read a fresh snapshot when a subscriber falls behind the store's
    /// notification buffer. When `false`, lag terminates the subscription.
    pub resync_on_lag: bool,
}

impl Default for LiveViewConfig {
    fn default() -> Self {
        Self {
            resync_on_lag: true,
        }
    }
}

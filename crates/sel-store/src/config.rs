use serde::{Deserialize, Serialize};

/// Configuration for [`crate::InMemoryDocumentStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Node identifier stamped into commit timestamps.
    pub node_id: u16,
    /// Capacity of each watch's broadcast channel. A watcher that falls
    /// further behind than this observes a lag instead of the missed sets.
    pub watch_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            watch_capacity: 256,
        }
    }
}

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sel_types::TemporalAnchor;

use crate::key::DocKey;

/// Commit sequence number. Version `0` is the empty store.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version(pub u64);

impl Version {
    pub const ZERO: Self = Self(0);

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identifier of one transaction attempt, time-ordered (UUID v7).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(uuid::Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}

/// A document together with the commit that last wrote it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionedDoc {
    pub version: Version,
    pub updated_at: TemporalAnchor,
    pub data: Value,
}

/// A consistent read of several keys at one store version.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    /// Store version the snapshot was taken at.
    pub version: Version,
    /// Present documents; absent keys are simply missing.
    pub docs: BTreeMap<DocKey, VersionedDoc>,
}

impl Snapshot {
    pub fn get(&self, key: &DocKey) -> Option<&VersionedDoc> {
        self.docs.get(key)
    }
}

/// A single buffered mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    Set { key: DocKey, data: Value },
    Delete { key: DocKey },
}

impl Write {
    pub fn key(&self) -> &DocKey {
        match self {
            Self::Set { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// The version a transaction observed for a key.
///
/// `expected: None` means the key was observed absent and must still be
/// absent at commit time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Precondition {
    pub key: DocKey,
    pub expected: Option<Version>,
}

/// Atomic unit submitted to [`crate::DocumentStore::commit`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
    pub transaction_id: TransactionId,
    pub preconditions: Vec<Precondition>,
    pub writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Result of a successful commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitReceipt {
    pub transaction_id: TransactionId,
    /// New store version, or the current one for a read-only batch.
    pub version: Version,
    pub timestamp: TemporalAnchor,
    pub writes_applied: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering_and_next() {
        assert!(Version::ZERO < Version::ZERO.next());
        assert_eq!(Version(4).next(), Version(5));
        assert_eq!(Version(3).to_string(), "v3");
    }

    #[test]
    fn transaction_ids_are_unique() {
        let a = TransactionId::new();
        let b = TransactionId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("tx:"));
    }

    #[test]
    fn empty_batch_is_read_only() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_read_only());
        batch.writes.push(Write::Delete {
            key: DocKey::parse("a/b").unwrap(),
        });
        assert!(!batch.is_read_only());
        assert_eq!(batch.writes[0].key().as_str(), "a/b");
    }
}

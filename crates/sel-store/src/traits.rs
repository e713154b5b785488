use async_trait::async_trait;

use sel_types::TemporalAnchor;

use crate::access::Principal;
use crate::document::{CommitReceipt, Snapshot, VersionedDoc, WriteBatch};
use crate::error::StoreResult;
use crate::key::DocKey;
use crate::watch::Watch;

/// Multi-document store with atomic batches and per-key change watches.
///
/// All implementations must satisfy these invariants:
/// - A [`WriteBatch`] is validated (preconditions and access rules) and
///   applied as one unit at one new version, or not applied at all.
/// - Reads are served from committed state only.
/// - Watches see every commit touching their keys, in commit order, each as
///   a single change set. A watch failure is terminal.
/// - Every operation consults the access rules for the given principal.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document. `Ok(None)` if it does not exist.
    async fn get(&self, principal: &Principal, key: &DocKey) -> StoreResult<Option<VersionedDoc>>;

    /// Read several documents from a single consistent version.
    async fn get_many(&self, principal: &Principal, keys: &[DocKey]) -> StoreResult<Snapshot>;

    /// Documents directly under `collection`, sorted by key.
    async fn list(
        &self,
        principal: &Principal,
        collection: &DocKey,
    ) -> StoreResult<Vec<(DocKey, VersionedDoc)>>;

    /// Validate and atomically apply a batch.
    async fn commit(&self, principal: &Principal, batch: WriteBatch) -> StoreResult<CommitReceipt>;

    /// Subscribe to changes of the given keys.
    async fn watch(&self, principal: &Principal, keys: &[DocKey]) -> StoreResult<Watch>;

    /// A timestamp from the store's clock, for stamping records in a batch.
    fn now(&self) -> TemporalAnchor;
}

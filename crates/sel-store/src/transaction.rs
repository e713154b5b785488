use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use sel_types::TemporalAnchor;

use crate::access::Principal;
use crate::document::{CommitReceipt, Precondition, TransactionId, VersionedDoc, Write, WriteBatch};
use crate::error::StoreResult;
use crate::key::DocKey;
use crate::traits::DocumentStore;

/// Optimistic read-modify-write transaction.
///
/// Every key read is remembered with the version observed (or its absence)
/// and submitted as a precondition on commit, so the commit fails with a
/// conflict if any of those documents changed in the meantime. Reads are
/// repeatable and see the transaction's own pending writes. Nothing reaches
/// the store until [`Transaction::commit`].
pub struct Transaction<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    principal: Principal,
    id: TransactionId,
    reads: BTreeMap<DocKey, Option<VersionedDoc>>,
    pending: BTreeMap<DocKey, Option<Value>>,
}

impl<'a, S: DocumentStore + ?Sized> Transaction<'a, S> {
    pub fn begin(store: &'a S, principal: Principal) -> Self {
        Self {
            store,
            principal,
            id: TransactionId::new(),
            reads: BTreeMap::new(),
            pending: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Timestamp from the store clock for records written by this transaction.
    pub fn now(&self) -> TemporalAnchor {
        self.store.now()
    }

    /// Read a document, observing pending writes first.
    pub async fn get(&mut self, key: &DocKey) -> StoreResult<Option<Value>> {
        if let Some(pending) = self.pending.get(key) {
            return Ok(pending.clone());
        }
        if let Some(observed) = self.reads.get(key) {
            return Ok(observed.as_ref().map(|doc| doc.data.clone()));
        }
        let observed = self.store.get(&self.principal, key).await?;
        let data = observed.as_ref().map(|doc| doc.data.clone());
        self.reads.insert(key.clone(), observed);
        Ok(data)
    }

    /// Documents directly under `collection`, merged with pending writes.
    ///
    /// Listing does not add preconditions: it is meant for enumerations that
    /// do not feed a write decision.
    pub async fn list(&mut self, collection: &DocKey) -> StoreResult<BTreeMap<DocKey, Value>> {
        let mut listed: BTreeMap<DocKey, Value> = self
            .store
            .list(&self.principal, collection)
            .await?
            .into_iter()
            .map(|(key, doc)| (key, doc.data))
            .collect();
        for (key, pending) in &self.pending {
            if !key.is_child_of(collection) {
                continue;
            }
            match pending {
                Some(data) => {
                    listed.insert(key.clone(), data.clone());
                }
                None => {
                    listed.remove(key);
                }
            }
        }
        Ok(listed)
    }

    pub fn set(&mut self, key: DocKey, data: Value) {
        self.pending.insert(key, Some(data));
    }

    pub fn delete(&mut self, key: DocKey) {
        self.pending.insert(key, None);
    }

    pub fn has_writes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Submit reads as preconditions and pending writes as one batch.
    pub async fn commit(self) -> StoreResult<CommitReceipt> {
        let preconditions = self
            .reads
            .iter()
            .map(|(key, observed)| Precondition {
                key: key.clone(),
                expected: observed.as_ref().map(|doc| doc.version),
            })
            .collect();
        let writes = self
            .pending
            .into_iter()
            .map(|(key, data)| match data {
                Some(data) => Write::Set { key, data },
                None => Write::Delete { key },
            })
            .collect();
        let batch = WriteBatch {
            transaction_id: self.id,
            preconditions,
            writes,
        };
        debug!(
            tx = %self.id,
            reads = batch.preconditions.len(),
            writes = batch.writes.len(),
            "committing transaction"
        );
        self.store.commit(&self.principal, batch).await
    }
}

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use sel_types::TemporalAnchor;

use crate::access::{Access, AccessRules, AllowAll, Principal};
use crate::config::StoreConfig;
use crate::document::{CommitReceipt, Snapshot, Version, VersionedDoc, Write, WriteBatch};
use crate::error::{StoreError, StoreResult};
use crate::hlc::HybridLogicalClock;
use crate::key::DocKey;
use crate::traits::DocumentStore;
use crate::watch::{Change, Watch, WatchRouter};

/// In-memory document store.
///
/// Intended for tests and embedding. Documents live in a `BTreeMap` behind a
/// `RwLock`; commits are serialized by the write lock and validated against
/// their preconditions before anything is applied. Change sets are routed to
/// watchers while the write lock is held so delivery follows commit order.
///
/// The store can be switched offline to exercise unavailability handling,
/// and its access rules can be replaced at runtime.
pub struct InMemoryDocumentStore {
    state: RwLock<StoreState>,
    clock: HybridLogicalClock,
    router: WatchRouter,
    rules: RwLock<Arc<dyn AccessRules>>,
    online: AtomicBool,
}

#[derive(Default)]
struct StoreState {
    version: Version,
    docs: BTreeMap<DocKey, VersionedDoc>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            clock: HybridLogicalClock::new(config.node_id),
            router: WatchRouter::new(config.watch_capacity),
            rules: RwLock::new(Arc::new(AllowAll)),
            online: AtomicBool::new(true),
        }
    }

    /// Builder-style variant of [`Self::set_rules`].
    pub fn with_rules(self, rules: impl AccessRules + 'static) -> Self {
        *self.rules.write().expect("rules lock poisoned") = Arc::new(rules);
        self
    }

    /// Replace the access rules. Watchers that can no longer read their keys
    /// receive a terminal permission failure.
    pub fn set_rules(&self, rules: impl AccessRules + 'static) {
        let rules: Arc<dyn AccessRules> = Arc::new(rules);
        *self.rules.write().expect("rules lock poisoned") = Arc::clone(&rules);
        let revoked = self.router.recheck(rules.as_ref());
        if revoked > 0 {
            info!(revoked, "access rules replaced; watches revoked");
        }
    }

    /// Switch availability. Going offline fails every open watch.
    ///
    /// Holds the state lock, so a commit either lands before the switch and
    /// is routed to watchers, or observes the store offline.
    pub fn set_online(&self, online: bool) {
        let _state = self.state.write().expect("lock poisoned");
        let was = self.online.swap(online, Ordering::SeqCst);
        if was && !online {
            info!("store going offline");
            self.router
                .fail_all(StoreError::Unavailable("store went offline".into()));
        } else if !was && online {
            info!("store back online");
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Current store version.
    pub fn version(&self) -> Version {
        self.state.read().expect("lock poisoned").version
    }

    /// Number of documents currently stored.
    pub fn len(&self) -> usize {
        self.state.read().expect("lock poisoned").docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of watches with a live receiver.
    pub fn watch_count(&self) -> usize {
        self.router.subscriber_count()
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(StoreError::Unavailable("store is offline".into()))
        }
    }

    fn current_rules(&self) -> Arc<dyn AccessRules> {
        Arc::clone(&self.rules.read().expect("rules lock poisoned"))
    }

    fn authorize(
        &self,
        rules: &dyn AccessRules,
        principal: &Principal,
        access: Access,
    ) -> StoreResult<()> {
        if rules.allows(principal, &access) {
            return Ok(());
        }
        warn!(%principal, %access, "store access denied");
        Err(StoreError::PermissionDenied {
            principal: principal.to_string(),
            access: access.to_string(),
        })
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, principal: &Principal, key: &DocKey) -> StoreResult<Option<VersionedDoc>> {
        self.ensure_online()?;
        self.authorize(self.current_rules().as_ref(), principal, Access::Read(key.clone()))?;
        let state = self.state.read().expect("lock poisoned");
        Ok(state.docs.get(key).cloned())
    }

    async fn get_many(&self, principal: &Principal, keys: &[DocKey]) -> StoreResult<Snapshot> {
        self.ensure_online()?;
        let rules = self.current_rules();
        for key in keys {
            self.authorize(rules.as_ref(), principal, Access::Read(key.clone()))?;
        }
        let state = self.state.read().expect("lock poisoned");
        let docs = keys
            .iter()
            .filter_map(|key| state.docs.get(key).map(|doc| (key.clone(), doc.clone())))
            .collect();
        Ok(Snapshot {
            version: state.version,
            docs,
        })
    }

    async fn list(
        &self,
        principal: &Principal,
        collection: &DocKey,
    ) -> StoreResult<Vec<(DocKey, VersionedDoc)>> {
        self.ensure_online()?;
        self.authorize(
            self.current_rules().as_ref(),
            principal,
            Access::Read(collection.clone()),
        )?;
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .docs
            .iter()
            .filter(|(key, _)| key.is_child_of(collection))
            .map(|(key, doc)| (key.clone(), doc.clone()))
            .collect())
    }

    async fn commit(&self, principal: &Principal, batch: WriteBatch) -> StoreResult<CommitReceipt> {
        self.ensure_online()?;
        let rules = self.current_rules();
        for write in &batch.writes {
            self.authorize(rules.as_ref(), principal, Access::Write(write.key().clone()))?;
        }

        let mut state = self.state.write().expect("lock poisoned");
        self.ensure_online()?;

        for pre in &batch.preconditions {
            let actual = state.docs.get(&pre.key).map(|doc| doc.version);
            if actual != pre.expected {
                debug!(
                    tx = %batch.transaction_id,
                    key = %pre.key,
                    expected = ?pre.expected,
                    actual = ?actual,
                    "precondition failed"
                );
                return Err(StoreError::Conflict {
                    key: pre.key.clone(),
                    expected: pre.expected,
                    actual,
                });
            }
        }

        let timestamp = self.clock.now();
        if batch.is_read_only() {
            return Ok(CommitReceipt {
                transaction_id: batch.transaction_id,
                version: state.version,
                timestamp,
                writes_applied: 0,
            });
        }

        let version = state.version.next();
        let mut changes = Vec::with_capacity(batch.writes.len());
        for write in batch.writes {
            match write {
                Write::Set { key, data } => {
                    let doc = VersionedDoc {
                        version,
                        updated_at: timestamp,
                        data,
                    };
                    state.docs.insert(key.clone(), doc.clone());
                    changes.push(Change {
                        key,
                        doc: Some(doc),
                    });
                }
                Write::Delete { key } => {
                    state.docs.remove(&key);
                    changes.push(Change { key, doc: None });
                }
            }
        }
        state.version = version;

        self.router
            .route(version, timestamp, &changes, rules.as_ref());

        debug!(tx = %batch.transaction_id, %version, writes = changes.len(), "batch committed");
        Ok(CommitReceipt {
            transaction_id: batch.transaction_id,
            version,
            timestamp,
            writes_applied: changes.len(),
        })
    }

    async fn watch(&self, principal: &Principal, keys: &[DocKey]) -> StoreResult<Watch> {
        self.ensure_online()?;
        let rules = self.current_rules();
        for key in keys {
            self.authorize(rules.as_ref(), principal, Access::Read(key.clone()))?;
        }
        let keys: BTreeSet<DocKey> = keys.iter().cloned().collect();
        Ok(self.router.subscribe(principal.clone(), keys))
    }

    fn now(&self) -> TemporalAnchor {
        self.clock.now()
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDocumentStore")
            .field("document_count", &self.len())
            .field("version", &self.version())
            .field("online", &self.is_online())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::FnRules;
    use crate::document::Precondition;
    use crate::transaction::Transaction;
    use crate::watch::WatchEvent;
    use serde_json::json;

    fn key(s: &str) -> DocKey {
        DocKey::parse(s).unwrap()
    }

    fn set(k: &str, data: serde_json::Value) -> Write {
        Write::Set { key: key(k), data }
    }

    async fn seed(store: &InMemoryDocumentStore, k: &str, data: serde_json::Value) -> Version {
        let batch = WriteBatch {
            writes: vec![set(k, data)],
            ..WriteBatch::new()
        };
        store.commit(&Principal::Service, batch).await.unwrap().version
    }

    // -----------------------------------------------------------------------
    // Reads and versions
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn commit_assigns_increasing_versions() {
        let store = InMemoryDocumentStore::new();
        assert_eq!(store.version(), Version::ZERO);
        let v1 = seed(&store, "a", json!(1)).await;
        let v2 = seed(&store, "b", json!(2)).await;
        assert_eq!(v1, Version(1));
        assert_eq!(v2, Version(2));

        let a = store.get(&Principal::Service, &key("a")).await.unwrap().unwrap();
        assert_eq!(a.version, v1);
        assert_eq!(a.data, json!(1));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn get_many_is_one_snapshot() {
        let store = InMemoryDocumentStore::new();
        seed(&store, "a", json!(1)).await;
        let snap = store
            .get_many(&Principal::Service, &[key("a"), key("missing")])
            .await
            .unwrap();
        assert_eq!(snap.version, Version(1));
        assert!(snap.get(&key("a")).is_some());
        assert!(snap.get(&key("missing")).is_none());
    }

    #[tokio::test]
    async fn list_returns_direct_children_sorted() {
        let store = InMemoryDocumentStore::new();
        seed(&store, "users/u1/following/b", json!({})).await;
        seed(&store, "users/u1/following/a", json!({})).await;
        seed(&store, "users/u1", json!({})).await;
        seed(&store, "users/u2/following/a", json!({})).await;

        let listed = store
            .list(&Principal::Service, &key("users/u1/following"))
            .await
            .unwrap();
        let leaves: Vec<&str> = listed.iter().map(|(k, _)| k.leaf()).collect();
        assert_eq!(leaves, vec!["a", "b"]);
    }

    // -----------------------------------------------------------------------
    // Atomicity
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn failed_precondition_applies_nothing() {
        let store = InMemoryDocumentStore::new();
        let v = seed(&store, "a", json!(1)).await;

        let batch = WriteBatch {
            preconditions: vec![Precondition {
                key: key("a"),
                expected: Some(Version(v.0 + 10)),
            }],
            writes: vec![set("a", json!(2)), set("b", json!(2))],
            ..WriteBatch::new()
        };
        let err = store.commit(&Principal::Service, batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        assert_eq!(store.version(), v);
        assert!(store.get(&Principal::Service, &key("b")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn absent_precondition_rejects_created_doc() {
        let store = InMemoryDocumentStore::new();
        seed(&store, "a", json!(1)).await;
        let batch = WriteBatch {
            preconditions: vec![Precondition {
                key: key("a"),
                expected: None,
            }],
            writes: vec![set("a", json!(2))],
            ..WriteBatch::new()
        };
        assert!(store.commit(&Principal::Service, batch).await.is_err());
    }

    #[tokio::test]
    async fn denied_write_applies_nothing() {
        let store = InMemoryDocumentStore::new().with_rules(FnRules::new(|_, access| {
            !matches!(access, Access::Write(k) if k.as_str() == "locked")
        }));
        let batch = WriteBatch {
            writes: vec![set("open", json!(1)), set("locked", json!(1))],
            ..WriteBatch::new()
        };
        let err = store.commit(&Principal::Service, batch).await.unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied { .. }));
        assert!(!err.is_retriable());
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_with_retry_are_exact() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for _ in 0..10 {
                    loop {
                        let mut tx = Transaction::begin(store.as_ref(), Principal::Service);
                        let current = tx
                            .get(&key("counter"))
                            .await
                            .unwrap()
                            .and_then(|v| v.as_u64())
                            .unwrap_or(0);
                        tx.set(key("counter"), json!(current + 1));
                        match tx.commit().await {
                            Ok(_) => break,
                            Err(e) if e.is_retriable() => tokio::task::yield_now().await,
                            Err(e) => panic!("unexpected {e}"),
                        }
                    }
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let counter = store.get(&Principal::Service, &key("counter")).await.unwrap().unwrap();
        assert_eq!(counter.data, json!(80));
    }

    // -----------------------------------------------------------------------
    // Availability and access
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn offline_store_is_unavailable() {
        let store = InMemoryDocumentStore::new();
        store.set_online(false);
        let err = store.get(&Principal::Service, &key("a")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(err.is_retriable());

        store.set_online(true);
        assert!(store.get(&Principal::Service, &key("a")).await.is_ok());
    }

    #[tokio::test]
    async fn denied_read() {
        let store = InMemoryDocumentStore::new().with_rules(FnRules::new(|p, _| {
            matches!(p, Principal::Service)
        }));
        let alice = Principal::User(sel_types::UserId::new("alice").unwrap());
        assert!(matches!(
            store.get(&alice, &key("a")).await,
            Err(StoreError::PermissionDenied { .. })
        ));
        assert!(store.get(&Principal::Service, &key("a")).await.is_ok());
    }

    // -----------------------------------------------------------------------
    // Watches
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn watch_receives_whole_commit() {
        let store = InMemoryDocumentStore::new();
        let mut watch = store
            .watch(&Principal::Service, &[key("a"), key("b")])
            .await
            .unwrap();

        let batch = WriteBatch {
            writes: vec![set("a", json!(1)), set("b", json!(1)), set("c", json!(1))],
            ..WriteBatch::new()
        };
        store.commit(&Principal::Service, batch).await.unwrap();

        match watch.recv().await.unwrap() {
            WatchEvent::Changed(set) => {
                assert_eq!(set.version, Version(1));
                let keys: Vec<&str> = set.changes.iter().map(|c| c.key.as_str()).collect();
                assert_eq!(keys, vec!["a", "b"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_is_delivered_as_none() {
        let store = InMemoryDocumentStore::new();
        seed(&store, "a", json!(1)).await;
        let mut watch = store.watch(&Principal::Service, &[key("a")]).await.unwrap();
        let batch = WriteBatch {
            writes: vec![Write::Delete { key: key("a") }],
            ..WriteBatch::new()
        };
        store.commit(&Principal::Service, batch).await.unwrap();
        match watch.recv().await.unwrap() {
            WatchEvent::Changed(set) => assert!(set.changes[0].doc.is_none()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn going_offline_fails_watches() {
        let store = InMemoryDocumentStore::new();
        let mut watch = store.watch(&Principal::Service, &[key("a")]).await.unwrap();
        store.set_online(false);
        assert!(matches!(
            watch.recv().await.unwrap(),
            WatchEvent::Failed(StoreError::Unavailable(_))
        ));
        assert!(watch.recv().await.is_err());
        assert!(store.watch(&Principal::Service, &[key("a")]).await.is_err());
    }

    #[tokio::test]
    async fn commit_in_flight_when_store_goes_offline_applies_nothing() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let weak = Arc::downgrade(&store);
        store.set_rules(FnRules::new(move |_, access| {
            if let (Access::Write(_), Some(store)) = (access, weak.upgrade()) {
                store.set_online(false);
            }
            true
        }));

        let mut batch = WriteBatch::new();
        batch.writes.push(Write::Set {
            key: key("a"),
            data: json!({ "n": 1 }),
        });
        let err = store.commit(&Principal::Service, batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.version(), Version::ZERO);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn replacing_rules_revokes_watches() {
        let store = InMemoryDocumentStore::new();
        let mut watch = store.watch(&Principal::Service, &[key("a")]).await.unwrap();
        assert_eq!(store.watch_count(), 1);
        store.set_rules(FnRules::new(|_, _| false));
        assert!(matches!(
            watch.recv().await.unwrap(),
            WatchEvent::Failed(StoreError::PermissionDenied { .. })
        ));
        assert_eq!(store.watch_count(), 0);
    }

    #[tokio::test]
    async fn read_only_commit_does_not_notify() {
        let store = InMemoryDocumentStore::new();
        let mut watch = store.watch(&Principal::Service, &[key("a")]).await.unwrap();
        let receipt = store
            .commit(&Principal::Service, WriteBatch::new())
            .await
            .unwrap();
        assert_eq!(receipt.writes_applied, 0);
        assert_eq!(receipt.version, Version::ZERO);
        assert!(watch.try_recv().unwrap().is_none());
    }

    #[test]
    fn debug_format() {
        let store = InMemoryDocumentStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryDocumentStore"));
        assert!(debug.contains("document_count"));
    }
}

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use sel_client::ClientReconciler;
use sel_ledger::{AuditReport, CounterMaintainer, InvariantAuditor};
use sel_live::{FollowProjection, LikeProjection, LiveView, LiveViewError, Projection, Subscription};
use sel_store::{DocumentStore, InMemoryDocumentStore, Principal};
use sel_toggle::{Caller, ToggleService};
use sel_types::{ContentId, ContentRecord, FollowState, LikeState, UserId, UserRecord};

use crate::config::LedgerConfig;
use crate::error::SdkResult;

/// High-level social ledger API.
///
/// Toggles run as the calling user. Registration, reads, and audits run as
/// the service principal.
pub struct SocialLedger<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    ledger: CounterMaintainer<S>,
    toggles: ToggleService<S>,
    live: LiveView<S>,
}

impl SocialLedger<InMemoryDocumentStore> {
    /// A ledger backed by a fresh in-memory store.
    pub fn in_memory(config: &LedgerConfig) -> Self {
        let store = Arc::new(InMemoryDocumentStore::with_config(config.store.clone()));
        Self::new(store, config)
    }
}

impl<S: DocumentStore + ?Sized> SocialLedger<S> {
    pub fn new(store: Arc<S>, config: &LedgerConfig) -> Self {
        let ledger = CounterMaintainer::with_retry(Arc::clone(&store), config.retry.clone());
        let toggles = ToggleService::new(ledger.clone());
        let live = LiveView::with_config(Arc::clone(&store), config.live.clone());
        info!(max_attempts = config.retry.max_attempts, "social ledger ready");
        Self {
            store,
            ledger,
            toggles,
            live,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn maintainer(&self) -> &CounterMaintainer<S> {
        &self.ledger
    }

    pub fn toggles(&self) -> &ToggleService<S> {
        &self.toggles
    }

    // ---- Registration ----

    pub async fn register_user(&self, user: &UserId) -> SdkResult<UserRecord> {
        Ok(self.ledger.register_user(&Principal::Service, user).await?)
    }

    pub async fn publish_content(
        &self,
        author: &UserId,
        content: &ContentId,
    ) -> SdkResult<ContentRecord> {
        Ok(self
            .ledger
            .publish_content(&Principal::Service, author, content)
            .await?)
    }

    // ---- Toggles ----

    pub async fn toggle_follow(&self, caller: &Caller, target: &UserId) -> SdkResult<FollowState> {
        Ok(self.toggles.toggle_follow(caller, target).await?)
    }

    pub async fn toggle_like(&self, caller: &Caller, content: &ContentId) -> SdkResult<LikeState> {
        Ok(self.toggles.toggle_like(caller, content).await?)
    }

    pub async fn follow(&self, caller: &Caller, target: &UserId) -> SdkResult<FollowState> {
        Ok(self.toggles.follow(caller, target).await?)
    }

    pub async fn unfollow(&self, caller: &Caller, target: &UserId) -> SdkResult<FollowState> {
        Ok(self.toggles.unfollow(caller, target).await?)
    }

    pub async fn like(&self, caller: &Caller, content: &ContentId) -> SdkResult<LikeState> {
        Ok(self.toggles.like(caller, content).await?)
    }

    pub async fn unlike(&self, caller: &Caller, content: &ContentId) -> SdkResult<LikeState> {
        Ok(self.toggles.unlike(caller, content).await?)
    }

    // ---- Live views ----

    pub fn subscribe_follow_state(
        &self,
        observer: &UserId,
        target: &UserId,
    ) -> SdkResult<Subscription<S, FollowProjection>> {
        Ok(self.live.subscribe_follow_state(observer, target)?)
    }

    pub fn subscribe_like_state(
        &self,
        observer: &UserId,
        content: &ContentId,
    ) -> SdkResult<Subscription<S, LikeProjection>> {
        Ok(self.live.subscribe_like_state(observer, content)?)
    }

    // ---- Reads ----

    pub async fn user(&self, user: &UserId) -> SdkResult<UserRecord> {
        Ok(self.ledger.user(&Principal::Service, user).await?)
    }

    pub async fn content(&self, content: &ContentId) -> SdkResult<ContentRecord> {
        Ok(self.ledger.content(&Principal::Service, content).await?)
    }

    /// `observer`'s current view of `target`. The edge and the target's
    /// counters come from one snapshot.
    pub async fn follow_state(&self, observer: &UserId, target: &UserId) -> SdkResult<FollowState> {
        let projection = FollowProjection::new(observer, target)?;
        let snapshot = self
            .store
            .get_many(&Principal::Service, projection.keys())
            .await
            .map_err(LiveViewError::from)?;
        Ok(projection.project(&snapshot.docs)?)
    }

    pub async fn like_state(&self, observer: &UserId, content: &ContentId) -> SdkResult<LikeState> {
        let content = self.content(content).await?;
        Ok(LikeState::observe(observer, &content))
    }

    pub async fn followers(&self, user: &UserId) -> SdkResult<BTreeSet<UserId>> {
        Ok(self.ledger.followers(&Principal::Service, user).await?)
    }

    pub async fn following(&self, user: &UserId) -> SdkResult<BTreeSet<UserId>> {
        Ok(self.ledger.following(&Principal::Service, user).await?)
    }

    pub async fn liked_by(&self, content: &ContentId) -> SdkResult<BTreeSet<UserId>> {
        Ok(self.ledger.liked_by(&Principal::Service, content).await?)
    }

    // ---- Client state ----

    /// Reconciler seeded with the current follow state.
    pub async fn follow_reconciler(
        &self,
        observer: &UserId,
        target: &UserId,
    ) -> SdkResult<ClientReconciler<FollowState>> {
        Ok(ClientReconciler::new(self.follow_state(observer, target).await?))
    }

    /// Reconciler seeded with the current like state.
    pub async fn like_reconciler(
        &self,
        observer: &UserId,
        content: &ContentId,
    ) -> SdkResult<ClientReconciler<LikeState>> {
        Ok(ClientReconciler::new(self.like_state(observer, content).await?))
    }

    // ---- Audit ----

    pub async fn audit_user(&self, user: &UserId) -> SdkResult<AuditReport> {
        Ok(InvariantAuditor::audit_user(self.store.as_ref(), &Principal::Service, user).await?)
    }

    pub async fn audit_content(&self, content: &ContentId) -> SdkResult<AuditReport> {
        Ok(InvariantAuditor::audit_content(self.store.as_ref(), &Principal::Service, content).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::SdkError;
    use sel_client::{ReconcileState, UserNotice};
    use sel_live::LiveEvent;
    use sel_store::{CommitReceipt, DocKey, Snapshot, StoreResult, VersionedDoc, Watch, WriteBatch};
    use sel_toggle::ToggleError;
    use sel_types::TemporalAnchor;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    async fn ledger(users: &[&str]) -> SocialLedger<InMemoryDocumentStore> {
        let ledger = SocialLedger::in_memory(&LedgerConfig::default());
        for u in users {
            ledger.register_user(&uid(u)).await.unwrap();
        }
        ledger
    }

    #[tokio::test]
    async fn follow_toggle_end_to_end() {
        let ledger = ledger(&["alice", "bob"]).await;
        let alice = Caller::user(uid("alice"));
        let bob = uid("bob");

        let mut live = ledger.subscribe_follow_state(&uid("alice"), &bob).unwrap();
        assert_eq!(
            live.next().await.and_then(LiveEvent::value),
            Some(FollowState::default())
        );

        let state = ledger.toggle_follow(&alice, &bob).await.unwrap();
        assert!(state.following);
        assert_eq!(live.next().await.and_then(LiveEvent::value), Some(state));

        assert_eq!(ledger.followers(&bob).await.unwrap(), BTreeSet::from([uid("alice")]));
        assert_eq!(ledger.following(&uid("alice")).await.unwrap().len(), 1);
        assert!(ledger.audit_user(&bob).await.unwrap().is_consistent());
        assert!(ledger.audit_user(&uid("alice")).await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn like_toggle_with_reconciler() {
        let ledger = ledger(&["author", "fan"]).await;
        let c = ContentId::new("post").unwrap();
        let fan = Caller::user(uid("fan"));
        ledger.publish_content(&uid("author"), &c).await.unwrap();

        let mut client = ledger.like_reconciler(&uid("fan"), &c).await.unwrap();
        let confirmed = client
            .toggle_with(|| ledger.toggles().toggle_like(&fan, &c))
            .await
            .unwrap();
        assert_eq!(confirmed, LikeState { liked: true, like_count: 1 });
        assert_eq!(
            ledger.liked_by(&c).await.unwrap(),
            BTreeSet::from([uid("fan")])
        );
        assert!(ledger.audit_content(&c).await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn failed_toggle_reverts_client_state() {
        let ledger = ledger(&["author"]).await;
        let c = ContentId::new("post").unwrap();
        ledger.publish_content(&uid("author"), &c).await.unwrap();

        let mut client = ledger.like_reconciler(&uid("fan"), &c).await.unwrap();
        let before = *client.displayed();
        let anonymous = Caller::Anonymous;
        let err = client
            .toggle_with(|| ledger.toggles().toggle_like(&anonymous, &c))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), UserNotice::LoginRequired.message());
        assert_eq!(
            client.state(),
            &ReconcileState::Reverted {
                value: before,
                notice: UserNotice::LoginRequired
            }
        );
        assert_eq!(ledger.content(&c).await.unwrap().like_count, 0);
    }

    #[tokio::test]
    async fn self_follow_surfaces_self_reference() {
        let ledger = ledger(&["alice"]).await;
        let err = ledger
            .toggle_follow(&Caller::user(uid("alice")), &uid("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::Toggle(ToggleError::SelfReference(_))));
        assert!(!err.is_retriable());
    }

    /// Commits `unfollow(alice, bob)` right after the first read it serves.
    struct UnfollowAfterFirstRead {
        inner: Arc<InMemoryDocumentStore>,
        armed: AtomicBool,
    }

    impl UnfollowAfterFirstRead {
        async fn interleave(&self) {
            if self.armed.swap(false, Ordering::SeqCst) {
                CounterMaintainer::new(Arc::clone(&self.inner))
                    .unfollow(&Principal::Service, &uid("alice"), &uid("bob"))
                    .await
                    .unwrap();
            }
        }
    }

    #[async_trait]
    impl DocumentStore for UnfollowAfterFirstRead {
        async fn get(&self, principal: &Principal, key: &DocKey) -> StoreResult<Option<VersionedDoc>> {
            let doc = self.inner.get(principal, key).await?;
            self.interleave().await;
            Ok(doc)
        }

        async fn get_many(&self, principal: &Principal, keys: &[DocKey]) -> StoreResult<Snapshot> {
            let snapshot = self.inner.get_many(principal, keys).await?;
            self.interleave().await;
            Ok(snapshot)
        }

        async fn list(
            &self,
            principal: &Principal,
            collection: &DocKey,
        ) -> StoreResult<Vec<(DocKey, VersionedDoc)>> {
            self.inner.list(principal, collection).await
        }

        async fn commit(&self, principal: &Principal, batch: WriteBatch) -> StoreResult<CommitReceipt> {
            self.inner.commit(principal, batch).await
        }

        async fn watch(&self, principal: &Principal, keys: &[DocKey]) -> StoreResult<Watch> {
            self.inner.watch(principal, keys).await
        }

        fn now(&self) -> TemporalAnchor {
            self.inner.now()
        }
    }

    #[tokio::test]
    async fn follow_state_is_read_from_one_snapshot() {
        let inner = Arc::new(InMemoryDocumentStore::new());
        let setup = CounterMaintainer::new(Arc::clone(&inner));
        for u in ["alice", "bob"] {
            setup.register_user(&Principal::Service, &uid(u)).await.unwrap();
        }
        setup
            .follow(&Principal::Service, &uid("alice"), &uid("bob"))
            .await
            .unwrap();

        let store = Arc::new(UnfollowAfterFirstRead {
            inner: Arc::clone(&inner),
            armed: AtomicBool::new(true),
        });
        let ledger = SocialLedger::new(store, &LedgerConfig::default());
        let state = ledger.follow_state(&uid("alice"), &uid("bob")).await.unwrap();
        assert_eq!(
            state,
            FollowState {
                following: true,
                followers_count: 1,
                following_count: 0
            }
        );

        // The interleaved unfollow landed after the snapshot.
        let state = ledger.follow_state(&uid("alice"), &uid("bob")).await.unwrap();
        assert_eq!(state, FollowState::default());
    }

    #[tokio::test]
    async fn follow_reconciler_seeds_consistent_state() {
        let ledger = ledger(&["alice", "bob"]).await;
        ledger
            .follow(&Caller::user(uid("alice")), &uid("bob"))
            .await
            .unwrap();
        let client = ledger.follow_reconciler(&uid("alice"), &uid("bob")).await.unwrap();
        assert!(client.displayed().following);
        assert_eq!(client.displayed().followers_count, 1);
    }

    #[tokio::test]
    async fn follow_state_for_unknown_target_is_not_found() {
        let ledger = ledger(&["alice"]).await;
        let err = ledger.follow_state(&uid("alice"), &uid("ghost")).await.unwrap_err();
        assert!(matches!(
            err,
            SdkError::Live(LiveViewError::NotFound { kind: "user", .. })
        ));
    }

    #[tokio::test]
    async fn follow_state_while_offline_is_retriable() {
        let ledger = ledger(&["alice", "bob"]).await;
        ledger.store().set_online(false);
        let err = ledger.follow_state(&uid("alice"), &uid("bob")).await.unwrap_err();
        assert!(matches!(err, SdkError::Live(LiveViewError::Unavailable(_))));
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn config_flows_into_store() {
        let config = LedgerConfig::from_toml_str("[store]\nnode_id = 7").unwrap();
        let ledger = SocialLedger::in_memory(&config);
        let user = ledger.register_user(&uid("a")).await.unwrap();
        assert_eq!(user.created_at.node_id, 7);
    }
}

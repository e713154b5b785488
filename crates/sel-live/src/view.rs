use std::sync::Arc;

use sel_store::{DocumentStore, Principal};
use sel_types::{ContentId, UserId};

use crate::config::LiveViewConfig;
use crate::error::LiveViewResult;
use crate::projection::{FollowProjection, LikeProjection};
use crate::subscription::Subscription;

/// Factory for relationship subscriptions. Reads run as the observer.
pub struct LiveView<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    config: LiveViewConfig,
}

impl<S: DocumentStore + ?Sized> Clone for LiveView<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: DocumentStore + ?Sized> LiveView<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, LiveViewConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: LiveViewConfig) -> Self {
        Self { store, config }
    }

    pub fn subscribe_follow_state(
        &self,
        observer: &UserId,
        target: &UserId,
    ) -> LiveViewResult<Subscription<S, FollowProjection>> {
        let projection = FollowProjection::new(observer, target)?;
        Ok(Subscription::new(
            Arc::clone(&self.store),
            Principal::user(observer),
            projection,
            self.config.clone(),
        ))
    }

    pub fn subscribe_like_state(
        &self,
        observer: &UserId,
        content: &ContentId,
    ) -> LiveViewResult<Subscription<S, LikeProjection>> {
        let projection = LikeProjection::new(observer, content)?;
        Ok(Subscription::new(
            Arc::clone(&self.store),
            Principal::user(observer),
            projection,
            self.config.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LiveViewError;
    use crate::subscription::LiveEvent;
    use sel_ledger::CounterMaintainer;
    use sel_store::InMemoryDocumentStore;
    use sel_types::{FollowState, LikeState};

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[tokio::test]
    async fn like_state_follows_commits() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let ledger = CounterMaintainer::new(Arc::clone(&store));
        let p = Principal::Service;
        let c = ContentId::new("post").unwrap();
        ledger.register_user(&p, &uid("author")).await.unwrap();
        ledger.publish_content(&p, &uid("author"), &c).await.unwrap();

        let view = LiveView::new(Arc::clone(&store));
        let mut sub = view.subscribe_like_state(&uid("fan"), &c).unwrap();
        assert_eq!(
            sub.next().await.and_then(LiveEvent::value),
            Some(LikeState::default())
        );

        ledger.like(&p, &uid("other"), &c).await.unwrap();
        assert_eq!(
            sub.next().await.and_then(LiveEvent::value),
            Some(LikeState { liked: false, like_count: 1 })
        );
        ledger.like(&p, &uid("fan"), &c).await.unwrap();
        assert_eq!(
            sub.next().await.and_then(LiveEvent::value),
            Some(LikeState { liked: true, like_count: 2 })
        );
    }

    #[tokio::test]
    async fn subscriptions_are_independent() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let ledger = CounterMaintainer::new(Arc::clone(&store));
        let p = Principal::Service;
        for u in ["a", "b", "c"] {
            ledger.register_user(&p, &uid(u)).await.unwrap();
        }
        let view = LiveView::new(Arc::clone(&store));
        let mut a_view = view.subscribe_follow_state(&uid("a"), &uid("b")).unwrap();
        let mut c_view = view.subscribe_follow_state(&uid("c"), &uid("b")).unwrap();
        a_view.next().await.unwrap();
        c_view.next().await.unwrap();

        a_view.cancel();
        ledger.follow(&p, &uid("c"), &uid("b")).await.unwrap();
        assert!(a_view.next().await.is_none());
        assert_eq!(
            c_view.next().await.and_then(LiveEvent::value),
            Some(FollowState {
                following: true,
                followers_count: 1,
                following_count: 0
            })
        );
    }

    #[tokio::test]
    async fn missing_content_fails_subscription() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let view = LiveView::new(store);
        let mut sub = view
            .subscribe_like_state(&uid("fan"), &ContentId::new("gone").unwrap())
            .unwrap();
        assert!(matches!(
            sub.next().await,
            Some(LiveEvent::Failed(LiveViewError::NotFound { kind: "content", .. }))
        ));
        assert!(sub.next().await.is_none());
    }
}

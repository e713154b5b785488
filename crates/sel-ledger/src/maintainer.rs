use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use sel_store::{DocKey, DocumentStore, Principal, Transaction};
use sel_types::{ContentId, ContentRecord, FollowState, LikeState, UserId, UserRecord};

use crate::edges::{content_key, following_key, user_key, EdgeKind, EdgeStore};
use crate::error::{LedgerError, LedgerResult};
use crate::retry::RetryConfig;

/// Result of a follow or unfollow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FollowOutcome {
    /// `false` when the edge was already in the requested state.
    pub changed: bool,
    /// Edge existence after the operation.
    pub following: bool,
    pub follower: UserRecord,
    pub followee: UserRecord,
}

impl FollowOutcome {
    /// The follower's view of the followee.
    pub fn follow_state(&self) -> FollowState {
        FollowState::observe(self.following, &self.followee)
    }
}

/// Result of a like or unlike.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LikeOutcome {
    pub changed: bool,
    pub liked: bool,
    pub content: ContentRecord,
}

impl LikeOutcome {
    pub fn like_state(&self) -> LikeState {
        LikeState {
            liked: self.liked,
            like_count: self.content.like_count,
        }
    }
}

/// The only writer of aggregate counters.
///
/// Every mutation runs in one optimistic transaction that reads edge
/// existence and both affected records, then writes edge projections and
/// counters together. A concurrent writer touching any of those documents
/// makes the commit fail and the operation is retried from scratch, so
/// counters move exactly once per real edge transition regardless of how
/// many callers race on the same pair.
pub struct CounterMaintainer<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    retry: RetryConfig,
}

impl<S: DocumentStore + ?Sized> Clone for CounterMaintainer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            retry: self.retry.clone(),
        }
    }
}

impl<S: DocumentStore + ?Sized> CounterMaintainer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_retry(store, RetryConfig::default())
    }

    pub fn with_retry(store: Arc<S>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Create the user document with zero counters. An existing user is
    /// returned untouched.
    pub async fn register_user(
        &self,
        principal: &Principal,
        user: &UserId,
    ) -> LedgerResult<UserRecord> {
        self.retry
            .run("register_user", move |attempt| {
                self.register_user_once(principal, user, attempt)
            })
            .await
    }

    async fn register_user_once(
        &self,
        principal: &Principal,
        user: &UserId,
        attempt: u32,
    ) -> LedgerResult<UserRecord> {
        let key = user_key(user.as_str())?;
        let mut tx = Transaction::begin(self.store.as_ref(), principal.clone());
        if let Some(doc) = tx.get(&key).await? {
            return Ok(UserRecord::from_document(&doc)?);
        }
        let record = UserRecord::new(user.clone(), tx.now());
        tx.set(key, record.to_document()?);
        let receipt = tx.commit().await?;
        debug!(tx = %receipt.transaction_id, attempt, %user, "user registered");
        Ok(record)
    }

    /// Create a content item authored by a registered user. An existing item
    /// is returned untouched.
    pub async fn publish_content(
        &self,
        principal: &Principal,
        author: &UserId,
        content: &ContentId,
    ) -> LedgerResult<ContentRecord> {
        self.retry
            .run("publish_content", move |attempt| {
                self.publish_content_once(principal, author, content, attempt)
            })
            .await
    }

    async fn publish_content_once(
        &self,
        principal: &Principal,
        author: &UserId,
        content: &ContentId,
        attempt: u32,
    ) -> LedgerResult<ContentRecord> {
        let key = content_key(content.as_str())?;
        let mut tx = Transaction::begin(self.store.as_ref(), principal.clone());
        if let Some(doc) = tx.get(&key).await? {
            return Ok(ContentRecord::from_document(&doc)?);
        }
        load_user(&mut tx, author).await?;
        let record = ContentRecord::new(content.clone(), author.clone(), tx.now());
        tx.set(key, record.to_document()?);
        let receipt = tx.commit().await?;
        debug!(tx = %receipt.transaction_id, attempt, %content, %author, "content published");
        Ok(record)
    }

    // -----------------------------------------------------------------------
    // Follow edges
    // -----------------------------------------------------------------------

    /// Make `follower` follow `followee`. Following twice is a no-op.
    pub async fn follow(
        &self,
        principal: &Principal,
        follower: &UserId,
        followee: &UserId,
    ) -> LedgerResult<FollowOutcome> {
        reject_self_follow(follower, followee)?;
        self.retry
            .run("follow", move |attempt| {
                self.set_follow_once(principal, follower, followee, true, attempt)
            })
            .await
    }

    /// Remove the follow edge. Unfollowing a non-followed user is a no-op.
    pub async fn unfollow(
        &self,
        principal: &Principal,
        follower: &UserId,
        followee: &UserId,
    ) -> LedgerResult<FollowOutcome> {
        reject_self_follow(follower, followee)?;
        self.retry
            .run("unfollow", move |attempt| {
                self.set_follow_once(principal, follower, followee, false, attempt)
            })
            .await
    }

    async fn set_follow_once(
        &self,
        principal: &Principal,
        follower: &UserId,
        followee: &UserId,
        follow: bool,
        attempt: u32,
    ) -> LedgerResult<FollowOutcome> {
        let (a, b) = (follower.as_str(), followee.as_str());
        let mut tx = Transaction::begin(self.store.as_ref(), principal.clone());
        let tx_id = tx.id();

        let mut follower_rec = load_user(&mut tx, follower).await?;
        let mut followee_rec = load_user(&mut tx, followee).await?;

        let forward = EdgeStore::exists(&mut tx, EdgeKind::Following, a, b).await?;
        let backward = EdgeStore::exists(&mut tx, EdgeKind::Followers, b, a).await?;
        if forward != backward {
            return Err(LedgerError::IntegrityViolation {
                key: following_key(a, b)?.to_string(),
                reason: format!(
                    "follow projections disagree (following: {forward}, followers: {backward})"
                ),
            });
        }

        if forward == follow {
            tx.commit().await?;
            debug!(tx = %tx_id, attempt, follower = a, followee = b, follow, "follow state unchanged");
            return Ok(FollowOutcome {
                changed: false,
                following: forward,
                follower: follower_rec,
                followee: followee_rec,
            });
        }

        let follower_key = user_key(a)?;
        let followee_key = user_key(b)?;
        if follow {
            let now = tx.now();
            EdgeStore::put(&mut tx, EdgeKind::Following, a, b, now).await?;
            EdgeStore::put(&mut tx, EdgeKind::Followers, b, a, now).await?;
            follower_rec.following_count =
                increment(follower_rec.following_count, &follower_key, "followingCount")?;
            followee_rec.followers_count =
                increment(followee_rec.followers_count, &followee_key, "followersCount")?;
        } else {
            EdgeStore::delete(&mut tx, EdgeKind::Following, a, b).await?;
            EdgeStore::delete(&mut tx, EdgeKind::Followers, b, a).await?;
            follower_rec.following_count =
                decrement(follower_rec.following_count, &follower_key, "followingCount")?;
            followee_rec.followers_count =
                decrement(followee_rec.followers_count, &followee_key, "followersCount")?;
        }
        tx.set(follower_key, follower_rec.to_document()?);
        tx.set(followee_key, followee_rec.to_document()?);

        let receipt = tx.commit().await?;
        debug!(
            tx = %receipt.transaction_id,
            attempt,
            version = %receipt.version,
            follower = a,
            followee = b,
            follow,
            "follow state changed"
        );
        Ok(FollowOutcome {
            changed: true,
            following: follow,
            follower: follower_rec,
            followee: followee_rec,
        })
    }

    // -----------------------------------------------------------------------
    // Likes
    // -----------------------------------------------------------------------

    /// Add `user` to the content's likers. Liking twice is a no-op.
    pub async fn like(
        &self,
        principal: &Principal,
        user: &UserId,
        content: &ContentId,
    ) -> LedgerResult<LikeOutcome> {
        self.retry
            .run("like", move |attempt| {
                self.set_like_once(principal, user, content, true, attempt)
            })
            .await
    }

    /// Remove `user` from the content's likers. Unliking twice is a no-op.
    pub async fn unlike(
        &self,
        principal: &Principal,
        user: &UserId,
        content: &ContentId,
    ) -> LedgerResult<LikeOutcome> {
        self.retry
            .run("unlike", move |attempt| {
                self.set_like_once(principal, user, content, false, attempt)
            })
            .await
    }

    async fn set_like_once(
        &self,
        principal: &Principal,
        user: &UserId,
        content: &ContentId,
        like: bool,
        attempt: u32,
    ) -> LedgerResult<LikeOutcome> {
        let (c, u) = (content.as_str(), user.as_str());
        let key = content_key(c)?;
        let mut tx = Transaction::begin(self.store.as_ref(), principal.clone());
        let tx_id = tx.id();

        let record = load_content(&mut tx, &key, content).await?;
        if record.is_liked_by(user) == like {
            tx.commit().await?;
            debug!(tx = %tx_id, attempt, user = u, content = c, like, "like state unchanged");
            return Ok(LikeOutcome {
                changed: false,
                liked: like,
                content: record,
            });
        }

        if like {
            let now = tx.now();
            EdgeStore::put(&mut tx, EdgeKind::LikedBy, c, u, now).await?;
        } else {
            EdgeStore::delete(&mut tx, EdgeKind::LikedBy, c, u).await?;
        }
        let mut record = load_content(&mut tx, &key, content).await?;
        record.like_count = if like {
            increment(record.like_count, &key, "likeCount")?
        } else {
            decrement(record.like_count, &key, "likeCount")?
        };
        tx.set(key, record.to_document()?);

        let receipt = tx.commit().await?;
        debug!(
            tx = %receipt.transaction_id,
            attempt,
            version = %receipt.version,
            user = u,
            content = c,
            like,
            "like state changed"
        );
        Ok(LikeOutcome {
            changed: true,
            liked: like,
            content: record,
        })
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn user(&self, principal: &Principal, user: &UserId) -> LedgerResult<UserRecord> {
        let key = user_key(user.as_str())?;
        match self.store.get(principal, &key).await? {
            Some(doc) => Ok(UserRecord::from_document(&doc.data)?),
            None => Err(not_found("user", user.as_str())),
        }
    }

    pub async fn content(
        &self,
        principal: &Principal,
        content: &ContentId,
    ) -> LedgerResult<ContentRecord> {
        let key = content_key(content.as_str())?;
        match self.store.get(principal, &key).await? {
            Some(doc) => Ok(ContentRecord::from_document(&doc.data)?),
            None => Err(not_found("content", content.as_str())),
        }
    }

    /// Point lookup of the follower-side projection.
    pub async fn is_following(
        &self,
        principal: &Principal,
        follower: &UserId,
        followee: &UserId,
    ) -> LedgerResult<bool> {
        let key = following_key(follower.as_str(), followee.as_str())?;
        Ok(self.store.get(principal, &key).await?.is_some())
    }

    pub async fn has_liked(
        &self,
        principal: &Principal,
        user: &UserId,
        content: &ContentId,
    ) -> LedgerResult<bool> {
        Ok(self.content(principal, content).await?.is_liked_by(user))
    }

    /// Users following `user`.
    pub async fn followers(
        &self,
        principal: &Principal,
        user: &UserId,
    ) -> LedgerResult<BTreeSet<UserId>> {
        self.list_users(principal, EdgeKind::Followers, user.as_str()).await
    }

    /// Users `user` follows.
    pub async fn following(
        &self,
        principal: &Principal,
        user: &UserId,
    ) -> LedgerResult<BTreeSet<UserId>> {
        self.list_users(principal, EdgeKind::Following, user.as_str()).await
    }

    pub async fn liked_by(
        &self,
        principal: &Principal,
        content: &ContentId,
    ) -> LedgerResult<BTreeSet<UserId>> {
        Ok(self.content(principal, content).await?.liked_by)
    }

    async fn list_users(
        &self,
        principal: &Principal,
        kind: EdgeKind,
        a: &str,
    ) -> LedgerResult<BTreeSet<UserId>> {
        EdgeStore::list(self.store.as_ref(), principal, kind, a)
            .await?
            .into_iter()
            .map(|id| UserId::new(id).map_err(LedgerError::from))
            .collect()
    }
}

impl<S: DocumentStore + ?Sized> std::fmt::Debug for CounterMaintainer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterMaintainer")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn reject_self_follow(follower: &UserId, followee: &UserId) -> LedgerResult<()> {
    if follower == followee {
        return Err(LedgerError::InvalidOperation(format!(
            "user {follower} cannot follow themselves"
        )));
    }
    Ok(())
}

fn not_found(kind: &'static str, id: &str) -> LedgerError {
    LedgerError::NotFound {
        kind,
        id: id.to_string(),
    }
}

async fn load_user<S>(tx: &mut Transaction<'_, S>, user: &UserId) -> LedgerResult<UserRecord>
where
    S: DocumentStore + ?Sized,
{
    let key = user_key(user.as_str())?;
    let doc = tx
        .get(&key)
        .await?
        .ok_or_else(|| not_found("user", user.as_str()))?;
    Ok(UserRecord::from_document(&doc)?)
}

async fn load_content<S>(
    tx: &mut Transaction<'_, S>,
    key: &DocKey,
    content: &ContentId,
) -> LedgerResult<ContentRecord>
where
    S: DocumentStore + ?Sized,
{
    let doc = tx
        .get(key)
        .await?
        .ok_or_else(|| not_found("content", content.as_str()))?;
    Ok(ContentRecord::from_document(&doc)?)
}

fn increment(value: u64, key: &DocKey, field: &str) -> LedgerResult<u64> {
    value
        .checked_add(1)
        .ok_or_else(|| LedgerError::IntegrityViolation {
            key: key.to_string(),
            reason: format!("{field} overflow"),
        })
}

fn decrement(value: u64, key: &DocKey, field: &str) -> LedgerResult<u64> {
    value
        .checked_sub(1)
        .ok_or_else(|| LedgerError::IntegrityViolation {
            key: key.to_string(),
            reason: format!("{field} would drop below zero"),
        })
}

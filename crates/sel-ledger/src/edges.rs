//! Edge store: durable point lookup and enumeration of relationship facts.
//!
//! Each follow edge is stored as two independent keyed records, one under
//! the follower (`following`) and one under the followee (`followers`).
//! Likes are members of the content document's `likedBy` set. The edge
//! store reads and writes single projections only; keeping the projections
//! and the counters in agreement is the counter maintainer's job, inside
//! one transaction.

use std::collections::BTreeSet;
use std::fmt;

use sel_store::{DocKey, DocumentStore, Principal, Transaction};
use sel_types::{ContentRecord, FollowEdge, TemporalAnchor, UserId};

use crate::error::{LedgerError, LedgerResult};

pub const USERS: &str = "users";
pub const CONTENT: &str = "content";
pub const FOLLOWING: &str = "following";
pub const FOLLOWERS: &str = "followers";

pub fn user_key(user: &str) -> LedgerResult<DocKey> {
    Ok(DocKey::from_segments([USERS, user])?)
}

pub fn content_key(content: &str) -> LedgerResult<DocKey> {
    Ok(DocKey::from_segments([CONTENT, content])?)
}

/// `users/{follower}/following/{followee}`
pub fn following_key(follower: &str, followee: &str) -> LedgerResult<DocKey> {
    Ok(DocKey::from_segments([USERS, follower, FOLLOWING, followee])?)
}

/// `users/{followee}/followers/{follower}`
pub fn followers_key(followee: &str, follower: &str) -> LedgerResult<DocKey> {
    Ok(DocKey::from_segments([USERS, followee, FOLLOWERS, follower])?)
}

/// Which projection an edge operation addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// `(a, b)`: user `a` follows user `b`, stored under `a`.
    Following,
    /// `(a, b)`: user `b` follows user `a`, stored under `a`.
    Followers,
    /// `(a, b)`: user `b` is in content `a`'s `likedBy` set.
    LikedBy,
}

impl EdgeKind {
    fn projection_key(self, a: &str, b: &str) -> LedgerResult<DocKey> {
        match self {
            Self::Following => following_key(a, b),
            Self::Followers => followers_key(a, b),
            Self::LikedBy => content_key(a),
        }
    }

    fn collection_key(self, a: &str) -> LedgerResult<DocKey> {
        match self {
            Self::Following => Ok(DocKey::from_segments([USERS, a, FOLLOWING])?),
            Self::Followers => Ok(DocKey::from_segments([USERS, a, FOLLOWERS])?),
            Self::LikedBy => content_key(a),
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Following => "following",
            Self::Followers => "followers",
            Self::LikedBy => "likedBy",
        };
        f.write_str(s)
    }
}

/// Stateless accessor over the edge projections.
pub struct EdgeStore;

impl EdgeStore {
    /// Whether edge `(a, b)` of `kind` exists, as seen by `tx`.
    pub async fn exists<S>(
        tx: &mut Transaction<'_, S>,
        kind: EdgeKind,
        a: &str,
        b: &str,
    ) -> LedgerResult<bool>
    where
        S: DocumentStore + ?Sized,
    {
        let key = kind.projection_key(a, b)?;
        let doc = tx.get(&key).await?;
        match kind {
            EdgeKind::Following | EdgeKind::Followers => Ok(doc.is_some()),
            EdgeKind::LikedBy => match doc {
                Some(doc) => {
                    let content = ContentRecord::from_document(&doc)?;
                    Ok(content.liked_by.iter().any(|u| u.as_str() == b))
                }
                None => Ok(false),
            },
        }
    }

    /// Ids on the far side of every `kind` edge from `a`, from committed state.
    pub async fn list<S>(
        store: &S,
        principal: &Principal,
        kind: EdgeKind,
        a: &str,
    ) -> LedgerResult<BTreeSet<String>>
    where
        S: DocumentStore + ?Sized,
    {
        let key = kind.collection_key(a)?;
        match kind {
            EdgeKind::Following | EdgeKind::Followers => Ok(store
                .list(principal, &key)
                .await?
                .into_iter()
                .map(|(key, _)| key.leaf().to_string())
                .collect()),
            EdgeKind::LikedBy => match store.get(principal, &key).await? {
                Some(doc) => Ok(ContentRecord::from_document(&doc.data)?
                    .liked_by
                    .into_iter()
                    .map(String::from)
                    .collect()),
                None => Ok(BTreeSet::new()),
            },
        }
    }

    /// Buffer creation of edge `(a, b)` in `tx`.
    pub async fn put<S>(
        tx: &mut Transaction<'_, S>,
        kind: EdgeKind,
        a: &str,
        b: &str,
        created_at: TemporalAnchor,
    ) -> LedgerResult<()>
    where
        S: DocumentStore + ?Sized,
    {
        let key = kind.projection_key(a, b)?;
        match kind {
            EdgeKind::Following => {
                let edge = FollowEdge::new(UserId::new(a)?, UserId::new(b)?, created_at);
                tx.set(key, edge.to_document()?);
            }
            EdgeKind::Followers => {
                let edge = FollowEdge::new(UserId::new(b)?, UserId::new(a)?, created_at);
                tx.set(key, edge.to_document()?);
            }
            EdgeKind::LikedBy => {
                let mut content = Self::content_for_update(tx, &key, a).await?;
                content.liked_by.insert(UserId::new(b)?);
                tx.set(key, content.to_document()?);
            }
        }
        Ok(())
    }

    /// Buffer removal of edge `(a, b)` in `tx`.
    pub async fn delete<S>(
        tx: &mut Transaction<'_, S>,
        kind: EdgeKind,
        a: &str,
        b: &str,
    ) -> LedgerResult<()>
    where
        S: DocumentStore + ?Sized,
    {
        let key = kind.projection_key(a, b)?;
        match kind {
            EdgeKind::Following | EdgeKind::Followers => tx.delete(key),
            EdgeKind::LikedBy => {
                let mut content = Self::content_for_update(tx, &key, a).await?;
                content.liked_by.retain(|u| u.as_str() != b);
                tx.set(key, content.to_document()?);
            }
        }
        Ok(())
    }

    async fn content_for_update<S>(
        tx: &mut Transaction<'_, S>,
        key: &DocKey,
        id: &str,
    ) -> LedgerResult<ContentRecord>
    where
        S: DocumentStore + ?Sized,
    {
        let doc = tx.get(key).await?.ok_or_else(|| LedgerError::NotFound {
            kind: "content",
            id: id.to_string(),
        })?;
        Ok(ContentRecord::from_document(&doc)?)
    }
}

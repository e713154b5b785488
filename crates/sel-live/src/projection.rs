use std::collections::BTreeMap;

use sel_ledger::edges::{content_key, following_key, user_key};
use sel_ledger::LedgerResult;
use sel_store::{DocKey, VersionedDoc};
use sel_types::{ContentId, ContentRecord, FollowState, LikeState, UserId, UserRecord};

use crate::error::{LiveViewError, LiveViewResult};

/// Derives a value from a fixed set of watched documents.
pub trait Projection: Send + Sync {
    type Value: Clone + Send;

    /// Documents whose changes affect the value.
    fn keys(&self) -> &[DocKey];

    /// Compute the value from the documents currently present.
    fn project(&self, docs: &BTreeMap<DocKey, VersionedDoc>) -> LiveViewResult<Self::Value>;
}

fn key(result: LedgerResult<DocKey>) -> LiveViewResult<DocKey> {
    result.map_err(|e| LiveViewError::InvalidKey(e.to_string()))
}

/// Whether `observer` follows `target`, with the target's counters.
#[derive(Clone, Debug)]
pub struct FollowProjection {
    target: UserId,
    keys: [DocKey; 2],
}

impl FollowProjection {
    pub fn new(observer: &UserId, target: &UserId) -> LiveViewResult<Self> {
        let edge = key(following_key(observer.as_str(), target.as_str()))?;
        let target_key = key(user_key(target.as_str()))?;
        Ok(Self {
            target: target.clone(),
            keys: [edge, target_key],
        })
    }
}

impl Projection for FollowProjection {
    type Value = FollowState;

    fn keys(&self) -> &[DocKey] {
        &self.keys
    }

    fn project(&self, docs: &BTreeMap<DocKey, VersionedDoc>) -> LiveViewResult<FollowState> {
        let [edge, target_key] = &self.keys;
        let target = docs.get(target_key).ok_or_else(|| LiveViewError::NotFound {
            kind: "user",
            id: self.target.to_string(),
        })?;
        let target = UserRecord::from_document(&target.data)?;
        Ok(FollowState::observe(docs.contains_key(edge), &target))
    }
}

/// Whether `observer` likes `content`, with its like counter.
#[derive(Clone, Debug)]
pub struct LikeProjection {
    observer: UserId,
    content: ContentId,
    keys: [DocKey; 1],
}

impl LikeProjection {
    pub fn new(observer: &UserId, content: &ContentId) -> LiveViewResult<Self> {
        Ok(Self {
            observer: observer.clone(),
            content: content.clone(),
            keys: [key(content_key(content.as_str()))?],
        })
    }
}

impl Projection for LikeProjection {
    type Value = LikeState;

    fn keys(&self) -> &[DocKey] {
        &self.keys
    }

    fn project(&self, docs: &BTreeMap<DocKey, VersionedDoc>) -> LiveViewResult<LikeState> {
        let doc = docs.get(&self.keys[0]).ok_or_else(|| LiveViewError::NotFound {
            kind: "content",
            id: self.content.to_string(),
        })?;
        let content = ContentRecord::from_document(&doc.data)?;
        Ok(LikeState::observe(&self.observer, &content))
    }
}

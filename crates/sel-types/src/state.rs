//! Relationship states observed by callers and subscribers.

use serde::{Deserialize, Serialize};

use crate::records::{ContentRecord, UserRecord};
use crate::ids::UserId;

/// Whether an observer follows a target, plus the target's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowState {
    pub following: bool,
    pub followers_count: u64,
    pub following_count: u64,
}

impl FollowState {
    /// Build the state from edge existence and the target's record.
    pub fn observe(following: bool, target: &UserRecord) -> Self {
        Self {
            following,
            followers_count: target.followers_count,
            following_count: target.following_count,
        }
    }
}

/// Whether an observer likes a content item, plus its like counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub liked: bool,
    pub like_count: u64,
}

impl LikeState {
    pub fn observe(observer: &UserId, content: &ContentRecord) -> Self {
        Self {
            liked: content.is_liked_by(observer),
            like_count: content.like_count,
        }
    }
}

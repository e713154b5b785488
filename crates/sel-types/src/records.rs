//! Stored record shapes.
//!
//! Records are persisted as JSON objects with camelCase field names. The
//! store never interprets them; only the ledger encodes and decodes them.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::ids::{ContentId, UserId};
use crate::temporal::TemporalAnchor;

fn encode<T: Serialize>(record: &T) -> Result<Value, TypeError> {
    serde_json::to_value(record).map_err(|e| TypeError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(doc: &Value) -> Result<T, TypeError> {
    T::deserialize(doc).map_err(|e| TypeError::Serialization(e.to_string()))
}

/// A user together with its cached follow aggregates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub followers_count: u64,
    pub following_count: u64,
    pub created_at: TemporalAnchor,
}

impl UserRecord {
    /// A freshly registered user: both counters start at zero.
    pub fn new(id: UserId, created_at: TemporalAnchor) -> Self {
        Self {
            id,
            followers_count: 0,
            following_count: 0,
            created_at,
        }
    }

    pub fn to_document(&self) -> Result<Value, TypeError> {
        encode(self)
    }

    pub fn from_document(doc: &Value) -> Result<Self, TypeError> {
        decode(doc)
    }
}

/// One projection of a directed follow relationship.
///
/// The same edge is stored twice, once under the follower and once under the
/// followee. Both copies carry identical contents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEdge {
    pub follower_id: UserId,
    pub followee_id: UserId,
    pub created_at: TemporalAnchor,
}

impl FollowEdge {
    pub fn new(follower_id: UserId, followee_id: UserId, created_at: TemporalAnchor) -> Self {
        Self {
            follower_id,
            followee_id,
            created_at,
        }
    }

    pub fn to_document(&self) -> Result<Value, TypeError> {
        encode(self)
    }

    pub fn from_document(doc: &Value) -> Result<Self, TypeError> {
        decode(doc)
    }
}

/// A content item with its cached like aggregate and the set of likers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub id: ContentId,
    pub author_id: UserId,
    pub like_count: u64,
    #[serde(default)]
    pub liked_by: BTreeSet<UserId>,
    pub created_at: TemporalAnchor,
}

impl ContentRecord {
    pub fn new(id: ContentId, author_id: UserId, created_at: TemporalAnchor) -> Self {
        Self {
            id,
            author_id,
            like_count: 0,
            liked_by: BTreeSet::new(),
            created_at,
        }
    }

    pub fn is_liked_by(&self, user: &UserId) -> bool {
        self.liked_by.contains(user)
    }

    pub fn to_document(&self) -> Result<Value, TypeError> {
        encode(self)
    }

    pub fn from_document(doc: &Value) -> Result<Self, TypeError> {
        decode(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[test]
    fn user_document_uses_camel_case() {
        let user = UserRecord::new(uid("u1"), TemporalAnchor::new(5, 0, 0));
        let doc = user.to_document().unwrap();
        assert_eq!(doc["followersCount"], 0);
        assert_eq!(doc["followingCount"], 0);
        assert_eq!(doc["id"], "u1");
        assert_eq!(UserRecord::from_document(&doc).unwrap(), user);
    }

    #[test]
    fn negative_counter_is_rejected() {
        let doc = serde_json::json!({
            "id": "u1",
            "followersCount": -1,
            "followingCount": 0,
            "createdAt": {"physical_ms": 0, "logical": 0, "node_id": 0},
        });
        assert!(matches!(
            UserRecord::from_document(&doc),
            Err(TypeError::Serialization(_))
        ));
    }

    #[test]
    fn content_liked_by_defaults_to_empty() {
        let doc = serde_json::json!({
            "id": "c1",
            "authorId": "u1",
            "likeCount": 0,
            "createdAt": {"physical_ms": 0, "logical": 0, "node_id": 0},
        });
        let content = ContentRecord::from_document(&doc).unwrap();
        assert!(content.liked_by.is_empty());
        assert!(!content.is_liked_by(&uid("u1")));
    }

    #[test]
    fn malformed_id_in_document_is_rejected() {
        let doc = serde_json::json!({
            "followerId": "a/b",
            "followeeId": "c",
            "createdAt": {"physical_ms": 0, "logical": 0, "node_id": 0},
        });
        assert!(FollowEdge::from_document(&doc).is_err());
    }
}

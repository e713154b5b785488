//! Document keys.
//!
//! A key is a slash-separated path of non-empty segments, for example
//! `users/u1` or `users/u1/following/u2`. Collections are addressed by the
//! same type (`users/u1/following`); [`DocKey::is_child_of`] relates the two.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Validated slash-separated document path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocKey(String);

impl DocKey {
    /// Parse and validate a key.
    pub fn parse(path: impl Into<String>) -> StoreResult<Self> {
        let path = path.into();
        if path.is_empty() {
            return Err(StoreError::InvalidKey {
                key: path,
                reason: "key must not be empty".into(),
            });
        }
        if path.split('/').any(str::is_empty) {
            return Err(StoreError::InvalidKey {
                key: path,
                reason: "key segments must not be empty".into(),
            });
        }
        Ok(Self(path))
    }

    /// Build a key from individual segments.
    pub fn from_segments<I, S>(segments: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = String::new();
        for segment in segments {
            let segment = segment.as_ref();
            if segment.contains('/') {
                return Err(StoreError::InvalidKey {
                    key: segment.to_string(),
                    reason: "segment must not contain '/'".into(),
                });
            }
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(segment);
        }
        Self::parse(path)
    }

    /// Append one segment.
    pub fn child(&self, segment: &str) -> StoreResult<Self> {
        if segment.is_empty() || segment.contains('/') {
            return Err(StoreError::InvalidKey {
                key: format!("{}/{segment}", self.0),
                reason: "segment must be non-empty and contain no '/'".into(),
            });
        }
        Ok(Self(format!("{}/{segment}", self.0)))
    }

    /// The key with its last segment removed, or `None` for a single segment.
    pub fn parent(&self) -> Option<Self> {
        self.0.rsplit_once('/').map(|(head, _)| Self(head.to_string()))
    }

    /// The last segment.
    pub fn leaf(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// `true` if `self` sits directly under `collection`.
    pub fn is_child_of(&self, collection: &DocKey) -> bool {
        self.parent().as_ref() == Some(collection)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocKey {
    type Error = StoreError;

    fn try_from(path: String) -> StoreResult<Self> {
        Self::parse(path)
    }
}

impl From<DocKey> for String {
    fn from(key: DocKey) -> Self {
        key.0
    }
}

impl fmt::Debug for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocKey({})", self.0)
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_paths() {
        assert!(DocKey::parse("users").is_ok());
        assert!(DocKey::parse("users/u1/following/u2").is_ok());
    }

    #[test]
    fn parse_rejects_empty_segments() {
        assert!(DocKey::parse("").is_err());
        assert!(DocKey::parse("users//u1").is_err());
        assert!(DocKey::parse("/users").is_err());
        assert!(DocKey::parse("users/").is_err());
    }

    #[test]
    fn from_segments_joins() {
        let key = DocKey::from_segments(["users", "u1", "followers"]).unwrap();
        assert_eq!(key.as_str(), "users/u1/followers");
        assert!(DocKey::from_segments(["users", "a/b"]).is_err());
    }

    #[test]
    fn child_parent_leaf() {
        let coll = DocKey::parse("users/u1/following").unwrap();
        let doc = coll.child("u2").unwrap();
        assert_eq!(doc.as_str(), "users/u1/following/u2");
        assert_eq!(doc.leaf(), "u2");
        assert_eq!(doc.parent(), Some(coll.clone()));
        assert!(doc.is_child_of(&coll));
        assert!(coll.child("x/y").is_err());
        assert!(DocKey::parse("users").unwrap().parent().is_none());
    }

    #[test]
    fn deserialize_validates() {
        let key: DocKey = serde_json::from_str("\"users/u1\"").unwrap();
        assert_eq!(key.as_str(), "users/u1");
        assert!(serde_json::from_str::<DocKey>("\"users//u1\"").is_err());
        assert!(serde_json::from_str::<DocKey>("\"\"").is_err());
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"users/u1\"");
    }

    #[test]
    fn grandchild_is_not_child() {
        let users = DocKey::parse("users").unwrap();
        let nested = DocKey::parse("users/u1/following/u2").unwrap();
        assert!(!nested.is_child_of(&users));
    }
}

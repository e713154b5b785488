use std::collections::BTreeMap;

use sel_store::{DocKey, DocumentStore, Principal, VersionedDoc};
use sel_types::{ContentId, ContentRecord, FollowEdge, UserId, UserRecord};

use crate::edges::{content_key, followers_key, following_key, user_key, FOLLOWERS, FOLLOWING};
use crate::error::{LedgerError, LedgerResult};

/// Result of auditing one user or content item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditReport {
    /// Key of the audited record.
    pub subject: String,
    pub checked_edges: usize,
    pub violations: Vec<Violation>,
}

impl AuditReport {
    /// Returns `true` if all checks passed.
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific inconsistency found by an audit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    FollowersCountMismatch,
    FollowingCountMismatch,
    LikeCountMismatch,
    /// One projection of a follow edge exists without its mirror.
    DanglingProjection,
    SelfEdge,
    /// The edge document does not describe the edge its key names.
    MalformedEdge,
}

/// Read-only invariant checker.
///
/// Audits recompute aggregates from edge records and compare them against
/// the stored counters. They never write. Reads are not taken from a single
/// snapshot, so results are only meaningful once concurrent toggles on the
/// audited records have settled.
pub struct InvariantAuditor;

impl InvariantAuditor {
    /// Check a user's counters and both edge projections it owns.
    pub async fn audit_user<S>(
        store: &S,
        principal: &Principal,
        user: &UserId,
    ) -> LedgerResult<AuditReport>
    where
        S: DocumentStore + ?Sized,
    {
        let u = user.as_str();
        let key = user_key(u)?;
        let record = match store.get(principal, &key).await? {
            Some(doc) => UserRecord::from_document(&doc.data)?,
            None => {
                return Err(LedgerError::NotFound {
                    kind: "user",
                    id: u.to_string(),
                })
            }
        };

        let following = list_edges(store, principal, &key, FOLLOWING).await?;
        let followers = list_edges(store, principal, &key, FOLLOWERS).await?;
        let mut violations = Vec::new();

        if record.following_count != following.len() as u64 {
            violations.push(Violation {
                kind: ViolationKind::FollowingCountMismatch,
                description: format!(
                    "followingCount is {}, found {} following edges",
                    record.following_count,
                    following.len()
                ),
            });
        }
        if record.followers_count != followers.len() as u64 {
            violations.push(Violation {
                kind: ViolationKind::FollowersCountMismatch,
                description: format!(
                    "followersCount is {}, found {} follower edges",
                    record.followers_count,
                    followers.len()
                ),
            });
        }

        for (other, doc) in &following {
            check_edge(&mut violations, doc, u, other);
            let mirror = followers_key(other, u)?;
            check_mirror(store, principal, &mut violations, &mirror).await?;
        }
        for (other, doc) in &followers {
            check_edge(&mut violations, doc, other, u);
            let mirror = following_key(other, u)?;
            check_mirror(store, principal, &mut violations, &mirror).await?;
        }

        Ok(AuditReport {
            subject: key.to_string(),
            checked_edges: following.len() + followers.len(),
            violations,
        })
    }

    /// Check that a content item's like counter matches its likers.
    pub async fn audit_content<S>(
        store: &S,
        principal: &Principal,
        content: &ContentId,
    ) -> LedgerResult<AuditReport>
    where
        S: DocumentStore + ?Sized,
    {
        let key = content_key(content.as_str())?;
        let record = match store.get(principal, &key).await? {
            Some(doc) => ContentRecord::from_document(&doc.data)?,
            None => {
                return Err(LedgerError::NotFound {
                    kind: "content",
                    id: content.to_string(),
                })
            }
        };

        let mut violations = Vec::new();
        let likers = record.liked_by.len();
        if record.like_count != likers as u64 {
            violations.push(Violation {
                kind: ViolationKind::LikeCountMismatch,
                description: format!(
                    "likeCount is {}, found {likers} likers",
                    record.like_count
                ),
            });
        }

        Ok(AuditReport {
            subject: key.to_string(),
            checked_edges: likers,
            violations,
        })
    }
}

async fn list_edges<S>(
    store: &S,
    principal: &Principal,
    owner: &DocKey,
    projection: &str,
) -> LedgerResult<BTreeMap<String, VersionedDoc>>
where
    S: DocumentStore + ?Sized,
{
    let collection = owner.child(projection)?;
    Ok(store
        .list(principal, &collection)
        .await?
        .into_iter()
        .map(|(key, doc)| (key.leaf().to_string(), doc))
        .collect())
}

fn check_edge(violations: &mut Vec<Violation>, doc: &VersionedDoc, follower: &str, followee: &str) {
    if follower == followee {
        violations.push(Violation {
            kind: ViolationKind::SelfEdge,
            description: format!("{follower} follows themselves"),
        });
    }
    match FollowEdge::from_document(&doc.data) {
        Ok(edge) if edge.follower_id.as_str() == follower && edge.followee_id.as_str() == followee => {}
        Ok(edge) => violations.push(Violation {
            kind: ViolationKind::MalformedEdge,
            description: format!(
                "edge {follower} -> {followee} records {} -> {}",
                edge.follower_id, edge.followee_id
            ),
        }),
        Err(err) => violations.push(Violation {
            kind: ViolationKind::MalformedEdge,
            description: format!("edge {follower} -> {followee} unreadable: {err}"),
        }),
    }
}

async fn check_mirror<S>(
    store: &S,
    principal: &Principal,
    violations: &mut Vec<Violation>,
    mirror: &DocKey,
) -> LedgerResult<()>
where
    S: DocumentStore + ?Sized,
{
    if store.get(principal, mirror).await?.is_none() {
        violations.push(Violation {
            kind: ViolationKind::DanglingProjection,
            description: format!("missing mirror projection {mirror}"),
        });
    }
    Ok(())
}

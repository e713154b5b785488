//! Social engagement ledger core.
//!
//! This crate is the heart of the ledger. It provides:
//! - The edge store: keyed projections of follow and like relationships
//! - [`CounterMaintainer`]: the only writer of aggregate counters, keeping
//!   them consistent with edge existence inside one atomic transaction
//! - Retry with jittered backoff for contention and unavailability
//! - [`InvariantAuditor`]: read-only verification of counter/edge agreement
//!
//! # Data layout
//!
//! | Record | Key |
//! |---|---|
//! | user | `users/{user}` |
//! | follow edge, follower side | `users/{follower}/following/{followee}` |
//! | follow edge, followee side | `users/{followee}/followers/{follower}` |
//! | content item (with `likedBy`) | `content/{content}` |

pub mod audit;
pub mod edges;
pub mod error;
pub mod maintainer;
pub mod retry;

pub use audit::{AuditReport, InvariantAuditor, Violation, ViolationKind};
pub use edges::{EdgeKind, EdgeStore};
pub use error::{LedgerError, LedgerResult};
pub use maintainer::{CounterMaintainer, FollowOutcome, LikeOutcome};
pub use retry::RetryConfig;

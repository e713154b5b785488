//! Foundation types for the social engagement ledger.
//!
//! Every other `sel-*` crate depends on this one. It holds no behaviour
//! beyond validation and small value helpers.
//!
//! # Key Types
//!
//! - [`UserId`] / [`ContentId`] -- validated opaque identifiers
//! - [`UserRecord`] -- a user with its denormalized follow counters
//! - [`FollowEdge`] -- one projection of a directed follow relationship
//! - [`ContentRecord`] -- a content item with its like counter and `liked_by` set
//! - [`FollowState`] / [`LikeState`] -- what callers and subscribers observe
//! - [`TemporalAnchor`] -- hybrid logical clock timestamp

pub mod error;
pub mod ids;
pub mod records;
pub mod state;
pub mod temporal;

pub use error::TypeError;
pub use ids::{ContentId, UserId, MAX_ID_LEN};
pub use records::{ContentRecord, FollowEdge, UserRecord};
pub use state::{FollowState, LikeState};
pub use temporal::TemporalAnchor;

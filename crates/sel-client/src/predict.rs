use sel_types::{FollowState, LikeState};

use crate::notice::UserNotice;

/// A relationship value the client can predict the toggle of.
pub trait Predict: Clone + PartialEq {
    /// The value expected once a toggle succeeds.
    fn toggled(&self) -> Self;

    /// Notice shown when a toggle fails for a retriable or unknown reason.
    fn failure_notice() -> UserNotice;
}

fn adjust(count: u64, up: bool) -> u64 {
    if up {
        count.saturating_add(1)
    } else {
        count.saturating_sub(1)
    }
}

impl Predict for FollowState {
    fn toggled(&self) -> Self {
        let following = !self.following;
        Self {
            following,
            followers_count: adjust(self.followers_count, following),
            following_count: self.following_count,
        }
    }

    fn failure_notice() -> UserNotice {
        UserNotice::FollowFailed
    }
}

impl Predict for LikeState {
    fn toggled(&self) -> Self {
        let liked = !self.liked;
        Self {
            liked,
            like_count: adjust(self.like_count, liked),
        }
    }

    fn failure_notice() -> UserNotice {
        UserNotice::LikeFailed
    }
}

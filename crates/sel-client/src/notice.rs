use std::fmt;

use serde::{Deserialize, Serialize};

use sel_toggle::ToggleError;

/// Message shown to the user after a failed toggle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserNotice {
    LoginRequired,
    CannotFollowSelf,
    PermissionDenied,
    FollowFailed,
    LikeFailed,
}

impl UserNotice {
    /// Classify a toggle failure. `fallback` is used for failures the user
    /// can only retry.
    pub fn for_error(err: &ToggleError, fallback: UserNotice) -> Self {
        match err {
            ToggleError::NotAuthenticated => Self::LoginRequired,
            ToggleError::SelfReference(_) => Self::CannotFollowSelf,
            ToggleError::PermissionDenied(_) => Self::PermissionDenied,
            _ => fallback,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::LoginRequired => "Please log in",
            Self::CannotFollowSelf => "Cannot follow yourself",
            Self::PermissionDenied => "You do not have permission to do that.",
            Self::FollowFailed => "Could not update follow status. Please try again.",
            Self::LikeFailed => "Could not update like status. Please try again.",
        }
    }
}

impl fmt::Display for UserNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use sel_store::Principal;
use sel_types::UserId;

use crate::error::{ToggleError, ToggleResult};

/// Identity of whoever is invoking a toggle.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Caller {
    Authenticated(UserId),
    Anonymous,
}

impl Caller {
    pub fn user(id: UserId) -> Self {
        Self::Authenticated(id)
    }

    pub fn anonymous() -> Self {
        Self::Anonymous
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Authenticated(id) => Some(id),
            Self::Anonymous => None,
        }
    }

    /// The authenticated user, or `NotAuthenticated`.
    pub fn require(&self) -> ToggleResult<&UserId> {
        self.user_id().ok_or(ToggleError::NotAuthenticated)
    }

    /// Store principal the caller's transactions run as.
    pub fn principal(&self) -> ToggleResult<Principal> {
        self.require().map(Principal::user)
    }
}

impl From<UserId> for Caller {
    fn from(id: UserId) -> Self {
        Self::Authenticated(id)
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated(id) => write!(f, "{id}"),
            Self::Anonymous => f.write_str("anonymous"),
        }
    }
}

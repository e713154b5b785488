//! Store-level authorization.
//!
//! The store evaluates its rules against the [`Principal`] a request runs as.
//! The ledger performs no authentication itself: a principal is built from
//! the verified caller id supplied by the authentication subsystem.

use std::fmt;
use std::sync::Arc;

use sel_types::UserId;

use crate::key::DocKey;

/// Identity a store request runs as.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Principal {
    /// An end user, as verified by the authentication subsystem.
    User(UserId),
    /// A trusted backend component (registration, audits).
    Service,
}

impl Principal {
    pub fn user(id: &UserId) -> Self {
        Self::User(id.clone())
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::User(id) => Some(id),
            Self::Service => None,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Service => f.write_str("service"),
        }
    }
}

/// A single access the store is about to perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Read(DocKey),
    Write(DocKey),
}

impl Access {
    pub fn key(&self) -> &DocKey {
        match self {
            Self::Read(key) | Self::Write(key) => key,
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(key) => write!(f, "read:{key}"),
            Self::Write(key) => write!(f, "write:{key}"),
        }
    }
}

/// Authorization rules evaluated on every read and write.
pub trait AccessRules: Send + Sync {
    fn allows(&self, principal: &Principal, access: &Access) -> bool;
}

/// Rules that permit everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl AccessRules for AllowAll {
    fn allows(&self, _principal: &Principal, _access: &Access) -> bool {
        true
    }
}

/// Rules backed by a closure.
pub struct FnRules {
    check: Arc<dyn Fn(&Principal, &Access) -> bool + Send + Sync>,
}

impl FnRules {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&Principal, &Access) -> bool + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(check),
        }
    }
}

impl AccessRules for FnRules {
    fn allows(&self, principal: &Principal, access: &Access) -> bool {
        (self.check)(principal, access)
    }
}

impl fmt::Debug for FnRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRules").finish_non_exhaustive()
    }
}

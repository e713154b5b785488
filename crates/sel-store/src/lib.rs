//! Backing document store boundary for the social engagement ledger.
//!
//! The ledger does not own persistence. It runs on top of a multi-document
//! store that offers atomic transactions and per-key change notifications.
//! This crate defines that boundary and ships an in-memory implementation
//! honouring the same contract.
//!
//! # Contract
//!
//! 1. Documents are opaque JSON values addressed by a slash-separated [`DocKey`].
//! 2. Every commit is assigned a new, strictly increasing [`Version`]; each
//!    document remembers the version of the commit that last wrote it.
//! 3. A [`WriteBatch`] applies entirely or not at all. Preconditions on
//!    observed versions give optimistic isolation: a stale read aborts the
//!    whole batch with [`StoreError::Conflict`].
//! 4. [`AccessRules`] are consulted on every read and every write.
//! 5. A [`Watch`] receives one [`ChangeSet`] per commit touching its keys,
//!    never a partial commit. Failures are terminal for the watch.
//!
//! # Backends
//!
//! - [`InMemoryDocumentStore`] -- `BTreeMap`-based store for tests and embedding

pub mod access;
pub mod config;
pub mod document;
pub mod error;
pub mod hlc;
pub mod key;
pub mod memory;
pub mod traits;
pub mod transaction;
pub mod watch;

pub use access::{Access, AccessRules, AllowAll, FnRules, Principal};
pub use config::StoreConfig;
pub use document::{
    CommitReceipt, Precondition, Snapshot, TransactionId, Version, VersionedDoc, Write, WriteBatch,
};
pub use error::{StoreError, StoreResult};
pub use hlc::HybridLogicalClock;
pub use key::DocKey;
pub use memory::InMemoryDocumentStore;
pub use traits::DocumentStore;
pub use transaction::Transaction;
pub use watch::{Change, ChangeSet, Watch, WatchEvent, WatchRecvError};

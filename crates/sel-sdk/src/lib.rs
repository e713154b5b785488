//! High-level SDK for the social engagement ledger.
//!
//! Provides a unified API over every subsystem. This is the main entry point
//! for applications embedding the ledger.

pub mod config;
pub mod error;
pub mod ledger;
pub mod telemetry;

pub use config::{LedgerConfig, LoggingConfig};
pub use error::{SdkError, SdkResult};
pub use ledger::SocialLedger;
pub use telemetry::init_tracing;

// Re-export key types
pub use sel_client::{ClientReconciler, ReconcileState, UserNotice};
pub use sel_ledger::{AuditReport, RetryConfig};
pub use sel_live::{LiveEvent, LiveViewConfig, Subscription};
pub use sel_store::{InMemoryDocumentStore, StoreConfig};
pub use sel_toggle::{Caller, ToggleError};
pub use sel_types::{ContentId, ContentRecord, FollowState, LikeState, UserId, UserRecord};

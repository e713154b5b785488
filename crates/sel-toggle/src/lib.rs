//! Toggle service: the entry point for authenticated follow and like flips.
//!
//! A toggle reads the caller's current relationship and invokes the
//! opposite counter-maintainer operation. The read is only a shortcut; the
//! maintainer re-checks edge existence inside its own transaction, so a
//! racing toggle can never double count.

pub mod caller;
pub mod error;
pub mod service;

pub use caller::Caller;
pub use error::{ToggleError, ToggleResult};
pub use service::ToggleService;

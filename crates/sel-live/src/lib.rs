//! Live views of follow and like state.
//!
//! A [`Subscription`] yields the current value from a consistent snapshot,
//! then one value per committed change touching its documents. Subscriptions
//! are read-only and hold nothing but a transient cache of the watched
//! documents; dropping or cancelling one releases its store watch.

pub mod config;
pub mod error;
pub mod projection;
pub mod subscription;
pub mod view;

pub use config::LiveViewConfig;
pub use error::{LiveViewError, LiveViewResult};
pub use projection::{FollowProjection, LikeProjection, Projection};
pub use subscription::{LiveEvent, Subscription};
pub use view::LiveView;

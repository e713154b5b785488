//! Client-side optimistic state for toggle buttons.
//!
//! [`ClientReconciler`] shows a predicted value the moment the user acts,
//! adopts authoritative values from the live view or the toggle service as
//! they arrive, and reverts to the last authoritative value when a toggle
//! fails. It never writes counters; it only predicts and mirrors them.

pub mod notice;
pub mod predict;
pub mod reconciler;

pub use notice::UserNotice;
pub use predict::Predict;
pub use reconciler::{ClientError, ClientReconciler, ReconcileState};

use std::future::Future;

use tracing::debug;

use sel_toggle::ToggleError;

use crate::notice::UserNotice;
use crate::predict::Predict;

/// What the client is currently showing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileState<V> {
    /// Last value received from the live view or the toggle service.
    Authoritative(V),
    /// A toggle is in flight. `base` is what a failure reverts to.
    Predicted { base: V, predicted: V },
    /// The last toggle failed and the prediction was rolled back.
    Reverted { value: V, notice: UserNotice },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// A second toggle was requested before the first resolved.
    #[error("a toggle is already in flight")]
    ToggleInFlight,

    #[error("{notice}")]
    Toggle {
        notice: UserNotice,
        #[source]
        source: ToggleError,
    },
}

/// Optimistic state for one relationship (a follow button, a like button).
#[derive(Clone, Debug)]
pub struct ClientReconciler<V: Predict> {
    state: ReconcileState<V>,
}

impl<V: Predict> ClientReconciler<V> {
    pub fn new(initial: V) -> Self {
        Self {
            state: ReconcileState::Authoritative(initial),
        }
    }

    pub fn state(&self) -> &ReconcileState<V> {
        &self.state
    }

    /// Value to render right now.
    pub fn displayed(&self) -> &V {
        match &self.state {
            ReconcileState::Authoritative(v) => v,
            ReconcileState::Predicted { predicted, .. } => predicted,
            ReconcileState::Reverted { value, .. } => value,
        }
    }

    /// Whether a toggle is awaiting its result.
    pub fn pending(&self) -> bool {
        matches!(self.state, ReconcileState::Predicted { .. })
    }

    pub fn notice(&self) -> Option<UserNotice> {
        match &self.state {
            ReconcileState::Reverted { notice, .. } => Some(*notice),
            _ => None,
        }
    }

    /// Adopt a value pushed by the live view. It always replaces what is
    /// displayed; an in-flight toggle stays pending and will revert to it.
    pub fn on_authoritative(&mut self, value: V) {
        self.state = match &self.state {
            ReconcileState::Predicted { .. } => ReconcileState::Predicted {
                base: value.clone(),
                predicted: value,
            },
            _ => ReconcileState::Authoritative(value),
        };
    }

    /// Show the predicted result of a toggle. Returns the new displayed
    /// value.
    pub fn begin_toggle(&mut self) -> Result<V, ClientError> {
        let base = match &self.state {
            ReconcileState::Predicted { .. } => return Err(ClientError::ToggleInFlight),
            ReconcileState::Authoritative(v) | ReconcileState::Reverted { value: v, .. } => v.clone(),
        };
        let predicted = base.toggled();
        self.state = ReconcileState::Predicted {
            base,
            predicted: predicted.clone(),
        };
        Ok(predicted)
    }

    /// The toggle succeeded with the service's authoritative result.
    pub fn confirm(&mut self, value: V) -> V {
        if !self.pending() {
            debug!("confirmation without a pending toggle");
        }
        self.state = ReconcileState::Authoritative(value.clone());
        value
    }

    /// The toggle failed: restore the last authoritative value.
    pub fn fail(&mut self, err: &ToggleError) -> UserNotice {
        let notice = UserNotice::for_error(err, V::failure_notice());
        let value = match &self.state {
            ReconcileState::Predicted { base, .. } => base.clone(),
            _ => self.displayed().clone(),
        };
        debug!(error = %err, %notice, "toggle failed; reverting prediction");
        self.state = ReconcileState::Reverted { value, notice };
        notice
    }

    /// Clear a failure notice, keeping the reverted value.
    pub fn dismiss_notice(&mut self) {
        if let ReconcileState::Reverted { value, .. } = &self.state {
            self.state = ReconcileState::Authoritative(value.clone());
        }
    }

    /// Run a full toggle cycle around `call`, which performs the toggle
    /// service request.
    pub async fn toggle_with<F, Fut>(&mut self, call: F) -> Result<V, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ToggleError>>,
    {
        self.begin_toggle()?;
        match call().await {
            Ok(value) => Ok(self.confirm(value)),
            Err(source) => {
                let notice = self.fail(&source);
                Err(ClientError::Toggle { notice, source })
            }
        }
    }
}

use std::sync::Arc;

use tracing::debug;

use sel_ledger::CounterMaintainer;
use sel_store::DocumentStore;
use sel_types::{ContentId, FollowState, LikeState, UserId};

use crate::caller::Caller;
use crate::error::{ToggleError, ToggleResult};

/// Flips follow and like relationships on behalf of a caller.
///
/// Authentication and self-reference are checked before the store is
/// touched. All transactions run as the caller's principal, so the store's
/// access rules decide whether the caller may write the affected records.
pub struct ToggleService<S: DocumentStore + ?Sized> {
    ledger: CounterMaintainer<S>,
}

impl<S: DocumentStore + ?Sized> Clone for ToggleService<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
        }
    }
}

impl<S: DocumentStore + ?Sized> ToggleService<S> {
    pub fn new(ledger: CounterMaintainer<S>) -> Self {
        Self { ledger }
    }

    pub fn from_store(store: Arc<S>) -> Self {
        Self::new(CounterMaintainer::new(store))
    }

    pub fn ledger(&self) -> &CounterMaintainer<S> {
        &self.ledger
    }

    /// Follow `target` if the caller does not already, otherwise unfollow.
    /// Returns the caller's resulting view of `target`.
    pub async fn toggle_follow(&self, caller: &Caller, target: &UserId) -> ToggleResult<FollowState> {
        let me = follow_precheck(caller, target)?;
        let principal = caller.principal()?;
        let currently = self.ledger.is_following(&principal, me, target).await?;
        let outcome = if currently {
            self.ledger.unfollow(&principal, me, target).await?
        } else {
            self.ledger.follow(&principal, me, target).await?
        };
        let state = outcome.follow_state();
        debug!(%caller, %target, following = state.following, changed = outcome.changed, "follow toggled");
        Ok(state)
    }

    /// Like `content` if the caller has not, otherwise unlike.
    pub async fn toggle_like(&self, caller: &Caller, content: &ContentId) -> ToggleResult<LikeState> {
        let me = caller.require()?;
        let principal = caller.principal()?;
        let currently = self.ledger.has_liked(&principal, me, content).await?;
        let outcome = if currently {
            self.ledger.unlike(&principal, me, content).await?
        } else {
            self.ledger.like(&principal, me, content).await?
        };
        let state = outcome.like_state();
        debug!(%caller, %content, liked = state.liked, changed = outcome.changed, "like toggled");
        Ok(state)
    }

    pub async fn follow(&self, caller: &Caller, target: &UserId) -> ToggleResult<FollowState> {
        let me = follow_precheck(caller, target)?;
        let outcome = self.ledger.follow(&caller.principal()?, me, target).await?;
        Ok(outcome.follow_state())
    }

    pub async fn unfollow(&self, caller: &Caller, target: &UserId) -> ToggleResult<FollowState> {
        let me = follow_precheck(caller, target)?;
        let outcome = self.ledger.unfollow(&caller.principal()?, me, target).await?;
        Ok(outcome.follow_state())
    }

    pub async fn like(&self, caller: &Caller, content: &ContentId) -> ToggleResult<LikeState> {
        let me = caller.require()?;
        let outcome = self.ledger.like(&caller.principal()?, me, content).await?;
        Ok(outcome.like_state())
    }

    pub async fn unlike(&self, caller: &Caller, content: &ContentId) -> ToggleResult<LikeState> {
        let me = caller.require()?;
        let outcome = self.ledger.unlike(&caller.principal()?, me, content).await?;
        Ok(outcome.like_state())
    }
}

fn follow_precheck<'a>(caller: &'a Caller, target: &UserId) -> ToggleResult<&'a UserId> {
    let me = caller.require()?;
    if me == target {
        return Err(ToggleError::SelfReference(me.to_string()));
    }
    Ok(me)
}

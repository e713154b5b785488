//! Per-key change subscriptions.

use std::collections::BTreeSet;
use std::sync::RwLock;

use tokio::sync::broadcast;
use tracing::debug;

use sel_types::TemporalAnchor;

use crate::access::{Access, AccessRules, Principal};
use crate::document::{Version, VersionedDoc};
use crate::error::StoreError;
use crate::key::DocKey;

/// New state of one key after a commit. `doc: None` means deleted.
#[derive(Clone, Debug, PartialEq)]
pub struct Change {
    pub key: DocKey,
    pub doc: Option<VersionedDoc>,
}

/// Every watched key touched by a single commit, delivered together.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeSet {
    pub version: Version,
    pub timestamp: TemporalAnchor,
    pub changes: Vec<Change>,
}

/// What a [`Watch`] yields.
#[derive(Clone, Debug, PartialEq)]
pub enum WatchEvent {
    Changed(ChangeSet),
    /// Terminal: the watch has been removed from the store.
    Failed(StoreError),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum WatchRecvError {
    /// The watcher fell behind and `0` change sets were dropped.
    #[error("watch lagged by {0} change sets")]
    Lagged(u64),
    /// The store side of the watch is gone.
    #[error("watch closed")]
    Closed,
}

/// Receiving half of a key subscription. Dropping it cancels the watch.
#[derive(Debug)]
pub struct Watch {
    keys: BTreeSet<DocKey>,
    receiver: broadcast::Receiver<WatchEvent>,
}

impl Watch {
    pub(crate) fn new(keys: BTreeSet<DocKey>, receiver: broadcast::Receiver<WatchEvent>) -> Self {
        Self { keys, receiver }
    }

    pub fn keys(&self) -> &BTreeSet<DocKey> {
        &self.keys
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> Result<WatchEvent, WatchRecvError> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(n)) => Err(WatchRecvError::Lagged(n)),
            Err(broadcast::error::RecvError::Closed) => Err(WatchRecvError::Closed),
        }
    }

    /// Non-blocking variant of [`Self::recv`]; `Ok(None)` when nothing is queued.
    pub fn try_recv(&mut self) -> Result<Option<WatchEvent>, WatchRecvError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Err(WatchRecvError::Lagged(n)),
            Err(broadcast::error::TryRecvError::Closed) => Err(WatchRecvError::Closed),
        }
    }
}

struct Subscriber {
    principal: Principal,
    keys: BTreeSet<DocKey>,
    sender: broadcast::Sender<WatchEvent>,
}

impl Subscriber {
    fn can_read_all<'a>(
        &self,
        rules: &dyn AccessRules,
        keys: impl IntoIterator<Item = &'a DocKey>,
    ) -> Option<&'a DocKey> {
        keys.into_iter()
            .find(|key| !rules.allows(&self.principal, &Access::Read((*key).clone())))
    }

    fn deny(&self, key: &DocKey) {
        let err = StoreError::PermissionDenied {
            principal: self.principal.to_string(),
            access: Access::Read(key.clone()).to_string(),
        };
        let _ = self.sender.send(WatchEvent::Failed(err));
    }
}

/// Fan-out router delivering change sets to matching watchers.
pub(crate) struct WatchRouter {
    subscribers: RwLock<Vec<Subscriber>>,
    capacity: usize,
}

impl WatchRouter {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn subscribe(&self, principal: Principal, keys: BTreeSet<DocKey>) -> Watch {
        let (sender, receiver) = broadcast::channel(self.capacity);
        self.subscribers
            .write()
            .expect("router lock poisoned")
            .push(Subscriber {
                principal,
                keys: keys.clone(),
                sender,
            });
        Watch::new(keys, receiver)
    }

    /// Deliver one commit's changes. Watchers that lost read access receive
    /// a terminal failure; watchers with no live receiver are pruned.
    pub(crate) fn route(
        &self,
        version: Version,
        timestamp: TemporalAnchor,
        changes: &[Change],
        rules: &dyn AccessRules,
    ) {
        let mut subs = self.subscribers.write().expect("router lock poisoned");
        subs.retain(|sub| {
            let relevant: Vec<Change> = changes
                .iter()
                .filter(|c| sub.keys.contains(&c.key))
                .cloned()
                .collect();
            if relevant.is_empty() {
                return sub.sender.receiver_count() > 0;
            }
            if let Some(denied) = sub.can_read_all(rules, relevant.iter().map(|c| &c.key)) {
                debug!(principal = %sub.principal, key = %denied, "watch read access revoked");
                sub.deny(denied);
                return false;
            }
            sub.sender
                .send(WatchEvent::Changed(ChangeSet {
                    version,
                    timestamp,
                    changes: relevant,
                }))
                .is_ok()
        });
    }

    /// Re-evaluate read access for every watcher, failing the ones revoked.
    pub(crate) fn recheck(&self, rules: &dyn AccessRules) -> usize {
        let mut subs = self.subscribers.write().expect("router lock poisoned");
        let before = subs.len();
        subs.retain(|sub| match sub.can_read_all(rules, sub.keys.iter()) {
            Some(denied) => {
                sub.deny(denied);
                false
            }
            None => true,
        });
        before - subs.len()
    }

    /// Fail and remove every watcher.
    pub(crate) fn fail_all(&self, err: StoreError) {
        let mut subs = self.subscribers.write().expect("router lock poisoned");
        for sub in subs.drain(..) {
            let _ = sub.sender.send(WatchEvent::Failed(err.clone()));
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .expect("router lock poisoned")
            .iter()
            .filter(|sub| sub.sender.receiver_count() > 0)
            .count()
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use sel_store::{DocKey, DocumentStore, Principal, Version, VersionedDoc, Watch, WatchEvent, WatchRecvError};

use crate::config::LiveViewConfig;
use crate::error::{LiveViewError, LiveViewResult};
use crate::projection::Projection;

/// What a subscription yields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LiveEvent<T> {
    Value(T),
    /// Terminal. The subscription yields `None` afterwards until restarted.
    Failed(LiveViewError),
}

impl<T> LiveEvent<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Failed(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// Not yet attached to the store.
    Idle,
    Streaming,
    /// Cancelled or failed.
    Finished,
}

/// A snapshot-then-stream view of one projection.
///
/// The watch is registered before the snapshot is read, so no commit can
/// fall between the two; change sets at or below the snapshot version are
/// skipped. Values are yielded in commit order. A commit that touches
/// several watched documents produces a single value.
pub struct Subscription<S: DocumentStore + ?Sized, P: Projection> {
    store: Arc<S>,
    principal: Principal,
    projection: P,
    config: LiveViewConfig,
    phase: Phase,
    watch: Option<Watch>,
    cache: BTreeMap<DocKey, VersionedDoc>,
    version: Version,
}

impl<S: DocumentStore + ?Sized, P: Projection> Subscription<S, P> {
    /// Create a subscription. Nothing is read until the first [`Self::next`].
    pub fn new(store: Arc<S>, principal: Principal, projection: P, config: LiveViewConfig) -> Self {
        Self {
            store,
            principal,
            projection,
            config,
            phase: Phase::Idle,
            watch: None,
            cache: BTreeMap::new(),
            version: Version::ZERO,
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    /// Store version of the most recently yielded value.
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn is_active(&self) -> bool {
        self.phase != Phase::Finished
    }

    /// Wait for the next value. The first call yields the current state.
    pub async fn next(&mut self) -> Option<LiveEvent<P::Value>> {
        loop {
            match self.phase {
                Phase::Finished => return None,
                Phase::Idle => {
                    return Some(match self.open().await {
                        Ok(()) => {
                            self.phase = Phase::Streaming;
                            self.emit()
                        }
                        Err(err) => self.fail(err),
                    });
                }
                Phase::Streaming => {
                    let Some(watch) = self.watch.as_mut() else {
                        return Some(self.fail(LiveViewError::Closed));
                    };
                    match watch.recv().await {
                        Ok(WatchEvent::Changed(set)) => {
                            if set.version <= self.version {
                                debug!(version = %set.version, current = %self.version, "skipping stale change set");
                                continue;
                            }
                            for change in set.changes {
                                match change.doc {
                                    Some(doc) => {
                                        self.cache.insert(change.key, doc);
                                    }
                                    None => {
                                        self.cache.remove(&change.key);
                                    }
                                }
                            }
                            self.version = set.version;
                            return Some(self.emit());
                        }
                        Ok(WatchEvent::Failed(err)) => return Some(self.fail(err.into())),
                        Err(WatchRecvError::Lagged(missed)) => {
                            if !self.config.resync_on_lag {
                                return Some(self.fail(LiveViewError::Lagged(missed)));
                            }
                            debug!(missed, "subscriber lagged; resyncing");
                            let before = self.version;
                            if let Err(err) = self.snapshot().await {
                                return Some(self.fail(err));
                            }
                            if self.version > before {
                                return Some(self.emit());
                            }
                        }
                        Err(WatchRecvError::Closed) => return Some(self.fail(LiveViewError::Closed)),
                    }
                }
            }
        }
    }

    /// Stop the subscription and release its watch. Calling it again, or on
    /// a subscription that already failed, does nothing.
    pub fn cancel(&mut self) {
        if self.phase != Phase::Finished {
            debug!(keys = self.projection.keys().len(), "subscription cancelled");
        }
        self.finish();
    }

    /// Detach and start over from a fresh snapshot on the next call to
    /// [`Self::next`].
    pub fn restart(&mut self) {
        self.finish();
        self.phase = Phase::Idle;
    }

    async fn open(&mut self) -> LiveViewResult<()> {
        let watch = self.store.watch(&self.principal, self.projection.keys()).await?;
        self.watch = Some(watch);
        self.snapshot().await
    }

    async fn snapshot(&mut self) -> LiveViewResult<()> {
        let snapshot = self
            .store
            .get_many(&self.principal, self.projection.keys())
            .await?;
        self.cache = snapshot.docs;
        self.version = snapshot.version;
        Ok(())
    }

    fn emit(&mut self) -> LiveEvent<P::Value> {
        match self.projection.project(&self.cache) {
            Ok(value) => LiveEvent::Value(value),
            Err(err) => self.fail(err),
        }
    }

    fn fail(&mut self, err: LiveViewError) -> LiveEvent<P::Value> {
        warn!(principal = %self.principal, error = %err, "subscription failed");
        self.finish();
        LiveEvent::Failed(err)
    }

    fn finish(&mut self) {
        self.phase = Phase::Finished;
        self.watch = None;
        self.cache.clear();
    }
}

impl<S: DocumentStore + ?Sized, P: Projection + std::fmt::Debug> std::fmt::Debug for Subscription<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("projection", &self.projection)
            .field("phase", &self.phase)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

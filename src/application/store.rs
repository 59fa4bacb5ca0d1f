//! Collection store.
//!
//! Holds the client-side view of the remote post collection. The view is
//! never patched locally: every successful mutation is followed by a full
//! reload, and reload responses are applied under a recency guard so that a
//! slow, older response can never overwrite a newer one.

use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

use metrics::{counter, histogram};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::domain::posts::{Post, PostFields, PostId, sort_newest_first};

use super::gateway::{GatewayError, PostsGateway};
use super::lock::mutex_lock;
use super::refresh::RefreshSignal;

const SOURCE: &str = "application::store";
const METRIC_RELOAD_TOTAL: &str = "postwall_reload_total";
const METRIC_RELOAD_MS: &str = "postwall_reload_ms";
const METRIC_MUTATION_TOTAL: &str = "postwall_mutation_total";

/// Load status of the collection view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

impl LoadStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Snapshot of the collection view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CollectionState {
    /// Posts from the last successful load, newest first.
    pub items: Vec<Post>,
    pub status: LoadStatus,
}

/// What happened to the response of one [`CollectionStore::reload`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The response replaced the visible items.
    Applied { count: usize },
    /// The gateway failed; the previous items were kept.
    Failed(GatewayError),
    /// A newer reload settled first, so this response was discarded.
    Superseded,
}

struct Inner {
    state: CollectionState,
    /// Token handed to the most recently started reload.
    issued: u64,
    /// Token of the most recent reload whose response was applied.
    settled: u64,
}

pub struct CollectionStore {
    gateway: Arc<dyn PostsGateway>,
    inner: Mutex<Inner>,
    updates: watch::Sender<CollectionState>,
}

impl CollectionStore {
    pub fn new(gateway: Arc<dyn PostsGateway>) -> Self {
        let (updates, _) = watch::channel(CollectionState::default());
        Self {
            gateway,
            inner: Mutex::new(Inner {
                state: CollectionState::default(),
                issued: 0,
                settled: 0,
            }),
            updates,
        }
    }

    /// Snapshot of the current view.
    pub fn state(&self) -> CollectionState {
        mutex_lock(&self.inner, SOURCE, "state").state.clone()
    }

    /// Look up a post in the current view.
    pub fn find(&self, id: &PostId) -> Option<Post> {
        mutex_lock(&self.inner, SOURCE, "find")
            .state
            .items
            .iter()
            .find(|post| &post.id == id)
            .cloned()
    }

    /// Observe every state transition.
    pub fn subscribe(&self) -> watch::Receiver<CollectionState> {
        self.updates.subscribe()
    }

    /// Re-fetch the whole collection and replace the view.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> ReloadOutcome {
        let token = {
            let mut inner = mutex_lock(&self.inner, SOURCE, "reload.start");
            inner.issued += 1;
            inner.state.status = LoadStatus::Loading;
            self.updates.send_replace(inner.state.clone());
            inner.issued
        };
        debug!(token, "Reload started");

        let started_at = Instant::now();
        let result = self.gateway.list().await;
        histogram!(METRIC_RELOAD_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        let outcome = self.settle(token, result);
        let label = match &outcome {
            ReloadOutcome::Applied { .. } => "applied",
            ReloadOutcome::Failed(_) => "failed",
            ReloadOutcome::Superseded => "superseded",
        };
        counter!(METRIC_RELOAD_TOTAL, "outcome" => label).increment(1);
        outcome
    }

    fn settle(&self, token: u64, result: Result<Vec<Post>, GatewayError>) -> ReloadOutcome {
        let mut inner = mutex_lock(&self.inner, SOURCE, "reload.settle");
        if token <= inner.settled {
            debug!(
                token,
                settled = inner.settled,
                "Discarding reload response superseded by a newer one"
            );
            return ReloadOutcome::Superseded;
        }
        inner.settled = token;
        let latest = token == inner.issued;

        let outcome = match result {
            Ok(mut posts) => {
                sort_newest_first(&mut posts);
                let count = posts.len();
                inner.state.items = posts;
                if latest {
                    inner.state.status = LoadStatus::Ready;
                }
                info!(token, count, latest, "Collection reloaded");
                ReloadOutcome::Applied { count }
            }
            Err(err) => {
                if latest {
                    inner.state.status = LoadStatus::Failed(err.to_string());
                }
                warn!(
                    token,
                    latest,
                    error = %err,
                    kind = err.kind(),
                    "Collection reload failed; keeping previous items"
                );
                ReloadOutcome::Failed(err)
            }
        };

        self.updates.send_replace(inner.state.clone());
        outcome
    }

    /// Create a post, then reload the collection.
    #[instrument(skip(self, fields))]
    pub async fn create(&self, fields: &PostFields) -> Result<Post, GatewayError> {
        let post = record_mutation("create", self.gateway.create(fields).await)?;
        info!(post_id = %post.id, "Post created");
        self.reload().await;
        Ok(post)
    }

    /// Replace the mutable fields of a post, then reload the collection.
    #[instrument(skip(self, id, fields), fields(post_id = %id))]
    pub async fn update(&self, id: &PostId, fields: &PostFields) -> Result<Post, GatewayError> {
        let post = record_mutation("update", self.gateway.update(id, fields).await)?;
        info!(post_id = %post.id, "Post updated");
        self.reload().await;
        Ok(post)
    }

    /// Delete a post, then reload the collection.
    #[instrument(skip(self, id), fields(post_id = %id))]
    pub async fn delete(&self, id: &PostId) -> Result<(), GatewayError> {
        record_mutation("delete", self.gateway.delete(id).await)?;
        info!(post_id = %id, "Post deleted");
        self.reload().await;
        Ok(())
    }

    /// Reload whenever `signal` reports that the collection changed.
    ///
    /// Events that queue up while a reload is running are coalesced into the
    /// next reload. The task holds only a weak reference to the store and
    /// stops when the store is dropped, the signal closes, or the returned
    /// listener is dropped.
    pub fn listen(self: &Arc<Self>, signal: &RefreshSignal) -> RefreshListener {
        let mut receiver = signal.subscribe();
        let store: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }

                let mut coalesced = 0_usize;
                loop {
                    match receiver.try_recv() {
                        Ok(_) | Err(TryRecvError::Lagged(_)) => coalesced += 1,
                        Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                    }
                }

                let Some(store) = store.upgrade() else {
                    break;
                };
                debug!(coalesced, "Refresh signal received; reloading collection");
                store.reload().await;
            }
            debug!("Refresh listener stopped");
        });

        RefreshListener { handle }
    }
}

fn record_mutation<T>(
    op: &'static str,
    result: Result<T, GatewayError>,
) -> Result<T, GatewayError> {
    let outcome = if result.is_ok() { "ok" } else { "error" };
    counter!(METRIC_MUTATION_TOTAL, "op" => op, "outcome" => outcome).increment(1);
    if let Err(err) = &result {
        warn!(op, error = %err, kind = err.kind(), "Post mutation failed");
    }
    result
}

/// Subscription of a store to a [`RefreshSignal`]; aborts the listener task on drop.
pub struct RefreshListener {
    handle: JoinHandle<()>,
}

impl RefreshListener {
    /// True once the task has stopped, e.g. because the store was dropped.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RefreshListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

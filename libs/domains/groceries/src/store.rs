//! Grocery Store - local mirror of the remote collection
//!
//! The store keeps every item of the remote collection in memory, in snapshot
//! order. It is fed by a standing subscription: each snapshot replaces the
//! whole mapping, so the most recent snapshot is always the source of truth.
//!
//! Status changes and deletes are applied locally before the remote write
//! (optimistic). A failed write is logged and reported as
//! [`WriteOutcome::Failed`] but never rolled back; the next snapshot
//! overwrites whatever the optimistic change left behind.

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use futures::future::join_all;
use indexmap::IndexMap;
use strum::Display;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

use crate::error::{GroceryError, GroceryResult};
use crate::models::{Item, ItemId, ItemPatch, ListedItem, NewItem, PickStatus, Snapshot};
use crate::projection::{SortConfig, project};
use crate::remote::{RemoteCollection, SnapshotStream};

/// Subscription lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Subscribing,
    Synced,
}

/// Whether the remote acknowledged a write.
///
/// Failures are not errors: the optimistic local state stays until the next
/// snapshot corrects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome<T = ()> {
    Acknowledged(T),
    Failed,
}

impl<T> WriteOutcome<T> {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, WriteOutcome::Acknowledged(_))
    }
}

/// Result of a bulk reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub acknowledged: usize,
    pub failed: usize,
}

/// Observable state of the store
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    connection: ConnectionState,
    items: IndexMap<ItemId, Item>,
    snapshots_received: u64,
}

impl StoreState {
    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Items in snapshot order
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of snapshots applied since the store was created
    pub fn snapshots_received(&self) -> u64 {
        self.snapshots_received
    }

    pub fn project(&self, sort: SortConfig) -> Vec<ListedItem> {
        project(self.items(), sort)
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot) {
        let mut items = IndexMap::with_capacity(snapshot.items.len());
        for item in snapshot.items {
            let id = item.id.clone();
            if items.insert(id.clone(), item).is_some() {
                warn!(item_id = %id, "Snapshot contains duplicate item id; keeping the last one");
            }
        }
        self.items = items;
        self.snapshots_received += 1;
    }
}

struct SubscriptionHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Synchronized list store over a [`RemoteCollection`]
pub struct GroceryStore<R: RemoteCollection> {
    remote: Arc<R>,
    state: Arc<watch::Sender<StoreState>>,
    subscription: Mutex<Option<SubscriptionHandle>>,
}

impl<R: RemoteCollection + 'static> GroceryStore<R> {
    pub fn new(remote: R) -> Self {
        Self::with_shared(Arc::new(remote))
    }

    /// Create a store over a remote that is shared with other owners
    pub fn with_shared(remote: Arc<R>) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            remote,
            state: Arc::new(state),
            subscription: Mutex::new(None),
        }
    }

    /// Receiver notified on every state change (snapshots and optimistic
    /// mutations). Do not hold a borrow across an `.await`.
    pub fn changes(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.borrow().connection
    }

    /// Current items in snapshot order
    pub fn items(&self) -> Vec<Item> {
        self.state.borrow().items().cloned().collect()
    }

    pub fn get(&self, id: &ItemId) -> Option<Item> {
        self.state.borrow().get(id).cloned()
    }

    pub fn project(&self, sort: SortConfig) -> Vec<ListedItem> {
        self.state.borrow().project(sort)
    }

    /// Open the standing subscription.
    ///
    /// Returns once the remote accepted it; snapshots are then applied in the
    /// background, starting with the current contents. A no-op when already
    /// subscribing or synced.
    ///
    /// The returned state is `Synced` when this call opened the
    /// subscription, the current state when it was a no-op, and
    /// `Disconnected` when [`unsubscribe`](Self::unsubscribe) ran while the
    /// remote was still accepting. In the last case no snapshot will follow.
    #[instrument(skip(self))]
    pub async fn subscribe(&self) -> GroceryResult<ConnectionState> {
        let started = self.state.send_if_modified(|state| {
            if state.connection == ConnectionState::Disconnected {
                state.connection = ConnectionState::Subscribing;
                true
            } else {
                false
            }
        });
        if !started {
            debug!("Already subscribed");
            return Ok(self.connection_state());
        }

        let snapshots = match self.remote.subscribe().await {
            Ok(snapshots) => snapshots,
            Err(err) => {
                error!(error = %err, "Subscription failed");
                self.set_connection(ConnectionState::Disconnected);
                return Err(err);
            }
        };

        // An unsubscribe while we were waiting wins.
        let synced = self.state.send_if_modified(|state| {
            if state.connection == ConnectionState::Subscribing {
                state.connection = ConnectionState::Synced;
                true
            } else {
                false
            }
        });
        if !synced {
            debug!("Unsubscribed while subscribing; dropping snapshot stream");
            return Ok(ConnectionState::Disconnected);
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(pump_snapshots(
            snapshots,
            Arc::clone(&self.state),
            shutdown_rx,
        ));
        *self.lock_subscription() = Some(SubscriptionHandle { shutdown, task });

        info!("Subscribed to remote collection");
        Ok(ConnectionState::Synced)
    }

    /// Tear down the subscription.
    ///
    /// After this returns no further snapshot is applied. Safe to call any
    /// number of times.
    #[instrument(skip(self))]
    pub async fn unsubscribe(&self) {
        let handle = self.lock_subscription().take();
        self.set_connection(ConnectionState::Disconnected);

        let Some(handle) = handle else {
            debug!("No active subscription");
            return;
        };

        let _ = handle.shutdown.send(true);
        if let Err(err) = handle.task.await {
            warn!(error = %err, "Snapshot task did not shut down cleanly");
        }
        info!("Unsubscribed from remote collection");
    }

    /// Set an item's pick status.
    ///
    /// The local item changes immediately; the remote update follows.
    #[instrument(skip(self, id), fields(item_id = %id))]
    pub async fn set_status(&self, id: &ItemId, status: PickStatus) -> GroceryResult<WriteOutcome> {
        let applied = self.state.send_if_modified(|state| match state.items.get_mut(id) {
            Some(item) => {
                item.status = Some(status);
                true
            }
            None => false,
        });
        if !applied {
            warn!("Status change for unknown item ignored");
            return Err(GroceryError::NotFound(id.clone()));
        }

        Ok(self
            .write("status update", self.remote.update(id.clone(), ItemPatch::status(status)))
            .await)
    }

    /// Commit an item's notes in a single remote update; empty text clears
    /// them. The local item is not touched.
    #[instrument(skip(self, id, text), fields(item_id = %id))]
    pub async fn set_notes(&self, id: &ItemId, text: &str) -> GroceryResult<WriteOutcome> {
        self.ensure_known(id)?;
        Ok(self
            .write("notes update", self.remote.update(id.clone(), ItemPatch::notes(text)))
            .await)
    }

    /// Remove an item locally, then delete it remotely.
    #[instrument(skip(self, id), fields(item_id = %id))]
    pub async fn delete_item(&self, id: &ItemId) -> GroceryResult<WriteOutcome> {
        let removed = self
            .state
            .send_if_modified(|state| state.items.shift_remove(id).is_some());
        if !removed {
            warn!("Delete of unknown item ignored");
            return Err(GroceryError::NotFound(id.clone()));
        }

        Ok(self.write("delete", self.remote.delete(id.clone())).await)
    }

    /// Create a new item remotely.
    ///
    /// Nothing is inserted locally: the item shows up with the next snapshot,
    /// once it has its remote id.
    #[instrument(skip(self))]
    pub async fn add_item(&self, name: &str, size: &str) -> GroceryResult<WriteOutcome<ItemId>> {
        let input = NewItem::new(name, size);
        input.validate()?;

        Ok(self.write("create", self.remote.create(input)).await)
    }

    /// Clear status and notes on every known item.
    ///
    /// One remote update per item, all in flight at once. Failures are
    /// counted and logged; nothing is rolled back.
    #[instrument(skip(self))]
    pub async fn reset_all(&self) -> ResetReport {
        let ids: Vec<ItemId> = self.state.borrow().items.keys().cloned().collect();

        let updates = ids.into_iter().map(|id| {
            let remote = Arc::clone(&self.remote);
            async move {
                let result = remote.update(id.clone(), ItemPatch::reset()).await;
                (id, result)
            }
        });

        let mut report = ResetReport::default();
        for (id, result) in join_all(updates).await {
            match result {
                Ok(()) => report.acknowledged += 1,
                Err(err) => {
                    error!(item_id = %id, error = %err, "Reset failed for item");
                    report.failed += 1;
                }
            }
        }

        info!(
            acknowledged = report.acknowledged,
            failed = report.failed,
            "Reset finished"
        );
        report
    }

    fn ensure_known(&self, id: &ItemId) -> GroceryResult<()> {
        if self.state.borrow().items.contains_key(id) {
            Ok(())
        } else {
            warn!(item_id = %id, "Operation on unknown item ignored");
            Err(GroceryError::NotFound(id.clone()))
        }
    }

    async fn write<T>(
        &self,
        operation: &'static str,
        request: impl Future<Output = GroceryResult<T>>,
    ) -> WriteOutcome<T> {
        match request.await {
            Ok(value) => WriteOutcome::Acknowledged(value),
            Err(err) => {
                error!(
                    operation,
                    error = %err,
                    "Remote write failed; the next snapshot is authoritative"
                );
                WriteOutcome::Failed
            }
        }
    }

    fn set_connection(&self, connection: ConnectionState) {
        self.state.send_if_modified(|state| {
            let changed = state.connection != connection;
            state.connection = connection;
            changed
        });
    }

    fn lock_subscription(&self) -> std::sync::MutexGuard<'_, Option<SubscriptionHandle>> {
        self.subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<R: RemoteCollection> Drop for GroceryStore<R> {
    fn drop(&mut self) {
        let handle = self
            .subscription
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.task.abort();
        }
    }
}

/// Apply snapshots until the stream ends or shutdown is signalled
async fn pump_snapshots(
    mut snapshots: SnapshotStream,
    state: Arc<watch::Sender<StoreState>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            next = snapshots.next() => match next {
                Some(snapshot) => {
                    debug!(items = snapshot.items.len(), "Applying snapshot");
                    state.send_modify(|state| state.apply_snapshot(snapshot));
                }
                None => {
                    warn!("Snapshot stream ended; store is now disconnected");
                    state.send_modify(|state| state.connection = ConnectionState::Disconnected);
                    break;
                }
            },
        }
    }
}

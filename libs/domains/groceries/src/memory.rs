//! In-process implementation of RemoteCollection
//!
//! Behaves like a hosted collection: ids are assigned on create, every change
//! is pushed to subscribers as a full snapshot, and writes can be made to
//! fail to exercise the store's failure handling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{GroceryError, GroceryResult};
use crate::models::{Item, ItemId, ItemPatch, NewItem, Snapshot};
use crate::remote::{RemoteCollection, SnapshotStream};

struct Inner {
    name: String,
    items: watch::Sender<Vec<Item>>,
    reachable: AtomicBool,
    fail_writes: AtomicBool,
}

/// Shared handle to an in-memory collection; clones see the same data
#[derive(Clone)]
pub struct InMemoryCollection {
    inner: Arc<Inner>,
}

impl InMemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        let (items, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                items,
                reachable: AtomicBool::new(true),
                fail_writes: AtomicBool::new(false),
            }),
        }
    }

    /// Collection pre-filled with items, ids assigned in order
    pub fn seeded(name: impl Into<String>, items: impl IntoIterator<Item = NewItem>) -> Self {
        let collection = Self::new(name);
        collection.inner.items.send_modify(|current| {
            current.extend(
                items
                    .into_iter()
                    .map(|input| Item::from_new(Self::next_id(), input)),
            );
        });
        collection
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current contents, as a subscriber would see them
    pub fn items(&self) -> Vec<Item> {
        self.inner.items.borrow().clone()
    }

    /// Simulate the service going offline: new subscriptions and all writes
    /// fail with `Connection`. Existing subscriptions stay open.
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Make every write fail with `Connection` while subscriptions keep working
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn next_id() -> ItemId {
        ItemId::from(Uuid::now_v7().to_string())
    }

    fn check_reachable(&self) -> GroceryResult<()> {
        if self.inner.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(GroceryError::Connection(format!(
                "collection '{}' is unreachable",
                self.inner.name
            )))
        }
    }

    fn check_writable(&self) -> GroceryResult<()> {
        self.check_reachable()?;
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(GroceryError::Connection(format!(
                "write to collection '{}' rejected",
                self.inner.name
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCollection for InMemoryCollection {
    #[instrument(skip(self), fields(collection = %self.inner.name))]
    async fn subscribe(&self) -> GroceryResult<SnapshotStream> {
        self.check_reachable()?;
        let stream = WatchStream::new(self.inner.items.subscribe()).map(Snapshot::from);
        Ok(stream.boxed())
    }

    #[instrument(skip(self, input), fields(collection = %self.inner.name))]
    async fn create(&self, input: NewItem) -> GroceryResult<ItemId> {
        self.check_writable()?;
        let id = Self::next_id();
        let item = Item::from_new(id.clone(), input);
        self.inner.items.send_modify(|items| items.push(item));
        debug!(item_id = %id, "Item created");
        Ok(id)
    }

    #[instrument(skip(self, patch), fields(collection = %self.inner.name))]
    async fn update(&self, id: ItemId, patch: ItemPatch) -> GroceryResult<()> {
        self.check_writable()?;
        let found = self.inner.items.send_if_modified(|items| {
            match items.iter_mut().find(|item| item.id == id) {
                Some(item) => {
                    item.apply_patch(patch);
                    true
                }
                None => false,
            }
        });
        if !found {
            return Err(GroceryError::NotFound(id));
        }
        debug!(item_id = %id, "Item updated");
        Ok(())
    }

    #[instrument(skip(self), fields(collection = %self.inner.name))]
    async fn delete(&self, id: ItemId) -> GroceryResult<()> {
        self.check_writable()?;
        let removed = self.inner.items.send_if_modified(|items| {
            let before = items.len();
            items.retain(|item| item.id != id);
            items.len() != before
        });
        if !removed {
            return Err(GroceryError::NotFound(id));
        }
        debug!(item_id = %id, "Item deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PickStatus;

    #[tokio::test]
    async fn test_subscribe_starts_with_current_contents() {
        let collection = InMemoryCollection::seeded("groceries", [NewItem::new("Milk", "1 Litre")]);

        let mut stream = collection.subscribe().await.unwrap();
        let first = stream.next().await.unwrap();

        assert_eq!(first.items.len(), 1);
        assert_eq!(first.items[0].name, "Milk");
    }

    #[tokio::test]
    async fn test_writes_push_new_snapshots() {
        let collection = InMemoryCollection::new("groceries");
        let mut stream = collection.subscribe().await.unwrap();
        assert!(stream.next().await.unwrap().items.is_empty());

        let id = collection.create(NewItem::new("Bread", "500 g")).await.unwrap();
        let snapshot = stream.next().await.unwrap();
        assert_eq!(snapshot.items[0].id, id);

        collection
            .update(id.clone(), ItemPatch::status(PickStatus::Picked))
            .await
            .unwrap();
        let snapshot = stream.next().await.unwrap();
        assert_eq!(snapshot.items[0].status, Some(PickStatus::Picked));

        collection.delete(id).await.unwrap();
        assert!(stream.next().await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let collection = InMemoryCollection::new("groceries");
        let missing = ItemId::from("missing");

        let err = collection.update(missing.clone(), ItemPatch::reset()).await.unwrap_err();
        assert!(matches!(err, GroceryError::NotFound(_)));

        let err = collection.delete(missing).await.unwrap_err();
        assert!(matches!(err, GroceryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unreachable_collection_rejects_subscribe_and_writes() {
        let collection = InMemoryCollection::new("groceries");
        collection.set_reachable(false);

        assert!(matches!(
            collection.subscribe().await,
            Err(GroceryError::Connection(_))
        ));
        assert!(matches!(
            collection.create(NewItem::new("Milk", "")).await,
            Err(GroceryError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_failing_writes_leave_data_untouched() {
        let collection = InMemoryCollection::seeded("groceries", [NewItem::new("Milk", "1 Litre")]);
        let id = collection.items()[0].id.clone();
        collection.set_fail_writes(true);

        let result = collection.update(id, ItemPatch::status(PickStatus::Picked)).await;

        assert!(matches!(result, Err(GroceryError::Connection(_))));
        assert_eq!(collection.items()[0].status, None);
    }
}

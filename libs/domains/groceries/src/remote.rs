use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::GroceryResult;
use crate::models::{ItemId, ItemPatch, NewItem, Snapshot};

/// Push channel of full collection snapshots.
///
/// Starts with the current contents and yields a new snapshot after every
/// change. It never restarts: once it ends, the subscription is over.
pub type SnapshotStream = BoxStream<'static, Snapshot>;

/// A hosted document collection holding grocery items.
///
/// The collection name is fixed when an implementation is constructed.
/// Writes never report the resulting state; callers observe their effect
/// through the snapshot stream.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteCollection: Send + Sync {
    /// Open the snapshot stream. Fails with `Connection` when unreachable.
    async fn subscribe(&self) -> GroceryResult<SnapshotStream>;

    /// Create an item and return the identifier the collection assigned
    async fn create(&self, input: NewItem) -> GroceryResult<ItemId>;

    /// Apply a partial update to an existing item
    async fn update(&self, id: ItemId, patch: ItemPatch) -> GroceryResult<()>;

    /// Delete an item
    async fn delete(&self, id: ItemId) -> GroceryResult<()>;
}

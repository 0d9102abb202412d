//! Store behaviour against a live (in-memory) remote collection
//!
//! These tests drive the full loop: writes go to the collection, the
//! collection pushes snapshots, and the store reconciles from them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain_groceries::*;
use tokio::sync::{Notify, watch};

const WAIT: Duration = Duration::from_secs(2);

fn pantry() -> InMemoryCollection {
    InMemoryCollection::seeded(
        "groceries",
        [NewItem::new("Milk", "1 Litre"), NewItem::new("Bread", "500 g")],
    )
}

async fn synced(collection: &InMemoryCollection) -> GroceryStore<InMemoryCollection> {
    let store = GroceryStore::new(collection.clone());
    store.subscribe().await.unwrap();
    wait_until(&mut store.changes(), |s| s.snapshots_received() >= 1).await;
    store
}

async fn wait_until(changes: &mut watch::Receiver<StoreState>, condition: impl FnMut(&StoreState) -> bool) {
    tokio::time::timeout(WAIT, changes.wait_for(condition))
        .await
        .expect("condition not reached in time")
        .expect("store dropped");
}

/// Collection whose subscribe and update calls can be held until released.
/// A held update fails once released.
struct Gated {
    inner: InMemoryCollection,
    subscribe_gate: Option<Arc<Notify>>,
    update_gate: Option<Arc<Notify>>,
}

impl Gated {
    fn new(inner: InMemoryCollection) -> Self {
        Self {
            inner,
            subscribe_gate: None,
            update_gate: None,
        }
    }
}

#[async_trait]
impl RemoteCollection for Gated {
    async fn subscribe(&self) -> GroceryResult<SnapshotStream> {
        if let Some(gate) = &self.subscribe_gate {
            gate.notified().await;
        }
        self.inner.subscribe().await
    }

    async fn create(&self, input: NewItem) -> GroceryResult<ItemId> {
        self.inner.create(input).await
    }

    async fn update(&self, id: ItemId, patch: ItemPatch) -> GroceryResult<()> {
        match &self.update_gate {
            Some(gate) => {
                gate.notified().await;
                Err(GroceryError::Connection("update rejected".into()))
            }
            None => self.inner.update(id, patch).await,
        }
    }

    async fn delete(&self, id: ItemId) -> GroceryResult<()> {
        self.inner.delete(id).await
    }
}

fn id_of(collection: &InMemoryCollection, name: &str) -> ItemId {
    collection
        .items()
        .into_iter()
        .find(|item| item.name == name)
        .map(|item| item.id)
        .expect("seeded item")
}

// ============================================================================
// Subscription
// ============================================================================

#[tokio::test]
async fn test_initial_snapshot_mirrors_collection_in_order() {
    let collection = pantry();
    let store = synced(&collection).await;

    assert_eq!(store.connection_state(), ConnectionState::Synced);
    assert_eq!(store.items(), collection.items());
    assert!(!store.changes().borrow().is_empty());
}

#[tokio::test]
async fn test_subscribe_of_empty_collection_syncs_empty_state() {
    let collection = InMemoryCollection::new("groceries");
    let store = synced(&collection).await;

    assert!(store.changes().borrow().is_empty());
}

#[tokio::test]
async fn test_subscribe_to_unreachable_collection_fails() {
    let collection = pantry();
    collection.set_reachable(false);
    let store = GroceryStore::new(collection.clone());

    let err = store.subscribe().await.unwrap_err();

    assert!(matches!(err, GroceryError::Connection(_)));
    assert_eq!(store.connection_state(), ConnectionState::Disconnected);
    assert!(store.items().is_empty());
}

#[tokio::test]
async fn test_unsubscribe_twice_stops_delivery() {
    let collection = pantry();
    let store = synced(&collection).await;
    let received = store.changes().borrow().snapshots_received();

    store.unsubscribe().await;
    store.unsubscribe().await;

    collection.create(NewItem::new("Eggs", "12")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(store.connection_state(), ConnectionState::Disconnected);
    assert_eq!(store.changes().borrow().snapshots_received(), received);
    assert_eq!(store.items().len(), 2);
}

#[tokio::test]
async fn test_resubscribe_after_unsubscribe_catches_up() {
    let collection = pantry();
    let store = synced(&collection).await;
    store.unsubscribe().await;

    collection.create(NewItem::new("Eggs", "12")).await.unwrap();
    store.subscribe().await.unwrap();

    wait_until(&mut store.changes(), |s| s.len() == 3).await;
    assert_eq!(store.connection_state(), ConnectionState::Synced);
}

#[tokio::test]
async fn test_unsubscribe_during_subscribe_reports_disconnected() {
    let release = Arc::new(Notify::new());
    let mut remote = Gated::new(pantry());
    remote.subscribe_gate = Some(Arc::clone(&release));
    let store = Arc::new(GroceryStore::new(remote));

    let pending = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.subscribe().await }
    });
    wait_until(&mut store.changes(), |s| {
        s.connection() == ConnectionState::Subscribing
    })
    .await;

    store.unsubscribe().await;
    release.notify_one();

    let state = pending.await.unwrap().unwrap();
    assert_eq!(state, ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.connection_state(), ConnectionState::Disconnected);
    assert_eq!(store.changes().borrow().snapshots_received(), 0);
}

// ============================================================================
// Optimistic mutation and snapshot authority
// ============================================================================

#[tokio::test]
async fn test_failed_status_update_stays_until_next_snapshot() {
    let collection = pantry();
    let store = synced(&collection).await;
    let bread = id_of(&collection, "Bread");

    collection.set_fail_writes(true);
    let outcome = store.set_status(&bread, PickStatus::Picked).await.unwrap();

    assert_eq!(outcome, WriteOutcome::Failed);
    assert_eq!(store.get(&bread).unwrap().status, Some(PickStatus::Picked));

    // Any change on the server produces a fresh snapshot, which wins.
    collection.set_fail_writes(false);
    let before = store.changes().borrow().snapshots_received();
    collection.create(NewItem::new("Eggs", "12")).await.unwrap();
    wait_until(&mut store.changes(), |s| s.snapshots_received() > before).await;

    assert_eq!(store.get(&bread).unwrap().status, None);
}

#[tokio::test]
async fn test_snapshot_during_pending_write_wins_and_failure_keeps_it() {
    let collection = pantry();
    let release = Arc::new(Notify::new());
    let mut remote = Gated::new(collection.clone());
    remote.update_gate = Some(Arc::clone(&release));
    let store = Arc::new(GroceryStore::new(remote));
    store.subscribe().await.unwrap();
    wait_until(&mut store.changes(), |s| s.snapshots_received() >= 1).await;

    let bread = id_of(&collection, "Bread");
    let milk = id_of(&collection, "Milk");

    let write = tokio::spawn({
        let store = Arc::clone(&store);
        let bread = bread.clone();
        async move { store.set_status(&bread, PickStatus::Picked).await }
    });
    wait_until(&mut store.changes(), |s| {
        s.get(&bread).is_some_and(|i| i.status == Some(PickStatus::Picked))
    })
    .await;

    // Unrelated change on the server while the status write is in flight.
    let before = store.changes().borrow().snapshots_received();
    collection.update(milk, ItemPatch::notes("semi-skimmed")).await.unwrap();
    wait_until(&mut store.changes(), |s| s.snapshots_received() > before).await;

    assert!(!write.is_finished());
    assert_eq!(store.get(&bread).unwrap().status, None);

    release.notify_one();
    let outcome = write.await.unwrap().unwrap();

    assert_eq!(outcome, WriteOutcome::Failed);
    assert_eq!(store.get(&bread).unwrap().status, None);
    assert_eq!(store.items(), collection.items());
}

#[tokio::test]
async fn test_acknowledged_status_update_is_confirmed_by_snapshot() {
    let collection = pantry();
    let store = synced(&collection).await;
    let milk = id_of(&collection, "Milk");

    let outcome = store.set_status(&milk, PickStatus::NotPicked).await.unwrap();
    assert!(outcome.is_acknowledged());

    let mut changes = store.changes();
    wait_until(&mut changes, |s| s.snapshots_received() >= 2).await;
    assert_eq!(store.get(&milk).unwrap().status, Some(PickStatus::NotPicked));
}

#[tokio::test]
async fn test_failed_delete_is_restored_by_next_snapshot() {
    let collection = pantry();
    let store = synced(&collection).await;
    let milk = id_of(&collection, "Milk");

    collection.set_fail_writes(true);
    let outcome = store.delete_item(&milk).await.unwrap();
    assert_eq!(outcome, WriteOutcome::Failed);
    assert!(store.get(&milk).is_none());

    collection.set_fail_writes(false);
    let bread = id_of(&collection, "Bread");
    collection
        .update(bread, ItemPatch::notes("wholegrain"))
        .await
        .unwrap();

    wait_until(&mut store.changes(), |s| s.get(&milk).is_some()).await;
    assert_eq!(store.items().len(), 2);
}

#[tokio::test]
async fn test_operations_on_unknown_ids_are_not_found() {
    let collection = pantry();
    let store = synced(&collection).await;
    let ghost = ItemId::from("ghost");

    assert!(matches!(
        store.set_status(&ghost, PickStatus::Picked).await,
        Err(GroceryError::NotFound(_))
    ));
    assert!(matches!(
        store.set_notes(&ghost, "x").await,
        Err(GroceryError::NotFound(_))
    ));
    assert!(matches!(
        store.delete_item(&ghost).await,
        Err(GroceryError::NotFound(_))
    ));
}

// ============================================================================
// Add, notes, reset
// ============================================================================

#[tokio::test]
async fn test_added_item_appears_only_via_snapshot() {
    let collection = pantry();
    let store = synced(&collection).await;

    let outcome = store.add_item("Eggs", "12 pcs").await.unwrap();
    let WriteOutcome::Acknowledged(id) = outcome else {
        panic!("create was not acknowledged");
    };

    wait_until(&mut store.changes(), |s| s.get(&id).is_some()).await;
    let eggs = store.get(&id).unwrap();
    assert_eq!(eggs.name, "Eggs");
    assert_eq!(eggs.status, None);
    assert_eq!(eggs.notes, None);
}

#[tokio::test]
async fn test_add_with_blank_name_leaves_collection_untouched() {
    let collection = pantry();
    let store = synced(&collection).await;

    let err = store.add_item("  ", "1L").await.unwrap_err();

    assert!(matches!(err, GroceryError::Validation(_)));
    assert_eq!(collection.items().len(), 2);
}

#[tokio::test]
async fn test_empty_notes_are_stored_as_absent() {
    let collection = pantry();
    let store = synced(&collection).await;
    let milk = id_of(&collection, "Milk");

    store.set_notes(&milk, "semi-skimmed").await.unwrap();
    wait_until(&mut store.changes(), |s| {
        s.get(&milk).and_then(|i| i.notes.as_deref()) == Some("semi-skimmed")
    })
    .await;

    store.set_notes(&milk, "").await.unwrap();
    wait_until(&mut store.changes(), |s| {
        s.get(&milk).is_some_and(|i| i.notes.is_none())
    })
    .await;

    let stored = collection.items().into_iter().find(|i| i.id == milk).unwrap();
    assert_eq!(stored.notes, None);
}

#[tokio::test]
async fn test_reset_all_clears_status_and_notes() {
    let collection = pantry();
    let store = synced(&collection).await;
    for item in collection.items() {
        collection
            .update(item.id.clone(), ItemPatch::status(PickStatus::Picked))
            .await
            .unwrap();
        collection
            .update(item.id, ItemPatch::notes("check price"))
            .await
            .unwrap();
    }
    wait_until(&mut store.changes(), |s| {
        s.items().all(|i| i.status.is_some() && i.notes.is_some())
    })
    .await;

    let report = store.reset_all().await;

    assert_eq!(report, ResetReport { acknowledged: 2, failed: 0 });
    wait_until(&mut store.changes(), |s| {
        s.items().all(|i| i.status.is_none() && i.notes.is_none())
    })
    .await;
}

#[tokio::test]
async fn test_reset_all_reports_failures_without_rollback() {
    let collection = pantry();
    let store = synced(&collection).await;
    collection.set_fail_writes(true);

    let report = store.reset_all().await;

    assert_eq!(report, ResetReport { acknowledged: 0, failed: 2 });
    assert_eq!(store.items().len(), 2);
}

// ============================================================================
// Projection over live state
// ============================================================================

#[tokio::test]
async fn test_size_projection_of_synced_items() {
    let collection = pantry();
    let store = synced(&collection).await;

    let rows = store.project(SortConfig::ascending(SortKey::Size));

    let names: Vec<_> = rows.iter().map(|r| r.item.name.as_str()).collect();
    assert_eq!(names, ["Milk", "Bread"]);
    assert_eq!(rows[1].display_index, 2);
}

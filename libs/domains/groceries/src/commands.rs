//! User intents mapped onto store operations.
//!
//! Destructive intents (delete, reset) ask for confirmation first and do
//! nothing at all, locally or remotely, when it is refused.

use tracing::info;

use crate::error::GroceryResult;
use crate::models::{ItemId, PickStatus};
use crate::remote::RemoteCollection;
use crate::store::{GroceryStore, ResetReport, WriteOutcome};

/// Asks the user to confirm a destructive action
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Result of a command that needs confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmed<T> {
    Done(T),
    Cancelled,
}

pub struct GroceryCommands<'a, R: RemoteCollection> {
    store: &'a GroceryStore<R>,
}

impl<'a, R: RemoteCollection + 'static> GroceryCommands<'a, R> {
    pub fn new(store: &'a GroceryStore<R>) -> Self {
        Self { store }
    }

    /// Checkbox toggled: checked is picked, unchecked is not picked
    pub async fn toggle_picked(&self, id: &ItemId, checked: bool) -> GroceryResult<WriteOutcome> {
        self.store
            .set_status(id, PickStatus::from_checked(checked))
            .await
    }

    /// Notes field committed (on blur / enter), never per keystroke
    pub async fn commit_notes(&self, id: &ItemId, text: &str) -> GroceryResult<WriteOutcome> {
        self.store.set_notes(id, text).await
    }

    pub async fn add(&self, name: &str, size: &str) -> GroceryResult<WriteOutcome<ItemId>> {
        self.store.add_item(name, size).await
    }

    pub async fn delete(
        &self,
        id: &ItemId,
        confirm: &impl Confirm,
    ) -> GroceryResult<Confirmed<WriteOutcome>> {
        if !confirm.confirm("Are you sure you want to delete this item?") {
            info!(item_id = %id, "Delete cancelled");
            return Ok(Confirmed::Cancelled);
        }
        self.store.delete_item(id).await.map(Confirmed::Done)
    }

    pub async fn reset_all(&self, confirm: &impl Confirm) -> Confirmed<ResetReport> {
        if !confirm.confirm("Reset all items?") {
            info!("Reset cancelled");
            return Confirmed::Cancelled;
        }
        Confirmed::Done(self.store.reset_all().await)
    }
}

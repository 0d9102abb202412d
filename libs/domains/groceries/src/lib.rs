//! Groceries Domain
//!
//! A grocery list mirrored in real time from a remote document collection.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   Commands   │  ← User intents, confirmation of destructive actions
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐      ┌──────────────┐
//! │ GroceryStore │ ───▶ │  Projection  │ ← Sorting, display numbering, print
//! └──────┬───────┘      └──────────────┘
//!        │ optimistic writes ▲ full snapshots
//! ┌──────▼───────────────────┴──┐
//! │      RemoteCollection       │  ← Trait + MongoDB / in-memory implementations
//! └─────────────────────────────┘
//! ```
//!
//! The store never trusts its own writes: every snapshot from the remote
//! replaces the local state wholesale, so a failed optimistic change is
//! corrected by the next snapshot.
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_groceries::{GroceryStore, InMemoryCollection, SortConfig, SortKey};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = GroceryStore::new(InMemoryCollection::new("groceries"));
//! store.subscribe().await?;
//!
//! store.add_item("Milk", "1 Litre").await?;
//! let rows = store.project(SortConfig::ascending(SortKey::Size));
//!
//! store.unsubscribe().await;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod error;
pub mod memory;
pub mod models;
pub mod mongodb;
pub mod print;
pub mod projection;
pub mod remote;
pub mod store;

// Re-export commonly used types
pub use crate::mongodb::MongoCollection;
pub use commands::{Confirm, Confirmed, GroceryCommands};
pub use error::{GroceryError, GroceryResult};
pub use memory::InMemoryCollection;
pub use models::{Item, ItemId, ItemPatch, ListedItem, NewItem, PickStatus, Snapshot};
pub use print::PrintDocument;
pub use projection::{SortConfig, SortDirection, SortKey};
pub use remote::{RemoteCollection, SnapshotStream};
pub use store::{ConnectionState, GroceryStore, ResetReport, StoreState, WriteOutcome};

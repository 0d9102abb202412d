//! MongoDB implementation of RemoteCollection
//!
//! Subscriptions are built on change streams: the current contents are sent
//! first, then the whole collection is re-read and sent again after every
//! change event. Change streams need a replica set or sharded cluster; on a
//! standalone server `subscribe` fails with a connection error.

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use core_config::mongodb::MongoConfig;
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, Collection, Database,
    bson::{Document, doc, from_document, oid::ObjectId, to_document},
    options::{ClientOptions, FindOptions},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::error::{GroceryError, GroceryResult};
use crate::models::{Item, ItemId, ItemPatch, NewItem, PickStatus, Snapshot};
use crate::remote::{RemoteCollection, SnapshotStream};

/// Stored shape of an item
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: String,
    #[serde(default)]
    status: Option<PickStatus>,
    #[serde(default)]
    notes: Option<String>,
}

impl From<ItemDocument> for Item {
    fn from(doc: ItemDocument) -> Self {
        Self {
            id: ItemId::from(doc.id.to_hex()),
            name: doc.name,
            size: doc.size,
            status: doc.status,
            notes: doc.notes,
        }
    }
}

/// Connect to MongoDB and verify the server answers
///
/// # Example
/// ```ignore
/// let config = MongoConfig::from_env()?;
/// let client = connect(&config).await?;
/// ```
pub async fn connect(config: &MongoConfig) -> GroceryResult<Client> {
    info!("Attempting to connect to MongoDB at {}", config.url);

    let mut options = ClientOptions::parse(&config.url).await?;
    options.connect_timeout = Some(Duration::from_secs(config.connect_timeout_secs));
    options.server_selection_timeout =
        Some(Duration::from_secs(config.server_selection_timeout_secs));
    if let Some(ref app_name) = config.app_name {
        options.app_name = Some(app_name.clone());
    }

    let client = Client::with_options(options)?;

    // Cheap round trip so an unreachable server fails here, not on first use
    client
        .list_database_names()
        .await
        .map_err(|e| GroceryError::Connection(e.to_string()))?;

    info!("Successfully connected to MongoDB");
    Ok(client)
}

/// Grocery collection stored in MongoDB
#[derive(Clone)]
pub struct MongoCollection {
    collection: Collection<ItemDocument>,
}

impl MongoCollection {
    /// Use the named collection of `db`
    pub fn new(db: &Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection::<ItemDocument>(collection_name),
        }
    }

    /// Connect using `config` and open `collection_name` in its database
    pub async fn connect(config: &MongoConfig, collection_name: &str) -> GroceryResult<Self> {
        let client = connect(config).await?;
        Ok(Self::new(&client.database(&config.database), collection_name))
    }

    pub fn name(&self) -> &str {
        self.collection.name()
    }

    fn id_filter(id: &ItemId) -> GroceryResult<Document> {
        let oid = ObjectId::parse_str(id.as_str()).map_err(|_| GroceryError::NotFound(id.clone()))?;
        Ok(doc! { "_id": oid })
    }

    fn update_document(patch: &ItemPatch) -> GroceryResult<Document> {
        let fields = to_document(patch).map_err(|e| GroceryError::Validation(e.to_string()))?;
        Ok(doc! { "$set": fields })
    }
}

/// Whole collection in insertion order (ObjectIds grow with creation time)
async fn load_snapshot(collection: &Collection<ItemDocument>) -> GroceryResult<Snapshot> {
    let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
    let cursor = collection
        .clone_with_type::<Document>()
        .find(doc! {})
        .with_options(options)
        .await?;
    let documents: Vec<Document> = cursor.try_collect().await?;
    Ok(decode_items(documents).into())
}

/// Decode documents one by one; malformed ones are skipped so a single bad
/// record cannot stall the mirror.
fn decode_items(documents: Vec<Document>) -> Vec<Item> {
    documents
        .into_iter()
        .filter_map(|document| {
            let id = document.get("_id").map(ToString::to_string);
            match from_document::<ItemDocument>(document) {
                Ok(decoded) => Some(Item::from(decoded)),
                Err(err) => {
                    warn!(document_id = ?id, error = %err, "Skipping malformed item document");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl RemoteCollection for MongoCollection {
    #[instrument(skip(self), fields(collection = %self.name()))]
    async fn subscribe(&self) -> GroceryResult<SnapshotStream> {
        // Open the change stream before the initial read so no change falls
        // between the two.
        let mut changes = self
            .collection
            .clone_with_type::<Document>()
            .watch()
            .await?
            .boxed();
        let initial = load_snapshot(&self.collection).await?;
        let collection = self.collection.clone();

        let snapshots = stream! {
            yield initial;
            while let Some(event) = changes.next().await {
                if let Err(err) = event {
                    error!(error = %err, "Change stream failed; ending subscription");
                    break;
                }
                match load_snapshot(&collection).await {
                    Ok(snapshot) => yield snapshot,
                    Err(err) => warn!(error = %err, "Failed to reload collection after change"),
                }
            }
        };

        info!("Change stream opened");
        Ok(Box::pin(snapshots))
    }

    #[instrument(skip(self, input), fields(collection = %self.name(), item_name = %input.name))]
    async fn create(&self, input: NewItem) -> GroceryResult<ItemId> {
        let result = self
            .collection
            .clone_with_type::<NewItem>()
            .insert_one(&input)
            .await?;

        let id = result
            .inserted_id
            .as_object_id()
            .map(|oid| ItemId::from(oid.to_hex()))
            .ok_or_else(|| GroceryError::Connection("server returned a non-ObjectId _id".into()))?;

        info!(item_id = %id, "Item created successfully");
        Ok(id)
    }

    #[instrument(skip(self, patch), fields(collection = %self.name()))]
    async fn update(&self, id: ItemId, patch: ItemPatch) -> GroceryResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let filter = Self::id_filter(&id)?;
        let result = self
            .collection
            .update_one(filter, Self::update_document(&patch)?)
            .await?;

        if result.matched_count == 0 {
            return Err(GroceryError::NotFound(id));
        }

        info!(item_id = %id, "Item updated successfully");
        Ok(())
    }

    #[instrument(skip(self), fields(collection = %self.name()))]
    async fn delete(&self, id: ItemId) -> GroceryResult<()> {
        let filter = Self::id_filter(&id)?;
        let result = self.collection.delete_one(filter).await?;

        if result.deleted_count == 0 {
            return Err(GroceryError::NotFound(id));
        }

        info!(item_id = %id, "Item deleted successfully");
        Ok(())
    }
}

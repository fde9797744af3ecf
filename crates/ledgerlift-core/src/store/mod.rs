//! Destination stores: where migrated collections and item revisions land.

mod memory;
mod sql;

pub use memory::{MemoryStore, UploadedBatch};
pub use sql::{CollectionSummary, LibSqlStore, StoredRevision};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CollectionMeta, ItemMeta};

/// Destination collection/item API.
///
/// Item operations only touch local handles; collection creation, batch
/// upload and logout are the suspension points.
#[allow(async_fn_in_trait)]
pub trait DestinationStore {
    type Collection;
    type Item;

    /// Create a local collection handle.
    async fn create_collection(&mut self, meta: &CollectionMeta) -> Result<Self::Collection>;

    /// Persist a collection created with [`Self::create_collection`].
    async fn upload_collection(&mut self, collection: &Self::Collection) -> Result<()>;

    fn create_item(
        &mut self,
        collection: &Self::Collection,
        meta: &ItemMeta,
        content: &str,
    ) -> Result<Self::Item>;

    /// Independent handle to the same item, so several revisions of it can
    /// travel in one batch.
    fn clone_item(&mut self, item: &Self::Item) -> Self::Item;

    /// Replace the item's content. This also clears a pending delete.
    fn set_item_content(&mut self, item: &mut Self::Item, content: &str);

    fn set_item_meta(&mut self, item: &mut Self::Item, meta: &ItemMeta);

    fn delete_item(&mut self, item: &mut Self::Item);

    /// Upload `items` in order; each handle is updated with its new etag.
    async fn batch_upload(
        &mut self,
        collection: &Self::Collection,
        items: &mut [Self::Item],
    ) -> Result<()>;

    async fn logout(&mut self) -> Result<()>;
}

/// Collection handle shared by the bundled stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionHandle {
    pub uid: String,
    pub meta: CollectionMeta,
}

/// Item handle shared by the bundled stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemHandle {
    pub uid: String,
    pub collection_uid: String,
    pub meta: ItemMeta,
    pub content: String,
    pub deleted: bool,
    /// Etag of the last uploaded revision, `None` before the first upload
    pub etag: Option<String>,
}

impl ItemHandle {
    fn new(collection_uid: &str, meta: &ItemMeta, content: &str) -> Self {
        Self {
            uid: new_uid(),
            collection_uid: collection_uid.to_string(),
            meta: meta.clone(),
            content: content.to_string(),
            deleted: false,
            etag: None,
        }
    }
}

fn new_uid() -> String {
    Uuid::now_v7().to_string()
}

//! In-memory destination store used for dry runs and tests

use tracing::debug;

use super::{new_uid, CollectionHandle, DestinationStore, ItemHandle};
use crate::error::{Error, Result};
use crate::models::{CollectionMeta, ItemMeta};

/// One `batch_upload` call as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedBatch {
    pub collection_uid: String,
    pub items: Vec<ItemHandle>,
}

/// Records everything it is asked to store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Vec<CollectionHandle>,
    batches: Vec<UploadedBatch>,
    current: Vec<ItemHandle>,
    clones: usize,
    logged_out: bool,
    batch_calls: usize,
    injected_failure: Option<(usize, Error)>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `call`-th `batch_upload` (0-based) fail with `error`.
    #[must_use]
    pub fn fail_batch_with(mut self, call: usize, error: Error) -> Self {
        self.injected_failure = Some((call, error));
        self
    }

    /// Uploaded collections in creation order.
    #[must_use]
    pub fn collections(&self) -> &[CollectionHandle] {
        &self.collections
    }

    #[must_use]
    pub fn batches(&self) -> &[UploadedBatch] {
        &self.batches
    }

    /// Batches uploaded into one collection.
    pub fn batches_for<'a>(&'a self, collection_uid: &'a str) -> impl Iterator<Item = &'a UploadedBatch> {
        self.batches
            .iter()
            .filter(move |batch| batch.collection_uid == collection_uid)
    }

    /// Latest uploaded state of each item in a collection.
    #[must_use]
    pub fn items(&self, collection_uid: &str) -> Vec<&ItemHandle> {
        self.current
            .iter()
            .filter(|item| item.collection_uid == collection_uid)
            .collect()
    }

    #[must_use]
    pub const fn clone_count(&self) -> usize {
        self.clones
    }

    #[must_use]
    pub const fn is_logged_out(&self) -> bool {
        self.logged_out
    }

    fn ensure_session(&self) -> Result<()> {
        if self.logged_out {
            return Err(Error::Store("session is logged out".into()));
        }
        Ok(())
    }
}

impl DestinationStore for MemoryStore {
    type Collection = CollectionHandle;
    type Item = ItemHandle;

    async fn create_collection(&mut self, meta: &CollectionMeta) -> Result<CollectionHandle> {
        self.ensure_session()?;
        Ok(CollectionHandle {
            uid: new_uid(),
            meta: meta.clone(),
        })
    }

    async fn upload_collection(&mut self, collection: &CollectionHandle) -> Result<()> {
        self.ensure_session()?;
        if self.collections.iter().any(|known| known.uid == collection.uid) {
            return Err(Error::Store(format!(
                "collection {} already uploaded",
                collection.uid
            )));
        }
        self.collections.push(collection.clone());
        Ok(())
    }

    fn create_item(
        &mut self,
        collection: &CollectionHandle,
        meta: &ItemMeta,
        content: &str,
    ) -> Result<ItemHandle> {
        self.ensure_session()?;
        Ok(ItemHandle::new(&collection.uid, meta, content))
    }

    fn clone_item(&mut self, item: &ItemHandle) -> ItemHandle {
        self.clones += 1;
        item.clone()
    }

    fn set_item_content(&mut self, item: &mut ItemHandle, content: &str) {
        item.content = content.to_string();
        item.deleted = false;
    }

    fn set_item_meta(&mut self, item: &mut ItemHandle, meta: &ItemMeta) {
        item.meta = meta.clone();
    }

    fn delete_item(&mut self, item: &mut ItemHandle) {
        item.deleted = true;
    }

    async fn batch_upload(
        &mut self,
        collection: &CollectionHandle,
        items: &mut [ItemHandle],
    ) -> Result<()> {
        self.ensure_session()?;
        let call = self.batch_calls;
        self.batch_calls += 1;
        if matches!(self.injected_failure, Some((index, _)) if index == call) {
            if let Some((_, error)) = self.injected_failure.take() {
                return Err(error);
            }
        }
        if !self.collections.iter().any(|known| known.uid == collection.uid) {
            return Err(Error::Store(format!(
                "collection {} was never uploaded",
                collection.uid
            )));
        }

        for item in items.iter_mut() {
            item.etag = Some(new_uid());
            match self.current.iter_mut().find(|known| known.uid == item.uid) {
                Some(known) => known.clone_from(item),
                None => self.current.push(item.clone()),
            }
        }
        debug!(
            "Stored batch of {} item(s) in collection {}",
            items.len(),
            collection.uid
        );
        self.batches.push(UploadedBatch {
            collection_uid: collection.uid.clone(),
            items: items.to_vec(),
        });
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        self.logged_out = true;
        Ok(())
    }
}

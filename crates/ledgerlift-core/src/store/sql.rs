//! libSQL-backed destination store

use std::path::Path;

use libsql::{params, Connection};
use serde::Serialize;

use super::{new_uid, CollectionHandle, DestinationStore, ItemHandle};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{CollectionMeta, CollectionType, ItemMeta};
use crate::util::unix_millis_now;

/// A stored collection with item counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSummary {
    pub uid: String,
    pub meta: CollectionMeta,
    pub items: usize,
    pub deleted_items: usize,
}

/// One uploaded revision of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRevision {
    pub etag: String,
    pub content: String,
    pub mtime: i64,
    pub deleted: bool,
}

/// Keeps the current state of every item plus its full revision history.
#[derive(Debug)]
pub struct LibSqlStore {
    db: Database,
    logged_out: bool,
}

impl LibSqlStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path).await?))
    }

    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory().await?))
    }

    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self {
            db,
            logged_out: false,
        }
    }

    fn conn(&self) -> Result<&Connection> {
        if self.logged_out {
            return Err(Error::Store("session is logged out".into()));
        }
        Ok(self.db.connection())
    }

    /// All collections, oldest first.
    pub async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let mut rows = self
            .conn()?
            .query(
                "SELECT c.uid, c.collection_type, c.name, c.description, c.color, c.mtime,
                        COUNT(i.uid), COALESCE(SUM(i.deleted), 0)
                 FROM collections c
                 LEFT JOIN items i ON i.collection_uid = c.uid
                 GROUP BY c.uid
                 ORDER BY c.created_at, c.uid",
                (),
            )
            .await?;

        let mut collections = Vec::new();
        while let Some(row) = rows.next().await? {
            let collection_type: String = row.get(1)?;
            collections.push(CollectionSummary {
                uid: row.get(0)?,
                meta: CollectionMeta {
                    collection_type: collection_type.parse::<CollectionType>()?,
                    name: row.get(2)?,
                    description: row.get(3)?,
                    color: row.get(4)?,
                    mtime: row.get(5)?,
                },
                items: count(row.get(6)?),
                deleted_items: count(row.get(7)?),
            });
        }
        Ok(collections)
    }

    /// Current state of every item in a collection.
    pub async fn items(&self, collection_uid: &str) -> Result<Vec<ItemHandle>> {
        let mut rows = self
            .conn()?
            .query(
                "SELECT uid, name, content, mtime, deleted, etag
                 FROM items WHERE collection_uid = ? ORDER BY name",
                [collection_uid],
            )
            .await?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(ItemHandle {
                uid: row.get(0)?,
                collection_uid: collection_uid.to_string(),
                meta: ItemMeta {
                    name: row.get(1)?,
                    mtime: row.get(3)?,
                },
                content: row.get(2)?,
                deleted: row.get::<i64>(4)? != 0,
                etag: Some(row.get(5)?),
            });
        }
        Ok(items)
    }

    /// Revision history of the item named `name` (its PIM uid), oldest first.
    pub async fn revisions_for(&self, collection_uid: &str, name: &str) -> Result<Vec<StoredRevision>> {
        let mut rows = self
            .conn()?
            .query(
                "SELECT r.etag, r.content, r.mtime, r.deleted
                 FROM item_revisions r
                 JOIN items i ON i.uid = r.item_uid
                 WHERE i.collection_uid = ? AND i.name = ?
                 ORDER BY r.id",
                [collection_uid, name],
            )
            .await?;

        let mut revisions = Vec::new();
        while let Some(row) = rows.next().await? {
            revisions.push(StoredRevision {
                etag: row.get(0)?,
                content: row.get(1)?,
                mtime: row.get(2)?,
                deleted: row.get::<i64>(3)? != 0,
            });
        }
        Ok(revisions)
    }

    async fn write_revision(conn: &Connection, item: &ItemHandle, etag: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO items (uid, collection_uid, name, content, mtime, deleted, etag)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(uid) DO UPDATE SET
                name = excluded.name,
                content = excluded.content,
                mtime = excluded.mtime,
                deleted = excluded.deleted,
                etag = excluded.etag",
            params![
                item.uid.as_str(),
                item.collection_uid.as_str(),
                item.meta.name.as_str(),
                item.content.as_str(),
                item.meta.mtime,
                i64::from(item.deleted),
                etag
            ],
        )
        .await?;
        conn.execute(
            "INSERT INTO item_revisions (item_uid, etag, content, mtime, deleted, uploaded_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                item.uid.as_str(),
                etag,
                item.content.as_str(),
                item.meta.mtime,
                i64::from(item.deleted),
                unix_millis_now()
            ],
        )
        .await?;
        Ok(())
    }
}

fn count(value: i64) -> usize {
    usize::try_from(value).unwrap_or_default()
}

impl DestinationStore for LibSqlStore {
    type Collection = CollectionHandle;
    type Item = ItemHandle;

    async fn create_collection(&mut self, meta: &CollectionMeta) -> Result<CollectionHandle> {
        self.conn()?;
        Ok(CollectionHandle {
            uid: new_uid(),
            meta: meta.clone(),
        })
    }

    async fn upload_collection(&mut self, collection: &CollectionHandle) -> Result<()> {
        let meta = &collection.meta;
        self.conn()?
            .execute(
                "INSERT INTO collections (uid, collection_type, name, description, color, mtime, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    collection.uid.as_str(),
                    meta.collection_type.as_str(),
                    meta.name.as_str(),
                    meta.description.as_str(),
                    meta.color.as_str(),
                    meta.mtime,
                    unix_millis_now()
                ],
            )
            .await?;
        tracing::debug!("Created collection {} ({})", collection.uid, meta.name);
        Ok(())
    }

    fn create_item(
        &mut self,
        collection: &CollectionHandle,
        meta: &ItemMeta,
        content: &str,
    ) -> Result<ItemHandle> {
        self.conn()?;
        Ok(ItemHandle::new(&collection.uid, meta, content))
    }

    fn clone_item(&mut self, item: &ItemHandle) -> ItemHandle {
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
        let conn = self.conn()?;
        if let Some(stray) = items
            .iter()
            .find(|item| item.collection_uid != collection.uid)
        {
            return Err(Error::Store(format!(
                "item {} does not belong to collection {}",
                stray.uid, collection.uid
            )));
        }

        let etags: Vec<String> = items.iter().map(|_| new_uid()).collect();

        conn.execute("BEGIN TRANSACTION", ()).await?;
        for (item, etag) in items.iter().zip(&etags) {
            if let Err(e) = Self::write_revision(conn, item, etag).await {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(e);
            }
        }
        if let Err(e) = conn.execute("COMMIT", ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        for (item, etag) in items.iter_mut().zip(etags) {
            item.etag = Some(etag);
        }
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        self.logged_out = true;
        Ok(())
    }
}

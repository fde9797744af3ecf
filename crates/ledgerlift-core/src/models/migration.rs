//! Destination-side model: collections, item metadata and pending revisions

use serde::{Deserialize, Serialize};

use super::{CollectionInfo, CollectionType};

const DEFAULT_COLLECTION_COLOR: &str = "#8BC34A";

/// Metadata for a destination collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub collection_type: CollectionType,
    pub name: String,
    pub description: String,
    pub color: String,
    /// Unix ms
    pub mtime: i64,
}

impl CollectionMeta {
    #[must_use]
    pub fn from_info(kind: CollectionType, info: &CollectionInfo, mtime: i64) -> Self {
        Self {
            collection_type: kind,
            name: info.display_name.clone(),
            description: info.description.clone(),
            color: color_int_to_html(info.color),
            mtime,
        }
    }
}

/// Metadata attached to every item revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMeta {
    /// The PIM uid of the item
    pub name: String,
    /// Modification time (Unix ms)
    pub mtime: i64,
}

/// One content + metadata snapshot to push for an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub content: String,
    pub meta: ItemMeta,
    pub deleted: bool,
}

/// How the destination handle for a pending revision is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevisionBase {
    /// First time the uid is seen in this run
    New,
    /// Item was uploaded in an earlier chunk; its handle is reused
    Existing,
    /// Item already has a revision in this chunk; the handle must be cloned
    CloneOfPending,
}

/// A revision queued for upload, in chain order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRevision {
    pub uid: String,
    pub base: RevisionBase,
    pub revision: Revision,
}

/// Per-uid accumulator state for one migration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationItem {
    pub uid: String,
    pub content: String,
    pub meta: ItemMeta,
    pub deleted: bool,
    /// Number of revisions produced for this uid so far
    pub revisions: usize,
    /// Chunk in which the last revision was queued
    pub(crate) last_chunk: usize,
}

impl MigrationItem {
    #[must_use]
    pub fn snapshot(&self) -> Revision {
        Revision {
            content: self.content.clone(),
            meta: self.meta.clone(),
            deleted: self.deleted,
        }
    }
}

/// Convert an ARGB color integer into `#RRGGBB`, appending alpha when not opaque.
#[must_use]
pub fn color_int_to_html(color: Option<i64>) -> String {
    let Some(color) = color else {
        return DEFAULT_COLLECTION_COLOR.to_string();
    };
    let channel = |shift: u32| (color >> shift) & 0xFF;
    let (alpha, red, green, blue) = (channel(24), channel(16), channel(8), channel(0));
    if alpha == 0xFF {
        format!("#{red:02X}{green:02X}{blue:02X}")
    } else {
        format!("#{red:02X}{green:02X}{blue:02X}{alpha:02X}")
    }
}

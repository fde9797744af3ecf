//! Data models for ledgerlift

pub(crate) mod encoding;
mod journal;
mod migration;
mod sync_entry;

pub use journal::{
    CollectionInfo, CollectionType, Journal, JournalEntry, LegacyExport, UserInfo,
    LEGACY_JOURNAL_VERSION,
};
pub use migration::{
    color_int_to_html, CollectionMeta, ItemMeta, MigrationItem, PendingRevision, Revision,
    RevisionBase,
};
pub use sync_entry::{SyncAction, SyncEntry};

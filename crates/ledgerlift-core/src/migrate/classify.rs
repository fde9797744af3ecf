//! Maps decrypted change records onto typed items.

use crate::models::{CollectionType, SyncAction, SyncEntry};
use crate::pim::{parser_for, PimItem, PimParser};

/// A change record whose content parsed and carries a uid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEntry {
    pub uid: String,
    pub action: SyncAction,
    pub item: PimItem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Change(ClassifiedEntry),
    /// Unparseable content or no uid; counted and skipped
    Malformed { reason: String },
}

/// Classifies entries of one collection type.
pub struct Classifier {
    parser: &'static dyn PimParser,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("collection_type", &self.parser.collection_type())
            .finish()
    }
}

impl Classifier {
    #[must_use]
    pub fn new(kind: CollectionType) -> Self {
        Self {
            parser: parser_for(kind),
        }
    }

    /// The action is taken verbatim from the entry.
    #[must_use]
    pub fn classify(&self, entry: SyncEntry) -> Classification {
        let item = match self.parser.parse(&entry.content) {
            Ok(item) => item,
            Err(error) => {
                return Classification::Malformed {
                    reason: error.to_string(),
                }
            }
        };

        match item.uid.clone() {
            Some(uid) => Classification::Change(ClassifiedEntry {
                uid,
                action: entry.action,
                item,
            }),
            None => Classification::Malformed {
                reason: "item has no UID".to_string(),
            },
        }
    }
}

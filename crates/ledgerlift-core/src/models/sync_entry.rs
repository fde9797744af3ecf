//! Decrypted change records

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What a change record does to its item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

impl SyncAction {
    /// Tag used in the legacy wire format.
    #[must_use]
    pub const fn wire_tag(self) -> &'static str {
        match self {
            Self::Create => "ADD",
            Self::Update => "CHANGE",
            Self::Delete => "DELETE",
        }
    }

    fn from_wire_tag(tag: &str) -> Option<Self> {
        match tag {
            "ADD" => Some(Self::Create),
            "CHANGE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(label)
    }
}

/// One decrypted journal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEntry {
    pub action: SyncAction,
    pub content: String,
}

#[derive(Serialize, Deserialize)]
struct WireSyncEntry {
    action: String,
    content: String,
}

impl SyncEntry {
    pub fn new(action: SyncAction, content: impl Into<String>) -> Self {
        Self {
            action,
            content: content.into(),
        }
    }

    /// Decode a decrypted payload, rejecting unknown action tags.
    pub fn decode(journal: &str, plaintext: &[u8]) -> Result<Self> {
        let wire: WireSyncEntry =
            serde_json::from_slice(plaintext).map_err(|error| Error::InvalidSyncEntry {
                journal: journal.to_string(),
                reason: error.to_string(),
            })?;
        let action =
            SyncAction::from_wire_tag(&wire.action).ok_or_else(|| Error::UnknownAction {
                journal: journal.to_string(),
                action: wire.action.clone(),
            })?;
        Ok(Self {
            action,
            content: wire.content,
        })
    }

    /// Encode to the payload that gets encrypted into a journal entry.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let wire = WireSyncEntry {
            action: self.action.wire_tag().to_string(),
            content: self.content.clone(),
        };
        Ok(serde_json::to_vec(&wire)?)
    }
}

//! Legacy journal model (the source side of a migration)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Journal format version that predates sharing support.
pub const LEGACY_JOURNAL_VERSION: u8 = 1;

/// One encrypted change record. Its uid is derived from its payload and its
/// predecessor's uid, so the position in the list matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub uid: String,
    #[serde(with = "super::encoding")]
    pub content: Vec<u8>,
}

/// Server-side append-only log for one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    pub uid: String,
    pub version: u8,
    pub owner: String,
    /// Journal key sealed to the current user; only present for shared journals
    #[serde(default, with = "super::encoding::option")]
    pub key: Option<Vec<u8>>,
    /// Encrypted [`CollectionInfo`]
    #[serde(with = "super::encoding")]
    pub content: Vec<u8>,
    /// Entries in server append order
    #[serde(default)]
    pub entries: Vec<JournalEntry>,
}

impl Journal {
    /// Whether this journal reaches the account through sharing.
    #[must_use]
    pub fn is_shared_with(&self, account_owner: &str) -> bool {
        self.key.is_some() || self.owner != account_owner
    }
}

/// Account record holding the user's key pair, encrypted with the derived key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub owner: String,
    pub version: u8,
    #[serde(with = "super::encoding")]
    pub public_key: Vec<u8>,
    #[serde(with = "super::encoding")]
    pub content: Vec<u8>,
}

/// Everything fetched from the legacy server for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyExport {
    pub user_info: UserInfo,
    #[serde(default)]
    pub journals: Vec<Journal>,
}

impl LegacyExport {
    /// Parse an export from its JSON representation.
    pub fn from_json(raw: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Kind of collection a journal describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionType {
    AddressBook,
    Calendar,
    Tasks,
}

impl CollectionType {
    /// Map the legacy collection-info tag. Unknown tags yield `None`.
    #[must_use]
    pub fn from_legacy_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "ADDRESS_BOOK" => Some(Self::AddressBook),
            "CALENDAR" => Some(Self::Calendar),
            "TASKS" => Some(Self::Tasks),
            _ => None,
        }
    }

    #[must_use]
    pub const fn legacy_tag(self) -> &'static str {
        match self {
            Self::AddressBook => "ADDRESS_BOOK",
            Self::Calendar => "CALENDAR",
            Self::Tasks => "TASKS",
        }
    }

    /// Type string used for destination collections.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddressBook => "address-book",
            Self::Calendar => "calendar",
            Self::Tasks => "tasks",
        }
    }
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "address-book" => Ok(Self::AddressBook),
            "calendar" => Ok(Self::Calendar),
            "tasks" => Ok(Self::Tasks),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown collection type '{other}'"
            ))),
        }
    }
}

/// Decrypted journal metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    #[serde(rename = "type")]
    pub collection_type: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Android-style ARGB color
    #[serde(default)]
    pub color: Option<i64>,
}

impl CollectionInfo {
    #[must_use]
    pub fn kind(&self) -> Option<CollectionType> {
        CollectionType::from_legacy_tag(&self.collection_type)
    }
}

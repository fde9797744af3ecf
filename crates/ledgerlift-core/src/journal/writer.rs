//! Builds chained journals on the encrypt side

use crate::crypto::{ChainCrypto, KeyPair};
use crate::error::{Error, Result};
use crate::models::{CollectionInfo, Journal, JournalEntry, SyncEntry, UserInfo};

/// Appends entries to a journal, chaining each one to its predecessor.
#[derive(Debug)]
pub struct JournalWriter {
    crypto: ChainCrypto,
    entries: Vec<JournalEntry>,
}

impl JournalWriter {
    #[must_use]
    pub const fn new(crypto: ChainCrypto) -> Self {
        Self {
            crypto,
            entries: Vec::new(),
        }
    }

    /// Encrypt `entry` at the tip of the chain and return its uid.
    pub fn append(&mut self, entry: &SyncEntry) -> Result<&str> {
        self.append_raw(&entry.encode()?)
    }

    /// Append an arbitrary payload. Used to build records that do not decode.
    pub fn append_raw(&mut self, plaintext: &[u8]) -> Result<&str> {
        let previous = self.tip();
        let entry = self.crypto.encrypt_entry(previous, plaintext)?;
        self.entries.push(entry);
        Ok(self.tip().unwrap_or_default())
    }

    /// Uid of the last appended entry.
    #[must_use]
    pub fn tip(&self) -> Option<&str> {
        self.entries.last().map(|entry| entry.uid.as_str())
    }

    #[must_use]
    pub const fn crypto(&self) -> &ChainCrypto {
        &self.crypto
    }

    #[must_use]
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Finish the journal with its encrypted collection info.
    pub fn finish(self, owner: &str, info: &CollectionInfo) -> Result<Journal> {
        Ok(Journal {
            uid: self.crypto.journal_uid().to_string(),
            version: self.crypto.version(),
            owner: owner.to_string(),
            key: None,
            content: self.crypto.encrypt_info(info)?,
            entries: self.entries,
        })
    }

    /// Finish the journal as shared with `recipient`, sealing its key from
    /// `sharer`.
    pub fn finish_shared(
        self,
        sharer: &KeyPair,
        owner: &str,
        recipient: &UserInfo,
        info: &CollectionInfo,
    ) -> Result<Journal> {
        let recipient_public: [u8; 32] =
            recipient.public_key.as_slice().try_into().map_err(|_| {
                Error::InvalidInput("recipient public key must be 32 bytes".into())
            })?;
        let key = self.crypto.encrypted_key_for(sharer, &recipient_public)?;
        let mut journal = self.finish(owner, info)?;
        journal.key = Some(key);
        Ok(journal)
    }
}

//! Per-journal chained entry encryption

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::keys::{open_journal_key, seal_journal_key, DerivedKey, KeyMaterial, KeyPair};
use super::{digest, expand, open, seal, KEY_LEN};
use crate::error::{Error, Result};
use crate::models::{CollectionInfo, Journal, JournalEntry, LEGACY_JOURNAL_VERSION};

const LEGACY_JOURNAL_LABEL: &str = "ledgerlift:journal:legacy";
const JOURNAL_LABEL: &str = "ledgerlift:journal";
const ENTRY_CIPHER_LABEL: &[u8] = b"ledgerlift:entry-cipher";
const ENTRY_MAC_LABEL: &[u8] = b"ledgerlift:entry-mac";
const INFO_LABEL: &[u8] = b"ledgerlift:collection-info";

#[derive(Zeroize, ZeroizeOnDrop)]
struct JournalKeys {
    journal: [u8; KEY_LEN],
    cipher: [u8; KEY_LEN],
    mac: [u8; KEY_LEN],
}

/// Encrypts and decrypts the entries of one journal.
///
/// Holds only immutable key material, so one instance can be shared freely
/// across a replay.
pub struct ChainCrypto {
    journal_uid: String,
    version: u8,
    keys: JournalKeys,
}

impl fmt::Debug for ChainCrypto {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ChainCrypto")
            .field("journal_uid", &self.journal_uid)
            .field("version", &self.version)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

impl ChainCrypto {
    /// Crypto context for `journal` as seen by the account owning `material`.
    ///
    /// Shared journals carry their key sealed to the account key pair; all
    /// others derive it from the account's derived key.
    pub fn for_journal(material: &KeyMaterial, journal: &Journal) -> Result<Self> {
        match &journal.key {
            Some(envelope) => {
                let journal_key = open_journal_key(material.key_pair(), envelope)?;
                Self::with_journal_key(&journal.uid, journal.version, &journal_key)
            }
            None => Self::derive(&journal.uid, journal.version, material.derived_key()),
        }
    }

    /// Derive the journal key from `(derived_key, journal_uid, version)`.
    pub fn derive(journal_uid: &str, version: u8, derived_key: &DerivedKey) -> Result<Self> {
        let label = journal_label(version)?;
        let journal_key = expand(
            derived_key.as_bytes(),
            Some(journal_uid.as_bytes()),
            label.as_bytes(),
        )?;
        Self::with_journal_key(journal_uid, version, &journal_key)
    }

    /// Build the context from an already known journal key.
    pub fn with_journal_key(
        journal_uid: &str,
        version: u8,
        journal_key: &[u8; KEY_LEN],
    ) -> Result<Self> {
        journal_label(version)?;
        let keys = JournalKeys {
            journal: *journal_key,
            cipher: expand(journal_key, None, ENTRY_CIPHER_LABEL)?,
            mac: expand(journal_key, None, ENTRY_MAC_LABEL)?,
        };
        Ok(Self {
            journal_uid: journal_uid.to_string(),
            version,
            keys,
        })
    }

    #[must_use]
    pub fn journal_uid(&self) -> &str {
        &self.journal_uid
    }

    #[must_use]
    pub const fn version(&self) -> u8 {
        self.version
    }

    /// Decrypt `entry`, which must directly follow `previous` in the chain.
    ///
    /// The entry uid is checked first, then the AEAD tag; both depend on
    /// `previous`, so a reordered or truncated list fails here.
    pub fn decrypt_entry(&self, previous: Option<&str>, entry: &JournalEntry) -> Result<Vec<u8>> {
        let binding = self.binding(previous);
        let expected = hex::decode(&entry.uid).map_err(|_| {
            Error::chain(&self.journal_uid, &entry.uid, "entry uid is not a digest")
        })?;
        if !digest::verify(&self.keys.mac, &[&binding, &entry.content], &expected)? {
            return Err(Error::chain(
                &self.journal_uid,
                &entry.uid,
                "entry is not bound to its predecessor",
            ));
        }

        open(&self.keys.cipher, &binding, &entry.content).ok_or_else(|| {
            Error::chain(
                &self.journal_uid,
                &entry.uid,
                "payload failed authentication",
            )
        })
    }

    /// Encrypt `plaintext` as the entry following `previous`.
    pub fn encrypt_entry(&self, previous: Option<&str>, plaintext: &[u8]) -> Result<JournalEntry> {
        let binding = self.binding(previous);
        let content = seal(&self.keys.cipher, &binding, plaintext)?;
        let uid = digest::digest_hex(&self.keys.mac, &[&binding, &content])?;
        Ok(JournalEntry { uid, content })
    }

    /// Decrypt the journal's collection info record.
    pub fn decrypt_info(&self, content: &[u8]) -> Result<CollectionInfo> {
        let plaintext = open(&self.keys.cipher, &self.info_binding(), content).ok_or_else(|| {
            Error::Crypto(format!(
                "collection info of journal {} failed to decrypt",
                self.journal_uid
            ))
        })?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    pub fn encrypt_info(&self, info: &CollectionInfo) -> Result<Vec<u8>> {
        let plaintext = serde_json::to_vec(info)?;
        seal(&self.keys.cipher, &self.info_binding(), &plaintext)
    }

    /// Seal this journal's key so that `recipient_public` can open it.
    pub fn encrypted_key_for(
        &self,
        key_pair: &KeyPair,
        recipient_public: &[u8; KEY_LEN],
    ) -> Result<Vec<u8>> {
        seal_journal_key(key_pair, recipient_public, &self.keys.journal)
    }

    /// Chain-binding material: journal uid plus the predecessor (or genesis).
    fn binding(&self, previous: Option<&str>) -> Vec<u8> {
        let mut binding = Vec::with_capacity(self.journal_uid.len() + 66);
        binding.extend_from_slice(self.journal_uid.as_bytes());
        binding.push(0);
        match previous {
            Some(previous) => {
                binding.push(1);
                binding.extend_from_slice(previous.as_bytes());
            }
            None => binding.push(0),
        }
        binding
    }

    fn info_binding(&self) -> Vec<u8> {
        let mut binding = INFO_LABEL.to_vec();
        binding.push(0);
        binding.extend_from_slice(self.journal_uid.as_bytes());
        binding
    }
}

fn journal_label(version: u8) -> Result<String> {
    match version {
        0 => Err(Error::Crypto("unsupported journal version 0".into())),
        LEGACY_JOURNAL_VERSION => Ok(LEGACY_JOURNAL_LABEL.to_string()),
        version => Ok(format!("{JOURNAL_LABEL}:v{version}")),
    }
}

//! Genesis-to-tip replay of a journal's entries

use std::iter::FusedIterator;
use std::slice;

use crate::crypto::ChainCrypto;
use crate::error::{Error, Result};
use crate::models::{JournalEntry, SyncEntry};

/// One step of the chain walk.
///
/// Returns the cursor for the next entry together with the decoded entry.
/// The cursor always advances to `entry.uid`, whatever the outcome.
pub fn replay_step(
    crypto: &ChainCrypto,
    previous: Option<&str>,
    entry: &JournalEntry,
) -> (String, Result<SyncEntry>) {
    let decoded = crypto
        .decrypt_entry(previous, entry)
        .and_then(|plaintext| SyncEntry::decode(crypto.journal_uid(), &plaintext));
    (entry.uid.clone(), decoded)
}

/// Lazily decrypt `entries` in append order.
///
/// Every call starts again from genesis.
pub fn replay<'a>(crypto: &'a ChainCrypto, entries: &'a [JournalEntry]) -> Replay<'a> {
    Replay {
        crypto,
        entries: entries.iter(),
        previous: None,
        broken_at: None,
    }
}

/// Iterator returned by [`replay`].
///
/// After the first chain fault every remaining entry yields
/// [`Error::ChainIntegrity`] as well, since nothing past the break can be
/// trusted.
#[derive(Debug)]
pub struct Replay<'a> {
    crypto: &'a ChainCrypto,
    entries: slice::Iter<'a, JournalEntry>,
    previous: Option<String>,
    broken_at: Option<String>,
}

impl Replay<'_> {
    /// Uid of the entry where the chain broke, if it has.
    #[must_use]
    pub fn broken_at(&self) -> Option<&str> {
        self.broken_at.as_deref()
    }
}

impl Iterator for Replay<'_> {
    type Item = Result<SyncEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;

        if let Some(broken_at) = &self.broken_at {
            self.previous = Some(entry.uid.clone());
            return Some(Err(Error::chain(
                self.crypto.journal_uid(),
                &entry.uid,
                format!("chain broken earlier at entry {broken_at}"),
            )));
        }

        let (next, decoded) = replay_step(self.crypto, self.previous.as_deref(), entry);
        if matches!(decoded, Err(Error::ChainIntegrity { .. })) {
            self.broken_at = Some(entry.uid.clone());
        }
        self.previous = Some(next);
        Some(decoded)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for Replay<'_> {}

impl FusedIterator for Replay<'_> {}

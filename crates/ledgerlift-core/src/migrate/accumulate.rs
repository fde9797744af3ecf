//! Folds classified changes into chunks of pending revisions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::classify::{ClassifiedEntry, Classification};
use crate::error::{Error, Result};
use crate::models::{ItemMeta, MigrationItem, PendingRevision, RevisionBase, SyncAction};

/// Anomaly counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Entries that did not parse or had no uid
    pub malformed: usize,
    /// Revisions whose mtime had to be synthesized
    pub bad_mtime: usize,
    /// Deletes of uids never seen in the journal
    pub ignored_deletes: usize,
}

impl Counters {
    pub fn add(&mut self, other: Self) {
        self.malformed += other.malformed;
        self.bad_mtime += other.bad_mtime;
        self.ignored_deletes += other.ignored_deletes;
    }

    /// Counts added since `earlier` was taken.
    #[must_use]
    pub const fn since(self, earlier: Self) -> Self {
        Self {
            malformed: self.malformed.saturating_sub(earlier.malformed),
            bad_mtime: self.bad_mtime.saturating_sub(earlier.bad_mtime),
            ignored_deletes: self.ignored_deletes.saturating_sub(earlier.ignored_deletes),
        }
    }
}

/// Source of synthesized modification times: `start + n` for the n-th call.
#[derive(Debug, Clone)]
pub struct MtimeClock {
    start: i64,
    issued: i64,
}

impl MtimeClock {
    #[must_use]
    pub const fn starting_at(start: i64) -> Self {
        Self { start, issued: 0 }
    }

    pub fn next_mtime(&mut self) -> i64 {
        let mtime = self.start + self.issued;
        self.issued += 1;
        mtime
    }
}

/// Per-journal fold state: uid to owned item.
#[derive(Debug)]
pub struct RevisionAccumulator<'c> {
    items: HashMap<String, MigrationItem>,
    counters: Counters,
    clock: &'c mut MtimeClock,
}

impl<'c> RevisionAccumulator<'c> {
    pub fn new(clock: &'c mut MtimeClock) -> Self {
        Self {
            items: HashMap::new(),
            counters: Counters::default(),
            clock,
        }
    }

    #[must_use]
    pub const fn counters(&self) -> Counters {
        self.counters
    }

    #[must_use]
    pub fn item(&self, uid: &str) -> Option<&MigrationItem> {
        self.items.get(uid)
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Apply one classified entry while filling chunk `chunk`.
    ///
    /// Returns the revision to queue, or `None` when the entry is absorbed
    /// into a counter.
    pub fn apply(&mut self, classification: Classification, chunk: usize) -> Option<PendingRevision> {
        match classification {
            Classification::Malformed { reason } => {
                self.counters.malformed += 1;
                debug!("Skipping malformed entry: {}", reason);
                None
            }
            Classification::Change(change) => self.apply_change(change, chunk),
        }
    }

    fn apply_change(&mut self, change: ClassifiedEntry, chunk: usize) -> Option<PendingRevision> {
        let ClassifiedEntry { uid, action, item } = change;

        if action == SyncAction::Delete && !self.items.contains_key(&uid) {
            self.counters.ignored_deletes += 1;
            warn!("Ignoring delete of unknown item {}", uid);
            return None;
        }

        let mtime = item.mtime().unwrap_or_else(|| {
            self.counters.bad_mtime += 1;
            self.clock.next_mtime()
        });
        let meta = ItemMeta {
            name: uid.clone(),
            mtime,
        };

        let base = match self.items.get_mut(&uid) {
            Some(existing) => {
                let base = if existing.last_chunk == chunk {
                    RevisionBase::CloneOfPending
                } else {
                    RevisionBase::Existing
                };
                if action == SyncAction::Delete {
                    existing.deleted = true;
                } else {
                    existing.content = item.content;
                    existing.deleted = false;
                }
                existing.meta = meta;
                existing.revisions += 1;
                existing.last_chunk = chunk;
                base
            }
            None => {
                self.items.insert(
                    uid.clone(),
                    MigrationItem {
                        uid: uid.clone(),
                        content: item.content,
                        meta,
                        deleted: false,
                        revisions: 1,
                        last_chunk: chunk,
                    },
                );
                RevisionBase::New
            }
        };

        let revision = self.items.get(&uid)?.snapshot();
        Some(PendingRevision {
            uid,
            base,
            revision,
        })
    }
}

/// Up to `chunk_size` revisions in chain order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub revisions: Vec<PendingRevision>,
    /// Entries read to build this chunk, malformed ones included
    pub entries_consumed: usize,
    /// Anomalies met while building this chunk
    pub counters: Counters,
}

impl Chunk {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn revisions_for<'a>(&'a self, uid: &'a str) -> impl Iterator<Item = &'a PendingRevision> {
        self.revisions.iter().filter(move |pending| pending.uid == uid)
    }
}

/// Lazy chunk sequence returned by [`accumulate`].
///
/// The first input error is yielded once and ends the sequence. Revisions
/// built before the error come first, as a short chunk.
#[derive(Debug)]
pub struct Chunks<'c, I> {
    entries: I,
    accumulator: RevisionAccumulator<'c>,
    chunk_size: usize,
    next_index: usize,
    finished: bool,
    failure: Option<Error>,
}

impl<'c, I> Chunks<'c, I> {
    #[must_use]
    pub const fn accumulator(&self) -> &RevisionAccumulator<'c> {
        &self.accumulator
    }

    #[must_use]
    pub const fn counters(&self) -> Counters {
        self.accumulator.counters()
    }
}

/// Fold `entries` into chunks of at most `chunk_size` revisions.
pub fn accumulate<I>(entries: I, chunk_size: usize, clock: &mut MtimeClock) -> Chunks<'_, I::IntoIter>
where
    I: IntoIterator<Item = Result<Classification>>,
{
    Chunks {
        entries: entries.into_iter(),
        accumulator: RevisionAccumulator::new(clock),
        chunk_size: chunk_size.max(1),
        next_index: 0,
        finished: false,
        failure: None,
    }
}

impl<I> Iterator for Chunks<'_, I>
where
    I: Iterator<Item = Result<Classification>>,
{
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(error) = self.failure.take() {
            return Some(Err(error));
        }
        if self.finished {
            return None;
        }

        let index = self.next_index;
        let before = self.accumulator.counters();
        let mut revisions = Vec::with_capacity(self.chunk_size);
        let mut entries_consumed = 0;

        while revisions.len() < self.chunk_size {
            let Some(entry) = self.entries.next() else {
                self.finished = true;
                break;
            };
            match entry {
                Ok(classification) => {
                    entries_consumed += 1;
                    if let Some(pending) = self.accumulator.apply(classification, index) {
                        revisions.push(pending);
                    }
                }
                Err(error) => {
                    self.finished = true;
                    if revisions.is_empty() {
                        return Some(Err(error));
                    }
                    self.failure = Some(error);
                    break;
                }
            }
        }

        if entries_consumed == 0 {
            return None;
        }
        self.next_index += 1;
        Some(Ok(Chunk {
            index,
            revisions,
            entries_consumed,
            counters: self.accumulator.counters().since(before),
        }))
    }
}

//! Drives journals through replay and uploads their revisions chunk by chunk.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::accumulate::{accumulate, Chunk, Counters, MtimeClock};
use super::classify::Classifier;
use super::progress::{
    JournalFailure, JournalOutcome, MigrationPhase, MigrationProgress, MigrationReport,
    MigrationState, SkippedJournal,
};
use crate::crypto::{ChainCrypto, DerivedKey, KeyMaterial};
use crate::error::{Error, Result};
use crate::journal::replay;
use crate::models::{CollectionMeta, Journal, LegacyExport, RevisionBase};
use crate::store::DestinationStore;
use crate::util::unix_millis_now;

/// Revisions per uploaded batch unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOptions {
    pub chunk_size: usize,
    /// Journal uids to migrate; empty means all
    pub journals: Vec<String>,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            journals: Vec::new(),
        }
    }
}

impl MigrationOptions {
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn with_journals(mut self, journals: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.journals = journals.into_iter().map(Into::into).collect();
        self
    }
}

/// Shared cancellation request, honored between chunks and between journals.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct JournalError {
    phase: MigrationPhase,
    error: Error,
}

fn at(phase: MigrationPhase) -> impl FnOnce(Error) -> JournalError {
    move |error| JournalError { phase, error }
}

enum JournalResult {
    Migrated(JournalOutcome),
    Skipped(SkippedJournal),
}

/// Where a journal sits in the run, for progress events.
struct Position {
    current_journal: usize,
    total_journals: usize,
    entries_before: usize,
    total_entries: usize,
}

/// Migrates legacy journals into a [`DestinationStore`].
#[derive(Debug)]
pub struct Migrator<S> {
    store: S,
    options: MigrationOptions,
    cancel: CancelFlag,
    state: MigrationState,
}

impl<S: DestinationStore> Migrator<S> {
    pub fn new(store: S, options: MigrationOptions) -> Self {
        Self {
            store,
            options,
            cancel: CancelFlag::new(),
            state: MigrationState::NotStarted,
        }
    }

    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    #[must_use]
    pub const fn state(&self) -> &MigrationState {
        &self.state
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Unlock the export's key material, then migrate its journals.
    ///
    /// A wrong derived key fails the run before anything is written.
    pub async fn migrate_export(
        &mut self,
        derived_key: DerivedKey,
        export: &LegacyExport,
        on_progress: impl FnMut(&MigrationProgress),
    ) -> Result<MigrationReport> {
        let material = match KeyMaterial::unlock(derived_key, &export.user_info) {
            Ok(material) => material,
            Err(error) => {
                self.fail(&error);
                return Err(error);
            }
        };
        self.run(&material, &export.journals, on_progress).await
    }

    /// Migrate the selected `journals`, in order.
    ///
    /// Journal-level faults are collected in the report; account-level faults
    /// and cancellation end the run with [`MigrationState::Failed`].
    pub async fn run(
        &mut self,
        material: &KeyMaterial,
        journals: &[Journal],
        mut on_progress: impl FnMut(&MigrationProgress),
    ) -> Result<MigrationReport> {
        match self.run_journals(material, journals, &mut on_progress).await {
            Ok(report) => Ok(report),
            Err(error) => {
                self.fail(&error);
                Err(error)
            }
        }
    }

    async fn run_journals(
        &mut self,
        material: &KeyMaterial,
        journals: &[Journal],
        on_progress: &mut dyn FnMut(&MigrationProgress),
    ) -> Result<MigrationReport> {
        self.state = MigrationState::SelectingJournals;
        let selected = self.select(journals)?;
        let total_entries: usize = selected.iter().map(|journal| journal.entries.len()).sum();
        info!(
            "Migrating {} journal(s) with {} entries",
            selected.len(),
            total_entries
        );

        let mut report = MigrationReport::default();
        let mut clock = MtimeClock::starting_at(unix_millis_now());
        let mut entries_before = 0;

        for (index, journal) in selected.iter().enumerate() {
            self.ensure_not_cancelled()?;
            let position = Position {
                current_journal: index + 1,
                total_journals: selected.len(),
                entries_before,
                total_entries,
            };

            let result = self
                .migrate_journal(
                    material,
                    journal,
                    &position,
                    &mut clock,
                    &mut report.counters,
                    on_progress,
                )
                .await;
            match result {
                Ok(JournalResult::Migrated(outcome)) => report.migrated.push(outcome),
                Ok(JournalResult::Skipped(skipped)) => report.skipped.push(skipped),
                Err(JournalError { error, .. }) if error.is_account_level() => return Err(error),
                Err(JournalError { phase, error }) => {
                    warn!(
                        "Journal {} failed during {}: {}",
                        journal.uid, phase, error
                    );
                    report.failures.push(JournalFailure {
                        journal_uid: journal.uid.clone(),
                        phase,
                        error: error.to_string(),
                    });
                }
            }
            entries_before += journal.entries.len();
        }

        self.store.logout().await?;
        self.state = MigrationState::LoggedOut;
        debug!("Logged out of destination store");

        self.state = MigrationState::Done;
        report.state = MigrationState::Done;
        info!(
            "Migration finished: {} migrated, {} skipped, {} failed",
            report.migrated.len(),
            report.skipped.len(),
            report.failures.len()
        );
        Ok(report)
    }

    fn select<'j>(&self, journals: &'j [Journal]) -> Result<Vec<&'j Journal>> {
        let wanted = &self.options.journals;
        if wanted.is_empty() {
            return Ok(journals.iter().collect());
        }

        let unknown: Vec<&str> = wanted
            .iter()
            .filter(|uid| !journals.iter().any(|journal| &journal.uid == *uid))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(Error::InvalidInput(format!(
                "unknown journal(s): {}",
                unknown.join(", ")
            )));
        }

        Ok(journals
            .iter()
            .filter(|journal| wanted.contains(&journal.uid))
            .collect())
    }

    fn ensure_not_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn fail(&mut self, cause: &Error) {
        error!("Migration failed: {}", cause);
        self.state = MigrationState::Failed {
            error: cause.to_string(),
        };
    }

    async fn migrate_journal(
        &mut self,
        material: &KeyMaterial,
        journal: &Journal,
        position: &Position,
        clock: &mut MtimeClock,
        counters: &mut Counters,
        on_progress: &mut dyn FnMut(&MigrationProgress),
    ) -> std::result::Result<JournalResult, JournalError> {
        let crypto = ChainCrypto::for_journal(material, journal).map_err(at(MigrationPhase::Keys))?;
        let info = crypto
            .decrypt_info(&journal.content)
            .map_err(at(MigrationPhase::CollectionInfo))?;

        let Some(kind) = info.kind() else {
            warn!(
                "Skipping journal {} with unsupported type '{}'",
                journal.uid, info.collection_type
            );
            return Ok(JournalResult::Skipped(SkippedJournal {
                journal_uid: journal.uid.clone(),
                collection_type: info.collection_type,
            }));
        };

        let shared = journal.is_shared_with(material.owner());
        if shared {
            warn!(
                "Journal {} is shared; migrating contents only, sharing is dropped",
                journal.uid
            );
        }
        info!(
            "Migrating journal {} ({}, {} entries)",
            journal.uid,
            kind,
            journal.entries.len()
        );

        self.state = MigrationState::CreatingCollection {
            journal: journal.uid.clone(),
        };
        let meta = CollectionMeta::from_info(kind, &info, unix_millis_now());
        let collection = self
            .store
            .create_collection(&meta)
            .await
            .map_err(at(MigrationPhase::CreatingCollection))?;
        self.store
            .upload_collection(&collection)
            .await
            .map_err(at(MigrationPhase::CreatingCollection))?;

        let classifier = Classifier::new(kind);
        let entries = replay(&crypto, &journal.entries)
            .map(|decoded| decoded.map(|entry| classifier.classify(entry)));
        let mut chunks = accumulate(entries, self.options.chunk_size, clock);

        let mut outcome = JournalOutcome {
            journal_uid: journal.uid.clone(),
            collection_type: kind,
            collection_name: meta.name.clone(),
            entries: journal.entries.len(),
            revisions: 0,
            chunks: 0,
            shared,
        };
        let mut handles: HashMap<String, S::Item> = HashMap::new();
        let mut consumed = 0;
        let mut landed = Counters::default();

        let result = loop {
            let chunk = match chunks.next() {
                None => break Ok(()),
                Some(Ok(chunk)) => chunk,
                Some(Err(error)) => break Err(at(MigrationPhase::Replay)(error)),
            };
            if chunk.index > 0 {
                if let Err(error) = self.ensure_not_cancelled() {
                    break Err(at(MigrationPhase::Upload)(error));
                }
            }

            if !chunk.is_empty() {
                self.state = MigrationState::UploadingChunk {
                    journal: journal.uid.clone(),
                    chunk: chunk.index,
                };
                if let Err(error) = self.upload_chunk(&collection, &chunk, &mut handles).await {
                    break Err(at(MigrationPhase::Upload)(error));
                }
                outcome.chunks += 1;
                outcome.revisions += chunk.revisions.len();
                debug!(
                    "Uploaded chunk {} of journal {} ({} revisions)",
                    chunk.index,
                    journal.uid,
                    chunk.revisions.len()
                );
            }

            landed.add(chunk.counters);
            consumed += chunk.entries_consumed;
            on_progress(&MigrationProgress {
                current_journal: position.current_journal,
                total_journals: position.total_journals,
                migrated_entries: position.entries_before + consumed,
                total_entries: position.total_entries,
                journal_uid: journal.uid.clone(),
            });
        };

        // anomalies of chunks that never reached the store stay out of the report
        counters.add(landed);
        if result.is_err() {
            debug!(
                "Journal {} stopped with {:?} counted, {:?} of it uploaded",
                journal.uid,
                chunks.counters(),
                landed
            );
        }
        result?;

        info!(
            "Journal {} migrated: {} revisions in {} chunk(s), {} malformed",
            journal.uid, outcome.revisions, outcome.chunks, landed.malformed
        );
        Ok(JournalResult::Migrated(outcome))
    }

    /// Turn a chunk's pending revisions into item handles and upload them as
    /// one batch. Afterwards `handles` holds the newest handle per uid.
    async fn upload_chunk(
        &mut self,
        collection: &S::Collection,
        chunk: &Chunk,
        handles: &mut HashMap<String, S::Item>,
    ) -> Result<()> {
        let mut batch: Vec<S::Item> = Vec::with_capacity(chunk.revisions.len());
        let mut latest: HashMap<&str, usize> = HashMap::new();

        for pending in &chunk.revisions {
            let revision = &pending.revision;
            let mut item = match pending.base {
                RevisionBase::New => {
                    self.store
                        .create_item(collection, &revision.meta, &revision.content)?
                }
                RevisionBase::CloneOfPending => {
                    let index = latest.get(pending.uid.as_str()).copied().ok_or_else(|| {
                        Error::Store(format!("no pending handle for item {}", pending.uid))
                    })?;
                    self.store.clone_item(&batch[index])
                }
                RevisionBase::Existing => handles.remove(&pending.uid).ok_or_else(|| {
                    Error::Store(format!("no uploaded handle for item {}", pending.uid))
                })?,
            };

            self.store.set_item_content(&mut item, &revision.content);
            self.store.set_item_meta(&mut item, &revision.meta);
            if revision.deleted {
                self.store.delete_item(&mut item);
            }
            latest.insert(pending.uid.as_str(), batch.len());
            batch.push(item);
        }

        self.store.batch_upload(collection, &mut batch).await?;

        for (index, (pending, item)) in chunk.revisions.iter().zip(batch).enumerate() {
            if latest.get(pending.uid.as_str()) == Some(&index) {
                handles.insert(pending.uid.clone(), item);
            }
        }
        Ok(())
    }
}

//! Migration engine: classify, accumulate and upload replayed journals.

mod accumulate;
mod batcher;
mod classify;
mod progress;

#[cfg(test)]
mod tests;

pub use accumulate::{accumulate, Chunk, Chunks, Counters, MtimeClock, RevisionAccumulator};
pub use batcher::{CancelFlag, MigrationOptions, Migrator, DEFAULT_CHUNK_SIZE};
pub use classify::{Classification, ClassifiedEntry, Classifier};
pub use progress::{
    JournalFailure, JournalOutcome, MigrationPhase, MigrationProgress, MigrationReport,
    MigrationState, SkippedJournal,
};

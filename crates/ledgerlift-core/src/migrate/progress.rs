//! Progress events, run state and the final report.

use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use super::accumulate::Counters;
use crate::models::CollectionType;

/// Where the run currently is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationState {
    #[default]
    NotStarted,
    SelectingJournals,
    CreatingCollection {
        journal: String,
    },
    UploadingChunk {
        journal: String,
        chunk: usize,
    },
    LoggedOut,
    Done,
    Failed {
        error: String,
    },
}

impl MigrationState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => f.write_str("not started"),
            Self::SelectingJournals => f.write_str("selecting journals"),
            Self::CreatingCollection { journal } => {
                write!(f, "creating collection for journal {journal}")
            }
            Self::UploadingChunk { journal, chunk } => {
                write!(f, "uploading chunk {} of journal {journal}", chunk + 1)
            }
            Self::LoggedOut => f.write_str("logged out"),
            Self::Done => f.write_str("done"),
            Self::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// Step of a journal's migration in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    Keys,
    CollectionInfo,
    CreatingCollection,
    Replay,
    Upload,
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Keys => "keys",
            Self::CollectionInfo => "collection info",
            Self::CreatingCollection => "creating collection",
            Self::Replay => "replay",
            Self::Upload => "upload",
        };
        f.write_str(label)
    }
}

/// Emitted after every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationProgress {
    /// 1-based position of the journal being migrated
    pub current_journal: usize,
    pub total_journals: usize,
    pub migrated_entries: usize,
    pub total_entries: usize,
    pub journal_uid: String,
}

impl MigrationProgress {
    #[must_use]
    pub fn status_line(&self) -> String {
        format!(
            "Migrating collection {}/{}: {}/{} entries",
            self.current_journal, self.total_journals, self.migrated_entries, self.total_entries
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalOutcome {
    pub journal_uid: String,
    pub collection_type: CollectionType,
    pub collection_name: String,
    pub entries: usize,
    pub revisions: usize,
    /// Non-empty chunks uploaded
    pub chunks: usize,
    /// Migrated contents-only from a shared journal
    pub shared: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedJournal {
    pub journal_uid: String,
    /// Collection type tag that was not recognized
    pub collection_type: String,
}

/// A journal that was aborted; chunks uploaded before the failure remain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalFailure {
    pub journal_uid: String,
    pub phase: MigrationPhase,
    pub error: String,
}

/// Terminal summary of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub migrated: Vec<JournalOutcome>,
    pub skipped: Vec<SkippedJournal>,
    pub failures: Vec<JournalFailure>,
    pub counters: Counters,
    pub state: MigrationState,
}

impl MigrationReport {
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    #[must_use]
    pub fn total_revisions(&self) -> usize {
        self.migrated.iter().map(|outcome| outcome.revisions).sum()
    }

    /// Human-readable multi-line summary.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Migrated {} collection(s), {} revision(s)",
            self.migrated.len(),
            self.total_revisions()
        );
        for outcome in &self.migrated {
            let shared = if outcome.shared { " (shared, contents only)" } else { "" };
            let _ = writeln!(
                out,
                "  {} [{}] {}: {} entries, {} revisions, {} chunk(s){}",
                outcome.journal_uid,
                outcome.collection_type,
                outcome.collection_name,
                outcome.entries,
                outcome.revisions,
                outcome.chunks,
                shared
            );
        }
        for skipped in &self.skipped {
            let _ = writeln!(
                out,
                "  skipped {}: unsupported type '{}'",
                skipped.journal_uid, skipped.collection_type
            );
        }
        for failure in &self.failures {
            let _ = writeln!(
                out,
                "  failed {} during {}: {}",
                failure.journal_uid, failure.phase, failure.error
            );
        }
        let _ = writeln!(
            out,
            "Malformed entries: {}, bad mtimes: {}, ignored deletes: {}",
            self.counters.malformed, self.counters.bad_mtime, self.counters.ignored_deletes
        );
        let _ = write!(out, "State: {}", self.state);
        out
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn status_line_shows_positions() {
        let progress = MigrationProgress {
            current_journal: 2,
            total_journals: 3,
            migrated_entries: 40,
            total_entries: 90,
            journal_uid: "j2".into(),
        };
        assert_eq!(
            progress.status_line(),
            "Migrating collection 2/3: 40/90 entries"
        );
    }

    #[test]
    fn render_text_lists_failures_and_counters() {
        let report = MigrationReport {
            migrated: vec![JournalOutcome {
                journal_uid: "j1".into(),
                collection_type: CollectionType::Calendar,
                collection_name: "Work".into(),
                entries: 3,
                revisions: 3,
                chunks: 1,
                shared: false,
            }],
            skipped: vec![],
            failures: vec![JournalFailure {
                journal_uid: "j2".into(),
                phase: MigrationPhase::Replay,
                error: "broken".into(),
            }],
            counters: Counters {
                malformed: 1,
                bad_mtime: 2,
                ignored_deletes: 0,
            },
            state: MigrationState::Done,
        };

        let text = report.render_text();
        assert!(report.has_failures());
        assert!(text.contains("j1 [calendar] Work: 3 entries, 3 revisions, 1 chunk(s)"));
        assert!(text.contains("failed j2 during replay: broken"));
        assert!(text.contains("Malformed entries: 1, bad mtimes: 2, ignored deletes: 0"));
        assert!(text.ends_with("State: done"));
    }

    #[test]
    fn state_serializes_with_tag() {
        let json = serde_json::to_string(&MigrationState::UploadingChunk {
            journal: "j".into(),
            chunk: 0,
        })
        .unwrap();
        assert_eq!(json, r#"{"state":"uploading_chunk","journal":"j","chunk":0}"#);
    }
}

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] ledgerlift_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to read export at {path}: {reason}")]
    Export { path: String, reason: String },
    #[error("No derived key provided. Pass --derived-key or set LEDGERLIFT_DERIVED_KEY.")]
    MissingDerivedKey,
    #[error("No server URL provided. Pass a URL or set server_url in the config file.")]
    MissingServerUrl,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{0} journal(s) failed to migrate")]
    JournalsFailed(usize),
}

impl CliError {
    /// Process exit code for this error.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::JournalsFailed(_) => 2,
            _ => 1,
        }
    }
}

//! Migration configuration file.
//!
//! A small JSON document holding defaults the CLI flags can override. A
//! missing file is not an error; the defaults apply.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::migrate::{MigrationOptions, DEFAULT_CHUNK_SIZE};
use crate::util::{is_http_url, normalize_text_option};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MigrationConfig {
    /// Revisions per uploaded batch
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// libSQL database receiving migrated collections
    #[serde(default)]
    pub destination_db: Option<PathBuf>,
    /// Destination server, checked with `probe`
    #[serde(default)]
    pub server_url: Option<String>,
}

const fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            destination_db: None,
            server_url: None,
        }
    }
}

impl MigrationConfig {
    /// Parse and validate a config document.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut config = serde_json::from_str::<Self>(raw)
            .map_err(|error| Error::Config(format!("invalid config JSON: {error}")))?;
        config.server_url = normalize_text_option(config.server_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw).map_err(|error| match error {
            Error::Config(message) => Error::Config(format!("{}: {message}", path.display())),
            other => other,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".into()));
        }
        if let Some(url) = &self.server_url {
            if !is_http_url(url) {
                return Err(Error::Config(
                    "server_url must include http:// or https://".into(),
                ));
            }
        }
        Ok(())
    }

    /// Options for a run over `journals` (empty selects all).
    #[must_use]
    pub fn migration_options(&self, journals: Vec<String>) -> MigrationOptions {
        MigrationOptions {
            chunk_size: self.chunk_size,
            journals,
        }
    }
}

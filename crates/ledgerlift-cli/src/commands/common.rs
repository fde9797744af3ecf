use std::env;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use ledgerlift_core::config::MigrationConfig;
use ledgerlift_core::crypto::DerivedKey;
use ledgerlift_core::util::normalize_text_option;
use ledgerlift_core::{LegacyExport, MigrationOptions};

use crate::error::CliError;

pub const DERIVED_KEY_ENV: &str = "LEDGERLIFT_DERIVED_KEY";
pub const DESTINATION_ENV: &str = "LEDGERLIFT_DESTINATION";

const CONFIG_FILE_NAME: &str = "config.json";
const DESTINATION_FILE_NAME: &str = "destination.db";

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ledgerlift")
        .join(CONFIG_FILE_NAME)
}

pub fn default_destination_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ledgerlift")
        .join(DESTINATION_FILE_NAME)
}

pub fn load_config(explicit: Option<&Path>) -> Result<MigrationConfig, CliError> {
    let path = explicit.map_or_else(default_config_path, Path::to_path_buf);
    Ok(MigrationConfig::load_from_path(&path)?)
}

pub fn load_export(path: &Path) -> Result<LegacyExport, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|error| CliError::Export {
        path: path.display().to_string(),
        reason: error.to_string(),
    })?;
    LegacyExport::from_json(&raw).map_err(|error| CliError::Export {
        path: path.display().to_string(),
        reason: error.to_string(),
    })
}

/// Pick the derived key from the flag, then the environment.
pub fn resolve_derived_key(
    explicit: Option<String>,
    from_env: Option<String>,
) -> Result<DerivedKey, CliError> {
    let value = normalize_text_option(explicit)
        .or_else(|| normalize_text_option(from_env))
        .ok_or(CliError::MissingDerivedKey)?;
    Ok(DerivedKey::from_hex(&value)?)
}

pub fn derived_key_from_env() -> Option<String> {
    env::var(DERIVED_KEY_ENV).ok()
}

/// Flag, then environment, then config file, then the data directory.
pub fn resolve_destination(explicit: Option<PathBuf>, config: &MigrationConfig) -> PathBuf {
    explicit
        .or_else(|| env::var_os(DESTINATION_ENV).map(PathBuf::from))
        .or_else(|| config.destination_db.clone())
        .unwrap_or_else(default_destination_path)
}

/// Merge flag overrides into the configured options.
pub fn resolve_options(
    config: &MigrationConfig,
    chunk_size: Option<usize>,
    journals: Vec<String>,
) -> Result<MigrationOptions, CliError> {
    let mut config = config.clone();
    if let Some(chunk_size) = chunk_size {
        config.chunk_size = chunk_size;
    }
    config.validate()?;
    let journals = journals
        .into_iter()
        .filter_map(|uid| normalize_text_option(Some(uid)))
        .collect();
    Ok(config.migration_options(journals))
}

/// Render a Unix-ms timestamp as a UTC label.
pub fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |datetime| datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn short_uid(uid: &str) -> &str {
    uid.get(..12).unwrap_or(uid)
}

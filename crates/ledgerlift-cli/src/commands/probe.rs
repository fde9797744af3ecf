use ledgerlift_core::api::probe_server;
use ledgerlift_core::config::MigrationConfig;
use ledgerlift_core::util::normalize_text_option;

use crate::error::CliError;

pub async fn run_probe(url: Option<String>, config: &MigrationConfig) -> Result<(), CliError> {
    let url = resolve_server_url(url, config)?;
    probe_server(&url).await?;
    println!("{url} hosts a supported server");
    Ok(())
}

pub fn resolve_server_url(
    explicit: Option<String>,
    config: &MigrationConfig,
) -> Result<String, CliError> {
    normalize_text_option(explicit)
        .or_else(|| config.server_url.clone())
        .map(|url| url.trim_end_matches('/').to_string())
        .ok_or(CliError::MissingServerUrl)
}

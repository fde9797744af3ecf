use std::path::Path;

use ledgerlift_core::crypto::{ChainCrypto, KeyMaterial};
use ledgerlift_core::journal::replay;
use ledgerlift_core::{Journal, LegacyExport};
use serde::Serialize;

use crate::commands::common::{derived_key_from_env, load_export, resolve_derived_key, short_uid};
use crate::error::CliError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalSummary {
    pub uid: String,
    pub version: u8,
    pub owner: String,
    pub entries: usize,
    pub shared: bool,
    pub collection_type: Option<String>,
    pub name: Option<String>,
    /// Entries that decrypted and decoded; `None` without a key
    pub readable_entries: Option<usize>,
    pub broken_at: Option<String>,
    pub error: Option<String>,
}

pub fn run_inspect(export_path: &Path, derived_key: Option<String>, as_json: bool) -> Result<(), CliError> {
    let export = load_export(export_path)?;
    let key = derived_key.or_else(derived_key_from_env);
    let material = match key {
        Some(key) => Some(KeyMaterial::unlock(
            resolve_derived_key(Some(key), None)?,
            &export.user_info,
        )?),
        None => None,
    };

    let summaries = inspect_export(&export, material.as_ref());
    if as_json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        println!("Account {}: {} journal(s)", export.user_info.owner, summaries.len());
        for line in format_journal_lines(&summaries) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn inspect_export(export: &LegacyExport, material: Option<&KeyMaterial>) -> Vec<JournalSummary> {
    export
        .journals
        .iter()
        .map(|journal| summarize(journal, &export.user_info.owner, material))
        .collect()
}

fn summarize(journal: &Journal, account_owner: &str, material: Option<&KeyMaterial>) -> JournalSummary {
    let mut summary = JournalSummary {
        uid: journal.uid.clone(),
        version: journal.version,
        owner: journal.owner.clone(),
        entries: journal.entries.len(),
        shared: journal.is_shared_with(account_owner),
        collection_type: None,
        name: None,
        readable_entries: None,
        broken_at: None,
        error: None,
    };
    let Some(material) = material else {
        return summary;
    };

    let crypto = match ChainCrypto::for_journal(material, journal) {
        Ok(crypto) => crypto,
        Err(error) => {
            summary.error = Some(error.to_string());
            return summary;
        }
    };
    match crypto.decrypt_info(&journal.content) {
        Ok(info) => {
            summary.collection_type = Some(info.collection_type);
            summary.name = Some(info.display_name);
        }
        Err(error) => summary.error = Some(error.to_string()),
    }

    let mut entries = replay(&crypto, &journal.entries);
    let readable = entries.by_ref().filter(Result::is_ok).count();
    summary.readable_entries = Some(readable);
    summary.broken_at = entries.broken_at().map(str::to_string);
    summary
}

pub fn format_journal_lines(summaries: &[JournalSummary]) -> Vec<String> {
    summaries
        .iter()
        .map(|summary| {
            let mut line = format!(
                "{}  v{}  {} entries",
                summary.uid, summary.version, summary.entries
            );
            if summary.shared {
                line.push_str(&format!("  shared by {}", summary.owner));
            }
            if let (Some(kind), Some(name)) = (&summary.collection_type, &summary.name) {
                line.push_str(&format!("  [{kind}] {name}"));
            }
            match (&summary.error, &summary.broken_at, summary.readable_entries) {
                (Some(error), _, _) => line.push_str(&format!("  error: {error}")),
                (None, Some(entry), _) => {
                    line.push_str(&format!("  chain broken at {}", short_uid(entry)));
                }
                (None, None, Some(readable)) if readable < summary.entries => {
                    line.push_str(&format!(
                        "  {} unreadable entries",
                        summary.entries - readable
                    ));
                }
                (None, None, Some(_)) => line.push_str("  chain ok"),
                (None, None, None) => {}
            }
            line
        })
        .collect()
}

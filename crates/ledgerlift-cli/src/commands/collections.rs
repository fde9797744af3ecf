use std::path::Path;

use ledgerlift_core::store::{CollectionSummary, LibSqlStore};

use crate::commands::common::format_timestamp;
use crate::error::CliError;

pub async fn run_collections(destination: &Path, as_json: bool) -> Result<(), CliError> {
    if !destination.exists() {
        return Err(CliError::Config(format!(
            "no destination database at {}",
            destination.display()
        )));
    }
    let store = LibSqlStore::open(destination).await?;
    let collections = store.list_collections().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&collections)?);
    } else if collections.is_empty() {
        println!("No collections in {}", destination.display());
    } else {
        for line in format_collection_lines(&collections) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_collection_lines(collections: &[CollectionSummary]) -> Vec<String> {
    collections
        .iter()
        .map(|collection| {
            let deleted = if collection.deleted_items > 0 {
                format!(" ({} deleted)", collection.deleted_items)
            } else {
                String::new()
            };
            format!(
                "{}  [{}] {}  {} items{}  created {}",
                collection.uid,
                collection.meta.collection_type,
                collection.meta.name,
                collection.items,
                deleted,
                format_timestamp(collection.meta.mtime)
            )
        })
        .collect()
}

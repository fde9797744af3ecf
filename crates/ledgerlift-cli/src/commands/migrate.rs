use std::path::{Path, PathBuf};

use ledgerlift_core::crypto::DerivedKey;
use ledgerlift_core::migrate::{CancelFlag, MigrationProgress};
use ledgerlift_core::store::{DestinationStore, LibSqlStore, MemoryStore};
use ledgerlift_core::{LegacyExport, MigrationOptions, MigrationReport, Migrator};

use crate::commands::common::{
    derived_key_from_env, load_config, load_export, resolve_derived_key, resolve_destination,
    resolve_options,
};
use crate::error::CliError;

pub struct MigrateArgs {
    pub export: PathBuf,
    pub derived_key: Option<String>,
    pub destination: Option<PathBuf>,
    pub chunk_size: Option<usize>,
    pub journals: Vec<String>,
    pub dry_run: bool,
    pub json: bool,
}

pub async fn run_migrate(args: MigrateArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let export = load_export(&args.export)?;
    let derived_key = resolve_derived_key(args.derived_key, derived_key_from_env())?;
    let options = resolve_options(&config, args.chunk_size, args.journals)?;

    let cancel = CancelFlag::new();
    watch_ctrl_c(cancel.clone());

    let report = if args.dry_run {
        tracing::info!("Dry run: nothing will be written");
        migrate_with(MemoryStore::new(), options, cancel, derived_key, &export).await?
    } else {
        let path = resolve_destination(args.destination, &config);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        tracing::info!("Writing collections to {}", path.display());
        let store = LibSqlStore::open(&path).await?;
        migrate_with(store, options, cancel, derived_key, &export).await?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.render_text());
    }

    if report.has_failures() {
        return Err(CliError::JournalsFailed(report.failures.len()));
    }
    Ok(())
}

pub async fn migrate_with<S: DestinationStore>(
    store: S,
    options: MigrationOptions,
    cancel: CancelFlag,
    derived_key: DerivedKey,
    export: &LegacyExport,
) -> Result<MigrationReport, CliError> {
    let mut migrator = Migrator::new(store, options).with_cancel_flag(cancel);
    Ok(migrator
        .migrate_export(derived_key, export, print_progress)
        .await?)
}

fn print_progress(progress: &MigrationProgress) {
    eprintln!("{}", progress.status_line());
}

fn watch_ctrl_c(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; stopping after the current chunk");
            cancel.cancel();
        }
    });
}

use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use ledgerlift_core::config::MigrationConfig;
use ledgerlift_core::crypto::{ChainCrypto, DerivedKey, KeyMaterial, KeyPair};
use ledgerlift_core::journal::JournalWriter;
use ledgerlift_core::migrate::CancelFlag;
use ledgerlift_core::models::CollectionInfo;
use ledgerlift_core::store::LibSqlStore;
use ledgerlift_core::{LegacyExport, MigrationOptions, SyncAction, SyncEntry};
use pretty_assertions::assert_eq;

use crate::cli::{Cli, Commands, CompletionShell};
use crate::commands::collections::format_collection_lines;
use crate::commands::common::{
    format_timestamp, load_export, resolve_derived_key, resolve_destination, resolve_options,
    short_uid,
};
use crate::commands::completions::render_completions;
use crate::commands::inspect::{format_journal_lines, inspect_export};
use crate::commands::migrate::migrate_with;
use crate::commands::probe::resolve_server_url;
use crate::error::CliError;

const KEY_HEX: &str = "2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a";

fn fixture_export() -> (LegacyExport, KeyMaterial) {
    let derived = DerivedKey::from_bytes([42; 32]);
    let user_info = KeyMaterial::seal_user_info(&derived, "alice", 1, &KeyPair::generate()).unwrap();
    let material = KeyMaterial::unlock(derived.clone(), &user_info).unwrap();

    let mut writer = JournalWriter::new(ChainCrypto::derive("journal-one", 2, &derived).unwrap());
    for (uid, name) in [("A", "Ada"), ("B", "Bea")] {
        let card = format!("BEGIN:VCARD\r\nVERSION:3.0\r\nUID:{uid}\r\nFN:{name}\r\nEND:VCARD\r\n");
        writer
            .append(&SyncEntry::new(SyncAction::Create, card))
            .unwrap();
    }
    let journal = writer
        .finish(
            "alice",
            &CollectionInfo {
                collection_type: "ADDRESS_BOOK".into(),
                display_name: "Friends".into(),
                description: String::new(),
                color: None,
            },
        )
        .unwrap();

    let export = LegacyExport {
        user_info,
        journals: vec![journal],
    };
    (export, material)
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn migrate_arguments_parse() {
    let cli = Cli::try_parse_from([
        "ledgerlift",
        "migrate",
        "export.json",
        "--journal",
        "a",
        "--journal",
        "b",
        "--chunk-size",
        "5",
        "--dry-run",
    ])
    .unwrap();

    match cli.command {
        Commands::Migrate {
            export,
            journals,
            chunk_size,
            dry_run,
            json,
            ..
        } => {
            assert_eq!(export, PathBuf::from("export.json"));
            assert_eq!(journals, vec!["a".to_string(), "b".to_string()]);
            assert_eq!(chunk_size, Some(5));
            assert!(dry_run);
            assert!(!json);
        }
        _ => panic!("expected migrate command"),
    }
}

#[test]
fn explicit_derived_key_wins_over_environment() {
    assert!(resolve_derived_key(Some(KEY_HEX.into()), Some("zz".into())).is_ok());
    assert!(resolve_derived_key(None, Some(KEY_HEX.into())).is_ok());
    assert!(matches!(
        resolve_derived_key(Some("  ".into()), None),
        Err(CliError::MissingDerivedKey)
    ));
    assert!(matches!(
        resolve_derived_key(Some("abc".into()), None),
        Err(CliError::Core(ledgerlift_core::Error::InvalidInput(_)))
    ));
}

#[test]
fn flag_overrides_configured_chunk_size() {
    let config = MigrationConfig::default();
    let options = resolve_options(&config, Some(3), vec![" j1 ".into(), "  ".into()]).unwrap();
    assert_eq!(options.chunk_size, 3);
    assert_eq!(options.journals, vec!["j1".to_string()]);

    assert!(matches!(
        resolve_options(&config, Some(0), Vec::new()),
        Err(CliError::Core(ledgerlift_core::Error::Config(_)))
    ));
}

#[test]
fn explicit_destination_wins() {
    let config = MigrationConfig {
        destination_db: Some(PathBuf::from("/tmp/configured.db")),
        ..Default::default()
    };
    assert_eq!(
        resolve_destination(Some(PathBuf::from("flag.db")), &config),
        PathBuf::from("flag.db")
    );
}

#[test]
fn server_url_falls_back_to_config() {
    let config = MigrationConfig {
        server_url: Some("https://etesync.example.com".into()),
        ..Default::default()
    };
    assert_eq!(
        resolve_server_url(Some("https://other.example.com/".into()), &config).unwrap(),
        "https://other.example.com"
    );
    assert_eq!(
        resolve_server_url(None, &config).unwrap(),
        "https://etesync.example.com"
    );
    assert!(matches!(
        resolve_server_url(None, &MigrationConfig::default()),
        Err(CliError::MissingServerUrl)
    ));
}

#[test]
fn format_timestamp_returns_utc_label() {
    assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
    assert_eq!(format_timestamp(1_577_934_245_000), "2020-01-02 03:04:05 UTC");
}

#[test]
fn short_uid_handles_short_values() {
    assert_eq!(short_uid("0123456789abcdef"), "0123456789ab");
    assert_eq!(short_uid("abc"), "abc");
}

#[test]
fn journal_failures_exit_with_two() {
    assert_eq!(CliError::JournalsFailed(1).exit_code(), 2);
    assert_eq!(CliError::MissingDerivedKey.exit_code(), 1);
}

#[test]
fn completions_name_the_binary() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("ledgerlift"));
}

#[test]
fn load_export_reads_json_and_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let (export, _) = fixture_export();
    let path = dir.path().join("export.json");
    std::fs::write(&path, serde_json::to_string(&export).unwrap()).unwrap();
    assert_eq!(load_export(&path).unwrap(), export);

    let missing = dir.path().join("missing.json");
    let error = load_export(&missing).unwrap_err();
    assert!(error.to_string().contains("missing.json"));
}

#[test]
fn inspect_without_key_shows_metadata_only() {
    let (export, _) = fixture_export();
    let summaries = inspect_export(&export, None);
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].entries, 2);
    assert_eq!(summaries[0].readable_entries, None);
    assert_eq!(
        format_journal_lines(&summaries),
        vec!["journal-one  v2  2 entries".to_string()]
    );
}

#[test]
fn inspect_with_key_checks_the_chain() {
    let (mut export, material) = fixture_export();
    let summaries = inspect_export(&export, Some(&material));
    assert_eq!(summaries[0].collection_type.as_deref(), Some("ADDRESS_BOOK"));
    assert_eq!(summaries[0].readable_entries, Some(2));
    assert!(format_journal_lines(&summaries)[0].ends_with("[ADDRESS_BOOK] Friends  chain ok"));

    export.journals[0].entries.swap(0, 1);
    let summaries = inspect_export(&export, Some(&material));
    assert_eq!(summaries[0].readable_entries, Some(0));
    assert!(summaries[0].broken_at.is_some());
    assert!(format_journal_lines(&summaries)[0].contains("chain broken at"));
}

#[tokio::test(flavor = "multi_thread")]
async fn migrated_collections_are_listed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("destination.db");
    let (export, _) = fixture_export();

    let store = LibSqlStore::open(&path).await.unwrap();
    let report = migrate_with(
        store,
        MigrationOptions::default(),
        CancelFlag::new(),
        DerivedKey::from_hex(KEY_HEX).unwrap(),
        &export,
    )
    .await
    .unwrap();
    assert_eq!(report.total_revisions(), 2);

    let store = LibSqlStore::open(&path).await.unwrap();
    let collections = store.list_collections().await.unwrap();
    let lines = format_collection_lines(&collections);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("[address-book] Friends  2 items"));
}

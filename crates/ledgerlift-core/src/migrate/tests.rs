use pretty_assertions::assert_eq;

use super::*;
use crate::crypto::{ChainCrypto, DerivedKey, KeyMaterial, KeyPair};
use crate::error::Error;
use crate::journal::JournalWriter;
use crate::models::{CollectionInfo, CollectionType, Journal, LegacyExport, SyncAction, SyncEntry, UserInfo};
use crate::store::{LibSqlStore, MemoryStore};

const DERIVED: [u8; 32] = [42; 32];

struct Account {
    user_info: UserInfo,
    material: KeyMaterial,
}

fn account(owner: &str) -> Account {
    let derived = DerivedKey::from_bytes(DERIVED);
    let user_info = KeyMaterial::seal_user_info(&derived, owner, 1, &KeyPair::generate()).unwrap();
    let material = KeyMaterial::unlock(derived, &user_info).unwrap();
    Account {
        user_info,
        material,
    }
}

fn vcard(uid: Option<&str>, rev: Option<&str>, name: &str) -> String {
    let mut card = String::from("BEGIN:VCARD\r\nVERSION:3.0\r\n");
    if let Some(uid) = uid {
        card.push_str(&format!("UID:{uid}\r\n"));
    }
    if let Some(rev) = rev {
        card.push_str(&format!("REV:{rev}\r\n"));
    }
    card.push_str(&format!("FN:{name}\r\nEND:VCARD\r\n"));
    card
}

fn info(tag: &str, name: &str) -> CollectionInfo {
    CollectionInfo {
        collection_type: tag.into(),
        display_name: name.into(),
        description: String::new(),
        color: None,
    }
}

fn writer(uid: &str) -> JournalWriter {
    let crypto = ChainCrypto::derive(uid, 2, &DerivedKey::from_bytes(DERIVED)).unwrap();
    JournalWriter::new(crypto)
}

fn contacts(account: &Account, uid: &str, entries: &[SyncEntry]) -> Journal {
    let mut writer = writer(uid);
    for entry in entries {
        writer.append(entry).unwrap();
    }
    writer
        .finish(account.material.owner(), &info("ADDRESS_BOOK", "Contacts"))
        .unwrap()
}

fn create(uid: &str, name: &str) -> SyncEntry {
    SyncEntry::new(
        SyncAction::Create,
        vcard(Some(uid), Some("20200101T000000Z"), name),
    )
}

async fn migrate(
    account: &Account,
    journals: &[Journal],
    options: MigrationOptions,
) -> (Result<MigrationReport, Error>, Migrator<MemoryStore>) {
    let mut migrator = Migrator::new(MemoryStore::new(), options);
    let result = migrator.run(&account.material, journals, |_| {}).await;
    (result, migrator)
}

#[tokio::test]
async fn create_update_delete_yields_one_chunk_with_tombstone() {
    let account = account("alice");
    let journal = contacts(
        &account,
        "j1",
        &[
            SyncEntry::new(
                SyncAction::Create,
                vcard(Some("A"), Some("20200101T000000Z"), "t1"),
            ),
            SyncEntry::new(
                SyncAction::Update,
                vcard(Some("A"), Some("20200102T000000Z"), "c2"),
            ),
            SyncEntry::new(
                SyncAction::Delete,
                vcard(Some("A"), Some("20200103T000000Z"), "c2"),
            ),
        ],
    );

    let (result, migrator) = migrate(&account, &[journal], MigrationOptions::default()).await;
    let report = result.unwrap();
    let store = migrator.store();

    assert_eq!(store.batches().len(), 1);
    assert_eq!(store.batches()[0].items.len(), 3);
    assert_eq!(store.clone_count(), 2);

    let collection = &store.collections()[0];
    let items = store.items(&collection.uid);
    assert_eq!(items.len(), 1);
    assert!(items[0].content.contains("FN:c2"));
    assert!(items[0].deleted);

    assert_eq!(report.counters, Counters::default());
    assert_eq!(report.migrated[0].revisions, 3);
    assert_eq!(report.migrated[0].chunks, 1);
    assert_eq!(report.state, MigrationState::Done);
    assert_eq!(migrator.state(), &MigrationState::Done);
    assert!(store.is_logged_out());
}

#[tokio::test]
async fn entry_without_uid_is_counted_once() {
    let account = account("alice");
    let journal = contacts(
        &account,
        "j1",
        &[
            create("A", "a"),
            SyncEntry::new(SyncAction::Create, vcard(None, None, "anonymous")),
            create("B", "b"),
        ],
    );

    let (result, migrator) = migrate(&account, &[journal], MigrationOptions::default()).await;
    let report = result.unwrap();
    let store = migrator.store();

    assert_eq!(report.counters.malformed, 1);
    assert_eq!(store.items(&store.collections()[0].uid).len(), 2);
}

#[tokio::test]
async fn broken_chain_fails_journal_but_keeps_uploaded_chunks() {
    let account = account("alice");
    let mut writer = writer("j1");
    writer.append(&create("A", "a")).unwrap();
    let payload = create("B", "b").encode().unwrap();
    let orphan = writer.crypto().encrypt_entry(Some("feed"), &payload).unwrap();
    let mut journal = writer
        .finish("alice", &info("ADDRESS_BOOK", "Contacts"))
        .unwrap();
    journal.entries.push(orphan);

    let options = MigrationOptions::default().with_chunk_size(1);
    let (result, migrator) = migrate(&account, &[journal], options).await;
    let report = result.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].phase, MigrationPhase::Replay);
    assert!(report.failures[0].error.contains("Chain integrity"));
    assert!(report.migrated.is_empty());
    assert_eq!(migrator.store().batches().len(), 1);
    assert_eq!(report.state, MigrationState::Done);
}

fn journal_broken_after(account: &Account, uid: &str, entries: &[SyncEntry]) -> Journal {
    let mut writer = writer(uid);
    for entry in entries {
        writer.append(entry).unwrap();
    }
    let payload = create("Z", "z").encode().unwrap();
    let orphan = writer.crypto().encrypt_entry(Some("feed"), &payload).unwrap();
    let mut journal = writer
        .finish(account.material.owner(), &info("ADDRESS_BOOK", "Contacts"))
        .unwrap();
    journal.entries.push(orphan);
    journal
}

#[tokio::test]
async fn revisions_before_a_break_in_the_same_chunk_are_uploaded() {
    let account = account("alice");
    let journal = journal_broken_after(
        &account,
        "j1",
        &[
            SyncEntry::new(SyncAction::Create, vcard(Some("A"), None, "a")),
            SyncEntry::new(SyncAction::Create, vcard(None, None, "anonymous")),
        ],
    );

    let (result, migrator) = migrate(&account, &[journal], MigrationOptions::default()).await;
    let report = result.unwrap();
    let store = migrator.store();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].phase, MigrationPhase::Replay);
    assert_eq!(store.batches().len(), 1);
    let items = store.items(&store.collections()[0].uid);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].meta.name, "A");
    assert_eq!(
        report.counters,
        Counters {
            malformed: 1,
            bad_mtime: 1,
            ignored_deletes: 0,
        }
    );
}

#[tokio::test]
async fn counters_of_a_chunk_that_failed_to_upload_are_not_reported() {
    let account = account("alice");
    let journal = contacts(
        &account,
        "j1",
        &[
            SyncEntry::new(SyncAction::Create, vcard(Some("A"), None, "a")),
            SyncEntry::new(SyncAction::Create, vcard(None, None, "anonymous")),
        ],
    );

    let store = MemoryStore::new().fail_batch_with(0, Error::Store("disk full".into()));
    let mut migrator = Migrator::new(store, MigrationOptions::default());
    let report = migrator
        .run(&account.material, &[journal], |_| {})
        .await
        .unwrap();

    assert_eq!(report.failures[0].phase, MigrationPhase::Upload);
    assert!(migrator.store().batches().is_empty());
    assert_eq!(report.counters, Counters::default());
}

#[tokio::test]
async fn batches_are_ceiling_of_revisions_over_chunk_size() {
    let account = account("alice");
    let entries: Vec<_> = (0..45)
        .map(|n| create(&format!("uid-{n:02}"), "x"))
        .collect();
    let journal = contacts(&account, "j1", &entries);

    let (result, migrator) = migrate(&account, &[journal], MigrationOptions::default()).await;
    let report = result.unwrap();
    let batches = migrator.store().batches();

    assert_eq!(batches.len(), 3);
    assert_eq!(report.migrated[0].chunks, 3);
    let names: Vec<_> = batches
        .iter()
        .flat_map(|batch| batch.items.iter().map(|item| item.meta.name.clone()))
        .collect();
    let expected: Vec<_> = (0..45).map(|n| format!("uid-{n:02}")).collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn later_chunks_reuse_uploaded_handles() {
    let account = account("alice");
    let journal = contacts(
        &account,
        "j1",
        &[
            create("A", "one"),
            SyncEntry::new(
                SyncAction::Update,
                vcard(Some("A"), Some("20200105T000000Z"), "two"),
            ),
        ],
    );

    let options = MigrationOptions::default().with_chunk_size(1);
    let (result, migrator) = migrate(&account, &[journal], options).await;
    result.unwrap();
    let store = migrator.store();

    assert_eq!(store.batches().len(), 2);
    assert_eq!(store.clone_count(), 0);
    let first = &store.batches()[0].items[0];
    let second = &store.batches()[1].items[0];
    assert_eq!(first.uid, second.uid);
    assert_ne!(first.etag, second.etag);
}

#[tokio::test]
async fn wrong_derived_key_fails_before_any_write() {
    let account = account("alice");
    let export = LegacyExport {
        user_info: account.user_info.clone(),
        journals: vec![contacts(&account, "j1", &[create("A", "a")])],
    };

    let mut migrator = Migrator::new(MemoryStore::new(), MigrationOptions::default());
    let error = migrator
        .migrate_export(DerivedKey::from_bytes([1; 32]), &export, |_| {})
        .await
        .unwrap_err();

    assert!(matches!(error, Error::Authentication(_)));
    assert!(matches!(migrator.state(), MigrationState::Failed { .. }));
    assert!(migrator.store().collections().is_empty());
}

#[tokio::test]
async fn migrate_export_unlocks_with_right_key() {
    let account = account("alice");
    let export = LegacyExport {
        user_info: account.user_info.clone(),
        journals: vec![contacts(&account, "j1", &[create("A", "a")])],
    };

    let mut migrator = Migrator::new(MemoryStore::new(), MigrationOptions::default());
    let report = migrator
        .migrate_export(DerivedKey::from_bytes(DERIVED), &export, |_| {})
        .await
        .unwrap();
    assert_eq!(report.migrated.len(), 1);
}

#[tokio::test]
async fn unknown_collection_type_is_skipped_without_counters() {
    let account = account("alice");
    let mut writer = writer("notes");
    writer
        .append(&SyncEntry::new(SyncAction::Create, "not a vcard"))
        .unwrap();
    let journal = writer.finish("alice", &info("NOTES", "Notes")).unwrap();

    let (result, migrator) = migrate(&account, &[journal], MigrationOptions::default()).await;
    let report = result.unwrap();

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].collection_type, "NOTES");
    assert_eq!(report.counters, Counters::default());
    assert!(migrator.store().collections().is_empty());
}

#[tokio::test]
async fn shared_journal_is_migrated_contents_only() {
    let account = account("bob");
    let sharer = KeyPair::generate();
    let crypto = ChainCrypto::derive("shared", 2, &DerivedKey::from_bytes([9; 32])).unwrap();
    let mut writer = JournalWriter::new(crypto);
    writer.append(&create("A", "a")).unwrap();
    let journal = writer
        .finish_shared(
            &sharer,
            "alice",
            &account.user_info,
            &info("ADDRESS_BOOK", "Shared"),
        )
        .unwrap();

    let (result, migrator) = migrate(&account, &[journal], MigrationOptions::default()).await;
    let report = result.unwrap();

    assert!(report.migrated[0].shared);
    assert_eq!(migrator.store().collections()[0].meta.name, "Shared");
}

#[tokio::test]
async fn failing_journal_does_not_stop_the_next() {
    let account = account("alice");
    let mut broken = contacts(&account, "broken", &[create("A", "a"), create("B", "b")]);
    broken.entries.swap(0, 1);
    let healthy = contacts(&account, "healthy", &[create("C", "c")]);

    let (result, migrator) =
        migrate(&account, &[broken, healthy], MigrationOptions::default()).await;
    let report = result.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].journal_uid, "broken");
    assert_eq!(report.migrated.len(), 1);
    assert_eq!(report.migrated[0].journal_uid, "healthy");
    // the broken journal's collection was created before replay started
    assert_eq!(migrator.store().collections().len(), 2);
}

#[tokio::test]
async fn upload_failure_is_isolated_to_its_journal() {
    let account = account("alice");
    let first = contacts(&account, "first", &[create("A", "a")]);
    let second = contacts(&account, "second", &[create("B", "b")]);

    let store = MemoryStore::new().fail_batch_with(0, Error::Store("disk full".into()));
    let mut migrator = Migrator::new(store, MigrationOptions::default());
    let report = migrator
        .run(&account.material, &[first, second], |_| {})
        .await
        .unwrap();

    assert_eq!(report.failures[0].phase, MigrationPhase::Upload);
    assert_eq!(report.migrated.len(), 1);
}

#[tokio::test]
async fn account_level_error_aborts_the_run() {
    let account = account("alice");
    let first = contacts(&account, "first", &[create("A", "a")]);
    let second = contacts(&account, "second", &[create("B", "b")]);

    let store = MemoryStore::new().fail_batch_with(0, Error::Unauthorized);
    let mut migrator = Migrator::new(store, MigrationOptions::default());
    let error = migrator
        .run(&account.material, &[first, second], |_| {})
        .await
        .unwrap_err();

    assert!(matches!(error, Error::Unauthorized));
    assert!(matches!(migrator.state(), MigrationState::Failed { .. }));
    assert_eq!(migrator.store().collections().len(), 1);
}

#[tokio::test]
async fn cancellation_is_honored_between_chunks() {
    let account = account("alice");
    let journal = contacts(
        &account,
        "j1",
        &[create("A", "a"), create("B", "b"), create("C", "c")],
    );

    let mut migrator = Migrator::new(
        MemoryStore::new(),
        MigrationOptions::default().with_chunk_size(1),
    );
    let cancel = migrator.cancel_flag();
    let error = migrator
        .run(&account.material, &[journal], |_| cancel.cancel())
        .await
        .unwrap_err();

    assert!(matches!(error, Error::Cancelled));
    assert_eq!(migrator.store().batches().len(), 1);
    assert!(matches!(migrator.state(), MigrationState::Failed { .. }));
}

#[tokio::test]
async fn progress_reaches_total_entries() {
    let account = account("alice");
    let first = contacts(&account, "first", &[create("A", "a"), create("B", "b")]);
    let second = contacts(
        &account,
        "second",
        &[
            create("C", "c"),
            SyncEntry::new(SyncAction::Create, vcard(None, None, "x")),
        ],
    );

    let mut events = Vec::new();
    let mut migrator = Migrator::new(
        MemoryStore::new(),
        MigrationOptions::default().with_chunk_size(1),
    );
    migrator
        .run(&account.material, &[first, second], |progress| {
            events.push(progress.clone());
        })
        .await
        .unwrap();

    let counts: Vec<_> = events
        .iter()
        .map(|event| (event.current_journal, event.migrated_entries))
        .collect();
    assert_eq!(counts, vec![(1, 1), (1, 2), (2, 3), (2, 4)]);
    assert_eq!(
        events.last().unwrap().status_line(),
        "Migrating collection 2/2: 4/4 entries"
    );
}

#[tokio::test]
async fn missing_rev_synthesizes_increasing_mtimes() {
    let account = account("alice");
    let journal = contacts(
        &account,
        "j1",
        &[
            SyncEntry::new(SyncAction::Create, vcard(Some("A"), None, "a")),
            SyncEntry::new(SyncAction::Create, vcard(Some("B"), Some("soon"), "b")),
        ],
    );

    let (result, migrator) = migrate(&account, &[journal], MigrationOptions::default()).await;
    let report = result.unwrap();
    let items = &migrator.store().batches()[0].items;

    assert_eq!(report.counters.bad_mtime, 2);
    assert!(items[1].meta.mtime > items[0].meta.mtime);
}

#[tokio::test]
async fn delete_of_unknown_uid_is_recorded() {
    let account = account("alice");
    let journal = contacts(
        &account,
        "j1",
        &[SyncEntry::new(
            SyncAction::Delete,
            vcard(Some("ghost"), None, "x"),
        )],
    );

    let (result, migrator) = migrate(&account, &[journal], MigrationOptions::default()).await;
    let report = result.unwrap();

    assert_eq!(report.counters.ignored_deletes, 1);
    assert!(migrator.store().batches().is_empty());
    assert_eq!(report.migrated[0].revisions, 0);
}

#[tokio::test]
async fn selection_limits_journals() {
    let account = account("alice");
    let first = contacts(&account, "first", &[create("A", "a")]);
    let second = contacts(&account, "second", &[create("B", "b")]);

    let options = MigrationOptions::default().with_journals(["second"]);
    let (result, migrator) = migrate(&account, &[first.clone(), second.clone()], options).await;
    let report = result.unwrap();
    assert_eq!(report.migrated.len(), 1);
    assert_eq!(report.migrated[0].journal_uid, "second");
    assert_eq!(migrator.store().collections().len(), 1);

    let options = MigrationOptions::default().with_journals(["third"]);
    let (result, _) = migrate(&account, &[first, second], options).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn calendar_journal_uses_event_parser() {
    let account = account("alice");
    let mut writer = writer("cal");
    writer
        .append(&SyncEntry::new(
            SyncAction::Create,
            "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:ev-1\r\nLAST-MODIFIED:20210101T000000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
        ))
        .unwrap();
    let journal = writer.finish("alice", &info("CALENDAR", "Work")).unwrap();

    let (result, migrator) = migrate(&account, &[journal], MigrationOptions::default()).await;
    let report = result.unwrap();

    assert_eq!(report.migrated[0].collection_type, CollectionType::Calendar);
    let item = &migrator.store().batches()[0].items[0];
    assert_eq!(item.meta.name, "ev-1");
    assert_eq!(item.meta.mtime, 1_609_459_200_000);
}

#[tokio::test(flavor = "multi_thread")]
async fn libsql_store_keeps_revision_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("destination.db");
    let account = account("alice");
    let journal = contacts(
        &account,
        "j1",
        &[
            create("A", "one"),
            SyncEntry::new(
                SyncAction::Update,
                vcard(Some("A"), Some("20200102T000000Z"), "two"),
            ),
            create("B", "b"),
        ],
    );

    let store = LibSqlStore::open(&path).await.unwrap();
    let mut migrator = Migrator::new(store, MigrationOptions::default().with_chunk_size(2));
    let report = migrator
        .run(&account.material, &[journal], |_| {})
        .await
        .unwrap();
    assert_eq!(report.migrated[0].chunks, 2);
    assert!(migrator.store().list_collections().await.is_err());
    drop(migrator.into_store());

    let reopened = LibSqlStore::open(&path).await.unwrap();
    let collections = reopened.list_collections().await.unwrap();
    assert_eq!(collections.len(), 1);
    assert_eq!(collections[0].items, 2);

    let history = reopened
        .revisions_for(&collections[0].uid, "A")
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].content.contains("FN:one"));
    assert!(history[1].content.contains("FN:two"));
}

//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
pub(crate) const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = version(conn).await?;

    if version < 1 {
        apply(conn, 1, V1).await?;
    }
    if version < 2 {
        apply(conn, 2, V2).await?;
    }

    Ok(())
}

/// Get the current schema version
pub async fn version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Version 1: collections, current item state and revision history
const V1: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS collections (
        uid TEXT PRIMARY KEY,
        collection_type TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        color TEXT NOT NULL,
        mtime INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS items (
        uid TEXT PRIMARY KEY,
        collection_uid TEXT NOT NULL REFERENCES collections(uid) ON DELETE CASCADE,
        name TEXT NOT NULL,
        content TEXT NOT NULL,
        mtime INTEGER NOT NULL,
        deleted INTEGER NOT NULL DEFAULT 0,
        etag TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_items_collection ON items(collection_uid)",
    "CREATE TABLE IF NOT EXISTS item_revisions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_uid TEXT NOT NULL REFERENCES items(uid) ON DELETE CASCADE,
        etag TEXT NOT NULL UNIQUE,
        content TEXT NOT NULL,
        mtime INTEGER NOT NULL,
        deleted INTEGER NOT NULL DEFAULT 0,
        uploaded_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_item_revisions_item ON item_revisions(item_uid, id)",
];

/// Version 2: lookups of items by their PIM uid
const V2: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_items_collection_name ON items(collection_uid, name)",
];

/// Apply one migration's statements and record its version, atomically.
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn
        .execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .await
    {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {}", version);
    Ok(())
}

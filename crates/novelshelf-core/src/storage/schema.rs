//! SQLite schema for the novel library
//!
//! Three collections live side by side in one database file so that a
//! single transaction can span them:
//!
//! - `novels` - metadata records keyed by novel id
//! - `content` - full text bodies, 1:1 with `novels`
//! - `repositories` - registered remote sources keyed by url

use rusqlite::{Connection, Result};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Collection holding novel metadata
pub const NOVELS_TABLE: &str = "novels";
/// Collection holding novel text
pub const CONTENT_TABLE: &str = "content";
/// Collection holding source registrations
pub const REPOSITORIES_TABLE: &str = "repositories";

/// Initialize the database schema
///
/// Every statement is `IF NOT EXISTS`, so running this against an already
/// initialized database is a no-op.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        BEGIN;

        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Novel metadata
        CREATE TABLE IF NOT EXISTS novels (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            source TEXT NOT NULL CHECK (source IN ('local', 'url')),
            filepath TEXT,
            url TEXT,
            last_read INTEGER NOT NULL,
            last_position INTEGER NOT NULL DEFAULT 0,
            bookmarks TEXT NOT NULL DEFAULT '[]',
            chapters TEXT NOT NULL DEFAULT '[]',
            CHECK ((source = 'local') = (filepath IS NOT NULL)),
            CHECK ((source = 'url') = (url IS NOT NULL))
        );

        -- Novel text, one row per novel
        CREATE TABLE IF NOT EXISTS content (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL
        );

        -- Registered remote sources
        CREATE TABLE IF NOT EXISTS repositories (
            url TEXT PRIMARY KEY,
            name TEXT,
            metadata TEXT NOT NULL DEFAULT '{}'
        );

        INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', '1');

        COMMIT;
        "#,
    )
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}

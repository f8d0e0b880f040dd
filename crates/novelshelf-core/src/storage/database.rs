//! SQLite-backed library database
//!
//! One connection is shared by every operation. Work runs on Tokio's
//! blocking pool, and each closure passed to [`Database::transact`] executes
//! inside a single SQLite transaction, so multi-record writes commit or roll
//! back as a unit and readers never see half of one.
//!
//! ## Tables
//!
//! - `novels` - `Novel` rows; `bookmarks`/`chapters` as JSON text
//! - `content` - text bodies keyed by novel id
//! - `repositories` - `SourceRegistration` rows; `metadata` as JSON text

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::DateTime;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::error::{StorageError, StorageResult};
use super::schema::{init_schema, needs_init};
use crate::models::{Novel, NovelOrigin, SourceRegistration};

/// Handle to the library database
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open or create the database file and make sure the schema exists
    pub async fn open(path: &Path) -> StorageResult<Self> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::open_blocking(path))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }

    fn open_blocking(path: PathBuf) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
        }

        let conn = Connection::open(&path).map_err(|source| StorageError::Open {
            path: path.clone(),
            source,
        })?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;

        if needs_init(&conn) {
            init_schema(&conn)?;
            debug!(path = %path.display(), "initialized library schema");
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` inside one transaction on the blocking pool
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back otherwise.
    pub async fn transact<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Transaction<'_>) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> StorageResult<T> {
            let mut conn = conn
                .lock()
                .map_err(|_| StorageError::Task("database connection poisoned".to_string()))?;
            let tx = conn.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

// ==================== Novels ====================

/// Insert or replace a novel row, keeping its position in insertion order
pub fn put_novel(tx: &Transaction, novel: &Novel) -> StorageResult<()> {
    tx.execute(
        r#"
        INSERT INTO novels (id, title, source, filepath, url, last_read, last_position, bookmarks, chapters)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            source = excluded.source,
            filepath = excluded.filepath,
            url = excluded.url,
            last_read = excluded.last_read,
            last_position = excluded.last_position,
            bookmarks = excluded.bookmarks,
            chapters = excluded.chapters
        "#,
        params![
            novel.id.to_string(),
            novel.title,
            novel.source(),
            novel.filepath(),
            novel.url(),
            novel.last_read.timestamp_millis(),
            novel.last_position,
            serde_json::to_string(&novel.bookmarks)?,
            serde_json::to_string(&novel.chapters)?,
        ],
    )?;
    Ok(())
}

/// Get a novel by id
pub fn get_novel(tx: &Transaction, id: &Uuid) -> StorageResult<Option<Novel>> {
    let row = tx
        .query_row(
            &format!("SELECT {NOVEL_COLUMNS} FROM novels WHERE id = ?"),
            params![id.to_string()],
            NovelRow::from_row,
        )
        .optional()?;
    row.map(NovelRow::into_novel).transpose()
}

/// Get all novels in insertion order
pub fn all_novels(tx: &Transaction) -> StorageResult<Vec<Novel>> {
    let mut stmt = tx.prepare(&format!("SELECT {NOVEL_COLUMNS} FROM novels ORDER BY rowid"))?;
    let rows = stmt
        .query_map([], NovelRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(NovelRow::into_novel).collect()
}

/// Delete a novel row, returning whether it existed
pub fn delete_novel(tx: &Transaction, id: &Uuid) -> StorageResult<bool> {
    let n = tx.execute("DELETE FROM novels WHERE id = ?", params![id.to_string()])?;
    Ok(n > 0)
}

pub fn count_novels(tx: &Transaction) -> StorageResult<i64> {
    Ok(tx.query_row("SELECT COUNT(*) FROM novels", [], |row| row.get(0))?)
}

// ==================== Content ====================

pub fn put_content(tx: &Transaction, id: &Uuid, content: &str) -> StorageResult<()> {
    tx.execute(
        "INSERT OR REPLACE INTO content (id, content) VALUES (?, ?)",
        params![id.to_string(), content],
    )?;
    Ok(())
}

pub fn get_content(tx: &Transaction, id: &Uuid) -> StorageResult<Option<String>> {
    Ok(tx
        .query_row(
            "SELECT content FROM content WHERE id = ?",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn delete_content(tx: &Transaction, id: &Uuid) -> StorageResult<bool> {
    let n = tx.execute("DELETE FROM content WHERE id = ?", params![id.to_string()])?;
    Ok(n > 0)
}

// ==================== Repositories ====================

/// Insert or replace a source registration (keyed by url)
pub fn put_source(tx: &Transaction, source: &SourceRegistration) -> StorageResult<()> {
    tx.execute(
        r#"
        INSERT INTO repositories (url, name, metadata) VALUES (?1, ?2, ?3)
        ON CONFLICT(url) DO UPDATE SET name = excluded.name, metadata = excluded.metadata
        "#,
        params![
            source.url,
            source.name,
            serde_json::to_string(&source.metadata)?
        ],
    )?;
    Ok(())
}

pub fn all_sources(tx: &Transaction) -> StorageResult<Vec<SourceRegistration>> {
    let mut stmt = tx.prepare("SELECT url, name, metadata FROM repositories ORDER BY rowid")?;
    let rows = stmt
        .query_map([], |row| {
            let url: String = row.get(0)?;
            let name: Option<String> = row.get(1)?;
            let metadata: String = row.get(2)?;
            Ok((url, name, metadata))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(url, name, metadata)| {
            let metadata = serde_json::from_str(&metadata).map_err(|e| {
                StorageError::InvalidRecord {
                    collection: "repositories",
                    key: url.clone(),
                    details: e.to_string(),
                }
            })?;
            Ok(SourceRegistration {
                url,
                name,
                metadata,
            })
        })
        .collect()
}

pub fn delete_source(tx: &Transaction, url: &str) -> StorageResult<bool> {
    let n = tx.execute("DELETE FROM repositories WHERE url = ?", params![url])?;
    Ok(n > 0)
}

pub fn count_sources(tx: &Transaction) -> StorageResult<i64> {
    Ok(tx.query_row("SELECT COUNT(*) FROM repositories", [], |row| row.get(0))?)
}

// ==================== Internal structs ====================

const NOVEL_COLUMNS: &str =
    "id, title, source, filepath, url, last_read, last_position, bookmarks, chapters";

struct NovelRow {
    id: String,
    title: String,
    source: String,
    filepath: Option<String>,
    url: Option<String>,
    last_read: i64,
    last_position: i64,
    bookmarks: String,
    chapters: String,
}

impl NovelRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            source: row.get(2)?,
            filepath: row.get(3)?,
            url: row.get(4)?,
            last_read: row.get(5)?,
            last_position: row.get(6)?,
            bookmarks: row.get(7)?,
            chapters: row.get(8)?,
        })
    }

    fn into_novel(self) -> StorageResult<Novel> {
        let invalid = |details: String| StorageError::InvalidRecord {
            collection: "novels",
            key: self.id.clone(),
            details,
        };

        let id = Uuid::parse_str(&self.id).map_err(|e| invalid(format!("invalid id: {e}")))?;

        let origin = match (self.source.as_str(), &self.filepath, &self.url) {
            ("local", Some(filepath), _) => NovelOrigin::Local {
                filepath: filepath.clone(),
            },
            ("url", _, Some(url)) => NovelOrigin::Url { url: url.clone() },
            (source, _, _) => return Err(invalid(format!("unusable source '{source}'"))),
        };

        let last_read = DateTime::from_timestamp_millis(self.last_read)
            .ok_or_else(|| invalid(format!("timestamp out of range: {}", self.last_read)))?;

        let bookmarks = serde_json::from_str(&self.bookmarks)
            .map_err(|e| invalid(format!("bookmarks: {e}")))?;
        let chapters =
            serde_json::from_str(&self.chapters).map_err(|e| invalid(format!("chapters: {e}")))?;

        Ok(Novel {
            id,
            title: self.title,
            origin,
            last_read,
            last_position: self.last_position,
            bookmarks,
            chapters,
        })
    }
}

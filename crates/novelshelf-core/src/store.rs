//! The novel library
//!
//! `NovelStore` owns the three collections (novels, content, repositories)
//! and is the only thing that writes to them. It coordinates between:
//! - the SQLite `Database` (opened lazily, shared, never closed)
//! - the `EncodingResolver` for file imports
//! - an HTTP client for URL imports
//! - a `DownloadSink` for text exports
//!
//! ## Usage
//!
//! ```ignore
//! let store = NovelStore::open()?;
//!
//! let novel = store.import_from_path(Path::new("chapter1.txt")).await?;
//! store.update_progress(novel.id, 500).await?;
//!
//! let text = store.get_content(novel.id).await?;
//! ```
//!
//! ## Missing records
//!
//! `get_content` returns an empty string, `update_progress` and
//! `delete_novel` do nothing, and `export_as_text` fails with
//! [`Error::NotFound`]. Callers rely on these differences.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::AsyncRead;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::encoding::EncodingResolver;
use crate::error::{Error, Result};
use crate::export::{DirectorySink, Download, DownloadSink};
use crate::import::{self, title_from_filename, title_from_url};
use crate::models::{Novel, SourceRegistration};
use crate::storage::{database, Database};

/// Number of records in each collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub novels: i64,
    pub sources: i64,
}

/// Storage and ingestion for the novel library
pub struct NovelStore {
    /// Library database, opened on first use
    db: OnceCell<Database>,
    /// Decoder for imported files
    resolver: EncodingResolver,
    /// Client for URL imports
    http: reqwest::Client,
    /// Destination for exports
    sink: Arc<dyn DownloadSink>,
    /// Configuration
    config: Config,
}

impl NovelStore {
    /// Create a store from the default configuration
    ///
    /// The database itself is not touched until the first operation.
    pub fn open() -> anyhow::Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Ok(Self::new(config))
    }

    /// Create a store for a specific configuration
    pub fn new(config: Config) -> Self {
        let sink = DirectorySink::new(config.export_dir());
        Self {
            db: OnceCell::new(),
            resolver: EncodingResolver::default(),
            http: import::http_client(&config),
            sink: Arc::new(sink),
            config,
        }
    }

    /// Create a store on top of an already open database
    pub fn with_database(config: Config, db: Database) -> Self {
        let mut store = Self::new(config);
        store.db = OnceCell::from(db);
        store
    }

    /// Replace the encoding resolver used by file imports
    pub fn with_resolver(mut self, resolver: EncodingResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replace the destination for exports
    pub fn with_sink(mut self, sink: impl DownloadSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The open database, opening it on first use
    ///
    /// Concurrent first callers wait on a single open. A failed open is
    /// returned to the caller that attempted it and is not cached.
    async fn db(&self) -> Result<&Database> {
        let db = self
            .db
            .get_or_try_init(|| async {
                let path = self.config.sqlite_path();
                debug!(path = %path.display(), "opening library database");
                Database::open(&path).await
            })
            .await?;
        Ok(db)
    }

    // ==================== Lifecycle ====================

    /// Create the collections if they don't exist yet
    ///
    /// Idempotent, and safe to call concurrently with itself.
    pub async fn create_database(&self) -> Result<()> {
        self.db().await.map(|_| ())
    }

    // ==================== Novel Operations ====================

    /// Save a novel and its content in one transaction
    pub async fn save_novel(&self, novel: &Novel, content: &str) -> Result<()> {
        let novel = novel.clone();
        let content = content.to_owned();
        self.db()
            .await?
            .transact(move |tx| {
                database::put_novel(tx, &novel)?;
                database::put_content(tx, &novel.id, &content)
            })
            .await?;
        Ok(())
    }

    /// Get all novels, in the order they were first saved
    pub async fn list_novels(&self) -> Result<Vec<Novel>> {
        Ok(self
            .db()
            .await?
            .transact(|tx| database::all_novels(tx))
            .await?)
    }

    /// Get a novel by ID
    pub async fn get_novel(&self, id: Uuid) -> Result<Option<Novel>> {
        Ok(self
            .db()
            .await?
            .transact(move |tx| database::get_novel(tx, &id))
            .await?)
    }

    /// Get a novel's text, or an empty string if there is none
    pub async fn get_content(&self, id: Uuid) -> Result<String> {
        let content = self
            .db()
            .await?
            .transact(move |tx| database::get_content(tx, &id))
            .await?;
        Ok(content.unwrap_or_default())
    }

    /// Record a reading position and refresh `last_read`
    ///
    /// Unknown ids are ignored without error.
    pub async fn update_progress(&self, id: Uuid, position: i64) -> Result<()> {
        let updated = self
            .db()
            .await?
            .transact(move |tx| match database::get_novel(tx, &id)? {
                Some(mut novel) => {
                    novel.set_progress(position);
                    database::put_novel(tx, &novel)?;
                    Ok(true)
                }
                None => Ok(false),
            })
            .await?;

        if !updated {
            debug!(%id, "progress update for unknown novel ignored");
        }
        Ok(())
    }

    /// Delete a novel and its content in one transaction
    ///
    /// Deleting an unknown id is not an error.
    pub async fn delete_novel(&self, id: Uuid) -> Result<()> {
        let removed = self
            .db()
            .await?
            .transact(move |tx| {
                let novel = database::delete_novel(tx, &id)?;
                let content = database::delete_content(tx, &id)?;
                Ok(novel || content)
            })
            .await?;

        if removed {
            info!(%id, "deleted novel");
        }
        Ok(())
    }

    /// Find the most recently imported novel downloaded from `url`
    pub async fn find_by_url(&self, url: &str) -> Result<Option<Novel>> {
        let novels = self.list_novels().await?;
        Ok(novels.into_iter().rev().find(|novel| novel.url() == Some(url)))
    }

    // ==================== Source Operations ====================

    /// Save a source registration, replacing any with the same url
    pub async fn save_source(&self, source: &SourceRegistration) -> Result<()> {
        let source = source.clone();
        self.db()
            .await?
            .transact(move |tx| database::put_source(tx, &source))
            .await?;
        Ok(())
    }

    /// Get all source registrations
    pub async fn list_sources(&self) -> Result<Vec<SourceRegistration>> {
        Ok(self
            .db()
            .await?
            .transact(|tx| database::all_sources(tx))
            .await?)
    }

    /// Remove a source registration; unknown urls are ignored
    pub async fn delete_source(&self, url: &str) -> Result<()> {
        let url = url.to_owned();
        self.db()
            .await?
            .transact(move |tx| database::delete_source(tx, &url))
            .await?;
        Ok(())
    }

    // ==================== Stats ====================

    /// Count novels and sources
    pub async fn counts(&self) -> Result<StoreCounts> {
        Ok(self
            .db()
            .await?
            .transact(|tx| {
                Ok(StoreCounts {
                    novels: database::count_novels(tx)?,
                    sources: database::count_sources(tx)?,
                })
            })
            .await?)
    }

    // ==================== Import / Export ====================

    /// Import a novel from a named byte source
    ///
    /// The bytes are decoded with the encoding resolver. Nothing is written
    /// unless reading and decoding both succeed.
    pub async fn import_from_file<R>(&self, name: &str, reader: R) -> Result<Novel>
    where
        R: AsyncRead + Unpin,
    {
        let bytes = import::read_all(name, reader).await?;
        let decoded = self.resolver.decode_detailed(&bytes)?;

        let novel = Novel::local(title_from_filename(name), name);
        self.save_novel(&novel, &decoded.text).await?;

        info!(
            id = %novel.id,
            title = %novel.title,
            encoding = decoded.encoding,
            lossy = decoded.lossy,
            "imported novel from file"
        );
        Ok(novel)
    }

    /// Import a novel from a file on disk
    pub async fn import_from_path(&self, path: &Path) -> Result<Novel> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| Error::Read {
                name: path.display().to_string(),
                source,
            })?;

        self.import_from_file(&name, file).await
    }

    /// Download a novel and import it
    ///
    /// The body is read as UTF-8 regardless of the declared charset; no
    /// encoding detection runs. A URL whose last segment cannot be
    /// percent-decoded fails with [`Error::InvalidUrl`] before any request.
    /// Cancelling `cancel` before the body arrives fails with
    /// [`Error::Cancelled`] and writes nothing.
    pub async fn import_from_url(&self, url: &str, cancel: &CancellationToken) -> Result<Novel> {
        let title = title_from_url(url)?;
        let content = import::fetch_text(&self.http, url, cancel).await?;

        let novel = Novel::from_url(title, url);
        self.save_novel(&novel, &content).await?;

        info!(id = %novel.id, title = %novel.title, url, "imported novel from url");
        Ok(novel)
    }

    /// Export a novel as `<title>.txt` through the download sink
    pub async fn export_as_text(&self, id: Uuid) -> Result<Download> {
        let (novel, content) = self
            .db()
            .await?
            .transact(move |tx| {
                let novel = database::get_novel(tx, &id)?;
                let content = database::get_content(tx, &id)?;
                Ok((novel, content))
            })
            .await?;

        let novel = novel.ok_or(Error::NotFound { id })?;
        let download = Download::text(&novel.title, &content.unwrap_or_default());

        let sink = Arc::clone(&self.sink);
        let handed = download.clone();
        tokio::task::spawn_blocking(move || sink.deliver(&handed))
            .await
            .map_err(std::io::Error::other)
            .and_then(|delivered| delivered)
            .map_err(|source| Error::Export {
                filename: download.filename.clone(),
                source,
            })?;

        info!(%id, filename = %download.filename, "exported novel");
        Ok(download)
    }
}

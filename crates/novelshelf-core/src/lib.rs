//! Novelshelf Core Library
//!
//! This crate provides the core functionality for Novelshelf, a local
//! library of plain-text novels with reading progress.
//!
//! # Architecture
//!
//! - **SQLite**: One database with three collections (novels, content,
//!   repositories). Every multi-record write runs in a single transaction.
//! - **Encoding resolution**: Imported files may be UTF-8, Shift_JIS, GBK,
//!   EUC-KR and others. They are decoded to text once, at import time.
//!
//! # Quick Start
//!
//! ```text
//! let store = NovelStore::open()?;
//!
//! // Import a file
//! let novel = store.import_from_path(Path::new("chapter1.txt")).await?;
//!
//! // Read and record progress
//! let text = store.get_content(novel.id).await?;
//! store.update_progress(novel.id, 500).await?;
//! ```
//!
//! # Modules
//!
//! - `store`: Library operations (main entry point)
//! - `models`: Novel and source registration records
//! - `encoding`: Byte-to-text decoding with detection and fallback
//! - `import`: Title derivation and URL fetching
//! - `export`: Plain-text downloads and where they go
//! - `storage`: SQLite persistence
//! - `config`: Application configuration

pub mod config;
pub mod encoding;
pub mod error;
pub mod export;
pub mod import;
pub mod models;
pub mod storage;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use encoding::{ChardetDetector, DecodeError, Decoded, EncodingDetector, EncodingResolver};
pub use error::{Error, Result};
pub use export::{DirectorySink, Download, DownloadSink};
pub use models::{Novel, NovelOrigin, SourceRegistration};
pub use storage::{Database, StorageError};
pub use store::{NovelStore, StoreCounts};
pub use tokio_util::sync::CancellationToken;

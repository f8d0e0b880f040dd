//! Library-level errors
//!
//! Every public `NovelStore` operation returns [`Result`]. Fetch failures,
//! non-success responses and cancellation are separate variants so callers
//! can tell them apart.

use std::io;

use thiserror::Error;
use uuid::Uuid;

use crate::encoding::DecodeError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum Error {
    /// Opening the library or running a transaction failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An imported file could not be turned into text
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Reading an imported file failed
    #[error("Failed to read file '{name}': {source}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The request for a URL import failed before a response arrived,
    /// or the body could not be read
    #[error("Failed to fetch novel content from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered a URL import with a non-success status
    #[error("Failed to fetch novel content from {url}: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// A URL's last path segment has a malformed percent-escape
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A URL import was cancelled by its token
    #[error("Import from {url} was cancelled")]
    Cancelled { url: String },

    /// The requested novel does not exist
    #[error("Novel not found: {id}")]
    NotFound { id: Uuid },

    /// Handing an export to the download sink failed
    #[error("Failed to export '{filename}': {source}")]
    Export {
        filename: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// True for a URL import aborted through its cancellation token
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// True for the fetch-side failures of a URL import
    pub fn is_fetch_error(&self) -> bool {
        matches!(self, Error::Fetch { .. } | Error::HttpStatus { .. })
    }
}

/// Result type for library operations
pub type Result<T> = std::result::Result<T, Error>;

//! Data models for novelshelf
//!
//! Defines the records kept in the library: `Novel` (metadata), its text
//! body, and `SourceRegistration` (remote origins the user has saved).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Where a novel came from
///
/// Exactly one of `filepath` / `url` exists for a novel, and which one is
/// fixed by its source tag. Serialized flat as `source` + `filepath`/`url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum NovelOrigin {
    /// Imported from a local file
    Local { filepath: String },
    /// Downloaded from a URL
    Url { url: String },
}

impl NovelOrigin {
    /// The source tag as stored (`local` or `url`)
    pub fn source(&self) -> &'static str {
        match self {
            NovelOrigin::Local { .. } => "local",
            NovelOrigin::Url { .. } => "url",
        }
    }

    pub fn filepath(&self) -> Option<&str> {
        match self {
            NovelOrigin::Local { filepath } => Some(filepath),
            NovelOrigin::Url { .. } => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            NovelOrigin::Url { url } => Some(url),
            NovelOrigin::Local { .. } => None,
        }
    }
}

/// Metadata for one imported novel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Novel {
    /// Unique identifier
    pub id: Uuid,
    /// Display title, derived from the file or URL name
    pub title: String,
    /// Source tag plus its file path or URL
    #[serde(flatten)]
    pub origin: NovelOrigin,
    /// When this novel was imported or last had its progress updated
    pub last_read: DateTime<Utc>,
    /// Reading offset into the content
    pub last_position: i64,
    /// Bookmarks, owned by the reader
    pub bookmarks: Vec<Value>,
    /// Chapter index, owned by the reader
    pub chapters: Vec<Value>,
}

impl Novel {
    /// Create a novel imported from a local file
    pub fn local(title: impl Into<String>, filepath: impl Into<String>) -> Self {
        Self::new(
            title,
            NovelOrigin::Local {
                filepath: filepath.into(),
            },
        )
    }

    /// Create a novel downloaded from a URL
    pub fn from_url(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(title, NovelOrigin::Url { url: url.into() })
    }

    fn new(title: impl Into<String>, origin: NovelOrigin) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            origin,
            last_read: now_millis(),
            last_position: 0,
            bookmarks: Vec::new(),
            chapters: Vec::new(),
        }
    }

    /// Source tag (`local` or `url`)
    pub fn source(&self) -> &'static str {
        self.origin.source()
    }

    /// The URL this novel was downloaded from, if any
    pub fn url(&self) -> Option<&str> {
        self.origin.url()
    }

    /// The file name this novel was imported from, if any
    pub fn filepath(&self) -> Option<&str> {
        self.origin.filepath()
    }

    /// Record a new reading position and bump `last_read`
    ///
    /// `last_read` becomes the current time, truncated to milliseconds,
    /// unless that is not later than the stored value (clock stepped back, or
    /// the same millisecond). In that case it is left as is, so `last_read`
    /// never decreases.
    pub fn set_progress(&mut self, position: i64) {
        self.last_position = position;
        let now = now_millis();
        if now > self.last_read {
            self.last_read = now;
        }
    }
}

/// A saved remote origin that novels may be downloaded from
///
/// Apart from the url, the fields are descriptive only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRegistration {
    /// Unique key
    pub url: String,
    /// Human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form descriptive fields
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl SourceRegistration {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
            metadata: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a descriptive field, replacing any previous value
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }
}

/// Current time truncated to the millisecond precision the store keeps
pub(crate) fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

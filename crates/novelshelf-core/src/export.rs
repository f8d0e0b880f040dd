//! Plain-text export
//!
//! An export is a [`Download`]: a file name, a MIME type and the bytes. The
//! store hands it to a [`DownloadSink`], which decides where it ends up.
//! [`DirectorySink`] saves it into a directory.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// MIME type of exported text
pub const TEXT_MIME: &str = "text/plain;charset=utf-8";

/// A file ready to be handed to the host's save mechanism
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Suggested file name (`<title>.txt`)
    pub filename: String,
    /// MIME type, always [`TEXT_MIME`] for text exports
    pub mime: &'static str,
    /// UTF-8 encoded body
    pub bytes: Vec<u8>,
}

impl Download {
    /// Build a text download named after `title`
    ///
    /// Path separators and control characters in the title become `_`.
    pub fn text(title: &str, content: &str) -> Self {
        let stem: String = title
            .chars()
            .map(|c| match c {
                '/' | '\\' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();

        Self {
            filename: format!("{}.txt", stem),
            mime: TEXT_MIME,
            bytes: content.as_bytes().to_vec(),
        }
    }
}

/// Receives finished exports
pub trait DownloadSink: Send + Sync {
    fn deliver(&self, download: &Download) -> io::Result<()>;
}

/// Saves downloads as files in one directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where a download will be written
    pub fn path_for(&self, download: &Download) -> PathBuf {
        self.dir.join(&download.filename)
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&self, download: &Download) -> io::Result<()> {
        let path = self.path_for(download);
        atomic_write(&path, &download.bytes)?;
        debug!(path = %path.display(), bytes = download.bytes.len(), "wrote export");
        Ok(())
    }
}

/// Write a file atomically
///
/// Writes to a temporary file next to the target, syncs it, then renames it
/// over the target so readers never see a partial file.
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".part");
    let temp_path = PathBuf::from(temp_name);

    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_text_download() {
        let download = Download::text("My Book", "本文");
        assert_eq!(download.filename, "My Book.txt");
        assert_eq!(download.mime, "text/plain;charset=utf-8");
        assert_eq!(download.bytes, "本文".as_bytes());
    }

    #[test]
    fn test_title_separators_replaced() {
        let download = Download::text("a/b\\c\n", "");
        assert_eq!(download.filename, "a_b_c_.txt");
    }

    #[test]
    fn test_directory_sink_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(temp_dir.path().join("exports"));
        let download = Download::text("chapter1", "第一章");

        sink.deliver(&download).unwrap();

        let path = sink.path_for(&download);
        assert_eq!(fs::read_to_string(&path).unwrap(), "第一章");
        assert!(!temp_dir.path().join("exports/chapter1.txt.part").exists());
    }

    #[test]
    fn test_directory_sink_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(temp_dir.path());

        sink.deliver(&Download::text("a", "old")).unwrap();
        sink.deliver(&Download::text("a", "new")).unwrap();

        assert_eq!(
            fs::read_to_string(temp_dir.path().join("a.txt")).unwrap(),
            "new"
        );
    }
}

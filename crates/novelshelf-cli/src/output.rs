//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use chrono::Local;
use serde::Serialize;

use novelshelf_core::{Novel, SourceRegistration};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is JSON
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single novel
    pub fn print_novel(&self, novel: &Novel) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:        {}", novel.id);
                println!("Title:     {}", novel.title);
                match (novel.filepath(), novel.url()) {
                    (Some(path), _) => println!("File:      {}", path),
                    (_, Some(url)) => println!("URL:       {}", url),
                    _ => {}
                }
                println!("Position:  {}", novel.last_position);
                println!(
                    "Last read: {}",
                    novel.last_read.with_timezone(&Local).format("%Y-%m-%d %H:%M")
                );
                if !novel.bookmarks.is_empty() {
                    println!("Bookmarks: {}", novel.bookmarks.len());
                }
                if !novel.chapters.is_empty() {
                    println!("Chapters:  {}", novel.chapters.len());
                }
            }
            OutputFormat::Json => print_json(novel),
            OutputFormat::Quiet => {
                println!("{}", novel.id);
            }
        }
    }

    /// Print a list of novels
    pub fn print_novels(&self, novels: &[Novel]) {
        match self.format {
            OutputFormat::Human => {
                if novels.is_empty() {
                    println!("No novels found.");
                    return;
                }
                for novel in novels {
                    println!(
                        "{} | {} | {:5} | {}",
                        short_id(novel),
                        truncate(&novel.title, 35),
                        novel.source(),
                        novel.last_position
                    );
                }
                println!("\n{} novel(s)", novels.len());
            }
            OutputFormat::Json => print_json(&novels),
            OutputFormat::Quiet => {
                for novel in novels {
                    println!("{}", novel.id);
                }
            }
        }
    }

    /// Print a list of source registrations
    pub fn print_sources(&self, sources: &[SourceRegistration]) {
        match self.format {
            OutputFormat::Human => {
                if sources.is_empty() {
                    println!("No sources registered.");
                    return;
                }
                for source in sources {
                    let name = source.name.as_deref().unwrap_or("-");
                    let fields = if source.metadata.is_empty() {
                        String::new()
                    } else {
                        format!(" [{}]", source.metadata.len())
                    };
                    println!("{} | {}{}", truncate(name, 25), source.url, fields);
                }
                println!("\n{} source(s)", sources.len());
            }
            OutputFormat::Json => print_json(&sources),
            OutputFormat::Quiet => {
                for source in sources {
                    println!("{}", source.url);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Pretty-print a value as JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

/// First eight characters of a novel's id
pub fn short_id(novel: &Novel) -> String {
    novel.id.to_string()[..8].to_string()
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

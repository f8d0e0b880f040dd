//! Status command handler

use anyhow::Result;

use novelshelf_core::NovelStore;

use crate::output::{Output, OutputFormat};

/// Show status information
pub async fn show(store: &NovelStore, output: &Output) -> Result<()> {
    let counts = store.counts().await?;
    let config = store.config();
    let db_path = config.sqlite_path();
    let db_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "database": db_path,
                    "database_size": db_size,
                    "export_dir": config.export_dir(),
                    "counts": {
                        "novels": counts.novels,
                        "sources": counts.sources
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", counts.novels);
        }
        OutputFormat::Human => {
            println!("Novelshelf Status");
            println!("=================");
            println!();
            println!("Storage:");
            println!("  Database: {}", db_path.display());
            println!("  Size:     {}", human_size(db_size));
            println!("  Exports:  {}", config.export_dir().display());
            println!();
            println!("Contents:");
            println!("  Novels:  {}", counts.novels);
            println!("  Sources: {}", counts.sources);
        }
    }

    Ok(())
}

fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 bytes");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024 + 512 * 1024), "3.5 MB");
    }
}

//! Novel command handlers

use std::path::Path;

use anyhow::{anyhow, Context, Result};

use novelshelf_core::{CancellationToken, DirectorySink, NovelStore};

use super::{confirm, parse_novel_id};
use crate::output::{print_json, short_id, Output, OutputFormat};

/// Create the library database
pub async fn init(store: &NovelStore, output: &Output) -> Result<()> {
    store
        .create_database()
        .await
        .context("Failed to create library database")?;

    let path = store.config().sqlite_path();
    match output.format {
        OutputFormat::Json => print_json(&serde_json::json!({ "database": path })),
        OutputFormat::Quiet => println!("{}", path.display()),
        OutputFormat::Human => output.success(&format!("Library ready at {}", path.display())),
    }
    Ok(())
}

/// Import a local text file
pub async fn import(store: &NovelStore, path: &Path, output: &Output) -> Result<()> {
    let novel = store
        .import_from_path(path)
        .await
        .with_context(|| format!("Failed to import {}", path.display()))?;

    output.success(&format!("Imported: {}", novel.title));
    output.print_novel(&novel);
    Ok(())
}

/// Download and import a novel, cancelling on Ctrl-C
pub async fn fetch(store: &NovelStore, url: &str, output: &Output) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let result = fetch_with_token(store, url, &cancel, output).await;
    watcher.abort();
    result
}

/// Import from `url` until `cancel` fires; cancellation is an error
async fn fetch_with_token(
    store: &NovelStore,
    url: &str,
    cancel: &CancellationToken,
    output: &Output,
) -> Result<()> {
    let novel = store
        .import_from_url(url, cancel)
        .await
        .context("Failed to import from URL")?;

    output.success(&format!("Imported: {}", novel.title));
    output.print_novel(&novel);
    Ok(())
}

/// List all novels
pub async fn list(store: &NovelStore, output: &Output) -> Result<()> {
    let novels = store.list_novels().await?;
    output.print_novels(&novels);
    Ok(())
}

/// Show a single novel
pub async fn show(store: &NovelStore, id: String, output: &Output) -> Result<()> {
    let uuid = parse_novel_id(&id, store).await?;

    let novel = store
        .get_novel(uuid)
        .await?
        .ok_or_else(|| anyhow!("Novel not found: {}", id))?;

    output.print_novel(&novel);
    Ok(())
}

/// Print a novel's text
pub async fn read(store: &NovelStore, id: String, output: &Output) -> Result<()> {
    let uuid = parse_novel_id(&id, store).await?;
    let content = store.get_content(uuid).await?;

    match output.format {
        OutputFormat::Json => print_json(&serde_json::json!({ "id": uuid, "content": content })),
        OutputFormat::Human | OutputFormat::Quiet => print!("{}", content),
    }
    Ok(())
}

/// Record a reading position
pub async fn progress(store: &NovelStore, id: String, position: i64, output: &Output) -> Result<()> {
    let uuid = parse_novel_id(&id, store).await?;

    store
        .update_progress(uuid, position)
        .await
        .context("Failed to update progress")?;

    let novel = store
        .get_novel(uuid)
        .await?
        .ok_or_else(|| anyhow!("Novel not found: {}", id))?;

    output.success(&format!("{} at position {}", novel.title, novel.last_position));
    if output.is_json() {
        output.print_novel(&novel);
    }
    Ok(())
}

/// Delete a novel and its text
pub async fn delete(store: &NovelStore, id: String, output: &Output) -> Result<()> {
    let uuid = parse_novel_id(&id, store).await?;

    let novel = store
        .get_novel(uuid)
        .await?
        .ok_or_else(|| anyhow!("Novel not found: {}", id))?;

    // Confirm deletion
    if output.should_prompt() {
        println!("Delete novel: {} - {}", short_id(&novel), novel.title);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store
        .delete_novel(uuid)
        .await
        .context("Failed to delete novel")?;

    output.success(&format!("Deleted novel: {}", uuid));
    Ok(())
}

/// Export a novel as a `.txt` file
pub async fn export(store: &NovelStore, id: String, output: &Output) -> Result<()> {
    let uuid = parse_novel_id(&id, store).await?;

    let download = store.export_as_text(uuid).await?;
    let path = DirectorySink::new(store.config().export_dir()).path_for(&download);

    match output.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "filename": download.filename,
            "mime": download.mime,
            "bytes": download.bytes.len(),
            "path": path,
        })),
        OutputFormat::Quiet => println!("{}", path.display()),
        OutputFormat::Human => output.success(&format!("Exported to {}", path.display())),
    }
    Ok(())
}

/// Find the most recent import of a URL
pub async fn find(store: &NovelStore, url: &str, output: &Output) -> Result<()> {
    match store.find_by_url(url).await? {
        Some(novel) => output.print_novel(&novel),
        None => {
            if output.is_json() {
                println!("null");
            } else {
                output.message(&format!("No novel imported from {}", url));
            }
        }
    }
    Ok(())
}

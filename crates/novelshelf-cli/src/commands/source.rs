//! Source registry command handlers

use anyhow::{bail, Context, Result};
use serde_json::Value;

use novelshelf_core::{NovelStore, SourceRegistration};

use crate::output::Output;

/// Register (or replace) a source
pub async fn add(
    store: &NovelStore,
    url: String,
    name: Option<String>,
    meta: Vec<String>,
    output: &Output,
) -> Result<()> {
    let mut source = SourceRegistration::new(&url);
    if let Some(name) = name {
        source = source.with_name(name);
    }
    for pair in &meta {
        let (key, value) = parse_meta(pair)?;
        source.set_field(key, value);
    }

    store
        .save_source(&source)
        .await
        .context("Failed to save source")?;

    output.success(&format!("Registered source: {}", url));
    Ok(())
}

/// List registered sources
pub async fn list(store: &NovelStore, output: &Output) -> Result<()> {
    let sources = store.list_sources().await?;
    output.print_sources(&sources);
    Ok(())
}

/// Remove a source
pub async fn remove(store: &NovelStore, url: String, output: &Output) -> Result<()> {
    store
        .delete_source(&url)
        .await
        .context("Failed to remove source")?;

    output.success(&format!("Removed source: {}", url));
    Ok(())
}

/// Parse a `key=value` pair
///
/// Values that parse as JSON keep their type; anything else is a string.
fn parse_meta(pair: &str) -> Result<(String, Value)> {
    let Some((key, raw)) = pair.split_once('=') else {
        bail!("Invalid metadata '{}'. Use key=value.", pair);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid metadata '{}'. Key is empty.", pair);
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

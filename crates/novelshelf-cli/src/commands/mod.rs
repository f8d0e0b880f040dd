//! Command handlers

pub mod config;
pub mod novel;
pub mod source;
pub mod status;

use std::io::{self, IsTerminal, Write};

use anyhow::{bail, Result};
use uuid::Uuid;

use novelshelf_core::{Novel, NovelStore};

/// Parse a novel ID (supports full UUID or prefix)
pub async fn parse_novel_id(id: &str, store: &NovelStore) -> Result<Uuid> {
    // Try full UUID first
    if let Ok(uuid) = Uuid::parse_str(id) {
        return Ok(uuid);
    }

    let novels = store.list_novels().await?;
    match_prefix(id, &novels)
}

/// Find the single novel whose id starts with `prefix`
fn match_prefix(prefix: &str, novels: &[Novel]) -> Result<Uuid> {
    let matches: Vec<_> = novels
        .iter()
        .filter(|n| n.id.to_string().starts_with(prefix))
        .collect();

    match matches.len() {
        0 => bail!("No novel found matching: {}", prefix),
        1 => Ok(matches[0].id),
        _ => {
            eprintln!("Multiple novels match '{}':", prefix);
            for novel in &matches {
                eprintln!("  {} - {}", novel.id, novel.title);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

/// Prompt for confirmation
///
/// Returns true if user confirms, false otherwise.
/// In non-interactive mode (no TTY), returns false.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use novelshelf_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "export_dir": config.export_dir,
                    "fetch_timeout_secs": config.fetch_timeout_secs,
                    "user_agent": config.user_agent,
                    "log_level": config.log_level
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:           {}", config.data_dir.display());
            println!(
                "  export_dir:         {}",
                config
                    .export_dir
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| format!("(default: {})", config.export_dir().display()))
            );
            println!("  fetch_timeout_secs: {}", config.fetch_timeout_secs);
            println!("  user_agent:         {}", config.user_agent);
            println!("  log_level:          {}", config.log_level);
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let saved = match config_path {
        Some(path) => config.save_to_path(path),
        None => config.save(),
    };
    saved.context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "export_dir" => {
            config.export_dir = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        "fetch_timeout_secs" => {
            config.fetch_timeout_secs = value
                .parse()
                .context("Invalid value for fetch_timeout_secs. Use a whole number of seconds.")?;
        }
        "user_agent" => {
            config.user_agent = value.to_string();
        }
        "log_level" => {
            config.log_level = value.to_string();
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, export_dir, fetch_timeout_secs, user_agent, log_level",
                key
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::with_data_dir("/data");

        apply(&mut config, "export_dir", "/exports").unwrap();
        assert_eq!(config.export_dir, Some(PathBuf::from("/exports")));
        apply(&mut config, "export_dir", "none").unwrap();
        assert!(config.export_dir.is_none());

        apply(&mut config, "fetch_timeout_secs", "90").unwrap();
        assert_eq!(config.fetch_timeout_secs, 90);

        apply(&mut config, "log_level", "debug").unwrap();
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_apply_rejects_bad_input() {
        let mut config = Config::with_data_dir("/data");
        assert!(apply(&mut config, "fetch_timeout_secs", "soon").is_err());
        assert!(apply(&mut config, "sync_url", "x").is_err());
        assert_eq!(config.fetch_timeout_secs, 30);
    }
}

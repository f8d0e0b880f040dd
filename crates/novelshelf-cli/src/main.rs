//! Novelshelf CLI
//!
//! Command-line interface for Novelshelf - a local library of text novels.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use novelshelf_core::{Config, Error, NovelStore, StorageError};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Novelshelf - Local library for plain-text novels")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the library database
    Init,
    /// Import a local text file (any common encoding)
    Import {
        /// Path to the file
        path: PathBuf,
    },
    /// Download a novel from a URL (Ctrl-C cancels)
    Fetch {
        /// URL of the text file
        url: String,
    },
    /// List all novels
    #[command(alias = "ls")]
    List,
    /// Show novel details
    Show {
        /// Novel ID (full UUID or prefix)
        id: String,
    },
    /// Print a novel's text
    Read {
        /// Novel ID (full UUID or prefix)
        id: String,
    },
    /// Record a reading position
    Progress {
        /// Novel ID (full UUID or prefix)
        id: String,
        /// Position in the text
        position: i64,
    },
    /// Delete a novel
    #[command(alias = "rm")]
    Delete {
        /// Novel ID (full UUID or prefix)
        id: String,
    },
    /// Export a novel as <title>.txt
    Export {
        /// Novel ID (full UUID or prefix)
        id: String,
        /// Directory to write to (overrides export_dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Find the most recent novel downloaded from a URL
    Find {
        /// Exact URL used for the import
        url: String,
    },
    /// Manage the source registry
    Source {
        #[command(subcommand)]
        command: SourceCommands,
    },
    /// Show status (database location, counts)
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum SourceCommands {
    /// Register a source
    Add {
        /// Source URL
        url: String,
        /// Display name
        #[arg(short, long)]
        name: Option<String>,
        /// Extra fields as key=value
        #[arg(short, long)]
        meta: Vec<String>,
    },
    /// List registered sources
    #[command(alias = "ls")]
    List,
    /// Remove a source
    #[command(alias = "remove")]
    Rm {
        /// Source URL
        url: String,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, export_dir, fetch_timeout_secs, user_agent, log_level)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work on the file itself, not the library
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let mut config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(&config);
    debug!(data_dir = %config.data_dir.display(), "loaded configuration");

    if let Commands::Export { dir: Some(dir), .. } = &cli.command {
        config.export_dir = Some(dir.clone());
    }

    let store = NovelStore::new(config);

    let result = match cli.command {
        Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Init => commands::novel::init(&store, &output).await,
        Commands::Import { path } => commands::novel::import(&store, &path, &output).await,
        Commands::Fetch { url } => commands::novel::fetch(&store, &url, &output).await,
        Commands::List => commands::novel::list(&store, &output).await,
        Commands::Show { id } => commands::novel::show(&store, id, &output).await,
        Commands::Read { id } => commands::novel::read(&store, id, &output).await,
        Commands::Progress { id, position } => {
            commands::novel::progress(&store, id, position, &output).await
        }
        Commands::Delete { id } => commands::novel::delete(&store, id, &output).await,
        Commands::Export { id, .. } => commands::novel::export(&store, id, &output).await,
        Commands::Find { url } => commands::novel::find(&store, &url, &output).await,
        Commands::Source { command } => handle_source_command(command, &store, &output).await,
        Commands::Status => commands::status::show(&store, &output).await,
    };

    if let Err(ref e) = result {
        match storage_suggestion(e) {
            Some(suggestion) if !output.is_quiet() => eprintln!("hint: {}", suggestion),
            _ => {}
        }
    }
    result
}

/// Recovery hint for a storage failure anywhere in the error chain
fn storage_suggestion(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if let Some(Error::Storage(storage)) = cause.downcast_ref::<Error>() {
            return storage.recovery_suggestion();
        }
        cause
            .downcast_ref::<StorageError>()
            .and_then(StorageError::recovery_suggestion)
    })
}

async fn handle_source_command(
    command: SourceCommands,
    store: &NovelStore,
    output: &Output,
) -> Result<()> {
    match command {
        SourceCommands::Add { url, name, meta } => {
            commands::source::add(store, url, name, meta, output).await
        }
        SourceCommands::List => commands::source::list(store, output).await,
        SourceCommands::Rm { url } => commands::source::remove(store, url, output).await,
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Install the stderr log subscriber
///
/// RUST_LOG wins over the configured level.
fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "novelshelf_core={level},novelshelf_cli={level}",
            level = config.log_level
        ))
    });

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export_with_dir() {
        let cli = Cli::try_parse_from(["shelf", "--json", "export", "abc123", "--dir", "/tmp/out"])
            .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Export { id, dir } => {
                assert_eq!(id, "abc123");
                assert_eq!(dir, Some(PathBuf::from("/tmp/out")));
            }
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn test_parse_source_add_with_meta() {
        let cli = Cli::try_parse_from([
            "shelf",
            "source",
            "add",
            "https://example.com",
            "--name",
            "Example",
            "-m",
            "language=ja",
            "-m",
            "priority=2",
        ])
        .unwrap();
        match cli.command {
            Commands::Source {
                command: SourceCommands::Add { url, name, meta },
            } => {
                assert_eq!(url, "https://example.com");
                assert_eq!(name.as_deref(), Some("Example"));
                assert_eq!(meta, vec!["language=ja", "priority=2"]);
            }
            _ => panic!("expected source add"),
        }
    }

    #[test]
    fn test_storage_suggestion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let storage = StorageError::from_io(io, PathBuf::from("/library"));
        let err = anyhow::Error::new(Error::Storage(storage)).context("Failed to list novels");
        assert!(storage_suggestion(&err).is_some());

        let err = anyhow::anyhow!("unrelated");
        assert!(storage_suggestion(&err).is_none());
    }

    #[test]
    fn test_parse_progress() {
        let cli = Cli::try_parse_from(["shelf", "progress", "abc", "500"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Progress { ref id, position: 500 } if id == "abc"
        ));
    }
}

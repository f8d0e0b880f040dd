//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/novelshelf/config.toml)
//! 3. Environment variables (NOVELSHELF_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix
const ENV_PREFIX: &str = "NOVELSHELF";

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for the library database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Where exported `.txt` files are written (defaults to the download dir)
    #[serde(default)]
    pub export_dir: Option<PathBuf>,

    /// Timeout for URL imports, in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// User agent sent with URL imports
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Log level for the CLI (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            export_dir: None,
            fetch_timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (NOVELSHELF_DATA_DIR, NOVELSHELF_EXPORT_DIR, ...)
    /// 2. Config file (~/.config/novelshelf/config.toml or NOVELSHELF_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Configuration rooted at a specific data directory, ignoring files and env
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_EXPORT_DIR", ENV_PREFIX)) {
            self.export_dir = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        if let Ok(val) = std::env::var(format!("{}_FETCH_TIMEOUT", ENV_PREFIX)) {
            match val.parse() {
                Ok(secs) => self.fetch_timeout_secs = secs,
                Err(_) => tracing::warn!(value = %val, "ignoring invalid {}_FETCH_TIMEOUT", ENV_PREFIX),
            }
        }

        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.log_level = val;
            }
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with NOVELSHELF_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("novelshelf")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("novelshelf.db")
    }

    /// Directory exports are written to
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| self.data_dir.join("exports"))
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("novelshelf")
}

fn default_fetch_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    format!("novelshelf/{}", env!("CARGO_PKG_VERSION"))
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "NOVELSHELF_DATA_DIR",
        "NOVELSHELF_EXPORT_DIR",
        "NOVELSHELF_FETCH_TIMEOUT",
        "NOVELSHELF_LOG_LEVEL",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.export_dir.is_none());
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.log_level, "info");
        assert!(config.user_agent.starts_with("novelshelf/"));
        assert!(config.data_dir.ends_with("novelshelf"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::with_data_dir("/data/shelf");
        assert_eq!(config.sqlite_path(), PathBuf::from("/data/shelf/novelshelf.db"));
    }

    #[test]
    fn test_explicit_export_dir_wins() {
        let mut config = Config::with_data_dir("/data/shelf");
        config.export_dir = Some(PathBuf::from("/exports"));
        assert_eq!(config.export_dir(), PathBuf::from("/exports"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("NOVELSHELF_DATA_DIR", "/tmp/novelshelf-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/novelshelf-test"));
    }

    #[test]
    fn test_env_override_fetch_timeout() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("NOVELSHELF_FETCH_TIMEOUT", "5");
        config.apply_env_overrides();
        assert_eq!(config.fetch_timeout_secs, 5);

        // Garbage is ignored
        env::set_var("NOVELSHELF_FETCH_TIMEOUT", "soon");
        config.apply_env_overrides();
        assert_eq!(config.fetch_timeout_secs, 5);
    }

    #[test]
    fn test_env_override_export_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("NOVELSHELF_EXPORT_DIR", "/srv/exports");
        config.apply_env_overrides();
        assert_eq!(config.export_dir, Some(PathBuf::from("/srv/exports")));

        // Empty string clears it
        env::set_var("NOVELSHELF_EXPORT_DIR", "");
        config.apply_env_overrides();
        assert!(config.export_dir.is_none());
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/shelf"),
            export_dir: Some(PathBuf::from("/data/exports")),
            fetch_timeout_secs: 12,
            user_agent: "test-agent".to_string(),
            log_level: "debug".to_string(),
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("fetch_timeout_secs"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.export_dir, config.export_dir);
        assert_eq!(parsed.fetch_timeout_secs, 12);
        assert_eq!(parsed.user_agent, "test-agent");
        assert_eq!(parsed.log_level, "debug");
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            fetch_timeout_secs = 60
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.fetch_timeout_secs, 60);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_save_uses_config_env_path() {
        let _guard = EnvGuard::new(&[
            "NOVELSHELF_CONFIG",
            "NOVELSHELF_DATA_DIR",
            "NOVELSHELF_EXPORT_DIR",
            "NOVELSHELF_FETCH_TIMEOUT",
            "NOVELSHELF_LOG_LEVEL",
        ]);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/config.toml");
        env::set_var("NOVELSHELF_CONFIG", &path);

        let mut config = Config::with_data_dir(temp_dir.path().join("data"));
        config.fetch_timeout_secs = 7;
        config.save().unwrap();

        assert!(path.exists());
        let loaded = Config::load().unwrap();
        assert_eq!(loaded.fetch_timeout_secs, 7);
        assert_eq!(loaded.data_dir, config.data_dir);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::with_data_dir(temp_dir.path().join("data"));
        config.log_level = "warn".to_string();
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.data_dir, config.data_dir);
        assert_eq!(loaded.log_level, "warn");
        assert!(loaded.data_dir.exists());
    }
}

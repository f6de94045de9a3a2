//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration only: where the root folder lives, which port to
//! bind, logging level, and secrets that may live outside the database.
//! Everything that can change at runtime lives in the `settings` table
//! (see [`crate::db::settings`]).
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `MTA_ROOT_FOLDER`
//! 3. TOML config file `root_folder`
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "MTA_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "mta.db";

/// Bootstrap configuration loaded from TOML
///
/// Every field is optional; a missing or unreadable file yields the default
/// value and a warning, never a startup failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP port
    #[serde(default)]
    pub port: Option<u16>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Anthropic API key for the content generator
    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    /// Shared secret for payment-provider webhooks
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Email of the bootstrap administrator
    #[serde(default)]
    pub admin_email: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load from the platform config location, falling back to defaults
    pub fn load_or_default() -> Self {
        match config_file_path() {
            Some(path) => match Self::load_from(&path) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("{} (using defaults)", e);
                    Self::default()
                }
            },
            None => {
                info!("No configuration file found, using defaults");
                Self::default()
            }
        }
    }
}

/// Write TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Locate the configuration file for the platform
///
/// Linux checks `~/.config/mta/config.toml` then `/etc/mta/config.toml`.
pub fn config_file_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("mta").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/mta/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Compiled-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub port: u16,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("mta"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\mta"))
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .map(|d| d.join("mta"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/mta"))
        } else {
            dirs::data_local_dir()
                .map(|d| d.join("mta"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/mta"))
        };

        Self {
            root_folder,
            port: 5780,
            log_level: default_log_level(),
        }
    }
}

/// Resolves the root folder following the priority order above
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml: Option<TomlConfig>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self {
            cli_arg: None,
            toml: None,
        }
    }

    /// Command-line override
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// TOML config already loaded by the caller
    pub fn with_toml(mut self, toml: &TomlConfig) -> Self {
        self.toml = Some(toml.clone());
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = self.toml.as_ref().and_then(|t| t.root_folder.clone()) {
            return path;
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

impl Default for RootFolderResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates the root folder and derives file paths inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }
}

/// A secret that may live in the database, the environment, or TOML
#[derive(Debug, Clone, Copy)]
pub struct SecretSpec {
    /// Settings table key (highest priority)
    pub settings_key: &'static str,
    /// Environment variables, checked in order
    pub env_vars: &'static [&'static str],
}

pub const ANTHROPIC_API_KEY: SecretSpec = SecretSpec {
    settings_key: "anthropic_api_key",
    env_vars: &["MTA_ANTHROPIC_API_KEY", "ANTHROPIC_API_KEY"],
};

pub const WEBHOOK_SECRET: SecretSpec = SecretSpec {
    settings_key: "webhook_secret",
    env_vars: &["MTA_WEBHOOK_SECRET"],
};

/// Non-empty, non-whitespace
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve a secret with Database → ENV → TOML priority
///
/// Returns `None` when no source holds a valid value. Logs a warning when
/// more than one source is populated.
pub async fn resolve_secret(
    db: &SqlitePool,
    spec: SecretSpec,
    toml_value: Option<&str>,
) -> Result<Option<String>> {
    let db_value = crate::db::settings::get_setting::<String>(db, spec.settings_key)
        .await?
        .filter(|v| is_valid_key(v));

    let env_value = spec
        .env_vars
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|v| is_valid_key(v));

    let toml_value = toml_value.filter(|v| is_valid_key(v)).map(str::to_string);

    let mut sources = Vec::new();
    if db_value.is_some() {
        sources.push("database");
    }
    if env_value.is_some() {
        sources.push("environment");
    }
    if toml_value.is_some() {
        sources.push("TOML");
    }
    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            spec.settings_key,
            sources.join(", "),
            sources[0]
        );
    }

    Ok(db_value.or(env_value).or(toml_value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   \t"));
    }

    #[test]
    fn test_toml_defaults_when_fields_missing() {
        let config: TomlConfig = toml::from_str("port = 6000").unwrap();
        assert_eq!(config.port, Some(6000));
        assert!(config.root_folder.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_cli_arg_wins() {
        let resolver = RootFolderResolver::new().with_cli_arg(Some(PathBuf::from("/tmp/cli")));
        assert_eq!(resolver.resolve(), PathBuf::from("/tmp/cli"));
    }

    #[test]
    fn test_database_path_inside_root() {
        let init = RootFolderInitializer::new(PathBuf::from("/srv/mta"));
        assert_eq!(init.database_path(), PathBuf::from("/srv/mta/mta.db"));
    }
}

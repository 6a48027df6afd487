//! Configuration management for deaddrop
//!
//! Layered the same way for every entry point: built-in defaults, then an
//! optional TOML file, then `DEADDROP_*` environment variables. Nothing in the
//! library reads a global path on its own; every component receives the
//! locations it needs from a [`Config`] value.

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

mod error;

pub use error::ConfigError;

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "DEADDROP_";

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the recipient registry is persisted
    pub registry_path: PathBuf,

    /// Where per-mailbox git working copies live
    pub cache_dir: PathBuf,

    /// GnuPG executable
    pub gpg_program: PathBuf,

    /// git executable
    pub git_program: PathBuf,

    /// Base URL of the gist REST API
    pub gist_api_base: String,

    /// Optional token sent as a bearer credential on fetch
    pub github_token: Option<String>,

    /// Name of the single file that holds a published message
    pub payload_file: String,

    /// Commit message used for every published revision
    pub commit_message: String,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for Config {
    fn default() -> Self {
        let config_root = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        let cache_root = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            registry_path: config_root.join("deaddrop").join("receivers.json"),
            cache_dir: cache_root.join("deaddrop"),
            gpg_program: PathBuf::from("gpg"),
            git_program: PathBuf::from("git"),
            gist_api_base: "https://api.github.com".to_string(),
            github_token: None,
            payload_file: "text.txt".to_string(),
            commit_message: "updates".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: false,
        }
    }
}

impl Config {
    /// Resolve the effective configuration.
    ///
    /// Reads `path` when given (a missing file is an error here, since the
    /// caller asked for it explicitly), then applies process environment
    /// overrides and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::FileReadError(format!("{}: {}", path.display(), e))
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply `DEADDROP_*` overrides fetched through `lookup`.
    ///
    /// `lookup` receives the full variable name and returns its value, which
    /// keeps the process environment out of unit tests.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(&format!("{}{}", ENV_PREFIX, key));

        if let Some(path) = var("REGISTRY_PATH") {
            self.registry_path = PathBuf::from(path);
        }
        if let Some(dir) = var("CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(gpg) = var("GPG") {
            self.gpg_program = PathBuf::from(gpg);
        }
        if let Some(git) = var("GIT") {
            self.git_program = PathBuf::from(git);
        }
        if let Some(base) = var("GIST_API") {
            self.gist_api_base = base;
        }
        if let Some(token) = var("GITHUB_TOKEN") {
            self.github_token = (!token.is_empty()).then_some(token);
        }
        if let Some(name) = var("PAYLOAD_FILE") {
            self.payload_file = name;
        }

        // Logging config
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = var("LOG_JSON") {
            self.logging.json_format = json
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid JSON flag: {}", e)))?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gpg_program.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "gpg_program must not be empty".to_string(),
            ));
        }

        if self.git_program.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "git_program must not be empty".to_string(),
            ));
        }

        if self.registry_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "registry_path must not be empty".to_string(),
            ));
        }

        if self.payload_file.is_empty()
            || self.payload_file == ".git"
            || self.payload_file.contains(['/', '\\'])
        {
            return Err(ConfigError::ValidationFailed(format!(
                "payload_file must be a plain file name, got '{}'",
                self.payload_file
            )));
        }

        if self.commit_message.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "commit_message must not be empty".to_string(),
            ));
        }

        if !(self.gist_api_base.starts_with("https://")
            || self.gist_api_base.starts_with("http://"))
        {
            return Err(ConfigError::ValidationFailed(format!(
                "gist_api_base must be an http(s) URL, got '{}'",
                self.gist_api_base
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "warning", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}

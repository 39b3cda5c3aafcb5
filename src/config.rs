//! Configuration: optional `~/.config/hatebu-import/config.toml` plus command-line overrides.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning for each so typos
//! are visible. Command-line values always win over the file.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::import::DEFAULT_API_URL;
use crate::types::SaveState;

/// Environment variable consulted for the API token when `--token` is absent.
pub const TOKEN_ENV_VAR: &str = "OMNIVORE_API_TOKEN";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

/// Reasons a run cannot start.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Input file path is required")]
    MissingInput,

    #[error("API token is required (use --token or OMNIVORE_API_TOKEN)")]
    MissingToken,

    #[error("Invalid API URL '{url}': {source}")]
    InvalidApiUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl SettingsError {
    /// Missing required values are a usage problem, not a failure.
    pub fn is_usage(&self) -> bool {
        matches!(self, SettingsError::MissingInput | SettingsError::MissingToken)
    }
}

// ============================================================================
// Config File
// ============================================================================

/// Values read from the config file.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
///
/// SEC-015: Custom Debug impl masks `api_token`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GraphQL endpoint of the import API.
    pub api_url: String,

    /// API token (alternative to the OMNIVORE_API_TOKEN env var).
    pub api_token: Option<String>,

    /// Import every bookmark as archived.
    pub archive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            archive: false,
        }
    }
}

/// SEC-015: Mask api_token in Debug output to prevent secret leakage.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("archive", &self.archive)
            .finish()
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 3] = ["api_url", "api_token", "archive"];

    /// Default location: `$HOME/.config/hatebu-import/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("hatebu-import")
                .join("config.toml"),
        )
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), api_url = %config.api_url, "Loaded configuration");
        Ok(config)
    }
}

// ============================================================================
// Resolved Settings
// ============================================================================

/// Values supplied on the command line. `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub input: Option<PathBuf>,
    pub archive: bool,
    pub token: Option<String>,
    pub api_url: Option<String>,
    pub output: Option<PathBuf>,
}

/// Where the encoded CSV goes.
#[derive(Debug)]
pub enum Destination {
    /// Request a signed URL and upload to it.
    Upload { api_url: Url, token: SecretString },
    /// Write the CSV to a file, or stdout for `-`.
    Write(PathBuf),
}

/// Fully resolved run configuration, passed explicitly to each stage.
#[derive(Debug)]
pub struct Settings {
    pub input: PathBuf,
    pub state: SaveState,
    pub destination: Destination,
}

impl Settings {
    /// Merges command line, environment token and config file.
    ///
    /// Precedence for each value: command line, then `env_token`, then `config`.
    /// A token is only required when uploading.
    pub fn resolve(
        overrides: Overrides,
        env_token: Option<String>,
        config: &Config,
    ) -> Result<Self, SettingsError> {
        let input = overrides.input.ok_or(SettingsError::MissingInput)?;
        let state = SaveState::from_archive_flag(overrides.archive || config.archive);

        let destination = match overrides.output {
            Some(path) => Destination::Write(path),
            None => {
                let token = overrides
                    .token
                    .or(env_token)
                    .or_else(|| config.api_token.clone())
                    .filter(|t| !t.trim().is_empty())
                    .ok_or(SettingsError::MissingToken)?;

                let raw_url = overrides.api_url.unwrap_or_else(|| config.api_url.clone());
                let api_url = Url::parse(&raw_url)
                    .map_err(|source| SettingsError::InvalidApiUrl { url: raw_url, source })?;

                Destination::Upload {
                    api_url,
                    token: SecretString::from(token),
                }
            }
        };

        Ok(Self {
            input,
            state,
            destination,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

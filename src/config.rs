//! Configuration management for moodtrack using the prefer crate.
//!
//! Precedence, lowest to highest: built-in defaults, config file,
//! environment variables, command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::client::{ClientConfig, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};

/// Name used for config file discovery (`moodtrack.toml`, `moodtrack.yaml`, ...).
pub const CONFIG_NAME: &str = "moodtrack";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config '{path}': {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Application settings after all sources are merged.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Base URL of the analysis service.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Directory where rendered images are written.
    pub image_dir: PathBuf,
    /// Config file the settings were loaded from, if any.
    pub config_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: DEFAULT_TIMEOUT.as_secs(),
            image_dir: PathBuf::from("."),
            config_path: None,
        }
    }
}

impl Settings {
    /// Client configuration derived from these settings.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_endpoint(&self.endpoint)
            .with_timeout(Duration::from_secs(self.request_timeout))
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `MOODTRACK_ENDPOINT`: analysis service base URL
    /// - `MOODTRACK_TIMEOUT`: request timeout in seconds
    /// - `MOODTRACK_IMAGE_DIR`: where to write images (`~` is expanded)
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(endpoint) = lookup("MOODTRACK_ENDPOINT") {
            debug!("Endpoint overridden from environment: {}", endpoint);
            self.endpoint = endpoint;
        }
        if let Some(timeout) = lookup("MOODTRACK_TIMEOUT") {
            self.request_timeout = parse_timeout("MOODTRACK_TIMEOUT", &timeout)?;
        }
        if let Some(dir) = lookup("MOODTRACK_IMAGE_DIR") {
            self.image_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
        }
        Ok(self)
    }

    /// Check values that would otherwise fail later in confusing ways.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "endpoint".to_string(),
                message: format!("'{}' is not an http(s) URL", self.endpoint),
            });
        }
        if self.request_timeout == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout".to_string(),
                message: "must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_timeout(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        message: format!("'{}' is not a number of seconds", value),
    })
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, prefer::FromValue)]
pub struct Config {
    /// Analysis service base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[prefer(default)]
    pub endpoint: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[prefer(default)]
    pub request_timeout: Option<u64>,
    /// Image output directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[prefer(default)]
    pub image_dir: Option<String>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    #[prefer(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to defaults when no config file is found.
    pub async fn load() -> Result<Self, ConfigError> {
        match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await,
                None => Ok(Self::default()),
            },
            Err(e) => {
                debug!("No config file discovered: {}", e);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file path.
    /// Format is chosen by extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |format: &'static str, message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            format,
            message,
        };

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| parse_err("TOML", e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| parse_err("YAML", e.to_string()))?
            }
            _ => serde_json::from_str(&contents).map_err(|e| parse_err("JSON", e.to_string()))?,
        };

        debug!("Loaded config from {}", path.display());
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        let base_dir = self.base_dir().unwrap_or_else(|| PathBuf::from("."));
        if let Some(ref endpoint) = self.endpoint {
            settings.endpoint = endpoint.clone();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(ref dir) = self.image_dir {
            settings.image_dir = self.resolve_path(dir, &base_dir);
        }
        settings.config_path = self.source_path.clone();
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Endpoint from the command line.
    pub endpoint: Option<String>,
    /// Timeout from the command line, in seconds.
    pub timeout: Option<u64>,
}

/// Load settings from every source and validate the result.
pub async fn load_settings(options: &LoadOptions) -> Result<Settings, ConfigError> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await?,
    };

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);
    let mut settings = settings.with_env_overrides()?;

    if let Some(ref endpoint) = options.endpoint {
        settings.endpoint = endpoint.clone();
    }
    if let Some(timeout) = options.timeout {
        settings.request_timeout = timeout;
    }

    settings.validate()?;
    Ok(settings)
}

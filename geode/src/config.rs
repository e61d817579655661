//! Server configuration, read from a JSON5 file.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use geode_core::{EngineConfig, LayerConfig, LayerTable};
use geode_locate::LocateConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding the config path.
pub const CONFIG_PATH_ENV: &str = "GEODE_CONFIG";
/// Config path used when the environment variable is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/geode.json5";

/// An error that can occur while loading the config file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("Config file {path}: {source}")]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The file is not valid JSON5 or does not match the schema.
    #[error("Failed to parse config file {path}: {message}")]
    Parse {
        /// Path of the config file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
    /// The default config could not be rendered.
    #[error("Failed to render default config: {0}")]
    Render(#[from] serde_json::Error),
}

const fn default_request_timeout_ms() -> u64 {
    5_000
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeodeConfig {
    /// Longest time a single generation request may run before it is abandoned.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Mineral engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Location lookup settings.
    #[serde(default)]
    pub locate: LocateConfig,
}

impl Default for GeodeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            engine: EngineConfig::default(),
            locate: LocateConfig::default(),
        }
    }
}

impl GeodeConfig {
    /// The request timeout as a duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// The config path from the environment, or the default path.
    #[must_use]
    pub fn path_from_env() -> PathBuf {
        env::var_os(CONFIG_PATH_ENV).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
    }

    /// Parse a config from JSON5 text.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_json5::from_str(text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load the config, writing the defaults first if the file does not exist.
    ///
    /// The written defaults spell out the built-in layer table so it can be edited.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text, path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let mut config = Self::default();
                config.engine.layers = Some(
                    LayerTable::default()
                        .layers()
                        .iter()
                        .map(LayerConfig::from)
                        .collect(),
                );
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(io_err)?;
                }
                fs::write(path, serde_json::to_string_pretty(&config)?).map_err(io_err)?;
                log::info!("Wrote default config to {}", path.display());
                Ok(config)
            }
            Err(e) => Err(io_err(e)),
        }
    }
}

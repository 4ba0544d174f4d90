// src/config.rs - Settings file and tiered configuration lookup
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::data::LoggingConfig;
use crate::flight::FlightConfig;
use crate::game::GameConfig;
use crate::smoothing::SmootherConfig;
use crate::tracking::TrackerConfig;

/// Selects the environment-specific override tier, e.g. `DisplayConfig.test.json`.
pub const DISPLAY_ENV_VAR: &str = "WINGFLAP_DISPLAY_ENV";
const DEFAULT_ENV: &str = "test";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Which tier a configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Override(PathBuf),
    Production(PathBuf),
    Default(PathBuf),
    BuiltIn,
}

pub fn display_env() -> String {
    std::env::var(DISPLAY_ENV_VAR).unwrap_or_else(|_| DEFAULT_ENV.to_string())
}

fn read_json<T>(path: &Path, parse: &impl Fn(&str) -> Result<T, serde_json::Error>) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Try `<stem>.<env>.json`, then `<stem>.json`, then `<stem>.default.json` in `dir`.
///
/// Returns `None` when no tier could be loaded; the caller supplies the built-in value.
pub fn load_tiered<T>(
    dir: &Path,
    stem: &str,
    env: &str,
    parse: impl Fn(&str) -> Result<T, serde_json::Error>,
) -> Option<(T, ConfigSource)> {
    let tiers: [(PathBuf, fn(PathBuf) -> ConfigSource); 3] = [
        (dir.join(format!("{}.{}.json", stem, env)), ConfigSource::Override),
        (dir.join(format!("{}.json", stem)), ConfigSource::Production),
        (dir.join(format!("{}.default.json", stem)), ConfigSource::Default),
    ];

    for (path, source) in tiers {
        if !path.exists() {
            info!("{} not found, trying next configuration tier", path.display());
            continue;
        }
        match read_json(&path, &parse) {
            Ok(value) => {
                info!("loaded configuration from {}", path.display());
                return Some((value, source(path)));
            }
            Err(e) => warn!("{}", e),
        }
    }

    None
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tracker: TrackerConfig,
    pub smoother: SmootherConfig,
    pub flight: FlightConfig,
    pub game: GameConfig,
    pub logging: LoggingConfig,
    /// Folder holding the DisplayConfig tiers
    pub display_config_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            smoother: SmootherConfig::default(),
            flight: FlightConfig::default(),
            game: GameConfig::default(),
            logging: LoggingConfig::default(),
            display_config_dir: PathBuf::from("config"),
        }
    }
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let settings = serde_json::from_str(&content)
            .with_context(|| format!("parsing settings in {}", path.display()))?;
        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file is missing or broken.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("{:#}; using default settings", e);
                Self::default()
            }
        }
    }
}

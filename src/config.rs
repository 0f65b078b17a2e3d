use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = ".stub-ledger.toml";

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "STUB_LEDGER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How call-site traces are attached to violations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceConfig {
    /// Capture a backtrace for every violation
    #[serde(default = "default_capture")]
    pub capture: bool,
    /// Minimum number of leading frames stripped from a captured trace
    #[serde(default = "default_skip_frames")]
    pub skip_frames: usize,
    /// Upper bound on frames kept in a violation message
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,
}

fn default_capture() -> bool {
    true
}

fn default_skip_frames() -> usize {
    2
}

fn default_max_frames() -> usize {
    16
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            capture: default_capture(),
            skip_frames: default_skip_frames(),
            max_frames: default_max_frames(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LoggingConfig {
    /// Default level for the `stub_ledger` target (e.g. "debug")
    #[serde(default)]
    pub level: Option<String>,
    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: Option<bool>,
}

impl Config {
    /// Load configuration from `STUB_LEDGER_CONFIG` or the working directory
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path, defaults when the file is missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| {
            LedgerError::FileError(format!(
                "Failed to read config file {:?}: {}",
                config_path, e
            ))
        })?;

        Self::parse(&content).map_err(|e| {
            LedgerError::ConfigError(format!(
                "Failed to parse TOML config from {:?}: {}",
                config_path, e
            ))
            .into()
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load default config if file is missing, otherwise warn on parse failure
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config: {}. Using defaults.", e);
                Config::default()
            }
        }
    }

    fn config_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }
}

//! Configuration loaded from a TOML file and environment variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::capture::SessionConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture interface; empty selects the first wireless device
    pub device: String,

    /// Snapshot length in bytes
    pub snapshot_length: i32,

    /// Read timeout in seconds
    pub timeout: u64,

    /// beacon, probe-req, probe-resp, or anything else for all three
    pub filter: String,

    pub output: OutputConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JSON-lines file frames are appended to
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log at debug level
    pub verbose: bool,

    /// Also append logs to this file when non-empty
    pub file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: String::new(),
            snapshot_length: 65535,
            timeout: 1,
            filter: "all".to_string(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("frames.jsonl"),
        }
    }
}

impl Config {
    /// Load `path` (defaults when the file does not exist), then apply
    /// environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Override fields from `WARPATH_*` variables. Unparseable numbers are
    /// ignored.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(device) = var("WARPATH_DEVICE") {
            self.device = device;
        }

        if let Some(snaplen) = var("WARPATH_SNAPLEN").and_then(|s| s.parse().ok()) {
            self.snapshot_length = snaplen;
        }

        if let Some(timeout) = var("WARPATH_TIMEOUT").and_then(|s| s.parse().ok()) {
            self.timeout = timeout;
        }

        if let Some(filter) = var("WARPATH_FILTER") {
            self.filter = filter;
        }

        if let Some(output) = var("WARPATH_OUTPUT") {
            self.output.path = PathBuf::from(output);
        }
    }

    /// Capture handle settings; monitor and promiscuous mode are always on
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            snaplen: self.snapshot_length,
            timeout: Duration::from_secs(self.timeout),
            ..SessionConfig::default()
        }
    }
}

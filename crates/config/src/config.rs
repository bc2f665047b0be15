//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Broker URL uses a scheme the spool queue cannot serve
    InvalidBroker(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::InvalidBroker(url) => {
                write!(f, "Unsupported broker url '{}': expected file:// or a path", url)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Proxy storage layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    /// Root of the proxy tree. Source directory structure is mirrored below it.
    #[serde(default = "default_proxy_path_root")]
    pub proxy_path_root: PathBuf,
    /// Separator between a proxy's stem and its revision number (`clip_v2.mov`)
    #[serde(default = "default_revision_sep")]
    pub revision_sep: String,
}

fn default_proxy_path_root() -> PathBuf {
    PathBuf::from("/proxies")
}

fn default_revision_sep() -> String {
    "_v".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            proxy_path_root: default_proxy_path_root(),
            revision_sep: default_revision_sep(),
        }
    }
}

/// Timeline item filters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FiltersConfig {
    /// Extensions a timeline item name must contain to be considered (case-insensitive)
    #[serde(default = "default_acceptable_exts")]
    pub acceptable_exts: Vec<String>,
}

fn default_acceptable_exts() -> Vec<String> {
    [".mov", ".mp4", ".mxf", ".mkv", ".avi"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            acceptable_exts: default_acceptable_exts(),
        }
    }
}

/// Queue broker settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerConfig {
    /// Broker endpoint. The spool queue accepts `file:///dir` or a bare path.
    #[serde(default = "default_broker_url")]
    pub url: String,
    /// How long finished group results are retained, in seconds
    #[serde(default = "default_result_expires_secs")]
    pub result_expires_secs: u64,
}

fn default_broker_url() -> String {
    "file:///var/spool/proxy-queue".to_string()
}

fn default_result_expires_secs() -> u64 {
    86_400
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: default_broker_url(),
            result_expires_secs: default_result_expires_secs(),
        }
    }
}

impl BrokerConfig {
    /// Resolve the broker url to the spool directory it points at.
    pub fn spool_dir(&self) -> Result<PathBuf, ConfigError> {
        let url = self.url.trim();
        if let Some(rest) = url.strip_prefix("file://") {
            if rest.is_empty() {
                return Err(ConfigError::InvalidBroker(self.url.clone()));
            }
            return Ok(PathBuf::from(rest));
        }
        if url.is_empty() || url.contains("://") {
            return Err(ConfigError::InvalidBroker(self.url.clone()));
        }
        Ok(PathBuf::from(url))
    }
}

/// Options workers must honour when consuming the queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    /// Jobs a single worker runs at once
    #[serde(default = "default_one")]
    pub concurrency: u32,
    /// Jobs a worker may hold claimed ahead of running them
    #[serde(default = "default_one")]
    pub prefetch_multiplier: u32,
    /// Acknowledge a job only once it has started, so a crashed worker's job is requeued
    #[serde(default = "default_acks_late")]
    pub acks_late: bool,
}

fn default_one() -> u32 {
    1
}

fn default_acks_late() -> bool {
    true
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            prefetch_multiplier: 1,
            acks_late: true,
        }
    }
}

/// Job monitor settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and fields fall back to their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - PROXY_PATH_ROOT -> paths.proxy_path_root
    /// - PROXY_REVISION_SEP -> paths.revision_sep
    /// - BROKER_URL -> broker.url
    /// - BROKER_RESULT_EXPIRES -> broker.result_expires_secs
    /// - MONITOR_POLL_INTERVAL_MS -> monitor.poll_interval_ms
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("PROXY_PATH_ROOT") {
            if !val.is_empty() {
                self.paths.proxy_path_root = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("PROXY_REVISION_SEP") {
            if !val.is_empty() {
                self.paths.revision_sep = val;
            }
        }

        if let Ok(val) = env::var("BROKER_URL") {
            if !val.is_empty() {
                self.broker.url = val;
            }
        }

        if let Ok(val) = env::var("BROKER_RESULT_EXPIRES") {
            if let Ok(secs) = val.parse::<u64>() {
                self.broker.result_expires_secs = secs;
            }
        }

        if let Ok(val) = env::var("MONITOR_POLL_INTERVAL_MS") {
            // A zero interval would spin the monitor
            if let Ok(ms) = val.parse::<u64>() {
                if ms > 0 {
                    self.monitor.poll_interval_ms = ms;
                }
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults with environment overrides applied, for runs without a config file
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }
}

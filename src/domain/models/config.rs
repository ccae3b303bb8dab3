use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::review::LoopConfig;
use super::scorecard::default_dimensions;

/// Main configuration structure for the quality loop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Where session records live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Default stop conditions for new review loops
    #[serde(default)]
    pub review: LoopConfig,

    /// Scorecard dimensions
    #[serde(default)]
    pub scorecard: ScorecardConfig,

    /// Current sensitivity per check id (unlisted checks use 1.0)
    #[serde(default)]
    pub thresholds: BTreeMap<String, f64>,
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One directory of JSON documents per session
    #[default]
    File,
    /// `SQLite` database shared by all sessions
    Sqlite,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the file backend
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Database URL for the `SQLite` backend
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from(".quality-loop/sessions")
}

fn default_database_url() -> String {
    "sqlite:.quality-loop/quality.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root: default_storage_root(),
            database_url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// Also write to stderr when logging to files
    #[serde(default = "default_true")]
    pub enable_stderr: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

const fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
            enable_stderr: true,
        }
    }
}

/// Scorecard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScorecardConfig {
    /// Standard dimension names every artifact should be scored on
    #[serde(default = "default_dimensions")]
    pub dimensions: Vec<String>,

    /// Scores below this are weak
    #[serde(default = "default_weak_threshold")]
    pub weak_threshold: f64,
}

const fn default_weak_threshold() -> f64 {
    6.0
}

impl Default for ScorecardConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
            weak_threshold: default_weak_threshold(),
        }
    }
}

use std::path::Path;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::check::validate_check_id;
use crate::domain::models::config::Config;
use crate::domain::models::review::MIN_STAGNATION_WINDOW;
use crate::domain::models::scorecard::{MAX_SCORE, MIN_SCORE, validate_dimension};

/// Directory holding project configuration, relative to the working directory
pub const CONFIG_DIR: &str = ".quality-loop";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "QUALITY_LOOP_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_rounds: {0}. Must be at least 1")]
    InvalidMaxRounds(u32),

    #[error("Invalid quality_threshold: {0}. Must be between 0 and 10")]
    InvalidQualityThreshold(f64),

    #[error("Invalid stagnation_window: {0}. Must be at least 2")]
    InvalidStagnationWindow(usize),

    #[error("Invalid stagnation_delta: {0}. Must be a non-negative number")]
    InvalidStagnationDelta(f64),

    #[error("Invalid weight {weight} for dimension '{dimension}'. Must be a non-negative number")]
    InvalidWeight { dimension: String, weight: f64 },

    #[error("Invalid weak_threshold: {0}. Must be between 0 and 10")]
    InvalidWeakThreshold(f64),

    #[error("Scorecard dimension list cannot be empty")]
    EmptyDimensions,

    #[error("Invalid sensitivity {value} for check '{check_id}'. Must be positive")]
    InvalidSensitivity { check_id: String, value: f64 },

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Storage root cannot be empty")]
    EmptyStorageRoot,

    #[error("Database URL cannot be empty")]
    EmptyDatabaseUrl,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the current working directory
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .quality-loop/config.yaml (project config)
    /// 3. .quality-loop/local.yaml (local overrides, optional)
    /// 4. Environment variables (QUALITY_LOOP_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Load configuration rooted at `project_dir`
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Config> {
        let dir = project_dir.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        // Storage
        if config.storage.root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStorageRoot);
        }
        if config.storage.database_url.trim().is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }
        if config.storage.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.storage.max_connections,
            ));
        }

        // Logging
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        // Review loop defaults
        let review = &config.review;
        if review.max_rounds == 0 {
            return Err(ConfigError::InvalidMaxRounds(review.max_rounds));
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&review.quality_threshold) {
            return Err(ConfigError::InvalidQualityThreshold(review.quality_threshold));
        }
        if review.stagnation_window < MIN_STAGNATION_WINDOW {
            return Err(ConfigError::InvalidStagnationWindow(review.stagnation_window));
        }
        if !review.stagnation_delta.is_finite() || review.stagnation_delta < 0.0 {
            return Err(ConfigError::InvalidStagnationDelta(review.stagnation_delta));
        }
        for (dimension, weight) in &review.weights {
            validate_dimension(dimension)
                .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;
            if !weight.is_finite() || *weight < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    dimension: dimension.clone(),
                    weight: *weight,
                });
            }
        }

        // Scorecard
        if config.scorecard.dimensions.is_empty() {
            return Err(ConfigError::EmptyDimensions);
        }
        for dimension in &config.scorecard.dimensions {
            validate_dimension(dimension)
                .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&config.scorecard.weak_threshold) {
            return Err(ConfigError::InvalidWeakThreshold(
                config.scorecard.weak_threshold,
            ));
        }

        // Current check sensitivities
        for (check_id, value) in &config.thresholds {
            validate_check_id(check_id)
                .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;
            if !value.is_finite() || *value <= 0.0 {
                return Err(ConfigError::InvalidSensitivity {
                    check_id: check_id.clone(),
                    value: *value,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;
    use std::path::PathBuf;

    use tempfile::{NamedTempFile, TempDir};

    use super::*;
    use crate::domain::models::config::StorageBackend;

    fn write_project_config(dir: &TempDir, name: &str, contents: &str) {
        let config_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.root, PathBuf::from(".quality-loop/sessions"));
        assert_eq!(config.review.max_rounds, 5);
        assert_eq!(config.review.stagnation_window, 2);
        assert_eq!(config.scorecard.dimensions.len(), 8);
        assert_eq!(config.logging.level, "warn");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
storage:
  backend: sqlite
  database_url: sqlite:/tmp/quality.db
review:
  max_rounds: 3
  quality_threshold: 7.5
  weights:
    accuracy: 2.0
scorecard:
  dimensions: [accuracy, clarity]
thresholds:
  citation_format: 1.2
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.database_url, "sqlite:/tmp/quality.db");
        assert_eq!(config.storage.max_connections, 5);
        assert_eq!(config.review.max_rounds, 3);
        assert!((config.review.quality_threshold - 7.5).abs() < f64::EPSILON);
        assert_eq!(config.review.stagnation_window, 2);
        assert_eq!(config.review.weight_for("accuracy"), 2.0);
        assert_eq!(config.scorecard.dimensions, vec!["accuracy", "clarity"]);
        assert!((config.scorecard.weak_threshold - 6.0).abs() < f64::EPSILON);
        assert_eq!(config.thresholds.get("citation_format"), Some(&1.2));
        assert_eq!(config.logging.format, "json");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_zero_max_rounds() {
        let mut config = Config::default();
        config.review.max_rounds = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxRounds(0))
        ));
    }

    #[test]
    fn test_validate_threshold_out_of_range() {
        let mut config = Config::default();
        config.review.quality_threshold = 11.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidQualityThreshold(_))
        ));
    }

    #[test]
    fn test_validate_short_window() {
        let mut config = Config::default();
        config.review.stagnation_window = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidStagnationWindow(0))
        ));
        config.review.stagnation_window = 1;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidStagnationWindow(1))
        ));
    }

    #[test]
    fn test_validate_negative_weight() {
        let mut config = Config::default();
        config.review.weights.insert("style".to_string(), -1.0);
        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidWeight { dimension, .. }) => assert_eq!(dimension, "style"),
            other => panic!("Expected InvalidWeight error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_empty_dimensions() {
        let mut config = Config::default();
        config.scorecard.dimensions.clear();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyDimensions)
        ));
    }

    #[test]
    fn test_validate_non_positive_sensitivity() {
        let mut config = Config::default();
        config.thresholds.insert("passive_voice".to_string(), 0.0);
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidSensitivity { .. })
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_rotation() {
        let mut config = Config::default();
        config.logging.rotation = "weekly".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRotation(_))
        ));
    }

    #[test]
    fn test_validate_empty_storage_root() {
        let mut config = Config::default();
        config.storage.root = PathBuf::new();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyStorageRoot)
        ));
    }

    #[test]
    fn test_local_overrides_project_config() {
        let dir = TempDir::new().unwrap();
        write_project_config(
            &dir,
            "config.yaml",
            "review:\n  max_rounds: 4\n  quality_threshold: 7.0\nlogging:\n  format: json\n",
        );
        write_project_config(&dir, "local.yaml", "review:\n  max_rounds: 6\n");

        temp_env::with_vars_unset(
            ["QUALITY_LOOP_REVIEW__MAX_ROUNDS", "QUALITY_LOOP_LOGGING__FORMAT"],
            || {
                let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
                assert_eq!(config.review.max_rounds, 6, "local.yaml should win");
                assert!((config.review.quality_threshold - 7.0).abs() < f64::EPSILON);
                assert_eq!(config.logging.format, "json");
            },
        );
    }

    #[test]
    fn test_env_override() {
        let dir = TempDir::new().unwrap();
        write_project_config(&dir, "config.yaml", "review:\n  max_rounds: 4\n");

        temp_env::with_vars(
            [
                ("QUALITY_LOOP_REVIEW__MAX_ROUNDS", Some("9")),
                ("QUALITY_LOOP_STORAGE__BACKEND", Some("sqlite")),
                ("QUALITY_LOOP_LOGGING__LEVEL", Some("debug")),
            ],
            || {
                let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
                assert_eq!(config.review.max_rounds, 9);
                assert_eq!(config.storage.backend, StorageBackend::Sqlite);
                assert_eq!(config.logging.level, "debug");
            },
        );
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "review:\n  stagnation_delta: -0.5").unwrap();
        file.flush().unwrap();

        let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("stagnation_delta"));
    }
}

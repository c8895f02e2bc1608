use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ledger::MovieKey;

/// One movie the reconciler follows across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedMovie {
    pub name: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub movie_id: String,
    pub release_date: NaiveDate,
    pub cutoff_mins: i64,
}

impl TrackedMovie {
    pub fn movie_key(&self) -> MovieKey {
        match &self.format {
            Some(format) => MovieKey::with_format(&self.name, &self.language, format),
            None => MovieKey::new(&self.name, &self.language),
        }
    }
}

/// Batch reconciler settings, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Directory for the dated summary and detailed files.
    pub data_dir: PathBuf,
    /// Directory for the monthly history logs.
    pub logs_dir: PathBuf,
    /// Directory for the encrypted per-movie stores and the key record.
    pub store_dir: PathBuf,
    /// Cutoff applied to movies without their own threshold.
    pub default_cutoff_mins: i64,
    pub rotation_interval_days: i64,
    /// How many days ahead an advance-booking run looks.
    pub advance_day_offset: i64,
    pub fetch_timeout_secs: u64,
    /// Offset from UTC for wall-clock labels and day boundaries
    /// (minutes; 330 is IST).
    pub timezone_offset_mins: i64,
    pub movies: Vec<TrackedMovie>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("daily-boxoffice"),
            logs_dir: PathBuf::from("daily-boxoffice/logs"),
            store_dir: PathBuf::from("tracked-store"),
            default_cutoff_mins: 200,
            rotation_interval_days: 90,
            advance_day_offset: 1,
            fetch_timeout_secs: 20,
            timezone_offset_mins: 330,
            movies: Vec::new(),
        }
    }
}

/// Persisted configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub config: TrackerConfig,
    pub created_at: String,
    pub modified_at: String,
}

/// Loads and persists the reconciler configuration. A missing file is
/// replaced with defaults on first load.
pub struct ConfigManager {
    config_path: PathBuf,
    config: TrackerConfig,
}

impl ConfigManager {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| PathBuf::from("marquee.json"));
        Self {
            config_path,
            config: TrackerConfig::default(),
        }
    }

    /// Load settings from the configuration file, writing defaults if
    /// the file doesn't exist yet.
    pub fn load(&mut self) -> Result<TrackerConfig, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.config.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}; defaults apply to new settings",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        self.config = config_file.config;
        Ok(self.config.clone())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config: self.config.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            modified_at: chrono::Utc::now().to_rfc3339(),
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    pub fn update(&mut self, config: TrackerConfig) -> Result<(), ConfigError> {
        self.config = config;
        self.save()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    ReadError(String),
    WriteError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(msg) => write!(f, "Failed to read config file: {}", msg),
            ConfigError::WriteError(msg) => write!(f, "Failed to write config file: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config file: {}", msg),
            ConfigError::SerializeError(msg) => write!(f, "Failed to serialize config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

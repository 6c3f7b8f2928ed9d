//! Generator configuration, loaded from a JSON file.
//!
//! Every field except `app_package` has a default, so a minimal file is
//! `{"app_package": "com.example.app"}`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use roamer_explore::traversal::sequence::SequenceConfig;
use roamer_ir::WidgetType;
use serde::{Deserialize, Serialize};

use crate::limits::{validate_limits, LimitViolation, SuiteLimits, Timeouts};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("app_package is required")]
    MissingPackage,

    #[error("Invalid limits: {0}")]
    Limits(#[from] LimitViolation),
}

/// Which selection strategy drives exploration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    LeastFrequent,
    FrequencyWeighted,
    UniformRandom,
    WidgetPriority,
}

/// How to reach the device through adb.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdbConfig {
    pub adb_path: PathBuf,
    /// Where the instrumented app dumps its coverage on the device.
    pub coverage_device_path: String,
    /// Intent action that makes the app dump coverage. `None` pulls whatever
    /// file is already there.
    pub coverage_broadcast: Option<String>,
}

impl Default for AdbConfig {
    fn default() -> Self {
        Self {
            adb_path: PathBuf::from("adb"),
            coverage_device_path: "/sdcard/coverage.ec".to_string(),
            coverage_broadcast: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Package of the application under test.
    pub app_package: String,
    pub output_dir: PathBuf,
    pub database_path: PathBuf,
    pub max_events_per_sequence: usize,
    pub budget: SuiteLimits,
    pub timeouts: Timeouts,
    /// Pause after each executed event.
    pub event_interval_ms: u64,
    /// Strings typed into text fields, picked at random per entry.
    pub text_entry_values: Vec<String>,
    pub strategy: StrategyKind,
    /// Seed for the randomized strategies and text picks.
    pub seed: u64,
    /// Widget class order for `widget_priority`; `None` uses the built-in order.
    pub widget_priority: Option<Vec<WidgetType>>,
    pub adb: AdbConfig,
    /// Default tracing filter; `RUST_LOG` overrides it.
    pub log_filter: String,
    /// Finish the current sequence and stop on Ctrl-C.
    pub stop_on_ctrl_c: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            app_package: String::new(),
            output_dir: PathBuf::from("output"),
            database_path: PathBuf::from("roamer.db"),
            max_events_per_sequence: 30,
            budget: SuiteLimits::default(),
            timeouts: Timeouts::default(),
            event_interval_ms: 0,
            text_entry_values: Vec::new(),
            strategy: StrategyKind::default(),
            seed: 0,
            widget_priority: None,
            adb: AdbConfig::default(),
            log_filter: "info".to_string(),
            stop_on_ctrl_c: true,
        }
    }
}

impl GeneratorConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_package.trim().is_empty() {
            return Err(ConfigError::MissingPackage);
        }
        validate_limits(self.max_events_per_sequence, &self.budget, &self.timeouts)?;
        Ok(())
    }

    pub fn sequence_config(&self) -> SequenceConfig {
        SequenceConfig {
            app_package: self.app_package.clone(),
            driver_timeout: self.timeouts.driver(),
            event_interval: Duration::from_millis(self.event_interval_ms),
            text_entry_values: self.text_entry_values.clone(),
            seed: self.seed,
        }
    }
}

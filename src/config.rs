// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration management for the pulse optimizer.
//!
//! Configuration is loaded from multiple sources with the following priority
//! (later sources override earlier ones):
//!
//! 1. Built-in defaults
//! 2. config.yaml file
//! 3. Environment variables (QUBITOS_*)
//! 4. CLI arguments

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::control::pulsegen::PulseConfig;
use crate::control::types::OptimizerConfig;
use crate::error::{Error, Result};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Optimizer settings and termination criteria
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Initial pulse settings
    #[serde(default)]
    pub pulse: PulseConfig,

    /// Amplitude file output
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Validation settings
    #[serde(default)]
    pub validation: ValidationConfig,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                config = serde_yaml::from_str(&content)?;
            }
        } else {
            for path in &["config.yaml", "config.yml", "/etc/qubitos/control.yaml"] {
                let path = Path::new(path);
                if path.exists() {
                    let content = std::fs::read_to_string(path)?;
                    config = serde_yaml::from_str(&content)?;
                    break;
                }
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply `QUBITOS_*` overrides looked up through `var`.
    ///
    /// Values that fail to parse are ignored with a warning.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("QUBITOS_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = var("QUBITOS_OUTPUT_DIR") {
            self.output.directory = val;
        }
        if let Some(val) = var("QUBITOS_FID_ERR_TARG") {
            match val.parse() {
                Ok(v) => self.optimizer.fid_err_targ = v,
                Err(_) => tracing::warn!(value = %val, "Ignoring invalid QUBITOS_FID_ERR_TARG"),
            }
        }
        if let Some(val) = var("QUBITOS_MAX_ITER") {
            match val.parse() {
                Ok(v) => self.optimizer.max_iter = v,
                Err(_) => tracing::warn!(value = %val, "Ignoring invalid QUBITOS_MAX_ITER"),
            }
        }
        if let Some(val) = var("QUBITOS_MAX_WALL_TIME") {
            match val.parse() {
                Ok(v) => self.optimizer.max_wall_time_sec = v,
                Err(_) => tracing::warn!(value = %val, "Ignoring invalid QUBITOS_MAX_WALL_TIME"),
            }
        }
        if let Some(val) = var("QUBITOS_INIT_PULSE_TYPE") {
            match val.parse() {
                Ok(v) => self.pulse.init_pulse_type = v,
                Err(e) => tracing::warn!(error = %e, "Ignoring invalid QUBITOS_INIT_PULSE_TYPE"),
            }
        }
        if let Some(val) = var("QUBITOS_STRICT_VALIDATION") {
            self.validation.strict = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        self.optimizer.validate().map_err(Error::Config)?;
        self.pulse.validate().map_err(Error::Config)?;

        let limits = &self.validation.limits;
        if limits.max_dim == 0
            || limits.max_timeslots == 0
            || limits.max_controls == 0
            || limits.max_iterations == 0
        {
            return Err(Error::Config("resource limits must be > 0".into()));
        }
        if self.optimizer.max_iter > limits.max_iterations {
            return Err(Error::Config(format!(
                "max_iter ({}) exceeds the iteration limit ({})",
                self.optimizer.max_iter, limits.max_iterations
            )));
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(Error::Config(format!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                self.logging.format
            )));
        }
        if self.output.directory.trim().is_empty() {
            return Err(Error::Config("output directory cannot be empty".into()));
        }
        if self.optimizer.max_wall_time_sec > 24.0 * 3600.0 {
            tracing::warn!(
                max_wall_time_sec = self.optimizer.max_wall_time_sec,
                "Wall time limit is longer than a day"
            );
        }
        Ok(())
    }
}

/// Amplitude file output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the amplitude files are written to
    #[serde(default = "default_output_dir")]
    pub directory: String,

    /// Write initial and final amplitude files
    #[serde(default = "default_true")]
    pub write_amps: bool,

    /// File name suffix, derived from the problem when absent
    #[serde(default)]
    pub file_ext: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            write_amps: true,
            file_ext: None,
        }
    }
}

fn default_output_dir() -> String {
    ".".into()
}

fn default_true() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

/// Validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Reject non-physical generators instead of warning
    #[serde(default = "default_true")]
    pub strict: bool,

    /// Resource limits
    #[serde(default)]
    pub limits: ResourceLimits,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict: true,
            limits: ResourceLimits::default(),
        }
    }
}

/// Resource limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum generator dimension
    #[serde(default = "default_max_dim")]
    pub max_dim: usize,

    /// Maximum number of timeslots
    #[serde(default = "default_max_timeslots")]
    pub max_timeslots: usize,

    /// Maximum number of control generators
    #[serde(default = "default_max_controls")]
    pub max_controls: usize,

    /// Maximum optimizer iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_dim: default_max_dim(),
            max_timeslots: default_max_timeslots(),
            max_controls: default_max_controls(),
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_dim() -> usize {
    64
}

fn default_max_timeslots() -> usize {
    100_000
}

fn default_max_controls() -> usize {
    32
}

fn default_max_iterations() -> usize {
    100_000
}

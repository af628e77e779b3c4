// src/utils/config.rs
//! Engine configuration
//!
//! Configuration is layered: compiled defaults, then an optional `tapwire`
//! config file in the working directory, then `TAPWIRE__*` environment
//! variables (double underscore separates nested sections, e.g.
//! `TAPWIRE__REPLAY__DEADLINE_SECS=10`).

use crate::utils::errors::{EngineError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Global interception behavior toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Pause every new exchange for operator action
    Intercept,
    /// Auto-resume every new exchange immediately after capture
    Proxy,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Intercept
    }
}

/// Replay subsystem settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Seconds to wait for a replay correlation before declaring it failed
    pub deadline_secs: u64,

    /// Header name used to smuggle the correlation token onto the wire
    pub marker_header: String,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 30,
            marker_header: "x-tapwire-replay".to_string(),
        }
    }
}

/// Observability settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default tracing filter when RUST_LOG is unset
    pub log_filter: String,

    /// Bind address for the Prometheus metrics exporter
    pub metrics_addr: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            metrics_addr: "127.0.0.1:9464".to_string(),
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interception mode at startup
    pub mode: Mode,

    /// Host patterns exempt from interception, exact or `*.` wildcard
    pub bypass_hosts: Vec<String>,

    /// Replay subsystem settings
    pub replay: ReplayConfig,

    /// Observability settings
    pub observability: ObservabilityConfig,
}

impl EngineConfig {
    /// Load configuration from defaults, the optional `tapwire` config file,
    /// and `TAPWIRE__*` environment variables
    pub fn load() -> Result<Self> {
        Self::build(File::with_name("tapwire").required(false))
    }

    /// Load configuration from an explicit file path (plus env overrides)
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::build(File::from(path).required(true))
    }

    fn build(file: File<config::FileSourceFile, config::FileFormat>) -> Result<Self> {
        let defaults = Config::try_from(&EngineConfig::default())
            .map_err(|e| EngineError::ConfigError(format!("defaults: {}", e)))?;

        let loaded: EngineConfig = Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(Environment::with_prefix("TAPWIRE").separator("__"))
            .build()
            .map_err(|e| EngineError::ConfigError(format!("build: {}", e)))?
            .try_deserialize()
            .map_err(|e| EngineError::ConfigError(format!("deserialize: {}", e)))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.replay.deadline_secs == 0 {
            return Err(EngineError::ConfigError(
                "replay.deadline_secs must be positive".to_string(),
            ));
        }
        let marker = &self.replay.marker_header;
        if marker.is_empty() || marker.contains(|c: char| c.is_whitespace() || c == ':') {
            return Err(EngineError::ConfigError(format!(
                "replay.marker_header is not a valid header name: {:?}",
                marker
            )));
        }
        Ok(())
    }
}

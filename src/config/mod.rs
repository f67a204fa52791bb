// src/config/mod.rs
//! Instrument configuration, staging and manager settings

pub mod constants;
pub mod loader;
pub mod settings;
pub mod stager;
pub mod validation;

pub use loader::{ConfigError, ConfigLoader};
pub use settings::*;
pub use stager::ConfigurationStager;
pub use validation::{quantize_noise_burst_rate, validate_configuration, ValidationError, ValidationResult};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Manager-side tunables, independent of the instrument configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ManagerSettings {
    #[serde(default = "defaults::sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Snapshots held before the capture loop blocks
    #[serde(default = "defaults::buffer_capacity")]
    pub buffer_capacity: usize,

    #[serde(default = "defaults::histogram_timeout_ms")]
    pub histogram_timeout_ms: u64,

    #[serde(default = "defaults::histogram_poll_ms")]
    pub histogram_poll_ms: u64,

    #[serde(default = "defaults::rx_lock_retries")]
    pub rx_lock_retries: u32,

    #[serde(default = "defaults::rx_lock_poll_ms")]
    pub rx_lock_poll_ms: u64,

    #[serde(default = "defaults::monitor_settle_ms")]
    pub monitor_settle_ms: u64,

    /// Upper bound on a blocking capture; unbounded when absent
    #[serde(default)]
    pub capture_timeout_ms: Option<u64>,
}

/// Default value providers using constants
mod defaults {
    use crate::config::constants::*;

    pub fn sample_interval_ms() -> u64 { acquisition::DEFAULT_SAMPLE_INTERVAL_MS }
    pub fn buffer_capacity() -> usize { acquisition::DEFAULT_BUFFER_CAPACITY }
    pub fn histogram_timeout_ms() -> u64 { histogram::DEFAULT_TIMEOUT_MS }
    pub fn histogram_poll_ms() -> u64 { histogram::DEFAULT_POLL_MS }
    pub fn rx_lock_retries() -> u32 { monitor::DEFAULT_RX_LOCK_RETRIES }
    pub fn rx_lock_poll_ms() -> u64 { monitor::DEFAULT_RX_LOCK_POLL_MS }
    pub fn monitor_settle_ms() -> u64 { monitor::DEFAULT_SETTLE_MS }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            sample_interval_ms: defaults::sample_interval_ms(),
            buffer_capacity: defaults::buffer_capacity(),
            histogram_timeout_ms: defaults::histogram_timeout_ms(),
            histogram_poll_ms: defaults::histogram_poll_ms(),
            rx_lock_retries: defaults::rx_lock_retries(),
            rx_lock_poll_ms: defaults::rx_lock_poll_ms(),
            monitor_settle_ms: defaults::monitor_settle_ms(),
            capture_timeout_ms: None,
        }
    }
}

impl ManagerSettings {
    /// Parse a TOML fragment; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: ManagerSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reject settings the engine cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        use crate::config::constants::acquisition::*;

        let checks = [
            validation::validate_range(
                "sample_interval_ms",
                self.sample_interval_ms,
                MIN_SAMPLE_INTERVAL_MS,
                MAX_SAMPLE_INTERVAL_MS,
            ),
            validation::validate_range("buffer_capacity", self.buffer_capacity, 1, MAX_ITEMS_PER_DRAIN),
            validation::validate_range("histogram_poll_ms", self.histogram_poll_ms, 1, self.histogram_timeout_ms.max(1)),
            validation::validate_range("rx_lock_retries", self.rx_lock_retries, 1, u32::MAX),
        ];
        let errors: Vec<ValidationError> = checks.into_iter().filter_map(Result::err).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn histogram_timeout(&self) -> Duration {
        Duration::from_millis(self.histogram_timeout_ms)
    }

    pub fn histogram_poll(&self) -> Duration {
        Duration::from_millis(self.histogram_poll_ms)
    }

    pub fn rx_lock_poll(&self) -> Duration {
        Duration::from_millis(self.rx_lock_poll_ms)
    }

    pub fn monitor_settle(&self) -> Duration {
        Duration::from_millis(self.monitor_settle_ms)
    }

    pub fn capture_timeout(&self) -> Option<Duration> {
        self.capture_timeout_ms.map(Duration::from_millis)
    }
}

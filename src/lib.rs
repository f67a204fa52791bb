//! BERT-Core: control and acquisition core for multi-channel bit error rate testers
//!
//! This library drives a BERT instrument over a single serialized transport.
//! It features:
//!
//! - Staged configuration with all-or-nothing commits
//! - A BER/FEC capture loop, blocking or on a background worker, feeding a
//!   bounded queue with backpressure
//! - Telemetry monitors, two-phase histogram capture and error injection
//! - Checksummed calibration records
//! - An in-crate instrument simulator for tests and development
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use bert_core::config::ManagerSettings;
//! use bert_core::hal::SimulatedBert;
//! use bert_core::types::{ChannelMask, PatternConfig, PatternType};
//! use bert_core::BertInstrument;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let instrument = BertInstrument::open(SimulatedBert::default(), ManagerSettings::default())?;
//!
//!     let config = instrument.config();
//!     config.set_linerate(56.0, false)?;
//!     config.set_tx_pattern(0u8, PatternConfig::new(PatternType::Prbs31), false)?;
//!     config.set_rx_pattern(0u8, PatternConfig::new(PatternType::Prbs31), false)?;
//!     config.set_rx_enabled(0u8, true, true)?;
//!
//!     let engine = instrument.acquisition();
//!     engine.start_background(ChannelMask::CH0, true)?;
//!     for _ in 0..5 {
//!         std::thread::sleep(std::time::Duration::from_millis(200));
//!         for snapshot in engine.drain(1024)? {
//!             println!("{}: {:?}", snapshot.sequence, snapshot.ber.ber);
//!         }
//!     }
//!     engine.stop()?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod calibration;
pub mod config;
pub mod error;
pub mod hal;
pub mod histogram;
pub mod injection;
pub mod instrument;
pub mod monitor;
pub mod types;
pub mod utils;
pub mod version;

// Re-export commonly used types for convenience
pub use acquisition::{AcquisitionEngine, CaptureState, CaptureSummary, EngineStatus, StopReason};
pub use calibration::CalibrationStore;
pub use config::{ConfigurationSettings, ConfigurationStager, ManagerSettings};
pub use error::{BertError, BertResult, Status};
pub use hal::{BoardCapabilities, BoardInfo, HardwareTransport, SharedTransport};
pub use histogram::HistogramController;
pub use injection::ErrorInjectionController;
pub use instrument::BertInstrument;
pub use monitor::{LosReading, MonitorReader};
pub use types::{Channel, ChannelArray, ChannelMask, MeasurementSnapshot, MonitorFlag, MonitorFlags};
pub use utils::time::{current_timestamp_nanos, TimeProvider};
pub use version::{ApiVersion, API_VERSION};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        protocol: API_VERSION,
        manager_module: version::MANAGER_MODULE_VERSION,
        features: vec![
            "Staged configuration".to_string(),
            "BER/FEC capture with backpressure".to_string(),
            "Histogram capture".to_string(),
            "Error injection".to_string(),
            "Calibration storage".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Instrument protocol this build speaks
    pub protocol: ApiVersion,
    /// Manager module revision
    pub manager_module: u32,
    /// List of features
    pub features: Vec<String>,
}

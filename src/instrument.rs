// src/instrument.rs
//! One instrument, one transport, every component
//!
//! `BertInstrument` owns the shared transport and builds each component over
//! it. Dropping the instrument stops a running capture.

use crate::acquisition::AcquisitionEngine;
use crate::calibration::CalibrationStore;
use crate::config::{ConfigLoader, ConfigurationStager, ManagerSettings};
use crate::error::{BertResult, IntoBertError};
use crate::hal::{BoardInfo, Command, HardwareTransport, SharedTransport};
use crate::histogram::HistogramController;
use crate::injection::ErrorInjectionController;
use crate::monitor::MonitorReader;
use crate::version::{ApiVersion, API_VERSION};
use std::path::Path;
use std::sync::Arc;

pub struct BertInstrument {
    transport: SharedTransport,
    version: ApiVersion,
    board: BoardInfo,
    settings: ManagerSettings,
    stager: Arc<ConfigurationStager>,
    engine: AcquisitionEngine,
    monitor: MonitorReader,
    histogram: HistogramController,
    injection: ErrorInjectionController,
    calibration: CalibrationStore,
}

impl BertInstrument {
    /// Negotiate with the instrument behind `transport` and build the components
    ///
    /// Fails when the instrument speaks another protocol major version. The
    /// pending configuration starts as the configuration the hardware runs.
    pub fn open<T: HardwareTransport + 'static>(transport: T, settings: ManagerSettings) -> BertResult<Self> {
        Self::open_shared(SharedTransport::new(transport), settings)
    }

    /// Same as `open`, with settings read from a TOML file and `BERT_*` overrides
    pub fn open_with_settings_file<T, P>(transport: T, path: P) -> BertResult<Self>
    where
        T: HardwareTransport + 'static,
        P: AsRef<Path>,
    {
        let settings = ConfigLoader::with_paths(vec![path.as_ref().to_path_buf()])
            .load()
            .bert_err("load_settings")?;
        Self::open(transport, settings)
    }

    pub fn open_shared(transport: SharedTransport, settings: ManagerSettings) -> BertResult<Self> {
        settings.validate().bert_err("validate_settings")?;

        let version = transport.execute(Command::ReadVersion)?.into_version()?;
        API_VERSION.ensure_compatible(&version)?;
        let board = *transport.execute(Command::ReadBoardInfo)?.into_board_info()?;
        tracing::info!(
            transport = %transport.describe(),
            model = %board.model,
            serial = %board.serial_number,
            protocol = %version,
            "instrument opened"
        );

        let stager = Arc::new(ConfigurationStager::new(transport.clone(), board.capabilities.clone()));
        stager.get_active_config()?;

        Ok(Self {
            engine: AcquisitionEngine::new(transport.clone(), Arc::clone(&stager), &settings),
            monitor: MonitorReader::new(transport.clone(), &settings),
            histogram: HistogramController::new(transport.clone(), &settings),
            injection: ErrorInjectionController::new(transport.clone(), Arc::clone(&stager)),
            calibration: CalibrationStore::new(transport.clone()),
            transport,
            version,
            board,
            settings,
            stager,
        })
    }

    pub fn board_info(&self) -> &BoardInfo {
        &self.board
    }

    /// Protocol version the instrument reported
    pub fn protocol_version(&self) -> ApiVersion {
        self.version
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    pub fn config(&self) -> &ConfigurationStager {
        &self.stager
    }

    pub fn acquisition(&self) -> &AcquisitionEngine {
        &self.engine
    }

    pub fn monitor(&self) -> &MonitorReader {
        &self.monitor
    }

    pub fn histogram(&self) -> &HistogramController {
        &self.histogram
    }

    pub fn injection(&self) -> &ErrorInjectionController {
        &self.injection
    }

    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    /// Clock-out frequency in GHz (linerate over the monitor divider)
    pub fn clock_out_ghz(&self) -> BertResult<f64> {
        self.transport.execute(Command::ReadClockOut)?.into_clock_out()
    }

    /// Stop any capture and release the instrument
    pub fn close(self) -> BertResult<()> {
        self.engine.stop()
    }
}

impl std::fmt::Debug for BertInstrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BertInstrument")
            .field("model", &self.board.model)
            .field("serial", &self.board.serial_number)
            .field("version", &self.version)
            .field("engine", &self.engine)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BertError, Status};
    use crate::hal::{SimulatedBert, SimulatorConfig};
    use crate::types::{ChannelMask, MonitorDivider};
    use std::io::Write;

    #[test]
    fn test_open_reads_board() {
        let sim = SimulatedBert::new(SimulatorConfig::default());
        let instrument = BertInstrument::open(sim.clone(), ManagerSettings::default()).unwrap();
        assert_eq!(instrument.protocol_version(), API_VERSION);
        assert!(instrument.config().last_known_config().is_some());
        assert_eq!(
            sim.command_log(),
            vec!["read_version", "read_board_info", "read_configuration"]
        );
    }

    #[test]
    fn test_incompatible_major_refused() {
        let sim = SimulatedBert::default();
        sim.set_reported_version(ApiVersion::new(2, 0, 0));
        let err = BertInstrument::open(sim, ManagerSettings::default()).unwrap_err();
        assert!(matches!(err, BertError::IncompatibleVersion { .. }));
        assert_eq!(err.status(), Status::Failed);
    }

    #[test]
    fn test_clock_out_follows_divider() {
        let instrument = BertInstrument::open(SimulatedBert::default(), ManagerSettings::default()).unwrap();
        instrument.config().set_linerate(64.0, false).unwrap();
        instrument.config().set_monitor_divider(MonitorDivider::Div16, true).unwrap();
        assert!((instrument.clock_out_ghz().unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    #[serial_test::serial]
    fn test_settings_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "sample_interval_ms = 7").unwrap();
        let instrument = BertInstrument::open_with_settings_file(SimulatedBert::default(), file.path()).unwrap();
        assert_eq!(instrument.settings().sample_interval_ms, 7);

        let mut bad = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(bad, "buffer_capacity = 0").unwrap();
        let err = BertInstrument::open_with_settings_file(SimulatedBert::default(), bad.path()).unwrap_err();
        assert_eq!(err.status(), Status::Failed);
    }

    #[test]
    fn test_drop_stops_capture() {
        let sim = SimulatedBert::default();
        let settings = ManagerSettings {
            sample_interval_ms: 5,
            ..ManagerSettings::default()
        };
        let instrument = BertInstrument::open(sim.clone(), settings).unwrap();
        instrument.acquisition().start_background(ChannelMask::CH0, true).unwrap();
        let started = std::time::Instant::now();
        while !sim.ber_running() && started.elapsed() < std::time::Duration::from_secs(5) {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(sim.ber_running());
        drop(instrument);
        assert!(!sim.ber_running());
    }
}

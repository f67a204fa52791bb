// src/hal/types.rs
//! Command vocabulary exchanged with the instrument

use crate::config::{ConfigField, ConfigurationSettings};
use crate::error::{BertError, BertResult};
use crate::types::{
    CalibrationMode, Channel, ChannelArray, ChannelMask, ErrorStruct, FecCounters, FecFamily,
    HistogramData, InjectionState, LinkArray, MonitorFlag, MonitorFlags,
};
use crate::version::ApiVersion;
use serde::{Deserialize, Serialize};

/// Optional hardware present on a board variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardCapabilities {
    pub fec_family: FecFamily,
    pub max_linerate_gbd: f64,
    pub has_noise_source: bool,
    pub has_jitter_source: bool,
    pub supports_user_patterns: bool,
    pub supports_seven_taps: bool,
}

impl Default for BoardCapabilities {
    fn default() -> Self {
        Self {
            fec_family: FecFamily::Real,
            max_linerate_gbd: crate::config::constants::signal::MAX_LINERATE_GBD,
            has_noise_source: true,
            has_jitter_source: true,
            supports_user_patterns: true,
            supports_seven_taps: true,
        }
    }
}

/// Identity of the attached board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardInfo {
    pub model: String,
    pub serial_number: String,
    pub firmware_version: String,
    pub capabilities: BoardCapabilities,
}

/// Hardware view of one channel's histogram engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HistogramStatus {
    #[default]
    Idle,
    Capturing,
    Ready,
}

/// Interval counters for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawChannelCounts {
    pub locked: bool,
    pub bits: u64,
    pub errors_msb: u64,
    pub errors_lsb: u64,
}

/// Interval decoder counters for one FEC link
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawFecLink {
    pub locked: bool,
    pub bits: u64,
    pub counters: FecCounters,
    /// Codewords seen with `i` symbol errors, at most 31 bins
    pub symbol_error_bins: Vec<u64>,
}

/// Everything one sampling command returns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSample {
    /// Seconds since BER was started on the instrument
    pub elapsed_s: f64,
    pub channels: ChannelArray<RawChannelCounts>,
    /// Present when an FEC mode is active
    pub fec: Option<LinkArray<RawFecLink>>,
}

/// Which blob family a calibration record holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalibrationKind {
    Coefficients,
    Optimal,
}

/// Calibration payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CalibrationValues {
    Coefficients(Vec<f64>),
    Optimal(Vec<i32>),
}

impl CalibrationValues {
    /// Blob family
    pub fn kind(&self) -> CalibrationKind {
        match self {
            CalibrationValues::Coefficients(_) => CalibrationKind::Coefficients,
            CalibrationValues::Optimal(_) => CalibrationKind::Optimal,
        }
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        match self {
            CalibrationValues::Coefficients(values) => values.len(),
            CalibrationValues::Optimal(values) => values.len(),
        }
    }

    /// Whether no values are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stored calibration blob with its checksum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub values: CalibrationValues,
    pub checksum: u32,
}

/// One instrument command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ReadVersion,
    ReadBoardInfo,
    ReadConfiguration,
    /// Replace the whole active configuration in one transaction
    WriteConfiguration(Box<ConfigurationSettings>),
    /// Replace only the given groups, still in one transaction
    WriteFields(Vec<ConfigField>),
    ReadClockOut,
    StartBer { mask: ChannelMask, accumulate: bool },
    SampleBer,
    StopBer,
    SetMonitorFlags(MonitorFlags),
    ReadMonitor(MonitorFlag),
    ReadLos,
    ReadRxLock,
    ArmHistogram(ChannelMask),
    HistogramStatus(Channel),
    ReadHistogram(Channel),
    SetErrorPattern(Channel, ErrorStruct),
    SetErrorRate(Channel, f64),
    StopErrorInsertion(Channel),
    ReadInjection(Channel),
    SaveCalibration {
        channel: Channel,
        mode: CalibrationMode,
        record: CalibrationRecord,
    },
    LoadCalibration {
        channel: Channel,
        mode: CalibrationMode,
        kind: CalibrationKind,
    },
}

impl Command {
    /// Short name for logs and error context
    pub fn name(&self) -> &'static str {
        match self {
            Command::ReadVersion => "read_version",
            Command::ReadBoardInfo => "read_board_info",
            Command::ReadConfiguration => "read_configuration",
            Command::WriteConfiguration(_) => "write_configuration",
            Command::WriteFields(_) => "write_fields",
            Command::ReadClockOut => "read_clock_out",
            Command::StartBer { .. } => "start_ber",
            Command::SampleBer => "sample_ber",
            Command::StopBer => "stop_ber",
            Command::SetMonitorFlags(_) => "set_monitor_flags",
            Command::ReadMonitor(_) => "read_monitor",
            Command::ReadLos => "read_los",
            Command::ReadRxLock => "read_rx_lock",
            Command::ArmHistogram(_) => "arm_histogram",
            Command::HistogramStatus(_) => "histogram_status",
            Command::ReadHistogram(_) => "read_histogram",
            Command::SetErrorPattern(..) => "set_error_pattern",
            Command::SetErrorRate(..) => "set_error_rate",
            Command::StopErrorInsertion(_) => "stop_error_insertion",
            Command::ReadInjection(_) => "read_injection",
            Command::SaveCalibration { .. } => "save_calibration",
            Command::LoadCalibration { .. } => "load_calibration",
        }
    }
}

/// One instrument response
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ack,
    Version(ApiVersion),
    BoardInfo(Box<BoardInfo>),
    Configuration(Box<ConfigurationSettings>),
    ClockOut(f64),
    Sample(Box<RawSample>),
    Monitor(ChannelArray<u16>),
    Los(u8),
    RxLock(ChannelMask),
    Armed(ChannelMask),
    HistogramStatus(HistogramStatus),
    Histogram(Box<HistogramData>),
    ErrorRate(f64),
    Injection(InjectionState),
    Calibration(CalibrationRecord),
}

fn mismatch(expected: &str, got: &Response) -> BertError {
    BertError::unexpected(format!("expected {} response, got {:?}", expected, got))
}

macro_rules! response_accessor {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        /// Unwrap the expected variant or report a protocol fault
        pub fn $fn_name(self) -> BertResult<$ty> {
            match self {
                Response::$variant(value) => Ok(value),
                other => Err(mismatch(stringify!($variant), &other)),
            }
        }
    };
}

impl Response {
    /// Expect a bare acknowledgement
    pub fn into_ack(self) -> BertResult<()> {
        match self {
            Response::Ack => Ok(()),
            other => Err(mismatch("Ack", &other)),
        }
    }

    response_accessor!(into_version, Version, ApiVersion);
    response_accessor!(into_board_info, BoardInfo, Box<BoardInfo>);
    response_accessor!(into_configuration, Configuration, Box<ConfigurationSettings>);
    response_accessor!(into_clock_out, ClockOut, f64);
    response_accessor!(into_sample, Sample, Box<RawSample>);
    response_accessor!(into_monitor, Monitor, ChannelArray<u16>);
    response_accessor!(into_los, Los, u8);
    response_accessor!(into_rx_lock, RxLock, ChannelMask);
    response_accessor!(into_armed, Armed, ChannelMask);
    response_accessor!(into_histogram_status, HistogramStatus, HistogramStatus);
    response_accessor!(into_histogram, Histogram, Box<HistogramData>);
    response_accessor!(into_error_rate, ErrorRate, f64);
    response_accessor!(into_injection, Injection, InjectionState);
    response_accessor!(into_calibration, Calibration, CalibrationRecord);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_accessor() {
        assert_eq!(Response::Los(0b101).into_los().unwrap(), 0b101);
        assert!(Response::Ack.into_ack().is_ok());
    }

    #[test]
    fn test_mismatched_response_is_unexpected() {
        let err = Response::Ack.into_los().unwrap_err();
        assert_eq!(err.status(), crate::error::Status::UnexpectedError);
        assert!(err.to_string().contains("Los"));
    }

    #[test]
    fn test_calibration_values_kind() {
        let values = CalibrationValues::Optimal(vec![1, 2, 3]);
        assert_eq!(values.kind(), CalibrationKind::Optimal);
        assert_eq!(values.len(), 3);
        assert!(!CalibrationValues::Coefficients(vec![0.5]).is_empty());
    }
}

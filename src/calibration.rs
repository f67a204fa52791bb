// src/calibration.rs
//! Calibration records keyed by (channel, mode)
//!
//! Two independent blob families share the key space: floating point
//! coefficients and integer optimal-setting vectors. Each record carries a
//! CRC-32 over its little-endian encoding, checked on every load.

use crate::config::constants::calibration::MAX_VALUES;
use crate::error::{BertError, BertResult};
use crate::hal::{CalibrationKind, CalibrationRecord, CalibrationValues, Command, SharedTransport};
use crate::types::{CalibrationMode, Channel, IntoChannel};
use crc32fast::Hasher;

/// CRC-32 of a calibration payload
///
/// The kind is hashed first so identical bytes in the two families never
/// share a checksum.
pub fn record_checksum(values: &CalibrationValues) -> u32 {
    let mut hasher = Hasher::new();
    match values {
        CalibrationValues::Coefficients(values) => {
            hasher.update(&[0]);
            for value in values {
                hasher.update(&value.to_le_bytes());
            }
        }
        CalibrationValues::Optimal(values) => {
            hasher.update(&[1]);
            for value in values {
                hasher.update(&value.to_le_bytes());
            }
        }
    }
    hasher.finalize()
}

#[derive(Debug)]
pub struct CalibrationStore {
    transport: SharedTransport,
}

impl CalibrationStore {
    pub fn new(transport: SharedTransport) -> Self {
        Self { transport }
    }

    /// Store calibration coefficients for `(channel, mode)`
    pub fn save(&self, channel: impl IntoChannel, mode: CalibrationMode, values: &[f64]) -> BertResult<()> {
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(BertError::unsupported("calibration_values", format!("{} is not finite", bad)));
        }
        self.store(channel.into_channel()?, mode, CalibrationValues::Coefficients(values.to_vec()))
    }

    /// Coefficients stored for `(channel, mode)`; the length is whatever was saved
    pub fn load(&self, channel: impl IntoChannel, mode: CalibrationMode) -> BertResult<Vec<f64>> {
        match self.fetch(channel.into_channel()?, mode, CalibrationKind::Coefficients)? {
            CalibrationValues::Coefficients(values) => Ok(values),
            other => Err(BertError::unexpected(format!("coefficient record holds {:?}", other.kind()))),
        }
    }

    /// Store an optimal-setting vector for `(channel, mode)`
    pub fn save_optimal(&self, channel: impl IntoChannel, mode: CalibrationMode, values: &[i32]) -> BertResult<()> {
        self.store(channel.into_channel()?, mode, CalibrationValues::Optimal(values.to_vec()))
    }

    pub fn load_optimal(&self, channel: impl IntoChannel, mode: CalibrationMode) -> BertResult<Vec<i32>> {
        match self.fetch(channel.into_channel()?, mode, CalibrationKind::Optimal)? {
            CalibrationValues::Optimal(values) => Ok(values),
            other => Err(BertError::unexpected(format!("optimal record holds {:?}", other.kind()))),
        }
    }

    fn store(&self, channel: Channel, mode: CalibrationMode, values: CalibrationValues) -> BertResult<()> {
        if values.is_empty() || values.len() > MAX_VALUES {
            return Err(BertError::unsupported(
                "calibration_values",
                format!("{} values, expected 1..={}", values.len(), MAX_VALUES),
            ));
        }

        let count = values.len();
        let kind = values.kind();
        let record = CalibrationRecord {
            checksum: record_checksum(&values),
            values,
        };
        self.transport
            .execute(Command::SaveCalibration { channel, mode, record })?
            .into_ack()?;
        tracing::info!(channel = %channel, mode = ?mode, kind = ?kind, count, "calibration saved");
        Ok(())
    }

    fn fetch(&self, channel: Channel, mode: CalibrationMode, kind: CalibrationKind) -> BertResult<CalibrationValues> {
        let record = self
            .transport
            .execute(Command::LoadCalibration { channel, mode, kind })?
            .into_calibration()?;

        let expected = record_checksum(&record.values);
        if expected != record.checksum {
            tracing::warn!(channel = %channel, mode = ?mode, "calibration checksum mismatch");
            return Err(BertError::unexpected(format!(
                "calibration record for {} {:?} is corrupt (crc 0x{:08X}, stored 0x{:08X})",
                channel, mode, expected, record.checksum
            )));
        }
        Ok(record.values)
    }
}

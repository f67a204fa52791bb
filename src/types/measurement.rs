// src/types/measurement.rs
//! Measurement snapshots emitted by the acquisition engine
//!
//! Every category carries an interval value (this sample only) and, when the
//! session accumulates, a running total since the capture started. The
//! `enabled`/`locked` flags gate whether the numeric fields mean anything.

use crate::config::constants::geometry::FEC_MAX_LINKS;
use crate::error::{BertError, BertResult};
use crate::types::channel::ChannelArray;
use serde::{Deserialize, Serialize};

/// Per-link fixed array
pub type LinkArray<T> = [T; FEC_MAX_LINKS];

/// Errors over bits, zero when nothing was counted
pub fn ratio(errors: u64, bits: u64) -> f64 {
    if bits == 0 {
        0.0
    } else {
        errors as f64 / bits as f64
    }
}

/// One polled result from the acquisition loop
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasurementSnapshot {
    /// Position within the capture session, starting at 0
    pub sequence: u64,
    pub timestamp_ns: u64,
    pub ber: BerReport,
    pub real_fec: RealFecReport,
    pub emulator_fec: EmulatorFecReport,
    pub compact_fec: CompactFecReport,
}

impl MeasurementSnapshot {
    /// JSON rendering for logging or hand-off to other tools
    pub fn to_json(&self) -> BertResult<String> {
        serde_json::to_string(self).map_err(|e| BertError::unexpected(e.to_string()))
    }
}

/// Per-channel bit error counters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BerReport {
    pub enabled: bool,
    pub enabled_channels: ChannelArray<bool>,
    pub locked_channels: ChannelArray<bool>,
    /// Seconds since the capture started
    pub time_s: ChannelArray<f64>,
    pub bit_count: ChannelArray<u64>,
    pub error_count_msb: ChannelArray<u64>,
    pub error_count_lsb: ChannelArray<u64>,
    pub error_count: ChannelArray<u64>,
    pub ber_msb: ChannelArray<f64>,
    pub ber_lsb: ChannelArray<f64>,
    pub ber: ChannelArray<f64>,
    /// Present only when the session accumulates
    pub accumulated: Option<BerTotals>,
}

/// Running BER totals since capture start
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BerTotals {
    pub error_count_msb: ChannelArray<u64>,
    pub error_count_lsb: ChannelArray<u64>,
    pub error_count: ChannelArray<u64>,
    pub total_bit_count: ChannelArray<u64>,
    pub ber_msb: ChannelArray<f64>,
    pub ber_lsb: ChannelArray<f64>,
    pub ber: ChannelArray<f64>,
}

/// Raw FEC decoder counters for one link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FecCounters {
    pub corrected_ones: u64,
    pub corrected_zeros: u64,
    pub symbol_errors: u64,
    pub codewords_corrected: u64,
    pub codewords_uncorrected: u64,
    pub codewords_processed: u64,
}

impl FecCounters {
    /// Bits flipped back by the decoder
    pub fn corrected_bits(&self) -> u64 {
        self.corrected_ones + self.corrected_zeros
    }

    /// Add another interval in place
    pub fn add(&mut self, other: &FecCounters) {
        self.corrected_ones += other.corrected_ones;
        self.corrected_zeros += other.corrected_zeros;
        self.symbol_errors += other.symbol_errors;
        self.codewords_corrected += other.codewords_corrected;
        self.codewords_uncorrected += other.codewords_uncorrected;
        self.codewords_processed += other.codewords_processed;
    }
}

/// Rates derived from `FecCounters`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FecRates {
    pub corrected_bit_rate: f64,
    pub symbol_error_rate: f64,
    pub frame_error_rate: f64,
    pub uncorrected_codeword_rate: f64,
}

impl FecRates {
    /// Rates for `counters` observed over `bits` bits with `symbols_per_codeword`
    pub fn from_counters(counters: &FecCounters, bits: u64, symbols_per_codeword: u64) -> Self {
        let codewords = counters.codewords_processed;
        Self {
            corrected_bit_rate: ratio(counters.corrected_bits(), bits),
            symbol_error_rate: ratio(counters.symbol_errors, codewords * symbols_per_codeword),
            frame_error_rate: ratio(
                counters.codewords_corrected + counters.codewords_uncorrected,
                codewords,
            ),
            uncorrected_codeword_rate: ratio(counters.codewords_uncorrected, codewords),
        }
    }
}

/// Distribution of symbol errors per codeword, at most 31 bins
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SerData {
    pub instant: Vec<f64>,
    /// Empty unless the session accumulates
    pub accumulated: Vec<f64>,
}

impl SerData {
    /// Number of symbol-count bins reported
    pub fn symbols(&self) -> usize {
        self.instant.len()
    }
}

/// Real FEC ASIC report
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RealFecReport {
    pub enabled: bool,
    pub enabled_links: LinkArray<bool>,
    pub locked_links: LinkArray<bool>,
    pub time_s: f64,
    pub bit_count: LinkArray<u64>,
    pub interval: LinkArray<FecCounters>,
    pub interval_rates: LinkArray<FecRates>,
    pub accumulated: Option<RealFecTotals>,
    pub ser: LinkArray<SerData>,
}

/// Running real-FEC totals
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RealFecTotals {
    pub counters: LinkArray<FecCounters>,
    pub total_bit_count: LinkArray<u64>,
    pub averaged_rates: LinkArray<FecRates>,
}

/// FPGA emulator counters for one link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmulatorCounters {
    pub corrected_bit_errors: u64,
    pub block_count: u64,
    pub saturated_symbol_errors: u64,
}

impl EmulatorCounters {
    /// Add another interval in place
    pub fn add(&mut self, other: &EmulatorCounters) {
        self.corrected_bit_errors += other.corrected_bit_errors;
        self.block_count += other.block_count;
        self.saturated_symbol_errors += other.saturated_symbol_errors;
    }
}

/// FEC emulator report
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmulatorFecReport {
    pub enabled: bool,
    pub enabled_links: LinkArray<bool>,
    pub locked_links: LinkArray<bool>,
    pub interval: LinkArray<EmulatorCounters>,
    pub accumulated: Option<LinkArray<EmulatorCounters>>,
    pub ser: LinkArray<SerData>,
}

/// ML4054B-style analyzer report with the reduced counter set
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompactFecReport {
    pub enabled: bool,
    pub enabled_links: LinkArray<bool>,
    pub time_s: f64,
    pub bit_count: LinkArray<u64>,
    pub corrected_bits: LinkArray<u64>,
    pub codewords_corrected: LinkArray<u64>,
    pub codewords_uncorrected: LinkArray<u64>,
    pub uncorrected_codeword_rate: LinkArray<f64>,
    pub accumulated: Option<CompactFecTotals>,
    pub ser: LinkArray<SerData>,
}

/// Running totals for the compact report
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompactFecTotals {
    pub total_bit_count: LinkArray<u64>,
    pub corrected_bits: LinkArray<u64>,
    pub codewords_corrected: LinkArray<u64>,
    pub codewords_uncorrected: LinkArray<u64>,
    pub uncorrected_codeword_rate: LinkArray<f64>,
}

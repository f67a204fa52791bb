// src/acquisition/accumulator.rs
//! Turns raw interval counters into snapshots with running totals
//!
//! The hardware only reports what happened since the previous sample. Totals
//! live here, are created zeroed for each capture session and only grow.

use crate::config::constants::geometry::SER_MAX_SYMBOLS;
use crate::config::FecSettings;
use crate::hal::{RawFecLink, RawSample};
use crate::types::{
    ratio, BerReport, BerTotals, Channel, ChannelArray, ChannelMask, CompactFecReport,
    CompactFecTotals, EmulatorCounters, EmulatorFecReport, FecCounters, FecFamily, FecRates,
    LinkArray, MeasurementSnapshot, RealFecReport, RealFecTotals, SerData,
};

/// FEC symbols per codeword used for symbol error rates (RS(544,514))
pub const SYMBOLS_PER_CODEWORD: u64 = 544;

#[derive(Debug, Default)]
struct BerRunning {
    errors_msb: ChannelArray<u64>,
    errors_lsb: ChannelArray<u64>,
    bits: ChannelArray<u64>,
}

#[derive(Debug, Default)]
struct FecRunning {
    counters: LinkArray<FecCounters>,
    bits: LinkArray<u64>,
    ser_bins: LinkArray<Vec<u64>>,
}

/// Per-session snapshot builder
#[derive(Debug)]
pub struct MeasurementAccumulator {
    mask: ChannelMask,
    accumulate: bool,
    fec: FecSettings,
    sequence: u64,
    ber: BerRunning,
    fec_totals: FecRunning,
}

impl MeasurementAccumulator {
    /// Zeroed totals for a session over `mask`
    pub fn new(mask: ChannelMask, accumulate: bool, fec: FecSettings) -> Self {
        Self {
            mask,
            accumulate,
            fec,
            sequence: 0,
            ber: BerRunning::default(),
            fec_totals: FecRunning::default(),
        }
    }

    /// Snapshots produced so far
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Fold one raw sample in and build its snapshot
    pub fn ingest(&mut self, raw: &RawSample, timestamp_ns: u64) -> MeasurementSnapshot {
        let mut snapshot = MeasurementSnapshot {
            sequence: self.sequence,
            timestamp_ns,
            ber: self.ber_report(raw),
            ..MeasurementSnapshot::default()
        };

        if let Some(links) = &raw.fec {
            if self.accumulate {
                self.fold_fec(links);
            }
            match self.fec.mode.family() {
                FecFamily::Real => snapshot.real_fec = self.real_report(raw.elapsed_s, links),
                FecFamily::Emulator => snapshot.emulator_fec = self.emulator_report(links),
                FecFamily::Compact => snapshot.compact_fec = self.compact_report(raw.elapsed_s, links),
                FecFamily::None => {}
            }
        }

        self.sequence += 1;
        snapshot
    }

    fn ber_report(&mut self, raw: &RawSample) -> BerReport {
        let mut report = BerReport {
            enabled: true,
            enabled_channels: self.mask.to_array(),
            ..BerReport::default()
        };

        for ch in self.mask.channels() {
            let counts = &raw.channels[ch];
            report.locked_channels[ch] = counts.locked;
            report.time_s[ch] = raw.elapsed_s;
            report.bit_count[ch] = counts.bits;
            report.error_count_msb[ch] = counts.errors_msb;
            report.error_count_lsb[ch] = counts.errors_lsb;
            report.error_count[ch] = counts.errors_msb + counts.errors_lsb;
            report.ber_msb[ch] = ratio(counts.errors_msb, counts.bits);
            report.ber_lsb[ch] = ratio(counts.errors_lsb, counts.bits);
            report.ber[ch] = ratio(report.error_count[ch], counts.bits);

            if self.accumulate {
                self.ber.errors_msb[ch] += counts.errors_msb;
                self.ber.errors_lsb[ch] += counts.errors_lsb;
                self.ber.bits[ch] += counts.bits;
            }
        }

        if self.accumulate {
            report.accumulated = Some(self.ber_totals());
        }
        report
    }

    fn ber_totals(&self) -> BerTotals {
        let mut totals = BerTotals::default();
        for ch in self.mask.channels() {
            let msb = self.ber.errors_msb[ch];
            let lsb = self.ber.errors_lsb[ch];
            let bits = self.ber.bits[ch];
            totals.error_count_msb[ch] = msb;
            totals.error_count_lsb[ch] = lsb;
            totals.error_count[ch] = msb + lsb;
            totals.total_bit_count[ch] = bits;
            totals.ber_msb[ch] = ratio(msb, bits);
            totals.ber_lsb[ch] = ratio(lsb, bits);
            totals.ber[ch] = ratio(msb + lsb, bits);
        }
        totals
    }

    fn link_enabled(&self, index: usize) -> bool {
        Channel::new(index as u8)
            .map(|ch| self.fec.links.has(ch))
            .unwrap_or(false)
    }

    fn enabled_links(&self) -> LinkArray<bool> {
        std::array::from_fn(|i| self.link_enabled(i))
    }

    fn fold_fec(&mut self, links: &LinkArray<RawFecLink>) {
        for (i, link) in links.iter().enumerate() {
            if !self.link_enabled(i) {
                continue;
            }
            self.fec_totals.counters[i].add(&link.counters);
            self.fec_totals.bits[i] += link.bits;
            let bins = &mut self.fec_totals.ser_bins[i];
            let used = link.symbol_error_bins.len().min(SER_MAX_SYMBOLS);
            if bins.len() < used {
                bins.resize(used, 0);
            }
            for (total, count) in bins.iter_mut().zip(&link.symbol_error_bins[..used]) {
                *total += count;
            }
        }
    }

    fn ser(&self, index: usize, link: &RawFecLink) -> SerData {
        let used = link.symbol_error_bins.len().min(SER_MAX_SYMBOLS);
        let instant = normalize(&link.symbol_error_bins[..used]);
        let accumulated = if self.accumulate {
            normalize(&self.fec_totals.ser_bins[index])
        } else {
            Vec::new()
        };
        SerData { instant, accumulated }
    }

    fn real_report(&self, elapsed_s: f64, links: &LinkArray<RawFecLink>) -> RealFecReport {
        let mut report = RealFecReport {
            enabled: true,
            enabled_links: self.enabled_links(),
            time_s: elapsed_s,
            ..RealFecReport::default()
        };
        for (i, link) in links.iter().enumerate() {
            if !report.enabled_links[i] {
                continue;
            }
            report.locked_links[i] = link.locked;
            report.bit_count[i] = link.bits;
            report.interval[i] = link.counters;
            report.interval_rates[i] = FecRates::from_counters(&link.counters, link.bits, SYMBOLS_PER_CODEWORD);
            report.ser[i] = self.ser(i, link);
        }
        if self.accumulate {
            report.accumulated = Some(RealFecTotals {
                counters: self.fec_totals.counters,
                total_bit_count: self.fec_totals.bits,
                averaged_rates: std::array::from_fn(|i| {
                    FecRates::from_counters(
                        &self.fec_totals.counters[i],
                        self.fec_totals.bits[i],
                        SYMBOLS_PER_CODEWORD,
                    )
                }),
            });
        }
        report
    }

    fn emulator_report(&self, links: &LinkArray<RawFecLink>) -> EmulatorFecReport {
        let mut report = EmulatorFecReport {
            enabled: true,
            enabled_links: self.enabled_links(),
            ..EmulatorFecReport::default()
        };
        for (i, link) in links.iter().enumerate() {
            if !report.enabled_links[i] {
                continue;
            }
            report.locked_links[i] = link.locked;
            report.interval[i] = emulator_counters(&link.counters);
            report.ser[i] = self.ser(i, link);
        }
        if self.accumulate {
            report.accumulated = Some(std::array::from_fn(|i| {
                emulator_counters(&self.fec_totals.counters[i])
            }));
        }
        report
    }

    fn compact_report(&self, elapsed_s: f64, links: &LinkArray<RawFecLink>) -> CompactFecReport {
        let mut report = CompactFecReport {
            enabled: true,
            enabled_links: self.enabled_links(),
            time_s: elapsed_s,
            ..CompactFecReport::default()
        };
        for (i, link) in links.iter().enumerate() {
            if !report.enabled_links[i] {
                continue;
            }
            let c = &link.counters;
            report.bit_count[i] = link.bits;
            report.corrected_bits[i] = c.corrected_bits();
            report.codewords_corrected[i] = c.codewords_corrected;
            report.codewords_uncorrected[i] = c.codewords_uncorrected;
            report.uncorrected_codeword_rate[i] = ratio(c.codewords_uncorrected, c.codewords_processed);
            report.ser[i] = self.ser(i, link);
        }
        if self.accumulate {
            let totals = &self.fec_totals;
            report.accumulated = Some(CompactFecTotals {
                total_bit_count: totals.bits,
                corrected_bits: std::array::from_fn(|i| totals.counters[i].corrected_bits()),
                codewords_corrected: std::array::from_fn(|i| totals.counters[i].codewords_corrected),
                codewords_uncorrected: std::array::from_fn(|i| totals.counters[i].codewords_uncorrected),
                uncorrected_codeword_rate: std::array::from_fn(|i| {
                    ratio(totals.counters[i].codewords_uncorrected, totals.counters[i].codewords_processed)
                }),
            });
        }
        report
    }
}

fn emulator_counters(counters: &FecCounters) -> EmulatorCounters {
    EmulatorCounters {
        corrected_bit_errors: counters.corrected_bits(),
        block_count: counters.codewords_processed,
        saturated_symbol_errors: counters.codewords_uncorrected,
    }
}

/// Bin counts as fractions of all codewords seen
fn normalize(bins: &[u64]) -> Vec<f64> {
    let total: u64 = bins.iter().sum();
    bins.iter().map(|count| ratio(*count, total)).collect()
}

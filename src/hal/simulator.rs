// src/hal/simulator.rs
//! In-process instrument model used for tests, benches and offline work
//!
//! `SimulatedBert` is a cheap handle over shared state, so a test can keep a
//! clone after handing the transport to an instrument and use it to inject
//! faults or inspect what the instrument saw.

use crate::config::constants::{geometry, injection, monitor, signal};
use crate::config::{validate_configuration, ConfigurationSettings};
use crate::error::{BertError, BertResult};
use crate::hal::traits::HardwareTransport;
use crate::hal::types::*;
use crate::types::{
    CalibrationMode, Channel, ChannelArray, ChannelMask, ErrorStruct, FecCounters, HistogramData,
    InjectionState, LinkArray, MonitorFlag, MonitorFlags,
};
use crate::version::{ApiVersion, API_VERSION};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bits per codeword used for the simulated FEC counters (544 ten-bit symbols)
const CODEWORD_BITS: u64 = 5_440;
/// Symbol error bins the simulated decoder reports
const SER_BINS: usize = 16;
/// Victim-lane error ratio of a full-level continuous aggressor
const CROSSTALK_BER_AT_FULL_LEVEL: f64 = 1e-6;

/// Static description of the simulated board
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatorConfig {
    pub board: BoardInfo,
    pub version: ApiVersion,
    /// Time a histogram capture takes to become ready
    pub histogram_delay_ms: u64,
    /// Upper bound of background errors per channel per sample
    pub background_errors: u64,
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            board: BoardInfo {
                model: "SIM-BERT-8".to_string(),
                serial_number: "SIM000001".to_string(),
                firmware_version: "4.2.0".to_string(),
                capabilities: BoardCapabilities::default(),
            },
            version: API_VERSION,
            histogram_delay_ms: 10,
            background_errors: 2,
            seed: 0x5eed_b3e7,
        }
    }
}

impl SimulatorConfig {
    /// Board variant with the given optional hardware
    pub fn with_capabilities(mut self, capabilities: BoardCapabilities) -> Self {
        self.board.capabilities = capabilities;
        self
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_commits: bool,
    fail_sampling_after: Option<u64>,
    never_lock: ChannelMask,
}

#[derive(Debug)]
struct BerSession {
    mask: ChannelMask,
    started: Instant,
    last_sample: Instant,
}

#[derive(Debug, Clone)]
struct HistogramSlot {
    status: HistogramStatus,
    armed_at: Instant,
    data: Box<HistogramData>,
}

#[derive(Debug)]
struct SimState {
    config: SimulatorConfig,
    active: ConfigurationSettings,
    monitor_flags: MonitorFlags,
    ber: Option<BerSession>,
    samples_taken: u64,
    injection: ChannelArray<InjectionState>,
    histograms: ChannelArray<Option<HistogramSlot>>,
    histogram_delay: Duration,
    calibration: HashMap<(Channel, CalibrationMode, CalibrationKind), CalibrationRecord>,
    faults: Faults,
    command_log: Vec<&'static str>,
    rng: StdRng,
}

/// Simulated instrument implementing `HardwareTransport`
#[derive(Clone)]
pub struct SimulatedBert {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBert {
    /// Simulator for the described board
    pub fn new(config: SimulatorConfig) -> Self {
        let state = SimState {
            histogram_delay: Duration::from_millis(config.histogram_delay_ms),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            active: ConfigurationSettings::default(),
            monitor_flags: MonitorFlags::empty(),
            ber: None,
            samples_taken: 0,
            injection: ChannelArray::default(),
            histograms: ChannelArray::default(),
            calibration: HashMap::new(),
            faults: Faults::default(),
            command_log: Vec::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Simulator for a board with the given capabilities
    pub fn with_capabilities(capabilities: BoardCapabilities) -> Self {
        Self::new(SimulatorConfig::default().with_capabilities(capabilities))
    }

    /// Reject every configuration write while set
    pub fn fail_commits(&self, fail: bool) {
        self.state.lock().faults.fail_commits = fail;
    }

    /// Fail sampling once this many samples were served in the current session
    pub fn fail_sampling_after(&self, samples: Option<u64>) {
        self.state.lock().faults.fail_sampling_after = samples;
    }

    /// Channels whose receiver never locks
    pub fn set_never_lock(&self, channels: ChannelMask) {
        self.state.lock().faults.never_lock = channels;
    }

    pub fn set_histogram_delay(&self, delay: Duration) {
        self.state.lock().histogram_delay = delay;
    }

    /// Protocol version reported on the next `ReadVersion`
    pub fn set_reported_version(&self, version: ApiVersion) {
        self.state.lock().config.version = version;
    }

    /// Flip a checksum bit in every stored record for `(channel, mode)`
    pub fn corrupt_calibration(&self, channel: Channel, mode: CalibrationMode) {
        let mut state = self.state.lock();
        for ((ch, m, _), record) in state.calibration.iter_mut() {
            if *ch == channel && *m == mode {
                record.checksum ^= 1;
            }
        }
    }

    /// Configuration the simulated hardware is running
    pub fn active_config(&self) -> ConfigurationSettings {
        self.state.lock().active.clone()
    }

    pub fn injection_state(&self, channel: Channel) -> InjectionState {
        self.state.lock().injection[channel]
    }

    /// Whether a BER session is running
    /// Samples served since the last `StartBer`
    pub fn samples_taken(&self) -> u64 {
        self.state.lock().samples_taken
    }

    pub fn ber_running(&self) -> bool {
        self.state.lock().ber.is_some()
    }

    pub fn monitor_flags(&self) -> MonitorFlags {
        self.state.lock().monitor_flags
    }

    /// Names of every command executed so far, oldest first
    pub fn command_log(&self) -> Vec<&'static str> {
        self.state.lock().command_log.clone()
    }

    pub fn clear_command_log(&self) {
        self.state.lock().command_log.clear();
    }
}

impl Default for SimulatedBert {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

impl HardwareTransport for SimulatedBert {
    fn execute(&mut self, command: Command) -> BertResult<Response> {
        let mut state = self.state.lock();
        state.command_log.push(command.name());
        state.handle(command)
    }

    fn describe(&self) -> String {
        let state = self.state.lock();
        format!(
            "simulator {} s/n {}",
            state.config.board.model, state.config.board.serial_number
        )
    }
}

impl SimState {
    fn handle(&mut self, command: Command) -> BertResult<Response> {
        match command {
            Command::ReadVersion => Ok(Response::Version(self.config.version)),
            Command::ReadBoardInfo => Ok(Response::BoardInfo(Box::new(self.config.board.clone()))),
            Command::ReadConfiguration => Ok(Response::Configuration(Box::new(self.active.clone()))),
            Command::WriteConfiguration(config) => {
                self.commit("write_configuration", *config)?;
                Ok(Response::Ack)
            }
            Command::WriteFields(fields) => {
                let mut next = self.active.clone();
                for field in &fields {
                    next.apply_field(field);
                }
                self.commit("write_fields", next)?;
                Ok(Response::Ack)
            }
            Command::ReadClockOut => {
                let ratio = self.active.clock.monitor_divider.ratio().max(1) as f64;
                Ok(Response::ClockOut(self.active.signal.linerate_gbd / ratio))
            }
            Command::StartBer { mask, .. } => {
                let now = Instant::now();
                self.ber = Some(BerSession {
                    mask,
                    started: now,
                    last_sample: now,
                });
                self.samples_taken = 0;
                Ok(Response::Ack)
            }
            Command::SampleBer => self.sample().map(|sample| Response::Sample(Box::new(sample))),
            Command::StopBer => {
                self.ber = None;
                Ok(Response::Ack)
            }
            Command::SetMonitorFlags(flags) => {
                self.monitor_flags = flags;
                Ok(Response::Ack)
            }
            Command::ReadMonitor(flag) => {
                if !self.monitor_flags.contains(flag.as_flags()) {
                    return Err(BertError::failed(
                        "read_monitor",
                        format!("{:?} monitor is not enabled", flag),
                    ));
                }
                Ok(Response::Monitor(ChannelArray::from_fn(|ch| self.monitor_value(flag, ch))))
            }
            Command::ReadLos => {
                let locked = self.locked_channels();
                Ok(Response::Los(!(locked.bits() as u8)))
            }
            Command::ReadRxLock => Ok(Response::RxLock(self.locked_channels())),
            Command::ArmHistogram(mask) => Ok(Response::Armed(self.arm_histograms(mask))),
            Command::HistogramStatus(ch) => Ok(Response::HistogramStatus(self.histogram_status(ch))),
            Command::ReadHistogram(ch) => {
                if self.histogram_status(ch) != HistogramStatus::Ready {
                    return Err(BertError::timeout("read_histogram", 0));
                }
                match &self.histograms[ch] {
                    Some(slot) => Ok(Response::Histogram(slot.data.clone())),
                    None => Err(BertError::unexpected("histogram slot vanished")),
                }
            }
            Command::SetErrorPattern(ch, error) => {
                self.injection[ch] = InjectionState::Pattern(error);
                self.active.channels[ch].error = error;
                self.active.channels[ch].error_enabled = true;
                Ok(Response::Ack)
            }
            Command::SetErrorRate(ch, target) => {
                let actual = quantize_error_rate(target)?;
                self.injection[ch] = InjectionState::Rate(actual);
                self.active.channels[ch].error_enabled = true;
                Ok(Response::ErrorRate(actual))
            }
            Command::StopErrorInsertion(ch) => {
                self.injection[ch] = InjectionState::Off;
                self.active.channels[ch].error_enabled = false;
                Ok(Response::Ack)
            }
            Command::ReadInjection(ch) => Ok(Response::Injection(self.injection[ch])),
            Command::SaveCalibration { channel, mode, record } => {
                self.calibration
                    .insert((channel, mode, record.values.kind()), record);
                Ok(Response::Ack)
            }
            Command::LoadCalibration { channel, mode, kind } => self
                .calibration
                .get(&(channel, mode, kind))
                .cloned()
                .map(Response::Calibration)
                .ok_or_else(|| {
                    BertError::failed(
                        "load_calibration",
                        format!("no {:?} record for {} {:?}", kind, channel, mode),
                    )
                }),
        }
    }

    /// Whole-or-nothing replacement of the active configuration
    fn commit(&mut self, operation: &str, next: ConfigurationSettings) -> BertResult<()> {
        if self.faults.fail_commits {
            return Err(BertError::failed(operation, "instrument rejected the write"));
        }
        validate_configuration(&next, &self.config.board.capabilities)?;

        for (ch, settings) in next.channels.iter() {
            self.injection[ch] = match (settings.error_enabled, self.injection[ch]) {
                (false, _) => InjectionState::Off,
                (true, InjectionState::Rate(rate)) => InjectionState::Rate(rate),
                (true, _) => InjectionState::Pattern(settings.error),
            };
        }
        self.active = next;
        Ok(())
    }

    /// Errors an enabled aggressor adds to its victim lane
    fn crosstalk_errors(&self, ch: Channel, bits: u64) -> u64 {
        let noise = &self.active.noise;
        if !noise.enabled || !noise.channel_enabled[ch] {
            return 0;
        }
        let level = f64::from(noise.level[ch]) / f64::from(signal::NOISE_LEVEL_MAX);
        (bits as f64 * CROSSTALK_BER_AT_FULL_LEVEL * level * noise.burst_rate[ch]).round() as u64
    }

    fn locked_channels(&self) -> ChannelMask {
        self.active
            .channels
            .iter()
            .filter(|(ch, settings)| settings.rx_enabled && !self.faults.never_lock.has(*ch))
            .map(|(ch, _)| ch)
            .collect()
    }

    fn sample(&mut self) -> BertResult<RawSample> {
        if let Some(limit) = self.faults.fail_sampling_after {
            if self.ber.is_some() && self.samples_taken >= limit {
                return Err(BertError::failed("sample_ber", "link to instrument dropped"));
            }
        }
        let (mask, elapsed_s, interval_s) = match self.ber.as_mut() {
            Some(session) => {
                let now = Instant::now();
                let interval = now.duration_since(session.last_sample).as_secs_f64();
                session.last_sample = now;
                (session.mask, now.duration_since(session.started).as_secs_f64(), interval)
            }
            None => return Err(BertError::ber_disabled("sample_ber")),
        };

        let bits_per_symbol = self.active.signal.modulation.bits_per_symbol() as u64;
        let symbols = (self.active.signal.linerate_gbd * 1e9 * interval_s.max(1e-4)) as u64;
        let bits = symbols * bits_per_symbol;
        let locked = self.locked_channels();

        let mut channels = ChannelArray::<RawChannelCounts>::default();
        for ch in mask.channels() {
            if !locked.has(ch) {
                continue;
            }
            let (injected_msb, injected_lsb) = injected_errors(self.injection[ch], symbols, bits);
            let injected_msb = injected_msb + self.crosstalk_errors(ch, bits);
            let noise_msb = self.rng.gen_range(0..=self.config.background_errors);
            let noise_lsb = self.rng.gen_range(0..=self.config.background_errors);
            let (errors_msb, errors_lsb) = if bits_per_symbol == 1 {
                (injected_msb + injected_lsb + noise_msb, 0)
            } else {
                (injected_msb + noise_msb, injected_lsb + noise_lsb)
            };
            channels[ch] = RawChannelCounts {
                locked: true,
                bits,
                errors_msb,
                errors_lsb,
            };
        }

        let fec = self.active.fec.mode.is_enabled().then(|| {
            let links: LinkArray<RawFecLink> = std::array::from_fn(|index| {
                let counts = Channel::new(index as u8)
                    .ok()
                    .filter(|ch| self.active.fec.links.has(*ch))
                    .map(|ch| channels[ch]);
                match counts {
                    Some(counts) => fec_link(&counts),
                    None => RawFecLink::default(),
                }
            });
            links
        });

        self.samples_taken += 1;
        Ok(RawSample {
            elapsed_s,
            channels,
            fec,
        })
    }

    fn monitor_value(&self, flag: MonitorFlag, ch: Channel) -> u16 {
        let settings = &self.active.channels[ch];
        let locked = self.locked_channels().has(ch);
        let offset = ch.index() as u16;
        match flag {
            MonitorFlag::Los => u16::from(!locked),
            MonitorFlag::Dsp => settings.dsp_mode.code() as u16,
            MonitorFlag::SignalDetect => u16::from(settings.rx_enabled),
            MonitorFlag::TxLock => u16::from(settings.tx_enabled),
            MonitorFlag::RxLock => u16::from(locked),
            MonitorFlag::Temperature => 45 + offset,
            // 18.0 dB plus 0.1 dB per channel index
            MonitorFlag::Snr if locked => 18 * monitor::SNR_SCALE + offset,
            MonitorFlag::Snr => 0,
            MonitorFlag::Voltage => 3_300,
            MonitorFlag::Current => 200 + 50 * u16::from(settings.tx_enabled),
            MonitorFlag::FfeTaps => settings.amplitude.main_tap.unsigned_abs() as u16,
            MonitorFlag::XtTxLock => u16::from(self.active.noise.channel_enabled[ch]),
            MonitorFlag::Adapter => 1,
            MonitorFlag::Transceiver => 0x11,
        }
    }

    fn arm_histograms(&mut self, mask: ChannelMask) -> ChannelMask {
        let armed = mask & self.locked_channels();
        let now = Instant::now();
        for ch in armed.channels() {
            let jitter = self.rng.gen_range(0..16u32);
            self.histograms[ch] = Some(HistogramSlot {
                status: HistogramStatus::Capturing,
                armed_at: now,
                data: Box::new(pam4_histogram(jitter)),
            });
        }
        armed
    }

    fn histogram_status(&mut self, ch: Channel) -> HistogramStatus {
        let delay = self.histogram_delay;
        match self.histograms[ch].as_mut() {
            Some(slot) => {
                if slot.status == HistogramStatus::Capturing && slot.armed_at.elapsed() >= delay {
                    slot.status = HistogramStatus::Ready;
                }
                slot.status
            }
            None => HistogramStatus::Idle,
        }
    }
}

/// Programmable rate nearest to `target` given whole-word error spacing
pub fn quantize_error_rate(target: f64) -> BertResult<f64> {
    let max_rate = 1.0 / injection::WORD_BITS as f64;
    let min_rate = 1.0 / injection::MAX_SPACING_BITS as f64;
    if !target.is_finite() || target < min_rate || target > max_rate {
        return Err(BertError::unsupported(
            "error_rate",
            format!("{:e} outside [{:e}, {:e}]", target, min_rate, max_rate),
        ));
    }
    let max_words = injection::MAX_SPACING_BITS / injection::WORD_BITS;
    let words = (1.0 / (target * injection::WORD_BITS as f64)).round() as u64;
    let words = words.clamp(1, max_words);
    Ok(1.0 / (words * injection::WORD_BITS) as f64)
}

fn injected_errors(state: InjectionState, symbols: u64, bits: u64) -> (u64, u64) {
    match state {
        InjectionState::Off => (0, 0),
        InjectionState::Pattern(ErrorStruct { pattern, gap, duration }) => {
            let period = gap as u64 + duration as u64;
            if period == 0 || duration == 0 {
                return (0, 0);
            }
            let burst_uis = symbols / period * duration as u64;
            let (msb, lsb) = pattern.errors_per_ui();
            (burst_uis * msb, burst_uis * lsb)
        }
        InjectionState::Rate(rate) => {
            let total = (bits as f64 * rate).round() as u64;
            (total - total / 2, total / 2)
        }
    }
}

fn fec_link(counts: &RawChannelCounts) -> RawFecLink {
    if !counts.locked {
        return RawFecLink::default();
    }
    let errors = counts.errors_msb + counts.errors_lsb;
    let processed = counts.bits / CODEWORD_BITS;
    let corrected = errors.min(processed);
    let mut symbol_error_bins = vec![0u64; SER_BINS];
    symbol_error_bins[0] = processed - corrected;
    symbol_error_bins[1] = corrected;

    RawFecLink {
        locked: true,
        bits: counts.bits,
        counters: FecCounters {
            corrected_ones: errors / 2,
            corrected_zeros: errors - errors / 2,
            symbol_errors: errors,
            codewords_corrected: corrected,
            codewords_uncorrected: 0,
            codewords_processed: processed,
        },
        symbol_error_bins,
    }
}

/// Four-level eye histogram with a small per-capture offset
fn pam4_histogram(offset: u32) -> HistogramData {
    let mut data = [0u32; geometry::HISTOGRAM_BINS];
    let peaks = [32.0, 96.0, 160.0, 224.0];
    for (bin, count) in data.iter_mut().enumerate() {
        let x = bin as f64;
        let density: f64 = peaks
            .iter()
            .map(|peak| (-((x - peak) / 9.0).powi(2)).exp())
            .sum();
        *count = (density * 10_000.0) as u32 + offset;
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorInsertionMode, Modulation};

    fn sim() -> SimulatedBert {
        SimulatedBert::default()
    }

    fn enable_rx(sim: &mut SimulatedBert, ch: Channel) {
        let mut config = sim.active_config();
        config.channels[ch].rx_enabled = true;
        config.channels[ch].tx_enabled = true;
        sim.execute(Command::WriteConfiguration(Box::new(config))).unwrap();
    }

    #[test]
    fn test_sampling_requires_ber() {
        let mut sim = sim();
        let err = sim.execute(Command::SampleBer).unwrap_err();
        assert_eq!(err.status(), crate::error::Status::BerDisabled);
    }

    #[test]
    fn test_unlocked_channels_count_nothing() {
        let mut sim = sim();
        enable_rx(&mut sim, Channel::CH0);
        sim.execute(Command::StartBer { mask: ChannelMask::all(), accumulate: true }).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        let sample = sim.execute(Command::SampleBer).unwrap().into_sample().unwrap();

        assert!(sample.channels[Channel::CH0].locked);
        assert!(sample.channels[Channel::CH0].bits > 0);
        let ch1 = Channel::new(1).unwrap();
        assert!(!sample.channels[ch1].locked);
        assert_eq!(sample.channels[ch1].bits, 0);
        assert!(sample.fec.is_none());
    }

    #[test]
    fn test_nrz_has_no_lsb_errors() {
        let mut sim = sim();
        let mut config = sim.active_config();
        config.signal.modulation = Modulation::Nrz;
        config.channels[Channel::CH0].rx_enabled = true;
        sim.execute(Command::WriteConfiguration(Box::new(config))).unwrap();
        sim.execute(Command::SetErrorPattern(
            Channel::CH0,
            ErrorStruct { pattern: ErrorInsertionMode::All, gap: 10, duration: 1 },
        ))
        .unwrap();

        sim.execute(Command::StartBer { mask: ChannelMask::CH0, accumulate: false }).unwrap();
        let sample = sim.execute(Command::SampleBer).unwrap().into_sample().unwrap();
        assert_eq!(sample.channels[Channel::CH0].errors_lsb, 0);
        assert!(sample.channels[Channel::CH0].errors_msb > 0);
    }

    #[test]
    fn test_noise_bursts_scale_crosstalk() {
        let mut sim = sim();
        let mut config = sim.active_config();
        config.signal.modulation = Modulation::Nrz;
        config.channels[Channel::CH0].rx_enabled = true;
        config.noise.enabled = true;
        config.noise.channel_enabled[Channel::CH0] = true;
        config.noise.level[Channel::CH0] = signal::NOISE_LEVEL_MAX;
        config.noise.burst_rate[Channel::CH0] = 0.25;
        sim.execute(Command::WriteConfiguration(Box::new(config))).unwrap();

        sim.execute(Command::StartBer { mask: ChannelMask::CH0, accumulate: false }).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let sample = sim.execute(Command::SampleBer).unwrap().into_sample().unwrap();
        let counts = sample.channels[Channel::CH0];

        let expected = (counts.bits as f64 * CROSSTALK_BER_AT_FULL_LEVEL * 0.25).round() as u64;
        let background = SimulatorConfig::default().background_errors;
        assert!(expected > 0);
        assert!(counts.errors_msb >= expected);
        assert!(counts.errors_msb <= expected + 2 * background);
    }

    #[test]
    fn test_failed_commit_leaves_state() {
        let mut sim = sim();
        let before = sim.active_config();
        sim.fail_commits(true);

        let mut config = before.clone();
        config.signal.linerate_gbd = 26.5;
        assert!(sim.execute(Command::WriteConfiguration(Box::new(config))).is_err());
        assert_eq!(sim.active_config(), before);
    }

    #[test]
    fn test_write_fields_validated_as_a_whole() {
        let mut sim = sim();
        let mut config = sim.active_config();
        config.signal.linerate_gbd = 200.0;
        let fields = config.diff(&sim.active_config());
        let err = sim.execute(Command::WriteFields(fields)).unwrap_err();
        assert_eq!(err.status(), crate::error::Status::UnsupportedOption);
        assert_eq!(sim.active_config(), ConfigurationSettings::default());
    }

    #[test]
    fn test_error_rate_quantization() {
        assert_eq!(quantize_error_rate(1.0 / 64.0).unwrap(), 1.0 / 64.0);
        let actual = quantize_error_rate(1e-6).unwrap();
        assert!((actual - 1e-6).abs() / 1e-6 < 0.01);
        assert!(quantize_error_rate(0.5).is_err());
        assert!(quantize_error_rate(0.0).is_err());
        assert!(quantize_error_rate(1e-20).is_err());
        assert!(quantize_error_rate(f64::NAN).is_err());
    }

    #[test]
    fn test_histogram_ready_after_delay() {
        let mut sim = sim();
        sim.set_histogram_delay(Duration::from_millis(5));
        enable_rx(&mut sim, Channel::CH0);

        let armed = sim
            .execute(Command::ArmHistogram(ChannelMask::CH0 | ChannelMask::CH1))
            .unwrap()
            .into_armed()
            .unwrap();
        assert_eq!(armed, ChannelMask::CH0);
        assert!(sim.execute(Command::ReadHistogram(Channel::CH0)).is_err());

        std::thread::sleep(Duration::from_millis(10));
        let status = sim
            .execute(Command::HistogramStatus(Channel::CH0))
            .unwrap()
            .into_histogram_status()
            .unwrap();
        assert_eq!(status, HistogramStatus::Ready);
        let data = sim.execute(Command::ReadHistogram(Channel::CH0)).unwrap().into_histogram().unwrap();
        assert!(data[32] > data[64]);
    }

    #[test]
    fn test_los_is_inverse_of_lock() {
        let mut sim = sim();
        enable_rx(&mut sim, Channel::new(2).unwrap());
        let los = sim.execute(Command::ReadLos).unwrap().into_los().unwrap();
        assert_eq!(los, 0b1111_1011);
    }
}

// src/config/settings.rs
//! The instrument configuration aggregate
//!
//! Global parameters sit at the top level; everything channel-scoped lives in
//! `channels`, indexed by `Channel`. `ConfigField` is the unit a partial
//! hardware write is made of.

use crate::config::constants::{geometry, signal};
use crate::types::{
    AfeTrim, CdrDivider, Channel, ChannelArray, ChannelMask, ClockMode, ClockSource, DspMode,
    ErrorStruct, FecMode, FecPattern, Modulation, MonitorDivider, PatternConfig, TapsMode,
};
use serde::{Deserialize, Serialize};

/// Every programmable parameter of the instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationSettings {
    pub signal: SignalSettings,
    pub clock: ClockSettings,
    pub fec: FecSettings,
    pub taps_mode: TapsMode,
    pub afe_trim: AfeTrim,
    pub shallow_loopback: bool,
    pub channels: ChannelArray<ChannelSettings>,
    pub noise: NoiseSettings,
    pub jitter: JitterSettings,
}

/// Line coding parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSettings {
    pub linerate_gbd: f64,
    pub modulation: Modulation,
    pub gray_mapping: bool,
    pub precoding: bool,
    pub ieee_mode: bool,
}

/// Clock tree parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSettings {
    pub source: ClockSource,
    pub mode: ClockMode,
    pub monitor_divider: MonitorDivider,
    pub cdr_divider: CdrDivider,
    pub cdr_source: Channel,
}

/// FEC engine parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FecSettings {
    pub mode: FecMode,
    pub pattern: FecPattern,
    /// One bit per FEC link
    pub links: ChannelMask,
}

/// Transmit amplitude and FIR taps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmplitudeSettings {
    pub main_tap: i32,
    pub pre_emphasis: i32,
    pub post_emphasis: i32,
    pub inner_level: i32,
    pub outer_level: i32,
    pub scaling_level: i32,
    /// Used when the taps mode is seven-tap
    pub advanced_taps: [i32; geometry::ADVANCED_TAP_COUNT],
}

impl AmplitudeSettings {
    /// Approximate differential output swing in mV
    pub fn approximate_output_mv(&self) -> i32 {
        let effective = (self.main_tap.abs() - self.pre_emphasis.abs() - self.post_emphasis.abs())
            .max(0) as f64;
        let swing = signal::FULL_SWING_MV * (effective / signal::TAP_MAX as f64)
            * (self.scaling_level as f64 / 100.0);
        swing.round() as i32
    }
}

impl Default for AmplitudeSettings {
    fn default() -> Self {
        Self {
            main_tap: signal::DEFAULT_MAIN_TAP,
            pre_emphasis: 0,
            post_emphasis: 0,
            inner_level: signal::DEFAULT_INNER_LEVEL,
            outer_level: signal::DEFAULT_OUTER_LEVEL,
            scaling_level: signal::DEFAULT_SCALING_LEVEL,
            advanced_taps: [0; geometry::ADVANCED_TAP_COUNT],
        }
    }
}

/// Channel-scoped parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub tx_pattern: PatternConfig,
    pub rx_pattern: PatternConfig,
    pub tx_enabled: bool,
    pub rx_enabled: bool,
    pub amplitude: AmplitudeSettings,
    pub dsp_mode: DspMode,
    pub ctle: u8,
    pub error: ErrorStruct,
    pub error_enabled: bool,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            tx_pattern: PatternConfig::default(),
            rx_pattern: PatternConfig::default(),
            tx_enabled: false,
            rx_enabled: false,
            amplitude: AmplitudeSettings::default(),
            dsp_mode: DspMode::Slc1,
            ctle: 0,
            error: ErrorStruct::default(),
            error_enabled: false,
        }
    }
}

/// Crosstalk noise generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseSettings {
    pub linerate_gbd: f64,
    pub enabled: bool,
    pub eye_mode: Modulation,
    pub channel_enabled: ChannelArray<bool>,
    pub level: ChannelArray<u16>,
    pub tx_pattern: ChannelArray<PatternConfig>,
    /// Fraction of the time each aggressor is on; 1.0 is continuous
    pub burst_rate: ChannelArray<f64>,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            linerate_gbd: signal::DEFAULT_LINERATE_GBD,
            enabled: false,
            eye_mode: Modulation::Pam4,
            channel_enabled: ChannelArray::default(),
            level: ChannelArray::default(),
            tx_pattern: ChannelArray::default(),
            burst_rate: ChannelArray::from_fn(|_| 1.0),
        }
    }
}

/// Phase modulation jitter source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhaseModulation {
    pub enabled: bool,
    pub rj_enabled: bool,
    pub amplitude: u16,
    pub frequency_hz: u64,
    pub rj_amplitude: u16,
    pub phase_shift: u16,
    pub prbs_amplitude: u16,
    pub data_swing: u16,
    pub data_pattern: u16,
}

/// Frequency modulation jitter source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrequencyModulation {
    pub enabled: bool,
    pub rj_enabled: bool,
    pub amplitude: u16,
    pub frequency_hz: u64,
    pub rj_amplitude: u16,
    pub shift: u16,
}

/// Jitter injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JitterSettings {
    pub pm: PhaseModulation,
    pub fm: FrequencyModulation,
}

impl JitterSettings {
    /// Whether any jitter source is switched on
    pub fn is_active(&self) -> bool {
        self.pm.enabled || self.pm.rj_enabled || self.fm.enabled || self.fm.rj_enabled
    }
}

impl Default for ConfigurationSettings {
    fn default() -> Self {
        Self {
            signal: SignalSettings {
                linerate_gbd: signal::DEFAULT_LINERATE_GBD,
                modulation: Modulation::Pam4,
                gray_mapping: true,
                precoding: false,
                ieee_mode: false,
            },
            clock: ClockSettings {
                source: ClockSource::Internal,
                mode: ClockMode::MonitorClockLow,
                monitor_divider: MonitorDivider::Div1,
                cdr_divider: CdrDivider::Div32,
                cdr_source: Channel::CH0,
            },
            fec: FecSettings {
                mode: FecMode::Disabled,
                pattern: FecPattern::Disabled,
                links: ChannelMask::empty(),
            },
            taps_mode: TapsMode::Three,
            afe_trim: AfeTrim::Neg4Db,
            shallow_loopback: false,
            channels: ChannelArray::default(),
            noise: NoiseSettings::default(),
            jitter: JitterSettings::default(),
        }
    }
}

/// Independently writable group of settings
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigField {
    Signal(SignalSettings),
    Clock(ClockSettings),
    Fec(FecSettings),
    TapsMode(TapsMode),
    AfeTrim(AfeTrim),
    ShallowLoopback(bool),
    Channel(Channel, ChannelSettings),
    Noise(Box<NoiseSettings>),
    Jitter(JitterSettings),
}

impl ConfigField {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            ConfigField::Signal(_) => "signal",
            ConfigField::Clock(_) => "clock",
            ConfigField::Fec(_) => "fec",
            ConfigField::TapsMode(_) => "taps_mode",
            ConfigField::AfeTrim(_) => "afe_trim",
            ConfigField::ShallowLoopback(_) => "shallow_loopback",
            ConfigField::Channel(..) => "channel",
            ConfigField::Noise(_) => "noise",
            ConfigField::Jitter(_) => "jitter",
        }
    }
}

impl ConfigurationSettings {
    /// Field groups where `self` differs from `baseline`
    pub fn diff(&self, baseline: &ConfigurationSettings) -> Vec<ConfigField> {
        let mut fields = Vec::new();

        if self.signal != baseline.signal {
            fields.push(ConfigField::Signal(self.signal));
        }
        if self.clock != baseline.clock {
            fields.push(ConfigField::Clock(self.clock));
        }
        if self.fec != baseline.fec {
            fields.push(ConfigField::Fec(self.fec));
        }
        if self.taps_mode != baseline.taps_mode {
            fields.push(ConfigField::TapsMode(self.taps_mode));
        }
        if self.afe_trim != baseline.afe_trim {
            fields.push(ConfigField::AfeTrim(self.afe_trim));
        }
        if self.shallow_loopback != baseline.shallow_loopback {
            fields.push(ConfigField::ShallowLoopback(self.shallow_loopback));
        }
        for (ch, settings) in self.channels.iter() {
            if *settings != baseline.channels[ch] {
                fields.push(ConfigField::Channel(ch, *settings));
            }
        }
        if self.noise != baseline.noise {
            fields.push(ConfigField::Noise(Box::new(self.noise.clone())));
        }
        if self.jitter != baseline.jitter {
            fields.push(ConfigField::Jitter(self.jitter));
        }

        fields
    }

    /// Overwrite one field group
    pub fn apply_field(&mut self, field: &ConfigField) {
        match field {
            ConfigField::Signal(value) => self.signal = *value,
            ConfigField::Clock(value) => self.clock = *value,
            ConfigField::Fec(value) => self.fec = *value,
            ConfigField::TapsMode(value) => self.taps_mode = *value,
            ConfigField::AfeTrim(value) => self.afe_trim = *value,
            ConfigField::ShallowLoopback(value) => self.shallow_loopback = *value,
            ConfigField::Channel(ch, value) => self.channels[*ch] = *value,
            ConfigField::Noise(value) => self.noise = (**value).clone(),
            ConfigField::Jitter(value) => self.jitter = *value,
        }
    }

    /// Channels with both directions enabled
    pub fn active_channels(&self) -> ChannelMask {
        self.channels
            .iter()
            .filter(|(_, settings)| settings.tx_enabled && settings.rx_enabled)
            .map(|(ch, _)| ch)
            .collect()
    }
}

// src/config/validation.rs
//! Range and capability checks applied before anything reaches hardware
//!
//! Out-of-range values are rejected, never clamped.

use crate::config::constants::signal;
use crate::config::settings::{AmplitudeSettings, ConfigurationSettings, NoiseSettings};
use crate::error::BertError;
use crate::hal::BoardCapabilities;
use crate::types::{ChannelMask, FecFamily, PatternConfig, PatternType, TapsMode};
use std::fmt::Display;
use thiserror::Error;

/// Validation result type
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Why a configuration value was refused
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Value out of valid range
    #[error("{field} = {value} outside [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: String,
        min: String,
        max: String,
    },
    /// Value not in the allowed set
    #[error("{field} = {value} not one of {valid_values:?}")]
    InvalidEnumValue {
        field: String,
        value: String,
        valid_values: Vec<String>,
    },
    /// Board lacks the hardware for this value
    #[error("{field}: {reason}")]
    MissingCapability { field: String, reason: String },
}

impl ValidationError {
    fn field(&self) -> &str {
        match self {
            ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidEnumValue { field, .. }
            | ValidationError::MissingCapability { field, .. } => field,
        }
    }
}

impl From<ValidationError> for BertError {
    fn from(err: ValidationError) -> Self {
        BertError::unsupported(err.field().to_string(), err.to_string())
    }
}

/// Check `min <= value <= max`
pub fn validate_range<T: PartialOrd + Display>(
    field: &str,
    value: T,
    min: T,
    max: T,
) -> ValidationResult<()> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        });
    }
    Ok(())
}

/// Linerate in GBd, bounded by what the board can clock
pub fn validate_linerate(linerate_gbd: f64, caps: &BoardCapabilities) -> ValidationResult<()> {
    if !linerate_gbd.is_finite() {
        return Err(ValidationError::OutOfRange {
            field: "linerate_gbd".into(),
            value: linerate_gbd.to_string(),
            min: signal::MIN_LINERATE_GBD.to_string(),
            max: caps.max_linerate_gbd.to_string(),
        });
    }
    validate_range(
        "linerate_gbd",
        linerate_gbd,
        signal::MIN_LINERATE_GBD,
        caps.max_linerate_gbd.min(signal::MAX_LINERATE_GBD),
    )
}

/// Amplitude, emphasis and eye levels
pub fn validate_amplitude(amplitude: &AmplitudeSettings) -> ValidationResult<()> {
    validate_range("main_tap", amplitude.main_tap, signal::TAP_MIN, signal::TAP_MAX)?;
    validate_range("pre_emphasis", amplitude.pre_emphasis, signal::TAP_MIN, signal::TAP_MAX)?;
    validate_range("post_emphasis", amplitude.post_emphasis, signal::TAP_MIN, signal::TAP_MAX)?;
    validate_range(
        "inner_level",
        amplitude.inner_level,
        signal::INNER_LEVEL_MIN,
        signal::INNER_LEVEL_MAX,
    )?;
    validate_range(
        "outer_level",
        amplitude.outer_level,
        signal::OUTER_LEVEL_MIN,
        signal::OUTER_LEVEL_MAX,
    )?;
    if !signal::SCALING_LEVELS.contains(&amplitude.scaling_level) {
        return Err(ValidationError::InvalidEnumValue {
            field: "scaling_level".into(),
            value: amplitude.scaling_level.to_string(),
            valid_values: signal::SCALING_LEVELS.iter().map(|v| v.to_string()).collect(),
        });
    }
    for (index, tap) in amplitude.advanced_taps.iter().enumerate() {
        validate_range(&format!("advanced_taps[{}]", index), *tap, signal::TAP_MIN, signal::TAP_MAX)?;
    }
    Ok(())
}

/// Pattern kinds the board can generate
pub fn validate_pattern(
    field: &str,
    pattern: &PatternConfig,
    caps: &BoardCapabilities,
) -> ValidationResult<()> {
    if pattern.pattern == PatternType::UserDefined && !caps.supports_user_patterns {
        return Err(ValidationError::MissingCapability {
            field: field.to_string(),
            reason: "board has no user-defined pattern generator".into(),
        });
    }
    if pattern.repetition < 1 {
        return Err(ValidationError::OutOfRange {
            field: format!("{}.repetition", field),
            value: pattern.repetition.to_string(),
            min: "1".into(),
            max: i32::MAX.to_string(),
        });
    }
    Ok(())
}

/// Noise generator levels and board support
pub fn validate_noise(noise: &NoiseSettings, caps: &BoardCapabilities) -> ValidationResult<()> {
    let requested = noise.enabled || noise.channel_enabled.iter().any(|(_, on)| *on);
    if requested && !caps.has_noise_source {
        return Err(ValidationError::MissingCapability {
            field: "noise".into(),
            reason: "board has no noise source".into(),
        });
    }
    for (ch, level) in noise.level.iter() {
        validate_range(&format!("noise.level[{}]", ch.index()), *level, 0, signal::NOISE_LEVEL_MAX)?;
    }
    for (ch, pattern) in noise.tx_pattern.iter() {
        validate_pattern(&format!("noise.tx_pattern[{}]", ch.index()), pattern, caps)?;
    }
    let min_burst = 1.0 / signal::NOISE_BURST_STEPS as f64;
    for (ch, rate) in noise.burst_rate.iter() {
        if rate.is_nan() {
            return Err(ValidationError::OutOfRange {
                field: format!("noise.burst_rate[{}]", ch.index()),
                value: rate.to_string(),
                min: min_burst.to_string(),
                max: "1".into(),
            });
        }
        validate_range(&format!("noise.burst_rate[{}]", ch.index()), *rate, min_burst, 1.0)?;
    }
    validate_range(
        "noise.linerate_gbd",
        noise.linerate_gbd,
        signal::MIN_LINERATE_GBD,
        signal::MAX_LINERATE_GBD,
    )
}

/// Nearest burst rate the noise gate can produce
pub fn quantize_noise_burst_rate(target: f64) -> ValidationResult<f64> {
    let steps = signal::NOISE_BURST_STEPS as f64;
    let slices = (target * steps).round();
    if !target.is_finite() || slices < 1.0 || slices > steps {
        return Err(ValidationError::OutOfRange {
            field: "noise.burst_rate".into(),
            value: target.to_string(),
            min: (1.0 / steps).to_string(),
            max: "1".into(),
        });
    }
    Ok(slices / steps)
}

/// Whole-configuration check against a board
pub fn validate_configuration(
    config: &ConfigurationSettings,
    caps: &BoardCapabilities,
) -> ValidationResult<()> {
    validate_linerate(config.signal.linerate_gbd, caps)?;

    let family = config.fec.mode.family();
    if family != FecFamily::None && family != caps.fec_family {
        return Err(ValidationError::MissingCapability {
            field: "fec.mode".into(),
            reason: format!("{:?} needs a {:?} FEC engine, board has {:?}", config.fec.mode, family, caps.fec_family),
        });
    }

    validate_range("fec.links", config.fec.links.bits(), 0, ChannelMask::all().bits())?;

    if config.taps_mode == TapsMode::Seven && !caps.supports_seven_taps {
        return Err(ValidationError::MissingCapability {
            field: "taps_mode".into(),
            reason: "board only drives three taps".into(),
        });
    }

    if config.jitter.is_active() && !caps.has_jitter_source {
        return Err(ValidationError::MissingCapability {
            field: "jitter".into(),
            reason: "board has no PM/FM jitter source".into(),
        });
    }

    for (ch, settings) in config.channels.iter() {
        validate_pattern(&format!("tx_pattern[{}]", ch.index()), &settings.tx_pattern, caps)?;
        validate_pattern(&format!("rx_pattern[{}]", ch.index()), &settings.rx_pattern, caps)?;
        validate_amplitude(&settings.amplitude)?;
        validate_range(&format!("ctle[{}]", ch.index()), settings.ctle, 0, signal::CTLE_MAX)?;
    }

    validate_noise(&config.noise, caps)
}

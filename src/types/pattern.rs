// src/types/pattern.rs
//! Pattern slots and error-burst schedules

use crate::config::constants::geometry::USER_PATTERN_WORDS;
use crate::types::enums::{ErrorInsertionMode, PatternType};
use serde::{Deserialize, Serialize};

/// One user-defined pattern word and how many times it repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserPatternWord {
    pub pattern: u64,
    pub repetition: u8,
}

/// Pattern slot used for Tx, Rx and noise generators alike
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub pattern: PatternType,
    pub invert: bool,
    /// Only read when `pattern` is `UserDefined`
    pub user_defined: [UserPatternWord; USER_PATTERN_WORDS],
    pub repetition: i32,
}

impl PatternConfig {
    /// Plain, non-inverted pattern
    pub fn new(pattern: PatternType) -> Self {
        Self {
            pattern,
            invert: false,
            user_defined: [UserPatternWord::default(); USER_PATTERN_WORDS],
            repetition: 1,
        }
    }

    /// Same pattern with inversion toggled
    pub fn inverted(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// Length of one repetition in bits
    pub fn period_bits(&self) -> u64 {
        match self.pattern.period_bits() {
            Some(bits) => bits,
            None => self
                .user_defined
                .iter()
                .map(|word| 64 * word.repetition.max(1) as u64)
                .sum(),
        }
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        PatternConfig::new(PatternType::Prbs31)
    }
}

/// Periodic error burst: `duration` UIs with errors, then `gap` clean UIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorStruct {
    pub pattern: ErrorInsertionMode,
    pub gap: u8,
    pub duration: u8,
}

impl ErrorStruct {
    /// Unit intervals in one burst period
    pub fn period_ui(&self) -> u64 {
        self.gap as u64 + self.duration as u64
    }
}

impl Default for ErrorStruct {
    fn default() -> Self {
        Self {
            pattern: ErrorInsertionMode::Bit0,
            gap: 0,
            duration: 0,
        }
    }
}

/// What a channel's error injector is doing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum InjectionState {
    #[default]
    Off,
    /// Periodic bursts
    Pattern(ErrorStruct),
    /// Continuous generation at the programmed rate
    Rate(f64),
}

impl InjectionState {
    /// Whether errors are being injected
    pub fn is_active(&self) -> bool {
        !matches!(self, InjectionState::Off)
    }
}

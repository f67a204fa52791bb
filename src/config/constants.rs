// src/config/constants.rs
//! Instrument limits and manager defaults

/// Channel and link geometry
pub mod geometry {
    pub const MAX_CHANNELS: usize = 8;
    pub const FEC_MAX_LINKS: usize = 8;
    pub const SER_MAX_SYMBOLS: usize = 31;
    pub const HISTOGRAM_BINS: usize = 256;
    pub const ADVANCED_TAP_COUNT: usize = 7;
    pub const USER_PATTERN_WORDS: usize = 2;
}

/// Acquisition buffer and timing
pub mod acquisition {
    /// Snapshots the buffer holds and the most a single drain returns
    pub const MAX_ITEMS_PER_DRAIN: usize = 1024;
    pub const DEFAULT_BUFFER_CAPACITY: usize = MAX_ITEMS_PER_DRAIN;
    pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 100;
    pub const MIN_SAMPLE_INTERVAL_MS: u64 = 1;
    pub const MAX_SAMPLE_INTERVAL_MS: u64 = 60_000;
}

/// Histogram protocol
pub mod histogram {
    pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
    pub const DEFAULT_POLL_MS: u64 = 20;
}

/// Monitor and lock polling
pub mod monitor {
    /// Settling time after enabling a monitor before the first read
    pub const DEFAULT_SETTLE_MS: u64 = 350;
    pub const DEFAULT_RX_LOCK_RETRIES: u32 = 20;
    pub const DEFAULT_RX_LOCK_POLL_MS: u64 = 100;
    /// SNR monitor values are reported at this multiple of dB
    pub const SNR_SCALE: u16 = 10;
}

/// Signal path limits
pub mod signal {
    pub const MIN_LINERATE_GBD: f64 = 1.0;
    pub const MAX_LINERATE_GBD: f64 = 112.0;
    pub const DEFAULT_LINERATE_GBD: f64 = 53.125;

    pub const TAP_MIN: i32 = -1000;
    pub const TAP_MAX: i32 = 1000;
    pub const INNER_LEVEL_MIN: i32 = 500;
    pub const INNER_LEVEL_MAX: i32 = 1500;
    pub const OUTER_LEVEL_MIN: i32 = 1500;
    pub const OUTER_LEVEL_MAX: i32 = 2500;
    pub const SCALING_LEVELS: [i32; 6] = [70, 80, 90, 100, 110, 120];

    pub const DEFAULT_MAIN_TAP: i32 = 1000;
    pub const DEFAULT_INNER_LEVEL: i32 = 1000;
    pub const DEFAULT_OUTER_LEVEL: i32 = 2000;
    pub const DEFAULT_SCALING_LEVEL: i32 = 100;
    /// Full-swing differential output with unity scaling
    pub const FULL_SWING_MV: f64 = 900.0;

    pub const CTLE_MAX: u8 = 31;
    pub const NOISE_LEVEL_MAX: u16 = 1000;
    /// Noise bursts gate the aggressor in 1/256 slices of the line
    pub const NOISE_BURST_STEPS: u32 = 256;
}

/// Error injection envelope
pub mod injection {
    /// Errors are spaced in whole bus words
    pub const WORD_BITS: u64 = 64;
    /// Widest spacing the rate generator can count
    pub const MAX_SPACING_BITS: u64 = 1 << 48;
}

/// Calibration records
pub mod calibration {
    pub const MAX_VALUES: usize = 256;
}

/// Configuration file discovery
pub mod paths {
    pub const DEFAULT_CONFIG_FILE: &str = "bert.toml";
    pub const ENV_PREFIX: &str = "BERT";
}

// src/types/enums.rs
//! Instrument enumerations with their protocol codes

use crate::error::{BertError, BertResult};
use serde::{Deserialize, Serialize};

/// Generates `code()` and `from_code()` for a fieldless `#[repr(i32)]` enum
macro_rules! protocol_codes {
    ($name:ident { $($variant:ident),+ $(,)? }) => {
        impl $name {
            /// Protocol code
            pub fn code(self) -> i32 {
                self as i32
            }

            /// Parse a protocol code
            pub fn from_code(code: i32) -> BertResult<Self> {
                $(
                    if code == $name::$variant as i32 {
                        return Ok($name::$variant);
                    }
                )+
                Err(BertError::unsupported(
                    stringify!($name),
                    format!("unknown code {}", code),
                ))
            }
        }
    };
}

/// Signal modulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Modulation {
    Pam4 = 0,
    Nrz = 1,
}

protocol_codes!(Modulation { Pam4, Nrz });

impl Modulation {
    /// Bits carried per unit interval
    pub fn bits_per_symbol(self) -> u32 {
        match self {
            Modulation::Pam4 => 2,
            Modulation::Nrz => 1,
        }
    }
}

/// Test pattern families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum PatternType {
    Prbs7 = 0,
    Prbs9_4 = 1,
    Prbs9_5 = 2,
    Prbs11 = 3,
    Prbs13 = 4,
    Prbs15 = 5,
    Prbs16 = 6,
    Prbs23 = 7,
    Prbs31 = 8,
    Prbs58 = 9,
    UserDefined = 10,
    Jp03b = 11,
    Lin = 12,
    Cjt = 13,
    Ssprq = 14,
    Sq16 = 15,
    Sq32 = 16,
    Ieee8023bs2 = 17,
    Ieee8023bs4 = 18,
    OifCei311 = 19,
}

protocol_codes!(PatternType {
    Prbs7, Prbs9_4, Prbs9_5, Prbs11, Prbs13, Prbs15, Prbs16, Prbs23, Prbs31, Prbs58,
    UserDefined, Jp03b, Lin, Cjt, Ssprq, Sq16, Sq32, Ieee8023bs2, Ieee8023bs4, OifCei311,
});

impl PatternType {
    /// Sequence length in bits, `None` for user-defined words
    pub fn period_bits(self) -> Option<u64> {
        let order = match self {
            PatternType::Prbs7 => 7,
            PatternType::Prbs9_4 | PatternType::Prbs9_5 => 9,
            PatternType::Prbs11 => 11,
            PatternType::Prbs13 => 13,
            PatternType::Prbs15 => 15,
            PatternType::Prbs16 => 16,
            PatternType::Prbs23 => 23,
            PatternType::Prbs31 => 31,
            PatternType::Prbs58 => 58,
            PatternType::UserDefined => return None,
            PatternType::Sq16 => return Some(32),
            PatternType::Sq32 => return Some(64),
            PatternType::Ssprq => return Some(65_535 * 2),
            PatternType::Jp03b | PatternType::Lin | PatternType::Cjt => return Some(160),
            PatternType::Ieee8023bs2 | PatternType::Ieee8023bs4 | PatternType::OifCei311 => {
                return Some(65_535)
            }
        };
        Some((1u64 << order) - 1)
    }
}

/// Reference clock origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ClockSource {
    External = 0,
    Internal = 1,
}

protocol_codes!(ClockSource { External, Internal });

/// Clock output routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ClockMode {
    MonitorClockLow = 0,
    External = 1,
    RefClk = 2,
    MonitorClockHigh = 3,
    CdrLow = 4,
    CdrHigh = 5,
    RefClk2 = 6,
}

protocol_codes!(ClockMode {
    MonitorClockLow, External, RefClk, MonitorClockHigh, CdrLow, CdrHigh, RefClk2,
});

/// Bit selection for injected errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorInsertionMode {
    /// One MSB error per burst symbol
    Bit0 = 0,
    /// One LSB error per burst symbol
    Bit1 = 1,
    /// One MSB and one LSB error
    Bit01 = 2,
    /// Every MSB in the burst
    Msbs = 3,
    /// Every LSB in the burst
    Lsbs = 4,
    /// Every bit in the burst
    All = 5,
}

protocol_codes!(ErrorInsertionMode { Bit0, Bit1, Bit01, Msbs, Lsbs, All });

impl ErrorInsertionMode {
    /// MSB and LSB errors produced per burst unit interval
    pub fn errors_per_ui(self) -> (u64, u64) {
        match self {
            ErrorInsertionMode::Bit0 | ErrorInsertionMode::Msbs => (1, 0),
            ErrorInsertionMode::Bit1 | ErrorInsertionMode::Lsbs => (0, 1),
            ErrorInsertionMode::Bit01 | ErrorInsertionMode::All => (1, 1),
        }
    }
}

/// Which FEC engine a mode runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FecFamily {
    /// No FEC hardware
    None,
    /// Real FEC ASIC
    Real,
    /// FPGA FEC emulator
    Emulator,
    /// ML4054B FEC analyzer
    Compact,
}

/// FEC operating modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum FecMode {
    Disabled = -1,
    Kp8ToKp4_400G = 0,
    Kp4ToKp2_200G = 1,
    Kp4ToKp4_200G = 2,
    Kp2ToKp1_100G = 3,
    Kp4ToKp4_100G = 4,
    Kp4ToKp2_100G = 5,
    Pcs4ToKr1_100G = 6,
    Kp1ToKp1_50G = 7,
    Kp2ToKp2_50G = 8,
    Kr2ToKr1_50G = 9,
    Kr1ToKr1_25G = 10,
    Kp1ToKp1_25G = 11,
    EmulatorKs50G = 20,
    EmulatorKr50G = 21,
    EmulatorKp50G = 22,
    EmulatorKr100G = 23,
    EmulatorKp100G = 24,
    EmulatorKp200G = 25,
    EmulatorKp400G = 26,
    Fc25G = 40,
    Kr4_25G = 41,
    Kp4_25G = 42,
    Fc50G = 43,
    Kr4_50G = 44,
    Kp4_50G = 45,
    Fc100G = 46,
    Kr4_100G = 47,
    Kp4_100G = 48,
    Fc200G = 49,
    Kr4_200G = 50,
    Kp4_200G = 51,
}

protocol_codes!(FecMode {
    Disabled, Kp8ToKp4_400G, Kp4ToKp2_200G, Kp4ToKp4_200G, Kp2ToKp1_100G, Kp4ToKp4_100G,
    Kp4ToKp2_100G, Pcs4ToKr1_100G, Kp1ToKp1_50G, Kp2ToKp2_50G, Kr2ToKr1_50G, Kr1ToKr1_25G,
    Kp1ToKp1_25G, EmulatorKs50G, EmulatorKr50G, EmulatorKp50G, EmulatorKr100G, EmulatorKp100G,
    EmulatorKp200G, EmulatorKp400G, Fc25G, Kr4_25G, Kp4_25G, Fc50G, Kr4_50G, Kp4_50G, Fc100G,
    Kr4_100G, Kp4_100G, Fc200G, Kr4_200G, Kp4_200G,
});

impl FecMode {
    /// Engine this mode requires
    pub fn family(self) -> FecFamily {
        match self.code() {
            -1 => FecFamily::None,
            0..=11 => FecFamily::Real,
            20..=26 => FecFamily::Emulator,
            _ => FecFamily::Compact,
        }
    }

    /// Whether FEC decoding is active
    pub fn is_enabled(self) -> bool {
        self != FecMode::Disabled
    }
}

/// Pattern transmitted on FEC links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum FecPattern {
    Disabled = -1,
    Idle = 0,
    LocalFault = 1,
    RemoteFault = 2,
}

protocol_codes!(FecPattern { Disabled, Idle, LocalFault, RemoteFault });

/// Calibration table selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum CalibrationMode {
    Advanced = -1,
    LowRateLowVoltage = 0,
    LowRateHighVoltage = 1,
    HighRateLowVoltage = 2,
    HighRateHighVoltage = 3,
}

protocol_codes!(CalibrationMode {
    Advanced, LowRateLowVoltage, LowRateHighVoltage, HighRateLowVoltage, HighRateHighVoltage,
});

/// Transmit FIR length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum TapsMode {
    Three = 0,
    Seven = 1,
}

protocol_codes!(TapsMode { Three, Seven });

/// Receiver DSP chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum DspMode {
    Slc1 = 0,
    Slc1Ldeq = 1,
    Slc1RcSlc2 = 2,
    Slc1RcLdeq = 3,
    Dfe1 = 4,
    Dfe1RcDfe2 = 7,
    Slc1MpicanSlc2 = 8,
    Slc1MpicanLdeq = 9,
    Slc1RcMpicanSlc2 = 10,
    Slc1RcMpicanLdeq = 11,
    Dfe1MpicanDfe2 = 13,
    Dfe1RcMpicanDfe2 = 15,
}

protocol_codes!(DspMode {
    Slc1, Slc1Ldeq, Slc1RcSlc2, Slc1RcLdeq, Dfe1, Dfe1RcDfe2, Slc1MpicanSlc2, Slc1MpicanLdeq,
    Slc1RcMpicanSlc2, Slc1RcMpicanLdeq, Dfe1MpicanDfe2, Dfe1RcMpicanDfe2,
});

/// Analog front-end attenuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum AfeTrim {
    Neg4Db = 0,
    Neg10Db = 1,
}

protocol_codes!(AfeTrim { Neg4Db, Neg10Db });

/// Monitor clock divider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum MonitorDivider {
    Div1 = 1 << 0,
    Div4 = 1 << 2,
    Div8 = 1 << 3,
    Div16 = 1 << 4,
    Div32 = 1 << 5,
    Div64 = 1 << 6,
    Div128 = 1 << 7,
}

protocol_codes!(MonitorDivider { Div1, Div4, Div8, Div16, Div32, Div64, Div128 });

impl MonitorDivider {
    /// Division ratio
    pub fn ratio(self) -> u32 {
        self.code() as u32
    }
}

/// CDR recovered clock divider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum CdrDivider {
    Div32 = 1 << 5,
    Div64 = 1 << 6,
    Div128 = 1 << 7,
    Div256 = 1 << 8,
    Div512 = 1 << 9,
    Div1024 = 1 << 10,
    Div2048 = 1 << 11,
    Div4096 = 1 << 12,
}

protocol_codes!(CdrDivider { Div32, Div64, Div128, Div256, Div512, Div1024, Div2048, Div4096 });

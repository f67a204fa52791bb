// src/types/monitor.rs
//! Telemetry monitor selection

use crate::error::{BertError, BertResult};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Telemetry kinds; iteration follows ascending bit order
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MonitorFlags: u16 {
        const LOS           = 1 << 0;
        const DSP           = 1 << 1;
        const SIGNAL_DETECT = 1 << 2;
        const TX_LOCK       = 1 << 3;
        const RX_LOCK       = 1 << 4;
        const TEMPERATURE   = 1 << 5;
        /// Reported at ten times the dB value
        const SNR           = 1 << 6;
        const VOLTAGE       = 1 << 7;
        const CURRENT       = 1 << 8;
        const FFE_TAPS      = 1 << 9;
        const XT_TX_LOCK    = 1 << 10;
        const ADAPTER       = 1 << 11;
        const TRANSCEIVER   = 1 << 12;
    }
}

/// A single telemetry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MonitorFlag {
    Los,
    Dsp,
    SignalDetect,
    TxLock,
    RxLock,
    Temperature,
    Snr,
    Voltage,
    Current,
    FfeTaps,
    XtTxLock,
    Adapter,
    Transceiver,
}

impl MonitorFlag {
    /// Every kind in ascending bit order
    pub const ALL: [MonitorFlag; 13] = [
        MonitorFlag::Los,
        MonitorFlag::Dsp,
        MonitorFlag::SignalDetect,
        MonitorFlag::TxLock,
        MonitorFlag::RxLock,
        MonitorFlag::Temperature,
        MonitorFlag::Snr,
        MonitorFlag::Voltage,
        MonitorFlag::Current,
        MonitorFlag::FfeTaps,
        MonitorFlag::XtTxLock,
        MonitorFlag::Adapter,
        MonitorFlag::Transceiver,
    ];

    /// Bit position in `MonitorFlags`
    pub fn bit(self) -> u32 {
        self as u32
    }

    /// Single-bit set for this kind
    pub fn as_flags(self) -> MonitorFlags {
        MonitorFlags::from_bits_retain(1 << self.bit())
    }
}

impl MonitorFlags {
    /// Parse a raw mask, rejecting undefined bits
    pub fn from_raw(bits: u16) -> BertResult<Self> {
        MonitorFlags::from_bits(bits).ok_or_else(|| {
            BertError::unsupported("monitor_flags", format!("undefined bits in 0x{:04X}", bits))
        })
    }

    /// Selected kinds in ascending bit order
    pub fn kinds(self) -> impl Iterator<Item = MonitorFlag> {
        MonitorFlag::ALL
            .into_iter()
            .filter(move |flag| self.contains(flag.as_flags()))
    }

    /// Number of selected kinds
    pub fn popcount(self) -> usize {
        self.bits().count_ones() as usize
    }
}

impl From<MonitorFlag> for MonitorFlags {
    fn from(flag: MonitorFlag) -> Self {
        flag.as_flags()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits_match_positions() {
        for (position, flag) in MonitorFlag::ALL.iter().enumerate() {
            assert_eq!(flag.bit() as usize, position);
        }
        assert_eq!(MonitorFlag::Snr.as_flags(), MonitorFlags::SNR);
        assert_eq!(MonitorFlag::Transceiver.as_flags(), MonitorFlags::TRANSCEIVER);
    }

    #[test]
    fn test_kinds_ascending() {
        let mask = MonitorFlags::VOLTAGE | MonitorFlags::LOS | MonitorFlags::SNR;
        let kinds: Vec<MonitorFlag> = mask.kinds().collect();
        assert_eq!(kinds, vec![MonitorFlag::Los, MonitorFlag::Snr, MonitorFlag::Voltage]);
        assert_eq!(mask.popcount(), 3);
    }

    #[test]
    fn test_undefined_bits_rejected() {
        assert!(MonitorFlags::from_raw(0x1FFF).is_ok());
        assert!(MonitorFlags::from_raw(0x2000).is_err());
    }
}

// src/monitor.rs
//! Per-channel telemetry reads
//!
//! Which telemetry kinds the instrument samples is independent of the
//! capture loop's channel mask. Reads of a kind that is not enabled fail on
//! the instrument side.

use crate::config::constants::geometry::MAX_CHANNELS;
use crate::config::ManagerSettings;
use crate::error::{BertError, BertResult};
use crate::hal::{Command, SharedTransport};
use crate::types::{Channel, ChannelArray, ChannelMask, MonitorFlag, MonitorFlags};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// Loss-of-signal in both shapes the instrument API exposes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LosReading {
    /// One bit per channel, set when the channel has lost signal
    pub packed: u8,
    pub per_channel: ChannelArray<bool>,
}

impl LosReading {
    pub fn from_packed(packed: u8) -> Self {
        Self {
            packed,
            per_channel: ChannelArray::from_fn(|ch| packed & (1 << ch.index()) != 0),
        }
    }

    pub fn is_lost(&self, channel: Channel) -> bool {
        self.per_channel[channel]
    }
}

/// Telemetry monitor access over the shared transport
pub struct MonitorReader {
    transport: SharedTransport,
    enabled: Mutex<MonitorFlags>,
    settle: Duration,
    rx_lock_retries: u32,
    rx_lock_poll: Duration,
}

impl MonitorReader {
    pub fn new(transport: SharedTransport, settings: &ManagerSettings) -> Self {
        Self {
            transport,
            enabled: Mutex::new(MonitorFlags::empty()),
            settle: settings.monitor_settle(),
            rx_lock_retries: settings.rx_lock_retries.max(1),
            rx_lock_poll: settings.rx_lock_poll(),
        }
    }

    /// Kinds currently sampled by the instrument
    pub fn enabled_flags(&self) -> MonitorFlags {
        *self.enabled.lock()
    }

    /// Replace the sampled kinds
    ///
    /// Newly enabled kinds need `monitor_settle_ms` before their first
    /// reading is meaningful; this call waits that long before returning.
    pub fn set_enabled_flags(&self, flags: MonitorFlags) -> BertResult<()> {
        let mut enabled = self.enabled.lock();
        self.transport
            .execute(Command::SetMonitorFlags(flags))?
            .into_ack()?;

        let added = flags - *enabled;
        *enabled = flags;
        drop(enabled);

        tracing::debug!(flags = ?flags, "monitor flags set");
        if !added.is_empty() && !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
        Ok(())
    }

    /// Enable or disable a single kind, leaving the others as they are
    pub fn set_flag(&self, flag: MonitorFlag, enabled: bool) -> BertResult<()> {
        let mut flags = self.enabled_flags();
        flags.set(flag.as_flags(), enabled);
        self.set_enabled_flags(flags)
    }

    /// One value per channel, scaled as the kind defines (SNR is dB x 10)
    pub fn read_one(&self, flag: MonitorFlag) -> BertResult<ChannelArray<u16>> {
        self.transport.execute(Command::ReadMonitor(flag))?.into_monitor()
    }

    /// Eight values per selected kind, kinds in ascending bit order
    ///
    /// The result always holds `popcount(mask) * 8` values.
    pub fn read_many(&self, mask: MonitorFlags) -> BertResult<Vec<u16>> {
        let mut values = Vec::with_capacity(mask.popcount() * MAX_CHANNELS);
        for flag in mask.kinds() {
            values.extend_from_slice(self.read_one(flag)?.values());
        }
        Ok(values)
    }

    pub fn read_los(&self) -> BertResult<LosReading> {
        let packed = self.transport.execute(Command::ReadLos)?.into_los()?;
        Ok(LosReading::from_packed(packed))
    }

    /// Channels whose receiver currently holds lock
    pub fn read_rx_lock(&self) -> BertResult<ChannelMask> {
        self.transport.execute(Command::ReadRxLock)?.into_rx_lock()
    }

    /// Poll until every channel in `mask` is locked
    ///
    /// Gives up with `Timeout` after `rx_lock_retries` reads spaced by
    /// `rx_lock_poll_ms`.
    pub fn wait_for_rx_lock(&self, mask: ChannelMask) -> BertResult<ChannelMask> {
        let mut locked = ChannelMask::empty();
        for attempt in 1..=self.rx_lock_retries {
            locked = self.read_rx_lock()?;
            if locked.contains(mask) {
                tracing::debug!(mask = ?mask, attempt, "rx lock acquired");
                return Ok(locked);
            }
            if attempt < self.rx_lock_retries {
                thread::sleep(self.rx_lock_poll);
            }
        }

        let waited = self.rx_lock_poll * self.rx_lock_retries.saturating_sub(1);
        tracing::warn!(wanted = ?mask, locked = ?locked, "rx lock not acquired");
        Err(BertError::timeout("wait_for_rx_lock", waited.as_millis() as u64))
    }
}

impl std::fmt::Debug for MonitorReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorReader")
            .field("enabled", &self.enabled_flags())
            .field("settle", &self.settle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationStager;
    use crate::config::constants::monitor::SNR_SCALE;
    use crate::error::Status;
    use crate::hal::{BoardCapabilities, SimulatedBert};

    fn reader() -> (MonitorReader, ConfigurationStager, SimulatedBert) {
        let sim = SimulatedBert::default();
        let transport = SharedTransport::new(sim.clone());
        let settings = ManagerSettings {
            monitor_settle_ms: 0,
            rx_lock_poll_ms: 1,
            rx_lock_retries: 3,
            ..ManagerSettings::default()
        };
        let stager = ConfigurationStager::new(transport.clone(), BoardCapabilities::default());
        (MonitorReader::new(transport, &settings), stager, sim)
    }

    #[test]
    fn test_disabled_kind_fails() {
        let (reader, _, _) = reader();
        let err = reader.read_one(MonitorFlag::Temperature).unwrap_err();
        assert_eq!(err.status(), Status::Failed);
    }

    #[test]
    fn test_set_flag_keeps_others() {
        let (reader, _, sim) = reader();
        reader.set_flag(MonitorFlag::Voltage, true).unwrap();
        reader.set_flag(MonitorFlag::Temperature, true).unwrap();
        reader.set_flag(MonitorFlag::Voltage, false).unwrap();
        assert_eq!(reader.enabled_flags(), MonitorFlags::TEMPERATURE);
        assert_eq!(sim.monitor_flags(), MonitorFlags::TEMPERATURE);
    }

    #[test]
    fn test_read_many_layout() {
        let (reader, stager, _) = reader();
        stager.set_rx_enabled(1u8, true, true).unwrap();
        let mask = MonitorFlags::SNR | MonitorFlags::TEMPERATURE | MonitorFlags::VOLTAGE;
        reader.set_enabled_flags(mask).unwrap();

        let values = reader.read_many(mask).unwrap();
        assert_eq!(values.len(), 24);
        // Temperature, then SNR, then voltage
        assert_eq!(values[0], 45);
        assert_eq!(values[8 + 1], 18 * SNR_SCALE + 1);
        assert_eq!(values[8], 0);
        assert!(values[16..].iter().all(|v| *v == 3_300));
    }

    #[test]
    fn test_los_shapes_agree() {
        let (reader, stager, _) = reader();
        stager.set_rx_enabled(0u8, true, false).unwrap();
        stager.set_rx_enabled(3u8, true, true).unwrap();

        let los = reader.read_los().unwrap();
        assert_eq!(los.packed, !0b0000_1001u8);
        assert!(!los.is_lost(Channel::new(0).unwrap()));
        assert!(los.is_lost(Channel::new(1).unwrap()));
        assert!(!los.is_lost(Channel::new(3).unwrap()));
    }

    #[test]
    fn test_wait_for_rx_lock() {
        let (reader, stager, sim) = reader();
        stager.set_rx_enabled(0u8, true, false).unwrap();
        stager.set_rx_enabled(1u8, true, true).unwrap();

        let locked = reader.wait_for_rx_lock(ChannelMask::CH0 | ChannelMask::CH1).unwrap();
        assert!(locked.contains(ChannelMask::CH0 | ChannelMask::CH1));

        sim.set_never_lock(ChannelMask::CH1);
        let err = reader.wait_for_rx_lock(ChannelMask::CH1).unwrap_err();
        assert_eq!(err.status(), Status::Timeout);
        assert!(err.is_retryable());
    }
}

// src/histogram.rs
//! Two-phase histogram capture
//!
//! Per channel: `Idle -> Capturing -> Ready`. The caller arms a set of
//! channels, polls until each is ready and then reads 256 bins. Data read
//! after `Ready` is cached, so re-reading without a new request returns the
//! same bins.

use crate::config::ManagerSettings;
use crate::error::{BertError, BertResult};
use crate::hal::{Command, HistogramStatus, SharedTransport};
use crate::types::{Channel, ChannelArray, ChannelMask, HistogramData, IntoChannel};
use parking_lot::Mutex;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
struct ChannelHistogram {
    status: HistogramStatus,
    data: Option<Box<HistogramData>>,
}

/// Histogram capture protocol over the shared transport
pub struct HistogramController {
    transport: SharedTransport,
    channels: Mutex<ChannelArray<ChannelHistogram>>,
    timeout: Duration,
    poll: Duration,
}

impl HistogramController {
    pub fn new(transport: SharedTransport, settings: &ManagerSettings) -> Self {
        Self {
            transport,
            channels: Mutex::new(ChannelArray::default()),
            timeout: settings.histogram_timeout(),
            poll: settings.histogram_poll().max(Duration::from_millis(1)),
        }
    }

    /// Arm `mask`; returns the channels the instrument accepted
    ///
    /// Channels without lock are refused by the hardware and keep their
    /// previous state.
    pub fn request_capture(&self, mask: ChannelMask) -> BertResult<ChannelMask> {
        let mask = mask.checked()?;
        let mut channels = self.channels.lock();
        let armed = self
            .transport
            .execute(Command::ArmHistogram(mask))?
            .into_armed()?;

        for ch in armed.channels() {
            channels[ch] = ChannelHistogram {
                status: HistogramStatus::Capturing,
                data: None,
            };
        }
        if armed != mask {
            tracing::debug!(requested = ?mask, armed = ?armed, "histogram request partially refused");
        }
        Ok(armed)
    }

    /// Current state of one channel, refreshed from hardware while capturing
    pub fn state(&self, channel: impl IntoChannel) -> BertResult<HistogramStatus> {
        let ch = channel.into_channel()?;
        let mut channels = self.channels.lock();
        self.refresh(&mut channels, ch)
    }

    /// Bins of the last completed capture
    ///
    /// Fails with `Timeout` while the channel is not `Ready`; the caller
    /// decides whether to poll again.
    pub fn read(&self, channel: impl IntoChannel) -> BertResult<HistogramData> {
        let ch = channel.into_channel()?;
        let mut channels = self.channels.lock();
        if let Some(data) = &channels[ch].data {
            return Ok(**data);
        }

        if self.refresh(&mut channels, ch)? != HistogramStatus::Ready {
            return Err(BertError::timeout("read_histogram", 0));
        }
        let data = self
            .transport
            .execute(Command::ReadHistogram(ch))?
            .into_histogram()?;
        let bins = *data;
        channels[ch].data = Some(data);
        tracing::debug!(channel = %ch, "histogram read");
        Ok(bins)
    }

    /// Request, wait for readiness and read every accepted channel
    ///
    /// Returns the bins of the channels the instrument armed, in channel
    /// order. Fails with `Timeout` if any armed channel is not ready within
    /// `histogram_timeout_ms`.
    pub fn capture_and_read(&self, mask: ChannelMask) -> BertResult<Vec<(Channel, HistogramData)>> {
        let armed = self.request_capture(mask)?;
        let started = Instant::now();
        let mut pending: Vec<Channel> = armed.channels().collect();

        while !pending.is_empty() {
            let mut still_waiting = Vec::with_capacity(pending.len());
            for ch in pending {
                if self.state(ch)? != HistogramStatus::Ready {
                    still_waiting.push(ch);
                }
            }
            pending = still_waiting;
            if pending.is_empty() {
                break;
            }

            let waited = started.elapsed();
            if waited >= self.timeout {
                tracing::warn!(pending = pending.len(), "histogram capture timed out");
                return Err(BertError::timeout("capture_and_read", waited.as_millis() as u64));
            }
            thread::sleep(self.poll.min(self.timeout - waited));
        }

        armed
            .channels()
            .map(|ch| self.read(ch).map(|bins| (ch, bins)))
            .collect()
    }

    fn refresh(&self, channels: &mut ChannelArray<ChannelHistogram>, ch: Channel) -> BertResult<HistogramStatus> {
        if channels[ch].status == HistogramStatus::Capturing {
            let status = self
                .transport
                .execute(Command::HistogramStatus(ch))?
                .into_histogram_status()?;
            channels[ch].status = status;
        }
        Ok(channels[ch].status)
    }
}

impl std::fmt::Debug for HistogramController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let states = self.channels.lock().map(|_, slot| slot.status);
        f.debug_struct("HistogramController")
            .field("states", &states)
            .field("timeout", &self.timeout)
            .finish()
    }
}

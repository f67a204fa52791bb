// src/acquisition/engine.rs
//! The capture loop
//!
//! A session is `StartBer`, then repeated `SampleBer` commands, then
//! `StopBer`. Each sample takes the transport lock for one command only, so
//! configuration writes from other threads interleave between samples.
//!
//! Stopping is a channel, not a flag: `stop()` drops the session's stop
//! sender and the loop sees the disconnect at its next sampling boundary or
//! while it waits for room in a full queue.

use crate::acquisition::accumulator::MeasurementAccumulator;
use crate::acquisition::buffer::{snapshot_queue, PushOutcome, SnapshotConsumer, SnapshotProducer};
use crate::config::constants::acquisition::MAX_ITEMS_PER_DRAIN;
use crate::config::{ConfigurationStager, ManagerSettings};
use crate::error::{BertError, BertResult};
use crate::hal::{Command, SharedTransport};
use crate::types::{ChannelMask, MeasurementSnapshot};
use crate::utils::time::{MonotonicTimeProvider, TimeProvider};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Engine state; there is no separate stopped state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureState {
    Idle,
    Capturing,
}

/// Why a capture session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    Stopped,
    TimedOut,
}

/// Outcome of a blocking capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSummary {
    /// Snapshots enqueued during the session
    pub samples: u64,
    pub reason: StopReason,
}

/// Point-in-time view of the engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub state: CaptureState,
    pub buffered: usize,
    /// Snapshots produced in the current or last session
    pub samples_produced: u64,
    /// Failure waiting to be reported by the next `drain`
    pub pending_error: Option<BertError>,
}

#[derive(Default)]
struct SessionSlot {
    stop_tx: Option<Sender<()>>,
    consumer: Option<SnapshotConsumer>,
}

#[derive(Default)]
struct EngineShared {
    capturing: AtomicBool,
    samples: AtomicU64,
    slot: Mutex<SessionSlot>,
    last_error: Mutex<Option<BertError>>,
}

struct Session {
    mask: ChannelMask,
    accumulate: bool,
    producer: SnapshotProducer,
    stop_rx: Receiver<()>,
    accumulator: MeasurementAccumulator,
}

/// Everything the loop needs, cloneable into a worker thread
#[derive(Clone)]
struct LoopContext {
    transport: SharedTransport,
    shared: Arc<EngineShared>,
    clock: Arc<dyn TimeProvider>,
    interval: Duration,
}

/// Capture loop owner and measurement buffer
pub struct AcquisitionEngine {
    ctx: LoopContext,
    stager: Arc<ConfigurationStager>,
    capacity: usize,
    capture_timeout: Option<Duration>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AcquisitionEngine {
    /// Engine over `transport`, reading channel and FEC setup from `stager`
    pub fn new(transport: SharedTransport, stager: Arc<ConfigurationStager>, settings: &ManagerSettings) -> Self {
        Self::with_clock(transport, stager, settings, Arc::new(MonotonicTimeProvider::new()))
    }

    /// Same as `new` with an explicit timestamp source
    pub fn with_clock(
        transport: SharedTransport,
        stager: Arc<ConfigurationStager>,
        settings: &ManagerSettings,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            ctx: LoopContext {
                transport,
                shared: Arc::new(EngineShared::default()),
                clock,
                interval: settings.sample_interval(),
            },
            stager,
            capacity: settings.buffer_capacity.min(MAX_ITEMS_PER_DRAIN),
            capture_timeout: settings.capture_timeout(),
            worker: Mutex::new(None),
        }
    }

    /// Run a capture on the calling thread until `stop()` or a failure
    ///
    /// Honours `capture_timeout_ms` from the manager settings when set.
    pub fn start_capture_loop(&self, mask: ChannelMask, accumulate: bool) -> BertResult<CaptureSummary> {
        let session = self.begin_session(mask, accumulate)?;
        let deadline = self.capture_timeout.map(|t| Instant::now() + t);
        self.ctx.run(session, deadline, false)
    }

    /// Blocking capture that also ends after `timeout`
    pub fn start_capture_loop_with_timeout(
        &self,
        mask: ChannelMask,
        accumulate: bool,
        timeout: Duration,
    ) -> BertResult<CaptureSummary> {
        let session = self.begin_session(mask, accumulate)?;
        self.ctx.run(session, Some(Instant::now() + timeout), false)
    }

    /// Run the capture loop on a worker thread and return immediately
    pub fn start_background(&self, mask: ChannelMask, accumulate: bool) -> BertResult<()> {
        let session = self.begin_session(mask, accumulate)?;

        let mut worker = self.worker.lock();
        if let Some(previous) = worker.take() {
            // Finished already: `capturing` was false for begin_session to succeed
            if previous.join().is_err() {
                tracing::warn!("previous capture worker panicked");
            }
        }

        let ctx = self.ctx.clone();
        let spawned = thread::Builder::new()
            .name("bert-capture".to_string())
            .spawn(move || {
                // Failures are stored for the next drain inside run()
                if let Ok(summary) = ctx.run(session, None, true) {
                    tracing::debug!(samples = summary.samples, "capture worker exiting");
                }
            });

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.ctx.shared.slot.lock().stop_tx = None;
                self.ctx.shared.capturing.store(false, Ordering::SeqCst);
                Err(BertError::failed("start_background", err.to_string()))
            }
        }
    }

    /// Ask the running loop to finish its current sample and exit
    ///
    /// Idempotent. Waits for a background worker; a blocking loop on another
    /// thread returns from its own call.
    pub fn stop(&self) -> BertResult<()> {
        let signalled = self.ctx.shared.slot.lock().stop_tx.take().is_some();
        if signalled {
            tracing::info!("capture stop requested");
        }

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| BertError::unexpected("capture worker panicked"))?;
        }
        Ok(())
    }

    /// Up to `max_items` snapshots in FIFO order, at most 1024
    ///
    /// A stored capture failure is returned once, before any more data.
    pub fn drain(&self, max_items: usize) -> BertResult<Vec<MeasurementSnapshot>> {
        if let Some(err) = self.ctx.shared.last_error.lock().take() {
            return Err(err);
        }
        let slot = self.ctx.shared.slot.lock();
        Ok(match &slot.consumer {
            Some(consumer) => consumer.drain(max_items.min(MAX_ITEMS_PER_DRAIN)),
            None => Vec::new(),
        })
    }

    pub fn is_capturing(&self) -> bool {
        self.ctx.shared.capturing.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> EngineStatus {
        let shared = &self.ctx.shared;
        EngineStatus {
            state: if self.is_capturing() {
                CaptureState::Capturing
            } else {
                CaptureState::Idle
            },
            buffered: shared.slot.lock().consumer.as_ref().map_or(0, |c| c.len()),
            samples_produced: shared.samples.load(Ordering::Relaxed),
            pending_error: shared.last_error.lock().clone(),
        }
    }

    /// Fresh queue and counters for a new session
    ///
    /// An undrained failure from the previous session stays stored so the
    /// next `drain` still reports it.
    fn begin_session(&self, mask: ChannelMask, accumulate: bool) -> BertResult<Session> {
        let mask = mask.checked()?;
        let shared = &self.ctx.shared;
        if shared.capturing.swap(true, Ordering::SeqCst) {
            return Err(BertError::failed("start_capture", "a capture session is already running"));
        }

        let fec = self.stager.pending_config().fec;
        let (producer, consumer) = snapshot_queue(self.capacity);
        let (stop_tx, stop_rx) = channel::bounded(1);
        {
            let mut slot = shared.slot.lock();
            slot.stop_tx = Some(stop_tx);
            slot.consumer = Some(consumer);
        }
        shared.samples.store(0, Ordering::Relaxed);

        tracing::info!(mask = ?mask, accumulate, fec_mode = ?fec.mode, "capture starting");
        Ok(Session {
            mask,
            accumulate,
            producer,
            stop_rx,
            accumulator: MeasurementAccumulator::new(mask, accumulate, fec),
        })
    }
}

impl LoopContext {
    /// One full session; `background` failures are kept for the next drain
    fn run(&self, mut session: Session, deadline: Option<Instant>, background: bool) -> BertResult<CaptureSummary> {
        let result = self
            .transport
            .execute(Command::StartBer {
                mask: session.mask,
                accumulate: session.accumulate,
            })
            .and_then(|r| r.into_ack())
            .and_then(|()| self.sample_until_stopped(&mut session, deadline));

        if let Err(err) = self.transport.execute(Command::StopBer) {
            tracing::warn!(error = %err, "stop_ber failed after capture");
        }

        match &result {
            Ok(summary) => tracing::info!(samples = summary.samples, reason = ?summary.reason, "capture finished"),
            Err(err) => {
                tracing::warn!(error = %err, "capture terminated by failure");
                if background {
                    *self.shared.last_error.lock() = Some(err.clone());
                }
            }
        }

        self.shared.slot.lock().stop_tx = None;
        self.shared.capturing.store(false, Ordering::SeqCst);
        result
    }

    fn sample_until_stopped(&self, session: &mut Session, deadline: Option<Instant>) -> BertResult<CaptureSummary> {
        let mut samples = 0u64;

        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(CaptureSummary {
                    samples,
                    reason: StopReason::TimedOut,
                });
            }

            let raw = self.transport.execute(Command::SampleBer)?.into_sample()?;
            let snapshot = session.accumulator.ingest(&raw, self.clock.now_nanos());
            let sequence = snapshot.sequence;

            // A stop while waiting for room still keeps this sample
            let stopped = match session.producer.push(snapshot, &session.stop_rx) {
                PushOutcome::Queued => false,
                PushOutcome::Stopped => true,
                PushOutcome::Closed => break,
            };
            samples += 1;
            self.shared.samples.store(samples, Ordering::Relaxed);
            tracing::trace!(sequence, "snapshot queued");
            if stopped {
                break;
            }

            let wait = match deadline {
                Some(d) => self.interval.min(d.saturating_duration_since(Instant::now())),
                None => self.interval,
            };
            match session.stop_rx.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(CaptureSummary {
            samples,
            reason: StopReason::Stopped,
        })
    }
}

impl Drop for AcquisitionEngine {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(error = %err, "capture did not stop cleanly");
        }
    }
}

impl std::fmt::Debug for AcquisitionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionEngine")
            .field("capturing", &self.is_capturing())
            .field("capacity", &self.capacity)
            .field("interval", &self.ctx.interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{BoardCapabilities, SimulatedBert};
    use crate::types::Channel;
    use crate::utils::time::MockTimeProvider;

    fn engine_with(settings: ManagerSettings) -> (AcquisitionEngine, SimulatedBert) {
        let sim = SimulatedBert::default();
        let transport = SharedTransport::new(sim.clone());
        let stager = Arc::new(ConfigurationStager::new(transport.clone(), BoardCapabilities::default()));
        stager.set_rx_enabled(0u8, true, false).unwrap();
        stager.set_tx_enabled(0u8, true, true).unwrap();
        (AcquisitionEngine::new(transport, stager, &settings), sim)
    }

    fn fast_settings() -> ManagerSettings {
        ManagerSettings {
            sample_interval_ms: 2,
            ..ManagerSettings::default()
        }
    }

    fn wait_for_samples(engine: &AcquisitionEngine, count: u64) {
        let started = Instant::now();
        while engine.status().samples_produced < count && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_background_capture_and_stop() {
        let (engine, sim) = engine_with(fast_settings());
        engine.start_background(ChannelMask::CH0, true).unwrap();
        assert!(engine.is_capturing());
        wait_for_samples(&engine, 3);

        engine.stop().unwrap();
        assert!(!engine.is_capturing());
        assert!(!sim.ber_running());

        let snapshots = engine.drain(1024).unwrap();
        assert!(snapshots.len() >= 3);
        for (i, snapshot) in snapshots.iter().enumerate() {
            assert_eq!(snapshot.sequence, i as u64);
        }
        engine.stop().unwrap();
    }

    #[test]
    fn test_second_start_is_rejected() {
        let (engine, _sim) = engine_with(fast_settings());
        engine.start_background(ChannelMask::CH0, false).unwrap();
        let err = engine.start_background(ChannelMask::CH0, false).unwrap_err();
        assert_eq!(err.status(), crate::error::Status::Failed);
        assert!(engine.is_capturing());
        engine.stop().unwrap();
    }

    #[test]
    fn test_capture_failure_surfaces_once_on_drain() {
        let (engine, sim) = engine_with(fast_settings());
        sim.fail_sampling_after(Some(2));
        engine.start_background(ChannelMask::CH0, true).unwrap();

        let started = Instant::now();
        while engine.is_capturing() && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!engine.is_capturing());
        assert!(engine.status().pending_error.is_some());

        let err = engine.drain(10).unwrap_err();
        assert_eq!(err.status(), crate::error::Status::Failed);
        assert_eq!(engine.drain(10).unwrap().len(), 2);
        assert!(engine.status().pending_error.is_none());
    }

    #[test]
    fn test_failure_survives_restart_until_drained() {
        let (engine, sim) = engine_with(fast_settings());
        sim.fail_sampling_after(Some(2));
        engine.start_background(ChannelMask::CH0, true).unwrap();

        let started = Instant::now();
        while engine.is_capturing() && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(engine.status().pending_error.is_some());

        sim.fail_sampling_after(None);
        engine.start_background(ChannelMask::CH0, true).unwrap();
        wait_for_samples(&engine, 2);
        engine.stop().unwrap();

        let err = engine.drain(1024).unwrap_err();
        assert_eq!(err.status(), crate::error::Status::Failed);
        let snapshots = engine.drain(1024).unwrap();
        assert!(snapshots.len() >= 2);
        assert_eq!(snapshots[0].sequence, 0);
    }

    #[test]
    fn test_mask_beyond_channel_seven_rejected() {
        let (engine, sim) = engine_with(fast_settings());
        let mask = ChannelMask::from_bits_retain(0x0100);

        let err = engine.start_background(mask, true).unwrap_err();
        assert_eq!(err.status(), crate::error::Status::UnsupportedOption);
        let err = engine
            .start_capture_loop_with_timeout(mask | ChannelMask::CH0, false, Duration::from_millis(5))
            .unwrap_err();
        assert_eq!(err.status(), crate::error::Status::UnsupportedOption);

        assert!(!engine.is_capturing());
        assert!(!sim.ber_running());
        assert!(engine.drain(10).unwrap().is_empty());
    }

    #[test]
    fn test_blocking_capture_with_timeout() {
        let (engine, _sim) = engine_with(fast_settings());
        let summary = engine
            .start_capture_loop_with_timeout(ChannelMask::CH0, false, Duration::from_millis(30))
            .unwrap();
        assert_eq!(summary.reason, StopReason::TimedOut);
        assert!(summary.samples > 0);
        assert_eq!(engine.drain(1024).unwrap().len() as u64, summary.samples);
    }

    #[test]
    fn test_blocking_capture_stopped_from_other_thread() {
        let (engine, _sim) = engine_with(ManagerSettings {
            sample_interval_ms: 50,
            ..ManagerSettings::default()
        });
        let engine = Arc::new(engine);
        let worker = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.start_capture_loop(ChannelMask::CH0, true))
        };

        wait_for_samples(&engine, 1);
        let stop_requested = Instant::now();
        engine.stop().unwrap();
        let summary = worker.join().unwrap().unwrap();

        assert_eq!(summary.reason, StopReason::Stopped);
        assert!(stop_requested.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_backpressure_holds_producer() {
        let (engine, sim) = engine_with(ManagerSettings {
            sample_interval_ms: 1,
            buffer_capacity: 4,
            ..ManagerSettings::default()
        });
        engine.start_background(ChannelMask::CH0, true).unwrap();
        thread::sleep(Duration::from_millis(60));

        let status = engine.status();
        assert_eq!(status.buffered, 4);
        assert_eq!(status.samples_produced, 4);

        // The sample waiting for room when stop arrives is kept
        engine.stop().unwrap();
        assert_eq!(sim.samples_taken(), 5);
        assert_eq!(engine.status().samples_produced, 5);
        let drained = engine.drain(1024).unwrap();
        assert_eq!(drained.len() as u64, sim.samples_taken());
        assert_eq!(drained.last().unwrap().sequence, 4);
        let totals: Vec<u64> = drained
            .iter()
            .map(|s| s.ber.accumulated.as_ref().unwrap().error_count[Channel::CH0])
            .collect();
        assert!(totals.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_timestamps_come_from_clock() {
        let sim = SimulatedBert::default();
        let transport = SharedTransport::new(sim);
        let stager = Arc::new(ConfigurationStager::new(transport.clone(), BoardCapabilities::default()));
        let clock = Arc::new(MockTimeProvider::new(7_000));
        let engine = AcquisitionEngine::with_clock(transport, stager, &fast_settings(), clock);

        engine
            .start_capture_loop_with_timeout(ChannelMask::CH0, false, Duration::from_millis(10))
            .unwrap();
        let snapshots = engine.drain(10).unwrap();
        assert!(snapshots.iter().all(|s| s.timestamp_ns == 7_000));
    }
}

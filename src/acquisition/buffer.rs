// src/acquisition/buffer.rs
//! Bounded snapshot queue between the capture loop and the consumer
//!
//! One producer, one consumer. A full queue blocks the producer until the
//! consumer drains or the session is stopped; nothing is ever overwritten.
//! A snapshot still waiting for room when stop arrives is parked in a single
//! slot behind the queue and handed out after everything queued before it.

use crate::config::constants::acquisition::MAX_ITEMS_PER_DRAIN;
use crate::types::MeasurementSnapshot;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;
use std::sync::Arc;

type ParkedSlot = Arc<Mutex<Option<MeasurementSnapshot>>>;

/// Result of handing one snapshot to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Stop was requested while waiting for room; the snapshot was parked
    Stopped,
    /// Consumer side is gone
    Closed,
}

/// Producer half, owned by the capture loop
#[derive(Debug)]
pub struct SnapshotProducer {
    tx: Sender<MeasurementSnapshot>,
    parked: ParkedSlot,
}

/// Consumer half, owned by the engine and drained by the client
#[derive(Debug)]
pub struct SnapshotConsumer {
    rx: Receiver<MeasurementSnapshot>,
    parked: ParkedSlot,
    capacity: usize,
}

/// Fresh queue holding at most `capacity` snapshots (clamped to 1..=1024)
pub fn snapshot_queue(capacity: usize) -> (SnapshotProducer, SnapshotConsumer) {
    let capacity = capacity.clamp(1, MAX_ITEMS_PER_DRAIN);
    let (tx, rx) = channel::bounded(capacity);
    let parked = ParkedSlot::default();
    (
        SnapshotProducer {
            tx,
            parked: Arc::clone(&parked),
        },
        SnapshotConsumer { rx, parked, capacity },
    )
}

impl SnapshotProducer {
    /// Enqueue, waiting for room unless `stop` fires first
    ///
    /// `stop` counts as fired when it yields a message or is disconnected.
    /// The producer must not push again after `Stopped`.
    pub fn push(&self, snapshot: MeasurementSnapshot, stop: &Receiver<()>) -> PushOutcome {
        let snapshot = match self.tx.try_send(snapshot) {
            Ok(()) => return PushOutcome::Queued,
            Err(TrySendError::Disconnected(_)) => return PushOutcome::Closed,
            Err(TrySendError::Full(snapshot)) => snapshot,
        };

        tracing::debug!("snapshot queue full, capture loop waiting for drain");
        channel::select! {
            send(self.tx, snapshot) -> sent => match sent {
                Ok(()) => PushOutcome::Queued,
                Err(_) => PushOutcome::Closed,
            },
            recv(stop) -> _ => {
                *self.parked.lock() = Some(snapshot);
                PushOutcome::Stopped
            }
        }
    }
}

impl SnapshotConsumer {
    /// Up to `max_items` snapshots in FIFO order, never blocking
    pub fn drain(&self, max_items: usize) -> Vec<MeasurementSnapshot> {
        let limit = max_items.min(MAX_ITEMS_PER_DRAIN);
        let mut items = Vec::with_capacity(limit.min(self.rx.len()));
        while items.len() < limit {
            match self.rx.try_recv() {
                Ok(snapshot) => items.push(snapshot),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    if let Some(last) = self.parked.lock().take() {
                        items.push(last);
                    }
                    break;
                }
            }
        }
        items
    }

    /// Snapshots waiting to be drained
    pub fn len(&self) -> usize {
        self.rx.len() + usize::from(self.parked.lock().is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

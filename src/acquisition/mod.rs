// src/acquisition/mod.rs
//! BER/FEC capture: the sampling loop, its bounded queue and the running totals

pub mod accumulator;
pub mod buffer;
pub mod engine;

pub use accumulator::MeasurementAccumulator;
pub use buffer::{snapshot_queue, PushOutcome, SnapshotConsumer, SnapshotProducer};
pub use engine::{AcquisitionEngine, CaptureState, CaptureSummary, EngineStatus, StopReason};

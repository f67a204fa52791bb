// src/hal/transport.rs
//! The one lock every hardware command goes through

use crate::error::BertResult;
use crate::hal::traits::HardwareTransport;
use crate::hal::types::{Command, Response};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Default)]
struct TransportCounters {
    commands: AtomicU64,
    failures: AtomicU64,
}

/// Cloneable handle serializing access to a single transport
///
/// The lock is held for exactly one command. A capture loop and a
/// configuration write interleave at command granularity and never overlap.
#[derive(Clone)]
pub struct SharedTransport {
    inner: Arc<Mutex<Box<dyn HardwareTransport>>>,
    counters: Arc<TransportCounters>,
}

impl SharedTransport {
    /// Take ownership of a transport
    pub fn new<T: HardwareTransport + 'static>(transport: T) -> Self {
        Self::from_boxed(Box::new(transport))
    }

    /// Wrap an already boxed transport
    pub fn from_boxed(transport: Box<dyn HardwareTransport>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(transport)),
            counters: Arc::new(TransportCounters::default()),
        }
    }

    /// Lock, run one command, unlock
    pub fn execute(&self, command: Command) -> BertResult<Response> {
        let name = command.name();
        let started = Instant::now();
        let result = {
            let mut transport = self.inner.lock();
            transport.execute(command)
        };
        let elapsed_us = started.elapsed().as_micros() as u64;

        self.counters.commands.fetch_add(1, Ordering::Relaxed);
        match &result {
            Ok(_) => tracing::debug!(command = name, elapsed_us, "command ok"),
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(command = name, elapsed_us, error = %err, "command failed");
            }
        }
        result
    }

    /// Endpoint description
    pub fn describe(&self) -> String {
        self.inner.lock().describe()
    }

    /// Commands issued through every clone of this handle
    pub fn command_count(&self) -> u64 {
        self.counters.commands.load(Ordering::Relaxed)
    }

    /// Commands that returned an error
    pub fn failure_count(&self) -> u64 {
        self.counters.failures.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for SharedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTransport")
            .field("commands", &self.command_count())
            .field("failures", &self.failure_count())
            .finish()
    }
}

// src/hal/traits.rs
//! Core HAL trait for instrument transports

use crate::error::BertResult;
use crate::hal::types::{Command, Response};

/// Single-connection command channel to one instrument
///
/// Implementations execute exactly one command at a time; callers reach a
/// transport only through `SharedTransport`, which serializes access.
pub trait HardwareTransport: Send {
    /// Execute one command and return its response
    fn execute(&mut self, command: Command) -> BertResult<Response>;

    /// Human readable endpoint description for logs
    fn describe(&self) -> String {
        "transport".to_string()
    }
}

impl<T: HardwareTransport + ?Sized> HardwareTransport for Box<T> {
    fn execute(&mut self, command: Command) -> BertResult<Response> {
        (**self).execute(command)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

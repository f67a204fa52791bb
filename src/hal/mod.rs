// src/hal/mod.rs
//! Hardware abstraction layer for BERT instruments

pub mod traits;
pub mod transport;
pub mod types;
#[cfg(any(test, feature = "simulation"))]
pub mod simulator;


pub use traits::*;
pub use transport::SharedTransport;
pub use types::*;
#[cfg(any(test, feature = "simulation"))]
pub use simulator::{SimulatedBert, SimulatorConfig};

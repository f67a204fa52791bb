// src/types/mod.rs
//! Domain types shared by every component

pub mod channel;
pub mod enums;
pub mod measurement;
pub mod monitor;
pub mod pattern;

pub use channel::{Channel, ChannelArray, ChannelMask, IntoChannel};
pub use enums::*;
pub use measurement::*;
pub use monitor::{MonitorFlag, MonitorFlags};
pub use pattern::{ErrorStruct, InjectionState, PatternConfig, UserPatternWord};

use crate::config::constants::geometry::HISTOGRAM_BINS;

/// Bin counts of one histogram capture
pub type HistogramData = [u32; HISTOGRAM_BINS];

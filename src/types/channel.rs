// src/types/channel.rs
//! Bounded channel identifiers and per-channel collections

use crate::config::constants::geometry::MAX_CHANNELS;
use crate::error::{BertError, BertResult};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Channel index guaranteed to be in `0..8`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Channel(u8);

impl Channel {
    /// First channel
    pub const CH0: Channel = Channel(0);

    /// Validate a raw channel index
    pub fn new(index: u8) -> BertResult<Self> {
        if (index as usize) < MAX_CHANNELS {
            Ok(Channel(index))
        } else {
            Err(BertError::unsupported(
                "channel",
                format!("channel {} outside 0..{}", index, MAX_CHANNELS),
            ))
        }
    }

    /// Raw index
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Bit this channel occupies in a `ChannelMask`
    pub fn mask(self) -> ChannelMask {
        ChannelMask::from_bits_retain(1 << self.0)
    }

    /// Every channel in ascending order
    pub fn all() -> impl Iterator<Item = Channel> {
        (0..MAX_CHANNELS as u8).map(Channel)
    }
}

impl TryFrom<u8> for Channel {
    type Error = BertError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Channel::new(value)
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> Self {
        channel.0
    }
}

/// Anything a channel-scoped call accepts as a channel identifier
pub trait IntoChannel {
    fn into_channel(self) -> BertResult<Channel>;
}

impl IntoChannel for Channel {
    fn into_channel(self) -> BertResult<Channel> {
        Ok(self)
    }
}

impl IntoChannel for u8 {
    fn into_channel(self) -> BertResult<Channel> {
        Channel::new(self)
    }
}

impl IntoChannel for usize {
    fn into_channel(self) -> BertResult<Channel> {
        u8::try_from(self)
            .map_err(|_| BertError::unsupported("channel", format!("channel {} outside 0..{}", self, MAX_CHANNELS)))
            .and_then(Channel::new)
    }
}

impl IntoChannel for i32 {
    fn into_channel(self) -> BertResult<Channel> {
        u8::try_from(self)
            .map_err(|_| BertError::unsupported("channel", format!("channel {} outside 0..{}", self, MAX_CHANNELS)))
            .and_then(Channel::new)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CH{}", self.0)
    }
}

bitflags! {
    /// One bit per channel; only the low eight bits are meaningful
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ChannelMask: u16 {
        const CH0 = 1 << 0;
        const CH1 = 1 << 1;
        const CH2 = 1 << 2;
        const CH3 = 1 << 3;
        const CH4 = 1 << 4;
        const CH5 = 1 << 5;
        const CH6 = 1 << 6;
        const CH7 = 1 << 7;
    }
}

impl ChannelMask {
    /// Parse a raw 16-bit mask, rejecting bits above channel 7
    pub fn from_raw(bits: u16) -> BertResult<Self> {
        ChannelMask::from_bits(bits).ok_or_else(|| {
            BertError::unsupported(
                "channel_mask",
                format!("mask 0x{:04X} selects channels beyond {}", bits, MAX_CHANNELS - 1),
            )
        })
    }

    /// Reject a mask built with `from_bits_retain` or deserialized with high bits set
    pub fn checked(self) -> BertResult<Self> {
        Self::from_raw(self.bits())
    }

    /// Whether `channel` is selected
    pub fn has(self, channel: Channel) -> bool {
        self.contains(channel.mask())
    }

    /// Selected channels in ascending order
    pub fn channels(self) -> impl Iterator<Item = Channel> {
        Channel::all().filter(move |ch| self.has(*ch))
    }

    /// Per-channel boolean view
    pub fn to_array(self) -> ChannelArray<bool> {
        ChannelArray::from_fn(|ch| self.has(ch))
    }

    /// Pack a per-channel boolean view
    pub fn from_array(flags: &ChannelArray<bool>) -> Self {
        flags
            .iter()
            .filter(|(_, set)| **set)
            .fold(ChannelMask::empty(), |mask, (ch, _)| mask | ch.mask())
    }
}

impl FromIterator<Channel> for ChannelMask {
    fn from_iter<I: IntoIterator<Item = Channel>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ChannelMask::empty(), |mask, ch| mask | ch.mask())
    }
}

/// Fixed eight-slot collection indexed by `Channel`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct ChannelArray<T>([T; MAX_CHANNELS]);

impl<T> ChannelArray<T> {
    /// Build from a per-channel function
    pub fn from_fn(mut f: impl FnMut(Channel) -> T) -> Self {
        ChannelArray(std::array::from_fn(|i| f(Channel(i as u8))))
    }

    /// Wrap a raw array
    pub fn from_array(values: [T; MAX_CHANNELS]) -> Self {
        ChannelArray(values)
    }

    /// `(channel, value)` pairs in ascending channel order
    pub fn iter(&self) -> impl Iterator<Item = (Channel, &T)> {
        self.0
            .iter()
            .enumerate()
            .map(|(i, value)| (Channel(i as u8), value))
    }

    /// Mutable `(channel, value)` pairs
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Channel, &mut T)> {
        self.0
            .iter_mut()
            .enumerate()
            .map(|(i, value)| (Channel(i as u8), value))
    }

    /// Values in channel order
    pub fn values(&self) -> &[T; MAX_CHANNELS] {
        &self.0
    }

    /// Apply `f` to each slot
    pub fn map<U>(&self, mut f: impl FnMut(Channel, &T) -> U) -> ChannelArray<U> {
        ChannelArray::from_fn(|ch| f(ch, &self.0[ch.index()]))
    }
}

impl<T: Clone> ChannelArray<T> {
    /// Every slot set to `value`
    pub fn splat(value: T) -> Self {
        ChannelArray::from_fn(|_| value.clone())
    }
}

impl<T: Default> Default for ChannelArray<T> {
    fn default() -> Self {
        ChannelArray::from_fn(|_| T::default())
    }
}

impl<T> Index<Channel> for ChannelArray<T> {
    type Output = T;

    fn index(&self, channel: Channel) -> &T {
        &self.0[channel.index()]
    }
}

impl<T> IndexMut<Channel> for ChannelArray<T> {
    fn index_mut(&mut self, channel: Channel) -> &mut T {
        &mut self.0[channel.index()]
    }
}

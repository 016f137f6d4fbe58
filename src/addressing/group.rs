//! KNX group addresses.
//!
//! A group address names a function (a light, a set point) rather than a
//! device. The 16-bit value is usually written in three levels:
//!
//! ```text
//! ┌───────────┬─────────┬─────────────────┐
//! │ main (5)  │ mid (3) │    sub (8)      │
//! └───────────┴─────────┴─────────────────┘
//! ```
//!
//! The two-level notation merges middle and sub into an 11-bit field.

use crate::error::{KnxError, Result};
use core::fmt;
use core::str::FromStr;

/// Logical KNX destination, e.g. `1/2/3`.
///
/// ```
/// use knx_tunnel::GroupAddress;
///
/// let light = GroupAddress::new(1, 1, 1)?;
/// assert_eq!(light.raw(), 0x0901);
/// assert_eq!(light.to_string(), "1/1/1");
///
/// let parsed: GroupAddress = "1/257".parse()?;
/// assert_eq!(parsed, light);
/// # Ok::<(), knx_tunnel::KnxError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct GroupAddress(u16);

impl GroupAddress {
    /// Largest main group (5 bits).
    pub const MAX_MAIN: u8 = 31;
    /// Largest middle group (3 bits).
    pub const MAX_MIDDLE: u8 = 7;
    /// Largest sub group in two-level notation (11 bits).
    pub const MAX_SUB_2LEVEL: u16 = 0x07FF;
    /// Encoded size on the wire.
    pub const SIZE: usize = 2;

    /// Three-level address. Returns `None` when a component is out of range.
    ///
    /// Usable in const context, which is what the `ga!` macro relies on.
    pub const fn from_parts(main: u8, middle: u8, sub: u8) -> Option<Self> {
        if main > Self::MAX_MAIN || middle > Self::MAX_MIDDLE {
            return None;
        }
        Some(Self(((main as u16) << 11) | ((middle as u16) << 8) | sub as u16))
    }

    /// Three-level address, `main/middle/sub`.
    pub fn new(main: u8, middle: u8, sub: u8) -> Result<Self> {
        Self::from_parts(main, middle, sub).ok_or_else(KnxError::address_out_of_range)
    }

    /// Two-level address, `main/sub`.
    pub fn new_2level(main: u8, sub: u16) -> Result<Self> {
        if main > Self::MAX_MAIN || sub > Self::MAX_SUB_2LEVEL {
            return Err(KnxError::address_out_of_range());
        }
        Ok(Self((u16::from(main) << 11) | sub))
    }

    /// Wrap a raw 16-bit value; every value is a valid address.
    #[inline(always)]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    #[inline(always)]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[inline(always)]
    pub const fn main(self) -> u8 {
        (self.0 >> 11) as u8 & 0x1F
    }

    #[inline(always)]
    pub const fn middle(self) -> u8 {
        (self.0 >> 8) as u8 & 0x07
    }

    #[inline(always)]
    pub const fn sub(self) -> u8 {
        self.0 as u8
    }

    #[inline(always)]
    pub const fn sub_2level(self) -> u16 {
        self.0 & Self::MAX_SUB_2LEVEL
    }

    /// Write the big-endian value into `buf`.
    pub fn encode(self, buf: &mut [u8]) -> Result<usize> {
        let out = buf.get_mut(..Self::SIZE).ok_or_else(KnxError::buffer_too_small)?;
        out.copy_from_slice(&self.0.to_be_bytes());
        Ok(Self::SIZE)
    }

    /// Read a big-endian value from the start of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        match buf {
            [hi, lo, ..] => Ok(Self(u16::from_be_bytes([*hi, *lo]))),
            _ => Err(KnxError::truncated_frame()),
        }
    }
}

impl From<u16> for GroupAddress {
    #[inline(always)]
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<GroupAddress> for u16 {
    #[inline(always)]
    fn from(addr: GroupAddress) -> u16 {
        addr.0
    }
}

impl fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.main(), self.middle(), self.sub())
    }
}

impl FromStr for GroupAddress {
    type Err = KnxError;

    /// Accepts `main/middle/sub` and `main/sub`.
    fn from_str(s: &str) -> Result<Self> {
        let mut fields = s.split('/').map(|part| part.trim().parse::<u16>());
        let first = fields.next();
        let second = fields.next();
        let third = fields.next();
        if fields.next().is_some() {
            return Err(KnxError::invalid_group_address());
        }

        let narrow = |v: u16| u8::try_from(v).map_err(|_| KnxError::address_out_of_range());
        match (first, second, third) {
            (Some(Ok(main)), Some(Ok(middle)), Some(Ok(sub))) => {
                Self::new(narrow(main)?, narrow(middle)?, narrow(sub)?)
            }
            (Some(Ok(main)), Some(Ok(sub)), None) => Self::new_2level(narrow(main)?, sub),
            _ => Err(KnxError::invalid_group_address()),
        }
    }
}

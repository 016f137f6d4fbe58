//! KNX individual (physical) addresses, written `area.line.device`.
//!
//! ```text
//! ┌──────────┬──────────┬─────────────────┐
//! │ area (4) │ line (4) │   device (8)    │
//! └──────────┴──────────┴─────────────────┘
//! ```

use crate::error::{KnxError, Result};
use core::fmt;
use core::str::FromStr;

/// Physical KNX device address, e.g. `1.1.250`.
///
/// `0.0.0` is used as the source of outgoing tunnel telegrams; the gateway
/// replaces it with the address assigned to the tunnel.
///
/// ```
/// use knx_tunnel::IndividualAddress;
///
/// let addr: IndividualAddress = "1.1.250".parse()?;
/// assert_eq!(addr.raw(), 0x11FA);
/// # Ok::<(), knx_tunnel::KnxError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct IndividualAddress(u16);

impl IndividualAddress {
    pub const MAX_AREA: u8 = 15;
    pub const MAX_LINE: u8 = 15;
    /// Encoded size on the wire.
    pub const SIZE: usize = 2;
    /// `0.0.0`
    pub const UNSPECIFIED: Self = Self(0);

    /// Const constructor used by the `ia!` macro.
    pub const fn from_parts(area: u8, line: u8, device: u8) -> Option<Self> {
        if area > Self::MAX_AREA || line > Self::MAX_LINE {
            None
        } else {
            Some(Self(((area as u16) << 12) | ((line as u16) << 8) | device as u16))
        }
    }

    pub fn new(area: u8, line: u8, device: u8) -> Result<Self> {
        Self::from_parts(area, line, device).ok_or_else(KnxError::address_out_of_range)
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
    pub const fn area(self) -> u8 {
        (self.0 >> 12) as u8
    }

    #[inline(always)]
    pub const fn line(self) -> u8 {
        (self.0 >> 8) as u8 & 0x0F
    }

    #[inline(always)]
    pub const fn device(self) -> u8 {
        self.0 as u8
    }

    pub fn encode(self, buf: &mut [u8]) -> Result<usize> {
        let out = buf.get_mut(..Self::SIZE).ok_or_else(KnxError::buffer_too_small)?;
        out.copy_from_slice(&self.0.to_be_bytes());
        Ok(Self::SIZE)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        match buf {
            [hi, lo, ..] => Ok(Self(u16::from_be_bytes([*hi, *lo]))),
            _ => Err(KnxError::truncated_frame()),
        }
    }
}

impl From<u16> for IndividualAddress {
    #[inline(always)]
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<IndividualAddress> for u16 {
    #[inline(always)]
    fn from(addr: IndividualAddress) -> u16 {
        addr.0
    }
}

impl fmt::Display for IndividualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.area(), self.line(), self.device())
    }
}

impl FromStr for IndividualAddress {
    type Err = KnxError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = [0u8; 3];
        let mut count = 0;
        for field in s.split('.') {
            let slot = parts
                .get_mut(count)
                .ok_or_else(KnxError::invalid_individual_address)?;
            *slot = field
                .trim()
                .parse()
                .ok()
                .ok_or_else(KnxError::invalid_individual_address)?;
            count += 1;
        }
        if count != parts.len() {
            return Err(KnxError::invalid_individual_address());
        }
        Self::new(parts[0], parts[1], parts[2])
    }
}

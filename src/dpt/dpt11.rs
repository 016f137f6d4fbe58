//! DPT 11.001 - Date
//!
//! ```text
//! Byte 0: 000D DDDD   day 1-31
//! Byte 1: 0000 MMMM   month 1-12
//! Byte 2: 0YYY YYYY   year 0-99 (>= 90 means 19xx, otherwise 20xx)
//! ```

use crate::error::{KnxError, Result};

/// First year representable on the wire.
pub const YEAR_MIN: u16 = 1990;
/// Last year representable on the wire.
pub const YEAR_MAX: u16 = 2089;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Date {
    year: u16,
    month: u8,
    day: u8,
}

impl Date {
    /// Calendar validity beyond `1..=31` is not checked, matching the wire format.
    pub fn new(year: u16, month: u8, day: u8) -> Result<Self> {
        if !(YEAR_MIN..=YEAR_MAX).contains(&year) || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(KnxError::dpt_value_out_of_range());
        }
        Ok(Self { year, month, day })
    }

    pub const fn year(&self) -> u16 {
        self.year
    }

    pub const fn month(&self) -> u8 {
        self.month
    }

    pub const fn day(&self) -> u8 {
        self.day
    }

    pub(crate) fn to_bytes(self) -> [u8; 3] {
        [self.day, self.month, (self.year % 100) as u8]
    }

    pub(crate) fn from_bytes(bytes: [u8; 3]) -> Result<Self> {
        let yy = u16::from(bytes[2] & 0x7F);
        if yy > 99 {
            return Err(KnxError::dpt_value_out_of_range());
        }
        let year = if yy >= 90 { 1900 + yy } else { 2000 + yy };
        Self::new(year, bytes[1] & 0x0F, bytes[0] & 0x1F)
    }
}

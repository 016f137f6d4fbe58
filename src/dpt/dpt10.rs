//! DPT 10.001 - Time of day
//!
//! ```text
//! Byte 0: DDDH HHHH   day (0 = no day, 1 = Monday .. 7 = Sunday), hour 0-23
//! Byte 1: 00MM MMMM   minutes 0-59
//! Byte 2: 00SS SSSS   seconds 0-59
//! ```

use crate::error::{KnxError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Weekday {
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
    Sunday = 7,
}

impl Weekday {
    /// `None` for 0 (no day) and values above 7.
    pub const fn from_u8(day: u8) -> Option<Self> {
        Some(match day {
            1 => Self::Monday,
            2 => Self::Tuesday,
            3 => Self::Wednesday,
            4 => Self::Thursday,
            5 => Self::Friday,
            6 => Self::Saturday,
            7 => Self::Sunday,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeOfDay {
    day: Option<Weekday>,
    hour: u8,
    minute: u8,
    second: u8,
}

impl TimeOfDay {
    pub fn new(day: Option<Weekday>, hour: u8, minute: u8, second: u8) -> Result<Self> {
        if hour > 23 || minute > 59 || second > 59 {
            return Err(KnxError::dpt_value_out_of_range());
        }
        Ok(Self { day, hour, minute, second })
    }

    pub const fn day(&self) -> Option<Weekday> {
        self.day
    }

    pub const fn hour(&self) -> u8 {
        self.hour
    }

    pub const fn minute(&self) -> u8 {
        self.minute
    }

    pub const fn second(&self) -> u8 {
        self.second
    }

    pub(crate) fn to_bytes(self) -> [u8; 3] {
        let day = self.day.map_or(0, |d| d as u8);
        [(day << 5) | self.hour, self.minute, self.second]
    }

    /// Reserved bits are masked; out-of-range fields are rejected.
    pub(crate) fn from_bytes(bytes: [u8; 3]) -> Result<Self> {
        Self::new(
            Weekday::from_u8(bytes[0] >> 5),
            bytes[0] & 0x1F,
            bytes[1] & 0x3F,
            bytes[2] & 0x3F,
        )
    }
}

//! KNX Datapoint Types (DPT)
//!
//! A datapoint value travels in the APDU of a group telegram. Small values
//! (up to 6 bits) share the first APDU byte with the low APCI bits; larger
//! values start after it. Every shape therefore has a fixed encoded size
//! that counts that first byte:
//!
//! | Shape        | DPT    | Size | Layout after the APCI bits          |
//! |--------------|--------|------|-------------------------------------|
//! | `Bool`       | 1.xxx  | 1    | `00000B`                            |
//! | `Control`    | 2.xxx  | 1    | `0000CV`                            |
//! | `Stepped`    | 3.xxx  | 1    | `00CSSS`                            |
//! | `U8`, `I8`   | 5, 6   | 2    | 1 byte                              |
//! | `U16`, `I16` | 7, 8   | 3    | 2 bytes big-endian                  |
//! | `Float16`    | 9.xxx  | 3    | KNX 16-bit float                    |
//! | `TimeOfDay`  | 10.001 | 4    | `DDDHHHHH 00MMMMMM 00SSSSSS`        |
//! | `Date`       | 11.001 | 4    | `000DDDDD 0000MMMM 0YYYYYYY`        |
//! | `U32`, `I32` | 12, 13 | 5    | 4 bytes big-endian                  |
//! | `Float32`    | 14.xxx | 5    | IEEE 754 single, big-endian         |
//!
//! ```rust
//! use knx_tunnel::dpt::{DatapointType, DatapointValue};
//!
//! let value = DatapointValue::Float16(20.5);
//! let mut buf = [0u8; 3];
//! assert_eq!(value.encode(&mut buf)?, 3);
//! assert_eq!(buf, [0x00, 0x0C, 0x01]);
//!
//! let back = DatapointValue::decode(DatapointType::Float16, &buf)?;
//! assert_eq!(back, value);
//! # Ok::<(), knx_tunnel::KnxError>(())
//! ```

use crate::error::{KnxError, Result};
use core::str::FromStr;

pub mod dpt10;
pub mod dpt11;
pub mod dpt3;
pub mod dpt9;

#[doc(inline)]
pub use dpt10::{TimeOfDay, Weekday};
#[doc(inline)]
pub use dpt11::Date;
#[doc(inline)]
pub use dpt3::{ControlCommand, StepCode};

/// Largest encoded datapoint, in bytes.
pub const MAX_DATAPOINT_SIZE: usize = 5;

/// Mask for the value bits sharing the first APDU byte with the APCI.
const SHORT_VALUE_MASK: u8 = 0x3F;

/// Tag selecting one of the supported value shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DatapointType {
    Bool,
    Control,
    Stepped,
    U8,
    I8,
    U16,
    I16,
    Float16,
    TimeOfDay,
    Date,
    U32,
    I32,
    Float32,
}

impl DatapointType {
    /// All shapes, in DPT main-number order.
    pub const ALL: [Self; 13] = [
        Self::Bool,
        Self::Control,
        Self::Stepped,
        Self::U8,
        Self::I8,
        Self::U16,
        Self::I16,
        Self::Float16,
        Self::TimeOfDay,
        Self::Date,
        Self::U32,
        Self::I32,
        Self::Float32,
    ];

    /// Encoded size including the byte shared with the APCI.
    pub const fn encoded_len(self) -> usize {
        match self {
            Self::Bool | Self::Control | Self::Stepped => 1,
            Self::U8 | Self::I8 => 2,
            Self::U16 | Self::I16 | Self::Float16 => 3,
            Self::TimeOfDay | Self::Date => 4,
            Self::U32 | Self::I32 | Self::Float32 => 5,
        }
    }

    /// KNX main number of the datapoint family.
    pub const fn main_number(self) -> u16 {
        match self {
            Self::Bool => 1,
            Self::Control => 2,
            Self::Stepped => 3,
            Self::U8 => 5,
            Self::I8 => 6,
            Self::U16 => 7,
            Self::I16 => 8,
            Self::Float16 => 9,
            Self::TimeOfDay => 10,
            Self::Date => 11,
            Self::U32 => 12,
            Self::I32 => 13,
            Self::Float32 => 14,
        }
    }

    /// Shape for a KNX main number, e.g. `9` for 2-byte floats.
    pub const fn from_main_number(main: u16) -> Option<Self> {
        Some(match main {
            1 => Self::Bool,
            2 => Self::Control,
            3 => Self::Stepped,
            5 => Self::U8,
            6 => Self::I8,
            7 => Self::U16,
            8 => Self::I16,
            9 => Self::Float16,
            10 => Self::TimeOfDay,
            11 => Self::Date,
            12 => Self::U32,
            13 => Self::I32,
            14 => Self::Float32,
            _ => return None,
        })
    }

    /// Family identifier, e.g. `"9.xxx"`.
    pub const fn identifier(self) -> &'static str {
        match self {
            Self::Bool => "1.xxx",
            Self::Control => "2.xxx",
            Self::Stepped => "3.xxx",
            Self::U8 => "5.xxx",
            Self::I8 => "6.xxx",
            Self::U16 => "7.xxx",
            Self::I16 => "8.xxx",
            Self::Float16 => "9.xxx",
            Self::TimeOfDay => "10.001",
            Self::Date => "11.001",
            Self::U32 => "12.xxx",
            Self::I32 => "13.xxx",
            Self::Float32 => "14.xxx",
        }
    }
}

impl FromStr for DatapointType {
    type Err = KnxError;

    /// Parses a DPT id (`"9"`, `"9.001"`, `"9.xxx"`) or a shape name (`"Float16"`).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(ty) = Self::ALL
            .iter()
            .copied()
            .find(|ty| shape_name(*ty).eq_ignore_ascii_case(s))
        {
            return Ok(ty);
        }
        let main = s.split('.').next().unwrap_or_default();
        main.parse::<u16>()
            .ok()
            .and_then(Self::from_main_number)
            .ok_or_else(KnxError::dpt_type_mismatch)
    }
}

const fn shape_name(ty: DatapointType) -> &'static str {
    match ty {
        DatapointType::Bool => "Bool",
        DatapointType::Control => "Control",
        DatapointType::Stepped => "Stepped",
        DatapointType::U8 => "U8",
        DatapointType::I8 => "I8",
        DatapointType::U16 => "U16",
        DatapointType::I16 => "I16",
        DatapointType::Float16 => "Float16",
        DatapointType::TimeOfDay => "TimeOfDay",
        DatapointType::Date => "Date",
        DatapointType::U32 => "U32",
        DatapointType::I32 => "I32",
        DatapointType::Float32 => "Float32",
    }
}

/// DPT 2.xxx: a value bit with a priority-control bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControlValue {
    pub control: bool,
    pub value: bool,
}

/// A typed datapoint value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DatapointValue {
    Bool(bool),
    Control(ControlValue),
    Stepped(ControlCommand),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    /// Saturates to the KNX float range when encoded.
    Float16(f32),
    TimeOfDay(TimeOfDay),
    Date(Date),
    U32(u32),
    I32(i32),
    Float32(f32),
}

impl DatapointValue {
    pub const fn datapoint_type(&self) -> DatapointType {
        match self {
            Self::Bool(_) => DatapointType::Bool,
            Self::Control(_) => DatapointType::Control,
            Self::Stepped(_) => DatapointType::Stepped,
            Self::U8(_) => DatapointType::U8,
            Self::I8(_) => DatapointType::I8,
            Self::U16(_) => DatapointType::U16,
            Self::I16(_) => DatapointType::I16,
            Self::Float16(_) => DatapointType::Float16,
            Self::TimeOfDay(_) => DatapointType::TimeOfDay,
            Self::Date(_) => DatapointType::Date,
            Self::U32(_) => DatapointType::U32,
            Self::I32(_) => DatapointType::I32,
            Self::Float32(_) => DatapointType::Float32,
        }
    }

    #[inline]
    pub const fn encoded_len(&self) -> usize {
        self.datapoint_type().encoded_len()
    }

    /// Write the value into `buf`, returning the number of bytes written.
    ///
    /// The first byte only carries value bits for 1-byte shapes; otherwise
    /// it is zero.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.encoded_len();
        let out = buf.get_mut(..len).ok_or_else(KnxError::buffer_too_small)?;
        out.fill(0);

        match *self {
            Self::Bool(on) => out[0] = u8::from(on),
            Self::Control(c) => out[0] = (u8::from(c.control) << 1) | u8::from(c.value),
            Self::Stepped(cmd) => out[0] = cmd.to_nibble(),
            Self::U8(v) => out[1] = v,
            Self::I8(v) => out[1..].copy_from_slice(&v.to_be_bytes()),
            Self::U16(v) => out[1..].copy_from_slice(&v.to_be_bytes()),
            Self::I16(v) => out[1..].copy_from_slice(&v.to_be_bytes()),
            Self::Float16(v) => out[1..].copy_from_slice(&dpt9::encode(v)?),
            Self::TimeOfDay(t) => out[1..].copy_from_slice(&t.to_bytes()),
            Self::Date(d) => out[1..].copy_from_slice(&d.to_bytes()),
            Self::U32(v) => out[1..].copy_from_slice(&v.to_be_bytes()),
            Self::I32(v) => out[1..].copy_from_slice(&v.to_be_bytes()),
            Self::Float32(v) => out[1..].copy_from_slice(&v.to_be_bytes()),
        }
        Ok(len)
    }

    /// Decode `data` (an APDU payload) as `ty`.
    ///
    /// `data` must be exactly `ty.encoded_len()` bytes. Bits above the value
    /// in the first byte are ignored.
    pub fn decode(ty: DatapointType, data: &[u8]) -> Result<Self> {
        if data.len() != ty.encoded_len() {
            return Err(KnxError::invalid_dpt_data());
        }
        let short = data[0] & SHORT_VALUE_MASK;
        let rest = &data[1..];

        Ok(match ty {
            DatapointType::Bool => Self::Bool(short & 0x01 != 0),
            DatapointType::Control => Self::Control(ControlValue {
                control: short & 0x02 != 0,
                value: short & 0x01 != 0,
            }),
            DatapointType::Stepped => Self::Stepped(ControlCommand::from_nibble(short)),
            DatapointType::U8 => Self::U8(rest[0]),
            DatapointType::I8 => Self::I8(i8::from_be_bytes([rest[0]])),
            DatapointType::U16 => Self::U16(u16::from_be_bytes(be_array(rest)?)),
            DatapointType::I16 => Self::I16(i16::from_be_bytes(be_array(rest)?)),
            DatapointType::Float16 => Self::Float16(dpt9::decode(be_array(rest)?)),
            DatapointType::TimeOfDay => Self::TimeOfDay(TimeOfDay::from_bytes(be_array(rest)?)?),
            DatapointType::Date => Self::Date(Date::from_bytes(be_array(rest)?)?),
            DatapointType::U32 => Self::U32(u32::from_be_bytes(be_array(rest)?)),
            DatapointType::I32 => Self::I32(i32::from_be_bytes(be_array(rest)?)),
            DatapointType::Float32 => Self::Float32(f32::from_be_bytes(be_array(rest)?)),
        })
    }
}

fn be_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| KnxError::invalid_dpt_data())
}

impl From<bool> for DatapointValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

//! Transport layer PDU.
//!
//! ```text
//! Data TPDU (>= 2 bytes)
//! ┌────────┬──────────┬────────────┐┌────────────┬─────────────────┐┌──────────────┐
//! │ TPCI 2 │  seq  4  │ APCI hi 2  ││ APCI lo 2  │ payload[0] & 3F ││ payload[1..] │
//! └────────┴──────────┴────────────┘└────────────┴─────────────────┘└──────────────┘
//!
//! Control TPDU (1 byte)
//! ┌────────┬──────────┬────────────┐
//! │ TPCI 2 │  seq  4  │  code  2   │
//! └────────┴──────────┴────────────┘
//! ```
//!
//! The first payload byte shares its octet with the APCI, so it carries only
//! six value bits. [`Tpdu::data`] masks it and turns an empty payload into a
//! single zero byte. [`Tpdu::encode`] refuses hand-built data TPDUs that are
//! not in that form, so whatever encodes decodes back to an equal value.

use crate::error::{KnxError, Result};
use crate::protocol::constants::MAX_TPDU_SIZE;

/// Largest APDU payload (the TPDU minus its first byte).
pub const MAX_PAYLOAD: usize = MAX_TPDU_SIZE - 1;

/// APDU payload storage.
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD>;

/// Transport layer class, bits 7-6 of the first TPDU byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Tpci {
    UnnumberedData = 0b00,
    NumberedData = 0b01,
    UnnumberedControl = 0b10,
    NumberedControl = 0b11,
}

impl Tpci {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::UnnumberedData,
            0b01 => Self::NumberedData,
            0b10 => Self::UnnumberedControl,
            _ => Self::NumberedControl,
        }
    }

    pub const fn is_data(self) -> bool {
        matches!(self, Self::UnnumberedData | Self::NumberedData)
    }

    pub const fn is_numbered(self) -> bool {
        matches!(self, Self::NumberedData | Self::NumberedControl)
    }
}

/// Connection-oriented control codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ControlCode {
    Connect = 0,
    Disconnect = 1,
    Ack = 2,
    Nak = 3,
}

impl ControlCode {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Connect,
            1 => Self::Disconnect,
            2 => Self::Ack,
            _ => Self::Nak,
        }
    }
}

/// 4-bit application layer service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Apci {
    GroupValueRead = 0x0,
    GroupValueResponse = 0x1,
    GroupValueWrite = 0x2,
    IndividualAddressWrite = 0x3,
    IndividualAddressRead = 0x4,
    IndividualAddressResponse = 0x5,
    AdcRead = 0x6,
    AdcResponse = 0x7,
    MemoryRead = 0x8,
    MemoryResponse = 0x9,
    MemoryWrite = 0xA,
    UserMessage = 0xB,
    DeviceDescriptorRead = 0xC,
    DeviceDescriptorResponse = 0xD,
    Restart = 0xE,
    Escape = 0xF,
}

impl Apci {
    /// Low four bits of `bits`; every value names a service.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x0F {
            0x0 => Self::GroupValueRead,
            0x1 => Self::GroupValueResponse,
            0x2 => Self::GroupValueWrite,
            0x3 => Self::IndividualAddressWrite,
            0x4 => Self::IndividualAddressRead,
            0x5 => Self::IndividualAddressResponse,
            0x6 => Self::AdcRead,
            0x7 => Self::AdcResponse,
            0x8 => Self::MemoryRead,
            0x9 => Self::MemoryResponse,
            0xA => Self::MemoryWrite,
            0xB => Self::UserMessage,
            0xC => Self::DeviceDescriptorRead,
            0xD => Self::DeviceDescriptorResponse,
            0xE => Self::Restart,
            _ => Self::Escape,
        }
    }

    /// True for the three group services.
    pub const fn is_group_value(self) -> bool {
        matches!(
            self,
            Self::GroupValueRead | Self::GroupValueResponse | Self::GroupValueWrite
        )
    }
}

/// Transport layer PDU.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tpdu {
    Data {
        numbered: bool,
        /// 0-15, meaningful only when `numbered`
        sequence: u8,
        apci: Apci,
        payload: Payload,
    },
    Control {
        numbered: bool,
        sequence: u8,
        code: ControlCode,
    },
}

impl Tpdu {
    /// Unnumbered data TPDU, the form used by group communication.
    pub fn data(apci: Apci, payload: &[u8]) -> Result<Self> {
        let mut buf = Payload::new();
        match payload.split_first() {
            Some((&first, rest)) => {
                buf.push(first & 0x3F).map_err(|_| KnxError::payload_too_large())?;
                buf.extend_from_slice(rest)
                    .map_err(|_| KnxError::payload_too_large())?;
            }
            None => buf.push(0).map_err(|_| KnxError::payload_too_large())?,
        }
        Ok(Self::Data {
            numbered: false,
            sequence: 0,
            apci,
            payload: buf,
        })
    }

    pub const fn control(numbered: bool, sequence: u8, code: ControlCode) -> Self {
        Self::Control { numbered, sequence, code }
    }

    pub const fn tpci(&self) -> Tpci {
        match self {
            Self::Data { numbered: false, .. } => Tpci::UnnumberedData,
            Self::Data { numbered: true, .. } => Tpci::NumberedData,
            Self::Control { numbered: false, .. } => Tpci::UnnumberedControl,
            Self::Control { numbered: true, .. } => Tpci::NumberedControl,
        }
    }

    pub const fn sequence(&self) -> u8 {
        match self {
            Self::Data { sequence, .. } | Self::Control { sequence, .. } => *sequence,
        }
    }

    pub const fn apci(&self) -> Option<Apci> {
        match self {
            Self::Data { apci, .. } => Some(*apci),
            Self::Control { .. } => None,
        }
    }

    /// APDU payload. The first byte holds six value bits.
    pub fn payload(&self) -> &[u8] {
        match self {
            Self::Data { payload, .. } => payload,
            Self::Control { .. } => &[],
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Data { payload, .. } => 1 + payload.len().max(1),
            Self::Control { .. } => 1,
        }
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.encoded_len();
        if len > MAX_TPDU_SIZE {
            return Err(KnxError::payload_too_large());
        }
        if self.sequence() > 0x0F {
            return Err(KnxError::malformed_field());
        }
        let out = buf.get_mut(..len).ok_or_else(KnxError::buffer_too_small)?;
        let head = (self.tpci() as u8) << 6 | self.sequence() << 2;

        match self {
            Self::Control { code, .. } => out[0] = head | *code as u8,
            Self::Data { apci, payload, .. } => {
                let (&first, rest) = payload.split_first().ok_or_else(KnxError::malformed_field)?;
                if first > 0x3F {
                    return Err(KnxError::malformed_field());
                }
                let apci = *apci as u8;
                out[0] = head | apci >> 2;
                out[1] = (apci & 0x03) << 6 | first;
                out[2..].copy_from_slice(rest);
            }
        }
        Ok(len)
    }

    /// Decode a TPDU occupying all of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let first = *data.first().ok_or_else(KnxError::truncated_frame)?;
        let tpci = Tpci::from_bits(first >> 6);
        let numbered = tpci.is_numbered();
        let sequence = (first >> 2) & 0x0F;

        if !tpci.is_data() {
            if data.len() != 1 {
                return Err(KnxError::malformed_field());
            }
            return Ok(Self::Control {
                numbered,
                sequence,
                code: ControlCode::from_bits(first),
            });
        }

        let second = *data.get(1).ok_or_else(KnxError::truncated_frame)?;
        if data.len() > MAX_TPDU_SIZE {
            return Err(KnxError::payload_too_large());
        }
        let mut payload = Payload::new();
        // Capacity checked above
        let _ = payload.push(second & 0x3F);
        let _ = payload.extend_from_slice(&data[2..]);

        Ok(Self::Data {
            numbered,
            sequence,
            apci: Apci::from_bits((first & 0x03) << 2 | second >> 6),
            payload,
        })
    }
}

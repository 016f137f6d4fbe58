//! Application-level KNX telegrams.
//!
//! A [`Telegram`] is what the tunnel hands to and receives from the
//! application: addresses, priority, the transport PDU and, when the group's
//! datapoint type is known, the decoded value.
//!
//! ```rust
//! use knx_tunnel::dpt::{DatapointType, DatapointValue};
//! use knx_tunnel::protocol::telegram::Telegram;
//! use knx_tunnel::ga;
//!
//! let telegram = Telegram::group_write(ga!(1/2/3), &DatapointValue::Float16(21.0))?;
//! assert_eq!(telegram.tpdu.payload(), [0x00, 0x0C, 0x1A]);
//! assert_eq!(
//!     telegram.decode_value(DatapointType::Float16)?,
//!     DatapointValue::Float16(21.0)
//! );
//! # Ok::<(), knx_tunnel::KnxError>(())
//! ```

use crate::addressing::{Destination, GroupAddress, IndividualAddress};
use crate::dpt::{DatapointType, DatapointValue, MAX_DATAPOINT_SIZE};
use crate::error::{KnxError, Result};
use crate::protocol::cemi::LData;
use crate::protocol::constants::Priority;
use crate::protocol::tpdu::{Apci, Tpdu};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Telegram {
    /// Sender; `0.0.0` on outgoing telegrams lets the gateway fill in the
    /// tunnel's address.
    pub source: IndividualAddress,
    pub destination: Destination,
    pub priority: Priority,
    pub tpdu: Tpdu,
    /// Decoded datapoint, present when the destination group has a
    /// registered type.
    pub value: Option<DatapointValue>,
}

impl Telegram {
    /// `A_GroupValue_Write` carrying `value`.
    pub fn group_write(destination: GroupAddress, value: &DatapointValue) -> Result<Self> {
        Self::group_value(Apci::GroupValueWrite, destination, Some(value))
    }

    /// `A_GroupValue_Read`, answered by the group's owner with a response.
    pub fn group_read(destination: GroupAddress) -> Result<Self> {
        Self::group_value(Apci::GroupValueRead, destination, None)
    }

    /// `A_GroupValue_Response` carrying `value`.
    pub fn group_response(destination: GroupAddress, value: &DatapointValue) -> Result<Self> {
        Self::group_value(Apci::GroupValueResponse, destination, Some(value))
    }

    fn group_value(
        apci: Apci,
        destination: GroupAddress,
        value: Option<&DatapointValue>,
    ) -> Result<Self> {
        let mut buf = [0u8; MAX_DATAPOINT_SIZE];
        let len = match value {
            Some(value) => value.encode(&mut buf)?,
            None => 0,
        };
        Ok(Self {
            source: IndividualAddress::UNSPECIFIED,
            destination: Destination::Group(destination),
            priority: Priority::Normal,
            tpdu: Tpdu::data(apci, &buf[..len])?,
            value: value.copied(),
        })
    }

    pub const fn apci(&self) -> Option<Apci> {
        self.tpdu.apci()
    }

    /// Group address of the destination, if it is one.
    pub const fn group(&self) -> Option<GroupAddress> {
        self.destination.group()
    }

    /// Decode the APDU payload as `ty`.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` unless the telegram is a group value write or
    /// response; otherwise whatever the datapoint decoder reports.
    pub fn decode_value(&self, ty: DatapointType) -> Result<DatapointValue> {
        match self.apci() {
            Some(apci) if apci.is_group_value() && apci != Apci::GroupValueRead => {
                DatapointValue::decode(ty, self.tpdu.payload())
            }
            _ => Err(KnxError::dpt_type_mismatch()),
        }
    }

    /// Fill [`value`](Self::value) by decoding as `ty`. On error the field
    /// is left untouched.
    pub fn resolve_value(&mut self, ty: DatapointType) -> Result<()> {
        self.value = Some(self.decode_value(ty)?);
        Ok(())
    }

    /// Application view of a received `L_Data` frame.
    pub fn from_ldata(ldata: LData) -> Self {
        Self {
            source: ldata.source,
            destination: ldata.destination,
            priority: ldata.priority,
            tpdu: ldata.tpdu,
            value: None,
        }
    }

    /// `L_Data` frame for sending, with the default control flags.
    pub fn to_ldata(&self) -> LData {
        let mut ldata = LData::new(self.source, self.destination, self.tpdu.clone());
        ldata.priority = self.priority;
        ldata
    }
}

//! Common External Message Interface (cEMI) and `L_Data` frames.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ Message Code (1 byte)                    │
//! ├──────────────────────────────────────────┤
//! │ Additional Info Length (1 byte)          │
//! ├──────────────────────────────────────────┤
//! │ Additional Info (variable)               │
//! ├──────────────────────────────────────────┤
//! │ L_Data                                   │
//! │  ├─ Control Field 1 (1 byte)             │
//! │  ├─ Control Field 2 (1 byte)             │
//! │  ├─ Source Address (2 bytes)             │
//! │  ├─ Destination Address (2 bytes)        │
//! │  ├─ TPDU length - 1 (1 byte)             │
//! │  └─ TPDU (1-254 bytes)                   │
//! └──────────────────────────────────────────┘
//! ```

use crate::addressing::{Destination, IndividualAddress};
use crate::error::{KnxError, Result};
use crate::protocol::constants::{CemiMessageCode, Priority, MAX_ADDITIONAL_INFO, MAX_TPDU_SIZE};
use crate::protocol::tpdu::Tpdu;

/// Additional info storage.
pub type AdditionalInfo = heapless::Vec<u8, MAX_ADDITIONAL_INFO>;

/// Control Field 1 of `L_Data` frame
///
/// ```text
/// Bit 7: Frame Type (0=extended, 1=standard)
/// Bit 6: Reserved
/// Bit 5: Repeat (0=repeat, 1=do not repeat)
/// Bit 4: System Broadcast (0=system, 1=broadcast)
/// Bit 3-2: Priority (00=system, 01=normal, 10=urgent, 11=low)
/// Bit 1: Acknowledge Request
/// Bit 0: Confirm (0=no error, 1=error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlField1(u8);

impl ControlField1 {
    const STANDARD: u8 = 0x80;
    const DO_NOT_REPEAT: u8 = 0x20;
    const BROADCAST: u8 = 0x10;
    const ACK_REQUEST: u8 = 0x02;
    const ERROR: u8 = 0x01;

    /// Build from semantic flags. `repeat` and `system_broadcast` are stored
    /// inverted on the wire.
    pub const fn new(
        standard_frame: bool,
        repeat: bool,
        system_broadcast: bool,
        priority: Priority,
        ack_request: bool,
        error: bool,
    ) -> Self {
        let mut raw = priority.to_u8() << 2;
        if standard_frame {
            raw |= Self::STANDARD;
        }
        if !repeat {
            raw |= Self::DO_NOT_REPEAT;
        }
        if !system_broadcast {
            raw |= Self::BROADCAST;
        }
        if ack_request {
            raw |= Self::ACK_REQUEST;
        }
        if error {
            raw |= Self::ERROR;
        }
        Self(raw)
    }

    #[inline(always)]
    pub const fn raw(self) -> u8 {
        self.0
    }

    #[inline(always)]
    pub const fn is_standard_frame(self) -> bool {
        self.0 & Self::STANDARD != 0
    }

    #[inline(always)]
    pub const fn repeat(self) -> bool {
        self.0 & Self::DO_NOT_REPEAT == 0
    }

    #[inline(always)]
    pub const fn system_broadcast(self) -> bool {
        self.0 & Self::BROADCAST == 0
    }

    #[inline(always)]
    pub const fn priority(self) -> Priority {
        Priority::from_bits(self.0 >> 2)
    }

    #[inline(always)]
    pub const fn ack_request(self) -> bool {
        self.0 & Self::ACK_REQUEST != 0
    }

    #[inline(always)]
    pub const fn error(self) -> bool {
        self.0 & Self::ERROR != 0
    }
}

impl From<u8> for ControlField1 {
    #[inline(always)]
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

/// Control Field 2 of `L_Data` frame
///
/// ```text
/// Bit 7: Destination Address Type (0=individual, 1=group)
/// Bit 6-4: Hop Count (0-7)
/// Bit 3-0: Extended Frame Format (0000=standard)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlField2(u8);

impl ControlField2 {
    pub const fn new(is_group: bool, hop_count: u8) -> Self {
        let group = if is_group { 0x80 } else { 0 };
        Self(group | (hop_count & 0x07) << 4)
    }

    #[inline(always)]
    pub const fn raw(self) -> u8 {
        self.0
    }

    #[inline(always)]
    pub const fn is_group_address(self) -> bool {
        self.0 & 0x80 != 0
    }

    #[inline(always)]
    pub const fn hop_count(self) -> u8 {
        (self.0 >> 4) & 0x07
    }
}

impl From<u8> for ControlField2 {
    #[inline(always)]
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

/// cEMI `L_Data` service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LData {
    /// false disables repetition on the bus
    pub repeat: bool,
    pub system_broadcast: bool,
    pub priority: Priority,
    pub ack_request: bool,
    /// Confirmation error flag (set by the gateway in `L_Data.con`)
    pub error: bool,
    /// 0-7, 7 means unlimited
    pub hop_count: u8,
    pub source: IndividualAddress,
    pub destination: Destination,
    pub tpdu: Tpdu,
}

impl LData {
    /// Control bytes, addresses and length byte.
    pub const HEADER_SIZE: usize = 7;
    /// Largest TPDU that still fits a standard frame.
    pub const STANDARD_TPDU_MAX: usize = 16;
    /// Hop count used for outgoing telegrams.
    pub const DEFAULT_HOP_COUNT: u8 = 6;

    /// Outgoing frame with the usual defaults: normal priority, repeats
    /// allowed, broadcast, no ack request, hop count 6.
    pub fn new(source: IndividualAddress, destination: Destination, tpdu: Tpdu) -> Self {
        Self {
            repeat: true,
            system_broadcast: false,
            priority: Priority::Normal,
            ack_request: false,
            error: false,
            hop_count: Self::DEFAULT_HOP_COUNT,
            source,
            destination,
            tpdu,
        }
    }

    pub fn control1(&self) -> ControlField1 {
        ControlField1::new(
            self.tpdu.encoded_len() <= Self::STANDARD_TPDU_MAX,
            self.repeat,
            self.system_broadcast,
            self.priority,
            self.ack_request,
            self.error,
        )
    }

    pub fn control2(&self) -> ControlField2 {
        ControlField2::new(self.destination.is_group(), self.hop_count)
    }

    pub fn encoded_len(&self) -> usize {
        Self::HEADER_SIZE + self.tpdu.encoded_len()
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if self.hop_count > 7 {
            return Err(KnxError::malformed_field());
        }
        let tpdu_len = self.tpdu.encoded_len();
        if tpdu_len > MAX_TPDU_SIZE {
            return Err(KnxError::payload_too_large());
        }
        let len = self.encoded_len();
        let out = buf.get_mut(..len).ok_or_else(KnxError::buffer_too_small)?;

        out[0] = self.control1().raw();
        out[1] = self.control2().raw();
        self.source.encode(&mut out[2..4])?;
        out[4..6].copy_from_slice(&self.destination.raw().to_be_bytes());
        out[6] = (tpdu_len - 1) as u8;
        self.tpdu.encode(&mut out[Self::HEADER_SIZE..])?;
        Ok(len)
    }

    /// Decode an `L_Data` service. Bytes after the declared TPDU are ignored.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::HEADER_SIZE {
            return Err(KnxError::truncated_frame());
        }
        let ctrl1 = ControlField1::from(data[0]);
        let ctrl2 = ControlField2::from(data[1]);
        let tpdu_len = usize::from(data[6]) + 1;
        if tpdu_len > MAX_TPDU_SIZE {
            return Err(KnxError::payload_too_large());
        }
        let tpdu = data
            .get(Self::HEADER_SIZE..Self::HEADER_SIZE + tpdu_len)
            .ok_or_else(KnxError::truncated_frame)?;

        Ok(Self {
            repeat: ctrl1.repeat(),
            system_broadcast: ctrl1.system_broadcast(),
            priority: ctrl1.priority(),
            ack_request: ctrl1.ack_request(),
            error: ctrl1.error(),
            hop_count: ctrl2.hop_count(),
            source: IndividualAddress::decode(&data[2..4])?,
            destination: Destination::from_raw(
                u16::from_be_bytes([data[4], data[5]]),
                ctrl2.is_group_address(),
            ),
            tpdu: Tpdu::decode(tpdu)?,
        })
    }
}

/// cEMI frame: message code, additional info and an `L_Data` service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CemiFrame {
    pub code: CemiMessageCode,
    /// Raw additional-info TLVs, not interpreted
    pub additional_info: AdditionalInfo,
    pub ldata: LData,
}

impl CemiFrame {
    pub fn new(code: CemiMessageCode, ldata: LData) -> Self {
        Self {
            code,
            additional_info: AdditionalInfo::new(),
            ldata,
        }
    }

    pub fn encoded_len(&self) -> usize {
        2 + self.additional_info.len() + self.ldata.encoded_len()
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.encoded_len();
        let out = buf.get_mut(..len).ok_or_else(KnxError::buffer_too_small)?;
        let info_len = self.additional_info.len();

        out[0] = self.code.to_u8();
        out[1] = info_len as u8;
        out[2..2 + info_len].copy_from_slice(&self.additional_info);
        self.ldata.encode(&mut out[2 + info_len..])?;
        Ok(len)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let (&code, rest) = data.split_first().ok_or_else(KnxError::truncated_frame)?;
        let code = CemiMessageCode::from_u8(code).ok_or_else(KnxError::unknown_variant)?;
        let (&info_len, rest) = rest.split_first().ok_or_else(KnxError::truncated_frame)?;
        let info_len = usize::from(info_len);
        if rest.len() < info_len {
            return Err(KnxError::truncated_frame());
        }
        let (info, service) = rest.split_at(info_len);

        let mut additional_info = AdditionalInfo::new();
        additional_info
            .extend_from_slice(info)
            .map_err(|_| KnxError::payload_too_large())?;

        Ok(Self {
            code,
            additional_info,
            ldata: LData::decode(service)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::GroupAddress;
    use crate::protocol::tpdu::{Apci, ControlCode};

    fn group_write_bool() -> LData {
        LData::new(
            IndividualAddress::from(0x1101),
            Destination::Group(GroupAddress::from(0x0901)),
            Tpdu::data(Apci::GroupValueWrite, &[0x01]).unwrap(),
        )
    }

    #[test]
    fn test_control_field1_flags() {
        let ctrl = ControlField1::new(true, true, false, Priority::Normal, false, false);
        assert_eq!(ctrl.raw(), 0x94);
        let ctrl = ControlField1::new(true, false, false, Priority::Low, false, false);
        assert_eq!(ctrl.raw(), 0xBC);

        let ctrl = ControlField1::from(0x2B);
        assert!(!ctrl.is_standard_frame());
        assert!(!ctrl.repeat());
        assert!(ctrl.system_broadcast());
        assert_eq!(ctrl.priority(), Priority::Urgent);
        assert!(ctrl.ack_request());
        assert!(ctrl.error());
    }

    #[test]
    fn test_control_field2() {
        assert_eq!(ControlField2::new(true, 6).raw(), 0xE0);
        assert_eq!(ControlField2::new(false, 7).raw(), 0x70);
        // extended frame format bits are ignored
        let ctrl = ControlField2::from(0xF5);
        assert!(ctrl.is_group_address());
        assert_eq!(ctrl.hop_count(), 7);
    }

    #[test]
    fn test_ldata_group_write() {
        let ldata = group_write_bool();
        let mut buf = [0u8; 16];
        let len = ldata.encode(&mut buf).unwrap();
        assert_eq!(&buf[..len], [0x94, 0xE0, 0x11, 0x01, 0x09, 0x01, 0x01, 0x00, 0x81]);
        assert_eq!(LData::decode(&buf[..len]).unwrap(), ldata);
    }

    #[test]
    fn test_ldata_extended_frame_flag() {
        let mut ldata = group_write_bool();
        ldata.tpdu = Tpdu::data(Apci::GroupValueWrite, &[0u8; 16]).unwrap();
        assert!(!ldata.control1().is_standard_frame());
        ldata.tpdu = Tpdu::data(Apci::GroupValueWrite, &[0u8; 15]).unwrap();
        assert!(ldata.control1().is_standard_frame());
    }

    #[test]
    fn test_ldata_individual_destination() {
        let mut ldata = group_write_bool();
        ldata.destination = Destination::Individual(IndividualAddress::from(0x1105));
        ldata.hop_count = 7;
        ldata.tpdu = Tpdu::control(false, 0, ControlCode::Connect);
        let mut buf = [0u8; 16];
        let len = ldata.encode(&mut buf).unwrap();
        assert_eq!(len, 8);
        assert_eq!(buf[1], 0x70);
        assert_eq!(buf[6], 0x00);
        assert_eq!(LData::decode(&buf[..len]).unwrap(), ldata);
    }

    #[test]
    fn test_ldata_bad_hop_count() {
        let mut ldata = group_write_bool();
        ldata.hop_count = 8;
        assert!(ldata.encode(&mut [0u8; 16]).unwrap_err().is_malformed());
    }

    #[test]
    fn test_ldata_truncated() {
        let bytes = [0x94, 0xE0, 0x11, 0x01, 0x09, 0x01, 0x01, 0x00, 0x81];
        for cut in 0..bytes.len() {
            assert!(LData::decode(&bytes[..cut]).unwrap_err().is_truncated(), "cut {cut}");
        }
    }

    #[test]
    fn test_cemi_with_additional_info() {
        let mut frame = CemiFrame::new(CemiMessageCode::LDataInd, group_write_bool());
        frame.additional_info.extend_from_slice(&[0x03, 0x01, 0x00]).unwrap();
        let mut buf = [0u8; 32];
        let len = frame.encode(&mut buf).unwrap();
        assert_eq!(len, frame.encoded_len());
        assert_eq!(&buf[..5], [0x29, 0x03, 0x03, 0x01, 0x00]);
        assert_eq!(CemiFrame::decode(&buf[..len]).unwrap(), frame);
    }

    #[test]
    fn test_cemi_errors() {
        assert!(CemiFrame::decode(&[0x2B, 0x00]).unwrap_err().is_unknown_variant());
        // additional info longer than the frame
        assert!(CemiFrame::decode(&[0x29, 0x05, 0x00]).unwrap_err().is_truncated());
        assert!(CemiFrame::decode(&[0x11]).unwrap_err().is_truncated());
    }
}

//! KNXnet/IP frame envelope.
//!
//! All KNXnet/IP frames follow this structure:
//!
//! ```text
//! ┌─────────────────────────────┐
//! │  Header (6 bytes)           │
//! │  - Header Length: 0x06      │
//! │  - Protocol Version: 0x10   │
//! │  - Service Type: 2 bytes    │
//! │  - Total Length: 2 bytes    │
//! ├─────────────────────────────┤
//! │  Body (variable)            │
//! │  - Service-specific data    │
//! └─────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use knx_tunnel::protocol::frame::{Frame, Hpai};
//!
//! let bytes = Frame::DescriptionRequest(Hpai::NAT).to_bytes()?;
//! assert_eq!(bytes[..6], [0x06, 0x10, 0x02, 0x03, 0x00, 0x0E]);
//!
//! match Frame::decode(&bytes)? {
//!     Frame::DescriptionRequest(endpoint) => assert_eq!(endpoint, Hpai::NAT),
//!     _ => unreachable!(),
//! }
//! # Ok::<(), knx_tunnel::KnxError>(())
//! ```

use core::net::{Ipv4Addr, SocketAddrV4};

use crate::error::{KnxError, Result};
use crate::protocol::cemi::CemiFrame;
use crate::protocol::constants::{
    HostProtocol, ServiceType, HEADER_SIZE_10, KNXNETIP_VERSION_10, MAX_FRAME_SIZE,
};
use crate::protocol::services::{
    byte, take, window, ChannelRequest, ChannelResponse, ConnectRequest, ConnectResponse,
    DescriptionResponse, TunnelRequest, TunnelResponse,
};

/// Buffer holding one serialized frame.
pub type FrameBytes = heapless::Vec<u8, MAX_FRAME_SIZE>;

/// KNXnet/IP frame header (6 bytes)
///
/// ```text
/// ┌──────────────┬──────────────┬─────────────────────┐
/// │ Header Len   │ Protocol Ver │  Service Type ID    │
/// │   (1 byte)   │   (1 byte)   │     (2 bytes)       │
/// ├──────────────┴──────────────┴─────────────────────┤
/// │           Total Length (2 bytes)                   │
/// └────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KnxnetIpHeader {
    pub service_type: ServiceType,
    /// Header plus body
    pub total_length: u16,
}

impl KnxnetIpHeader {
    pub const SIZE: usize = 6;

    pub const fn new(service_type: ServiceType, body_length: u16) -> Self {
        Self {
            service_type,
            total_length: Self::SIZE as u16 + body_length,
        }
    }

    /// Decode and validate a header against the bytes actually available.
    ///
    /// # Errors
    ///
    /// - `TruncatedFrame` if fewer than 6 bytes are present or the total
    ///   length exceeds `data`
    /// - `MalformedFixedField` for a wrong header size, version, or a total
    ///   length below the header size
    /// - `UnknownVariant` for a service id this crate doesn't know
    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = take(data, 0, Self::SIZE)?;
        if header[0] != HEADER_SIZE_10 || header[1] != KNXNETIP_VERSION_10 {
            return Err(KnxError::malformed_field());
        }
        let service_type = ServiceType::from_u16(u16::from_be_bytes([header[2], header[3]]))
            .ok_or_else(KnxError::unknown_variant)?;
        let total_length = u16::from_be_bytes([header[4], header[5]]);
        if usize::from(total_length) < Self::SIZE {
            return Err(KnxError::malformed_field());
        }
        if usize::from(total_length) > data.len() {
            return Err(KnxError::truncated_frame());
        }
        Ok(Self {
            service_type,
            total_length,
        })
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let out = window(buf, 0, Self::SIZE)?;
        out[0] = HEADER_SIZE_10;
        out[1] = KNXNETIP_VERSION_10;
        out[2..4].copy_from_slice(&self.service_type.to_u16().to_be_bytes());
        out[4..6].copy_from_slice(&self.total_length.to_be_bytes());
        Ok(Self::SIZE)
    }

    pub const fn body_length(&self) -> usize {
        self.total_length as usize - Self::SIZE
    }
}

/// Host Protocol Address Information (HPAI)
///
/// ```text
/// ┌──────────────┬──────────────┬─────────────────────┐
/// │ Structure Len│ Host Protocol│   IP Address        │
/// │   (1 byte)   │   (1 byte)   │   (4 bytes IPv4)    │
/// ├──────────────┴──────────────┴─────────────────────┤
/// │                Port (2 bytes)                      │
/// └────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hpai {
    pub protocol: HostProtocol,
    pub ip: [u8; 4],
    pub port: u16,
}

impl Hpai {
    pub const SIZE: usize = 8;

    /// `0.0.0.0:0` over UDP: the gateway answers to the observed source.
    pub const NAT: Self = Self::udp([0, 0, 0, 0], 0);

    pub const fn udp(ip: [u8; 4], port: u16) -> Self {
        Self {
            protocol: HostProtocol::Udp,
            ip,
            port,
        }
    }

    pub const fn from_socket_addr(addr: SocketAddrV4) -> Self {
        Self::udp(addr.ip().octets(), addr.port())
    }

    pub const fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::new(self.ip[0], self.ip[1], self.ip[2], self.ip[3])
    }

    pub const fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ip(), self.port)
    }

    pub const fn is_nat(&self) -> bool {
        self.ip().is_unspecified() && self.port == 0
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let out = window(buf, 0, Self::SIZE)?;
        out[0] = Self::SIZE as u8;
        out[1] = self.protocol as u8;
        out[2..6].copy_from_slice(&self.ip);
        out[6..8].copy_from_slice(&self.port.to_be_bytes());
        Ok(Self::SIZE)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if usize::from(byte(data, 0)?) != Self::SIZE {
            return Err(KnxError::malformed_field());
        }
        let hpai = take(data, 0, Self::SIZE)?;
        let protocol = HostProtocol::from_u8(hpai[1]).ok_or_else(KnxError::unknown_variant)?;
        Ok(Self {
            protocol,
            ip: [hpai[2], hpai[3], hpai[4], hpai[5]],
            port: u16::from_be_bytes([hpai[6], hpai[7]]),
        })
    }
}

impl From<SocketAddrV4> for Hpai {
    fn from(addr: SocketAddrV4) -> Self {
        Self::from_socket_addr(addr)
    }
}

/// A complete KNXnet/IP frame, one variant per supported service.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Frame {
    /// Control endpoint of the requester
    DescriptionRequest(Hpai),
    DescriptionResponse(DescriptionResponse),
    ConnectRequest(ConnectRequest),
    ConnectResponse(ConnectResponse),
    ConnectionStateRequest(ChannelRequest),
    ConnectionStateResponse(ChannelResponse),
    DisconnectRequest(ChannelRequest),
    DisconnectResponse(ChannelResponse),
    TunnelRequest(TunnelRequest),
    TunnelResponse(TunnelResponse),
    RoutingIndication(CemiFrame),
}

impl Frame {
    pub const fn service_type(&self) -> ServiceType {
        match self {
            Self::DescriptionRequest(_) => ServiceType::DescriptionRequest,
            Self::DescriptionResponse(_) => ServiceType::DescriptionResponse,
            Self::ConnectRequest(_) => ServiceType::ConnectRequest,
            Self::ConnectResponse(_) => ServiceType::ConnectResponse,
            Self::ConnectionStateRequest(_) => ServiceType::ConnectionStateRequest,
            Self::ConnectionStateResponse(_) => ServiceType::ConnectionStateResponse,
            Self::DisconnectRequest(_) => ServiceType::DisconnectRequest,
            Self::DisconnectResponse(_) => ServiceType::DisconnectResponse,
            Self::TunnelRequest(_) => ServiceType::TunnelRequest,
            Self::TunnelResponse(_) => ServiceType::TunnelResponse,
            Self::RoutingIndication(_) => ServiceType::RoutingIndication,
        }
    }

    /// Channel the frame belongs to, for services that carry one.
    pub const fn channel(&self) -> Option<u8> {
        match self {
            Self::ConnectResponse(r) => Some(r.channel),
            Self::ConnectionStateRequest(r) | Self::DisconnectRequest(r) => Some(r.channel),
            Self::ConnectionStateResponse(r) | Self::DisconnectResponse(r) => Some(r.channel),
            Self::TunnelRequest(r) => Some(r.channel),
            Self::TunnelResponse(r) => Some(r.channel),
            _ => None,
        }
    }

    fn body_len(&self) -> usize {
        match self {
            Self::DescriptionRequest(_) => Hpai::SIZE,
            Self::DescriptionResponse(r) => r.encoded_len(),
            Self::ConnectRequest(_) => ConnectRequest::SIZE,
            Self::ConnectResponse(r) => r.encoded_len(),
            Self::ConnectionStateRequest(_) | Self::DisconnectRequest(_) => ChannelRequest::SIZE,
            Self::ConnectionStateResponse(_) | Self::DisconnectResponse(_) => ChannelResponse::SIZE,
            Self::TunnelRequest(r) => r.encoded_len(),
            Self::TunnelResponse(_) => 4,
            Self::RoutingIndication(c) => c.encoded_len(),
        }
    }

    pub fn encoded_len(&self) -> usize {
        KnxnetIpHeader::SIZE + self.body_len()
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.encoded_len();
        if len > MAX_FRAME_SIZE {
            return Err(KnxError::payload_too_large());
        }
        let out = window(buf, 0, len)?;
        KnxnetIpHeader::new(self.service_type(), self.body_len() as u16).encode(out)?;

        let body = &mut out[KnxnetIpHeader::SIZE..];
        let written = match self {
            Self::DescriptionRequest(hpai) => hpai.encode(body)?,
            Self::DescriptionResponse(r) => r.encode(body)?,
            Self::ConnectRequest(r) => r.encode(body)?,
            Self::ConnectResponse(r) => r.encode(body)?,
            Self::ConnectionStateRequest(r) | Self::DisconnectRequest(r) => r.encode(body)?,
            Self::ConnectionStateResponse(r) | Self::DisconnectResponse(r) => r.encode(body)?,
            Self::TunnelRequest(r) => r.encode(body)?,
            Self::TunnelResponse(r) => r.encode(body)?,
            Self::RoutingIndication(c) => c.encode(body)?,
        };
        debug_assert_eq!(written, self.body_len());
        Ok(len)
    }

    /// Decode one frame. Bytes past the header's total length are ignored.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = KnxnetIpHeader::decode(data)?;
        let body = &data[KnxnetIpHeader::SIZE..usize::from(header.total_length)];

        Ok(match header.service_type {
            ServiceType::SearchRequest | ServiceType::SearchResponse => {
                return Err(KnxError::unknown_variant());
            }
            ServiceType::DescriptionRequest => Self::DescriptionRequest(Hpai::decode(body)?),
            ServiceType::DescriptionResponse => {
                Self::DescriptionResponse(DescriptionResponse::decode(body)?)
            }
            ServiceType::ConnectRequest => Self::ConnectRequest(ConnectRequest::decode(body)?),
            ServiceType::ConnectResponse => Self::ConnectResponse(ConnectResponse::decode(body)?),
            ServiceType::ConnectionStateRequest => {
                Self::ConnectionStateRequest(ChannelRequest::decode(body)?)
            }
            ServiceType::ConnectionStateResponse => {
                Self::ConnectionStateResponse(ChannelResponse::decode(body)?)
            }
            ServiceType::DisconnectRequest => Self::DisconnectRequest(ChannelRequest::decode(body)?),
            ServiceType::DisconnectResponse => {
                Self::DisconnectResponse(ChannelResponse::decode(body)?)
            }
            ServiceType::TunnelRequest => Self::TunnelRequest(TunnelRequest::decode(body)?),
            ServiceType::TunnelResponse => Self::TunnelResponse(TunnelResponse::decode(body)?),
            ServiceType::RoutingIndication => Self::RoutingIndication(CemiFrame::decode(body)?),
        })
    }

    /// Serialize into an owned buffer sized by [`encoded_len`](Self::encoded_len).
    pub fn to_bytes(&self) -> Result<FrameBytes> {
        let len = self.encoded_len();
        let mut bytes = FrameBytes::new();
        bytes
            .resize(len, 0)
            .map_err(|_| KnxError::payload_too_large())?;
        self.encode(&mut bytes)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::{Destination, GroupAddress, IndividualAddress};
    use crate::protocol::cemi::LData;
    use crate::protocol::constants::CemiMessageCode;
    use crate::protocol::tpdu::{Apci, Tpdu};

    fn group_write_request(channel: u8, sequence: u8) -> Frame {
        let ldata = LData::new(
            IndividualAddress::UNSPECIFIED,
            Destination::Group(GroupAddress::from(0x0901)),
            Tpdu::data(Apci::GroupValueWrite, &[0x01]).unwrap(),
        );
        Frame::TunnelRequest(TunnelRequest::new(
            channel,
            sequence,
            CemiFrame::new(CemiMessageCode::LDataReq, ldata),
        ))
    }

    #[test]
    fn test_header_decode() {
        let data = [0x06, 0x10, 0x02, 0x07, 0x00, 0x10];
        assert!(KnxnetIpHeader::decode(&data).unwrap_err().is_truncated());

        let mut data = [0u8; 16];
        data[..6].copy_from_slice(&[0x06, 0x10, 0x02, 0x07, 0x00, 0x10]);
        let header = KnxnetIpHeader::decode(&data).unwrap();
        assert_eq!(header.service_type, ServiceType::ConnectionStateRequest);
        assert_eq!(header.body_length(), 10);
    }

    #[test]
    fn test_header_errors() {
        assert!(KnxnetIpHeader::decode(&[0x06, 0x10]).unwrap_err().is_truncated());
        assert!(KnxnetIpHeader::decode(&[0x07, 0x10, 0x02, 0x07, 0x00, 0x06])
            .unwrap_err()
            .is_malformed());
        assert!(KnxnetIpHeader::decode(&[0x06, 0x20, 0x02, 0x07, 0x00, 0x06])
            .unwrap_err()
            .is_malformed());
        assert!(KnxnetIpHeader::decode(&[0x06, 0x10, 0x03, 0x10, 0x00, 0x06])
            .unwrap_err()
            .is_unknown_variant());
        assert!(KnxnetIpHeader::decode(&[0x06, 0x10, 0x02, 0x07, 0x00, 0x04])
            .unwrap_err()
            .is_malformed());
    }

    #[test]
    fn test_hpai() {
        let hpai = Hpai::udp([192, 168, 1, 100], 3671);
        let mut buf = [0u8; 8];
        assert_eq!(hpai.encode(&mut buf).unwrap(), 8);
        assert_eq!(buf, [0x08, 0x01, 192, 168, 1, 100, 0x0E, 0x57]);
        assert_eq!(Hpai::decode(&buf).unwrap(), hpai);
        assert_eq!(hpai.socket_addr(), "192.168.1.100:3671".parse().unwrap());
        assert!(Hpai::NAT.is_nat());
        assert!(!hpai.is_nat());
    }

    #[test]
    fn test_hpai_maximal_and_tcp() {
        let hpai = Hpai {
            protocol: HostProtocol::Tcp,
            ip: [255; 4],
            port: u16::MAX,
        };
        let mut buf = [0u8; 8];
        hpai.encode(&mut buf).unwrap();
        assert_eq!(Hpai::decode(&buf).unwrap(), hpai);

        buf[1] = 0x03;
        assert!(Hpai::decode(&buf).unwrap_err().is_unknown_variant());
        buf[0] = 0x0A;
        assert!(Hpai::decode(&buf).unwrap_err().is_malformed());
    }

    #[test]
    fn test_connection_state_request_bytes() {
        let frame = Frame::ConnectionStateRequest(ChannelRequest::new(5, Hpai::NAT));
        let bytes = frame.to_bytes().unwrap();
        assert_eq!(
            bytes[..],
            [0x06, 0x10, 0x02, 0x07, 0x00, 0x10, 0x05, 0x00, 0x08, 0x01, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(Frame::decode(&bytes).unwrap(), frame);
        assert_eq!(frame.channel(), Some(5));
    }

    #[test]
    fn test_tunnel_request_bytes() {
        let frame = group_write_request(5, 0);
        let bytes = frame.to_bytes().unwrap();
        assert_eq!(
            bytes[..],
            [
                0x06, 0x10, 0x04, 0x20, 0x00, 0x15, // header
                0x04, 0x05, 0x00, 0x00, // connection header
                0x11, 0x00, // L_Data.req, no additional info
                0x94, 0xE0, 0x00, 0x00, 0x09, 0x01, 0x01, 0x00, 0x81,
            ]
        );
        assert_eq!(Frame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_sequence_boundary() {
        let frame = group_write_request(0xFF, 0xFF);
        let bytes = frame.to_bytes().unwrap();
        assert_eq!(Frame::decode(&bytes).unwrap(), frame);

        let ack = Frame::TunnelResponse(TunnelResponse::new(0xFF, 0xFF, 0));
        assert_eq!(Frame::decode(&ack.to_bytes().unwrap()).unwrap(), ack);
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let frame = Frame::DisconnectResponse(ChannelResponse::new(7, 0));
        let mut bytes = frame.to_bytes().unwrap();
        bytes.extend_from_slice(&[0xAA, 0xBB]).unwrap();
        assert_eq!(Frame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_search_is_unknown() {
        let data = [0x06, 0x10, 0x02, 0x01, 0x00, 0x0E, 8, 1, 0, 0, 0, 0, 0, 0];
        assert!(Frame::decode(&data).unwrap_err().is_unknown_variant());
    }

    #[test]
    fn test_routing_indication() {
        let Frame::TunnelRequest(request) = group_write_request(1, 1) else {
            unreachable!()
        };
        let mut cemi = request.cemi;
        cemi.code = CemiMessageCode::LDataInd;
        let frame = Frame::RoutingIndication(cemi);
        let bytes = frame.to_bytes().unwrap();
        assert_eq!(bytes[2..4], [0x05, 0x30]);
        assert_eq!(Frame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let frame = Frame::ConnectRequest(ConnectRequest::nat());
        let mut buf = [0u8; 20];
        assert!(matches!(
            frame.encode(&mut buf),
            Err(KnxError::Transport(ref e)) if e.is_buffer_too_small()
        ));
    }

    #[test]
    fn test_truncation_never_panics() {
        let bytes = group_write_request(5, 3).to_bytes().unwrap();
        for cut in 0..bytes.len() {
            let err = Frame::decode(&bytes[..cut]).unwrap_err();
            assert!(err.is_truncated(), "cut {cut}: {err}");
        }
    }
}

//! KNXnet/IP service bodies used by a tunneling client.
//!
//! Each type encodes and decodes the body that follows the 6-byte header;
//! [`Frame`](crate::protocol::frame::Frame) ties them to their service ids.
//!
//! ```text
//! Client                          Gateway
//!   |                                |
//!   |------- CONNECT_REQUEST ------->|
//!   |<------ CONNECT_RESPONSE -------|
//!   |                                |
//!   |------ TUNNELLING_REQUEST ----->|
//!   |<----- TUNNELLING_ACK ----------|
//!   |<----- TUNNELLING_REQUEST ------|
//!   |------ TUNNELLING_ACK --------->|
//!   |                                |
//!   |--- CONNECTIONSTATE_REQUEST --->|  (heartbeat)
//!   |<-- CONNECTIONSTATE_RESPONSE ---|
//!   |                                |
//!   |------ DISCONNECT_REQUEST ----->|
//!   |<----- DISCONNECT_RESPONSE -----|
//! ```

use crate::addressing::IndividualAddress;
use crate::error::{KnxError, Result};
use crate::protocol::cemi::CemiFrame;
use crate::protocol::constants::{TunnelLayer, E_NO_ERROR, TUNNEL_CONNECTION};
use crate::protocol::frame::Hpai;

/// Borrow `len` bytes at `offset` or fail with `TruncatedFrame`.
#[inline]
pub(crate) fn take(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    data.get(offset..offset + len).ok_or_else(KnxError::truncated_frame)
}

/// Read one byte at `offset` or fail with `TruncatedFrame`.
#[inline]
pub(crate) fn byte(data: &[u8], offset: usize) -> Result<u8> {
    data.get(offset).copied().ok_or_else(KnxError::truncated_frame)
}

/// Mutable window of `len` bytes at `offset` or `BufferTooSmall`.
#[inline]
pub(crate) fn window(buf: &mut [u8], offset: usize, len: usize) -> Result<&mut [u8]> {
    buf.get_mut(offset..offset + len).ok_or_else(KnxError::buffer_too_small)
}

// =============================================================================
// CRI / CRD
// =============================================================================

/// Connection Request Information for a tunnel.
///
/// ```text
/// ┌────────┬─────────────┬────────────┬──────────┐
/// │ len 04 │ type 04     │ KNX layer  │ reserved │
/// └────────┴─────────────┴────────────┴──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionRequestInfo {
    pub layer: TunnelLayer,
}

impl ConnectionRequestInfo {
    pub const SIZE: usize = 4;

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        window(buf, 0, Self::SIZE)?.copy_from_slice(&[
            Self::SIZE as u8,
            TUNNEL_CONNECTION,
            self.layer as u8,
            0x00,
        ]);
        Ok(Self::SIZE)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let cri = take(data, 0, Self::SIZE)?;
        if usize::from(cri[0]) != Self::SIZE {
            return Err(KnxError::malformed_field());
        }
        if cri[1] != TUNNEL_CONNECTION {
            return Err(KnxError::unknown_variant());
        }
        let layer = TunnelLayer::from_u8(cri[2]).ok_or_else(KnxError::unknown_variant)?;
        Ok(Self { layer })
    }
}

/// What a gateway hands out for an accepted tunnel: the data endpoint (HPAI)
/// and the individual address the tunnel uses on the bus (CRD).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TunnelEndpoint {
    pub data_endpoint: Hpai,
    pub address: IndividualAddress,
}

impl TunnelEndpoint {
    /// HPAI plus the 4-byte CRD.
    pub const SIZE: usize = Hpai::SIZE + CRD_SIZE;

    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        self.data_endpoint.encode(buf)?;
        let crd = window(buf, Hpai::SIZE, CRD_SIZE)?;
        crd[0] = CRD_SIZE as u8;
        crd[1] = TUNNEL_CONNECTION;
        self.address.encode(&mut crd[2..])?;
        Ok(Self::SIZE)
    }

    fn decode(data: &[u8]) -> Result<Self> {
        let data_endpoint = Hpai::decode(data)?;
        let crd = take(data, Hpai::SIZE, CRD_SIZE)?;
        if usize::from(crd[0]) != CRD_SIZE {
            return Err(KnxError::malformed_field());
        }
        if crd[1] != TUNNEL_CONNECTION {
            return Err(KnxError::unknown_variant());
        }
        Ok(Self {
            data_endpoint,
            address: IndividualAddress::decode(&crd[2..])?,
        })
    }
}

const CRD_SIZE: usize = 4;

// =============================================================================
// CONNECT
// =============================================================================

/// `CONNECT_REQUEST` (0x0205)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectRequest {
    pub control_endpoint: Hpai,
    pub data_endpoint: Hpai,
    pub cri: ConnectionRequestInfo,
}

impl ConnectRequest {
    pub const SIZE: usize = 2 * Hpai::SIZE + ConnectionRequestInfo::SIZE;

    /// Link-layer tunnel request with NAT endpoints, letting the gateway
    /// answer to whatever address it sees.
    pub const fn nat() -> Self {
        Self {
            control_endpoint: Hpai::NAT,
            data_endpoint: Hpai::NAT,
            cri: ConnectionRequestInfo { layer: TunnelLayer::LinkLayer },
        }
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let mut offset = self.control_endpoint.encode(buf)?;
        offset += self.data_endpoint.encode(buf.get_mut(offset..).unwrap_or_default())?;
        offset += self.cri.encode(buf.get_mut(offset..).unwrap_or_default())?;
        Ok(offset)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            control_endpoint: Hpai::decode(data)?,
            data_endpoint: Hpai::decode(take(data, Hpai::SIZE, Hpai::SIZE)?)?,
            cri: ConnectionRequestInfo::decode(data.get(2 * Hpai::SIZE..).unwrap_or_default())?,
        })
    }
}

/// `CONNECT_RESPONSE` (0x0206)
///
/// The endpoint block is present exactly when `status` is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectResponse {
    pub channel: u8,
    pub status: u8,
    pub endpoint: Option<TunnelEndpoint>,
}

impl ConnectResponse {
    pub const fn accepted(channel: u8, endpoint: TunnelEndpoint) -> Self {
        Self {
            channel,
            status: E_NO_ERROR,
            endpoint: Some(endpoint),
        }
    }

    pub const fn rejected(channel: u8, status: u8) -> Self {
        Self {
            channel,
            status,
            endpoint: None,
        }
    }

    pub const fn is_ok(&self) -> bool {
        self.status == E_NO_ERROR
    }

    pub fn encoded_len(&self) -> usize {
        2 + if self.endpoint.is_some() { TunnelEndpoint::SIZE } else { 0 }
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if self.is_ok() != self.endpoint.is_some() {
            return Err(KnxError::malformed_field());
        }
        window(buf, 0, 2)?.copy_from_slice(&[self.channel, self.status]);
        match &self.endpoint {
            Some(endpoint) => Ok(2 + endpoint.encode(&mut buf[2..])?),
            None => Ok(2),
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let head = take(data, 0, 2)?;
        let (channel, status) = (head[0], head[1]);
        let endpoint = if status == E_NO_ERROR {
            Some(TunnelEndpoint::decode(&data[2..])?)
        } else {
            None
        };
        Ok(Self { channel, status, endpoint })
    }
}

// =============================================================================
// CONNECTIONSTATE / DISCONNECT
// =============================================================================

/// Body shared by `CONNECTIONSTATE_REQUEST` and `DISCONNECT_REQUEST`:
/// channel, reserved byte, control endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelRequest {
    pub channel: u8,
    pub control_endpoint: Hpai,
}

impl ChannelRequest {
    pub const SIZE: usize = 2 + Hpai::SIZE;

    pub const fn new(channel: u8, control_endpoint: Hpai) -> Self {
        Self { channel, control_endpoint }
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        window(buf, 0, 2)?.copy_from_slice(&[self.channel, 0x00]);
        Ok(2 + self.control_endpoint.encode(&mut buf[2..])?)
    }

    /// The reserved byte is ignored.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let channel = byte(data, 0)?;
        Ok(Self {
            channel,
            control_endpoint: Hpai::decode(data.get(2..).unwrap_or_default())?,
        })
    }
}

/// Body shared by `CONNECTIONSTATE_RESPONSE` and `DISCONNECT_RESPONSE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelResponse {
    pub channel: u8,
    pub status: u8,
}

impl ChannelResponse {
    pub const SIZE: usize = 2;

    pub const fn new(channel: u8, status: u8) -> Self {
        Self { channel, status }
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        window(buf, 0, Self::SIZE)?.copy_from_slice(&[self.channel, self.status]);
        Ok(Self::SIZE)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let body = take(data, 0, Self::SIZE)?;
        Ok(Self::new(body[0], body[1]))
    }
}

// =============================================================================
// TUNNELLING
// =============================================================================

/// Connection header that opens tunnel requests and acknowledgements.
///
/// ```text
/// ┌────────┬─────────┬──────────┬───────────────────┐
/// │ len 04 │ channel │ sequence │ reserved / status │
/// └────────┴─────────┴──────────┴───────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionHeader {
    pub channel: u8,
    pub sequence: u8,
    pub status: u8,
}

impl ConnectionHeader {
    pub const SIZE: usize = 4;

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        window(buf, 0, Self::SIZE)?.copy_from_slice(&[
            Self::SIZE as u8,
            self.channel,
            self.sequence,
            self.status,
        ]);
        Ok(Self::SIZE)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = take(data, 0, Self::SIZE)?;
        if usize::from(header[0]) != Self::SIZE {
            return Err(KnxError::malformed_field());
        }
        Ok(Self {
            channel: header[1],
            sequence: header[2],
            status: header[3],
        })
    }
}

/// `TUNNELLING_REQUEST` (0x0420)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TunnelRequest {
    pub channel: u8,
    pub sequence: u8,
    pub cemi: CemiFrame,
}

impl TunnelRequest {
    pub const fn new(channel: u8, sequence: u8, cemi: CemiFrame) -> Self {
        Self { channel, sequence, cemi }
    }

    pub fn encoded_len(&self) -> usize {
        ConnectionHeader::SIZE + self.cemi.encoded_len()
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let header = ConnectionHeader {
            channel: self.channel,
            sequence: self.sequence,
            status: 0,
        };
        let offset = header.encode(buf)?;
        Ok(offset + self.cemi.encode(&mut buf[offset..])?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = ConnectionHeader::decode(data)?;
        Ok(Self {
            channel: header.channel,
            sequence: header.sequence,
            cemi: CemiFrame::decode(&data[ConnectionHeader::SIZE..])?,
        })
    }
}

/// `TUNNELLING_ACK` (0x0421): echoes the request's sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TunnelResponse {
    pub channel: u8,
    pub sequence: u8,
    pub status: u8,
}

impl TunnelResponse {
    pub const fn new(channel: u8, sequence: u8, status: u8) -> Self {
        Self { channel, sequence, status }
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        ConnectionHeader {
            channel: self.channel,
            sequence: self.sequence,
            status: self.status,
        }
        .encode(buf)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = ConnectionHeader::decode(data)?;
        Ok(Self::new(header.channel, header.sequence, header.status))
    }
}

// =============================================================================
// DESCRIPTION
// =============================================================================

const DIB_DEVICE_INFO: u8 = 0x01;
const DIB_SUPPORTED_FAMILIES: u8 = 0x02;

/// Maximum number of service families kept from a description response.
pub const MAX_SERVICE_FAMILIES: usize = 16;

/// Device information DIB of a `DESCRIPTION_RESPONSE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceInfo {
    /// KNX medium code (0x02 = TP1, 0x20 = IP)
    pub medium: u8,
    /// Bit 0 set when the device is in programming mode
    pub status: u8,
    pub address: IndividualAddress,
    pub project_installation_id: u16,
    pub serial_number: [u8; 6],
    pub multicast_address: [u8; 4],
    pub mac_address: [u8; 6],
    /// Zero-padded ISO 8859-1 name
    pub friendly_name: [u8; 30],
}

impl DeviceInfo {
    pub const SIZE: usize = 54;

    /// Friendly name up to the first NUL, if it is valid UTF-8.
    pub fn name(&self) -> Option<&str> {
        let end = self
            .friendly_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.friendly_name.len());
        core::str::from_utf8(&self.friendly_name[..end]).ok()
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let out = window(buf, 0, Self::SIZE)?;
        out[0] = Self::SIZE as u8;
        out[1] = DIB_DEVICE_INFO;
        out[2] = self.medium;
        out[3] = self.status;
        self.address.encode(&mut out[4..6])?;
        out[6..8].copy_from_slice(&self.project_installation_id.to_be_bytes());
        out[8..14].copy_from_slice(&self.serial_number);
        out[14..18].copy_from_slice(&self.multicast_address);
        out[18..24].copy_from_slice(&self.mac_address);
        out[24..54].copy_from_slice(&self.friendly_name);
        Ok(Self::SIZE)
    }

    fn decode(dib: &[u8]) -> Result<Self> {
        let dib = take(dib, 0, Self::SIZE)?;
        let mut info = Self {
            medium: dib[2],
            status: dib[3],
            address: IndividualAddress::decode(&dib[4..6])?,
            project_installation_id: u16::from_be_bytes([dib[6], dib[7]]),
            serial_number: [0; 6],
            multicast_address: [0; 4],
            mac_address: [0; 6],
            friendly_name: [0; 30],
        };
        info.serial_number.copy_from_slice(&dib[8..14]);
        info.multicast_address.copy_from_slice(&dib[14..18]);
        info.mac_address.copy_from_slice(&dib[18..24]);
        info.friendly_name.copy_from_slice(&dib[24..54]);
        Ok(info)
    }
}

/// One entry of the supported service families DIB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServiceFamily {
    /// 0x02 core, 0x03 device management, 0x04 tunnelling, 0x05 routing
    pub family: u8,
    pub version: u8,
}

/// `DESCRIPTION_RESPONSE` (0x0204)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DescriptionResponse {
    pub device: DeviceInfo,
    pub families: heapless::Vec<ServiceFamily, MAX_SERVICE_FAMILIES>,
}

impl DescriptionResponse {
    pub fn supports(&self, family: u8) -> bool {
        self.families.iter().any(|f| f.family == family)
    }

    pub fn encoded_len(&self) -> usize {
        DeviceInfo::SIZE + 2 + 2 * self.families.len()
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let mut offset = self.device.encode(buf)?;
        let dib_len = 2 + 2 * self.families.len();
        let out = window(buf, offset, dib_len)?;
        out[0] = dib_len as u8;
        out[1] = DIB_SUPPORTED_FAMILIES;
        for (slot, family) in out[2..].chunks_exact_mut(2).zip(&self.families) {
            slot.copy_from_slice(&[family.family, family.version]);
        }
        offset += dib_len;
        Ok(offset)
    }

    /// Requires the device-info DIB followed by the families DIB; later DIBs
    /// are length-checked and skipped.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let (len, kind) = dib_header(data)?;
        if kind != DIB_DEVICE_INFO || len != DeviceInfo::SIZE {
            return Err(KnxError::malformed_field());
        }
        let device = DeviceInfo::decode(data)?;

        let rest = &data[DeviceInfo::SIZE..];
        let (len, kind) = dib_header(rest)?;
        if kind != DIB_SUPPORTED_FAMILIES || len % 2 != 0 {
            return Err(KnxError::malformed_field());
        }
        let mut families = heapless::Vec::new();
        for pair in rest[2..len].chunks_exact(2) {
            families
                .push(ServiceFamily { family: pair[0], version: pair[1] })
                .map_err(|_| KnxError::payload_too_large())?;
        }

        let mut tail = &rest[len..];
        while !tail.is_empty() {
            let (len, _) = dib_header(tail)?;
            tail = &tail[len..];
        }
        Ok(Self { device, families })
    }
}

/// Length and type of the DIB at the start of `data`, validated against the
/// available bytes.
fn dib_header(data: &[u8]) -> Result<(usize, u8)> {
    let len = usize::from(byte(data, 0)?);
    let kind = byte(data, 1)?;
    if len < 2 {
        return Err(KnxError::malformed_field());
    }
    if len > data.len() {
        return Err(KnxError::truncated_frame());
    }
    Ok((len, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::{HostProtocol, E_NO_MORE_CONNECTIONS};

    fn gateway_endpoint() -> TunnelEndpoint {
        TunnelEndpoint {
            data_endpoint: Hpai::udp([192, 168, 1, 10], 3671),
            address: IndividualAddress::from(0x11FA),
        }
    }

    #[test]
    fn test_connect_request_nat() {
        let mut buf = [0u8; 32];
        let len = ConnectRequest::nat().encode(&mut buf).unwrap();
        assert_eq!(len, ConnectRequest::SIZE);
        assert_eq!(
            &buf[..len],
            [
                0x08, 0x01, 0, 0, 0, 0, 0, 0, //
                0x08, 0x01, 0, 0, 0, 0, 0, 0, //
                0x04, 0x04, 0x02, 0x00,
            ]
        );
        assert_eq!(ConnectRequest::decode(&buf[..len]).unwrap(), ConnectRequest::nat());
    }

    #[test]
    fn test_connect_request_layers() {
        let mut request = ConnectRequest::nat();
        request.cri.layer = TunnelLayer::BusMonitor;
        let mut buf = [0u8; 20];
        request.encode(&mut buf).unwrap();
        assert_eq!(buf[18], 0x80);
        assert_eq!(ConnectRequest::decode(&buf).unwrap(), request);

        buf[18] = 0x03;
        assert!(ConnectRequest::decode(&buf).unwrap_err().is_unknown_variant());
        buf[18] = 0x02;
        buf[16] = 0x05;
        assert!(ConnectRequest::decode(&buf).unwrap_err().is_malformed());
    }

    #[test]
    fn test_connect_response_accepted() {
        let response = ConnectResponse::accepted(7, gateway_endpoint());
        let mut buf = [0u8; 16];
        let len = response.encode(&mut buf).unwrap();
        assert_eq!(len, 14);
        assert_eq!(
            &buf[..len],
            [7, 0, 0x08, 0x01, 192, 168, 1, 10, 0x0E, 0x57, 0x04, 0x04, 0x11, 0xFA]
        );
        let decoded = ConnectResponse::decode(&buf[..len]).unwrap();
        assert_eq!(decoded, response);
        assert_eq!(decoded.endpoint.unwrap().data_endpoint.protocol, HostProtocol::Udp);
    }

    #[test]
    fn test_connect_response_rejected_has_no_endpoint() {
        let decoded = ConnectResponse::decode(&[0, E_NO_MORE_CONNECTIONS]).unwrap();
        assert!(!decoded.is_ok());
        assert_eq!(decoded.endpoint, None);
        // the accepted form needs the endpoint block
        assert!(ConnectResponse::decode(&[7, 0]).unwrap_err().is_truncated());
        // status and endpoint must agree
        let bad = ConnectResponse { channel: 1, status: 0, endpoint: None };
        assert!(bad.encode(&mut [0u8; 16]).is_err());
    }

    #[test]
    fn test_connect_response_bad_crd() {
        let mut buf = [0u8; 14];
        ConnectResponse::accepted(7, gateway_endpoint()).encode(&mut buf).unwrap();
        buf[10] = 0x03;
        assert!(ConnectResponse::decode(&buf).unwrap_err().is_malformed());
    }

    #[test]
    fn test_channel_request_reserved_byte() {
        let request = ChannelRequest::new(5, Hpai::NAT);
        let mut buf = [0u8; 10];
        assert_eq!(request.encode(&mut buf).unwrap(), 10);
        assert_eq!(buf[..2], [5, 0]);
        buf[1] = 0xFF;
        assert_eq!(ChannelRequest::decode(&buf).unwrap(), request);
    }

    #[test]
    fn test_channel_response() {
        let mut buf = [0u8; 2];
        ChannelResponse::new(5, 0x21).encode(&mut buf).unwrap();
        assert_eq!(buf, [5, 0x21]);
        assert!(ChannelResponse::decode(&buf[..1]).unwrap_err().is_truncated());
    }

    #[test]
    fn test_tunnel_response() {
        let ack = TunnelResponse::new(5, 255, 0);
        let mut buf = [0u8; 4];
        ack.encode(&mut buf).unwrap();
        assert_eq!(buf, [0x04, 5, 255, 0]);
        assert_eq!(TunnelResponse::decode(&buf).unwrap(), ack);
        buf[0] = 0x05;
        assert!(TunnelResponse::decode(&buf).unwrap_err().is_malformed());
    }

    fn description() -> DescriptionResponse {
        let mut friendly_name = [0u8; 30];
        friendly_name[..7].copy_from_slice(b"Gateway");
        let mut families = heapless::Vec::new();
        families.push(ServiceFamily { family: 0x02, version: 1 }).unwrap();
        families.push(ServiceFamily { family: 0x04, version: 1 }).unwrap();
        DescriptionResponse {
            device: DeviceInfo {
                medium: 0x02,
                status: 0,
                address: IndividualAddress::from(0x1100),
                project_installation_id: 0,
                serial_number: [0, 1, 2, 3, 4, 5],
                multicast_address: [224, 0, 23, 12],
                mac_address: [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF],
                friendly_name,
            },
            families,
        }
    }

    #[test]
    fn test_description_response() {
        let response = description();
        let mut buf = [0u8; 80];
        let len = response.encode(&mut buf).unwrap();
        assert_eq!(len, response.encoded_len());
        assert_eq!(buf[..2], [0x36, 0x01]);
        assert_eq!(buf[54..58], [0x06, 0x02, 0x02, 0x01]);

        let decoded = DescriptionResponse::decode(&buf[..len]).unwrap();
        assert_eq!(decoded, response);
        assert_eq!(decoded.device.name(), Some("Gateway"));
        assert!(decoded.supports(0x04));
        assert!(!decoded.supports(0x05));
    }

    #[test]
    fn test_description_response_skips_extra_dibs() {
        let response = description();
        let mut buf = [0u8; 80];
        let len = response.encode(&mut buf).unwrap();
        buf[len..len + 4].copy_from_slice(&[0x04, 0xFE, 0x00, 0x00]);
        assert_eq!(DescriptionResponse::decode(&buf[..len + 4]).unwrap(), response);
        // trailing DIB claiming more bytes than present
        buf[len] = 0x08;
        assert!(DescriptionResponse::decode(&buf[..len + 4]).unwrap_err().is_truncated());
    }
}

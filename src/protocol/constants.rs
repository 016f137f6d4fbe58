//! KNXnet/IP protocol constants and wire identifiers.

/// KNXnet/IP protocol version 1.0
pub const KNXNETIP_VERSION_10: u8 = 0x10;

/// Standard KNXnet/IP header length (6 bytes)
pub const HEADER_SIZE_10: u8 = 0x06;

/// Standard UDP port for KNXnet/IP communication
pub const KNXNETIP_DEFAULT_PORT: u16 = 3671;

/// Largest TPDU an L_Data frame can carry (`length - 1` stored in one byte,
/// minus the reserved 255).
pub const MAX_TPDU_SIZE: usize = 254;

/// Largest CEMI additional-info block.
pub const MAX_ADDITIONAL_INFO: usize = 255;

/// Largest datagram this crate encodes: header, connection header, CEMI
/// code and info length, the info block, L_Data header and TPDU.
pub const MAX_FRAME_SIZE: usize = 6 + 4 + 2 + MAX_ADDITIONAL_INFO + 7 + MAX_TPDU_SIZE;

// =============================================================================
// Service Type Identifiers
// =============================================================================

/// KNXnet/IP service identifiers understood by this crate.
///
/// Search services are listed so that their ids are recognised, but no
/// payload codec exists for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ServiceType {
    SearchRequest = 0x0201,
    SearchResponse = 0x0202,
    DescriptionRequest = 0x0203,
    DescriptionResponse = 0x0204,
    ConnectRequest = 0x0205,
    ConnectResponse = 0x0206,
    /// Heartbeat request
    ConnectionStateRequest = 0x0207,
    ConnectionStateResponse = 0x0208,
    DisconnectRequest = 0x0209,
    DisconnectResponse = 0x020A,
    TunnelRequest = 0x0420,
    /// Tunnel acknowledgement
    TunnelResponse = 0x0421,
    RoutingIndication = 0x0530,
}

impl ServiceType {
    pub const fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0x0201 => Self::SearchRequest,
            0x0202 => Self::SearchResponse,
            0x0203 => Self::DescriptionRequest,
            0x0204 => Self::DescriptionResponse,
            0x0205 => Self::ConnectRequest,
            0x0206 => Self::ConnectResponse,
            0x0207 => Self::ConnectionStateRequest,
            0x0208 => Self::ConnectionStateResponse,
            0x0209 => Self::DisconnectRequest,
            0x020A => Self::DisconnectResponse,
            0x0420 => Self::TunnelRequest,
            0x0421 => Self::TunnelResponse,
            0x0530 => Self::RoutingIndication,
            _ => return None,
        })
    }

    pub const fn to_u16(self) -> u16 {
        self as u16
    }
}

// =============================================================================
// Connection Types and Tunnel Layers
// =============================================================================

/// Connection type for `TUNNEL_CONNECTION`
pub const TUNNEL_CONNECTION: u8 = 0x04;

/// KNX layer requested for a tunnel connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum TunnelLayer {
    /// Data link layer tunnel (the usual choice)
    #[default]
    LinkLayer = 0x02,
    Raw = 0x04,
    BusMonitor = 0x80,
}

impl TunnelLayer {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x02 => Some(Self::LinkLayer),
            0x04 => Some(Self::Raw),
            0x80 => Some(Self::BusMonitor),
            _ => None,
        }
    }
}

// =============================================================================
// Host Protocol Codes
// =============================================================================

/// Transport named in a host-info block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum HostProtocol {
    #[default]
    Udp = 0x01,
    Tcp = 0x02,
}

impl HostProtocol {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Udp),
            0x02 => Some(Self::Tcp),
            _ => None,
        }
    }
}

// =============================================================================
// Status Codes
// =============================================================================

pub const E_NO_ERROR: u8 = 0x00;
pub const E_HOST_PROTOCOL_TYPE: u8 = 0x01;
pub const E_VERSION_NOT_SUPPORTED: u8 = 0x02;
pub const E_SEQUENCE_NUMBER: u8 = 0x04;
/// Unknown or stale channel id
pub const E_CONNECTION_ID: u8 = 0x21;
pub const E_CONNECTION_TYPE: u8 = 0x22;
pub const E_CONNECTION_OPTION: u8 = 0x23;
pub const E_NO_MORE_CONNECTIONS: u8 = 0x24;
pub const E_DATA_CONNECTION: u8 = 0x26;
pub const E_KNX_CONNECTION: u8 = 0x27;
pub const E_TUNNELLING_LAYER: u8 = 0x29;

/// Short name for a status byte, used in log lines.
pub const fn status_name(status: u8) -> &'static str {
    match status {
        E_NO_ERROR => "ok",
        E_HOST_PROTOCOL_TYPE => "host protocol type",
        E_VERSION_NOT_SUPPORTED => "version not supported",
        E_SEQUENCE_NUMBER => "sequence number",
        E_CONNECTION_ID => "connection id",
        E_CONNECTION_TYPE => "connection type",
        E_CONNECTION_OPTION => "connection option",
        E_NO_MORE_CONNECTIONS => "no more connections",
        E_DATA_CONNECTION => "data connection",
        E_KNX_CONNECTION => "knx connection",
        E_TUNNELLING_LAYER => "tunnelling layer",
        _ => "unknown",
    }
}

// =============================================================================
// cEMI Message Codes
// =============================================================================

/// CEMI service (message code) byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CemiMessageCode {
    /// Request from the client towards the bus
    LDataReq = 0x11,
    /// Telegram observed on the bus
    LDataInd = 0x29,
    /// Local confirmation of a previous request
    LDataCon = 0x2E,
}

impl CemiMessageCode {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x11 => Some(Self::LDataReq),
            0x29 => Some(Self::LDataInd),
            0x2E => Some(Self::LDataCon),
            _ => None,
        }
    }

    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

// =============================================================================
// KNX Priority
// =============================================================================

/// KNX message priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Priority {
    System = 0b00,
    #[default]
    Normal = 0b01,
    Urgent = 0b10,
    Low = 0b11,
}

impl Priority {
    /// Low two bits of `value`.
    pub const fn from_bits(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Self::System,
            0b01 => Self::Normal,
            0b10 => Self::Urgent,
            _ => Self::Low,
        }
    }

    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

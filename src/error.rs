//! Error types for KNX tunneling operations.
//!
//! Every category wraps a structured error holding an internal kind and, when
//! `std` is enabled, a backtrace. Codec errors are built with a disabled
//! backtrace because decoding untrusted datagrams is a hot path.

use core::fmt;

#[cfg(feature = "std")]
use std::backtrace::Backtrace;

/// Result type alias for KNX operations.
pub type Result<T> = core::result::Result<T, KnxError>;

// =============================================================================
// Error Kind Enums (Internal)
// =============================================================================

/// Protocol error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ProtocolErrorKind {
    /// A length field points past the available bytes.
    TruncatedFrame,
    /// Service id, message code, protocol code or similar is not known.
    UnknownVariant,
    /// A field that must hold a fixed value holds something else.
    MalformedFixedField,
    PayloadTooLarge,
}

/// Connection error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ConnectionErrorKind {
    Timeout,
    Rejected,
    NotConnected,
    AlreadyConnected,
    Lost,
}

/// Tunneling error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum TunnelingErrorKind {
    AckTimeout,
    AckFailed,
}

/// Transport error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum TransportErrorKind {
    SendFailed,
    ReceiveFailed,
    BufferTooSmall,
    SocketError,
    QueueFull,
    ThreadSpawn,
}

/// Addressing error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum AddressingErrorKind {
    InvalidIndividualAddress,
    InvalidGroupAddress,
    OutOfRange,
}

/// DPT error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum DptErrorKind {
    InvalidData,
    ValueOutOfRange,
    TypeMismatch,
}

/// Configuration error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ConfigErrorKind {
    /// Line without `=`
    MissingSeparator,
    InvalidValue,
}

// =============================================================================
// Main Error Type
// =============================================================================

/// KNX error type returned by all fallible operations in this crate.
#[derive(Debug)]
pub enum KnxError {
    /// Wire codec errors (truncated frames, unknown ids, bad fixed fields)
    Protocol(ProtocolError),
    /// Tunnel connection lifecycle errors
    Connection(ConnectionError),
    /// Send/acknowledge errors
    Tunneling(TunnelingError),
    /// Socket, queue and worker thread errors
    Transport(TransportError),
    /// Invalid address components
    Addressing(AddressingError),
    /// Datapoint encoding and decoding errors
    Dpt(DptError),
    /// Rejected configuration override
    Config(ConfigError),
}

// =============================================================================
// Structured Error Types
// =============================================================================

/// Protocol error with optional backtrace
#[derive(Debug)]
pub struct ProtocolError {
    kind: ProtocolErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl ProtocolError {
    const fn new(kind: ProtocolErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::disabled(),
        }
    }

    /// Check if a length field ran past the end of the input
    pub fn is_truncated(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::TruncatedFrame)
    }

    /// Check if an enumerated wire value was not recognized
    pub fn is_unknown_variant(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::UnknownVariant)
    }

    /// Check if a fixed wire field held an unexpected value
    pub fn is_malformed(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::MalformedFixedField)
    }

    /// Check if a payload exceeded its wire limit
    pub fn is_payload_too_large(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::PayloadTooLarge)
    }
}

/// Connection error with optional backtrace
#[derive(Debug)]
pub struct ConnectionError {
    kind: ConnectionErrorKind,
    status: Option<u8>,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl ConnectionError {
    pub(crate) fn new(kind: ConnectionErrorKind) -> Self {
        Self {
            kind,
            status: None,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if no connect response arrived in time
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::Timeout)
    }

    /// Check if the gateway rejected the connect request
    pub fn is_rejected(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::Rejected)
    }

    /// Check if the operation required an established tunnel
    pub fn is_not_connected(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::NotConnected)
    }

    /// Check if a connect was attempted on a live tunnel
    pub fn is_already_connected(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::AlreadyConnected)
    }

    /// Check if the tunnel died (heartbeat failure or gateway teardown)
    pub fn is_lost(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::Lost)
    }

    /// Status byte reported by the gateway, for rejections
    pub fn status(&self) -> Option<u8> {
        self.status
    }
}

/// Tunneling error with optional backtrace
#[derive(Debug)]
pub struct TunnelingError {
    kind: TunnelingErrorKind,
    status: Option<u8>,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl TunnelingError {
    pub(crate) fn new(kind: TunnelingErrorKind) -> Self {
        Self {
            kind,
            status: None,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if no tunnel response arrived within the ack timeout
    pub fn is_ack_timeout(&self) -> bool {
        matches!(self.kind, TunnelingErrorKind::AckTimeout)
    }

    /// Check if the gateway acknowledged with an error status
    pub fn is_ack_failed(&self) -> bool {
        matches!(self.kind, TunnelingErrorKind::AckFailed)
    }

    /// Status byte of a failed acknowledgement
    pub fn status(&self) -> Option<u8> {
        self.status
    }
}

/// Transport error with optional backtrace
#[derive(Debug)]
pub struct TransportError {
    kind: TransportErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl TransportError {
    pub(crate) fn new(kind: TransportErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if buffer is too small
    pub fn is_buffer_too_small(&self) -> bool {
        matches!(self.kind, TransportErrorKind::BufferTooSmall)
    }

    /// Check if this is a socket error
    pub fn is_socket_error(&self) -> bool {
        matches!(self.kind, TransportErrorKind::SocketError)
    }

    /// Check if a bounded queue rejected an item
    pub fn is_queue_full(&self) -> bool {
        matches!(self.kind, TransportErrorKind::QueueFull)
    }
}

/// Addressing error with optional backtrace
#[derive(Debug)]
pub struct AddressingError {
    kind: AddressingErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl AddressingError {
    pub(crate) fn new(kind: AddressingErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if address is out of range
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.kind, AddressingErrorKind::OutOfRange)
    }

    /// Check if a group address string or value was rejected
    pub fn is_invalid_group_address(&self) -> bool {
        matches!(self.kind, AddressingErrorKind::InvalidGroupAddress)
    }
}

/// DPT error with optional backtrace
#[derive(Debug)]
pub struct DptError {
    kind: DptErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl DptError {
    pub(crate) fn new(kind: DptErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if value is out of range
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.kind, DptErrorKind::ValueOutOfRange)
    }

    /// Check if the payload did not have the shape's size
    pub fn is_invalid_data(&self) -> bool {
        matches!(self.kind, DptErrorKind::InvalidData)
    }
}

/// Configuration error with optional backtrace
#[derive(Debug)]
pub struct ConfigError {
    kind: ConfigErrorKind,
    /// 1-based line of the offending override
    line: usize,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl ConfigError {
    pub(crate) fn new(kind: ConfigErrorKind, line: usize) -> Self {
        Self {
            kind,
            line,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Line number of the rejected override
    pub fn line(&self) -> usize {
        self.line
    }

    /// Check if a value failed to parse
    pub fn is_invalid_value(&self) -> bool {
        matches!(self.kind, ConfigErrorKind::InvalidValue)
    }
}

// =============================================================================
// Convenience Constructors for KnxError
// =============================================================================

impl KnxError {
    // Protocol errors
    #[inline]
    pub(crate) const fn truncated_frame() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::TruncatedFrame))
    }

    #[inline]
    pub(crate) const fn unknown_variant() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::UnknownVariant))
    }

    #[inline]
    pub(crate) const fn malformed_field() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::MalformedFixedField))
    }

    #[inline]
    pub(crate) const fn payload_too_large() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::PayloadTooLarge))
    }

    // Connection errors
    pub(crate) fn connect_timeout() -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::Timeout))
    }

    pub(crate) fn connect_rejected(status: u8) -> Self {
        let mut err = ConnectionError::new(ConnectionErrorKind::Rejected);
        err.status = Some(status);
        Self::Connection(err)
    }

    pub(crate) fn not_connected() -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::NotConnected))
    }

    pub(crate) fn already_connected() -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::AlreadyConnected))
    }

    pub(crate) fn connection_lost() -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::Lost))
    }

    // Tunneling errors
    pub(crate) fn ack_timeout() -> Self {
        Self::Tunneling(TunnelingError::new(TunnelingErrorKind::AckTimeout))
    }

    pub(crate) fn ack_failed(status: u8) -> Self {
        let mut err = TunnelingError::new(TunnelingErrorKind::AckFailed);
        err.status = Some(status);
        Self::Tunneling(err)
    }

    // Transport errors
    #[inline]
    pub(crate) const fn buffer_too_small() -> Self {
        Self::Transport(TransportError {
            kind: TransportErrorKind::BufferTooSmall,
            #[cfg(feature = "std")]
            backtrace: Backtrace::disabled(),
        })
    }

    pub(crate) fn socket_error() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::SocketError))
    }

    pub(crate) fn send_failed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::SendFailed))
    }

    pub(crate) fn receive_failed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::ReceiveFailed))
    }

    pub(crate) fn queue_full() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::QueueFull))
    }

    pub(crate) fn thread_spawn() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::ThreadSpawn))
    }

    // Addressing errors
    pub(crate) fn invalid_group_address() -> Self {
        Self::Addressing(AddressingError::new(AddressingErrorKind::InvalidGroupAddress))
    }

    pub(crate) fn invalid_individual_address() -> Self {
        Self::Addressing(AddressingError::new(AddressingErrorKind::InvalidIndividualAddress))
    }

    pub(crate) fn address_out_of_range() -> Self {
        Self::Addressing(AddressingError::new(AddressingErrorKind::OutOfRange))
    }

    // DPT errors
    pub(crate) fn invalid_dpt_data() -> Self {
        Self::Dpt(DptError::new(DptErrorKind::InvalidData))
    }

    pub(crate) fn dpt_value_out_of_range() -> Self {
        Self::Dpt(DptError::new(DptErrorKind::ValueOutOfRange))
    }

    pub(crate) fn dpt_type_mismatch() -> Self {
        Self::Dpt(DptError::new(DptErrorKind::TypeMismatch))
    }

    // Configuration errors
    pub(crate) fn config_missing_separator(line: usize) -> Self {
        Self::Config(ConfigError::new(ConfigErrorKind::MissingSeparator, line))
    }

    pub(crate) fn config_invalid_value(line: usize) -> Self {
        Self::Config(ConfigError::new(ConfigErrorKind::InvalidValue, line))
    }

    // Predicates spanning categories

    /// True for `TruncatedFrame` codec errors
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Protocol(e) if e.is_truncated())
    }

    /// True for `UnknownVariant` codec errors
    pub fn is_unknown_variant(&self) -> bool {
        matches!(self, Self::Protocol(e) if e.is_unknown_variant())
    }

    /// True for `MalformedFixedField` codec errors
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Protocol(e) if e.is_malformed())
    }

    /// True when a connect attempt timed out
    pub fn is_connect_timeout(&self) -> bool {
        matches!(self, Self::Connection(e) if e.is_timeout())
    }

    /// Gateway status if the connect request was rejected
    pub fn rejected_status(&self) -> Option<u8> {
        match self {
            Self::Connection(e) if e.is_rejected() => e.status(),
            _ => None,
        }
    }

    /// True when the operation needs a connected tunnel
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::Connection(e) if e.is_not_connected())
    }

    /// True when a send was not acknowledged in time
    pub fn is_ack_timeout(&self) -> bool {
        matches!(self, Self::Tunneling(e) if e.is_ack_timeout())
    }

    /// Gateway status if a send was acknowledged with an error
    pub fn ack_failed_status(&self) -> Option<u8> {
        match self {
            Self::Tunneling(e) if e.is_ack_failed() => e.status(),
            _ => None,
        }
    }

    /// True when the tunnel died underneath the operation
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Connection(e) if e.is_lost())
    }

    /// Backtrace captured where the error was built. Codec errors carry a
    /// disabled one.
    #[cfg(feature = "std")]
    pub fn backtrace(&self) -> &Backtrace {
        match self {
            Self::Protocol(e) => &e.backtrace,
            Self::Connection(e) => &e.backtrace,
            Self::Tunneling(e) => &e.backtrace,
            Self::Transport(e) => &e.backtrace,
            Self::Addressing(e) => &e.backtrace,
            Self::Dpt(e) => &e.backtrace,
            Self::Config(e) => &e.backtrace,
        }
    }
}

// =============================================================================
// Display Implementation
// =============================================================================

impl fmt::Display for KnxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnxError::Protocol(e) => write!(f, "Protocol error: {:?}", e.kind),
            KnxError::Connection(e) => match e.status {
                Some(status) => write!(f, "Connection error: {:?} (status 0x{status:02X})", e.kind),
                None => write!(f, "Connection error: {:?}", e.kind),
            },
            KnxError::Tunneling(e) => match e.status {
                Some(status) => write!(f, "Tunneling error: {:?} (status 0x{status:02X})", e.kind),
                None => write!(f, "Tunneling error: {:?}", e.kind),
            },
            KnxError::Transport(e) => write!(f, "Transport error: {:?}", e.kind),
            KnxError::Addressing(e) => write!(f, "Addressing error: {:?}", e.kind),
            KnxError::Dpt(e) => write!(f, "DPT error: {:?}", e.kind),
            KnxError::Config(e) => write!(f, "Config error: {:?} on line {}", e.kind, e.line),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for KnxError {
    fn format(&self, f: defmt::Formatter<'_>) {
        match self {
            KnxError::Protocol(e) => defmt::write!(f, "Protocol error: {}", e.kind),
            KnxError::Connection(e) => defmt::write!(f, "Connection error: {} {}", e.kind, e.status),
            KnxError::Tunneling(e) => defmt::write!(f, "Tunneling error: {} {}", e.kind, e.status),
            KnxError::Transport(e) => defmt::write!(f, "Transport error: {}", e.kind),
            KnxError::Addressing(e) => defmt::write!(f, "Addressing error: {}", e.kind),
            KnxError::Dpt(e) => defmt::write!(f, "DPT error: {}", e.kind),
            KnxError::Config(e) => defmt::write!(f, "Config error: {} on line {}", e.kind, e.line),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for KnxError {}

//! Network transport abstraction for KNXnet/IP communication.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use knx_tunnel::net::{Transport, UdpTransport};
//!
//! let mut transport = UdpTransport::bind("0.0.0.0:0".parse()?)?;
//! transport.send_to(&[0x06, 0x10], "192.168.1.10:3671".parse()?)?;
//! if transport.ready(Duration::from_millis(100))? {
//!     let mut buf = [0u8; 64];
//!     let (len, from) = transport.recv_from(&mut buf)?;
//!     println!("{len} bytes from {from}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::net::SocketAddrV4;
use std::time::Duration;

use crate::error::Result;

/// Blocking datagram transport.
///
/// Implementations move into the tunnel worker thread, hence `Send`. Sender
/// filtering is left to the caller.
pub trait Transport: Send {
    /// Send one datagram to `addr`.
    ///
    /// # Errors
    ///
    /// `SendFailed` if the datagram could not be handed to the network.
    fn send_to(&mut self, data: &[u8], addr: SocketAddrV4) -> Result<()>;

    /// Receive one datagram into `buf`.
    ///
    /// Only call after [`ready`](Self::ready) returned `true`; the call may
    /// block otherwise.
    ///
    /// # Errors
    ///
    /// `ReceiveFailed` on socket errors or non-IPv4 senders.
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddrV4)>;

    /// Wait at most `timeout` for a datagram to become readable.
    fn ready(&mut self, timeout: Duration) -> Result<bool>;

    /// Address the transport is bound to.
    fn local_addr(&self) -> Result<SocketAddrV4>;

    /// Release the underlying resources. Later calls may fail.
    fn close(&mut self) {}
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_to(&mut self, data: &[u8], addr: SocketAddrV4) -> Result<()> {
        (**self).send_to(data, addr)
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddrV4)> {
        (**self).recv_from(buf)
    }

    fn ready(&mut self, timeout: Duration) -> Result<bool> {
        (**self).ready(timeout)
    }

    fn local_addr(&self) -> Result<SocketAddrV4> {
        (**self).local_addr()
    }

    fn close(&mut self) {
        (**self).close();
    }
}

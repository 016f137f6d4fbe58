//! `UdpSocket` backed transport.

use std::io::ErrorKind;
use std::net::{SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use crate::error::{KnxError, Result};
use crate::net::transport::Transport;
use crate::protocol::constants::MAX_FRAME_SIZE;

/// Shortest wait handed to the socket; a zero read timeout is rejected by std.
const MIN_WAIT: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub struct UdpTransport {
    socket: Option<UdpSocket>,
}

impl UdpTransport {
    /// Bind a socket to `local` (`0.0.0.0:0` picks any interface and port).
    ///
    /// # Errors
    ///
    /// `SocketError` if the bind fails.
    pub fn bind(local: SocketAddrV4) -> Result<Self> {
        let socket = UdpSocket::bind(local).map_err(|e| {
            knx_log!(warn, "UDP bind to {} failed: {}", local, e);
            KnxError::socket_error()
        })?;
        Ok(Self {
            socket: Some(socket),
        })
    }

    fn socket(&self) -> Result<&UdpSocket> {
        self.socket.as_ref().ok_or_else(KnxError::socket_error)
    }
}

fn v4(addr: SocketAddr) -> Result<SocketAddrV4> {
    match addr {
        SocketAddr::V4(addr) => Ok(addr),
        SocketAddr::V6(_) => Err(KnxError::receive_failed()),
    }
}

impl Transport for UdpTransport {
    fn send_to(&mut self, data: &[u8], addr: SocketAddrV4) -> Result<()> {
        let sent = self.socket()?.send_to(data, addr).map_err(|e| {
            knx_log!(debug, "send to {} failed: {}", addr, e);
            KnxError::send_failed()
        })?;
        if sent != data.len() {
            return Err(KnxError::send_failed());
        }
        Ok(())
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddrV4)> {
        let (len, from) = self
            .socket()?
            .recv_from(buf)
            .map_err(|_| KnxError::receive_failed())?;
        Ok((len, v4(from)?))
    }

    fn ready(&mut self, timeout: Duration) -> Result<bool> {
        let socket = self.socket()?;
        socket
            .set_read_timeout(Some(timeout.max(MIN_WAIT)))
            .map_err(|_| KnxError::socket_error())?;
        // Peeking with a full-size buffer keeps platforms that report
        // truncation as an error quiet.
        let mut probe = [0u8; MAX_FRAME_SIZE];
        match socket.peek_from(&mut probe) {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(false),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(false),
            Err(_) => Err(KnxError::receive_failed()),
        }
    }

    fn local_addr(&self) -> Result<SocketAddrV4> {
        let addr = self
            .socket()?
            .local_addr()
            .map_err(|_| KnxError::socket_error())?;
        v4(addr).map_err(|_| KnxError::socket_error())
    }

    fn close(&mut self) {
        self.socket = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> SocketAddrV4 {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_loopback_datagram() {
        let mut a = UdpTransport::bind(loopback()).unwrap();
        let mut b = UdpTransport::bind(loopback()).unwrap();
        let b_addr = b.local_addr().unwrap();

        assert!(!b.ready(Duration::from_millis(10)).unwrap());
        a.send_to(&[0x06, 0x10, 0x02, 0x09], b_addr).unwrap();
        assert!(b.ready(Duration::from_secs(2)).unwrap());

        let mut buf = [0u8; 16];
        let (len, from) = b.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], [0x06, 0x10, 0x02, 0x09]);
        assert_eq!(from, a.local_addr().unwrap());
    }

    #[test]
    fn test_closed_socket() {
        let mut transport = UdpTransport::bind(loopback()).unwrap();
        transport.close();
        assert!(transport.local_addr().is_err());
        assert!(transport.send_to(&[1], "127.0.0.1:9".parse().unwrap()).is_err());
    }
}

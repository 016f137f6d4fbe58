//! Datagram transports for the tunnel worker.
//!
//! The worker only talks to the network through the [`Transport`] trait:
//! [`UdpTransport`] wraps a std `UdpSocket`, [`MockTransport`] keeps
//! everything in memory so state-machine tests can play the gateway.

pub mod mock_transport;
pub mod transport;
pub mod udp;

pub use mock_transport::{MockHandle, MockTransport};
pub use transport::Transport;
pub use udp::UdpTransport;

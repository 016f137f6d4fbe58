//! In-memory transport for testing.
//!
//! A [`MockTransport`] moves into the tunnel worker while the test keeps a
//! [`MockHandle`] to play the gateway: inject datagrams and wait for what
//! the worker sent.
//!
//! ```rust
//! use std::time::Duration;
//! use knx_tunnel::net::{MockTransport, Transport};
//!
//! let gateway = "192.168.1.10:3671".parse()?;
//! let mut mock = MockTransport::new();
//! let handle = mock.handle();
//!
//! mock.send_to(&[0x06, 0x10], gateway)?;
//! assert_eq!(handle.wait_sent(Duration::from_secs(1)), Some((vec![0x06, 0x10], gateway)));
//!
//! handle.inject(&[0x06, 0x10, 0x02, 0x0A], gateway);
//! assert!(mock.ready(Duration::ZERO)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::VecDeque;
use std::net::SocketAddrV4;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{KnxError, Result};
use crate::net::transport::Transport;
use crate::protocol::frame::Frame;

/// Local address reported by the mock.
pub const MOCK_LOCAL_ADDR: SocketAddrV4 = SocketAddrV4::new(std::net::Ipv4Addr::LOCALHOST, 50_000);

#[derive(Debug, Default)]
struct MockState {
    inbound: VecDeque<(Vec<u8>, SocketAddrV4)>,
    sent: VecDeque<(Vec<u8>, SocketAddrV4)>,
    sent_total: usize,
    fail_sends: bool,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MockState>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until `pred` holds or `timeout` elapses, returning the guard.
    fn wait_until(
        &self,
        timeout: Duration,
        mut pred: impl FnMut(&MockState) -> bool,
    ) -> MutexGuard<'_, MockState> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while !pred(&state) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        state
    }
}

/// Transport side, owned by the worker.
#[derive(Debug, Default)]
pub struct MockTransport {
    shared: Arc<Shared>,
}

/// Test side of a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockHandle {
    shared: Arc<Shared>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Transport for MockTransport {
    fn send_to(&mut self, data: &[u8], addr: SocketAddrV4) -> Result<()> {
        let mut state = self.shared.lock();
        if state.fail_sends || state.closed {
            return Err(KnxError::send_failed());
        }
        state.sent.push_back((data.to_vec(), addr));
        state.sent_total += 1;
        drop(state);
        self.shared.changed.notify_all();
        Ok(())
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddrV4)> {
        let (data, from) = self
            .shared
            .lock()
            .inbound
            .pop_front()
            .ok_or_else(KnxError::receive_failed)?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok((len, from))
    }

    fn ready(&mut self, timeout: Duration) -> Result<bool> {
        let state = self
            .shared
            .wait_until(timeout, |s| !s.inbound.is_empty() || s.closed);
        Ok(!state.inbound.is_empty())
    }

    fn local_addr(&self) -> Result<SocketAddrV4> {
        Ok(MOCK_LOCAL_ADDR)
    }

    fn close(&mut self) {
        self.shared.lock().closed = true;
        self.shared.changed.notify_all();
    }
}

impl MockHandle {
    /// Queue a datagram for the transport to receive.
    pub fn inject(&self, data: &[u8], from: SocketAddrV4) {
        self.shared.lock().inbound.push_back((data.to_vec(), from));
        self.shared.changed.notify_all();
    }

    /// Serialize and queue `frame`.
    ///
    /// # Panics
    ///
    /// If the frame does not encode.
    pub fn inject_frame(&self, frame: &Frame, from: SocketAddrV4) {
        match frame.to_bytes() {
            Ok(bytes) => self.inject(&bytes, from),
            Err(e) => panic!("injected frame does not encode: {e}"),
        }
    }

    /// Pop the oldest datagram sent through the transport, waiting up to
    /// `timeout` for one to arrive.
    pub fn wait_sent(&self, timeout: Duration) -> Option<(Vec<u8>, SocketAddrV4)> {
        self.shared
            .wait_until(timeout, |s| !s.sent.is_empty())
            .sent
            .pop_front()
    }

    /// Like [`wait_sent`](Self::wait_sent), decoding the datagram. Datagrams
    /// that fail to decode are skipped.
    pub fn wait_frame(&self, timeout: Duration) -> Option<(Frame, SocketAddrV4)> {
        let deadline = Instant::now() + timeout;
        loop {
            let (bytes, to) = self.wait_sent(deadline.saturating_duration_since(Instant::now()))?;
            if let Ok(frame) = Frame::decode(&bytes) {
                return Some((frame, to));
            }
        }
    }

    /// Number of datagrams sent since creation, including ones already popped.
    pub fn sent_total(&self) -> usize {
        self.shared.lock().sent_total
    }

    /// Make every following `send_to` fail.
    pub fn fail_sends(&self, fail: bool) {
        self.shared.lock().fail_sends = fail;
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

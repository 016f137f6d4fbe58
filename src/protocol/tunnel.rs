//! KNXnet/IP tunnel connection.
//!
//! [`TunnelConnection`] owns one tunnel to a gateway. A worker thread drives
//! the socket; callers block on a condition variable with explicit timeouts.
//!
//! ## State Machine
//!
//! ```text
//!                connect()              CONNECT_RESPONSE(0)
//! Disconnected ───────────► Connecting ─────────────────────► Connected
//!      ▲                        │ timeout / status ≠ 0            │
//!      ├────────────────────────┘                                 │ disconnect()
//!      │       DISCONNECT_RESPONSE / disconnect_timeout           ▼
//!      ├──────────────────────────────────────────────────── Disconnecting
//!      │   heartbeat failure / DISCONNECT_REQUEST from gateway    │
//!      └──────────────────────────────────────────────────── (Connected)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use knx_tunnel::dpt::DatapointValue;
//! use knx_tunnel::protocol::telegram::Telegram;
//! use knx_tunnel::{ga, TunnelConfig, TunnelConnection};
//!
//! let tunnel = TunnelConnection::new(TunnelConfig::default());
//! tunnel.connect("192.168.1.10:3671".parse()?)?;
//!
//! tunnel.send(&Telegram::group_write(ga!(1/2/3), &DatapointValue::Bool(true))?)?;
//! while let Some(telegram) = tunnel.receive(false) {
//!     println!("{} -> {}: {:?}", telegram.source, telegram.destination, telegram.value);
//! }
//!
//! tunnel.disconnect();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use core::fmt;
use std::net::SocketAddrV4;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::addressing::IndividualAddress;
use crate::config::TunnelConfig;
use crate::error::{KnxError, Result};
use crate::net::{Transport, UdpTransport};
use crate::protocol::cemi::CemiFrame;
use crate::protocol::constants::{
    status_name, CemiMessageCode, ServiceType, E_NO_ERROR, MAX_FRAME_SIZE,
};
use crate::protocol::frame::{Frame, Hpai};
use crate::protocol::services::{
    ChannelRequest, ChannelResponse, ConnectRequest, ConnectResponse, TunnelRequest,
    TunnelResponse,
};
use crate::protocol::telegram::Telegram;
use crate::queue::{InboundQueue, OutboundQueue};

/// Lifecycle state of a [`TunnelConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TunnelState {
    /// Idle, and the terminal state of every connection attempt
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        })
    }
}

/// Why the last connection ended without a local `disconnect()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TunnelFailure {
    ConnectTimeout,
    /// Connect response with a non-zero status
    ConnectRejected(u8),
    /// No heartbeat response within the retry budget
    HeartbeatFailure,
    /// Heartbeat answered with a non-zero status
    HeartbeatRejected(u8),
    /// The gateway sent a disconnect request
    ClosedByGateway,
}

/// Counters kept by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TunnelStats {
    pub frames_sent: u64,
    pub send_errors: u64,
    /// Undecodable, foreign or out-of-state datagrams
    pub datagrams_dropped: u64,
    pub telegrams_received: u64,
    /// Telegrams lost because the inbound queue was full
    pub inbound_overflows: u64,
}

#[derive(Debug)]
struct Heartbeat {
    /// Last status-0 response, or the moment the tunnel came up
    last_ack: Instant,
    /// Set while a request is outstanding
    sent_at: Option<Instant>,
    attempts: u32,
}

impl Heartbeat {
    fn new(now: Instant) -> Self {
        Self {
            last_ack: now,
            sent_at: None,
            attempts: 0,
        }
    }

    fn acknowledged(&self) -> bool {
        self.sent_at.is_none()
    }

    /// When the worker next has to act, `None` if that lies beyond what an
    /// `Instant` can represent.
    fn deadline(&self, config: &TunnelConfig) -> Option<Instant> {
        match self.sent_at {
            Some(sent) => sent.checked_add(config.heartbeat_timeout),
            None => self.last_ack.checked_add(config.heartbeat_interval),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: TunnelState,
    channel: u8,
    gateway_control: SocketAddrV4,
    gateway_data: SocketAddrV4,
    tunnel_address: IndividualAddress,
    /// Sequence for the next outgoing tunnel request
    send_sequence: u8,
    /// Sequence of the request a sender is waiting on
    pending: Option<u8>,
    /// Sequence of the last tunnel request delivered to the application
    last_received: Option<u8>,
    /// Response to the pending request as `(sequence, status)`
    ack: Option<(u8, u8)>,
    heartbeat: Heartbeat,
    last_failure: Option<TunnelFailure>,
    stats: TunnelStats,
}

impl Inner {
    fn new() -> Self {
        let unspecified = SocketAddrV4::new(std::net::Ipv4Addr::UNSPECIFIED, 0);
        Self {
            state: TunnelState::Disconnected,
            channel: 0,
            gateway_control: unspecified,
            gateway_data: unspecified,
            tunnel_address: IndividualAddress::UNSPECIFIED,
            send_sequence: 0,
            pending: None,
            last_received: None,
            ack: None,
            heartbeat: Heartbeat::new(Instant::now()),
            last_failure: None,
            stats: TunnelStats::default(),
        }
    }

    fn from_gateway(&self, addr: SocketAddrV4) -> bool {
        addr == self.gateway_control || addr == self.gateway_data
    }

    fn is_current(&self, channel: u8) -> bool {
        self.state != TunnelState::Disconnected && channel == self.channel
    }
}

#[derive(Debug)]
struct Shared {
    config: TunnelConfig,
    inner: Mutex<Inner>,
    changed: Condvar,
    /// Serializes sequence assignment and transmission
    send_lock: Mutex<()>,
    outbound: OutboundQueue,
    inbound: InboundQueue,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block while `pred` holds, for at most `timeout`.
    fn wait_while<'a>(
        &self,
        guard: MutexGuard<'a, Inner>,
        timeout: Duration,
        pred: impl FnMut(&mut Inner) -> bool,
    ) -> MutexGuard<'a, Inner> {
        self.changed
            .wait_timeout_while(guard, timeout, pred)
            .unwrap_or_else(PoisonError::into_inner)
            .0
    }

    fn set_state(&self, inner: &mut Inner, state: TunnelState) {
        if inner.state != state {
            knx_log!(info, "[{}] {} -> {}", self.config.name, inner.state, state);
            inner.state = state;
        }
        self.changed.notify_all();
        if state == TunnelState::Disconnected {
            self.inbound.wake_all();
        }
    }

    fn enqueue(&self, inner: &mut Inner, frame: &Frame) {
        if let Err(e) = self.outbound.push_frame(frame) {
            knx_log!(warn, "[{}] dropping outbound {:?}: {}", self.config.name, frame.service_type(), e);
            inner.stats.send_errors += 1;
        }
    }
}

/// One KNXnet/IP tunnel.
///
/// All methods take `&self`; share the connection between threads with an
/// `Arc`. Dropping it disconnects.
#[derive(Debug)]
pub struct TunnelConnection {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TunnelConnection {
    pub fn new(config: TunnelConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(Inner::new()),
                changed: Condvar::new(),
                send_lock: Mutex::new(()),
                outbound: OutboundQueue::new(),
                inbound: InboundQueue::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &TunnelConfig {
        &self.shared.config
    }

    /// Open a tunnel to `gateway` over a UDP socket bound to
    /// [`TunnelConfig::local_bind`].
    pub fn connect(&self, gateway: SocketAddrV4) -> Result<()> {
        if self.state() != TunnelState::Disconnected {
            return Err(KnxError::already_connected());
        }
        let transport = UdpTransport::bind(self.shared.config.local_bind)?;
        self.connect_with(transport, gateway)
    }

    /// Open a tunnel over `transport`, blocking until the gateway answers or
    /// `connect_timeout` elapses.
    ///
    /// # Errors
    ///
    /// - `AlreadyConnected` unless the connection is `Disconnected`
    /// - `Timeout` if no connect response arrived in time
    /// - `Rejected` with the gateway's status byte
    /// - `ThreadSpawn` if the worker could not start
    pub fn connect_with<T>(&self, transport: T, gateway: SocketAddrV4) -> Result<()>
    where
        T: Transport + 'static,
    {
        let shared = &self.shared;
        let name = &shared.config.name;
        {
            // Held until the new worker is stored so a racing connect sees
            // AlreadyConnected instead of joining the live worker.
            let mut slot = self.worker_slot();
            if self.state() != TunnelState::Disconnected {
                return Err(KnxError::already_connected());
            }
            // A worker left over from a dropped connection exits on its own
            // once it has flushed.
            if let Some(stale) = slot.take() {
                if stale.join().is_err() {
                    knx_log!(error, "[{}] worker panicked", name);
                }
            }
            shared.outbound.clear();
            shared.inbound.clear();

            let mut inner = shared.lock();
            *inner = Inner {
                stats: inner.stats,
                ..Inner::new()
            };
            inner.gateway_control = gateway;
            inner.gateway_data = gateway;
            shared.enqueue(&mut inner, &Frame::ConnectRequest(ConnectRequest::nat()));
            shared.set_state(&mut inner, TunnelState::Connecting);
            drop(inner);

            let worker = Worker {
                shared: Arc::clone(shared),
                transport,
            };
            let spawned = thread::Builder::new()
                .name(format!("{name}-worker"))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => *slot = Some(handle),
                Err(e) => {
                    knx_log!(error, "[{}] cannot spawn worker: {}", name, e);
                    let mut inner = shared.lock();
                    shared.set_state(&mut inner, TunnelState::Disconnected);
                    return Err(KnxError::thread_spawn());
                }
            }
        }
        knx_log!(info, "[{}] connecting to {}", name, gateway);

        let mut inner = shared.lock();
        inner = shared.wait_while(inner, shared.config.connect_timeout, |i| {
            i.state == TunnelState::Connecting
        });
        let result = match inner.state {
            TunnelState::Connected => Ok(()),
            TunnelState::Connecting => {
                knx_log!(warn, "[{}] no connect response from {}", name, gateway);
                inner.last_failure = Some(TunnelFailure::ConnectTimeout);
                shared.set_state(&mut inner, TunnelState::Disconnected);
                Err(KnxError::connect_timeout())
            }
            TunnelState::Disconnected | TunnelState::Disconnecting => match inner.last_failure {
                Some(TunnelFailure::ConnectRejected(status)) => Err(KnxError::connect_rejected(status)),
                _ => Err(KnxError::connection_lost()),
            },
        };
        drop(inner);
        if result.is_err() {
            self.join_worker();
        }
        result
    }

    /// Send `telegram` as an `L_Data.req` and wait for the gateway's
    /// acknowledgement.
    ///
    /// A telegram with an unspecified source gets
    /// [`TunnelConfig::source_address`]. Every request that gets queued
    /// consumes a sequence number, even when the send then fails.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if the tunnel is not up, or goes down while waiting
    /// - `AckTimeout` if no matching acknowledgement arrived in `ack_timeout`
    /// - `AckFailed` with the status of a negative acknowledgement
    /// - `QueueFull` if the outbound queue is saturated
    pub fn send(&self, telegram: &Telegram) -> Result<()> {
        let shared = &self.shared;
        let _serialized = shared.send_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut ldata = telegram.to_ldata();
        if ldata.source == IndividualAddress::UNSPECIFIED {
            ldata.source = shared.config.source_address;
        }

        let (channel, sequence) = {
            let mut inner = shared.lock();
            if inner.state != TunnelState::Connected {
                return Err(KnxError::not_connected());
            }
            // a sequence is spent once assigned, whatever the outcome
            let sequence = inner.send_sequence;
            inner.send_sequence = sequence.wrapping_add(1);
            inner.pending = Some(sequence);
            inner.ack = None;
            (inner.channel, sequence)
        };
        let request = Frame::TunnelRequest(TunnelRequest::new(
            channel,
            sequence,
            CemiFrame::new(CemiMessageCode::LDataReq, ldata),
        ));
        if let Err(e) = shared.outbound.push_frame(&request) {
            // never left the host, so the gateway has not seen this sequence
            let mut inner = shared.lock();
            inner.send_sequence = sequence;
            inner.pending = None;
            return Err(e);
        }
        knx_log!(trace, "[{}] queued tunnel request seq {}", shared.config.name, sequence);

        let inner = shared.lock();
        let mut inner = shared.wait_while(inner, shared.config.ack_timeout, |i| {
            i.state == TunnelState::Connected && !matches!(i.ack, Some((seq, _)) if seq == sequence)
        });
        inner.pending = None;
        if inner.state != TunnelState::Connected {
            return Err(KnxError::not_connected());
        }
        match inner.ack.take() {
            Some((seq, E_NO_ERROR)) if seq == sequence => Ok(()),
            Some((seq, status)) if seq == sequence => {
                knx_log!(
                    warn,
                    "[{}] seq {} acknowledged with {} (0x{:02X})",
                    shared.config.name,
                    sequence,
                    status_name(status),
                    status
                );
                Err(KnxError::ack_failed(status))
            }
            _ => {
                knx_log!(warn, "[{}] no ack for seq {}", shared.config.name, sequence);
                Err(KnxError::ack_timeout())
            }
        }
    }

    /// Next received telegram. With `blocking`, waits until one arrives or the
    /// connection is `Disconnected` with nothing left to read.
    pub fn receive(&self, blocking: bool) -> Option<Telegram> {
        if !blocking {
            return self.shared.inbound.try_pop();
        }
        loop {
            if let Some(telegram) = self.shared.inbound.pop_timeout(self.shared.config.poll_interval) {
                return Some(telegram);
            }
            if self.state() == TunnelState::Disconnected {
                return self.shared.inbound.try_pop();
            }
        }
    }

    pub fn receive_timeout(&self, timeout: Duration) -> Option<Telegram> {
        self.shared.inbound.pop_timeout(timeout)
    }

    /// Tear the tunnel down. Safe from any state and while other threads
    /// block in `send` or `connect`.
    ///
    /// A connected tunnel sends a disconnect request and waits up to
    /// `disconnect_timeout` for the response. The worker is joined and both
    /// queues are cleared before this returns.
    pub fn disconnect(&self) {
        let shared = &self.shared;
        let mut inner = shared.lock();
        match inner.state {
            TunnelState::Connected => {
                let request = ChannelRequest::new(inner.channel, Hpai::NAT);
                shared.enqueue(&mut inner, &Frame::DisconnectRequest(request));
                shared.set_state(&mut inner, TunnelState::Disconnecting);
                inner = shared.wait_while(inner, shared.config.disconnect_timeout, |i| {
                    i.state == TunnelState::Disconnecting
                });
            }
            TunnelState::Disconnecting => {
                inner = shared.wait_while(inner, shared.config.disconnect_timeout, |i| {
                    i.state == TunnelState::Disconnecting
                });
            }
            TunnelState::Connecting | TunnelState::Disconnected => {}
        }
        if inner.state == TunnelState::Disconnecting {
            knx_log!(debug, "[{}] no disconnect response, closing anyway", shared.config.name);
        }
        shared.set_state(&mut inner, TunnelState::Disconnected);
        drop(inner);

        self.join_worker();
        shared.outbound.clear();
        shared.inbound.clear();
    }

    pub fn state(&self) -> TunnelState {
        self.shared.lock().state
    }

    /// Channel assigned by the gateway while connected.
    pub fn channel(&self) -> Option<u8> {
        let inner = self.shared.lock();
        (inner.state == TunnelState::Connected).then_some(inner.channel)
    }

    /// Individual address the gateway assigned to the tunnel.
    pub fn tunnel_address(&self) -> Option<IndividualAddress> {
        let inner = self.shared.lock();
        (inner.state == TunnelState::Connected).then_some(inner.tunnel_address)
    }

    pub fn last_failure(&self) -> Option<TunnelFailure> {
        self.shared.lock().last_failure
    }

    pub fn stats(&self) -> TunnelStats {
        self.shared.lock().stats
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn join_worker(&self) {
        let handle = self.worker_slot().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                knx_log!(error, "[{}] worker panicked", self.shared.config.name);
            }
        }
    }
}

impl Drop for TunnelConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// =============================================================================
// Worker
// =============================================================================

struct Worker<T> {
    shared: Arc<Shared>,
    transport: T,
}

impl<T: Transport> Worker<T> {
    /// Heartbeat, flush, wait for one datagram; leave after the flush that
    /// follows the switch to `Disconnected`.
    fn run(mut self) {
        let name = self.shared.config.name.clone();
        knx_log!(debug, "[{}] worker started", name);
        let mut buf = [0u8; MAX_FRAME_SIZE];
        loop {
            let wait = self.service_heartbeat();
            self.flush();
            if self.shared.lock().state == TunnelState::Disconnected {
                break;
            }
            match self.transport.ready(wait) {
                Ok(true) => self.receive(&mut buf),
                Ok(false) => {}
                Err(e) => {
                    knx_log!(debug, "[{}] socket wait failed: {}", name, e);
                    thread::sleep(wait);
                }
            }
        }
        self.transport.close();
        knx_log!(debug, "[{}] worker stopped", name);
    }

    /// Emit or retry a connection-state request when due and return how long
    /// the next socket wait may last.
    fn service_heartbeat(&mut self) -> Duration {
        let shared = Arc::clone(&self.shared);
        let config = &shared.config;
        let mut inner = shared.lock();
        if inner.state != TunnelState::Connected {
            return config.poll_interval;
        }

        let now = Instant::now();
        let Some(deadline) = inner.heartbeat.deadline(config) else {
            return config.poll_interval;
        };
        if now >= deadline {
            if !inner.heartbeat.acknowledged() && inner.heartbeat.attempts >= config.heartbeat_retries {
                knx_log!(
                    warn,
                    "[{}] {} heartbeats unanswered, closing channel {}",
                    config.name,
                    inner.heartbeat.attempts,
                    inner.channel
                );
                let request = ChannelRequest::new(inner.channel, Hpai::NAT);
                shared.enqueue(&mut inner, &Frame::DisconnectRequest(request));
                inner.last_failure = Some(TunnelFailure::HeartbeatFailure);
                shared.set_state(&mut inner, TunnelState::Disconnected);
                return Duration::ZERO;
            }
            if !inner.heartbeat.acknowledged() {
                knx_log!(warn, "[{}] heartbeat {} unanswered, retrying", config.name, inner.heartbeat.attempts);
            }
            let request = ChannelRequest::new(inner.channel, Hpai::NAT);
            shared.enqueue(&mut inner, &Frame::ConnectionStateRequest(request));
            inner.heartbeat.sent_at = Some(now);
            inner.heartbeat.attempts += 1;
        }
        inner
            .heartbeat
            .deadline(config)
            .map_or(config.poll_interval, |deadline| deadline.saturating_duration_since(now))
            .min(config.poll_interval)
    }

    fn flush(&mut self) {
        while let Some(bytes) = self.shared.outbound.try_pop() {
            let to = {
                let inner = self.shared.lock();
                if is_data_service(&bytes) {
                    inner.gateway_data
                } else {
                    inner.gateway_control
                }
            };
            self.transmit(&bytes, to);
        }
    }

    fn transmit(&mut self, bytes: &[u8], to: SocketAddrV4) {
        let result = self.transport.send_to(bytes, to);
        let mut inner = self.shared.lock();
        match result {
            Ok(()) => inner.stats.frames_sent += 1,
            Err(e) => {
                inner.stats.send_errors += 1;
                knx_log!(warn, "[{}] send to {} failed: {}", self.shared.config.name, to, e);
            }
        }
    }

    fn receive(&mut self, buf: &mut [u8]) {
        let (len, from) = match self.transport.recv_from(buf) {
            Ok(received) => received,
            Err(e) => {
                knx_log!(debug, "[{}] receive failed: {}", self.shared.config.name, e);
                return;
            }
        };
        if !self.shared.lock().from_gateway(from) {
            knx_log!(debug, "[{}] dropping datagram from foreign sender {}", self.shared.config.name, from);
            self.shared.lock().stats.datagrams_dropped += 1;
            return;
        }
        match Frame::decode(&buf[..len]) {
            Ok(frame) => {
                knx_log!(trace, "[{}] <- {:?}", self.shared.config.name, frame.service_type());
                self.dispatch(frame, from);
            }
            Err(e) => {
                knx_log!(debug, "[{}] dropping {} byte datagram: {}", self.shared.config.name, len, e);
                self.shared.lock().stats.datagrams_dropped += 1;
            }
        }
    }

    fn dispatch(&mut self, frame: Frame, from: SocketAddrV4) {
        let handled = match frame {
            Frame::ConnectResponse(response) => self.on_connect_response(&response, from),
            Frame::ConnectionStateResponse(response) => self.on_connection_state(response),
            Frame::DisconnectRequest(request) => self.on_disconnect_request(&request),
            Frame::DisconnectResponse(response) => self.on_disconnect_response(response),
            Frame::TunnelRequest(request) => self.on_tunnel_request(request),
            Frame::TunnelResponse(response) => self.on_tunnel_response(response),
            other => {
                knx_log!(debug, "[{}] ignoring {:?}", self.shared.config.name, other.service_type());
                false
            }
        };
        if !handled {
            self.shared.lock().stats.datagrams_dropped += 1;
        }
    }

    fn on_connect_response(&mut self, response: &ConnectResponse, from: SocketAddrV4) -> bool {
        let shared = &self.shared;
        let mut inner = shared.lock();
        if inner.state != TunnelState::Connecting {
            return false;
        }
        match response.endpoint {
            Some(endpoint) if response.is_ok() => {
                let data = endpoint.data_endpoint;
                inner.gateway_data = if data.is_nat() || data.ip().is_unspecified() {
                    from
                } else {
                    data.socket_addr()
                };
                inner.channel = response.channel;
                inner.tunnel_address = endpoint.address;
                inner.send_sequence = 0;
                inner.pending = None;
                inner.last_received = None;
                inner.ack = None;
                inner.heartbeat = Heartbeat::new(Instant::now());
                knx_log!(
                    info,
                    "[{}] channel {} assigned, tunnel address {}",
                    shared.config.name,
                    response.channel,
                    endpoint.address
                );
                shared.set_state(&mut inner, TunnelState::Connected);
            }
            _ => {
                knx_log!(
                    warn,
                    "[{}] connect rejected: {} (0x{:02X})",
                    shared.config.name,
                    status_name(response.status),
                    response.status
                );
                inner.last_failure = Some(TunnelFailure::ConnectRejected(response.status));
                shared.set_state(&mut inner, TunnelState::Disconnected);
            }
        }
        true
    }

    fn on_connection_state(&mut self, response: ChannelResponse) -> bool {
        let shared = &self.shared;
        let mut inner = shared.lock();
        if inner.state != TunnelState::Connected || response.channel != inner.channel {
            return false;
        }
        if response.status == E_NO_ERROR {
            inner.heartbeat = Heartbeat::new(Instant::now());
        } else {
            knx_log!(
                warn,
                "[{}] heartbeat rejected: {} (0x{:02X})",
                shared.config.name,
                status_name(response.status),
                response.status
            );
            inner.last_failure = Some(TunnelFailure::HeartbeatRejected(response.status));
            shared.set_state(&mut inner, TunnelState::Disconnected);
        }
        true
    }

    fn on_disconnect_request(&mut self, request: &ChannelRequest) -> bool {
        let shared = &self.shared;
        let mut inner = shared.lock();
        if !inner.is_current(request.channel) {
            return false;
        }
        let response = ChannelResponse::new(request.channel, E_NO_ERROR);
        shared.enqueue(&mut inner, &Frame::DisconnectResponse(response));
        if inner.state != TunnelState::Disconnecting {
            knx_log!(info, "[{}] gateway closed channel {}", shared.config.name, request.channel);
            inner.last_failure = Some(TunnelFailure::ClosedByGateway);
        }
        shared.set_state(&mut inner, TunnelState::Disconnected);
        true
    }

    fn on_disconnect_response(&mut self, response: ChannelResponse) -> bool {
        let shared = &self.shared;
        let mut inner = shared.lock();
        if !inner.is_current(response.channel) {
            return false;
        }
        shared.set_state(&mut inner, TunnelState::Disconnected);
        true
    }

    fn on_tunnel_request(&mut self, request: TunnelRequest) -> bool {
        let shared = Arc::clone(&self.shared);
        let name = &shared.config.name;
        let (ack_to, duplicate) = {
            let mut inner = shared.lock();
            if inner.state != TunnelState::Connected || request.channel != inner.channel {
                return false;
            }
            let duplicate = inner.last_received == Some(request.sequence);
            inner.last_received = Some(request.sequence);
            (inner.gateway_data, duplicate)
        };

        // Acknowledge straight away, ahead of anything queued.
        let ack = Frame::TunnelResponse(TunnelResponse::new(request.channel, request.sequence, E_NO_ERROR));
        match ack.to_bytes() {
            Ok(bytes) => self.transmit(&bytes, ack_to),
            Err(e) => knx_log!(error, "[{}] cannot encode ack: {}", name, e),
        }

        if duplicate {
            knx_log!(debug, "[{}] repeated seq {}, not delivered again", name, request.sequence);
            return true;
        }

        let cemi = request.cemi;
        if cemi.code == CemiMessageCode::LDataCon {
            knx_log!(
                debug,
                "[{}] confirmation for {} ({})",
                name,
                cemi.ldata.destination,
                if cemi.ldata.error { "error" } else { "ok" }
            );
            return true;
        }

        let mut telegram = Telegram::from_ldata(cemi.ldata);
        if let Some(ty) = telegram.group().and_then(|g| shared.config.datapoint_type(g)) {
            if let Err(e) = telegram.resolve_value(ty) {
                knx_log!(debug, "[{}] {} payload is not {}: {}", name, telegram.destination, ty.identifier(), e);
            }
        }
        knx_log!(trace, "[{}] telegram {} -> {}", name, telegram.source, telegram.destination);

        let overflow = shared.inbound.push(telegram).is_err();
        let mut inner = shared.lock();
        if overflow {
            knx_log!(warn, "[{}] inbound queue full, telegram dropped", name);
            inner.stats.inbound_overflows += 1;
        } else {
            inner.stats.telegrams_received += 1;
        }
        true
    }

    fn on_tunnel_response(&mut self, response: TunnelResponse) -> bool {
        let shared = &self.shared;
        let mut inner = shared.lock();
        if inner.state != TunnelState::Connected || response.channel != inner.channel {
            return false;
        }
        // stale or repeated acks must not displace the one a sender waits on
        if inner.pending != Some(response.sequence) {
            knx_log!(trace, "[{}] ignoring ack for seq {}", shared.config.name, response.sequence);
            return true;
        }
        inner.pending = None;
        inner.ack = Some((response.sequence, response.status));
        shared.changed.notify_all();
        true
    }
}

/// Tunnel requests and acks travel to the data endpoint, everything else to
/// the control endpoint.
fn is_data_service(bytes: &[u8]) -> bool {
    let service = bytes
        .get(2..4)
        .map(|id| u16::from_be_bytes([id[0], id[1]]));
    matches!(
        service.and_then(ServiceType::from_u16),
        Some(ServiceType::TunnelRequest | ServiceType::TunnelResponse)
    )
}

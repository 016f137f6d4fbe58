//! Tunnel state machine tests against an in-memory gateway.
//!
//! Each test moves a `MockTransport` into the connection and plays the
//! gateway through its `MockHandle`.

use std::net::SocketAddrV4;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use knx_tunnel::addressing::{GroupAddress, IndividualAddress};
use knx_tunnel::dpt::{DatapointType, DatapointValue};
use knx_tunnel::net::{MockHandle, MockTransport};
use knx_tunnel::protocol::constants::{CemiMessageCode, E_NO_ERROR};
use knx_tunnel::protocol::services::{
    ChannelRequest, ChannelResponse, ConnectResponse, TunnelEndpoint, TunnelRequest,
    TunnelResponse,
};
use knx_tunnel::protocol::{CemiFrame, Frame, Hpai};
use knx_tunnel::{Telegram, TunnelConfig, TunnelConnection, TunnelFailure, TunnelState};

const WAIT: Duration = Duration::from_secs(2);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn gateway() -> SocketAddrV4 {
    "192.168.1.10:3671".parse().unwrap()
}

fn test_config() -> TunnelConfig {
    TunnelConfig::default()
        .with_name("lifecycle")
        .with_connect_timeout(Duration::from_secs(1))
        .with_ack_timeout(Duration::from_millis(500))
        .with_poll_interval(Duration::from_millis(10))
        .with_disconnect_timeout(Duration::from_millis(500))
}

fn accept(channel: u8) -> Frame {
    Frame::ConnectResponse(ConnectResponse::accepted(
        channel,
        TunnelEndpoint {
            data_endpoint: Hpai::from(gateway()),
            address: IndividualAddress::new(1, 1, 250).unwrap(),
        },
    ))
}

/// Connect on a helper thread, answering the connect request with `response`.
fn connect_with_response(
    config: TunnelConfig,
    response: &Frame,
) -> (Arc<TunnelConnection>, MockHandle, knx_tunnel::Result<()>) {
    init_logging();
    let tunnel = Arc::new(TunnelConnection::new(config));
    let mock = MockTransport::new();
    let handle = mock.handle();
    let connector = {
        let tunnel = Arc::clone(&tunnel);
        thread::spawn(move || tunnel.connect_with(mock, gateway()))
    };
    let (request, to) = handle.wait_frame(WAIT).expect("connect request");
    assert_eq!(request.service_type(), knx_tunnel::protocol::ServiceType::ConnectRequest);
    assert_eq!(to, gateway());
    handle.inject_frame(response, gateway());
    let result = connector.join().unwrap();
    (tunnel, handle, result)
}

fn connected(config: TunnelConfig, channel: u8) -> (Arc<TunnelConnection>, MockHandle) {
    let (tunnel, handle, result) = connect_with_response(config, &accept(channel));
    result.unwrap();
    (tunnel, handle)
}

fn wait_for_state(tunnel: &TunnelConnection, state: TunnelState) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if tunnel.state() == state {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn spawn_send(tunnel: &Arc<TunnelConnection>, telegram: Telegram) -> thread::JoinHandle<knx_tunnel::Result<()>> {
    let tunnel = Arc::clone(tunnel);
    thread::spawn(move || tunnel.send(&telegram))
}

fn switch_on() -> Telegram {
    Telegram::group_write(GroupAddress::from(0x0901), &DatapointValue::Bool(true)).unwrap()
}

#[test]
fn test_full_lifecycle() {
    let (tunnel, handle) = connected(test_config(), 5);
    assert_eq!(tunnel.state(), TunnelState::Connected);
    assert_eq!(tunnel.channel(), Some(5));

    let sender = spawn_send(&tunnel, switch_on());
    let (bytes, to) = handle.wait_sent(WAIT).expect("tunnel request");
    assert_eq!(to, gateway());
    assert_eq!(
        bytes,
        [
            0x06, 0x10, 0x04, 0x20, 0x00, 0x15, // header, 21 bytes
            0x04, 0x05, 0x00, 0x00, // connection header: channel 5, seq 0
            0x11, 0x00, // L_Data.req, no additional info
            0x94, 0xE0, 0x00, 0x00, 0x09, 0x01, 0x01, 0x00, 0x81, // GroupValueWrite(1) to 1/1/1
        ]
    );
    handle.inject_frame(&Frame::TunnelResponse(TunnelResponse::new(5, 0, E_NO_ERROR)), gateway());
    sender.join().unwrap().unwrap();

    let disconnector = {
        let tunnel = Arc::clone(&tunnel);
        thread::spawn(move || tunnel.disconnect())
    };
    let (request, _) = handle.wait_frame(WAIT).expect("disconnect request");
    assert_eq!(request, Frame::DisconnectRequest(ChannelRequest::new(5, Hpai::NAT)));
    handle.inject_frame(&Frame::DisconnectResponse(ChannelResponse::new(5, 0)), gateway());
    disconnector.join().unwrap();

    assert_eq!(tunnel.state(), TunnelState::Disconnected);
    assert_eq!(tunnel.last_failure(), None);
    // the worker closes its transport on the way out
    assert!(handle.is_closed());
}

#[test]
fn test_rejected_connection() {
    let (tunnel, handle, result) =
        connect_with_response(test_config(), &Frame::ConnectResponse(ConnectResponse::rejected(0, 0x23)));
    let err = result.unwrap_err();
    assert_eq!(err.rejected_status(), Some(0x23));
    assert_eq!(tunnel.state(), TunnelState::Disconnected);
    assert_eq!(tunnel.channel(), None);
    assert!(handle.is_closed());
}

#[test]
fn test_only_matching_ack_completes_send() {
    let (tunnel, handle) = connected(test_config(), 9);

    for expected in 0..3u8 {
        let sender = spawn_send(&tunnel, switch_on());
        let (frame, _) = handle.wait_frame(WAIT).unwrap();
        let Frame::TunnelRequest(request) = frame else {
            panic!("expected tunnel request, got {frame:?}");
        };
        assert_eq!(request.sequence, expected);
        // an ack for another sequence is not ours
        handle.inject_frame(&Frame::TunnelResponse(TunnelResponse::new(9, expected + 100, 0)), gateway());
        handle.inject_frame(&Frame::TunnelResponse(TunnelResponse::new(9, expected, 0)), gateway());
        sender.join().unwrap().unwrap();
    }
}

#[test]
fn test_inbound_telegrams() {
    let mut config = test_config();
    config.register_datapoint(GroupAddress::from(0x0A03), DatapointType::Float16);
    let (tunnel, handle) = connected(config, 4);

    let mut reading = Telegram::group_write(GroupAddress::from(0x0A03), &DatapointValue::Float16(20.5))
        .unwrap()
        .to_ldata();
    reading.source = IndividualAddress::new(1, 1, 5).unwrap();
    let confirmation = switch_on().to_ldata();

    handle.inject_frame(
        &Frame::TunnelRequest(TunnelRequest::new(4, 0, CemiFrame::new(CemiMessageCode::LDataCon, confirmation))),
        gateway(),
    );
    handle.inject_frame(
        &Frame::TunnelRequest(TunnelRequest::new(4, 1, CemiFrame::new(CemiMessageCode::LDataInd, reading))),
        gateway(),
    );

    for sequence in 0..2 {
        let (ack, _) = handle.wait_frame(WAIT).unwrap();
        assert_eq!(ack, Frame::TunnelResponse(TunnelResponse::new(4, sequence, 0)));
    }

    // confirmations are acknowledged but not delivered
    let telegram = tunnel.receive_timeout(WAIT).expect("indication");
    assert_eq!(telegram.source, IndividualAddress::new(1, 1, 5).unwrap());
    assert_eq!(telegram.group(), Some(GroupAddress::from(0x0A03)));
    match telegram.value {
        Some(DatapointValue::Float16(v)) => assert!((v - 20.5).abs() < 0.01),
        other => panic!("unexpected value {other:?}"),
    }
    assert!(tunnel.receive(false).is_none());
    assert_eq!(tunnel.stats().telegrams_received, 1);
}

#[test]
fn test_heartbeat_keeps_tunnel_up() {
    let config = test_config().with_heartbeat(Duration::from_millis(20), Duration::from_millis(200), 2);
    let (tunnel, handle) = connected(config, 2);

    for _ in 0..3 {
        let (frame, _) = handle.wait_frame(WAIT).unwrap();
        assert_eq!(frame, Frame::ConnectionStateRequest(ChannelRequest::new(2, Hpai::NAT)));
        handle.inject_frame(&Frame::ConnectionStateResponse(ChannelResponse::new(2, 0)), gateway());
    }
    assert_eq!(tunnel.state(), TunnelState::Connected);
}

#[test]
fn test_heartbeat_silence_drops_tunnel() {
    let config = test_config().with_heartbeat(Duration::from_millis(20), Duration::from_millis(30), 2);
    let (tunnel, handle) = connected(config, 2);

    for _ in 0..2 {
        let (frame, _) = handle.wait_frame(WAIT).unwrap();
        assert_eq!(frame, Frame::ConnectionStateRequest(ChannelRequest::new(2, Hpai::NAT)));
    }
    let (frame, _) = handle.wait_frame(WAIT).unwrap();
    assert_eq!(frame, Frame::DisconnectRequest(ChannelRequest::new(2, Hpai::NAT)));

    assert!(wait_for_state(&tunnel, TunnelState::Disconnected));
    assert_eq!(tunnel.last_failure(), Some(TunnelFailure::HeartbeatFailure));
    let err = tunnel.send(&switch_on()).unwrap_err();
    assert!(err.is_not_connected());
}

#[test]
fn test_disconnect_unblocks_sender() {
    let config = test_config().with_ack_timeout(Duration::from_secs(10));
    let (tunnel, handle) = connected(config, 3);

    let sender = spawn_send(&tunnel, switch_on());
    handle.wait_frame(WAIT).expect("tunnel request");

    let started = Instant::now();
    tunnel.disconnect();
    let err = sender.join().unwrap().unwrap_err();
    assert!(err.is_not_connected());
    // no disconnect response: gave up after disconnect_timeout, not ack_timeout
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(tunnel.state(), TunnelState::Disconnected);
}

#[test]
fn test_blocking_receive_ends_with_connection() {
    let (tunnel, handle) = connected(test_config(), 6);
    let receiver = {
        let tunnel = Arc::clone(&tunnel);
        thread::spawn(move || tunnel.receive(true))
    };
    handle.inject_frame(&Frame::DisconnectRequest(ChannelRequest::new(6, Hpai::NAT)), gateway());
    assert_eq!(receiver.join().unwrap(), None);
    assert_eq!(tunnel.last_failure(), Some(TunnelFailure::ClosedByGateway));
}

#[test]
fn test_reconnect_after_gateway_disconnect() {
    let (tunnel, handle) = connected(test_config(), 6);
    handle.inject_frame(&Frame::DisconnectRequest(ChannelRequest::new(6, Hpai::NAT)), gateway());
    assert!(wait_for_state(&tunnel, TunnelState::Disconnected));

    let mock = MockTransport::new();
    let second = mock.handle();
    let connector = {
        let tunnel = Arc::clone(&tunnel);
        thread::spawn(move || tunnel.connect_with(mock, gateway()))
    };
    second.wait_frame(WAIT).expect("connect request");
    second.inject_frame(&accept(8), gateway());
    connector.join().unwrap().unwrap();
    assert_eq!(tunnel.channel(), Some(8));
    assert_eq!(tunnel.last_failure(), None);

    // sequence numbering restarts with the new channel
    let sender = spawn_send(&tunnel, switch_on());
    let (frame, _) = second.wait_frame(WAIT).unwrap();
    assert!(matches!(frame, Frame::TunnelRequest(ref r) if r.channel == 8 && r.sequence == 0));
    second.inject_frame(&Frame::TunnelResponse(TunnelResponse::new(8, 0, 0)), gateway());
    sender.join().unwrap().unwrap();
}

#[test]
fn test_garbage_is_dropped() {
    let (tunnel, handle) = connected(test_config(), 1);
    handle.inject(&[0x06, 0x10, 0x04, 0x20, 0x00, 0xFF], gateway());
    handle.inject(&[0xDE, 0xAD], gateway());
    let deadline = Instant::now() + WAIT;
    while tunnel.stats().datagrams_dropped < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(tunnel.stats().datagrams_dropped, 2);
    assert_eq!(tunnel.state(), TunnelState::Connected);
}

#[test]
fn test_failed_transmission_times_out() {
    let (tunnel, handle) = connected(test_config().with_ack_timeout(Duration::from_millis(100)), 1);
    handle.fail_sends(true);
    let err = tunnel.send(&switch_on()).unwrap_err();
    assert!(err.is_ack_timeout());
    assert!(tunnel.stats().send_errors >= 1);
}

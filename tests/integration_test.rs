//! End-to-end tests over loopback UDP.
//!
//! A small in-process gateway answers on `127.0.0.1`, so these run without
//! hardware or an external simulator.

use std::net::{SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use knx_tunnel::addressing::{GroupAddress, IndividualAddress};
use knx_tunnel::dpt::{DatapointType, DatapointValue};
use knx_tunnel::protocol::constants::CemiMessageCode;
use knx_tunnel::protocol::services::{
    ChannelResponse, ConnectResponse, TunnelEndpoint, TunnelRequest, TunnelResponse,
};
use knx_tunnel::protocol::{CemiFrame, Frame, Hpai};
use knx_tunnel::{Telegram, TunnelConfig, TunnelConnection, TunnelState};

const CHANNEL: u8 = 17;
const TEST_TIMEOUT: Duration = Duration::from_secs(3);

/// What the gateway saw, reported when it shuts down.
#[derive(Debug, Default)]
struct GatewayLog {
    tunnel_requests: Vec<TunnelRequest>,
    acks: Vec<TunnelResponse>,
    heartbeats: usize,
    disconnected: bool,
}

fn v4(addr: SocketAddr) -> SocketAddrV4 {
    match addr {
        SocketAddr::V4(addr) => addr,
        SocketAddr::V6(addr) => panic!("unexpected IPv6 peer {addr}"),
    }
}

/// Serve one tunnel. Every acknowledged tunnel request is answered with an
/// `L_Data.ind` carrying 21.0 for group 2/0/1.
fn spawn_gateway() -> (SocketAddrV4, thread::JoinHandle<GatewayLog>) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind gateway");
    socket.set_read_timeout(Some(TEST_TIMEOUT)).unwrap();
    let addr = v4(socket.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let mut log = GatewayLog::default();
        let mut outgoing_sequence = 0u8;
        let mut buf = [0u8; 1024];
        while let Ok((len, peer)) = socket.recv_from(&mut buf) {
            let reply = |frame: &Frame| {
                socket.send_to(&frame.to_bytes().unwrap(), peer).unwrap();
            };
            match Frame::decode(&buf[..len]).expect("client sent a valid frame") {
                Frame::ConnectRequest(request) => {
                    assert!(request.control_endpoint.is_nat());
                    reply(&Frame::ConnectResponse(ConnectResponse::accepted(
                        CHANNEL,
                        TunnelEndpoint {
                            data_endpoint: Hpai::from(addr),
                            address: IndividualAddress::new(1, 1, 200).unwrap(),
                        },
                    )));
                }
                Frame::ConnectionStateRequest(request) => {
                    log.heartbeats += 1;
                    reply(&Frame::ConnectionStateResponse(ChannelResponse::new(request.channel, 0)));
                }
                Frame::TunnelRequest(request) => {
                    reply(&Frame::TunnelResponse(TunnelResponse::new(CHANNEL, request.sequence, 0)));
                    log.tunnel_requests.push(request);

                    let mut ldata = Telegram::group_write(GroupAddress::new(2, 0, 1).unwrap(), &DatapointValue::Float16(21.0))
                        .unwrap()
                        .to_ldata();
                    ldata.source = IndividualAddress::new(1, 1, 30).unwrap();
                    reply(&Frame::TunnelRequest(TunnelRequest::new(
                        CHANNEL,
                        outgoing_sequence,
                        CemiFrame::new(CemiMessageCode::LDataInd, ldata),
                    )));
                    outgoing_sequence = outgoing_sequence.wrapping_add(1);
                }
                Frame::TunnelResponse(ack) => log.acks.push(ack),
                Frame::DisconnectRequest(request) => {
                    reply(&Frame::DisconnectResponse(ChannelResponse::new(request.channel, 0)));
                    log.disconnected = true;
                    break;
                }
                other => panic!("unexpected frame {other:?}"),
            }
        }
        log
    });
    (addr, handle)
}

fn loopback_config() -> TunnelConfig {
    let mut config = TunnelConfig::default()
        .with_name("loopback")
        .with_local_bind("127.0.0.1:0".parse().unwrap())
        .with_connect_timeout(TEST_TIMEOUT)
        .with_ack_timeout(Duration::from_secs(1))
        .with_poll_interval(Duration::from_millis(10));
    config.register_datapoint(GroupAddress::new(2, 0, 1).unwrap(), DatapointType::Float16);
    config
}

#[test]
fn test_tunnel_over_udp() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (gateway, server) = spawn_gateway();

    let tunnel = TunnelConnection::new(loopback_config());
    tunnel.connect(gateway).expect("connect");
    assert_eq!(tunnel.state(), TunnelState::Connected);
    assert_eq!(tunnel.channel(), Some(CHANNEL));
    assert_eq!(tunnel.tunnel_address(), Some(IndividualAddress::new(1, 1, 200).unwrap()));

    let light = GroupAddress::new(1, 1, 1).unwrap();
    tunnel
        .send(&Telegram::group_write(light, &DatapointValue::Bool(true)).unwrap())
        .expect("first send");
    tunnel
        .send(&Telegram::group_read(light).unwrap())
        .expect("second send");

    let mut temperatures = Vec::new();
    while temperatures.len() < 2 {
        let telegram = tunnel.receive_timeout(TEST_TIMEOUT).expect("indication");
        assert_eq!(telegram.source, IndividualAddress::new(1, 1, 30).unwrap());
        match telegram.value {
            Some(DatapointValue::Float16(v)) => temperatures.push(v),
            other => panic!("unexpected value {other:?}"),
        }
    }
    assert!(temperatures.iter().all(|v| (v - 21.0).abs() < 0.01));

    tunnel.disconnect();
    assert_eq!(tunnel.state(), TunnelState::Disconnected);

    let log = server.join().unwrap();
    assert!(log.disconnected);
    let sequences: Vec<u8> = log.tunnel_requests.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, [0, 1]);
    assert!(log.tunnel_requests.iter().all(|r| r.channel == CHANNEL));
    assert_eq!(log.tunnel_requests[0].cemi.code, CemiMessageCode::LDataReq);
    let acked: Vec<u8> = log.acks.iter().map(|a| a.sequence).collect();
    assert_eq!(acked, [0, 1]);
}

#[test]
fn test_connect_timeout_without_gateway() {
    // Bound but silent: datagrams are swallowed.
    let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
    let gateway = v4(silent.local_addr().unwrap());

    let config = loopback_config().with_connect_timeout(Duration::from_millis(100));
    let tunnel = TunnelConnection::new(config);
    let err = tunnel.connect(gateway).unwrap_err();
    assert!(err.is_connect_timeout());
    assert_eq!(tunnel.state(), TunnelState::Disconnected);

    // the connect request did go out
    silent.set_read_timeout(Some(TEST_TIMEOUT)).unwrap();
    let mut buf = [0u8; 64];
    let (len, _) = silent.recv_from(&mut buf).unwrap();
    assert!(matches!(Frame::decode(&buf[..len]), Ok(Frame::ConnectRequest(_))));
}

#[test]
fn test_shared_between_threads() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (gateway, server) = spawn_gateway();

    let tunnel = std::sync::Arc::new(TunnelConnection::new(loopback_config()));
    tunnel.connect(gateway).unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    let senders: Vec<_> = (0..4u16)
        .map(|i| {
            let tunnel = std::sync::Arc::clone(&tunnel);
            let done = done_tx.clone();
            thread::spawn(move || {
                let telegram = Telegram::group_write(GroupAddress::from(0x0100 + i), &DatapointValue::U8(i as u8)).unwrap();
                done.send(tunnel.send(&telegram).is_ok()).unwrap();
            })
        })
        .collect();
    drop(done_tx);
    for sender in senders {
        sender.join().unwrap();
    }
    assert!(done_rx.iter().all(|ok| ok));

    drop(tunnel);
    let log = server.join().unwrap();
    let mut sequences: Vec<u8> = log.tunnel_requests.iter().map(|r| r.sequence).collect();
    sequences.sort_unstable();
    assert_eq!(sequences, [0, 1, 2, 3]);
    assert!(log.disconnected);
}

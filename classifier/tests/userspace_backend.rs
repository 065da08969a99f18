//! End-to-end runs of the classification pipeline through the userspace backend.

use std::{net::SocketAddr, sync::Arc};

use classifier::userspace::{
    UserspaceBackend,
    dispatch::{DispatchTable, ProtocolHandler},
};
use classifier_common::{
    ConnInfo, ConnTuple, InFlight, Outcome, PacketContext, ProtocolId, TelemetryCounter,
    handler::HandlerVerdict, tuple::normalized,
};

const ACK: u8 = 0x10;
const PSH_ACK: u8 = 0x18;
const FIN_ACK: u8 = 0x11;

const CLIENT: ([u8; 4], u16) = ([10, 1, 0, 7], 51514);
const SERVER: ([u8; 4], u16) = ([10, 1, 0, 1], 443);

fn eth(ether_type: u16) -> Vec<u8> {
    let mut frame = vec![0x02, 0, 0, 0, 0, 2, 0x02, 0, 0, 0, 0, 1];
    frame.extend_from_slice(&ether_type.to_be_bytes());
    frame
}

fn tcp_hdr(sport: u16, dport: u16, flags: u8) -> [u8; 20] {
    let mut hdr = [0u8; 20];
    hdr[0..2].copy_from_slice(&sport.to_be_bytes());
    hdr[2..4].copy_from_slice(&dport.to_be_bytes());
    hdr[4..8].copy_from_slice(&7u32.to_be_bytes());
    hdr[12] = 0x50;
    hdr[13] = flags;
    hdr[14..16].copy_from_slice(&65535u16.to_be_bytes());
    hdr
}

fn ipv4(src: ([u8; 4], u16), dst: ([u8; 4], u16), proto: u8, l4: &[u8]) -> Vec<u8> {
    let mut frame = eth(0x0800);
    frame.extend_from_slice(&[0x45, 0]);
    frame.extend_from_slice(&((20 + l4.len()) as u16).to_be_bytes());
    frame.extend_from_slice(&[0, 0, 0x40, 0, 64, proto, 0, 0]);
    frame.extend_from_slice(&src.0);
    frame.extend_from_slice(&dst.0);
    frame.extend_from_slice(l4);
    frame
}

fn tcp4(src: ([u8; 4], u16), dst: ([u8; 4], u16), flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut l4 = tcp_hdr(src.1, dst.1, flags).to_vec();
    l4.extend_from_slice(payload);
    ipv4(src, dst, 6, &l4)
}

fn tcp6(src: ([u8; 16], u16), dst: ([u8; 16], u16), flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = eth(0x86DD);
    frame.extend_from_slice(&[0x60, 0, 0, 0]);
    frame.extend_from_slice(&((20 + payload.len()) as u16).to_be_bytes());
    frame.extend_from_slice(&[6, 64]);
    frame.extend_from_slice(&src.0);
    frame.extend_from_slice(&dst.0);
    frame.extend_from_slice(&tcp_hdr(src.1, dst.1, flags));
    frame.extend_from_slice(payload);
    frame
}

fn udp4(src: ([u8; 4], u16), dst: ([u8; 4], u16), payload: &[u8]) -> Vec<u8> {
    let mut l4 = Vec::new();
    l4.extend_from_slice(&src.1.to_be_bytes());
    l4.extend_from_slice(&dst.1.to_be_bytes());
    l4.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    l4.extend_from_slice(&[0, 0]);
    l4.extend_from_slice(payload);
    ipv4(src, dst, 17, &l4)
}

fn hello(msg_type: u8) -> Vec<u8> {
    let body_len = 300usize;
    let mut rec = vec![0x16, 0x03, 0x01];
    rec.extend_from_slice(&((body_len + 4) as u16).to_be_bytes());
    rec.push(msg_type);
    rec.extend_from_slice(&(body_len as u32).to_be_bytes()[1..]);
    rec.extend_from_slice(&[0x03, 0x03]);
    rec.resize(5 + 4 + body_len, 0);
    rec
}

fn client_hello() -> Vec<u8> {
    hello(0x01)
}

fn server_hello() -> Vec<u8> {
    hello(0x02)
}

fn conn(client: ([u8; 4], u16), server: ([u8; 4], u16)) -> ConnTuple {
    let addr = |(ip, port): ([u8; 4], u16)| SocketAddr::from((ip, port));
    normalized(ConnTuple::tcp(addr(client), addr(server)))
}

fn backend(protocols: &[ProtocolId]) -> UserspaceBackend {
    UserspaceBackend::with_protocols(2, 1024, protocols)
}

#[test]
fn client_hello_is_dispatched_and_resolves_the_connection() {
    let backend = backend(&ProtocolId::KNOWN);
    let tup = conn(CLIENT, SERVER);

    let outcome = backend.process(&tcp4(CLIENT, SERVER, PSH_ACK, &client_hello()), 0);
    assert_eq!(outcome, Outcome::Dispatched(ProtocolId::Tls));
    assert_eq!(backend.in_flight().lookup(&tup), Some(ConnInfo::DONE));

    // Later traffic on the connection never reaches the fingerprint rules.
    let outcome = backend.process(&tcp4(SERVER, CLIENT, PSH_ACK, &server_hello()), 1);
    assert_eq!(outcome, Outcome::Resolved);
    assert_eq!(backend.telemetry(), Default::default());
}

#[test]
fn disabled_protocol_counts_a_failed_tail_call() {
    let backend = backend(&[ProtocolId::Tls]);
    let client = ([10, 1, 0, 7], 40100);
    let server = ([10, 1, 0, 1], 80);

    let request = tcp4(client, server, PSH_ACK, b"GET /index.html HTTP/1.1\r\nHost: a\r\n\r\n");
    assert_eq!(backend.process(&request, 1), Outcome::DispatchFailed(ProtocolId::Http));
    assert_eq!(backend.process(&request, 0), Outcome::DispatchFailed(ProtocolId::Http));

    let snapshot = backend.telemetry();
    assert_eq!(snapshot.get(TelemetryCounter::TailCallFailed), 2);
    assert_eq!(snapshot.get(TelemetryCounter::StagingFailed), 0);
    // Still pending: a later packet may be retried.
    assert_eq!(backend.in_flight().lookup(&conn(client, server)), None);
}

#[test]
fn fin_evicts_a_resolved_connection() {
    let backend = backend(&ProtocolId::KNOWN);
    let tup = conn(CLIENT, SERVER);

    backend.process(&tcp4(CLIENT, SERVER, PSH_ACK, &client_hello()), 0);
    assert!(backend.in_flight().lookup(&tup).is_some());

    let outcome = backend.process(&tcp4(SERVER, CLIENT, FIN_ACK, &[]), 0);
    assert_eq!(outcome, Outcome::Evicted);
    assert_eq!(backend.in_flight().lookup(&tup), None);
    assert!(backend.in_flight().is_empty());

    // A reused tuple is classified from scratch.
    let outcome = backend.process(&tcp4(CLIENT, SERVER, PSH_ACK, &client_hello()), 1);
    assert_eq!(outcome, Outcome::Dispatched(ProtocolId::Tls));
}

#[test]
fn both_directions_share_one_entry() {
    let backend = backend(&ProtocolId::KNOWN);
    let client = ([192, 168, 4, 20], 33000);
    let server = ([192, 168, 4, 2], 8080);

    let response = tcp4(server, client, PSH_ACK, b"HTTP/1.1 200 OK\r\n\r\n");
    assert_eq!(backend.process(&response, 0), Outcome::Dispatched(ProtocolId::Http));

    let request = tcp4(client, server, PSH_ACK, b"POST /submit HTTP/1.1\r\n\r\n");
    assert_eq!(backend.process(&request, 1), Outcome::Resolved);
    assert_eq!(backend.in_flight().len(), 1);
}

#[test]
fn ipv6_connections_are_classified() {
    let backend = backend(&ProtocolId::KNOWN);
    let mut client = [0u8; 16];
    client[0] = 0xfd;
    client[15] = 7;
    let mut server = [0u8; 16];
    server[0] = 0xfd;
    server[15] = 1;

    let frame = tcp6((client, 50000), (server, 443), PSH_ACK, &client_hello());
    assert_eq!(backend.process(&frame, 0), Outcome::Dispatched(ProtocolId::Tls));

    let tup = normalized(ConnTuple::tcp(
        SocketAddr::from((server, 443)),
        SocketAddr::from((client, 50000)),
    ));
    assert!(tup.is_ipv6());
    assert_eq!(backend.in_flight().lookup(&tup), Some(ConnInfo::DONE));
}

#[test]
fn each_cpu_stages_into_its_own_slot() {
    let backend = backend(&ProtocolId::KNOWN);
    let a = (([10, 0, 0, 1], 1111), ([10, 0, 0, 2], 443));
    let b = (([10, 0, 0, 3], 2222), ([10, 0, 0, 4], 80));

    backend.process(&tcp4(a.0, a.1, PSH_ACK, &client_hello()), 0);
    backend.process(&tcp4(b.0, b.1, PSH_ACK, b"HEAD / HTTP/1.0\r\n\r\n"), 1);

    let slot0: PacketContext = backend.staging().read(0).unwrap();
    let slot1: PacketContext = backend.staging().read(1).unwrap();
    assert_eq!((slot0.cpu, slot0.protocol), (0, ProtocolId::Tls as u8));
    assert_eq!((slot1.cpu, slot1.protocol), (1, ProtocolId::Http as u8));
    assert_eq!(slot0.tup, conn(a.0, a.1));
    assert_eq!(slot1.tup, conn(b.0, b.1));
}

#[test]
fn concurrent_cpus_never_see_each_others_slot() {
    const FRAMES: u16 = 2000;
    let backend = UserspaceBackend::with_protocols(2, 8192, &ProtocolId::KNOWN);

    std::thread::scope(|s| {
        for cpu in 0..2u32 {
            let backend = &backend;
            s.spawn(move || {
                let (server, payload, protocol) = if cpu == 0 {
                    (([10, 2, 0, 1], 443), client_hello(), ProtocolId::Tls)
                } else {
                    (
                        ([10, 3, 0, 1], 80),
                        b"GET / HTTP/1.1\r\nHost: b\r\n\r\n".to_vec(),
                        ProtocolId::Http,
                    )
                };
                for i in 0..FRAMES {
                    let client = ([10, 4, cpu as u8, 7], 20000 + i);
                    let frame = tcp4(client, server, PSH_ACK, &payload);
                    assert_eq!(backend.process(&frame, cpu), Outcome::Dispatched(protocol));

                    let slot = backend.staging().read(cpu).unwrap();
                    assert_eq!(slot.cpu, cpu);
                    assert_eq!(slot.protocol, protocol as u8);
                    assert_eq!(slot.tup, conn(client, server));
                }
            });
        }
    });

    let snapshot = backend.telemetry();
    assert_eq!(snapshot.get(TelemetryCounter::TailCallFailed), 0);
    assert_eq!(snapshot.get(TelemetryCounter::StagingFailed), 0);
    assert_eq!(backend.in_flight().len(), 2 * FRAMES as usize);
}

#[test]
fn cpu_without_a_slot_fails_staging() {
    let backend = backend(&ProtocolId::KNOWN);
    let outcome = backend.process(&tcp4(CLIENT, SERVER, PSH_ACK, &client_hello()), 9);
    assert_eq!(outcome, Outcome::StagingFailed(ProtocolId::Tls));
    assert_eq!(backend.in_flight().lookup(&conn(CLIENT, SERVER)), None);
}

#[test]
fn full_table_drops_new_connections() {
    let backend = UserspaceBackend::with_protocols(1, 1, &ProtocolId::KNOWN);
    let first = (([10, 9, 0, 1], 1000), ([10, 9, 0, 2], 443));
    let second = (([10, 9, 0, 3], 1001), ([10, 9, 0, 2], 443));

    backend.process(&tcp4(first.0, first.1, PSH_ACK, &client_hello()), 0);
    let outcome = backend.process(&tcp4(second.0, second.1, PSH_ACK, &client_hello()), 0);

    // The handler still ran; only the insert was dropped.
    assert_eq!(outcome, Outcome::Dispatched(ProtocolId::Tls));
    assert_eq!(backend.in_flight().len(), 1);
    assert_eq!(backend.in_flight().lookup(&conn(second.0, second.1)), None);
    assert_eq!(
        backend.in_flight().lookup(&conn(first.0, first.1)),
        Some(ConnInfo::DONE)
    );
}

struct Refuse;

impl ProtocolHandler for Refuse {
    fn protocol(&self) -> ProtocolId {
        ProtocolId::Http
    }

    fn handle(&self, _staged: &PacketContext, _frame: &[u8]) -> HandlerVerdict {
        HandlerVerdict::Rejected
    }
}

#[test]
fn rejected_connection_is_never_fingerprinted_again() {
    let table = DispatchTable::builder().register(Arc::new(Refuse)).build();
    let backend = UserspaceBackend::new(1, 16, table);
    let client = ([172, 16, 0, 5], 45000);
    let server = ([172, 16, 0, 6], 8000);

    let request = tcp4(client, server, PSH_ACK, b"GET / HTTP/1.1\r\n\r\n");
    assert_eq!(backend.process(&request, 0), Outcome::Dispatched(ProtocolId::Http));
    assert_eq!(
        backend.in_flight().lookup(&conn(client, server)),
        Some(ConnInfo::FAILED)
    );
    assert_eq!(backend.process(&request, 0), Outcome::Resolved);
}

#[test]
fn uninteresting_traffic_is_left_alone() {
    let backend = backend(&ProtocolId::KNOWN);

    let dns = udp4(CLIENT, ([10, 1, 0, 53], 53), b"\x12\x34\x01\x00");
    assert_eq!(backend.process(&dns, 0), Outcome::Ignored);

    let mut arp = eth(0x0806);
    arp.extend_from_slice(&[0u8; 28]);
    assert_eq!(backend.process(&arp, 0), Outcome::Ignored);

    assert_eq!(backend.process(&tcp4(CLIENT, SERVER, ACK, &[]), 0), Outcome::Unclassified);
    let ssh = tcp4(CLIENT, ([10, 1, 0, 1], 22), PSH_ACK, b"SSH-2.0-OpenSSH_9.6\r\n");
    assert_eq!(backend.process(&ssh, 0), Outcome::Unclassified);

    assert!(backend.in_flight().is_empty());
    assert_eq!(backend.staging().read(0), None);
}

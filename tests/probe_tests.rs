use echoping::error::TransportError;
use echoping::packet::{self, EchoId, IcmpMessage};
use echoping::ping::{report, ProbeCycle, ReplyOutcome, RunConfig, RunStats};
use echoping::socket::{Datagram, SocketFamily, Transport};
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

/// Answers every request with the matching echo reply behind an IPv4 header.
struct Loopback {
    pending: VecDeque<Datagram>,
}

fn ipv4_wrap(icmp: &[u8]) -> Vec<u8> {
    let total = (20 + icmp.len()) as u16;
    let mut bytes = vec![0x45, 0];
    bytes.extend_from_slice(&total.to_be_bytes());
    bytes.extend_from_slice(&[0, 0, 0x40, 0, 61, 1, 0, 0]);
    bytes.extend_from_slice(&[127, 0, 0, 1, 127, 0, 0, 1]);
    bytes.extend_from_slice(icmp);
    bytes
}

fn as_reply(request: &[u8]) -> Vec<u8> {
    let mut reply = request.to_vec();
    reply[0] = 0;
    reply[2] = 0;
    reply[3] = 0;
    let checksum = ones_complement(&reply);
    reply[2..4].copy_from_slice(&checksum.to_be_bytes());
    reply
}

fn ones_complement(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    for chunk in data.chunks(2) {
        let word = match chunk {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [hi] => u16::from_be_bytes([*hi, 0]),
            _ => 0,
        };
        sum += u32::from(word);
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

impl Transport for Loopback {
    fn family(&self) -> SocketFamily {
        SocketFamily::Ipv4
    }

    fn send_to(&mut self, _dst: IpAddr, _ttl: u8, request: &[u8]) -> Result<Instant, TransportError> {
        self.pending.push_back(Datagram {
            bytes: ipv4_wrap(&as_reply(request)),
            source: None,
        });
        Ok(Instant::now())
    }

    fn recv_until(&mut self, _deadline: Instant) -> Result<Datagram, TransportError> {
        self.pending.pop_front().ok_or(TransportError::Timeout)
    }
}

#[test]
fn encoded_request_checksum_is_valid() {
    let id = EchoId {
        identifier: 77,
        sequence: 1,
    };
    let request = packet::encode(SocketFamily::Ipv4, id, &packet::build_payload(8));
    assert_eq!(request.len(), 16);
    assert_eq!(ones_complement(&request), 0);
}

#[test]
fn synthetic_reply_decodes_as_echo_reply() {
    let id = EchoId {
        identifier: 77,
        sequence: 9,
    };
    let request = packet::encode(SocketFamily::Ipv4, id, &packet::build_payload(8));
    let decoded = packet::decode(&ipv4_wrap(&as_reply(&request)), SocketFamily::Ipv4).unwrap();
    assert_eq!(
        decoded,
        IcmpMessage::EchoReply {
            id,
            size: 16,
            ttl: Some(61),
            source: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        }
    );
}

#[test]
fn probe_cycle_over_loopback() {
    let mut transport = Loopback {
        pending: VecDeque::new(),
    };
    let stats = RunStats::new();
    let config = RunConfig::new("127.0.0.1");
    let mut cycle = ProbeCycle::new(
        &mut transport,
        &stats,
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        &config,
        0x0abc,
    );
    for sequence in 1..=3 {
        let event = cycle.run(sequence);
        match event.outcome {
            ReplyOutcome::EchoReply { size, rtt, ttl, .. } => {
                assert_eq!(size, 16);
                assert!(rtt >= Duration::ZERO);
                assert_eq!(ttl, Some(61));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.sent, 3);
    assert_eq!(snapshot.received, 3);
    let summary = report("127.0.0.1", &snapshot);
    assert!(summary.starts_with("--- 127.0.0.1 ping results ---\n3 packets transmitted, 3 received, 0.00% packet loss"));
    assert_eq!(summary, report("127.0.0.1", &snapshot));
}

#[test]
fn unresolvable_host_fails() {
    assert!(echoping::resolve("no-such-host.invalid").is_err());
}

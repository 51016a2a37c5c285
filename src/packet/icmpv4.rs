use super::{echo_id, malformed, EchoId, IcmpMessage, Quote};
use crate::error::TransportError;
use crate::socket::SocketFamily;
use pnet_packet::icmp::echo_reply::EchoReplyPacket;
use pnet_packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet_packet::icmp::{IcmpCode, IcmpPacket, IcmpTypes};
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::Packet;
use std::net::IpAddr;

pub const IPV4_HEADER_LEN: usize = 20;
pub const ICMPV4_HEADER_LEN: usize = 8;

pub(super) fn build_echo_request(id: EchoId, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0; ICMPV4_HEADER_LEN + payload.len()];
    {
        let mut icmp_packet = MutableEchoRequestPacket::new(&mut buf[..])
            .expect("buffer holds at least an echo header");
        icmp_packet.set_icmp_type(IcmpTypes::EchoRequest);
        icmp_packet.set_icmp_code(IcmpCode::new(0));
        icmp_packet.set_identifier(id.identifier);
        icmp_packet.set_sequence_number(id.sequence);
        icmp_packet.set_payload(payload);
        let icmp_checksum = pnet_packet::util::checksum(icmp_packet.packet(), 1);
        icmp_packet.set_checksum(icmp_checksum);
    }
    buf
}

/// Raw sockets hand over the IP header, ping sockets do not. No ICMP type
/// has 4 in its high nibble, so the version field tells them apart.
fn has_ip_header(bytes: &[u8]) -> bool {
    bytes.len() >= IPV4_HEADER_LEN && bytes[0] >> 4 == 4
}

pub(super) fn parse(bytes: &[u8]) -> Result<IcmpMessage, TransportError> {
    let (icmp_bytes, ttl, source) = if has_ip_header(bytes) {
        let packet = Ipv4Packet::new(bytes).ok_or_else(|| malformed("truncated IPv4 header"))?;
        if packet.get_next_level_protocol().0 != SocketFamily::Ipv4.icmp_protocol() {
            return Err(malformed(format!(
                "unexpected IPv4 protocol {}",
                packet.get_next_level_protocol().0
            )));
        }
        let header_len = usize::from(packet.get_header_length()) * 4;
        if header_len < IPV4_HEADER_LEN || header_len > bytes.len() {
            return Err(malformed(format!("bad IPv4 header length {}", header_len)));
        }
        (
            &bytes[header_len..],
            Some(packet.get_ttl()),
            Some(IpAddr::V4(packet.get_source())),
        )
    } else {
        (bytes, None, None)
    };

    let icmp = IcmpPacket::new(icmp_bytes).ok_or_else(|| malformed("truncated ICMP header"))?;
    match icmp.get_icmp_type() {
        IcmpTypes::EchoReply => {
            let reply = EchoReplyPacket::new(icmp_bytes)
                .ok_or_else(|| malformed("truncated echo reply"))?;
            Ok(IcmpMessage::EchoReply {
                id: EchoId {
                    identifier: reply.get_identifier(),
                    sequence: reply.get_sequence_number(),
                },
                size: icmp_bytes.len(),
                ttl,
                source,
            })
        }
        IcmpTypes::EchoRequest => {
            let id = echo_id(icmp_bytes).ok_or_else(|| malformed("truncated echo request"))?;
            Ok(IcmpMessage::EchoRequest { id })
        }
        IcmpTypes::TimeExceeded => Ok(IcmpMessage::TimeExceeded {
            original: quoted_echo(icmp_bytes),
            source,
        }),
        other => Ok(IcmpMessage::Other {
            icmp_type: other.0,
            original: quoted_echo(icmp_bytes),
            source,
        }),
    }
}

/// Classifies the datagram quoted in an ICMP error message.
fn quoted_echo(icmp_bytes: &[u8]) -> Quote {
    let quoted = match icmp_bytes.get(ICMPV4_HEADER_LEN..) {
        Some(quoted) if quoted.len() >= IPV4_HEADER_LEN && quoted[0] >> 4 == 4 => quoted,
        _ => return Quote::Unreadable,
    };
    if quoted[9] != SocketFamily::Ipv4.icmp_protocol() {
        return Quote::Foreign;
    }
    let header_len = usize::from(quoted[0] & 0x0f) * 4;
    let inner = match quoted.get(header_len..) {
        Some(inner) if header_len >= IPV4_HEADER_LEN && !inner.is_empty() => inner,
        _ => return Quote::Unreadable,
    };
    if inner[0] != IcmpTypes::EchoRequest.0 {
        return Quote::Foreign;
    }
    echo_id(inner).map_or(Quote::Unreadable, Quote::Echo)
}

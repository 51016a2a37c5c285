use super::{echo_id, malformed, EchoId, IcmpMessage, Quote};
use crate::error::TransportError;
use crate::socket::SocketFamily;
use pnet_packet::icmpv6::{Icmpv6Code, Icmpv6Packet, Icmpv6Types, MutableIcmpv6Packet};
use pnet_packet::MutablePacket;

pub const ICMPV6_HEADER_LEN: usize = 8;
const IPV6_HEADER_LEN: usize = 40;

pub(super) fn build_echo_request(id: EchoId, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0; ICMPV6_HEADER_LEN + payload.len()];
    {
        let mut icmp_packet = MutableIcmpv6Packet::new(&mut buf[..])
            .expect("buffer holds at least an echo header");
        icmp_packet.set_icmpv6_type(Icmpv6Types::EchoRequest);
        icmp_packet.set_icmpv6_code(Icmpv6Code::new(0));
        let body = icmp_packet.payload_mut();
        body[0..2].copy_from_slice(&id.identifier.to_be_bytes());
        body[2..4].copy_from_slice(&id.sequence.to_be_bytes());
        body[4..].copy_from_slice(payload);
    }
    buf
}

/// ICMPv6 sockets never deliver the IPv6 header.
pub(super) fn parse(bytes: &[u8]) -> Result<IcmpMessage, TransportError> {
    let icmp = Icmpv6Packet::new(bytes).ok_or_else(|| malformed("truncated ICMPv6 header"))?;
    match icmp.get_icmpv6_type() {
        Icmpv6Types::EchoReply => {
            let id = echo_id(bytes).ok_or_else(|| malformed("truncated echo reply"))?;
            Ok(IcmpMessage::EchoReply {
                id,
                size: bytes.len(),
                ttl: None,
                source: None,
            })
        }
        Icmpv6Types::EchoRequest => {
            let id = echo_id(bytes).ok_or_else(|| malformed("truncated echo request"))?;
            Ok(IcmpMessage::EchoRequest { id })
        }
        Icmpv6Types::TimeExceeded => Ok(IcmpMessage::TimeExceeded {
            original: quoted_echo(bytes),
            source: None,
        }),
        other => Ok(IcmpMessage::Other {
            icmp_type: other.0,
            original: quoted_echo(bytes),
            source: None,
        }),
    }
}

/// Extension headers in the quoted datagram are not walked.
fn quoted_echo(bytes: &[u8]) -> Quote {
    let quoted = match bytes.get(ICMPV6_HEADER_LEN..) {
        Some(quoted) if quoted.len() > IPV6_HEADER_LEN && quoted[0] >> 4 == 6 => quoted,
        _ => return Quote::Unreadable,
    };
    if quoted[6] != SocketFamily::Ipv6.icmp_protocol() {
        return Quote::Foreign;
    }
    let inner = &quoted[IPV6_HEADER_LEN..];
    if inner[0] != Icmpv6Types::EchoRequest.0 {
        return Quote::Foreign;
    }
    echo_id(inner).map_or(Quote::Unreadable, Quote::Echo)
}

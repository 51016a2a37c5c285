//! ICMP echo encoding and reply parsing for both address families.

mod icmpv4;
mod icmpv6;

use crate::error::TransportError;
use crate::socket::SocketFamily;
use std::net::IpAddr;

pub use icmpv4::{ICMPV4_HEADER_LEN, IPV4_HEADER_LEN};
pub use icmpv6::ICMPV6_HEADER_LEN;

/// Byte the echo payload is filled with.
pub const PAYLOAD_FILL: u8 = b'a';

/// Identifier/sequence pair of an echo message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EchoId {
    pub identifier: u16,
    pub sequence: u16,
}

/// What an ICMP error message quotes of the datagram that triggered it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quote {
    /// Too short or mangled to tell what was quoted
    Unreadable,
    /// A readable datagram that is not an echo request (UDP, TCP, other ICMP)
    Foreign,
    Echo(EchoId),
}

/// A parsed ICMP message, as far as probing cares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IcmpMessage {
    EchoReply {
        id: EchoId,
        /// Length of the ICMP message (header and payload)
        size: usize,
        /// TTL of the carrying IP packet, when the header was delivered
        ttl: Option<u8>,
        source: Option<IpAddr>,
    },
    /// An echo request, usually our own probe looped back on a local target.
    EchoRequest { id: EchoId },
    TimeExceeded {
        /// Echo header quoted from the expired datagram
        original: Quote,
        source: Option<IpAddr>,
    },
    /// Any other error or informational message.
    Other {
        icmp_type: u8,
        original: Quote,
        source: Option<IpAddr>,
    },
}

impl IcmpMessage {
    /// Decides whether this message answers the probe `expected`.
    ///
    /// With `match_identifier` unset only the sequence is compared, for
    /// sockets where the kernel owns the identifier. A Time Exceeded whose
    /// quoted datagram is unreadable is accepted; anything quoting a foreign
    /// datagram is not, and other message types must quote the probe.
    pub fn answers(&self, expected: EchoId, match_identifier: bool) -> bool {
        let matches = |id: &EchoId| {
            id.sequence == expected.sequence
                && (!match_identifier || id.identifier == expected.identifier)
        };
        match self {
            IcmpMessage::EchoReply { id, .. } => matches(id),
            IcmpMessage::EchoRequest { .. } => false,
            IcmpMessage::TimeExceeded { original, .. } => match original {
                Quote::Unreadable => true,
                Quote::Foreign => false,
                Quote::Echo(id) => matches(id),
            },
            IcmpMessage::Other { original, .. } => match original {
                Quote::Echo(id) => matches(id),
                Quote::Unreadable | Quote::Foreign => false,
            },
        }
    }

    pub fn source(&self) -> Option<IpAddr> {
        match self {
            IcmpMessage::EchoReply { source, .. }
            | IcmpMessage::TimeExceeded { source, .. }
            | IcmpMessage::Other { source, .. } => *source,
            IcmpMessage::EchoRequest { .. } => None,
        }
    }
}

/// Payload of `size` bytes filled with [`PAYLOAD_FILL`].
pub fn build_payload(size: usize) -> Vec<u8> {
    vec![PAYLOAD_FILL; size]
}

/// Encodes an Echo Request for `family`.
///
/// The ICMPv4 checksum is filled in here. The ICMPv6 checksum covers a
/// pseudo-header with the source address, so it is left for the kernel.
pub fn encode(family: SocketFamily, id: EchoId, payload: &[u8]) -> Vec<u8> {
    match family {
        SocketFamily::Ipv4 => icmpv4::build_echo_request(id, payload),
        SocketFamily::Ipv6 => icmpv6::build_echo_request(id, payload),
    }
}

/// Parses a datagram received on a `family` socket.
///
/// IPv4 datagrams may arrive with or without their IP header depending on
/// the socket type; both forms are accepted.
pub fn decode(bytes: &[u8], family: SocketFamily) -> Result<IcmpMessage, TransportError> {
    match family {
        SocketFamily::Ipv4 => icmpv4::parse(bytes),
        SocketFamily::Ipv6 => icmpv6::parse(bytes),
    }
}

fn malformed(reason: impl Into<String>) -> TransportError {
    TransportError::Malformed(reason.into())
}

fn echo_id(header: &[u8]) -> Option<EchoId> {
    if header.len() < 8 {
        return None;
    }
    Some(EchoId {
        identifier: u16::from_be_bytes([header[4], header[5]]),
        sequence: u16::from_be_bytes([header[6], header[7]]),
    })
}

pub mod icmp;

use crate::error::TransportError;
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// IP protocol number of ICMP.
pub const IPPROTO_ICMP: u8 = 1;
/// IP protocol number of ICMPv6.
pub const IPPROTO_ICMPV6: u8 = 58;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketFamily {
    Ipv4,
    Ipv6,
}

impl SocketFamily {
    pub fn from_ip(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => SocketFamily::Ipv4,
            IpAddr::V6(_) => SocketFamily::Ipv6,
        }
    }

    /// Protocol number the ICMP flavour of this family is carried under.
    pub fn icmp_protocol(&self) -> u8 {
        match self {
            SocketFamily::Ipv4 => IPPROTO_ICMP,
            SocketFamily::Ipv6 => IPPROTO_ICMPV6,
        }
    }

    pub fn to_domain(&self) -> socket2::Domain {
        match self {
            SocketFamily::Ipv4 => socket2::Domain::IPV4,
            SocketFamily::Ipv6 => socket2::Domain::IPV6,
        }
    }

    pub fn to_protocol(&self) -> socket2::Protocol {
        match self {
            SocketFamily::Ipv4 => socket2::Protocol::ICMPV4,
            SocketFamily::Ipv6 => socket2::Protocol::ICMPV6,
        }
    }
}

/// One datagram read off the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub bytes: Vec<u8>,
    /// Sender as reported by the socket, if any
    pub source: Option<IpAddr>,
}

/// Result of one request/response exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub datagram: Datagram,
    /// Taken immediately before the request was written
    pub sent_at: Instant,
    pub rtt: Duration,
}

/// Send/receive primitive the probe cycle runs over.
///
/// One implementation owns a real ICMP socket; tests plug in scripted ones.
pub trait Transport {
    fn family(&self) -> SocketFamily;

    /// Whether the kernel replaces the echo identifier on the wire.
    fn rewrites_identifier(&self) -> bool {
        false
    }

    /// Applies `ttl` and writes `request` to `dst`. Returns the instant taken
    /// right before the write.
    fn send_to(&mut self, dst: IpAddr, ttl: u8, request: &[u8]) -> Result<Instant, TransportError>;

    /// Blocks for a single datagram until `deadline`.
    fn recv_until(&mut self, deadline: Instant) -> Result<Datagram, TransportError>;

    /// Sends one request and waits up to `timeout` for the first datagram.
    fn exchange(
        &mut self,
        dst: IpAddr,
        ttl: u8,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Exchange, TransportError> {
        let sent_at = self.send_to(dst, ttl, request)?;
        let datagram = self.recv_until(sent_at + timeout)?;
        Ok(Exchange {
            datagram,
            sent_at,
            rtt: sent_at.elapsed(),
        })
    }
}

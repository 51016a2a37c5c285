use super::{Datagram, SocketFamily, Transport};
use crate::error::TransportError;
use socket2::{SockAddr, Socket, Type};
use std::io;
use std::mem::MaybeUninit;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

/// Large enough for any reply to a maximum-size probe.
const RECV_BUF_LEN: usize = 65536;

/// Read timeouts are applied in whole microseconds and a zero timeout
/// means no timeout at all.
const MIN_READ_TIMEOUT: Duration = Duration::from_micros(1);

/// Read timeout left until `deadline`, or `None` once it is too close to
/// express.
fn read_timeout(deadline: Instant, now: Instant) -> Option<Duration> {
    let remaining = deadline.saturating_duration_since(now);
    (remaining >= MIN_READ_TIMEOUT).then_some(remaining)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpSocketType {
    Dgram,
    Raw,
}

impl IcmpSocketType {
    fn to_sock_type(&self) -> Type {
        match self {
            IcmpSocketType::Dgram => Type::DGRAM,
            IcmpSocketType::Raw => Type::RAW,
        }
    }

    fn fallback(&self) -> IcmpSocketType {
        match self {
            IcmpSocketType::Dgram => IcmpSocketType::Raw,
            IcmpSocketType::Raw => IcmpSocketType::Dgram,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IcmpConfig {
    pub family: SocketFamily,
    pub sock_type_hint: IcmpSocketType,
}

impl IcmpConfig {
    pub fn new(family: SocketFamily) -> Self {
        Self {
            family,
            sock_type_hint: IcmpSocketType::Raw,
        }
    }
}

/// Blocking ICMP socket used for the whole run.
///
/// Opened once, reused by every probe cycle and closed when dropped.
#[derive(Debug)]
pub struct IcmpSocket {
    inner: Socket,
    family: SocketFamily,
    sock_type: IcmpSocketType,
}

impl IcmpSocket {
    /// Opens a socket of the hinted type, retrying with the other type if the
    /// first one is refused (raw sockets need privileges, ping sockets need
    /// `net.ipv4.ping_group_range`). Ping sockets only report ICMP errors
    /// through the error queue, which is not read, so Time Exceeded is never
    /// received on them.
    pub fn open(config: &IcmpConfig) -> io::Result<Self> {
        let domain = config.family.to_domain();
        let proto = Some(config.family.to_protocol());
        let hint = config.sock_type_hint;
        let (inner, sock_type) = match Socket::new(domain, hint.to_sock_type(), proto) {
            Ok(sock) => (sock, hint),
            Err(e) => {
                let fallback = hint.fallback();
                log::debug!("{:?} ICMP socket unavailable ({}), trying {:?}", hint, e, fallback);
                let sock = Socket::new(domain, fallback.to_sock_type(), proto).map_err(|_| e)?;
                (sock, fallback)
            }
        };
        Ok(Self {
            inner,
            family: config.family,
            sock_type,
        })
    }

    pub fn sock_type(&self) -> IcmpSocketType {
        self.sock_type
    }

    fn set_hop_limit(&self, ttl: u8) -> io::Result<()> {
        match self.family {
            SocketFamily::Ipv4 => self.inner.set_ttl(u32::from(ttl)),
            SocketFamily::Ipv6 => self.inner.set_unicast_hops_v6(u32::from(ttl)),
        }
    }
}

impl Transport for IcmpSocket {
    fn family(&self) -> SocketFamily {
        self.family
    }

    fn rewrites_identifier(&self) -> bool {
        self.sock_type == IcmpSocketType::Dgram
    }

    fn send_to(&mut self, dst: IpAddr, ttl: u8, request: &[u8]) -> Result<Instant, TransportError> {
        self.set_hop_limit(ttl)?;
        let addr = SockAddr::from(SocketAddr::new(dst, 0));
        let sent_at = Instant::now();
        let written = self.inner.send_to(request, &addr)?;
        if written != request.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: request.len(),
            });
        }
        Ok(sent_at)
    }

    fn recv_until(&mut self, deadline: Instant) -> Result<Datagram, TransportError> {
        let mut buf = vec![MaybeUninit::<u8>::uninit(); RECV_BUF_LEN];
        loop {
            let remaining =
                read_timeout(deadline, Instant::now()).ok_or(TransportError::Timeout)?;
            self.inner.set_read_timeout(Some(remaining))?;
            match self.inner.recv_from(&mut buf) {
                Ok((len, addr)) => {
                    // SAFETY: recv_from initialised the first `len` bytes.
                    let bytes = buf[..len]
                        .iter()
                        .map(|b| unsafe { b.assume_init_read() })
                        .collect();
                    return Ok(Datagram {
                        bytes,
                        source: addr.as_socket().map(|a| a.ip()),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    return Err(TransportError::Timeout)
                }
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
    }
}

use crate::error::ResolveError;
use crate::socket::SocketFamily;
use std::net::IpAddr;

/// Host to probe, resolved once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    /// Host name or address literal as given
    pub host: String,
    /// Resolved address
    pub addr: IpAddr,
}

impl Target {
    pub fn family(&self) -> SocketFamily {
        SocketFamily::from_ip(&self.addr)
    }
    /// Reverse lookup of the resolved address, falling back to the address text.
    pub fn reverse_name(&self) -> String {
        dns_lookup::lookup_addr(&self.addr).unwrap_or_else(|_| self.addr.to_string())
    }
}

/// Resolves `host` to a single address.
///
/// Address literals are taken as is. Names go through the system resolver and
/// the first IPv4 answer is preferred, then the first IPv6 answer.
pub fn resolve(host: &str) -> Result<Target, ResolveError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(ResolveError::Empty);
    }
    if let Some(addr) = parse_literal(host) {
        return Ok(Target {
            host: host.to_string(),
            addr,
        });
    }
    let addrs = dns_lookup::lookup_host(host).map_err(|source| ResolveError::Lookup {
        host: host.to_string(),
        source,
    })?;
    log::debug!("{} resolved to {:?}", host, addrs);
    let addr = pick_address(&addrs).ok_or_else(|| ResolveError::NotFound(host.to_string()))?;
    Ok(Target {
        host: host.to_string(),
        addr,
    })
}

fn parse_literal(host: &str) -> Option<IpAddr> {
    // Accept `[::1]` style literals.
    let unbracketed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    unbracketed.parse().ok()
}

fn pick_address(addrs: &[IpAddr]) -> Option<IpAddr> {
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}

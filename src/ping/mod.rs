mod config;
mod pinger;
mod probe;
mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use config::*;
pub use pinger::*;
pub use probe::*;
pub use stats::*;

use crate::error::TransportError;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Why a run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The configured number of probes was sent
    CountReached,
    /// The run deadline elapsed
    DeadlineExpired,
    /// Stop requested from outside, typically Ctrl-C
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::CountReached => "count reached",
            StopReason::DeadlineExpired => "deadline expired",
            StopReason::Interrupted => "interrupted",
        };
        f.write_str(text)
    }
}

/// Classification of one completed probe cycle.
#[derive(Debug)]
pub enum ReplyOutcome {
    EchoReply {
        /// ICMP message length
        size: usize,
        rtt: Duration,
        /// TTL of the reply, when the IP header was available
        ttl: Option<u8>,
        source: Option<IpAddr>,
    },
    /// Time Exceeded, or any other ICMP error quoting the probe.
    TimeExceeded { source: Option<IpAddr> },
    TransportError(TransportError),
}

impl ReplyOutcome {
    pub fn is_reply(&self) -> bool {
        matches!(self, ReplyOutcome::EchoReply { .. })
    }
}

/// Result record of one probe cycle.
#[derive(Debug)]
pub struct ProbeEvent {
    pub sequence: u64,
    /// Destination address
    pub target: IpAddr,
    /// TTL the probe was sent with
    pub ttl: u8,
    pub outcome: ReplyOutcome,
    /// Loss over all probes so far, including this one
    pub loss_percent: f64,
}

impl fmt::Display for ProbeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            ReplyOutcome::EchoReply {
                size,
                rtt,
                ttl,
                source,
            } => {
                write!(
                    f,
                    "{} bytes from {}: icmp_seq={}",
                    size,
                    source.unwrap_or(self.target),
                    self.sequence
                )?;
                if let Some(ttl) = ttl {
                    write!(f, " ttl={}", ttl)?;
                }
                write!(
                    f,
                    " time={:.3}ms loss={:.2}%",
                    rtt.as_secs_f64() * 1000.0,
                    self.loss_percent
                )
            }
            ReplyOutcome::TimeExceeded { source } => {
                write!(f, "TTL Exceeded, Provided TTL is {}", self.ttl)?;
                match source {
                    Some(source) => write!(f, " (from {}, icmp_seq={})", source, self.sequence),
                    None => write!(f, " (icmp_seq={})", self.sequence),
                }
            }
            ReplyOutcome::TransportError(e) if e.is_timeout() => {
                write!(f, "Request timeout for icmp_seq {}", self.sequence)
            }
            ReplyOutcome::TransportError(e) => write!(f, "icmp_seq={}: {}", self.sequence, e),
        }
    }
}

/// Final state of a run.
#[derive(Clone, Debug)]
pub struct PingResult {
    pub status: StopReason,
    pub stats: StatsSnapshot,
    /// Wall time from start to stop
    pub probe_time: Duration,
}

use std::io;
use thiserror::Error;

/// Failure to turn the target string into an address.
///
/// Always fatal: the run never starts.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("empty host name")]
    Empty,
    #[error("{0}: no address associated with host name")]
    NotFound(String),
    #[error("{host}: {source}")]
    Lookup {
        host: String,
        #[source]
        source: io::Error,
    },
}

/// Per-cycle failure. Counted as a lost probe, never fatal to the run.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket accepted fewer bytes than were encoded.
    #[error("short write: {written} of {expected} bytes sent")]
    ShortWrite { written: usize, expected: usize },
    /// No matching reply arrived before the read deadline.
    #[error("request timed out")]
    Timeout,
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    /// The datagram could not be parsed as ICMP.
    #[error("malformed packet: {0}")]
    Malformed(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

/// Rejected run configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ttl must be between 1 and 255")]
    Ttl,
    #[error("packet size {0} exceeds the maximum of {max} bytes", max = crate::ping::MAX_PAYLOAD_SIZE)]
    Size(usize),
    #[error("count must be a positive number")]
    Count,
    #[error("interval must be greater than zero")]
    Interval,
    #[error("deadline must be greater than zero")]
    Deadline,
}

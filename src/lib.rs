//! ICMP echo probing: resolve a host, send Echo Requests at a fixed
//! interval, classify the replies and keep loss and round-trip statistics.

pub mod error;
pub mod packet;
pub mod ping;
pub mod resolve;
pub mod socket;

pub use error::{ConfigError, ResolveError, TransportError};
pub use ping::{PingResult, Pinger, ProbeEvent, ReplyOutcome, RunConfig, StopHandle, StopReason};
pub use resolve::{resolve, Target};

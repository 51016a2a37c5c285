use crate::error::ConfigError;
use std::time::Duration;

/// Host probed when none is given.
pub const DEFAULT_HOST: &str = "cloudflare.com";
pub const DEFAULT_TTL: u8 = 64;
pub const DEFAULT_PACKET_SIZE: usize = 8;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound on waiting for one reply, independent of the interval.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);
/// Largest echo payload that fits in an IPv4 datagram.
pub const MAX_PAYLOAD_SIZE: usize = 65507;

/// Settings of one run. Immutable once the run starts.
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    /// Host name or address literal to probe
    pub host: String,
    /// Hop limit applied to every probe. Default is `64`.
    pub ttl: u8,
    /// Echo payload length in bytes. Default is `8`.
    pub size: usize,
    /// Suppress per-probe lines
    pub quiet: bool,
    /// Stop after this many probes
    pub count: Option<u64>,
    /// Pause between the end of one probe and the start of the next
    pub interval: Duration,
    /// Stop once this much time has passed since the start
    pub deadline: Option<Duration>,
    /// How long one probe waits for its reply
    pub receive_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            host: DEFAULT_HOST.to_string(),
            ttl: DEFAULT_TTL,
            size: DEFAULT_PACKET_SIZE,
            quiet: false,
            count: None,
            interval: DEFAULT_INTERVAL,
            deadline: None,
            receive_timeout: RECEIVE_TIMEOUT,
        }
    }
}

impl RunConfig {
    pub fn new(host: impl Into<String>) -> RunConfig {
        RunConfig {
            host: host.into(),
            ..RunConfig::default()
        }
    }
    pub fn set_ttl(&mut self, ttl: u8) {
        self.ttl = ttl;
    }
    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }
    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }
    pub fn set_count(&mut self, count: Option<u64>) {
        self.count = count;
    }
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }
    pub fn set_deadline(&mut self, deadline: Option<Duration>) {
        self.deadline = deadline;
    }
    pub fn set_receive_timeout(&mut self, receive_timeout: Duration) {
        self.receive_timeout = receive_timeout;
    }

    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl == 0 {
            return Err(ConfigError::Ttl);
        }
        if self.size > MAX_PAYLOAD_SIZE {
            return Err(ConfigError::Size(self.size));
        }
        if self.count == Some(0) {
            return Err(ConfigError::Count);
        }
        if self.interval.is_zero() {
            return Err(ConfigError::Interval);
        }
        if self.deadline.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::Deadline);
        }
        Ok(())
    }
}

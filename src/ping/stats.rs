use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Run-wide probe counters.
///
/// Written by the probe loop only; any thread may read. Each counter is a
/// separate atomic, so a reader may see a slightly stale value but never a
/// torn one. `sent` is always bumped before the matching `received`.
#[derive(Debug)]
pub struct RunStats {
    sent: AtomicU64,
    received: AtomicU64,
    elapsed_nanos: AtomicU64,
    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl Default for RunStats {
    fn default() -> Self {
        RunStats::new()
    }
}

impl RunStats {
    pub fn new() -> RunStats {
        RunStats {
            sent: AtomicU64::new(0),
            received: AtomicU64::new(0),
            elapsed_nanos: AtomicU64::new(0),
            min_nanos: AtomicU64::new(u64::MAX),
            max_nanos: AtomicU64::new(0),
        }
    }

    /// Counts one probe attempt and returns the new total.
    pub fn record_sent(&self) -> u64 {
        self.sent.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Counts one echo reply with its round-trip time.
    pub fn record_reply(&self, rtt: Duration) {
        let nanos = u64::try_from(rtt.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.fetch_add(nanos, Ordering::SeqCst);
        self.min_nanos.fetch_min(nanos, Ordering::SeqCst);
        self.max_nanos.fetch_max(nanos, Ordering::SeqCst);
        self.received.fetch_add(1, Ordering::SeqCst);
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }

    pub fn loss_percent(&self) -> f64 {
        self.snapshot().loss_percent()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        // received first: a later read of sent can only be larger.
        let received = self.received();
        let sent = self.sent().max(received);
        let min_nanos = self.min_nanos.load(Ordering::SeqCst);
        let max_nanos = self.max_nanos.load(Ordering::SeqCst);
        let has_rtt = received > 0 && min_nanos != u64::MAX;
        StatsSnapshot {
            sent,
            received,
            elapsed: Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst)),
            min_rtt: has_rtt.then(|| Duration::from_nanos(min_nanos)),
            max_rtt: has_rtt.then(|| Duration::from_nanos(max_nanos)),
        }
    }
}

/// Point-in-time copy of [`RunStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StatsSnapshot {
    pub sent: u64,
    pub received: u64,
    /// Sum of the round-trip times of all replies
    pub elapsed: Duration,
    pub min_rtt: Option<Duration>,
    pub max_rtt: Option<Duration>,
}

impl StatsSnapshot {
    pub fn lost(&self) -> u64 {
        self.sent.saturating_sub(self.received)
    }

    /// Share of probes without a reply, `0` when nothing was sent.
    pub fn loss_percent(&self) -> f64 {
        loss_percent(self.sent, self.received)
    }

    pub fn avg_rtt(&self) -> Option<Duration> {
        if self.received == 0 {
            return None;
        }
        u32::try_from(self.received)
            .ok()
            .map(|received| self.elapsed / received)
    }
}

pub fn loss_percent(sent: u64, received: u64) -> f64 {
    if sent == 0 {
        return 0.0;
    }
    sent.saturating_sub(received) as f64 / sent as f64 * 100.0
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Renders the end-of-run summary for `host`.
pub fn report(host: &str, stats: &StatsSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- {} ping results ---", host);
    let _ = write!(
        out,
        "{} packets transmitted, {} received, {:.2}% packet loss, time {}ms",
        stats.sent,
        stats.received,
        stats.loss_percent(),
        stats.elapsed.as_millis()
    );
    if let (Some(min), Some(avg), Some(max)) = (stats.min_rtt, stats.avg_rtt(), stats.max_rtt) {
        let _ = write!(
            out,
            "\nrtt min/avg/max = {:.3}/{:.3}/{:.3} ms",
            millis(min),
            millis(avg),
            millis(max)
        );
    }
    out
}

use super::{echo_identifier, PingResult, ProbeCycle, ProbeEvent, RunConfig, RunStats, StopReason};
use crate::resolve::Target;
use crate::socket::Transport;
use std::io;
use std::net::IpAddr;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

#[derive(Debug)]
enum Message {
    Probe(ProbeEvent),
    Stop(StopReason),
    /// The worker is gone, normally or by panicking.
    WorkerExited,
}

/// Posts [`Message::WorkerExited`] when the probe loop's thread unwinds or
/// returns. Stop handles keep the channel open, so disconnection alone
/// would not wake the caller.
struct ExitNotice {
    tx: Sender<Message>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.tx.send(Message::WorkerExited);
    }
}

/// Requests a running [`Pinger`] to stop. Cheap to clone and safe to use
/// from signal handlers and other threads.
#[derive(Clone, Debug)]
pub struct StopHandle {
    tx: Sender<Message>,
}

impl StopHandle {
    pub fn request(&self, reason: StopReason) {
        let _ = self.tx.send(Message::Stop(reason));
    }
}

/// Drives probe cycles at a fixed interval until the count is reached, the
/// deadline passes or a stop is requested.
///
/// Probing runs on a worker thread that owns the transport. The calling
/// thread only waits for progress and stop messages, so a stop takes effect
/// even while a probe is blocked in its receive; that probe is abandoned.
pub struct Pinger<T> {
    config: RunConfig,
    target: Target,
    transport: T,
    stats: Arc<RunStats>,
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl<T: Transport + Send + 'static> Pinger<T> {
    pub fn new(config: RunConfig, target: Target, transport: T) -> Pinger<T> {
        let (tx, rx) = mpsc::channel();
        Pinger {
            config,
            target,
            transport,
            stats: Arc::new(RunStats::new()),
            tx,
            rx,
        }
    }
    /// Returns the run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }
    /// Returns the resolved target.
    pub fn target(&self) -> &Target {
        &self.target
    }
    /// Returns a handle that can stop the run from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: self.tx.clone(),
        }
    }
    /// Returns the shared counters of this run.
    pub fn stats(&self) -> Arc<RunStats> {
        Arc::clone(&self.stats)
    }

    /// Runs until a stop condition and reports why, with the final counters.
    ///
    /// `on_progress` is called on the calling thread for every completed
    /// probe, in order, and never after the stop was observed.
    pub fn run<F>(self, mut on_progress: F) -> io::Result<PingResult>
    where
        F: FnMut(&ProbeEvent),
    {
        let Pinger {
            config,
            target,
            transport,
            stats,
            tx,
            rx,
        } = self;
        let start_time = Instant::now();
        let deadline = config.deadline;
        let (halt_tx, halt_rx) = mpsc::channel::<()>();

        let worker = {
            let config = config.clone();
            let stats = Arc::clone(&stats);
            let dst_ip = target.addr;
            thread::Builder::new()
                .name("echoping-probe".to_string())
                .spawn(move || {
                    let _notice = ExitNotice { tx: tx.clone() };
                    probe_loop(transport, dst_ip, &config, &stats, &tx, &halt_rx)
                })?
        };

        let status = loop {
            let received = match deadline {
                Some(deadline) => match deadline.checked_sub(start_time.elapsed()) {
                    Some(remaining) if !remaining.is_zero() => rx.recv_timeout(remaining),
                    _ => Err(RecvTimeoutError::Timeout),
                },
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(Message::Probe(event)) => on_progress(&event),
                Ok(Message::Stop(reason)) => break reason,
                Err(RecvTimeoutError::Timeout) => break StopReason::DeadlineExpired,
                Ok(Message::WorkerExited) | Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("probe loop exited without a stop reason");
                    break StopReason::Interrupted;
                }
            }
        };
        drop(halt_tx);

        let snapshot = stats.snapshot();
        let probe_time = start_time.elapsed();
        log::debug!("stopped ({}) after {:?}", status, probe_time);
        if worker.is_finished() {
            let _ = worker.join();
        }
        Ok(PingResult {
            status,
            stats: snapshot,
            probe_time,
        })
    }
}

fn probe_loop<T: Transport>(
    mut transport: T,
    dst_ip: IpAddr,
    config: &RunConfig,
    stats: &RunStats,
    tx: &Sender<Message>,
    halt_rx: &Receiver<()>,
) {
    let mut cycle = ProbeCycle::new(&mut transport, stats, dst_ip, config, echo_identifier());
    let mut sequence: u64 = 0;
    loop {
        sequence += 1;
        let event = cycle.run(sequence);
        if tx.send(Message::Probe(event)).is_err() {
            break;
        }
        if config.count.is_some_and(|count| sequence >= count) {
            let _ = tx.send(Message::Stop(StopReason::CountReached));
            break;
        }
        // Doubles as the inter-probe sleep; wakes early once the run stops.
        match halt_rx.recv_timeout(config.interval) {
            Err(RecvTimeoutError::Timeout) => {}
            _ => break,
        }
    }
    log::debug!("probe loop finished after {} probes", sequence);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ping::testing::{ScriptedTransport, Step};
    use std::time::Duration;

    fn target() -> Target {
        Target {
            host: "test.invalid".to_string(),
            addr: "192.0.2.1".parse().unwrap(),
        }
    }

    fn config(count: Option<u64>, interval_ms: u64, deadline: Option<Duration>) -> RunConfig {
        let mut config = RunConfig::new("test.invalid");
        config.set_count(count);
        config.set_interval(Duration::from_millis(interval_ms));
        config.set_deadline(deadline);
        config
    }

    fn run(pinger: Pinger<ScriptedTransport>) -> (PingResult, Vec<u64>) {
        let mut seen = Vec::new();
        let result = pinger.run(|event| seen.push(event.sequence)).unwrap();
        (result, seen)
    }

    #[test]
    fn count_reached_without_loss() {
        let transport = ScriptedTransport::new(vec![]);
        let pinger = Pinger::new(config(Some(3), 10, None), target(), transport);
        let (result, seen) = run(pinger);
        assert_eq!(result.status, StopReason::CountReached);
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(result.stats.sent, 3);
        assert_eq!(result.stats.received, 3);
        assert_eq!(result.stats.loss_percent(), 0.0);
    }

    #[test]
    fn all_time_exceeded_is_full_loss() {
        let transport = ScriptedTransport::with_fallback(vec![], Step::TimeExceeded);
        let pinger = Pinger::new(config(Some(5), 5, None), target(), transport);
        let (result, seen) = run(pinger);
        assert_eq!(result.status, StopReason::CountReached);
        assert_eq!(seen.len(), 5);
        assert_eq!(result.stats.sent, 5);
        assert_eq!(result.stats.received, 0);
        assert_eq!(result.stats.loss_percent(), 100.0);
    }

    #[test]
    fn deadline_stops_the_run() {
        let transport = ScriptedTransport::new(vec![]);
        let pinger = Pinger::new(
            config(Some(100), 1000, Some(Duration::from_secs(2))),
            target(),
            transport,
        );
        let started = Instant::now();
        let (result, _) = run(pinger);
        let elapsed = started.elapsed();
        assert_eq!(result.status, StopReason::DeadlineExpired);
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_millis(2800), "took {:?}", elapsed);
        assert!((2..=3).contains(&result.stats.sent), "sent {}", result.stats.sent);
        assert!(result.stats.sent >= result.stats.received);
    }

    #[test]
    fn interrupt_during_sleep() {
        let transport = ScriptedTransport::new(vec![]);
        let pinger = Pinger::new(config(None, 400, None), target(), transport);
        let stop = pinger.stop_handle();
        // Cycles start at ~0 ms and ~400 ms; stop lands in the second sleep.
        let waker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(600));
            stop.request(StopReason::Interrupted);
        });
        let started = Instant::now();
        let (result, seen) = run(pinger);
        waker.join().unwrap();
        assert_eq!(result.status, StopReason::Interrupted);
        assert!(started.elapsed() < Duration::from_millis(780));
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(result.stats.sent, 2);
        assert_eq!(result.stats.received, 2);
    }

    #[test]
    fn timeouts_count_as_loss_and_continue() {
        let transport = ScriptedTransport::new(vec![Step::Timeout, Step::Reply, Step::Timeout]);
        let pinger = Pinger::new(config(Some(3), 5, None), target(), transport);
        let (result, seen) = run(pinger);
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(result.stats.sent, 3);
        assert_eq!(result.stats.received, 1);
    }

    #[test]
    fn worker_failure_ends_the_run() {
        let transport = ScriptedTransport::new(vec![Step::Reply, Step::Panic]);
        let pinger = Pinger::new(config(None, 5, None), target(), transport);
        // Held like the Ctrl-C handler holds one.
        let _stop = pinger.stop_handle();
        let (result, seen) = run(pinger);
        assert_eq!(result.status, StopReason::Interrupted);
        assert_eq!(seen, vec![1]);
        assert_eq!(result.stats.sent, 2);
        assert_eq!(result.stats.received, 1);
    }

    #[test]
    fn stop_before_first_message() {
        let transport = ScriptedTransport::new(vec![]);
        let pinger = Pinger::new(config(None, 1000, None), target(), transport);
        pinger.stop_handle().request(StopReason::Interrupted);
        let (result, _) = run(pinger);
        assert_eq!(result.status, StopReason::Interrupted);
        assert!(result.stats.sent <= 1);
    }
}

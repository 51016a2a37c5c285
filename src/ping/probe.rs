use super::{ProbeEvent, ReplyOutcome, RunConfig, RunStats};
use crate::error::TransportError;
use crate::packet::{self, EchoId, IcmpMessage};
use crate::socket::{Exchange, Transport};
use std::net::IpAddr;
use std::time::Duration;

/// Echo identifier for this process.
pub fn echo_identifier() -> u16 {
    (std::process::id() & 0xffff) as u16
}

/// Sequence number as carried on the wire. Wraps after 65535.
fn wire_sequence(sequence: u64) -> u16 {
    (sequence & 0xffff) as u16
}

/// One encode/send/receive/classify round over a borrowed transport.
pub struct ProbeCycle<'a, T: Transport> {
    transport: &'a mut T,
    stats: &'a RunStats,
    dst_ip: IpAddr,
    ttl: u8,
    receive_timeout: Duration,
    identifier: u16,
    payload: Vec<u8>,
}

impl<'a, T: Transport> ProbeCycle<'a, T> {
    pub fn new(
        transport: &'a mut T,
        stats: &'a RunStats,
        dst_ip: IpAddr,
        config: &RunConfig,
        identifier: u16,
    ) -> ProbeCycle<'a, T> {
        ProbeCycle {
            transport,
            stats,
            dst_ip,
            ttl: config.ttl,
            receive_timeout: config.receive_timeout,
            identifier,
            payload: packet::build_payload(config.size),
        }
    }

    /// Runs probe number `sequence` to completion.
    ///
    /// `sent` is counted before anything goes on the wire. Only an echo
    /// reply touches `received` and the elapsed total.
    pub fn run(&mut self, sequence: u64) -> ProbeEvent {
        self.stats.record_sent();
        let outcome = match self.exchange(sequence) {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.is_timeout() {
                    log::debug!("icmp_seq={} timed out", sequence);
                } else {
                    log::warn!("icmp_seq={} failed: {}", sequence, e);
                }
                ReplyOutcome::TransportError(e)
            }
        };
        if let ReplyOutcome::EchoReply { rtt, .. } = &outcome {
            self.stats.record_reply(*rtt);
        }
        ProbeEvent {
            sequence,
            target: self.dst_ip,
            ttl: self.ttl,
            outcome,
            loss_percent: self.stats.loss_percent(),
        }
    }

    fn exchange(&mut self, sequence: u64) -> Result<ReplyOutcome, TransportError> {
        let family = self.transport.family();
        let expected = EchoId {
            identifier: self.identifier,
            sequence: wire_sequence(sequence),
        };
        let request = packet::encode(family, expected, &self.payload);
        let Exchange {
            mut datagram,
            sent_at,
            mut rtt,
        } = self
            .transport
            .exchange(self.dst_ip, self.ttl, &request, self.receive_timeout)?;
        let deadline = sent_at + self.receive_timeout;
        let match_identifier = !self.transport.rewrites_identifier();
        // Undecodable datagrams are skipped; the last one is reported if
        // nothing answers before the deadline.
        let mut rejected = None;
        loop {
            match packet::decode(&datagram.bytes, family) {
                Ok(message) if message.answers(expected, match_identifier) => {
                    return Ok(classify(message, rtt, datagram.source));
                }
                Ok(message) => log::debug!("icmp_seq={}: ignoring {:?}", sequence, message),
                Err(e) => {
                    log::debug!("icmp_seq={}: discarding datagram: {}", sequence, e);
                    rejected = Some(e);
                }
            }
            datagram = match self.transport.recv_until(deadline) {
                Ok(datagram) => datagram,
                Err(e) if e.is_timeout() => return Err(rejected.unwrap_or(e)),
                Err(e) => return Err(e),
            };
            rtt = sent_at.elapsed();
        }
    }
}

fn classify(message: IcmpMessage, rtt: Duration, sender: Option<IpAddr>) -> ReplyOutcome {
    match message {
        IcmpMessage::EchoReply {
            size, ttl, source, ..
        } => ReplyOutcome::EchoReply {
            size,
            rtt,
            ttl,
            source: source.or(sender),
        },
        other => ReplyOutcome::TimeExceeded {
            source: other.source().or(sender),
        },
    }
}

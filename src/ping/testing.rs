//! In-memory transport that answers probes from a script.

use crate::error::TransportError;
use crate::packet::IPV4_HEADER_LEN;
use crate::socket::{Datagram, SocketFamily, Transport};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::time::Instant;

#[derive(Clone, Copy, Debug)]
pub(crate) enum Step {
    Reply,
    TimeExceeded,
    Timeout,
    ShortWrite,
    Malformed,
    /// A reply for another sequence, then the real one
    StrayThenReply,
    /// A reply for another sequence and nothing else
    StrayOnly,
    /// Time Exceeded for someone else's UDP datagram, then the real reply
    ForeignErrorThenReply,
    /// Undecodable bytes, then the real reply
    MalformedThenReply,
    /// The transport itself panics
    Panic,
}

/// Answers each send with the next [`Step`], then with `fallback` once the
/// script runs out. Receiving with nothing queued is an immediate timeout.
pub(crate) struct ScriptedTransport {
    steps: VecDeque<Step>,
    fallback: Step,
    pending: VecDeque<Datagram>,
    ttls: Vec<u8>,
    requests: Vec<Vec<u8>>,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: Vec<Step>) -> ScriptedTransport {
        ScriptedTransport::with_fallback(steps, Step::Reply)
    }

    pub(crate) fn with_fallback(steps: Vec<Step>, fallback: Step) -> ScriptedTransport {
        ScriptedTransport {
            steps: steps.into(),
            fallback,
            pending: VecDeque::new(),
            ttls: Vec::new(),
            requests: Vec::new(),
        }
    }

    pub(crate) fn ttls(&self) -> &[u8] {
        &self.ttls
    }

    pub(crate) fn sent_sequences(&self) -> Vec<u64> {
        self.requests
            .iter()
            .map(|r| u64::from(u16::from_be_bytes([r[6], r[7]])))
            .collect()
    }

    fn queue(&mut self, bytes: Vec<u8>) {
        self.pending.push_back(Datagram {
            bytes,
            source: None,
        });
    }
}

fn echo_reply(request: &[u8]) -> Vec<u8> {
    let mut reply = request.to_vec();
    reply[0] = 0;
    reply
}

fn stray_reply(request: &[u8]) -> Vec<u8> {
    let mut reply = echo_reply(request);
    reply[6] = reply[6].wrapping_add(1);
    reply
}

fn quoting(protocol: u8, datagram: &[u8]) -> Vec<u8> {
    let mut quoted = vec![0u8; IPV4_HEADER_LEN];
    quoted[0] = 0x45;
    quoted[8] = 1;
    quoted[9] = protocol;
    quoted.extend_from_slice(&datagram[..8]);
    let mut message = vec![11, 0, 0, 0, 0, 0, 0, 0];
    message.extend_from_slice(&quoted);
    message
}

fn time_exceeded(request: &[u8]) -> Vec<u8> {
    quoting(1, request)
}

fn foreign_time_exceeded() -> Vec<u8> {
    // UDP header towards port 33435, as a traceroute would send.
    quoting(17, &[0x82, 0x9a, 0x82, 0x9b, 0, 16, 0, 0])
}

impl Transport for ScriptedTransport {
    fn family(&self) -> SocketFamily {
        SocketFamily::Ipv4
    }

    fn send_to(&mut self, _dst: IpAddr, ttl: u8, request: &[u8]) -> Result<Instant, TransportError> {
        self.ttls.push(ttl);
        self.requests.push(request.to_vec());
        self.pending.clear();
        let step = self.steps.pop_front().unwrap_or(self.fallback);
        match step {
            Step::Reply => self.queue(echo_reply(request)),
            Step::TimeExceeded => self.queue(time_exceeded(request)),
            Step::Timeout => {}
            Step::ShortWrite => {
                return Err(TransportError::ShortWrite {
                    written: request.len() - 1,
                    expected: request.len(),
                })
            }
            Step::Malformed => self.queue(vec![0xff]),
            Step::StrayThenReply => {
                self.queue(stray_reply(request));
                self.queue(echo_reply(request));
            }
            Step::StrayOnly => self.queue(stray_reply(request)),
            Step::ForeignErrorThenReply => {
                self.queue(foreign_time_exceeded());
                self.queue(echo_reply(request));
            }
            Step::MalformedThenReply => {
                self.queue(vec![0xff]);
                self.queue(echo_reply(request));
            }
            Step::Panic => panic!("scripted transport failure"),
        }
        Ok(Instant::now())
    }

    fn recv_until(&mut self, _deadline: Instant) -> Result<Datagram, TransportError> {
        self.pending.pop_front().ok_or(TransportError::Timeout)
    }
}

//! Inbound segment reassembly for stop-and-wait.
//!
//! The [`Receiver`] is purely reactive.  It never times out or retransmits:
//! - Only the **next expected** segment is accepted (seq == `expected`).
//! - Anything else is discarded, and re-acknowledged with the last accepted
//!   seqnum so a sender stuck on a lost ACK can move on.
//! - Every DATA seqnum is recorded in the arrival log, accepted or not.
//! - END finishes the session; the caller flushes the output and replies.
//!
//! This module only manages state; all socket and file I/O is the caller's
//! responsibility (see [`crate::session::receive_file`]).

use crate::packet::{Packet, PacketType};
use crate::state::ReceiverState;

/// Summary handed back once END has been handled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverReport {
    /// Every DATA seqnum observed, duplicates and out-of-order included.
    pub arrival_log: Vec<u32>,
    /// Number of segments accepted.
    pub segments: usize,
    /// Size of the reassembled output.
    pub bytes: usize,
}

/// Stop-and-wait receive-side state for one transfer.
#[derive(Debug)]
pub struct Receiver {
    /// Next sequence number that will be accepted.  Starts at 1.
    expected: u32,
    /// Accepted payloads, one per segment, in seqnum order.
    segments: Vec<Vec<u8>>,
    arrival_log: Vec<u32>,
    state: ReceiverState,
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Receiver {
    pub fn new() -> Self {
        Self {
            expected: 1,
            segments: Vec::new(),
            arrival_log: Vec::new(),
            state: ReceiverState::AwaitingData,
        }
    }

    /// Process one decoded packet and return the reply to send, if any.
    ///
    /// For END the reply is the receiver's own END; the caller must persist
    /// the output **before** putting it on the wire.
    pub fn on_packet(&mut self, packet: &Packet) -> Option<Packet> {
        if self.state == ReceiverState::Terminated {
            return None;
        }
        match packet.kind {
            PacketType::Data => self.on_data(packet.seqnum, &packet.payload),
            PacketType::End => {
                self.state = ReceiverState::Terminated;
                log::debug!(
                    "[receiver] ← END after {} segment(s)",
                    self.segments.len()
                );
                Some(Packet::end())
            }
            PacketType::Ack => {
                log::debug!("[receiver] ignoring stray ACK {}", packet.seqnum);
                None
            }
        }
    }

    fn on_data(&mut self, seqnum: u32, payload: &[u8]) -> Option<Packet> {
        self.arrival_log.push(seqnum);

        if seqnum == self.expected {
            self.segments.push(payload.to_vec());
            self.expected += 1;
            log::debug!("[receiver] ← DATA {seqnum} accepted; → ACK {seqnum}");
            return Some(Packet::ack(seqnum));
        }

        match self.last_accepted() {
            Some(last) => {
                log::debug!(
                    "[receiver] ← DATA {seqnum} rejected (expected {}); → ACK {last}",
                    self.expected
                );
                Some(Packet::ack(last))
            }
            None => {
                log::debug!("[receiver] ← DATA {seqnum} rejected before any accept; no ACK");
                None
            }
        }
    }

    /// Seqnum of the most recently accepted segment.
    pub fn last_accepted(&self) -> Option<u32> {
        (self.expected > 1).then(|| self.expected - 1)
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == ReceiverState::Terminated
    }

    pub fn arrival_log(&self) -> &[u32] {
        &self.arrival_log
    }

    /// The accepted payloads concatenated in order.
    pub fn assembled(&self) -> Vec<u8> {
        self.segments.concat()
    }

    pub fn report(&self) -> ReceiverReport {
        ReceiverReport {
            arrival_log: self.arrival_log.clone(),
            segments: self.segments.len(),
            bytes: self.segments.iter().map(Vec::len).sum(),
        }
    }
}

//! Outbound segment state for stop-and-wait reliability.
//!
//! [`Sender`] tracks the segment list, the single in-flight packet and its
//! retransmission timer.  It does **not** touch the socket or the clock:
//! [`crate::session::send_file`] owns the actual send/receive loop and hands
//! every event (reply, timeout) to these methods together with `now`.
//!
//! # Stop-and-Wait contract
//! - At most **one** packet is in flight at any moment.
//! - The next segment is sent only after an ACK carrying the in-flight
//!   seqnum arrives.
//! - On timeout: resend the same packet unchanged and re-arm the timer.
//! - Any other reply (wrong type, wrong seqnum) is ignored and does **not**
//!   touch the timer.
//! - After the last ACK: send END and wait, under the same timer, for the
//!   receiver's END.

use std::time::Duration;

use tokio::time::Instant;

use crate::packet::{Packet, PacketType, MAX_PAYLOAD};
use crate::state::SenderState;
use crate::timer::{RetransmitTimer, RetriesExhausted, RetryPolicy};

/// Split `data` into segments of at most [`MAX_PAYLOAD`] bytes.
///
/// Empty input yields exactly one empty segment so that an empty file still
/// goes through a full DATA/ACK exchange.
pub fn segment(data: &[u8]) -> Vec<Vec<u8>> {
    if data.is_empty() {
        return vec![Vec::new()];
    }
    data.chunks(MAX_PAYLOAD).map(<[u8]>::to_vec).collect()
}

/// What the driver should do after feeding an event to the [`Sender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderAction {
    /// Put this packet on the wire.
    Transmit(Packet),
    /// Nothing changed; keep waiting on the current deadline.
    Wait,
    /// The termination handshake completed.
    Finished,
}

/// Summary handed back once the transfer is over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderReport {
    /// Every DATA seqnum put on the wire, retransmissions included.
    pub seqnum_log: Vec<u32>,
    /// Every matching ACK accepted, in acceptance order.
    pub ack_log: Vec<u32>,
    /// Number of segments the input was split into.
    pub segments: usize,
    /// Timer-driven resends of DATA and END packets.
    pub retransmissions: u32,
}

/// Stop-and-wait send-side state for one transfer.
#[derive(Debug)]
pub struct Sender {
    segments: Vec<Vec<u8>>,
    state: SenderState,
    /// The packet currently protected by the timer.
    in_flight: Option<Packet>,
    timer: RetransmitTimer,
    report: SenderReport,
}

impl Sender {
    /// Prepare a transfer of `data` using a fixed retransmission `timeout`.
    pub fn new(data: &[u8], timeout: Duration, policy: RetryPolicy) -> Self {
        let segments = segment(data);
        let report = SenderReport {
            segments: segments.len(),
            ..SenderReport::default()
        };
        Self {
            segments,
            state: SenderState::Idle,
            in_flight: None,
            timer: RetransmitTimer::new(timeout, policy),
            report,
        }
    }

    /// Emit DATA 1 and arm the timer.
    ///
    /// Only the first call produces a packet; once the transfer has started
    /// this returns `None` and leaves the state untouched.
    pub fn start(&mut self, now: Instant) -> Option<Packet> {
        if self.state != SenderState::Idle {
            return None;
        }
        Some(self.send_segment(1, now))
    }

    /// Handle a decoded reply.
    pub fn on_packet(&mut self, packet: &Packet, now: Instant) -> SenderAction {
        match self.state {
            SenderState::AwaitingAck { seqnum } => {
                if packet.kind != PacketType::Ack || packet.seqnum != seqnum {
                    log::debug!(
                        "[sender] ignoring {} {} while awaiting ACK {seqnum}",
                        packet.kind,
                        packet.seqnum
                    );
                    return SenderAction::Wait;
                }
                self.timer.cancel();
                self.report.ack_log.push(seqnum);
                log::debug!("[sender] ← ACK {seqnum}");

                if (seqnum as usize) < self.segments.len() {
                    SenderAction::Transmit(self.send_segment(seqnum + 1, now))
                } else {
                    SenderAction::Transmit(self.send_end(now))
                }
            }
            SenderState::AwaitingTermination => {
                if packet.kind != PacketType::End {
                    log::debug!(
                        "[sender] ignoring {} {} while awaiting END",
                        packet.kind,
                        packet.seqnum
                    );
                    return SenderAction::Wait;
                }
                self.timer.cancel();
                self.in_flight = None;
                self.state = SenderState::Done;
                log::debug!("[sender] ← END, transfer complete");
                SenderAction::Finished
            }
            SenderState::Idle | SenderState::Done => SenderAction::Wait,
        }
    }

    /// Handle the timer firing at `now`.
    ///
    /// Returns the packet to resend, or [`SenderAction::Wait`] if the timer
    /// is not actually due (spurious wake-up).  Fails once the retry policy
    /// is exhausted.
    pub fn on_timeout(&mut self, now: Instant) -> Result<SenderAction, RetriesExhausted> {
        if !self.timer.is_expired(now) {
            return Ok(SenderAction::Wait);
        }
        let Some(packet) = self.in_flight.clone() else {
            return Ok(SenderAction::Wait);
        };

        self.timer.expire(now)?;
        self.report.retransmissions = self.report.retransmissions.saturating_add(1);
        if packet.kind == PacketType::Data {
            self.report.seqnum_log.push(packet.seqnum);
        }
        log::info!(
            "[sender] timeout after {:?}, resending {} {} (retry {})",
            self.timer.timeout(),
            packet.kind,
            packet.seqnum,
            self.timer.retries()
        );
        Ok(SenderAction::Transmit(packet))
    }

    /// Deadline the driver must wake up at, or `None` when nothing is in flight.
    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == SenderState::Done
    }

    /// The packet currently awaiting a reply.
    pub fn in_flight(&self) -> Option<&Packet> {
        self.in_flight.as_ref()
    }

    pub fn report(&self) -> &SenderReport {
        &self.report
    }

    pub fn into_report(self) -> SenderReport {
        self.report
    }

    fn send_segment(&mut self, seqnum: u32, now: Instant) -> Packet {
        let payload = self.segments[seqnum as usize - 1].clone();
        let packet = Packet::data(seqnum, payload);
        self.state = SenderState::AwaitingAck { seqnum };
        self.report.seqnum_log.push(seqnum);
        log::debug!("[sender] → DATA {seqnum} len={}", packet.payload.len());
        self.arm(packet, now)
    }

    fn send_end(&mut self, now: Instant) -> Packet {
        self.state = SenderState::AwaitingTermination;
        log::debug!("[sender] all {} segment(s) acknowledged; → END", self.segments.len());
        self.arm(Packet::end(), now)
    }

    fn arm(&mut self, packet: Packet, now: Instant) -> Packet {
        self.timer.arm(now);
        self.in_flight = Some(packet.clone());
        packet
    }
}

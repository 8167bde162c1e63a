//! Finite-state-machine (FSM) types for both endpoints.
//!
//! Transitions are not implemented here.  They live in [`crate::sender`] and
//! [`crate::receiver`], but the legal ones are drawn below so the two state
//! machines can be read side by side.

use std::fmt;

/// States of the sending endpoint.
///
/// ```text
///  IDLE ──DATA 1──▶ AWAITING_ACK(1) ──ACK 1──▶ AWAITING_ACK(2) ─ … ─▶ AWAITING_ACK(n)
///                      │  ▲                                               │
///                      └──┘ timeout: resend DATA                    ACK n │ send END
///                                                                         ▼
///                                   DONE ◀──END── AWAITING_TERMINATION ◀──┘
///                                                     │  ▲
///                                                     └──┘ timeout: resend END
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderState {
    /// Nothing sent yet.
    #[default]
    Idle,
    /// DATA `seqnum` is in flight; the retransmission timer is armed.
    AwaitingAck { seqnum: u32 },
    /// Every segment is acknowledged; END sent, waiting for the peer's END.
    AwaitingTermination,
    /// The peer answered END.  Terminal.
    Done,
}

/// States of the receiving endpoint.
///
/// ```text
///  AWAITING_DATA ──END──▶ TERMINATED
///    │  ▲
///    └──┘ DATA: accept or re-ACK
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverState {
    #[default]
    AwaitingData,
    /// END observed.  Terminal.
    Terminated,
}

impl fmt::Display for SenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("IDLE"),
            Self::AwaitingAck { seqnum } => write!(f, "AWAITING_ACK({seqnum})"),
            Self::AwaitingTermination => f.write_str("AWAITING_TERMINATION"),
            Self::Done => f.write_str("DONE"),
        }
    }
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingData => f.write_str("AWAITING_DATA"),
            Self::Terminated => f.write_str("TERMINATED"),
        }
    }
}

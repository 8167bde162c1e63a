//! Network emulator: a lossy UDP relay between sender and receiver.
//!
//! The emulator knows nothing about sequencing.  For each datagram it only
//! looks at the packet type and the source address:
//!
//! | Packet | Action                                                        |
//! |--------|---------------------------------------------------------------|
//! | DATA   | learn sender address; drop per [`LossModel`] or forward to receiver |
//! | ACK    | learn receiver address; always forward to sender              |
//! | END    | forward to the *other* endpoint, decided by source address    |
//! | bad    | discard                                                       |
//!
//! END carries nothing that says which side sent it, so its direction comes
//! from the [`AddressTable`] filled in by earlier DATA/ACK traffic.  An END
//! from an address not seen yet is dropped rather than guessed at.
//!
//! Datagrams are forwarded byte-for-byte; the emulator never builds packets.

use std::fmt;
use std::net::SocketAddr;

use crate::loss::LossModel;
use crate::packet::{Packet, PacketError, PacketType};
use crate::socket::{Socket, SocketError};

/// The two logical endpoints of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    pub fn peer(self) -> Self {
        match self {
            Self::Sender => Self::Receiver,
            Self::Receiver => Self::Sender,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => f.write_str("sender"),
            Self::Receiver => f.write_str("receiver"),
        }
    }
}

/// Last observed source address per role.
///
/// Only DATA (sender) and ACK (receiver) packets update it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressTable {
    sender: Option<SocketAddr>,
    receiver: Option<SocketAddr>,
}

impl AddressTable {
    pub fn learn(&mut self, role: Role, addr: SocketAddr) {
        let slot = match role {
            Role::Sender => &mut self.sender,
            Role::Receiver => &mut self.receiver,
        };
        if *slot != Some(addr) {
            log::debug!("[emulator] learned {role} address {addr}");
            *slot = Some(addr);
        }
    }

    pub fn get(&self, role: Role) -> Option<SocketAddr> {
        match role {
            Role::Sender => self.sender,
            Role::Receiver => self.receiver,
        }
    }

    /// Which role last sent from `addr`, if any.
    pub fn role_of(&self, addr: SocketAddr) -> Option<Role> {
        if self.sender == Some(addr) {
            Some(Role::Sender)
        } else if self.receiver == Some(addr) {
            Some(Role::Receiver)
        } else {
            None
        }
    }
}

/// Why a datagram was not forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The loss model discarded this DATA packet.
    Loss { seqnum: u32 },
    /// The datagram did not decode.
    Malformed(PacketError),
    /// END from an address whose role is not known yet.
    Unroutable { from: SocketAddr },
}

/// Outcome of routing one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Forward { to: SocketAddr, kind: PacketType },
    Drop(DropReason),
}

/// Counters kept by the relay.  Logged when [`Emulator::run`] stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmulatorStats {
    pub received: u64,
    pub forwarded: u64,
    pub lost: u64,
    pub malformed: u64,
    pub unroutable: u64,
}

/// Routing state for one emulator process.
pub struct Emulator<L> {
    /// Where sender-bound traffic (ACK, receiver's END) is forwarded.
    sender_endpoint: SocketAddr,
    /// Where receiver-bound traffic (DATA, sender's END) is forwarded.
    receiver_endpoint: SocketAddr,
    table: AddressTable,
    loss: L,
    stats: EmulatorStats,
}

impl<L: LossModel> Emulator<L> {
    pub fn new(receiver_endpoint: SocketAddr, sender_endpoint: SocketAddr, loss: L) -> Self {
        Self {
            sender_endpoint,
            receiver_endpoint,
            table: AddressTable::default(),
            loss,
            stats: EmulatorStats::default(),
        }
    }

    fn endpoint(&self, role: Role) -> SocketAddr {
        match role {
            Role::Sender => self.sender_endpoint,
            Role::Receiver => self.receiver_endpoint,
        }
    }

    /// Decide what to do with `datagram`, received from `from`.
    ///
    /// Updates the address table and counters; performs no I/O.
    pub fn route(&mut self, datagram: &[u8], from: SocketAddr) -> Verdict {
        self.stats.received += 1;
        let verdict = match Packet::decode(datagram) {
            Ok(packet) => self.classify(&packet, from),
            Err(e) => {
                log::info!("discarding malformed datagram from {from}: {e}");
                Verdict::Drop(DropReason::Malformed(e))
            }
        };

        match &verdict {
            Verdict::Forward { .. } => self.stats.forwarded += 1,
            Verdict::Drop(DropReason::Loss { .. }) => self.stats.lost += 1,
            Verdict::Drop(DropReason::Unroutable { .. }) => self.stats.unroutable += 1,
            Verdict::Drop(DropReason::Malformed(_)) => self.stats.malformed += 1,
        }
        verdict
    }

    fn classify(&mut self, packet: &Packet, from: SocketAddr) -> Verdict {
        match packet.kind {
            PacketType::Data => {
                self.table.learn(Role::Sender, from);
                log::info!("receiving Packet {}", packet.seqnum);
                if self.loss.should_drop(packet.seqnum) {
                    log::info!("discarding Packet {}", packet.seqnum);
                    Verdict::Drop(DropReason::Loss {
                        seqnum: packet.seqnum,
                    })
                } else {
                    log::info!("forwarding Packet {}", packet.seqnum);
                    Verdict::Forward {
                        to: self.receiver_endpoint,
                        kind: PacketType::Data,
                    }
                }
            }
            PacketType::Ack => {
                self.table.learn(Role::Receiver, from);
                log::info!("receiving ACK {}", packet.seqnum);
                log::info!("forwarding ACK {}", packet.seqnum);
                Verdict::Forward {
                    to: self.sender_endpoint,
                    kind: PacketType::Ack,
                }
            }
            PacketType::End => {
                log::info!("receiving END");
                match self.table.role_of(from) {
                    Some(origin) => {
                        log::info!("forwarding END to {}", origin.peer());
                        Verdict::Forward {
                            to: self.endpoint(origin.peer()),
                            kind: PacketType::End,
                        }
                    }
                    None => {
                        log::warn!("discarding END from unknown address {from}");
                        Verdict::Drop(DropReason::Unroutable { from })
                    }
                }
            }
        }
    }

    pub fn table(&self) -> &AddressTable {
        &self.table
    }

    pub fn stats(&self) -> EmulatorStats {
        self.stats
    }

    /// Relay datagrams on `socket` forever.
    ///
    /// Only returns on a non-transient socket error.  Failed forwards are
    /// logged and skipped.
    pub async fn run(mut self, socket: Socket) -> Result<(), SocketError> {
        log::info!(
            "[emulator] relaying on {} (sender {}, receiver {})",
            socket.local_addr,
            self.sender_endpoint,
            self.receiver_endpoint
        );
        loop {
            let (datagram, from) = match socket.recv_raw().await {
                Ok(v) => v,
                Err(e) if e.is_transient() => {
                    log::debug!("[emulator] transient receive error: {e}");
                    continue;
                }
                Err(e) => {
                    let st = self.stats;
                    log::error!(
                        "[emulator] stopping: {e} (received {}, forwarded {}, lost {}, malformed {}, unroutable {})",
                        st.received,
                        st.forwarded,
                        st.lost,
                        st.malformed,
                        st.unroutable
                    );
                    return Err(e);
                }
            };

            if let Verdict::Forward { to, kind } = self.route(&datagram, from) {
                if let Err(e) = socket.send_raw(&datagram, to).await {
                    log::warn!("[emulator] failed to forward {kind} to {to}: {e}");
                }
            }
        }
    }
}

//! `rdt-over-udp`: stop-and-wait reliable file transfer over UDP.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  DATA, END   ┌────────────┐  DATA, END   ┌──────────┐
//!  │  Sender  │─────────────▶│  Emulator  │─────────────▶│ Receiver │
//!  │          │◀─────────────│ (drops DATA│◀─────────────│          │
//!  └──────────┘  ACK, END    │  at rate p)│  ACK, END    └──────────┘
//!                            └────────────┘
//! ```
//!
//! Three processes, one socket each, no shared state.  All sequencing lives
//! in the sender and receiver; the emulator only looks at packet types and
//! source addresses.
//!
//! Each module has a single responsibility:
//! - [`packet`]     wire format (serialise / deserialise)
//! - [`socket`]     async UDP socket abstraction
//! - [`state`]      finite-state-machine types
//! - [`timer`]      retransmission deadline and retry policy
//! - [`sender`]     stop-and-wait outbound state machine
//! - [`receiver`]   stop-and-wait inbound state machine
//! - [`loss`]       loss models for the emulator
//! - [`emulator`]   lossy relay between the two endpoints
//! - [`session`]    async loops driving sender / receiver over a socket
//! - [`artifacts`]  seqnum / ack / arrival log files
//! - [`config`]     per-role configuration and validation

pub mod artifacts;
pub mod config;
pub mod emulator;
pub mod loss;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod socket;
pub mod state;
pub mod timer;

pub use emulator::Emulator;
pub use packet::{Packet, PacketError, PacketType};
pub use session::{receive_file, send_file, SessionError};
pub use socket::Socket;

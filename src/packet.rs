//! Wire-format definitions for protocol packets.
//!
//! Every datagram exchanged between sender, emulator and receiver is a
//! [`Packet`].  This module is responsible for:
//! - Defining the on-wire binary layout (type, sequence number, length, payload).
//! - Serialising a [`Packet`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Packet`], returning errors
//!   for malformed or truncated input.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! All integers are unsigned 32-bit, **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 Type  (0 = ACK, 1 = DATA, 2 = END)            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Payload Length (0..=500)                   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Payload ...                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 12 bytes, no padding.

use std::fmt;

use thiserror::Error;

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 12;

/// Largest payload a single packet may carry.
pub const MAX_PAYLOAD: usize = 500;

/// Largest datagram any role ever sends or needs to receive.
pub const MAX_DATAGRAM: usize = HEADER_LEN + MAX_PAYLOAD;

// Byte offsets of each field within the serialised header.
const OFF_TYPE: usize = 0;
const OFF_SEQ: usize = 4;
const OFF_LEN: usize = 8;

/// The three packet kinds understood by every role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Acknowledgement of a DATA packet, travelling receiver → sender.
    Ack,
    /// A segment of the transferred file, travelling sender → receiver.
    Data,
    /// End of transmission, sent by both ends to close the session.
    End,
}

impl PacketType {
    /// Numeric value written into the `type` header field.
    pub fn wire_value(self) -> u32 {
        match self {
            Self::Ack => 0,
            Self::Data => 1,
            Self::End => 2,
        }
    }

    /// Inverse of [`wire_value`](Self::wire_value).
    pub fn from_wire(value: u32) -> Result<Self, PacketError> {
        match value {
            0 => Ok(Self::Ack),
            1 => Ok(Self::Data),
            2 => Ok(Self::End),
            other => Err(PacketError::UnknownType(other)),
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack => f.write_str("ACK"),
            Self::Data => f.write_str("DATA"),
            Self::End => f.write_str("END"),
        }
    }
}

/// A complete protocol datagram: header fields + payload bytes.
///
/// The `length` header field is not stored; it is always `payload.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketType,
    /// 1-based segment number for DATA and ACK; zero for END.
    pub seqnum: u32,
    pub payload: Vec<u8>,
}

impl Packet {
    /// A DATA packet carrying `payload` as segment `seqnum`.
    pub fn data(seqnum: u32, payload: Vec<u8>) -> Self {
        Self {
            kind: PacketType::Data,
            seqnum,
            payload,
        }
    }

    /// An ACK for segment `seqnum`.
    pub fn ack(seqnum: u32) -> Self {
        Self {
            kind: PacketType::Ack,
            seqnum,
            payload: Vec::new(),
        }
    }

    /// An END packet.  The sequence number is unused and always zero.
    pub fn end() -> Self {
        Self {
            kind: PacketType::End,
            seqnum: 0,
            payload: Vec::new(),
        }
    }

    /// Serialise this packet into a newly allocated byte vector.
    ///
    /// Fails with [`PacketError::PayloadTooLarge`] if the payload exceeds
    /// [`MAX_PAYLOAD`].
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let len = self.payload.len();
        if len > MAX_PAYLOAD {
            return Err(PacketError::PayloadTooLarge(len));
        }

        let mut buf = vec![0u8; HEADER_LEN + len];
        buf[OFF_TYPE..OFF_TYPE + 4].copy_from_slice(&self.kind.wire_value().to_be_bytes());
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.seqnum.to_be_bytes());
        buf[OFF_LEN..OFF_LEN + 4].copy_from_slice(&(len as u32).to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        Ok(buf)
    }

    /// Parse a [`Packet`] from a raw byte slice.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`HEADER_LEN`],
    /// - the `type` field is not one of the known values,
    /// - the `length` field exceeds [`MAX_PAYLOAD`], or
    /// - the `length` field claims more bytes than follow the header.
    ///
    /// Bytes beyond `length` are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::BufferTooShort(buf.len()));
        }

        let kind = PacketType::from_wire(read_u32(buf, OFF_TYPE))?;
        let seqnum = read_u32(buf, OFF_SEQ);
        let declared = read_u32(buf, OFF_LEN) as usize;

        if declared > MAX_PAYLOAD {
            return Err(PacketError::PayloadTooLarge(declared));
        }
        let available = buf.len() - HEADER_LEN;
        if declared > available {
            return Err(PacketError::LengthMismatch {
                declared,
                available,
            });
        }

        Ok(Packet {
            kind,
            seqnum,
            payload: buf[HEADER_LEN..HEADER_LEN + declared].to_vec(),
        })
    }
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// Errors that can arise when building or parsing a datagram.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PacketError {
    /// Buffer shorter than the fixed header size.
    #[error("datagram of {0} bytes is shorter than the 12-byte header")]
    BufferTooShort(usize),
    /// `type` field holds a value no role understands.
    #[error("unknown packet type {0}")]
    UnknownType(u32),
    /// Payload (or declared length) above [`MAX_PAYLOAD`].
    #[error("payload of {0} bytes exceeds the 500-byte limit")]
    PayloadTooLarge(usize),
    /// `length` field claims more bytes than the datagram holds.
    #[error("length field claims {declared} bytes but only {available} follow the header")]
    LengthMismatch { declared: usize, available: usize },
}

//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! [`crate::packet::Packet`] instead of raw bytes.  The emulator additionally
//! needs the untouched datagram so it can forward it verbatim, hence
//! [`Socket::recv_raw`] / [`Socket::send_raw`].  All protocol logic lives
//! elsewhere; this module owns only byte I/O.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::packet::{Packet, PacketError, MAX_DATAGRAM};

/// Errors that can arise from socket operations.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The received datagram could not be decoded as a valid packet, or the
    /// outbound packet could not be encoded.
    #[error("packet codec error: {0}")]
    Packet(#[from] PacketError),
}

impl SocketError {
    /// `true` for errors caused by a bad datagram rather than the OS.
    ///
    /// Every receive loop discards these and keeps going.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Packet(_))
    }

    /// `true` if the error is likely transient and the loop may carry on.
    ///
    /// Some platforms report an ICMP port-unreachable for an earlier send as
    /// a reset on the next receive; that says nothing about this socket.
    pub fn is_transient(&self) -> bool {
        use std::io::ErrorKind;
        match self {
            Self::Packet(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                ErrorKind::WouldBlock
                    | ErrorKind::Interrupted
                    | ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
            ),
        }
    }
}

/// An async, packet-oriented UDP socket.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing port `0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Encode `packet` and send it as a single UDP datagram to `dest`.
    pub async fn send_to(&self, packet: &Packet, dest: SocketAddr) -> Result<(), SocketError> {
        let bytes = packet.encode()?;
        self.inner.send_to(&bytes, dest).await?;
        Ok(())
    }

    /// Send already-encoded bytes unchanged.
    pub async fn send_raw(&self, datagram: &[u8], dest: SocketAddr) -> Result<(), SocketError> {
        self.inner.send_to(datagram, dest).await?;
        Ok(())
    }

    /// Receive the next datagram and decode it into a [`Packet`].
    ///
    /// Returns `(packet, source_address)`.  Datagrams that fail to decode are
    /// returned as `Err`; the caller decides whether to keep receiving.
    pub async fn recv_from(&self) -> Result<(Packet, SocketAddr), SocketError> {
        let (datagram, addr) = self.recv_raw().await?;
        let packet = Packet::decode(&datagram)?;
        Ok((packet, addr))
    }

    /// Receive the next datagram without interpreting it.
    pub async fn recv_raw(&self) -> Result<(Vec<u8>, SocketAddr), SocketError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (n, addr) = self.inner.recv_from(&mut buf).await?;
        buf.truncate(n);
        Ok((buf, addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn loopback() -> Socket {
        Socket::bind("127.0.0.1:0".parse().unwrap()).await.expect("bind")
    }

    #[tokio::test]
    async fn packet_crosses_loopback() {
        let a = loopback().await;
        let b = loopback().await;

        a.send_to(&Packet::data(3, b"abc".to_vec()), b.local_addr)
            .await
            .unwrap();
        let (pkt, from) = b.recv_from().await.unwrap();
        assert_eq!(pkt, Packet::data(3, b"abc".to_vec()));
        assert_eq!(from, a.local_addr);
    }

    #[tokio::test]
    async fn short_datagram_surfaces_as_malformed() {
        let a = loopback().await;
        let b = loopback().await;

        a.send_raw(&[1, 2, 3], b.local_addr).await.unwrap();
        let err = b.recv_from().await.unwrap_err();
        assert!(err.is_malformed(), "unexpected error: {err}");

        // The socket stays usable afterwards.
        a.send_to(&Packet::end(), b.local_addr).await.unwrap();
        assert_eq!(b.recv_from().await.unwrap().0, Packet::end());
    }

    #[tokio::test]
    async fn raw_receive_returns_exact_bytes() {
        let a = loopback().await;
        let b = loopback().await;

        let bytes = Packet::ack(9).encode().unwrap();
        a.send_raw(&bytes, b.local_addr).await.unwrap();
        let (got, _) = b.recv_raw().await.unwrap();
        assert_eq!(got, bytes);
    }
}

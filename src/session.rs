//! Async drivers that run the endpoint state machines over a [`Socket`].
//!
//! Each driver is a single loop with one suspension point, the socket
//! receive.  In [`send_file`] that receive is bounded by the sender's
//! retransmission deadline; in [`receive_file`] it blocks indefinitely.
//! Malformed datagrams are dropped at the receive and never reach the
//! state machines.

use std::future::Future;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::time::{timeout_at, Instant};

use crate::artifacts::write_log;
use crate::config::{ReceiverConfig, SenderConfig};
use crate::packet::PacketType;
use crate::receiver::{Receiver, ReceiverReport};
use crate::sender::{Sender, SenderAction, SenderReport};
use crate::socket::{Socket, SocketError};

/// Errors that end a transfer early.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Socket(#[from] SocketError),
    /// The retry policy gave up on the in-flight packet.
    #[error("gave up on {kind} {seqnum} after {retries} retransmission(s)")]
    RetriesExhausted {
        kind: PacketType,
        seqnum: u32,
        retries: u32,
    },
    /// An output file or log could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        source: std::io::Error,
    },
}

async fn persist<F>(path: &Path, write: F) -> Result<(), SessionError>
where
    F: Future<Output = std::io::Result<()>>,
{
    write.await.map_err(|source| SessionError::Artifact {
        path: path.to_path_buf(),
        source,
    })
}

/// Reliably deliver `data` through the emulator named in `config`.
///
/// Returns once the receiver has answered END, after the sequence-number
/// and acknowledgement logs have been written.
pub async fn send_file(
    socket: &Socket,
    data: &[u8],
    config: &SenderConfig,
) -> Result<SenderReport, SessionError> {
    let mut sender = Sender::new(data, config.timeout, config.retry);
    if let Some(first) = sender.start(Instant::now()) {
        socket.send_to(&first, config.emulator).await?;
    }

    while !sender.is_done() {
        let Some(deadline) = sender.deadline() else {
            break;
        };

        let action = match timeout_at(deadline, socket.recv_from()).await {
            Ok(Ok((packet, _from))) => sender.on_packet(&packet, Instant::now()),
            Ok(Err(e)) if e.is_transient() => {
                log::debug!("[sender] dropping bad datagram: {e}");
                continue;
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_elapsed) => {
                let (kind, seqnum) = sender
                    .in_flight()
                    .map_or((PacketType::End, 0), |p| (p.kind, p.seqnum));
                sender
                    .on_timeout(Instant::now())
                    .map_err(|e| SessionError::RetriesExhausted {
                        kind,
                        seqnum,
                        retries: e.retries,
                    })?
            }
        };

        if let SenderAction::Transmit(packet) = action {
            socket.send_to(&packet, config.emulator).await?;
        }
    }

    let report = sender.into_report();
    persist(&config.seqnum_log, write_log(&config.seqnum_log, &report.seqnum_log)).await?;
    persist(&config.ack_log, write_log(&config.ack_log, &report.ack_log)).await?;
    log::info!(
        "[sender] delivered {} segment(s) with {} retransmission(s)",
        report.segments,
        report.retransmissions
    );
    Ok(report)
}

/// Receive one file through the emulator named in `config`.
///
/// On END the reassembled output and the arrival log are written first,
/// then END is sent back and the function returns.
pub async fn receive_file(
    socket: &Socket,
    config: &ReceiverConfig,
) -> Result<ReceiverReport, SessionError> {
    let mut receiver = Receiver::new();

    loop {
        let packet = match socket.recv_from().await {
            Ok((packet, _from)) => packet,
            Err(e) if e.is_transient() => {
                log::debug!("[receiver] dropping bad datagram: {e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let Some(reply) = receiver.on_packet(&packet) else {
            continue;
        };

        if receiver.is_terminated() {
            let output = receiver.assembled();
            persist(&config.output, tokio::fs::write(&config.output, &output)).await?;
            persist(
                &config.arrival_log,
                write_log(&config.arrival_log, receiver.arrival_log()),
            )
            .await?;
            socket.send_to(&reply, config.emulator).await?;

            let report = receiver.report();
            log::info!(
                "[receiver] wrote {} byte(s) from {} segment(s) to {}",
                report.bytes,
                report.segments,
                config.output.display()
            );
            return Ok(report);
        }

        socket.send_to(&reply, config.emulator).await?;
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use super::*;
    use crate::packet::Packet;
    use crate::timer::RetryPolicy;

    const RTO: Duration = Duration::from_secs(30);

    async fn loopback() -> Socket {
        Socket::bind("127.0.0.1:0".parse::<SocketAddr>().unwrap())
            .await
            .expect("bind")
    }

    fn log_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rdt-session-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_exhausts_bounded_retries() {
        let sender = loopback().await;
        let peer = loopback().await;
        let cfg = SenderConfig::new(peer.local_addr, RTO)
            .with_log_dir(&log_dir("silent"))
            .with_retry(RetryPolicy::bounded(2));

        let started = Instant::now();
        let err = send_file(&sender, b"x", &cfg).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::RetriesExhausted {
                kind: PacketType::Data,
                seqnum: 1,
                retries: 2
            }
        ));
        // Original transmission plus two resends, each given a full timeout.
        assert!(started.elapsed() >= RTO * 3);
        assert!(!cfg.seqnum_log.exists());

        for _ in 0..3 {
            let (pkt, _) = peer.recv_from().await.unwrap();
            assert_eq!(pkt, Packet::data(1, b"x".to_vec()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_data_is_resent_after_timeout() {
        let sender = loopback().await;
        let peer = loopback().await;
        let cfg = SenderConfig::new(peer.local_addr, RTO).with_log_dir(&log_dir("resend"));

        // Ignores the first DATA, acknowledges the resend, then closes.
        let responder = tokio::spawn(async move {
            let (first, _) = peer.recv_from().await.unwrap();
            let (again, from) = peer.recv_from().await.unwrap();
            assert_eq!(first, again);
            peer.send_to(&Packet::ack(1), from).await.unwrap();
            let (end, from) = peer.recv_from().await.unwrap();
            assert_eq!(end, Packet::end());
            peer.send_to(&Packet::end(), from).await.unwrap();
        });

        let started = Instant::now();
        let report = send_file(&sender, b"hello", &cfg).await.unwrap();
        responder.await.unwrap();

        assert!(started.elapsed() >= RTO);
        assert_eq!(report.seqnum_log, vec![1, 1]);
        assert_eq!(report.ack_log, vec![1]);
        assert_eq!(report.retransmissions, 1);
        assert_eq!(
            std::fs::read_to_string(&cfg.seqnum_log).unwrap(),
            "1\n1\n"
        );
    }
}

//! End-to-end transfers over loopback.
//!
//! Each test binds three real UDP sockets on `127.0.0.1`, runs the emulator
//! and the receiver as background tokio tasks, and drives the sender in the
//! test body.  Artifacts land in a per-test temp directory.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rdt_over_udp::artifacts::parse_log;
use rdt_over_udp::config::{ReceiverConfig, SenderConfig};
use rdt_over_udp::loss::{Bernoulli, LossModel, NoLoss, ScriptedLoss};
use rdt_over_udp::packet::MAX_PAYLOAD;
use rdt_over_udp::receiver::ReceiverReport;
use rdt_over_udp::sender::SenderReport;
use rdt_over_udp::timer::RetryPolicy;
use rdt_over_udp::{receive_file, send_file, Emulator, PacketType, SessionError, Socket};
use tokio::task::JoinHandle;

const DEADLINE: Duration = Duration::from_secs(20);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "rdt-over-udp-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn read_log(path: &Path) -> Vec<u32> {
    let text = std::fs::read_to_string(path).expect("read log");
    parse_log(&text).expect("parse log")
}

async fn loopback() -> Socket {
    Socket::bind("127.0.0.1:0".parse::<SocketAddr>().unwrap())
        .await
        .expect("bind loopback socket")
}

/// The three sockets of one transfer, with the emulator already relaying.
struct Topology {
    emulator: SocketAddr,
    sender: Socket,
    receiver: Socket,
    relay: JoinHandle<()>,
}

async fn topology<L: LossModel + 'static>(loss: L) -> Topology {
    let sender = loopback().await;
    let receiver = loopback().await;
    let emu_socket = loopback().await;
    let emulator = emu_socket.local_addr;

    let relay = Emulator::new(receiver.local_addr, sender.local_addr, loss);
    let relay = tokio::spawn(async move {
        relay.run(emu_socket).await.expect("emulator socket failed");
    });

    Topology {
        emulator,
        sender,
        receiver,
        relay,
    }
}

struct Outcome {
    sent: SenderReport,
    received: ReceiverReport,
    output: Vec<u8>,
    dir: PathBuf,
}

async fn transfer<L: LossModel + 'static>(
    name: &str,
    loss: L,
    data: &[u8],
    timeout: Duration,
) -> Outcome {
    let dir = unique_temp_dir(name);
    let Topology {
        emulator,
        sender,
        receiver,
        relay,
    } = topology(loss).await;

    let rcfg = ReceiverConfig::new(emulator, dir.join("output.bin")).with_log_dir(&dir);
    let scfg = SenderConfig::new(emulator, timeout).with_log_dir(&dir);

    let receiver_task = tokio::spawn(async move { receive_file(&receiver, &rcfg).await });

    let sent = tokio::time::timeout(DEADLINE, send_file(&sender, data, &scfg))
        .await
        .expect("sender timed out")
        .expect("sender failed");
    let received = tokio::time::timeout(DEADLINE, receiver_task)
        .await
        .expect("receiver timed out")
        .expect("receiver task panicked")
        .expect("receiver failed");
    relay.abort();

    let output = std::fs::read(dir.join("output.bin")).expect("read output");
    Outcome {
        sent,
        received,
        output,
        dir,
    }
}

/// 500 × 'A', 500 × 'B', then a single 'C'.
fn three_chunks() -> Vec<u8> {
    let mut data = vec![b'A'; MAX_PAYLOAD];
    data.extend(vec![b'B'; MAX_PAYLOAD]);
    data.push(b'C');
    data
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn three_chunk_file_over_lossless_link() {
    let data = three_chunks();
    let out = transfer("clean", Bernoulli::new(0.0, None), &data, Duration::from_millis(300)).await;

    assert_eq!(out.output, data);
    assert_eq!(out.sent.seqnum_log, vec![1, 2, 3]);
    assert_eq!(out.sent.ack_log, vec![1, 2, 3]);
    assert_eq!(out.received.arrival_log, vec![1, 2, 3]);

    // The same sequences must be on disk.
    assert_eq!(read_log(&out.dir.join("seqnum.log")), vec![1, 2, 3]);
    assert_eq!(read_log(&out.dir.join("ack.log")), vec![1, 2, 3]);
    assert_eq!(read_log(&out.dir.join("arrival.log")), vec![1, 2, 3]);
}

#[tokio::test]
async fn lost_segment_is_retransmitted_once() {
    let data = three_chunks();
    let out = transfer(
        "lossy",
        ScriptedLoss::drop_first([2]),
        &data,
        Duration::from_millis(300),
    )
    .await;

    assert_eq!(out.sent.seqnum_log, vec![1, 2, 2, 3]);
    assert_eq!(out.sent.ack_log, vec![1, 2, 3]);
    assert_eq!(out.sent.retransmissions, 1);
    // The dropped copy never reached the receiver.
    assert_eq!(out.received.arrival_log, vec![1, 2, 3]);
    assert_eq!(out.output, data, "retransmission must not duplicate data");
    assert_eq!(read_log(&out.dir.join("seqnum.log")), vec![1, 2, 2, 3]);
}

#[tokio::test]
async fn empty_file_completes_handshake() {
    let out = transfer("empty", NoLoss, b"", Duration::from_millis(300)).await;

    assert!(out.output.is_empty());
    assert_eq!(out.sent.segments, 1);
    assert_eq!(out.sent.seqnum_log, vec![1]);
    assert_eq!(out.sent.ack_log, vec![1]);
    assert_eq!(out.received.arrival_log, vec![1]);
    assert_eq!(out.received.bytes, 0);
}

#[tokio::test]
async fn random_loss_still_delivers_binary_file() {
    let data: Vec<u8> = (0..20_000u32).map(|i| (i * 31 % 251) as u8).collect();
    let segments = data.len().div_ceil(MAX_PAYLOAD) as u32;

    let out = transfer(
        "random",
        Bernoulli::new(0.3, Some(0x5eed)),
        &data,
        Duration::from_millis(50),
    )
    .await;

    assert_eq!(out.output, data);
    assert_eq!(out.sent.ack_log, (1..=segments).collect::<Vec<_>>());
    assert!(out.sent.seqnum_log.len() >= segments as usize);
    // The sender log never skips ahead of an unacknowledged segment.
    assert!(out.sent.seqnum_log.windows(2).all(|w| w[1] == w[0] || w[1] == w[0] + 1));
    // Everything the receiver saw is a transmission the sender made.
    assert!(out.received.arrival_log.len() <= out.sent.seqnum_log.len());
}

#[tokio::test]
async fn malformed_datagrams_do_not_disturb_transfer() {
    let dir = unique_temp_dir("malformed");
    let Topology {
        emulator,
        sender,
        receiver,
        relay,
    } = topology(NoLoss).await;

    // Garbage aimed at every role before the transfer starts.
    let noise = loopback().await;
    for target in [emulator, receiver.local_addr, sender.local_addr] {
        noise.send_raw(&[0xff; 5], target).await.unwrap();
        noise.send_raw(&[0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 1, 0], target).await.unwrap();
    }

    let rcfg = ReceiverConfig::new(emulator, dir.join("out.txt")).with_log_dir(&dir);
    let scfg = SenderConfig::new(emulator, Duration::from_millis(300)).with_log_dir(&dir);
    let receiver_task = tokio::spawn(async move { receive_file(&receiver, &rcfg).await });

    let sent = tokio::time::timeout(DEADLINE, send_file(&sender, b"still fine", &scfg))
        .await
        .expect("sender timed out")
        .expect("sender failed");
    let received = tokio::time::timeout(DEADLINE, receiver_task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    relay.abort();

    assert_eq!(sent.ack_log, vec![1]);
    assert_eq!(received.arrival_log, vec![1]);
    assert_eq!(std::fs::read(dir.join("out.txt")).unwrap(), b"still fine");
}

#[tokio::test]
async fn bounded_retries_give_up_on_dead_link() {
    let dir = unique_temp_dir("dead");
    let Topology {
        emulator,
        sender,
        receiver,
        relay,
    } = topology(Bernoulli::new(1.0, None)).await;

    let rcfg = ReceiverConfig::new(emulator, dir.join("never.bin")).with_log_dir(&dir);
    let receiver_task = tokio::spawn(async move { receive_file(&receiver, &rcfg).await });

    let scfg = SenderConfig::new(emulator, Duration::from_millis(30))
        .with_log_dir(&dir)
        .with_retry(RetryPolicy::bounded(3));
    let result = tokio::time::timeout(DEADLINE, send_file(&sender, b"lost", &scfg))
        .await
        .expect("sender should give up, not hang");

    match result {
        Err(SessionError::RetriesExhausted {
            kind,
            seqnum,
            retries,
        }) => {
            assert_eq!(kind, PacketType::Data);
            assert_eq!(seqnum, 1);
            assert_eq!(retries, 3);
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }

    // Nothing ever reached the receiver, so it is still waiting.
    assert!(!receiver_task.is_finished());
    receiver_task.abort();
    relay.abort();
    assert!(!dir.join("never.bin").exists());
}

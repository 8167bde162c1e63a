//! Entry point for `rdt-over-udp`.
//!
//! Parses CLI arguments and dispatches into **sender**, **receiver** or
//! **emulator** mode.  All protocol work is delegated to library modules;
//! `main.rs` owns only process setup (logging, argument parsing, address
//! resolution, reading the input file).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rdt_over_udp::config::{self, EmulatorConfig, ReceiverConfig, SenderConfig};
use rdt_over_udp::timer::RetryPolicy;
use rdt_over_udp::{receive_file, send_file, Emulator, Socket};

/// Stop-and-wait reliable file transfer over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Log protocol events (per-packet trace in emulator mode).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Send a file through the emulator.
    Sender {
        /// Emulator address (e.g. localhost:9991).
        #[arg(short, long)]
        emulator: String,
        /// Local UDP port to bind.
        #[arg(short, long)]
        port: u16,
        /// Retransmission timeout in milliseconds.
        #[arg(short, long = "timeout-ms", default_value_t = 100)]
        timeout_ms: u64,
        /// File to transfer.
        #[arg(short, long)]
        file: PathBuf,
        /// Directory for seqnum.log and ack.log.
        #[arg(long, default_value = ".")]
        log_dir: PathBuf,
        /// Give up after this many retransmissions of one packet.
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// Receive a file through the emulator.
    Receiver {
        /// Emulator address (e.g. localhost:9993).
        #[arg(short, long)]
        emulator: String,
        /// Local UDP port to bind.
        #[arg(short, long)]
        port: u16,
        /// Where to write the reassembled file.
        #[arg(short, long)]
        output: PathBuf,
        /// Directory for arrival.log.
        #[arg(long, default_value = ".")]
        log_dir: PathBuf,
    },
    /// Relay packets between sender and receiver, dropping DATA at random.
    Emulator {
        /// Local UDP port to bind.
        #[arg(short, long)]
        port: u16,
        /// Receiver address DATA is forwarded to.
        #[arg(short, long)]
        receiver: String,
        /// Sender address ACKs are forwarded to.
        #[arg(short, long)]
        sender: String,
        /// Probability in [0, 1] of discarding each DATA packet.
        #[arg(short, long = "drop-probability")]
        drop_probability: f64,
        /// Seed for reproducible loss.
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise -v selects info.
    let default_level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();

    match cli.mode {
        Mode::Sender {
            emulator,
            port,
            timeout_ms,
            file,
            log_dir,
            max_retries,
        } => {
            let emulator = config::resolve(&emulator).await?;
            let retry = max_retries.map_or_else(RetryPolicy::unbounded, RetryPolicy::bounded);
            let cfg = SenderConfig::new(emulator, Duration::from_millis(timeout_ms))
                .with_log_dir(&log_dir)
                .with_retry(retry);
            cfg.validate()?;

            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("cannot read input file {}", file.display()))?;
            let socket = Socket::bind(config::bind_addr(port))
                .await
                .with_context(|| format!("cannot bind UDP port {port}"))?;
            log::info!(
                "Sending {} ({} bytes) from {} via {emulator}",
                file.display(),
                data.len(),
                socket.local_addr
            );

            send_file(&socket, &data, &cfg).await?;
        }
        Mode::Receiver {
            emulator,
            port,
            output,
            log_dir,
        } => {
            let emulator = config::resolve(&emulator).await?;
            let cfg = ReceiverConfig::new(emulator, output).with_log_dir(&log_dir);

            let socket = Socket::bind(config::bind_addr(port))
                .await
                .with_context(|| format!("cannot bind UDP port {port}"))?;
            log::info!("Receiving on {} via {emulator}", socket.local_addr);

            receive_file(&socket, &cfg).await?;
        }
        Mode::Emulator {
            port,
            receiver,
            sender,
            drop_probability,
            seed,
        } => {
            let cfg = EmulatorConfig {
                receiver: config::resolve(&receiver).await?,
                sender: config::resolve(&sender).await?,
                drop_probability,
                seed,
            };
            cfg.validate()?;

            let socket = Socket::bind(config::bind_addr(port))
                .await
                .with_context(|| format!("cannot bind UDP port {port}"))?;

            Emulator::new(cfg.receiver, cfg.sender, cfg.loss_model())
                .run(socket)
                .await?;
        }
    }

    Ok(())
}

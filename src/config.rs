//! Per-role configuration.
//!
//! `main` builds one of these structs from the command line, validates it
//! and only then opens sockets.  Library callers (and the integration tests)
//! construct them directly.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::loss::Bernoulli;
use crate::timer::RetryPolicy;

/// File name of the sender's transmission log.
pub const SEQNUM_LOG: &str = "seqnum.log";
/// File name of the sender's acknowledgement log.
pub const ACK_LOG: &str = "ack.log";
/// File name of the receiver's arrival log.
pub const ARRIVAL_LOG: &str = "arrival.log";

/// Default retransmission timeout when none is given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Fatal configuration problems, reported before any protocol traffic.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("retransmission timeout must be greater than zero")]
    ZeroTimeout,
    #[error("drop probability {0} is not within [0, 1]")]
    DropProbability(f64),
    #[error("cannot resolve address {addr:?}: {reason}")]
    Resolve { addr: String, reason: String },
}

/// Resolve `host:port` to a single socket address, preferring IPv4.
pub async fn resolve(addr: &str) -> Result<SocketAddr, ConfigError> {
    let resolve_err = |reason: String| ConfigError::Resolve {
        addr: addr.to_string(),
        reason,
    };
    let candidates: Vec<SocketAddr> = tokio::net::lookup_host(addr)
        .await
        .map_err(|e| resolve_err(e.to_string()))?
        .collect();
    candidates
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| resolve_err("no addresses found".into()))
}

/// Wildcard address for binding a role's socket to `port`.
pub fn bind_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], port))
}

/// Settings for the sending process.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Where every outbound packet is sent.
    pub emulator: SocketAddr,
    /// Fixed retransmission timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub seqnum_log: PathBuf,
    pub ack_log: PathBuf,
}

impl SenderConfig {
    /// Logs go to the current directory; retries are unbounded.
    pub fn new(emulator: SocketAddr, timeout: Duration) -> Self {
        Self {
            emulator,
            timeout,
            retry: RetryPolicy::unbounded(),
            seqnum_log: PathBuf::from(SEQNUM_LOG),
            ack_log: PathBuf::from(ACK_LOG),
        }
    }

    pub fn with_log_dir(mut self, dir: &Path) -> Self {
        self.seqnum_log = dir.join(SEQNUM_LOG);
        self.ack_log = dir.join(ACK_LOG);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Settings for the receiving process.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Where ACK and END replies are sent.
    pub emulator: SocketAddr,
    /// Reassembled file.
    pub output: PathBuf,
    pub arrival_log: PathBuf,
}

impl ReceiverConfig {
    pub fn new(emulator: SocketAddr, output: impl Into<PathBuf>) -> Self {
        Self {
            emulator,
            output: output.into(),
            arrival_log: PathBuf::from(ARRIVAL_LOG),
        }
    }

    pub fn with_log_dir(mut self, dir: &Path) -> Self {
        self.arrival_log = dir.join(ARRIVAL_LOG);
        self
    }
}

/// Settings for the emulator process.
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Forwarding target for DATA and the sender's END.
    pub receiver: SocketAddr,
    /// Forwarding target for ACK and the receiver's END.
    pub sender: SocketAddr,
    pub drop_probability: f64,
    /// Fixed RNG seed for reproducible loss; OS entropy when `None`.
    pub seed: Option<u64>,
}

impl EmulatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = self.drop_probability;
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::DropProbability(p));
        }
        Ok(())
    }

    pub fn loss_model(&self) -> Bernoulli {
        Bernoulli::new(self.drop_probability, self.seed)
    }
}

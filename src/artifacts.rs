//! Sequence-number log files.
//!
//! All three logs (`seqnum.log`, `ack.log`, `arrival.log`) share one format:
//! one decimal seqnum per line, in event order, newline-terminated.

use std::num::ParseIntError;
use std::path::Path;

/// Render `entries` in log format.
pub fn render_log(entries: &[u32]) -> String {
    entries.iter().map(|seq| format!("{seq}\n")).collect()
}

/// Parse a log written by [`write_log`].  Blank lines are skipped.
pub fn parse_log(text: &str) -> Result<Vec<u32>, ParseIntError> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.trim().parse())
        .collect()
}

/// Write `entries` to `path`, replacing any previous contents.
pub async fn write_log(path: &Path, entries: &[u32]) -> std::io::Result<()> {
    tokio::fs::write(path, render_log(entries)).await
}

//! Line-oriented output sink for delivery records and statistics blocks.
//!
//! Writers hand over a whole block at once; the sink serializes concurrent writers so lines from
//! different workers never interleave.

use parking_lot::Mutex;
use std::io::{self, Write};
use tracing::warn;

pub trait LogSink: Send + Sync {
    /// Write `lines` as one uninterrupted block and flush.
    fn write_block(&self, lines: &[String]);

    fn write_line(&self, line: String) {
        self.write_block(std::slice::from_ref(&line));
    }
}

/// Sink writing to standard output.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    // Serializes writers across the whole block, not just per line.
    guard: Mutex<()>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogSink for ConsoleSink {
    fn write_block(&self, lines: &[String]) {
        let _guard = self.guard.lock();
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let result = lines
            .iter()
            .try_for_each(|line| writeln!(out, "{line}"))
            .and_then(|()| out.flush());
        if let Err(err) = result {
            warn!(%err, "console sink write failed");
        }
    }
}

/// Sink keeping every line in memory; used by tests and benchmarks.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
    blocks: Mutex<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every line written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Number of blocks written so far.
    pub fn blocks(&self) -> usize {
        *self.blocks.lock()
    }

    /// Number of lines starting with `prefix`.
    pub fn count_prefixed(&self, prefix: &str) -> usize {
        self.lines
            .lock()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }
}

impl LogSink for MemorySink {
    fn write_block(&self, lines: &[String]) {
        let mut stored = self.lines.lock();
        stored.extend_from_slice(lines);
        *self.blocks.lock() += 1;
    }
}

/// Sink discarding everything; used when only counters matter.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn write_block(&self, _lines: &[String]) {}
}

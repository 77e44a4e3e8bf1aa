//! Trace Sinks and Run Cancellation.
//!
//! A trace sink receives one text block per executed instruction. Sinks are
//! shared between harts, so every block is written under the sink's own
//! lock and blocks never interleave.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Destination of instruction trace blocks.
pub trait TraceSink: Send + Sync {
    /// Writes one complete block (one or more newline-terminated lines).
    fn emit(&self, block: &str);
}

/// Sink writing to any byte stream (file, stdout).
pub struct WriterSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl WriterSink {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Creates a sink writing to `path`, or to stdout for `-`.
    pub fn open(path: &str) -> std::io::Result<Self> {
        if path == "-" {
            return Ok(Self::new(Box::new(std::io::stdout())));
        }
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(std::io::BufWriter::new(file))))
    }

    pub fn flush(&self) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = out.flush() {
            log::warn!("Failed to flush trace: {}", e);
        }
    }
}

impl TraceSink for WriterSink {
    fn emit(&self, block: &str) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = out.write_all(block.as_bytes()) {
            log::warn!("Failed to write trace: {}", e);
        }
    }
}

impl Drop for WriterSink {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Sink collecting blocks in memory.
#[derive(Default)]
pub struct MemorySink {
    blocks: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every line emitted so far.
    pub fn lines(&self) -> Vec<String> {
        let blocks = self.blocks.lock().unwrap_or_else(|e| e.into_inner());
        blocks
            .iter()
            .flat_map(|b| b.lines().map(str::to_string))
            .collect()
    }

    /// Removes and returns the blocks emitted so far.
    pub fn take(&self) -> Vec<String> {
        let mut blocks = self.blocks.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *blocks)
    }
}

impl TraceSink for MemorySink {
    fn emit(&self, block: &str) {
        let mut blocks = self.blocks.lock().unwrap_or_else(|e| e.into_inner());
        blocks.push(block.to_string());
    }
}

/// Cooperative stop request checked by the run loop once per instruction.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

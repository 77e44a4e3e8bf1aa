//! Simulation harness support: program loading and trace output.

/// Flat binary and hex image loading.
pub mod loader;

/// Trace sinks and run cancellation.
pub mod trace;

pub use trace::{CancelToken, MemorySink, TraceSink, WriterSink};

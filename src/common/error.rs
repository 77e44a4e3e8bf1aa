//! Error Types and Stop Signals.
//!
//! `SimError` covers everything that can go wrong outside of simulated
//! execution: reading configuration, loading images, configuring CSRs.
//! `CoreStop` is the value that unwinds the run loop when the target asks the
//! simulator to stop (to-host write, exit) or when the simulator detects a
//! runaway condition. Architectural exceptions are not errors at all: they
//! are handled by the trap engine and never leave the core.

use thiserror::Error;

/// Errors raised by configuration, loading and setup code.
#[derive(Debug, Error)]
pub enum SimError {
    /// Reading or writing a file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The TOML configuration could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The configuration parsed but describes an unsupported core.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A hex image line could not be parsed.
    #[error("Invalid hex image at line {line}: {msg}")]
    HexParse { line: usize, msg: String },

    /// A CSR name did not match any known register.
    #[error("Unknown CSR '{0}'")]
    UnknownCsr(String),

    /// An image does not fit in the simulated memory.
    #[error("Image of {size} bytes does not fit in memory at {addr:#x}")]
    ImageOutOfBounds { addr: u64, size: usize },
}

/// Flavor of a run-loop stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopKind {
    /// Simulation stop requested by the target or by the simulator.
    /// A value of 1 means success.
    Stop,

    /// Target program exit. A value of 0 means success.
    Exit,
}

/// Non-local stop signal returned up through execution and the run loop.
#[derive(Clone, Debug, Error)]
#[error("{message} (address {address:#x}, value {value:#x})")]
pub struct CoreStop {
    pub kind: StopKind,
    pub message: String,
    pub address: u64,
    pub value: u64,
}

impl CoreStop {
    /// Creates a stop signal.
    pub fn stop(message: impl Into<String>, address: u64, value: u64) -> Self {
        Self {
            kind: StopKind::Stop,
            message: message.into(),
            address,
            value,
        }
    }

    /// Creates an exit signal carrying the target's exit code.
    pub fn exit(message: impl Into<String>, value: u64) -> Self {
        Self {
            kind: StopKind::Exit,
            message: message.into(),
            address: 0,
            value,
        }
    }

    /// Returns true if the stop denotes a successful run.
    pub fn is_success(&self) -> bool {
        match self.kind {
            StopKind::Stop => self.value == 1,
            StopKind::Exit => self.value == 0,
        }
    }
}

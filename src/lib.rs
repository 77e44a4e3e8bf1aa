//! RISC-V Hart Simulator Library.
//!
//! This crate implements an instruction-accurate simulator of a single
//! RISC-V hart (RV32 or RV64, extensions I, M, A, F, D, C and a
//! bit-manipulation subset). It is meant to be driven by a test bench: it
//! can run programs to completion, single-step, report what an instruction
//! would change, and roll back memory transactions that the memory system
//! reports as failed after they retired.
//!
//! # Architecture
//!
//! * **Core**: fetch/decode/execute of one instruction at a time, Machine
//!   mode traps, NMIs, debug mode and triggers.
//! * **Memory**: a trait with a flat implementation carrying closely-coupled
//!   memory and memory-mapped register regions.
//! * **Tracing**: one text block per instruction listing every change.
//!
//! # Modules
//!
//! * `common`: Shared types and error handling.
//! * `config`: Configuration loading and parsing.
//! * `core`: Hart core implementation.
//! * `isa`: Instruction decoding, expansion and disassembly.
//! * `sim`: Program loading, trace sinks and cancellation.
//! * `soc`: Memory collaborators.
//! * `stats`: Run statistics and instruction-frequency profile.

/// Shared types, error handling and stop signals.
pub mod common;

/// Configuration of the core, its memory and CSR overrides.
///
/// Loads and validates TOML configuration files.
pub mod config;

/// Hart core implementation.
///
/// Architectural state, execution units, triggers, performance counters,
/// load/store queues and the run loops.
pub mod core;

/// Instruction Set Architecture definitions and decoders.
///
/// Implements RV32/RV64 IMAFDC decoding, compressed-instruction expansion
/// and disassembly for traces.
pub mod isa;

/// Program loaders, trace sinks and run cancellation.
pub mod sim;

/// Memory trait and the flat memory implementation.
pub mod soc;

/// Run statistics and instruction-frequency profiling.
pub mod stats;

pub use crate::core::{ChangeRecord, Core, StopReason};

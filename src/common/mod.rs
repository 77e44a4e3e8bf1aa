//! Common utilities and types used throughout the hart simulator.
//!
//! This module provides the error types, stop signals and memory access
//! classification shared by the core, the memory model and the front end.

/// Memory access type definitions.
pub mod data;

/// Error types and run-loop stop signals.
pub mod error;

pub use data::{AccessType, Xlen};
pub use error::{CoreStop, SimError, StopKind};

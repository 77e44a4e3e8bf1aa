//! Hart core.
//!
//! The core owns every piece of architectural state of one hart: register
//! files, CSRs, triggers, performance counters and the load/store queues.
//! Memory is reached through the [`crate::soc::Memory`] trait.

/// Architectural state: register files, CSRs, privilege modes, trap causes.
pub mod arch;

/// The `Core` type: fetch, execute, trap, rollback, run loops and tracing.
pub mod cpu;

/// Debug triggers.
pub mod debug;

/// Load and store queues used to roll back memory errors.
pub mod lsq;

/// Event-driven performance counters.
pub mod perf;

/// Execution units.
pub mod units;

pub use cpu::{ChangeRecord, Core, StopReason};

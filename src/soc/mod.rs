//! Memory system collaborators.
//!
//! The hart core reaches memory only through the [`Memory`] trait.
//! [`FlatMemory`] is the in-crate implementation: one contiguous block of
//! storage with closely-coupled memory and memory-mapped register regions
//! carved out of it.

/// Flat memory implementation.
pub mod memory;

/// The memory trait and its supporting types.
pub mod traits;

pub use memory::FlatMemory;
pub use traits::{LastWrite, Memory, RegionKind};

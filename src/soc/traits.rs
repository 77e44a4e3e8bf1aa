//! Memory Collaborator Interface.
//!
//! This module defines the interface the hart core consumes from the memory
//! system. The core never owns physical storage: it reads, writes and pokes
//! through this trait, asks it to classify addresses (closely-coupled data and
//! instruction memory, memory-mapped registers), and uses its last-write
//! record for trace diffs and store-queue snapshots. The trait also hands out
//! the mutex that serializes atomic read-modify-write sequences so that harts
//! sharing one memory observe atomics as indivisible.

use std::sync::{Arc, Mutex};

/// Kind of a specially-treated memory region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionKind {
    /// Data closely-coupled memory.
    Dccm,

    /// Instruction closely-coupled memory. Data accesses fail, fetches
    /// and pokes succeed.
    Iccm,

    /// Memory-mapped register block. Only aligned word accesses succeed
    /// and writes are filtered through per-register write masks.
    MappedRegs,
}

/// Record of the most recent successful write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LastWrite {
    /// Address of the write.
    pub addr: u64,

    /// Size of the write in bytes (1, 2, 4 or 8).
    pub size: usize,

    /// Value written.
    pub new_value: u64,

    /// Value held by the written bytes before the write.
    pub prev_value: u64,
}

/// Byte-addressable memory consumed by the hart core.
///
/// All multi-byte values are little-endian and `size` is one of 1, 2, 4
/// or 8. Reads and writes return `None`/`false` for any access the memory
/// model rejects (out of range, wrong region, wrong width); the core turns
/// those into access-fault exceptions.
pub trait Memory: Send {
    /// Returns the number of bytes of backing storage.
    fn size(&self) -> u64;

    /// Reads a data value.
    fn read(&self, addr: u64, size: usize) -> Option<u64>;

    /// Reads an instruction half-word or word.
    fn read_inst(&self, addr: u64, size: usize) -> Option<u64>;

    /// Writes a data value and records it as the last write.
    fn write(&mut self, addr: u64, size: usize, value: u64) -> bool;

    /// Checks whether a write would succeed without performing it.
    ///
    /// # Returns
    ///
    /// The value that would actually land in memory after write masking,
    /// or `None` if the write would fail.
    fn check_write(&self, addr: u64, size: usize, value: u64) -> Option<u64>;

    /// Backdoor write used by test benches and by rollback.
    ///
    /// Pokes ignore region restrictions and write masks and do not update
    /// the last-write record.
    fn poke(&mut self, addr: u64, size: usize, value: u64) -> bool;

    /// Declares a region of the given kind.
    ///
    /// # Returns
    ///
    /// `false` if the region does not fit in memory.
    fn define_region(&mut self, kind: RegionKind, base: u64, size: u64) -> bool;

    /// Returns true if the address lies in data closely-coupled memory.
    fn is_addr_in_dccm(&self, addr: u64) -> bool;

    /// Returns true if the address lies in instruction closely-coupled memory.
    fn is_addr_in_iccm(&self, addr: u64) -> bool;

    /// Returns true if the address lies in a memory-mapped register block.
    fn is_addr_in_mapped_regs(&self, addr: u64) -> bool;

    /// Returns the most recent successful write, if any since the last clear.
    fn last_write(&self) -> Option<LastWrite>;

    /// Forgets the last-write record.
    fn clear_last_write(&mut self);

    /// Returns the mutex serializing atomic memory operations.
    fn amo_lock(&self) -> Arc<Mutex<()>>;

    /// Restores memory-mapped registers to their reset values.
    fn reset_memory_mapped_registers(&mut self) {}
}

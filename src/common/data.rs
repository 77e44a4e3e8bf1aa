//! Memory Access Types.
//!
//! This module defines the classification of memory accesses used throughout
//! the simulator. The memory model uses it to apply region rules (instruction
//! closely-coupled memory, memory-mapped registers) and the core uses it to
//! pick the exception cause of a failed access.

/// Type of memory access operation.
///
/// Used to distinguish between instruction fetches, data reads,
/// and data writes for region checks and fault reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessType {
    /// Instruction fetch access.
    ///
    /// Allowed from regular memory and ICCM, never from memory-mapped
    /// register regions.
    Fetch,

    /// Data read access.
    ///
    /// Used by loads, load-reserved and the read half of atomics.
    Read,

    /// Data write access.
    ///
    /// Used by stores, store-conditional and the write half of atomics.
    Write,
}

impl AccessType {
    /// Returns a short lowercase name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            AccessType::Fetch => "fetch",
            AccessType::Read => "read",
            AccessType::Write => "write",
        }
    }
}

/// Register width of the simulated hart.
///
/// Register values are always held in `u64` storage. On RV32 they are kept
/// zero-extended, so every value produced by the core passes through
/// [`Xlen::truncate`] before it is committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Xlen {
    /// 32-bit registers.
    Rv32,

    /// 64-bit registers.
    Rv64,
}

impl Xlen {
    /// Builds an `Xlen` from a bit count (32 or 64).
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            32 => Some(Xlen::Rv32),
            64 => Some(Xlen::Rv64),
            _ => None,
        }
    }

    /// Returns the register width in bits.
    pub fn bits(self) -> u32 {
        match self {
            Xlen::Rv32 => 32,
            Xlen::Rv64 => 64,
        }
    }

    /// Returns a mask covering all register bits.
    pub fn mask(self) -> u64 {
        match self {
            Xlen::Rv32 => 0xffff_ffff,
            Xlen::Rv64 => u64::MAX,
        }
    }

    /// Drops the bits above the register width.
    #[inline]
    pub fn truncate(self, value: u64) -> u64 {
        value & self.mask()
    }

    /// Interprets a stored register value as a signed number.
    #[inline]
    pub fn signed(self, value: u64) -> i64 {
        match self {
            Xlen::Rv32 => value as u32 as i32 as i64,
            Xlen::Rv64 => value as i64,
        }
    }

    /// Returns the mask applied to shift amounts.
    pub fn shamt_mask(self) -> u32 {
        self.bits() - 1
    }

    /// Returns true for RV64.
    pub fn is_rv64(self) -> bool {
        self == Xlen::Rv64
    }
}

//! RISC-V General-Purpose Register File.
//!
//! This module implements the General-Purpose Register (GPR) file, containing
//! 32 registers (x0-x31). It enforces the architectural invariant that
//! register x0 is always hardwired to zero, keeps values truncated to the
//! configured register width, and remembers the last register written (with
//! its prior value) so that trace diffs and trigger undo can recover it.

use crate::common::Xlen;

/// ABI names of the integer registers.
pub const ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// General-Purpose Register file.
///
/// Contains 32 general-purpose registers (x0-x31) used for integer
/// operations. Register x0 is hardwired to zero and cannot be modified.
pub struct Gpr {
    regs: [u64; 32],
    xlen: Xlen,
    last_written: Option<(usize, u64)>,
}

impl Gpr {
    /// Creates a new general-purpose register file with all registers initialized to zero.
    ///
    /// # Arguments
    ///
    /// * `xlen` - Register width; written values are truncated to it.
    pub fn new(xlen: Xlen) -> Self {
        Self {
            regs: [0; 32],
            xlen,
            last_written: None,
        }
    }

    /// Reads a general-purpose register value.
    ///
    /// # Arguments
    ///
    /// * `idx` - Register index (0-31)
    ///
    /// # Returns
    ///
    /// The value stored in the specified register, zero-extended on RV32.
    /// Register x0 (index 0) always returns 0 regardless of storage.
    #[inline]
    pub fn read(&self, idx: usize) -> u64 {
        if idx == 0 {
            0
        } else {
            self.regs[idx]
        }
    }

    /// Writes a value to a general-purpose register and records it as the
    /// last written register.
    ///
    /// Writes to register x0 are silently ignored and never recorded.
    #[inline]
    pub fn write(&mut self, idx: usize, val: u64) {
        if idx != 0 {
            self.last_written = Some((idx, self.regs[idx]));
            self.regs[idx] = self.xlen.truncate(val);
        }
    }

    /// Sets a register without recording the change.
    ///
    /// # Returns
    ///
    /// `false` if the index is out of range.
    pub fn poke(&mut self, idx: usize, val: u64) -> bool {
        if idx >= 32 {
            return false;
        }
        if idx != 0 {
            self.regs[idx] = self.xlen.truncate(val);
        }
        true
    }

    /// Returns the index and prior value of the last written register.
    pub fn last_written(&self) -> Option<(usize, u64)> {
        self.last_written
    }

    /// Forgets the last written register.
    pub fn clear_last_written(&mut self) {
        self.last_written = None;
    }

    /// Zeroes every register.
    pub fn reset(&mut self) {
        self.regs = [0; 32];
        self.last_written = None;
    }

    /// Finds a register by ABI name (`a0`), architectural name (`x10`) or
    /// plain number.
    pub fn find(name: &str) -> Option<usize> {
        if let Some(ix) = ABI_NAMES.iter().position(|&n| n == name) {
            return Some(ix);
        }
        if name == "fp" {
            return Some(8);
        }
        let digits = name.strip_prefix('x').unwrap_or(name);
        match digits.parse::<usize>() {
            Ok(n) if n < 32 => Some(n),
            _ => None,
        }
    }
}

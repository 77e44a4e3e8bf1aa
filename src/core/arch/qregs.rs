//! Auxiliary Register File.
//!
//! Four extra registers (q0-q3) reached only through the custom opcode
//! group (`getq`/`setq`). They are not architecturally visible otherwise.

/// Number of auxiliary registers.
pub const QREG_COUNT: usize = 4;

/// Auxiliary register file.
pub struct Qregs {
    regs: [u64; QREG_COUNT],
    last_written: Option<(usize, u64)>,
}

impl Qregs {
    pub fn new() -> Self {
        Self {
            regs: [0; QREG_COUNT],
            last_written: None,
        }
    }

    /// Reads a register. Out-of-range indices wrap into the file.
    pub fn read(&self, idx: usize) -> u64 {
        self.regs[idx % QREG_COUNT]
    }

    /// Writes a register and records the change.
    pub fn write(&mut self, idx: usize, val: u64) {
        let idx = idx % QREG_COUNT;
        self.last_written = Some((idx, self.regs[idx]));
        self.regs[idx] = val;
    }

    /// Returns the index and prior value of the last written register.
    pub fn last_written(&self) -> Option<(usize, u64)> {
        self.last_written
    }

    pub fn clear_last_written(&mut self) {
        self.last_written = None;
    }

    pub fn reset(&mut self) {
        self.regs = [0; QREG_COUNT];
        self.last_written = None;
    }
}

impl Default for Qregs {
    fn default() -> Self {
        Self::new()
    }
}

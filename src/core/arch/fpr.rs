//! RISC-V Floating-Point Register File.
//!
//! Thirty-two 64-bit registers. When the double-precision extension is
//! enabled, single-precision values are NaN-boxed: the upper 32 bits are all
//! ones, and a single-precision read of an improperly boxed register yields
//! the canonical NaN.

/// Canonical single-precision quiet NaN.
pub const CANONICAL_NAN_F32: u32 = 0x7fc0_0000;

/// Canonical double-precision quiet NaN.
pub const CANONICAL_NAN_F64: u64 = 0x7ff8_0000_0000_0000;

const BOX_MASK: u64 = 0xffff_ffff_0000_0000;

/// Floating-point register file.
pub struct Fpr {
    regs: [u64; 32],
    nan_boxing: bool,
    last_written: Option<(usize, u64)>,
}

impl Fpr {
    /// Creates a zeroed register file.
    ///
    /// # Arguments
    ///
    /// * `nan_boxing` - True when registers are 64 bits wide (D extension).
    pub fn new(nan_boxing: bool) -> Self {
        Self {
            regs: [0; 32],
            nan_boxing,
            last_written: None,
        }
    }

    /// Reads the raw 64-bit pattern of a register.
    #[inline]
    pub fn read_bits(&self, idx: usize) -> u64 {
        self.regs[idx]
    }

    /// Writes a raw 64-bit pattern and records the change.
    #[inline]
    pub fn write_bits(&mut self, idx: usize, val: u64) {
        self.last_written = Some((idx, self.regs[idx]));
        self.regs[idx] = val;
    }

    /// Reads a single-precision value, unboxing it.
    pub fn read_single(&self, idx: usize) -> u32 {
        let bits = self.regs[idx];
        if self.nan_boxing && bits & BOX_MASK != BOX_MASK {
            return CANONICAL_NAN_F32;
        }
        bits as u32
    }

    /// Writes a single-precision value, boxing it when required.
    pub fn write_single(&mut self, idx: usize, val: u32) {
        let bits = if self.nan_boxing {
            BOX_MASK | val as u64
        } else {
            val as u64
        };
        self.write_bits(idx, bits);
    }

    /// Reads a double-precision value.
    #[inline]
    pub fn read_double(&self, idx: usize) -> u64 {
        self.regs[idx]
    }

    /// Writes a double-precision value.
    #[inline]
    pub fn write_double(&mut self, idx: usize, val: u64) {
        self.write_bits(idx, val);
    }

    /// Sets a register without recording the change.
    pub fn poke(&mut self, idx: usize, val: u64) -> bool {
        match self.regs.get_mut(idx) {
            Some(r) => {
                *r = val;
                true
            }
            None => false,
        }
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

    /// Finds a register by name (`f3`, `ft3`-style names are not accepted)
    /// or plain number.
    pub fn find(name: &str) -> Option<usize> {
        let digits = name.strip_prefix('f').unwrap_or(name);
        match digits.parse::<usize>() {
            Ok(n) if n < 32 => Some(n),
            _ => None,
        }
    }
}

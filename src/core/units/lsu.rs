//! Load/Store Unit (LSU) Helpers.
//!
//! This module provides the value side of memory instructions: access
//! widths, sign/zero extension of loaded data, and the read-modify-write
//! combination for Atomic Memory Operations (AMOs) of the 'A' extension.
//! Address translation, region checks and queueing are done by the core.

/// Width of a memory access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemWidth {
    Byte,
    Half,
    Word,
    Double,
}

impl MemWidth {
    /// Returns the access size in bytes.
    pub fn bytes(self) -> usize {
        match self {
            MemWidth::Byte => 1,
            MemWidth::Half => 2,
            MemWidth::Word => 4,
            MemWidth::Double => 8,
        }
    }

    /// Returns the mnemonic letter (`b`, `h`, `w`, `d`).
    pub fn suffix(self) -> &'static str {
        match self {
            MemWidth::Byte => "b",
            MemWidth::Half => "h",
            MemWidth::Word => "w",
            MemWidth::Double => "d",
        }
    }
}

/// Integer load flavors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LoadOp {
    pub width: MemWidth,
    pub unsigned: bool,
}

impl LoadOp {
    pub fn name(self) -> String {
        let u = if self.unsigned { "u" } else { "" };
        format!("l{}{}", self.width.suffix(), u)
    }
}

/// Atomic read-modify-write operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AmoOp {
    Swap,
    Add,
    Xor,
    And,
    Or,
    Min,
    Max,
    Minu,
    Maxu,
}

impl AmoOp {
    pub fn name(self) -> &'static str {
        match self {
            AmoOp::Swap => "amoswap",
            AmoOp::Add => "amoadd",
            AmoOp::Xor => "amoxor",
            AmoOp::And => "amoand",
            AmoOp::Or => "amoor",
            AmoOp::Min => "amomin",
            AmoOp::Max => "amomax",
            AmoOp::Minu => "amominu",
            AmoOp::Maxu => "amomaxu",
        }
    }
}

/// Load/Store Unit (LSU) value helpers.
pub struct Lsu;

impl Lsu {
    /// Extends a raw loaded value to 64 bits.
    ///
    /// # Arguments
    ///
    /// * `raw` - Bytes read from memory, zero-extended
    /// * `width` - Access width
    /// * `unsigned` - Zero-extend instead of sign-extend
    pub fn extend(raw: u64, width: MemWidth, unsigned: bool) -> u64 {
        if unsigned {
            return raw;
        }
        match width {
            MemWidth::Byte => raw as u8 as i8 as i64 as u64,
            MemWidth::Half => raw as u16 as i16 as i64 as u64,
            MemWidth::Word => raw as u32 as i32 as i64 as u64,
            MemWidth::Double => raw,
        }
    }

    /// Performs an atomic ALU operation for atomic memory instructions.
    ///
    /// Computes the value written back to memory from the current memory
    /// value and the source register.
    ///
    /// # Arguments
    ///
    /// * `op` - The atomic operation type
    /// * `mem_val` - The current value read from memory
    /// * `reg_val` - The value from the source register
    /// * `width` - Word or Double
    ///
    /// # Returns
    ///
    /// The value to store, holding only `width` significant bytes.
    pub fn atomic_alu(op: AmoOp, mem_val: u64, reg_val: u64, width: MemWidth) -> u64 {
        if matches!(width, MemWidth::Word) {
            let a = mem_val as i32;
            let b = reg_val as i32;
            let res = match op {
                AmoOp::Swap => b,
                AmoOp::Add => a.wrapping_add(b),
                AmoOp::Xor => a ^ b,
                AmoOp::And => a & b,
                AmoOp::Or => a | b,
                AmoOp::Min => a.min(b),
                AmoOp::Max => a.max(b),
                AmoOp::Minu => (a as u32).min(b as u32) as i32,
                AmoOp::Maxu => (a as u32).max(b as u32) as i32,
            };
            res as u32 as u64
        } else {
            let a = mem_val as i64;
            let b = reg_val as i64;
            match op {
                AmoOp::Swap => reg_val,
                AmoOp::Add => a.wrapping_add(b) as u64,
                AmoOp::Xor => mem_val ^ reg_val,
                AmoOp::And => mem_val & reg_val,
                AmoOp::Or => mem_val | reg_val,
                AmoOp::Min => a.min(b) as u64,
                AmoOp::Max => a.max(b) as u64,
                AmoOp::Minu => mem_val.min(reg_val),
                AmoOp::Maxu => mem_val.max(reg_val),
            }
        }
    }
}

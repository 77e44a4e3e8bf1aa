//! Instruction Set Architecture definitions.
//!
//! Decoding of 32-bit and compressed instruction words into [`decode::Op`]
//! values, encoders for the 32-bit formats (used when expanding compressed
//! instructions), and disassembly for traces.

use crate::common::Xlen;
use crate::core::arch::csr::misa_bit;

/// Compressed (RVC) instruction expansion.
pub mod compressed;

/// 32-bit instruction decoding.
pub mod decode;

/// Disassembly of decoded instructions.
pub mod disasm;

/// 32-bit instruction encoders.
pub mod encode;

/// Instruction field extraction.
pub mod instruction;

/// Primary opcode groups: `(inst & 0x7f) >> 2`.
pub mod opcodes {
    pub const LOAD: u32 = 0x00;
    pub const LOAD_FP: u32 = 0x01;
    pub const CUSTOM_0: u32 = 0x02;
    pub const MISC_MEM: u32 = 0x03;
    pub const OP_IMM: u32 = 0x04;
    pub const AUIPC: u32 = 0x05;
    pub const OP_IMM_32: u32 = 0x06;
    pub const STORE: u32 = 0x08;
    pub const STORE_FP: u32 = 0x09;
    pub const AMO: u32 = 0x0b;
    pub const OP: u32 = 0x0c;
    pub const LUI: u32 = 0x0d;
    pub const OP_32: u32 = 0x0e;
    pub const MADD: u32 = 0x10;
    pub const MSUB: u32 = 0x11;
    pub const NMSUB: u32 = 0x12;
    pub const NMADD: u32 = 0x13;
    pub const OP_FP: u32 = 0x14;
    pub const BRANCH: u32 = 0x18;
    pub const JALR: u32 = 0x19;
    pub const JAL: u32 = 0x1b;
    pub const SYSTEM: u32 = 0x1c;
}

/// Register width and enabled extensions, as seen by the decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IsaConfig {
    pub xlen: Xlen,
    pub a: bool,
    pub c: bool,
    pub d: bool,
    pub f: bool,
    pub m: bool,
    pub s: bool,
    pub u: bool,
    pub bitmanip: bool,
}

impl IsaConfig {
    /// Builds the configuration from MISA extension bits. D is only
    /// enabled together with F.
    pub fn from_misa(xlen: Xlen, misa: u64, bitmanip: bool) -> Self {
        let has = |c| misa & misa_bit(c) != 0;
        let f = has('f');
        Self {
            xlen,
            a: has('a'),
            c: has('c'),
            d: f && has('d'),
            f,
            m: has('m'),
            s: has('s'),
            u: has('u'),
            bitmanip,
        }
    }

    /// Builds the MISA extension bits from a string of extension letters
    /// such as `"imafdc"`. The base letter `i` is always set.
    pub fn misa_from_letters(letters: &str) -> u64 {
        letters
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .fold(misa_bit('i'), |acc, c| acc | misa_bit(c))
    }

    pub fn is_rv64(&self) -> bool {
        self.xlen.is_rv64()
    }
}

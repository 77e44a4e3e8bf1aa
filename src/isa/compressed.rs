//! Compressed Instruction Expansion.
//!
//! Lowers 16-bit RVC instructions to the equivalent 32-bit encodings so the
//! rest of the core only ever decodes and executes 32-bit words. Reserved
//! encodings (version 2.3 of the user-level ISA) and forms needing a
//! disabled extension expand to `None`.

use crate::isa::encode;
use crate::isa::IsaConfig;

const SP: u32 = 2;
const RA: u32 = 1;

/// Sign-extends the low `bits` bits of `value`.
#[inline]
fn sext(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// Full register number of a 3-bit compressed register field.
#[inline]
fn creg(field: u32) -> u32 {
    8 + (field & 7)
}

/// Field accessors for 16-bit instructions.
struct C(u32);

impl C {
    fn funct3(&self) -> u32 {
        (self.0 >> 13) & 7
    }

    fn rd(&self) -> u32 {
        (self.0 >> 7) & 0x1f
    }

    fn rs2(&self) -> u32 {
        (self.0 >> 2) & 0x1f
    }

    /// rd' / rs2' at bits 4:2.
    fn rdp(&self) -> u32 {
        creg(self.0 >> 2)
    }

    /// rs1' / rd' at bits 9:7.
    fn rs1p(&self) -> u32 {
        creg(self.0 >> 7)
    }

    fn bit12(&self) -> u32 {
        (self.0 >> 12) & 1
    }

    /// CI 6-bit signed immediate: imm[5] at bit 12, imm[4:0] at bits 6:2.
    fn ci_imm(&self) -> i32 {
        sext((self.bit12() << 5) | ((self.0 >> 2) & 0x1f), 6)
    }

    /// Shift amount of c.slli/c.srli/c.srai.
    fn shamt(&self) -> u32 {
        (self.bit12() << 5) | ((self.0 >> 2) & 0x1f)
    }

    fn addi4spn_imm(&self) -> i32 {
        let i = self.0;
        (((i >> 7) & 0x30) | ((i >> 1) & 0x3c0) | ((i >> 4) & 0x4) | ((i >> 2) & 0x8)) as i32
    }

    fn lw_imm(&self) -> i32 {
        let i = self.0;
        (((i >> 7) & 0x38) | ((i << 1) & 0x40) | ((i >> 4) & 0x4)) as i32
    }

    fn ld_imm(&self) -> i32 {
        let i = self.0;
        (((i >> 7) & 0x38) | ((i << 1) & 0xc0)) as i32
    }

    fn addi16sp_imm(&self) -> i32 {
        let i = self.0;
        let v = (self.bit12() << 9)
            | ((i >> 2) & 0x10)
            | ((i << 1) & 0x40)
            | ((i << 4) & 0x180)
            | ((i << 3) & 0x20);
        sext(v, 10)
    }

    fn j_imm(&self) -> i32 {
        let i = self.0;
        let v = (self.bit12() << 11)
            | ((i >> 7) & 0x10)
            | ((i >> 1) & 0x300)
            | ((i << 2) & 0x400)
            | ((i >> 1) & 0x40)
            | ((i << 1) & 0x80)
            | ((i >> 2) & 0xe)
            | ((i << 3) & 0x20);
        sext(v, 12)
    }

    fn b_imm(&self) -> i32 {
        let i = self.0;
        let v = (self.bit12() << 8)
            | ((i >> 7) & 0x18)
            | ((i << 1) & 0xc0)
            | ((i >> 2) & 0x6)
            | ((i << 3) & 0x20);
        sext(v, 9)
    }

    fn lwsp_imm(&self) -> i32 {
        let i = self.0;
        ((self.bit12() << 5) | ((i >> 2) & 0x1c) | ((i << 4) & 0xc0)) as i32
    }

    fn ldsp_imm(&self) -> i32 {
        let i = self.0;
        ((self.bit12() << 5) | ((i >> 2) & 0x18) | ((i << 4) & 0x1c0)) as i32
    }

    fn swsp_imm(&self) -> i32 {
        let i = self.0;
        (((i >> 7) & 0x3c) | ((i >> 1) & 0xc0)) as i32
    }

    fn sdsp_imm(&self) -> i32 {
        let i = self.0;
        (((i >> 7) & 0x38) | ((i >> 1) & 0x1c0)) as i32
    }
}

/// Expands a compressed instruction to its 32-bit equivalent.
///
/// # Arguments
///
/// * `inst` - The 16-bit instruction (low two bits not `11`)
/// * `isa` - Register width and enabled extensions
///
/// # Returns
///
/// The 32-bit encoding, or `None` if the instruction is illegal.
pub fn expand(inst: u16, isa: &IsaConfig) -> Option<u32> {
    let c = C(inst as u32);
    let rv64 = isa.is_rv64();
    match inst & 3 {
        0 => quadrant0(&c, isa, rv64),
        1 => quadrant1(&c, rv64),
        2 => quadrant2(&c, isa, rv64),
        _ => None,
    }
}

fn quadrant0(c: &C, isa: &IsaConfig, rv64: bool) -> Option<u32> {
    match c.funct3() {
        0 => {
            // c.addi4spn; the all-zero word is also caught here.
            let imm = c.addi4spn_imm();
            if imm == 0 {
                return None;
            }
            Some(encode::addi(c.rdp(), SP, imm))
        }
        1 if isa.d => Some(encode::fld(c.rdp(), c.rs1p(), c.ld_imm())),
        2 => Some(encode::lw(c.rdp(), c.rs1p(), c.lw_imm())),
        3 if rv64 => Some(encode::ld(c.rdp(), c.rs1p(), c.ld_imm())),
        3 if isa.f => Some(encode::flw(c.rdp(), c.rs1p(), c.lw_imm())),
        5 if isa.d => Some(encode::fsd(c.rs1p(), c.rdp(), c.ld_imm())),
        6 => Some(encode::sw(c.rs1p(), c.rdp(), c.lw_imm())),
        7 if rv64 => Some(encode::sd(c.rs1p(), c.rdp(), c.ld_imm())),
        7 if isa.f => Some(encode::fsw(c.rs1p(), c.rdp(), c.lw_imm())),
        _ => None,
    }
}

fn quadrant1(c: &C, rv64: bool) -> Option<u32> {
    let rd = c.rd();
    match c.funct3() {
        0 => Some(encode::addi(rd, rd, c.ci_imm())),
        1 if rv64 => {
            if rd == 0 {
                return None;
            }
            Some(encode::addiw(rd, rd, c.ci_imm()))
        }
        1 => Some(encode::jal(RA, c.j_imm())),
        2 => Some(encode::addi(rd, 0, c.ci_imm())),
        3 if rd == SP => {
            let imm = c.addi16sp_imm();
            if imm == 0 {
                return None;
            }
            Some(encode::addi(SP, SP, imm))
        }
        3 => {
            let imm = c.ci_imm();
            if imm == 0 {
                return None;
            }
            Some(encode::lui(rd, imm))
        }
        4 => {
            let rd = c.rs1p();
            match (c.0 >> 10) & 3 {
                0 if c.bit12() != 0 && !rv64 => None,
                0 => Some(encode::srli(rd, rd, c.shamt())),
                1 if c.bit12() != 0 && !rv64 => None,
                1 => Some(encode::srai(rd, rd, c.shamt())),
                2 => Some(encode::andi(rd, rd, c.ci_imm())),
                _ => {
                    let rs2 = c.rdp();
                    match (c.bit12(), (c.0 >> 5) & 3) {
                        (0, 0) => Some(encode::sub(rd, rd, rs2)),
                        (0, 1) => Some(encode::xor(rd, rd, rs2)),
                        (0, 2) => Some(encode::or(rd, rd, rs2)),
                        (0, _) => Some(encode::and(rd, rd, rs2)),
                        (_, 0) if rv64 => Some(encode::subw(rd, rd, rs2)),
                        (_, 1) if rv64 => Some(encode::addw(rd, rd, rs2)),
                        _ => None,
                    }
                }
            }
        }
        5 => Some(encode::jal(0, c.j_imm())),
        6 => Some(encode::beq(c.rs1p(), 0, c.b_imm())),
        _ => Some(encode::bne(c.rs1p(), 0, c.b_imm())),
    }
}

fn quadrant2(c: &C, isa: &IsaConfig, rv64: bool) -> Option<u32> {
    let rd = c.rd();
    let rs2 = c.rs2();
    match c.funct3() {
        0 => {
            if c.bit12() != 0 && !rv64 {
                return None;
            }
            Some(encode::slli(rd, rd, c.shamt()))
        }
        1 if isa.d => Some(encode::fld(rd, SP, c.ldsp_imm())),
        2 => Some(encode::lw(rd, SP, c.lwsp_imm())),
        3 if rv64 => Some(encode::ld(rd, SP, c.ldsp_imm())),
        3 if isa.f => Some(encode::flw(rd, SP, c.lwsp_imm())),
        4 => match (c.bit12(), rs2, rd) {
            (0, 0, 0) => None,
            (0, 0, _) => Some(encode::jalr(0, rd, 0)),
            (0, _, _) => Some(encode::add(rd, 0, rs2)),
            (_, 0, 0) => Some(encode::ebreak()),
            (_, 0, _) => Some(encode::jalr(RA, rd, 0)),
            _ => Some(encode::add(rd, rd, rs2)),
        },
        5 if isa.d => Some(encode::fsd(SP, rs2, c.sdsp_imm())),
        6 => Some(encode::sw(SP, rs2, c.swsp_imm())),
        7 if rv64 => Some(encode::sd(SP, rs2, c.sdsp_imm())),
        7 if isa.f => Some(encode::fsw(SP, rs2, c.swsp_imm())),
        _ => None,
    }
}

//! Instruction Encoders.
//!
//! Builders for the six 32-bit instruction formats, plus named helpers for
//! the instructions that compressed forms expand to. Immediates are taken
//! as signed values and truncated to the width of their field.

/// Full 7-bit opcodes.
pub mod op7 {
    pub const LOAD: u32 = 0x03;
    pub const LOAD_FP: u32 = 0x07;
    pub const OP_IMM: u32 = 0x13;
    pub const OP_IMM_32: u32 = 0x1b;
    pub const STORE: u32 = 0x23;
    pub const STORE_FP: u32 = 0x27;
    pub const OP: u32 = 0x33;
    pub const LUI: u32 = 0x37;
    pub const OP_32: u32 = 0x3b;
    pub const BRANCH: u32 = 0x63;
    pub const JALR: u32 = 0x67;
    pub const JAL: u32 = 0x6f;
    pub const SYSTEM: u32 = 0x73;
}

/// Register as an instruction field.
#[inline]
fn reg(r: u32) -> u32 {
    r & 0x1f
}

/// R-type: funct7 | rs2 | rs1 | funct3 | rd | opcode.
pub fn r_type(opcode: u32, rd: u32, funct3: u32, rs1: u32, rs2: u32, funct7: u32) -> u32 {
    ((funct7 & 0x7f) << 25)
        | (reg(rs2) << 20)
        | (reg(rs1) << 15)
        | ((funct3 & 7) << 12)
        | (reg(rd) << 7)
        | (opcode & 0x7f)
}

/// I-type with a 12-bit immediate.
pub fn i_type(opcode: u32, rd: u32, funct3: u32, rs1: u32, imm: i32) -> u32 {
    (((imm as u32) & 0xfff) << 20)
        | (reg(rs1) << 15)
        | ((funct3 & 7) << 12)
        | (reg(rd) << 7)
        | (opcode & 0x7f)
}

/// S-type with a 12-bit immediate.
pub fn s_type(opcode: u32, funct3: u32, rs1: u32, rs2: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    (((imm >> 5) & 0x7f) << 25)
        | (reg(rs2) << 20)
        | (reg(rs1) << 15)
        | ((funct3 & 7) << 12)
        | ((imm & 0x1f) << 7)
        | (opcode & 0x7f)
}

/// B-type with a 13-bit, even immediate.
pub fn b_type(opcode: u32, funct3: u32, rs1: u32, rs2: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    (((imm >> 12) & 1) << 31)
        | (((imm >> 5) & 0x3f) << 25)
        | (reg(rs2) << 20)
        | (reg(rs1) << 15)
        | ((funct3 & 7) << 12)
        | (((imm >> 1) & 0xf) << 8)
        | (((imm >> 11) & 1) << 7)
        | (opcode & 0x7f)
}

/// U-type; `imm` holds the value of bits 31:12 (not shifted).
pub fn u_type(opcode: u32, rd: u32, imm: i32) -> u32 {
    (((imm as u32) & 0xf_ffff) << 12) | (reg(rd) << 7) | (opcode & 0x7f)
}

/// J-type with a 21-bit, even immediate.
pub fn j_type(opcode: u32, rd: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    (((imm >> 20) & 1) << 31)
        | (((imm >> 1) & 0x3ff) << 21)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 12) & 0xff) << 12)
        | (reg(rd) << 7)
        | (opcode & 0x7f)
}

pub fn addi(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(op7::OP_IMM, rd, 0, rs1, imm)
}

pub fn addiw(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(op7::OP_IMM_32, rd, 0, rs1, imm)
}

pub fn andi(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(op7::OP_IMM, rd, 7, rs1, imm)
}

pub fn slli(rd: u32, rs1: u32, shamt: u32) -> u32 {
    i_type(op7::OP_IMM, rd, 1, rs1, (shamt & 0x3f) as i32)
}

pub fn srli(rd: u32, rs1: u32, shamt: u32) -> u32 {
    i_type(op7::OP_IMM, rd, 5, rs1, (shamt & 0x3f) as i32)
}

pub fn srai(rd: u32, rs1: u32, shamt: u32) -> u32 {
    i_type(op7::OP_IMM, rd, 5, rs1, (0x400 | (shamt & 0x3f)) as i32)
}

pub fn add(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(op7::OP, rd, 0, rs1, rs2, 0)
}

pub fn sub(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(op7::OP, rd, 0, rs1, rs2, 0x20)
}

pub fn xor(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(op7::OP, rd, 4, rs1, rs2, 0)
}

pub fn or(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(op7::OP, rd, 6, rs1, rs2, 0)
}

pub fn and(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(op7::OP, rd, 7, rs1, rs2, 0)
}

pub fn addw(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(op7::OP_32, rd, 0, rs1, rs2, 0)
}

pub fn subw(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(op7::OP_32, rd, 0, rs1, rs2, 0x20)
}

/// `lui`; `imm` is the value placed in bits 31:12.
pub fn lui(rd: u32, imm: i32) -> u32 {
    u_type(op7::LUI, rd, imm)
}

pub fn lw(rd: u32, rs1: u32, offset: i32) -> u32 {
    i_type(op7::LOAD, rd, 2, rs1, offset)
}

pub fn ld(rd: u32, rs1: u32, offset: i32) -> u32 {
    i_type(op7::LOAD, rd, 3, rs1, offset)
}

pub fn flw(rd: u32, rs1: u32, offset: i32) -> u32 {
    i_type(op7::LOAD_FP, rd, 2, rs1, offset)
}

pub fn fld(rd: u32, rs1: u32, offset: i32) -> u32 {
    i_type(op7::LOAD_FP, rd, 3, rs1, offset)
}

pub fn sw(rs1: u32, rs2: u32, offset: i32) -> u32 {
    s_type(op7::STORE, 2, rs1, rs2, offset)
}

pub fn sd(rs1: u32, rs2: u32, offset: i32) -> u32 {
    s_type(op7::STORE, 3, rs1, rs2, offset)
}

pub fn fsw(rs1: u32, rs2: u32, offset: i32) -> u32 {
    s_type(op7::STORE_FP, 2, rs1, rs2, offset)
}

pub fn fsd(rs1: u32, rs2: u32, offset: i32) -> u32 {
    s_type(op7::STORE_FP, 3, rs1, rs2, offset)
}

pub fn beq(rs1: u32, rs2: u32, offset: i32) -> u32 {
    b_type(op7::BRANCH, 0, rs1, rs2, offset)
}

pub fn bne(rs1: u32, rs2: u32, offset: i32) -> u32 {
    b_type(op7::BRANCH, 1, rs1, rs2, offset)
}

pub fn jal(rd: u32, offset: i32) -> u32 {
    j_type(op7::JAL, rd, offset)
}

pub fn jalr(rd: u32, rs1: u32, offset: i32) -> u32 {
    i_type(op7::JALR, rd, 0, rs1, offset)
}

pub fn ebreak() -> u32 {
    i_type(op7::SYSTEM, 0, 0, 0, 1)
}

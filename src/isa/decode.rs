//! Instruction Decoding.
//!
//! Maps a 32-bit instruction word to an [`Op`] and its operand fields. The
//! five-bit primary opcode group selects the instruction format; funct3,
//! funct7, rs2 or immediate bits then select the operation. Encodings that
//! are reserved, malformed, or belong to a disabled extension decode to
//! [`Op::Illegal`]. Decoding has no side effects.

use crate::core::units::alu::AluOp;
use crate::core::units::fpu::{FmaOp, FpBinOp, FpCmpOp, FpFormat, IntType, SgnjOp};
use crate::core::units::lsu::{AmoOp, LoadOp, MemWidth};
use crate::isa::instruction::InstructionBits;
use crate::isa::{opcodes, IsaConfig};

/// Conditional branch comparisons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BranchOp {
    Eq,
    Ne,
    Lt,
    Ge,
    Ltu,
    Geu,
}

impl BranchOp {
    pub fn name(self) -> &'static str {
        match self {
            BranchOp::Eq => "beq",
            BranchOp::Ne => "bne",
            BranchOp::Lt => "blt",
            BranchOp::Ge => "bge",
            BranchOp::Ltu => "bltu",
            BranchOp::Geu => "bgeu",
        }
    }
}

/// CSR read-modify-write flavors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CsrOp {
    /// Read and write.
    Rw,
    /// Read and set bits.
    Rs,
    /// Read and clear bits.
    Rc,
}

/// Operations of the custom opcode group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CustomOp {
    GetQ,
    SetQ,
    RetIrq,
    MaskIrq,
    WaitIrq,
    Timer,
}

impl CustomOp {
    pub fn name(self) -> &'static str {
        match self {
            CustomOp::GetQ => "getq",
            CustomOp::SetQ => "setq",
            CustomOp::RetIrq => "retirq",
            CustomOp::MaskIrq => "maskirq",
            CustomOp::WaitIrq => "waitirq",
            CustomOp::Timer => "timer",
        }
    }
}

/// Operation identity of a decoded instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Illegal,

    Lui,
    Auipc,
    Jal,
    Jalr,
    Branch(BranchOp),
    Load(LoadOp),
    Store(MemWidth),
    /// Register-immediate ALU operation (immediate in `imm`).
    AluImm(AluOp),
    /// Register-register ALU operation.
    Alu(AluOp),

    Fence,
    FenceI,
    Ecall,
    Ebreak,
    Uret,
    Sret,
    Mret,
    Wfi,
    /// CSR access; CSR number in `imm`, source register or 5-bit
    /// immediate in `rs1`.
    Csr { op: CsrOp, imm: bool },

    Lr(MemWidth),
    Sc(MemWidth),
    Amo(AmoOp, MemWidth),

    FpLoad(FpFormat),
    FpStore(FpFormat),
    FpFma(FmaOp, FpFormat),
    FpBin(FpBinOp, FpFormat),
    FpSqrt(FpFormat),
    FpSgnj(SgnjOp, FpFormat),
    FpMin(FpFormat),
    FpMax(FpFormat),
    FpCmp(FpCmpOp, FpFormat),
    FpClass(FpFormat),
    /// `fcvt.<int>.<fmt>`
    FpToInt(FpFormat, IntType),
    /// `fcvt.<fmt>.<int>`
    IntToFp(FpFormat, IntType),
    /// `fcvt.<to>.<from>`
    FpCvt { to: FpFormat, from: FpFormat },
    /// `fmv.x.w` / `fmv.x.d`
    FpMvToInt(FpFormat),
    /// `fmv.w.x` / `fmv.d.x`
    FpMvFromInt(FpFormat),

    Custom(CustomOp),
}

impl Op {
    /// Returns true for operations that use the rounding-mode field.
    pub fn uses_rounding_mode(&self) -> bool {
        matches!(
            self,
            Op::FpFma(..)
                | Op::FpBin(..)
                | Op::FpSqrt(_)
                | Op::FpToInt(..)
                | Op::IntToFp(..)
                | Op::FpCvt { .. }
        )
    }

    /// Returns true for loads, including FP loads and atomics.
    pub fn is_load(&self) -> bool {
        matches!(
            self,
            Op::Load(_) | Op::FpLoad(_) | Op::Lr(_) | Op::Amo(..)
        )
    }
}

/// A decoded instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decoded {
    pub op: Op,
    pub rd: usize,
    pub rs1: usize,
    pub rs2: usize,
    pub rs3: usize,
    pub imm: i64,
    /// Rounding-mode field (funct3) of FP instructions.
    pub rm: u64,
}

impl Decoded {
    /// The decoding of an illegal instruction.
    pub fn illegal() -> Self {
        Self::new(Op::Illegal, 0, 0, 0, 0)
    }

    /// Returns the integer registers read by the instruction as `(rs1, rs2)`.
    pub fn int_sources(&self) -> (Option<usize>, Option<usize>) {
        match self.op {
            Op::Jalr
            | Op::Load(_)
            | Op::AluImm(_)
            | Op::FpLoad(_)
            | Op::FpStore(_)
            | Op::Lr(_)
            | Op::IntToFp(..)
            | Op::FpMvFromInt(_)
            | Op::Csr { imm: false, .. } => (Some(self.rs1), None),
            Op::Branch(_)
            | Op::Store(_)
            | Op::Alu(_)
            | Op::Sc(_)
            | Op::Amo(..)
            | Op::Custom(_) => (Some(self.rs1), Some(self.rs2)),
            _ => (None, None),
        }
    }

    /// Returns true if the instruction writes an integer destination.
    pub fn writes_int_rd(&self) -> bool {
        matches!(
            self.op,
            Op::Lui
                | Op::Auipc
                | Op::Jal
                | Op::Jalr
                | Op::Load(_)
                | Op::AluImm(_)
                | Op::Alu(_)
                | Op::Csr { .. }
                | Op::Lr(_)
                | Op::Sc(_)
                | Op::Amo(..)
                | Op::FpCmp(..)
                | Op::FpClass(_)
                | Op::FpToInt(..)
                | Op::FpMvToInt(_)
        )
    }

    fn new(op: Op, rd: usize, rs1: usize, rs2: usize, imm: i64) -> Self {
        Self {
            op,
            rd,
            rs1,
            rs2,
            rs3: 0,
            imm,
            rm: 0,
        }
    }
}

/// Decodes a 32-bit instruction word.
///
/// # Arguments
///
/// * `inst` - The instruction word (low two bits must be `11`)
/// * `isa` - Register width and enabled extensions
pub fn decode(inst: u32, isa: &IsaConfig) -> Decoded {
    if inst & 3 != 3 {
        return Decoded::illegal();
    }
    let (rd, rs1, rs2) = (inst.rd(), inst.rs1(), inst.rs2());
    let f3 = inst.funct3();
    let f7 = inst.funct7();
    let rv64 = isa.is_rv64();

    match (inst & 0x7f) >> 2 {
        opcodes::LOAD => {
            let (width, unsigned) = match f3 {
                0 => (MemWidth::Byte, false),
                1 => (MemWidth::Half, false),
                2 => (MemWidth::Word, false),
                3 if rv64 => (MemWidth::Double, false),
                4 => (MemWidth::Byte, true),
                5 => (MemWidth::Half, true),
                6 if rv64 => (MemWidth::Word, true),
                _ => return Decoded::illegal(),
            };
            Decoded::new(Op::Load(LoadOp { width, unsigned }), rd, rs1, 0, inst.imm_i())
        }

        opcodes::LOAD_FP => match f3 {
            2 if isa.f => Decoded::new(Op::FpLoad(FpFormat::Single), rd, rs1, 0, inst.imm_i()),
            3 if isa.d => Decoded::new(Op::FpLoad(FpFormat::Double), rd, rs1, 0, inst.imm_i()),
            _ => Decoded::illegal(),
        },

        opcodes::CUSTOM_0 => {
            let op = match f7 {
                0 => CustomOp::GetQ,
                1 => CustomOp::SetQ,
                2 => CustomOp::RetIrq,
                3 => CustomOp::MaskIrq,
                4 => CustomOp::WaitIrq,
                5 => CustomOp::Timer,
                _ => return Decoded::illegal(),
            };
            Decoded::new(Op::Custom(op), rd, rs1, rs2, 0)
        }

        opcodes::MISC_MEM => {
            if rd != 0 || rs1 != 0 {
                return Decoded::illegal();
            }
            match f3 {
                0 if inst >> 28 == 0 => Decoded::new(Op::Fence, 0, 0, 0, inst.imm_i()),
                1 if inst >> 20 == 0 => Decoded::new(Op::FenceI, 0, 0, 0, 0),
                _ => Decoded::illegal(),
            }
        }

        opcodes::OP_IMM => decode_op_imm(inst, isa),

        opcodes::AUIPC => Decoded::new(Op::Auipc, rd, 0, 0, inst.imm_u()),

        opcodes::OP_IMM_32 => {
            if !rv64 {
                return Decoded::illegal();
            }
            let shamt = (rs2 & 0x1f) as i64;
            let op = match (f3, f7) {
                (0, _) => return Decoded::new(Op::AluImm(AluOp::AddW), rd, rs1, 0, inst.imm_i()),
                (1, 0) => AluOp::SllW,
                (5, 0) => AluOp::SrlW,
                (5, 0x20) => AluOp::SraW,
                _ => return Decoded::illegal(),
            };
            Decoded::new(Op::AluImm(op), rd, rs1, 0, shamt)
        }

        opcodes::STORE => {
            let width = match f3 {
                0 => MemWidth::Byte,
                1 => MemWidth::Half,
                2 => MemWidth::Word,
                3 if rv64 => MemWidth::Double,
                _ => return Decoded::illegal(),
            };
            Decoded::new(Op::Store(width), 0, rs1, rs2, inst.imm_s())
        }

        opcodes::STORE_FP => match f3 {
            2 if isa.f => Decoded::new(Op::FpStore(FpFormat::Single), 0, rs1, rs2, inst.imm_s()),
            3 if isa.d => Decoded::new(Op::FpStore(FpFormat::Double), 0, rs1, rs2, inst.imm_s()),
            _ => Decoded::illegal(),
        },

        opcodes::AMO => decode_amo(inst, isa),

        opcodes::OP => decode_op(inst, isa),

        opcodes::LUI => Decoded::new(Op::Lui, rd, 0, 0, inst.imm_u()),

        opcodes::OP_32 => {
            if !rv64 {
                return Decoded::illegal();
            }
            let op = match (f7, f3) {
                (0, 0) => AluOp::AddW,
                (0, 1) => AluOp::SllW,
                (0, 5) => AluOp::SrlW,
                (0x20, 0) => AluOp::SubW,
                (0x20, 5) => AluOp::SraW,
                (1, 0) if isa.m => AluOp::MulW,
                (1, 4) if isa.m => AluOp::DivW,
                (1, 5) if isa.m => AluOp::DivuW,
                (1, 6) if isa.m => AluOp::RemW,
                (1, 7) if isa.m => AluOp::RemuW,
                _ => return Decoded::illegal(),
            };
            Decoded::new(Op::Alu(op), rd, rs1, rs2, 0)
        }

        group @ (opcodes::MADD | opcodes::MSUB | opcodes::NMSUB | opcodes::NMADD) => {
            let fmt = match f7 & 3 {
                0 if isa.f => FpFormat::Single,
                1 if isa.d => FpFormat::Double,
                _ => return Decoded::illegal(),
            };
            let op = match group {
                opcodes::MADD => FmaOp::MAdd,
                opcodes::MSUB => FmaOp::MSub,
                opcodes::NMSUB => FmaOp::NMSub,
                _ => FmaOp::NMAdd,
            };
            let mut d = Decoded::new(Op::FpFma(op, fmt), rd, rs1, rs2, 0);
            d.rs3 = (f7 >> 2) as usize;
            d.rm = f3 as u64;
            d
        }

        opcodes::OP_FP => decode_op_fp(inst, isa),

        opcodes::BRANCH => {
            let op = match f3 {
                0 => BranchOp::Eq,
                1 => BranchOp::Ne,
                4 => BranchOp::Lt,
                5 => BranchOp::Ge,
                6 => BranchOp::Ltu,
                7 => BranchOp::Geu,
                _ => return Decoded::illegal(),
            };
            Decoded::new(Op::Branch(op), 0, rs1, rs2, inst.imm_b())
        }

        opcodes::JALR if f3 == 0 => Decoded::new(Op::Jalr, rd, rs1, 0, inst.imm_i()),

        opcodes::JAL => Decoded::new(Op::Jal, rd, 0, 0, inst.imm_j()),

        opcodes::SYSTEM => decode_system(inst, isa),

        _ => Decoded::illegal(),
    }
}

/// Splits a shift immediate into its function bits (aligned as a funct7)
/// and the shift amount.
fn shift_fields(inst: u32, isa: &IsaConfig) -> (u32, u32) {
    let imm = inst >> 20;
    if isa.is_rv64() {
        ((imm >> 6) << 1, imm & 0x3f)
    } else {
        (imm >> 5, imm & 0x1f)
    }
}

fn decode_op_imm(inst: u32, isa: &IsaConfig) -> Decoded {
    let (rd, rs1) = (inst.rd(), inst.rs1());
    let imm = inst.imm_i();
    let b = isa.bitmanip;
    let (top, shamt) = shift_fields(inst, isa);
    let shamt = shamt as i64;

    let (op, imm) = match inst.funct3() {
        0 => (AluOp::Add, imm),
        1 => match top {
            0 => (AluOp::Sll, shamt),
            0x10 if b => (AluOp::Slo, shamt),
            _ if b && imm == 0x600 => (AluOp::Clz, 0),
            _ if b && imm == 0x601 => (AluOp::Ctz, 0),
            _ if b && imm == 0x602 => (AluOp::Pcnt, 0),
            _ => return Decoded::illegal(),
        },
        2 => (AluOp::Slt, imm),
        3 => (AluOp::Sltu, imm),
        4 => (AluOp::Xor, imm),
        5 => match top {
            0 => (AluOp::Srl, shamt),
            0x20 => (AluOp::Sra, shamt),
            0x10 if b => (AluOp::Sro, shamt),
            0x30 if b => (AluOp::Ror, shamt),
            _ => return Decoded::illegal(),
        },
        6 => (AluOp::Or, imm),
        _ => (AluOp::And, imm),
    };
    Decoded::new(Op::AluImm(op), rd, rs1, 0, imm)
}

fn decode_op(inst: u32, isa: &IsaConfig) -> Decoded {
    let (rd, rs1, rs2) = (inst.rd(), inst.rs1(), inst.rs2());
    let b = isa.bitmanip;
    let op = match (inst.funct7(), inst.funct3()) {
        (0, 0) => AluOp::Add,
        (0, 1) => AluOp::Sll,
        (0, 2) => AluOp::Slt,
        (0, 3) => AluOp::Sltu,
        (0, 4) => AluOp::Xor,
        (0, 5) => AluOp::Srl,
        (0, 6) => AluOp::Or,
        (0, 7) => AluOp::And,
        (1, f3) if isa.m => match f3 {
            0 => AluOp::Mul,
            1 => AluOp::Mulh,
            2 => AluOp::Mulhsu,
            3 => AluOp::Mulhu,
            4 => AluOp::Div,
            5 => AluOp::Divu,
            6 => AluOp::Rem,
            _ => AluOp::Remu,
        },
        (4, 0) if b => AluOp::Pack,
        (5, 2) if b => AluOp::Min,
        (5, 3) if b => AluOp::Minu,
        (5, 6) if b => AluOp::Max,
        (5, 7) if b => AluOp::Maxu,
        (0x10, 1) if b => AluOp::Slo,
        (0x10, 5) if b => AluOp::Sro,
        (0x20, 0) => AluOp::Sub,
        (0x20, 5) => AluOp::Sra,
        (0x20, 7) if b => AluOp::Andc,
        (0x30, 1) if b => AluOp::Rol,
        (0x30, 5) if b => AluOp::Ror,
        _ => return Decoded::illegal(),
    };
    Decoded::new(Op::Alu(op), rd, rs1, rs2, 0)
}

fn decode_amo(inst: u32, isa: &IsaConfig) -> Decoded {
    if !isa.a {
        return Decoded::illegal();
    }
    let (rd, rs1, rs2) = (inst.rd(), inst.rs1(), inst.rs2());
    let width = match inst.funct3() {
        2 => MemWidth::Word,
        3 if isa.is_rv64() => MemWidth::Double,
        _ => return Decoded::illegal(),
    };
    let op = match inst >> 27 {
        0x00 => Op::Amo(AmoOp::Add, width),
        0x01 => Op::Amo(AmoOp::Swap, width),
        0x02 if rs2 == 0 => Op::Lr(width),
        0x03 => Op::Sc(width),
        0x04 => Op::Amo(AmoOp::Xor, width),
        0x08 => Op::Amo(AmoOp::Or, width),
        0x0c => Op::Amo(AmoOp::And, width),
        0x10 => Op::Amo(AmoOp::Min, width),
        0x14 => Op::Amo(AmoOp::Max, width),
        0x18 => Op::Amo(AmoOp::Minu, width),
        0x1c => Op::Amo(AmoOp::Maxu, width),
        _ => return Decoded::illegal(),
    };
    Decoded::new(op, rd, rs1, rs2, 0)
}

fn decode_op_fp(inst: u32, isa: &IsaConfig) -> Decoded {
    let (rd, rs1, rs2) = (inst.rd(), inst.rs1(), inst.rs2());
    let f3 = inst.funct3();
    let f7 = inst.funct7();
    let fmt = match f7 & 3 {
        0 if isa.f => FpFormat::Single,
        1 if isa.d => FpFormat::Double,
        _ => return Decoded::illegal(),
    };
    let int_type = |rs2: usize| match rs2 {
        0 => Some(IntType::W),
        1 => Some(IntType::Wu),
        2 if isa.is_rv64() => Some(IntType::L),
        3 if isa.is_rv64() => Some(IntType::Lu),
        _ => None,
    };

    let op = match f7 >> 2 {
        0x00 => Op::FpBin(FpBinOp::Add, fmt),
        0x01 => Op::FpBin(FpBinOp::Sub, fmt),
        0x02 => Op::FpBin(FpBinOp::Mul, fmt),
        0x03 => Op::FpBin(FpBinOp::Div, fmt),
        0x04 => match f3 {
            0 => Op::FpSgnj(SgnjOp::Copy, fmt),
            1 => Op::FpSgnj(SgnjOp::Negate, fmt),
            2 => Op::FpSgnj(SgnjOp::Xor, fmt),
            _ => return Decoded::illegal(),
        },
        0x05 => match f3 {
            0 => Op::FpMin(fmt),
            1 => Op::FpMax(fmt),
            _ => return Decoded::illegal(),
        },
        0x08 => match (fmt, rs2) {
            (FpFormat::Single, 1) if isa.d => Op::FpCvt {
                to: FpFormat::Single,
                from: FpFormat::Double,
            },
            (FpFormat::Double, 0) => Op::FpCvt {
                to: FpFormat::Double,
                from: FpFormat::Single,
            },
            _ => return Decoded::illegal(),
        },
        0x0b if rs2 == 0 => Op::FpSqrt(fmt),
        0x14 => match f3 {
            0 => Op::FpCmp(FpCmpOp::Le, fmt),
            1 => Op::FpCmp(FpCmpOp::Lt, fmt),
            2 => Op::FpCmp(FpCmpOp::Eq, fmt),
            _ => return Decoded::illegal(),
        },
        0x18 => match int_type(rs2) {
            Some(t) => Op::FpToInt(fmt, t),
            None => return Decoded::illegal(),
        },
        0x1a => match int_type(rs2) {
            Some(t) => Op::IntToFp(fmt, t),
            None => return Decoded::illegal(),
        },
        0x1c if rs2 == 0 => match (f3, fmt) {
            (0, FpFormat::Single) => Op::FpMvToInt(fmt),
            (0, FpFormat::Double) if isa.is_rv64() => Op::FpMvToInt(fmt),
            (1, _) => Op::FpClass(fmt),
            _ => return Decoded::illegal(),
        },
        0x1e if rs2 == 0 && f3 == 0 => match fmt {
            FpFormat::Double if !isa.is_rv64() => return Decoded::illegal(),
            _ => Op::FpMvFromInt(fmt),
        },
        _ => return Decoded::illegal(),
    };
    let mut d = Decoded::new(op, rd, rs1, rs2, 0);
    d.rm = f3 as u64;
    d
}

fn decode_system(inst: u32, isa: &IsaConfig) -> Decoded {
    let (rd, rs1) = (inst.rd(), inst.rs1());
    let csr = (inst >> 20) as i64;
    let csr_op = |op, imm| Decoded::new(Op::Csr { op, imm }, rd, rs1, 0, csr);
    match inst.funct3() {
        0 => {
            let op = match (csr >> 5, csr) {
                (0, 0) if rs1 == 0 && rd == 0 => Op::Ecall,
                (0, 1) if rs1 == 0 && rd == 0 => Op::Ebreak,
                (0, 2) if rs1 == 0 && rd == 0 && isa.u => Op::Uret,
                (_, 0x102) if rs1 == 0 && rd == 0 && isa.s => Op::Sret,
                (_, 0x302) if rs1 == 0 && rd == 0 => Op::Mret,
                (_, 0x105) if rs1 == 0 && rd == 0 => Op::Wfi,
                // sfence.vma is not supported.
                _ => Op::Illegal,
            };
            Decoded::new(op, 0, 0, 0, 0)
        }
        1 => csr_op(CsrOp::Rw, false),
        2 => csr_op(CsrOp::Rs, false),
        3 => csr_op(CsrOp::Rc, false),
        5 => csr_op(CsrOp::Rw, true),
        6 => csr_op(CsrOp::Rs, true),
        7 => csr_op(CsrOp::Rc, true),
        _ => Decoded::illegal(),
    }
}

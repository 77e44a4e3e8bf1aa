//! Arithmetic Logic Unit (ALU).
//!
//! This module implements the integer ALU: base arithmetic, logical
//! operations and shifts, the Multiply/Divide (M) extension, the RV64
//! word (`*w`) forms, and the bit-manipulation subset. Operands are stored
//! register values (zero-extended on RV32) and results are returned in the
//! same form.

use crate::common::Xlen;

/// Integer ALU operations.
///
/// Register-immediate instructions reuse the register-register operation
/// with the immediate as second operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AluOp {
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,

    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,

    AddW,
    SubW,
    SllW,
    SrlW,
    SraW,
    MulW,
    DivW,
    DivuW,
    RemW,
    RemuW,

    Clz,
    Ctz,
    Pcnt,
    Andc,
    Slo,
    Sro,
    Rol,
    Ror,
    Min,
    Minu,
    Max,
    Maxu,
    Pack,
}

impl AluOp {
    /// Returns the register-register mnemonic.
    pub fn name(self) -> &'static str {
        match self {
            AluOp::Add => "add",
            AluOp::Sub => "sub",
            AluOp::Sll => "sll",
            AluOp::Slt => "slt",
            AluOp::Sltu => "sltu",
            AluOp::Xor => "xor",
            AluOp::Srl => "srl",
            AluOp::Sra => "sra",
            AluOp::Or => "or",
            AluOp::And => "and",
            AluOp::Mul => "mul",
            AluOp::Mulh => "mulh",
            AluOp::Mulhsu => "mulhsu",
            AluOp::Mulhu => "mulhu",
            AluOp::Div => "div",
            AluOp::Divu => "divu",
            AluOp::Rem => "rem",
            AluOp::Remu => "remu",
            AluOp::AddW => "addw",
            AluOp::SubW => "subw",
            AluOp::SllW => "sllw",
            AluOp::SrlW => "srlw",
            AluOp::SraW => "sraw",
            AluOp::MulW => "mulw",
            AluOp::DivW => "divw",
            AluOp::DivuW => "divuw",
            AluOp::RemW => "remw",
            AluOp::RemuW => "remuw",
            AluOp::Clz => "clz",
            AluOp::Ctz => "ctz",
            AluOp::Pcnt => "pcnt",
            AluOp::Andc => "andc",
            AluOp::Slo => "slo",
            AluOp::Sro => "sro",
            AluOp::Rol => "rol",
            AluOp::Ror => "ror",
            AluOp::Min => "min",
            AluOp::Minu => "minu",
            AluOp::Max => "max",
            AluOp::Maxu => "maxu",
            AluOp::Pack => "pack",
        }
    }

    /// Returns the register-immediate mnemonic, if the operation has one.
    pub fn imm_name(self) -> Option<&'static str> {
        let name = match self {
            AluOp::Add => "addi",
            AluOp::Slt => "slti",
            AluOp::Sltu => "sltiu",
            AluOp::Xor => "xori",
            AluOp::Or => "ori",
            AluOp::And => "andi",
            AluOp::Sll => "slli",
            AluOp::Srl => "srli",
            AluOp::Sra => "srai",
            AluOp::AddW => "addiw",
            AluOp::SllW => "slliw",
            AluOp::SrlW => "srliw",
            AluOp::SraW => "sraiw",
            AluOp::Slo => "sloi",
            AluOp::Sro => "sroi",
            AluOp::Ror => "rori",
            AluOp::Clz | AluOp::Ctz | AluOp::Pcnt => self.name(),
            _ => return None,
        };
        Some(name)
    }

    /// Returns true for the multiply operations.
    pub fn is_mul(self) -> bool {
        matches!(
            self,
            AluOp::Mul | AluOp::Mulh | AluOp::Mulhsu | AluOp::Mulhu | AluOp::MulW
        )
    }

    /// Returns true for the divide and remainder operations.
    pub fn is_div(self) -> bool {
        matches!(
            self,
            AluOp::Div
                | AluOp::Divu
                | AluOp::Rem
                | AluOp::Remu
                | AluOp::DivW
                | AluOp::DivuW
                | AluOp::RemW
                | AluOp::RemuW
        )
    }

    /// Returns true for the operations taking a single source operand.
    pub fn is_unary(self) -> bool {
        matches!(self, AluOp::Clz | AluOp::Ctz | AluOp::Pcnt)
    }
}

/// Arithmetic Logic Unit (ALU) for integer operations.
pub struct Alu;

impl Alu {
    /// Executes an integer ALU operation.
    ///
    /// # Arguments
    ///
    /// * `op` - The ALU operation to perform
    /// * `a` - First operand (stored register value)
    /// * `b` - Second operand or immediate, also used as shift amount
    /// * `xlen` - Register width of the hart
    ///
    /// # Returns
    ///
    /// The result truncated to the register width. Word operations
    /// sign-extend their 32-bit result.
    pub fn execute(op: AluOp, a: u64, b: u64, xlen: Xlen) -> u64 {
        /// Bit mask for the shift amount of word operations.
        const SHAMT_MASK_W: u32 = 0x1f;

        let bits = xlen.bits();
        let a = xlen.truncate(a);
        let b = xlen.truncate(b);
        let sa = xlen.signed(a);
        let sb = xlen.signed(b);
        let sh = (b as u32) & xlen.shamt_mask();
        let shw = (b as u32) & SHAMT_MASK_W;
        let sext32 = |v: u32| v as i32 as i64 as u64;

        let res = match op {
            AluOp::Add => a.wrapping_add(b),
            AluOp::Sub => a.wrapping_sub(b),
            AluOp::Sll => a << sh,
            AluOp::Srl => a >> sh,
            AluOp::Sra => (sa >> sh) as u64,
            AluOp::Slt => (sa < sb) as u64,
            AluOp::Sltu => (a < b) as u64,
            AluOp::Xor => a ^ b,
            AluOp::Or => a | b,
            AluOp::And => a & b,

            AluOp::Mul => a.wrapping_mul(b),
            AluOp::Mulh => ((sa as i128 * sb as i128) >> bits) as u64,
            AluOp::Mulhsu => ((sa as i128 * b as i128) >> bits) as u64,
            AluOp::Mulhu => ((a as u128 * b as u128) >> bits) as u64,
            AluOp::Div => {
                if b == 0 {
                    u64::MAX
                } else {
                    sa.wrapping_div(sb) as u64
                }
            }
            AluOp::Divu => {
                if b == 0 {
                    u64::MAX
                } else {
                    a / b
                }
            }
            AluOp::Rem => {
                if b == 0 {
                    a
                } else {
                    sa.wrapping_rem(sb) as u64
                }
            }
            AluOp::Remu => {
                if b == 0 {
                    a
                } else {
                    a % b
                }
            }

            AluOp::AddW => sext32((a as u32).wrapping_add(b as u32)),
            AluOp::SubW => sext32((a as u32).wrapping_sub(b as u32)),
            AluOp::SllW => sext32((a as u32) << shw),
            AluOp::SrlW => sext32((a as u32) >> shw),
            AluOp::SraW => ((a as i32) >> shw) as i64 as u64,
            AluOp::MulW => sext32((a as u32).wrapping_mul(b as u32)),
            AluOp::DivW => {
                if b as u32 == 0 {
                    u64::MAX
                } else {
                    (a as i32).wrapping_div(b as i32) as i64 as u64
                }
            }
            AluOp::DivuW => {
                if b as u32 == 0 {
                    u64::MAX
                } else {
                    sext32(a as u32 / b as u32)
                }
            }
            AluOp::RemW => {
                if b as u32 == 0 {
                    sext32(a as u32)
                } else {
                    (a as i32).wrapping_rem(b as i32) as i64 as u64
                }
            }
            AluOp::RemuW => {
                if b as u32 == 0 {
                    sext32(a as u32)
                } else {
                    sext32(a as u32 % b as u32)
                }
            }

            AluOp::Clz => match xlen {
                Xlen::Rv32 => (a as u32).leading_zeros() as u64,
                Xlen::Rv64 => a.leading_zeros() as u64,
            },
            AluOp::Ctz => {
                if a == 0 {
                    bits as u64
                } else {
                    a.trailing_zeros() as u64
                }
            }
            AluOp::Pcnt => a.count_ones() as u64,
            AluOp::Andc => a & !b,
            AluOp::Slo => !(xlen.truncate(!a) << sh),
            AluOp::Sro => !(xlen.truncate(!a) >> sh),
            AluOp::Rol => match xlen {
                Xlen::Rv32 => (a as u32).rotate_left(sh) as u64,
                Xlen::Rv64 => a.rotate_left(sh),
            },
            AluOp::Ror => match xlen {
                Xlen::Rv32 => (a as u32).rotate_right(sh) as u64,
                Xlen::Rv64 => a.rotate_right(sh),
            },
            AluOp::Min => sa.min(sb) as u64,
            AluOp::Max => sa.max(sb) as u64,
            AluOp::Minu => a.min(b),
            AluOp::Maxu => a.max(b),
            AluOp::Pack => {
                let half = bits / 2;
                let low = a & ((1u64 << half) - 1);
                low | (b << half)
            }
        };
        xlen.truncate(res)
    }
}

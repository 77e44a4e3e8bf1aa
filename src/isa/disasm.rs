//! Instruction Disassembly.
//!
//! Text rendering of decoded instructions for execution traces and the
//! instruction-frequency report. Integer registers print as `xN`, FP
//! registers as `fN`, immediates in decimal except for `lui`/`auipc` and
//! CSR numbers which print in hex.

use crate::core::units::fpu::FpFormat;
use crate::isa::decode::{CsrOp, Decoded, Op};

/// Returns the mnemonic of an operation.
pub fn mnemonic(op: &Op) -> String {
    match *op {
        Op::Illegal => "illegal".to_string(),
        Op::Lui => "lui".to_string(),
        Op::Auipc => "auipc".to_string(),
        Op::Jal => "jal".to_string(),
        Op::Jalr => "jalr".to_string(),
        Op::Branch(b) => b.name().to_string(),
        Op::Load(l) => l.name(),
        Op::Store(w) => format!("s{}", w.suffix()),
        Op::AluImm(a) => a.imm_name().unwrap_or_else(|| a.name()).to_string(),
        Op::Alu(a) => a.name().to_string(),
        Op::Fence => "fence".to_string(),
        Op::FenceI => "fence.i".to_string(),
        Op::Ecall => "ecall".to_string(),
        Op::Ebreak => "ebreak".to_string(),
        Op::Uret => "uret".to_string(),
        Op::Sret => "sret".to_string(),
        Op::Mret => "mret".to_string(),
        Op::Wfi => "wfi".to_string(),
        Op::Csr { op, imm } => {
            let base = match op {
                CsrOp::Rw => "csrrw",
                CsrOp::Rs => "csrrs",
                CsrOp::Rc => "csrrc",
            };
            if imm {
                format!("{}i", base)
            } else {
                base.to_string()
            }
        }
        Op::Lr(w) => format!("lr.{}", w.suffix()),
        Op::Sc(w) => format!("sc.{}", w.suffix()),
        Op::Amo(a, w) => format!("{}.{}", a.name(), w.suffix()),
        Op::FpLoad(FpFormat::Single) => "flw".to_string(),
        Op::FpLoad(FpFormat::Double) => "fld".to_string(),
        Op::FpStore(FpFormat::Single) => "fsw".to_string(),
        Op::FpStore(FpFormat::Double) => "fsd".to_string(),
        Op::FpFma(f, fmt) => format!("{}.{}", f.name(), fmt.suffix()),
        Op::FpBin(f, fmt) => format!("{}.{}", f.name(), fmt.suffix()),
        Op::FpSqrt(fmt) => format!("fsqrt.{}", fmt.suffix()),
        Op::FpSgnj(s, fmt) => format!("{}.{}", s.name(), fmt.suffix()),
        Op::FpMin(fmt) => format!("fmin.{}", fmt.suffix()),
        Op::FpMax(fmt) => format!("fmax.{}", fmt.suffix()),
        Op::FpCmp(c, fmt) => format!("{}.{}", c.name(), fmt.suffix()),
        Op::FpClass(fmt) => format!("fclass.{}", fmt.suffix()),
        Op::FpToInt(fmt, t) => format!("fcvt.{}.{}", t.name(), fmt.suffix()),
        Op::IntToFp(fmt, t) => format!("fcvt.{}.{}", fmt.suffix(), t.name()),
        Op::FpCvt { to, from } => format!("fcvt.{}.{}", to.suffix(), from.suffix()),
        Op::FpMvToInt(fmt) => format!("fmv.x.{}", fmt.suffix()),
        Op::FpMvFromInt(FpFormat::Single) => "fmv.w.x".to_string(),
        Op::FpMvFromInt(FpFormat::Double) => "fmv.d.x".to_string(),
        Op::Custom(c) => c.name().to_string(),
    }
}

/// Disassembles a decoded instruction.
///
/// # Arguments
///
/// * `d` - The decoded instruction
/// * `csr_name` - Resolves a CSR number to its name, if known
pub fn disassemble<F>(d: &Decoded, csr_name: F) -> String
where
    F: Fn(u16) -> Option<String>,
{
    let name = mnemonic(&d.op);
    let (rd, rs1, rs2, rs3, imm) = (d.rd, d.rs1, d.rs2, d.rs3, d.imm);
    let operands = match d.op {
        Op::Illegal => return name,
        Op::Lui | Op::Auipc => format!("x{}, {:#x}", rd, (imm as u64 >> 12) & 0xf_ffff),
        Op::Jal => format!("x{}, {}", rd, imm),
        Op::Jalr => format!("x{}, {}(x{})", rd, imm, rs1),
        Op::Branch(_) => format!("x{}, x{}, {}", rs1, rs2, imm),
        Op::Load(_) => format!("x{}, {}(x{})", rd, imm, rs1),
        Op::Store(_) => format!("x{}, {}(x{})", rs2, imm, rs1),
        Op::AluImm(a) if a.is_unary() => format!("x{}, x{}", rd, rs1),
        Op::AluImm(_) => format!("x{}, x{}, {}", rd, rs1, imm),
        Op::Alu(_) => format!("x{}, x{}, x{}", rd, rs1, rs2),
        Op::Fence => {
            let set = |bits: i64| {
                let s: String = ["i", "o", "r", "w"]
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| bits & (8 >> i) != 0)
                    .map(|(_, c)| *c)
                    .collect();
                s
            };
            format!("{}, {}", set((imm >> 4) & 0xf), set(imm & 0xf))
        }
        Op::FenceI
        | Op::Ecall
        | Op::Ebreak
        | Op::Uret
        | Op::Sret
        | Op::Mret
        | Op::Wfi => return name,
        Op::Csr { op: _, imm: is_imm } => {
            let csr = csr_name(imm as u16).unwrap_or_else(|| format!("{:#x}", imm));
            if is_imm {
                format!("x{}, {}, {}", rd, csr, rs1)
            } else {
                format!("x{}, {}, x{}", rd, csr, rs1)
            }
        }
        Op::Lr(_) => format!("x{}, (x{})", rd, rs1),
        Op::Sc(_) | Op::Amo(..) => format!("x{}, x{}, (x{})", rd, rs2, rs1),
        Op::FpLoad(_) => format!("f{}, {}(x{})", rd, imm, rs1),
        Op::FpStore(_) => format!("f{}, {}(x{})", rs2, imm, rs1),
        Op::FpFma(..) => format!("f{}, f{}, f{}, f{}", rd, rs1, rs2, rs3),
        Op::FpBin(..) | Op::FpSgnj(..) | Op::FpMin(_) | Op::FpMax(_) => {
            format!("f{}, f{}, f{}", rd, rs1, rs2)
        }
        Op::FpSqrt(_) | Op::FpCvt { .. } => format!("f{}, f{}", rd, rs1),
        Op::FpCmp(..) => format!("x{}, f{}, f{}", rd, rs1, rs2),
        Op::FpClass(_) | Op::FpToInt(..) | Op::FpMvToInt(_) => format!("x{}, f{}", rd, rs1),
        Op::IntToFp(..) | Op::FpMvFromInt(_) => format!("f{}, x{}", rd, rs1),
        Op::Custom(_) => format!("x{}, x{}, x{}", rd, rs1, rs2),
    };
    format!("{} {}", name, operands)
}

//! Instruction Execution.
//!
//! Semantics of every decoded operation. Operands are read from the
//! register files, results are computed by the execution units and
//! committed through the register-file write paths, which record the
//! previous value for tracing and undo.

use simple_soft_float::RoundingMode;

use super::Core;
use crate::common::CoreStop;
use crate::core::arch::csr;
use crate::core::units::alu::{Alu, AluOp};
use crate::core::units::fpu::{FpFormat, FpResult, Fpu};
use crate::core::units::lsu::MemWidth;
use crate::isa::compressed;
use crate::isa::decode::{self, BranchOp, CsrOp, CustomOp, Decoded, Op};

/// Value of the rounding-mode field selecting the dynamic mode in `frm`.
const DYNAMIC_RM: u64 = 7;

impl Core {
    /// Decodes a fetched instruction. Compressed instructions are expanded
    /// first and are illegal when the C extension is disabled.
    pub(super) fn decode_inst(&self, inst: u32) -> Decoded {
        if inst & 3 == 3 {
            return decode::decode(inst, &self.isa);
        }
        if !self.isa.c {
            return Decoded::illegal();
        }
        compressed::expand(inst as u16, &self.isa)
            .map(|word| decode::decode(word, &self.isa))
            .unwrap_or_else(Decoded::illegal)
    }

    /// Executes one decoded instruction. `pc` already points past it.
    ///
    /// # Returns
    ///
    /// `Err` when the instruction stops the run.
    pub(super) fn execute(&mut self, d: &Decoded) -> Result<(), CoreStop> {
        let (rd, rs1, rs2, imm) = (d.rd, d.rs1, d.rs2, d.imm);
        match d.op {
            Op::Illegal => return self.illegal_inst(),

            Op::Lui => self.gpr.write(rd, self.xlen.truncate(imm as u64)),
            Op::Auipc => {
                let value = self.xlen.truncate(self.curr_pc.wrapping_add(imm as u64));
                self.gpr.write(rd, value);
            }
            Op::Jal => {
                let link = self.pc;
                self.pc = self.xlen.truncate(self.curr_pc.wrapping_add(imm as u64));
                self.gpr.write(rd, link);
            }
            Op::Jalr => {
                let link = self.pc;
                let target = self.gpr.read(rs1).wrapping_add(imm as u64);
                self.pc = self.xlen.truncate(target) & !1;
                self.gpr.write(rd, link);
            }
            Op::Branch(op) => self.exec_branch(op, rs1, rs2, imm),

            Op::Load(l) => {
                self.exec_load(rd, rs1, imm, l.width, l.unsigned);
            }
            Op::Store(width) => self.exec_store(rs1, rs2, imm, width)?,

            Op::AluImm(op) => self.exec_alu(op, rd, self.gpr.read(rs1), imm as u64),
            Op::Alu(op) => self.exec_alu(op, rd, self.gpr.read(rs1), self.gpr.read(rs2)),

            Op::Fence | Op::FenceI | Op::Wfi => {}
            Op::Ecall => self.exec_ecall(),
            Op::Ebreak => self.exec_ebreak(),
            Op::Mret => self.exec_mret()?,
            Op::Sret => self.exec_sret()?,
            Op::Uret => self.exec_uret()?,
            Op::Csr { op, imm: is_imm } => self.exec_csr(d, op, is_imm)?,

            Op::Lr(width) => self.exec_lr(rd, rs1, width),
            Op::Sc(width) => self.exec_sc(rd, rs1, rs2, width)?,
            Op::Amo(op, width) => self.exec_amo(rd, rs1, rs2, op, width)?,

            Op::FpLoad(fmt) => {
                self.exec_fp_load(rd, rs1, imm, fp_size(fmt));
            }
            Op::FpStore(fmt) => self.exec_fp_store(rs1, rs2, imm, fp_size(fmt))?,

            Op::Custom(op) => self.exec_custom(op, rd, rs1),

            _ => self.exec_fp(d)?,
        }
        Ok(())
    }

    fn exec_alu(&mut self, op: AluOp, rd: usize, a: u64, b: u64) {
        let value = Alu::execute(op, a, b, self.xlen);
        self.gpr.write(rd, value);
    }

    fn exec_branch(&mut self, op: BranchOp, rs1: usize, rs2: usize, offset: i64) {
        let (a, b) = (self.gpr.read(rs1), self.gpr.read(rs2));
        let (sa, sb) = (self.xlen.signed(a), self.xlen.signed(b));
        let taken = match op {
            BranchOp::Eq => a == b,
            BranchOp::Ne => a != b,
            BranchOp::Lt => sa < sb,
            BranchOp::Ge => sa >= sb,
            BranchOp::Ltu => a < b,
            BranchOp::Geu => a >= b,
        };
        if taken {
            self.pc = self.xlen.truncate(self.curr_pc.wrapping_add(offset as u64));
        }
        self.last_branch_taken = taken;
    }

    /// Executes the CSR instructions. The CSR number is in `imm`; `rs1` is
    /// the source register or the 5-bit immediate.
    fn exec_csr(&mut self, d: &Decoded, op: CsrOp, is_imm: bool) -> Result<(), CoreStop> {
        if self.trigger_tripped {
            return Ok(());
        }
        let number = d.imm as u16;
        let source = if is_imm {
            d.rs1 as u64
        } else {
            self.gpr.read(d.rs1)
        };

        // csrrwi into x0 does not read the CSR.
        let prev = if op == CsrOp::Rw && is_imm && d.rd == 0 {
            0
        } else {
            match self.csrs.read(number, self.mode, self.debug_mode) {
                Some(v) => v,
                None => return self.illegal_inst(),
            }
        };

        let next = match op {
            CsrOp::Rw => source,
            CsrOp::Rs => prev | source,
            CsrOp::Rc => prev & !source,
        };
        if op != CsrOp::Rw && d.rs1 == 0 {
            self.gpr.write(d.rd, prev);
            return Ok(());
        }

        self.do_csr_write(number, next, d.rd, prev)
    }

    /// Writes a CSR and the destination register of a CSR instruction.
    ///
    /// A write to MINSTRET/MCYCLE lands after the increment of the
    /// instruction itself, so the counter ends up holding the written value
    /// once the instruction retires.
    fn do_csr_write(&mut self, number: u16, value: u64, rd: usize, prev: u64) -> Result<(), CoreStop> {
        if !self.csrs.is_writeable(number, self.mode, self.debug_mode) {
            return self.illegal_inst();
        }

        let is_instret = matches!(number, csr::MINSTRET | csr::MINSTRETH);
        let is_cycle = matches!(number, csr::MCYCLE | csr::MCYCLEH);
        let counters = &mut self.csrs.counters;
        if is_instret {
            counters.retired = counters.retired.wrapping_add(1);
        }
        if is_cycle {
            counters.cycles = counters.cycles.wrapping_add(1);
        }

        self.csrs.write(number, self.mode, self.debug_mode, value);
        self.gpr.write(rd, prev);

        match number {
            csr::DCSR => {
                let v = self.csrs.peek(csr::DCSR).unwrap_or(value);
                self.dcsr_step = v & csr::dcsr::STEP != 0;
                self.dcsr_step_ie = v & csr::dcsr::STEPIE != 0;
            }
            csr::MGPMC => {
                // Takes effect from the next instruction on.
                self.prev_counters_on = self.counters_on;
                self.counters_on = value & 1 == 1;
            }
            _ => {}
        }

        let counters = &mut self.csrs.counters;
        if is_instret {
            counters.retired = counters.retired.wrapping_sub(1);
        }
        if is_cycle {
            counters.cycles = counters.cycles.wrapping_sub(1);
        }
        Ok(())
    }

    /// Custom opcode group: `setq` copies rs1 into q[rd], `getq` reads
    /// q[rs1] without writing rd. The interrupt-control ops do nothing.
    fn exec_custom(&mut self, op: CustomOp, rd: usize, rs1: usize) {
        match op {
            CustomOp::SetQ => {
                let value = self.gpr.read(rs1);
                self.qregs.write(rd, value);
            }
            // Reads of q registers have no architectural effect.
            CustomOp::GetQ
            | CustomOp::RetIrq
            | CustomOp::MaskIrq
            | CustomOp::WaitIrq
            | CustomOp::Timer => {}
        }
    }

    /// Resolves the rounding mode of an FP instruction.
    ///
    /// # Returns
    ///
    /// `None` for the reserved static modes 5 and 6 and for a dynamic
    /// mode whose `frm` is 5, 6 or 7.
    fn effective_rounding_mode(&self, rm: u64) -> Option<RoundingMode> {
        let rm = if rm == DYNAMIC_RM {
            self.csrs.rounding_mode()
        } else {
            rm
        };
        Fpu::rounding_mode(rm)
    }

    fn fp_operand(&self, fmt: FpFormat, ix: usize) -> u64 {
        match fmt {
            FpFormat::Single => self.fpr.read_single(ix) as u64,
            FpFormat::Double => self.fpr.read_double(ix),
        }
    }

    fn write_fp(&mut self, fmt: FpFormat, ix: usize, value: u64) {
        match fmt {
            FpFormat::Single => self.fpr.write_single(ix, value as u32),
            FpFormat::Double => self.fpr.write_double(ix, value),
        }
    }

    /// Commits an FP result to an FP register and accrues its flags.
    fn commit_fp(&mut self, fmt: FpFormat, rd: usize, r: FpResult) {
        self.write_fp(fmt, rd, r.value);
        self.csrs.accrue_fp_flags(r.flags);
    }

    /// Commits an FP result to an integer register and accrues its flags.
    fn commit_fp_to_int(&mut self, rd: usize, r: FpResult) {
        self.gpr.write(rd, r.value);
        self.csrs.accrue_fp_flags(r.flags);
    }

    /// Executes the F and D arithmetic, compare, convert and move
    /// operations.
    fn exec_fp(&mut self, d: &Decoded) -> Result<(), CoreStop> {
        let rm = if d.op.uses_rounding_mode() {
            match self.effective_rounding_mode(d.rm) {
                Some(rm) => rm,
                None => return self.illegal_inst(),
            }
        } else {
            RoundingMode::TiesToEven
        };
        let (rd, rs1, rs2, rs3) = (d.rd, d.rs1, d.rs2, d.rs3);

        match d.op {
            Op::FpFma(op, fmt) => {
                let (a, b, c) = (
                    self.fp_operand(fmt, rs1),
                    self.fp_operand(fmt, rs2),
                    self.fp_operand(fmt, rs3),
                );
                self.commit_fp(fmt, rd, Fpu::fma(op, fmt, a, b, c, rm));
            }
            Op::FpBin(op, fmt) => {
                let (a, b) = (self.fp_operand(fmt, rs1), self.fp_operand(fmt, rs2));
                self.commit_fp(fmt, rd, Fpu::binary(op, fmt, a, b, rm));
            }
            Op::FpSqrt(fmt) => {
                let a = self.fp_operand(fmt, rs1);
                self.commit_fp(fmt, rd, Fpu::sqrt(fmt, a, rm));
            }
            Op::FpSgnj(op, fmt) => {
                let (a, b) = (self.fp_operand(fmt, rs1), self.fp_operand(fmt, rs2));
                self.write_fp(fmt, rd, Fpu::sgnj(op, fmt, a, b));
            }
            Op::FpMin(fmt) | Op::FpMax(fmt) => {
                let is_max = matches!(d.op, Op::FpMax(_));
                let (a, b) = (self.fp_operand(fmt, rs1), self.fp_operand(fmt, rs2));
                self.commit_fp(fmt, rd, Fpu::min_max(is_max, fmt, a, b));
            }
            Op::FpCmp(op, fmt) => {
                let (a, b) = (self.fp_operand(fmt, rs1), self.fp_operand(fmt, rs2));
                self.commit_fp_to_int(rd, Fpu::compare(op, fmt, a, b));
            }
            Op::FpClass(fmt) => {
                let a = self.fp_operand(fmt, rs1);
                self.gpr.write(rd, Fpu::classify(fmt, a));
            }
            Op::FpToInt(fmt, ty) => {
                let a = self.fp_operand(fmt, rs1);
                self.commit_fp_to_int(rd, Fpu::to_int(fmt, a, ty, rm));
            }
            Op::IntToFp(fmt, ty) => {
                let v = self.gpr.read(rs1);
                self.commit_fp(fmt, rd, Fpu::from_int(fmt, v, ty, rm));
            }
            Op::FpCvt { to, from } => {
                let a = self.fp_operand(from, rs1);
                self.commit_fp(to, rd, Fpu::convert(from, to, a, rm));
            }
            Op::FpMvToInt(fmt) => {
                // Raw register bits, boxed or not.
                let bits = self.fpr.read_bits(rs1);
                let value = match fmt {
                    FpFormat::Single => bits as u32 as i32 as i64 as u64,
                    FpFormat::Double => bits,
                };
                self.gpr.write(rd, value);
            }
            Op::FpMvFromInt(fmt) => {
                let v = self.gpr.read(rs1);
                self.write_fp(fmt, rd, v);
            }
            _ => return self.illegal_inst(),
        }
        Ok(())
    }
}

fn fp_size(fmt: FpFormat) -> usize {
    match fmt {
        FpFormat::Single => MemWidth::Word.bytes(),
        FpFormat::Double => MemWidth::Double.bytes(),
    }
}

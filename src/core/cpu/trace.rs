//! Instruction Tracing and Statistics.
//!
//! After each instruction the core renders one trace block listing every
//! architectural change it made, reports the instruction to the
//! performance counters and records it in the instruction-frequency
//! profile.
//!
//! A trace block holds one record per change, joined by `"  +\n"`:
//!
//! ```text
//! #<n> <hart> <pc> <opcode> <r|f|c|m> <address> <value>  <disassembly>
//! ```

use std::collections::BTreeMap;

use super::Core;
use crate::core::arch::csr;
use crate::core::perf::EventNumber;
use crate::core::units::alu::AluOp;
use crate::isa::decode::{BranchOp, CsrOp, Decoded, Op};
use crate::isa::disasm;
use crate::stats::OpSample;

/// One change record of a trace block.
struct TraceRecord {
    resource: char,
    addr: u64,
    value: u64,
}

impl Core {
    /// Sends the trace block of the current instruction to the sink.
    ///
    /// # Arguments
    ///
    /// * `interrupted` - The instruction was preempted by an interrupt or
    ///   NMI; the block lists the trap's changes.
    pub(super) fn emit_trace(&self, interrupted: bool) {
        let Some(sink) = self.trace.as_ref() else {
            return;
        };
        sink.emit(&self.format_trace(interrupted));
    }

    /// Re-reads the instruction at `addr` for the trace of an interrupted
    /// instruction. Unreadable memory yields 0.
    pub(super) fn reread_inst(&self, addr: u64) -> u32 {
        if let Some(word) = self.memory.read_inst(addr, 4) {
            let word = word as u32;
            return if word & 3 == 3 { word } else { word & 0xffff };
        }
        self.memory
            .read_inst(addr, 2)
            .map(|half| half as u32)
            .unwrap_or(0)
    }

    /// Renders the trace block of the current instruction.
    pub(super) fn format_trace(&self, interrupted: bool) -> String {
        let d = self.decode_inst(self.curr_inst);
        let mut text = disasm::disassemble(&d, |n| self.csrs.get(n).map(|c| c.name().to_string()));
        if interrupted {
            text.push_str(" (interrupted)");
        } else if self.trace_load && d.op.is_load() {
            if let Some(addr) = self.load_addr {
                text.push_str(&format!(" [{:#x}]", addr));
            }
        }

        let opcode = if self.curr_inst & 3 == 3 {
            format!("{:08x}", self.curr_inst)
        } else {
            format!("{:04x}", self.curr_inst & 0xffff)
        };

        let mut records = self.trace_records();
        if records.is_empty() {
            records.push(TraceRecord {
                resource: 'r',
                addr: 0,
                value: 0,
            });
        }

        let width = (self.xlen.bits() / 4) as usize;
        let lines: Vec<String> = records
            .iter()
            .map(|r| {
                let value_width = if r.resource == 'f' { 16 } else { width };
                format!(
                    "#{} {} {:0w$x} {:>8} {} {:0w$x} {:0vw$x}  {}",
                    self.inst_counter,
                    self.hart_id,
                    self.curr_pc,
                    opcode,
                    r.resource,
                    r.addr,
                    r.value,
                    text,
                    w = width,
                    vw = value_width
                )
            })
            .collect();

        let mut block = lines.join("  +\n");
        block.push('\n');
        block
    }

    /// Collects the changes of the current instruction: integer register,
    /// FP register, CSRs and triggers ordered by number, then memory.
    fn trace_records(&self) -> Vec<TraceRecord> {
        let mut records = Vec::new();

        if let Some((ix, _)) = self.gpr.last_written() {
            if ix > 0 {
                records.push(TraceRecord {
                    resource: 'r',
                    addr: ix as u64,
                    value: self.gpr.read(ix),
                });
            }
        }
        if let Some((ix, _)) = self.fpr.last_written() {
            records.push(TraceRecord {
                resource: 'f',
                addr: ix as u64,
                value: self.fpr.read_bits(ix),
            });
        }

        // Trigger registers are keyed above every CSR number.
        let mut csrs: BTreeMap<u64, (u64, u64)> = BTreeMap::new();
        for number in self.last_csrs() {
            if (csr::TDATA1..=csr::TDATA3).contains(&number) {
                continue;
            }
            if let Some(value) = self.csrs.peek(number) {
                csrs.insert(number as u64, (number as u64, value));
            }
        }
        for (ix, which) in self.csrs.triggers.last_written() {
            let number = csr::TDATA1 as u64 + which as u64 - 1;
            if let Some(value) = self.csrs.triggers.read(ix, which) {
                csrs.insert(((ix as u64) << 16) | number, (number, value));
            }
        }
        for (_, (addr, value)) in csrs {
            records.push(TraceRecord {
                resource: 'c',
                addr,
                value,
            });
        }

        if let Some(w) = self.memory.last_write() {
            records.push(TraceRecord {
                resource: 'm',
                addr: w.addr,
                value: w.new_value,
            });
        }
        records
    }

    /// Reports a committed instruction to the performance counters.
    /// Trapping instructions other than `ecall`/`ebreak` count nothing.
    fn update_performance_counters(&mut self, d: &Decoded) {
        let is_trap_op = matches!(d.op, Op::Ecall | Op::Ebreak);
        if self.has_exception && !is_trap_op {
            return;
        }

        let mut events = vec![EventNumber::InstCommitted];
        events.push(if self.curr_inst & 3 == 3 {
            EventNumber::Inst32Committed
        } else {
            EventNumber::Inst16Committed
        });
        if self.curr_pc & 3 == 0 {
            events.push(EventNumber::InstAligned);
        }

        match d.op {
            Op::Ebreak => events.push(EventNumber::Ebreak),
            Op::Ecall => events.push(EventNumber::Ecall),
            Op::Fence => events.push(EventNumber::Fence),
            Op::FenceI => events.push(EventNumber::Fencei),
            Op::Mret => events.push(EventNumber::Mret),
            Op::Alu(op) | Op::AluImm(op) if op.is_mul() => events.push(EventNumber::Mult),
            Op::Alu(op) | Op::AluImm(op) if op.is_div() => events.push(EventNumber::Div),
            Op::Load(_) | Op::FpLoad(_) => {
                events.push(EventNumber::Load);
                if self.misaligned_ld_st {
                    events.push(EventNumber::MisalignLoad);
                }
            }
            Op::Store(_) | Op::FpStore(_) => {
                events.push(EventNumber::Store);
                if self.misaligned_ld_st {
                    events.push(EventNumber::MisalignStore);
                }
            }
            Op::Lr(_) => events.push(EventNumber::Lr),
            Op::Sc(_) => events.push(EventNumber::Sc),
            Op::Amo(..) => events.push(EventNumber::Atomic),
            Op::Csr { op, .. } if !self.has_exception => {
                let event = match op {
                    CsrOp::Rw if d.rd == 0 => EventNumber::CsrWrite,
                    CsrOp::Rw => EventNumber::CsrReadWrite,
                    _ if d.rs1 == 0 => EventNumber::CsrRead,
                    _ => EventNumber::CsrReadWrite,
                };
                events.push(event);
            }
            Op::Branch(_) => {
                events.push(EventNumber::Branch);
                if self.last_branch_taken {
                    events.push(EventNumber::BranchTaken);
                }
            }
            Op::Lui | Op::Auipc | Op::Jal | Op::Jalr | Op::Alu(_) | Op::AluImm(_) => {
                events.push(EventNumber::Alu)
            }
            _ => {}
        }

        for event in events {
            self.csrs.perf.update_counters(event);
        }
    }

    /// Statistics of the current instruction: performance counters (gated
    /// by MGPMC as it was before the instruction) and the
    /// instruction-frequency profile.
    pub(super) fn accumulate_instruction_stats(&mut self, d: &Decoded) {
        if self.enable_counters && self.prev_counters_on {
            self.update_performance_counters(d);
        }
        self.prev_counters_on = self.counters_on;

        let is_trap_op = matches!(d.op, Op::Ecall | Op::Ebreak);
        if self.has_exception && !is_trap_op {
            return;
        }
        self.misaligned_ld_st = false;
        self.last_branch_taken = false;

        if self.profile.is_none() {
            return;
        }
        let sample = self.profile_sample(d);
        let name = disasm::mnemonic(&d.op);
        if let Some(profile) = self.profile.as_mut() {
            profile.record(&name, &sample);
        }
    }

    /// Operand values as they were before the instruction executed.
    fn profile_sample(&self, d: &Decoded) -> OpSample {
        let written = self.gpr.last_written();
        let source_value = |rs: usize| match written {
            Some((rd, prev)) if rd == rs => prev,
            _ => self.gpr.read(rs),
        };
        let (rs1, rs2) = d.int_sources();

        let imm = match d.op {
            Op::Lui
            | Op::Auipc
            | Op::Jal
            | Op::Jalr
            | Op::Branch(_)
            | Op::Load(_)
            | Op::Store(_)
            | Op::AluImm(_)
            | Op::FpLoad(_)
            | Op::FpStore(_) => Some(d.imm),
            _ => None,
        };

        OpSample {
            rd: d.writes_int_rd().then_some(d.rd),
            rs1: rs1.map(|r| (r, source_value(r))),
            rs2: rs2.map(|r| (r, source_value(r))),
            imm,
            unsigned: is_unsigned_op(&d.op),
        }
    }
}

fn is_unsigned_op(op: &Op) -> bool {
    match op {
        Op::Alu(a) | Op::AluImm(a) => matches!(
            a,
            AluOp::Sltu
                | AluOp::Mulhu
                | AluOp::Divu
                | AluOp::Remu
                | AluOp::DivuW
                | AluOp::RemuW
                | AluOp::Minu
                | AluOp::Maxu
        ),
        Op::Branch(b) => matches!(b, BranchOp::Ltu | BranchOp::Geu),
        Op::Load(l) => l.unsigned,
        _ => false,
    }
}

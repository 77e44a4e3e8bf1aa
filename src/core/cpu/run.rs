//! Run Loops.
//!
//! Three ways to drive the hart: `run` executes until something stops it,
//! `single_step` executes exactly one instruction (servicing a pending
//! interrupt first), and `what_if_single_step` executes one instruction
//! only to report what it would change.
//!
//! `run` picks between a minimal loop and an instrumented one. The
//! instrumented loop is used whenever something has to observe individual
//! instructions: a trace sink, an instruction limit, a stop address,
//! instruction-frequency collection, triggers or performance counters.

use std::time::Instant;

use serde::Serialize;

use super::Core;
use crate::common::{CoreStop, StopKind};
use crate::core::arch::mode::DebugModeCause;
use crate::core::debug::TriggerTiming;
use crate::isa::decode::Decoded;

/// Why a run ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// The target or the simulator requested a stop.
    Stopped {
        message: String,
        address: u64,
        value: u64,
    },

    /// The target program exited.
    Exited { code: u64 },

    /// The instruction limit was reached.
    InstructionLimit,

    /// The pc reached the stop address.
    StopAddress(u64),

    /// A trigger halted the hart in debug mode.
    DebugHalt,

    /// The cancel token was set.
    Cancelled,
}

impl StopReason {
    /// Returns true if the run ended the way a passing program ends.
    pub fn is_success(&self) -> bool {
        match self {
            StopReason::Stopped { value, .. } => *value == 1,
            StopReason::Exited { code } => *code == 0,
            StopReason::InstructionLimit | StopReason::StopAddress(_) | StopReason::DebugHalt => {
                true
            }
            StopReason::Cancelled => false,
        }
    }
}

impl From<CoreStop> for StopReason {
    fn from(stop: CoreStop) -> Self {
        match stop.kind {
            StopKind::Stop => StopReason::Stopped {
                message: stop.message,
                address: stop.address,
                value: stop.value,
            },
            StopKind::Exit => StopReason::Exited { code: stop.value },
        }
    }
}

/// Changes an instruction would make, as reported by
/// [`Core::what_if_single_step`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub new_pc: u64,

    /// `(register, new value)`
    pub int_reg: Option<(usize, u64)>,

    /// `(register, new raw bits)`
    pub fp_reg: Option<(usize, u64)>,

    /// `(address, size, new value)`
    pub memory: Option<(u64, usize, u64)>,

    /// `(csr, new value)` in write order.
    pub csrs: Vec<(u16, u64)>,
}

impl Core {
    /// Runs until a stop condition.
    ///
    /// The instruction limit is absolute: it is compared against the
    /// number of instructions executed since the core was created.
    pub fn run(&mut self) -> StopReason {
        let needs_instrumentation = self.trace.is_some()
            || self.inst_limit.is_some()
            || self.profile.is_some()
            || self.enable_triggers
            || self.enable_counters;
        let stop_address_only = self.stop_address.is_some() && self.tohost.is_none();

        let start = Instant::now();
        let reason = if needs_instrumentation || stop_address_only {
            self.run_instrumented()
        } else {
            self.run_simple()
        };
        self.elapsed += start.elapsed();
        self.log_run_summary(&reason);
        reason
    }

    /// Runs until the pc reaches `addr` (or another stop condition).
    pub fn run_until_address(&mut self, addr: u64) -> StopReason {
        let saved = self.stop_address.replace(addr);
        let start = Instant::now();
        let reason = self.run_instrumented();
        self.elapsed += start.elapsed();
        self.stop_address = saved;
        self.log_run_summary(&reason);
        reason
    }

    fn log_run_summary(&self, reason: &StopReason) {
        let retired = self.csrs.counters.retired;
        let secs = self.elapsed.as_secs_f64();
        log::info!("Stopped: {:?}", reason);
        if secs > 0.0 {
            log::info!(
                "Retired {} instructions in {:.2}s  {:.0} inst/s",
                retired,
                secs,
                retired as f64 / secs
            );
        } else {
            log::info!("Retired {} instructions", retired);
        }
    }

    fn run_instrumented(&mut self) -> StopReason {
        let limit = self.inst_limit.unwrap_or(u64::MAX);
        loop {
            if let Some(addr) = self.stop_address {
                if self.pc == addr {
                    return StopReason::StopAddress(addr);
                }
            }
            if self.inst_counter >= limit {
                return StopReason::InstructionLimit;
            }
            if self.cancel.is_cancelled() {
                return StopReason::Cancelled;
            }

            match self.step_instrumented() {
                Ok(true) => {}
                Ok(false) => return StopReason::DebugHalt,
                Err(stop) => return self.finish_with(stop),
            }
        }
    }

    /// One iteration of the instrumented loop.
    ///
    /// # Returns
    ///
    /// `Ok(false)` if a trigger halted the hart in debug mode.
    fn step_instrumented(&mut self) -> Result<bool, CoreStop> {
        self.begin_instruction();

        let Some(inst) = self.fetch_with_triggers() else {
            return Ok(true);
        };
        let d = self.execute_fetched(inst)?;

        if self.has_exception {
            self.accumulate_instruction_stats(&d);
            self.emit_trace(false);
            return Ok(true);
        }

        if self.trigger_tripped {
            self.undo_for_trigger();
            let pc = self.curr_pc;
            return Ok(!self.take_trigger_action(pc, pc, true));
        }

        self.retire(&d);
        let icount = self.icount_trigger_hit();
        self.emit_trace(false);

        if icount {
            let pc = self.pc;
            return Ok(!self.take_trigger_action(pc, pc, false));
        }
        Ok(true)
    }

    /// Loop without tracing, limits or triggers. Only a stop signal or the
    /// cancel token ends it.
    fn run_simple(&mut self) -> StopReason {
        loop {
            if self.cancel.is_cancelled() {
                return StopReason::Cancelled;
            }
            self.begin_instruction();

            let pc = self.pc;
            let Some(inst) = self.fetch_inst(pc) else {
                self.csrs.counters.cycles = self.csrs.counters.cycles.wrapping_add(1);
                continue;
            };
            match self.execute_fetched(inst) {
                Ok(_) if self.has_exception => {}
                Ok(_) => self.csrs.counters.retired = self.csrs.counters.retired.wrapping_add(1),
                Err(stop) => return self.finish_with(stop),
            }
        }
    }

    /// Executes one instruction as a test bench would: a pending NMI or
    /// interrupt is taken instead, and debug-step is honored afterwards.
    ///
    /// # Returns
    ///
    /// The stop reason if the instruction stopped the run.
    pub fn single_step(&mut self) -> Option<StopReason> {
        let start = Instant::now();
        let result = self.single_step_inner();
        self.elapsed += start.elapsed();
        match result {
            Ok(()) => None,
            Err(stop) => Some(self.finish_with(stop)),
        }
    }

    fn single_step_inner(&mut self) -> Result<(), CoreStop> {
        self.begin_instruction();
        self.ebreak_inst_debug = false;

        if self.process_external_interrupt() {
            return Ok(());
        }

        let Some(inst) = self.fetch_with_triggers() else {
            if self.dcsr_step && !self.trigger_tripped {
                self.enter_debug_mode_cause(DebugModeCause::Step, self.pc);
            }
            return Ok(());
        };
        let d = self.execute_fetched(inst)?;

        if self.has_exception {
            self.accumulate_instruction_stats(&d);
            self.emit_trace(false);
            if self.dcsr_step && !self.ebreak_inst_debug {
                self.enter_debug_mode_cause(DebugModeCause::Step, self.pc);
            }
            return Ok(());
        }

        if self.trigger_tripped {
            self.undo_for_trigger();
            let pc = self.curr_pc;
            self.take_trigger_action(pc, pc, true);
            return Ok(());
        }

        self.retire(&d);
        let icount = self.icount_trigger_hit();
        self.emit_trace(false);

        if icount {
            let pc = self.pc;
            self.take_trigger_action(pc, pc, false);
            return Ok(());
        }
        if self.dcsr_step && !self.ebreak_inst_debug {
            self.enter_debug_mode_cause(DebugModeCause::Step, self.pc);
        }
        Ok(())
    }

    /// Executes `inst` at the current pc, reports its changes and undoes
    /// them, including any load/store queue updates.
    ///
    /// # Returns
    ///
    /// `(true, changes)` if the instruction completed without an
    /// exception or stop.
    pub fn what_if_single_step(&mut self, inst: u32) -> (bool, ChangeRecord) {
        self.clear_trace_data();
        self.has_exception = false;
        self.trigger_tripped = false;

        let prev_pc = self.pc;
        let saved_mode = self.mode;
        let saved_reservation = self.reservation;
        let saved_exceptions = self.exception_count;
        let (saved_retired, saved_cycles) = (self.csrs.counters.retired, self.csrs.counters.cycles);
        let saved_store_queue = self.store_queue.clone();
        let saved_load_queue = self.load_queue.clone();
        self.curr_pc = prev_pc;

        let completed = self.execute_fetched(inst).is_ok();
        let ok = completed && self.exception_count == saved_exceptions;

        let record = self.collect_and_undo(prev_pc);
        self.store_queue = saved_store_queue;
        self.load_queue = saved_load_queue;
        self.exception_count = saved_exceptions;
        self.csrs.counters.retired = saved_retired;
        self.csrs.counters.cycles = saved_cycles;
        self.mode = saved_mode;
        self.reservation = saved_reservation;
        (ok, record)
    }

    /// Like [`Core::what_if_single_step`] for the instruction stored at the
    /// current pc. A failing fetch reports the changes of the fetch
    /// exception.
    pub fn what_if_single_step_at(&mut self) -> (bool, ChangeRecord) {
        self.clear_trace_data();
        let prev_pc = self.pc;
        let saved_mode = self.mode;
        let saved_exceptions = self.exception_count;
        let saved_store_queue = self.store_queue.clone();
        let saved_load_queue = self.load_queue.clone();
        self.curr_pc = prev_pc;

        match self.fetch_inst(prev_pc) {
            Some(inst) => self.what_if_single_step(inst),
            None => {
                let record = self.collect_and_undo(prev_pc);
                self.store_queue = saved_store_queue;
                self.load_queue = saved_load_queue;
                self.exception_count = saved_exceptions;
                self.mode = saved_mode;
                (false, record)
            }
        }
    }

    /// Snapshots the pending changes into a record and reverts them.
    fn collect_and_undo(&mut self, prev_pc: u64) -> ChangeRecord {
        let mut record = ChangeRecord {
            new_pc: self.pc,
            ..ChangeRecord::default()
        };
        self.pc = prev_pc;

        if let Some((ix, prev)) = self.gpr.last_written() {
            record.int_reg = Some((ix, self.gpr.read(ix)));
            self.gpr.poke(ix, prev);
        }
        if let Some((ix, prev)) = self.fpr.last_written() {
            record.fp_reg = Some((ix, self.fpr.read_bits(ix)));
            self.fpr.poke(ix, prev);
        }
        if let Some(w) = self.memory.last_write() {
            record.memory = Some((w.addr, w.size, w.new_value));
            self.memory.poke(w.addr, w.size, w.prev_value);
        }

        let written = self.csrs.last_written().to_vec();
        for number in self.last_csrs() {
            if let Some(value) = self.csrs.peek(number) {
                record.csrs.push((number, value));
            }
        }
        for &(number, prev) in written.iter().rev() {
            self.csrs.restore(number, prev);
        }

        self.clear_trace_data();
        record
    }

    /// Resets the per-instruction state at the top of every loop.
    fn begin_instruction(&mut self) {
        self.curr_pc = self.pc;
        self.has_exception = false;
        self.trigger_tripped = false;
        self.load_addr = None;
        self.inst_counter += 1;
        self.clear_trace_data();
    }

    /// Fetches at the current pc, checking instruction-address triggers
    /// first. A failed fetch costs a cycle and is traced.
    fn fetch_with_triggers(&mut self) -> Option<u32> {
        let pc = self.pc;
        let addr_hit = self.enable_triggers
            && self.csrs.triggers.has_active_inst_trigger()
            && {
                let ie = self.interrupts_enabled();
                self.csrs
                    .triggers
                    .inst_addr_hit(pc, TriggerTiming::Before, self.mode, ie)
            };

        let fetched = if addr_hit {
            self.trigger_tripped = true;
            self.fetch_inst_post_trigger(pc)
        } else {
            let fetched = self.fetch_inst(pc);
            if fetched.is_none() {
                self.emit_trace(false);
            }
            fetched
        };
        if fetched.is_none() {
            self.csrs.counters.cycles = self.csrs.counters.cycles.wrapping_add(1);
        }
        fetched
    }

    /// Checks opcode triggers, advances the pc past `inst` and executes
    /// it.
    fn execute_fetched(&mut self, inst: u32) -> Result<Decoded, CoreStop> {
        self.curr_inst = inst;

        if self.enable_triggers && self.csrs.triggers.has_active_inst_trigger() {
            let ie = self.interrupts_enabled();
            if self
                .csrs
                .triggers
                .inst_opcode_hit(inst, TriggerTiming::Before, self.mode, ie)
            {
                self.trigger_tripped = true;
            }
        }

        let len = if inst & 3 == 3 { 4 } else { 2 };
        self.pc = self.xlen.truncate(self.pc.wrapping_add(len));

        let d = self.decode_inst(inst);
        let result = self.execute(&d);
        self.csrs.counters.cycles = self.csrs.counters.cycles.wrapping_add(1);
        result.map(|_| d)
    }

    /// Retirement bookkeeping of an instruction that completed normally.
    fn retire(&mut self, d: &Decoded) {
        if !self.debug_stop_count() {
            self.csrs.counters.retired = self.csrs.counters.retired.wrapping_add(1);
        }
        self.accumulate_instruction_stats(d);
        self.update_load_queue(d);
    }

    /// A retired non-load instruction that reads or overwrites a register
    /// makes older load-queue entries for it unrevertable.
    fn update_load_queue(&mut self, d: &Decoded) {
        if !self.load_queue.is_enabled() || d.op.is_load() {
            return;
        }
        let (rs1, rs2) = d.int_sources();
        for rs in [rs1, rs2].into_iter().flatten() {
            self.load_queue.remove_for_reg(rs);
        }
        if let Some((rd, _)) = self.gpr.last_written() {
            if rd > 0 {
                self.load_queue.invalidate(rd);
            }
        }
    }

    fn icount_trigger_hit(&mut self) -> bool {
        if !self.enable_triggers {
            return false;
        }
        let ie = self.interrupts_enabled();
        self.csrs.triggers.icount_hit(self.mode, ie)
    }

    /// Finishes the run on a stop signal. The stopping instruction is
    /// traced; a stop (as opposed to an exit) counts as retired.
    fn finish_with(&mut self, stop: CoreStop) -> StopReason {
        if stop.kind == StopKind::Stop {
            self.csrs.counters.retired = self.csrs.counters.retired.wrapping_add(1);
        }
        self.emit_trace(false);
        self.finished = true;
        log::debug!("{}", stop);
        StopReason::from(stop)
    }
}

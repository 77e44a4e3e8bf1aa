//! Traps, Interrupts and Debug Mode.
//!
//! Every control transfer that is not a jump goes through here: synchronous
//! exceptions, asynchronous interrupts, non-maskable interrupts, the trap
//! return instructions and debug-mode entry and exit. Trap entry always
//! targets Machine mode; delegation is not modeled.

use super::Core;
use crate::common::CoreStop;
use crate::core::arch::csr::{self, dcsr};
use crate::core::arch::mode::{DebugModeCause, PrivilegeMode};
use crate::core::arch::trap::{ExceptionCause, InterruptCause, NmiCause, TrapHandler};
use crate::core::debug::TriggerAction;
use crate::core::perf::EventNumber;

/// Consecutive illegal instructions tolerated before the run is stopped.
const MAX_CONSECUTIVE_ILLEGAL: u32 = 64;

impl Core {
    /// Starts a synchronous exception.
    ///
    /// # Arguments
    ///
    /// * `cause` - Exception cause
    /// * `pc` - Address saved in MEPC
    /// * `info` - Value written to MTVAL
    pub(super) fn initiate_exception(&mut self, cause: ExceptionCause, pc: u64, info: u64) {
        self.exception_count += 1;
        self.has_exception = true;
        self.initiate_trap(false, cause.code(), pc, info);

        if self.enable_counters && self.counters_on {
            self.csrs.perf.update_counters(EventNumber::Exception);
        }
    }

    /// Starts an asynchronous interrupt; MTVAL is cleared.
    pub(super) fn initiate_interrupt(&mut self, cause: InterruptCause, pc: u64) {
        self.interrupt_count += 1;
        self.initiate_trap(true, cause.code(), pc, 0);

        if self.enable_counters && self.counters_on {
            let event = match cause {
                InterruptCause::MachineExternal => EventNumber::ExternalInterrupt,
                InterruptCause::MachineTimer => EventNumber::TimerInterrupt,
                _ => EventNumber::None,
            };
            self.csrs.perf.update_counters(event);
        }
    }

    /// Common trap entry into Machine mode.
    fn initiate_trap(&mut self, is_interrupt: bool, cause: u64, pc: u64, info: u64) {
        self.reservation = None;

        let prev_mode = self.mode;
        self.mode = PrivilegeMode::Machine;

        let cause_value = TrapHandler::cause_value(is_interrupt, cause, self.xlen.bits());
        self.write_trap_csr(csr::MEPC, pc & !1);
        self.write_trap_csr(csr::MCAUSE, cause_value);
        self.write_trap_csr(csr::MTVAL, info);

        let status = self.read_machine_csr(csr::MSTATUS);
        self.write_trap_csr(csr::MSTATUS, TrapHandler::enter_machine(status, prev_mode));

        let tvec = self.read_machine_csr(csr::MTVEC);
        self.pc = TrapHandler::target_pc(tvec, is_interrupt, cause);
    }

    /// Takes a non-maskable interrupt: the cause goes to MCAUSE as is and
    /// execution resumes at the NMI vector.
    pub(super) fn initiate_nmi(&mut self, cause: NmiCause, pc: u64) {
        self.reservation = None;

        let prev_mode = self.mode;
        self.mode = PrivilegeMode::Machine;

        self.write_trap_csr(csr::MEPC, pc & !1);
        self.write_trap_csr(csr::MCAUSE, cause.code());
        self.write_trap_csr(csr::MTVAL, 0);

        let status = self.read_machine_csr(csr::MSTATUS);
        self.write_trap_csr(csr::MSTATUS, TrapHandler::enter_machine(status, prev_mode));

        self.update_dcsr_nmip(false);
        self.pc = self.nmi_pc & !1;
    }

    fn write_trap_csr(&mut self, number: u16, value: u64) {
        if !self.csrs.write(number, PrivilegeMode::Machine, self.debug_mode, value) {
            log::error!("Failed to write CSR {:#x} during trap entry", number);
        }
    }

    fn read_machine_csr(&self, number: u16) -> u64 {
        self.csrs
            .read(number, PrivilegeMode::Machine, self.debug_mode)
            .unwrap_or(0)
    }

    /// Sets or clears DCSR.nmip, recording the change.
    fn update_dcsr_nmip(&mut self, set: bool) {
        let Some(val) = self.csrs.peek(csr::DCSR) else {
            return;
        };
        let new = if set { val | dcsr::NMIP } else { val & !dcsr::NMIP };
        self.csrs.record_write(csr::DCSR);
        self.csrs.poke(csr::DCSR, new);
    }

    /// Raises an illegal-instruction exception for the current instruction.
    ///
    /// # Returns
    ///
    /// `Err` once more than 64 illegal instructions executed back to back
    /// without anything retiring in between.
    pub(super) fn illegal_inst(&mut self) -> Result<(), CoreStop> {
        if self.trigger_tripped {
            return Ok(());
        }

        let retired = self.csrs.counters.retired;
        if retired == self.retired_at_last_illegal {
            self.consecutive_illegal += 1;
        } else {
            self.consecutive_illegal = 0;
        }
        if self.consecutive_illegal > MAX_CONSECUTIVE_ILLEGAL {
            return Err(CoreStop::stop(
                "Too many consecutive illegal instructions",
                self.curr_pc,
                0,
            ));
        }
        self.retired_at_last_illegal = retired;

        self.initiate_exception(ExceptionCause::IllegalInst, self.curr_pc, self.curr_inst as u64);
        Ok(())
    }

    /// Marks an NMI pending. The first cause sticks until the NMI is taken
    /// or cleared.
    pub fn set_pending_nmi(&mut self, cause: NmiCause) {
        if !self.nmi_pending {
            self.nmi_cause = cause;
        }
        self.nmi_pending = true;
        self.update_dcsr_nmip(true);
    }

    pub fn clear_pending_nmi(&mut self) {
        self.nmi_pending = false;
        self.nmi_cause = NmiCause::Unknown;
        self.update_dcsr_nmip(false);
    }

    pub fn is_nmi_pending(&self) -> bool {
        self.nmi_pending
    }

    /// Enters debug-halt (or leaves debug-step for debug-halt), recording
    /// the cause and the resume address in DCSR and DPC.
    pub(super) fn enter_debug_mode_cause(&mut self, cause: DebugModeCause, pc: u64) {
        self.reservation = None;

        if self.debug_mode {
            if self.debug_step_mode {
                self.debug_step_mode = false;
            } else {
                log::error!("Entering debug-halt while in debug-halt");
            }
        } else {
            self.debug_mode = true;
            if self.debug_step_mode {
                log::error!("Entering debug-halt with debug-step true");
            }
            self.debug_step_mode = false;
        }

        if let Some(mut value) = self.csrs.read(csr::DCSR, PrivilegeMode::Machine, self.debug_mode) {
            value &= !dcsr::CAUSE;
            value |= (cause as u64) << dcsr::CAUSE_SHIFT;
            if self.nmi_pending {
                value |= dcsr::NMIP;
            }
            self.csrs.poke(csr::DCSR, value);
            self.csrs.poke(csr::DPC, pc);
        }
    }

    /// Test-bench request to halt. Ignored if the hart already halted on
    /// its own.
    pub fn enter_debug_mode(&mut self, pc: u64) {
        if self.debug_mode {
            return;
        }
        if self.debug_step_mode {
            log::error!("Enter-debug command finds core in debug-step mode");
        }
        self.debug_step_mode = false;
        self.enter_debug_mode_cause(DebugModeCause::Debugger, pc);
    }

    /// Test-bench request to resume from debug mode.
    ///
    /// Execution continues at DPC. Debug-step returns to debug-halt;
    /// debug-halt goes to debug-step when DCSR.step is set and to normal
    /// execution otherwise. A set DCSR.nmip re-arms the NMI.
    pub fn exit_debug_mode(&mut self) {
        if !self.debug_mode {
            log::error!("Bench sent exit debug while not in debug mode");
            return;
        }

        if let Some(dpc) = self.csrs.peek(csr::DPC) {
            self.pc = dpc;
        }

        if self.debug_step_mode {
            self.debug_step_mode = false;
        } else if self.dcsr_step {
            self.debug_step_mode = true;
        } else {
            self.debug_mode = false;
        }

        match self.csrs.peek(csr::DCSR) {
            Some(v) if v & dcsr::NMIP != 0 => self.set_pending_nmi(self.nmi_cause),
            Some(_) => {}
            None => log::error!("Failed to read DCSR in exit debug"),
        }
    }

    /// Acts on a tripped trigger: enter debug mode or take a breakpoint
    /// exception with `info` in MTVAL. Before-timing actions also emit the
    /// trace record of the suppressed instruction.
    ///
    /// # Returns
    ///
    /// `true` if debug mode was entered.
    pub(super) fn take_trigger_action(&mut self, pc: u64, info: u64, before: bool) -> bool {
        let entered_debug = if self.csrs.triggers.tripped_action() == Some(TriggerAction::EnterDebug)
        {
            self.enter_debug_mode_cause(DebugModeCause::Trigger, pc);
            true
        } else {
            self.initiate_exception(ExceptionCause::Breakpoint, pc, info);
            if self.dcsr_step {
                self.enter_debug_mode_cause(DebugModeCause::Trigger, self.pc);
            }
            false
        };

        if before {
            self.emit_trace(false);
        }
        entered_debug
    }

    /// Reverts the register write and pc advance of an instruction whose
    /// trigger tripped.
    pub(super) fn undo_for_trigger(&mut self) {
        if let Some((ix, prev)) = self.gpr.last_written() {
            self.gpr.poke(ix, prev);
        }
        self.gpr.clear_last_written();
        self.pc = self.curr_pc;
    }

    /// Returns the interrupt to take, if any is pending, enabled and
    /// admitted in the current debug state.
    pub(super) fn possible_interrupt(&self) -> Option<InterruptCause> {
        if self.debug_mode && !self.debug_step_mode {
            return None;
        }
        if !self.interrupts_enabled() {
            return None;
        }
        let mip = self.csrs.read(csr::MIP, PrivilegeMode::Machine, self.debug_mode)?;
        let mie = self.csrs.read(csr::MIE, PrivilegeMode::Machine, self.debug_mode)?;
        InterruptCause::highest_pending(mip, mie)
    }

    /// Takes a pending NMI, or else a pending enabled interrupt, at the
    /// current instruction boundary. The interrupted instruction is traced
    /// with the trap's changes attached.
    ///
    /// # Returns
    ///
    /// `true` if a trap was taken.
    pub(super) fn process_external_interrupt(&mut self) -> bool {
        if self.debug_step_mode && !self.dcsr_step_ie {
            return false;
        }

        if self.nmi_pending {
            let cause = self.nmi_cause;
            self.initiate_nmi(cause, self.pc);
            self.nmi_pending = false;
            self.nmi_cause = NmiCause::Unknown;
            self.curr_inst = self.reread_inst(self.curr_pc);
            self.emit_trace(true);
            return true;
        }

        if let Some(cause) = self.possible_interrupt() {
            self.initiate_interrupt(cause, self.pc);
            self.curr_inst = self.reread_inst(self.curr_pc);
            self.emit_trace(true);
            self.csrs.counters.cycles = self.csrs.counters.cycles.wrapping_add(1);
            return true;
        }
        false
    }

    /// Counts an `ecall`/`ebreak` as retired even though it traps.
    fn retire_trapping_inst(&mut self) {
        if !self.debug_stop_count() {
            self.csrs.counters.retired = self.csrs.counters.retired.wrapping_add(1);
        }
    }

    pub(super) fn exec_ecall(&mut self) {
        if self.trigger_tripped {
            return;
        }
        self.retire_trapping_inst();

        let cause = match self.mode {
            PrivilegeMode::Machine => ExceptionCause::MachineEnvCall,
            PrivilegeMode::Supervisor => ExceptionCause::SupervisorEnvCall,
            PrivilegeMode::User => ExceptionCause::UserEnvCall,
        };
        self.initiate_exception(cause, self.curr_pc, 0);
    }

    /// `ebreak` enters debug mode from Machine mode when DCSR.ebreakm is
    /// set and raises a breakpoint exception otherwise.
    pub(super) fn exec_ebreak(&mut self) {
        if self.trigger_tripped {
            return;
        }

        if self.mode == PrivilegeMode::Machine {
            let dcsr_val = self.csrs.peek(csr::DCSR).unwrap_or(0);
            if dcsr_val & dcsr::EBREAKM != 0 {
                self.csrs.record_write(csr::DCSR);
                self.enter_debug_mode_cause(DebugModeCause::Ebreak, self.curr_pc);
                self.ebreak_inst_debug = true;
                return;
            }
        }

        self.retire_trapping_inst();
        self.initiate_exception(ExceptionCause::Breakpoint, self.curr_pc, self.curr_pc);
    }

    pub(super) fn exec_mret(&mut self) -> Result<(), CoreStop> {
        if self.mode < PrivilegeMode::Machine {
            return self.illegal_inst();
        }
        if self.trigger_tripped {
            return Ok(());
        }

        let Some(status) = self.csrs.read(csr::MSTATUS, self.mode, self.debug_mode) else {
            return self.illegal_inst();
        };
        self.reservation = None;

        let (status, saved_mode) = TrapHandler::mret(status);
        self.write_trap_csr(csr::MSTATUS, status);

        let Some(epc) = self.csrs.read(csr::MEPC, self.mode, self.debug_mode) else {
            return self.illegal_inst();
        };
        self.pc = epc & !1;
        self.mode = saved_mode;
        Ok(())
    }

    pub(super) fn exec_sret(&mut self) -> Result<(), CoreStop> {
        if !self.isa.s || self.mode < PrivilegeMode::Supervisor {
            return self.illegal_inst();
        }
        if self.trigger_tripped {
            return Ok(());
        }

        let Some(status) = self.csrs.read(csr::SSTATUS, self.mode, self.debug_mode) else {
            return self.illegal_inst();
        };
        let (status, saved_mode) = TrapHandler::sret(status);
        if !self.csrs.write(csr::SSTATUS, self.mode, self.debug_mode, status) {
            return self.illegal_inst();
        }

        let Some(epc) = self.csrs.read(csr::SEPC, self.mode, self.debug_mode) else {
            return self.illegal_inst();
        };
        self.pc = epc & !1;
        self.mode = saved_mode;
        Ok(())
    }

    pub(super) fn exec_uret(&mut self) -> Result<(), CoreStop> {
        if !self.isa.u || self.mode != PrivilegeMode::User {
            return self.illegal_inst();
        }
        if self.trigger_tripped {
            return Ok(());
        }

        let Some(status) = self.csrs.read(csr::USTATUS, self.mode, self.debug_mode) else {
            return self.illegal_inst();
        };
        if !self
            .csrs
            .write(csr::USTATUS, self.mode, self.debug_mode, TrapHandler::uret(status))
        {
            return self.illegal_inst();
        }

        let Some(epc) = self.csrs.read(csr::UEPC, self.mode, self.debug_mode) else {
            return self.illegal_inst();
        };
        self.pc = epc & !1;
        Ok(())
    }
}

//! The Hart Core.
//!
//! `Core` owns the architectural state of one hart and drives it through
//! fetch, decode, execute and commit. The implementation is split over
//! several files, each adding an `impl Core` block:
//!
//! * `memory`: loads, stores, atomics, fetch and the region rules,
//! * `execute`: the semantics of every decoded operation,
//! * `trap`: exceptions, interrupts, NMIs, trap returns and debug mode,
//! * `rollback`: undo of delayed memory-error notifications,
//! * `run`: run loops, single step and what-if execution,
//! * `trace`: trace records, performance events and statistics.
//!
//! This file holds the state itself, construction, reset and the peek/poke
//! interface used by test benches.

mod execute;
mod memory;
mod rollback;
mod run;
mod trace;
mod trap;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

pub use run::{ChangeRecord, StopReason};

use crate::common::{SimError, Xlen};
use crate::config::Config;
use crate::core::arch::csr::{self, dcsr, CsRegs};
use crate::core::arch::fpr::Fpr;
use crate::core::arch::gpr::Gpr;
use crate::core::arch::mode::PrivilegeMode;
use crate::core::arch::qregs::{Qregs, QREG_COUNT};
use crate::core::arch::trap::NmiCause;
use crate::core::lsq::{LoadQueue, StoreQueue};
use crate::isa::IsaConfig;
use crate::sim::trace::{CancelToken, TraceSink};
use crate::soc::{LastWrite, Memory, RegionKind};
use crate::stats::InstProfile;

/// Number of address regions used by the region rules.
const REGION_COUNT: usize = 16;

/// Load reservation of `lr`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Reservation {
    addr: u64,
    size: usize,
}

/// One RISC-V hart.
pub struct Core {
    hart_id: u64,
    xlen: Xlen,
    isa: IsaConfig,
    bitmanip: bool,

    gpr: Gpr,
    fpr: Fpr,
    qregs: Qregs,
    csrs: CsRegs,
    memory: Box<dyn Memory>,

    store_queue: StoreQueue,
    load_queue: LoadQueue,

    pc: u64,
    curr_pc: u64,
    curr_inst: u32,
    reset_pc: u64,
    nmi_pc: u64,
    mode: PrivilegeMode,

    debug_mode: bool,
    debug_step_mode: bool,
    dcsr_step: bool,
    dcsr_step_ie: bool,
    ebreak_inst_debug: bool,

    reservation: Option<Reservation>,
    nmi_pending: bool,
    nmi_cause: NmiCause,

    force_access_fail: bool,
    force_fetch_fail: bool,
    force_fetch_fail_offset: u64,

    tohost: Option<u64>,
    console_io: Option<u64>,
    console_out: Box<dyn Write + Send>,
    stop_address: Option<u64>,
    inst_limit: Option<u64>,

    enable_counters: bool,
    counters_on: bool,
    prev_counters_on: bool,
    enable_triggers: bool,
    ea_compat_with_base: bool,
    amo_illegal_outside_dccm: bool,
    trace_load: bool,

    region_has_local_mem: [bool; REGION_COUNT],
    region_has_local_data_mem: [bool; REGION_COUNT],

    // Per-instruction state.
    load_addr: Option<u64>,
    misaligned_ld_st: bool,
    last_branch_taken: bool,
    has_exception: bool,
    trigger_tripped: bool,

    consecutive_illegal: u32,
    retired_at_last_illegal: u64,
    inst_counter: u64,
    exception_count: u64,
    interrupt_count: u64,
    finished: bool,
    elapsed: Duration,

    trace: Option<Arc<dyn TraceSink>>,
    cancel: CancelToken,
    profile: Option<InstProfile>,
}

impl Core {
    /// Creates a hart from a configuration and resets it.
    ///
    /// # Arguments
    ///
    /// * `config` - Core, memory-region and CSR configuration
    /// * `memory` - Memory the hart executes from
    ///
    /// # Returns
    ///
    /// The hart, or an error if the configuration names an unknown CSR or a
    /// region that does not fit in memory.
    pub fn new(config: &Config, memory: Box<dyn Memory>) -> Result<Self, SimError> {
        let cc = &config.core;
        let xlen = cc.xlen_val()?;
        let extensions = cc.misa_extensions();
        let mut csrs = CsRegs::new(xlen, extensions, cc.hart_id, cc.perf_counters, cc.triggers);
        for c in &config.csr {
            csrs.configure(&c.name, &c.to_override()?)?;
        }
        let isa = IsaConfig::from_misa(xlen, extensions, cc.bitmanip);

        let mut core = Self {
            hart_id: cc.hart_id,
            xlen,
            isa,
            bitmanip: cc.bitmanip,
            gpr: Gpr::new(xlen),
            fpr: Fpr::new(isa.d),
            qregs: Qregs::new(),
            csrs,
            memory,
            store_queue: StoreQueue::new(cc.store_queue_size),
            load_queue: LoadQueue::new(cc.load_queue_size),
            pc: 0,
            curr_pc: 0,
            curr_inst: 0,
            reset_pc: cc.reset_pc_val(),
            nmi_pc: cc.nmi_pc_val(),
            mode: PrivilegeMode::Machine,
            debug_mode: false,
            debug_step_mode: false,
            dcsr_step: false,
            dcsr_step_ie: false,
            ebreak_inst_debug: false,
            reservation: None,
            nmi_pending: false,
            nmi_cause: NmiCause::Unknown,
            force_access_fail: false,
            force_fetch_fail: false,
            force_fetch_fail_offset: 0,
            tohost: cc.tohost_val(),
            console_io: cc.console_io_val(),
            console_out: Box::new(std::io::stdout()),
            stop_address: cc.stop_address_val(),
            inst_limit: cc.max_instructions,
            enable_counters: cc.enable_counters,
            counters_on: false,
            prev_counters_on: false,
            enable_triggers: cc.enable_triggers,
            ea_compat_with_base: cc.ea_compat_with_base,
            amo_illegal_outside_dccm: cc.amo_illegal_outside_dccm,
            trace_load: cc.trace_load,
            region_has_local_mem: [false; REGION_COUNT],
            region_has_local_data_mem: [false; REGION_COUNT],
            load_addr: None,
            misaligned_ld_st: false,
            last_branch_taken: false,
            has_exception: false,
            trigger_tripped: false,
            consecutive_illegal: 0,
            retired_at_last_illegal: 0,
            inst_counter: 0,
            exception_count: 0,
            interrupt_count: 0,
            finished: false,
            elapsed: Duration::ZERO,
            trace: None,
            cancel: CancelToken::new(),
            profile: None,
        };

        for (kind, region) in config.memory.regions() {
            let (base, size) = (region.base_val(), region.size_val());
            if !core.define_region(kind, base, size) {
                return Err(SimError::InvalidConfig(format!(
                    "{:?} region {:#x}+{:#x} does not fit in memory",
                    kind, base, size
                )));
            }
        }

        core.reset(false);
        Ok(core)
    }

    /// Restores the reset state of the hart.
    ///
    /// Extensions are re-derived from MISA (D only together with F), the
    /// counter enable from MGPMC and the step bits from DCSR.
    ///
    /// # Arguments
    ///
    /// * `reset_memory_mapped_regs` - Also reset memory-mapped registers
    pub fn reset(&mut self, reset_memory_mapped_regs: bool) {
        self.gpr.reset();
        self.fpr.reset();
        self.qregs.reset();
        self.csrs.reset();

        let misa = self.csrs.peek(csr::MISA).unwrap_or(0);
        self.isa = IsaConfig::from_misa(self.xlen, misa, self.bitmanip);

        self.counters_on = self.csrs.peek(csr::MGPMC).map(|v| v & 1 == 1).unwrap_or(false);
        self.prev_counters_on = self.counters_on;

        self.debug_mode = false;
        self.debug_step_mode = false;
        let dcsr_val = self.csrs.peek(csr::DCSR).unwrap_or(0);
        self.dcsr_step = dcsr_val & dcsr::STEP != 0;
        self.dcsr_step_ie = dcsr_val & dcsr::STEPIE != 0;

        self.clear_pending_nmi();
        self.store_queue.clear();
        self.load_queue.clear();
        self.reservation = None;

        self.mode = PrivilegeMode::Machine;
        self.pc = self.reset_pc;
        self.curr_pc = self.reset_pc;
        self.consecutive_illegal = 0;
        self.finished = false;

        if reset_memory_mapped_regs {
            self.memory.reset_memory_mapped_registers();
        }
        self.clear_trace_data();
    }

    /// Declares a special memory region and records which address regions
    /// hold local (closely-coupled) memory.
    pub fn define_region(&mut self, kind: RegionKind, base: u64, size: u64) -> bool {
        if size == 0 || !self.memory.define_region(kind, base, size) {
            return false;
        }
        if kind == RegionKind::MappedRegs {
            return true;
        }
        let first = self.region_of(base);
        let last = self.region_of(base + size - 1);
        for r in first..=last {
            self.region_has_local_mem[r] = true;
            if kind == RegionKind::Dccm {
                self.region_has_local_data_mem[r] = true;
            }
        }
        true
    }

    /// Returns the region index of an address (its top four bits).
    fn region_of(&self, addr: u64) -> usize {
        let addr = self.xlen.truncate(addr);
        ((addr >> (self.xlen.bits() - 4)) & 0xf) as usize
    }

    pub fn hart_id(&self) -> u64 {
        self.hart_id
    }

    pub fn xlen(&self) -> Xlen {
        self.xlen
    }

    pub fn isa(&self) -> &IsaConfig {
        &self.isa
    }

    pub fn pc(&self) -> u64 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u64) {
        self.pc = self.xlen.truncate(pc) & !1;
    }

    /// Returns the address of the most recently executed instruction.
    pub fn last_pc(&self) -> u64 {
        self.curr_pc
    }

    pub fn privilege_mode(&self) -> PrivilegeMode {
        self.mode
    }

    pub fn in_debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn in_debug_step_mode(&self) -> bool {
        self.debug_step_mode
    }

    /// Returns true once the target stopped or exited.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn retired_instructions(&self) -> u64 {
        self.csrs.counters.retired
    }

    pub fn cycle_count(&self) -> u64 {
        self.csrs.counters.cycles
    }

    pub fn exception_count(&self) -> u64 {
        self.exception_count
    }

    pub fn interrupt_count(&self) -> u64 {
        self.interrupt_count
    }

    /// Wall-clock time spent in run loops so far.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn csrs(&self) -> &CsRegs {
        &self.csrs
    }

    pub fn memory(&self) -> &dyn Memory {
        self.memory.as_ref()
    }

    pub fn memory_mut(&mut self) -> &mut dyn Memory {
        self.memory.as_mut()
    }

    pub fn store_queue(&self) -> &StoreQueue {
        &self.store_queue
    }

    pub fn load_queue(&self) -> &LoadQueue {
        &self.load_queue
    }

    pub fn set_trace_sink(&mut self, sink: Option<Arc<dyn TraceSink>>) {
        self.trace = sink;
    }

    pub fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = token;
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn set_console_output(&mut self, out: Box<dyn Write + Send>) {
        self.console_out = out;
    }

    pub fn set_tohost(&mut self, addr: Option<u64>) {
        self.tohost = addr;
    }

    pub fn set_console_io(&mut self, addr: Option<u64>) {
        self.console_io = addr;
    }

    pub fn set_stop_address(&mut self, addr: Option<u64>) {
        self.stop_address = addr;
    }

    pub fn set_instruction_limit(&mut self, limit: Option<u64>) {
        self.inst_limit = limit;
    }

    pub fn enable_triggers(&mut self, flag: bool) {
        self.enable_triggers = flag;
    }

    pub fn enable_performance_counters(&mut self, flag: bool) {
        self.enable_counters = flag;
    }

    pub fn enable_trace_load(&mut self, flag: bool) {
        self.trace_load = flag;
    }

    /// Starts or stops collecting the instruction-frequency profile.
    pub fn enable_instruction_frequency(&mut self, flag: bool) {
        self.profile = if flag { Some(InstProfile::new()) } else { None };
    }

    pub fn instruction_profile(&self) -> Option<&InstProfile> {
        self.profile.as_ref()
    }

    /// Makes the next data access fail with an access fault.
    pub fn force_access_fail(&mut self) {
        self.force_access_fail = true;
    }

    /// Makes the next fetch fail; MTVAL receives `pc + offset`.
    pub fn force_fetch_fail(&mut self, offset: u64) {
        self.force_fetch_fail = true;
        self.force_fetch_fail_offset = offset;
    }

    pub fn peek_int_reg(&self, ix: usize) -> Option<u64> {
        (ix < 32).then(|| self.gpr.read(ix))
    }

    pub fn poke_int_reg(&mut self, ix: usize, value: u64) -> bool {
        self.gpr.poke(ix, value)
    }

    /// Reads an auxiliary q register.
    pub fn peek_qreg(&self, ix: usize) -> Option<u64> {
        (ix < QREG_COUNT).then(|| self.qregs.read(ix))
    }

    /// Finds an integer register by ABI or architectural name.
    pub fn find_int_reg(&self, name: &str) -> Option<usize> {
        Gpr::find(name)
    }

    pub fn peek_fp_reg(&self, ix: usize) -> Option<u64> {
        if !self.isa.f || ix >= 32 {
            return None;
        }
        Some(self.fpr.read_bits(ix))
    }

    pub fn poke_fp_reg(&mut self, ix: usize, value: u64) -> bool {
        self.isa.f && self.fpr.poke(ix, value)
    }

    pub fn find_fp_reg(&self, name: &str) -> Option<usize> {
        Fpr::find(name)
    }

    pub fn peek_csr(&self, number: u16) -> Option<u64> {
        self.csrs.peek(number)
    }

    /// Pokes a CSR, applying the same core side effects as a CSR
    /// instruction would for DCSR and MGPMC.
    pub fn poke_csr(&mut self, number: u16, value: u64) -> bool {
        if !self.csrs.poke(number, value) {
            return false;
        }
        match number {
            csr::DCSR => {
                self.dcsr_step = value & dcsr::STEP != 0;
                self.dcsr_step_ie = value & dcsr::STEPIE != 0;
            }
            csr::MGPMC => {
                self.counters_on = value & 1 == 1;
                self.prev_counters_on = self.counters_on;
            }
            _ => {}
        }
        true
    }

    pub fn find_csr(&self, name: &str) -> Option<u16> {
        self.csrs.find(name)
    }

    pub fn implemented_csrs(&self) -> Vec<u16> {
        self.csrs.implemented_csrs()
    }

    /// Returns `(tdata1, tdata2, tdata3)` of a trigger.
    pub fn peek_trigger(&self, ix: usize) -> Option<(u64, u64, u64)> {
        self.csrs.triggers.peek(ix)
    }

    pub fn peek_memory(&self, addr: u64, size: usize) -> Option<u64> {
        self.memory.read(addr, size)
    }

    /// Writes memory through the backdoor. A poke touching the reserved
    /// bytes of a live `lr` cancels the reservation.
    pub fn poke_memory(&mut self, addr: u64, size: usize, value: u64) -> bool {
        if !self.memory.poke(addr, size, value) {
            return false;
        }
        self.cancel_reservation_overlapping(addr, size);
        true
    }

    /// Returns the integer register written by the last instruction.
    pub fn last_int_reg(&self) -> Option<usize> {
        self.gpr.last_written().map(|(ix, _)| ix)
    }

    pub fn last_fp_reg(&self) -> Option<usize> {
        self.fpr.last_written().map(|(ix, _)| ix)
    }

    /// Returns the CSRs written by the last instruction, in write order
    /// without duplicates.
    pub fn last_csrs(&self) -> Vec<u16> {
        let mut out: Vec<u16> = Vec::new();
        for (n, _) in self.csrs.last_written() {
            if !out.contains(n) {
                out.push(*n);
            }
        }
        out
    }

    /// Returns the memory written by the last instruction as `(address,
    /// word)` pairs; a double-word write yields two words.
    pub fn last_memory(&self) -> Vec<(u64, u32)> {
        let Some(LastWrite {
            addr,
            size,
            new_value,
            ..
        }) = self.memory.last_write()
        else {
            return Vec::new();
        };
        let mut out = vec![(addr, new_value as u32)];
        if size == 8 {
            out.push((addr + 4, (new_value >> 32) as u32));
        }
        out
    }

    /// Clears the per-instruction change records of every state holder.
    fn clear_trace_data(&mut self) {
        self.gpr.clear_last_written();
        self.fpr.clear_last_written();
        self.qregs.clear_last_written();
        self.csrs.clear_last_written();
        self.csrs.perf.clear_modified();
        self.csrs.triggers.clear_local_hits();
        self.memory.clear_last_write();
    }

    fn cancel_reservation_overlapping(&mut self, addr: u64, size: usize) {
        if let Some(r) = self.reservation {
            let end = addr.wrapping_add(size as u64);
            let r_end = r.addr.wrapping_add(r.size as u64);
            if addr < r_end && r.addr < end {
                self.reservation = None;
            }
        }
    }

    /// Returns true if MSTATUS.MIE is set.
    fn interrupts_enabled(&self) -> bool {
        self.csrs
            .peek(csr::MSTATUS)
            .map(|s| s & crate::core::arch::trap::mstatus::MIE != 0)
            .unwrap_or(false)
    }

    /// Returns true if the hart is halted with DCSR.stopcount set.
    fn debug_stop_count(&self) -> bool {
        self.debug_mode
            && self
                .csrs
                .peek(csr::DCSR)
                .map(|v| v & dcsr::STOPCOUNT != 0)
                .unwrap_or(false)
    }
}

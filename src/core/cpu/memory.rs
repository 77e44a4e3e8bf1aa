//! Memory Access.
//!
//! Instruction fetch and the load/store paths of the hart: effective
//! address triggers, the region rules for misaligned accesses, console and
//! to-host addresses, atomics and the load reservation, and the load/store
//! queue bookkeeping used by delayed error rollback.

use std::io::{Read, Write};

use super::{Core, Reservation};
use crate::common::CoreStop;
use crate::core::arch::csr;
use crate::core::arch::mode::PrivilegeMode;
use crate::core::arch::trap::ExceptionCause;
use crate::core::debug::TriggerTiming;
use crate::core::lsq::{LoadInfo, StoreInfo};
use crate::core::units::lsu::{AmoOp, Lsu, MemWidth};

impl Core {
    /// Fetches the instruction at `addr`.
    ///
    /// A word fetch that fails falls back to a half-word fetch; a
    /// non-compressed half-word faults with the address of its second
    /// half.
    ///
    /// # Returns
    ///
    /// The instruction word, or `None` after an exception was initiated.
    pub(super) fn fetch_inst(&mut self, addr: u64) -> Option<u32> {
        if self.force_fetch_fail {
            self.force_fetch_fail = false;
            let info = self.pc.wrapping_add(self.force_fetch_fail_offset);
            self.initiate_exception(ExceptionCause::InstAccessFault, self.pc, info);
            return None;
        }

        if addr & 1 != 0 {
            self.initiate_exception(ExceptionCause::InstAddrMisaligned, addr, addr);
            return None;
        }

        if let Some(word) = self.memory.read_inst(addr, 4) {
            return Some(word as u32);
        }

        let Some(half) = self.memory.read_inst(addr, 2) else {
            self.initiate_exception(ExceptionCause::InstAccessFault, addr, addr);
            return None;
        };
        let half = half as u32;
        if half & 3 != 3 {
            return Some(half);
        }

        let second = self.xlen.truncate(addr.wrapping_add(2));
        self.initiate_exception(ExceptionCause::InstAccessFault, addr, second);
        None
    }

    /// Fetch performed after an instruction-address trigger tripped: if
    /// the fetch would fail, the trigger action is taken instead of the
    /// fetch exception.
    pub(super) fn fetch_inst_post_trigger(&mut self, addr: u64) -> Option<u32> {
        if !self.force_fetch_fail && addr & 1 == 0 {
            if let Some(word) = self.memory.read_inst(addr, 4) {
                return Some(word as u32);
            }
            if let Some(half) = self.memory.read_inst(addr, 2) {
                if half & 3 != 3 {
                    return Some(half as u32);
                }
            }
        }

        self.take_trigger_action(addr, addr, true);
        self.force_fetch_fail = false;
        None
    }

    /// Returns false if MRAC marks the region of `addr` as having side
    /// effects and the region holds no local memory.
    fn is_idempotent_region(&self, addr: u64) -> bool {
        let region = self.region_of(addr);
        match self.csrs.read(csr::MRAC, PrivilegeMode::Machine, self.debug_mode) {
            Some(mrac) => (mrac >> (region * 2 + 1)) & 1 == 0 || self.region_has_local_mem[region],
            None => true,
        }
    }

    /// A misaligned access raises an exception when it crosses a region
    /// boundary or touches a region with side effects.
    fn misaligned_access_causes_exception(&self, addr: u64, size: usize) -> bool {
        let last = addr.wrapping_add(size as u64 - 1);
        if self.region_of(addr) != self.region_of(last) {
            return true;
        }
        !self.is_idempotent_region(addr) || !self.is_idempotent_region(last)
    }

    /// True if base and effective address lie in regions that disagree on
    /// holding local data memory.
    fn effective_and_base_addr_mismatch(&self, base: u64, addr: u64) -> bool {
        let (rb, ra) = (self.region_of(base), self.region_of(addr));
        rb != ra && self.region_has_local_data_mem[rb] != self.region_has_local_data_mem[ra]
    }

    /// Checks load/store address triggers. Returns true if one tripped.
    fn ld_st_addr_trigger(&mut self, addr: u64, is_load: bool) -> bool {
        if !self.enable_triggers || !self.csrs.triggers.has_active_trigger() {
            return false;
        }
        let ie = self.interrupts_enabled();
        if self
            .csrs
            .triggers
            .ld_st_addr_hit(addr, TriggerTiming::Before, is_load, self.mode, ie)
        {
            self.trigger_tripped = true;
        }
        self.trigger_tripped
    }

    /// Checks store-data triggers against the value that would land in
    /// memory.
    fn st_data_trigger(&mut self, addr: u64, size: usize, value: u64) {
        if !self.enable_triggers || !self.csrs.triggers.has_active_trigger() {
            return;
        }
        if self.force_access_fail {
            return;
        }
        let Some(masked) = self.memory.check_write(addr, size, value) else {
            return;
        };
        let ie = self.interrupts_enabled();
        if self
            .csrs
            .triggers
            .ld_st_data_hit(masked, TriggerTiming::Before, false, self.mode, ie)
        {
            self.trigger_tripped = true;
        }
    }

    /// Queues a load, or invalidates `reg_ix` for blocking (DCCM) loads.
    fn put_in_load_queue(&mut self, size: usize, addr: u64, reg_ix: usize, prev: u64) {
        if !self.load_queue.is_enabled() {
            return;
        }
        if self.memory.is_addr_in_dccm(addr) {
            self.load_queue.invalidate(reg_ix);
            return;
        }
        self.load_queue.push(LoadInfo::new(size, addr, reg_ix, prev));
    }

    fn put_in_store_queue(&mut self, size: usize, addr: u64, value: u64) {
        if !self.store_queue.is_enabled() || size == 0 || self.memory.is_addr_in_dccm(addr) {
            return;
        }
        let prev = self.memory.last_write().map(|w| w.prev_value).unwrap_or(0);
        self.store_queue.push(StoreInfo::new(size, addr, value, prev));
    }

    /// Raises a load exception. The memory system reports completion even
    /// for failed loads, so a placeholder entry is queued.
    fn initiate_load_exception(&mut self, cause: ExceptionCause, addr: u64, size: usize) {
        if self.load_queue.is_enabled() && !self.force_access_fail {
            self.put_in_load_queue(size, addr, 0, 0);
        }
        self.force_access_fail = false;
        self.initiate_exception(cause, self.curr_pc, addr);
    }

    fn initiate_store_exception(&mut self, cause: ExceptionCause, addr: u64) {
        self.force_access_fail = false;
        self.initiate_exception(cause, self.curr_pc, addr);
    }

    /// Shared part of integer and FP loads after the trigger check.
    ///
    /// # Returns
    ///
    /// The raw (zero-extended) bytes read, or `None` after an exception.
    fn load_checked(&mut self, base: u64, addr: u64, size: usize) -> Option<u64> {
        if self.ea_compat_with_base {
            self.force_access_fail |= self.effective_and_base_addr_mismatch(base, addr);
        }

        let misaligned = addr & (size as u64 - 1) != 0;
        self.misaligned_ld_st = misaligned;
        if misaligned && self.misaligned_access_causes_exception(addr, size) {
            self.initiate_load_exception(ExceptionCause::LoadAddrMisaligned, addr, size);
            return None;
        }

        if !self.force_access_fail {
            if let Some(v) = self.memory.read(addr, size) {
                return Some(v);
            }
        }
        self.initiate_load_exception(ExceptionCause::LoadAccessFault, addr, size);
        None
    }

    /// Executes an integer load into `rd`.
    pub(super) fn exec_load(
        &mut self,
        rd: usize,
        rs1: usize,
        imm: i64,
        width: MemWidth,
        unsigned: bool,
    ) -> bool {
        let base = self.gpr.read(rs1);
        let addr = self.xlen.truncate(base.wrapping_add(imm as u64));
        self.load_addr = Some(addr);

        if self.load_queue.is_enabled() {
            self.load_queue.remove_for_reg(rs1);
        }
        if self.ld_st_addr_trigger(addr, true) {
            return false;
        }

        if width == MemWidth::Byte && self.console_io == Some(addr) {
            let mut byte = [0u8; 1];
            let value = match std::io::stdin().read(&mut byte) {
                Ok(1) if unsigned => byte[0] as u64,
                Ok(1) => byte[0] as i8 as i64 as u64,
                _ => u64::MAX,
            };
            self.gpr.write(rd, value);
            return true;
        }

        let size = width.bytes();
        let Some(raw) = self.load_checked(base, addr, size) else {
            return false;
        };
        let value = Lsu::extend(raw, width, unsigned);
        let prev = self.gpr.read(rd);
        self.put_in_load_queue(size, addr, rd, prev);
        self.gpr.write(rd, value);
        true
    }

    /// Executes `flw`/`fld`.
    pub(super) fn exec_fp_load(&mut self, rd: usize, rs1: usize, imm: i64, size: usize) -> bool {
        let base = self.gpr.read(rs1);
        let addr = self.xlen.truncate(base.wrapping_add(imm as u64));
        self.load_addr = Some(addr);

        if self.ld_st_addr_trigger(addr, true) {
            return false;
        }
        let Some(raw) = self.load_checked(base, addr, size) else {
            return false;
        };
        if size == 4 {
            self.fpr.write_single(rd, raw as u32);
        } else {
            self.fpr.write_double(rd, raw);
        }
        true
    }

    /// Stores `value` (the low `size` bytes) at `addr`.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if memory was written, `Ok(false)` after an exception or
    /// a tripped trigger, and `Err` when a non-zero value reaches the
    /// to-host address.
    pub(super) fn store(
        &mut self,
        base: u64,
        addr: u64,
        size: usize,
        value: u64,
    ) -> Result<bool, CoreStop> {
        let value = if size == 8 {
            value
        } else {
            value & ((1u64 << (size * 8)) - 1)
        };

        self.ld_st_addr_trigger(addr, false);

        if self.ea_compat_with_base {
            self.force_access_fail |= self.effective_and_base_addr_mismatch(base, addr);
        }

        let misaligned = addr & (size as u64 - 1) != 0;
        self.misaligned_ld_st = misaligned;
        if misaligned && self.misaligned_access_causes_exception(addr, size) {
            if self.trigger_tripped {
                return Ok(false);
            }
            self.initiate_store_exception(ExceptionCause::StoreAddrMisaligned, addr);
            return Ok(false);
        }

        self.st_data_trigger(addr, size, value);
        if self.trigger_tripped {
            return Ok(false);
        }

        self.write_checked(addr, size, value, self.force_access_fail)
    }

    /// Performs the write of a store that passed its checks.
    fn write_checked(
        &mut self,
        addr: u64,
        size: usize,
        value: u64,
        force_fail: bool,
    ) -> Result<bool, CoreStop> {
        if size == 1 && self.console_io == Some(addr) {
            if let Err(e) = self.console_out.write_all(&[value as u8]) {
                log::warn!("Console write failed: {}", e);
            } else if let Err(e) = self.console_out.flush() {
                log::warn!("Console flush failed: {}", e);
            }
            return Ok(true);
        }

        if force_fail || !self.memory.write(addr, size, value) {
            self.initiate_store_exception(ExceptionCause::StoreAccessFault, addr);
            return Ok(false);
        }

        self.cancel_reservation_overlapping(addr, size);

        if self.tohost == Some(addr) && value != 0 {
            return Err(CoreStop::stop("write to to-host", addr, value));
        }

        self.put_in_store_queue(size, addr, value);
        Ok(true)
    }

    /// Executes an integer store.
    pub(super) fn exec_store(
        &mut self,
        rs1: usize,
        rs2: usize,
        imm: i64,
        width: MemWidth,
    ) -> Result<(), CoreStop> {
        let base = self.gpr.read(rs1);
        let addr = self.xlen.truncate(base.wrapping_add(imm as u64));
        let value = self.gpr.read(rs2);
        self.store(base, addr, width.bytes(), value)?;
        Ok(())
    }

    /// Executes `fsw`/`fsd`.
    pub(super) fn exec_fp_store(
        &mut self,
        rs1: usize,
        rs2: usize,
        imm: i64,
        size: usize,
    ) -> Result<(), CoreStop> {
        let base = self.gpr.read(rs1);
        let addr = self.xlen.truncate(base.wrapping_add(imm as u64));
        let value = if size == 4 {
            self.fpr.read_single(rs2) as u64
        } else {
            self.fpr.read_double(rs2)
        };
        self.store(base, addr, size, value)?;
        Ok(())
    }

    /// Checks the address of an atomic access. Atomics must be naturally
    /// aligned and, optionally, target DCCM; violations raise a
    /// store-access fault.
    fn validate_amo_addr(&mut self, addr: u64, size: usize) -> bool {
        let misaligned = addr & (size as u64 - 1) != 0;
        let outside = self.amo_illegal_outside_dccm && !self.memory.is_addr_in_dccm(addr);
        if misaligned || outside {
            if !self.trigger_tripped {
                self.initiate_store_exception(ExceptionCause::StoreAccessFault, addr);
            }
            return false;
        }
        true
    }

    /// Load half of an atomic read-modify-write.
    fn amo_load(&mut self, rs1: usize, size: usize) -> Option<u64> {
        let addr = self.gpr.read(rs1);
        self.load_addr = Some(addr);
        if self.load_queue.is_enabled() {
            self.load_queue.remove_for_reg(rs1);
        }
        if self.ld_st_addr_trigger(addr, true) {
            return None;
        }

        if !self.validate_amo_addr(addr, size) {
            self.force_access_fail = false;
            return None;
        }

        if !self.force_access_fail {
            if let Some(v) = self.memory.read(addr, size) {
                return Some(v);
            }
        }
        self.initiate_load_exception(ExceptionCause::StoreAccessFault, addr, size);
        None
    }

    /// Executes an atomic memory operation.
    pub(super) fn exec_amo(
        &mut self,
        rd: usize,
        rs1: usize,
        rs2: usize,
        op: AmoOp,
        width: MemWidth,
    ) -> Result<(), CoreStop> {
        let lock = self.memory.amo_lock();
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let size = width.bytes();
        let Some(loaded) = self.amo_load(rs1, size) else {
            return Ok(());
        };
        let loaded = Lsu::extend(loaded, width, false);
        let addr = self.gpr.read(rs1);
        let result = Lsu::atomic_alu(op, loaded, self.gpr.read(rs2), width);

        let stored = self.store(addr, addr, size, result)?;
        if stored && !self.trigger_tripped {
            self.gpr.write(rd, loaded);
        }
        Ok(())
    }

    /// Executes `lr.w`/`lr.d`.
    pub(super) fn exec_lr(&mut self, rd: usize, rs1: usize, width: MemWidth) {
        let addr = self.gpr.read(rs1);
        self.load_addr = Some(addr);
        if self.load_queue.is_enabled() {
            self.load_queue.remove_for_reg(rs1);
        }
        if self.ld_st_addr_trigger(addr, true) {
            return;
        }

        let size = width.bytes();
        let misaligned = addr & (size as u64 - 1) != 0;
        self.misaligned_ld_st = misaligned;
        if misaligned {
            self.initiate_load_exception(ExceptionCause::LoadAccessFault, addr, size);
            return;
        }

        let force_fail = self.force_access_fail
            || (self.amo_illegal_outside_dccm && !self.memory.is_addr_in_dccm(addr));
        let raw = if force_fail {
            None
        } else {
            self.memory.read(addr, size)
        };
        let Some(raw) = raw else {
            self.initiate_load_exception(ExceptionCause::LoadAccessFault, addr, size);
            return;
        };

        let prev = self.gpr.read(rd);
        self.put_in_load_queue(size, addr, rd, prev);
        self.gpr.write(rd, Lsu::extend(raw, width, false));

        if !self.has_exception && !self.trigger_tripped {
            self.reservation = Some(Reservation { addr, size });
        }
    }

    /// Store half of `sc.w`/`sc.d`.
    fn store_conditional(&mut self, addr: u64, size: usize, value: u64) -> Result<bool, CoreStop> {
        let value = if size == 8 {
            value
        } else {
            value & 0xffff_ffff
        };

        self.ld_st_addr_trigger(addr, false);

        let misaligned = addr & (size as u64 - 1) != 0;
        self.misaligned_ld_st = misaligned;
        let outside = self.amo_illegal_outside_dccm && !self.memory.is_addr_in_dccm(addr);
        if misaligned || outside {
            if !self.trigger_tripped {
                self.initiate_store_exception(ExceptionCause::StoreAccessFault, addr);
            }
            return Ok(false);
        }

        self.st_data_trigger(addr, size, value);
        if self.trigger_tripped {
            return Ok(false);
        }

        match self.reservation {
            Some(r) if r.addr == addr => {}
            _ => return Ok(false),
        }

        self.write_checked(addr, size, value, self.force_access_fail)
    }

    /// Executes `sc.w`/`sc.d`: rd is 0 on success and 1 on failure.
    pub(super) fn exec_sc(
        &mut self,
        rd: usize,
        rs1: usize,
        rs2: usize,
        width: MemWidth,
    ) -> Result<(), CoreStop> {
        let addr = self.gpr.read(rs1);
        let value = self.gpr.read(rs2);
        let ok = self.store_conditional(addr, width.bytes(), value);
        self.reservation = None;
        if ok? {
            self.gpr.write(rd, 0);
            return Ok(());
        }
        if self.has_exception || self.trigger_tripped {
            return Ok(());
        }
        self.gpr.write(rd, 1);
        Ok(())
    }
}

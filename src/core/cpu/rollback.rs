//! Imprecise Error Rollback.
//!
//! The memory system may report a bus or ECC error for a store or load
//! after the instruction has retired. These entry points latch the error
//! address in MDSEAC, raise the matching non-maskable interrupt and undo
//! the architectural effect recorded in the store or load queue.

use super::Core;
use crate::core::arch::csr;
use crate::core::arch::trap::NmiCause;
use crate::core::lsq::UndoError;

impl Core {
    /// Latches `addr` in MDSEAC and raises an NMI, unless MDSEAC is
    /// already locked by an earlier error.
    fn latch_error_address(&mut self, addr: u64, cause: NmiCause) {
        self.csrs.record_write(csr::MDSEAC);
        if self.csrs.is_mdseac_locked() {
            return;
        }
        self.csrs.poke(csr::MDSEAC, addr);
        self.csrs.lock_mdseac();
        self.set_pending_nmi(cause);
    }

    /// Reports an imprecise store error at `addr`.
    ///
    /// Restores the bytes overwritten by the matching store-queue entry.
    ///
    /// # Returns
    ///
    /// False if the address matches no entry or more than one entry.
    pub fn apply_store_exception(&mut self, addr: u64) -> bool {
        self.latch_error_address(addr, NmiCause::StoreException);
        if !self.store_queue.is_enabled() {
            return true;
        }

        match self.store_queue.undo(addr) {
            Ok(pokes) => {
                for (byte_addr, byte) in pokes {
                    self.memory.poke(byte_addr, 1, byte as u64);
                    self.cancel_reservation_overlapping(byte_addr, 1);
                }
                true
            }
            Err(e) => {
                log_undo_error("store", addr, e);
                false
            }
        }
    }

    /// Reports an imprecise load error at `addr`.
    ///
    /// Reverts the destination register of the matching load-queue entry
    /// to its value before the load.
    ///
    /// # Returns
    ///
    /// False if the address matches no entry or more than one entry.
    pub fn apply_load_exception(&mut self, addr: u64) -> bool {
        self.latch_error_address(addr, NmiCause::LoadException);
        if !self.load_queue.is_enabled() {
            return true;
        }

        match self.load_queue.undo(addr) {
            Ok(Some(revert)) => {
                self.gpr.poke(revert.reg_ix, revert.value);
                true
            }
            Ok(None) => true,
            Err(e) => {
                log_undo_error("load", addr, e);
                false
            }
        }
    }

    /// Reports that the load at `addr` completed without error and retires
    /// its load-queue entry.
    ///
    /// # Arguments
    ///
    /// * `addr` - Load address
    /// * `match_oldest` - Retire the oldest matching entry instead of the
    ///   newest
    pub fn apply_load_finished(&mut self, addr: u64, match_oldest: bool) -> bool {
        if !self.load_queue.is_enabled() {
            return true;
        }
        if self.load_queue.finish(addr, match_oldest) == 0 {
            log::warn!(
                "Load finished at {:#x} does not match any address in the load queue",
                addr
            );
        }
        true
    }
}

fn log_undo_error(queue: &str, addr: u64, err: UndoError) {
    match err {
        UndoError::NoMatch => log::error!(
            "Imprecise {} exception at {:#x} does not match any address in the {} queue",
            queue,
            addr,
            queue
        ),
        UndoError::MultipleMatches(n) => log::error!(
            "Imprecise {} exception at {:#x} matches {} entries in the {} queue",
            queue,
            addr,
            n,
            queue
        ),
    }
}

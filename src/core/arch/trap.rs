//! Trap Causes and Transition Helpers.
//!
//! This module defines synchronous exception causes, interrupt causes (with
//! their admission priority) and non-maskable interrupt causes, together with
//! the pure bit manipulations performed on MSTATUS and MTVEC when a trap is
//! taken or returned from. The stateful part of trap entry lives in the core.

use crate::core::arch::mode::PrivilegeMode;

/// Synchronous exception causes (MCAUSE values without the interrupt bit).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExceptionCause {
    InstAddrMisaligned = 0,
    InstAccessFault = 1,
    IllegalInst = 2,
    Breakpoint = 3,
    LoadAddrMisaligned = 4,
    LoadAccessFault = 5,
    StoreAddrMisaligned = 6,
    StoreAccessFault = 7,
    UserEnvCall = 8,
    SupervisorEnvCall = 9,
    MachineEnvCall = 11,
    InstPageFault = 12,
    LoadPageFault = 13,
    StorePageFault = 15,
}

impl ExceptionCause {
    /// Returns the cause code.
    pub fn code(self) -> u64 {
        self as u64
    }
}

/// Asynchronous interrupt causes.
///
/// The internal timers and the local interrupt are platform specific and
/// sit in the custom range of MIP/MIE.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptCause {
    MachineSoftware = 3,
    MachineTimer = 7,
    MachineExternal = 11,
    InternalTimer1 = 28,
    InternalTimer0 = 29,
    MachineLocal = 30,
}

impl InterruptCause {
    /// Interrupt causes in admission order, highest priority first.
    pub const PRIORITY: [InterruptCause; 6] = [
        InterruptCause::MachineExternal,
        InterruptCause::MachineLocal,
        InterruptCause::MachineSoftware,
        InterruptCause::MachineTimer,
        InterruptCause::InternalTimer0,
        InterruptCause::InternalTimer1,
    ];

    /// Returns the cause code.
    pub fn code(self) -> u64 {
        self as u64
    }

    /// Returns the MIP/MIE bit of this interrupt.
    pub fn bit(self) -> u64 {
        1 << (self as u32)
    }

    /// Selects the highest-priority interrupt that is both pending and enabled.
    ///
    /// # Arguments
    ///
    /// * `mip` - Value of the MIP register
    /// * `mie` - Value of the MIE register
    pub fn highest_pending(mip: u64, mie: u64) -> Option<InterruptCause> {
        let ready = mip & mie;
        if ready == 0 {
            return None;
        }
        Self::PRIORITY.iter().copied().find(|c| ready & c.bit() != 0)
    }
}

/// Non-maskable interrupt causes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NmiCause {
    Unknown = 0,
    StoreException = 0xf000_0000,
    LoadException = 0xf000_0001,
}

impl NmiCause {
    /// Returns the value written to MCAUSE when the NMI is taken.
    pub fn code(self) -> u64 {
        self as u64
    }
}

/// MSTATUS field positions used by trap entry and return.
pub mod mstatus {
    pub const UIE: u64 = 1 << 0;
    pub const SIE: u64 = 1 << 1;
    pub const MIE: u64 = 1 << 3;
    pub const UPIE: u64 = 1 << 4;
    pub const SPIE: u64 = 1 << 5;
    pub const MPIE: u64 = 1 << 7;
    pub const SPP: u64 = 1 << 8;
    pub const MPP_SHIFT: u32 = 11;
    pub const MPP: u64 = 3 << MPP_SHIFT;
    pub const FS: u64 = 3 << 13;
    pub const MPRV: u64 = 1 << 17;
    pub const SUM: u64 = 1 << 18;
    pub const MXR: u64 = 1 << 19;
}

/// Pure helpers for trap entry and trap return.
pub struct TrapHandler;

impl TrapHandler {
    /// Computes the handler address for a trap.
    ///
    /// # Arguments
    ///
    /// * `tvec` - Value of the trap-vector CSR
    /// * `is_interrupt` - True for asynchronous interrupts
    /// * `cause` - Cause code without the interrupt bit
    ///
    /// # Returns
    ///
    /// The base address (low two bits cleared) plus `4 * cause` for
    /// interrupts in vectored mode, with bit 0 cleared.
    pub fn target_pc(tvec: u64, is_interrupt: bool, cause: u64) -> u64 {
        let mut base = tvec & !3;
        if tvec & 3 == 1 && is_interrupt {
            base = base.wrapping_add(4 * cause);
        }
        base & !1
    }

    /// Returns the MCAUSE value for a trap.
    pub fn cause_value(is_interrupt: bool, cause: u64, xlen_bits: u32) -> u64 {
        if is_interrupt {
            cause | (1 << (xlen_bits - 1))
        } else {
            cause
        }
    }

    /// Updates MSTATUS for a trap taken into Machine mode.
    ///
    /// MPP receives the previous mode, MPIE receives MIE, MIE is cleared.
    pub fn enter_machine(status: u64, prev: PrivilegeMode) -> u64 {
        let mut s = status & !mstatus::MPP;
        s |= (prev.to_u8() as u64) << mstatus::MPP_SHIFT;
        s = if s & mstatus::MIE != 0 {
            s | mstatus::MPIE
        } else {
            s & !mstatus::MPIE
        };
        s & !mstatus::MIE
    }

    /// Updates MSTATUS for `mret`.
    ///
    /// # Returns
    ///
    /// The new MSTATUS value and the privilege mode to return to.
    pub fn mret(status: u64) -> (u64, PrivilegeMode) {
        let mode = PrivilegeMode::from_u8(((status & mstatus::MPP) >> mstatus::MPP_SHIFT) as u8);
        let mut s = if status & mstatus::MPIE != 0 {
            status | mstatus::MIE
        } else {
            status & !mstatus::MIE
        };
        s &= !mstatus::MPP;
        s |= mstatus::MPIE;
        (s, mode)
    }

    /// Updates MSTATUS for `sret`.
    pub fn sret(status: u64) -> (u64, PrivilegeMode) {
        let mode = if status & mstatus::SPP != 0 {
            PrivilegeMode::Supervisor
        } else {
            PrivilegeMode::User
        };
        let mut s = if status & mstatus::SPIE != 0 {
            status | mstatus::SIE
        } else {
            status & !mstatus::SIE
        };
        s &= !mstatus::SPP;
        s |= mstatus::SPIE;
        (s, mode)
    }

    /// Updates MSTATUS for `uret`.
    pub fn uret(status: u64) -> u64 {
        let s = if status & mstatus::UPIE != 0 {
            status | mstatus::UIE
        } else {
            status & !mstatus::UIE
        };
        s | mstatus::UPIE
    }
}

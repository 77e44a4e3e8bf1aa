//! Integration tests for exceptions, interrupts and NMIs on a running hart.

use riscv_hart_sim::config::Config;
use riscv_hart_sim::core::arch::csr::{self, MIP_MTIP};
use riscv_hart_sim::core::arch::mode::PrivilegeMode;
use riscv_hart_sim::core::arch::trap::{mstatus, NmiCause};
use riscv_hart_sim::core::Core;
use riscv_hart_sim::isa::encode::*;
use riscv_hart_sim::soc::FlatMemory;
use riscv_hart_sim::StopReason;

const ECALL: u32 = 0x0000_0073;
const MRET: u32 = 0x3020_0073;

fn core_with(config: &Config, program: &[(u64, u32)]) -> Core {
    let mut core = Core::new(config, Box::new(FlatMemory::new(0, 0x10000))).unwrap();
    for &(addr, inst) in program {
        assert!(core.poke_memory(addr, 4, inst as u64));
    }
    core
}

fn core(program: &[(u64, u32)]) -> Core {
    core_with(&Config::default(), program)
}

/// Tests `ecall` from Machine mode traps to MTVEC.
#[test]
fn test_ecall_machine() {
    let mut core = core(&[(0, ECALL)]);
    core.poke_csr(csr::MTVEC, 0x103);
    assert!(core.single_step().is_none());

    assert_eq!(core.pc(), 0x100);
    assert_eq!(core.peek_csr(csr::MCAUSE), Some(11));
    assert_eq!(core.peek_csr(csr::MEPC), Some(0));
    assert_eq!(core.peek_csr(csr::MTVAL), Some(0));
    let status = core.peek_csr(csr::MSTATUS).unwrap();
    assert_eq!(status & mstatus::MPP, mstatus::MPP);
    assert_eq!(core.exception_count(), 1);
    assert_eq!(core.retired_instructions(), 1);
}

/// Tests `mret` drops to User mode and `ecall` comes back.
#[test]
fn test_mret_to_user_and_ecall() {
    let mut core = core(&[(0, MRET), (0x10, ECALL)]);
    core.poke_csr(csr::MTVEC, 0x100);
    core.poke_csr(csr::MEPC, 0x10);
    core.poke_csr(csr::MSTATUS, mstatus::MPIE);

    core.single_step();
    assert_eq!(core.pc(), 0x10);
    assert_eq!(core.privilege_mode(), PrivilegeMode::User);
    let status = core.peek_csr(csr::MSTATUS).unwrap();
    assert_ne!(status & mstatus::MIE, 0);

    core.single_step();
    assert_eq!(core.privilege_mode(), PrivilegeMode::Machine);
    assert_eq!(core.peek_csr(csr::MCAUSE), Some(8));
    assert_eq!(core.peek_csr(csr::MEPC), Some(0x10));
    let status = core.peek_csr(csr::MSTATUS).unwrap();
    assert_eq!(status & mstatus::MPP, 0);
    assert_eq!(status & mstatus::MIE, 0);
    assert_ne!(status & mstatus::MPIE, 0);
}

/// Tests `mret` from User mode is illegal.
#[test]
fn test_mret_illegal_in_user_mode() {
    let mut core = core(&[(0, MRET), (0x10, MRET)]);
    core.poke_csr(csr::MTVEC, 0x100);
    core.poke_csr(csr::MEPC, 0x10);
    core.single_step();
    assert_eq!(core.privilege_mode(), PrivilegeMode::User);

    core.single_step();
    assert_eq!(core.peek_csr(csr::MCAUSE), Some(2));
    assert_eq!(core.peek_csr(csr::MTVAL), Some(MRET as u64));
    assert_eq!(core.pc(), 0x100);
}

/// Tests an illegal instruction reports its encoding in MTVAL.
#[test]
fn test_illegal_instruction() {
    let mut core = core(&[(0, 0xffff_ffff)]);
    core.poke_csr(csr::MTVEC, 0x200);
    assert!(core.single_step().is_none());
    assert_eq!(core.peek_csr(csr::MCAUSE), Some(2));
    assert_eq!(core.peek_csr(csr::MEPC), Some(0));
    assert_eq!(core.peek_csr(csr::MTVAL), Some(0xffff_ffff));
    assert_eq!(core.pc(), 0x200);
    assert_eq!(core.retired_instructions(), 0);
}

/// Tests a run of back-to-back illegal instructions is stopped.
#[test]
fn test_consecutive_illegal_stop() {
    // Zero-filled memory decodes as illegal and MTVEC points back at it.
    let mut core = core(&[]);
    let reason = core.run();
    match &reason {
        StopReason::Stopped { message, value, .. } => {
            assert_eq!(message, "Too many consecutive illegal instructions");
            assert_eq!(*value, 0);
        }
        other => panic!("unexpected stop {:?}", other),
    }
    assert!(!reason.is_success());
    assert_eq!(core.exception_count(), 64);
    assert!(core.is_finished());
}

/// Tests a retired instruction resets the illegal-instruction count.
#[test]
fn test_illegal_count_reset_by_retire() {
    let mut core = core(&[(0, addi(1, 1, 1)), (4, 0xffff_ffff)]);
    for _ in 0..200 {
        assert!(core.single_step().is_none());
    }
    assert_eq!(core.peek_int_reg(1), Some(100));
    assert_eq!(core.exception_count(), 100);
}

/// Tests a pending, enabled timer interrupt is taken through a vectored
/// MTVEC before the next instruction.
#[test]
fn test_timer_interrupt_vectored() {
    let mut core = core(&[(0, addi(1, 0, 1))]);
    core.poke_csr(csr::MTVEC, 0x101);
    core.poke_csr(csr::MIE, MIP_MTIP);
    core.poke_csr(csr::MIP, MIP_MTIP);
    core.poke_csr(csr::MSTATUS, mstatus::MIE);

    assert!(core.single_step().is_none());
    assert_eq!(core.pc(), 0x100 + 4 * 7);
    assert_eq!(core.peek_csr(csr::MCAUSE), Some(0x8000_0007));
    assert_eq!(core.peek_csr(csr::MEPC), Some(0));
    assert_eq!(core.peek_int_reg(1), Some(0));
    assert_eq!(core.interrupt_count(), 1);
}

/// Tests interrupts wait while MSTATUS.MIE is clear.
#[test]
fn test_interrupt_masked() {
    let mut core = core(&[(0, addi(1, 0, 1))]);
    core.poke_csr(csr::MIE, MIP_MTIP);
    core.poke_csr(csr::MIP, MIP_MTIP);
    core.single_step();
    assert_eq!(core.peek_int_reg(1), Some(1));
    assert_eq!(core.interrupt_count(), 0);
}

/// Tests a pending NMI is taken at the NMI vector regardless of MIE.
#[test]
fn test_nmi() {
    let mut config = Config::default();
    config.core.nmi_pc = "0x200".to_string();
    let mut core = core_with(&config, &[(0, addi(1, 0, 1))]);

    core.set_pending_nmi(NmiCause::StoreException);
    core.set_pending_nmi(NmiCause::LoadException);
    assert!(core.is_nmi_pending());

    core.single_step();
    assert!(!core.is_nmi_pending());
    assert_eq!(core.pc(), 0x200);
    assert_eq!(core.peek_csr(csr::MCAUSE), Some(0xf000_0000));
    assert_eq!(core.peek_csr(csr::MEPC), Some(0));
    assert_eq!(core.peek_int_reg(1), Some(0));
}

/// Tests clearing a pending NMI.
#[test]
fn test_clear_nmi() {
    let mut core = core(&[(0, addi(1, 0, 1))]);
    core.set_pending_nmi(NmiCause::Unknown);
    core.clear_pending_nmi();
    core.single_step();
    assert_eq!(core.peek_int_reg(1), Some(1));
}

/// Tests a forced fetch failure raises an access fault.
#[test]
fn test_forced_fetch_fail() {
    let mut core = core(&[(0, addi(1, 0, 1))]);
    core.poke_csr(csr::MTVEC, 0x100);
    core.force_fetch_fail(2);
    core.single_step();
    assert_eq!(core.peek_csr(csr::MCAUSE), Some(1));
    assert_eq!(core.peek_csr(csr::MTVAL), Some(2));
    assert_eq!(core.pc(), 0x100);
}

/// Tests a forced data-access failure raises a load access fault.
#[test]
fn test_forced_access_fail() {
    let mut core = core(&[(0, lw(2, 0, 0x40))]);
    core.poke_csr(csr::MTVEC, 0x100);
    core.force_access_fail();
    core.single_step();
    assert_eq!(core.peek_csr(csr::MCAUSE), Some(5));
    assert_eq!(core.peek_csr(csr::MTVAL), Some(0x40));
    assert_eq!(core.peek_int_reg(2), Some(0));
}

//! Core-level tests for atomics, misaligned accesses and floating-point
//! status through the single-step interface.

use riscv_hart_sim::config::Config;
use riscv_hart_sim::core::arch::csr;
use riscv_hart_sim::core::Core;
use riscv_hart_sim::isa::encode::*;
use riscv_hart_sim::soc::{FlatMemory, RegionKind};

const CAUSE_ILLEGAL: u64 = 2;
const CAUSE_LOAD_MISALIGNED: u64 = 4;
const CAUSE_LOAD_ACCESS: u64 = 5;
const CAUSE_STORE_MISALIGNED: u64 = 6;
const CAUSE_STORE_ACCESS: u64 = 7;

const ONE_S: u64 = 0xffff_ffff_3f80_0000;
const TWO_S: u64 = 0xffff_ffff_4000_0000;
const ZERO_S: u64 = 0xffff_ffff_0000_0000;
const INF_S: u64 = 0xffff_ffff_7f80_0000;

fn core(program: &[u32]) -> Core {
    let mut core = Core::new(&Config::default(), Box::new(FlatMemory::new(0, 0x10000))).unwrap();
    load(&mut core, 0, program);
    core
}

fn load(core: &mut Core, base: u64, program: &[u32]) {
    for (i, inst) in program.iter().enumerate() {
        assert!(core.poke_memory(base + 4 * i as u64, 4, *inst as u64));
    }
}

fn amo_w(funct5: u32, rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0x2f, rd, 2, rs1, rs2, funct5 << 2)
}

fn amoadd_w(rd: u32, rs1: u32, rs2: u32) -> u32 {
    amo_w(0x00, rd, rs1, rs2)
}

fn amoswap_w(rd: u32, rs1: u32, rs2: u32) -> u32 {
    amo_w(0x01, rd, rs1, rs2)
}

fn lr_w(rd: u32, rs1: u32) -> u32 {
    amo_w(0x02, rd, rs1, 0)
}

fn sc_w(rd: u32, rs1: u32, rs2: u32) -> u32 {
    amo_w(0x03, rd, rs1, rs2)
}

/// `op.s` with the dynamic rounding mode.
fn fp_s(funct7: u32, rd: u32, rs1: u32, rs2: u32, rm: u32) -> u32 {
    r_type(0x53, rd, rm, rs1, rs2, funct7)
}

fn trap_of(core: &Core) -> (u64, u64) {
    (
        core.peek_csr(csr::MCAUSE).unwrap(),
        core.peek_csr(csr::MTVAL).unwrap(),
    )
}

/// Tests atomic add and swap return the old value and store the result.
#[test]
fn test_amo_add_swap() {
    let mut core = core(&[amoadd_w(3, 1, 2), amoswap_w(4, 1, 2)]);
    core.poke_int_reg(1, 0x100);
    core.poke_int_reg(2, 3);
    core.poke_memory(0x100, 4, 5);

    core.single_step();
    assert_eq!(core.peek_int_reg(3), Some(5));
    assert_eq!(core.peek_memory(0x100, 4), Some(8));

    core.single_step();
    assert_eq!(core.peek_int_reg(4), Some(8));
    assert_eq!(core.peek_memory(0x100, 4), Some(3));
    assert_eq!(core.exception_count(), 0);
}

/// Tests a misaligned atomic raises a store access fault and changes
/// nothing.
#[test]
fn test_amo_misaligned() {
    let mut core = core(&[amoadd_w(3, 1, 2)]);
    core.poke_int_reg(1, 0x102);
    core.poke_int_reg(2, 1);
    core.poke_int_reg(3, 9);

    core.single_step();
    assert_eq!(trap_of(&core), (CAUSE_STORE_ACCESS, 0x102));
    assert_eq!(core.peek_int_reg(3), Some(9));
    assert_eq!(core.peek_memory(0x100, 4), Some(0));
}

/// Tests a misaligned load-reserved raises a load access fault.
#[test]
fn test_lr_misaligned() {
    let mut core = core(&[lr_w(2, 1)]);
    core.poke_int_reg(1, 0x106);
    core.single_step();
    assert_eq!(trap_of(&core), (CAUSE_LOAD_ACCESS, 0x106));
    assert_eq!(core.peek_int_reg(2), Some(0));
}

/// Tests an intervening store cancels the reservation.
#[test]
fn test_sc_after_store_fails() {
    let mut core = core(&[lr_w(2, 1), sw(1, 5, 0), sc_w(3, 1, 4)]);
    core.poke_int_reg(1, 0x100);
    core.poke_int_reg(4, 0x99);
    core.poke_int_reg(5, 0x77);

    for _ in 0..3 {
        core.single_step();
    }
    assert_eq!(core.peek_int_reg(3), Some(1));
    assert_eq!(core.peek_memory(0x100, 4), Some(0x77));
}

/// Tests a store-conditional to another address fails.
#[test]
fn test_sc_other_address_fails() {
    let mut core = core(&[lr_w(2, 1), sc_w(3, 6, 4)]);
    core.poke_int_reg(1, 0x100);
    core.poke_int_reg(4, 0x99);
    core.poke_int_reg(6, 0x108);

    core.single_step();
    core.single_step();
    assert_eq!(core.peek_int_reg(3), Some(1));
    assert_eq!(core.peek_memory(0x108, 4), Some(0));
    assert_eq!(core.exception_count(), 0);
}

/// Tests misaligned accesses across a region boundary trap as misaligned.
#[test]
fn test_misaligned_across_region_boundary() {
    let base = 0x0ff0_0000;
    let mut config = Config::default();
    config.core.reset_pc = "0x0ff00000".to_string();
    let mut core = Core::new(&config, Box::new(FlatMemory::new(base, 0x20_0000))).unwrap();
    load(&mut core, base, &[lw(5, 1, 0), sw(1, 2, 0)]);
    core.poke_csr(csr::MTVEC, base + 4);
    core.poke_int_reg(1, 0x0fff_fffe);

    core.single_step();
    assert_eq!(trap_of(&core), (CAUSE_LOAD_MISALIGNED, 0x0fff_fffe));
    assert_eq!(core.pc(), base + 4);

    core.single_step();
    assert_eq!(trap_of(&core), (CAUSE_STORE_MISALIGNED, 0x0fff_fffe));
    assert_eq!(core.peek_memory(0x0fff_fffe, 2), Some(0));
}

/// Tests misaligned accesses to a side-effect region trap unless the
/// region holds local memory.
#[test]
fn test_misaligned_side_effect_region() {
    let program = [lw(5, 1, 0)];
    let mut plain = core(&program);
    plain.poke_int_reg(1, 0x102);
    plain.poke_memory(0x100, 4, 0x1122_3344);
    plain.poke_memory(0x104, 4, 0x5566_7788);
    plain.single_step();
    assert_eq!(plain.exception_count(), 0);
    assert_eq!(plain.peek_int_reg(5), Some(0x7788_1122));

    let mut side_effect = core(&program);
    side_effect.poke_csr(csr::MRAC, 0x2);
    side_effect.poke_int_reg(1, 0x102);
    side_effect.single_step();
    assert_eq!(trap_of(&side_effect), (CAUSE_LOAD_MISALIGNED, 0x102));

    let mut local = core(&program);
    assert!(local.define_region(RegionKind::Dccm, 0, 0x1000));
    local.poke_csr(csr::MRAC, 0x2);
    local.poke_int_reg(1, 0x102);
    local.single_step();
    assert_eq!(local.exception_count(), 0);
}

/// Tests a misaligned access to memory-mapped registers is an access
/// fault.
#[test]
fn test_misaligned_mapped_registers() {
    let mut core = core(&[lw(5, 1, 0)]);
    assert!(core.define_region(RegionKind::MappedRegs, 0x800, 0x40));
    core.poke_int_reg(1, 0x802);
    core.single_step();
    assert_eq!(trap_of(&core), (CAUSE_LOAD_ACCESS, 0x802));
}

/// Tests division by zero accrues DZ on top of earlier flags.
#[test]
fn test_fdiv_by_zero_accrues_flags() {
    let mut core = core(&[fp_s(0x0c, 3, 1, 2, 7)]);
    core.poke_fp_reg(1, ONE_S);
    core.poke_fp_reg(2, ZERO_S);
    core.poke_csr(csr::FCSR, 0x01);

    core.single_step();
    assert_eq!(core.exception_count(), 0);
    assert_eq!(core.peek_fp_reg(3), Some(INF_S));
    assert_eq!(core.peek_csr(csr::FCSR), Some(0x09));
    assert_eq!(core.peek_csr(csr::FFLAGS), Some(0x09));
}

/// Tests the reserved rounding modes make FP arithmetic illegal.
#[test]
fn test_reserved_rounding_mode_illegal() {
    for frm in 5..8u64 {
        let inst = fp_s(0x00, 3, 1, 2, 7);
        let mut dynamic = core(&[inst]);
        dynamic.poke_fp_reg(1, ONE_S);
        dynamic.poke_fp_reg(2, ONE_S);
        dynamic.poke_csr(csr::FCSR, frm << 5);

        dynamic.single_step();
        assert_eq!(trap_of(&dynamic), (CAUSE_ILLEGAL, inst as u64));
        assert_eq!(dynamic.peek_fp_reg(3), Some(0));
    }

    let inst = fp_s(0x00, 3, 1, 2, 5);
    let mut static_rm = core(&[inst]);
    static_rm.single_step();
    assert_eq!(trap_of(&static_rm), (CAUSE_ILLEGAL, inst as u64));

    let mut dynamic_rne = core(&[fp_s(0x00, 3, 1, 2, 7)]);
    dynamic_rne.poke_fp_reg(1, ONE_S);
    dynamic_rne.poke_fp_reg(2, ONE_S);
    dynamic_rne.single_step();
    assert_eq!(dynamic_rne.peek_fp_reg(3), Some(TWO_S));
}

/// Tests `setq` fills a q register and `getq` leaves the integer file alone.
#[test]
fn test_setq_getq() {
    let setq = r_type(0x02, 2, 0, 5, 0, 1);
    let getq = r_type(0x02, 6, 0, 2, 0, 0);
    let mut core = core(&[setq, getq]);
    core.poke_int_reg(5, 0x1234);
    core.poke_int_reg(6, 0x77);

    core.single_step();
    assert_eq!(core.peek_qreg(2), Some(0x1234));
    assert_eq!(core.last_int_reg(), None);

    core.single_step();
    assert_eq!(core.exception_count(), 0);
    assert_eq!(core.pc(), 8);
    assert_eq!(core.last_int_reg(), None);
    assert_eq!(core.peek_int_reg(6), Some(0x77));
    assert_eq!(core.peek_qreg(4), None);
}

//! Unit tests for the flat memory and its special regions.

use riscv_hart_sim::common::SimError;
use riscv_hart_sim::config::Config;
use riscv_hart_sim::core::arch::csr;
use riscv_hart_sim::core::Core;
use riscv_hart_sim::isa::encode::*;
use riscv_hart_sim::soc::{FlatMemory, LastWrite, Memory, RegionKind};

/// Tests little-endian access and the bounds of the backing store.
#[test]
fn test_memory_read_write() {
    let mut mem = FlatMemory::new(0x8000_0000, 0x100);
    assert!(mem.write(0x8000_0000, 4, 0x1122_3344));
    assert_eq!(mem.read(0x8000_0000, 1), Some(0x44));
    assert_eq!(mem.read(0x8000_0002, 2), Some(0x1122));
    assert_eq!(mem.read(0x7fff_fffc, 4), None);
    assert_eq!(mem.read(0x8000_00fe, 4), None);
    assert!(!mem.write(0x8000_0100, 1, 0));
    assert_eq!(mem.size(), 0x100);
}

/// Tests the last-write record and that pokes leave it alone.
#[test]
fn test_memory_last_write() {
    let mut mem = FlatMemory::new(0, 0x100);
    mem.poke(0x10, 4, 0xdead_beef);
    assert_eq!(mem.last_write(), None);

    assert!(mem.write(0x10, 2, 0x1234));
    assert_eq!(
        mem.last_write(),
        Some(LastWrite {
            addr: 0x10,
            size: 2,
            new_value: 0x1234,
            prev_value: 0xbeef,
        })
    );
    mem.clear_last_write();
    assert_eq!(mem.last_write(), None);
}

/// Tests data accesses to instruction closely-coupled memory fail.
#[test]
fn test_memory_iccm() {
    let mut mem = FlatMemory::new(0, 0x1000);
    assert!(mem.define_region(RegionKind::Iccm, 0x100, 0x100));
    assert!(mem.poke(0x100, 4, 0x13));
    assert_eq!(mem.read_inst(0x100, 4), Some(0x13));
    assert_eq!(mem.read(0x100, 4), None);
    assert!(!mem.write(0x100, 4, 0));
    assert!(mem.is_addr_in_iccm(0x1ff));
    assert!(!mem.is_addr_in_iccm(0x200));
}

/// Tests memory-mapped registers take aligned words through their masks.
#[test]
fn test_memory_mapped_registers() {
    let mut mem = FlatMemory::new(0, 0x1000);
    assert!(mem.define_region(RegionKind::MappedRegs, 0x800, 0x40));
    assert!(!mem.set_mapped_register_mask(0x802, 0xff));
    assert!(mem.set_mapped_register_mask(0x800, 0x0000_00ff));

    mem.poke(0x800, 4, 0xaabb_ccdd);
    assert!(mem.write(0x800, 4, 0x1122_3344));
    assert_eq!(mem.read(0x800, 4), Some(0xaabb_cc44));
    assert_eq!(mem.check_write(0x800, 4, 0xffff_ffff), Some(0xaabb_ccff));

    assert!(!mem.write(0x804, 2, 0));
    assert_eq!(mem.read(0x806, 4), None);
    assert_eq!(mem.read_inst(0x800, 4), None);

    mem.reset_memory_mapped_registers();
    assert_eq!(mem.read(0x800, 4), Some(0));
}

/// Tests regions must fit in the backing store.
#[test]
fn test_memory_region_bounds() {
    let mut mem = FlatMemory::new(0, 0x1000);
    assert!(!mem.define_region(RegionKind::Dccm, 0xf00, 0x200));
    assert!(!mem.define_region(RegionKind::Dccm, 0, 0));
    assert!(mem.define_region(RegionKind::Dccm, 0, 0x800));
    assert!(mem.is_addr_in_dccm(0x7ff));
}

/// Tests images that do not fit are rejected.
#[test]
fn test_memory_load_bytes() {
    let mut mem = FlatMemory::new(0x1000, 0x10);
    assert!(mem.load_bytes(0x1008, &[1, 2, 3, 4]).is_ok());
    assert_eq!(mem.read(0x1008, 4), Some(0x0403_0201));

    let err = mem.load_bytes(0x100c, &[0; 8]).unwrap_err();
    assert!(matches!(
        err,
        SimError::ImageOutOfBounds {
            addr: 0x100c,
            size: 8
        }
    ));
}

/// Tests a store to instruction memory raises a store access fault.
#[test]
fn test_core_store_to_iccm_faults() {
    let mut core = Core::new(&Config::default(), Box::new(FlatMemory::new(0, 0x10000))).unwrap();
    assert!(core.define_region(RegionKind::Iccm, 0x4000, 0x1000));
    core.poke_memory(0, 4, sw(1, 0, 0) as u64);
    core.poke_int_reg(1, 0x4000);
    core.single_step();

    assert_eq!(core.peek_csr(csr::MCAUSE), Some(7));
    assert_eq!(core.peek_csr(csr::MTVAL), Some(0x4000));
}

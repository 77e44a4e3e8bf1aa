//! Unit tests for ALU operations.

use riscv_hart_sim::common::Xlen;
use riscv_hart_sim::core::units::alu::{Alu, AluOp};

/// Tests addition wrap-around at both register widths.
#[test]
fn test_alu_add() {
    assert_eq!(Alu::execute(AluOp::Add, 10, 20, Xlen::Rv64), 30);
    assert_eq!(Alu::execute(AluOp::Add, u64::MAX, 1, Xlen::Rv64), 0);
    assert_eq!(Alu::execute(AluOp::Add, 0xffff_ffff, 1, Xlen::Rv32), 0);
}

/// Tests subtraction results are truncated to the register width.
#[test]
fn test_alu_sub() {
    assert_eq!(Alu::execute(AluOp::Sub, 30, 10, Xlen::Rv64), 20);
    assert_eq!(Alu::execute(AluOp::Sub, 0, 1, Xlen::Rv64), u64::MAX);
    assert_eq!(Alu::execute(AluOp::Sub, 0, 1, Xlen::Rv32), 0xffff_ffff);
}

/// Tests word operations sign-extend their 32-bit result.
#[test]
fn test_alu_word_ops() {
    assert_eq!(
        Alu::execute(AluOp::AddW, 0x7fff_ffff, 1, Xlen::Rv64),
        0xffff_ffff_8000_0000
    );
    assert_eq!(
        Alu::execute(AluOp::SubW, 0x8000_0000, 1, Xlen::Rv64),
        0x7fff_ffff
    );
    assert_eq!(
        Alu::execute(AluOp::SllW, 1, 31, Xlen::Rv64),
        0xffff_ffff_8000_0000
    );
    assert_eq!(
        Alu::execute(AluOp::SraW, 0x8000_0000, 4, Xlen::Rv64),
        0xffff_ffff_f800_0000
    );
}

/// Tests shift amounts are masked to the register width.
#[test]
fn test_alu_shifts() {
    assert_eq!(Alu::execute(AluOp::Sll, 1, 63, Xlen::Rv64), 1 << 63);
    assert_eq!(Alu::execute(AluOp::Sll, 1, 33, Xlen::Rv32), 2);
    assert_eq!(Alu::execute(AluOp::Srl, 0x8000_0000, 31, Xlen::Rv32), 1);
    assert_eq!(
        Alu::execute(AluOp::Sra, 0x8000_0000, 31, Xlen::Rv32),
        0xffff_ffff
    );
}

/// Tests signed and unsigned comparisons.
#[test]
fn test_alu_set_less_than() {
    assert_eq!(Alu::execute(AluOp::Slt, u64::MAX, 0, Xlen::Rv64), 1);
    assert_eq!(Alu::execute(AluOp::Sltu, u64::MAX, 0, Xlen::Rv64), 0);
    assert_eq!(Alu::execute(AluOp::Slt, 0xffff_ffff, 0, Xlen::Rv32), 1);
    assert_eq!(Alu::execute(AluOp::Sltu, 0xffff_ffff, 0, Xlen::Rv32), 0);
}

/// Tests the high halves of multiplication.
#[test]
fn test_alu_multiply_high() {
    assert_eq!(Alu::execute(AluOp::Mul, 6, 7, Xlen::Rv32), 42);
    assert_eq!(
        Alu::execute(AluOp::Mulh, 0xffff_ffff, 0xffff_ffff, Xlen::Rv32),
        0
    );
    assert_eq!(
        Alu::execute(AluOp::Mulhu, 0xffff_ffff, 0xffff_ffff, Xlen::Rv32),
        0xffff_fffe
    );
    assert_eq!(
        Alu::execute(AluOp::Mulhsu, 0xffff_ffff, 2, Xlen::Rv32),
        0xffff_ffff
    );
}

/// Tests division by zero yields all ones and remainder by zero yields the
/// dividend.
#[test]
fn test_alu_divide_by_zero() {
    assert_eq!(Alu::execute(AluOp::Div, 7, 0, Xlen::Rv64), u64::MAX);
    assert_eq!(Alu::execute(AluOp::Divu, 7, 0, Xlen::Rv32), 0xffff_ffff);
    assert_eq!(Alu::execute(AluOp::Rem, 7, 0, Xlen::Rv64), 7);
    assert_eq!(Alu::execute(AluOp::Remu, 7, 0, Xlen::Rv32), 7);
    assert_eq!(Alu::execute(AluOp::DivW, 7, 0, Xlen::Rv64), u64::MAX);
}

/// Tests signed division overflow returns the dividend.
#[test]
fn test_alu_divide_overflow() {
    assert_eq!(
        Alu::execute(AluOp::Div, 0x8000_0000, 0xffff_ffff, Xlen::Rv32),
        0x8000_0000
    );
    assert_eq!(
        Alu::execute(AluOp::Rem, 0x8000_0000, 0xffff_ffff, Xlen::Rv32),
        0
    );
    assert_eq!(
        Alu::execute(AluOp::Div, (-8i64) as u64, 2, Xlen::Rv32),
        0xffff_fffc
    );
}

/// Tests the bit-manipulation subset.
#[test]
fn test_alu_bitmanip() {
    assert_eq!(Alu::execute(AluOp::Clz, 1, 0, Xlen::Rv32), 31);
    assert_eq!(Alu::execute(AluOp::Clz, 1, 0, Xlen::Rv64), 63);
    assert_eq!(Alu::execute(AluOp::Ctz, 0, 0, Xlen::Rv32), 32);
    assert_eq!(Alu::execute(AluOp::Ctz, 8, 0, Xlen::Rv64), 3);
    assert_eq!(Alu::execute(AluOp::Pcnt, 0xf0f0, 0, Xlen::Rv32), 8);
    assert_eq!(Alu::execute(AluOp::Andc, 0xff, 0x0f, Xlen::Rv32), 0xf0);
    assert_eq!(Alu::execute(AluOp::Slo, 0, 4, Xlen::Rv32), 0xf);
    assert_eq!(Alu::execute(AluOp::Sro, 0, 4, Xlen::Rv32), 0xf000_0000);
    assert_eq!(
        Alu::execute(AluOp::Rol, 0x8000_0001, 1, Xlen::Rv32),
        0x0000_0003
    );
    assert_eq!(
        Alu::execute(AluOp::Ror, 1, 1, Xlen::Rv32),
        0x8000_0000
    );
}

/// Tests min/max and pack.
#[test]
fn test_alu_min_max_pack() {
    assert_eq!(Alu::execute(AluOp::Min, 0xffff_ffff, 1, Xlen::Rv32), 0xffff_ffff);
    assert_eq!(Alu::execute(AluOp::Minu, 0xffff_ffff, 1, Xlen::Rv32), 1);
    assert_eq!(Alu::execute(AluOp::Max, 0xffff_ffff, 1, Xlen::Rv32), 1);
    assert_eq!(
        Alu::execute(AluOp::Maxu, 0xffff_ffff, 1, Xlen::Rv32),
        0xffff_ffff
    );
    assert_eq!(
        Alu::execute(AluOp::Pack, 0x1234_5678, 0xabcd, Xlen::Rv32),
        0xabcd_5678
    );
}

/// Tests immediate mnemonics.
#[test]
fn test_alu_op_names() {
    assert_eq!(AluOp::Add.name(), "add");
    assert_eq!(AluOp::Add.imm_name(), Some("addi"));
    assert_eq!(AluOp::Sltu.imm_name(), Some("sltiu"));
    assert_eq!(AluOp::Mul.imm_name(), None);
    assert!(AluOp::Mulhu.is_mul());
    assert!(AluOp::RemuW.is_div());
}

//! Integration tests for ISA decoding, compressed expansion and
//! disassembly.

use riscv_hart_sim::common::Xlen;
use riscv_hart_sim::core::units::alu::AluOp;
use riscv_hart_sim::core::units::fpu::FpFormat;
use riscv_hart_sim::core::units::lsu::{AmoOp, MemWidth};
use riscv_hart_sim::isa::compressed::expand;
use riscv_hart_sim::isa::decode::{decode, BranchOp, CsrOp, Decoded, Op};
use riscv_hart_sim::isa::disasm::{disassemble, mnemonic};
use riscv_hart_sim::isa::encode::{self, op7};
use riscv_hart_sim::isa::instruction::InstructionBits;
use riscv_hart_sim::isa::IsaConfig;

fn isa(xlen: Xlen, letters: &str) -> IsaConfig {
    IsaConfig::from_misa(xlen, IsaConfig::misa_from_letters(letters), false)
}

fn rv32() -> IsaConfig {
    isa(Xlen::Rv32, "imafdc")
}

fn rv64() -> IsaConfig {
    isa(Xlen::Rv64, "imafdc")
}

fn no_csr_names(_: u16) -> Option<String> {
    None
}

/// Tests instruction field extraction.
#[test]
fn test_instruction_bits() {
    let inst = encode::addi(1, 2, -5);
    assert_eq!(inst.opcode(), 0x13);
    assert_eq!(inst.rd(), 1);
    assert_eq!(inst.rs1(), 2);
    assert_eq!(inst.imm_i(), -5);
    assert_eq!(encode::beq(1, 2, -8).imm_b(), -8);
    assert_eq!(encode::jal(0, 2048).imm_j(), 2048);
    assert_eq!(encode::sw(2, 5, -4).imm_s(), -4);
}

/// Tests decoding of immediate and register ALU instructions.
#[test]
fn test_decode_alu() {
    let d = decode(encode::addi(1, 2, -5), &rv32());
    assert_eq!(d.op, Op::AluImm(AluOp::Add));
    assert_eq!((d.rd, d.rs1, d.imm), (1, 2, -5));

    let d = decode(encode::sub(3, 4, 5), &rv32());
    assert_eq!(d.op, Op::Alu(AluOp::Sub));
    assert_eq!((d.rd, d.rs1, d.rs2), (3, 4, 5));

    let d = decode(encode::srai(6, 7, 3), &rv32());
    assert_eq!(d.op, Op::AluImm(AluOp::Sra));
    assert_eq!(d.imm, 3);
}

/// Tests upper immediates keep their position.
#[test]
fn test_decode_lui() {
    let d = decode(encode::lui(3, 0x12345), &rv32());
    assert_eq!(d.op, Op::Lui);
    assert_eq!(d.imm, 0x1234_5000);
}

/// Tests the M extension is only decoded when enabled.
#[test]
fn test_decode_requires_m_extension() {
    let mul = encode::r_type(op7::OP, 1, 0, 2, 3, 1);
    assert_eq!(decode(mul, &rv32()).op, Op::Alu(AluOp::Mul));
    assert_eq!(decode(mul, &isa(Xlen::Rv32, "i")).op, Op::Illegal);
}

/// Tests 64-bit-only instructions are illegal on RV32.
#[test]
fn test_decode_rv64_only() {
    assert_eq!(decode(encode::ld(1, 2, 0), &rv32()).op, Op::Illegal);
    assert!(matches!(decode(encode::ld(1, 2, 0), &rv64()).op, Op::Load(_)));
    assert_eq!(decode(encode::addw(1, 2, 3), &rv32()).op, Op::Illegal);
    assert_eq!(decode(encode::addw(1, 2, 3), &rv64()).op, Op::Alu(AluOp::AddW));
}

/// Tests loads, stores and branches.
#[test]
fn test_decode_memory_and_branch() {
    let d = decode(encode::lw(5, 2, 8), &rv32());
    assert!(matches!(d.op, Op::Load(l) if l.width == MemWidth::Word && !l.unsigned));
    assert_eq!(d.imm, 8);

    let d = decode(encode::sw(2, 5, -4), &rv32());
    assert_eq!(d.op, Op::Store(MemWidth::Word));
    assert_eq!((d.rs1, d.rs2, d.imm), (2, 5, -4));

    let d = decode(encode::bne(1, 0, -8), &rv32());
    assert_eq!(d.op, Op::Branch(BranchOp::Ne));
    assert_eq!(d.imm, -8);

    let d = decode(encode::flw(1, 2, 4), &rv32());
    assert_eq!(d.op, Op::FpLoad(FpFormat::Single));
    assert_eq!(decode(encode::flw(1, 2, 4), &isa(Xlen::Rv32, "im")).op, Op::Illegal);
}

/// Tests atomics decode by their funct5 field.
#[test]
fn test_decode_atomics() {
    let lr = encode::r_type(0x2f, 5, 2, 6, 0, 0x08);
    let sc = encode::r_type(0x2f, 7, 2, 6, 8, 0x0c);
    let amoadd = encode::r_type(0x2f, 9, 2, 6, 8, 0);
    assert_eq!(decode(lr, &rv32()).op, Op::Lr(MemWidth::Word));
    assert_eq!(decode(sc, &rv32()).op, Op::Sc(MemWidth::Word));
    assert_eq!(decode(amoadd, &rv32()).op, Op::Amo(AmoOp::Add, MemWidth::Word));
    assert_eq!(decode(lr, &isa(Xlen::Rv32, "im")).op, Op::Illegal);
}

/// Tests system instructions and CSR access decoding.
#[test]
fn test_decode_system() {
    let i = rv32();
    assert_eq!(decode(0x0000_0073, &i).op, Op::Ecall);
    assert_eq!(decode(0x0010_0073, &i).op, Op::Ebreak);
    assert_eq!(decode(0x3020_0073, &i).op, Op::Mret);
    assert_eq!(decode(0x1050_0073, &i).op, Op::Wfi);
    assert_eq!(decode(0x1200_0073, &i).op, Op::Illegal, "sfence.vma");
    assert_eq!(decode(0x1020_0073, &i).op, Op::Illegal, "sret without S");
    assert_eq!(
        decode(0x1020_0073, &isa(Xlen::Rv32, "imsu")).op,
        Op::Sret
    );

    let csrrs = encode::i_type(op7::SYSTEM, 5, 2, 0, 0x300);
    let d = decode(csrrs, &i);
    assert_eq!(
        d.op,
        Op::Csr {
            op: CsrOp::Rs,
            imm: false
        }
    );
    assert_eq!((d.rd, d.rs1, d.imm), (5, 0, 0x300));

    // CSR numbers above 0x7ff stay unsigned.
    let csrrwi = encode::i_type(op7::SYSTEM, 0, 5, 3, 0xfc0);
    let d = decode(csrrwi, &i);
    assert_eq!(
        d.op,
        Op::Csr {
            op: CsrOp::Rw,
            imm: true
        }
    );
    assert_eq!(d.imm, 0xfc0);
}

/// Tests words that are not 32-bit instructions are illegal.
#[test]
fn test_decode_illegal() {
    assert_eq!(decode(0, &rv32()), Decoded::illegal());
    assert_eq!(decode(0xffff_ffff, &rv32()).op, Op::Illegal);
}

/// Tests integer source registers used by load-queue maintenance.
#[test]
fn test_decoded_int_sources() {
    let d = decode(encode::add(1, 2, 3), &rv32());
    assert_eq!(d.int_sources(), (Some(2), Some(3)));
    let d = decode(encode::lw(1, 2, 0), &rv32());
    assert_eq!(d.int_sources(), (Some(2), None));
    assert!(d.op.is_load());
    assert_eq!(decode(encode::lui(1, 1), &rv32()).int_sources(), (None, None));
}

/// Tests expansion of common compressed instructions.
#[test]
fn test_compressed_expand() {
    let i = rv32();
    assert_eq!(expand(0x0505, &i), Some(encode::addi(10, 10, 1)));
    assert_eq!(expand(0x4515, &i), Some(encode::addi(10, 0, 5)));
    assert_eq!(expand(0x0001, &i), Some(encode::addi(0, 0, 0)));
    assert_eq!(expand(0x852e, &i), Some(encode::add(10, 0, 11)));
    assert_eq!(expand(0x8082, &i), Some(encode::jalr(0, 1, 0)));
    assert_eq!(expand(0x9002, &i), Some(encode::ebreak()));
}

/// Tests reserved and extension-dependent compressed encodings.
#[test]
fn test_compressed_illegal() {
    assert_eq!(expand(0x0000, &rv32()), None);

    // c.slli with shamt[5] set is RV64 only.
    assert_eq!(expand(0x1502, &rv32()), None);
    assert_eq!(expand(0x1502, &rv64()), Some(encode::slli(10, 10, 32)));

    // c.fld needs D.
    assert_eq!(expand(0x2000, &rv32()), Some(encode::fld(8, 8, 0)));
    assert_eq!(expand(0x2000, &isa(Xlen::Rv32, "imc")), None);
}

/// Tests mnemonics of a few operation families.
#[test]
fn test_mnemonics() {
    assert_eq!(mnemonic(&Op::AluImm(AluOp::Add)), "addi");
    assert_eq!(mnemonic(&Op::Amo(AmoOp::Swap, MemWidth::Word)), "amoswap.w");
    assert_eq!(mnemonic(&Op::Lr(MemWidth::Double)), "lr.d");
    assert_eq!(
        mnemonic(&Op::Csr {
            op: CsrOp::Rc,
            imm: true
        }),
        "csrrci"
    );
    assert_eq!(mnemonic(&Op::FpSqrt(FpFormat::Double)), "fsqrt.d");
}

/// Tests operand rendering of the disassembler.
#[test]
fn test_disassemble() {
    let i = rv32();
    let text = |inst| disassemble(&decode(inst, &i), no_csr_names);
    assert_eq!(text(encode::addi(1, 2, -5)), "addi x1, x2, -5");
    assert_eq!(text(encode::lw(5, 2, 8)), "lw x5, 8(x2)");
    assert_eq!(text(encode::sw(2, 5, 8)), "sw x5, 8(x2)");
    assert_eq!(text(encode::lui(3, 0x12345)), "lui x3, 0x12345");
    assert_eq!(text(0x0000_0073), "ecall");
    assert_eq!(text(0), "illegal");
    assert_eq!(text(0x0ff0_000f), "fence iorw, iorw");

    let csrrs = encode::i_type(op7::SYSTEM, 5, 2, 0, 0x300);
    let named = disassemble(&decode(csrrs, &i), |n| {
        (n == 0x300).then(|| "mstatus".to_string())
    });
    assert_eq!(named, "csrrs x5, mstatus, x0");
    assert_eq!(text(csrrs), "csrrs x5, 0x300, x0");
}

//! Integration tests for the run loops, tracing, what-if execution and
//! memory-error rollback.

use std::io::Write;
use std::sync::{Arc, Mutex};

use riscv_hart_sim::config::Config;
use riscv_hart_sim::core::arch::csr;
use riscv_hart_sim::core::Core;
use riscv_hart_sim::isa::encode::*;
use riscv_hart_sim::sim::{MemorySink, TraceSink};
use riscv_hart_sim::soc::FlatMemory;
use riscv_hart_sim::stats::SimStats;
use riscv_hart_sim::StopReason;

const ECALL: u32 = 0x0000_0073;

fn core_with(config: &Config, program: &[u32]) -> Core {
    let mut core = Core::new(config, Box::new(FlatMemory::new(0, 0x10000))).unwrap();
    for (i, inst) in program.iter().enumerate() {
        assert!(core.poke_memory(4 * i as u64, 4, *inst as u64));
    }
    core
}

fn core(program: &[u32]) -> Core {
    core_with(&Config::default(), program)
}

fn lr_w(rd: u32, rs1: u32) -> u32 {
    r_type(0x2f, rd, 2, rs1, 0, 0x08)
}

fn sc_w(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0x2f, rd, 2, rs1, rs2, 0x0c)
}

fn sb(rs1: u32, rs2: u32, offset: i32) -> u32 {
    s_type(op7::STORE, 0, rs1, rs2, offset)
}

fn csrrw(rd: u32, csr: u16, rs1: u32) -> u32 {
    i_type(op7::SYSTEM, rd, 1, rs1, csr as i32)
}

/// Console output shared with the test.
#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Tests one trace line per instruction with the register change.
#[test]
fn test_trace_register_writes() {
    let mut core = core(&[addi(1, 0, 5), addi(2, 1, 1)]);
    let sink = Arc::new(MemorySink::new());
    core.set_trace_sink(Some(sink.clone() as Arc<dyn TraceSink>));
    core.set_instruction_limit(Some(2));

    assert_eq!(core.run(), StopReason::InstructionLimit);
    assert_eq!(
        sink.lines(),
        vec![
            "#1 0 00000000 00500093 r 00000001 00000005  addi x1, x0, 5",
            "#2 0 00000004 00108113 r 00000002 00000006  addi x2, x1, 1",
        ]
    );
}

/// Tests stores are traced as memory changes and CSR writes as CSR changes.
#[test]
fn test_trace_memory_and_csr() {
    let mut core = core(&[sw(1, 2, 0), csrrw(0, csr::MSCRATCH, 2)]);
    core.poke_int_reg(1, 0x1000);
    core.poke_int_reg(2, 0x1234);
    let sink = Arc::new(MemorySink::new());
    core.set_trace_sink(Some(sink.clone() as Arc<dyn TraceSink>));

    core.single_step();
    core.single_step();
    let lines = sink.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(" m 00001000 00001234  sw x2, 0(x1)"));
    assert!(lines[1].contains(" c 00000340 00001234  csrrw x0, mscratch, x2"));
    assert_eq!(sink.take().len(), 2);
    assert!(sink.lines().is_empty());
}

/// Tests an instruction changing nothing gets a placeholder record.
#[test]
fn test_trace_no_change() {
    let mut core = core(&[addi(0, 0, 0)]);
    let sink = Arc::new(MemorySink::new());
    core.set_trace_sink(Some(sink.clone() as Arc<dyn TraceSink>));
    core.single_step();
    assert_eq!(
        sink.lines(),
        vec!["#1 0 00000000 00000013 r 00000000 00000000  addi x0, x0, 0"]
    );
}

/// Tests a trap block lists every CSR changed by trap entry.
#[test]
fn test_trace_exception() {
    let mut core = core(&[ECALL]);
    core.poke_csr(csr::MTVEC, 0x100);
    let sink = Arc::new(MemorySink::new());
    core.set_trace_sink(Some(sink.clone() as Arc<dyn TraceSink>));
    core.single_step();

    let lines = sink.lines();
    let csrs: Vec<&str> = lines
        .iter()
        .map(|l| l.split_whitespace().nth(5).unwrap())
        .collect();
    assert_eq!(csrs, vec!["00000300", "00000341", "00000342", "00000343"]);
    assert!(lines[..3].iter().all(|l| l.ends_with("  ecall  +")));
    assert!(lines[3].ends_with("  ecall"));
}

/// Tests a non-zero write to the to-host address ends the run.
#[test]
fn test_tohost_stop() {
    let mut config = Config::default();
    config.core.tohost = Some("0x1000".to_string());
    let mut core = core_with(&config, &[addi(1, 0, 1), lui(2, 1), sw(2, 1, 0), ECALL]);

    let reason = core.run();
    assert_eq!(
        reason,
        StopReason::Stopped {
            message: "write to to-host".to_string(),
            address: 0x1000,
            value: 1,
        }
    );
    assert!(reason.is_success());
    assert!(core.is_finished());
    assert_eq!(core.retired_instructions(), 3);
    assert_eq!(core.peek_memory(0x1000, 4), Some(1));
}

/// Tests a to-host value other than 1 is a failing stop.
#[test]
fn test_tohost_failure_value() {
    let mut core = core(&[addi(1, 0, 3), lui(2, 1), sw(2, 1, 0)]);
    core.set_tohost(Some(0x1000));
    let reason = core.run();
    assert!(matches!(reason, StopReason::Stopped { value: 3, .. }));
    assert!(!reason.is_success());
}

/// Tests the run ends when the pc reaches the stop address.
#[test]
fn test_stop_address() {
    let mut core = core(&[addi(1, 0, 1), addi(2, 0, 2), addi(3, 0, 3)]);
    core.set_stop_address(Some(8));
    let reason = core.run();
    assert_eq!(reason, StopReason::StopAddress(8));
    assert!(reason.is_success());
    assert_eq!(core.retired_instructions(), 2);
    assert_eq!(core.peek_int_reg(3), Some(0));
}

/// Tests `run_until_address` leaves the configured stop address alone.
#[test]
fn test_run_until_address() {
    let mut core = core(&[addi(1, 0, 1), addi(2, 0, 2), addi(3, 0, 3), ECALL]);
    assert_eq!(core.run_until_address(4), StopReason::StopAddress(4));
    assert_eq!(core.pc(), 4);

    core.set_instruction_limit(Some(3));
    assert_eq!(core.run(), StopReason::InstructionLimit);
    assert_eq!(core.peek_int_reg(3), Some(3));
}

/// Tests the instruction limit counts from the creation of the core.
#[test]
fn test_instruction_limit_absolute() {
    let mut core = core(&[addi(1, 1, 1), jal(0, -4)]);
    core.set_instruction_limit(Some(10));
    assert_eq!(core.run(), StopReason::InstructionLimit);
    assert_eq!(core.retired_instructions(), 10);

    assert_eq!(core.run(), StopReason::InstructionLimit);
    assert_eq!(core.retired_instructions(), 10);

    core.set_instruction_limit(Some(12));
    core.run();
    assert_eq!(core.retired_instructions(), 12);
    assert_eq!(core.peek_int_reg(1), Some(6));
}

/// Tests the cancel token stops a run before the next instruction.
#[test]
fn test_cancel() {
    let mut core = core(&[addi(1, 1, 1), jal(0, -4)]);
    let token = core.cancel_token();
    token.cancel();
    let reason = core.run();
    assert_eq!(reason, StopReason::Cancelled);
    assert!(!reason.is_success());
    assert_eq!(core.retired_instructions(), 0);

    token.reset();
    core.set_instruction_limit(Some(4));
    assert_eq!(core.run(), StopReason::InstructionLimit);
}

/// Tests console bytes go to the console writer instead of memory.
#[test]
fn test_console_output() {
    let mut core = core(&[addi(1, 0, 0x48), lui(2, 2), sb(2, 1, 0), addi(1, 0, 0x69), sb(2, 1, 0)]);
    let out = Capture::default();
    core.set_console_output(Box::new(out.clone()));
    core.set_console_io(Some(0x2000));
    core.set_stop_address(Some(20));

    assert_eq!(core.run(), StopReason::StopAddress(20));
    assert_eq!(out.0.lock().unwrap().as_slice(), b"Hi");
    assert_eq!(core.peek_memory(0x2000, 1), Some(0));
}

/// Console writer whose output is closed.
struct ClosedConsole;

impl Write for ClosedConsole {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "closed"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "closed"))
    }
}

/// Tests a failing console writer does not stop execution.
#[test]
fn test_console_write_error() {
    let mut core = core(&[addi(1, 0, 0x48), lui(2, 2), sb(2, 1, 0), addi(3, 0, 1)]);
    core.set_console_output(Box::new(ClosedConsole));
    core.set_console_io(Some(0x2000));

    for _ in 0..4 {
        core.single_step();
    }
    assert_eq!(core.exception_count(), 0);
    assert_eq!(core.pc(), 16);
    assert_eq!(core.peek_int_reg(3), Some(1));
    assert_eq!(core.peek_memory(0x2000, 1), Some(0));
}

/// Tests what-if execution reports a register change and undoes it.
#[test]
fn test_what_if_register() {
    let mut core = core(&[]);
    let (ok, rec) = core.what_if_single_step(addi(1, 0, 5));
    assert!(ok);
    assert_eq!(rec.new_pc, 4);
    assert_eq!(rec.int_reg, Some((1, 5)));
    assert_eq!(rec.memory, None);
    assert!(rec.csrs.is_empty());

    assert_eq!(core.pc(), 0);
    assert_eq!(core.peek_int_reg(1), Some(0));
    assert_eq!(core.retired_instructions(), 0);
}

/// Tests what-if execution of a store leaves memory untouched.
#[test]
fn test_what_if_store() {
    let mut core = core(&[]);
    core.poke_int_reg(1, 0x100);
    core.poke_int_reg(2, 0x55);
    let (ok, rec) = core.what_if_single_step(sw(1, 2, 0));
    assert!(ok);
    assert_eq!(rec.memory, Some((0x100, 4, 0x55)));
    assert_eq!(core.peek_memory(0x100, 4), Some(0));
}

/// Tests what-if execution of a trapping instruction restores the trap
/// CSRs.
#[test]
fn test_what_if_exception() {
    let mut core = core(&[]);
    core.poke_csr(csr::MTVEC, 0x100);
    let (ok, rec) = core.what_if_single_step(ECALL);
    assert!(!ok);
    assert_eq!(rec.new_pc, 0x100);
    assert!(rec.csrs.contains(&(csr::MCAUSE, 11)));
    assert_eq!(core.peek_csr(csr::MCAUSE), Some(0));
    assert_eq!(core.pc(), 0);
    assert_eq!(core.exception_count(), 0);
}

/// Tests what-if execution of the instruction at the pc.
#[test]
fn test_what_if_at_pc() {
    let mut core = core(&[addi(3, 0, 7)]);
    let (ok, rec) = core.what_if_single_step_at();
    assert!(ok);
    assert_eq!(rec.int_reg, Some((3, 7)));
    assert_eq!(core.peek_int_reg(3), Some(0));
}

/// Tests a store-conditional succeeds on a live reservation.
#[test]
fn test_lr_sc_success() {
    let mut core = core(&[lr_w(2, 1), sc_w(3, 1, 4)]);
    core.poke_int_reg(1, 0x100);
    core.poke_int_reg(4, 0x99);
    core.poke_memory(0x100, 4, 7);

    core.single_step();
    assert_eq!(core.peek_int_reg(2), Some(7));
    core.single_step();
    assert_eq!(core.peek_int_reg(3), Some(0));
    assert_eq!(core.peek_memory(0x100, 4), Some(0x99));
}

/// Tests a poke to the reserved word cancels the reservation.
#[test]
fn test_lr_sc_poke_cancels() {
    let mut core = core(&[lr_w(2, 1), sc_w(3, 1, 4)]);
    core.poke_int_reg(1, 0x100);
    core.poke_int_reg(4, 0x99);

    core.single_step();
    core.poke_memory(0x102, 1, 0xff);
    core.single_step();
    assert_eq!(core.peek_int_reg(3), Some(1));
    assert_eq!(core.peek_memory(0x100, 4), Some(0x00ff_0000));
}

/// Tests a reported store error restores memory and raises an NMI.
#[test]
fn test_apply_store_exception() {
    let mut config = Config::default();
    config.core.store_queue_size = 4;
    let mut core = core_with(&config, &[sw(1, 2, 0)]);
    core.poke_memory(0x100, 4, 0xaabb_ccdd);
    core.poke_int_reg(1, 0x100);
    core.poke_int_reg(2, 0x1234);

    core.single_step();
    assert_eq!(core.peek_memory(0x100, 4), Some(0x1234));
    assert_eq!(core.store_queue().len(), 1);

    assert!(core.apply_store_exception(0x100));
    assert_eq!(core.peek_memory(0x100, 4), Some(0xaabb_ccdd));
    assert_eq!(core.peek_csr(csr::MDSEAC), Some(0x100));
    assert!(core.csrs().is_mdseac_locked());
    assert!(core.is_nmi_pending());

    // The entry is gone; the locked MDSEAC keeps the first address.
    assert!(!core.apply_store_exception(0x100));
    assert_eq!(core.peek_csr(csr::MDSEAC), Some(0x100));

    core.single_step();
    assert_eq!(core.peek_csr(csr::MCAUSE), Some(0xf000_0000));
}

/// Tests a reported load error reverts the destination register.
#[test]
fn test_apply_load_exception() {
    let mut config = Config::default();
    config.core.load_queue_size = 4;
    let mut core = core_with(&config, &[lw(5, 1, 0)]);
    core.poke_memory(0x100, 4, 0x77);
    core.poke_int_reg(1, 0x100);
    core.poke_int_reg(5, 3);

    core.single_step();
    assert_eq!(core.peek_int_reg(5), Some(0x77));
    assert!(core.apply_load_exception(0x100));
    assert_eq!(core.peek_int_reg(5), Some(3));
    assert!(core.is_nmi_pending());
}

/// Tests completed and consumed loads leave the load queue.
#[test]
fn test_load_queue_maintenance() {
    let mut config = Config::default();
    config.core.load_queue_size = 4;
    let mut core = core_with(&config, &[lw(5, 1, 0), lw(6, 1, 4), addi(7, 5, 0)]);
    core.poke_int_reg(1, 0x100);

    core.single_step();
    core.single_step();
    assert_eq!(core.load_queue().len(), 2);

    assert!(core.apply_load_finished(0x104, false));
    assert_eq!(core.load_queue().len(), 1);
    assert!(!core.is_nmi_pending());

    core.single_step();
    assert!(core.load_queue().is_empty());
    assert!(!core.apply_load_exception(0x100));
}

/// Tests the peek/poke interface and last-change queries.
#[test]
fn test_peek_poke() {
    let mut core = core(&[csrrw(5, csr::MSCRATCH, 1)]);
    assert_eq!(core.peek_int_reg(32), None);
    assert!(!core.poke_int_reg(32, 1));
    assert_eq!(core.find_int_reg("a0"), Some(10));
    assert_eq!(core.find_fp_reg("f31"), Some(31));
    assert_eq!(core.find_csr("mscratch"), Some(csr::MSCRATCH));
    assert!(core.implemented_csrs().contains(&csr::MSTATUS));
    assert!(core.poke_fp_reg(1, 0x4000_0000_0000_0000));
    assert_eq!(core.peek_fp_reg(1), Some(0x4000_0000_0000_0000));

    core.poke_csr(csr::MSCRATCH, 9);
    core.poke_int_reg(1, 4);
    core.single_step();
    assert_eq!(core.last_int_reg(), Some(5));
    assert_eq!(core.last_csrs(), vec![csr::MSCRATCH]);
    assert_eq!(core.peek_int_reg(5), Some(9));
    assert_eq!(core.peek_csr(csr::MSCRATCH), Some(4));
    assert!(core.last_memory().is_empty());
    assert_eq!(core.last_pc(), 0);
}

/// Tests floating-point registers are absent without F.
#[test]
fn test_fp_regs_need_f() {
    let mut config = Config::default();
    config.core.isa = "imac".to_string();
    let mut core = core_with(&config, &[]);
    assert_eq!(core.peek_fp_reg(0), None);
    assert!(!core.poke_fp_reg(0, 1));
}

/// Tests double-word stores on RV64 report two memory words.
#[test]
fn test_rv64_double_word() {
    let mut config = Config::default();
    config.core.xlen = 64;
    let mut core = core_with(&config, &[addi(1, 0, -1), sd(0, 1, 0x100), ld(2, 0, 0x100)]);

    core.single_step();
    assert_eq!(core.peek_int_reg(1), Some(u64::MAX));
    core.single_step();
    assert_eq!(
        core.last_memory(),
        vec![(0x100, 0xffff_ffff), (0x104, 0xffff_ffff)]
    );
    core.single_step();
    assert_eq!(core.peek_int_reg(2), Some(u64::MAX));
}

/// Tests reset restores the initial state.
#[test]
fn test_reset() {
    let mut config = Config::default();
    config.core.reset_pc = "0x40".to_string();
    let mut core = core_with(&config, &[]);
    assert_eq!(core.pc(), 0x40);
    core.poke_memory(0x40, 4, addi(1, 0, 1) as u64);
    core.single_step();
    assert_eq!(core.retired_instructions(), 1);

    core.reset(false);
    assert_eq!(core.pc(), 0x40);
    assert_eq!(core.peek_int_reg(1), Some(0));
    assert_eq!(core.retired_instructions(), 0);
}

/// Tests run statistics and the instruction-frequency profile.
#[test]
fn test_stats_and_profile() {
    let mut core = core(&[addi(1, 0, 1), addi(2, 0, -2), add(3, 1, 2)]);
    core.enable_instruction_frequency(true);
    core.set_instruction_limit(Some(3));
    core.run();

    let stats = SimStats::from_core(&core);
    assert_eq!(stats.instructions_retired, 3);
    assert_eq!(stats.exceptions, 0);

    let profile = core.instruction_profile().unwrap();
    assert_eq!(profile.total(), 3);
    let addi = profile.get("addi").unwrap();
    assert_eq!(addi.count, 2);
    assert_eq!(addi.imm_min, Some(-2));
    assert_eq!(addi.imm_max, Some(1));
    assert_eq!(profile.get("add").map(|p| p.count), Some(1));
    assert!(profile.to_json().is_ok());
}

/// Tests stop signals map onto run outcomes.
#[test]
fn test_stop_reason_from_signal() {
    use riscv_hart_sim::common::CoreStop;

    assert_eq!(
        StopReason::from(CoreStop::exit("exit", 0)),
        StopReason::Exited { code: 0 }
    );
    assert!(StopReason::from(CoreStop::exit("exit", 0)).is_success());
    assert!(!StopReason::Exited { code: 1 }.is_success());
    assert!(StopReason::DebugHalt.is_success());
}

/// Tests what-if execution leaves the store queue untouched, so a later
/// store error still matches exactly one entry.
#[test]
fn test_what_if_store_queue_neutral() {
    let mut config = Config::default();
    config.core.store_queue_size = 4;
    let mut core = core_with(&config, &[sw(1, 2, 0)]);
    core.poke_memory(0x100, 4, 0xaabb_ccdd);
    core.poke_int_reg(1, 0x100);
    core.poke_int_reg(2, 0x1234);

    let (ok, _) = core.what_if_single_step(sw(1, 2, 0));
    assert!(ok);
    assert!(core.store_queue().is_empty());

    core.single_step();
    assert_eq!(core.store_queue().len(), 1);
    assert!(core.apply_store_exception(0x100));
    assert_eq!(core.peek_memory(0x100, 4), Some(0xaabb_ccdd));
}

/// Tests what-if execution of a load leaves the load queue untouched.
#[test]
fn test_what_if_load_queue_neutral() {
    let mut config = Config::default();
    config.core.load_queue_size = 4;
    let mut core = core_with(&config, &[lw(5, 1, 0)]);
    core.poke_int_reg(1, 0x100);

    core.single_step();
    assert_eq!(core.load_queue().len(), 1);

    let (ok, rec) = core.what_if_single_step(lw(7, 1, 4));
    assert!(ok);
    assert_eq!(rec.int_reg, Some((7, 0)));
    assert_eq!(core.load_queue().len(), 1);
    assert!(core.apply_load_exception(0x100));
}

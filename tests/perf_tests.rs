//! Tests for the event-driven performance counters.

use riscv_hart_sim::config::Config;
use riscv_hart_sim::core::arch::csr;
use riscv_hart_sim::core::perf::{EventNumber, PerfRegs};
use riscv_hart_sim::core::Core;
use riscv_hart_sim::isa::encode::*;
use riscv_hart_sim::soc::FlatMemory;

fn core(enable_counters: bool) -> Core {
    let mut config = Config::default();
    config.core.enable_counters = enable_counters;
    let mut core = Core::new(&config, Box::new(FlatMemory::new(0, 0x10000))).unwrap();
    let program = [addi(1, 0, 1), addi(2, 0, 2), lw(3, 0, 0x80), addi(4, 0, 4)];
    for (i, inst) in program.iter().enumerate() {
        assert!(core.poke_memory(4 * i as u64, 4, *inst as u64));
    }
    core.poke_csr(csr::MHPMEVENT3, EventNumber::InstCommitted as u64);
    core.poke_csr(csr::MHPMEVENT3 + 1, EventNumber::Alu as u64);
    core.poke_csr(csr::MHPMEVENT3 + 2, EventNumber::Load as u64);
    core
}

/// Tests event values map to events and unknown values count nothing.
#[test]
fn test_event_from_u64() {
    assert_eq!(EventNumber::from_u64(4), EventNumber::InstCommitted);
    assert_eq!(EventNumber::from_u64(56), EventNumber::Sc);
    assert_eq!(EventNumber::from_u64(99), EventNumber::None);
}

/// Tests counters bound to an event increment on it.
#[test]
fn test_perf_regs_update() {
    let mut perf = PerfRegs::new(4);
    assert_eq!(perf.len(), 4);
    assert_eq!(perf.counter(4), None);

    assert!(perf.assign_event(0, EventNumber::Load as u64));
    assert!(perf.assign_event(2, EventNumber::Load as u64));
    perf.clear_modified();
    assert!(perf.update_counters(EventNumber::Load));
    assert!(!perf.update_counters(EventNumber::Store));
    assert!(!perf.update_counters(EventNumber::None));
    assert_eq!(perf.counter(0), Some(1));
    assert_eq!(perf.counter(1), Some(0));
    assert_eq!(perf.counter(2), Some(1));
}

/// Tests a counter written by the current instruction does not also count.
#[test]
fn test_perf_regs_modified() {
    let mut perf = PerfRegs::new(1);
    perf.assign_event(0, EventNumber::Alu as u64);
    perf.clear_modified();

    assert!(perf.set_counter(0, 10));
    assert!(perf.is_modified(0));
    assert!(!perf.update_counters(EventNumber::Alu));
    assert_eq!(perf.counter(0), Some(10));

    perf.clear_modified();
    assert!(perf.poke_counter(0, 20));
    assert!(!perf.is_modified(0));
    perf.update_counters(EventNumber::Alu);
    assert_eq!(perf.counter(0), Some(21));

    perf.reset();
    assert_eq!(perf.counter(0), Some(0));
    assert_eq!(perf.event(0), Some(EventNumber::None));
}

/// Tests retired instructions drive the counters through MHPMEVENT.
#[test]
fn test_core_counts_events() {
    let mut core = core(true);
    for _ in 0..3 {
        assert!(core.single_step().is_none());
    }
    assert_eq!(core.peek_csr(csr::MHPMCOUNTER3), Some(3));
    assert_eq!(core.peek_csr(csr::MHPMCOUNTER3 + 1), Some(2));
    assert_eq!(core.peek_csr(csr::MHPMCOUNTER3 + 2), Some(1));
}

/// Tests clearing MGPMC stops the counters.
#[test]
fn test_core_mgpmc_gates_counting() {
    let mut core = core(true);
    core.single_step();
    assert!(core.poke_csr(csr::MGPMC, 0));
    core.single_step();
    core.single_step();
    assert_eq!(core.peek_csr(csr::MHPMCOUNTER3), Some(1));

    assert!(core.poke_csr(csr::MGPMC, 1));
    core.single_step();
    assert_eq!(core.peek_csr(csr::MHPMCOUNTER3), Some(2));
}

/// Tests nothing is counted unless counters are enabled.
#[test]
fn test_core_counters_disabled() {
    let mut core = core(false);
    core.single_step();
    assert_eq!(core.peek_csr(csr::MHPMCOUNTER3), Some(0));

    core.enable_performance_counters(true);
    core.single_step();
    assert_eq!(core.peek_csr(csr::MHPMCOUNTER3), Some(1));
}

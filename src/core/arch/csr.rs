//! Control and Status Registers.
//!
//! The CSR file holds every control/status register of the hart. Each entry
//! carries a write mask (bits a CSR instruction may change) and a poke mask
//! (bits hardware or a test bench may change). Some entries do not own
//! their value:
//!
//! * counter CSRs (`mcycle`, `minstret`, their user shadows and RV32 high
//!   halves) are tied to the hart counters in [`HartCounters`],
//! * `mhpmcounterN`/`mhpmeventN` are tied to [`PerfRegs`],
//! * `tdata1..3` are routed through `tselect` to the [`Triggers`],
//! * `fflags`/`frm` and the supervisor/user status and interrupt CSRs are
//!   bit views of `fcsr`, `mstatus`, `mie` and `mip`.
//!
//! Writes made on behalf of an instruction are recorded with the prior value
//! so that they can be traced and undone.

use std::collections::HashMap;

use crate::common::error::SimError;
use crate::common::Xlen;
use crate::core::arch::mode::PrivilegeMode;
use crate::core::arch::trap::mstatus;
use crate::core::debug::Triggers;
use crate::core::perf::PerfRegs;

pub const USTATUS: u16 = 0x000;
pub const FFLAGS: u16 = 0x001;
pub const FRM: u16 = 0x002;
pub const FCSR: u16 = 0x003;
pub const UIE: u16 = 0x004;
pub const UTVEC: u16 = 0x005;
pub const USCRATCH: u16 = 0x040;
pub const UEPC: u16 = 0x041;
pub const UCAUSE: u16 = 0x042;
pub const UTVAL: u16 = 0x043;
pub const UIP: u16 = 0x044;

pub const SSTATUS: u16 = 0x100;
pub const SEDELEG: u16 = 0x102;
pub const SIDELEG: u16 = 0x103;
pub const SIE: u16 = 0x104;
pub const STVEC: u16 = 0x105;
pub const SCOUNTEREN: u16 = 0x106;
pub const SSCRATCH: u16 = 0x140;
pub const SEPC: u16 = 0x141;
pub const SCAUSE: u16 = 0x142;
pub const STVAL: u16 = 0x143;
pub const SIP: u16 = 0x144;
pub const SATP: u16 = 0x180;

pub const MSTATUS: u16 = 0x300;
pub const MISA: u16 = 0x301;
pub const MEDELEG: u16 = 0x302;
pub const MIDELEG: u16 = 0x303;
pub const MIE: u16 = 0x304;
pub const MTVEC: u16 = 0x305;
pub const MCOUNTEREN: u16 = 0x306;
pub const MHPMEVENT3: u16 = 0x323;
pub const MSCRATCH: u16 = 0x340;
pub const MEPC: u16 = 0x341;
pub const MCAUSE: u16 = 0x342;
pub const MTVAL: u16 = 0x343;
pub const MIP: u16 = 0x344;

pub const TSELECT: u16 = 0x7a0;
pub const TDATA1: u16 = 0x7a1;
pub const TDATA2: u16 = 0x7a2;
pub const TDATA3: u16 = 0x7a3;
pub const DCSR: u16 = 0x7b0;
pub const DPC: u16 = 0x7b1;
pub const DSCRATCH: u16 = 0x7b2;

/// Memory region access control (side-effect/cacheable bits per region).
pub const MRAC: u16 = 0x7c0;
/// Group performance monitor control: bit 0 enables the event counters.
pub const MGPMC: u16 = 0x7d0;

pub const MCYCLE: u16 = 0xb00;
pub const MINSTRET: u16 = 0xb02;
pub const MHPMCOUNTER3: u16 = 0xb03;
pub const MCYCLEH: u16 = 0xb80;
pub const MINSTRETH: u16 = 0xb82;
pub const MHPMCOUNTER3H: u16 = 0xb83;
/// Writing this register unlocks MDSEAC.
pub const MDEAU: u16 = 0xbc0;
/// External interrupt vector table base.
pub const MEIVT: u16 = 0xbc8;

pub const CYCLE: u16 = 0xc00;
pub const TIME: u16 = 0xc01;
pub const INSTRET: u16 = 0xc02;
pub const HPMCOUNTER3: u16 = 0xc03;
pub const CYCLEH: u16 = 0xc80;
pub const TIMEH: u16 = 0xc81;
pub const INSTRETH: u16 = 0xc82;
pub const HPMCOUNTER3H: u16 = 0xc83;

pub const MVENDORID: u16 = 0xf11;
pub const MARCHID: u16 = 0xf12;
pub const MIMPID: u16 = 0xf13;
pub const MHARTID: u16 = 0xf14;
/// Data bus error address capture.
pub const MDSEAC: u16 = 0xfc0;
/// External interrupt handler address pointer.
pub const MEIHAP: u16 = 0xfc8;

/// Number of `mhpmcounter` registers (3 through 31).
pub const MAX_PERF_COUNTERS: usize = 29;

pub const MIP_MSIP: u64 = 1 << 3;
pub const MIP_MTIP: u64 = 1 << 7;
pub const MIP_MEIP: u64 = 1 << 11;
pub const MIP_INT_TIMER1: u64 = 1 << 28;
pub const MIP_INT_TIMER0: u64 = 1 << 29;
pub const MIP_LOCAL: u64 = 1 << 30;

/// DCSR fields.
pub mod dcsr {
    pub const PRV: u64 = 3;
    pub const STEP: u64 = 1 << 2;
    pub const NMIP: u64 = 1 << 3;
    pub const CAUSE_SHIFT: u32 = 6;
    pub const CAUSE: u64 = 7 << CAUSE_SHIFT;
    pub const STOPCOUNT: u64 = 1 << 10;
    pub const STEPIE: u64 = 1 << 11;
    pub const EBREAKM: u64 = 1 << 15;
    pub const XDEBUGVER: u64 = 4 << 28;
}

/// Source of a CSR's value when the entry does not own it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tie {
    /// The entry owns its value.
    None,

    /// Retired-instruction counter (low or RV32 high half).
    Retired { high: bool },

    /// Cycle counter (low or RV32 high half).
    Cycles { high: bool },

    /// Performance counter `index` (0 is `mhpmcounter3`).
    PerfCounter { index: usize, high: bool },

    /// Event selector of performance counter `index`.
    PerfEvent { index: usize },

    /// `tdata<which>` of the trigger selected by `tselect`.
    Trigger { which: usize },

    /// Bit field `mask << shift` of another CSR.
    View { base: u16, shift: u32, mask: u64 },
}

/// One control and status register.
#[derive(Clone, Debug)]
pub struct Csr {
    number: u16,
    name: String,
    implemented: bool,
    debug_only: bool,
    value: u64,
    reset: u64,
    mask: u64,
    poke_mask: u64,
    tie: Tie,
}

impl Csr {
    pub fn number(&self) -> u16 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_implemented(&self) -> bool {
        self.implemented
    }

    /// Returns true if the register is only accessible in debug mode.
    pub fn is_debug(&self) -> bool {
        self.debug_only
    }

    pub fn reset_value(&self) -> u64 {
        self.reset
    }

    /// Bits a CSR instruction may change.
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Bits a poke may change.
    pub fn poke_mask(&self) -> u64 {
        self.poke_mask
    }

    pub fn tie(&self) -> Tie {
        self.tie
    }

    /// Lowest privilege allowed to access the register.
    pub fn privilege(&self) -> PrivilegeMode {
        PrivilegeMode::from_u8(((self.number >> 8) & 3) as u8)
    }

    /// Returns true if the CSR number lies in a read-only range.
    pub fn is_read_only(&self) -> bool {
        (self.number >> 10) & 3 == 3
    }
}

/// The instruction and cycle counters owned by the hart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HartCounters {
    pub retired: u64,
    pub cycles: u64,
}

/// Overrides applied to a CSR from the configuration.
#[derive(Clone, Debug, Default)]
pub struct CsrOverride {
    pub implemented: Option<bool>,
    pub reset: Option<u64>,
    pub mask: Option<u64>,
    pub poke_mask: Option<u64>,
    pub debug: Option<bool>,
}

/// The CSR file of one hart.
pub struct CsRegs {
    regs: HashMap<u16, Csr>,
    names: HashMap<String, u16>,
    xlen: Xlen,
    pub counters: HartCounters,
    pub perf: PerfRegs,
    pub triggers: Triggers,
    last_written: Vec<(u16, u64)>,
    mdseac_locked: bool,
}

/// Returns the MISA bit of extension letter `c`.
pub fn misa_bit(c: char) -> u64 {
    let c = c.to_ascii_lowercase();
    if c.is_ascii_lowercase() {
        1 << (c as u8 - b'a')
    } else {
        0
    }
}

impl CsRegs {
    /// Builds the CSR file.
    ///
    /// # Arguments
    ///
    /// * `xlen` - Register width
    /// * `extensions` - MISA extension bits (see [`misa_bit`])
    /// * `hart_id` - Value of `mhartid`
    /// * `perf_counters` - Number of implemented `mhpmcounter` registers
    /// * `trigger_count` - Number of triggers behind `tselect`
    pub fn new(
        xlen: Xlen,
        extensions: u64,
        hart_id: u64,
        perf_counters: usize,
        trigger_count: usize,
    ) -> Self {
        let perf_counters = perf_counters.min(MAX_PERF_COUNTERS);
        let mut csrs = Self {
            regs: HashMap::new(),
            names: HashMap::new(),
            xlen,
            counters: HartCounters::default(),
            perf: PerfRegs::new(perf_counters),
            triggers: Triggers::new(trigger_count, xlen),
            last_written: Vec::new(),
            mdseac_locked: false,
        };
        csrs.define_all(extensions, hart_id, perf_counters, trigger_count);
        csrs
    }

    fn define(&mut self, number: u16, name: &str, reset: u64, mask: u64, poke_mask: u64, tie: Tie) {
        let xmask = self.xlen.mask();
        let csr = Csr {
            number,
            name: name.to_string(),
            implemented: true,
            debug_only: (0x7b0..=0x7bf).contains(&number),
            value: reset & xmask,
            reset: reset & xmask,
            mask: mask & xmask,
            poke_mask: poke_mask & xmask,
            tie,
        };
        self.names.insert(name.to_string(), number);
        self.regs.insert(number, csr);
    }

    fn define_plain(&mut self, number: u16, name: &str, reset: u64, mask: u64) {
        self.define(number, name, reset, mask, mask, Tie::None);
    }

    fn set_implemented(&mut self, number: u16, flag: bool) {
        if let Some(c) = self.regs.get_mut(&number) {
            c.implemented = flag;
        }
    }

    fn define_all(&mut self, ext: u64, hart_id: u64, perf_counters: usize, trigger_count: usize) {
        let all = u64::MAX;
        let rv32 = !self.xlen.is_rv64();
        let has_u = ext & misa_bit('u') != 0;
        let has_s = ext & misa_bit('s') != 0;
        let has_f = ext & misa_bit('f') != 0;

        let irq_bits =
            MIP_MSIP | MIP_MTIP | MIP_MEIP | MIP_INT_TIMER1 | MIP_INT_TIMER0 | MIP_LOCAL;
        let status_mask = mstatus::UIE
            | mstatus::SIE
            | mstatus::MIE
            | mstatus::UPIE
            | mstatus::SPIE
            | mstatus::MPIE
            | mstatus::SPP
            | mstatus::MPP
            | mstatus::FS
            | mstatus::MPRV
            | mstatus::SUM
            | mstatus::MXR;
        let mxl = if rv32 { 1u64 << 30 } else { 2u64 << 62 };

        // Machine information and trap setup.
        self.define_plain(MVENDORID, "mvendorid", 0, 0);
        self.define_plain(MARCHID, "marchid", 0, 0);
        self.define_plain(MIMPID, "mimpid", 0, 0);
        self.define_plain(MHARTID, "mhartid", hart_id, 0);
        self.define(MSTATUS, "mstatus", 0, status_mask, status_mask, Tie::None);
        self.define_plain(MISA, "misa", mxl | ext, 0);
        self.define_plain(MEDELEG, "medeleg", 0, if has_s { all } else { 0 });
        self.define_plain(MIDELEG, "mideleg", 0, if has_s { all } else { 0 });
        self.define(MIE, "mie", 0, irq_bits, irq_bits, Tie::None);
        self.define_plain(MTVEC, "mtvec", 0, !2);
        self.define_plain(MCOUNTEREN, "mcounteren", 0, all);
        self.define_plain(MSCRATCH, "mscratch", 0, all);
        self.define_plain(MEPC, "mepc", 0, !1);
        self.define_plain(MCAUSE, "mcause", 0, all);
        self.define_plain(MTVAL, "mtval", 0, all);
        self.define(MIP, "mip", 0, 0, irq_bits, Tie::None);

        // Machine counters.
        self.define(MCYCLE, "mcycle", 0, all, all, Tie::Cycles { high: false });
        self.define(MINSTRET, "minstret", 0, all, all, Tie::Retired { high: false });
        self.define(CYCLE, "cycle", 0, 0, 0, Tie::Cycles { high: false });
        self.define(TIME, "time", 0, 0, 0, Tie::Cycles { high: false });
        self.define(INSTRET, "instret", 0, 0, 0, Tie::Retired { high: false });
        if rv32 {
            self.define(MCYCLEH, "mcycleh", 0, all, all, Tie::Cycles { high: true });
            self.define(MINSTRETH, "minstreth", 0, all, all, Tie::Retired { high: true });
            self.define(CYCLEH, "cycleh", 0, 0, 0, Tie::Cycles { high: true });
            self.define(TIMEH, "timeh", 0, 0, 0, Tie::Cycles { high: true });
            self.define(INSTRETH, "instreth", 0, 0, 0, Tie::Retired { high: true });
        }
        for i in 0..MAX_PERF_COUNTERS {
            let n = (i + 3) as u16;
            let (mask, counter, event) = if i < perf_counters {
                (
                    all,
                    Tie::PerfCounter { index: i, high: false },
                    Tie::PerfEvent { index: i },
                )
            } else {
                (0, Tie::None, Tie::None)
            };
            let (nm, ns) = (format!("mhpmcounter{}", i + 3), format!("hpmcounter{}", i + 3));
            self.define(MHPMCOUNTER3 + n - 3, &nm, 0, mask, mask, counter);
            self.define(HPMCOUNTER3 + n - 3, &ns, 0, 0, 0, counter);
            self.define(MHPMEVENT3 + n - 3, &format!("mhpmevent{}", i + 3), 0, mask, mask, event);
            if rv32 {
                let high = match counter {
                    Tie::PerfCounter { index, .. } => Tie::PerfCounter { index, high: true },
                    other => other,
                };
                let (nm, ns) = (format!("mhpmcounter{}h", i + 3), format!("hpmcounter{}h", i + 3));
                self.define(MHPMCOUNTER3H + n - 3, &nm, 0, mask, mask, high);
                self.define(HPMCOUNTER3H + n - 3, &ns, 0, 0, 0, high);
            }
        }

        // Floating point.
        self.define_plain(FCSR, "fcsr", 0, 0xff);
        let fflags = Tie::View { base: FCSR, shift: 0, mask: 0x1f };
        let frm = Tie::View { base: FCSR, shift: 5, mask: 0x7 };
        self.define(FFLAGS, "fflags", 0, 0x1f, 0x1f, fflags);
        self.define(FRM, "frm", 0, 0x7, 0x7, frm);
        for n in [FCSR, FFLAGS, FRM] {
            self.set_implemented(n, has_f);
        }

        // Supervisor.
        let sstatus_mask = mstatus::SIE
            | mstatus::SPIE
            | mstatus::SPP
            | mstatus::UIE
            | mstatus::UPIE
            | mstatus::FS
            | mstatus::SUM
            | mstatus::MXR;
        let s_irq = 0x222;
        let view = |base, mask| Tie::View { base, shift: 0, mask };
        self.define(SSTATUS, "sstatus", 0, sstatus_mask, sstatus_mask, view(MSTATUS, sstatus_mask));
        self.define(SIE, "sie", 0, s_irq, s_irq, view(MIE, s_irq));
        self.define(SIP, "sip", 0, s_irq, s_irq, view(MIP, s_irq));
        self.define_plain(SEDELEG, "sedeleg", 0, all);
        self.define_plain(SIDELEG, "sideleg", 0, all);
        self.define_plain(STVEC, "stvec", 0, !2);
        self.define_plain(SCOUNTEREN, "scounteren", 0, all);
        self.define_plain(SSCRATCH, "sscratch", 0, all);
        self.define_plain(SEPC, "sepc", 0, !1);
        self.define_plain(SCAUSE, "scause", 0, all);
        self.define_plain(STVAL, "stval", 0, all);
        self.define_plain(SATP, "satp", 0, all);
        for n in [
            SSTATUS, SIE, SIP, SEDELEG, SIDELEG, STVEC, SCOUNTEREN, SSCRATCH, SEPC, SCAUSE, STVAL,
            SATP,
        ] {
            self.set_implemented(n, has_s);
        }

        // User.
        let ustatus_mask = mstatus::UIE | mstatus::UPIE;
        let u_irq = 0x111;
        self.define(USTATUS, "ustatus", 0, ustatus_mask, ustatus_mask, view(MSTATUS, ustatus_mask));
        self.define(UIE, "uie", 0, u_irq, u_irq, view(MIE, u_irq));
        self.define(UIP, "uip", 0, u_irq, u_irq, view(MIP, u_irq));
        self.define_plain(UTVEC, "utvec", 0, !2);
        self.define_plain(USCRATCH, "uscratch", 0, all);
        self.define_plain(UEPC, "uepc", 0, !1);
        self.define_plain(UCAUSE, "ucause", 0, all);
        self.define_plain(UTVAL, "utval", 0, all);
        for n in [USTATUS, UIE, UIP, UTVEC, USCRATCH, UEPC, UCAUSE, UTVAL] {
            self.set_implemented(n, has_u);
        }

        // Debug and triggers.
        self.define_plain(TSELECT, "tselect", 0, all);
        self.define(TDATA1, "tdata1", 0, all, all, Tie::Trigger { which: 1 });
        self.define(TDATA2, "tdata2", 0, all, all, Tie::Trigger { which: 2 });
        self.define(TDATA3, "tdata3", 0, all, all, Tie::Trigger { which: 3 });
        for n in [TSELECT, TDATA1, TDATA2, TDATA3] {
            self.set_implemented(n, trigger_count > 0);
        }
        let dcsr_mask = 0xbe07;
        let dcsr_poke = dcsr_mask | dcsr::CAUSE | dcsr::NMIP;
        self.define(DCSR, "dcsr", dcsr::XDEBUGVER | dcsr::PRV, dcsr_mask, dcsr_poke, Tie::None);
        self.define_plain(DPC, "dpc", 0, !1);
        self.define_plain(DSCRATCH, "dscratch", 0, all);

        // Vendor.
        self.define_plain(MRAC, "mrac", 0, 0xffff_ffff);
        self.define_plain(MGPMC, "mgpmc", 1, 1);
        self.define(MDSEAC, "mdseac", 0, 0, all, Tie::None);
        self.define(MDEAU, "mdeau", 0, 0, 0, Tie::None);
        self.define_plain(MEIVT, "meivt", 0, !0x3ff);
        self.define(MEIHAP, "meihap", 0, 0, 0x3fc, Tie::None);
    }

    /// Returns the register width.
    pub fn xlen(&self) -> Xlen {
        self.xlen
    }

    /// Returns the CSR with the given number, implemented or not.
    pub fn get(&self, number: u16) -> Option<&Csr> {
        self.regs.get(&number)
    }

    /// Looks up a CSR number by name.
    pub fn find(&self, name: &str) -> Option<u16> {
        self.names.get(&name.to_ascii_lowercase()).copied()
    }

    /// Returns the numbers of all implemented CSRs in ascending order.
    pub fn implemented_csrs(&self) -> Vec<u16> {
        let mut v: Vec<u16> = self
            .regs
            .values()
            .filter(|c| c.implemented)
            .map(|c| c.number)
            .collect();
        v.sort_unstable();
        v
    }

    /// Applies configuration overrides to the CSR called `name`.
    pub fn configure(&mut self, name: &str, ov: &CsrOverride) -> Result<(), SimError> {
        let number = self
            .find(name)
            .ok_or_else(|| SimError::UnknownCsr(name.to_string()))?;
        let xmask = self.xlen.mask();
        let Some(c) = self.regs.get_mut(&number) else {
            return Err(SimError::UnknownCsr(name.to_string()));
        };
        if let Some(v) = ov.implemented {
            c.implemented = v;
        }
        if let Some(v) = ov.reset {
            c.reset = v & xmask;
            c.value = c.reset;
        }
        if let Some(v) = ov.mask {
            c.mask = v & xmask;
        }
        if let Some(v) = ov.poke_mask {
            c.poke_mask = v & xmask;
        }
        if let Some(v) = ov.debug {
            c.debug_only = v;
        }
        Ok(())
    }

    fn accessible(&self, number: u16, mode: PrivilegeMode, debug_mode: bool) -> Option<&Csr> {
        let c = self.regs.get(&number)?;
        if !c.implemented || mode < c.privilege() || (c.debug_only && !debug_mode) {
            return None;
        }
        Some(c)
    }

    /// Reads a CSR as a CSR instruction would.
    ///
    /// # Returns
    ///
    /// `None` if the CSR is not implemented or not accessible in `mode`.
    pub fn read(&self, number: u16, mode: PrivilegeMode, debug_mode: bool) -> Option<u64> {
        self.accessible(number, mode, debug_mode)?;
        self.peek(number)
    }

    /// Returns true if a CSR instruction in `mode` may write the CSR.
    pub fn is_writeable(&self, number: u16, mode: PrivilegeMode, debug_mode: bool) -> bool {
        self.accessible(number, mode, debug_mode)
            .map(|c| !c.is_read_only())
            .unwrap_or(false)
    }

    /// Writes a CSR as a CSR instruction would, honoring the write mask and
    /// recording the change.
    pub fn write(&mut self, number: u16, mode: PrivilegeMode, debug_mode: bool, value: u64) -> bool {
        if !self.is_writeable(number, mode, debug_mode) {
            return false;
        }
        let Some(prev) = self.peek(number) else {
            return false;
        };

        match number {
            // Selecting a missing trigger leaves tselect unchanged.
            TSELECT if value >= self.triggers.len() as u64 => return true,
            MDEAU => {
                self.mdseac_locked = false;
                return true;
            }
            _ => {}
        }

        let Some(c) = self.regs.get(&number) else {
            return false;
        };
        if let Tie::Trigger { which } = c.tie {
            let ix = self.selected_trigger();
            if !self.triggers.write(ix, which, value, debug_mode) {
                return true;
            }
            self.last_written.push((number, prev));
            return true;
        }

        let mask = c.mask;
        let new = (prev & !mask) | (value & mask);
        self.last_written.push((number, prev));
        self.store(number, new);
        true
    }

    /// Sets the bits of a CSR allowed by its poke mask without recording
    /// the change.
    pub fn poke(&mut self, number: u16, value: u64) -> bool {
        let Some(c) = self.regs.get(&number) else {
            return false;
        };
        if let Tie::Trigger { which } = c.tie {
            let ix = self.selected_trigger();
            return self.triggers.poke(ix, which, value);
        }
        let mask = c.poke_mask;
        let Some(prev) = self.peek(number) else {
            return false;
        };
        self.store(number, (prev & !mask) | (value & mask));
        true
    }

    /// Returns the value of a CSR without access checks.
    pub fn peek(&self, number: u16) -> Option<u64> {
        let c = self.regs.get(&number)?;
        if !c.implemented {
            return None;
        }
        let value = match c.tie {
            Tie::None => c.value,
            Tie::Retired { high } => self.counter_half(self.counters.retired, high),
            Tie::Cycles { high } => self.counter_half(self.counters.cycles, high),
            Tie::PerfCounter { index, high } => {
                self.counter_half(self.perf.counter(index).unwrap_or(0), high)
            }
            Tie::PerfEvent { index } => self.perf.event(index).map(|e| e as u64).unwrap_or(0),
            Tie::Trigger { which } => self.triggers.read(self.selected_trigger(), which)?,
            Tie::View { base, shift, mask } => (self.peek(base)? >> shift) & mask,
        };
        Some(value)
    }

    /// Sets the full value of a CSR, bypassing masks, and records the change
    /// for tracing. Used for trap and debug bookkeeping.
    pub fn set(&mut self, number: u16, value: u64) -> bool {
        let Some(prev) = self.peek(number) else {
            return false;
        };
        self.last_written.push((number, prev));
        self.store(number, value);
        true
    }

    /// Sets the full value of a CSR, bypassing masks, without recording.
    pub fn restore(&mut self, number: u16, value: u64) -> bool {
        if self.peek(number).is_none() {
            return false;
        }
        self.store(number, value);
        true
    }

    fn counter_half(&self, value: u64, high: bool) -> u64 {
        if high {
            value >> 32
        } else {
            self.xlen.truncate(value)
        }
    }

    fn merge_half(&self, old: u64, value: u64, high: bool) -> u64 {
        match (self.xlen, high) {
            (Xlen::Rv64, _) => value,
            (Xlen::Rv32, false) => (old & !0xffff_ffff) | (value & 0xffff_ffff),
            (Xlen::Rv32, true) => (old & 0xffff_ffff) | (value << 32),
        }
    }

    fn selected_trigger(&self) -> usize {
        self.regs.get(&TSELECT).map(|c| c.value as usize).unwrap_or(0)
    }

    /// Stores a value into the entry or its tie target.
    fn store(&mut self, number: u16, value: u64) {
        let value = self.xlen.truncate(value);
        let Some(tie) = self.regs.get(&number).map(|c| c.tie) else {
            return;
        };
        match tie {
            Tie::None => {
                if let Some(c) = self.regs.get_mut(&number) {
                    c.value = value;
                }
            }
            Tie::Retired { high } => {
                self.counters.retired = self.merge_half(self.counters.retired, value, high);
            }
            Tie::Cycles { high } => {
                self.counters.cycles = self.merge_half(self.counters.cycles, value, high);
            }
            Tie::PerfCounter { index, high } => {
                let old = self.perf.counter(index).unwrap_or(0);
                let new = self.merge_half(old, value, high);
                self.perf.set_counter(index, new);
            }
            Tie::PerfEvent { index } => {
                self.perf.assign_event(index, value);
            }
            Tie::Trigger { which } => {
                let ix = self.selected_trigger();
                self.triggers.poke(ix, which, value);
            }
            Tie::View { base, shift, mask } => {
                if let Some(c) = self.regs.get_mut(&base) {
                    c.value = (c.value & !(mask << shift)) | ((value & mask) << shift);
                }
            }
        }
    }

    /// Returns `(csr, prior value)` for every write since the last clear, in
    /// order.
    pub fn last_written(&self) -> &[(u16, u64)] {
        &self.last_written
    }

    /// Records that `number` is about to change outside of [`CsRegs::write`].
    pub fn record_write(&mut self, number: u16) {
        if let Some(prev) = self.peek(number) {
            self.last_written.push((number, prev));
        }
    }

    pub fn clear_last_written(&mut self) {
        self.last_written.clear();
        self.triggers.clear_last_written();
    }

    /// Returns true if MDSEAC holds a captured address.
    pub fn is_mdseac_locked(&self) -> bool {
        self.mdseac_locked
    }

    /// Locks MDSEAC so later bus errors do not overwrite it.
    pub fn lock_mdseac(&mut self) {
        self.mdseac_locked = true;
    }

    /// ORs IEEE flags into `fflags`, recording the change.
    pub fn accrue_fp_flags(&mut self, flags: u64) {
        let flags = flags & 0x1f;
        let Some(fcsr) = self.peek(FCSR) else {
            return;
        };
        if fcsr | flags != fcsr {
            self.set(FCSR, fcsr | flags);
        }
    }

    /// Returns the dynamic rounding mode held in `frm`.
    pub fn rounding_mode(&self) -> u64 {
        self.peek(FCSR).map(|v| (v >> 5) & 7).unwrap_or(0)
    }

    /// Restores every CSR to its reset value.
    pub fn reset(&mut self) {
        for c in self.regs.values_mut() {
            c.value = c.reset;
        }
        self.counters = HartCounters::default();
        self.perf.reset();
        self.triggers.reset();
        self.last_written.clear();
        self.mdseac_locked = false;
    }
}

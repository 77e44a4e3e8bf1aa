//! Debug Triggers.
//!
//! Hardware breakpoints and watchpoints programmed through `tselect` and
//! `tdata1..3`. Two trigger types are modeled:
//!
//! * **Address/data match** (`mcontrol`, type 2): matches instruction
//!   addresses, opcodes, load/store addresses or store data against `tdata2`
//!   using one of the equal/napot/ge/lt/masked-half comparisons. Triggers may
//!   be chained so that a group fires only when all its members match in the
//!   same instruction.
//! * **Instruction count** (`icount`, type 3): fires after the programmed
//!   number of retired instructions.
//!
//! Each check marks the matching triggers with a per-instruction local hit;
//! a trigger trips when its whole chain has hit. Tripping sets the `hit` bit
//! of every trigger in the chain, which is reported as a `tdata1` change.

use crate::common::Xlen;
use crate::core::arch::mode::PrivilegeMode;

/// When a trigger fires relative to the access it matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerTiming {
    Before,
    After,
}

/// Action taken when a trigger trips.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerAction {
    /// Raise a breakpoint exception.
    RaiseBreak,

    /// Enter debug mode.
    EnterDebug,
}

const TYPE_MCONTROL: u64 = 2;
const TYPE_ICOUNT: u64 = 3;

// mcontrol fields below the type/dmode/maskmax header.
const MC_LOAD: u64 = 1 << 0;
const MC_STORE: u64 = 1 << 1;
const MC_EXECUTE: u64 = 1 << 2;
const MC_U: u64 = 1 << 3;
const MC_S: u64 = 1 << 4;
const MC_M: u64 = 1 << 6;
const MC_MATCH_SHIFT: u32 = 7;
const MC_CHAIN: u64 = 1 << 11;
const MC_ACTION_SHIFT: u32 = 12;
const MC_TIMING: u64 = 1 << 18;
const MC_SELECT: u64 = 1 << 19;
const MC_HIT: u64 = 1 << 20;
const MC_WRITE_MASK: u64 = 0x1f_ffdf;

// icount fields.
const IC_ACTION_MASK: u64 = 0x3f;
const IC_U: u64 = 1 << 6;
const IC_S: u64 = 1 << 7;
const IC_M: u64 = 1 << 9;
const IC_COUNT_SHIFT: u32 = 10;
const IC_COUNT_MASK: u64 = 0x3fff;
const IC_HIT: u64 = 1 << 24;
const IC_WRITE_MASK: u64 = 0x1ff_ffff;

/// One trigger.
#[derive(Clone, Debug)]
pub struct Trigger {
    data1: u64,
    data2: u64,
    data3: u64,
    xlen: Xlen,
    local_hit: bool,
    tripped: bool,
    changed: [bool; 3],
}

impl Trigger {
    fn new(xlen: Xlen) -> Self {
        let mut t = Self {
            data1: 0,
            data2: 0,
            data3: 0,
            xlen,
            local_hit: false,
            tripped: false,
            changed: [false; 3],
        };
        t.data1 = t.header(TYPE_MCONTROL, false);
        t
    }

    fn header(&self, kind: u64, dmode: bool) -> u64 {
        let bits = self.xlen.bits();
        let mut v = kind << (bits - 4);
        if dmode {
            v |= 1 << (bits - 5);
        }
        v
    }

    /// Returns the trigger type field of `tdata1`.
    pub fn kind(&self) -> u64 {
        (self.data1 >> (self.xlen.bits() - 4)) & 0xf
    }

    /// Returns true if the trigger is reserved to debug mode.
    pub fn dmode(&self) -> bool {
        (self.data1 >> (self.xlen.bits() - 5)) & 1 != 0
    }

    fn body(&self) -> u64 {
        self.data1 & ((1u64 << (self.xlen.bits() - 5)) - 1)
    }

    fn is_mcontrol(&self) -> bool {
        self.kind() == TYPE_MCONTROL
    }

    fn is_icount(&self) -> bool {
        self.kind() == TYPE_ICOUNT
    }

    fn mode_enabled(&self, mode: PrivilegeMode) -> bool {
        let b = self.body();
        let (m, s, u) = if self.is_icount() {
            (IC_M, IC_S, IC_U)
        } else {
            (MC_M, MC_S, MC_U)
        };
        match mode {
            PrivilegeMode::Machine => b & m != 0,
            PrivilegeMode::Supervisor => b & s != 0,
            PrivilegeMode::User => b & u != 0,
        }
    }

    /// Returns the action programmed in the trigger.
    pub fn action(&self) -> TriggerAction {
        let raw = if self.is_icount() {
            self.body() & IC_ACTION_MASK
        } else {
            (self.body() >> MC_ACTION_SHIFT) & 0xf
        };
        if raw == 1 && self.dmode() {
            TriggerAction::EnterDebug
        } else {
            TriggerAction::RaiseBreak
        }
    }

    fn timing(&self) -> TriggerTiming {
        if self.body() & MC_TIMING != 0 {
            TriggerTiming::After
        } else {
            TriggerTiming::Before
        }
    }

    fn selects_data(&self) -> bool {
        self.body() & MC_SELECT != 0
    }

    fn chained(&self) -> bool {
        self.is_mcontrol() && self.body() & MC_CHAIN != 0
    }

    /// Returns true if the trigger can currently fire.
    pub fn is_active(&self) -> bool {
        let b = self.body();
        if self.is_mcontrol() {
            b & (MC_LOAD | MC_STORE | MC_EXECUTE) != 0 && b & (MC_M | MC_S | MC_U) != 0
        } else if self.is_icount() {
            self.icount() != 0 && b & (IC_M | IC_S | IC_U) != 0
        } else {
            false
        }
    }

    fn icount(&self) -> u64 {
        (self.body() >> IC_COUNT_SHIFT) & IC_COUNT_MASK
    }

    fn set_icount(&mut self, count: u64) {
        self.data1 &= !(IC_COUNT_MASK << IC_COUNT_SHIFT);
        self.data1 |= (count & IC_COUNT_MASK) << IC_COUNT_SHIFT;
        self.changed[0] = true;
    }

    /// Compares `value` with `tdata2` using the programmed match mode.
    fn matches(&self, value: u64) -> bool {
        let value = self.xlen.truncate(value);
        let data2 = self.xlen.truncate(self.data2);
        let half = self.xlen.bits() / 2;
        let half_mask = (1u64 << half) - 1;
        match (self.body() >> MC_MATCH_SHIFT) & 0xf {
            0 => value == data2,
            1 => {
                let low = data2 ^ data2.wrapping_add(1);
                value & !low == data2 & !low
            }
            2 => value >= data2,
            3 => value < data2,
            4 => (value & (data2 >> half)) & half_mask == data2 & half_mask,
            5 => ((value >> half) & (data2 >> half)) & half_mask == data2 & half_mask,
            _ => false,
        }
    }

    fn read(&self, which: usize) -> Option<u64> {
        match which {
            1 => Some(self.data1),
            2 => Some(self.data2),
            3 => Some(self.data3),
            _ => None,
        }
    }

    fn write_data1(&mut self, value: u64, debug_mode: bool) {
        let bits = self.xlen.bits();
        let mut kind = (value >> (bits - 4)) & 0xf;
        if kind != TYPE_MCONTROL && kind != TYPE_ICOUNT {
            kind = self.kind();
        }
        let dmode = debug_mode && (value >> (bits - 5)) & 1 != 0;
        let mask = if kind == TYPE_ICOUNT {
            IC_WRITE_MASK
        } else {
            MC_WRITE_MASK
        };
        self.data1 = self.header(kind, dmode) | (value & mask);
    }
}

/// The hart's trigger set.
#[derive(Clone, Debug)]
pub struct Triggers {
    triggers: Vec<Trigger>,
}

impl Triggers {
    /// Creates `count` disabled triggers.
    pub fn new(count: usize, xlen: Xlen) -> Self {
        Self {
            triggers: (0..count).map(|_| Trigger::new(xlen)).collect(),
        }
    }

    /// Returns the number of triggers.
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Returns trigger `ix`.
    pub fn get(&self, ix: usize) -> Option<&Trigger> {
        self.triggers.get(ix)
    }

    /// Reads `tdata<which>` of trigger `ix`.
    pub fn read(&self, ix: usize, which: usize) -> Option<u64> {
        self.triggers.get(ix)?.read(which)
    }

    /// Writes `tdata<which>` of trigger `ix` as a CSR instruction would.
    ///
    /// Writes to a debug-mode-only trigger from outside debug mode fail.
    pub fn write(&mut self, ix: usize, which: usize, value: u64, debug_mode: bool) -> bool {
        let Some(t) = self.triggers.get_mut(ix) else {
            return false;
        };
        if t.dmode() && !debug_mode {
            return false;
        }
        match which {
            1 => t.write_data1(value, debug_mode),
            2 => t.data2 = t.xlen.truncate(value),
            3 => t.data3 = 0,
            _ => return false,
        }
        t.changed[which - 1] = true;
        true
    }

    /// Sets `tdata<which>` of trigger `ix` without access checks.
    pub fn poke(&mut self, ix: usize, which: usize, value: u64) -> bool {
        let Some(t) = self.triggers.get_mut(ix) else {
            return false;
        };
        let value = t.xlen.truncate(value);
        match which {
            1 => t.data1 = value,
            2 => t.data2 = value,
            3 => t.data3 = value,
            _ => return false,
        }
        true
    }

    /// Returns `(tdata1, tdata2, tdata3)` of trigger `ix`.
    pub fn peek(&self, ix: usize) -> Option<(u64, u64, u64)> {
        let t = self.triggers.get(ix)?;
        Some((t.data1, t.data2, t.data3))
    }

    /// Returns true if any trigger can fire.
    pub fn has_active_trigger(&self) -> bool {
        self.triggers.iter().any(Trigger::is_active)
    }

    /// Returns true if any execute trigger can fire.
    pub fn has_active_inst_trigger(&self) -> bool {
        self.triggers
            .iter()
            .any(|t| t.is_active() && t.is_mcontrol() && t.body() & MC_EXECUTE != 0)
    }

    /// Checks instruction-address triggers.
    pub fn inst_addr_hit(
        &mut self,
        addr: u64,
        timing: TriggerTiming,
        mode: PrivilegeMode,
        interrupts_enabled: bool,
    ) -> bool {
        self.check(timing, mode, interrupts_enabled, |t| {
            t.body() & MC_EXECUTE != 0 && !t.selects_data() && t.matches(addr)
        })
    }

    /// Checks instruction-opcode triggers.
    pub fn inst_opcode_hit(
        &mut self,
        opcode: u32,
        timing: TriggerTiming,
        mode: PrivilegeMode,
        interrupts_enabled: bool,
    ) -> bool {
        self.check(timing, mode, interrupts_enabled, |t| {
            t.body() & MC_EXECUTE != 0 && t.selects_data() && t.matches(opcode as u64)
        })
    }

    /// Checks load/store address triggers.
    pub fn ld_st_addr_hit(
        &mut self,
        addr: u64,
        timing: TriggerTiming,
        is_load: bool,
        mode: PrivilegeMode,
        interrupts_enabled: bool,
    ) -> bool {
        let access = if is_load { MC_LOAD } else { MC_STORE };
        self.check(timing, mode, interrupts_enabled, |t| {
            t.body() & access != 0 && !t.selects_data() && t.matches(addr)
        })
    }

    /// Checks load/store data triggers.
    pub fn ld_st_data_hit(
        &mut self,
        value: u64,
        timing: TriggerTiming,
        is_load: bool,
        mode: PrivilegeMode,
        interrupts_enabled: bool,
    ) -> bool {
        let access = if is_load { MC_LOAD } else { MC_STORE };
        self.check(timing, mode, interrupts_enabled, |t| {
            t.body() & access != 0 && t.selects_data() && t.matches(value)
        })
    }

    /// Counts one retired instruction against the instruction-count
    /// triggers.
    ///
    /// # Returns
    ///
    /// `true` if a count reached zero.
    pub fn icount_hit(&mut self, mode: PrivilegeMode, interrupts_enabled: bool) -> bool {
        let mut hit = false;
        for t in &mut self.triggers {
            if !t.is_icount() || !t.is_active() || !t.mode_enabled(mode) {
                continue;
            }
            if !interrupts_enabled && t.action() == TriggerAction::RaiseBreak {
                continue;
            }
            let count = t.icount() - 1;
            t.set_icount(count);
            if count == 0 {
                t.data1 |= IC_HIT;
                t.local_hit = true;
                t.tripped = true;
                hit = true;
            }
        }
        hit
    }

    fn check<F>(
        &mut self,
        timing: TriggerTiming,
        mode: PrivilegeMode,
        interrupts_enabled: bool,
        matcher: F,
    ) -> bool
    where
        F: Fn(&Trigger) -> bool,
    {
        let mut any_local = false;
        for t in &mut self.triggers {
            if !t.is_mcontrol() || !t.is_active() || t.timing() != timing {
                continue;
            }
            if !t.mode_enabled(mode) {
                continue;
            }
            // Breakpoint-exception triggers are masked while interrupts are off.
            if !interrupts_enabled && t.action() == TriggerAction::RaiseBreak {
                continue;
            }
            if matcher(t) {
                t.local_hit = true;
                any_local = true;
            }
        }
        any_local && self.evaluate_chains()
    }

    /// Trips every chain whose members have all hit.
    fn evaluate_chains(&mut self) -> bool {
        let mut tripped = false;
        let mut start = 0;
        while start < self.triggers.len() {
            let mut end = start;
            while end + 1 < self.triggers.len() && self.triggers[end].chained() {
                end += 1;
            }
            let group = &mut self.triggers[start..=end];
            if group.iter().all(|t| t.local_hit) && group.iter().any(|t| !t.tripped) {
                for t in group.iter_mut() {
                    t.tripped = true;
                    t.data1 |= MC_HIT;
                    t.changed[0] = true;
                }
                tripped = true;
            }
            start = end + 1;
        }
        tripped
    }

    /// Returns the action of the tripped triggers: entering debug mode wins
    /// over raising a breakpoint.
    pub fn tripped_action(&self) -> Option<TriggerAction> {
        let mut action = None;
        for t in self.triggers.iter().filter(|t| t.tripped) {
            if t.action() == TriggerAction::EnterDebug {
                return Some(TriggerAction::EnterDebug);
            }
            action = Some(TriggerAction::RaiseBreak);
        }
        action
    }

    /// Clears per-instruction hit state.
    pub fn clear_local_hits(&mut self) {
        for t in &mut self.triggers {
            t.local_hit = false;
            t.tripped = false;
        }
    }

    /// Returns `(trigger, which)` pairs changed since the last clear, with
    /// `which` in 1..=3.
    pub fn last_written(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for (ix, t) in self.triggers.iter().enumerate() {
            for (w, changed) in t.changed.iter().enumerate() {
                if *changed {
                    out.push((ix, w + 1));
                }
            }
        }
        out
    }

    pub fn clear_last_written(&mut self) {
        for t in &mut self.triggers {
            t.changed = [false; 3];
        }
    }

    /// Restores every trigger to the disabled address-match state.
    pub fn reset(&mut self) {
        for t in &mut self.triggers {
            *t = Trigger::new(t.xlen);
        }
    }
}

//! Performance Counters.
//!
//! Machine-mode hardware performance monitor counters (`mhpmcounter3` and
//! up). Each counter is bound to an event through its `mhpmevent` CSR; the
//! core reports events as instructions commit and every counter bound to
//! the event is incremented. Event numbers follow the SweRV numbering.

/// Countable events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventNumber {
    None = 0,
    InstCommitted = 4,
    Inst16Committed = 5,
    Inst32Committed = 6,
    InstAligned = 7,
    Mult = 9,
    Div = 10,
    Load = 11,
    Store = 12,
    MisalignLoad = 13,
    MisalignStore = 14,
    Alu = 15,
    CsrRead = 16,
    CsrReadWrite = 17,
    CsrWrite = 18,
    Ebreak = 19,
    Ecall = 20,
    Fence = 21,
    Fencei = 22,
    Mret = 23,
    Branch = 24,
    BranchTaken = 26,
    Exception = 37,
    TimerInterrupt = 38,
    ExternalInterrupt = 39,
    Atomic = 54,
    Lr = 55,
    Sc = 56,
}

impl EventNumber {
    const ALL: [EventNumber; 27] = [
        EventNumber::InstCommitted,
        EventNumber::Inst16Committed,
        EventNumber::Inst32Committed,
        EventNumber::InstAligned,
        EventNumber::Mult,
        EventNumber::Div,
        EventNumber::Load,
        EventNumber::Store,
        EventNumber::MisalignLoad,
        EventNumber::MisalignStore,
        EventNumber::Alu,
        EventNumber::CsrRead,
        EventNumber::CsrReadWrite,
        EventNumber::CsrWrite,
        EventNumber::Ebreak,
        EventNumber::Ecall,
        EventNumber::Fence,
        EventNumber::Fencei,
        EventNumber::Mret,
        EventNumber::Branch,
        EventNumber::BranchTaken,
        EventNumber::Exception,
        EventNumber::TimerInterrupt,
        EventNumber::ExternalInterrupt,
        EventNumber::Atomic,
        EventNumber::Lr,
        EventNumber::Sc,
    ];

    /// Maps an `mhpmevent` value to an event. Unknown values count nothing.
    pub fn from_u64(val: u64) -> EventNumber {
        Self::ALL
            .iter()
            .copied()
            .find(|e| *e as u64 == val)
            .unwrap_or(EventNumber::None)
    }
}

/// Bank of event-driven counters.
#[derive(Clone, Debug)]
pub struct PerfRegs {
    counters: Vec<u64>,
    events: Vec<EventNumber>,
    modified: Vec<bool>,
}

impl PerfRegs {
    /// Creates `count` counters, all unbound.
    pub fn new(count: usize) -> Self {
        Self {
            counters: vec![0; count],
            events: vec![EventNumber::None; count],
            modified: vec![false; count],
        }
    }

    /// Returns the number of counters.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Returns the value of counter `ix` (0 is `mhpmcounter3`).
    pub fn counter(&self, ix: usize) -> Option<u64> {
        self.counters.get(ix).copied()
    }

    /// Sets counter `ix` and marks it modified for the current instruction.
    pub fn set_counter(&mut self, ix: usize, value: u64) -> bool {
        match self.counters.get_mut(ix) {
            Some(c) => {
                *c = value;
                self.modified[ix] = true;
                true
            }
            None => false,
        }
    }

    /// Sets counter `ix` without marking it modified.
    pub fn poke_counter(&mut self, ix: usize, value: u64) -> bool {
        match self.counters.get_mut(ix) {
            Some(c) => {
                *c = value;
                true
            }
            None => false,
        }
    }

    /// Binds counter `ix` to the event encoded by `value`.
    pub fn assign_event(&mut self, ix: usize, value: u64) -> bool {
        match self.events.get_mut(ix) {
            Some(e) => {
                *e = EventNumber::from_u64(value);
                self.modified[ix] = true;
                true
            }
            None => false,
        }
    }

    /// Returns the event bound to counter `ix`.
    pub fn event(&self, ix: usize) -> Option<EventNumber> {
        self.events.get(ix).copied()
    }

    /// Increments every counter bound to `event`, except counters written
    /// by the current instruction.
    ///
    /// # Returns
    ///
    /// `true` if at least one counter changed.
    pub fn update_counters(&mut self, event: EventNumber) -> bool {
        if event == EventNumber::None {
            return false;
        }
        let mut hit = false;
        for ix in 0..self.counters.len() {
            if self.events[ix] == event && !self.modified[ix] {
                self.counters[ix] = self.counters[ix].wrapping_add(1);
                hit = true;
            }
        }
        hit
    }

    /// Returns true if counter `ix` was written by the current instruction.
    pub fn is_modified(&self, ix: usize) -> bool {
        self.modified.get(ix).copied().unwrap_or(false)
    }

    /// Clears the per-instruction modified marks.
    pub fn clear_modified(&mut self) {
        self.modified.iter_mut().for_each(|m| *m = false);
    }

    pub fn reset(&mut self) {
        self.counters.iter_mut().for_each(|c| *c = 0);
        self.events.iter_mut().for_each(|e| *e = EventNumber::None);
        self.clear_modified();
    }
}

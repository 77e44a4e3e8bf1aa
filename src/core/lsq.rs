//! Load/Store Queues.
//!
//! Bounded records of recently committed memory transactions. When the
//! memory system reports a bus or ECC error after the instruction that
//! caused it has already retired, the queues identify the transaction and
//! tell the core what to undo:
//!
//! * for stores, the bytes to restore in memory,
//! * for loads, the prior value to put back in the destination register.
//!
//! The queues compute undo actions only; applying them (and raising the
//! associated NMI) is the core's job.

use std::collections::VecDeque;

/// A committed store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreInfo {
    pub size: usize,
    pub addr: u64,
    pub new_data: u64,
    pub prev_data: u64,
}

impl StoreInfo {
    pub fn new(size: usize, addr: u64, new_data: u64, prev_data: u64) -> Self {
        Self {
            size,
            addr,
            new_data,
            prev_data,
        }
    }

    fn contains(&self, addr: u64) -> bool {
        addr >= self.addr && addr < self.addr + self.size as u64
    }
}

/// A committed load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadInfo {
    pub size: usize,
    pub addr: u64,
    pub reg_ix: usize,
    pub prev_data: u64,
    pub valid: bool,
}

impl LoadInfo {
    pub fn new(size: usize, addr: u64, reg_ix: usize, prev_data: u64) -> Self {
        Self {
            size,
            addr,
            reg_ix,
            prev_data,
            valid: true,
        }
    }

    fn contains(&self, addr: u64) -> bool {
        addr >= self.addr && addr < self.addr + self.size as u64
    }
}

/// Outcome of matching an error address against a queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UndoError {
    /// No entry covers the address.
    NoMatch,

    /// More than one entry covers the address.
    MultipleMatches(usize),
}

/// FIFO of committed stores.
#[derive(Clone, Debug, Default)]
pub struct StoreQueue {
    entries: VecDeque<StoreInfo>,
    capacity: usize,
}

impl StoreQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns true if stores are being recorded.
    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &StoreInfo> {
        self.entries.iter()
    }

    /// Appends a store, evicting the oldest entry when full.
    pub fn push(&mut self, info: StoreInfo) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(info);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Computes the byte pokes that undo the store covering `addr`.
    ///
    /// The matched store's previous bytes are restored from `addr` up to
    /// the next double-word boundary. If the store extends past that
    /// boundary it is trimmed to the remainder, otherwise it is removed.
    /// Younger stores replay their new bytes over the undone range.
    ///
    /// # Returns
    ///
    /// The `(address, byte)` pokes in application order, or an error if
    /// the address does not match exactly one entry. The queue is only
    /// modified on success.
    pub fn undo(&mut self, addr: u64) -> Result<Vec<(u64, u8)>, UndoError> {
        let matches = self.entries.iter().filter(|e| e.contains(addr)).count();
        match matches {
            0 => return Err(UndoError::NoMatch),
            1 => {}
            n => return Err(UndoError::MultipleMatches(n)),
        }

        let mut pokes = Vec::new();
        let mut hit = false;
        let undo_begin = addr;
        let mut undo_end = addr;
        let mut remove_ix = None;

        for ix in 0..self.entries.len() {
            let entry = self.entries[ix];
            let entry_end = entry.addr + entry.size as u64;
            if hit {
                let mut data = entry.new_data;
                for ba in entry.addr..entry_end {
                    if ba >= undo_begin && ba < undo_end {
                        pokes.push((ba, data as u8));
                    }
                    data >>= 8;
                }
                continue;
            }
            if !entry.contains(addr) {
                continue;
            }

            hit = true;
            remove_ix = Some(ix);
            let offset = (addr - entry.addr) as usize;
            let mut prev = entry.prev_data >> (offset * 8);
            let mut new = entry.new_data >> (offset * 8);
            let mut a = addr;
            for i in offset..entry.size {
                pokes.push((a, prev as u8));
                a += 1;
                prev >>= 8;
                new >>= 8;
                undo_end = a;
                if a & 7 != 0 {
                    continue;
                }
                if i + 1 < entry.size {
                    self.entries[ix] = StoreInfo::new(entry.size - i - 1, a, new, prev);
                    remove_ix = None;
                    break;
                }
            }
        }

        if let Some(ix) = remove_ix {
            self.entries.remove(ix);
        }
        Ok(pokes)
    }
}

/// Register revert computed by [`LoadQueue::undo`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterRevert {
    pub reg_ix: usize,
    pub value: u64,
}

/// FIFO of committed loads.
#[derive(Clone, Debug, Default)]
pub struct LoadQueue {
    entries: VecDeque<LoadInfo>,
    capacity: usize,
}

impl LoadQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns true if loads are being recorded.
    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LoadInfo> {
        self.entries.iter()
    }

    /// Appends a load, evicting the oldest entry when full. Loads into
    /// register 0 are kept as invalid placeholders so that the memory
    /// system's completion report still finds them.
    pub fn push(&mut self, mut info: LoadInfo) {
        if self.capacity == 0 {
            return;
        }
        if info.reg_ix == 0 {
            info.valid = false;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(info);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Marks every entry targeting `reg_ix` invalid so that it is never
    /// reverted.
    pub fn invalidate(&mut self, reg_ix: usize) {
        for e in self.entries.iter_mut().filter(|e| e.reg_ix == reg_ix) {
            e.valid = false;
        }
    }

    /// Called when `reg_ix` is consumed as a source: removes the most
    /// recent valid entry for it and invalidates the older ones.
    pub fn remove_for_reg(&mut self, reg_ix: usize) {
        if reg_ix == 0 {
            return;
        }
        let mut remove_ix = None;
        for ix in (0..self.entries.len()).rev() {
            let e = &mut self.entries[ix];
            if !e.valid || e.reg_ix != reg_ix {
                continue;
            }
            if remove_ix.is_none() {
                remove_ix = Some(ix);
            } else {
                e.valid = false;
            }
        }
        if let Some(ix) = remove_ix {
            self.entries.remove(ix);
        }
    }

    /// Handles a load error reported for `addr`.
    ///
    /// Exactly one entry (valid or not) must cover the address. For a valid
    /// match the destination is reverted to the oldest prior value among the
    /// older valid entries for the same register (which are invalidated),
    /// unless a younger valid entry targets that register; the next younger
    /// such entry inherits the prior value. The matched entry is removed.
    ///
    /// # Returns
    ///
    /// The register to revert, if any.
    pub fn undo(&mut self, addr: u64) -> Result<Option<RegisterRevert>, UndoError> {
        let mut has_younger = false;
        let mut target: Option<usize> = None;
        let mut valid_matches = 0;
        let mut invalid_matches = 0;
        for e in &self.entries {
            if valid_matches > 0 && e.valid && target == Some(e.reg_ix) {
                has_younger = true;
            }
            if e.contains(addr) {
                if e.valid {
                    target = Some(e.reg_ix);
                    valid_matches += 1;
                } else {
                    invalid_matches += 1;
                }
            }
        }
        match valid_matches + invalid_matches {
            0 => return Err(UndoError::NoMatch),
            1 => {}
            n => return Err(UndoError::MultipleMatches(n)),
        }

        let Some(match_ix) = self.entries.iter().position(|e| e.contains(addr)) else {
            return Err(UndoError::NoMatch);
        };
        let entry = self.entries[match_ix];
        let mut revert = None;

        if entry.valid {
            let mut prev = entry.prev_data;
            for ix in (0..match_ix).rev() {
                let older = &mut self.entries[ix];
                if older.valid && older.reg_ix == entry.reg_ix {
                    prev = older.prev_data;
                    older.valid = false;
                }
            }

            if !has_younger {
                revert = Some(RegisterRevert {
                    reg_ix: entry.reg_ix,
                    value: prev,
                });
            }

            if let Some(younger) = self
                .entries
                .iter_mut()
                .skip(match_ix + 1)
                .find(|e| e.valid && e.reg_ix == entry.reg_ix)
            {
                younger.prev_data = prev;
            }
        }

        self.entries.remove(match_ix);
        Ok(revert)
    }

    /// Retires the load at exactly `addr` once the memory system reports it
    /// complete.
    ///
    /// # Arguments
    ///
    /// * `addr` - Load address
    /// * `match_oldest` - Pick the oldest matching entry instead of the
    ///   newest
    ///
    /// # Returns
    ///
    /// The number of entries whose address matched.
    pub fn finish(&mut self, addr: u64, match_oldest: bool) -> usize {
        let matching: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.addr == addr)
            .map(|(i, _)| i)
            .collect();
        let picked = if match_oldest {
            matching.first()
        } else {
            matching.last()
        };
        let Some(&match_ix) = picked else {
            return 0;
        };

        let entry = self.entries[match_ix];
        let mut prev = entry.prev_data;
        let mut prev_ix = match_ix;
        for ix in 0..match_ix {
            let older = &mut self.entries[ix];
            if !older.valid || older.reg_ix != entry.reg_ix {
                continue;
            }
            older.valid = false;
            if ix < prev_ix {
                prev_ix = ix;
                prev = older.prev_data;
            }
        }

        if entry.valid {
            if let Some(younger) = self
                .entries
                .iter_mut()
                .skip(match_ix + 1)
                .find(|e| e.valid && e.reg_ix == entry.reg_ix)
            {
                younger.prev_data = prev;
            }
        }

        self.entries.remove(match_ix);
        matching.len()
    }
}

//! Flat Physical Memory.
//!
//! A contiguous byte array starting at a configurable base address, with
//! optional closely-coupled memory and memory-mapped register regions. It
//! implements the `Memory` collaborator interface consumed by the hart core
//! and is what the CLI and the tests attach harts to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::common::{AccessType, SimError};
use crate::soc::traits::{LastWrite, Memory, RegionKind};

/// An address range `[base, base + size)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub base: u64,
    pub size: u64,
}

impl Region {
    /// Returns true if `addr` lies inside the region.
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr - self.base < self.size
    }
}

/// Flat little-endian memory.
pub struct FlatMemory {
    base: u64,
    data: Vec<u8>,
    dccm: Vec<Region>,
    iccm: Vec<Region>,
    mapped: Vec<Region>,
    mapped_masks: HashMap<u64, u32>,
    last_write: Option<LastWrite>,
    amo_mutex: Arc<Mutex<()>>,
}

impl FlatMemory {
    /// Creates a zero-filled memory of `size` bytes mapped at `base`.
    pub fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
            dccm: Vec::new(),
            iccm: Vec::new(),
            mapped: Vec::new(),
            mapped_masks: HashMap::new(),
            last_write: None,
            amo_mutex: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the address of the first byte.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Copies an image into memory, bypassing region rules.
    ///
    /// # Arguments
    ///
    /// * `addr` - Destination address of the first byte.
    /// * `bytes` - Image contents.
    pub fn load_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), SimError> {
        let Some(offset) = self.offset(addr, bytes.len()) else {
            return Err(SimError::ImageOutOfBounds {
                addr,
                size: bytes.len(),
            });
        };
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Sets the write mask of the memory-mapped register at `addr`.
    ///
    /// Bits cleared in the mask keep their value on writes.
    pub fn set_mapped_register_mask(&mut self, addr: u64, mask: u32) -> bool {
        if !self.is_addr_in_mapped_regs(addr) || addr & 3 != 0 {
            return false;
        }
        self.mapped_masks.insert(addr, mask);
        true
    }

    fn offset(&self, addr: u64, size: usize) -> Option<usize> {
        let off = addr.checked_sub(self.base)?;
        let end = off.checked_add(size as u64)?;
        if end > self.data.len() as u64 {
            return None;
        }
        Some(off as usize)
    }

    fn raw_read(&self, offset: usize, size: usize) -> u64 {
        self.data[offset..offset + size]
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64)
    }

    fn raw_write(&mut self, offset: usize, size: usize, value: u64) {
        for i in 0..size {
            self.data[offset + i] = (value >> (8 * i)) as u8;
        }
    }

    /// Applies region rules to an access.
    fn access_allowed(&self, addr: u64, size: usize, access: AccessType) -> bool {
        let last = addr.wrapping_add(size as u64 - 1);
        let mapped = self.is_addr_in_mapped_regs(addr) || self.is_addr_in_mapped_regs(last);
        if mapped {
            // Register blocks take aligned word data accesses only.
            return access != AccessType::Fetch && size == 4 && addr & 3 == 0;
        }
        let iccm = self.is_addr_in_iccm(addr) || self.is_addr_in_iccm(last);
        if iccm && access != AccessType::Fetch {
            return false;
        }
        true
    }

    fn masked_value(&self, addr: u64, offset: usize, size: usize, value: u64) -> u64 {
        match self.mapped_masks.get(&addr) {
            Some(&mask) if self.is_addr_in_mapped_regs(addr) => {
                let old = self.raw_read(offset, size);
                (old & !(mask as u64)) | (value & mask as u64)
            }
            _ => value,
        }
    }
}

impl Memory for FlatMemory {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read(&self, addr: u64, size: usize) -> Option<u64> {
        let offset = self.offset(addr, size)?;
        if !self.access_allowed(addr, size, AccessType::Read) {
            return None;
        }
        Some(self.raw_read(offset, size))
    }

    fn read_inst(&self, addr: u64, size: usize) -> Option<u64> {
        let offset = self.offset(addr, size)?;
        if !self.access_allowed(addr, size, AccessType::Fetch) {
            return None;
        }
        Some(self.raw_read(offset, size))
    }

    fn write(&mut self, addr: u64, size: usize, value: u64) -> bool {
        let Some(offset) = self.offset(addr, size) else {
            return false;
        };
        if !self.access_allowed(addr, size, AccessType::Write) {
            return false;
        }
        let value = self.masked_value(addr, offset, size, value);
        let prev_value = self.raw_read(offset, size);
        self.raw_write(offset, size, value);
        self.last_write = Some(LastWrite {
            addr,
            size,
            new_value: value,
            prev_value,
        });
        true
    }

    fn check_write(&self, addr: u64, size: usize, value: u64) -> Option<u64> {
        let offset = self.offset(addr, size)?;
        if !self.access_allowed(addr, size, AccessType::Write) {
            return None;
        }
        Some(self.masked_value(addr, offset, size, value))
    }

    fn poke(&mut self, addr: u64, size: usize, value: u64) -> bool {
        match self.offset(addr, size) {
            Some(offset) => {
                self.raw_write(offset, size, value);
                true
            }
            None => false,
        }
    }

    fn define_region(&mut self, kind: RegionKind, base: u64, size: u64) -> bool {
        if size == 0 || self.offset(base, size as usize).is_none() {
            log::error!(
                "Region {:?} at {:#x} of size {:#x} does not fit in memory",
                kind,
                base,
                size
            );
            return false;
        }
        let region = Region { base, size };
        match kind {
            RegionKind::Dccm => self.dccm.push(region),
            RegionKind::Iccm => self.iccm.push(region),
            RegionKind::MappedRegs => self.mapped.push(region),
        }
        true
    }

    fn is_addr_in_dccm(&self, addr: u64) -> bool {
        self.dccm.iter().any(|r| r.contains(addr))
    }

    fn is_addr_in_iccm(&self, addr: u64) -> bool {
        self.iccm.iter().any(|r| r.contains(addr))
    }

    fn is_addr_in_mapped_regs(&self, addr: u64) -> bool {
        self.mapped.iter().any(|r| r.contains(addr))
    }

    fn last_write(&self) -> Option<LastWrite> {
        self.last_write
    }

    fn clear_last_write(&mut self) {
        self.last_write = None;
    }

    fn amo_lock(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.amo_mutex)
    }

    fn reset_memory_mapped_registers(&mut self) {
        let regions = self.mapped.clone();
        for r in regions {
            if let Some(offset) = self.offset(r.base, r.size as usize) {
                self.data[offset..offset + r.size as usize].fill(0);
            }
        }
    }
}

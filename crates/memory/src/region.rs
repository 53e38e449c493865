//! Mapped region bookkeeping

use lens_core::Address;

bitflags::bitflags! {
    /// Region protection
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RegionFlags: u32 {
        const READ = 0x0001;
        const WRITE = 0x0002;
    }
}

/// A contiguous mapped range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: Address,
    pub len: usize,
    pub flags: RegionFlags,
}

impl MemoryRegion {
    pub fn new(start: Address, len: usize, flags: RegionFlags) -> Self {
        Self { start, len, flags }
    }

    pub fn end(&self) -> u64 {
        self.start.0.saturating_add(self.len as u64)
    }

    /// Offset of `[address, address + size)` inside the region, if fully contained.
    pub fn offset_of(&self, address: Address, size: usize) -> Option<usize> {
        let end = address.0.checked_add(size as u64)?;
        if address.0 < self.start.0 || end > self.end() {
            return None;
        }
        Some((address.0 - self.start.0) as usize)
    }

    pub fn is_readable(&self) -> bool {
        self.flags.contains(RegionFlags::READ)
    }

    pub fn is_writable(&self) -> bool {
        self.flags.contains(RegionFlags::WRITE)
    }
}

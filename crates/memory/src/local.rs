//! Reads of the inspector's own address space

use crate::error::{MemoryError, MemoryResult};
use crate::reader::MemoryReader;
use crate::region::{MemoryRegion, RegionFlags};
use lens_core::Address;
use parking_lot::RwLock;
use tracing::trace;

/// In-process memory restricted to regions the host has vouched for.
///
/// Nothing outside a registered region is ever dereferenced.
#[derive(Default)]
pub struct LocalMemory {
    regions: RwLock<Vec<MemoryRegion>>,
}

impl LocalMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapped range.
    ///
    /// # Safety
    /// `[start, start + len)` must stay mapped and readable (and writable when
    /// `flags` contains `WRITE`) until it is unregistered or `self` is dropped.
    pub unsafe fn register(&self, start: *const u8, len: usize, flags: RegionFlags) {
        let region = MemoryRegion::new(Address(start as u64), len, flags);
        trace!(start = %region.start, len, "Registering local region");
        self.regions.write().push(region);
    }

    pub fn unregister(&self, start: *const u8) {
        let start = Address(start as u64);
        self.regions.write().retain(|region| region.start != start);
    }

    fn find(&self, address: Address, size: usize) -> Option<(MemoryRegion, usize)> {
        self.regions
            .read()
            .iter()
            .find_map(|region| region.offset_of(address, size).map(|off| (*region, off)))
    }
}

impl MemoryReader for LocalMemory {
    fn read_bytes(&self, address: Address, size: usize) -> MemoryResult<Vec<u8>> {
        match self.find(address, size) {
            Some((region, _)) if region.is_readable() => {
                let mut buf = vec![0u8; size];
                // SAFETY: the range lies inside a region registered as readable.
                unsafe {
                    std::ptr::copy_nonoverlapping(
                        address.0 as usize as *const u8,
                        buf.as_mut_ptr(),
                        size,
                    );
                }
                Ok(buf)
            }
            _ => Err(MemoryError::unmapped(address, size)),
        }
    }

    fn is_readable(&self, address: Address, size: usize) -> bool {
        matches!(self.find(address, size), Some((region, _)) if region.is_readable())
    }

    fn write_bytes(&self, address: Address, data: &[u8]) -> MemoryResult<()> {
        let (region, _) = self
            .find(address, data.len())
            .ok_or_else(|| MemoryError::unmapped(address, data.len()))?;
        if !region.is_writable() {
            return Err(MemoryError::NotWritable {
                address,
                size: data.len(),
            });
        }
        // SAFETY: the range lies inside a region registered as writable.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), address.0 as usize as *mut u8, data.len());
        }
        Ok(())
    }
}

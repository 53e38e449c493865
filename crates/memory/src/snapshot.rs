//! Owned byte regions standing in for a foreign address space

use crate::error::{MemoryError, MemoryResult};
use crate::reader::MemoryReader;
use crate::region::{MemoryRegion, RegionFlags};
use lens_core::Address;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

struct Region {
    data: Vec<u8>,
    flags: RegionFlags,
}

/// Memory made of owned regions, addressed by their foreign start address.
///
/// Regions must not overlap; mapping at an existing start replaces it.
#[derive(Clone, Default)]
pub struct MemorySnapshot {
    regions: Arc<RwLock<BTreeMap<u64, Region>>>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a readable, writable region
    pub fn map(&self, address: Address, data: &[u8]) {
        self.map_with(address, data, RegionFlags::READ | RegionFlags::WRITE);
    }

    pub fn map_read_only(&self, address: Address, data: &[u8]) {
        self.map_with(address, data, RegionFlags::READ);
    }

    pub fn map_with(&self, address: Address, data: &[u8], flags: RegionFlags) {
        self.regions.write().insert(
            address.0,
            Region {
                data: data.to_vec(),
                flags,
            },
        );
    }

    pub fn unmap(&self, address: Address) -> bool {
        self.regions.write().remove(&address.0).is_some()
    }

    pub fn regions(&self) -> Vec<MemoryRegion> {
        self.regions
            .read()
            .iter()
            .map(|(&start, region)| MemoryRegion::new(Address(start), region.data.len(), region.flags))
            .collect()
    }

    fn locate<R>(
        &self,
        address: Address,
        size: usize,
        f: impl FnOnce(&MemoryRegion, usize) -> R,
    ) -> Option<R> {
        let regions = self.regions.read();
        let (&start, region) = regions.range(..=address.0).next_back()?;
        let info = MemoryRegion::new(Address(start), region.data.len(), region.flags);
        let offset = info.offset_of(address, size)?;
        Some(f(&info, offset))
    }
}

impl MemoryReader for MemorySnapshot {
    fn read_bytes(&self, address: Address, size: usize) -> MemoryResult<Vec<u8>> {
        let regions = self.regions.read();
        let (&start, region) = regions
            .range(..=address.0)
            .next_back()
            .ok_or_else(|| MemoryError::unmapped(address, size))?;

        let info = MemoryRegion::new(Address(start), region.data.len(), region.flags);
        match info.offset_of(address, size) {
            Some(offset) if info.is_readable() => Ok(region.data[offset..offset + size].to_vec()),
            _ => Err(MemoryError::unmapped(address, size)),
        }
    }

    fn is_readable(&self, address: Address, size: usize) -> bool {
        self.locate(address, size, |info, _| info.is_readable())
            .unwrap_or(false)
    }

    fn write_bytes(&self, address: Address, data: &[u8]) -> MemoryResult<()> {
        let mut regions = self.regions.write();
        let (&start, region) = regions
            .range_mut(..=address.0)
            .next_back()
            .ok_or_else(|| MemoryError::unmapped(address, data.len()))?;

        let info = MemoryRegion::new(Address(start), region.data.len(), region.flags);
        let offset = info
            .offset_of(address, data.len())
            .ok_or_else(|| MemoryError::unmapped(address, data.len()))?;
        if !info.is_writable() {
            return Err(MemoryError::NotWritable {
                address,
                size: data.len(),
            });
        }

        region.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}

impl std::fmt::Debug for MemorySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySnapshot")
            .field("regions", &self.regions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_inside_region() {
        let memory = MemorySnapshot::new();
        memory.map(Address(0x1000), &[1, 2, 3, 4, 5, 6, 7, 8]);

        assert_eq!(memory.read_bytes(Address(0x1002), 3).unwrap(), vec![3, 4, 5]);
        assert_eq!(memory.read_u32(Address(0x1000)).unwrap(), 0x0403_0201);
        assert!(memory.is_readable(Address(0x1000), 8));
        assert!(!memory.is_readable(Address(0x1000), 9));
    }

    #[test]
    fn test_read_outside_region_fails() {
        let memory = MemorySnapshot::new();
        memory.map(Address(0x1000), &[0; 8]);

        assert!(matches!(
            memory.read_bytes(Address(0x1004), 8),
            Err(MemoryError::Unmapped { .. })
        ));
        assert!(memory.read_bytes(Address(0xFFF), 1).is_err());
        assert!(memory.read_bytes(Address(0x2000), 1).is_err());
        assert!(memory.read_bytes(Address(u64::MAX), 2).is_err());
    }

    #[test]
    fn test_write_respects_flags() {
        let memory = MemorySnapshot::new();
        memory.map(Address(0x1000), &[0; 8]);
        memory.map_read_only(Address(0x2000), &[0; 8]);

        memory.write_bytes(Address(0x1004), &[9, 9]).unwrap();
        assert_eq!(memory.read_bytes(Address(0x1004), 2).unwrap(), vec![9, 9]);

        assert!(matches!(
            memory.write_bytes(Address(0x2000), &[1]),
            Err(MemoryError::NotWritable { .. })
        ));
        assert!(memory.write_bytes(Address(0x1007), &[1, 2]).is_err());
    }

    #[test]
    fn test_unmap() {
        let memory = MemorySnapshot::new();
        memory.map(Address(0x1000), &[0; 4]);
        assert!(memory.unmap(Address(0x1000)));
        assert!(!memory.is_readable(Address(0x1000), 1));
        assert!(memory.regions().is_empty());
    }
}

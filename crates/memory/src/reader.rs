//! The single boundary through which foreign memory is read or written

use crate::error::{MemoryError, MemoryResult};
use byteorder::{ByteOrder, LittleEndian};
use lens_core::Address;

const CSTRING_CHUNK: usize = 32;

/// Core trait for reading foreign memory
///
/// Implementations must validate that the whole range is mapped and readable
/// before touching it. Everything else in the inspector reads through here.
pub trait MemoryReader: Send + Sync {
    /// Read raw bytes from memory
    fn read_bytes(&self, address: Address, size: usize) -> MemoryResult<Vec<u8>>;

    /// Check if a whole range is mapped and readable
    fn is_readable(&self, address: Address, size: usize) -> bool;

    /// Write raw bytes. Read-only backends refuse.
    fn write_bytes(&self, address: Address, data: &[u8]) -> MemoryResult<()> {
        Err(MemoryError::NotWritable {
            address,
            size: data.len(),
        })
    }

    fn read_u8(&self, address: Address) -> MemoryResult<u8> {
        Ok(self.read_bytes(address, 1)?[0])
    }

    fn read_u16(&self, address: Address) -> MemoryResult<u16> {
        Ok(LittleEndian::read_u16(&self.read_bytes(address, 2)?))
    }

    fn read_u32(&self, address: Address) -> MemoryResult<u32> {
        Ok(LittleEndian::read_u32(&self.read_bytes(address, 4)?))
    }

    fn read_i32(&self, address: Address) -> MemoryResult<i32> {
        Ok(LittleEndian::read_i32(&self.read_bytes(address, 4)?))
    }

    fn read_u64(&self, address: Address) -> MemoryResult<u64> {
        Ok(LittleEndian::read_u64(&self.read_bytes(address, 8)?))
    }

    fn read_pointer(&self, address: Address) -> MemoryResult<Address> {
        self.read_u64(address).map(Address)
    }

    /// Resolve a 32-bit self-relative pointer stored at `field`.
    ///
    /// A zero offset is null.
    fn read_relative(&self, field: Address) -> MemoryResult<Option<Address>> {
        let offset = self.read_i32(field)?;
        resolve_relative(field, offset)
    }

    /// Read NUL-terminated bytes, at most `max_len` before the terminator.
    fn read_cstring(&self, address: Address, max_len: usize) -> MemoryResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut cursor = address;

        while out.len() <= max_len {
            let want = CSTRING_CHUNK.min(max_len + 1 - out.len());
            // Near the end of a region a full chunk may be unmapped.
            let chunk = match self.read_bytes(cursor, want) {
                Ok(chunk) => chunk,
                Err(_) => self.read_bytes(cursor, 1)?,
            };

            if let Some(nul) = chunk.iter().position(|&b| b == 0) {
                out.extend_from_slice(&chunk[..nul]);
                return Ok(out);
            }
            out.extend_from_slice(&chunk);
            cursor = cursor
                .checked_add(chunk.len() as u64)
                .ok_or(MemoryError::Overflow(cursor))?;
        }

        Err(MemoryError::InvalidString(address))
    }
}

/// `field + offset`, overflow checked. Zero means null.
pub fn resolve_relative(field: Address, offset: i32) -> MemoryResult<Option<Address>> {
    if offset == 0 {
        return Ok(None);
    }
    field
        .offset(offset as i64)
        .map(Some)
        .ok_or(MemoryError::Overflow(field))
}

impl<T: MemoryReader + ?Sized> MemoryReader for &T {
    fn read_bytes(&self, address: Address, size: usize) -> MemoryResult<Vec<u8>> {
        (**self).read_bytes(address, size)
    }

    fn is_readable(&self, address: Address, size: usize) -> bool {
        (**self).is_readable(address, size)
    }

    fn write_bytes(&self, address: Address, data: &[u8]) -> MemoryResult<()> {
        (**self).write_bytes(address, data)
    }
}

impl<T: MemoryReader + ?Sized> MemoryReader for std::sync::Arc<T> {
    fn read_bytes(&self, address: Address, size: usize) -> MemoryResult<Vec<u8>> {
        (**self).read_bytes(address, size)
    }

    fn is_readable(&self, address: Address, size: usize) -> bool {
        (**self).is_readable(address, size)
    }

    fn write_bytes(&self, address: Address, data: &[u8]) -> MemoryResult<()> {
        (**self).write_bytes(address, data)
    }
}

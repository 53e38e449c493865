//! Cursor over a fixed-size foreign record

use crate::error::{MemoryError, MemoryResult};
use crate::reader::{resolve_relative, MemoryReader};
use byteorder::{LittleEndian, ReadBytesExt};
use lens_core::Address;
use std::io::Cursor;

/// Reads the fields of one record fetched with a single bounds-checked read.
///
/// Relative pointers resolve against the foreign address of the field they
/// were read from, never against the local buffer.
pub struct RecordReader {
    base: Address,
    cursor: Cursor<Vec<u8>>,
}

impl RecordReader {
    /// Fetch `size` bytes at `base`
    pub fn fetch<M: MemoryReader + ?Sized>(
        memory: &M,
        base: Address,
        size: usize,
    ) -> MemoryResult<Self> {
        let data = memory.read_bytes(base, size)?;
        if data.len() != size {
            return Err(MemoryError::truncated(size, data.len()));
        }
        Ok(Self::from_bytes(base, data))
    }

    pub fn from_bytes(base: Address, data: Vec<u8>) -> Self {
        Self {
            base,
            cursor: Cursor::new(data),
        }
    }

    pub fn base(&self) -> Address {
        self.base
    }

    pub fn offset(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.cursor.set_position(offset as u64);
    }

    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.offset())
    }

    /// Foreign address of the current position
    pub fn position_address(&self) -> MemoryResult<Address> {
        self.base
            .checked_add(self.offset() as u64)
            .ok_or(MemoryError::Overflow(self.base))
    }

    fn need(&self, count: usize) -> MemoryResult<()> {
        if self.remaining() < count {
            return Err(MemoryError::truncated(count, self.remaining()));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> MemoryResult<u8> {
        self.need(1)?;
        self.cursor
            .read_u8()
            .map_err(|_| MemoryError::truncated(1, 0))
    }

    pub fn read_u16(&mut self) -> MemoryResult<u16> {
        self.need(2)?;
        self.cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| MemoryError::truncated(2, 0))
    }

    pub fn read_u32(&mut self) -> MemoryResult<u32> {
        self.need(4)?;
        self.cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| MemoryError::truncated(4, 0))
    }

    pub fn read_i32(&mut self) -> MemoryResult<i32> {
        self.need(4)?;
        self.cursor
            .read_i32::<LittleEndian>()
            .map_err(|_| MemoryError::truncated(4, 0))
    }

    pub fn read_u64(&mut self) -> MemoryResult<u64> {
        self.need(8)?;
        self.cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| MemoryError::truncated(8, 0))
    }

    pub fn read_pointer(&mut self) -> MemoryResult<Address> {
        self.read_u64().map(Address)
    }

    /// Read a self-relative i32 and resolve it. Zero is null.
    pub fn read_relative(&mut self) -> MemoryResult<Option<Address>> {
        let field = self.position_address()?;
        let offset = self.read_i32()?;
        resolve_relative(field, offset)
    }

    pub fn skip(&mut self, count: usize) -> MemoryResult<()> {
        self.need(count)?;
        self.set_offset(self.offset() + count);
        Ok(())
    }

    /// Read a relative pointer at a fixed offset without moving the cursor
    pub fn relative_at(&self, offset: usize) -> MemoryResult<Option<Address>> {
        let field = self
            .base
            .checked_add(offset as u64)
            .ok_or(MemoryError::Overflow(self.base))?;
        resolve_relative(field, self.u32_at(offset)? as i32)
    }

    pub fn u32_at(&self, offset: usize) -> MemoryResult<u32> {
        let bytes = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn u16_at(&self, offset: usize) -> MemoryResult<u16> {
        let bytes = self.slice(offset, 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn u64_at(&self, offset: usize) -> MemoryResult<u64> {
        let bytes = self.slice(offset, 8)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(word))
    }

    fn slice(&self, offset: usize, count: usize) -> MemoryResult<&[u8]> {
        let data = self.cursor.get_ref();
        offset
            .checked_add(count)
            .and_then(|end| data.get(offset..end))
            .ok_or_else(|| MemoryError::truncated(count, data.len().saturating_sub(offset)))
    }
}

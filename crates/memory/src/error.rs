//! Error types for memory access

use lens_core::Address;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Range {address} (+{size}) is not mapped")]
    Unmapped { address: Address, size: usize },

    #[error("Truncated record: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Range {address} (+{size}) is not writable")]
    NotWritable { address: Address, size: usize },

    #[error("Address arithmetic overflow at {0}")]
    Overflow(Address),

    #[error("Invalid string at {0}")]
    InvalidString(Address),
}

pub type MemoryResult<T> = std::result::Result<T, MemoryError>;

impl MemoryError {
    pub fn unmapped(address: Address, size: usize) -> Self {
        Self::Unmapped { address, size }
    }

    pub fn truncated(expected: usize, actual: usize) -> Self {
        Self::Truncated { expected, actual }
    }
}

impl From<MemoryError> for lens_core::Error {
    fn from(err: MemoryError) -> Self {
        lens_core::Error::memory(err.to_string())
    }
}

//! Foreign memory access for the type inspector
//!
//! Every read of foreign memory goes through [`MemoryReader`], which validates
//! that the whole range is mapped before touching it.

pub mod cursor;
pub mod error;
pub mod local;
pub mod reader;
pub mod region;
pub mod snapshot;

pub use cursor::RecordReader;
pub use error::{MemoryError, MemoryResult};
pub use local::LocalMemory;
pub use reader::{resolve_relative, MemoryReader};
pub use region::{MemoryRegion, RegionFlags};
pub use snapshot::MemorySnapshot;

//! Runtime metadata walking and field access for the foreign type inspector
//!
//! [`MetadataWalker`] turns a metadata address into a cached
//! [`lens_core::TypeDescriptor`] and its stored fields; [`Accessor`] reads and
//! writes those fields on a live object.

pub mod abi;
pub mod accessor;
pub mod walker;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use abi::{ContextKind, MetadataKind};
pub use accessor::{is_writable, Accessor, BorrowedRef, FieldValue};
pub use walker::{MetadataWalker, UNRESOLVED};

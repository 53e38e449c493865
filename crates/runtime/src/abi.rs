//! Runtime metadata layout, 64-bit little endian
//!
//! Offsets are in bytes from the start of the record they belong to. These
//! mirror the stable-ABI layout of the foreign runtime (`LayoutVersion::V5`).

use bitflags::bitflags;
use lens_core::TypeKind;

/// Largest metadata kind value; anything above it is an isa pointer.
pub const LAST_ENUMERATED_KIND: u64 = 0x7FF;

/// Generic parameter count accepted on a type descriptor
pub const MAX_GENERIC_PARAMETERS: u16 = 16;

/// Kind word at metadata + 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Class,
    Struct,
    Enum,
    Optional,
    Opaque,
    Tuple,
    Function,
    Existential,
    Metatype,
    ObjCClassWrapper,
    ExistentialMetatype,
}

impl MetadataKind {
    pub fn from_word(word: u64) -> Option<Self> {
        let kind = match word {
            0 => MetadataKind::Class,
            0x200 => MetadataKind::Struct,
            0x201 => MetadataKind::Enum,
            0x202 => MetadataKind::Optional,
            0x300 => MetadataKind::Opaque,
            0x301 => MetadataKind::Tuple,
            0x302 => MetadataKind::Function,
            0x303 => MetadataKind::Existential,
            0x304 => MetadataKind::Metatype,
            0x305 => MetadataKind::ObjCClassWrapper,
            0x306 => MetadataKind::ExistentialMetatype,
            w if w > LAST_ENUMERATED_KIND => MetadataKind::Class,
            _ => return None,
        };
        Some(kind)
    }

    /// Nominal kinds reach a context descriptor through their metadata.
    pub fn is_nominal(&self) -> bool {
        matches!(
            self,
            MetadataKind::Class | MetadataKind::Struct | MetadataKind::Enum | MetadataKind::Optional
        )
    }

    pub fn type_kind(&self) -> TypeKind {
        match self {
            MetadataKind::Class => TypeKind::Class,
            MetadataKind::Struct => TypeKind::Struct,
            MetadataKind::Enum | MetadataKind::Optional => TypeKind::Enum,
            MetadataKind::Existential | MetadataKind::ExistentialMetatype => TypeKind::Protocol,
            _ => TypeKind::Opaque,
        }
    }

    /// Placeholder name for metadata without a nominal descriptor.
    pub fn structural_name(&self) -> &'static str {
        match self {
            MetadataKind::Opaque => "Builtin",
            MetadataKind::Tuple => "Tuple",
            MetadataKind::Function => "Function",
            MetadataKind::Existential => "Any",
            MetadataKind::Metatype => "Metatype",
            MetadataKind::ObjCClassWrapper => "ObjCClass",
            MetadataKind::ExistentialMetatype => "ExistentialMetatype",
            _ => "Nominal",
        }
    }
}

// Value metadata (struct, enum, optional)
pub const VALUE_DESCRIPTION: u64 = 8;
pub const VALUE_GENERIC_ARGUMENTS: u64 = 16;
pub const VALUE_HEADER_SIZE: usize = 16;

/// Value witness table pointer, stored one word before the metadata.
pub const VALUE_WITNESS_POINTER: i64 = -8;
pub const VWT_SIZE: u64 = 64;
pub const VWT_STRIDE: u64 = 72;
pub const VWT_FLAGS: u64 = 80;
pub const VWT_RECORD_SIZE: usize = 84;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ValueWitnessFlags: u32 {
        const ALIGNMENT_MASK = 0xFF;
        const IS_NON_POD = 0x1_0000;
        const IS_NON_INLINE = 0x2_0000;
        const IS_NON_BITWISE_TAKABLE = 0x10_0000;
    }
}

impl ValueWitnessFlags {
    pub fn alignment(&self) -> u64 {
        (self.bits() & Self::ALIGNMENT_MASK.bits()) as u64 + 1
    }
}

// Class metadata
pub const CLASS_SUPERCLASS: usize = 8;
pub const CLASS_FLAGS: usize = 40;
pub const CLASS_INSTANCE_SIZE: usize = 48;
pub const CLASS_INSTANCE_ALIGN_MASK: usize = 52;
pub const CLASS_DESCRIPTION: usize = 64;
pub const CLASS_HEADER_SIZE: usize = 72;

/// Context descriptor kinds (`flags & 0x1F`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Module,
    Extension,
    Anonymous,
    Protocol,
    OpaqueType,
    Class,
    Struct,
    Enum,
}

impl ContextKind {
    pub fn from_flags(flags: ContextDescriptorFlags) -> Option<Self> {
        let kind = match flags.bits() & ContextDescriptorFlags::KIND_MASK.bits() {
            0 => ContextKind::Module,
            1 => ContextKind::Extension,
            2 => ContextKind::Anonymous,
            3 => ContextKind::Protocol,
            4 => ContextKind::OpaqueType,
            16 => ContextKind::Class,
            17 => ContextKind::Struct,
            18 => ContextKind::Enum,
            _ => return None,
        };
        Some(kind)
    }

    pub fn raw(&self) -> u32 {
        match self {
            ContextKind::Module => 0,
            ContextKind::Extension => 1,
            ContextKind::Anonymous => 2,
            ContextKind::Protocol => 3,
            ContextKind::OpaqueType => 4,
            ContextKind::Class => 16,
            ContextKind::Struct => 17,
            ContextKind::Enum => 18,
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(self, ContextKind::Class | ContextKind::Struct | ContextKind::Enum)
    }

    pub fn type_kind(&self) -> TypeKind {
        match self {
            ContextKind::Class => TypeKind::Class,
            ContextKind::Struct => TypeKind::Struct,
            ContextKind::Enum => TypeKind::Enum,
            ContextKind::Protocol => TypeKind::Protocol,
            _ => TypeKind::Opaque,
        }
    }

    /// Matches the metadata record the descriptor was reached from.
    pub fn matches(&self, metadata: MetadataKind) -> bool {
        matches!(
            (self, metadata),
            (ContextKind::Class, MetadataKind::Class)
                | (ContextKind::Struct, MetadataKind::Struct)
                | (ContextKind::Enum, MetadataKind::Enum | MetadataKind::Optional)
        )
    }

    /// Header size up to the generic header
    pub fn header_size(&self) -> usize {
        match self {
            ContextKind::Class => CLASS_DESCRIPTOR_GENERIC_HEADER,
            ContextKind::Struct | ContextKind::Enum => VALUE_DESCRIPTOR_GENERIC_HEADER,
            _ => DESCRIPTOR_NAME + 4,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ContextDescriptorFlags: u32 {
        const KIND_MASK = 0x1F;
        const UNIQUE = 0x40;
        const GENERIC = 0x80;
        const VERSION_MASK = 0xFF00;

        const _ = !0;
    }
}

impl ContextDescriptorFlags {
    pub fn version(&self) -> u32 {
        (self.bits() & Self::VERSION_MASK.bits()) >> 8
    }

    pub fn is_generic(&self) -> bool {
        self.contains(Self::GENERIC)
    }
}

// Context descriptors
pub const DESCRIPTOR_FLAGS: usize = 0;
pub const DESCRIPTOR_PARENT: usize = 4;
pub const DESCRIPTOR_NAME: usize = 8;
pub const DESCRIPTOR_ACCESS_FUNCTION: usize = 12;
pub const DESCRIPTOR_FIELDS: usize = 16;

pub const STRUCT_NUM_FIELDS: usize = 20;
pub const STRUCT_FIELD_OFFSET_VECTOR: usize = 24;
pub const ENUM_NUM_PAYLOAD_CASES: usize = 20;
pub const ENUM_NUM_EMPTY_CASES: usize = 24;
pub const VALUE_DESCRIPTOR_GENERIC_HEADER: usize = 28;

pub const CLASS_DESCRIPTOR_SUPERCLASS_TYPE: usize = 20;
pub const CLASS_NEGATIVE_SIZE: usize = 24;
pub const CLASS_POSITIVE_SIZE: usize = 28;
pub const CLASS_IMMEDIATE_MEMBERS: usize = 32;
pub const CLASS_NUM_FIELDS: usize = 36;
pub const CLASS_FIELD_OFFSET_VECTOR: usize = 40;
pub const CLASS_DESCRIPTOR_GENERIC_HEADER: usize = 44;

/// Generic header: instantiation cache, pattern, then four u16 counts.
pub const GENERIC_HEADER_SIZE: usize = 16;
pub const GENERIC_NUM_PARAMS: usize = 8;

pub const ENUM_PAYLOAD_CASES_MASK: u32 = 0x00FF_FFFF;

// Field descriptors
pub const FIELD_DESCRIPTOR_HEADER_SIZE: usize = 16;
pub const FIELD_DESCRIPTOR_KIND: usize = 8;
pub const FIELD_DESCRIPTOR_RECORD_SIZE: usize = 10;
pub const FIELD_DESCRIPTOR_COUNT: usize = 12;
pub const FIELD_RECORD_SIZE: usize = 12;
pub const FIELD_RECORD_TYPE_NAME: usize = 4;
pub const FIELD_RECORD_NAME: usize = 8;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldRecordFlags: u32 {
        const IS_INDIRECT_CASE = 0x1;
        const IS_VAR = 0x2;
        const IS_ARTIFICIAL = 0x4;
    }
}

// Symbolic references inside mangled type names
pub const SYMBOLIC_DIRECT_CONTEXT: u8 = 0x01;
pub const SYMBOLIC_INDIRECT_CONTEXT: u8 = 0x02;
pub const SYMBOLIC_RELATIVE_LAST: u8 = 0x17;
pub const SYMBOLIC_ABSOLUTE_FIRST: u8 = 0x18;
pub const SYMBOLIC_ABSOLUTE_LAST: u8 = 0x1F;

/// Payload length following a symbolic reference control byte
pub fn symbolic_payload_len(byte: u8) -> Option<usize> {
    match byte {
        0x01..=SYMBOLIC_RELATIVE_LAST => Some(4),
        SYMBOLIC_ABSOLUTE_FIRST..=SYMBOLIC_ABSOLUTE_LAST => Some(8),
        _ => None,
    }
}

// Native strings
pub const STRING_SMALL_FLAG: u64 = 0x2000_0000_0000_0000;
pub const STRING_SMALL_COUNT_SHIFT: u64 = 56;
pub const STRING_SMALL_COUNT_MASK: u64 = 0xF;
pub const STRING_SMALL_CAPACITY: usize = 15;
pub const STRING_LARGE_COUNT_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;
pub const STRING_OBJECT_ADDRESS_MASK: u64 = 0x0FFF_FFFF_FFFF_FFFF;
pub const STRING_LARGE_BYTES_OFFSET: u64 = 32;

// Weak references
pub const WEAK_SIDE_TABLE_MASK: u64 = !0x3;
pub const SIDE_TABLE_REFCOUNT: u64 = 8;
pub const REFCOUNT_DEINITING_BIT: u64 = 1 << 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_kinds() {
        assert_eq!(MetadataKind::from_word(0x200), Some(MetadataKind::Struct));
        assert_eq!(MetadataKind::from_word(0), Some(MetadataKind::Class));
        assert_eq!(MetadataKind::from_word(0x1_0000_4000), Some(MetadataKind::Class));
        assert_eq!(MetadataKind::from_word(0x203), None);
        assert_eq!(MetadataKind::Optional.type_kind(), TypeKind::Enum);
        assert_eq!(MetadataKind::Existential.type_kind(), TypeKind::Protocol);
        assert_eq!(MetadataKind::Tuple.type_kind(), TypeKind::Opaque);
    }

    #[test]
    fn test_descriptor_flags() {
        let flags = ContextDescriptorFlags::from_bits_retain(0x80 | 17);
        assert!(flags.is_generic());
        assert_eq!(flags.version(), 0);
        assert_eq!(ContextKind::from_flags(flags), Some(ContextKind::Struct));
        assert!(ContextKind::Struct.matches(MetadataKind::Struct));
        assert!(!ContextKind::Struct.matches(MetadataKind::Class));

        let versioned = ContextDescriptorFlags::from_bits_retain(0x0100 | 16);
        assert_eq!(versioned.version(), 1);
    }

    #[test]
    fn test_value_witness_alignment() {
        let flags = ValueWitnessFlags::from_bits_retain(0x7 | 0x1_0000);
        assert_eq!(flags.alignment(), 8);
        assert!(flags.contains(ValueWitnessFlags::IS_NON_POD));
    }

    #[test]
    fn test_symbolic_payloads() {
        assert_eq!(symbolic_payload_len(0x01), Some(4));
        assert_eq!(symbolic_payload_len(0x17), Some(4));
        assert_eq!(symbolic_payload_len(0x18), Some(8));
        assert_eq!(symbolic_payload_len(0x20), None);
        assert_eq!(symbolic_payload_len(0), None);
    }
}

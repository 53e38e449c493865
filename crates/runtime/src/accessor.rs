//! Field/value accessor
//!
//! Reads and writes stored fields of a live object. The field's range is
//! checked against the object's bounds before any byte is read. References
//! are handed out borrowed from the object handle and never retained.

use crate::abi::*;
use crate::walker::{is_class_reference, MetadataWalker};
use byteorder::{ByteOrder, LittleEndian};
use lens_core::{
    Address, BuiltinType, Error, FieldRecord, FieldTypeRef, ObjectHandle, ReferenceStorage, Result,
    TypeKind,
};
use lens_memory::{MemoryError, MemoryReader, RecordReader};
use std::fmt;
use tracing::{debug, trace};

const POINTER_SIZE: u64 = 8;

/// A reference read out of a field, valid only while the source handle is borrowed
#[derive(Debug, Clone, Copy)]
pub struct BorrowedRef<'o> {
    address: Address,
    storage: ReferenceStorage,
    source: &'o ObjectHandle,
}

impl<'o> BorrowedRef<'o> {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn storage(&self) -> ReferenceStorage {
        self.storage
    }

    /// The object the reference was read through.
    pub fn source(&self) -> &'o ObjectHandle {
        self.source
    }
}

impl PartialEq for BorrowedRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.storage == other.storage
    }
}

/// Decoded field contents
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'o> {
    Int(i64),
    UInt(u64),
    Bool(bool),
    Float(f32),
    Double(f64),
    String(String),
    Pointer(Address),
    Reference(BorrowedRef<'o>),
    Nil,
    /// Components of a CoreGraphics struct, in declaration order.
    Composite(Vec<f64>),
    /// Other trivial values, verbatim.
    Bytes(Vec<u8>),
}

impl FieldValue<'_> {
    pub fn variant_name(&self) -> &'static str {
        match self {
            FieldValue::Int(_) => "Int",
            FieldValue::UInt(_) => "UInt",
            FieldValue::Bool(_) => "Bool",
            FieldValue::Float(_) => "Float",
            FieldValue::Double(_) => "Double",
            FieldValue::String(_) => "String",
            FieldValue::Pointer(_) => "Pointer",
            FieldValue::Reference(_) => "Reference",
            FieldValue::Nil => "Nil",
            FieldValue::Composite(_) => "Composite",
            FieldValue::Bytes(_) => "Bytes",
        }
    }
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::UInt(v) => write!(f, "{}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Double(v) => write!(f, "{}", v),
            FieldValue::String(s) => write!(f, "{:?}", s),
            FieldValue::Pointer(address) => write!(f, "{}", address),
            FieldValue::Reference(r) => write!(f, "{}", r.address),
            FieldValue::Nil => write!(f, "nil"),
            FieldValue::Composite(parts) => {
                let parts: Vec<String> = parts.iter().map(f64::to_string).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            FieldValue::Bytes(bytes) => {
                write!(f, "<")?;
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                write!(f, ">")
            }
        }
    }
}

/// `true` when [`Accessor::write`] may succeed for `field`.
pub fn is_writable(field: &FieldRecord) -> bool {
    field.is_var
        && field.storage == ReferenceStorage::Strong
        && field.builtin().is_some_and(is_writable_builtin)
}

fn is_writable_builtin(builtin: BuiltinType) -> bool {
    !matches!(
        builtin,
        BuiltinType::String
            | BuiltinType::RawPointer
            | BuiltinType::MutableRawPointer
            | BuiltinType::NSRange
    )
}

fn composite_len(builtin: BuiltinType) -> Option<usize> {
    match builtin {
        BuiltinType::CGPoint | BuiltinType::CGSize | BuiltinType::CGVector => Some(2),
        BuiltinType::CGRect | BuiltinType::UIEdgeInsets => Some(4),
        _ => None,
    }
}

/// How a field's bytes are interpreted
enum Representation {
    Builtin(BuiltinType),
    Reference(ReferenceStorage),
    Trivial(u64),
}

/// Reads and writes fields through a walker's memory
pub struct Accessor<'w, M> {
    walker: &'w MetadataWalker<M>,
}

impl<'w, M: MemoryReader> Accessor<'w, M> {
    pub fn new(walker: &'w MetadataWalker<M>) -> Self {
        Self { walker }
    }

    /// `object.address + field.byte_offset`, checked against the object's bounds for `size` bytes.
    pub fn field_address(&self, object: &ObjectHandle, field: &FieldRecord, size: u64) -> Result<Address> {
        let address = object
            .address
            .checked_add(field.byte_offset)
            .ok_or(Error::OutOfBounds {
                address: object.address,
                size: size as usize,
            })?;
        let in_bounds = field
            .byte_offset
            .checked_add(size)
            .is_some_and(|end| end <= object.size);
        if !in_bounds {
            return Err(Error::OutOfBounds {
                address,
                size: size as usize,
            });
        }
        Ok(address)
    }

    fn representation(&self, field: &FieldRecord) -> Result<Representation> {
        if field.is_indirect {
            return Err(Error::unsupported_representation(format!(
                "{} is an indirect enum case",
                field.name
            )));
        }
        if let Some(owner) = self.walker.owner_type(&field.owner) {
            if owner.kind == TypeKind::Enum {
                return Err(Error::unsupported_representation(format!(
                    "{} is an enum case",
                    field.name
                )));
            }
        }
        if field.storage != ReferenceStorage::Strong {
            return Ok(Representation::Reference(field.storage));
        }

        match &field.type_ref {
            FieldTypeRef::Builtin(builtin) => Ok(Representation::Builtin(*builtin)),
            FieldTypeRef::Deferred(_) => {
                let ty = self.walker.resolve_field_type(field)?;
                if field.is_reference || is_class_reference(&ty.name) {
                    return Ok(Representation::Reference(ReferenceStorage::Strong));
                }
                let builtin = ty
                    .name
                    .module
                    .as_deref()
                    .filter(|_| ty.name.context.is_empty() && !ty.name.is_generic())
                    .and_then(|module| BuiltinType::from_qualified(module, &ty.name.type_name));
                if let Some(builtin) = builtin {
                    return Ok(Representation::Builtin(builtin));
                }
                match ty.layout {
                    Some(layout) if layout.is_pod => Ok(Representation::Trivial(layout.size)),
                    Some(_) => Err(Error::unsupported_representation(format!(
                        "{} has a non-trivial type {}",
                        field.name, ty.name
                    ))),
                    None => Err(Error::unsupported_representation(format!(
                        "layout of {} is unknown",
                        ty.name
                    ))),
                }
            }
        }
    }

    /// Decode the field's current value
    pub fn read<'o>(&self, object: &'o ObjectHandle, field: &FieldRecord) -> Result<FieldValue<'o>> {
        let representation = self.representation(field)?;
        let size = match &representation {
            Representation::Builtin(builtin) => builtin.size(),
            Representation::Reference(_) => POINTER_SIZE,
            Representation::Trivial(size) => *size,
        };
        let address = self.field_address(object, field, size)?;
        trace!(field = %field.name, %address, size, "Reading field");

        let memory = self.walker.memory();
        match representation {
            Representation::Builtin(BuiltinType::String) => {
                let bytes = memory.read_bytes(address, 16)?;
                self.decode_string(
                    LittleEndian::read_u64(&bytes[..8]),
                    LittleEndian::read_u64(&bytes[8..]),
                )
                .map(FieldValue::String)
            }
            Representation::Builtin(builtin) => {
                Ok(decode_builtin(builtin, &memory.read_bytes(address, size as usize)?))
            }
            Representation::Reference(ReferenceStorage::Weak) => self.read_weak(object, address),
            Representation::Reference(storage) => {
                let target = memory.read_pointer(address)?;
                Ok(borrowed(object, target, storage))
            }
            Representation::Trivial(size) => {
                Ok(FieldValue::Bytes(memory.read_bytes(address, size as usize)?))
            }
        }
    }

    fn decode_string(&self, count_word: u64, object_word: u64) -> Result<String> {
        if object_word & STRING_SMALL_FLAG != 0 {
            let count = ((object_word >> STRING_SMALL_COUNT_SHIFT) & STRING_SMALL_COUNT_MASK) as usize;
            if count > STRING_SMALL_CAPACITY {
                return Err(Error::unsupported_representation("small string count out of range"));
            }
            let mut bytes = Vec::with_capacity(16);
            bytes.extend_from_slice(&count_word.to_le_bytes());
            bytes.extend_from_slice(&object_word.to_le_bytes()[..7]);
            bytes.truncate(count);
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }

        let count = (count_word & STRING_LARGE_COUNT_MASK) as usize;
        if count == 0 {
            return Ok(String::new());
        }
        let storage = Address(object_word & STRING_OBJECT_ADDRESS_MASK);
        if storage.is_null() {
            return Err(Error::unsupported_representation("string has no storage"));
        }
        let start = storage
            .checked_add(STRING_LARGE_BYTES_OFFSET)
            .ok_or_else(|| Error::unsupported_representation("string storage overflows"))?;
        let len = count.min(self.walker.limits().max_string_bytes);
        let bytes = self.walker.memory().read_bytes(start, len)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Follows the side table instead of trusting the slot as a strong pointer.
    fn read_weak<'o>(&self, object: &'o ObjectHandle, slot: Address) -> Result<FieldValue<'o>> {
        let memory = self.walker.memory();
        let word = memory.read_u64(slot)?;
        if word == 0 {
            return Ok(FieldValue::Nil);
        }
        let entry = Address(word & WEAK_SIDE_TABLE_MASK);
        let record = RecordReader::fetch(memory, entry, 16)?;
        let target = Address(record.u64_at(0)?);
        let refcount = record.u64_at(SIDE_TABLE_REFCOUNT as usize)?;
        if refcount & REFCOUNT_DEINITING_BIT != 0 {
            trace!(%slot, "Weak referent is deinitializing");
            return Ok(FieldValue::Nil);
        }
        Ok(borrowed(object, target, ReferenceStorage::Weak))
    }

    /// Store `value` into a mutable field of trivial builtin type
    pub fn write(&self, object: &ObjectHandle, field: &FieldRecord, value: &FieldValue<'_>) -> Result<()> {
        if !field.is_var {
            return Err(Error::read_only(format!("{} is a constant", field.name)));
        }
        let builtin = match field.builtin() {
            Some(builtin) if is_writable_builtin(builtin) => builtin,
            _ => {
                return Err(Error::read_only(format!(
                    "{} is not a trivial builtin",
                    field.name
                )))
            }
        };
        let bytes = encode_builtin(builtin, value)?;
        let address = self.field_address(object, field, builtin.size())?;

        self.walker
            .memory()
            .write_bytes(address, &bytes)
            .map_err(|e| match e {
                MemoryError::NotWritable { .. } => {
                    Error::read_only(format!("{} lies in read-only memory", field.name))
                }
                other => other.into(),
            })?;
        debug!(field = %field.name, %address, value = %value, "Wrote field");
        Ok(())
    }
}

fn borrowed(object: &ObjectHandle, target: Address, storage: ReferenceStorage) -> FieldValue<'_> {
    if target.is_null() {
        return FieldValue::Nil;
    }
    FieldValue::Reference(BorrowedRef {
        address: target,
        storage,
        source: object,
    })
}

fn decode_builtin<'o>(builtin: BuiltinType, bytes: &[u8]) -> FieldValue<'o> {
    if let Some(len) = composite_len(builtin) {
        return FieldValue::Composite(
            bytes
                .chunks_exact(8)
                .take(len)
                .map(LittleEndian::read_f64)
                .collect(),
        );
    }
    match builtin {
        BuiltinType::Int | BuiltinType::Int64 => FieldValue::Int(LittleEndian::read_i64(bytes)),
        BuiltinType::Int32 => FieldValue::Int(LittleEndian::read_i32(bytes) as i64),
        BuiltinType::Int16 => FieldValue::Int(LittleEndian::read_i16(bytes) as i64),
        BuiltinType::Int8 => FieldValue::Int(bytes[0] as i8 as i64),
        BuiltinType::UInt | BuiltinType::UInt64 => FieldValue::UInt(LittleEndian::read_u64(bytes)),
        BuiltinType::UInt32 => FieldValue::UInt(LittleEndian::read_u32(bytes) as u64),
        BuiltinType::UInt16 => FieldValue::UInt(LittleEndian::read_u16(bytes) as u64),
        BuiltinType::UInt8 => FieldValue::UInt(bytes[0] as u64),
        BuiltinType::Bool => FieldValue::Bool(bytes[0] & 1 != 0),
        BuiltinType::Float => FieldValue::Float(LittleEndian::read_f32(bytes)),
        BuiltinType::Double | BuiltinType::CGFloat => FieldValue::Double(LittleEndian::read_f64(bytes)),
        BuiltinType::RawPointer | BuiltinType::MutableRawPointer => {
            FieldValue::Pointer(Address(LittleEndian::read_u64(bytes)))
        }
        _ => FieldValue::Bytes(bytes.to_vec()),
    }
}

fn mismatch(builtin: BuiltinType, value: &FieldValue<'_>) -> Error {
    Error::type_mismatch(format!("{:?}", builtin), format!("{}({})", value.variant_name(), value))
}

fn encode_builtin(builtin: BuiltinType, value: &FieldValue<'_>) -> Result<Vec<u8>> {
    if let Some(len) = composite_len(builtin) {
        return match value {
            FieldValue::Composite(parts) if parts.len() == len => {
                let mut bytes = vec![0; len * 8];
                for (chunk, part) in bytes.chunks_exact_mut(8).zip(parts) {
                    LittleEndian::write_f64(chunk, *part);
                }
                Ok(bytes)
            }
            _ => Err(mismatch(builtin, value)),
        };
    }

    let signed = match value {
        FieldValue::Int(v) => Some(*v as i128),
        FieldValue::UInt(v) => Some(*v as i128),
        _ => None,
    };
    let integer = |min: i128, max: i128| {
        signed
            .filter(|v| (min..=max).contains(v))
            .ok_or_else(|| mismatch(builtin, value))
    };

    let bytes = match builtin {
        BuiltinType::Int | BuiltinType::Int64 => {
            (integer(i64::MIN as i128, i64::MAX as i128)? as i64).to_le_bytes().to_vec()
        }
        BuiltinType::Int32 => (integer(i32::MIN as i128, i32::MAX as i128)? as i32).to_le_bytes().to_vec(),
        BuiltinType::Int16 => (integer(i16::MIN as i128, i16::MAX as i128)? as i16).to_le_bytes().to_vec(),
        BuiltinType::Int8 => (integer(i8::MIN as i128, i8::MAX as i128)? as i8).to_le_bytes().to_vec(),
        BuiltinType::UInt | BuiltinType::UInt64 => {
            (integer(0, u64::MAX as i128)? as u64).to_le_bytes().to_vec()
        }
        BuiltinType::UInt32 => (integer(0, u32::MAX as i128)? as u32).to_le_bytes().to_vec(),
        BuiltinType::UInt16 => (integer(0, u16::MAX as i128)? as u16).to_le_bytes().to_vec(),
        BuiltinType::UInt8 => vec![integer(0, u8::MAX as i128)? as u8],
        BuiltinType::Bool => match value {
            FieldValue::Bool(v) => vec![*v as u8],
            _ => return Err(mismatch(builtin, value)),
        },
        BuiltinType::Float => match value {
            FieldValue::Float(v) => v.to_le_bytes().to_vec(),
            FieldValue::Double(v) => (*v as f32).to_le_bytes().to_vec(),
            _ => return Err(mismatch(builtin, value)),
        },
        BuiltinType::Double | BuiltinType::CGFloat => match value {
            FieldValue::Double(v) => v.to_le_bytes().to_vec(),
            FieldValue::Float(v) => (*v as f64).to_le_bytes().to_vec(),
            _ => return Err(mismatch(builtin, value)),
        },
        _ => return Err(mismatch(builtin, value)),
    };
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{words, FieldSpec, LayoutBuilder, ValueWitness};
    use lens_core::{InspectorCache, InspectorConfig, MetadataHandle, WalkLimits};
    use lens_demangle::Demangler;
    use lens_memory::MemorySnapshot;
    use std::sync::Arc;

    fn walker_with(memory: MemorySnapshot, limits: WalkLimits) -> MetadataWalker<MemorySnapshot> {
        let config = InspectorConfig {
            limits,
            ..InspectorConfig::default()
        };
        let demangler = Demangler::new(Arc::new(InspectorCache::new()), config);
        MetadataWalker::new(memory, Arc::new(demangler))
    }

    fn walker(memory: MemorySnapshot) -> MetadataWalker<MemorySnapshot> {
        walker_with(memory, WalkLimits::default())
    }

    /// `main.Sample` with one field of each decodable shape.
    struct Sample {
        metadata: Address,
    }

    const SAMPLE_SIZE: u64 = 80;

    fn sample(builder: &mut LayoutBuilder) -> Sample {
        let main = builder.module("main");
        let descriptor = builder.type_descriptor(ContextKind::Struct, main, "Sample", 0, 6);
        builder
            .field_descriptor(
                descriptor,
                &[
                    FieldSpec::new("count", "Si").var(),
                    FieldSpec::new("enabled", "Sb"),
                    FieldSpec::new("ratio", "Sd").var(),
                    FieldSpec::new("title", "SS").var(),
                    FieldSpec::new("frame", "So6CGRectV").var(),
                    FieldSpec::new("level", "s4Int8V").var(),
                ],
            )
            .unwrap();
        let metadata = builder.struct_metadata(
            descriptor,
            ValueWitness::non_pod(SAMPLE_SIZE, 8),
            &[],
            &[0, 8, 16, 24, 40, 72],
        );
        Sample { metadata }
    }

    fn sample_bytes(title: [u64; 2]) -> Vec<u8> {
        let mut bytes = words(&[
            42,
            1,
            1.5f64.to_bits(),
            title[0],
            title[1],
            1.0f64.to_bits(),
            2.0f64.to_bits(),
            3.0f64.to_bits(),
            4.0f64.to_bits(),
        ]);
        bytes.extend_from_slice(&words(&[(-3i8) as u8 as u64]));
        bytes
    }

    fn field<'f>(fields: &'f [FieldRecord], name: &str) -> &'f FieldRecord {
        fields.iter().find(|f| f.name == name).unwrap()
    }

    #[test]
    fn test_reads_builtins() {
        let mut builder = LayoutBuilder::new();
        let sample = sample(&mut builder);
        let title = LayoutBuilder::small_string("hello").unwrap();
        let value = builder.value(sample.metadata, &sample_bytes(title));
        let walker = walker(builder.memory());
        let accessor = Accessor::new(&walker);

        let ty = walker.type_of(&value).unwrap();
        let fields = walker.fields(&ty).unwrap();

        assert_eq!(accessor.read(&value, field(&fields, "count")).unwrap(), FieldValue::Int(42));
        assert_eq!(accessor.read(&value, field(&fields, "enabled")).unwrap(), FieldValue::Bool(true));
        assert_eq!(accessor.read(&value, field(&fields, "ratio")).unwrap(), FieldValue::Double(1.5));
        assert_eq!(
            accessor.read(&value, field(&fields, "title")).unwrap(),
            FieldValue::String("hello".to_string())
        );
        assert_eq!(
            accessor.read(&value, field(&fields, "frame")).unwrap(),
            FieldValue::Composite(vec![1.0, 2.0, 3.0, 4.0])
        );
        assert_eq!(accessor.read(&value, field(&fields, "level")).unwrap(), FieldValue::Int(-3));
    }

    #[test]
    fn test_large_string_is_capped() {
        let mut builder = LayoutBuilder::new();
        let sample = sample(&mut builder);
        let text = "a string too long to be stored inline";
        let title = builder.large_string(text);
        let value = builder.value(sample.metadata, &sample_bytes(title));

        let walker = walker(builder.memory());
        let ty = walker.type_of(&value).unwrap();
        let fields = walker.fields(&ty).unwrap();
        assert_eq!(
            Accessor::new(&walker).read(&value, field(&fields, "title")).unwrap(),
            FieldValue::String(text.to_string())
        );

        let capped = walker_with(
            builder.memory(),
            WalkLimits {
                max_string_bytes: 8,
                ..WalkLimits::default()
            },
        );
        let ty = capped.type_of(&value).unwrap();
        let fields = capped.fields(&ty).unwrap();
        assert_eq!(
            Accessor::new(&capped).read(&value, field(&fields, "title")).unwrap(),
            FieldValue::String("a string".to_string())
        );
    }

    #[test]
    fn test_out_of_bounds_before_read() {
        let mut builder = LayoutBuilder::new();
        let sample = sample(&mut builder);
        let title = LayoutBuilder::small_string("x").unwrap();
        let value = builder.value(sample.metadata, &sample_bytes(title));
        let walker = walker(builder.memory());
        let accessor = Accessor::new(&walker);
        let fields = walker.fields(&walker.type_of(&value).unwrap()).unwrap();

        let truncated = ObjectHandle::value(value.address, 20, sample.metadata);
        assert!(accessor.read(&truncated, field(&fields, "count")).is_ok());
        assert!(matches!(
            accessor.read(&truncated, field(&fields, "ratio")),
            Err(Error::OutOfBounds { size: 8, .. })
        ));

        // The handle vouches for more than is mapped; the range check still comes first.
        let unmapped = ObjectHandle::value(Address(0x7000_0000), 8, sample.metadata);
        assert!(matches!(
            accessor.read(&unmapped, field(&fields, "title")),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(matches!(
            accessor.read(&unmapped, field(&fields, "count")),
            Err(Error::Memory(_))
        ));
    }

    #[test]
    fn test_writes() {
        let mut builder = LayoutBuilder::new();
        let sample = sample(&mut builder);
        let title = LayoutBuilder::small_string("x").unwrap();
        let bytes = sample_bytes(title);
        let value = builder.value(sample.metadata, &bytes);
        let memory = builder.memory();
        let frozen = Address(0x7000_0000);
        memory.map_read_only(frozen, &bytes);
        let frozen = ObjectHandle::value(frozen, SAMPLE_SIZE, sample.metadata);

        let walker = walker(memory);
        let accessor = Accessor::new(&walker);
        let fields = walker.fields(&walker.type_of(&value).unwrap()).unwrap();

        accessor.write(&value, field(&fields, "count"), &FieldValue::Int(7)).unwrap();
        assert_eq!(accessor.read(&value, field(&fields, "count")).unwrap(), FieldValue::Int(7));

        accessor
            .write(&value, field(&fields, "frame"), &FieldValue::Composite(vec![0.0, 0.0, 10.0, 20.0]))
            .unwrap();
        assert_eq!(
            accessor.read(&value, field(&fields, "frame")).unwrap(),
            FieldValue::Composite(vec![0.0, 0.0, 10.0, 20.0])
        );

        let cases = [
            ("enabled", FieldValue::Bool(false)),
            ("title", FieldValue::String("y".into())),
        ];
        for (name, new_value) in cases {
            assert!(matches!(
                accessor.write(&value, field(&fields, name), &new_value),
                Err(Error::ReadOnly(_))
            ));
        }

        assert!(matches!(
            accessor.write(&value, field(&fields, "level"), &FieldValue::Int(300)),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            accessor.write(&value, field(&fields, "ratio"), &FieldValue::Bool(true)),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            accessor.write(&frozen, field(&fields, "count"), &FieldValue::Int(1)),
            Err(Error::ReadOnly(_))
        ));
        assert_eq!(accessor.read(&value, field(&fields, "level")).unwrap(), FieldValue::Int(-3));

        assert!(is_writable(field(&fields, "count")));
        assert!(!is_writable(field(&fields, "title")));
        assert!(!is_writable(field(&fields, "enabled")));
    }

    #[test]
    fn test_references() {
        let mut builder = LayoutBuilder::new();
        let main = builder.module("main");
        let node = builder.type_descriptor(ContextKind::Class, main, "Node", 0, 2);
        builder
            .field_descriptor(
                node,
                &[
                    FieldSpec::symbolic("next", node, "Sg").var(),
                    FieldSpec::symbolic("delegate", node, "SgXw").var(),
                ],
            )
            .unwrap();
        let metadata = builder.class_metadata(node, None, 32, &[], &[16, 24]);

        let target = builder.instance(metadata, &words(&[0, 0]));
        let live = builder.weak_slot(Some(target.address), false);
        let dying = builder.weak_slot(Some(target.address), true);

        let linked = builder.instance(metadata, &words(&[target.address.0, live]));
        let released = builder.instance(metadata, &words(&[0, dying]));
        let empty = builder.instance(metadata, &words(&[0, 0]));

        let walker = walker(builder.memory());
        let accessor = Accessor::new(&walker);
        let ty = walker.type_descriptor(MetadataHandle::new(metadata)).unwrap();
        let fields = walker.fields(&ty).unwrap();
        let (next, delegate) = (field(&fields, "next"), field(&fields, "delegate"));

        match accessor.read(&linked, next).unwrap() {
            FieldValue::Reference(r) => {
                assert_eq!(r.address(), target.address);
                assert_eq!(r.storage(), ReferenceStorage::Strong);
                assert_eq!(r.source(), &linked);
            }
            other => panic!("unexpected {:?}", other),
        }
        match accessor.read(&linked, delegate).unwrap() {
            FieldValue::Reference(r) => {
                assert_eq!(r.address(), target.address);
                assert_eq!(r.storage(), ReferenceStorage::Weak);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(accessor.read(&released, next).unwrap(), FieldValue::Nil);
        assert_eq!(accessor.read(&released, delegate).unwrap(), FieldValue::Nil);
        assert_eq!(accessor.read(&empty, delegate).unwrap(), FieldValue::Nil);

        assert!(matches!(
            accessor.write(&linked, next, &FieldValue::Nil),
            Err(Error::ReadOnly(_))
        ));
    }

    #[test]
    fn test_enum_cases_are_unsupported() {
        let mut builder = LayoutBuilder::new();
        let main = builder.module("main");
        let state = builder.type_descriptor(ContextKind::Enum, main, "State", 0, 1);
        builder
            .field_descriptor(state, &[FieldSpec::new("loaded", "Si")])
            .unwrap();
        let metadata = builder.enum_metadata(state, ValueWitness::pod(9, 8), &[]);
        let value = builder.value(metadata, &[0; 9]);
        let walker = walker(builder.memory());
        let fields = walker.fields(&walker.type_of(&value).unwrap()).unwrap();

        assert!(matches!(
            Accessor::new(&walker).read(&value, &fields[0]),
            Err(Error::UnsupportedRepresentation(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldValue::String("a".into()).to_string(), "\"a\"");
        assert_eq!(FieldValue::Composite(vec![1.0, 2.5]).to_string(), "{1, 2.5}");
        assert_eq!(FieldValue::Nil.to_string(), "nil");
        assert_eq!(FieldValue::Bytes(vec![0xAB, 1]).to_string(), "<ab01>");
    }
}

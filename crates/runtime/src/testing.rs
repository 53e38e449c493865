//! Synthetic runtime layouts for tests
//!
//! [`LayoutBuilder`] lays out descriptors, metadata and instances in a
//! [`MemorySnapshot`] the way the runtime would, with an unmapped gap after
//! every allocation so over-reads fail instead of landing in a neighbour.

use crate::abi::*;
use byteorder::{ByteOrder, LittleEndian};
use lens_core::{Address, ObjectHandle};
use lens_memory::{MemoryReader, MemoryResult, MemorySnapshot};

const BASE: u64 = 0x10_0000;
const GAP: u64 = 16;
const VALUE_METADATA_WORDS: u32 = (VALUE_HEADER_SIZE / 8) as u32;
const CLASS_METADATA_WORDS: u32 = (CLASS_HEADER_SIZE / 8) as u32;
const ASCII_SMALL_STRING: u64 = 0xE000_0000_0000_0000;

/// Little-endian record under construction
#[derive(Default)]
struct Record(Vec<u8>);

impl Record {
    fn u16(&mut self, value: u16) -> &mut Self {
        let mut buf = [0; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.0.extend_from_slice(&buf);
        self
    }

    fn u32(&mut self, value: u32) -> &mut Self {
        let mut buf = [0; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.0.extend_from_slice(&buf);
        self
    }

    fn i32(&mut self, value: i32) -> &mut Self {
        let mut buf = [0; 4];
        LittleEndian::write_i32(&mut buf, value);
        self.0.extend_from_slice(&buf);
        self
    }

    fn u64(&mut self, value: u64) -> &mut Self {
        let mut buf = [0; 8];
        LittleEndian::write_u64(&mut buf, value);
        self.0.extend_from_slice(&buf);
        self
    }

    fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.0.extend_from_slice(data);
        self
    }
}

fn relative(field: u64, target: Address) -> i32 {
    target.0.wrapping_sub(field) as i64 as i32
}

/// Value witness table contents
#[derive(Debug, Clone, Copy)]
pub struct ValueWitness {
    pub size: u64,
    pub stride: u64,
    pub alignment: u64,
    pub pod: bool,
}

impl ValueWitness {
    pub fn pod(size: u64, alignment: u64) -> Self {
        let alignment = alignment.max(1);
        Self {
            size,
            stride: size.max(1).div_ceil(alignment) * alignment,
            alignment,
            pod: true,
        }
    }

    pub fn non_pod(size: u64, alignment: u64) -> Self {
        Self {
            pod: false,
            ..Self::pod(size, alignment)
        }
    }
}

/// How a field record names its type
#[derive(Debug, Clone)]
pub enum TypeNameSpec {
    Mangled(Vec<u8>),
    /// Direct reference to a context descriptor followed by `suffix`.
    Symbolic { target: Address, suffix: String },
    /// Reference through a pointer slot holding the descriptor address.
    Indirect { slot: Address, suffix: String },
    /// Enum cases without a payload.
    Missing,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub type_name: TypeNameSpec,
    pub flags: u32,
}

impl FieldSpec {
    pub fn new(name: &str, mangled: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: TypeNameSpec::Mangled(mangled.as_bytes().to_vec()),
            flags: 0,
        }
    }

    pub fn symbolic(name: &str, target: Address, suffix: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: TypeNameSpec::Symbolic {
                target,
                suffix: suffix.to_string(),
            },
            flags: 0,
        }
    }

    pub fn symbolic_via(name: &str, slot: Address, suffix: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: TypeNameSpec::Indirect {
                slot,
                suffix: suffix.to_string(),
            },
            flags: 0,
        }
    }

    pub fn case(name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: TypeNameSpec::Missing,
            flags: 0,
        }
    }

    pub fn var(mut self) -> Self {
        self.flags |= FieldRecordFlags::IS_VAR.bits();
        self
    }

    pub fn artificial(mut self) -> Self {
        self.flags |= FieldRecordFlags::IS_ARTIFICIAL.bits();
        self
    }

    pub fn indirect(mut self) -> Self {
        self.flags |= FieldRecordFlags::IS_INDIRECT_CASE.bits();
        self
    }
}

/// Bump allocator writing runtime records into a snapshot
pub struct LayoutBuilder {
    memory: MemorySnapshot,
    next: u64,
}

impl Default for LayoutBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutBuilder {
    pub fn new() -> Self {
        Self {
            memory: MemorySnapshot::new(),
            next: BASE,
        }
    }

    /// Shares the underlying regions; later allocations stay visible.
    pub fn memory(&self) -> MemorySnapshot {
        self.memory.clone()
    }

    pub fn alloc(&mut self, data: &[u8]) -> Address {
        let address = Address(self.next);
        self.memory.map(address, data);
        let len = (data.len() as u64).max(1);
        self.next += len.div_ceil(16) * 16 + GAP;
        address
    }

    pub fn cstring(&mut self, text: &[u8]) -> Address {
        let mut data = text.to_vec();
        data.push(0);
        self.alloc(&data)
    }

    pub fn pointer_slot(&mut self, target: Address) -> Address {
        self.alloc(&target.0.to_le_bytes())
    }

    /// Point the relative field at `field` to `target`.
    pub fn link(&self, field: Address, target: Address) -> MemoryResult<()> {
        self.memory
            .write_bytes(field, &relative(field.0, target).to_le_bytes())
    }

    pub fn module(&mut self, name: &str) -> Address {
        let name = self.cstring(name.as_bytes());
        let at = self.next;
        let mut record = Record::default();
        record
            .u32(ContextKind::Module.raw())
            .i32(0)
            .i32(relative(at + DESCRIPTOR_NAME as u64, name));
        self.alloc(&record.0)
    }

    /// Nominal descriptor with an empty field descriptor slot.
    pub fn type_descriptor(
        &mut self,
        kind: ContextKind,
        parent: Address,
        name: &str,
        generic_params: u16,
        num_fields: u32,
    ) -> Address {
        let name = self.cstring(name.as_bytes());
        let at = self.next;
        let params = generic_params as u32;

        let mut flags = kind.raw();
        if generic_params > 0 {
            flags |= ContextDescriptorFlags::GENERIC.bits();
        }

        let mut record = Record::default();
        record
            .u32(flags)
            .i32(relative(at + DESCRIPTOR_PARENT as u64, parent))
            .i32(relative(at + DESCRIPTOR_NAME as u64, name))
            .i32(0)
            .i32(0);
        match kind {
            ContextKind::Class => {
                record
                    .i32(0)
                    .u32(2)
                    .u32(CLASS_METADATA_WORDS + params + num_fields)
                    .u32(params + num_fields)
                    .u32(num_fields)
                    .u32(CLASS_METADATA_WORDS + params);
            }
            ContextKind::Enum => {
                record.u32(num_fields).u32(0);
            }
            _ => {
                record.u32(num_fields).u32(VALUE_METADATA_WORDS + params);
            }
        }
        if generic_params > 0 {
            record
                .i32(0)
                .i32(0)
                .u16(generic_params)
                .u16(0)
                .u16(generic_params)
                .u16(0);
        }
        self.alloc(&record.0)
    }

    fn type_name(&mut self, type_name: &TypeNameSpec) -> Option<Address> {
        let (kind, target, suffix) = match type_name {
            TypeNameSpec::Mangled(text) => return Some(self.cstring(text)),
            TypeNameSpec::Missing => return None,
            TypeNameSpec::Symbolic { target, suffix } => (SYMBOLIC_DIRECT_CONTEXT, *target, suffix),
            TypeNameSpec::Indirect { slot, suffix } => (SYMBOLIC_INDIRECT_CONTEXT, *slot, suffix),
        };
        let at = self.next;
        let mut record = Record::default();
        record.0.push(kind);
        record
            .i32(relative(at + 1, target))
            .bytes(suffix.as_bytes())
            .bytes(&[0]);
        Some(self.alloc(&record.0))
    }

    /// Field descriptor for `descriptor`, linked into its fields slot.
    pub fn field_descriptor(
        &mut self,
        descriptor: Address,
        fields: &[FieldSpec],
    ) -> MemoryResult<Address> {
        let names: Vec<(Option<Address>, Address)> = fields
            .iter()
            .map(|field| {
                let ty = self.type_name(&field.type_name);
                (ty, self.cstring(field.name.as_bytes()))
            })
            .collect();

        let at = self.next;
        let mut record = Record::default();
        record
            .i32(0)
            .i32(0)
            .u16(0)
            .u16(FIELD_RECORD_SIZE as u16)
            .u32(fields.len() as u32);
        for (i, (field, (ty, name))) in fields.iter().zip(&names).enumerate() {
            let start = at + (FIELD_DESCRIPTOR_HEADER_SIZE + i * FIELD_RECORD_SIZE) as u64;
            let ty = ty.map_or(0, |ty| relative(start + FIELD_RECORD_TYPE_NAME as u64, ty));
            record
                .u32(field.flags)
                .i32(ty)
                .i32(relative(start + FIELD_RECORD_NAME as u64, *name));
        }

        let field_descriptor = self.alloc(&record.0);
        self.link(Address(descriptor.0 + DESCRIPTOR_FIELDS as u64), field_descriptor)?;
        Ok(field_descriptor)
    }

    pub fn value_witness_table(&mut self, witness: ValueWitness) -> Address {
        let mut flags = ValueWitnessFlags::from_bits_retain((witness.alignment.max(1) - 1) as u32);
        if !witness.pod {
            flags |= ValueWitnessFlags::IS_NON_POD;
        }
        let mut record = Record::default();
        record
            .bytes(&[0; VWT_SIZE as usize])
            .u64(witness.size)
            .u64(witness.stride)
            .u32(flags.bits())
            .u32(0);
        self.alloc(&record.0)
    }

    fn value_metadata(
        &mut self,
        kind: u64,
        descriptor: Address,
        witness: ValueWitness,
        generic_args: &[Address],
        field_offsets: &[u32],
    ) -> Address {
        let table = self.value_witness_table(witness);
        let mut record = Record::default();
        record.u64(table.0).u64(kind).u64(descriptor.0);
        for argument in generic_args {
            record.u64(argument.0);
        }
        for offset in field_offsets {
            record.u32(*offset);
        }
        let region = self.alloc(&record.0);
        Address(region.0 + 8)
    }

    pub fn struct_metadata(
        &mut self,
        descriptor: Address,
        witness: ValueWitness,
        generic_args: &[Address],
        field_offsets: &[u32],
    ) -> Address {
        self.value_metadata(0x200, descriptor, witness, generic_args, field_offsets)
    }

    pub fn enum_metadata(
        &mut self,
        descriptor: Address,
        witness: ValueWitness,
        generic_args: &[Address],
    ) -> Address {
        self.value_metadata(0x201, descriptor, witness, generic_args, &[])
    }

    pub fn class_metadata(
        &mut self,
        descriptor: Address,
        superclass: Option<Address>,
        instance_size: u32,
        generic_args: &[Address],
        field_offsets: &[u64],
    ) -> Address {
        let words = CLASS_METADATA_WORDS as u64 + generic_args.len() as u64 + field_offsets.len() as u64;
        let mut record = Record::default();
        record
            .u64(0)
            .u64(0)
            .u64(superclass.map_or(0, |s| s.0))
            .u64(0)
            .u64(0)
            .u64(0)
            .u32(0)
            .u32(0)
            .u32(instance_size)
            .u16(7)
            .u16(0)
            .u32((words * 8) as u32)
            .u32(16)
            .u64(descriptor.0);
        for argument in generic_args {
            record.u64(argument.0);
        }
        for offset in field_offsets {
            record.u64(*offset);
        }
        let region = self.alloc(&record.0);
        Address(region.0 + 8)
    }

    /// Fieldless stdlib-style struct such as `Swift.Int`.
    pub fn builtin_struct(&mut self, module: Address, name: &str, size: u64) -> Address {
        let descriptor = self.type_descriptor(ContextKind::Struct, module, name, 0, 0);
        self.struct_metadata(descriptor, ValueWitness::pod(size, size.min(8)), &[], &[])
    }

    /// Heap instance: isa, refcount, then `body`.
    pub fn instance(&mut self, metadata: Address, body: &[u8]) -> ObjectHandle {
        let mut record = Record::default();
        record.u64(metadata.0).u64(3).bytes(body);
        let size = record.0.len() as u64;
        ObjectHandle::instance(self.alloc(&record.0), size)
    }

    /// Inline value of the type described by `metadata`.
    pub fn value(&mut self, metadata: Address, bytes: &[u8]) -> ObjectHandle {
        ObjectHandle::value(self.alloc(bytes), bytes.len() as u64, metadata)
    }

    /// Inline words of a small string, `None` past fifteen bytes.
    pub fn small_string(text: &str) -> Option<[u64; 2]> {
        let bytes = text.as_bytes();
        if bytes.len() > STRING_SMALL_CAPACITY {
            return None;
        }
        let mut raw = [0u8; 16];
        raw[..bytes.len()].copy_from_slice(bytes);
        let low = LittleEndian::read_u64(&raw[..8]);
        let high = LittleEndian::read_u64(&raw[8..])
            | ASCII_SMALL_STRING
            | ((bytes.len() as u64) << STRING_SMALL_COUNT_SHIFT);
        Some([low, high])
    }

    /// Words of a native string whose bytes live in a separate storage object.
    pub fn large_string(&mut self, text: &str) -> [u64; 2] {
        let mut record = Record::default();
        record
            .bytes(&[0; STRING_LARGE_BYTES_OFFSET as usize])
            .bytes(text.as_bytes())
            .bytes(&[0]);
        let storage = self.alloc(&record.0);
        [text.len() as u64 & STRING_LARGE_COUNT_MASK, storage.0]
    }

    /// Contents of a weak slot: a tagged side-table pointer, or zero.
    pub fn weak_slot(&mut self, object: Option<Address>, deiniting: bool) -> u64 {
        let Some(object) = object else {
            return 0;
        };
        let refcount = if deiniting { REFCOUNT_DEINITING_BIT } else { 0 };
        let mut record = Record::default();
        record.u64(object.0).u64(refcount | 2);
        self.alloc(&record.0).0 | 1
    }
}

/// Little-endian bytes of consecutive words, for instance bodies.
pub fn words(values: &[u64]) -> Vec<u8> {
    let mut record = Record::default();
    for value in values {
        record.u64(*value);
    }
    record.0
}

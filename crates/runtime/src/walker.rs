//! Metadata walker
//!
//! Follows runtime metadata to a nominal type descriptor and its field
//! descriptor. Every pointer is resolved relative to the field it was read
//! from and every record is fetched with one bounds-checked read before any
//! of it is interpreted.

use crate::abi::*;
use byteorder::{ByteOrder, LittleEndian};
use lens_core::{
    Address, BuiltinType, DeferredType, DemangledName, Error, FieldRecord, FieldTypeRef,
    InspectorCache, LayoutVersion, MetadataHandle, NameKind, ObjectHandle, ReferenceStorage,
    Result, TypeDescriptor, TypeIdentity, TypeKind, ValueLayout, WalkLimits,
};
use lens_demangle::{Demangler, SymbolicResolver};
use lens_memory::{resolve_relative, MemoryError, MemoryReader, MemoryResult, RecordReader};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Name given to generic arguments that could not be walked.
pub const UNRESOLVED: &str = "<unresolved>";

/// A nominal context descriptor that passed validation
#[derive(Debug, Clone)]
struct NominalDescriptor {
    address: Address,
    kind: ContextKind,
    name: String,
    module: String,
    context: Vec<String>,
    field_descriptor: Option<Address>,
    num_fields: u32,
    /// In words from the metadata address.
    field_offset_vector: u64,
    /// In words from the metadata address.
    generic_argument_offset: u64,
    generic_parameter_count: u16,
}

impl NominalDescriptor {
    fn name_kind(&self) -> NameKind {
        match self.kind {
            ContextKind::Class => NameKind::Class,
            ContextKind::Struct => NameKind::Struct,
            ContextKind::Enum => NameKind::Enum,
            ContextKind::Protocol => NameKind::Protocol,
            _ => NameKind::Unknown,
        }
    }

    fn demangled_name(&self, arguments: Vec<DemangledName>) -> DemangledName {
        DemangledName::nominal(
            Some(self.module.clone()),
            self.context.clone(),
            self.name.clone(),
            self.name_kind(),
        )
        .with_generic_arguments(arguments)
    }
}

/// Walks foreign runtime metadata through a [`MemoryReader`]
pub struct MetadataWalker<M> {
    memory: M,
    demangler: Arc<Demangler>,
    limits: WalkLimits,
}

impl<M: MemoryReader> MetadataWalker<M> {
    pub fn new(memory: M, demangler: Arc<Demangler>) -> Self {
        let limits = demangler.config().limits;
        Self {
            memory,
            demangler,
            limits,
        }
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn demangler(&self) -> &Arc<Demangler> {
        &self.demangler
    }

    pub fn cache(&self) -> &Arc<InspectorCache> {
        self.demangler.cache()
    }

    pub fn limits(&self) -> &WalkLimits {
        &self.limits
    }

    /// Metadata of a live object: the handle's own for values, the isa word for instances.
    pub fn metadata_of(&self, object: &ObjectHandle) -> Result<MetadataHandle> {
        if let Some(metadata) = object.metadata {
            return Ok(MetadataHandle {
                address: metadata,
                layout: object.layout,
            });
        }
        if object.size < 8 {
            return Err(reject(object.address, "instance is smaller than its header"));
        }
        let isa = self
            .memory
            .read_pointer(object.address)
            .map_err(|e| reject(object.address, format!("instance header unreadable: {}", e)))?;
        if isa.is_null() {
            return Err(reject(object.address, "instance has a null isa"));
        }
        Ok(MetadataHandle {
            address: isa,
            layout: object.layout,
        })
    }

    /// Type descriptor of a live object
    pub fn type_of(&self, object: &ObjectHandle) -> Result<Arc<TypeDescriptor>> {
        self.type_descriptor(self.metadata_of(object)?)
    }

    /// Walk type metadata, consulting the cache first
    pub fn type_descriptor(&self, handle: MetadataHandle) -> Result<Arc<TypeDescriptor>> {
        match handle.layout {
            LayoutVersion::V5 => self.walk_cached(handle.address, 0),
        }
    }

    fn walk_cached(&self, address: Address, depth: usize) -> Result<Arc<TypeDescriptor>> {
        let identity = TypeIdentity::Metadata(address);
        if let Some(hit) = self.cache().get_type(&identity) {
            trace!(metadata = %address, "Type cache hit");
            return Ok(hit);
        }
        if depth > self.limits.max_generic_depth + self.limits.max_parent_depth {
            return Err(reject(address, "metadata nesting exceeds walk limits"));
        }

        debug!(metadata = %address, depth, "Walking type metadata");
        let descriptor = self.walk_metadata(address, depth)?;
        Ok(self.cache().insert_type(identity, Arc::new(descriptor)))
    }

    fn walk_metadata(&self, address: Address, depth: usize) -> Result<TypeDescriptor> {
        let identity = TypeIdentity::Metadata(address);
        let kind_word = self
            .memory
            .read_u64(address)
            .map_err(|e| reject(address, format!("metadata header unreadable: {}", e)))?;
        let kind = MetadataKind::from_word(kind_word)
            .ok_or_else(|| reject(address, format!("unrecognized metadata kind {:#x}", kind_word)))?;

        if !kind.is_nominal() {
            let name = match kind.type_kind() {
                TypeKind::Protocol => DemangledName::nominal(
                    None,
                    Vec::new(),
                    kind.structural_name(),
                    NameKind::Protocol,
                ),
                _ => DemangledName::unknown(kind.structural_name()),
            };
            let layout = self.value_layout(address).ok();
            return Ok(
                TypeDescriptor::new(identity, kind.type_kind(), name, None, None, 0, 0)
                    .with_layout(layout),
            );
        }

        let is_class = kind == MetadataKind::Class;
        let header_size = if is_class {
            CLASS_HEADER_SIZE
        } else {
            VALUE_HEADER_SIZE
        };
        let header = RecordReader::fetch(&self.memory, address, header_size)
            .map_err(|e| reject(address, format!("metadata header unreadable: {}", e)))?;
        let description_offset = if is_class {
            CLASS_DESCRIPTION
        } else {
            VALUE_DESCRIPTION as usize
        };
        let description = header
            .u64_at(description_offset)
            .map(Address)
            .map_err(|e| reject(address, e.to_string()))?;
        if description.is_null() {
            return Err(reject(address, "metadata has no type descriptor"));
        }

        let nominal = self.read_descriptor(description, Some(kind))?;
        let arguments = self.generic_argument_names(address, &nominal, depth)?;

        let (layout, superclass) = if is_class {
            let instance_size = header.u32_at(CLASS_INSTANCE_SIZE).unwrap_or(0) as u64;
            let align_mask = header.u16_at(CLASS_INSTANCE_ALIGN_MASK).unwrap_or(0) as u64;
            let layout = ValueLayout {
                size: instance_size,
                stride: instance_size,
                alignment: align_mask + 1,
                is_pod: false,
                is_bitwise_takable: true,
            };
            let superclass = header
                .u64_at(CLASS_SUPERCLASS)
                .ok()
                .map(Address)
                .filter(|s| !s.is_null())
                .and_then(|s| self.walk_superclass(s, depth));
            (Some(layout), superclass)
        } else {
            let layout = self
                .value_layout(address)
                .map_err(|e| reject(address, format!("value witness table unreadable: {}", e)))?;
            (Some(layout), None)
        };

        Ok(TypeDescriptor::new(
            identity,
            kind.type_kind(),
            nominal.demangled_name(arguments),
            Some(nominal.address),
            nominal.field_descriptor,
            nominal.generic_parameter_count as u32,
            nominal.num_fields,
        )
        .with_layout(layout)
        .with_superclass(superclass))
    }

    fn walk_superclass(&self, superclass: Address, depth: usize) -> Option<Arc<TypeDescriptor>> {
        if depth + 1 >= self.limits.max_parent_depth {
            debug!(metadata = %superclass, "Superclass chain truncated");
            return None;
        }
        match self.walk_cached(superclass, depth + 1) {
            Ok(parent) if parent.kind == TypeKind::Class => Some(parent),
            Ok(_) => None,
            Err(err) => {
                // Roots such as NSObject carry no native descriptor.
                debug!(metadata = %superclass, error = %err, "Superclass not introspectable");
                None
            }
        }
    }

    fn value_layout(&self, metadata: Address) -> MemoryResult<ValueLayout> {
        let slot = metadata
            .offset(VALUE_WITNESS_POINTER)
            .ok_or(MemoryError::Overflow(metadata))?;
        let table = self.memory.read_pointer(slot)?;
        let record = RecordReader::fetch(&self.memory, table, VWT_RECORD_SIZE)?;
        let flags = ValueWitnessFlags::from_bits_retain(record.u32_at(VWT_FLAGS as usize)?);
        Ok(ValueLayout {
            size: record.u64_at(VWT_SIZE as usize)?,
            stride: record.u64_at(VWT_STRIDE as usize)?,
            alignment: flags.alignment(),
            is_pod: !flags.contains(ValueWitnessFlags::IS_NON_POD),
            is_bitwise_takable: !flags.contains(ValueWitnessFlags::IS_NON_BITWISE_TAKABLE),
        })
    }

    /// Validates a nominal type descriptor: flags, name, parent chain, generic header.
    fn read_descriptor(
        &self,
        address: Address,
        metadata: Option<MetadataKind>,
    ) -> Result<NominalDescriptor> {
        let bad = |e: MemoryError| reject(address, format!("type descriptor unreadable: {}", e));

        let flags = ContextDescriptorFlags::from_bits_retain(self.memory.read_u32(address).map_err(bad)?);
        if flags.version() != 0 {
            return Err(reject(
                address,
                format!("unsupported descriptor version {}", flags.version()),
            ));
        }
        let kind = ContextKind::from_flags(flags)
            .filter(ContextKind::is_type)
            .ok_or_else(|| reject(address, "not a nominal type descriptor"))?;
        if let Some(metadata) = metadata {
            if !kind.matches(metadata) {
                return Err(reject(
                    address,
                    format!("{:?} descriptor reached from {:?} metadata", kind, metadata),
                ));
            }
        }

        let generic_header = kind.header_size();
        let size = if flags.is_generic() {
            generic_header + GENERIC_HEADER_SIZE
        } else {
            generic_header
        };
        let record = RecordReader::fetch(&self.memory, address, size).map_err(bad)?;

        let name_address = record
            .relative_at(DESCRIPTOR_NAME)
            .map_err(bad)?
            .ok_or_else(|| reject(address, "type descriptor has no name"))?;
        let name = self
            .read_identifier(name_address)
            .ok_or_else(|| reject(address, "type name is not a valid identifier"))?;
        let (module, context) = self.context_path(address)?;

        let (num_fields, field_offset_vector, generic_argument_offset) = match kind {
            ContextKind::Struct => (
                record.u32_at(STRUCT_NUM_FIELDS).map_err(bad)?,
                record.u32_at(STRUCT_FIELD_OFFSET_VECTOR).map_err(bad)? as u64,
                VALUE_GENERIC_ARGUMENTS / 8,
            ),
            ContextKind::Enum => {
                let payload = record.u32_at(ENUM_NUM_PAYLOAD_CASES).map_err(bad)? & ENUM_PAYLOAD_CASES_MASK;
                let empty = record.u32_at(ENUM_NUM_EMPTY_CASES).map_err(bad)?;
                (payload.saturating_add(empty), 0, VALUE_GENERIC_ARGUMENTS / 8)
            }
            _ => {
                let positive = record.u32_at(CLASS_POSITIVE_SIZE).map_err(bad)?;
                let immediate = record.u32_at(CLASS_IMMEDIATE_MEMBERS).map_err(bad)?;
                (
                    record.u32_at(CLASS_NUM_FIELDS).map_err(bad)?,
                    record.u32_at(CLASS_FIELD_OFFSET_VECTOR).map_err(bad)? as u64,
                    positive.saturating_sub(immediate) as u64,
                )
            }
        };

        let generic_parameter_count = if flags.is_generic() {
            record
                .u16_at(generic_header + GENERIC_NUM_PARAMS)
                .map_err(bad)?
        } else {
            0
        };
        if generic_parameter_count > MAX_GENERIC_PARAMETERS {
            return Err(reject(
                address,
                format!("{} generic parameters", generic_parameter_count),
            ));
        }

        Ok(NominalDescriptor {
            address,
            kind,
            name,
            module,
            context,
            field_descriptor: record.relative_at(DESCRIPTOR_FIELDS).map_err(bad)?,
            num_fields,
            field_offset_vector,
            generic_argument_offset,
            generic_parameter_count,
        })
    }

    /// Module name and enclosing types, outermost first.
    fn context_path(&self, descriptor: Address) -> Result<(String, Vec<String>)> {
        let mut context = Vec::new();
        let mut current = descriptor;

        for _ in 0..self.limits.max_parent_depth {
            let parent = current
                .checked_add(DESCRIPTOR_PARENT as u64)
                .ok_or_else(|| reject(descriptor, "parent field overflows"))
                .and_then(|field| {
                    self.read_indirectable(field)
                        .map_err(|e| reject(descriptor, format!("parent unreadable: {}", e)))
                })?
                .ok_or_else(|| reject(descriptor, "parent chain ends before a module"))?;

            let flags = self
                .memory
                .read_u32(parent)
                .map(ContextDescriptorFlags::from_bits_retain)
                .map_err(|e| reject(descriptor, format!("parent unreadable: {}", e)))?;

            match ContextKind::from_flags(flags) {
                Some(ContextKind::Module) => {
                    let module = self
                        .context_name(parent)
                        .ok_or_else(|| reject(descriptor, "module name is not a valid identifier"))?;
                    context.reverse();
                    return Ok((module, context));
                }
                Some(kind) if kind.is_type() || kind == ContextKind::Protocol => {
                    let name = self
                        .context_name(parent)
                        .ok_or_else(|| reject(descriptor, "parent name is not a valid identifier"))?;
                    context.push(name);
                }
                Some(ContextKind::Extension | ContextKind::Anonymous) => {}
                _ => return Err(reject(descriptor, "unexpected context in parent chain")),
            }
            current = parent;
        }

        Err(reject(descriptor, "parent chain exceeds the depth limit"))
    }

    fn context_name(&self, context: Address) -> Option<String> {
        let field = context.checked_add(DESCRIPTOR_NAME as u64)?;
        let name = self.memory.read_relative(field).ok()??;
        self.read_identifier(name)
    }

    /// Relative pointer whose low bit marks an indirection through a pointer slot.
    fn read_indirectable(&self, field: Address) -> MemoryResult<Option<Address>> {
        let offset = self.memory.read_i32(field)?;
        if offset & 1 == 0 {
            return resolve_relative(field, offset);
        }
        match resolve_relative(field, offset & !1)? {
            Some(slot) => {
                let target = self.memory.read_pointer(slot)?;
                Ok((!target.is_null()).then_some(target))
            }
            None => Ok(None),
        }
    }

    fn read_identifier(&self, address: Address) -> Option<String> {
        let bytes = self
            .memory
            .read_cstring(address, self.limits.max_name_length)
            .ok()?;
        let valid = !bytes.is_empty()
            && !bytes[0].is_ascii_digit()
            && bytes.iter().all(u8::is_ascii_graphic);
        valid.then(|| String::from_utf8_lossy(&bytes).into_owned())
    }

    fn generic_argument_metadata(
        &self,
        metadata: Address,
        nominal: &NominalDescriptor,
    ) -> MemoryResult<Vec<Address>> {
        let count = nominal.generic_parameter_count as usize;
        if count == 0 {
            return Ok(Vec::new());
        }
        let start = nominal
            .generic_argument_offset
            .checked_mul(8)
            .and_then(|offset| metadata.checked_add(offset))
            .ok_or(MemoryError::Overflow(metadata))?;
        let words = self.memory.read_bytes(start, count * 8)?;
        Ok(words
            .chunks_exact(8)
            .map(|word| Address(LittleEndian::read_u64(word)))
            .collect())
    }

    fn generic_argument_names(
        &self,
        metadata: Address,
        nominal: &NominalDescriptor,
        depth: usize,
    ) -> Result<Vec<DemangledName>> {
        let arguments = self
            .generic_argument_metadata(metadata, nominal)
            .map_err(|e| reject(metadata, format!("generic arguments unreadable: {}", e)))?;

        Ok(arguments
            .into_iter()
            .map(|argument| {
                if depth + 1 > self.limits.max_generic_depth {
                    return DemangledName::unknown(UNRESOLVED);
                }
                match self.walk_cached(argument, depth + 1) {
                    Ok(ty) => ty.name.clone(),
                    Err(err) => {
                        debug!(metadata = %argument, error = %err, "Generic argument not resolved");
                        DemangledName::unknown(UNRESOLVED)
                    }
                }
            })
            .collect())
    }

    /// Descriptor reached without metadata, as by a symbolic reference
    pub fn descriptor_type(&self, address: Address) -> Result<Arc<TypeDescriptor>> {
        let identity = TypeIdentity::Descriptor(address);
        if let Some(hit) = self.cache().get_type(&identity) {
            return Ok(hit);
        }
        let nominal = self.read_descriptor(address, None)?;
        let descriptor = TypeDescriptor::new(
            identity.clone(),
            nominal.kind.type_kind(),
            nominal.demangled_name(Vec::new()),
            Some(address),
            nominal.field_descriptor,
            nominal.generic_parameter_count as u32,
            nominal.num_fields,
        );
        Ok(self.cache().insert_type(identity, Arc::new(descriptor)))
    }

    /// Stored fields in declaration order. Artificial fields are skipped.
    pub fn fields(&self, ty: &TypeDescriptor) -> Result<Arc<Vec<FieldRecord>>> {
        if let Some(hit) = self.cache().get_fields(&ty.identity) {
            return Ok(hit);
        }
        if !ty.kind.carries_fields() {
            return Err(Error::no_field_info(format!("{} types have no stored fields", ty.kind)));
        }
        let field_descriptor = ty
            .field_descriptor()
            .ok_or_else(|| Error::no_field_info("type has no field descriptor"))?;
        let descriptor = ty
            .descriptor
            .ok_or_else(|| Error::no_field_info("type has no descriptor"))?;
        let nominal = self
            .read_descriptor(descriptor, None)
            .map_err(|e| Error::no_field_info(e.to_string()))?;

        let bad = |e: MemoryError| no_fields(field_descriptor, format!("field descriptor unreadable: {}", e));
        let header = RecordReader::fetch(&self.memory, field_descriptor, FIELD_DESCRIPTOR_HEADER_SIZE)
            .map_err(bad)?;
        let record_size = header.u16_at(FIELD_DESCRIPTOR_RECORD_SIZE).map_err(bad)? as usize;
        if record_size != FIELD_RECORD_SIZE {
            return Err(no_fields(
                field_descriptor,
                format!("unexpected field record size {}", record_size),
            ));
        }
        let count = header.u32_at(FIELD_DESCRIPTOR_COUNT).map_err(bad)? as usize;
        if count > self.limits.max_fields {
            return Err(no_fields(field_descriptor, format!("{} fields exceeds the limit", count)));
        }
        if ty.kind != TypeKind::Enum && count != nominal.num_fields as usize {
            return Err(no_fields(
                field_descriptor,
                format!("{} field records but {} declared fields", count, nominal.num_fields),
            ));
        }

        let offsets = match ty.kind {
            TypeKind::Enum => vec![0; count],
            _ => self.field_offsets(ty, &nominal, count)?,
        };

        let records_start = field_descriptor
            .checked_add(FIELD_DESCRIPTOR_HEADER_SIZE as u64)
            .ok_or_else(|| no_fields(field_descriptor, "record array overflows"))?;
        let records = RecordReader::fetch(&self.memory, records_start, count * FIELD_RECORD_SIZE)
            .map_err(bad)?;

        let mut fields = Vec::with_capacity(count);
        for (i, byte_offset) in offsets.into_iter().enumerate() {
            let base = i * FIELD_RECORD_SIZE;
            let flags = FieldRecordFlags::from_bits_retain(records.u32_at(base).map_err(bad)?);
            if flags.contains(FieldRecordFlags::IS_ARTIFICIAL) {
                continue;
            }

            let name = records
                .relative_at(base + FIELD_RECORD_NAME)
                .map_err(bad)?
                .and_then(|address| self.read_field_name(address))
                .ok_or_else(|| no_fields(field_descriptor, format!("field {} has no readable name", i)))?;

            let type_name = records
                .relative_at(base + FIELD_RECORD_TYPE_NAME)
                .map_err(bad)?;
            let (raw, address) = match type_name {
                Some(address) => {
                    let raw = self
                        .read_mangled_name(address)
                        .map_err(|e| no_fields(address, format!("type of {} unreadable: {}", name, e)))?;
                    (raw, address)
                }
                // Payload-less enum cases carry no type.
                None if ty.kind == TypeKind::Enum => (Vec::new(), Address::ZERO),
                None => return Err(no_fields(field_descriptor, format!("field {} has no type", name))),
            };

            let field = self.classify_field(
                name,
                fields.len(),
                raw,
                address,
                byte_offset,
                flags,
                ty,
            )?;
            fields.push(field);
        }

        debug!(
            type_name = %ty.name,
            fields = fields.len(),
            "Walked field descriptor"
        );
        Ok(self.cache().insert_fields(ty.identity.clone(), Arc::new(fields)))
    }

    fn field_offsets(
        &self,
        ty: &TypeDescriptor,
        nominal: &NominalDescriptor,
        count: usize,
    ) -> Result<Vec<u64>> {
        let metadata = ty
            .metadata_address()
            .ok_or_else(|| Error::no_field_info("field offsets need runtime metadata"))?;
        let layout = ty
            .layout
            .ok_or_else(|| Error::no_field_info("type has no known layout"))?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let vector = nominal
            .field_offset_vector
            .checked_mul(8)
            .and_then(|offset| metadata.checked_add(offset))
            .ok_or_else(|| no_fields(metadata, "field offset vector overflows"))?;
        let is_class = ty.kind == TypeKind::Class;
        let width = if is_class { 8 } else { 4 };
        let bytes = self
            .memory
            .read_bytes(vector, count * width)
            .map_err(|e| no_fields(metadata, format!("field offsets unreadable: {}", e)))?;

        let offsets: Vec<u64> = if is_class {
            bytes.chunks_exact(8).map(LittleEndian::read_u64).collect()
        } else {
            bytes
                .chunks_exact(4)
                .map(|word| LittleEndian::read_u32(word) as u64)
                .collect()
        };

        let mut previous = 0;
        for &offset in &offsets {
            if offset > layout.size {
                return Err(no_fields(
                    metadata,
                    format!("field offset {} outside a {}-byte layout", offset, layout.size),
                ));
            }
            if !is_class && offset < previous {
                return Err(no_fields(metadata, "struct field offsets decrease"));
            }
            previous = offset;
        }
        Ok(offsets)
    }

    #[allow(clippy::too_many_arguments)]
    fn classify_field(
        &self,
        name: String,
        index: usize,
        raw: Vec<u8>,
        address: Address,
        byte_offset: u64,
        flags: FieldRecordFlags,
        owner: &TypeDescriptor,
    ) -> Result<FieldRecord> {
        let storage = reference_storage(&raw);
        let demangled = if raw.is_empty() {
            None
        } else {
            let resolver = MetadataResolver {
                walker: self,
                base: address,
            };
            match self.demangler.demangle_type_with(&raw, Some(&resolver)) {
                Ok(name) => Some(name),
                Err(err) => {
                    debug!(field = %name, error = %err, "Field type not demangled");
                    None
                }
            }
        };

        let builtin = demangled
            .as_ref()
            .and_then(builtin_of)
            .filter(|_| storage == ReferenceStorage::Strong);
        let is_reference =
            storage != ReferenceStorage::Strong || demangled.as_ref().is_some_and(is_class_reference);

        if let (Some(builtin), Some(layout)) = (builtin, owner.layout) {
            if byte_offset + builtin.size() > layout.size {
                return Err(no_fields(
                    address,
                    format!("field {} overruns the {}-byte layout", name, layout.size),
                ));
            }
        }

        let type_ref = match builtin {
            Some(builtin) => FieldTypeRef::Builtin(builtin),
            None => FieldTypeRef::Deferred(DeferredType {
                raw: Arc::from(raw.as_slice()),
                address,
            }),
        };

        Ok(FieldRecord {
            name,
            index,
            type_ref,
            mangled_type_name: mangled_text(&raw, address),
            byte_offset,
            storage,
            is_weak: storage == ReferenceStorage::Weak,
            is_reference,
            is_var: flags.contains(FieldRecordFlags::IS_VAR),
            is_indirect: flags.contains(FieldRecordFlags::IS_INDIRECT_CASE),
            owner: owner.identity.clone(),
        })
    }

    fn read_field_name(&self, address: Address) -> Option<String> {
        let bytes = self
            .memory
            .read_cstring(address, self.limits.max_name_length)
            .ok()?;
        let valid = !bytes.is_empty() && bytes.iter().all(u8::is_ascii_graphic);
        valid.then(|| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Raw type-name bytes, symbolic reference payloads included, without the terminator.
    fn read_mangled_name(&self, address: Address) -> MemoryResult<Vec<u8>> {
        let mut raw = Vec::new();
        loop {
            if raw.len() > self.limits.max_name_length {
                return Err(MemoryError::InvalidString(address));
            }
            let cursor = address
                .checked_add(raw.len() as u64)
                .ok_or(MemoryError::Overflow(address))?;
            let byte = self.memory.read_u8(cursor)?;
            if byte == 0 {
                return Ok(raw);
            }
            raw.push(byte);
            if let Some(len) = symbolic_payload_len(byte) {
                let payload = cursor.checked_add(1).ok_or(MemoryError::Overflow(cursor))?;
                raw.extend(self.memory.read_bytes(payload, len)?);
            }
        }
    }

    fn symbolic_target(&self, base: Address, kind: u8, position: usize, payload: &[u8]) -> Option<Address> {
        if !matches!(kind, SYMBOLIC_DIRECT_CONTEXT | SYMBOLIC_INDIRECT_CONTEXT) || payload.len() != 4 {
            return None;
        }
        let field = base.checked_add(position as u64 + 1)?;
        let target = resolve_relative(field, LittleEndian::read_i32(payload)).ok()??;
        if kind == SYMBOLIC_INDIRECT_CONTEXT {
            let pointer = self.memory.read_pointer(target).ok()?;
            return (!pointer.is_null()).then_some(pointer);
        }
        Some(target)
    }

    /// Resolve a field's type on request. Results are cached by identity.
    pub fn resolve_field_type(&self, field: &FieldRecord) -> Result<Arc<TypeDescriptor>> {
        match &field.type_ref {
            FieldTypeRef::Builtin(builtin) => {
                let layout = ValueLayout {
                    size: builtin.size(),
                    stride: builtin.size(),
                    alignment: builtin.alignment(),
                    is_pod: builtin.is_trivial(),
                    is_bitwise_takable: true,
                };
                let name = builtin.demangled_name();
                self.symbol_type(name.to_string(), name, Some(layout))
            }
            FieldTypeRef::Deferred(deferred) => self.resolve_deferred(deferred, &field.owner),
        }
    }

    fn resolve_deferred(
        &self,
        deferred: &DeferredType,
        owner: &TypeIdentity,
    ) -> Result<Arc<TypeDescriptor>> {
        if deferred.raw.is_empty() {
            return Err(Error::not_introspectable("enum case has no payload type"));
        }

        // A lone reference to a context descriptor names the type directly.
        if deferred.raw.len() == 5 {
            if let Some(target) =
                self.symbolic_target(deferred.address, deferred.raw[0], 0, &deferred.raw[1..])
            {
                if let Some(owner_type) = self.owner_type(owner) {
                    if owner_type.descriptor == Some(target) && owner_type.generic_parameter_count == 0 {
                        return Ok(owner_type);
                    }
                }
                return self.descriptor_type(target);
            }
        }

        let resolver = MetadataResolver {
            walker: self,
            base: deferred.address,
        };
        let name = self
            .demangler
            .demangle_type_with(&deferred.raw, Some(&resolver))
            .map_err(|e| Error::not_introspectable(format!("field type: {}", e)))?;

        if let Some((depth, index)) = name.as_generic_parameter() {
            return self.generic_argument_type(owner, depth, index);
        }

        self.symbol_type(mangled_text(&deferred.raw, deferred.address), name, None)
    }

    pub(crate) fn owner_type(&self, owner: &TypeIdentity) -> Option<Arc<TypeDescriptor>> {
        match owner {
            TypeIdentity::Metadata(address) => self.walk_cached(*address, 0).ok(),
            TypeIdentity::Descriptor(address) => self.descriptor_type(*address).ok(),
            TypeIdentity::Symbol(_) => None,
        }
    }

    fn generic_argument_type(
        &self,
        owner: &TypeIdentity,
        depth: u32,
        index: u32,
    ) -> Result<Arc<TypeDescriptor>> {
        if depth != 0 {
            return Err(Error::not_introspectable(
                "generic parameters of enclosing types are not supported",
            ));
        }
        let TypeIdentity::Metadata(metadata) = owner else {
            return Err(Error::not_introspectable(
                "generic parameter without instantiated metadata",
            ));
        };
        let owner_type = self.walk_cached(*metadata, 0)?;
        let descriptor = owner_type
            .descriptor
            .ok_or_else(|| Error::not_introspectable("owner has no descriptor"))?;
        let nominal = self.read_descriptor(descriptor, None)?;
        let arguments = self
            .generic_argument_metadata(*metadata, &nominal)
            .map_err(|e| reject(*metadata, format!("generic arguments unreadable: {}", e)))?;
        let argument = arguments
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::not_introspectable(format!("generic parameter {} out of range", index)))?;
        self.walk_cached(argument, 1)
    }

    fn symbol_type(
        &self,
        key: String,
        name: DemangledName,
        layout: Option<ValueLayout>,
    ) -> Result<Arc<TypeDescriptor>> {
        let identity = TypeIdentity::Symbol(Arc::from(key));
        if let Some(hit) = self.cache().get_type(&identity) {
            return Ok(hit);
        }
        let kind = match name.kind {
            NameKind::Struct => TypeKind::Struct,
            NameKind::Class => TypeKind::Class,
            NameKind::Enum => TypeKind::Enum,
            NameKind::Protocol => TypeKind::Protocol,
            _ => TypeKind::Opaque,
        };
        let descriptor =
            TypeDescriptor::new(identity.clone(), kind, name, None, None, 0, 0).with_layout(layout);
        Ok(self.cache().insert_type(identity, Arc::new(descriptor)))
    }
}

impl<M> std::fmt::Debug for MetadataWalker<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataWalker")
            .field("limits", &self.limits)
            .finish()
    }
}

/// Resolves symbolic references relative to where the name bytes were read
struct MetadataResolver<'w, M> {
    walker: &'w MetadataWalker<M>,
    base: Address,
}

impl<M: MemoryReader> SymbolicResolver for MetadataResolver<'_, M> {
    fn resolve(&self, kind: u8, position: usize, payload: &[u8]) -> Option<DemangledName> {
        let target = self.walker.symbolic_target(self.base, kind, position, payload)?;
        let ty = self.walker.descriptor_type(target).ok()?;
        Some(ty.name.clone())
    }
}

fn reject(address: Address, reason: impl Into<String>) -> Error {
    let reason = reason.into();
    warn!(%address, %reason, "Type not introspectable");
    Error::NotIntrospectable(reason)
}

fn no_fields(address: Address, reason: impl Into<String>) -> Error {
    let reason = reason.into();
    warn!(%address, %reason, "No field information");
    Error::NoFieldInfo(reason)
}

fn reference_storage(raw: &[u8]) -> ReferenceStorage {
    match raw {
        [.., b'X', b'w'] => ReferenceStorage::Weak,
        [.., b'X', b'o'] => ReferenceStorage::Unowned,
        [.., b'X', b'u'] => ReferenceStorage::Unmanaged,
        _ => ReferenceStorage::Strong,
    }
}

fn builtin_of(name: &DemangledName) -> Option<BuiltinType> {
    if !name.context.is_empty() || !name.generic_arguments.is_empty() {
        return None;
    }
    BuiltinType::from_qualified(name.module.as_deref()?, &name.type_name)
}

/// Class instances, `AnyObject`, and optionals of either are stored as one pointer.
pub(crate) fn is_class_reference(name: &DemangledName) -> bool {
    match name.kind {
        NameKind::Class => true,
        NameKind::Protocol => name.module.is_none() && name.type_name == "AnyObject",
        _ => name.is_optional() && is_class_reference(&name.generic_arguments[0]),
    }
}

/// Printable type name: symbolic references become `$<address>`.
fn mangled_text(raw: &[u8], address: Address) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let byte = raw[i];
        match symbolic_payload_len(byte).filter(|len| i + 1 + len <= raw.len()) {
            Some(4) => {
                let offset = LittleEndian::read_i32(&raw[i + 1..i + 5]);
                let target = address
                    .checked_add(i as u64 + 1)
                    .and_then(|field| field.offset(offset as i64));
                match target {
                    Some(target) => text.push_str(&format!("${}", target)),
                    None => text.push_str("$?"),
                }
                i += 5;
            }
            Some(len) => {
                let value = LittleEndian::read_u64(&raw[i + 1..i + 1 + len]);
                text.push_str(&format!("${}", Address(value)));
                i += 1 + len;
            }
            None => {
                text.push(byte as char);
                i += 1;
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FieldSpec, LayoutBuilder, ValueWitness};
    use lens_core::InspectorConfig;
    use lens_memory::MemorySnapshot;
    use std::sync::Mutex;

    fn walker(memory: MemorySnapshot) -> MetadataWalker<MemorySnapshot> {
        let demangler = Demangler::new(Arc::new(InspectorCache::new()), InspectorConfig::default());
        MetadataWalker::new(memory, Arc::new(demangler))
    }

    /// `main.Pair<T> { let first: T; var second: Int }` instantiated with `Int`.
    fn pair_of_int(builder: &mut LayoutBuilder) -> Address {
        let swift = builder.module("Swift");
        let int = builder.builtin_struct(swift, "Int", 8);
        let main = builder.module("main");
        let pair = builder.type_descriptor(ContextKind::Struct, main, "Pair", 1, 2);
        builder
            .field_descriptor(
                pair,
                &[FieldSpec::new("first", "x"), FieldSpec::new("second", "Si").var()],
            )
            .unwrap();
        builder.struct_metadata(pair, ValueWitness::pod(16, 8), &[int], &[0, 8])
    }

    #[test]
    fn test_generic_struct_fields() {
        let mut builder = LayoutBuilder::new();
        let metadata = pair_of_int(&mut builder);
        let walker = walker(builder.memory());

        let pair = walker.type_descriptor(MetadataHandle::new(metadata)).unwrap();
        assert_eq!(pair.kind, TypeKind::Struct);
        assert_eq!(pair.name.to_string(), "main.Pair<Swift.Int>");
        assert_eq!(pair.generic_parameter_count, 1);
        assert_eq!(pair.layout.map(|l| l.size), Some(16));

        let fields = walker.fields(&pair).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "first");
        assert!(matches!(fields[0].type_ref, FieldTypeRef::Deferred(_)));
        assert_eq!(fields[1].builtin(), Some(BuiltinType::Int));
        assert!(fields[1].is_var && !fields[0].is_var);

        let first = walker.resolve_field_type(&fields[0]).unwrap();
        assert_eq!(first.name.to_string(), "Swift.Int");
        let first_end = fields[0].byte_offset + first.layout.unwrap().size;
        assert!(first_end <= fields[1].byte_offset);
        assert!(fields[1].byte_offset + BuiltinType::Int.size() <= 16);
    }

    #[test]
    fn test_class_fields_and_superclass() {
        let mut builder = LayoutBuilder::new();
        let main = builder.module("main");
        let base = builder.type_descriptor(ContextKind::Class, main, "Base", 0, 1);
        builder
            .field_descriptor(base, &[FieldSpec::new("id", "Si")])
            .unwrap();
        let base_metadata = builder.class_metadata(base, None, 24, &[], &[16]);

        let view = builder.type_descriptor(ContextKind::Class, main, "View", 0, 2);
        builder
            .field_descriptor(
                view,
                &[
                    FieldSpec::new("title", "SS").var(),
                    FieldSpec::symbolic("owner", base, "SgXw").var(),
                ],
            )
            .unwrap();
        let view_metadata = builder.class_metadata(view, Some(base_metadata), 48, &[], &[24, 40]);
        let walker = walker(builder.memory());

        let ty = walker.type_descriptor(MetadataHandle::new(view_metadata)).unwrap();
        assert_eq!(ty.kind, TypeKind::Class);
        let names: Vec<String> = ty.ancestors().map(|t| t.name.to_string()).collect();
        assert_eq!(names, vec!["main.Base".to_string()]);

        let fields = walker.fields(&ty).unwrap();
        assert_eq!(fields[0].builtin(), Some(BuiltinType::String));
        assert_eq!(fields[1].storage, ReferenceStorage::Weak);
        assert!(fields[1].is_weak && fields[1].is_reference);
        assert!(fields[1].mangled_type_name.starts_with('$'));
        assert!(fields[1].mangled_type_name.ends_with("SgXw"));
    }

    #[test]
    fn test_cyclic_type_terminates() {
        let mut builder = LayoutBuilder::new();
        let main = builder.module("main");
        let node = builder.type_descriptor(ContextKind::Class, main, "Node", 0, 2);
        builder
            .field_descriptor(
                node,
                &[
                    FieldSpec::symbolic("next", node, "Sg").var(),
                    FieldSpec::symbolic("parent", node, ""),
                ],
            )
            .unwrap();
        let metadata = builder.class_metadata(node, None, 32, &[], &[16, 24]);
        let walker = walker(builder.memory());

        let ty = walker.type_descriptor(MetadataHandle::new(metadata)).unwrap();
        let fields = walker.fields(&ty).unwrap();
        assert!(fields.iter().all(|f| f.is_reference));

        let parent = walker.resolve_field_type(&fields[1]).unwrap();
        assert!(Arc::ptr_eq(&parent, &ty));
        let again = walker.resolve_field_type(&fields[1]).unwrap();
        assert!(Arc::ptr_eq(&parent, &again));

        let next = walker.resolve_field_type(&fields[0]).unwrap();
        assert_eq!(next.name.readable_name(), "Node?");
        assert!(Arc::ptr_eq(&next, &walker.resolve_field_type(&fields[0]).unwrap()));
    }

    #[test]
    fn test_second_walk_is_cached() {
        let mut builder = LayoutBuilder::new();
        let metadata = pair_of_int(&mut builder);
        let walker = walker(builder.memory());

        let first = walker.type_descriptor(MetadataHandle::new(metadata)).unwrap();
        let before = walker.cache().statistics().metadata;
        let second = walker.type_descriptor(MetadataHandle::new(metadata)).unwrap();
        let after = walker.cache().statistics().metadata;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(after.hits, before.hits + 1);
    }

    #[test]
    fn test_concurrent_walks_share_one_entry() {
        let mut builder = LayoutBuilder::new();
        let metadata = pair_of_int(&mut builder);
        let walker = walker(builder.memory());

        let (a, b) = std::thread::scope(|scope| {
            let a = scope.spawn(|| walker.type_descriptor(MetadataHandle::new(metadata)).unwrap());
            let b = scope.spawn(|| walker.type_descriptor(MetadataHandle::new(metadata)).unwrap());
            (a.join().unwrap(), b.join().unwrap())
        });

        assert!(Arc::ptr_eq(&a, &b));
        let identity = TypeIdentity::Metadata(metadata);
        assert!(Arc::ptr_eq(&walker.cache().get_type(&identity).unwrap(), &a));
    }

    /// Records every range read through it.
    struct Recording {
        inner: MemorySnapshot,
        reads: Mutex<Vec<(Address, usize)>>,
    }

    impl MemoryReader for Recording {
        fn read_bytes(&self, address: Address, size: usize) -> MemoryResult<Vec<u8>> {
            self.reads.lock().unwrap().push((address, size));
            self.inner.read_bytes(address, size)
        }

        fn is_readable(&self, address: Address, size: usize) -> bool {
            self.inner.is_readable(address, size)
        }
    }

    #[test]
    fn test_truncated_header_is_rejected_without_overread() {
        let memory = MemorySnapshot::new();
        let metadata = Address(0x4000);
        memory.map(metadata, &0x200u32.to_le_bytes());

        let recording = Recording {
            inner: memory,
            reads: Mutex::new(Vec::new()),
        };
        let demangler = Demangler::new(Arc::new(InspectorCache::new()), InspectorConfig::default());
        let walker = MetadataWalker::new(&recording, Arc::new(demangler));

        let result = walker.type_descriptor(MetadataHandle::new(metadata));
        assert!(matches!(result, Err(Error::NotIntrospectable(_))));

        let end = metadata.0 + VALUE_HEADER_SIZE as u64;
        for (address, size) in recording.reads.lock().unwrap().iter() {
            assert!(address.0 >= metadata.0 && address.0 + *size as u64 <= end);
        }
    }

    #[test]
    fn test_rejects_inconsistent_headers() {
        let mut builder = LayoutBuilder::new();
        let main = builder.module("main");

        // Struct metadata pointing at a class descriptor.
        let class = builder.type_descriptor(ContextKind::Class, main, "Widget", 0, 0);
        let mismatched = builder.struct_metadata(class, ValueWitness::pod(8, 8), &[], &[]);

        // Unknown kind word.
        let unknown = builder.alloc(&0x203u64.to_le_bytes());

        // Descriptor with a nonzero version.
        let versioned = builder.type_descriptor(ContextKind::Struct, main, "Old", 0, 0);
        builder
            .memory()
            .write_bytes(versioned, &(0x0100u32 | 17).to_le_bytes())
            .unwrap();
        let old = builder.struct_metadata(versioned, ValueWitness::pod(8, 8), &[], &[]);

        let walker = walker(builder.memory());
        for metadata in [mismatched, unknown, old, Address(0xDEAD_0000)] {
            assert!(
                matches!(
                    walker.type_descriptor(MetadataHandle::new(metadata)),
                    Err(Error::NotIntrospectable(_))
                ),
                "{}",
                metadata
            );
        }
        assert_eq!(walker.cache().statistics().metadata.entries, 0);
    }

    #[test]
    fn test_rejects_malformed_field_descriptors() {
        let mut builder = LayoutBuilder::new();
        let main = builder.module("main");

        let counted = builder.type_descriptor(ContextKind::Struct, main, "Counted", 0, 2);
        builder
            .field_descriptor(counted, &[FieldSpec::new("only", "Si")])
            .unwrap();
        let counted = builder.struct_metadata(counted, ValueWitness::pod(16, 8), &[], &[0, 8]);

        let sized = builder.type_descriptor(ContextKind::Struct, main, "Sized", 0, 1);
        let fd = builder
            .field_descriptor(sized, &[FieldSpec::new("value", "Si")])
            .unwrap();
        builder
            .memory()
            .write_bytes(Address(fd.0 + FIELD_DESCRIPTOR_RECORD_SIZE as u64), &16u16.to_le_bytes())
            .unwrap();
        let sized = builder.struct_metadata(sized, ValueWitness::pod(8, 8), &[], &[0]);

        let unordered = builder.type_descriptor(ContextKind::Struct, main, "Unordered", 0, 2);
        builder
            .field_descriptor(
                unordered,
                &[FieldSpec::new("a", "Si"), FieldSpec::new("b", "Si")],
            )
            .unwrap();
        let unordered = builder.struct_metadata(unordered, ValueWitness::pod(16, 8), &[], &[8, 0]);

        let overrun = builder.type_descriptor(ContextKind::Struct, main, "Overrun", 0, 1);
        builder
            .field_descriptor(overrun, &[FieldSpec::new("big", "Si")])
            .unwrap();
        let overrun = builder.struct_metadata(overrun, ValueWitness::pod(8, 8), &[], &[4]);

        let walker = walker(builder.memory());
        for metadata in [counted, sized, unordered, overrun] {
            let ty = walker.type_descriptor(MetadataHandle::new(metadata)).unwrap();
            assert!(
                matches!(walker.fields(&ty), Err(Error::NoFieldInfo(_))),
                "{}",
                ty.name
            );
        }
    }

    #[test]
    fn test_enum_cases_and_artificial_fields() {
        let mut builder = LayoutBuilder::new();
        let main = builder.module("main");
        let state = builder.type_descriptor(ContextKind::Enum, main, "State", 0, 2);
        builder
            .field_descriptor(
                state,
                &[FieldSpec::new("loaded", "Si"), FieldSpec::case("idle")],
            )
            .unwrap();
        let state = builder.enum_metadata(state, ValueWitness::pod(9, 16), &[]);

        let hidden = builder.type_descriptor(ContextKind::Struct, main, "Hidden", 0, 2);
        builder
            .field_descriptor(
                hidden,
                &[
                    FieldSpec::new("$__lazy_storage", "Si").artificial(),
                    FieldSpec::new("shown", "Sb"),
                ],
            )
            .unwrap();
        let hidden = builder.struct_metadata(hidden, ValueWitness::pod(9, 8), &[], &[0, 8]);
        let walker = walker(builder.memory());

        let state = walker.type_descriptor(MetadataHandle::new(state)).unwrap();
        assert_eq!(state.kind, TypeKind::Enum);
        let cases = walker.fields(&state).unwrap();
        assert_eq!(cases.len(), 2);
        assert!(cases.iter().all(|c| c.byte_offset == 0));
        assert!(walker.resolve_field_type(&cases[1]).is_err());

        let hidden = walker.type_descriptor(MetadataHandle::new(hidden)).unwrap();
        let fields = walker.fields(&hidden).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "shown");
        assert_eq!(fields[0].index, 0);
        assert_eq!(fields[0].byte_offset, 8);
    }

    #[test]
    fn test_structural_metadata_has_no_fields() {
        let mut builder = LayoutBuilder::new();
        let existential = builder.alloc(&0x303u64.to_le_bytes());
        let walker = walker(builder.memory());

        let ty = walker.type_descriptor(MetadataHandle::new(existential)).unwrap();
        assert_eq!(ty.kind, TypeKind::Protocol);
        assert!(ty.field_descriptor().is_none());
        assert!(matches!(walker.fields(&ty), Err(Error::NoFieldInfo(_))));
    }

    #[test]
    fn test_instance_metadata_from_isa() {
        let mut builder = LayoutBuilder::new();
        let main = builder.module("main");
        let empty = builder.type_descriptor(ContextKind::Class, main, "Empty", 0, 0);
        let metadata = builder.class_metadata(empty, None, 16, &[], &[]);
        let object = builder.instance(metadata, &[]);
        let walker = walker(builder.memory());

        assert_eq!(walker.metadata_of(&object).unwrap().address, metadata);
        assert_eq!(walker.type_of(&object).unwrap().name.to_string(), "main.Empty");
        assert!(walker
            .type_of(&ObjectHandle::instance(object.address, 4))
            .is_err());
    }

    #[test]
    fn test_generic_class_with_indirect_reference() {
        let mut builder = LayoutBuilder::new();
        let swift = builder.module("Swift");
        let int = builder.builtin_struct(swift, "Int", 8);
        let main = builder.module("main");
        let item = builder.type_descriptor(ContextKind::Struct, main, "Item", 0, 0);
        let slot = builder.pointer_slot(item);
        let list = builder.type_descriptor(ContextKind::Class, main, "List", 1, 2);
        builder
            .field_descriptor(
                list,
                &[FieldSpec::symbolic_via("head", slot, ""), FieldSpec::new("count", "Si")],
            )
            .unwrap();
        let metadata = builder.class_metadata(list, None, 32, &[int], &[16, 24]);
        let walker = walker(builder.memory());

        let ty = walker.type_descriptor(MetadataHandle::new(metadata)).unwrap();
        assert_eq!(ty.name.to_string(), "main.List<Swift.Int>");

        let fields = walker.fields(&ty).unwrap();
        assert!(!fields[0].is_reference);
        let head = walker.resolve_field_type(&fields[0]).unwrap();
        assert_eq!(head.identity, TypeIdentity::Descriptor(item));
        assert_eq!(head.kind, TypeKind::Struct);
        assert_eq!(head.name.to_string(), "main.Item");
    }

    #[test]
    fn test_mangled_text() {
        let raw = [0x01, 0x10, 0, 0, 0, b'S', b'g'];
        assert_eq!(mangled_text(&raw, Address(0x1000)), "$0x1011Sg");
        assert_eq!(mangled_text(b"Si", Address(0)), "Si");
        assert_eq!(reference_storage(b"4main4NodeCSgXw"), ReferenceStorage::Weak);
        assert_eq!(reference_storage(b"Si"), ReferenceStorage::Strong);
    }
}

//! Common types used throughout the inspector

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Represents an address in the inspected address space
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Address(pub u64);

impl Address {
    pub const ZERO: Address = Address(0);

    pub fn new(addr: u64) -> Self {
        Self(addr)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Signed displacement, `None` on overflow.
    pub fn offset(&self, offset: i64) -> Option<Self> {
        self.0.checked_add_signed(offset).map(Self)
    }

    pub fn checked_add(&self, delta: u64) -> Option<Self> {
        self.0.checked_add(delta).map(Self)
    }

    pub fn checked_sub(&self, delta: u64) -> Option<Self> {
        self.0.checked_sub(delta).map(Self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<usize> for Address {
    fn from(value: usize) -> Self {
        Self(value as u64)
    }
}

/// Known layout revisions of the foreign runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutVersion {
    /// Stable ABI, 64-bit little endian.
    #[default]
    V5,
}

impl LayoutVersion {
    pub fn pointer_size(&self) -> usize {
        match self {
            LayoutVersion::V5 => 8,
        }
    }
}

/// Handle to a runtime type description: an address plus the layout it is read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetadataHandle {
    pub address: Address,
    pub layout: LayoutVersion,
}

impl MetadataHandle {
    pub fn new(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            layout: LayoutVersion::V5,
        }
    }
}

/// Handle to a live foreign value.
///
/// `size` is the allocation size the caller vouches for; the accessor never
/// reads outside `[address, address + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    pub address: Address,
    pub size: u64,
    /// Metadata of the value. `None` for class instances, whose first word is the isa.
    pub metadata: Option<Address>,
    pub layout: LayoutVersion,
}

impl ObjectHandle {
    /// A heap-allocated class instance.
    pub fn instance(address: impl Into<Address>, size: u64) -> Self {
        Self {
            address: address.into(),
            size,
            metadata: None,
            layout: LayoutVersion::V5,
        }
    }

    /// A value-type value stored inline at `address`, described by `metadata`.
    pub fn value(address: impl Into<Address>, size: u64, metadata: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            size,
            metadata: Some(metadata.into()),
            layout: LayoutVersion::V5,
        }
    }

    pub fn end(&self) -> Option<Address> {
        self.address.checked_add(self.size)
    }
}

/// Kind of a demangled name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NameKind {
    Struct,
    Class,
    Enum,
    Protocol,
    Function,
    Variable,
    Tuple,
    /// Reference to a generic parameter of the enclosing type, `τ_depth_index`.
    GenericParameter,
    Unknown,
}

/// What a mangled symbol denotes beyond the type itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolRole {
    TypeMangling,
    TypeMetadata,
    FullMetadata,
    Metaclass,
    NominalTypeDescriptor,
    MetadataAccessor,
    Getter,
    Setter,
    PropertyDescriptor,
}

impl SymbolRole {
    fn describe(&self) -> &'static str {
        match self {
            SymbolRole::TypeMangling => "",
            SymbolRole::TypeMetadata => "type metadata for ",
            SymbolRole::FullMetadata => "full type metadata for ",
            SymbolRole::Metaclass => "metaclass for ",
            SymbolRole::NominalTypeDescriptor => "nominal type descriptor for ",
            SymbolRole::MetadataAccessor => "type metadata accessor for ",
            SymbolRole::Getter | SymbolRole::Setter => "",
            SymbolRole::PropertyDescriptor => "property descriptor for ",
        }
    }

    fn accessor_suffix(&self) -> &'static str {
        match self {
            SymbolRole::Getter => ".getter",
            SymbolRole::Setter => ".setter",
            _ => "",
        }
    }
}

/// A single function parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub label: Option<String>,
    pub ty: DemangledName,
}

/// Parameter and result types of a function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub parameters: Vec<Parameter>,
    pub result: Box<DemangledName>,
    pub is_async: bool,
    pub throws: bool,
}

/// Structured form of a mangled symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemangledName {
    pub module: Option<String>,
    /// Enclosing types between the module and the type, outermost first.
    pub context: Vec<String>,
    pub type_name: String,
    pub generic_arguments: Vec<DemangledName>,
    pub kind: NameKind,
    pub function_signature: Option<FunctionSignature>,
    pub role: Option<SymbolRole>,
    /// Element labels, tuples only. Same length as `generic_arguments`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub element_labels: Vec<Option<String>>,
}

impl DemangledName {
    pub fn nominal(
        module: Option<String>,
        context: Vec<String>,
        type_name: impl Into<String>,
        kind: NameKind,
    ) -> Self {
        Self {
            module,
            context,
            type_name: type_name.into(),
            generic_arguments: Vec::new(),
            kind,
            function_signature: None,
            role: None,
            element_labels: Vec::new(),
        }
    }

    /// A stdlib type in the `Swift` module.
    pub fn swift(type_name: impl Into<String>, kind: NameKind) -> Self {
        Self::nominal(Some("Swift".to_string()), Vec::new(), type_name, kind)
    }

    pub fn unknown(type_name: impl Into<String>) -> Self {
        Self::nominal(None, Vec::new(), type_name, NameKind::Unknown)
    }

    pub fn tuple(elements: Vec<DemangledName>, labels: Vec<Option<String>>) -> Self {
        Self {
            module: None,
            context: Vec::new(),
            type_name: String::new(),
            generic_arguments: elements,
            kind: NameKind::Tuple,
            function_signature: None,
            role: None,
            element_labels: labels,
        }
    }

    pub fn function_type(signature: FunctionSignature) -> Self {
        Self {
            module: None,
            context: Vec::new(),
            type_name: String::new(),
            generic_arguments: Vec::new(),
            kind: NameKind::Function,
            function_signature: Some(signature),
            role: None,
            element_labels: Vec::new(),
        }
    }

    /// A variable entity; its type is kept as the result of an empty signature.
    pub fn variable(
        module: Option<String>,
        context: Vec<String>,
        name: impl Into<String>,
        ty: DemangledName,
    ) -> Self {
        let mut variable = Self::nominal(module, context, name, NameKind::Variable);
        variable.function_signature = Some(FunctionSignature {
            parameters: Vec::new(),
            result: Box::new(ty),
            is_async: false,
            throws: false,
        });
        variable
    }

    pub fn generic_parameter(depth: u32, index: u32) -> Self {
        Self::nominal(
            None,
            Vec::new(),
            format!("τ_{}_{}", depth, index),
            NameKind::GenericParameter,
        )
    }

    /// `(depth, index)` of a generic parameter reference.
    pub fn as_generic_parameter(&self) -> Option<(u32, u32)> {
        if self.kind != NameKind::GenericParameter {
            return None;
        }
        let mut parts = self.type_name.strip_prefix("τ_")?.split('_');
        let depth = parts.next()?.parse().ok()?;
        let index = parts.next()?.parse().ok()?;
        Some((depth, index))
    }

    /// Type of a variable entity.
    pub fn variable_type(&self) -> Option<&DemangledName> {
        match self.kind {
            NameKind::Variable => self.function_signature.as_ref().map(|s| s.result.as_ref()),
            _ => None,
        }
    }

    pub fn with_generic_arguments(mut self, arguments: Vec<DemangledName>) -> Self {
        self.generic_arguments = arguments;
        self
    }

    pub fn with_role(mut self, role: SymbolRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn is_generic(&self) -> bool {
        self.kind != NameKind::Tuple && !self.generic_arguments.is_empty()
    }

    /// `true` for `Swift.Optional<T>`.
    pub fn is_optional(&self) -> bool {
        self.module.as_deref() == Some("Swift")
            && self.context.is_empty()
            && self.type_name == "Optional"
            && self.generic_arguments.len() == 1
    }

    pub fn simple_name(&self) -> &str {
        &self.type_name
    }

    /// `Module.Outer.Name` without generic arguments.
    pub fn qualified_name(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.context.len() + 2);
        if let Some(module) = &self.module {
            parts.push(module);
        }
        parts.extend(self.context.iter().map(String::as_str));
        if !self.type_name.is_empty() {
            parts.push(&self.type_name);
        }
        parts.join(".")
    }

    /// Module-less name with generic arguments and sugar (`Int?`, `[String]`).
    pub fn readable_name(&self) -> String {
        match self.kind {
            NameKind::Tuple => {
                let elements: Vec<String> = self
                    .generic_arguments
                    .iter()
                    .enumerate()
                    .map(|(i, element)| match self.element_labels.get(i) {
                        Some(Some(label)) => format!("{}: {}", label, element.readable_name()),
                        _ => element.readable_name(),
                    })
                    .collect();
                return format!("({})", elements.join(", "));
            }
            NameKind::Function if self.type_name.is_empty() => {
                if let Some(signature) = &self.function_signature {
                    return signature.render(|name| name.readable_name());
                }
            }
            NameKind::Variable => {
                let mut name = self.context.clone();
                name.push(self.type_name.clone());
                return match self.variable_type() {
                    Some(ty) => format!("{}: {}", name.join("."), ty.readable_name()),
                    None => name.join("."),
                };
            }
            _ => {}
        }

        if self.module.as_deref() == Some("Swift") && self.context.is_empty() {
            match (self.type_name.as_str(), self.generic_arguments.as_slice()) {
                ("Optional", [wrapped]) => return format!("{}?", wrapped.readable_name()),
                ("Array", [element]) => return format!("[{}]", element.readable_name()),
                ("Dictionary", [key, value]) => {
                    return format!("[{}: {}]", key.readable_name(), value.readable_name())
                }
                _ => {}
            }
        }

        let mut name = self.context.clone();
        if !self.type_name.is_empty() {
            name.push(self.type_name.clone());
        }
        if name.is_empty() {
            // Partial names may carry only their module.
            name.extend(self.module.clone());
        }
        let mut rendered = name.join(".");
        if !self.generic_arguments.is_empty() {
            let args: Vec<String> = self
                .generic_arguments
                .iter()
                .map(DemangledName::readable_name)
                .collect();
            rendered.push('<');
            rendered.push_str(&args.join(", "));
            rendered.push('>');
        }
        rendered
    }
}

impl FunctionSignature {
    fn render(&self, name: impl Fn(&DemangledName) -> String) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| match &p.label {
                Some(label) => format!("{}: {}", label, name(&p.ty)),
                None => name(&p.ty),
            })
            .collect();
        let mut rendered = format!("({})", params.join(", "));
        if self.is_async {
            rendered.push_str(" async");
        }
        if self.throws {
            rendered.push_str(" throws");
        }
        rendered.push_str(" -> ");
        rendered.push_str(&name(&self.result));
        rendered
    }
}

impl fmt::Display for DemangledName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(role) = self.role {
            f.write_str(role.describe())?;
        }

        match self.kind {
            NameKind::Tuple => {
                f.write_str("(")?;
                for (i, element) in self.generic_arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if let Some(Some(label)) = self.element_labels.get(i) {
                        write!(f, "{}: ", label)?;
                    }
                    write!(f, "{}", element)?;
                }
                return f.write_str(")");
            }
            NameKind::Function => {
                if let Some(signature) = &self.function_signature {
                    if !self.type_name.is_empty() {
                        f.write_str(&self.qualified_name())?;
                    }
                    return f.write_str(&signature.render(|name| name.to_string()));
                }
            }
            NameKind::Variable => {
                f.write_str(&self.qualified_name())?;
                if let Some(role) = self.role {
                    f.write_str(role.accessor_suffix())?;
                }
                if let Some(ty) = self.variable_type() {
                    write!(f, " : {}", ty)?;
                }
                return Ok(());
            }
            _ => {}
        }

        f.write_str(&self.qualified_name())?;
        if !self.generic_arguments.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.generic_arguments.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", arg)?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

/// Result of the two-stage demangling pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Demangled {
    /// The strict grammar consumed the whole symbol.
    Full(DemangledName),
    /// Only a structurally decoded prefix could be recovered.
    Partial(DemangledName),
}

impl Demangled {
    pub fn name(&self) -> &DemangledName {
        match self {
            Demangled::Full(name) | Demangled::Partial(name) => name,
        }
    }

    pub fn into_name(self) -> DemangledName {
        match self {
            Demangled::Full(name) | Demangled::Partial(name) => name,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Demangled::Full(_))
    }
}

/// Kind of a walked runtime type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Struct,
    Class,
    Enum,
    Protocol,
    Opaque,
}

impl TypeKind {
    /// Only nominal value and class types carry a field descriptor.
    pub fn carries_fields(&self) -> bool {
        matches!(self, TypeKind::Struct | TypeKind::Class | TypeKind::Enum)
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Struct => write!(f, "struct"),
            TypeKind::Class => write!(f, "class"),
            TypeKind::Enum => write!(f, "enum"),
            TypeKind::Protocol => write!(f, "protocol"),
            TypeKind::Opaque => write!(f, "opaque"),
        }
    }
}

/// Stable identity of a foreign type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeIdentity {
    /// Full runtime metadata record.
    Metadata(Address),
    /// Nominal context descriptor reached without metadata.
    Descriptor(Address),
    /// Type known only by its mangled name.
    Symbol(Arc<str>),
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeIdentity::Metadata(addr) => write!(f, "metadata@{}", addr),
            TypeIdentity::Descriptor(addr) => write!(f, "descriptor@{}", addr),
            TypeIdentity::Symbol(symbol) => write!(f, "symbol:{}", symbol),
        }
    }
}

/// Size and copy semantics read from a value witness table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueLayout {
    pub size: u64,
    pub stride: u64,
    pub alignment: u64,
    pub is_pod: bool,
    pub is_bitwise_takable: bool,
}

/// Walked description of a foreign type. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub identity: TypeIdentity,
    pub kind: TypeKind,
    pub name: DemangledName,
    /// Nominal context descriptor, when known.
    pub descriptor: Option<Address>,
    field_descriptor: Option<Address>,
    pub generic_parameter_count: u32,
    pub field_count: u32,
    pub layout: Option<ValueLayout>,
    pub superclass: Option<Arc<TypeDescriptor>>,
}

impl TypeDescriptor {
    /// Builds a descriptor; a field descriptor reference is kept only for kinds that carry fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: TypeIdentity,
        kind: TypeKind,
        name: DemangledName,
        descriptor: Option<Address>,
        field_descriptor: Option<Address>,
        generic_parameter_count: u32,
        field_count: u32,
    ) -> Self {
        let field_descriptor = field_descriptor.filter(|_| kind.carries_fields());
        Self {
            identity,
            kind,
            name,
            descriptor,
            field_descriptor,
            generic_parameter_count,
            field_count: if kind.carries_fields() { field_count } else { 0 },
            layout: None,
            superclass: None,
        }
    }

    pub fn with_layout(mut self, layout: Option<ValueLayout>) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_superclass(mut self, superclass: Option<Arc<TypeDescriptor>>) -> Self {
        self.superclass = superclass;
        self
    }

    pub fn field_descriptor(&self) -> Option<Address> {
        self.field_descriptor
    }

    pub fn metadata_address(&self) -> Option<Address> {
        match self.identity {
            TypeIdentity::Metadata(addr) => Some(addr),
            _ => None,
        }
    }

    /// Superclass chain, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &TypeDescriptor> {
        std::iter::successors(self.superclass.as_deref(), |t| t.superclass.as_deref())
    }
}

/// How a reference-typed field holds its referent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceStorage {
    #[default]
    Strong,
    Weak,
    Unowned,
    Unmanaged,
}

/// Field types with a fixed, directly decodable layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinType {
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Bool,
    Float,
    Double,
    CGFloat,
    String,
    RawPointer,
    MutableRawPointer,
    CGPoint,
    CGSize,
    CGRect,
    CGVector,
    UIEdgeInsets,
    NSRange,
}

impl BuiltinType {
    /// Maps a demangled `(module, name)` pair to a builtin.
    pub fn from_qualified(module: &str, name: &str) -> Option<Self> {
        let builtin = match (module, name) {
            ("Swift", "Int") => BuiltinType::Int,
            ("Swift", "Int8") => BuiltinType::Int8,
            ("Swift", "Int16") => BuiltinType::Int16,
            ("Swift", "Int32") => BuiltinType::Int32,
            ("Swift", "Int64") => BuiltinType::Int64,
            ("Swift", "UInt") => BuiltinType::UInt,
            ("Swift", "UInt8") => BuiltinType::UInt8,
            ("Swift", "UInt16") => BuiltinType::UInt16,
            ("Swift", "UInt32") => BuiltinType::UInt32,
            ("Swift", "UInt64") => BuiltinType::UInt64,
            ("Swift", "Bool") => BuiltinType::Bool,
            ("Swift", "Float") => BuiltinType::Float,
            ("Swift", "Double") => BuiltinType::Double,
            ("Swift", "String") => BuiltinType::String,
            ("Swift", "UnsafeRawPointer") => BuiltinType::RawPointer,
            ("Swift", "UnsafeMutableRawPointer") => BuiltinType::MutableRawPointer,
            ("CoreGraphics", "CGFloat") | ("CoreFoundation", "CGFloat") => BuiltinType::CGFloat,
            ("__C", "CGPoint") => BuiltinType::CGPoint,
            ("__C", "CGSize") => BuiltinType::CGSize,
            ("__C", "CGRect") => BuiltinType::CGRect,
            ("__C", "CGVector") => BuiltinType::CGVector,
            ("__C", "UIEdgeInsets") => BuiltinType::UIEdgeInsets,
            ("__C", "_NSRange") | ("__C", "NSRange") => BuiltinType::NSRange,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn size(&self) -> u64 {
        match self {
            BuiltinType::Int8 | BuiltinType::UInt8 | BuiltinType::Bool => 1,
            BuiltinType::Int16 | BuiltinType::UInt16 => 2,
            BuiltinType::Int32 | BuiltinType::UInt32 | BuiltinType::Float => 4,
            BuiltinType::Int
            | BuiltinType::Int64
            | BuiltinType::UInt
            | BuiltinType::UInt64
            | BuiltinType::Double
            | BuiltinType::CGFloat
            | BuiltinType::RawPointer
            | BuiltinType::MutableRawPointer => 8,
            BuiltinType::String
            | BuiltinType::CGPoint
            | BuiltinType::CGSize
            | BuiltinType::CGVector
            | BuiltinType::NSRange => 16,
            BuiltinType::CGRect | BuiltinType::UIEdgeInsets => 32,
        }
    }

    pub fn alignment(&self) -> u64 {
        self.size().min(8)
    }

    /// Plain bytes with no ownership; safe to copy and overwrite.
    pub fn is_trivial(&self) -> bool {
        !matches!(self, BuiltinType::String)
    }

    pub fn demangled_name(&self) -> DemangledName {
        let (module, name, kind) = match self {
            BuiltinType::CGFloat => ("CoreGraphics", "CGFloat", NameKind::Struct),
            BuiltinType::CGPoint => ("__C", "CGPoint", NameKind::Struct),
            BuiltinType::CGSize => ("__C", "CGSize", NameKind::Struct),
            BuiltinType::CGRect => ("__C", "CGRect", NameKind::Struct),
            BuiltinType::CGVector => ("__C", "CGVector", NameKind::Struct),
            BuiltinType::UIEdgeInsets => ("__C", "UIEdgeInsets", NameKind::Struct),
            BuiltinType::NSRange => ("__C", "_NSRange", NameKind::Struct),
            other => ("Swift", other.swift_name(), NameKind::Struct),
        };
        DemangledName::nominal(Some(module.to_string()), Vec::new(), name, kind)
    }

    fn swift_name(&self) -> &'static str {
        match self {
            BuiltinType::Int => "Int",
            BuiltinType::Int8 => "Int8",
            BuiltinType::Int16 => "Int16",
            BuiltinType::Int32 => "Int32",
            BuiltinType::Int64 => "Int64",
            BuiltinType::UInt => "UInt",
            BuiltinType::UInt8 => "UInt8",
            BuiltinType::UInt16 => "UInt16",
            BuiltinType::UInt32 => "UInt32",
            BuiltinType::UInt64 => "UInt64",
            BuiltinType::Bool => "Bool",
            BuiltinType::Float => "Float",
            BuiltinType::Double => "Double",
            BuiltinType::String => "String",
            BuiltinType::RawPointer => "UnsafeRawPointer",
            BuiltinType::MutableRawPointer => "UnsafeMutableRawPointer",
            BuiltinType::CGFloat => "CGFloat",
            BuiltinType::CGPoint => "CGPoint",
            BuiltinType::CGSize => "CGSize",
            BuiltinType::CGRect => "CGRect",
            BuiltinType::CGVector => "CGVector",
            BuiltinType::UIEdgeInsets => "UIEdgeInsets",
            BuiltinType::NSRange => "NSRange",
        }
    }
}

/// A field type whose resolution is postponed until requested
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeferredType {
    /// Raw type-name bytes, symbolic references included.
    pub raw: Arc<[u8]>,
    /// Address the bytes were read from; symbolic offsets are relative to it.
    pub address: Address,
}

/// Type reference of a field record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldTypeRef {
    Builtin(BuiltinType),
    Deferred(DeferredType),
}

/// A single stored field, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    pub name: String,
    pub index: usize,
    pub type_ref: FieldTypeRef,
    /// Printable form of the mangled type name.
    pub mangled_type_name: String,
    pub byte_offset: u64,
    pub storage: ReferenceStorage,
    pub is_weak: bool,
    pub is_reference: bool,
    pub is_var: bool,
    pub is_indirect: bool,
    pub owner: TypeIdentity,
}

impl FieldRecord {
    pub fn builtin(&self) -> Option<BuiltinType> {
        match &self.type_ref {
            FieldTypeRef::Builtin(builtin) => Some(*builtin),
            FieldTypeRef::Deferred(_) => None,
        }
    }
}

/// Shape of a synthesized member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    Property,
    Method,
    Ivar,
}

/// A locally fabricated member standing in for a foreign field
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticMember {
    pub name: String,
    pub encoded_type: String,
    pub kind: MemberKind,
    pub source_field: FieldRecord,
    /// Readable type name, shown when the encoding is opaque.
    pub type_label: String,
    /// Property attribute string, properties only.
    pub attributes: Option<String>,
    pub representable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> DemangledName {
        DemangledName::swift("Int", NameKind::Struct)
    }

    #[test]
    fn test_address_offset() {
        let addr = Address::new(0x1000);
        assert_eq!(addr.offset(-0x10), Some(Address(0xFF0)));
        assert_eq!(Address::ZERO.offset(-1), None);
        assert_eq!(Address(u64::MAX).checked_add(1), None);
        assert_eq!(addr.to_string(), "0x1000");
    }

    #[test]
    fn test_qualified_and_display() {
        let name = DemangledName::nominal(
            Some("main".into()),
            vec!["Outer".into()],
            "Box",
            NameKind::Struct,
        )
        .with_generic_arguments(vec![int()]);

        assert_eq!(name.qualified_name(), "main.Outer.Box");
        assert_eq!(name.to_string(), "main.Outer.Box<Swift.Int>");
        assert_eq!(name.readable_name(), "Outer.Box<Int>");
    }

    #[test]
    fn test_readable_sugar() {
        let optional = DemangledName::swift("Optional", NameKind::Enum)
            .with_generic_arguments(vec![int()]);
        assert_eq!(optional.readable_name(), "Int?");
        assert!(optional.is_optional());

        let dict = DemangledName::swift("Dictionary", NameKind::Struct).with_generic_arguments(
            vec![DemangledName::swift("String", NameKind::Struct), int()],
        );
        assert_eq!(dict.readable_name(), "[String: Int]");
    }

    #[test]
    fn test_function_display() {
        let mut function = DemangledName::nominal(
            Some("main".into()),
            Vec::new(),
            "add",
            NameKind::Function,
        );
        function.function_signature = Some(FunctionSignature {
            parameters: vec![Parameter {
                label: Some("x".into()),
                ty: int(),
            }],
            result: Box::new(int()),
            is_async: false,
            throws: true,
        });
        assert_eq!(function.to_string(), "main.add(x: Swift.Int) throws -> Swift.Int");
    }

    #[test]
    fn test_module_only_name() {
        let partial = DemangledName::nominal(Some("main".into()), Vec::new(), "", NameKind::Unknown);
        assert_eq!(partial.qualified_name(), "main");
        assert_eq!(partial.readable_name(), "main");
        assert_eq!(partial.to_string(), "main");
    }

    #[test]
    fn test_variable_accessor_display() {
        let getter = DemangledName::variable(
            Some("main".into()),
            vec!["Counter".into()],
            "count",
            int(),
        )
        .with_role(SymbolRole::Getter);
        assert_eq!(getter.to_string(), "main.Counter.count.getter : Swift.Int");
        assert_eq!(getter.readable_name(), "Counter.count: Int");
    }

    #[test]
    fn test_generic_parameter_roundtrip() {
        let param = DemangledName::generic_parameter(0, 1);
        assert_eq!(param.as_generic_parameter(), Some((0, 1)));
        assert_eq!(int().as_generic_parameter(), None);
    }

    #[test]
    fn test_descriptor_drops_fields_for_protocols() {
        let descriptor = TypeDescriptor::new(
            TypeIdentity::Metadata(Address(0x10)),
            TypeKind::Protocol,
            DemangledName::unknown("P"),
            None,
            Some(Address(0x20)),
            0,
            3,
        );
        assert_eq!(descriptor.field_descriptor(), None);
        assert_eq!(descriptor.field_count, 0);
    }

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(
            BuiltinType::from_qualified("Swift", "Int32"),
            Some(BuiltinType::Int32)
        );
        assert_eq!(BuiltinType::from_qualified("main", "Int32"), None);
        assert_eq!(BuiltinType::CGRect.size(), 32);
        assert!(!BuiltinType::String.is_trivial());
    }
}

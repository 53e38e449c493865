//! Diagnostic dump of an object's type and fields

use crate::display;
use crate::encoding;
use crate::framework::FrameworkState;
use crate::members::type_label;
use lens_core::{
    DescriptionVerbosity, FieldRecord, ObjectHandle, ReferenceStorage, Result, TypeDescriptor,
    TypeKind, ValueLayout,
};
use lens_memory::MemoryReader;
use lens_runtime::MetadataWalker;
use serde::Serialize;

/// Everything the inspector knows about one object's type
#[derive(Debug, Clone, Serialize)]
pub struct DebugInfo {
    pub address: String,
    pub type_name: String,
    pub readable_type_name: String,
    pub kind: TypeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_descriptor: Option<String>,
    pub generic_parameter_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<ValueLayout>,
    pub inheritance: Vec<String>,
    pub is_framework_type: bool,
    #[serde(skip_serializing_if = "FrameworkState::is_empty")]
    pub framework: FrameworkState,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub native_views: Vec<String>,
    pub fields: Vec<FieldDebugInfo>,
}

/// Type-encoding view of one stored field
#[derive(Debug, Clone, Serialize)]
pub struct FieldDebugInfo {
    pub name: String,
    pub offset: u64,
    pub mangled_type_name: String,
    pub type_label: String,
    /// Local type encoding; absent when the type has none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding_error: Option<String>,
    pub storage: ReferenceStorage,
    pub is_var: bool,
    pub value: String,
}

impl DebugInfo {
    /// Type-level part of the dump, without fields or framework details.
    pub(crate) fn for_type(object: &ObjectHandle, ty: &TypeDescriptor, readable_type_name: String) -> Self {
        Self {
            address: object.address.to_string(),
            type_name: ty.name.to_string(),
            readable_type_name,
            kind: ty.kind,
            metadata: ty.metadata_address().map(|a| a.to_string()),
            descriptor: ty.descriptor.map(|a| a.to_string()),
            field_descriptor: ty.field_descriptor().map(|a| a.to_string()),
            generic_parameter_count: ty.generic_parameter_count,
            layout: ty.layout,
            inheritance: ty.ancestors().map(|t| t.name.to_string()).collect(),
            is_framework_type: false,
            framework: FrameworkState::default(),
            native_views: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDebugInfo> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub(crate) fn field_info<M: MemoryReader>(
    walker: &MetadataWalker<M>,
    verbosity: DescriptionVerbosity,
    object: &ObjectHandle,
    field: &FieldRecord,
) -> FieldDebugInfo {
    let (encoding, encoding_error) = match encoding::encode_field(walker, field) {
        Ok(encoded) => (Some(encoded), None),
        Err(e) => (None, Some(e.to_string())),
    };
    FieldDebugInfo {
        name: field.name.clone(),
        offset: field.byte_offset,
        mangled_type_name: field.mangled_type_name.clone(),
        type_label: type_label(walker, field),
        encoding,
        encoding_error,
        storage: field.storage,
        is_var: field.is_var,
        value: display::safe_display_value(walker, verbosity, object, field),
    }
}

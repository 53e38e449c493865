//! Synthetic member generation
//!
//! Every stored field becomes an ivar, a property, a getter and, when the
//! field can be written, a setter. Fields without a local encoding are still
//! listed, with the unknown token as their type.

use crate::encoding::{encode_field, UNKNOWN_ENCODING};
use lens_core::{FieldRecord, FieldTypeRef, MemberKind, ReferenceStorage, SyntheticMember};
use lens_memory::MemoryReader;
use lens_runtime::{is_writable, MetadataWalker};
use tracing::debug;

/// Members standing in for `fields`, in field order
pub fn synthesize<M: MemoryReader>(walker: &MetadataWalker<M>, fields: &[FieldRecord]) -> Vec<SyntheticMember> {
    let mut members = Vec::with_capacity(fields.len() * 4);
    for field in fields {
        members.extend(members_for(walker, field));
    }
    debug!(fields = fields.len(), members = members.len(), "Synthesized members");
    members
}

/// Ivar, property, getter and optional setter for one field
pub fn members_for<M: MemoryReader>(walker: &MetadataWalker<M>, field: &FieldRecord) -> Vec<SyntheticMember> {
    let (encoded, representable) = match encode_field(walker, field) {
        Ok(encoded) => (encoded, true),
        Err(e) => {
            debug!(field = %field.name, error = %e, "Field has no local encoding");
            (UNKNOWN_ENCODING.to_string(), false)
        }
    };
    let label = type_label(walker, field);

    let member = |name: String, encoded_type: String, kind: MemberKind, attributes: Option<String>| {
        SyntheticMember {
            name,
            encoded_type,
            kind,
            source_field: field.clone(),
            type_label: label.clone(),
            attributes,
            representable,
        }
    };

    let mut members = vec![
        member(field.name.clone(), encoded.clone(), MemberKind::Ivar, None),
        member(
            field.name.clone(),
            encoded.clone(),
            MemberKind::Property,
            Some(property_attributes(field, &encoded)),
        ),
        member(field.name.clone(), format!("{}@:", encoded), MemberKind::Method, None),
    ];
    if representable && is_writable(field) {
        members.push(member(
            setter_name(&field.name),
            format!("v@:{}", encoded),
            MemberKind::Method,
            None,
        ));
    }
    members
}

/// `T<enc>,N[,R][,W],V<name>`
pub fn property_attributes(field: &FieldRecord, encoded: &str) -> String {
    let mut attributes = format!("T{},N", encoded);
    if !field.is_var {
        attributes.push_str(",R");
    }
    if field.storage == ReferenceStorage::Weak {
        attributes.push_str(",W");
    }
    attributes.push_str(",V");
    attributes.push_str(&field.name);
    attributes
}

pub fn setter_name(field_name: &str) -> String {
    let mut chars = field_name.chars();
    match chars.next() {
        Some(first) => format!("set{}{}:", first.to_uppercase(), chars.as_str()),
        None => "set:".to_string(),
    }
}

/// Readable name of the field's type; the raw mangled text when it cannot be resolved.
pub fn type_label<M: MemoryReader>(walker: &MetadataWalker<M>, field: &FieldRecord) -> String {
    match &field.type_ref {
        FieldTypeRef::Builtin(builtin) => builtin.demangled_name().readable_name(),
        FieldTypeRef::Deferred(_) => match walker.resolve_field_type(field) {
            Ok(ty) => ty.name.readable_name(),
            Err(_) => field.mangled_type_name.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::is_valid_type_encoding;
    use lens_core::{InspectorCache, InspectorConfig, MetadataHandle};
    use lens_demangle::Demangler;
    use lens_runtime::testing::{FieldSpec, LayoutBuilder, ValueWitness};
    use lens_runtime::ContextKind;
    use std::sync::Arc;

    fn walker(builder: &LayoutBuilder) -> MetadataWalker<lens_memory::MemorySnapshot> {
        let demangler = Demangler::new(Arc::new(InspectorCache::new()), InspectorConfig::default());
        MetadataWalker::new(builder.memory(), Arc::new(demangler))
    }

    #[test]
    fn test_members_per_field() {
        let mut builder = LayoutBuilder::new();
        let module = builder.module("main");
        let desc = builder.type_descriptor(ContextKind::Struct, module, "Settings", 0, 3);
        builder
            .field_descriptor(
                desc,
                &[
                    FieldSpec::new("count", "Si").var(),
                    FieldSpec::new("title", "SS"),
                    FieldSpec::new("values", "SaySiG").var(),
                ],
            )
            .unwrap();
        let metadata = builder.struct_metadata(desc, ValueWitness::non_pod(32, 8), &[], &[0, 8, 24]);
        let walker = walker(&builder);

        let ty = walker.type_descriptor(MetadataHandle::new(metadata)).unwrap();
        let fields = walker.fields(&ty).unwrap();
        let members = synthesize(&walker, &fields);

        let count: Vec<_> = members.iter().filter(|m| m.source_field.name == "count").collect();
        assert_eq!(count.len(), 4);
        assert_eq!(count[0].kind, MemberKind::Ivar);
        assert_eq!(count[0].encoded_type, "q");
        assert_eq!(count[1].attributes.as_deref(), Some("Tq,N,Vcount"));
        assert_eq!(count[2].encoded_type, "q@:");
        assert_eq!(count[3].name, "setCount:");
        assert_eq!(count[3].encoded_type, "v@:q");

        let title: Vec<_> = members.iter().filter(|m| m.source_field.name == "title").collect();
        assert_eq!(title.len(), 3);
        assert_eq!(title[1].attributes.as_deref(), Some("T@\"NSString\",N,R,Vtitle"));

        let values: Vec<_> = members.iter().filter(|m| m.source_field.name == "values").collect();
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|m| !m.representable));
        assert_eq!(values[0].encoded_type, UNKNOWN_ENCODING);
        assert_eq!(values[0].type_label, "[Int]");

        for member in &members {
            assert!(is_valid_type_encoding(&member.encoded_type), "{}", member.encoded_type);
        }
    }

    #[test]
    fn test_setter_name() {
        assert_eq!(setter_name("title"), "setTitle:");
        assert_eq!(setter_name("_x"), "set_x:");
    }
}

//! Display values for a debugging UI
//!
//! Nothing here fails outward: unreadable fields become a sentinel string.

use lens_core::{DescriptionVerbosity, FieldRecord, ObjectHandle};
use lens_memory::MemoryReader;
use lens_runtime::{Accessor, BorrowedRef, FieldValue, MetadataWalker};
use tracing::trace;

pub const UNREADABLE: &str = "<unreadable>";

/// Display text for one field of `object`
pub fn safe_display_value<M: MemoryReader>(
    walker: &MetadataWalker<M>,
    verbosity: DescriptionVerbosity,
    object: &ObjectHandle,
    field: &FieldRecord,
) -> String {
    match Accessor::new(walker).read(object, field) {
        Ok(value) => format_value(walker, &value),
        Err(e) => {
            trace!(field = %field.name, error = %e, "Field is unreadable");
            match verbosity {
                DescriptionVerbosity::Minimal => UNREADABLE.to_string(),
                DescriptionVerbosity::Normal => format!("<unreadable: {}>", e.label()),
                DescriptionVerbosity::Detailed => format!("<unreadable: {}>", e),
            }
        }
    }
}

pub fn format_value<M: MemoryReader>(walker: &MetadataWalker<M>, value: &FieldValue<'_>) -> String {
    match value {
        FieldValue::Reference(reference) => format_reference(walker, reference),
        other => other.to_string(),
    }
}

/// `<Module.Class: 0x…>`, or `<0x…>` when the referent's class cannot be walked.
pub fn format_reference<M: MemoryReader>(walker: &MetadataWalker<M>, reference: &BorrowedRef<'_>) -> String {
    let referent = ObjectHandle::instance(reference.address(), 8);
    match walker.type_of(&referent) {
        Ok(ty) => format!("<{}: {}>", ty.name.qualified_name(), reference.address()),
        Err(_) => format!("<{}>", reference.address()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_core::{InspectorCache, InspectorConfig, MetadataHandle};
    use lens_demangle::Demangler;
    use lens_memory::MemorySnapshot;
    use lens_runtime::testing::{words, FieldSpec, LayoutBuilder, ValueWitness};
    use lens_runtime::ContextKind;
    use std::sync::Arc;

    fn walker(builder: &LayoutBuilder) -> MetadataWalker<MemorySnapshot> {
        let demangler = Demangler::new(Arc::new(InspectorCache::new()), InspectorConfig::default());
        MetadataWalker::new(builder.memory(), Arc::new(demangler))
    }

    #[test]
    fn test_display_values() {
        let mut builder = LayoutBuilder::new();
        let main = builder.module("main");
        let node = builder.type_descriptor(ContextKind::Class, main, "Node", 0, 3);
        builder
            .field_descriptor(
                node,
                &[
                    FieldSpec::new("name", "SS"),
                    FieldSpec::symbolic("next", node, "Sg").var(),
                    FieldSpec::new("origin", "So7CGPointV").var(),
                ],
            )
            .unwrap();
        let metadata = builder.class_metadata(node, None, 56, &[], &[16, 32, 40]);

        let name = LayoutBuilder::small_string("leaf").unwrap();
        let tail = builder.instance(metadata, &words(&[name[0], name[1], 0, 0, 0]));
        let head = builder.instance(
            metadata,
            &words(&[name[0], name[1], tail.address.0, 1.0f64.to_bits(), 2.5f64.to_bits()]),
        );
        let stray = builder.alloc(&[0; 16]);
        let dangling = builder.instance(metadata, &words(&[name[0], name[1], stray.0, 0, 0]));
        let walker = walker(&builder);
        let ty = walker.type_descriptor(MetadataHandle::new(metadata)).unwrap();
        let fields = walker.fields(&ty).unwrap();
        let show = |object: &ObjectHandle, i: usize| {
            safe_display_value(&walker, DescriptionVerbosity::Normal, object, &fields[i])
        };

        assert_eq!(show(&head, 0), "\"leaf\"");
        assert_eq!(show(&head, 1), format!("<main.Node: {}>", tail.address));
        assert_eq!(show(&tail, 1), "nil");
        assert_eq!(show(&dangling, 1), format!("<{}>", stray));
        assert_eq!(show(&head, 2), "{1, 2.5}");
    }

    #[test]
    fn test_failures_become_sentinels() {
        let mut builder = LayoutBuilder::new();
        let main = builder.module("main");
        let desc = builder.type_descriptor(ContextKind::Struct, main, "Point", 0, 1);
        builder
            .field_descriptor(desc, &[FieldSpec::new("x", "Sd")])
            .unwrap();
        let metadata = builder.struct_metadata(desc, ValueWitness::pod(8, 8), &[], &[0]);
        let walker = walker(&builder);
        let ty = walker.type_descriptor(MetadataHandle::new(metadata)).unwrap();
        let fields = walker.fields(&ty).unwrap();

        // Truncated handle: the field no longer fits.
        let value = builder.value(metadata, &[0; 4]);
        let show = |verbosity| safe_display_value(&walker, verbosity, &value, &fields[0]);
        assert_eq!(show(DescriptionVerbosity::Minimal), UNREADABLE);
        assert_eq!(show(DescriptionVerbosity::Normal), "<unreadable: out of bounds>");
        let detailed = show(DescriptionVerbosity::Detailed);
        assert!(detailed.starts_with("<unreadable: Field at "), "{}", detailed);
    }
}

//! Consumer facade
//!
//! [`Inspector`] is the only entry point a debugging UI needs: it walks the
//! object's type, lists synthetic members, formats values, commits edits and
//! builds a bounded child hierarchy. A registered [`HostBridge`] is consulted
//! first for each overridable operation.

use crate::diagnostics::{self, DebugInfo};
use crate::display;
use crate::encoding;
use crate::framework::{self, FrameworkState};
use crate::host::HostBridge;
use crate::members;
use lens_core::{
    Address, CacheStatistics, DescriptionVerbosity, DemangledName, Error, FieldRecord,
    InspectorCache, InspectorConfig, NameKind, ObjectHandle, ReferenceStorage, Result,
    SyntheticMember, TypeDescriptor, TypeKind,
};
use lens_demangle::{innermost_view, readable_framework_type_name, Demangler};
use lens_memory::MemoryReader;
use lens_runtime::{Accessor, FieldValue, MetadataWalker};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, trace};

const FRAMEWORK_MODULE: &str = "SwiftUI";
const IMPORTED_MODULE: &str = "__C";
const NORMAL_DESCRIPTION_PAIRS: usize = 8;

/// Everything a consumer renders for one object
#[derive(Debug, Clone)]
pub struct Description {
    pub address: Address,
    pub readable_type_name: String,
    pub type_name: String,
    pub kind: TypeKind,
    pub enhanced_description: String,
    pub synthetic_members: Vec<SyntheticMember>,
    /// Superclass names, nearest first.
    pub inheritance: Vec<String>,
    pub hierarchy: Option<Vec<Description>>,
}

impl Description {
    /// Node reached by following `path` through nested hierarchies; the empty path is `self`.
    pub fn child_at(&self, path: &[usize]) -> Option<&Description> {
        path.iter().try_fold(self, |node, &index| node.hierarchy.as_ref()?.get(index))
    }

    /// This node and its descendants whose type is `type_name`, depth first.
    ///
    /// Matches the readable name, the full type name or its simple name.
    pub fn find_by_type(&self, type_name: &str) -> Vec<&Description> {
        let mut found = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.has_type(type_name) {
                found.push(node);
            }
            if let Some(children) = &node.hierarchy {
                stack.extend(children.iter().rev());
            }
        }
        found
    }

    fn has_type(&self, type_name: &str) -> bool {
        let base = self.type_name.split('<').next().unwrap_or(&self.type_name);
        self.readable_type_name == type_name
            || self.type_name == type_name
            || base == type_name
            || base.rsplit('.').next() == Some(type_name)
    }
}

/// Introspects foreign objects living in `M`
pub struct Inspector<M> {
    walker: MetadataWalker<M>,
    config: InspectorConfig,
    host: Option<Arc<dyn HostBridge>>,
}

impl<M: MemoryReader> Inspector<M> {
    /// Inspector sharing the process-wide cache
    pub fn new(memory: M, config: InspectorConfig) -> Self {
        Self::with_cache(memory, config, InspectorCache::global())
    }

    pub fn with_cache(memory: M, config: InspectorConfig, cache: Arc<InspectorCache>) -> Self {
        let demangler = Arc::new(Demangler::new(cache, config.clone()));
        Self {
            walker: MetadataWalker::new(memory, demangler),
            config,
            host: None,
        }
    }

    /// Register host overrides
    pub fn with_host(mut self, host: Arc<dyn HostBridge>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn walker(&self) -> &MetadataWalker<M> {
        &self.walker
    }

    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    /// Describe `object`, including children up to the configured depth
    pub fn describe(&self, object: &ObjectHandle) -> Result<Description> {
        let mut visited = HashSet::new();
        self.describe_at(object, 0, &mut visited)
    }

    fn describe_at(
        &self,
        object: &ObjectHandle,
        depth: usize,
        visited: &mut HashSet<Address>,
    ) -> Result<Description> {
        visited.insert(object.address);
        let ty = self.walker.type_of(object)?;
        let fields = self.stored_fields(&ty);
        let readable_type_name = self.readable_type_name(&ty.name);

        let enhanced_description = match self.host.as_ref().and_then(|h| h.describe(object)) {
            Some(description) => description,
            None => self.enhanced_description(object, &ty, &readable_type_name, &fields),
        };

        let hierarchy = if depth < self.config.limits.max_hierarchy_depth {
            let children = self.children(object, &fields, depth, visited);
            (!children.is_empty()).then_some(children)
        } else {
            None
        };

        debug!(
            object = %object.address,
            type_name = %ty.name,
            fields = fields.len(),
            depth,
            "Described object"
        );
        Ok(Description {
            address: object.address,
            readable_type_name,
            type_name: ty.name.to_string(),
            kind: ty.kind,
            enhanced_description,
            synthetic_members: members::synthesize(&self.walker, &fields),
            inheritance: ty.ancestors().map(|t| t.name.to_string()).collect(),
            hierarchy,
        })
    }

    /// Stored fields of `ty` and its ancestors, ancestors first. Missing field info is an empty list.
    fn stored_fields(&self, ty: &TypeDescriptor) -> Vec<FieldRecord> {
        let mut chain: Vec<&TypeDescriptor> = ty.ancestors().collect();
        chain.reverse();
        chain.push(ty);

        let mut fields = Vec::new();
        for level in chain {
            match self.walker.fields(level) {
                Ok(own) => fields.extend(own.iter().cloned()),
                Err(e) => debug!(type_name = %level.name, error = %e, "No fields listed"),
            }
        }
        fields
    }

    fn field_named(&self, object: &ObjectHandle, name: &str) -> Result<FieldRecord> {
        let ty = self.walker.type_of(object)?;
        self.stored_fields(&ty)
            .into_iter()
            .find(|field| field.name == name)
            .ok_or_else(|| Error::no_field_info(format!("{} has no stored field {}", ty.name, name)))
    }

    /// Framework types show their innermost view; everything else its readable name.
    pub fn readable_type_name(&self, name: &DemangledName) -> String {
        if name.module.as_deref() != Some(FRAMEWORK_MODULE) {
            return name.readable_name();
        }
        let inner = innermost_view(name, &self.config.swiftui);
        if inner.module.as_deref() == Some(FRAMEWORK_MODULE) {
            readable_framework_type_name(&inner.readable_name())
        } else {
            inner.readable_name()
        }
    }

    fn enhanced_description(
        &self,
        object: &ObjectHandle,
        ty: &TypeDescriptor,
        readable: &str,
        fields: &[FieldRecord],
    ) -> String {
        let verbosity = self.config.verbosity;
        if verbosity == DescriptionVerbosity::Minimal {
            return readable.to_string();
        }

        // Enum payloads are not decoded, so cases contribute no pairs.
        let readable_fields: &[FieldRecord] = if ty.kind == TypeKind::Enum { &[] } else { fields };
        let limit = match verbosity {
            DescriptionVerbosity::Detailed => readable_fields.len(),
            _ => NORMAL_DESCRIPTION_PAIRS,
        };
        let mut pairs: Vec<String> = readable_fields
            .iter()
            .take(limit)
            .map(|field| {
                let value = display::safe_display_value(&self.walker, verbosity, object, field);
                format!("{}: {}", field.name, value)
            })
            .collect();
        if readable_fields.len() > limit {
            pairs.push("...".to_string());
        }

        match verbosity {
            DescriptionVerbosity::Detailed => format!(
                "{} {}({}) @ {}",
                ty.kind,
                readable,
                pairs.join(", "),
                object.address
            ),
            _ => format!("{}({})", readable, pairs.join(", ")),
        }
    }

    fn children(
        &self,
        object: &ObjectHandle,
        fields: &[FieldRecord],
        depth: usize,
        visited: &mut HashSet<Address>,
    ) -> Vec<Description> {
        let handles = match self.host.as_ref().and_then(|h| h.hierarchy(object)) {
            Some(handles) => handles,
            None => self.child_handles(object, fields),
        };

        let mut children = Vec::new();
        for child in handles {
            if visited.contains(&child.address) {
                trace!(child = %child.address, "Skipping visited object");
                continue;
            }
            match self.describe_at(&child, depth + 1, visited) {
                Ok(description) => children.push(description),
                Err(e) => debug!(child = %child.address, error = %e, "Child is not introspectable"),
            }
        }
        children
    }

    /// Non-nil strong class references whose metadata can be walked.
    fn child_handles(&self, object: &ObjectHandle, fields: &[FieldRecord]) -> Vec<ObjectHandle> {
        let accessor = Accessor::new(&self.walker);
        fields
            .iter()
            .filter(|field| field.storage == ReferenceStorage::Strong)
            .filter_map(|field| match accessor.read(object, field) {
                Ok(FieldValue::Reference(reference)) => self.instance_at(reference.address()),
                _ => None,
            })
            .collect()
    }

    /// Handle for a class instance at `address`, sized by its class.
    fn instance_at(&self, address: Address) -> Option<ObjectHandle> {
        let probe = ObjectHandle::instance(address, 8);
        let ty = self.walker.type_of(&probe).ok()?;
        match (ty.kind, ty.layout) {
            (TypeKind::Class, Some(layout)) => Some(ObjectHandle::instance(address, layout.size)),
            _ => None,
        }
    }

    /// Synthetic members for every stored field of `object`
    pub fn synthetic_members(&self, object: &ObjectHandle) -> Result<Vec<SyntheticMember>> {
        let ty = self.walker.type_of(object)?;
        Ok(members::synthesize(&self.walker, &self.stored_fields(&ty)))
    }

    pub fn encode_field(&self, field: &FieldRecord) -> Result<String> {
        encoding::encode_field(&self.walker, field)
    }

    /// Display text for `field`; never fails
    pub fn safe_display_value(&self, object: &ObjectHandle, field: &FieldRecord) -> String {
        display::safe_display_value(&self.walker, self.config.verbosity, object, field)
    }

    /// Current value of the stored field `name`
    pub fn read_field<'o>(&self, object: &'o ObjectHandle, name: &str) -> Result<FieldValue<'o>> {
        let field = self.field_named(object, name)?;
        Accessor::new(&self.walker).read(object, &field)
    }

    /// Commit an edit to the stored field `name`
    pub fn set_field(&self, object: &ObjectHandle, name: &str, value: &FieldValue<'_>) -> Result<()> {
        let field = self.field_named(object, name)?;
        Accessor::new(&self.walker).write(object, &field, value)?;
        info!(object = %object.address, field = name, value = %value, "Field updated");
        Ok(())
    }

    /// Platform-native views referenced by `object`
    pub fn discover_native_views(&self, object: &ObjectHandle) -> Vec<Address> {
        if let Some(views) = self.host.as_ref().and_then(|h| h.discover_native_views(object)) {
            return views;
        }
        let Ok(ty) = self.walker.type_of(object) else {
            return Vec::new();
        };
        let accessor = Accessor::new(&self.walker);
        self.stored_fields(&ty)
            .iter()
            .filter(|field| self.is_imported_class_field(field))
            .filter_map(|field| match accessor.read(object, field) {
                Ok(FieldValue::Reference(reference)) => Some(reference.address()),
                _ => None,
            })
            .collect()
    }

    fn is_imported_class_field(&self, field: &FieldRecord) -> bool {
        let Ok(ty) = self.walker.resolve_field_type(field) else {
            return false;
        };
        let name = if ty.name.is_optional() {
            &ty.name.generic_arguments[0]
        } else {
            &ty.name
        };
        name.kind == NameKind::Class && name.module.as_deref() == Some(IMPORTED_MODULE)
    }

    /// Whether a platform-native view of class `class_name` is backed by the framework
    pub fn is_backed_view(&self, object: &ObjectHandle, class_name: &str) -> bool {
        if let Some(backed) = self.host.as_ref().and_then(|h| h.is_backed_view(object, class_name)) {
            return backed;
        }
        self.config.swiftui.is_backed_class_name(class_name)
    }

    /// Property wrappers and modifiers of a framework view
    pub fn framework_state(&self, object: &ObjectHandle) -> Result<FrameworkState> {
        let ty = self.walker.type_of(object)?;
        let fields = self.stored_fields(&ty);
        Ok(framework::framework_state(
            &self.walker,
            &self.config.swiftui,
            object,
            &ty,
            &fields,
        ))
    }

    /// Descriptions in the hierarchy under `root` (inclusive) whose type is `type_name`
    pub fn find_views_of_type(&self, root: &ObjectHandle, type_name: &str) -> Result<Vec<Description>> {
        let description = self.describe(root)?;
        let found: Vec<Description> = description
            .find_by_type(type_name)
            .into_iter()
            .cloned()
            .collect();
        debug!(root = %root.address, type_name, matches = found.len(), "Searched hierarchy");
        Ok(found)
    }

    /// Description at `path` of child indices below `root`
    pub fn view_at_path(&self, root: &ObjectHandle, path: &[usize]) -> Result<Option<Description>> {
        Ok(self.describe(root)?.child_at(path).cloned())
    }

    /// Type, layout, per-field encodings and framework details of `object`
    pub fn debug_info(&self, object: &ObjectHandle) -> Result<DebugInfo> {
        let ty = self.walker.type_of(object)?;
        let fields = self.stored_fields(&ty);
        let mut info = DebugInfo::for_type(object, &ty, self.readable_type_name(&ty.name));
        info.is_framework_type = ty.name.module.as_deref() == Some(FRAMEWORK_MODULE);
        info.framework = framework::framework_state(&self.walker, &self.config.swiftui, object, &ty, &fields);
        info.native_views = self
            .discover_native_views(object)
            .iter()
            .map(Address::to_string)
            .collect();
        info.fields = fields
            .iter()
            .map(|field| diagnostics::field_info(&self.walker, DescriptionVerbosity::Detailed, object, field))
            .collect();
        Ok(info)
    }

    /// Drop every cached name, type and field list
    pub fn clear_caches(&self) {
        self.walker.cache().clear();
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.walker.cache().statistics()
    }
}

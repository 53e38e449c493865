//! Property wrappers and modifiers of component-framework views
//!
//! Stored fields whose type is one of the framework's property wrappers are
//! grouped into state, bindings, environment values and observed objects.
//! Simple wrapped values stored inline are decoded for display.

use crate::display;
use lens_core::{
    BuiltinType, DemangledName, FieldRecord, FieldTypeRef, FrameworkConfig, ObjectHandle,
    ReferenceStorage, TypeDescriptor,
};
use lens_demangle::modifier_names;
use lens_memory::MemoryReader;
use lens_runtime::{Accessor, MetadataWalker};
use serde::Serialize;
use tracing::trace;

const FRAMEWORK_MODULE: &str = "SwiftUI";
const UNRESOLVED: &str = "<unresolved>";

/// Property wrappers recognised on view fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PropertyWrapper {
    State,
    StateObject,
    Binding,
    Environment,
    EnvironmentObject,
    ObservedObject,
    FocusState,
    GestureState,
    AppStorage,
    SceneStorage,
}

/// Section a wrapped property is listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperSection {
    State,
    Binding,
    Environment,
    Observed,
}

impl PropertyWrapper {
    /// Wrapper named by a field's resolved type, if any.
    pub fn from_name(name: &DemangledName) -> Option<Self> {
        if name.module.as_deref() != Some(FRAMEWORK_MODULE) || !name.context.is_empty() {
            return None;
        }
        let wrapper = match name.type_name.as_str() {
            "State" => Self::State,
            "StateObject" => Self::StateObject,
            "Binding" => Self::Binding,
            "Environment" => Self::Environment,
            "EnvironmentObject" => Self::EnvironmentObject,
            "ObservedObject" => Self::ObservedObject,
            "FocusState" => Self::FocusState,
            "GestureState" => Self::GestureState,
            "AppStorage" => Self::AppStorage,
            "SceneStorage" => Self::SceneStorage,
            _ => return None,
        };
        Some(wrapper)
    }

    pub fn section(self) -> WrapperSection {
        match self {
            Self::State | Self::FocusState | Self::GestureState | Self::AppStorage | Self::SceneStorage => {
                WrapperSection::State
            }
            Self::Binding => WrapperSection::Binding,
            Self::Environment | Self::EnvironmentObject => WrapperSection::Environment,
            Self::StateObject | Self::ObservedObject => WrapperSection::Observed,
        }
    }

    /// Offset of the wrapped value inside the wrapper, for wrappers that store it inline first.
    ///
    /// `State` starts with its value. `Binding` keeps a transaction and a location ahead of it.
    fn inline_value_offset(self) -> Option<u64> {
        match self {
            Self::State => Some(0),
            Self::Binding => Some(16),
            _ => None,
        }
    }
}

/// One property-wrapper field of a view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrappedProperty {
    /// Declared property name, without the wrapper's leading underscore.
    pub name: String,
    /// Stored field name.
    pub field: String,
    pub wrapper: PropertyWrapper,
    pub value_type: String,
    /// Display text of the wrapped value when it is stored inline and simple.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub offset: u64,
}

/// Wrapped properties and modifiers of one view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrameworkState {
    pub state: Vec<WrappedProperty>,
    pub bindings: Vec<WrappedProperty>,
    pub environment: Vec<WrappedProperty>,
    pub observed: Vec<WrappedProperty>,
    /// Modifier types applied to the view or to content it stores, innermost first.
    pub modifiers: Vec<String>,
}

impl FrameworkState {
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
            && self.bindings.is_empty()
            && self.environment.is_empty()
            && self.observed.is_empty()
            && self.modifiers.is_empty()
    }

    fn push(&mut self, property: WrappedProperty) {
        let section = match property.wrapper.section() {
            WrapperSection::State => &mut self.state,
            WrapperSection::Binding => &mut self.bindings,
            WrapperSection::Environment => &mut self.environment,
            WrapperSection::Observed => &mut self.observed,
        };
        section.push(property);
    }
}

/// Collect wrapped properties from `fields` and modifiers from `ty` and its stored content.
pub fn framework_state<M: MemoryReader>(
    walker: &MetadataWalker<M>,
    config: &FrameworkConfig,
    object: &ObjectHandle,
    ty: &TypeDescriptor,
    fields: &[FieldRecord],
) -> FrameworkState {
    let mut state = FrameworkState {
        modifiers: modifier_names(&ty.name, config),
        ..FrameworkState::default()
    };

    for field in fields {
        if !matches!(field.type_ref, FieldTypeRef::Deferred(_)) {
            continue;
        }
        let resolved = match walker.resolve_field_type(field) {
            Ok(resolved) => resolved,
            Err(e) => {
                trace!(field = %field.name, error = %e, "Field type unresolved");
                continue;
            }
        };
        match PropertyWrapper::from_name(&resolved.name) {
            Some(wrapper) => state.push(wrapped_property(walker, object, field, wrapper, &resolved.name)),
            None => state.modifiers.extend(modifier_names(&resolved.name, config)),
        }
    }
    state
}

fn wrapped_property<M: MemoryReader>(
    walker: &MetadataWalker<M>,
    object: &ObjectHandle,
    field: &FieldRecord,
    wrapper: PropertyWrapper,
    name: &DemangledName,
) -> WrappedProperty {
    let wrapped = name.generic_arguments.first();
    WrappedProperty {
        name: field.name.strip_prefix('_').unwrap_or(&field.name).to_string(),
        field: field.name.clone(),
        wrapper,
        value_type: wrapped.map_or_else(|| UNRESOLVED.to_string(), DemangledName::readable_name),
        value: wrapped.and_then(|value_name| inline_value(walker, object, field, wrapper, value_name)),
        offset: field.byte_offset,
    }
}

/// Reads the wrapped value as its builtin type at its inline offset.
fn inline_value<M: MemoryReader>(
    walker: &MetadataWalker<M>,
    object: &ObjectHandle,
    field: &FieldRecord,
    wrapper: PropertyWrapper,
    value_name: &DemangledName,
) -> Option<String> {
    if !value_name.generic_arguments.is_empty() || !value_name.context.is_empty() {
        return None;
    }
    let builtin = BuiltinType::from_qualified(value_name.module.as_deref()?, &value_name.type_name)?;
    let offset = wrapper.inline_value_offset()?;

    let slot = FieldRecord {
        type_ref: FieldTypeRef::Builtin(builtin),
        byte_offset: field.byte_offset.checked_add(offset)?,
        storage: ReferenceStorage::Strong,
        is_weak: false,
        is_reference: false,
        is_indirect: false,
        ..field.clone()
    };
    match Accessor::new(walker).read(object, &slot) {
        Ok(value) => Some(display::format_value(walker, &value)),
        Err(e) => {
            trace!(field = %field.name, error = %e, "Wrapped value unreadable");
            None
        }
    }
}

//! Second pass over names from the component framework

use crate::detect::is_mangled_name;
use lens_core::{DemangledName, FrameworkConfig};

const MODULE_SEGMENT: &str = "7SwiftUI";
const MODULE_NAME: &str = "SwiftUI";
const MODIFIED_CONTENT: &str = "ModifiedContent";
const MAX_UNWRAP: usize = 64;

/// Known internal classes and their readable labels. More specific names come first.
const READABLE_LABELS: &[(&str, &str)] = &[
    ("HostingScrollView", "SwiftUI Hosting ScrollView"),
    ("PlatformGroupContainer", "SwiftUI Platform Group Container"),
    ("ListTableViewCell", "SwiftUI List Cell"),
    ("UIShapeHitTestingView", "SwiftUI Shape Container"),
    ("UIKitSwiftUIView", "SwiftUI UIKit Bridge"),
    ("SystemBackgroundView", "SwiftUI System Background"),
    ("ScrollViewReader", "SwiftUI ScrollView Reader"),
    ("HostingView", "SwiftUI Hosting View"),
    ("DisplayList", "SwiftUI Display List"),
    ("ViewHost", "SwiftUI View Host"),
    ("ContainerView", "SwiftUI Container View"),
    ("LayoutView", "SwiftUI Layout View"),
    ("WrapperView", "SwiftUI Wrapper View"),
    ("BackgroundView", "SwiftUI Background View"),
    ("LazyVGrid", "SwiftUI LazyVGrid"),
    ("LazyHGrid", "SwiftUI LazyHGrid"),
    ("LazyVStack", "SwiftUI LazyVStack"),
    ("LazyHStack", "SwiftUI LazyHStack"),
    ("ModifiedContent", "ModifiedView"),
    ("_ConditionalContent", "ConditionalView"),
    ("_ViewModifier_Content", "ViewModifier"),
    ("TupleView", "TupleView"),
];

/// `true` for mangled names carrying the framework's module segment.
pub fn is_swiftui_name(name: &str) -> bool {
    is_mangled_name(name) && name.contains(MODULE_SEGMENT)
}

/// Strips configured wrapper types down to the innermost user-meaningful type.
pub fn innermost_view<'a>(name: &'a DemangledName, config: &FrameworkConfig) -> &'a DemangledName {
    let mut current = name;
    for _ in 0..MAX_UNWRAP {
        let content = config
            .content_argument(&current.type_name)
            .and_then(|index| current.generic_arguments.get(index));
        match content {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}

/// Readable names of the modifiers applied through `ModifiedContent`, innermost first.
///
/// Other configured wrappers are looked through on the way down.
pub fn modifier_names(name: &DemangledName, config: &FrameworkConfig) -> Vec<String> {
    let mut modifiers = Vec::new();
    let mut current = name;
    for _ in 0..MAX_UNWRAP {
        if current.module.as_deref() == Some(MODULE_NAME) && current.type_name == MODIFIED_CONTENT {
            if let Some(modifier) = current.generic_arguments.get(1) {
                modifiers.push(modifier.readable_name());
            }
        }
        let content = config
            .content_argument(&current.type_name)
            .and_then(|index| current.generic_arguments.get(index));
        match content {
            Some(inner) => current = inner,
            None => break,
        }
    }
    modifiers.reverse();
    modifiers
}

/// Simple name of [`innermost_view`].
pub fn innermost_view_name(name: &DemangledName, config: &FrameworkConfig) -> String {
    innermost_view(name, config).simple_name().to_string()
}

/// Readable label for a known internal class, otherwise the name without generics.
pub fn readable_framework_type_name(simple: &str) -> String {
    let base = simple
        .strip_prefix("SwiftUI.")
        .unwrap_or(simple)
        .split('<')
        .next()
        .unwrap_or(simple);

    READABLE_LABELS
        .iter()
        .find(|(name, _)| *name == base)
        .or_else(|| READABLE_LABELS.iter().find(|(name, _)| base.contains(name)))
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| base.to_string())
}

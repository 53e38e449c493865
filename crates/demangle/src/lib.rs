//! Symbol demangler for the foreign type inspector
//!
//! Mangled names are classified by prefix, decoded by a strict grammar and,
//! when that fails, reduced to whatever identifiers can be recovered. Results
//! are cached in the shared [`lens_core::InspectorCache`].

pub mod demangler;
pub mod detect;
pub mod fallback;
pub mod legacy;
pub mod parser;
pub mod standard;
pub mod swiftui;

pub use demangler::Demangler;
pub use detect::{classify, is_mangled_name, Grammar};
pub use fallback::fallback_demangle;
pub use parser::{parse_type, SymbolicResolver};
pub use swiftui::{
    innermost_view, innermost_view_name, is_swiftui_name, modifier_names, readable_framework_type_name,
};

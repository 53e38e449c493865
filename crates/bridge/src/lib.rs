//! Type-encoding bridge and inspector facade
//!
//! Maps walked foreign types onto the local type-encoding grammar, fabricates
//! synthetic members for generic reflection UI, and exposes [`Inspector`] as
//! the single consumer entry point.

pub mod diagnostics;
pub mod display;
pub mod encoding;
pub mod framework;
pub mod host;
pub mod inspector;
pub mod members;
pub mod output;

pub use diagnostics::{DebugInfo, FieldDebugInfo};
pub use display::{safe_display_value, UNREADABLE};
pub use encoding::{encode, encode_field, encode_name, is_valid_type_encoding, size_info, UNKNOWN_ENCODING};
pub use framework::{FrameworkState, PropertyWrapper, WrappedProperty, WrapperSection};
pub use host::HostBridge;
pub use inspector::{Description, Inspector};
pub use members::synthesize;
pub use output::{render_json, render_tree, DescriptionJson};

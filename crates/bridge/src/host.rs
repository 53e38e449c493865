//! Host override strategy
//!
//! An embedding host that knows the component framework better than the
//! built-in heuristics can register a [`HostBridge`]. Each method returns
//! `None` to defer to the built-in path.

use lens_core::{Address, ObjectHandle};

pub trait HostBridge: Send + Sync {
    /// Enhanced description of a foreign view
    fn describe(&self, _object: &ObjectHandle) -> Option<String> {
        None
    }

    /// Child objects of a foreign view, in display order
    fn hierarchy(&self, _object: &ObjectHandle) -> Option<Vec<ObjectHandle>> {
        None
    }

    /// Platform-native views backing a foreign view
    fn discover_native_views(&self, _object: &ObjectHandle) -> Option<Vec<Address>> {
        None
    }

    /// Whether a platform-native view of class `class_name` is backed by the framework
    fn is_backed_view(&self, _object: &ObjectHandle, _class_name: &str) -> Option<bool> {
        None
    }
}

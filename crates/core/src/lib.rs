//! Core types and shared state for the foreign type inspector
//!
//! This crate provides the data model, error taxonomy, configuration and the
//! process-wide cache used by every other component.

pub mod cache;
pub mod config;
pub mod error;
pub mod types;

pub use cache::{CacheStatistics, InspectorCache, NamespaceStats};
pub use config::{DescriptionVerbosity, FrameworkConfig, InspectorConfig, WalkLimits};
pub use error::{Error, Result};
pub use types::*;

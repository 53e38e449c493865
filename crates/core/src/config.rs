//! Inspector configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Inspector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// How much detail enhanced descriptions carry
    pub verbosity: DescriptionVerbosity,
    /// Upper bounds applied while walking foreign memory
    pub limits: WalkLimits,
    /// Use the heuristic extractor when the strict grammar fails
    pub fallback_demangling: bool,
    /// Component-framework specific settings
    pub swiftui: FrameworkConfig,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            verbosity: DescriptionVerbosity::Normal,
            limits: WalkLimits::default(),
            fallback_demangling: true,
            swiftui: FrameworkConfig::default(),
        }
    }
}

/// Description verbosity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DescriptionVerbosity {
    Minimal,
    #[default]
    Normal,
    Detailed,
}

/// Bounds on every walk over foreign records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkLimits {
    pub max_name_length: usize,
    pub max_fields: usize,
    pub max_generic_depth: usize,
    pub max_parent_depth: usize,
    pub max_string_bytes: usize,
    pub max_hierarchy_depth: usize,
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self {
            max_name_length: 256,
            max_fields: 1024,
            max_generic_depth: 8,
            max_parent_depth: 16,
            max_string_bytes: 4096,
            max_hierarchy_depth: 3,
        }
    }
}

/// Component-framework configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Wrapper type name -> index of the generic argument holding the content
    pub wrappers: BTreeMap<String, usize>,
    /// Class-name fragments identifying platform views backed by the framework
    pub backed_view_patterns: Vec<String>,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        let wrappers = [
            "ModifiedContent",
            "_UIHostingView",
            "UIHostingController",
            "_UIHostingController",
            "Optional",
            "_ViewModifier_Content",
        ]
        .into_iter()
        .map(|name| (name.to_string(), 0))
        .collect();

        let backed_view_patterns = [
            "UIHostingView",
            "_UIHostingView",
            "SwiftUI",
            "HostingScrollView",
            "PlatformGroupContainer",
            "ListTableViewCell",
            "DisplayList",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            wrappers,
            backed_view_patterns,
        }
    }
}

impl FrameworkConfig {
    pub fn content_argument(&self, wrapper: &str) -> Option<usize> {
        self.wrappers.get(wrapper).copied()
    }

    pub fn is_backed_class_name(&self, class_name: &str) -> bool {
        self.backed_view_patterns
            .iter()
            .any(|pattern| class_name.contains(pattern.as_str()))
    }
}

impl InspectorConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InspectorConfig::default();
        assert!(config.fallback_demangling);
        assert_eq!(config.limits.max_fields, 1024);
        assert_eq!(config.swiftui.content_argument("ModifiedContent"), Some(0));
        assert_eq!(config.swiftui.content_argument("AnyView"), None);
        assert!(config
            .swiftui
            .is_backed_class_name("_TtC7SwiftUI17HostingScrollView"));
        assert!(!config.swiftui.is_backed_class_name("UILabel"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: InspectorConfig =
            serde_json::from_str(r#"{ "verbosity": "Detailed", "limits": { "max_fields": 4 } }"#)
                .unwrap();
        assert_eq!(config.verbosity, DescriptionVerbosity::Detailed);
        assert_eq!(config.limits.max_fields, 4);
        assert_eq!(config.limits.max_name_length, 256);
        assert!(config.fallback_demangling);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("lens-config-{}.json", std::process::id()));
        let mut config = InspectorConfig::default();
        config.fallback_demangling = false;
        config.save(&path).unwrap();

        let loaded = InspectorConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let path = std::env::temp_dir().join(format!("lens-bad-{}.json", std::process::id()));
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            InspectorConfig::load(&path),
            Err(crate::Error::Config(_))
        ));
        let _ = std::fs::remove_file(&path);
    }
}

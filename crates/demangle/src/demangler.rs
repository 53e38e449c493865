//! Cached two-stage demangling pipeline

use crate::detect::{classify, is_mangled_name, Grammar};
use crate::fallback::fallback_demangle;
use crate::legacy::parse_runtime_class;
use crate::parser::{parse_symbol, parse_type, SymbolicResolver};
use crate::swiftui::innermost_view_name;
use lens_core::{Demangled, DemangledName, Error, InspectorCache, InspectorConfig, Result};
use std::sync::Arc;
use tracing::{debug, trace};

/// Symbol demangler backed by the shared cache
pub struct Demangler {
    cache: Arc<InspectorCache>,
    config: InspectorConfig,
}

impl Demangler {
    pub fn new(cache: Arc<InspectorCache>, config: InspectorConfig) -> Self {
        Self { cache, config }
    }

    pub fn cache(&self) -> &Arc<InspectorCache> {
        &self.cache
    }

    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    /// Demangle a full symbol, strict grammar first and the heuristic extractor second.
    pub fn demangle(&self, mangled: &str) -> Result<Demangled> {
        if !is_mangled_name(mangled) {
            return Err(Error::NotMangled);
        }
        if let Some(hit) = self.cache.get_demangled(mangled) {
            trace!(symbol = mangled, "Demangle cache hit");
            return Ok(hit);
        }

        let (grammar, prefix_len) = classify(mangled).ok_or(Error::NotMangled)?;
        let body = &mangled[prefix_len..];
        let strict = match grammar {
            Grammar::Postfix => parse_symbol(body, prefix_len),
            Grammar::RuntimeClass => parse_runtime_class(body, prefix_len),
            Grammar::Legacy => Err(Error::unsupported_grammar(
                prefix_len,
                "legacy entity grammar",
            )),
        };

        let result = match strict {
            Ok(name) => Demangled::Full(name),
            Err(err) if self.config.fallback_demangling => {
                debug!(symbol = mangled, error = %err, "Strict demangling failed, using fallback");
                match fallback_demangle(grammar, body, prefix_len) {
                    Ok(partial) => partial,
                    Err(_) => return Err(err),
                }
            }
            Err(err) => {
                debug!(symbol = mangled, error = %err, "Demangling failed");
                return Err(err);
            }
        };

        Ok(self.cache.insert_demangled(mangled, result))
    }

    /// Demangle a prefix-less type mangling as found in metadata.
    pub fn demangle_type(&self, raw: &[u8]) -> Result<DemangledName> {
        self.demangle_type_with(raw, None)
    }

    /// Like [`Demangler::demangle_type`], resolving symbolic references through `resolver`.
    ///
    /// Only plain-text manglings are cached; symbolic references depend on
    /// where the bytes live.
    pub fn demangle_type_with(
        &self,
        raw: &[u8],
        resolver: Option<&dyn SymbolicResolver>,
    ) -> Result<DemangledName> {
        if raw.is_empty() {
            return Err(Error::NotMangled);
        }

        let text = std::str::from_utf8(raw)
            .ok()
            .filter(|text| text.bytes().all(|b| b.is_ascii_graphic()));

        if let Some(text) = text {
            if let Some(hit) = self.cache.get_demangled(text) {
                return Ok(hit.into_name());
            }
            let name = parse_type(raw, resolver)?;
            let stored = self
                .cache
                .insert_demangled(text, Demangled::Full(name));
            return Ok(stored.into_name());
        }

        parse_type(raw, resolver)
    }

    /// Readable form of `mangled`, or the input unchanged when it cannot be decoded.
    pub fn demangle_symbol_name(&self, mangled: &str) -> String {
        match self.demangle(mangled) {
            Ok(demangled) => demangled.name().to_string(),
            Err(_) => mangled.to_string(),
        }
    }

    pub fn extract_module_name(&self, mangled: &str) -> Option<String> {
        self.demangle(mangled).ok()?.into_name().module
    }

    pub fn extract_type_name(&self, mangled: &str) -> Option<String> {
        let name = self.demangle(mangled).ok()?.into_name();
        (!name.type_name.is_empty()).then_some(name.type_name)
    }

    /// Generic arguments of the demangled type, rendered fully qualified.
    pub fn extract_generic_parameters(&self, mangled: &str) -> Vec<String> {
        match self.demangle(mangled) {
            Ok(demangled) if demangled.name().is_generic() => demangled
                .name()
                .generic_arguments
                .iter()
                .map(DemangledName::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Innermost view type of a framework symbol.
    pub fn extract_view_type(&self, mangled: &str) -> Option<String> {
        let demangled = self.demangle(mangled).ok()?;
        Some(innermost_view_name(demangled.name(), &self.config.swiftui))
    }
}

impl Default for Demangler {
    fn default() -> Self {
        Self::new(InspectorCache::global(), InspectorConfig::default())
    }
}

impl std::fmt::Debug for Demangler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Demangler")
            .field("fallback_demangling", &self.config.fallback_demangling)
            .finish()
    }
}

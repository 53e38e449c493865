//! Process-wide memoization of demangled names and walked metadata

use crate::types::{Demangled, FieldRecord, TypeDescriptor, TypeIdentity};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Hit/miss counters of one namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub demangling: NamespaceStats,
    pub metadata: NamespaceStats,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    fn record<T>(&self, found: Option<T>) -> Option<T> {
        match found {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn snapshot(&self, entries: usize) -> NamespaceStats {
        NamespaceStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: entries as u64,
        }
    }

    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

static GLOBAL: Lazy<Arc<InspectorCache>> = Lazy::new(|| Arc::new(InspectorCache::new()));

/// Shared cache for demangled names, type descriptors and field lists.
///
/// Entries are never evicted; `clear` is the only invalidation. Insertion of
/// an existing key keeps the first stored value and hands it back.
#[derive(Default)]
pub struct InspectorCache {
    demangled: DashMap<String, Demangled>,
    demangle_stats: Counters,
    types: DashMap<TypeIdentity, Arc<TypeDescriptor>>,
    fields: DashMap<TypeIdentity, Arc<Vec<FieldRecord>>>,
    metadata_stats: Counters,
}

impl InspectorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lazily created process-wide instance
    pub fn global() -> Arc<InspectorCache> {
        Arc::clone(&GLOBAL)
    }

    pub fn get_demangled(&self, symbol: &str) -> Option<Demangled> {
        let found = self.demangled.get(symbol).map(|entry| entry.value().clone());
        self.demangle_stats.record(found)
    }

    pub fn insert_demangled(&self, symbol: &str, value: Demangled) -> Demangled {
        self.demangled
            .entry(symbol.to_string())
            .or_insert(value)
            .value()
            .clone()
    }

    pub fn get_type(&self, identity: &TypeIdentity) -> Option<Arc<TypeDescriptor>> {
        let found = self.types.get(identity).map(|entry| Arc::clone(entry.value()));
        self.metadata_stats.record(found)
    }

    /// Stores a walked descriptor, returning whichever descriptor the cache holds for the key.
    pub fn insert_type(
        &self,
        identity: TypeIdentity,
        descriptor: Arc<TypeDescriptor>,
    ) -> Arc<TypeDescriptor> {
        Arc::clone(self.types.entry(identity).or_insert(descriptor).value())
    }

    pub fn get_fields(&self, identity: &TypeIdentity) -> Option<Arc<Vec<FieldRecord>>> {
        let found = self.fields.get(identity).map(|entry| Arc::clone(entry.value()));
        self.metadata_stats.record(found)
    }

    pub fn insert_fields(
        &self,
        identity: TypeIdentity,
        fields: Arc<Vec<FieldRecord>>,
    ) -> Arc<Vec<FieldRecord>> {
        Arc::clone(self.fields.entry(identity).or_insert(fields).value())
    }

    /// Empties every namespace and resets the counters
    pub fn clear(&self) {
        debug!(
            demangled = self.demangled.len(),
            types = self.types.len(),
            "Clearing inspector cache"
        );
        self.demangled.clear();
        self.types.clear();
        self.fields.clear();
        self.demangle_stats.reset();
        self.metadata_stats.reset();
    }

    pub fn statistics(&self) -> CacheStatistics {
        CacheStatistics {
            demangling: self.demangle_stats.snapshot(self.demangled.len()),
            metadata: self.metadata_stats.snapshot(self.types.len()),
        }
    }
}

impl std::fmt::Debug for InspectorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InspectorCache")
            .field("statistics", &self.statistics())
            .finish()
    }
}

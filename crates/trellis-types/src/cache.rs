//! Descriptor interning cache
//!
//! Non-raw descriptors are interned here so repeated resolution of the same
//! expression against the same owning context returns one canonical
//! `Arc<TypeDescriptor>`. The key is the descriptor itself: its structural
//! identity covers the expression, the variable-resolver source, and the
//! explicit component.
//!
//! The cache is sharded (`dashmap`), so concurrent readers and writers never
//! lock the whole structure. Two callers racing to intern the same key both
//! construct a valid descriptor; the shard converges on one canonical entry.
//! Memory is bounded by a generational flush: once the entry count reaches
//! capacity the cache is cleared wholesale and a generation counter is
//! bumped. [`DescriptorCache::clear`] does the same explicitly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::descriptor::TypeDescriptor;

/// Default entry capacity before a generational flush.
pub const DEFAULT_CACHE_CAPACITY: usize = 2048;

/// The shared descriptor interning cache.
#[derive(Debug)]
pub struct DescriptorCache {
    entries: DashMap<Arc<TypeDescriptor>, Arc<TypeDescriptor>>,
    capacity: usize,
    generation: AtomicU64,
}

impl DescriptorCache {
    /// Create a cache with [`DEFAULT_CACHE_CAPACITY`].
    pub fn new() -> Self {
        DescriptorCache::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Create a cache that flushes once `capacity` entries are held.
    pub fn with_capacity(capacity: usize) -> Self {
        DescriptorCache {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            generation: AtomicU64::new(0),
        }
    }

    /// Return the canonical descriptor for `candidate`, inserting it if no
    /// structurally equal entry exists yet.
    pub fn intern(&self, candidate: Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        if let Some(existing) = self.entries.get(&candidate) {
            return existing.value().clone();
        }
        if self.entries.len() >= self.capacity {
            self.flush();
        }
        self.entries
            .entry(candidate.clone())
            .or_insert(candidate)
            .value()
            .clone()
    }

    /// Drop every entry and start a new generation.
    pub fn clear(&self) {
        self.flush();
    }

    fn flush(&self) {
        self.entries.clear();
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    /// The number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The current generation: incremented on every flush, whether explicit
    /// or capacity-triggered.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }
}

impl Default for DescriptorCache {
    fn default() -> Self {
        DescriptorCache::new()
    }
}

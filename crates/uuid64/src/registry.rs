//! Durable, cache-accelerated `NodeId` ↔ `NodeValue` registry.

use crate::cache::{CacheCategory, TypedLruCache};
use crate::primes::PROBE_PRIMES;
use crate::{Error, NodeId, NodeStore, NodeValue, Result};
use sha1::{Digest, Sha1};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Default per-category cache capacity.
const DEFAULT_CACHE_CAPACITY: usize = 400;

/// Cache key for the registry's bidirectional lookups.
///
/// Both directions share one cache; the tag keeps id-keyed and value-keyed
/// entries from colliding.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum CacheKey {
    ById(NodeId),
    ByValue(NodeValue),
}

/// A durable id ↔ value binding.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct NodeBinding {
    pub id: NodeId,
    pub value: NodeValue,
}

/// A cached lookup outcome.
///
/// Negative answers are cached too, in their own partition, so a burst of
/// lookups for unregistered ids cannot evict live bindings.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CachedNode {
    Bound(NodeBinding),
    Missing,
}

/// Partition tags for [`CachedNode`] values.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum NodeCacheCategory {
    Bound,
    Missing,
}

impl CacheCategory for CachedNode {
    type Category = NodeCacheCategory;

    fn category(&self) -> NodeCacheCategory {
        match self {
            Self::Bound(_) => NodeCacheCategory::Bound,
            Self::Missing => NodeCacheCategory::Missing,
        }
    }
}

/// A durable, logically append-only, bidirectional `NodeId` ↔ `NodeValue`
/// mapping usable by multiple uncoordinated writers.
///
/// Distinct values never share an id, and a value's id never changes once
/// assigned; both guarantees flow from the store's atomic insert plus a
/// read-back equality check, not from any in-process lock. The cache in
/// front of the store is purely an accelerator: any entry may be evicted
/// at any time, and the store remains the single source of truth.
pub struct NodeRegistry<S> {
    store: S,
    cache: TypedLruCache<CacheKey, CachedNode>,
}

impl<S: NodeStore> NodeRegistry<S> {
    /// Creates a registry over `store` with the default cache capacity.
    pub fn new(store: S) -> Self {
        Self::with_cache_capacity(store, DEFAULT_CACHE_CAPACITY)
    }

    /// Creates a registry with an explicit per-category cache capacity.
    ///
    /// A capacity of zero disables caching; every lookup then reads
    /// through to the store.
    pub fn with_cache_capacity(store: S, capacity: usize) -> Self {
        Self {
            store,
            cache: TypedLruCache::new(capacity),
        }
    }

    /// The underlying store handle.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Drops every cached binding and miss marker. Subsequent lookups read
    /// through to the store and repopulate.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Looks up the value bound to `id`.
    ///
    /// A cache hit (positive or negative) answers immediately; a miss
    /// costs one store read by primary key and populates the cache either
    /// way.
    pub fn get_node(&self, id: NodeId) -> Result<Option<NodeValue>> {
        match self.cache.get(&CacheKey::ById(id)) {
            Some(CachedNode::Bound(binding)) => return Ok(Some(binding.value)),
            Some(CachedNode::Missing) => return Ok(None),
            None => {}
        }
        match self.store.get(id).map_err(Error::store)? {
            Some(value) => {
                self.populate(NodeBinding { id, value });
                Ok(Some(value))
            }
            None => {
                trace!(%id, "caching negative node lookup");
                self.cache.insert(CacheKey::ById(id), CachedNode::Missing);
                Ok(None)
            }
        }
    }

    /// Returns the id bound to `value`, allocating one if the value has
    /// never been registered.
    ///
    /// Repeated calls for the same value always return the same id, even
    /// from uncoordinated writers racing over a shared store: every writer
    /// derives the same candidate sequence from the value's digest, and
    /// the store's atomic insert decides who creates the binding. The
    /// loser re-reads the slot and accepts the identical assignment it
    /// finds there.
    pub fn get_node_id(&self, value: NodeValue) -> Result<NodeId> {
        if let Some(CachedNode::Bound(binding)) = self.cache.get(&CacheKey::ByValue(value)) {
            return Ok(binding.id);
        }
        if let Some(id) = self.store.get_by_value(value).map_err(Error::store)? {
            self.populate(NodeBinding { id, value });
            return Ok(id);
        }
        self.allocate(value)
    }

    /// Hash-then-probe allocation.
    ///
    /// The digest gives writers assigning different values a high chance
    /// of distinct first candidates; escalating through the fixed prime
    /// table only on an actual collision keeps the practical bucket space
    /// small while leaving the registry free to grow unbounded over time.
    fn allocate(&self, value: NodeValue) -> Result<NodeId> {
        let digest = Sha1::digest(value.to_be_bytes());
        let mut seen = HashSet::new();
        for &buckets in PROBE_PRIMES.iter() {
            let candidate = NodeId::from_raw((digest_mod(digest.as_slice(), buckets) + 1) as u32);
            if seen.contains(&candidate) {
                continue;
            }
            if self.store.insert_if_absent(candidate, value).map_err(Error::store)? {
                debug!(id = %candidate, node = %value, "assigned node id");
                self.populate(NodeBinding {
                    id: candidate,
                    value,
                });
                return Ok(candidate);
            }
            // Slot occupied: a concurrent writer may have completed the
            // identical assignment.
            match self.store.get(candidate).map_err(Error::store)? {
                Some(existing) if existing == value => {
                    debug!(id = %candidate, node = %value, "accepted concurrent assignment");
                    self.populate(NodeBinding {
                        id: candidate,
                        value,
                    });
                    return Ok(candidate);
                }
                _ => {
                    trace!(id = %candidate, node = %value, "bucket occupied");
                    seen.insert(candidate);
                }
            }
        }
        Err(Error::AllocationExhausted {
            value,
            probes: seen.len(),
        })
    }

    fn populate(&self, binding: NodeBinding) {
        self.cache
            .insert(CacheKey::ById(binding.id), CachedNode::Bound(binding));
        self.cache
            .insert(CacheKey::ByValue(binding.value), CachedNode::Bound(binding));
    }
}

/// Reduces a big-endian digest modulo `buckets` exactly.
fn digest_mod(digest: &[u8], buckets: u64) -> u64 {
    digest
        .iter()
        .fold(0u64, |acc, &byte| ((acc << 8) | u64::from(byte)) % buckets)
}

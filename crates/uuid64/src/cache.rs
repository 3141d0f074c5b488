//! A capacity-bounded cache that partitions LRU eviction by value
//! category.

use core::hash::Hash;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Supplies the partition tag for values stored in a [`TypedLruCache`].
///
/// Entries compete for residency only against entries of the same
/// category, so one high-churn category cannot starve another's.
pub trait CacheCategory {
    /// The partition tag type.
    type Category: Copy + Eq + Hash;

    /// Returns the partition this value belongs to.
    fn category(&self) -> Self::Category;
}

/// A least-recently-used cache with independent per-category capacity.
///
/// Each category holds at most `capacity` keys; inserting a new key into a
/// full partition first evicts that partition's least-recently-used key.
/// This is fast for small capacities (below roughly a thousand entries)
/// but the queue scan does not scale beyond that.
///
/// A single mutex guards all structural mutation, so individual operations
/// are atomic. Compound sequences are not, unless built into the cache
/// itself; see [`TypedLruCache::get_or_insert_with`].
///
/// Entries are purely transient: any entry may be evicted at any time
/// without correctness loss for callers that treat the cache as an
/// accelerator over a durable source of truth.
pub struct TypedLruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + CacheCategory,
{
    capacity: usize,
    inner: Mutex<Inner<K, V>>,
}

struct Inner<K, V: CacheCategory> {
    mapping: HashMap<K, V>,
    queues: HashMap<V::Category, VecDeque<K>>,
}

impl<K, V> TypedLruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + CacheCategory,
{
    /// Creates a cache holding up to `capacity` keys per category.
    ///
    /// A capacity of zero disables caching entirely: insertions become
    /// no-ops and every lookup misses.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                mapping: HashMap::new(),
                queues: HashMap::new(),
            }),
        }
    }

    /// The fixed per-category capacity.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the cached value, promoting the key to most recently used
    /// within its partition.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let value = inner.mapping.get(key)?.clone();
        inner.touch(key, value.category());
        Some(value)
    }

    /// Inserts or overwrites an entry.
    ///
    /// A new key entering a full partition evicts that partition's
    /// least-recently-used key. Overwriting an existing key first unlinks
    /// it from its old partition, since the new value's category may
    /// differ.
    pub fn insert(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        self.inner.lock().insert(key, value, self.capacity);
    }

    /// Removes the entry if present; a no-op otherwise.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let value = inner.mapping.remove(key)?;
        inner.unlink(key, value.category());
        Some(value)
    }

    /// Returns whether the key is cached, without affecting recency.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().mapping.contains_key(key)
    }

    /// Total entries across all partitions.
    pub fn len(&self) -> usize {
        self.inner.lock().mapping.len()
    }

    /// Returns `true` when no entry is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry and partition.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.mapping.clear();
        inner.queues.clear();
    }

    /// Returns the cached value for `key`, inserting the result of `init`
    /// first if absent.
    ///
    /// The whole sequence runs under the cache lock, so concurrent callers
    /// observe exactly one insertion. With a capacity of zero the value is
    /// computed but not retained.
    pub fn get_or_insert_with(&self, key: K, init: impl FnOnce() -> V) -> V {
        let mut inner = self.inner.lock();
        if let Some(value) = inner.mapping.get(&key).cloned() {
            inner.touch(&key, value.category());
            return value;
        }
        let value = init();
        if self.capacity > 0 {
            inner.insert(key, value.clone(), self.capacity);
        }
        value
    }

    /// Every cached key, most recently used first.
    ///
    /// Order is guaranteed within a partition; partitions appear in
    /// arbitrary order relative to each other.
    pub fn keys(&self) -> Vec<K> {
        let inner = self.inner.lock();
        inner
            .queues
            .values()
            .flat_map(|queue| queue.iter().rev().cloned())
            .collect()
    }

    /// Every cached key, least recently used first.
    pub fn keys_reversed(&self) -> Vec<K> {
        let inner = self.inner.lock();
        inner
            .queues
            .values()
            .flat_map(|queue| queue.iter().cloned())
            .collect()
    }

    /// Every cached `(key, value)` pair, most recently used first.
    pub fn entries(&self) -> Vec<(K, V)> {
        let inner = self.inner.lock();
        inner
            .queues
            .values()
            .flat_map(|queue| queue.iter().rev())
            .filter_map(|key| {
                inner
                    .mapping
                    .get(key)
                    .map(|value| (key.clone(), value.clone()))
            })
            .collect()
    }
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + CacheCategory,
{
    fn insert(&mut self, key: K, value: V, capacity: usize) {
        if let Some(old) = self.mapping.remove(&key) {
            self.unlink(&key, old.category());
        }
        let queue = self.queues.entry(value.category()).or_default();
        let evicted = if queue.len() == capacity {
            queue.pop_front()
        } else {
            None
        };
        queue.push_back(key.clone());
        if let Some(evicted) = evicted {
            self.mapping.remove(&evicted);
        }
        self.mapping.insert(key, value);
    }

    /// Moves `key` to the most-recently-used end of its partition queue.
    fn touch(&mut self, key: &K, category: V::Category) {
        let Some(queue) = self.queues.get_mut(&category) else {
            return;
        };
        if queue.back() == Some(key) {
            return;
        }
        if let Some(pos) = queue.iter().position(|k| k == key) {
            queue.remove(pos);
        }
        queue.push_back(key.clone());
    }

    /// Removes `key` from its partition queue, dropping the partition when
    /// it empties.
    fn unlink(&mut self, key: &K, category: V::Category) {
        let Some(queue) = self.queues.get_mut(&category) else {
            return;
        };
        if let Some(pos) = queue.iter().position(|k| k == key) {
            queue.remove(pos);
        }
        if queue.is_empty() {
            self.queues.remove(&category);
        }
    }
}

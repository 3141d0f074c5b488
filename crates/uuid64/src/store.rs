//! The durable-store collaborator holding node bindings.

use crate::{NodeId, NodeValue};
use core::convert::Infallible;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Durable, logically append-only storage for `NodeId` ↔ `NodeValue`
/// bindings.
///
/// Cross-process correctness of the registry rests entirely on
/// [`NodeStore::insert_if_absent`] being atomic with respect to concurrent
/// writers; no in-process lock is required on top of it. Bindings are
/// never altered or deleted once written.
///
/// Any backend exposing these three operations works: a relational table
/// with a primary-key insert, an embedded key-value store with a
/// compare-and-set, or the in-memory [`MemoryNodeStore`].
pub trait NodeStore {
    /// Backend-specific failure type.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Atomically binds `id` to `value` if `id` is unoccupied.
    ///
    /// Returns `true` when this call created the binding, `false` when the
    /// slot was already occupied, by any value including `value` itself.
    fn insert_if_absent(&self, id: NodeId, value: NodeValue) -> Result<bool, Self::Error>;

    /// Reads the binding for `id` by primary key.
    fn get(&self, id: NodeId) -> Result<Option<NodeValue>, Self::Error>;

    /// Reads the binding for `value` by its unique secondary key.
    fn get_by_value(&self, value: NodeValue) -> Result<Option<NodeId>, Self::Error>;
}

/// An in-memory [`NodeStore`].
///
/// Clones share the same underlying maps, so a cloned handle behaves like
/// a second uncoordinated writer against the same backend. Useful as an
/// ephemeral registry backing and as the test double for multi-writer
/// scenarios.
#[derive(Clone, Default)]
pub struct MemoryNodeStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    by_id: HashMap<NodeId, NodeValue>,
    by_value: HashMap<NodeValue, NodeId>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bindings held.
    pub fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NodeStore for MemoryNodeStore {
    type Error = Infallible;

    fn insert_if_absent(&self, id: NodeId, value: NodeValue) -> Result<bool, Infallible> {
        let mut inner = self.inner.lock();
        if inner.by_id.contains_key(&id) {
            return Ok(false);
        }
        inner.by_id.insert(id, value);
        inner.by_value.entry(value).or_insert(id);
        Ok(true)
    }

    fn get(&self, id: NodeId) -> Result<Option<NodeValue>, Infallible> {
        Ok(self.inner.lock().by_id.get(&id).copied())
    }

    fn get_by_value(&self, value: NodeValue) -> Result<Option<NodeId>, Infallible> {
        Ok(self.inner.lock().by_value.get(&value).copied())
    }
}

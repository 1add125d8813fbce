//! A lock-guarded tree handle for multi-threaded hosts.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::TreeConfig;
use crate::error::TreeError;
use crate::sortition::Draw;
use crate::{HexSumTree, Key, Time, Value};

/// A [`HexSumTree`] behind a reader/writer lock.
///
/// Mutations take the write lock for their whole duration, so readers see
/// either the state before a mutation or after it, never in between. Reads and
/// draws share the read lock and run concurrently.
pub struct SharedHexSumTree {
    inner: RwLock<HexSumTree>,
}

impl SharedHexSumTree {
    pub fn new() -> Self {
        Self::from_tree(HexSumTree::new())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self::from_tree(HexSumTree::with_config(config))
    }

    pub fn from_tree(tree: HexSumTree) -> Self {
        Self {
            inner: RwLock::new(tree),
        }
    }

    pub fn into_inner(self) -> HexSumTree {
        self.inner.into_inner()
    }

    /// Read access for several queries against one consistent state.
    pub fn read(&self) -> RwLockReadGuard<'_, HexSumTree> {
        self.inner.read()
    }

    /// Exclusive access for a sequence of mutations.
    pub fn write(&self) -> RwLockWriteGuard<'_, HexSumTree> {
        self.inner.write()
    }

    pub fn insert(&self, time: Time, value: Value) -> Result<Key, TreeError> {
        self.inner.write().insert(time, value)
    }

    pub fn set(&self, key: Key, time: Time, value: Value) -> Result<(), TreeError> {
        self.inner.write().set(key, time, value)
    }

    pub fn update(
        &self,
        key: Key,
        time: Time,
        delta: Value,
        positive: bool,
    ) -> Result<Value, TreeError> {
        self.inner.write().update(key, time, delta, positive)
    }

    pub fn total_at(&self, time: Time) -> Value {
        self.inner.read().total_at(time)
    }

    pub fn item_at(&self, key: Key, time: Time) -> Value {
        self.inner.read().item_at(key, time)
    }

    pub fn multisortition(&self, time: Time, draws: &[Value]) -> Result<Vec<Draw>, TreeError> {
        self.inner.read().multisortition(time, draws)
    }
}

impl Default for SharedHexSumTree {
    fn default() -> Self {
        Self::new()
    }
}

//! The checkpointed hex sum tree and its mutation engine.
//!
//! Node `(level, key)` covers leaves `key .. key + 16^level`; its key is always
//! a multiple of `16^level`. The parent of `(level, key)` is
//! `(level + 1, key & !(16^(level + 1) - 1))`.

use std::collections::HashMap;

use crate::checkpoint::{check_value, Checkpoints};
use crate::config::{TreeConfig, UnknownKeyPolicy};
use crate::error::TreeError;
use crate::{Key, Level, Time, Value, CHILDREN};

// =============================================================================
// Addressing
// =============================================================================

const DIGIT_BITS: u32 = 4;

/// `16^level`, or `None` if it does not fit in a key.
#[inline]
pub(crate) fn span(level: Level) -> Option<Key> {
    let shift = level.checked_mul(DIGIT_BITS)?;
    if shift >= Key::BITS {
        None
    } else {
        Some(1 << shift)
    }
}

/// Key of the level-`level` ancestor of leaf `key`.
#[inline]
pub(crate) fn ancestor_key(key: Key, level: Level) -> Key {
    match span(level) {
        Some(span) => key & !(span - 1),
        None => 0,
    }
}

/// Key of child `idx` (0..16) of node `(level, key)`, if addressable.
#[inline]
pub(crate) fn child_key(level: Level, key: Key, idx: usize) -> Option<Key> {
    debug_assert!(level > 0 && idx < CHILDREN);
    if idx == 0 {
        return Some(key);
    }
    span(level - 1)?
        .checked_mul(idx as Key)
        .and_then(|off| key.checked_add(off))
}

/// Whether leaf `key` is covered by a tree of the given height.
#[inline]
fn fits(key: Key, height: Level) -> bool {
    span(height).map_or(true, |cap| key < cap)
}

// =============================================================================
// Deltas
// =============================================================================

/// Signed change applied to every node on a leaf's path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Delta {
    Increase(Value),
    Decrease(Value),
}

impl Delta {
    fn between(from: Value, to: Value) -> Self {
        if to >= from {
            Delta::Increase(to - from)
        } else {
            Delta::Decrease(from - to)
        }
    }

    fn apply(self, base: Value) -> Result<Value, TreeError> {
        let value = match self {
            Delta::Increase(d) => base.checked_add(d).ok_or(TreeError::SumOverflow)?,
            // A negative node value is as invalid as one above the bound.
            Delta::Decrease(d) => base.checked_sub(d).ok_or(TreeError::ValueTooLarge)?,
        };
        check_value(value)?;
        Ok(value)
    }
}

/// A validated write, ready to be committed.
struct NodeWrite {
    level: Level,
    key: Key,
    value: Value,
}

// =============================================================================
// HexSumTree
// =============================================================================

/// A base-16 sum tree whose every node remembers its full value history.
///
/// Leaves are appended with [`insert`](Self::insert) and get sequential keys.
/// Each internal node holds the sum of its (up to 16) children, and every
/// mutation records a checkpoint at one logical time on every node of the
/// leaf's path, so [`node_at`](Self::node_at) and [`total_at`](Self::total_at)
/// can answer "as of time T" queries directly.
///
/// All values are bounded to 192 bits ([`MAX_VALUE`](crate::MAX_VALUE)).
#[derive(Clone, Debug)]
pub struct HexSumTree {
    nodes: HashMap<(Level, Key), Checkpoints<Value>>,
    height: Checkpoints<Level>,
    next_key: Key,
    config: TreeConfig,
}

impl HexSumTree {
    /// Creates an initialized tree: height 1 as of time 0, no leaves.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        let mut tree = Self {
            nodes: HashMap::with_capacity(config.initial_capacity),
            height: Checkpoints::new(),
            next_key: 0,
            config,
        };
        tree.init();
        tree
    }

    /// Resets the tree to its initial state, keeping the configuration.
    pub fn init(&mut self) {
        self.nodes.clear();
        self.height = Checkpoints::initial(0, 1);
        self.next_key = 0;
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Structural queries
    // -------------------------------------------------------------------------

    #[inline]
    pub fn height(&self) -> Level {
        self.height.latest()
    }

    #[inline]
    pub fn height_at(&self, time: Time) -> Level {
        self.height.at(time)
    }

    /// Key the next `insert` will assign; also the number of inserted leaves.
    #[inline]
    pub fn next_key(&self) -> Key {
        self.next_key
    }

    /// Number of inserted leaves.
    #[inline]
    pub fn len(&self) -> Key {
        self.next_key
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.next_key == 0
    }

    /// Number of leaves addressable at the current height (`16^height`), or
    /// `None` once that exceeds the key space.
    pub fn capacity(&self) -> Option<Key> {
        span(self.height())
    }

    pub fn total(&self) -> Value {
        self.node(self.height(), 0)
    }

    pub fn total_at(&self, time: Time) -> Value {
        self.node_at(self.height_at(time), 0, time)
    }

    pub fn node(&self, level: Level, key: Key) -> Value {
        self.nodes
            .get(&(level, key))
            .map_or_else(Value::zero, Checkpoints::latest)
    }

    pub fn node_at(&self, level: Level, key: Key, time: Time) -> Value {
        self.nodes
            .get(&(level, key))
            .map_or_else(Value::zero, |c| c.at(time))
    }

    #[inline]
    pub fn item(&self, key: Key) -> Value {
        self.node(0, key)
    }

    #[inline]
    pub fn item_at(&self, key: Key, time: Time) -> Value {
        self.node_at(0, key, time)
    }

    /// Full checkpoint history of a node, if it was ever written.
    pub fn history(&self, level: Level, key: Key) -> Option<&Checkpoints<Value>> {
        self.nodes.get(&(level, key))
    }

    /// Most recent time written anywhere in the tree.
    ///
    /// Every mutation touches the root, so this is the root's last checkpoint.
    pub fn latest_time(&self) -> Option<Time> {
        self.nodes
            .get(&(self.height(), 0))
            .and_then(Checkpoints::last_time)
    }

    #[cfg(test)]
    pub(crate) fn nodes(
        &self,
    ) -> impl Iterator<Item = (&(Level, Key), &Checkpoints<Value>)> + '_ {
        self.nodes.iter()
    }

    #[cfg(test)]
    pub(crate) fn height_history(&self) -> &Checkpoints<Level> {
        &self.height
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Appends a new leaf holding `value` at `time` and returns its key.
    ///
    /// `time` must not precede any time already recorded in the tree.
    pub fn insert(&mut self, time: Time, value: Value) -> Result<Key, TreeError> {
        check_value(value)?;
        if let Some(last) = self.latest_time() {
            if time < last {
                tracing::debug!(time, last, "rejected insert in the past");
                return Err(TreeError::PastValue { time, last });
            }
        }

        let key = self.next_key;
        let next = key.checked_add(1).ok_or(TreeError::SumOverflow)?;
        let height = self.height();
        let grows = !fits(key, height);
        let root_level = if grows { height + 1 } else { height };
        // Sequential keys outgrow the tree by at most one level at a time.
        debug_assert!(fits(key, root_level));
        if grows {
            self.height.check_record(time)?;
        }

        let delta = Delta::between(self.item_at(key, time), value);
        let writes = self.plan(key, time, delta, root_level, grows)?;

        if grows {
            self.height.record(time, root_level)?;
            tracing::debug!(time, key, height = root_level, "tree height grew");
        }
        self.commit(time, writes)?;
        self.next_key = next;
        tracing::trace!(key, time, %value, "inserted leaf");
        Ok(key)
    }

    /// Sets leaf `key` to `value` as of `time`.
    pub fn set(&mut self, key: Key, time: Time, value: Value) -> Result<(), TreeError> {
        self.check_key(key, self.config.unknown_keys)?;
        check_value(value)?;

        let delta = Delta::between(self.item_at(key, time), value);
        let writes = self.plan(key, time, delta, self.height(), false)?;
        self.commit(time, writes)?;
        tracing::trace!(key, time, %value, "set leaf");
        Ok(())
    }

    /// Adds (`positive`) or subtracts `delta` to leaf `key` as of `time`, and
    /// returns the leaf's new value.
    pub fn update(
        &mut self,
        key: Key,
        time: Time,
        delta: Value,
        positive: bool,
    ) -> Result<Value, TreeError> {
        self.check_key(key, UnknownKeyPolicy::Reject)?;

        let delta = if positive {
            Delta::Increase(delta)
        } else {
            Delta::Decrease(delta)
        };
        let writes = self.plan(key, time, delta, self.height(), false)?;
        let value = writes[0].value;
        self.commit(time, writes)?;
        tracing::trace!(key, time, %value, "updated leaf");
        Ok(value)
    }

    fn check_key(&self, key: Key, policy: UnknownKeyPolicy) -> Result<(), TreeError> {
        let known = key < self.next_key
            || (policy == UnknownKeyPolicy::Create && fits(key, self.height()));
        if known {
            Ok(())
        } else {
            Err(TreeError::UnknownKey {
                key,
                next_key: self.next_key,
            })
        }
    }

    /// Computes and validates the new value of every node from leaf `key` up to
    /// `root_level`, without writing anything. The leaf write comes first.
    ///
    /// With `grows`, the root at `root_level` does not exist yet and starts from
    /// the value of the previous root.
    fn plan(
        &self,
        key: Key,
        time: Time,
        delta: Delta,
        root_level: Level,
        grows: bool,
    ) -> Result<Vec<NodeWrite>, TreeError> {
        let mut writes = Vec::with_capacity(root_level as usize + 1);
        for level in 0..=root_level {
            let node_key = ancestor_key(key, level);
            let base = match self.nodes.get(&(level, node_key)) {
                Some(history) => {
                    history.check_record(time).map_err(|err| {
                        tracing::debug!(key, time, level, error = %err, "rejected mutation");
                        err
                    })?;
                    history.at(time)
                }
                None if grows && level == root_level => self.node(level - 1, 0),
                None => Value::zero(),
            };
            let value = delta.apply(base).map_err(|err| {
                tracing::debug!(key, time, level, error = %err, "rejected mutation");
                err
            })?;
            writes.push(NodeWrite {
                level,
                key: node_key,
                value,
            });
        }
        Ok(writes)
    }

    fn commit(&mut self, time: Time, writes: Vec<NodeWrite>) -> Result<(), TreeError> {
        for w in writes {
            self.nodes
                .entry((w.level, w.key))
                .or_default()
                .record(time, w.value)?;
        }
        Ok(())
    }
}

impl Default for HexSumTree {
    fn default() -> Self {
        Self::new()
    }
}

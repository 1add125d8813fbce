//! Weighted selection of leaves against a historical snapshot.
//!
//! A draw `v` in `[0, total_at(t))` selects the leaf whose interval of the
//! cumulative weight space (as of `t`) contains `v`. Leaves with zero weight
//! own an empty interval and can never be selected.

use crate::error::TreeError;
use crate::tree::child_key;
use crate::{HexSumTree, Key, Level, Time, Value, CHILDREN};

/// Result of resolving one draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Draw {
    /// Selected leaf.
    pub key: Key,
    /// Offset of the draw inside the selected leaf's interval; always less
    /// than `weight`.
    pub residual: Value,
    /// Weight of the selected leaf at the searched time.
    pub weight: Value,
}

#[derive(Clone, Copy)]
struct Pending {
    /// Position in the caller's draw list.
    idx: usize,
    /// Remaining offset relative to the node being visited.
    offset: Value,
}

impl HexSumTree {
    /// Resolves a single draw as of `time`.
    pub fn search(&self, time: Time, value: Value) -> Result<Draw, TreeError> {
        let total = self.total_at(time);
        let out_of_range = TreeError::DrawOutOfRange { draw: value, total };
        if value >= total {
            return Err(out_of_range);
        }

        let mut level = self.height_at(time);
        let mut key = 0;
        let mut offset = value;
        while level > 0 {
            let mut chosen = None;
            for idx in 0..CHILDREN {
                let Some(child) = child_key(level, key, idx) else {
                    break;
                };
                let weight = self.node_at(level - 1, child, time);
                if offset < weight {
                    chosen = Some(child);
                    break;
                }
                offset -= weight;
            }
            // Children always sum to their parent, so a child covers the offset.
            key = chosen.ok_or(out_of_range.clone())?;
            level -= 1;
        }

        Ok(Draw {
            key,
            residual: offset,
            weight: self.item_at(key, time),
        })
    }

    /// Resolves many draws as of `time` in one traversal.
    ///
    /// Draws are grouped by the child interval they fall in at every level, so
    /// each visited node's children are read once no matter how many draws pass
    /// through it. The draws may come in any order; the result has one entry
    /// per draw, in the same order.
    pub fn multisortition(&self, time: Time, draws: &[Value]) -> Result<Vec<Draw>, TreeError> {
        if draws.is_empty() {
            return Ok(Vec::new());
        }

        let total = self.total_at(time);
        if let Some(&draw) = draws.iter().max() {
            if draw >= total {
                return Err(TreeError::DrawOutOfRange { draw, total });
            }
        }

        let mut pending: Vec<Pending> = draws
            .iter()
            .enumerate()
            .map(|(idx, &offset)| Pending { idx, offset })
            .collect();
        pending.sort_by(|a, b| a.offset.cmp(&b.offset));

        let mut resolved: Vec<Option<Draw>> = vec![None; draws.len()];
        self.descend(time, self.height_at(time), 0, &mut pending, &mut resolved);
        tracing::trace!(time, draws = draws.len(), %total, "resolved multisortition");

        resolved
            .into_iter()
            .zip(draws)
            .map(|(draw, &value)| draw.ok_or(TreeError::DrawOutOfRange { draw: value, total }))
            .collect()
    }

    /// `pending` is sorted by offset, and every offset is relative to and
    /// inside node `(level, key)`.
    fn descend(
        &self,
        time: Time,
        level: Level,
        key: Key,
        pending: &mut [Pending],
        resolved: &mut [Option<Draw>],
    ) {
        if level == 0 {
            let weight = self.item_at(key, time);
            for p in pending.iter() {
                resolved[p.idx] = Some(Draw {
                    key,
                    residual: p.offset,
                    weight,
                });
            }
            return;
        }

        let mut rest = pending;
        let mut prefix = Value::zero();
        for idx in 0..CHILDREN {
            if rest.is_empty() {
                break;
            }
            let Some(child) = child_key(level, key, idx) else {
                break;
            };
            let weight = self.node_at(level - 1, child, time);
            if weight.is_zero() {
                continue;
            }

            let end = prefix.saturating_add(weight);
            let split = rest.partition_point(|p| p.offset < end);
            let (group, tail) = std::mem::take(&mut rest).split_at_mut(split);
            if !group.is_empty() {
                for p in group.iter_mut() {
                    p.offset -= prefix;
                }
                self.descend(time, level - 1, child, group, resolved);
            }
            rest = tail;
            prefix = end;
        }
    }
}

//! # hex-sum-tree
//!
//! A checkpointed base-16 sum tree for stake-weighted sortition.
//!
//! Every leaf holds one participant's weight; every internal node holds the
//! sum of its up to 16 children. Each node keeps its full `(time, value)`
//! history, so totals, weights and draws can be evaluated "as of" any past
//! time without replaying mutations.
//!
//! ## Example
//!
//! ```rust
//! use hex_sum_tree::{HexSumTree, Value};
//!
//! let mut tree = HexSumTree::new();
//! tree.insert(1, Value::from(5u64)).unwrap();
//! tree.insert(2, Value::from(10u64)).unwrap();
//!
//! assert_eq!(tree.total(), Value::from(15u64));
//! assert_eq!(tree.total_at(1), Value::from(5u64));
//!
//! let draws = tree
//!     .multisortition(2, &[Value::from(3u64), Value::from(12u64)])
//!     .unwrap();
//! assert_eq!(draws[0].key, 0);
//! assert_eq!(draws[1].key, 1);
//! ```

#![warn(clippy::all)]

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod shared;
pub mod sortition;
pub mod tree;

pub use checkpoint::{Checkpoint, Checkpoints};
pub use config::{TreeConfig, UnknownKeyPolicy};
pub use error::{CheckpointError, TreeError};
pub use primitive_types::U256;
pub use shared::SharedHexSumTree;
pub use sortition::Draw;
pub use tree::HexSumTree;

/// Logical time (the host protocol's term counter).
pub type Time = u64;
/// Leaf key; also the base key of internal nodes.
pub type Key = u64;
/// Tree level; leaves are level 0.
pub type Level = u32;
/// Node value. Stored 256 bits wide, bounded to [`MAX_VALUE`].
pub type Value = U256;

/// Largest value any node may hold: `2^192 - 1`.
pub const MAX_VALUE: Value = U256([u64::MAX, u64::MAX, u64::MAX, 0]);

/// Children per internal node.
pub const CHILDREN: usize = 16;

#[cfg(test)]
mod proptests;

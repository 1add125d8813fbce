/// How [`HexSumTree::set`](crate::HexSumTree::set) treats keys that were never
/// produced by `insert`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownKeyPolicy {
    /// Fail with [`TreeError::UnknownKey`](crate::TreeError::UnknownKey).
    #[default]
    Reject,
    /// Write the leaf as long as it fits in the current height. `next_key` is
    /// not advanced, so such a leaf is outside the range covered by the
    /// conservation invariant until `insert` reaches it.
    Create,
}

/// Configuration for a [`HexSumTree`](crate::HexSumTree).
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Treatment of `set` on keys at or beyond `next_key`.
    pub unknown_keys: UnknownKeyPolicy,
    /// Initial capacity hint for the node map
    pub initial_capacity: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            unknown_keys: UnknownKeyPolicy::Reject,
            initial_capacity: 64,
        }
    }
}

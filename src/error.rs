use crate::{Key, Time, Value};

/// Errors raised by a single [`Checkpoints`](crate::Checkpoints) store.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CheckpointError {
    #[error("cannot record a checkpoint at time {time}: last checkpoint is at time {last}")]
    PastCheckpoint { time: Time, last: Time },
    #[error("checkpoint value exceeds 192 bits")]
    ValueTooLarge,
}

/// Errors raised by [`HexSumTree`](crate::HexSumTree) operations.
///
/// A failed operation never leaves partial state behind: either every node on
/// the touched path is written or none is.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("cannot mutate at time {time}: a node on the path was already written at time {last}")]
    PastValue { time: Time, last: Time },
    #[error("value exceeds 192 bits")]
    ValueTooLarge,
    #[error("sum overflows the native 256-bit node width")]
    SumOverflow,
    #[error("key {key} does not exist (next key is {next_key})")]
    UnknownKey { key: Key, next_key: Key },
    #[error("draw {draw} is out of range for total {total}")]
    DrawOutOfRange { draw: Value, total: Value },
}

impl From<CheckpointError> for TreeError {
    fn from(err: CheckpointError) -> Self {
        match err {
            CheckpointError::PastCheckpoint { time, last } => TreeError::PastValue { time, last },
            CheckpointError::ValueTooLarge => TreeError::ValueTooLarge,
        }
    }
}

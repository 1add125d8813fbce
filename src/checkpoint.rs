//! Append-forward checkpoint histories.
//!
//! A [`Checkpoints`] store keeps every `(time, value)` pair ever recorded for
//! one node. Times are strictly increasing; recording twice at the same time
//! overwrites the last entry, and recording at an earlier time is rejected.

use crate::error::CheckpointError;
use crate::{Time, Value, MAX_VALUE};

/// One recorded `(time, value)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint<T> {
    pub time: Time,
    pub value: T,
}

/// Time-ordered history of a single value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Checkpoints<T> {
    history: Vec<Checkpoint<T>>,
}

impl<T: Copy + Default> Checkpoints<T> {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
        }
    }

    /// A store holding a single checkpoint.
    pub(crate) fn initial(time: Time, value: T) -> Self {
        Self {
            history: vec![Checkpoint { time, value }],
        }
    }

    /// Value as of `time`: the latest checkpoint with `checkpoint.time <= time`,
    /// or `T::default()` if nothing was recorded by then.
    pub fn at(&self, time: Time) -> T {
        let Some(last) = self.history.last() else {
            return T::default();
        };
        // Most queries are for the present or the recent past.
        if last.time <= time {
            return last.value;
        }

        let idx = self.history.partition_point(|c| c.time <= time);
        if idx == 0 {
            T::default()
        } else {
            self.history[idx - 1].value
        }
    }

    /// Value of the last checkpoint, or `T::default()` if empty.
    #[inline]
    pub fn latest(&self) -> T {
        self.history.last().map_or_else(T::default, |c| c.value)
    }

    #[inline]
    pub fn last_time(&self) -> Option<Time> {
        self.history.last().map(|c| c.time)
    }

    /// Checks that a checkpoint could be recorded at `time` without writing it.
    pub fn check_record(&self, time: Time) -> Result<(), CheckpointError> {
        match self.last_time() {
            Some(last) if time < last => Err(CheckpointError::PastCheckpoint { time, last }),
            _ => Ok(()),
        }
    }

    pub fn record(&mut self, time: Time, value: T) -> Result<(), CheckpointError> {
        self.check_record(time)?;
        match self.history.last_mut() {
            Some(last) if last.time == time => last.value = value,
            _ => self.history.push(Checkpoint { time, value }),
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint<T>> + '_ {
        self.history.iter()
    }
}

impl Checkpoints<Value> {
    /// Like [`record`](Self::record), but rejects values above [`MAX_VALUE`].
    pub fn record_value(&mut self, time: Time, value: Value) -> Result<(), CheckpointError> {
        check_value(value)?;
        self.record(time, value)
    }
}

impl<T: Copy + Default> Default for Checkpoints<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
pub(crate) fn check_value(value: Value) -> Result<(), CheckpointError> {
    if value > MAX_VALUE {
        Err(CheckpointError::ValueTooLarge)
    } else {
        Ok(())
    }
}

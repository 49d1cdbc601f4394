//! Transaction log of solver moves
//!
//! Every move made by the local optimizer is recorded here so that it can be
//! undone.  Callers take a [`Checkpoint`] before a speculative step and then
//! either keep the moves or roll back to it.
use crate::model::{DofIndex, JointId};

/// One recorded move
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Entry {
    /// Joint that was moved
    pub joint: JointId,
    /// Degree of freedom that was changed
    pub dof: DofIndex,
    /// Value before the move
    pub old: f64,
    /// Value after the move
    pub new: f64,
}

/// Log position to roll back to
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Checkpoint(usize);

/// LIFO log of moves
#[derive(Clone, Debug, Default)]
pub struct SolveLog {
    entries: Vec<Entry>,
}

impl SolveLog {
    /// Builds an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a move
    pub fn push(&mut self, e: Entry) {
        self.entries.push(e);
    }

    /// Removes the most recent move
    pub fn pop(&mut self) -> Option<Entry> {
        self.entries.pop()
    }

    /// Returns the most recent move
    pub fn last(&self) -> Option<&Entry> {
        self.entries.last()
    }

    /// Marks the current position
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.entries.len())
    }

    /// Removes every move recorded after `c`, newest first
    pub fn rollback_to(&mut self, c: Checkpoint) -> Vec<Entry> {
        let n = c.0.min(self.entries.len());
        let mut out = self.entries.split_off(n);
        out.reverse();
        out
    }

    /// Returns the moves recorded after `c`, oldest first
    pub fn since(&self, c: Checkpoint) -> &[Entry] {
        &self.entries[c.0.min(self.entries.len())..]
    }

    /// Forgets every recorded move, keeping their effects
    pub fn commit(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    /// Number of recorded moves
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

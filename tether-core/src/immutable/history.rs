//! Snapshot history with undo and redo.
//!
//! Each entry is a plain root. Committing after an undo discards the redo
//! branch. Together with the copy-on-write path writers, consecutive entries
//! share every branch that did not change between them.

use std::collections::VecDeque;

use tracing::{debug, trace};

use super::diff::{diff, Change};
use super::path::set_path;
use crate::config::{StoreConfig, DEFAULT_HISTORY_CAPACITY};
use crate::error::Result;
use crate::value::{Target, Value};

#[derive(Debug, Clone)]
pub struct History {
    snapshots: VecDeque<Target>,
    cursor: usize,
    capacity: usize,
}

impl History {
    pub fn new(initial: Target) -> Self {
        Self::with_capacity(initial, DEFAULT_HISTORY_CAPACITY)
    }

    /// A history that keeps at most `capacity` snapshots (at least one).
    pub fn with_capacity(initial: Target, capacity: usize) -> Self {
        let mut snapshots = VecDeque::new();
        snapshots.push_back(initial);
        Self {
            snapshots,
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn from_config(initial: Target, config: &StoreConfig) -> Self {
        Self::with_capacity(initial, config.history_capacity)
    }

    /// The snapshot at the cursor.
    pub fn current(&self) -> &Target {
        &self.snapshots[self.cursor]
    }

    /// Position of the cursor, usable with [`History::changes_since`].
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Always `false`: a history holds at least its initial snapshot.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: usize) -> Option<&Target> {
        self.snapshots.get(index)
    }

    /// Push a snapshot after the cursor and move the cursor onto it.
    ///
    /// The oldest snapshot is dropped once the capacity is exceeded.
    pub fn commit(&mut self, snapshot: Target) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
        self.cursor = self.snapshots.len() - 1;
        trace!(cursor = self.cursor, len = self.snapshots.len(), "history commit");
    }

    /// Commit `set_path(current, path, value)` and return the new current
    /// snapshot.
    pub fn apply(&mut self, path: &str, value: impl Into<Value>) -> Result<&Target> {
        let next = set_path(self.current(), path, value)?;
        self.commit(next);
        Ok(self.current())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Step back. Returns the new current snapshot, or `None` at the start.
    pub fn undo(&mut self) -> Option<&Target> {
        if !self.can_undo() {
            debug!("undo ignored: at oldest snapshot");
            return None;
        }
        self.cursor -= 1;
        Some(self.current())
    }

    /// Step forward. Returns the new current snapshot, or `None` at the end.
    pub fn redo(&mut self) -> Option<&Target> {
        if !self.can_redo() {
            debug!("redo ignored: at newest snapshot");
            return None;
        }
        self.cursor += 1;
        Some(self.current())
    }

    /// Shallow changes from the snapshot at `index` to the current one.
    pub fn changes_since(&self, index: usize) -> Option<Vec<Change>> {
        self.snapshots
            .get(index)
            .map(|past| diff(past, self.current()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::immutable::get_path;

    #[test]
    fn undo_restores_previous_snapshot() {
        let mut history = History::new(Target::from_pairs([("count", 0)]));
        history.apply("count", 1).unwrap();
        history.apply("count", 2).unwrap();

        assert_eq!(
            history.changes_since(0).unwrap(),
            vec![Change::update("count", Value::from(0), Value::from(2))]
        );

        let back = history.undo().unwrap();
        assert_eq!(get_path(back, "count"), Some(Value::from(1)));
        history.undo();
        assert_eq!(get_path(history.current(), "count"), Some(Value::from(0)));
        assert!(history.undo().is_none());
    }

    #[test]
    fn redo_and_branch_discard() {
        let mut history = History::new(Target::from_pairs([("n", 0)]));
        history.apply("n", 1).unwrap();
        history.apply("n", 2).unwrap();

        history.undo();
        assert!(history.can_redo());
        assert_eq!(get_path(history.redo().unwrap(), "n"), Some(Value::from(2)));
        assert!(history.redo().is_none());

        history.undo();
        history.apply("n", 9).unwrap();
        assert!(!history.can_redo());
        assert_eq!(history.len(), 3);
        assert_eq!(get_path(history.current(), "n"), Some(Value::from(9)));
    }

    #[test]
    fn capacity_drops_oldest() {
        let mut history = History::with_capacity(Target::from_pairs([("n", 0)]), 2);
        history.apply("n", 1).unwrap();
        history.apply("n", 2).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history.cursor(), 1);
        assert_eq!(get_path(history.get(0).unwrap(), "n"), Some(Value::from(1)));
    }

    #[test]
    fn capacity_from_config() {
        let config = StoreConfig {
            history_capacity: 3,
            ..StoreConfig::default()
        };
        let history = History::from_config(Target::record(), &config);
        assert_eq!(history.capacity(), 3);
        assert!(!history.is_empty());
    }

    #[test]
    fn entries_share_unchanged_branches() {
        let root = Target::from_json(serde_json::json!({ "a": { "x": 1 }, "b": { "y": 2 } })).unwrap();
        let mut history = History::new(root);
        history.apply("a.x", 5).unwrap();

        let before = history.get(0).unwrap().get("b").unwrap();
        let after = history.current().get("b").unwrap();
        assert!(before.same(&after));
    }
}

//! # Undo/Redo History
//!
//! Records the inverse of every dispatched transaction group so it can be
//! undone.
//!
//! ## Design
//!
//! - A group is one dispatched transaction plus whatever post-processors
//!   appended to it; it is undone and redone as a unit
//! - Each entry stores the inverse steps and the selection from before the
//!   group
//! - Undoing applies the inverse steps and records their own inverse as the
//!   redo entry
//! - New edits clear the redo stack
//! - A document change outside history invalidates every stored position, so
//!   it clears both stacks

use folio_model::{Selection, Step};
use tracing::debug;

/// Transaction tag marking history transactions
pub const HISTORY_TAG: &str = "history";
pub const UNDO: &str = "undo";
pub const REDO: &str = "redo";

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Steps restoring the document, in application order
    pub steps: Vec<Step>,

    /// Selection to restore with them
    pub selection: Selection,
}

/// Depth of both stacks, carried on each snapshot so commands can tell
/// whether undo or redo is possible
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStatus {
    pub undo_depth: usize,
    pub redo_depth: usize,
}

#[derive(Debug)]
pub struct History {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,
}

impl History {
    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
        }
    }

    /// Record a new edit
    pub fn record(&mut self, entry: HistoryEntry) {
        self.push_undo(entry);
        self.redo_stack.clear();
    }

    /// Record the inverse of an undo so it can be redone
    pub fn record_undone(&mut self, entry: HistoryEntry) {
        self.redo_stack.push(entry);
    }

    /// Record the inverse of a redo, keeping the rest of the redo stack
    pub fn record_redone(&mut self, entry: HistoryEntry) {
        self.push_undo(entry);
    }

    fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);
        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }
    }

    pub fn peek_undo(&self) -> Option<&HistoryEntry> {
        self.undo_stack.last()
    }

    pub fn peek_redo(&self) -> Option<&HistoryEntry> {
        self.redo_stack.last()
    }

    pub fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.undo_stack.pop()
    }

    pub fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.redo_stack.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        if self.can_undo() || self.can_redo() {
            debug!(
                undo = self.undo_stack.len(),
                redo = self.redo_stack.len(),
                "history cleared"
            );
        }
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn status(&self) -> HistoryStatus {
        HistoryStatus {
            undo_depth: self.undo_stack.len(),
            redo_depth: self.redo_stack.len(),
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::with_max_levels(crate::config::DEFAULT_HISTORY_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            steps: vec![Step::Replace {
                from: n,
                to: n + 1,
                content: vec![],
            }],
            selection: Selection::cursor(n),
        }
    }

    #[test]
    fn test_history_creation() {
        let history = History::default();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.status(), HistoryStatus::default());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut history = History::default();
        history.record(entry(1));
        let undone = history.pop_undo().unwrap();
        history.record_undone(undone);
        assert!(history.can_redo());

        history.record(entry(2));
        assert!(!history.can_redo());
        assert_eq!(history.status().undo_depth, 1);
    }

    #[test]
    fn test_redo_keeps_remaining_redo_entries() {
        let mut history = History::default();
        history.record_undone(entry(1));
        history.record_undone(entry(2));
        let redo = history.pop_redo().unwrap();
        history.record_redone(redo);
        assert_eq!(history.status(), HistoryStatus { undo_depth: 1, redo_depth: 1 });
    }

    #[test]
    fn test_max_levels_enforced() {
        let mut history = History::with_max_levels(2);
        for i in 0..3 {
            history.record(entry(i));
        }
        assert_eq!(history.status().undo_depth, 2);
        // the oldest entry was dropped
        assert_eq!(history.pop_undo().unwrap().selection, Selection::cursor(2));
        assert_eq!(history.pop_undo().unwrap().selection, Selection::cursor(1));
    }
}

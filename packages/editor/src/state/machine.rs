//! # Editing State Machine
//!
//! Owns the current [`EditorState`] and the undo history, and is the only
//! place a new state is committed.
//!
//! ## Transaction Flow
//!
//! ```text
//! transaction
//!   → every plugin filter accepts?        (no: dropped, nothing changes)
//!   → apply                               (error: dropped with a warning)
//!   → append_transaction, plugin order    (one pass; appended edits are
//!                                          folded into the same group)
//!   → history: record / clear / move between stacks
//!   → commit
//! ```
//!
//! A transaction tagged `history: undo|redo` without steps is a request,
//! and is answered by [`EditingStateMachine::undo`] or
//! [`EditingStateMachine::redo`].

use crate::command::CommandFn;
use crate::history::{History, HistoryEntry, HISTORY_TAG, REDO, UNDO};
use crate::state::plugin::{Dispatch, PluginSet};
use crate::state::snapshot::EditorState;
use crate::transform::Transform;
use folio_model::{Step, Transaction};
use tracing::{debug, trace, warn};

/// What a transaction did to the machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transition {
    pub applied: bool,
    pub doc_changed: bool,
    pub selection_changed: bool,
    pub scroll_into_view: bool,
}

impl Transition {
    pub fn merge(&mut self, other: Transition) {
        self.applied |= other.applied;
        self.doc_changed |= other.doc_changed;
        self.selection_changed |= other.selection_changed;
        self.scroll_into_view |= other.scroll_into_view;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Record {
    Edit,
    Undo,
    Redo,
}

#[derive(Debug)]
pub struct EditingStateMachine {
    state: EditorState,
    history: History,
}

impl EditingStateMachine {
    pub fn new(state: EditorState, history_depth: usize) -> Self {
        let history = History::with_max_levels(history_depth);
        Self {
            state: state.with_history(history.status()),
            history,
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Swap in a new document. Undo history does not survive this.
    pub fn replace_state(&mut self, state: EditorState) {
        self.history.clear();
        self.state = state.with_history(self.history.status());
    }

    /// Rebuild with a new plugin set, keeping document, selection and
    /// history
    pub fn reconfigure(&mut self, plugins: PluginSet) {
        self.state = self.state.with_plugins(plugins);
    }

    pub fn apply_transaction(&mut self, tr: Transaction) -> Transition {
        if !tr.has_steps() {
            match tr.get_tag(HISTORY_TAG) {
                Some(UNDO) => return self.undo(),
                Some(REDO) => return self.redo(),
                _ => {}
            }
        }
        self.commit(tr, Record::Edit)
    }

    pub fn undo(&mut self) -> Transition {
        let Some(entry) = self.history.peek_undo() else {
            return Transition::default();
        };
        let tr = history_transaction(entry, UNDO);
        self.commit(tr, Record::Undo)
    }

    pub fn redo(&mut self) -> Transition {
        let Some(entry) = self.history.peek_redo() else {
            return Transition::default();
        };
        let tr = history_transaction(entry, REDO);
        self.commit(tr, Record::Redo)
    }

    /// Offer a normalized chord to the plugins, last plugin first. `None`
    /// when no plugin handled it.
    pub fn handle_key(&mut self, chord: &str) -> Option<Transition> {
        let state = self.state.clone();
        let mut dispatched = Vec::new();
        let mut collect = |tr: Transaction| dispatched.push(tr);
        let handled = state.plugins().iter().rev().any(|plugin| {
            let dispatch: Dispatch<'_> = &mut collect;
            plugin.handle_key(&state, chord, dispatch)
        });
        if !handled {
            trace!(chord, "key not handled");
            return None;
        }
        Some(self.apply_all(dispatched))
    }

    /// Offer typed text to the plugins (input rules, auto-pairing); insert
    /// it plainly when none of them handled it
    pub fn handle_text_input(&mut self, text: &str) -> Transition {
        let state = self.state.clone();
        let mut dispatched = Vec::new();
        let mut collect = |tr: Transaction| dispatched.push(tr);
        let handled = state.plugins().iter().rev().any(|plugin| {
            let dispatch: Dispatch<'_> = &mut collect;
            plugin.handle_text_input(&state, text, dispatch)
        });
        if handled {
            return self.apply_all(dispatched);
        }
        match insert_text_transaction(&state, text) {
            Some(tr) => self.apply_transaction(tr),
            None => Transition::default(),
        }
    }

    /// Run a command against the current state, applying whatever it
    /// dispatches. `None` when the command declined to run.
    pub fn run_command(&mut self, run: &CommandFn) -> Option<Transition> {
        let state = self.state.clone();
        let mut dispatched = Vec::new();
        let mut collect = |tr: Transaction| dispatched.push(tr);
        let dispatch: Dispatch<'_> = &mut collect;
        if !run(&state, Some(dispatch)) {
            return None;
        }
        Some(self.apply_all(dispatched))
    }

    fn apply_all(&mut self, transactions: Vec<Transaction>) -> Transition {
        let mut transition = Transition::default();
        for tr in transactions {
            transition.merge(self.apply_transaction(tr));
        }
        transition
    }

    fn commit(&mut self, tr: Transaction, record: Record) -> Transition {
        let old = self.state.clone();
        if !old.plugins().accepts(&tr, &old) {
            debug!("transaction rejected by plugin filter");
            return Transition::default();
        }
        let (mut state, applied) = match old.apply(&tr) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "transaction failed to apply");
                return Transition::default();
            }
        };

        let mut doc_changed = applied.doc_changed;
        let mut inverse: Vec<Step> = applied.inverse.clone();
        if applied.doc_changed {
            for plugin in old.plugins().iter() {
                let Some(extra) = plugin.append_transaction(&tr, &applied, &old, &state) else {
                    continue;
                };
                match state.apply(&extra) {
                    Ok((next, extra_applied)) => {
                        if extra_applied.doc_changed {
                            let mut steps = extra_applied.inverse;
                            steps.extend(inverse);
                            inverse = steps;
                            doc_changed = true;
                        }
                        state = next;
                    }
                    Err(e) => warn!(plugin = plugin.key(), error = %e, "appended transaction failed to apply"),
                }
            }
        }

        let entry = HistoryEntry {
            steps: inverse,
            selection: old.selection(),
        };
        match record {
            Record::Edit if doc_changed => {
                if tr.meta().add_to_history {
                    self.history.record(entry);
                } else {
                    self.history.clear();
                }
            }
            Record::Edit => {}
            Record::Undo => {
                self.history.pop_undo();
                self.history.record_undone(entry);
            }
            Record::Redo => {
                self.history.pop_redo();
                self.history.record_redone(entry);
            }
        }

        let selection_changed = state.selection() != old.selection();
        self.state = state.with_history(self.history.status());
        trace!(doc_changed, selection_changed, ?record, "transaction committed");
        Transition {
            applied: true,
            doc_changed,
            selection_changed,
            scroll_into_view: tr.meta().scroll_into_view,
        }
    }
}

fn history_transaction(entry: &HistoryEntry, direction: &str) -> Transaction {
    Transaction::from_steps(entry.steps.clone())
        .set_selection(entry.selection)
        .tag(HISTORY_TAG, direction)
}

/// Replace the selection with `text`, carrying the marks active at its
/// start
fn insert_text_transaction(state: &EditorState, text: &str) -> Option<Transaction> {
    if text.is_empty() {
        return None;
    }
    let selection = state.selection();
    let marks = state.marks_at(selection.from());
    let mut tf = Transform::new(state);
    tf.delete_range(selection.from(), selection.to()).ok()?;
    tf.insert_text(selection.from(), text, marks).ok()?;
    Some(tf.into_transaction().ui_event("input").scroll_into_view())
}

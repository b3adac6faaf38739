//! # Commands
//!
//! A command is a named edit: it either reports whether it could run (no
//! dispatch given) or produces a transaction and hands it to `dispatch`.
//! The same function answers both questions, so "is this enabled?" never
//! disagrees with what running it would do.

use crate::state::plugin::Dispatch;
use crate::state::snapshot::EditorState;
use folio_model::Transaction;
use std::fmt;
use std::sync::Arc;

pub type CommandFn = Arc<dyn Fn(&EditorState, Option<Dispatch<'_>>) -> bool + Send + Sync>;
pub type ActiveFn = Arc<dyn Fn(&EditorState) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Command {
    pub id: String,

    /// Default chords, before caller overrides
    pub keys: Vec<String>,

    pub run: CommandFn,

    /// Whether the command's effect is already present at the selection
    /// (bold text selected, cursor in a heading, ...)
    pub active: Option<ActiveFn>,

    /// Grammar type names the command needs; assembly fails without them
    pub requires: Vec<String>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("keys", &self.keys)
            .finish()
    }
}

impl Command {
    pub fn new(id: impl Into<String>, run: CommandFn) -> Self {
        Self {
            id: id.into(),
            keys: Vec::new(),
            run,
            active: None,
            requires: Vec::new(),
        }
    }

    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn active(mut self, active: impl Fn(&EditorState) -> bool + Send + Sync + 'static) -> Self {
        self.active = Some(Arc::new(active));
        self
    }

    pub fn requires<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_enabled(&self, state: &EditorState) -> bool {
        (self.run)(state, None)
    }

    pub fn is_active(&self, state: &EditorState) -> bool {
        self.active.as_ref().map_or(false, |active| active(state))
    }

    pub fn execute(&self, state: &EditorState, dispatch: Dispatch<'_>) -> bool {
        (self.run)(state, Some(dispatch))
    }
}

/// Wrap a transaction builder as a command function.
///
/// The command is enabled when the builder produces a transaction that
/// applies cleanly, passes every plugin filter and, if it carries steps,
/// actually changes the document.
pub fn transaction_command<F>(build: F) -> CommandFn
where
    F: Fn(&EditorState) -> Option<Transaction> + Send + Sync + 'static,
{
    Arc::new(move |state: &EditorState, dispatch: Option<Dispatch<'_>>| {
        let Some(tr) = build(state) else {
            return false;
        };
        match state.apply(&tr) {
            Ok((_, applied)) if applied.doc_changed || !tr.has_steps() => {}
            _ => return false,
        }
        if !state.plugins().accepts(&tr, state) {
            return false;
        }
        if let Some(dispatch) = dispatch {
            dispatch(tr);
        }
        true
    })
}

/// Run a command function and capture what it dispatched
pub fn run_collect(run: &CommandFn, state: &EditorState) -> Option<Transaction> {
    let mut captured = None;
    let mut collect = |tr: Transaction| captured = Some(tr);
    let dispatch: Dispatch<'_> = &mut collect;
    if run(state, Some(dispatch)) {
        captured
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::state;
    use folio_model::Selection;

    fn insert_x() -> Command {
        Command::new(
            "insert-x",
            transaction_command(|state| {
                let pos = state.selection().head;
                Some(Transaction::new().insert_text(pos, "x", vec![]))
            }),
        )
        .keys(["Mod-x"])
    }

    #[test]
    fn test_enabled_without_dispatch() {
        let state = state("Hello");
        let command = insert_x();
        assert!(command.is_enabled(&state));
        assert!(!command.is_active(&state));
    }

    #[test]
    fn test_execute_dispatches() {
        let state = state("Hello");
        let tr = run_collect(&insert_x().run, &state).unwrap();
        let (next, _) = state.apply(&tr).unwrap();
        assert_eq!(next.doc().text_content(), "xHello");
    }

    #[test]
    fn test_failing_transaction_disables() {
        let state = state("Hello");
        let command = Command::new(
            "broken",
            transaction_command(|_| Some(Transaction::new().delete(1, 3))),
        );
        assert!(!command.is_enabled(&state));
        assert!(run_collect(&command.run, &state).is_none());
    }

    #[test]
    fn test_unchanged_document_disables() {
        let state = state("Hello");
        let noop = Command::new("noop", transaction_command(|_| Some(Transaction::new().delete(3, 3))));
        assert!(!noop.is_enabled(&state));

        let select = Command::new(
            "select",
            transaction_command(|_| Some(Transaction::new().set_selection(Selection::new(2, 4)))),
        );
        assert!(select.is_enabled(&state));
    }
}

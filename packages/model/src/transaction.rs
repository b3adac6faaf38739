//! # Transactions
//!
//! An ordered list of steps plus metadata, applied atomically:
//!
//! ```text
//! doc ──step₁──> d₁ ──step₂──> d₂ ── ... ──> dₙ ──check──> new doc
//!  │                                                 │
//!  └────────────── any error: nothing applied ───────┘
//! ```
//!
//! Step positions refer to the document as left by the previous step.

use crate::attrs::Attrs;
use crate::error::StepError;
use crate::mapping::Mapping;
use crate::mark::Mark;
use crate::node::Node;
use crate::schema::Schema;
use crate::selection::Selection;
use crate::step::Step;
use std::collections::BTreeMap;
use tracing::trace;

/// Transaction metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionMeta {
    /// Record the transaction in undo history
    pub add_to_history: bool,

    /// Ask the visual surface to scroll the selection into view
    pub scroll_into_view: bool,

    /// Origin of the edit ("input", "paste", "key", ...)
    pub ui_event: Option<String>,

    /// Free-form tags set by commands and plugins
    pub tags: BTreeMap<String, String>,
}

impl Default for TransactionMeta {
    fn default() -> Self {
        Self {
            add_to_history: true,
            scroll_into_view: false,
            ui_event: None,
            tags: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    steps: Vec<Step>,
    selection: Option<Selection>,
    meta: TransactionMeta,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn has_steps(&self) -> bool {
        !self.steps.is_empty()
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn insert_text(self, pos: usize, text: impl Into<String>, marks: Vec<Mark>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return self;
        }
        self.insert(pos, vec![Node::new_text(text, marks)])
    }

    pub fn insert(self, pos: usize, nodes: Vec<Node>) -> Self {
        self.replace_with(pos, pos, nodes)
    }

    pub fn delete(self, from: usize, to: usize) -> Self {
        self.replace_with(from, to, Vec::new())
    }

    pub fn replace_with(self, from: usize, to: usize, content: Vec<Node>) -> Self {
        self.step(Step::Replace { from, to, content })
    }

    pub fn add_mark(self, from: usize, to: usize, mark: Mark) -> Self {
        self.step(Step::AddMark { from, to, mark })
    }

    pub fn remove_mark(self, from: usize, to: usize, mark: Mark) -> Self {
        self.step(Step::RemoveMark { from, to, mark })
    }

    pub fn set_node_type(self, pos: usize, node_type: impl Into<String>, attrs: Attrs) -> Self {
        self.step(Step::SetNodeType {
            pos,
            node_type: node_type.into(),
            attrs,
        })
    }

    pub fn set_node_attrs(self, pos: usize, attrs: Attrs) -> Self {
        self.step(Step::SetAttrs { pos, attrs })
    }

    pub fn set_doc_attrs(self, attrs: Attrs) -> Self {
        self.step(Step::SetDocAttrs { attrs })
    }

    /// Explicit selection, in positions of the resulting document
    pub fn set_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn meta(&self) -> &TransactionMeta {
        &self.meta
    }

    pub fn without_history(mut self) -> Self {
        self.meta.add_to_history = false;
        self
    }

    pub fn scroll_into_view(mut self) -> Self {
        self.meta.scroll_into_view = true;
        self
    }

    pub fn ui_event(mut self, event: impl Into<String>) -> Self {
        self.meta.ui_event = Some(event.into());
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.tags.insert(key.into(), value.into());
        self
    }

    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.meta.tags.get(key).map(String::as_str)
    }

    /// Apply every step to a working copy and validate the result.
    ///
    /// Either the whole transaction applies or an error is returned and
    /// `doc` is untouched.
    pub fn apply(&self, doc: &Node, schema: &Schema) -> Result<AppliedTransaction, StepError> {
        let mut working = doc.clone();
        let mut mapping = Mapping::new();
        let mut inverse = Vec::with_capacity(self.steps.len());
        let mut marks_changed = false;

        for step in &self.steps {
            let result = step.apply(&working, schema)?;
            marks_changed |= step.is_mark_step() || inserts_marks(step);
            mapping.push(result.map);
            inverse.push(result.inverse);
            working = result.doc;
        }
        if !self.steps.is_empty() {
            schema.check(&working)?;
        }
        inverse.reverse();

        let doc_changed = !self.steps.is_empty() && working != *doc;
        trace!(steps = self.steps.len(), doc_changed, "applied transaction");

        Ok(AppliedTransaction {
            doc: working,
            mapping,
            inverse,
            marks_changed: marks_changed && doc_changed,
            doc_changed,
        })
    }
}

fn inserts_marks(step: &Step) -> bool {
    match step {
        Step::Replace { content, .. } => content.iter().any(has_marks),
        _ => false,
    }
}

fn has_marks(node: &Node) -> bool {
    !node.marks().is_empty() || node.children().iter().any(has_marks)
}

/// Result of a successfully applied transaction
#[derive(Debug, Clone)]
pub struct AppliedTransaction {
    pub doc: Node,
    pub mapping: Mapping,
    /// Steps restoring the previous document, in application order
    pub inverse: Vec<Step>,
    pub marks_changed: bool,
    pub doc_changed: bool,
}

impl AppliedTransaction {
    /// The selection after this transaction: the explicit one if the
    /// transaction set it, otherwise `previous` mapped forward. Both are
    /// clamped onto text.
    pub fn resolve_selection(&self, tr: &Transaction, previous: &Selection) -> Selection {
        tr.selection()
            .unwrap_or_else(|| previous.map(&self.mapping))
            .clamp(&self.doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{doc, para, schema};

    #[test]
    fn test_multi_step_transaction() {
        let schema = schema();
        let d = doc(&schema, vec![para(&schema, "Hello")]);
        let tr = Transaction::new()
            .insert_text(7, " world", vec![])
            .add_mark(2, 7, Mark::new("strong"));
        let applied = tr.apply(&d, &schema).unwrap();
        assert!(applied.doc_changed);
        assert!(applied.marks_changed);
        assert_eq!(applied.doc.text_content(), "Hello world");

        let undo = Transaction::from_steps(applied.inverse.clone());
        let restored = undo.apply(&applied.doc, &schema).unwrap();
        assert_eq!(restored.doc, d);
    }

    #[test]
    fn test_failing_step_rejects_everything() {
        let schema = schema();
        let d = doc(&schema, vec![para(&schema, "Hello")]);
        let tr = Transaction::new()
            .insert_text(2, "A", vec![])
            .insert_text(500, "B", vec![]);
        assert!(tr.apply(&d, &schema).is_err());
    }

    #[test]
    fn test_selection_only_transaction() {
        let schema = schema();
        let d = doc(&schema, vec![para(&schema, "Hello")]);
        let tr = Transaction::new().set_selection(Selection::new(2, 4));
        let applied = tr.apply(&d, &schema).unwrap();
        assert!(!applied.doc_changed);
        assert_eq!(
            applied.resolve_selection(&tr, &Selection::cursor(2)),
            Selection::new(2, 4)
        );
    }

    #[test]
    fn test_meta_defaults() {
        let tr = Transaction::new();
        assert!(tr.meta().add_to_history);
        let tr = tr.without_history().ui_event("paste").tag("source", "clipboard");
        assert!(!tr.meta().add_to_history);
        assert_eq!(tr.meta().ui_event.as_deref(), Some("paste"));
        assert_eq!(tr.get_tag("source"), Some("clipboard"));
    }
}

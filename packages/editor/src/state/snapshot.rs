//! # Editing State Snapshot
//!
//! `{grammar, document, selection, plugins}`, immutable once built. Applying
//! a transaction is a pure function from one snapshot to the next; cloning a
//! snapshot only bumps reference counts.

use crate::history::HistoryStatus;
use crate::state::plugin::PluginSet;
use folio_convert::layout::{BODY, NOTES, PARAGRAPH};
use folio_model::{AppliedTransaction, Attrs, Mark, Node, ResolvedPos, Schema, SchemaError, Selection, StepError, Transaction};

/// Character standing in for inline atoms in text views of a textblock, so
/// character offsets equal position offsets
pub const ATOM_CHAR: char = '\u{fffc}';

#[derive(Debug, Clone)]
pub struct EditorState {
    schema: Schema,
    doc: Node,
    selection: Selection,
    plugins: PluginSet,
    history: HistoryStatus,
}

/// A textblock and the position directly before it
#[derive(Debug, Clone)]
pub struct TextblockRef {
    pub pos: usize,
    pub node: Node,
}

impl TextblockRef {
    pub fn content_start(&self) -> usize {
        self.pos + 1
    }

    pub fn content_end(&self) -> usize {
        self.pos + 1 + self.node.content_size()
    }

    pub fn end(&self) -> usize {
        self.pos + self.node.node_size()
    }
}

impl EditorState {
    pub fn new(schema: Schema, doc: Node, plugins: PluginSet) -> Self {
        let selection = Selection::at_start(&doc);
        Self {
            schema,
            doc,
            selection,
            plugins,
            history: HistoryStatus::default(),
        }
    }

    /// `doc(body(paragraph), notes)`
    pub fn empty_doc(schema: &Schema) -> Result<Node, SchemaError> {
        let paragraph = schema.node(PARAGRAPH, Attrs::new(), Vec::new())?;
        let body = schema.node(BODY, Attrs::new(), vec![paragraph])?;
        let notes = schema.node(NOTES, Attrs::new(), Vec::new())?;
        schema.node(schema.top_node(), Attrs::new(), vec![body, notes])
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn plugins(&self) -> &PluginSet {
        &self.plugins
    }

    pub fn history(&self) -> HistoryStatus {
        self.history
    }

    /// Apply a transaction, producing the next snapshot. `self` is untouched
    /// whatever the outcome.
    pub fn apply(&self, tr: &Transaction) -> Result<(EditorState, AppliedTransaction), StepError> {
        let applied = tr.apply(&self.doc, &self.schema)?;
        let next = EditorState {
            schema: self.schema.clone(),
            doc: applied.doc.clone(),
            selection: applied.resolve_selection(tr, &self.selection),
            plugins: self.plugins.clone(),
            history: self.history,
        };
        Ok((next, applied))
    }

    pub fn with_plugins(&self, plugins: PluginSet) -> Self {
        Self {
            plugins,
            ..self.clone()
        }
    }

    pub(crate) fn with_history(mut self, history: HistoryStatus) -> Self {
        self.history = history;
        self
    }

    pub fn resolve(&self, pos: usize) -> Option<ResolvedPos> {
        ResolvedPos::resolve(&self.doc, pos).ok()
    }

    /// The textblock containing `pos`
    pub fn textblock_at(&self, pos: usize) -> Option<TextblockRef> {
        let resolved = self.resolve(pos)?;
        let depth = resolved.textblock_depth()?;
        if depth == 0 {
            return None;
        }
        Some(TextblockRef {
            pos: resolved.before(depth),
            node: resolved.node(depth).clone(),
        })
    }

    /// Every textblock overlapping the selection, in document order
    pub fn selected_textblocks(&self) -> Vec<TextblockRef> {
        let (from, to) = (self.selection.from(), self.selection.to());
        let mut blocks = Vec::new();
        self.doc.nodes_between(from, to.max(from + 1).min(self.doc.content_size()), &mut |node, pos, _| {
            if node.is_textblock() {
                blocks.push(TextblockRef {
                    pos,
                    node: node.clone(),
                });
                return false;
            }
            !node.is_inline()
        });
        if blocks.is_empty() {
            blocks.extend(self.textblock_at(from));
        }
        blocks
    }

    /// Marks that text typed at `pos` would carry
    pub fn marks_at(&self, pos: usize) -> Vec<Mark> {
        let Some(resolved) = self.resolve(pos) else {
            return Vec::new();
        };
        if resolved.parent().is_code() {
            return Vec::new();
        }
        let after = resolved.node_after();
        resolved
            .marks()
            .into_iter()
            .filter(|mark| {
                let inclusive = self
                    .schema
                    .mark_type(&mark.mark_type)
                    .map(|t| t.is_inclusive())
                    .unwrap_or(true);
                inclusive || after.as_ref().map_or(false, |n| mark.is_in_set(n.marks()))
            })
            .collect()
    }

    /// Whether `pos` sits in code: a code textblock or text carrying a code
    /// mark
    pub fn in_code(&self, pos: usize) -> bool {
        let Some(resolved) = self.resolve(pos) else {
            return false;
        };
        if resolved.parent().is_code() {
            return true;
        }
        resolved.marks().iter().any(|m| {
            self.schema
                .mark_type(&m.mark_type)
                .map(|t| t.is_code())
                .unwrap_or(false)
        })
    }

    /// Whether every piece of text in the selection carries the mark type.
    /// An empty selection looks at the marks at the cursor.
    pub fn mark_active(&self, mark_type: &str) -> bool {
        let (from, to) = (self.selection.from(), self.selection.to());
        if from == to {
            return Mark::find_type(mark_type, &self.marks_at(from)).is_some();
        }
        let mut seen = false;
        let mut all = true;
        self.doc.nodes_between(from, to, &mut |node, _, _| {
            if node.is_inline() {
                seen = true;
                all &= Mark::find_type(mark_type, node.marks()).is_some();
            }
            true
        });
        seen && all
    }

    /// Text of a textblock with atoms replaced by [`ATOM_CHAR`]
    pub fn textblock_text(node: &Node) -> String {
        let mut text = String::new();
        for child in node.children() {
            match child.text() {
                Some(t) => text.push_str(t),
                None => text.push(ATOM_CHAR),
            }
        }
        text
    }

    /// Nearest ancestor of the selection head with the given type, as
    /// `(pos before it, node)`
    pub fn ancestor_of_type(&self, node_type: &str) -> Option<(usize, Node)> {
        let resolved = self.resolve(self.selection.head)?;
        (1..=resolved.depth())
            .rev()
            .find(|&d| resolved.node(d).node_type() == node_type)
            .map(|d| (resolved.before(d), resolved.node(d).clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{schema, state};

    #[test]
    fn test_empty_doc() {
        let schema = schema();
        let doc = EditorState::empty_doc(&schema).unwrap();
        assert_eq!(doc.child(0).unwrap().child(0).unwrap().node_type(), "paragraph");
        assert_eq!(doc.child(1).unwrap().child_count(), 0);
        let state = EditorState::new(schema, doc, PluginSet::default());
        assert_eq!(state.selection(), Selection::cursor(2));
    }

    #[test]
    fn test_apply_is_pure() {
        let state = state("Hello");
        let before = state.doc().clone();
        let (next, applied) = state
            .apply(&Transaction::new().insert_text(7, " world", vec![]))
            .unwrap();
        assert!(applied.doc_changed);
        assert_eq!(state.doc(), &before);
        assert_eq!(next.doc().text_content(), "Hello world");
    }

    #[test]
    fn test_textblock_at() {
        let state = state("# Title\n\nBody");
        let block = state.textblock_at(10).unwrap();
        assert_eq!(block.node.node_type(), "paragraph");
        assert_eq!(block.pos, 8);
        assert_eq!(block.content_start(), 9);
        assert_eq!(block.content_end(), 13);
    }

    #[test]
    fn test_marks_at_respects_inclusive() {
        let state = state("[link](https://example.com) after **bold**");
        // end of the link text: link is not inclusive
        let marks = state.marks_at(6);
        assert!(marks.is_empty());
        let end_of_bold = state.textblock_at(2).unwrap().content_end();
        let marks = state.marks_at(end_of_bold);
        assert_eq!(marks[0].mark_type, "strong");
    }

    #[test]
    fn test_in_code() {
        let state = state("Some `code` here\n\n```\nx = 1\n```");
        assert!(state.in_code(9));
        assert!(!state.in_code(4));
        let code = state.doc().child(0).unwrap().child(1).unwrap();
        assert!(code.is_code());
    }
}

//! Heading outline of the body region.
//!
//! Entries compare by level, text and identifier only. A heading that
//! merely moves because text was typed above it leaves the outline equal,
//! so `outlineChange` is not emitted for it.

use crate::extension::heading::{HEADING, MAX_LEVEL};
use crate::state::snapshot::EditorState;
use folio_convert::layout::{BODY, NOTES};
use folio_convert::markdown::{identifier_for, unique_identifier};
use folio_model::Node;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize)]
pub struct OutlineEntry {
    pub level: u64,
    pub text: String,
    /// Navigation identifier: the explicit `{#id}`, or the one the engine
    /// derives from the text, made unique within the document
    pub id: String,
    /// Position of the heading node
    pub pos: usize,
}

impl PartialEq for OutlineEntry {
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level && self.text == other.text && self.id == other.id
    }
}

impl Eq for OutlineEntry {}

pub type Outline = Vec<OutlineEntry>;

pub fn outline(state: &EditorState) -> Outline {
    outline_of(state.doc())
}

pub fn outline_of(doc: &Node) -> Outline {
    let mut entries = Vec::new();
    let mut used = HashSet::new();
    doc.descendants(&mut |node: &Node, pos: usize, _: &Node| {
        match node.node_type() {
            BODY => true,
            NOTES => false,
            HEADING => {
                let text = node.text_content();
                let id = match node.attr_str("id").filter(|id| !id.is_empty()) {
                    Some(explicit) => explicit.to_string(),
                    None => unique_identifier(&identifier_for(&text), &used),
                };
                used.insert(id.clone());
                entries.push(OutlineEntry {
                    level: node.attr_u64("level").unwrap_or(1).clamp(1, MAX_LEVEL),
                    text,
                    id,
                    pos,
                });
                false
            }
            // headings nested in quotes and lists still count
            _ => !node.is_textblock() && !node.is_leaf(),
        }
    });
    entries
}

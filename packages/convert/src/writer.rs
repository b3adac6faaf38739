//! # Tree Writer
//!
//! Serializes a document tree to the intermediate representation using the
//! registered rules. Writing never modifies the tree.
//!
//! Inline content is flat in the tree (marks are sets on each node) and
//! nested in the intermediate form. Marks shared by neighbouring nodes are
//! kept open across them:
//!
//! ```text
//! [strong]"a" [strong,em]"b" []"c"   →   Strong[Str a, Emph[Str b]], Str c
//! ```

use crate::ast::{text_inlines, Block, Inline, MetaValue, Pandoc};
use crate::error::ConversionError;
use crate::layout::{BODY, NOTES, REF_ATTR, TITLE_ATTR};
use crate::rules::ConversionRules;
use folio_model::{Mark, Node, Schema};
use std::collections::HashMap;

pub struct TreeWriter<'a> {
    schema: &'a Schema,
    rules: &'a ConversionRules,
    notes: HashMap<String, Node>,
}

struct OpenMark {
    mark: Mark,
    children: Vec<Inline>,
}

impl<'a> TreeWriter<'a> {
    pub fn new(schema: &'a Schema, rules: &'a ConversionRules) -> Self {
        Self {
            schema,
            rules,
            notes: HashMap::new(),
        }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn write_document(mut self, doc: &Node) -> Result<Pandoc, ConversionError> {
        for region in doc.children().iter().filter(|n| n.node_type() == NOTES) {
            for note in region.children() {
                if let Some(id) = note.attr_str(REF_ATTR) {
                    self.notes.insert(id.to_string(), note.clone());
                }
            }
        }
        let body = doc
            .children()
            .iter()
            .find(|n| n.node_type() == BODY)
            .ok_or_else(|| ConversionError::invalid_structure("document has no body region"))?;

        let mut pandoc = Pandoc::new(self.write_blocks(body.children())?);
        if let Some(title) = doc.attr_str(TITLE_ATTR).filter(|t| !t.is_empty()) {
            pandoc
                .meta
                .insert(TITLE_ATTR.to_string(), MetaValue::MetaInlines(text_inlines(title)));
        }
        Ok(pandoc)
    }

    pub fn write_blocks(&mut self, nodes: &[Node]) -> Result<Vec<Block>, ConversionError> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            out.extend(self.write_block(node)?);
        }
        Ok(out)
    }

    pub fn write_block(&mut self, node: &Node) -> Result<Vec<Block>, ConversionError> {
        let rules = self.rules;
        match rules.block_writer(node.node_type()) {
            Some(write) => write(self, node),
            None => Err(ConversionError::UnknownNodeKind(node.node_type().to_string())),
        }
    }

    /// Write inline children, nesting mark wrappers
    pub fn write_inlines(&mut self, nodes: &[Node]) -> Result<Vec<Inline>, ConversionError> {
        let mut root = Vec::new();
        let mut open: Vec<OpenMark> = Vec::new();

        for node in nodes {
            let marks = node.marks();
            let keep = open
                .iter()
                .zip(marks)
                .take_while(|(o, m)| o.mark == **m)
                .count();
            while open.len() > keep {
                self.close_mark(&mut open, &mut root)?;
            }
            for mark in &marks[keep..] {
                open.push(OpenMark {
                    mark: mark.clone(),
                    children: Vec::new(),
                });
            }
            let inlines = self.write_inline(node)?;
            match open.last_mut() {
                Some(top) => top.children.extend(inlines),
                None => root.extend(inlines),
            }
        }
        while !open.is_empty() {
            self.close_mark(&mut open, &mut root)?;
        }
        Ok(root)
    }

    fn close_mark(&self, open: &mut Vec<OpenMark>, root: &mut Vec<Inline>) -> Result<(), ConversionError> {
        let Some(frame) = open.pop() else {
            return Ok(());
        };
        let write = self
            .rules
            .mark_writer(&frame.mark.mark_type)
            .ok_or_else(|| ConversionError::UnknownNodeKind(frame.mark.mark_type.clone()))?;
        let wrapped = write(&frame.mark, frame.children)?;
        match open.last_mut() {
            Some(parent) => parent.children.push(wrapped),
            None => root.push(wrapped),
        }
        Ok(())
    }

    fn write_inline(&mut self, node: &Node) -> Result<Vec<Inline>, ConversionError> {
        if let Some(text) = node.text() {
            return Ok(text_inlines(text));
        }
        let rules = self.rules;
        match rules.inline_writer(node.node_type()) {
            Some(write) => write(self, node),
            None => Err(ConversionError::UnknownNodeKind(node.node_type().to_string())),
        }
    }

    /// Blocks of the note with the given reference id
    pub fn note_blocks(&mut self, id: &str) -> Result<Vec<Block>, ConversionError> {
        let note = self
            .notes
            .get(id)
            .cloned()
            .ok_or_else(|| ConversionError::invalid_structure(format!("note {} is not in the notes region", id)))?;
        self.write_blocks(note.children())
    }
}

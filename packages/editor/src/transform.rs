//! # Transform Builder
//!
//! Builds a transaction step by step against a working copy of the document,
//! so each step can be computed from the document as the previous steps left
//! it. Structural edits (deleting across blocks, splitting, joining,
//! wrapping, lifting) are expressed here as flat `Replace` steps at the
//! depth where both ends share a parent.

use crate::state::snapshot::EditorState;
use folio_convert::layout::{BODY, NOTE, NOTES, PARAGRAPH};
use folio_model::node::normalize_inline;
use folio_model::step::flat_slice;
use folio_model::{
    nearest_text_pos, textblock_ranges, Assoc, Attrs, Fragment, Mapping, Mark, Node, ResolvedPos, Schema,
    Selection, Step, StepError, Transaction,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct Transform {
    schema: Schema,
    doc: Node,
    steps: Vec<Step>,
    mapping: Mapping,
    selection: Option<Selection>,
}

impl Transform {
    pub fn new(state: &EditorState) -> Self {
        Self::from_doc(state.schema().clone(), state.doc().clone())
    }

    pub fn from_doc(schema: Schema, doc: Node) -> Self {
        Self {
            schema,
            doc,
            steps: Vec::new(),
            mapping: Mapping::new(),
            selection: None,
        }
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Map a position from the starting document through every step so far
    pub fn map(&self, pos: usize) -> usize {
        self.mapping.map(pos, Assoc::After)
    }

    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos, StepError> {
        ResolvedPos::resolve(&self.doc, pos)
    }

    pub fn step(&mut self, step: Step) -> Result<&mut Self, StepError> {
        let result = step.apply(&self.doc, &self.schema)?;
        self.mapping.push(result.map);
        self.doc = result.doc;
        self.steps.push(step);
        Ok(self)
    }

    pub fn replace(&mut self, from: usize, to: usize, content: Vec<Node>) -> Result<&mut Self, StepError> {
        self.step(Step::Replace { from, to, content })
    }

    pub fn insert_text(&mut self, pos: usize, text: &str, marks: Vec<Mark>) -> Result<&mut Self, StepError> {
        if text.is_empty() {
            return Ok(self);
        }
        self.replace(pos, pos, vec![Node::new_text(text, marks)])
    }

    pub fn add_mark(&mut self, from: usize, to: usize, mark: Mark) -> Result<&mut Self, StepError> {
        self.step(Step::AddMark { from, to, mark })
    }

    pub fn remove_mark(&mut self, from: usize, to: usize, mark: Mark) -> Result<&mut Self, StepError> {
        self.step(Step::RemoveMark { from, to, mark })
    }

    pub fn set_node_attrs(&mut self, pos: usize, attrs: Attrs) -> Result<&mut Self, StepError> {
        self.step(Step::SetAttrs { pos, attrs })
    }

    pub fn set_selection(&mut self, selection: Selection) -> &mut Self {
        self.selection = Some(selection);
        self
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn into_transaction(self) -> Transaction {
        let tr = Transaction::from_steps(self.steps);
        match self.selection {
            Some(selection) => tr.set_selection(selection),
            None => tr,
        }
    }

    /// Delete `from..to`, joining the blocks the range cuts through
    pub fn delete_range(&mut self, from: usize, to: usize) -> Result<&mut Self, StepError> {
        if from >= to {
            return Ok(self);
        }
        let rf = self.resolve(from)?;
        let rt = self.resolve(to)?;
        let depth = rf.shared_depth(to);
        if rf.depth() == depth && rt.depth() == depth {
            return self.replace(from, to, Vec::new());
        }

        let parent = rf.node(depth).clone();
        let content_start = rf.start(depth);
        let start = if rf.depth() > depth { rf.before(depth + 1) } else { from };
        let end = if rt.depth() > depth { rt.after(depth + 1) } else { to };
        let left = parent.content().cut(start - content_start, from - content_start).to_vec();
        let right = parent.content().cut(to - content_start, end - content_start).to_vec();
        self.replace(start, end, join_sequences(left, right))
    }

    /// Split the textblock around `pos`. Returns the cursor position at the
    /// start of the new block.
    pub fn split_block(&mut self, pos: usize) -> Result<usize, StepError> {
        let r = self.resolve(pos)?;
        let depth = r
            .textblock_depth()
            .filter(|d| *d > 0)
            .ok_or(StepError::NoNodeAt(pos))?;
        let block = r.node(depth).clone();
        let offset = pos - r.start(depth);
        let size = block.content_size();

        let left = block.with_content(block.content().cut(0, offset));
        let tail = block.content().cut(offset, size).to_vec();
        let right = if offset == size && block.node_type() != PARAGRAPH && self.schema.has_node(PARAGRAPH) {
            self.schema.node(PARAGRAPH, Attrs::new(), tail)?
        } else {
            let mut attrs = block.attrs().clone();
            attrs.remove("id");
            self.schema.node(block.node_type(), attrs, tail)?
        };

        let before = r.before(depth);
        let cursor = before + left.node_size() + 1;
        self.replace(before, r.after(depth), vec![left, right])?;
        Ok(cursor)
    }

    /// Backspace at the start of a textblock: merge it into whatever
    /// precedes it, or lift it out of its wrapper. Returns the new cursor,
    /// or `None` when there is nothing to join with.
    pub fn join_backward(&mut self, pos: usize) -> Result<Option<usize>, StepError> {
        let r = self.resolve(pos)?;
        let Some(depth) = r.textblock_depth().filter(|d| *d > 0) else {
            return Ok(None);
        };
        if r.parent_offset() != 0 {
            return Ok(None);
        }

        // Never join across region boundaries (body, notes, a single note)
        let floor = (0..depth)
            .rev()
            .find(|&d| d == 0 || is_region(r.node(d)))
            .unwrap_or(0);
        let with_sibling = (floor + 1..=depth).rev().find(|&d| r.index(d - 1) > 0);

        if let Some(level) = with_sibling {
            let container = r.node(level - 1);
            let prev_index = r.index(level - 1) - 1;
            let prev = container.child(prev_index).cloned().ok_or(StepError::NoNodeAt(pos))?;
            let prev_pos = r.before(level) - prev.node_size();

            if level == depth || prev.node_type() == r.node(level).node_type() {
                if level == depth && prev.is_leaf() {
                    self.replace(prev_pos, r.before(level), Vec::new())?;
                    return Ok(Some(pos - prev.node_size()));
                }
                return match last_textblock_end(&prev, prev_pos) {
                    Some(target) => {
                        self.delete_range(target, pos)?;
                        Ok(Some(target))
                    }
                    None => Ok(None),
                };
            }
        }

        // Lift out of the outermost wrapper the textblock opens
        let mut outer = None;
        for d in (floor + 1..depth).rev() {
            if r.index(d) != 0 {
                break;
            }
            outer = Some(d);
        }
        let Some(outer) = outer else {
            return Ok(None);
        };
        let wrapper = r.node(outer).clone();
        let textblock = r.node(depth).clone();
        let before = r.before(outer);
        let mut content = vec![textblock];
        content.extend(remove_first_textblock(&wrapper));
        self.replace(before, r.after(outer), content)?;
        Ok(Some(before + 1))
    }

    /// Wrap the blocks covering `from..to` in `wrapper`, optionally putting
    /// each block in its own `item` node first
    pub fn wrap(
        &mut self,
        from: usize,
        to: usize,
        wrapper: &str,
        attrs: Attrs,
        item: Option<&str>,
    ) -> Result<&mut Self, StepError> {
        let (start, end) = self.block_range(from, to)?;
        let blocks = flat_slice(&self.doc, start, end)?;
        let children = match item {
            Some(item) => blocks
                .into_iter()
                .map(|block| self.schema.node(item, Attrs::new(), vec![block]))
                .collect::<Result<Vec<_>, _>>()?,
            None => blocks,
        };
        let wrapped = self.schema.node(wrapper, attrs, children)?;
        self.replace(start, end, vec![wrapped])
    }

    /// Replace the node at `pos` by its children. With `flatten_items` the
    /// children's children are used instead (list items).
    pub fn unwrap(&mut self, pos: usize, flatten_items: bool) -> Result<&mut Self, StepError> {
        let node = self.doc.node_at(pos).cloned().ok_or(StepError::NoNodeAt(pos))?;
        if node.is_text() {
            return Err(StepError::NoNodeAt(pos));
        }
        let content: Vec<Node> = if flatten_items {
            node.children().iter().flat_map(|item| item.children().to_vec()).collect()
        } else {
            node.children().to_vec()
        };
        self.replace(pos, pos + node.node_size(), content)
    }

    /// Retype every textblock overlapping `from..to`. Marks are stripped
    /// first when the new type is code. Returns how many blocks changed.
    pub fn set_block_type(&mut self, from: usize, to: usize, node_type: &str, attrs: Attrs) -> Result<usize, StepError> {
        let target_is_code = self
            .schema
            .node_type(node_type)
            .map(|t| t.is_code())
            .unwrap_or(false);

        let mut blocks = Vec::new();
        self.doc.nodes_between(from, to.max(from + 1).min(self.doc.content_size()), &mut |node, pos, _| {
            if node.is_textblock() {
                blocks.push((pos, node.clone()));
                return false;
            }
            !node.is_inline()
        });

        let mut changed = 0;
        for (pos, block) in blocks {
            let computed = match self.schema.node_type(node_type) {
                Some(t) => Schema::compute_attrs(node_type, &t.spec().attrs, &attrs)?,
                None => return Err(folio_model::SchemaError::UnknownNodeType(node_type.to_string()).into()),
            };
            if block.node_type() == node_type && block.attrs() == &computed {
                continue;
            }
            if target_is_code {
                let mut mark_types: Vec<String> = Vec::new();
                for child in block.children() {
                    for mark in child.marks() {
                        if !mark_types.contains(&mark.mark_type) {
                            mark_types.push(mark.mark_type.clone());
                        }
                    }
                }
                for mark_type in mark_types {
                    self.remove_mark(pos + 1, pos + 1 + block.content_size(), Mark::new(mark_type))?;
                }
            }
            self.step(Step::SetNodeType {
                pos,
                node_type: node_type.to_string(),
                attrs: attrs.clone(),
            })?;
            changed += 1;
        }
        Ok(changed)
    }

    /// The flat sibling range of blocks covering `from..to`
    fn block_range(&self, from: usize, to: usize) -> Result<(usize, usize), StepError> {
        let rf = self.resolve(from)?;
        let rt = self.resolve(to)?;
        let mut depth = rf.shared_depth(to);
        if rf.node(depth).is_textblock() {
            depth -= 1;
        }
        if rf.depth() <= depth || rt.depth() <= depth {
            return Err(StepError::NoNodeAt(from));
        }
        Ok((rf.before(depth + 1), rt.after(depth + 1)))
    }
}

/// Body, notes and each note are editing regions; edits never merge across
/// them
pub fn is_region(node: &Node) -> bool {
    matches!(node.node_type(), BODY | NOTES | NOTE)
}

fn join_sequences(mut left: Vec<Node>, right: Vec<Node>) -> Vec<Node> {
    let mut right = right.into_iter();
    match (left.pop(), right.next()) {
        (Some(a), Some(b)) => left.extend(join_nodes(a, b)),
        (Some(a), None) => left.push(a),
        (None, Some(b)) => left.push(b),
        (None, None) => {}
    }
    left.extend(right);
    left
}

/// Merge the end of `a` with the start of `b`
fn join_nodes(a: Node, b: Node) -> Vec<Node> {
    let is_container = |n: &Node| !n.is_textblock() && !n.is_leaf() && !n.is_inline();

    if a.is_textblock() && b.is_textblock() {
        let mut content = a.children().to_vec();
        content.extend(b.children().iter().cloned());
        return vec![a.with_content(Fragment::from(normalize_inline(content)))];
    }
    if is_container(&a) && a.child_count() == 0 {
        return vec![b];
    }
    if is_container(&b) && b.child_count() == 0 {
        return vec![a];
    }
    if a.is_textblock() && is_container(&b) {
        let mut rest = b.children().to_vec();
        let first = rest.remove(0);
        let mut out = join_nodes(a, first);
        if !rest.is_empty() {
            out.push(b.with_content(Fragment::from(rest)));
        }
        return out;
    }
    if is_container(&a) && (b.is_textblock() || (is_container(&b) && a.node_type() == b.node_type())) {
        let mut children = a.children().to_vec();
        let last = children.pop();
        let mut tail = Vec::new();
        match (last, b.is_textblock()) {
            (Some(last), true) => children.extend(join_nodes(last, b)),
            (Some(last), false) => {
                let mut b_children = b.children().to_vec().into_iter();
                if let Some(first) = b_children.next() {
                    children.extend(join_nodes(last, first));
                } else {
                    children.push(last);
                }
                tail.extend(b_children);
            }
            (None, _) => {}
        }
        children.extend(tail);
        return vec![a.with_content(Fragment::from(children))];
    }
    vec![a, b]
}

/// End of the content of the last textblock inside `node` (at `pos`)
fn last_textblock_end(node: &Node, pos: usize) -> Option<usize> {
    if node.is_textblock() {
        return Some(pos + 1 + node.content_size());
    }
    if node.is_leaf() {
        return None;
    }
    let last = node.children().last()?;
    last_textblock_end(last, pos + node.node_size() - 1 - last.node_size())
}

/// `node` without its first textblock; wrappers left empty disappear
fn remove_first_textblock(node: &Node) -> Option<Node> {
    if node.is_textblock() {
        return None;
    }
    let mut children = node.children().to_vec();
    if children.is_empty() {
        return None;
    }
    let first = children.remove(0);
    let mut content: Vec<Node> = remove_first_textblock(&first).into_iter().collect();
    content.extend(children);
    if content.is_empty() {
        None
    } else {
        Some(node.with_content(Fragment::from(content)))
    }
}

/// A position as (textblock ordinal, offset into its content). Survives
/// edits that restructure blocks without touching their text, such as
/// wrapping, lifting and retyping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextAnchor {
    block: usize,
    offset: usize,
}

impl TextAnchor {
    pub fn capture(doc: &Node, pos: usize) -> Option<Self> {
        textblock_ranges(doc)
            .into_iter()
            .enumerate()
            .find(|(_, (start, end))| *start <= pos && pos <= *end)
            .map(|(block, (start, _))| Self {
                block,
                offset: pos - start,
            })
    }

    pub fn restore(&self, doc: &Node) -> usize {
        match textblock_ranges(doc).get(self.block) {
            Some((start, end)) => (start + self.offset).min(*end),
            None => nearest_text_pos(doc, doc.content_size()),
        }
    }
}

/// Both ends of a selection as [`TextAnchor`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionAnchors {
    anchor: Option<TextAnchor>,
    head: Option<TextAnchor>,
    fallback: Selection,
}

impl SelectionAnchors {
    pub fn capture(doc: &Node, selection: Selection) -> Self {
        Self {
            anchor: TextAnchor::capture(doc, selection.anchor),
            head: TextAnchor::capture(doc, selection.head),
            fallback: selection,
        }
    }

    pub fn restore(&self, doc: &Node) -> Selection {
        let anchor = self
            .anchor
            .map(|a| a.restore(doc))
            .unwrap_or(self.fallback.anchor);
        let head = self.head.map(|h| h.restore(doc)).unwrap_or(self.fallback.head);
        Selection::new(anchor, head).clamp(doc)
    }
}

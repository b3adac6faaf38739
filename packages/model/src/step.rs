//! # Steps
//!
//! Atomic document edits. Every step:
//!
//! 1. **Validates** against the grammar before producing a document
//! 2. **Maps**: reports a [`StepMap`] so positions can be carried forward
//! 3. **Inverts**: produces the step that restores the previous document
//!
//! ## Step Semantics
//!
//! ### Replace
//! - Flat: `from` and `to` must share the same parent node
//! - Structural edits (split, join, wrap, lift) replace a range of siblings in
//!   a common ancestor with rebuilt nodes
//!
//! ### AddMark / RemoveMark
//! - Apply to inline content in the range, skipping parents that do not
//!   allow the mark
//!
//! ### SetAttrs / SetNodeType
//! - Target the node starting at `pos`; content is kept and revalidated

use crate::attrs::Attrs;
use crate::error::StepError;
use crate::mapping::StepMap;
use crate::mark::Mark;
use crate::node::{content_size, normalize_inline, Fragment, Node};
use crate::resolve::ResolvedPos;
use crate::schema::Schema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stepType", rename_all = "camelCase")]
pub enum Step {
    /// Replace `from..to` (same parent) with `content`
    Replace {
        from: usize,
        to: usize,
        content: Vec<Node>,
    },

    /// Add a mark to inline content in `from..to`
    AddMark { from: usize, to: usize, mark: Mark },

    /// Remove marks of `mark`'s type from inline content in `from..to`
    RemoveMark { from: usize, to: usize, mark: Mark },

    /// Replace the attributes of the node starting at `pos`
    SetAttrs { pos: usize, attrs: Attrs },

    /// Change the type of the node starting at `pos`
    #[serde(rename_all = "camelCase")]
    SetNodeType {
        pos: usize,
        node_type: String,
        attrs: Attrs,
    },

    /// Replace the attributes of the document root
    SetDocAttrs { attrs: Attrs },
}

/// Outcome of applying one step
#[derive(Debug, Clone)]
pub struct StepResult {
    pub doc: Node,
    pub map: StepMap,
    pub inverse: Step,
}

impl Step {
    pub fn apply(&self, doc: &Node, schema: &Schema) -> Result<StepResult, StepError> {
        match self {
            Step::Replace { from, to, content } => {
                let inverse = Step::Replace {
                    from: *from,
                    to: *from + content_size(content),
                    content: flat_slice(doc, *from, *to)?,
                };
                let new_doc = replace_flat(doc, schema, *from, *to, content)?;
                Ok(StepResult {
                    doc: new_doc,
                    map: StepMap::single(*from, to - from, content_size(content)),
                    inverse,
                })
            }

            Step::AddMark { from, to, mark } => {
                let mark = schema.mark(&mark.mark_type, mark.attrs.clone())?;
                let inverse = covering_replace(doc, *from, *to)?;
                let new_doc = map_inline_range(doc, *from, *to, 0, &|node: &Node, parent: &Node| {
                    if schema.allows_mark(parent.node_type(), &mark.mark_type) {
                        node.with_marks(schema.add_mark(&mark, node.marks()))
                    } else {
                        node.clone()
                    }
                });
                Ok(StepResult {
                    doc: new_doc,
                    map: StepMap::identity(),
                    inverse,
                })
            }

            Step::RemoveMark { from, to, mark } => {
                if !schema.has_mark(&mark.mark_type) {
                    return Err(crate::SchemaError::UnknownMarkType(mark.mark_type.clone()).into());
                }
                let inverse = covering_replace(doc, *from, *to)?;
                let new_doc = map_inline_range(doc, *from, *to, 0, &|node: &Node, _parent: &Node| {
                    node.with_marks(Mark::remove_type(&mark.mark_type, node.marks()))
                });
                Ok(StepResult {
                    doc: new_doc,
                    map: StepMap::identity(),
                    inverse,
                })
            }

            Step::SetAttrs { pos, attrs } => {
                let target = node_starting_at(doc, *pos)?;
                let updated = schema.retype(&target, target.node_type(), attrs.clone())?;
                retarget(doc, schema, *pos, &target, updated)
            }

            Step::SetNodeType {
                pos,
                node_type,
                attrs,
            } => {
                let target = node_starting_at(doc, *pos)?;
                let updated = schema.retype(&target, node_type, attrs.clone())?;
                retarget(doc, schema, *pos, &target, updated)
            }

            Step::SetDocAttrs { attrs } => {
                let doc_type = schema
                    .node_type(doc.node_type())
                    .ok_or_else(|| crate::SchemaError::UnknownNodeType(doc.node_type().to_string()))?;
                let computed = Schema::compute_attrs(doc.node_type(), &doc_type.spec().attrs, attrs)?;
                Ok(StepResult {
                    doc: doc.with_attrs(computed),
                    map: StepMap::identity(),
                    inverse: Step::SetDocAttrs {
                        attrs: doc.attrs().clone(),
                    },
                })
            }
        }
    }

    /// Whether the step only touches marks
    pub fn is_mark_step(&self) -> bool {
        matches!(self, Step::AddMark { .. } | Step::RemoveMark { .. })
    }
}

fn node_starting_at(doc: &Node, pos: usize) -> Result<Node, StepError> {
    let resolved = ResolvedPos::resolve(doc, pos)?;
    if resolved.text_offset() > 0 {
        return Err(StepError::NoNodeAt(pos));
    }
    match resolved.node_after() {
        Some(node) if !node.is_text() => Ok(node),
        _ => Err(StepError::NoNodeAt(pos)),
    }
}

/// Swap the node at `pos` for `updated`, which may differ in size when a
/// leaf is involved
fn retarget(
    doc: &Node,
    schema: &Schema,
    pos: usize,
    target: &Node,
    updated: Node,
) -> Result<StepResult, StepError> {
    let old_size = target.node_size();
    let new_size = updated.node_size();
    let new_doc = replace_flat(doc, schema, pos, pos + old_size, std::slice::from_ref(&updated))?;
    let map = if old_size == new_size {
        StepMap::identity()
    } else {
        StepMap::single(pos, old_size, new_size)
    };
    Ok(StepResult {
        doc: new_doc,
        map,
        inverse: Step::Replace {
            from: pos,
            to: pos + new_size,
            content: vec![target.clone()],
        },
    })
}

/// Content between two positions that share a parent
pub fn flat_slice(doc: &Node, from: usize, to: usize) -> Result<Vec<Node>, StepError> {
    if from > to {
        return Err(StepError::InvalidRange { from, to });
    }
    let rf = ResolvedPos::resolve(doc, from)?;
    let rt = ResolvedPos::resolve(doc, to)?;
    let depth = rf.depth();
    if rt.depth() != depth || rf.start(depth) != rt.start(depth) {
        return Err(StepError::CrossesParent { from, to });
    }
    Ok(rf
        .parent()
        .content()
        .cut(rf.parent_offset(), rt.parent_offset())
        .to_vec())
}

/// The flat range in the deepest common ancestor covering `from..to`,
/// together with its current content
pub fn covering_range(doc: &Node, from: usize, to: usize) -> Result<(usize, usize, Vec<Node>), StepError> {
    if from > to {
        return Err(StepError::InvalidRange { from, to });
    }
    let rf = ResolvedPos::resolve(doc, from)?;
    let rt = ResolvedPos::resolve(doc, to)?;
    let depth = rf.shared_depth(to);
    let start = if rf.depth() > depth { rf.before(depth + 1) } else { from };
    let end = if rt.depth() > depth { rt.after(depth + 1) } else { to };
    let parent = rf.node(depth);
    let content_start = rf.start(depth);
    let nodes = parent
        .content()
        .cut(start - content_start, end - content_start)
        .to_vec();
    Ok((start, end, nodes))
}

fn covering_replace(doc: &Node, from: usize, to: usize) -> Result<Step, StepError> {
    let (start, end, content) = covering_range(doc, from, to)?;
    Ok(Step::Replace {
        from: start,
        to: end,
        content,
    })
}

fn replace_flat(doc: &Node, schema: &Schema, from: usize, to: usize, content: &[Node]) -> Result<Node, StepError> {
    if from > to {
        return Err(StepError::InvalidRange { from, to });
    }
    let rf = ResolvedPos::resolve(doc, from)?;
    let rt = ResolvedPos::resolve(doc, to)?;
    let depth = rf.depth();
    if rt.depth() != depth || rf.start(depth) != rt.start(depth) {
        return Err(StepError::CrossesParent { from, to });
    }
    for node in content {
        schema.check(node)?;
    }
    let parent = rf.parent();
    let new_content = parent
        .content()
        .replace(rf.parent_offset(), rt.parent_offset(), content);
    schema.check_content(parent.node_type(), &new_content)?;
    Ok(rebuild(&rf, depth, parent.with_content(new_content)))
}

/// Rebuild the ancestors of the node at `depth` around a replacement
fn rebuild(resolved: &ResolvedPos, depth: usize, replacement: Node) -> Node {
    let mut node = replacement;
    for d in (0..depth).rev() {
        let ancestor = resolved.node(d);
        node = ancestor.with_content(ancestor.content().replace_child(resolved.index(d), node));
    }
    node
}

/// Apply `f` to every inline node overlapping `from..to`, splitting text at
/// the range boundaries. `start` is the absolute content start of `node`.
fn map_inline_range<F>(node: &Node, from: usize, to: usize, start: usize, f: &F) -> Node
where
    F: Fn(&Node, &Node) -> Node,
{
    let mut changed = false;
    let mut children = Vec::with_capacity(node.child_count());
    let mut pos = start;
    for child in node.children() {
        let end = pos + child.node_size();
        if end <= from || pos >= to {
            children.push(child.clone());
        } else if child.is_text() {
            let a = from.saturating_sub(pos);
            let b = (to - pos).min(child.text_len());
            if a > 0 {
                children.push(child.cut_text(0, a));
            }
            children.push(f(&child.cut_text(a, b), node));
            if b < child.text_len() {
                children.push(child.cut_text(b, child.text_len()));
            }
            changed = true;
        } else if child.is_inline() {
            children.push(f(child, node));
            changed = true;
        } else {
            children.push(map_inline_range(child, from, to, pos + 1, f));
            changed = true;
        }
        pos = end;
    }
    if !changed {
        return node.clone();
    }
    node.with_content(Fragment::from(normalize_inline(children)))
}

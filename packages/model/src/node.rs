//! # Document Tree
//!
//! Immutable, persistent tree of typed nodes.
//!
//! Child lists are shared behind an `Arc`, so "modifying" a node rebuilds only
//! the path from the root to the change and every untouched subtree is reused.
//!
//! ## Positions
//!
//! Positions count tokens the way the visual surface does:
//!
//! ```text
//! <body><paragraph>Hi</paragraph></body>
//!      0           1 2 3            4
//! ```
//!
//! - a text node occupies one position per character
//! - a leaf node (image, hard break) occupies one position
//! - any other node occupies its content size + 2 (open and close tokens)

use crate::attrs::{attr_str, attr_u64, Attrs};
use crate::mark::Mark;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Type name shared by every text node
pub const TEXT_NODE: &str = "text";

/// Structural flags copied from the node's grammar entry at creation time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFlags {
    #[serde(default, skip_serializing_if = "is_false")]
    pub leaf: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub inline: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub textblock: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub code: bool,
}

impl NodeFlags {
    fn is_plain(&self) -> bool {
        *self == NodeFlags::default()
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Ordered, shared list of child nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Node>", into = "Vec<Node>")]
pub struct Fragment {
    nodes: Arc<Vec<Node>>,
    size: usize,
}

impl From<Vec<Node>> for Fragment {
    fn from(nodes: Vec<Node>) -> Self {
        let size = nodes.iter().map(Node::node_size).sum();
        Self {
            nodes: Arc::new(nodes),
            size,
        }
    }
}

impl From<Fragment> for Vec<Node> {
    fn from(fragment: Fragment) -> Self {
        Arc::try_unwrap(fragment.nodes).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl Fragment {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Total size of the children in positions
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn child_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn as_slice(&self) -> &[Node] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn to_vec(&self) -> Vec<Node> {
        self.nodes.as_ref().clone()
    }

    /// Find the child index at a content offset.
    ///
    /// Returns the index of the child that starts at or contains `pos` together
    /// with that child's start offset. An offset equal to the content size yields
    /// `(child_count, size)`.
    pub fn find_index(&self, pos: usize) -> (usize, usize) {
        if pos == 0 {
            return (0, 0);
        }
        let mut cur = 0;
        for (i, child) in self.nodes.iter().enumerate() {
            let end = cur + child.node_size();
            if end == pos {
                return (i + 1, end);
            }
            if end > pos {
                return (i, cur);
            }
            cur = end;
        }
        (self.nodes.len(), self.size)
    }

    /// Cut out the content between two offsets, splitting text and
    /// partially covered nodes
    pub fn cut(&self, from: usize, to: usize) -> Fragment {
        let to = to.min(self.size);
        if from == 0 && to == self.size {
            return self.clone();
        }
        let mut result = Vec::new();
        let mut pos = 0;
        for child in self.nodes.iter() {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from {
                let piece = if child.is_text() {
                    child.cut_text(from.saturating_sub(pos), (to - pos).min(child.text_len()))
                } else if pos < from || end > to {
                    let inner_from = from.saturating_sub(pos + 1);
                    let inner_to = (to - pos).saturating_sub(1).min(child.content_size());
                    child.with_content(child.content.cut(inner_from, inner_to))
                } else {
                    child.clone()
                };
                result.push(piece);
            }
            pos = end;
        }
        Fragment::from(normalize_inline(result))
    }

    /// Replace the content between two offsets with new nodes
    pub fn replace(&self, from: usize, to: usize, insert: &[Node]) -> Fragment {
        let mut nodes = self.cut(0, from).to_vec();
        nodes.extend(insert.iter().cloned());
        nodes.extend(self.cut(to, self.size).iter().cloned());
        Fragment::from(normalize_inline(nodes))
    }

    /// Replace a single child
    pub fn replace_child(&self, index: usize, node: Node) -> Fragment {
        let mut nodes = self.to_vec();
        if index < nodes.len() {
            nodes[index] = node;
        }
        Fragment::from(nodes)
    }
}

/// Merge adjacent text nodes carrying the same marks and drop empty text
pub fn normalize_inline(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if node.is_text() && node.text_len() == 0 {
            continue;
        }
        if let Some(last) = out.last_mut() {
            if last.is_text() && node.is_text() && last.marks == node.marks {
                let mut merged = last.text.clone().unwrap_or_default();
                merged.push_str(node.text().unwrap_or_default());
                last.text = Some(merged);
                continue;
            }
        }
        out.push(node);
    }
    out
}

/// A node in the document tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type")]
    node_type: String,

    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    attrs: Attrs,

    #[serde(default, skip_serializing_if = "Fragment::is_empty")]
    content: Fragment,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    marks: Vec<Mark>,

    #[serde(default, skip_serializing_if = "NodeFlags::is_plain")]
    flags: NodeFlags,
}

impl Node {
    /// Create a text node. Grammar validation happens when it is placed.
    pub fn new_text(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Self {
            node_type: TEXT_NODE.to_string(),
            attrs: Attrs::new(),
            content: Fragment::empty(),
            text: Some(text.into()),
            marks,
            flags: NodeFlags {
                inline: true,
                ..NodeFlags::default()
            },
        }
    }

    pub(crate) fn new_element(
        node_type: impl Into<String>,
        attrs: Attrs,
        content: Fragment,
        marks: Vec<Mark>,
        flags: NodeFlags,
    ) -> Self {
        Self {
            node_type: node_type.into(),
            attrs,
            content,
            text: None,
            marks,
            flags,
        }
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        attr_str(&self.attrs, name)
    }

    pub fn attr_u64(&self, name: &str) -> Option<u64> {
        attr_u64(&self.attrs, name)
    }

    pub fn content(&self) -> &Fragment {
        &self.content
    }

    pub fn children(&self) -> &[Node] {
        self.content.as_slice()
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.content.child(index)
    }

    pub fn child_count(&self) -> usize {
        self.content.child_count()
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_text(&self) -> bool {
        self.text.is_some()
    }

    pub fn is_leaf(&self) -> bool {
        self.flags.leaf
    }

    pub fn is_inline(&self) -> bool {
        self.flags.inline
    }

    pub fn is_block(&self) -> bool {
        !self.flags.inline
    }

    pub fn is_textblock(&self) -> bool {
        self.flags.textblock
    }

    pub fn is_code(&self) -> bool {
        self.flags.code
    }

    /// Length of a text node in characters (0 for other nodes)
    pub fn text_len(&self) -> usize {
        self.text.as_ref().map(|t| t.chars().count()).unwrap_or(0)
    }

    /// Size of this node in positions
    pub fn node_size(&self) -> usize {
        if self.is_text() {
            self.text_len()
        } else if self.flags.leaf {
            1
        } else {
            self.content.size() + 2
        }
    }

    pub fn content_size(&self) -> usize {
        self.content.size()
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self) -> String {
        if let Some(text) = &self.text {
            return text.clone();
        }
        let mut out = String::new();
        for child in self.content.iter() {
            out.push_str(&child.text_content());
        }
        out
    }

    pub fn with_content(&self, content: Fragment) -> Node {
        Node {
            content,
            ..self.clone()
        }
    }

    pub fn with_attrs(&self, attrs: Attrs) -> Node {
        Node {
            attrs,
            ..self.clone()
        }
    }

    pub fn with_marks(&self, marks: Vec<Mark>) -> Node {
        Node {
            marks,
            ..self.clone()
        }
    }

    /// Character range of a text node as a new text node
    pub fn cut_text(&self, from: usize, to: usize) -> Node {
        let text = self.text.as_deref().unwrap_or_default();
        Node {
            text: Some(char_slice(text, from, to).to_string()),
            ..self.clone()
        }
    }

    /// Same type, attributes and marks
    pub fn same_markup(&self, other: &Node) -> bool {
        self.node_type == other.node_type && self.attrs == other.attrs && self.marks == other.marks
    }

    /// Visit every node overlapping the content range `from..to`.
    ///
    /// The callback receives the node, its absolute position and its parent.
    /// Returning `false` skips the node's children.
    pub fn nodes_between<F>(&self, from: usize, to: usize, f: &mut F)
    where
        F: FnMut(&Node, usize, &Node) -> bool,
    {
        self.walk_between(from, to, 0, f);
    }

    fn walk_between<F>(&self, from: usize, to: usize, node_start: usize, f: &mut F)
    where
        F: FnMut(&Node, usize, &Node) -> bool,
    {
        let mut pos = 0;
        for child in self.content.iter() {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from && f(child, node_start + pos, self) && child.content_size() > 0 {
                let start = pos + 1;
                child.walk_between(
                    from.saturating_sub(start),
                    child.content_size().min(to.saturating_sub(start)),
                    node_start + start,
                    f,
                );
            }
            pos = end;
        }
    }

    /// Visit every descendant
    pub fn descendants<F>(&self, f: &mut F)
    where
        F: FnMut(&Node, usize, &Node) -> bool,
    {
        self.nodes_between(0, self.content_size(), f);
    }

    /// Text between two positions, with `block_separator` between textblocks
    /// and `leaf_text` standing in for inline atoms
    pub fn text_between(&self, from: usize, to: usize, block_separator: &str, leaf_text: &str) -> String {
        let mut text = String::new();
        let mut first = true;
        self.nodes_between(from, to, &mut |node, pos, _parent| {
            let node_text = if let Some(t) = node.text() {
                let start = from.saturating_sub(pos);
                let end = (to - pos).min(node.text_len());
                char_slice(t, start, end).to_string()
            } else if node.is_leaf() && node.is_inline() {
                leaf_text.to_string()
            } else {
                String::new()
            };
            if node.is_textblock() || (node.is_leaf() && node.is_block()) {
                if first {
                    first = false;
                } else {
                    text.push_str(block_separator);
                }
            }
            text.push_str(&node_text);
            true
        });
        text
    }

    /// The node starting at `pos`, if any
    pub fn node_at(&self, pos: usize) -> Option<&Node> {
        let mut node = self;
        let mut pos = pos;
        loop {
            let (index, offset) = node.content.find_index(pos);
            let child = node.content.child(index)?;
            if offset == pos || child.is_text() {
                return Some(child);
            }
            node = child;
            pos = pos - offset - 1;
        }
    }
}

/// Slice a string by character offsets
pub fn char_slice(text: &str, from: usize, to: usize) -> &str {
    if from >= to {
        return "";
    }
    let mut indices = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len()));
    let start = indices.nth(from).unwrap_or(text.len());
    let end = if to > from {
        indices.nth(to - from - 1).unwrap_or(text.len())
    } else {
        start
    };
    &text[start..end]
}

/// Total size of a list of nodes
pub fn content_size(nodes: &[Node]) -> usize {
    nodes.iter().map(Node::node_size).sum()
}

use crate::mapping::{Assoc, Mapping};
use crate::node::Node;
use serde::{Deserialize, Serialize};

/// Text selection. `anchor` stays put while `head` moves with the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    pub fn cursor(pos: usize) -> Self {
        Self { anchor: pos, head: pos }
    }

    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Carry the selection across the steps of a transaction
    pub fn map(&self, mapping: &Mapping) -> Self {
        Self {
            anchor: mapping.map(self.anchor, Assoc::After),
            head: mapping.map(self.head, Assoc::After),
        }
    }

    /// Cursor at the first text position of the document
    pub fn at_start(doc: &Node) -> Self {
        Self::cursor(nearest_text_pos(doc, 0))
    }

    /// Move both ends onto the nearest valid text positions
    pub fn clamp(&self, doc: &Node) -> Self {
        Self {
            anchor: nearest_text_pos(doc, self.anchor),
            head: nearest_text_pos(doc, self.head),
        }
    }
}

/// Content ranges (`start..=end`) of every textblock, in document order
pub fn textblock_ranges(doc: &Node) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    doc.descendants(&mut |node, pos, _parent| {
        if node.is_textblock() {
            ranges.push((pos + 1, pos + 1 + node.content_size()));
            return false;
        }
        !node.is_inline()
    });
    ranges
}

/// The closest position inside a textblock. Falls back to the position
/// clamped to the document when there is no textblock at all.
pub fn nearest_text_pos(doc: &Node, pos: usize) -> usize {
    let pos = pos.min(doc.content_size());
    let mut best: Option<(usize, usize)> = None;
    for (start, end) in textblock_ranges(doc) {
        let candidate = pos.clamp(start, end);
        let distance = candidate.abs_diff(pos);
        if distance == 0 {
            return candidate;
        }
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((candidate, distance));
        }
    }
    best.map(|(p, _)| p).unwrap_or(pos)
}

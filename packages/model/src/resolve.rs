use crate::error::StepError;
use crate::mark::Mark;
use crate::node::Node;

#[derive(Debug, Clone)]
struct Level {
    node: Node,
    index: usize,
    start: usize,
}

/// A document position resolved into its ancestor path
#[derive(Debug, Clone)]
pub struct ResolvedPos {
    pos: usize,
    levels: Vec<Level>,
    parent_offset: usize,
    text_offset: usize,
}

impl ResolvedPos {
    pub fn resolve(doc: &Node, pos: usize) -> Result<Self, StepError> {
        if pos > doc.content_size() {
            return Err(StepError::OutOfRange {
                pos,
                size: doc.content_size(),
            });
        }
        let mut levels = Vec::new();
        let mut node = doc.clone();
        let mut start = 0;
        let mut parent_offset = pos;
        let mut text_offset = 0;
        loop {
            let (index, offset) = node.content().find_index(parent_offset);
            let rem = parent_offset - offset;
            levels.push(Level {
                node: node.clone(),
                index,
                start,
            });
            if rem == 0 {
                break;
            }
            let Some(child) = node.child(index).cloned() else {
                break;
            };
            if child.is_text() || child.is_leaf() {
                text_offset = rem;
                break;
            }
            start += offset + 1;
            parent_offset = rem - 1;
            node = child;
        }
        Ok(Self {
            pos,
            levels,
            parent_offset,
            text_offset,
        })
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn parent(&self) -> &Node {
        &self.levels[self.depth()].node
    }

    pub fn node(&self, depth: usize) -> &Node {
        &self.levels[depth].node
    }

    pub fn index(&self, depth: usize) -> usize {
        self.levels[depth].index
    }

    /// Absolute position where the content of the ancestor at `depth` starts
    pub fn start(&self, depth: usize) -> usize {
        self.levels[depth].start
    }

    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Position directly before the ancestor at `depth` (depth >= 1)
    pub fn before(&self, depth: usize) -> usize {
        self.start(depth).saturating_sub(1)
    }

    /// Position directly after the ancestor at `depth` (depth >= 1)
    pub fn after(&self, depth: usize) -> usize {
        self.end(depth) + 1
    }

    pub fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    /// Offset into the text node at `index`, 0 when between nodes
    pub fn text_offset(&self) -> usize {
        self.text_offset
    }

    pub fn node_after(&self) -> Option<Node> {
        let child = self.parent().child(self.index(self.depth()))?;
        if self.text_offset > 0 {
            Some(child.cut_text(self.text_offset, child.text_len()))
        } else {
            Some(child.clone())
        }
    }

    pub fn node_before(&self) -> Option<Node> {
        let index = self.index(self.depth());
        if self.text_offset > 0 {
            let child = self.parent().child(index)?;
            return Some(child.cut_text(0, self.text_offset));
        }
        if index == 0 {
            None
        } else {
            self.parent().child(index - 1).cloned()
        }
    }

    /// Marks active at this position: those of the text before it, or of the
    /// text after it at the start of a textblock
    pub fn marks(&self) -> Vec<Mark> {
        if self.parent().content().is_empty() {
            return Vec::new();
        }
        if let Some(before) = self.node_before() {
            return before.marks().to_vec();
        }
        self.node_after()
            .map(|n| n.marks().to_vec())
            .unwrap_or_default()
    }

    /// Deepest depth whose node contains both this position and `pos`
    pub fn shared_depth(&self, pos: usize) -> usize {
        for depth in (1..=self.depth()).rev() {
            if self.start(depth) <= pos && self.end(depth) >= pos {
                return depth;
            }
        }
        0
    }

    /// Nearest ancestor depth (including the parent) that is a textblock
    pub fn textblock_depth(&self) -> Option<usize> {
        (0..=self.depth()).rev().find(|&d| self.node(d).is_textblock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{doc, para, schema};

    #[test]
    fn test_resolve_inside_text() {
        let schema = schema();
        let d = doc(&schema, vec![para(&schema, "Hello"), para(&schema, "World")]);
        // 0 <body> 1 <p> 2 H e l l o 7 </p> ...
        let r = ResolvedPos::resolve(&d, 4).unwrap();
        assert_eq!(r.depth(), 2);
        assert_eq!(r.parent().node_type(), "paragraph");
        assert_eq!(r.parent_offset(), 2);
        assert_eq!(r.text_offset(), 2);
        assert_eq!(r.start(2), 2);
        assert_eq!(r.before(2), 1);
        assert_eq!(r.after(2), 8);
        assert_eq!(r.node_before().and_then(|n| n.text().map(str::to_string)), Some("He".into()));
    }

    #[test]
    fn test_resolve_between_blocks() {
        let schema = schema();
        let d = doc(&schema, vec![para(&schema, "Hello"), para(&schema, "World")]);
        let r = ResolvedPos::resolve(&d, 8).unwrap();
        assert_eq!(r.depth(), 1);
        assert_eq!(r.parent().node_type(), "body");
        assert_eq!(r.index(1), 1);
        assert_eq!(r.node_after().map(|n| n.node_type().to_string()), Some("paragraph".into()));
    }

    #[test]
    fn test_resolve_out_of_range() {
        let schema = schema();
        let d = doc(&schema, vec![para(&schema, "Hi")]);
        assert!(ResolvedPos::resolve(&d, 100).is_err());
    }

    #[test]
    fn test_shared_depth() {
        let schema = schema();
        let d = doc(&schema, vec![para(&schema, "Hello"), para(&schema, "World")]);
        let r = ResolvedPos::resolve(&d, 3).unwrap();
        assert_eq!(r.shared_depth(5), 2);
        assert_eq!(r.shared_depth(10), 1);
    }
}

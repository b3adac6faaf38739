//! # Conversion Rules
//!
//! Extensions contribute how their node and mark types map to and from the
//! intermediate representation. Nothing here knows about headings, links or
//! footnotes; each is a rule registered under a kind or type name:
//!
//! | registry        | key                        | produces              |
//! |-----------------|----------------------------|-----------------------|
//! | block readers   | block kind (`Header`)      | tree nodes            |
//! | inline readers  | inline kind (`Image`)      | tree nodes            |
//! | block writers   | node type (`heading`)      | `Block`s              |
//! | inline writers  | node type (`image`)        | `Inline`s             |
//! | mark writers    | mark type (`strong`)       | wrapping `Inline`     |
//!
//! Text (`Str`, `Space`, `SoftBreak`) needs no rule in either direction.

use crate::ast::{Block, Inline};
use crate::error::ConversionError;
use crate::reader::TreeReader;
use crate::writer::TreeWriter;
use folio_model::{Attrs, Mark, Node};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub type BlockReadFn = Arc<dyn Fn(&mut TreeReader<'_>, &Block) -> Result<Vec<Node>, ConversionError> + Send + Sync>;
pub type InlineReadFn = Arc<dyn Fn(&mut TreeReader<'_>, &Inline) -> Result<Vec<Node>, ConversionError> + Send + Sync>;
pub type BlockWriteFn = Arc<dyn Fn(&mut TreeWriter<'_>, &Node) -> Result<Vec<Block>, ConversionError> + Send + Sync>;
pub type InlineWriteFn = Arc<dyn Fn(&mut TreeWriter<'_>, &Node) -> Result<Vec<Inline>, ConversionError> + Send + Sync>;
pub type MarkWriteFn = Arc<dyn Fn(&Mark, Vec<Inline>) -> Result<Inline, ConversionError> + Send + Sync>;

/// Registry of reader and writer rules
#[derive(Clone, Default)]
pub struct ConversionRules {
    block_readers: HashMap<String, BlockReadFn>,
    inline_readers: HashMap<String, InlineReadFn>,
    block_writers: HashMap<String, BlockWriteFn>,
    inline_writers: HashMap<String, InlineWriteFn>,
    mark_writers: HashMap<String, MarkWriteFn>,
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&String> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys
}

impl fmt::Debug for ConversionRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRules")
            .field("block_readers", &sorted_keys(&self.block_readers))
            .field("inline_readers", &sorted_keys(&self.inline_readers))
            .field("block_writers", &sorted_keys(&self.block_writers))
            .field("inline_writers", &sorted_keys(&self.inline_writers))
            .field("mark_writers", &sorted_keys(&self.mark_writers))
            .finish()
    }
}

impl ConversionRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_block<F>(&mut self, kind: &str, f: F) -> &mut Self
    where
        F: Fn(&mut TreeReader<'_>, &Block) -> Result<Vec<Node>, ConversionError> + Send + Sync + 'static,
    {
        self.block_readers.insert(kind.to_string(), Arc::new(f));
        self
    }

    pub fn read_inline<F>(&mut self, kind: &str, f: F) -> &mut Self
    where
        F: Fn(&mut TreeReader<'_>, &Inline) -> Result<Vec<Node>, ConversionError> + Send + Sync + 'static,
    {
        self.inline_readers.insert(kind.to_string(), Arc::new(f));
        self
    }

    /// Read an inline container kind (`Emph`, `Strong`...) as a mark over
    /// its contents
    pub fn read_mark(&mut self, kind: &str, mark_type: &str) -> &mut Self {
        let mark_type = mark_type.to_string();
        self.read_inline(kind, move |reader, inline| {
            let children = match inline {
                Inline::Emph(c) | Inline::Strong(c) | Inline::Strikeout(c) | Inline::Span(_, c) => c,
                other => return Err(ConversionError::UnknownNodeKind(other.kind().to_string())),
            };
            let mark = reader.schema().mark(&mark_type, Attrs::new())?;
            reader.with_mark(mark, |r| r.read_inlines(children))
        })
    }

    pub fn write_block<F>(&mut self, node_type: &str, f: F) -> &mut Self
    where
        F: Fn(&mut TreeWriter<'_>, &Node) -> Result<Vec<Block>, ConversionError> + Send + Sync + 'static,
    {
        self.block_writers.insert(node_type.to_string(), Arc::new(f));
        self
    }

    pub fn write_inline<F>(&mut self, node_type: &str, f: F) -> &mut Self
    where
        F: Fn(&mut TreeWriter<'_>, &Node) -> Result<Vec<Inline>, ConversionError> + Send + Sync + 'static,
    {
        self.inline_writers.insert(node_type.to_string(), Arc::new(f));
        self
    }

    pub fn write_mark<F>(&mut self, mark_type: &str, f: F) -> &mut Self
    where
        F: Fn(&Mark, Vec<Inline>) -> Result<Inline, ConversionError> + Send + Sync + 'static,
    {
        self.mark_writers.insert(mark_type.to_string(), Arc::new(f));
        self
    }

    /// Add another rule set. Rules registered later replace earlier ones
    /// for the same key.
    pub fn extend(&mut self, other: ConversionRules) {
        fn merge<V>(into: &mut HashMap<String, V>, from: HashMap<String, V>, registry: &str) {
            for (key, rule) in from {
                if into.insert(key.clone(), rule).is_some() {
                    debug!(registry, key = %key, "conversion rule replaced");
                }
            }
        }
        merge(&mut self.block_readers, other.block_readers, "block_readers");
        merge(&mut self.inline_readers, other.inline_readers, "inline_readers");
        merge(&mut self.block_writers, other.block_writers, "block_writers");
        merge(&mut self.inline_writers, other.inline_writers, "inline_writers");
        merge(&mut self.mark_writers, other.mark_writers, "mark_writers");
    }

    pub fn block_reader(&self, kind: &str) -> Option<BlockReadFn> {
        self.block_readers.get(kind).cloned()
    }

    pub fn inline_reader(&self, kind: &str) -> Option<InlineReadFn> {
        self.inline_readers.get(kind).cloned()
    }

    pub fn block_writer(&self, node_type: &str) -> Option<BlockWriteFn> {
        self.block_writers.get(node_type).cloned()
    }

    pub fn inline_writer(&self, node_type: &str) -> Option<InlineWriteFn> {
        self.inline_writers.get(node_type).cloned()
    }

    pub fn mark_writer(&self, mark_type: &str) -> Option<MarkWriteFn> {
        self.mark_writers.get(mark_type).cloned()
    }

    pub fn has_mark_writer(&self, mark_type: &str) -> bool {
        self.mark_writers.contains_key(mark_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_rules_replace_earlier() {
        let mut base = ConversionRules::new();
        base.write_mark("strong", |_, c| Ok(Inline::Strong(c)));
        let mut other = ConversionRules::new();
        other.write_mark("strong", |_, c| Ok(Inline::Emph(c)));
        base.extend(other);

        let writer = base.mark_writer("strong").unwrap();
        let out = writer(&Mark::new("strong"), vec![]).unwrap();
        assert_eq!(out, Inline::Emph(vec![]));
    }

    #[test]
    fn test_lookup_misses() {
        let rules = ConversionRules::new();
        assert!(rules.block_reader("Para").is_none());
        assert!(!rules.has_mark_writer("em"));
    }
}

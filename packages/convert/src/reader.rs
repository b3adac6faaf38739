//! # Tree Reader
//!
//! Builds a document tree from the intermediate representation.
//!
//! Whitespace is preserved exactly: `Space` reads as one space, `SoftBreak`
//! as a newline, and code or math contents are taken verbatim. This differs
//! from how the visual surface parses pasted content, where whitespace is
//! collapsed.

use crate::ast::{Block, Inline, Pandoc};
use crate::error::ConversionError;
use crate::layout::{note_ref_id, BODY, NOTE, NOTES, ORDINAL_ATTR, PARAGRAPH, REF_ATTR, TITLE_ATTR};
use crate::rules::ConversionRules;
use folio_model::node::normalize_inline;
use folio_model::{Attrs, Mark, Node, Schema};
use serde_json::Value;

pub struct TreeReader<'a> {
    schema: &'a Schema,
    rules: &'a ConversionRules,
    marks: Vec<Mark>,
    notes: Vec<Node>,
}

impl<'a> TreeReader<'a> {
    pub fn new(schema: &'a Schema, rules: &'a ConversionRules) -> Self {
        Self {
            schema,
            rules,
            marks: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// Read a whole document into `doc(body, notes)`
    pub fn read_document(mut self, doc: &Pandoc) -> Result<Node, ConversionError> {
        let mut blocks = self.read_blocks(&doc.blocks)?;
        if blocks.is_empty() {
            blocks.push(self.node(PARAGRAPH, Attrs::new(), Vec::new())?);
        }
        let body = self.node(BODY, Attrs::new(), blocks)?;
        let notes = std::mem::take(&mut self.notes);
        let notes = self.node(NOTES, Attrs::new(), notes)?;

        let top = self.schema.top_node();
        let mut attrs = Attrs::new();
        let has_title = self
            .schema
            .node_type(top)
            .map(|t| t.spec().attrs.contains_key(TITLE_ATTR))
            .unwrap_or(false);
        if let (true, Some(title)) = (has_title, doc.title()) {
            attrs.insert(TITLE_ATTR.to_string(), Value::String(title));
        }
        self.node(top, attrs, vec![body, notes])
    }

    pub fn read_blocks(&mut self, blocks: &[Block]) -> Result<Vec<Node>, ConversionError> {
        let mut out = Vec::with_capacity(blocks.len());
        for block in blocks {
            out.extend(self.read_block(block)?);
        }
        Ok(out)
    }

    pub fn read_block(&mut self, block: &Block) -> Result<Vec<Node>, ConversionError> {
        let rules = self.rules;
        match rules.block_reader(block.kind()) {
            Some(read) => read(self, block),
            None => Err(ConversionError::UnknownNodeKind(block.kind().to_string())),
        }
    }

    /// Read inline content, merging adjacent text with equal marks
    pub fn read_inlines(&mut self, inlines: &[Inline]) -> Result<Vec<Node>, ConversionError> {
        let mut out = Vec::with_capacity(inlines.len());
        for inline in inlines {
            out.extend(self.read_inline(inline)?);
        }
        Ok(normalize_inline(out))
    }

    pub fn read_inline(&mut self, inline: &Inline) -> Result<Vec<Node>, ConversionError> {
        match inline {
            Inline::Str(s) => Ok(self.text(s)),
            Inline::Space => Ok(self.text(" ")),
            Inline::SoftBreak => Ok(self.text("\n")),
            other => {
                let rules = self.rules;
                match rules.inline_reader(other.kind()) {
                    Some(read) => read(self, other),
                    None => Err(ConversionError::UnknownNodeKind(other.kind().to_string())),
                }
            }
        }
    }

    /// Text carrying the active marks. Empty text yields nothing.
    pub fn text(&self, text: &str) -> Vec<Node> {
        if text.is_empty() {
            return Vec::new();
        }
        vec![Node::new_text(text, self.marks.clone())]
    }

    pub fn active_marks(&self) -> &[Mark] {
        &self.marks
    }

    /// Run `f` with `mark` added to the active marks
    pub fn with_mark<T, F>(&mut self, mark: Mark, f: F) -> Result<T, ConversionError>
    where
        F: FnOnce(&mut Self) -> Result<T, ConversionError>,
    {
        let saved = self.marks.clone();
        self.marks = self.schema.add_mark(&mark, &self.marks);
        let result = f(self);
        self.marks = saved;
        result
    }

    pub fn node(&self, type_name: &str, attrs: Attrs, content: Vec<Node>) -> Result<Node, ConversionError> {
        Ok(self.schema.node(type_name, attrs, content)?)
    }

    /// Inline atom carrying the active marks
    pub fn atom(&self, type_name: &str, attrs: Attrs) -> Result<Node, ConversionError> {
        Ok(self.node(type_name, attrs, Vec::new())?.with_marks(self.marks.clone()))
    }

    /// Read a note body into the notes region and return its reference id
    pub fn add_note(&mut self, blocks: &[Block]) -> Result<String, ConversionError> {
        let saved = std::mem::take(&mut self.marks);
        let content = self.read_blocks(blocks);
        self.marks = saved;

        let mut content = content?;
        if content.is_empty() {
            content.push(self.node(PARAGRAPH, Attrs::new(), Vec::new())?);
        }
        let ordinal = self.notes.len() + 1;
        let id = note_ref_id(ordinal);
        let mut attrs = Attrs::new();
        attrs.insert(REF_ATTR.to_string(), Value::from(id.clone()));
        attrs.insert(ORDINAL_ATTR.to_string(), Value::from(ordinal));
        let note = self.node(NOTE, attrs, content)?;
        self.notes.push(note);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Attr, MathType};
    use crate::test_support::{rules, schema};

    fn read(blocks: Vec<Block>) -> Result<Node, ConversionError> {
        let schema = schema();
        let rules = rules();
        TreeReader::new(&schema, &rules).read_document(&Pandoc::new(blocks))
    }

    #[test]
    fn test_whitespace_preserved() {
        let doc = read(vec![Block::Para(vec![
            Inline::Str("a".into()),
            Inline::Space,
            Inline::Str("b".into()),
            Inline::SoftBreak,
            Inline::Str("c".into()),
        ])])
        .unwrap();
        let paragraph = doc.child(0).unwrap().child(0).unwrap();
        assert_eq!(paragraph.text_content(), "a b\nc");
        assert_eq!(paragraph.child_count(), 1);
    }

    #[test]
    fn test_marks_nest() {
        let doc = read(vec![Block::Para(vec![Inline::Strong(vec![
            Inline::Str("bold".into()),
            Inline::Space,
            Inline::Emph(vec![Inline::Str("both".into())]),
        ])])])
        .unwrap();
        let paragraph = doc.child(0).unwrap().child(0).unwrap();
        assert_eq!(paragraph.child_count(), 2);
        let both = paragraph.child(1).unwrap();
        let types: Vec<&str> = both.marks().iter().map(|m| m.mark_type.as_str()).collect();
        assert_eq!(types, vec!["strong", "em"]);
    }

    #[test]
    fn test_code_and_math_verbatim() {
        let doc = read(vec![Block::Para(vec![
            Inline::Code(Attr::default(), "a  b".into()),
            Inline::Math(MathType::InlineMath, "x^2".into()),
        ])])
        .unwrap();
        let paragraph = doc.child(0).unwrap().child(0).unwrap();
        assert_eq!(paragraph.text_content(), "a  b$x^2$");
    }

    #[test]
    fn test_notes_move_to_notes_region() {
        let doc = read(vec![Block::Para(vec![
            Inline::Str("Claim".into()),
            Inline::Note(vec![Block::Para(vec![Inline::Str("Source".into())])]),
        ])])
        .unwrap();
        let notes = doc.child(1).unwrap();
        assert_eq!(notes.child_count(), 1);
        let note = notes.child(0).unwrap();
        assert_eq!(note.attr_str("ref"), Some("note-1"));
        assert_eq!(note.attr_u64("ordinal"), Some(1));
        assert_eq!(note.text_content(), "Source");

        let paragraph = doc.child(0).unwrap().child(0).unwrap();
        assert_eq!(paragraph.child(1).unwrap().node_type(), "note_ref");
    }

    #[test]
    fn test_empty_document_gets_paragraph() {
        let doc = read(vec![]).unwrap();
        assert_eq!(doc.child(0).unwrap().child_count(), 1);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = read(vec![Block::RawBlock("html".into(), "<div/>".into())]).unwrap_err();
        assert!(matches!(err, ConversionError::UnknownNodeKind(kind) if kind == "RawBlock"));
    }

    #[test]
    fn test_title_from_metadata() {
        let schema = schema();
        let rules = rules();
        let mut pandoc = Pandoc::new(vec![]);
        pandoc.meta.insert(
            "title".into(),
            crate::ast::MetaValue::MetaInlines(vec![Inline::Str("Report".into())]),
        );
        let doc = TreeReader::new(&schema, &rules).read_document(&pandoc).unwrap();
        assert_eq!(doc.attr_str("title"), Some("Report"));
    }
}

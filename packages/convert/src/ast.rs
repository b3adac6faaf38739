//! # Intermediate Representation
//!
//! The pandoc JSON AST, the lingua franca between the document tree and any
//! conversion engine.
//!
//! ```text
//! {"pandoc-api-version":[1,23,1],
//!  "meta":{"title":{"t":"MetaInlines","c":[{"t":"Str","c":"Notes"}]}},
//!  "blocks":[{"t":"Header","c":[1,["title",[],[]],[{"t":"Str","c":"Title"}]]}]}
//! ```
//!
//! Elements are adjacently tagged (`t` = kind, `c` = contents). Only the kinds
//! the editor can represent are modelled; anything else is rejected up front
//! by [`Pandoc::from_json`] with the offending kind name.

use crate::error::ConversionError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const API_VERSION: [u32; 3] = [1, 23, 1];

/// Identifier, classes and key/value pairs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attr(pub String, pub Vec<String>, pub Vec<(String, String)>);

impl Attr {
    pub fn with_id(id: impl Into<String>) -> Self {
        Attr(id.into(), Vec::new(), Vec::new())
    }

    pub fn with_class(class: impl Into<String>) -> Self {
        Attr(String::new(), vec![class.into()], Vec::new())
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    pub fn classes(&self) -> &[String] {
        &self.1
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.1.iter().any(|c| c == class)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.2.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Link or image destination: url and title
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target(pub String, pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum MathType {
    InlineMath,
    DisplayMath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum ListNumberStyle {
    DefaultStyle,
    Example,
    Decimal,
    LowerRoman,
    UpperRoman,
    LowerAlpha,
    UpperAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum ListNumberDelim {
    DefaultDelim,
    Period,
    OneParen,
    TwoParens,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum QuoteType {
    SingleQuote,
    DoubleQuote,
}

impl QuoteType {
    /// Opening and closing typographic quotes
    pub fn marks(self) -> (&'static str, &'static str) {
        match self {
            QuoteType::SingleQuote => ("\u{2018}", "\u{2019}"),
            QuoteType::DoubleQuote => ("\u{201C}", "\u{201D}"),
        }
    }
}

/// Optional short caption and the full caption blocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Caption(pub Option<Vec<Inline>>, pub Vec<Block>);

/// Start number, numbering style and delimiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListAttributes(pub i64, pub ListNumberStyle, pub ListNumberDelim);

impl ListAttributes {
    pub fn starting_at(start: i64) -> Self {
        ListAttributes(start, ListNumberStyle::Decimal, ListNumberDelim::Period)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "c")]
pub enum Block {
    Plain(Vec<Inline>),
    Para(Vec<Inline>),
    Header(i64, Attr, Vec<Inline>),
    CodeBlock(Attr, String),
    RawBlock(String, String),
    BlockQuote(Vec<Block>),
    BulletList(Vec<Vec<Block>>),
    OrderedList(ListAttributes, Vec<Vec<Block>>),
    HorizontalRule,
    Div(Attr, Vec<Block>),
    Figure(Attr, Caption, Vec<Block>),
}

impl Block {
    /// Kind name as it appears in the `t` field
    pub fn kind(&self) -> &'static str {
        match self {
            Block::Plain(_) => "Plain",
            Block::Para(_) => "Para",
            Block::Header(..) => "Header",
            Block::CodeBlock(..) => "CodeBlock",
            Block::RawBlock(..) => "RawBlock",
            Block::BlockQuote(_) => "BlockQuote",
            Block::BulletList(_) => "BulletList",
            Block::OrderedList(..) => "OrderedList",
            Block::HorizontalRule => "HorizontalRule",
            Block::Div(..) => "Div",
            Block::Figure(..) => "Figure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "c")]
pub enum Inline {
    Str(String),
    Space,
    SoftBreak,
    LineBreak,
    Emph(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikeout(Vec<Inline>),
    Code(Attr, String),
    Math(MathType, String),
    Link(Attr, Vec<Inline>, Target),
    Image(Attr, Vec<Inline>, Target),
    Note(Vec<Block>),
    Span(Attr, Vec<Inline>),
    RawInline(String, String),
    Quoted(QuoteType, Vec<Inline>),
    SmallCaps(Vec<Inline>),
    Underline(Vec<Inline>),
    Superscript(Vec<Inline>),
    Subscript(Vec<Inline>),
    /// Citation records are kept as raw JSON; only the rendered text is read
    Cite(Vec<Value>, Vec<Inline>),
}

impl Inline {
    pub fn kind(&self) -> &'static str {
        match self {
            Inline::Str(_) => "Str",
            Inline::Space => "Space",
            Inline::SoftBreak => "SoftBreak",
            Inline::LineBreak => "LineBreak",
            Inline::Emph(_) => "Emph",
            Inline::Strong(_) => "Strong",
            Inline::Strikeout(_) => "Strikeout",
            Inline::Code(..) => "Code",
            Inline::Math(..) => "Math",
            Inline::Link(..) => "Link",
            Inline::Image(..) => "Image",
            Inline::Note(_) => "Note",
            Inline::Span(..) => "Span",
            Inline::RawInline(..) => "RawInline",
            Inline::Quoted(..) => "Quoted",
            Inline::SmallCaps(_) => "SmallCaps",
            Inline::Underline(_) => "Underline",
            Inline::Superscript(_) => "Superscript",
            Inline::Subscript(_) => "Subscript",
            Inline::Cite(..) => "Cite",
        }
    }

    /// Content of the styling wrappers that carry no editor mark of their own
    pub fn styled_content(&self) -> Option<&[Inline]> {
        match self {
            Inline::SmallCaps(inner)
            | Inline::Underline(inner)
            | Inline::Superscript(inner)
            | Inline::Subscript(inner)
            | Inline::Cite(_, inner) => Some(inner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "c")]
pub enum MetaValue {
    MetaMap(BTreeMap<String, MetaValue>),
    MetaList(Vec<MetaValue>),
    MetaBool(bool),
    MetaString(String),
    MetaInlines(Vec<Inline>),
    MetaBlocks(Vec<Block>),
}

impl MetaValue {
    /// Plain text of a metadata value
    pub fn to_text(&self) -> String {
        match self {
            MetaValue::MetaString(s) => s.clone(),
            MetaValue::MetaBool(b) => b.to_string(),
            MetaValue::MetaInlines(inlines) => stringify(inlines),
            MetaValue::MetaBlocks(blocks) => blocks
                .iter()
                .map(|b| match b {
                    Block::Plain(i) | Block::Para(i) | Block::Header(_, _, i) => stringify(i),
                    _ => String::new(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            MetaValue::MetaList(items) => items.iter().map(MetaValue::to_text).collect::<Vec<_>>().join(", "),
            MetaValue::MetaMap(_) => String::new(),
        }
    }
}

const KNOWN_KINDS: &[&str] = &[
    // blocks
    "Plain", "Para", "Header", "CodeBlock", "RawBlock", "BlockQuote", "BulletList",
    "OrderedList", "HorizontalRule", "Div", "Figure",
    // inlines
    "Str", "Space", "SoftBreak", "LineBreak", "Emph", "Strong", "Strikeout", "Code",
    "Math", "Link", "Image", "Note", "Span", "RawInline", "Quoted", "SmallCaps",
    "Underline", "Superscript", "Subscript", "Cite",
    // metadata
    "MetaMap", "MetaList", "MetaBool", "MetaString", "MetaInlines", "MetaBlocks",
    // enumerations
    "InlineMath", "DisplayMath", "DefaultStyle", "Example", "Decimal", "LowerRoman",
    "UpperRoman", "LowerAlpha", "UpperAlpha", "DefaultDelim", "Period", "OneParen",
    "TwoParens", "SingleQuote", "DoubleQuote", "AuthorInText", "SuppressAuthor",
    "NormalCitation",
];

/// A complete intermediate document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pandoc {
    #[serde(rename = "pandoc-api-version")]
    pub api_version: Vec<u32>,
    pub meta: BTreeMap<String, MetaValue>,
    pub blocks: Vec<Block>,
}

impl Default for Pandoc {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Pandoc {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            api_version: API_VERSION.to_vec(),
            meta: BTreeMap::new(),
            blocks,
        }
    }

    /// Parse engine output, naming the first element kind the editor cannot
    /// represent
    pub fn from_json(json: &str) -> Result<Self, ConversionError> {
        let value: Value = serde_json::from_str(json)?;
        if let Some(kind) = find_unknown_kind(&value) {
            return Err(ConversionError::UnknownNodeKind(kind));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<String, ConversionError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn title(&self) -> Option<String> {
        self.meta.get("title").map(MetaValue::to_text)
    }
}

fn find_unknown_kind(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(kind)) = map.get("t") {
                if !KNOWN_KINDS.contains(&kind.as_str()) {
                    return Some(kind.clone());
                }
            }
            map.values().find_map(find_unknown_kind)
        }
        Value::Array(items) => items.iter().find_map(find_unknown_kind),
        _ => None,
    }
}

/// Plain text of a run of inlines, the way pandoc's `stringify` reads it
pub fn stringify(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Str(s) => out.push_str(s),
            Inline::Space | Inline::SoftBreak | Inline::LineBreak => out.push(' '),
            Inline::Code(_, s) | Inline::Math(_, s) => out.push_str(s),
            Inline::Emph(inner)
            | Inline::Strong(inner)
            | Inline::Strikeout(inner)
            | Inline::Link(_, inner, _)
            | Inline::Image(_, inner, _)
            | Inline::Span(_, inner)
            | Inline::SmallCaps(inner)
            | Inline::Underline(inner)
            | Inline::Superscript(inner)
            | Inline::Subscript(inner)
            | Inline::Cite(_, inner) => out.push_str(&stringify(inner)),
            Inline::Quoted(quote, inner) => {
                let (open, close) = quote.marks();
                out.push_str(open);
                out.push_str(&stringify(inner));
                out.push_str(close);
            }
            Inline::Note(_) | Inline::RawInline(..) => {}
        }
    }
    out
}

/// Text of a run of inlines with whitespace kept as written: the inverse of
/// [`text_inlines`] for plain runs
pub fn inline_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Str(s) => out.push_str(s),
            Inline::Space => out.push(' '),
            Inline::SoftBreak | Inline::LineBreak => out.push('\n'),
            other => out.push_str(&stringify(std::slice::from_ref(other))),
        }
    }
    out
}

/// Split text into `Str`, `Space` and `SoftBreak` elements.
///
/// Every space and newline becomes its own element so that reading the
/// result back reproduces the text exactly.
pub fn text_inlines(text: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut word = String::new();
    for c in text.chars() {
        match c {
            ' ' | '\n' => {
                if !word.is_empty() {
                    out.push(Inline::Str(std::mem::take(&mut word)));
                }
                out.push(if c == ' ' { Inline::Space } else { Inline::SoftBreak });
            }
            _ => word.push(c),
        }
    }
    if !word.is_empty() {
        out.push(Inline::Str(word));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape_matches_pandoc() {
        let doc = Pandoc::new(vec![Block::Header(
            1,
            Attr::with_id("title"),
            vec![Inline::Str("Title".into())],
        )]);
        let json: Value = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["pandoc-api-version"], serde_json::json!([1, 23, 1]));
        assert_eq!(json["blocks"][0]["t"], "Header");
        assert_eq!(json["blocks"][0]["c"][0], 1);
        assert_eq!(json["blocks"][0]["c"][1], serde_json::json!(["title", [], []]));
    }

    #[test]
    fn test_unit_variants_and_enumerations() {
        let block = Block::OrderedList(ListAttributes::starting_at(3), vec![]);
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["c"][0], serde_json::json!([3, {"t": "Decimal"}, {"t": "Period"}]));

        let rule = serde_json::to_value(&Block::HorizontalRule).unwrap();
        assert_eq!(rule, serde_json::json!({"t": "HorizontalRule"}));
    }

    #[test]
    fn test_parse_engine_output() {
        let json = r#"{"pandoc-api-version":[1,23,1],"meta":{},"blocks":[
            {"t":"Para","c":[{"t":"Str","c":"Hello"},{"t":"Space"},{"t":"Emph","c":[{"t":"Str","c":"world"}]}]},
            {"t":"Para","c":[{"t":"Math","c":[{"t":"InlineMath"},"x^2"]}]}
        ]}"#;
        let doc = Pandoc::from_json(json).unwrap();
        assert_eq!(doc.blocks.len(), 2);
        assert_eq!(
            doc.blocks[1],
            Block::Para(vec![Inline::Math(MathType::InlineMath, "x^2".into())])
        );
    }

    #[test]
    fn test_unknown_kind_is_named() {
        let json = r#"{"pandoc-api-version":[1,23,1],"meta":{},"blocks":[
            {"t":"Table","c":[]}
        ]}"#;
        match Pandoc::from_json(json) {
            Err(ConversionError::UnknownNodeKind(kind)) => assert_eq!(kind, "Table"),
            other => panic!("expected unknown kind, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_quotes_and_figures() {
        let json = r#"{"pandoc-api-version":[1,23,1],"meta":{},"blocks":[
            {"t":"Para","c":[{"t":"Quoted","c":[{"t":"DoubleQuote"},[{"t":"Str","c":"hi"}]]}]},
            {"t":"Figure","c":[["fig",[],[]],[null,[{"t":"Plain","c":[{"t":"Str","c":"alt"}]}]],
                [{"t":"Plain","c":[{"t":"Image","c":[["",[],[]],[{"t":"Str","c":"alt"}],["a.png",""]]}]}]]},
            {"t":"Para","c":[{"t":"Cite","c":[[{"citationId":"knuth","citationPrefix":[],"citationSuffix":[],
                "citationMode":{"t":"NormalCitation"},"citationNoteNum":1,"citationHash":0}],
                [{"t":"Str","c":"[@knuth]"}]]}]}
        ]}"#;
        let doc = Pandoc::from_json(json).unwrap();
        assert_eq!(
            doc.blocks[0],
            Block::Para(vec![Inline::Quoted(QuoteType::DoubleQuote, vec![Inline::Str("hi".into())])])
        );
        match &doc.blocks[1] {
            Block::Figure(attr, Caption(None, caption), content) => {
                assert_eq!(attr.id(), "fig");
                assert_eq!(caption, &vec![Block::Plain(vec![Inline::Str("alt".into())])]);
                assert_eq!(content.len(), 1);
            }
            other => panic!("expected a figure, got {:?}", other),
        }
        match &doc.blocks[2] {
            Block::Para(inlines) => assert_eq!(stringify(inlines), "[@knuth]"),
            other => panic!("expected a paragraph, got {:?}", other),
        }
    }

    #[test]
    fn test_stringify_quotes_and_styling() {
        let inlines = vec![
            Inline::Quoted(QuoteType::DoubleQuote, vec![Inline::Str("hi".into())]),
            Inline::Space,
            Inline::Quoted(QuoteType::SingleQuote, vec![Inline::SmallCaps(vec![Inline::Str("a".into())])]),
            Inline::Superscript(vec![Inline::Str("2".into())]),
        ];
        assert_eq!(stringify(&inlines), "\u{201C}hi\u{201D} \u{2018}a\u{2019}2");
    }

    #[test]
    fn test_text_inlines_keep_every_space() {
        let inlines = text_inlines("a  b\nc");
        assert_eq!(
            inlines,
            vec![
                Inline::Str("a".into()),
                Inline::Space,
                Inline::Space,
                Inline::Str("b".into()),
                Inline::SoftBreak,
                Inline::Str("c".into()),
            ]
        );
    }

    #[test]
    fn test_inline_text_inverts_text_inlines() {
        let text = "x  + y\n= z";
        assert_eq!(inline_text(&text_inlines(text)), text);
    }

    #[test]
    fn test_stringify() {
        let inlines = vec![
            Inline::Str("Hello".into()),
            Inline::Space,
            Inline::Strong(vec![Inline::Str("bold".into())]),
            Inline::Note(vec![]),
        ];
        assert_eq!(stringify(&inlines), "Hello bold");
    }
}

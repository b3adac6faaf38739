//! Grammar and rules shared by unit tests

use crate::ast::{inline_text, Attr, Block, Inline, MathType};
use crate::error::ConversionError;
use crate::rules::ConversionRules;
use folio_model::{attrs, AttrSpec, Attrs, Mark, MarkSpec, NodeSpec, Schema};
use serde_json::Value;

pub(crate) fn schema() -> Schema {
    let nodes = vec![
        NodeSpec::new("doc", "body notes").attr("title", AttrSpec::with_default("")),
        NodeSpec::new("body", "block+"),
        NodeSpec::new("notes", "note*"),
        NodeSpec::new("note", "block+")
            .attr("ref", AttrSpec::required())
            .attr("ordinal", AttrSpec::with_default(0)),
        NodeSpec::new("paragraph", "inline*").group("block"),
        NodeSpec::new("heading", "inline*")
            .group("block")
            .attr("level", AttrSpec::with_default(1))
            .attr("id", AttrSpec::with_default("")),
        NodeSpec::new("code_block", "text*")
            .group("block")
            .code()
            .attr("lang", AttrSpec::with_default("")),
        NodeSpec::new("horizontal_rule", "").group("block"),
        NodeSpec::new("text", "").group("inline"),
        NodeSpec::new("hard_break", "").group("inline").inline(),
        NodeSpec::new("note_ref", "")
            .group("inline")
            .inline()
            .attr("ref", AttrSpec::required()),
    ];
    let marks = vec![
        MarkSpec::new("strong"),
        MarkSpec::new("em"),
        MarkSpec::new("code").excludes("_").code(),
        MarkSpec::new("math")
            .attr("type", AttrSpec::with_default("InlineMath"))
            .excludes("_")
            .code(),
    ];
    Schema::new(nodes, marks, "doc").expect("test schema is valid")
}

fn math_delimiter(kind: &str) -> &'static str {
    if kind == "DisplayMath" {
        "$$"
    } else {
        "$"
    }
}

pub(crate) fn rules() -> ConversionRules {
    let mut rules = ConversionRules::new();
    rules
        .read_block("Para", |r, b| match b {
            Block::Para(inlines) | Block::Plain(inlines) => {
                let content = r.read_inlines(inlines)?;
                Ok(vec![r.node("paragraph", Attrs::new(), content)?])
            }
            _ => unreachable!(),
        })
        .read_block("Header", |r, b| match b {
            Block::Header(level, attr, inlines) => {
                let content = r.read_inlines(inlines)?;
                let mut a = attrs([("level", *level)]);
                a.insert("id".into(), Value::from(attr.id()));
                Ok(vec![r.node("heading", a, content)?])
            }
            _ => unreachable!(),
        })
        .read_block("HorizontalRule", |r, _| Ok(vec![r.node("horizontal_rule", Attrs::new(), vec![])?]))
        .read_mark("Strong", "strong")
        .read_mark("Emph", "em")
        .read_inline("Code", |r, i| match i {
            Inline::Code(_, text) => {
                let mark = r.schema().mark("code", Attrs::new())?;
                r.with_mark(mark, |r| Ok(r.text(text)))
            }
            _ => unreachable!(),
        })
        .read_inline("Math", |r, i| match i {
            Inline::Math(kind, text) => {
                let kind = if *kind == MathType::DisplayMath { "DisplayMath" } else { "InlineMath" };
                let mark = r.schema().mark("math", attrs([("type", kind)]))?;
                let delim = math_delimiter(kind);
                r.with_mark(mark, |r| Ok(r.text(&format!("{}{}{}", delim, text, delim))))
            }
            _ => unreachable!(),
        })
        .read_inline("LineBreak", |r, _| Ok(vec![r.atom("hard_break", Attrs::new())?]))
        .read_inline("Note", |r, i| match i {
            Inline::Note(blocks) => {
                let id = r.add_note(blocks)?;
                Ok(vec![r.atom("note_ref", attrs([("ref", id)]))?])
            }
            _ => unreachable!(),
        });

    rules
        .write_block("paragraph", |w, n| Ok(vec![Block::Para(w.write_inlines(n.children())?)]))
        .write_block("heading", |w, n| {
            let level = n.attr_u64("level").unwrap_or(1) as i64;
            let id = n.attr_str("id").unwrap_or_default();
            Ok(vec![Block::Header(level, Attr::with_id(id), w.write_inlines(n.children())?)])
        })
        .write_block("horizontal_rule", |_, _| Ok(vec![Block::HorizontalRule]))
        .write_inline("hard_break", |_, _| Ok(vec![Inline::LineBreak]))
        .write_inline("note_ref", |w, n| {
            let id = n.attr_str("ref").unwrap_or_default().to_string();
            Ok(vec![Inline::Note(w.note_blocks(&id)?)])
        })
        .write_mark("strong", |_, c| Ok(Inline::Strong(c)))
        .write_mark("em", |_, c| Ok(Inline::Emph(c)))
        .write_mark("code", |_, c| Ok(Inline::Code(Attr::default(), inline_text(&c))))
        .write_mark("math", |m: &Mark, c| {
            let display = m.attr_str("type") == Some("DisplayMath");
            let delim = if display { "$$" } else { "$" };
            let text = inline_text(&c);
            let inner = text
                .strip_prefix(delim)
                .and_then(|t| t.strip_suffix(delim))
                .ok_or_else(|| ConversionError::invalid_structure("math without delimiters"))?;
            let kind = if display { MathType::DisplayMath } else { MathType::InlineMath };
            Ok(Inline::Math(kind, inner.to_string()))
        });
    rules
}

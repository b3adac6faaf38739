//! Shared fixtures for unit tests

use crate::attrs::Attrs;
use crate::node::Node;
use crate::schema::{AttrSpec, MarkSpec, NodeSpec, Schema};

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
            .attr("level", AttrSpec::required()),
        NodeSpec::new("blockquote", "block+").group("block"),
        NodeSpec::new("code_block", "text*").group("block").code(),
        NodeSpec::new("text", "").group("inline"),
        NodeSpec::new("hard_break", "").group("inline").inline(),
    ];
    let marks = vec![
        MarkSpec::new("strong"),
        MarkSpec::new("em"),
        MarkSpec::new("code").excludes("_").code(),
    ];
    Schema::new(nodes, marks, "doc").expect("test schema is valid")
}

pub(crate) fn para(schema: &Schema, text: &str) -> Node {
    let content = if text.is_empty() {
        vec![]
    } else {
        vec![schema.text(text, vec![]).expect("text")]
    };
    schema.node("paragraph", Attrs::new(), content).expect("paragraph")
}

pub(crate) fn doc(schema: &Schema, blocks: Vec<Node>) -> Node {
    let body = schema.node("body", Attrs::new(), blocks).expect("body");
    let notes = schema.node("notes", Attrs::new(), vec![]).expect("notes");
    schema.node("doc", Attrs::new(), vec![body, notes]).expect("doc")
}

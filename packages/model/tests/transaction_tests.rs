//! Transaction application and selection mapping across whole documents

use folio_model::{attrs, AttrSpec, Attrs, Mark, MarkSpec, Node, NodeSpec, Schema, Selection, Transaction};

fn schema() -> Schema {
    Schema::new(
        vec![
            NodeSpec::new("doc", "body notes").attr("title", AttrSpec::with_default("")),
            NodeSpec::new("body", "block+"),
            NodeSpec::new("notes", "note*"),
            NodeSpec::new("note", "block+").attr("ref", AttrSpec::required()),
            NodeSpec::new("paragraph", "inline*").group("block"),
            NodeSpec::new("heading", "inline*")
                .group("block")
                .attr("level", AttrSpec::required()),
            NodeSpec::new("code_block", "text*").group("block").code(),
            NodeSpec::new("text", "").group("inline"),
        ],
        vec![MarkSpec::new("strong"), MarkSpec::new("em")],
        "doc",
    )
    .unwrap()
}

fn paragraph(schema: &Schema, text: &str) -> Node {
    let content = if text.is_empty() {
        vec![]
    } else {
        vec![schema.text(text, vec![]).unwrap()]
    };
    schema.node("paragraph", Attrs::new(), content).unwrap()
}

fn document(schema: &Schema, blocks: Vec<Node>) -> Node {
    let body = schema.node("body", Attrs::new(), blocks).unwrap();
    let notes = schema.node("notes", Attrs::new(), vec![]).unwrap();
    schema.node("doc", Attrs::new(), vec![body, notes]).unwrap()
}

#[test]
fn test_insert_before_selection_shifts_by_inserted_length() {
    let schema = schema();
    let doc = document(&schema, vec![paragraph(&schema, "Hello world")]);
    let selection = Selection::new(8, 13);

    for text in ["a", "abc", "héllo"] {
        let tr = Transaction::new().insert_text(2, text, vec![]);
        let applied = tr.apply(&doc, &schema).unwrap();
        let mapped = applied.resolve_selection(&tr, &selection);
        let n = text.chars().count();
        assert_eq!(mapped, Selection::new(8 + n, 13 + n), "inserting {:?}", text);
    }
}

#[test]
fn test_delete_around_selection_collapses_to_deletion_point() {
    let schema = schema();
    let doc = document(&schema, vec![paragraph(&schema, "Hello brave new world")]);
    let selection = Selection::new(9, 12);

    // "brave new " spans 8..18
    let tr = Transaction::new().delete(8, 18);
    let applied = tr.apply(&doc, &schema).unwrap();
    assert_eq!(applied.resolve_selection(&tr, &selection), Selection::cursor(8));
    assert_eq!(applied.doc.text_content(), "Hello world");
}

#[test]
fn test_invalid_transaction_leaves_document_untouched() {
    let schema = schema();
    let doc = document(
        &schema,
        vec![paragraph(&schema, "First"), paragraph(&schema, "Second")],
    );
    let before = doc.clone();

    // A valid first step followed by a structural violation
    let heading = schema
        .node("heading", attrs([("level", 1)]), vec![schema.text("x", vec![]).unwrap()])
        .unwrap();
    let tr = Transaction::new()
        .insert_text(2, "Very ", vec![])
        .replace_with(0, 0, vec![heading]);
    assert!(tr.apply(&doc, &schema).is_err());
    assert_eq!(doc, before);
}

#[test]
fn test_emptying_body_is_rejected() {
    let schema = schema();
    let doc = document(&schema, vec![paragraph(&schema, "Only")]);
    let tr = Transaction::new().delete(1, 1 + doc.child(0).unwrap().content_size());
    assert!(tr.apply(&doc, &schema).is_err());
}

#[test]
fn test_undo_via_inverse_restores_document() {
    let schema = schema();
    let doc = document(
        &schema,
        vec![paragraph(&schema, "Title"), paragraph(&schema, "Body text")],
    );
    let tr = Transaction::new()
        .set_node_type(1, "heading", attrs([("level", 2)]))
        .add_mark(9, 13, Mark::new("em"))
        .insert_text(18, "!", vec![])
        .set_doc_attrs(attrs([("title", "Notes")]));
    let applied = tr.apply(&doc, &schema).unwrap();
    assert_eq!(applied.doc.child(0).unwrap().child(0).unwrap().node_type(), "heading");
    assert_eq!(applied.doc.attr_str("title"), Some("Notes"));

    let undo = Transaction::from_steps(applied.inverse.clone());
    let restored = undo.apply(&applied.doc, &schema).unwrap();
    assert_eq!(restored.doc, doc);
}

#[test]
fn test_documents_serialize_to_json() {
    let schema = schema();
    let doc = document(&schema, vec![paragraph(&schema, "Hi")]);
    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json["type"], "doc");
    assert_eq!(json["content"][0]["content"][0]["content"][0]["text"], "Hi");

    let back: Node = serde_json::from_value(json).unwrap();
    assert_eq!(back, doc);
}

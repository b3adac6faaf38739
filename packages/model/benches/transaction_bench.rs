//! Transaction benchmarks
//!
//! Target: typing into a 500-paragraph document stays well under 1ms per keystroke

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use folio_model::{Attrs, Mark, MarkSpec, Node, NodeSpec, Schema, Transaction};

fn schema() -> Schema {
    Schema::new(
        vec![
            NodeSpec::new("doc", "body notes"),
            NodeSpec::new("body", "block+"),
            NodeSpec::new("notes", "block*"),
            NodeSpec::new("paragraph", "inline*").group("block"),
            NodeSpec::new("text", "").group("inline"),
        ],
        vec![MarkSpec::new("strong"), MarkSpec::new("em")],
        "doc",
    )
    .unwrap()
}

fn generate_doc(schema: &Schema, paragraphs: usize) -> Node {
    let blocks = (0..paragraphs)
        .map(|i| {
            let text = schema
                .text(format!("Paragraph {} with some ordinary prose in it.", i), vec![])
                .unwrap();
            schema.node("paragraph", Attrs::new(), vec![text]).unwrap()
        })
        .collect();
    let body = schema.node("body", Attrs::new(), blocks).unwrap();
    let notes = schema.node("notes", Attrs::new(), vec![]).unwrap();
    schema.node("doc", Attrs::new(), vec![body, notes]).unwrap()
}

fn insert_character(c: &mut Criterion) {
    let schema = schema();
    let doc = generate_doc(&schema, 500);
    let middle = doc.content_size() / 2;
    let pos = folio_model::nearest_text_pos(&doc, middle);

    c.bench_function("insert_character_500_paragraphs", |b| {
        b.iter(|| {
            let tr = Transaction::new().insert_text(black_box(pos), "x", vec![]);
            tr.apply(black_box(&doc), &schema).unwrap()
        })
    });
}

fn toggle_mark(c: &mut Criterion) {
    let schema = schema();
    let doc = generate_doc(&schema, 500);

    c.bench_function("add_mark_first_paragraph", |b| {
        b.iter(|| {
            let tr = Transaction::new().add_mark(2, 11, Mark::new("strong"));
            tr.apply(black_box(&doc), &schema).unwrap()
        })
    });
}

fn map_selection(c: &mut Criterion) {
    let schema = schema();
    let doc = generate_doc(&schema, 100);
    let tr = (0..20).fold(Transaction::new(), |tr, i| tr.insert_text(2 + i, "a", vec![]));
    let applied = tr.apply(&doc, &schema).unwrap();
    let selection = folio_model::Selection::new(300, 400);

    c.bench_function("map_selection_20_steps", |b| {
        b.iter(|| black_box(selection).map(&applied.mapping))
    });
}

criterion_group!(benches, insert_character, toggle_mark, map_selection);
criterion_main!(benches);

use folio_convert::{
    format_diagnostic, Block, ConversionEngine, ConversionError, FormatSpec, Inline, MarkdownEngine, Pandoc,
    WrapMode, WriterOptions,
};

async fn format(engine: &MarkdownEngine, name: &str) -> FormatSpec {
    FormatSpec::new(name, engine.resolve_format(name).await.unwrap())
}

async fn reparse(engine: &MarkdownEngine, format: &FormatSpec, text: &str) -> (Pandoc, String) {
    let doc = engine.to_intermediate(text, format).await.unwrap();
    let out = engine
        .from_intermediate(&doc, format, &WriterOptions::default())
        .await
        .unwrap();
    (doc, out)
}

#[tokio::test]
async fn test_rmarkdown_chunks_survive() {
    let engine = MarkdownEngine::new();
    let format = format(&engine, "rmarkdown").await;
    let source = "# Analysis\n\n```{r setup, include=FALSE}\nlibrary(ggplot2)\n```\n\nThe mean is $\\mu$.";
    let (doc, out) = reparse(&engine, &format, source).await;
    assert!(matches!(&doc.blocks[1], Block::CodeBlock(attr, _) if attr.classes()[0] == "{r setup, include=FALSE}"));
    assert_eq!(out, source);
}

#[tokio::test]
async fn test_writer_fixed_point() {
    let engine = MarkdownEngine::new();
    let format = format(&engine, "markdown").await;
    let source = "Intro  paragraph with *emphasis*\nspanning lines.\n\n2)  second\n3)  third\n\n+ plus item\n\n***\n\n> a quote\nwith lazy line";
    let (_, once) = reparse(&engine, &format, source).await;
    let (_, twice) = reparse(&engine, &format, &once).await;
    assert_eq!(once, twice);
}

#[tokio::test]
async fn test_gfm_has_no_math() {
    let engine = MarkdownEngine::new();
    let format = format(&engine, "gfm").await;
    let doc = engine.to_intermediate("Costs $5 and $6", &format).await.unwrap();
    let Block::Para(inlines) = &doc.blocks[0] else {
        panic!("expected paragraph");
    };
    assert!(!inlines.iter().any(|i| matches!(i, Inline::Math(..))));
    let out = engine
        .from_intermediate(&doc, &format, &WriterOptions::default())
        .await
        .unwrap();
    assert_eq!(out, "Costs $5 and $6");
}

#[tokio::test]
async fn test_no_wrap_joins_lines() {
    let engine = MarkdownEngine::new();
    let format = format(&engine, "markdown").await;
    let doc = engine.to_intermediate("one\ntwo\nthree", &format).await.unwrap();
    let options = WriterOptions {
        wrap: WrapMode::None,
        ..Default::default()
    };
    let out = engine.from_intermediate(&doc, &format, &options).await.unwrap();
    assert_eq!(out, "one two three");
}

#[tokio::test]
async fn test_syntax_error_diagnostic() {
    let engine = MarkdownEngine::new();
    let format = format(&engine, "markdown").await;
    let source = "# Notes\n\nSee [^gone] for details.";
    let err = engine.to_intermediate(source, &format).await.unwrap_err();
    match &err {
        ConversionError::Syntax { line, column, message } => {
            assert_eq!((*line, *column), (3, 5));
            assert!(message.contains("gone"));
        }
        other => panic!("expected syntax error, got {:?}", other),
    }
    let rendered = format_diagnostic(source, "notes.md", &err);
    assert!(rendered.contains("gone"));
}

#[tokio::test]
async fn test_intermediate_json_is_pandoc_shaped() {
    let engine = MarkdownEngine::new();
    let format = format(&engine, "markdown").await;
    let doc = engine.to_intermediate("Hi *there*", &format).await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
    assert_eq!(json["blocks"][0]["t"], "Para");
    assert_eq!(json["blocks"][0]["c"][2]["t"], "Emph");
    assert_eq!(Pandoc::from_json(&doc.to_json().unwrap()).unwrap(), doc);
}

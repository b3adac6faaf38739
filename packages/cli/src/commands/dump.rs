use super::{read_source, Context};
use anyhow::{anyhow, Result};
use clap::Args;
use folio_convert::Pandoc;
use folio_model::Node;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct DumpArgs {
    /// Document to read
    pub file: PathBuf,

    /// Dump the editor's document tree instead of the intermediate document
    #[arg(long)]
    pub tree: bool,

    /// Single-line JSON
    #[arg(long)]
    pub compact: bool,
}

/// The engine's intermediate document for `source`
pub async fn intermediate(ctx: &Context, source: &str) -> Result<Pandoc> {
    let editor = ctx.editor().await?;
    let format = editor.get_format()?;
    editor.destroy();
    ctx.engine
        .to_intermediate(source, &format)
        .await
        .map_err(|e| anyhow!("{} engine: {}", ctx.engine.name(), e))
}

/// The validated tree an editor holds for `source`
pub async fn tree(ctx: &Context, source: &str, file_name: &str) -> Result<Node> {
    let editor = ctx.load(source, file_name).await?;
    let doc = editor.get_state()?.doc().clone();
    editor.destroy();
    Ok(doc)
}

pub async fn dump(args: DumpArgs, ctx: &Context) -> Result<()> {
    let (source, file_name) = read_source(&args.file)?;
    let json = if args.tree {
        to_json(&tree(ctx, &source, &file_name).await?, args.compact)?
    } else {
        to_json(&intermediate(ctx, &source).await?, args.compact)?
    };
    println!("{}", json);
    Ok(())
}

fn to_json<T: Serialize>(value: &T, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::builtin_context;

    #[tokio::test]
    async fn test_intermediate_has_blocks() {
        let ctx = builtin_context();
        let doc = intermediate(&ctx, "# Title\n\nHello").await.unwrap();
        assert_eq!(doc.blocks.len(), 2);
        let json = to_json(&doc, true).unwrap();
        assert!(!json.contains('\n'));
    }

    #[tokio::test]
    async fn test_tree_is_editor_document() {
        let ctx = builtin_context();
        let doc = tree(&ctx, "Hello", "doc.md").await.unwrap();
        let json = to_json(&doc, false).unwrap();
        assert!(json.contains("\"type\": \"paragraph\""));
        assert_eq!(doc.text_content(), "Hello");
    }
}

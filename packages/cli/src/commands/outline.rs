use super::{read_source, Context};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use folio_editor::Outline;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct OutlineArgs {
    /// Document to read
    pub file: PathBuf,

    /// Print the outline as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn outline(args: OutlineArgs, ctx: &Context) -> Result<()> {
    let (source, file_name) = read_source(&args.file)?;
    let editor = ctx.load(&source, &file_name).await?;
    let outline = editor.get_outline()?;
    editor.destroy();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outline)?);
    } else if outline.is_empty() {
        println!("{}", "No headings".dimmed());
    } else {
        print!("{}", render_outline(&outline));
    }
    Ok(())
}

/// One line per heading, indented by level, with the navigation id
pub fn render_outline(outline: &Outline) -> String {
    let mut out = String::new();
    for entry in outline {
        let indent = "  ".repeat(entry.level.saturating_sub(1) as usize);
        out.push_str(&format!("{}{} {}\n", indent, entry.text.bold(), format!("#{}", entry.id).dimmed()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::builtin_context;

    #[tokio::test]
    async fn test_render_outline() {
        colored::control::set_override(false);
        let ctx = builtin_context();
        let editor = ctx
            .load("# Guide\n\nIntro\n\n## Setup {#install}\n\n### Notes", "guide.md")
            .await
            .unwrap();
        let rendered = render_outline(&editor.get_outline().unwrap());
        assert_eq!(rendered, "Guide #guide\n  Setup #install\n    Notes #notes\n");
    }
}

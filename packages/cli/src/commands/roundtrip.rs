use super::{read_source, Context};
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use folio_convert::{WrapMode, WriterOptions};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct RoundtripArgs {
    /// Document to read
    pub file: PathBuf,

    /// Line wrapping: preserve, none, sentence, or a column number
    #[arg(short, long, value_parser = parse_wrap)]
    pub wrap: Option<WrapMode>,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Only report whether the document survives unchanged
    #[arg(long)]
    pub check: bool,
}

pub fn parse_wrap(value: &str) -> Result<WrapMode, String> {
    match value {
        "preserve" => Ok(WrapMode::Preserve),
        "none" => Ok(WrapMode::None),
        "sentence" => Ok(WrapMode::Sentence),
        column => column
            .parse::<usize>()
            .map(WrapMode::Column)
            .map_err(|_| format!("expected preserve, none, sentence or a column, got '{}'", column)),
    }
}

/// Load `source` into an editor and write it back out
pub async fn roundtrip_text(ctx: &Context, source: &str, file_name: &str, options: &WriterOptions) -> Result<String> {
    let editor = ctx.load(source, file_name).await?;
    let markup = editor.get_markdown(options).await?;
    editor.destroy();
    Ok(markup)
}

pub async fn roundtrip(args: RoundtripArgs, ctx: &Context) -> Result<()> {
    let (source, file_name) = read_source(&args.file)?;
    let mut options = ctx.config.writer.clone();
    if let Some(wrap) = args.wrap {
        options.wrap = wrap;
    }

    let output = roundtrip_text(ctx, &source, &file_name, &options).await?;

    if args.check {
        if output.trim_end() == source.trim_end() {
            println!("{} {} round-trips unchanged", "✓".green(), file_name);
            return Ok(());
        }
        print_first_difference(&source, &output);
        return Err(anyhow!("{} changes when written back", file_name));
    }

    match args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &output)?;
            println!("  {} {} → {}", "✓".green(), file_name, path.display());
        }
        None => println!("{}", output),
    }
    Ok(())
}

fn print_first_difference(source: &str, output: &str) {
    let Some((line, (before, after))) = first_difference(source, output) else {
        return;
    };
    eprintln!("{} line {}", "First difference at".yellow(), line);
    eprintln!("  {} {}", "-".red(), before.red());
    eprintln!("  {} {}", "+".green(), after.green());
}

/// 1-based line number and both versions of the first line that differs
fn first_difference<'a>(source: &'a str, output: &'a str) -> Option<(usize, (&'a str, &'a str))> {
    let mut before = source.lines();
    let mut after = output.lines();
    let mut line = 1;
    loop {
        match (before.next(), after.next()) {
            (None, None) => return None,
            (a, b) if a != b => return Some((line, (a.unwrap_or(""), b.unwrap_or("")))),
            _ => line += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::builtin_context;

    #[test]
    fn test_parse_wrap() {
        assert_eq!(parse_wrap("sentence").unwrap(), WrapMode::Sentence);
        assert_eq!(parse_wrap("72").unwrap(), WrapMode::Column(72));
        assert!(parse_wrap("wide").is_err());
    }

    #[test]
    fn test_first_difference() {
        assert_eq!(first_difference("a\nb", "a\nb"), None);
        assert_eq!(first_difference("a\nb\nc", "a\nB\nc"), Some((2, ("b", "B"))));
        assert_eq!(first_difference("a", "a\nmore"), Some((2, ("", "more"))));
    }

    #[tokio::test]
    async fn test_roundtrip_text() {
        let ctx = builtin_context();
        let source = "# Title\n\nHello *world*.";
        let output = roundtrip_text(&ctx, source, "doc.md", &WriterOptions::default())
            .await
            .unwrap();
        assert_eq!(output, source);
    }
}

//! # Pandoc Engine
//!
//! Shells out to the `pandoc` binary:
//!
//! ```text
//! to_intermediate:    markup  | pandoc -f <format> -t json          → Pandoc AST
//! from_intermediate:  AST json | pandoc -f json -t <format> [opts]  → markup
//! ```
//!
//! The binary is taken from `FOLIO_PANDOC` when set, otherwise `pandoc` on
//! the `PATH`.

use crate::ast::Pandoc;
use crate::engine::{ConversionEngine, FormatCapabilities, FormatSpec, WrapMode, WriterOptions};
use crate::error::ConversionError;
use async_trait::async_trait;
use regex::Regex;
use std::process::Stdio;
use std::sync::OnceLock;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PandocEngine {
    binary: String,
}

impl Default for PandocEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PandocEngine {
    pub fn new() -> Self {
        let binary = std::env::var("FOLIO_PANDOC").unwrap_or_else(|_| "pandoc".to_string());
        Self { binary }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run pandoc with `args`, feeding `input` on stdin
    async fn run(&self, args: &[String], input: &str) -> Result<String, ConversionError> {
        debug!(binary = %self.binary, ?args, bytes = input.len(), "running pandoc");

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ConversionError::Engine(format!("failed to start {}: {}", self.binary, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = input.to_string();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    warn!("failed to write pandoc input: {}", e);
                }
            });
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(code = ?output.status.code(), "pandoc failed: {}", stderr);
            return Err(engine_failure(&stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Pandoc's reader name for a format. R Markdown is read as pandoc markdown.
fn reader_format(format: &FormatSpec) -> String {
    match format.base_name() {
        "rmarkdown" | "rmd" => format!("markdown{}", &format.name[format.base_name().len()..]),
        _ => format.name.clone(),
    }
}

fn writer_args(format: &FormatSpec, options: &WriterOptions) -> Vec<String> {
    let mut args = vec!["-f".to_string(), "json".to_string(), "-t".to_string(), reader_format(format)];
    match options.wrap {
        WrapMode::Preserve | WrapMode::Sentence => args.push("--wrap=preserve".to_string()),
        WrapMode::None => args.push("--wrap=none".to_string()),
        WrapMode::Column(n) => {
            args.push("--wrap=auto".to_string());
            args.push(format!("--columns={}", n));
        }
    }
    if options.reference_links {
        args.push("--reference-links".to_string());
    }
    if options.atx_headers {
        args.push("--markdown-headings=atx".to_string());
    }
    args
}

fn location_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"line (\d+),? column (\d+)").ok())
        .as_ref()
}

/// Map pandoc's stderr to a syntax error when it names a position
fn engine_failure(stderr: &str) -> ConversionError {
    let Some(captures) = location_pattern().and_then(|p| p.captures(stderr)) else {
        return ConversionError::Engine(stderr.to_string());
    };
    let line = captures[1].parse().unwrap_or(1);
    let column = captures[2].parse().unwrap_or(1);
    let message = stderr.lines().last().unwrap_or(stderr).trim().to_string();
    ConversionError::syntax(message, line, column)
}

#[async_trait]
impl ConversionEngine for PandocEngine {
    fn name(&self) -> &str {
        "pandoc"
    }

    async fn resolve_format(&self, format: &str) -> Result<FormatCapabilities, ConversionError> {
        FormatCapabilities::for_format(format)
            .ok_or_else(|| ConversionError::Engine(format!("unknown format: {}", format)))
    }

    async fn to_intermediate(&self, markup: &str, format: &FormatSpec) -> Result<Pandoc, ConversionError> {
        let args = vec![
            "-f".to_string(),
            reader_format(format),
            "-t".to_string(),
            "json".to_string(),
        ];
        let json = self.run(&args, markup).await?;
        Pandoc::from_json(&json)
    }

    async fn from_intermediate(
        &self,
        doc: &Pandoc,
        format: &FormatSpec,
        options: &WriterOptions,
    ) -> Result<String, ConversionError> {
        let json = doc.to_json()?;
        let text = self.run(&writer_args(format, options), &json).await?;
        Ok(text.trim_end_matches('\n').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_format_maps_rmarkdown() {
        let caps = FormatCapabilities::all();
        assert_eq!(reader_format(&FormatSpec::new("rmarkdown+smart", caps)), "markdown+smart");
        assert_eq!(reader_format(&FormatSpec::new("gfm", caps)), "gfm");
    }

    #[test]
    fn test_writer_args() {
        let format = FormatSpec::new("markdown", FormatCapabilities::all());
        let options = WriterOptions {
            wrap: WrapMode::Column(72),
            reference_links: true,
            atx_headers: true,
        };
        let args = writer_args(&format, &options);
        assert!(args.contains(&"--wrap=auto".to_string()));
        assert!(args.contains(&"--columns=72".to_string()));
        assert!(args.contains(&"--reference-links".to_string()));
        assert!(args.contains(&"--markdown-headings=atx".to_string()));
    }

    #[test]
    fn test_failure_with_position_is_syntax_error() {
        let err = engine_failure("Error at \"source\" (line 4, column 7):\nunexpected end of input");
        assert_eq!(err.location(), Some((4, 7)));

        let err = engine_failure("Unknown input format docx2");
        assert!(matches!(err, ConversionError::Engine(_)));
    }

    #[tokio::test]
    async fn test_missing_binary_is_engine_error() {
        let engine = PandocEngine::with_binary("/nonexistent/folio-pandoc");
        let format = FormatSpec::new("markdown", FormatCapabilities::all());
        let err = engine.to_intermediate("text", &format).await.unwrap_err();
        assert!(matches!(err, ConversionError::Engine(_)));
    }
}

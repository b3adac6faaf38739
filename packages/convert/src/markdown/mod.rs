//! # Built-in Markdown Engine
//!
//! An in-process engine for a documented markdown dialect, used when no
//! external converter is installed and in tests.
//!
//! Supported: ATX headings with `{#id}`, paragraphs, emphasis, strong,
//! strikeout, code spans, fenced code (including `{r}` chunk headers), block
//! quotes, bullet and ordered lists, thematic breaks, inline and reference
//! links, images, autolinks, footnotes, `$`/`$$` TeX math and YAML front
//! matter with scalar values.

mod lexer;
mod parser;
mod writer;

pub use parser::{identifier_for, unique_identifier};

use crate::ast::Pandoc;
use crate::engine::{ConversionEngine, FormatCapabilities, FormatSpec, WriterOptions};
use crate::error::ConversionError;
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownEngine;

impl MarkdownEngine {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous parse, shared by the async interface
    pub fn parse(&self, markup: &str, format: &FormatSpec) -> Result<Pandoc, ConversionError> {
        debug!(format = %format.name, bytes = markup.len(), "parsing markdown");
        parser::parse(markup, &format.capabilities)
    }

    pub fn render(&self, doc: &Pandoc, format: &FormatSpec, options: &WriterOptions) -> String {
        writer::write(doc, &format.capabilities, options)
    }
}

#[async_trait]
impl ConversionEngine for MarkdownEngine {
    fn name(&self) -> &str {
        "builtin"
    }

    async fn resolve_format(&self, format: &str) -> Result<FormatCapabilities, ConversionError> {
        FormatCapabilities::for_format(format)
            .ok_or_else(|| ConversionError::Engine(format!("unknown format: {}", format)))
    }

    async fn to_intermediate(&self, markup: &str, format: &FormatSpec) -> Result<Pandoc, ConversionError> {
        self.parse(markup, format)
    }

    async fn from_intermediate(
        &self,
        doc: &Pandoc,
        format: &FormatSpec,
        options: &WriterOptions,
    ) -> Result<String, ConversionError> {
        Ok(self.render(doc, format, options))
    }
}

//! # Conversion Engine Interface
//!
//! The editor never parses or prints markup itself. It talks to an engine:
//!
//! ```text
//! markup ──to_intermediate──> Pandoc AST ──TreeReader──> document tree
//! markup <──from_intermediate── Pandoc AST <──TreeWriter── document tree
//! ```
//!
//! Engines are asynchronous because the usual one is an external process.

use crate::ast::Pandoc;
use crate::error::ConversionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Feature flags of a markup format. They decide which extensions apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatCapabilities {
    pub footnotes: bool,
    pub tex_math: bool,
    pub strikeout: bool,
    pub fenced_code_attributes: bool,
    pub code_chunks: bool,
    pub yaml_metadata: bool,
    pub autolinks: bool,
}

impl FormatCapabilities {
    /// Capabilities of a pandoc-style format name such as `markdown`,
    /// `gfm` or `markdown-footnotes+strikeout`
    pub fn for_format(name: &str) -> Option<Self> {
        let split = name.find(['+', '-']).unwrap_or(name.len());
        let (base, modifiers) = name.split_at(split);
        let mut caps = match base {
            "markdown" | "pandoc" => Self {
                code_chunks: false,
                ..Self::all()
            },
            "rmarkdown" | "rmd" => Self::all(),
            "commonmark" | "markdown_strict" => Self::default(),
            "gfm" | "markdown_github" => Self {
                strikeout: true,
                autolinks: true,
                footnotes: true,
                ..Self::default()
            },
            _ => return None,
        };
        let mut rest = modifiers;
        while let Some(sign) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(['+', '-']).unwrap_or(body.len());
            caps.set_extension(&body[..end], sign == '+');
            rest = &body[end..];
        }
        Some(caps)
    }

    pub fn all() -> Self {
        Self {
            footnotes: true,
            tex_math: true,
            strikeout: true,
            fenced_code_attributes: true,
            code_chunks: true,
            yaml_metadata: true,
            autolinks: true,
        }
    }

    /// Toggle a capability by its pandoc extension name. Unknown names are
    /// ignored, pandoc has many that do not affect the editor.
    fn set_extension(&mut self, extension: &str, enabled: bool) {
        match extension {
            "footnotes" => self.footnotes = enabled,
            "tex_math_dollars" => self.tex_math = enabled,
            "strikeout" => self.strikeout = enabled,
            "fenced_code_attributes" => self.fenced_code_attributes = enabled,
            "yaml_metadata_block" => self.yaml_metadata = enabled,
            "autolink_bare_uris" => self.autolinks = enabled,
            _ => {}
        }
    }
}

/// A resolved format: its name and what it supports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSpec {
    pub name: String,
    pub capabilities: FormatCapabilities,
}

impl FormatSpec {
    pub fn new(name: impl Into<String>, capabilities: FormatCapabilities) -> Self {
        Self {
            name: name.into(),
            capabilities,
        }
    }

    /// Base format name without extension modifiers
    pub fn base_name(&self) -> &str {
        let end = self.name.find(['+', '-']).unwrap_or(self.name.len());
        &self.name[..end]
    }
}

/// Line wrapping of emitted markup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WrapMode {
    /// Keep the line breaks present in the document
    #[default]
    Preserve,
    /// One line per paragraph
    None,
    /// Re-flow paragraphs at a column
    Column(usize),
    /// One sentence per line
    Sentence,
}

/// Options that change the emitted text, never the tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WriterOptions {
    pub wrap: WrapMode,
    pub reference_links: bool,
    pub atx_headers: bool,
}

#[async_trait]
pub trait ConversionEngine: Send + Sync {
    /// Engine name for logs and diagnostics
    fn name(&self) -> &str;

    /// Look up what a format supports
    async fn resolve_format(&self, format: &str) -> Result<FormatCapabilities, ConversionError>;

    /// Parse markup into the intermediate representation
    async fn to_intermediate(&self, markup: &str, format: &FormatSpec) -> Result<Pandoc, ConversionError>;

    /// Emit markup from the intermediate representation
    async fn from_intermediate(
        &self,
        doc: &Pandoc,
        format: &FormatSpec,
        options: &WriterOptions,
    ) -> Result<String, ConversionError>;
}

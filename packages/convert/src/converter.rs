//! # Markup Converter
//!
//! Couples an engine with the grammar and the extension-contributed rules:
//!
//! ```text
//! to_tree:   markup → engine.to_intermediate → TreeReader → schema check → tree
//! from_tree: tree → TreeWriter → engine.from_intermediate → markup
//! ```
//!
//! Both directions are deterministic for a given engine and rule set, and
//! `from_tree` never touches the tree it is given.

use crate::ast::Pandoc;
use crate::engine::{ConversionEngine, FormatSpec, WriterOptions};
use crate::error::ConversionResult;
use crate::reader::TreeReader;
use crate::rules::ConversionRules;
use crate::writer::TreeWriter;
use folio_model::{Node, Schema};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct MarkupConverter {
    engine: Arc<dyn ConversionEngine>,
    schema: Schema,
    rules: Arc<ConversionRules>,
    format: FormatSpec,
}

impl std::fmt::Debug for MarkupConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkupConverter")
            .field("engine", &self.engine.name())
            .field("format", &self.format.name)
            .finish()
    }
}

impl MarkupConverter {
    pub fn new(engine: Arc<dyn ConversionEngine>, schema: Schema, rules: ConversionRules, format: FormatSpec) -> Self {
        Self {
            engine,
            schema,
            rules: Arc::new(rules),
            format,
        }
    }

    /// Build a converter, asking the engine what `format` supports
    pub async fn for_format(
        engine: Arc<dyn ConversionEngine>,
        schema: Schema,
        rules: ConversionRules,
        format: &str,
    ) -> ConversionResult<Self> {
        let capabilities = engine.resolve_format(format).await?;
        Ok(Self::new(engine, schema, rules, FormatSpec::new(format, capabilities)))
    }

    pub fn format(&self) -> &FormatSpec {
        &self.format
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rules(&self) -> &ConversionRules {
        &self.rules
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    #[instrument(skip_all, fields(engine = self.engine.name(), format = %self.format.name))]
    pub async fn to_tree(&self, markup: &str) -> ConversionResult<Node> {
        let intermediate = self.engine.to_intermediate(markup, &self.format).await?;
        let doc = self.read_intermediate(&intermediate)?;
        info!(bytes = markup.len(), size = doc.content_size(), "markup converted to tree");
        Ok(doc)
    }

    #[instrument(skip_all, fields(engine = self.engine.name(), format = %self.format.name))]
    pub async fn from_tree(&self, doc: &Node, options: &WriterOptions) -> ConversionResult<String> {
        let intermediate = self.write_intermediate(doc)?;
        let markup = self
            .engine
            .from_intermediate(&intermediate, &self.format, options)
            .await?;
        info!(bytes = markup.len(), "tree converted to markup");
        Ok(markup)
    }

    /// Build a tree from an intermediate document and validate it
    pub fn read_intermediate(&self, doc: &Pandoc) -> ConversionResult<Node> {
        let node = TreeReader::new(&self.schema, &self.rules).read_document(doc)?;
        self.schema.check(&node)?;
        Ok(node)
    }

    pub fn write_intermediate(&self, doc: &Node) -> ConversionResult<Pandoc> {
        TreeWriter::new(&self.schema, &self.rules).write_document(doc)
    }
}

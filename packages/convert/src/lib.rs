//! # folio-convert
//!
//! Markup conversion for the folio editor: the pandoc JSON AST as the
//! intermediate representation, conversion engines that produce and consume
//! it, and the rule-driven reader and writer that map it onto the document
//! tree.
//!
//! ```text
//! markup ⇄ ConversionEngine ⇄ Pandoc AST ⇄ TreeReader/TreeWriter ⇄ Node
//! ```

pub mod ast;
pub mod converter;
pub mod engine;
pub mod error;
pub mod layout;
pub mod markdown;
pub mod pandoc;
pub mod reader;
pub mod rules;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use ast::{Attr, Block, Inline, MathType, MetaValue, Pandoc, QuoteType, Target};
pub use converter::MarkupConverter;
pub use engine::{ConversionEngine, FormatCapabilities, FormatSpec, WrapMode, WriterOptions};
pub use error::{format_diagnostic, ConversionError, ConversionResult};
pub use markdown::MarkdownEngine;
pub use pandoc::PandocEngine;
pub use reader::TreeReader;
pub use rules::ConversionRules;
pub use writer::TreeWriter;

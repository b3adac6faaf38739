//! # Extensions
//!
//! Everything the editor knows about particular node and mark types comes
//! from an extension: grammar fragments, conversion rules, commands, keys,
//! input rules, post-processors, plugins and fixups.
//!
//! ## Resolution
//!
//! Each extension has a constructor function that looks at the format's
//! capabilities and the editor options and returns `Some` when the
//! extension applies. Constructors run in [`BUILTIN`] order and that order
//! is kept everywhere after: grammar contributions, command lists and both
//! post-processor pipelines. Post-processors can depend on each other's
//! effects, so the order is part of the contract.

pub mod base;
pub mod blockquote;
pub mod brace_match;
pub mod code_block;
pub mod code_chunk;
pub mod footnote;
pub mod formatting;
pub mod heading;
pub mod history;
pub mod horizontal_rule;
pub mod image;
pub mod link;
pub mod lists;
pub mod math;
pub mod spelling;

use crate::command::Command;
use crate::config::EditorConfig;
use crate::errors::EditorError;
use crate::fixup::Fixup;
use crate::input_rule::InputRule;
use crate::post_process::PostProcessor;
use crate::state::pipeline::KeyHandler;
use crate::state::plugin::Plugin;
use folio_convert::{ConversionError, ConversionRules, FormatCapabilities};
use folio_model::{MarkSpec, NodeSpec};
use std::sync::Arc;
use tracing::debug;

/// What extension constructors decide on
#[derive(Debug, Clone, Copy)]
pub struct ExtensionContext<'a> {
    pub capabilities: &'a FormatCapabilities,
    pub config: &'a EditorConfig,
}

pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    fn nodes(&self) -> Vec<NodeSpec> {
        Vec::new()
    }

    fn marks(&self) -> Vec<MarkSpec> {
        Vec::new()
    }

    fn commands(&self) -> Vec<Command> {
        Vec::new()
    }

    fn base_keys(&self) -> Vec<KeyHandler> {
        Vec::new()
    }

    fn input_rules(&self) -> Result<Vec<InputRule>, EditorError> {
        Ok(Vec::new())
    }

    /// Run after every document change
    fn post_processors(&self) -> Vec<Arc<dyn PostProcessor>> {
        Vec::new()
    }

    /// Run after changes that touch marks
    fn mark_post_processors(&self) -> Vec<Arc<dyn PostProcessor>> {
        Vec::new()
    }

    fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        Vec::new()
    }

    fn conversion_rules(&self, _rules: &mut ConversionRules) {}

    fn fixups(&self) -> Vec<Arc<dyn Fixup>> {
        Vec::new()
    }
}

pub type ExtensionFn = fn(&ExtensionContext<'_>) -> Option<Box<dyn Extension>>;

/// Built-in extensions in declaration order
pub const BUILTIN: &[ExtensionFn] = &[
    base::extension,
    history::extension,
    heading::extension,
    formatting::extension,
    blockquote::extension,
    lists::extension,
    code_block::extension,
    horizontal_rule::extension,
    link::extension,
    image::extension,
    footnote::extension,
    math::extension,
    code_chunk::extension,
    brace_match::extension,
    spelling::extension,
];

/// The extensions active for one format and option set
pub struct ExtensionManager {
    extensions: Vec<Box<dyn Extension>>,
}

impl ExtensionManager {
    pub fn resolve(ctx: &ExtensionContext<'_>) -> Self {
        Self::resolve_with(ctx, BUILTIN)
    }

    pub fn resolve_with(ctx: &ExtensionContext<'_>, constructors: &[ExtensionFn]) -> Self {
        let extensions: Vec<Box<dyn Extension>> = constructors.iter().filter_map(|make| make(ctx)).collect();
        debug!(
            extensions = ?extensions.iter().map(|e| e.name()).collect::<Vec<_>>(),
            "resolved extensions"
        );
        Self { extensions }
    }

    pub fn extensions(&self) -> &[Box<dyn Extension>] {
        &self.extensions
    }

    pub fn names(&self) -> Vec<&str> {
        self.extensions.iter().map(|e| e.name()).collect()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.extensions.iter().any(|e| e.name() == name)
    }

    pub fn commands(&self) -> Vec<Command> {
        self.extensions.iter().flat_map(|e| e.commands()).collect()
    }

    pub fn conversion_rules(&self) -> ConversionRules {
        let mut rules = ConversionRules::new();
        for extension in &self.extensions {
            extension.conversion_rules(&mut rules);
        }
        rules
    }

    pub fn fixups(&self) -> Vec<Arc<dyn Fixup>> {
        self.extensions.iter().flat_map(|e| e.fixups()).collect()
    }
}

/// Error for a conversion rule handed a kind it was not registered for
pub(crate) fn unexpected(kind: &str) -> ConversionError {
    ConversionError::UnknownNodeKind(kind.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(format: &str, config: &EditorConfig) -> Vec<String> {
        let caps = FormatCapabilities::for_format(format).unwrap();
        let ctx = ExtensionContext {
            capabilities: &caps,
            config,
        };
        ExtensionManager::resolve(&ctx)
            .names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_markdown_defaults() {
        let names = names("markdown", &EditorConfig::default());
        assert_eq!(
            names,
            [
                "base",
                "history",
                "heading",
                "formatting",
                "blockquote",
                "lists",
                "code_block",
                "horizontal_rule",
                "link",
                "image",
                "footnote",
                "math"
            ]
        );
    }

    #[test]
    fn test_commonmark_drops_footnotes_and_math() {
        let names = names("commonmark", &EditorConfig::default());
        assert!(!names.iter().any(|n| n == "footnote"));
        assert!(!names.iter().any(|n| n == "math"));
    }

    #[test]
    fn test_options_enable_extensions() {
        let config = EditorConfig {
            embedded_code_chunks: true,
            brace_matching: true,
            spell_check: true,
            ..EditorConfig::default()
        };
        let names = names("rmarkdown", &config);
        assert!(names.ends_with(&["code_chunk".to_string(), "brace_match".to_string(), "spelling".to_string()]));

        // chunks need a format that has them
        let names = self::names("markdown", &config);
        assert!(!names.iter().any(|n| n == "code_chunk"));
    }
}

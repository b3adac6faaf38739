//! # Schema Assembler
//!
//! Merges the fixed base grammar with what the resolved extensions
//! contribute, and lays out everything else an editor needs from them:
//! conversion rules, the command list, the plugin pipeline and fixups.
//!
//! ```text
//! base grammar (doc, body, notes, note, text)
//!   + extension nodes/marks, declaration order
//!   → Schema
//!   → check every command / input rule type reference
//!   → Assembly { schema, rules, commands, pipeline, fixups }
//! ```
//!
//! Two extensions may declare the same type only if their declarations are
//! identical; anything else is a [`EditorError::Configuration`]. Assembly
//! is deterministic for a given extension list.

use crate::command::Command;
use crate::config::EditorConfig;
use crate::errors::EditorError;
use crate::extension::{ExtensionContext, ExtensionManager};
use crate::fixup::Fixup;
use crate::keymap::{normalize_chord, KeyBindings};
use crate::state::pipeline::{KeyHandler, KeybindingsPlugin, Pipeline};
use crate::state::plugin::{Editability, PluginSet};
use crate::state::snapshot::EditorState;
use folio_convert::layout::{BODY, NOTE, NOTES, ORDINAL_ATTR, REF_ATTR, TITLE_ATTR};
use folio_convert::{ConversionRules, FormatSpec};
use folio_model::{AttrSpec, MarkSpec, Node, NodeSpec, Schema};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub const DOC: &str = "doc";
pub const TEXT: &str = "text";

/// Node types every grammar has, whatever the extensions
pub fn base_nodes() -> Vec<NodeSpec> {
    vec![
        NodeSpec::new(DOC, format!("{BODY} {NOTES}")).attr(TITLE_ATTR, AttrSpec::with_default("")),
        NodeSpec::new(BODY, "block+"),
        NodeSpec::new(NOTES, format!("{NOTE}*")),
        NodeSpec::new(NOTE, "block+")
            .attr(REF_ATTR, AttrSpec::required())
            .attr(ORDINAL_ATTR, AttrSpec::with_default(0)),
        NodeSpec::new(TEXT, "").group("inline"),
    ]
}

/// Everything built from one extension set
#[derive(Clone)]
pub struct Assembly {
    pub format: FormatSpec,
    pub schema: Schema,
    pub rules: ConversionRules,
    pub commands: Arc<Vec<Command>>,
    pub pipeline: Pipeline,
    pub fixups: Vec<Arc<dyn Fixup>>,
    pub extensions: Vec<String>,
    mac_keys: bool,
}

impl std::fmt::Debug for Assembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembly")
            .field("format", &self.format.name)
            .field("extensions", &self.extensions)
            .field("commands", &self.commands.len())
            .finish()
    }
}

/// Add `spec` unless an identical one is already there
fn merge<T: PartialEq>(
    specs: &mut Vec<T>,
    spec: T,
    name: impl Fn(&T) -> &str,
    owner: &str,
) -> Result<(), EditorError> {
    match specs.iter().find(|s| name(s) == name(&spec)) {
        Some(existing) if *existing == spec => Ok(()),
        Some(_) => Err(EditorError::configuration(format!(
            "extension '{owner}' redeclares type '{}' with a different definition",
            name(&spec)
        ))),
        None => {
            specs.push(spec);
            Ok(())
        }
    }
}

fn check_types(schema: &Schema, owner: &str, names: &[String]) -> Result<(), EditorError> {
    match names.iter().find(|n| !schema.has_node(n) && !schema.has_mark(n)) {
        Some(missing) => Err(EditorError::configuration(format!(
            "'{owner}' refers to type '{missing}', which is not in the grammar"
        ))),
        None => Ok(()),
    }
}

impl Assembly {
    /// Resolve extensions for `format` and `config` and assemble them
    pub fn build(format: FormatSpec, config: &EditorConfig) -> Result<Self, EditorError> {
        let ctx = ExtensionContext {
            capabilities: &format.capabilities,
            config,
        };
        let manager = ExtensionManager::resolve(&ctx);
        Self::from_manager(format, &manager, config.mac_keys)
    }

    pub fn from_manager(format: FormatSpec, manager: &ExtensionManager, mac_keys: bool) -> Result<Self, EditorError> {
        let mut nodes = base_nodes();
        let mut marks: Vec<MarkSpec> = Vec::new();
        for extension in manager.extensions() {
            for spec in extension.nodes() {
                merge(&mut nodes, spec, |s| s.name.as_str(), extension.name())?;
            }
            for spec in extension.marks() {
                merge(&mut marks, spec, |s| s.name.as_str(), extension.name())?;
            }
        }
        let schema = Schema::new(nodes, marks, DOC)?;

        let mut commands: Vec<Command> = Vec::new();
        let mut pipeline = Pipeline::default();
        let mut fixups = Vec::new();
        for extension in manager.extensions() {
            for command in extension.commands() {
                check_types(&schema, &command.id, &command.requires)?;
                if commands.iter().any(|c| c.id == command.id) {
                    return Err(EditorError::configuration(format!(
                        "command '{}' is declared twice",
                        command.id
                    )));
                }
                commands.push(command);
            }
            for rule in extension.input_rules()? {
                check_types(&schema, &rule.name, &rule.requires)?;
                pipeline.input_rules.push(rule);
            }
            for handler in extension.base_keys() {
                let chord = normalize_chord(&handler.chord, mac_keys)?;
                pipeline.base_keys.push(KeyHandler::new(chord, handler.run));
            }
            pipeline.structural.extend(extension.post_processors());
            pipeline.marks.extend(extension.mark_post_processors());
            pipeline.plugins.extend(extension.plugins());
            fixups.extend(extension.fixups());
            debug!(extension = extension.name(), "extension assembled");
        }

        let assembly = Self {
            format,
            schema,
            rules: manager.conversion_rules(),
            commands: Arc::new(commands),
            pipeline,
            fixups,
            extensions: manager.names().into_iter().map(String::from).collect(),
            mac_keys,
        };
        info!(
            format = %assembly.format.name,
            extensions = assembly.extensions.len(),
            commands = assembly.commands.len(),
            "grammar assembled"
        );
        Ok(assembly)
    }

    /// Command defaults merged with caller overrides
    pub fn key_bindings(&self, overrides: &BTreeMap<String, Vec<String>>) -> Result<KeyBindings, EditorError> {
        let defaults: Vec<(String, Vec<String>)> = self
            .commands
            .iter()
            .map(|c| (c.id.clone(), c.keys.clone()))
            .collect();
        KeyBindings::resolve(&defaults, overrides, self.mac_keys)
    }

    pub fn plugin_set(&self, bindings: KeyBindings) -> PluginSet {
        let keybindings = Arc::new(KeybindingsPlugin::new(bindings, self.commands.clone()));
        self.pipeline.plugin_set(keybindings)
    }

    /// A snapshot of `doc` with this assembly's plugins
    pub fn state(&self, doc: Node, bindings: KeyBindings) -> EditorState {
        EditorState::new(self.schema.clone(), doc, self.plugin_set(bindings))
    }

    pub fn editability(&self) -> &Editability {
        &self.pipeline.editability
    }

    pub fn command(&self, id: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.id == id)
    }
}

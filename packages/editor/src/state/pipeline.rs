//! # Plugin Pipeline Assembly
//!
//! Gathers what every active extension contributes (base keys,
//! post-processors, plugins, input rules) and lays them out in the fixed
//! plugin order described in [`crate::state::plugin`]. Only the keybindings
//! plugin is rebuilt when bindings change; everything else is shared.

use crate::command::{Command, CommandFn};
use crate::input_rule::{InputRule, InputRulesPlugin};
use crate::keymap::KeyBindings;
use crate::post_process::{PostProcessor, PostProcessorPlugin, Stage};
use crate::state::plugin::{Dispatch, Editability, EditabilityGate, Plugin, PluginSet};
use crate::state::snapshot::EditorState;
use std::sync::Arc;

pub const BASE_KEYS: &str = "base_keys";
pub const KEYBINDINGS: &str = "keybindings";

/// A key handler that is not a named command (Enter, Backspace, ...)
#[derive(Clone)]
pub struct KeyHandler {
    /// Raw chord, normalized when the pipeline is built
    pub chord: String,
    pub run: CommandFn,
}

impl KeyHandler {
    pub fn new(chord: impl Into<String>, run: CommandFn) -> Self {
        Self {
            chord: chord.into(),
            run,
        }
    }
}

/// Base key handlers. Later handlers for the same chord are tried first,
/// so an extension can specialize Enter while the generic split stays the
/// fallback.
pub struct BaseKeysPlugin {
    handlers: Vec<KeyHandler>,
}

impl BaseKeysPlugin {
    /// `handlers` must already carry normalized chords
    pub fn new(handlers: Vec<KeyHandler>) -> Self {
        Self { handlers }
    }
}

impl Plugin for BaseKeysPlugin {
    fn key(&self) -> &str {
        BASE_KEYS
    }

    fn handle_key(&self, state: &EditorState, chord: &str, dispatch: Dispatch<'_>) -> bool {
        for handler in self.handlers.iter().rev().filter(|h| h.chord == chord) {
            if (handler.run)(state, Some(&mut *dispatch)) {
                return true;
            }
        }
        false
    }
}

/// Routes bound chords to commands
pub struct KeybindingsPlugin {
    bindings: KeyBindings,
    commands: Arc<Vec<Command>>,
}

impl KeybindingsPlugin {
    pub fn new(bindings: KeyBindings, commands: Arc<Vec<Command>>) -> Self {
        Self { bindings, commands }
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }
}

impl Plugin for KeybindingsPlugin {
    fn key(&self) -> &str {
        KEYBINDINGS
    }

    fn handle_key(&self, state: &EditorState, chord: &str, dispatch: Dispatch<'_>) -> bool {
        let Some(id) = self.bindings.command_for(chord) else {
            return false;
        };
        match self.commands.iter().find(|c| c.id == id) {
            Some(command) => command.execute(state, dispatch),
            None => false,
        }
    }
}

/// Everything but the keybindings plugin, ready to be laid out
#[derive(Clone, Default)]
pub struct Pipeline {
    pub base_keys: Vec<KeyHandler>,
    pub structural: Vec<Arc<dyn PostProcessor>>,
    pub marks: Vec<Arc<dyn PostProcessor>>,
    pub plugins: Vec<Arc<dyn Plugin>>,
    pub input_rules: Vec<InputRule>,
    pub editability: Editability,
}

impl Pipeline {
    /// The plugin set, in the fixed order
    pub fn plugin_set(&self, keybindings: Arc<KeybindingsPlugin>) -> PluginSet {
        let mut plugins: Vec<Arc<dyn Plugin>> = Vec::with_capacity(self.plugins.len() + 6);
        plugins.push(Arc::new(BaseKeysPlugin::new(self.base_keys.clone())));
        plugins.push(keybindings);
        plugins.push(Arc::new(PostProcessorPlugin::new(Stage::Structural, self.structural.clone())));
        plugins.push(Arc::new(PostProcessorPlugin::new(Stage::Mark, self.marks.clone())));
        plugins.extend(self.plugins.iter().cloned());
        plugins.push(Arc::new(InputRulesPlugin::new(self.input_rules.clone())));
        plugins.push(Arc::new(EditabilityGate::new(self.editability.clone())));
        PluginSet::new(plugins)
    }
}

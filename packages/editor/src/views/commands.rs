//! Commands as the caller sees them: each bound to its resolved chords and
//! to the editor it acts on.

use crate::command::Command;
use crate::editor::Shared;
use crate::errors::EditorError;
use crate::keymap::KeyBindings;
use std::fmt;
use std::rc::Rc;

pub struct EditorCommand {
    command: Command,
    keymap: Vec<String>,
    shared: Rc<Shared>,
}

impl fmt::Debug for EditorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorCommand")
            .field("id", &self.command.id)
            .field("keymap", &self.keymap)
            .finish()
    }
}

impl EditorCommand {
    /// Command identifier, as used in key binding overrides
    pub fn id(&self) -> &str {
        &self.command.id
    }

    /// Chords currently bound to the command, caller overrides applied
    pub fn keymap(&self) -> &[String] {
        &self.keymap
    }

    /// False once the editor is destroyed
    pub fn is_active(&self) -> bool {
        self.shared
            .state()
            .map(|state| self.command.is_active(&state))
            .unwrap_or(false)
    }

    /// Whether the command can run against the current state
    pub fn is_enabled(&self) -> bool {
        self.shared
            .state()
            .map(|state| self.command.is_enabled(&state))
            .unwrap_or(false)
    }

    /// Run the command and give focus back to the surface. Returns whether
    /// the command ran.
    pub fn execute(&self) -> Result<bool, EditorError> {
        let ran = self.execute_without_focus()?;
        self.shared.focus()?;
        Ok(ran)
    }

    /// Run the command leaving focus wherever it is
    pub fn execute_without_focus(&self) -> Result<bool, EditorError> {
        self.shared.run_command(&self.command)
    }
}

pub(crate) fn list(shared: &Rc<Shared>, commands: &[Command], bindings: &KeyBindings) -> Vec<EditorCommand> {
    commands
        .iter()
        .map(|command| EditorCommand {
            keymap: bindings.keys_for(&command.id).to_vec(),
            command: command.clone(),
            shared: shared.clone(),
        })
        .collect()
}

use super::{Extension, ExtensionContext};
use crate::command::{transaction_command, Command, CommandFn};
use crate::history::{HISTORY_TAG, REDO, UNDO};
use folio_model::Transaction;

pub struct HistoryExtension;

pub fn extension(_ctx: &ExtensionContext<'_>) -> Option<Box<dyn Extension>> {
    Some(Box::new(HistoryExtension))
}

impl Extension for HistoryExtension {
    fn name(&self) -> &str {
        "history"
    }

    fn commands(&self) -> Vec<Command> {
        vec![
            Command::new("undo", request(UNDO)).keys(["Mod-z"]),
            Command::new("redo", request(REDO)).keys(["Mod-Shift-z", "Mod-y"]),
        ]
    }
}

/// The machine answers an empty transaction tagged with the direction
fn request(direction: &'static str) -> CommandFn {
    transaction_command(move |state| {
        let status = state.history();
        let depth = if direction == UNDO {
            status.undo_depth
        } else {
            status.redo_depth
        };
        (depth > 0).then(|| Transaction::new().tag(HISTORY_TAG, direction))
    })
}

#[cfg(test)]
mod tests {
    use crate::test_support::{command, machine};

    #[test]
    fn test_undo_redo_commands() {
        let mut m = machine("Hello");
        let undo = command("undo");
        let redo = command("redo");
        assert!(!undo.is_enabled(m.state()));

        m.handle_text_input("!");
        assert!(undo.is_enabled(m.state()));
        m.run_command(&undo.run).unwrap();
        assert_eq!(m.state().doc().text_content(), "Hello");
        assert!(redo.is_enabled(m.state()));

        m.handle_key("Ctrl+Y").unwrap();
        assert_eq!(m.state().doc().text_content(), "!Hello");
    }
}

use super::{unexpected, Extension, ExtensionContext};
use crate::command::{transaction_command, Command, CommandFn};
use crate::errors::EditorError;
use crate::input_rule::{wrapping_rule, InputRule};
use crate::transform::{SelectionAnchors, Transform};
use folio_convert::{Block, ConversionRules};
use folio_model::{Attrs, NodeSpec};

pub const BLOCKQUOTE: &str = "blockquote";

pub struct Blockquote;

pub fn extension(_ctx: &ExtensionContext<'_>) -> Option<Box<dyn Extension>> {
    Some(Box::new(Blockquote))
}

impl Extension for Blockquote {
    fn name(&self) -> &str {
        "blockquote"
    }

    fn nodes(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::new(BLOCKQUOTE, "block+").group("block")]
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::new(BLOCKQUOTE, toggle_blockquote())
            .keys(["Mod-Alt-q"])
            .active(|state| state.ancestor_of_type(BLOCKQUOTE).is_some())
            .requires([BLOCKQUOTE])]
    }

    fn input_rules(&self) -> Result<Vec<InputRule>, EditorError> {
        Ok(vec![wrapping_rule("blockquote", r"^> $", BLOCKQUOTE, None, |_| Some(Attrs::new()))?])
    }

    fn conversion_rules(&self, rules: &mut ConversionRules) {
        rules
            .read_block("BlockQuote", |r, b| match b {
                Block::BlockQuote(blocks) => {
                    let content = r.read_blocks(blocks)?;
                    Ok(vec![r.node(BLOCKQUOTE, Attrs::new(), content)?])
                }
                other => Err(unexpected(other.kind())),
            })
            .write_block(BLOCKQUOTE, |w, n| Ok(vec![Block::BlockQuote(w.write_blocks(n.children())?)]));
    }
}

/// Lift the selection out of the enclosing quote, or wrap it in one
fn toggle_blockquote() -> CommandFn {
    transaction_command(|state| {
        let selection = state.selection();
        let anchors = SelectionAnchors::capture(state.doc(), selection);
        let mut tf = Transform::new(state);
        match state.ancestor_of_type(BLOCKQUOTE) {
            Some((pos, _)) => {
                tf.unwrap(pos, false).ok()?;
            }
            None => {
                tf.wrap(selection.from(), selection.to(), BLOCKQUOTE, Attrs::new(), None).ok()?;
            }
        }
        let restored = anchors.restore(tf.doc());
        tf.set_selection(restored);
        Some(tf.into_transaction())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body, command, machine, markdown, text_machine};
    use folio_model::{Selection, Transaction};

    #[test]
    fn test_toggle_blockquote() {
        let mut m = machine("Quote me");
        let quote = command(BLOCKQUOTE);
        m.run_command(&quote.run).unwrap();
        assert_eq!(body(m.state()), ["blockquote:Quote me"]);
        assert!(quote.is_active(m.state()));
        assert!(markdown(m.state()).starts_with("> Quote me"));

        m.handle_key("Ctrl+Alt+Q").unwrap();
        assert_eq!(body(m.state()), ["paragraph:Quote me"]);
    }

    #[test]
    fn test_gt_space_wraps() {
        let mut m = text_machine(">");
        m.apply_transaction(Transaction::new().set_selection(Selection::cursor(3)));
        m.handle_text_input(" ");
        assert_eq!(body(m.state()), ["blockquote:"]);
    }
}

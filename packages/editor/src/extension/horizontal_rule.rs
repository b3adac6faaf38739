use super::{Extension, ExtensionContext};
use crate::command::{transaction_command, Command, CommandFn};
use crate::errors::EditorError;
use crate::input_rule::InputRule;
use crate::transform::Transform;
use folio_convert::layout::PARAGRAPH;
use folio_convert::{Block, ConversionRules};
use folio_model::{Attrs, Node, NodeSpec, Schema, SchemaError, Selection};

pub const HORIZONTAL_RULE: &str = "horizontal_rule";

pub struct HorizontalRule;

pub fn extension(_ctx: &ExtensionContext<'_>) -> Option<Box<dyn Extension>> {
    Some(Box::new(HorizontalRule))
}

impl Extension for HorizontalRule {
    fn name(&self) -> &str {
        "horizontal_rule"
    }

    fn nodes(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::new(HORIZONTAL_RULE, "").group("block")]
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::new(HORIZONTAL_RULE, insert_rule())
            .keys(["Mod-_"])
            .requires([HORIZONTAL_RULE])]
    }

    fn input_rules(&self) -> Result<Vec<InputRule>, EditorError> {
        let rule = InputRule::new("horizontal_rule", r"^---$", |tf, m| {
            let r = tf.resolve(m.start).ok()?;
            let depth = r.textblock_depth()?;
            let (before, after) = (r.before(depth), r.after(depth));
            let content = rule_and_paragraph(tf.schema()).ok()?;
            tf.replace(before, after, content).ok()?;
            tf.set_selection(Selection::cursor(before + 2));
            Some(())
        })?;
        Ok(vec![rule.requires([HORIZONTAL_RULE])])
    }

    fn conversion_rules(&self, rules: &mut ConversionRules) {
        rules
            .read_block("HorizontalRule", |r, _| Ok(vec![r.node(HORIZONTAL_RULE, Attrs::new(), Vec::new())?]))
            .write_block(HORIZONTAL_RULE, |_, _| Ok(vec![Block::HorizontalRule]));
    }
}

fn rule_and_paragraph(schema: &Schema) -> Result<Vec<Node>, SchemaError> {
    Ok(vec![
        schema.node(HORIZONTAL_RULE, Attrs::new(), Vec::new())?,
        schema.node(PARAGRAPH, Attrs::new(), Vec::new())?,
    ])
}

/// Insert a rule and an empty paragraph after the current textblock
fn insert_rule() -> CommandFn {
    transaction_command(|state| {
        let block = state.textblock_at(state.selection().head)?;
        let at = block.end();
        let mut tf = Transform::new(state);
        tf.replace(at, at, rule_and_paragraph(state.schema()).ok()?).ok()?;
        tf.set_selection(Selection::cursor(at + 2));
        Some(tf.into_transaction().scroll_into_view())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body, command, machine, markdown, text_machine};
    use folio_model::Transaction;

    #[test]
    fn test_dashes_become_rule() {
        let mut m = text_machine("--");
        m.apply_transaction(Transaction::new().set_selection(Selection::cursor(4)));
        m.handle_text_input("-");
        assert_eq!(body(m.state()), ["horizontal_rule:", "paragraph:"]);
        assert_eq!(m.state().selection(), Selection::cursor(3));
    }

    #[test]
    fn test_insert_command() {
        let mut m = machine("Above");
        m.run_command(&command(HORIZONTAL_RULE).run).unwrap();
        assert_eq!(body(m.state()), ["paragraph:Above", "horizontal_rule:", "paragraph:"]);
        assert!(markdown(m.state()).contains("* * *"));
    }
}

//! Headings, levels 1 to 6.
//!
//! Identifiers the engine derives from the heading text are not stored:
//! they are recomputed on write, so editing the text keeps the anchor in
//! step. Only explicit `{#id}` identifiers survive a round trip.

use super::{unexpected, Extension, ExtensionContext};
use crate::command::{transaction_command, Command, CommandFn};
use crate::errors::EditorError;
use crate::input_rule::{block_type_rule, InputRule};
use crate::state::snapshot::EditorState;
use crate::transform::Transform;
use folio_convert::ast::stringify;
use folio_convert::layout::PARAGRAPH;
use folio_convert::markdown::identifier_for;
use folio_convert::{Attr, Block, ConversionRules};
use folio_model::{attrs, AttrSpec, Attrs, NodeSpec};
use serde_json::Value;

pub const HEADING: &str = "heading";
pub const MAX_LEVEL: u64 = 6;

pub struct Heading;

pub fn extension(_ctx: &ExtensionContext<'_>) -> Option<Box<dyn Extension>> {
    Some(Box::new(Heading))
}

impl Extension for Heading {
    fn name(&self) -> &str {
        "heading"
    }

    fn nodes(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::new(HEADING, "inline*")
            .group("block")
            .attr("level", AttrSpec::with_default(1))
            .attr("id", AttrSpec::with_default(""))]
    }

    fn commands(&self) -> Vec<Command> {
        (1..=MAX_LEVEL)
            .map(|level| {
                Command::new(format!("heading{level}"), toggle_heading(level))
                    .keys([format!("Shift-Ctrl-{level}")])
                    .active(move |state| is_heading(state, level))
                    .requires([HEADING])
            })
            .collect()
    }

    fn input_rules(&self) -> Result<Vec<InputRule>, EditorError> {
        Ok(vec![block_type_rule("heading", r"^(#{1,6}) $", HEADING, |m| {
            let level = m.group(1)?.text.len();
            Some(attrs([("level", level)]))
        })?])
    }

    fn conversion_rules(&self, rules: &mut ConversionRules) {
        rules
            .read_block("Header", |r, b| match b {
                Block::Header(level, attr, inlines) => {
                    let content = r.read_inlines(inlines)?;
                    let id = if is_derived_identifier(attr.id(), &stringify(inlines)) {
                        ""
                    } else {
                        attr.id()
                    };
                    let mut a = attrs([("level", (*level).clamp(1, MAX_LEVEL as i64))]);
                    a.insert("id".into(), Value::from(id));
                    Ok(vec![r.node(HEADING, a, content)?])
                }
                other => Err(unexpected(other.kind())),
            })
            .write_block(HEADING, |w, n| {
                let level = n.attr_u64("level").unwrap_or(1) as i64;
                let id = n.attr_str("id").unwrap_or_default();
                Ok(vec![Block::Header(level, Attr::with_id(id), w.write_inlines(n.children())?)])
            });
    }
}

/// Whether `id` is what the engine would derive for `text`, possibly with a
/// `-N` suffix added to keep it unique
pub fn is_derived_identifier(id: &str, text: &str) -> bool {
    if id.is_empty() {
        return true;
    }
    let base = identifier_for(text);
    if id == base {
        return true;
    }
    id.strip_prefix(base.as_str())
        .and_then(|rest| rest.strip_prefix('-'))
        .map_or(false, |n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn is_heading(state: &EditorState, level: u64) -> bool {
    state
        .selected_textblocks()
        .iter()
        .all(|b| b.node.node_type() == HEADING && b.node.attr_u64("level") == Some(level))
}

/// Turn the selected blocks into headings of `level`, or back into
/// paragraphs when they already are
fn toggle_heading(level: u64) -> CommandFn {
    transaction_command(move |state| {
        let selection = state.selection();
        let mut tf = Transform::new(state);
        let changed = if is_heading(state, level) {
            tf.set_block_type(selection.from(), selection.to(), PARAGRAPH, Attrs::new())
        } else {
            tf.set_block_type(selection.from(), selection.to(), HEADING, attrs([("level", level)]))
        }
        .ok()?;
        (changed > 0).then(|| tf.into_transaction())
    })
}

//! Fenced code blocks. With `visual_code_blocks`, Tab indents inside the
//! block and Mod-Enter leaves it.

use super::{unexpected, Extension, ExtensionContext};
use crate::command::{run_collect, transaction_command, Command, CommandFn};
use crate::errors::EditorError;
use crate::input_rule::{block_type_rule, InputRule};
use crate::keymap::normalize_chord;
use crate::state::plugin::{Dispatch, Plugin};
use crate::state::snapshot::{EditorState, TextblockRef};
use crate::transform::Transform;
use folio_convert::layout::PARAGRAPH;
use folio_convert::{Attr, Block, ConversionError, ConversionRules, TreeReader};
use folio_model::{attrs, AttrSpec, Attrs, Node, NodeSpec, Selection};
use std::sync::Arc;
use tracing::warn;

pub const CODE_BLOCK: &str = "code_block";
pub const CODE_BLOCK_KEYS: &str = "code_block_keys";

const INDENT: &str = "    ";

pub struct CodeBlock {
    visual: bool,
    mac_keys: bool,
}

pub fn extension(ctx: &ExtensionContext<'_>) -> Option<Box<dyn Extension>> {
    Some(Box::new(CodeBlock {
        visual: ctx.config.visual_code_blocks,
        mac_keys: ctx.config.mac_keys,
    }))
}

impl Extension for CodeBlock {
    fn name(&self) -> &str {
        "code_block"
    }

    fn nodes(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::new(CODE_BLOCK, "text*")
            .group("block")
            .code()
            .marks("")
            .attr("lang", AttrSpec::with_default(""))]
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::new(CODE_BLOCK, toggle_code_block())
            .keys(["Mod-Alt-c"])
            .active(|state| {
                state
                    .selected_textblocks()
                    .iter()
                    .all(|b| b.node.node_type() == CODE_BLOCK)
            })
            .requires([CODE_BLOCK])]
    }

    fn input_rules(&self) -> Result<Vec<InputRule>, EditorError> {
        Ok(vec![block_type_rule("code_block", r"^```$", CODE_BLOCK, |_| Some(Attrs::new()))?])
    }

    fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        if !self.visual {
            return Vec::new();
        }
        match CodeBlockKeys::new(self.mac_keys) {
            Ok(plugin) => vec![Arc::new(plugin)],
            Err(e) => {
                warn!(error = %e, "code block keys unavailable");
                Vec::new()
            }
        }
    }

    fn conversion_rules(&self, rules: &mut ConversionRules) {
        rules
            .read_block("CodeBlock", |r, b| match b {
                Block::CodeBlock(attr, text) => read_code_block(r, attr, text),
                other => Err(unexpected(other.kind())),
            })
            .write_block(CODE_BLOCK, |_, n| {
                let lang = n.attr_str("lang").unwrap_or_default();
                let attr = if lang.is_empty() {
                    Attr::default()
                } else {
                    Attr::with_class(lang)
                };
                Ok(vec![Block::CodeBlock(attr, n.text_content())])
            });
    }
}

/// Read a `CodeBlock` as a code block node, the first class naming the
/// language
pub fn read_code_block(r: &mut TreeReader<'_>, attr: &Attr, text: &str) -> Result<Vec<Node>, ConversionError> {
    let lang = attr.classes().first().cloned().unwrap_or_default();
    let content = r.text(text);
    Ok(vec![r.node(CODE_BLOCK, attrs([("lang", lang)]), content)?])
}

fn toggle_code_block() -> CommandFn {
    transaction_command(|state| {
        let selection = state.selection();
        let all_code = state
            .selected_textblocks()
            .iter()
            .all(|b| b.node.node_type() == CODE_BLOCK);
        let target = if all_code { PARAGRAPH } else { CODE_BLOCK };
        let mut tf = Transform::new(state);
        let changed = tf
            .set_block_type(selection.from(), selection.to(), target, Attrs::new())
            .ok()?;
        (changed > 0).then(|| tf.into_transaction())
    })
}

/// Tab and Mod-Enter inside code blocks
pub struct CodeBlockKeys {
    tab: String,
    exit: String,
    indent: CommandFn,
    leave: CommandFn,
}

impl CodeBlockKeys {
    pub fn new(mac_keys: bool) -> Result<Self, EditorError> {
        Ok(Self {
            tab: normalize_chord("Tab", mac_keys)?,
            exit: normalize_chord("Mod-Enter", mac_keys)?,
            indent: indent(),
            leave: exit_code_block(),
        })
    }
}

impl Plugin for CodeBlockKeys {
    fn key(&self) -> &str {
        CODE_BLOCK_KEYS
    }

    fn handle_key(&self, state: &EditorState, chord: &str, dispatch: Dispatch<'_>) -> bool {
        let run = if chord == self.tab {
            &self.indent
        } else if chord == self.exit {
            &self.leave
        } else {
            return false;
        };
        match run_collect(run, state) {
            Some(tr) => {
                dispatch(tr);
                true
            }
            None => false,
        }
    }
}

fn in_code_block(state: &EditorState) -> Option<TextblockRef> {
    state
        .textblock_at(state.selection().head)
        .filter(|b| b.node.node_type() == CODE_BLOCK)
}

fn indent() -> CommandFn {
    transaction_command(|state| {
        in_code_block(state)?;
        let selection = state.selection();
        let mut tf = Transform::new(state);
        tf.delete_range(selection.from(), selection.to()).ok()?;
        tf.insert_text(selection.from(), INDENT, Vec::new()).ok()?;
        tf.set_selection(Selection::cursor(selection.from() + INDENT.chars().count()));
        Some(tf.into_transaction())
    })
}

/// Put an empty paragraph after the code block and move there
fn exit_code_block() -> CommandFn {
    transaction_command(|state| {
        let block = in_code_block(state)?;
        let paragraph = state.schema().node(PARAGRAPH, Attrs::new(), Vec::new()).ok()?;
        let after = block.end();
        let mut tf = Transform::new(state);
        tf.replace(after, after, vec![paragraph]).ok()?;
        tf.set_selection(Selection::cursor(after + 1));
        Some(tf.into_transaction().scroll_into_view())
    })
}

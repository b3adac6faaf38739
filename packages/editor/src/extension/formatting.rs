//! Inline formatting marks: strong, emphasis, code and (where the format
//! has it) strikeout.

use super::{Extension, ExtensionContext};
use crate::command::{transaction_command, Command, CommandFn};
use crate::errors::EditorError;
use crate::input_rule::{mark_rule, InputRule};
use crate::state::snapshot::EditorState;
use crate::transform::Transform;
use folio_convert::ast::inline_text;
use folio_convert::{Attr, ConversionRules, Inline};
use folio_model::{Attrs, Mark, MarkSpec, Node};

pub const STRONG: &str = "strong";
pub const EM: &str = "em";
pub const CODE: &str = "code";
pub const STRIKEOUT: &str = "strikeout";

pub struct Formatting {
    strikeout: bool,
}

pub fn extension(ctx: &ExtensionContext<'_>) -> Option<Box<dyn Extension>> {
    Some(Box::new(Formatting {
        strikeout: ctx.capabilities.strikeout,
    }))
}

impl Extension for Formatting {
    fn name(&self) -> &str {
        "formatting"
    }

    fn marks(&self) -> Vec<MarkSpec> {
        let mut marks = vec![
            MarkSpec::new(STRONG),
            MarkSpec::new(EM),
            MarkSpec::new(CODE).excludes("_").code(),
        ];
        if self.strikeout {
            marks.push(MarkSpec::new(STRIKEOUT));
        }
        marks
    }

    fn commands(&self) -> Vec<Command> {
        let mut commands = vec![
            mark_command("bold", STRONG).keys(["Mod-b"]),
            mark_command("italic", EM).keys(["Mod-i"]),
            mark_command("code", CODE).keys(["Mod-d"]),
        ];
        if self.strikeout {
            commands.push(mark_command("strikeout", STRIKEOUT));
        }
        commands.push(Command::new("clear_formatting", clear_formatting()).keys(["Mod-\\"]));
        commands
    }

    fn input_rules(&self) -> Result<Vec<InputRule>, EditorError> {
        let mut rules = vec![
            mark_rule("strong", r"\*\*([^*]+)\*\*$", 2, STRONG)?,
            mark_rule("em", r"(?:^|[^*])\*([^*]+)\*$", 1, EM)?,
            mark_rule("code", r"`([^`]+)`$", 1, CODE)?,
        ];
        if self.strikeout {
            rules.push(mark_rule("strikeout", r"~~([^~]+)~~$", 2, STRIKEOUT)?);
        }
        Ok(rules)
    }

    fn conversion_rules(&self, rules: &mut ConversionRules) {
        rules
            .read_mark("Strong", STRONG)
            .read_mark("Emph", EM)
            .read_inline("Code", |r, i| match i {
                Inline::Code(_, text) => {
                    let mark = r.schema().mark(CODE, Attrs::new())?;
                    r.with_mark(mark, |r| Ok(r.text(text)))
                }
                other => Err(super::unexpected(other.kind())),
            })
            .write_mark(STRONG, |_, c| Ok(Inline::Strong(c)))
            .write_mark(EM, |_, c| Ok(Inline::Emph(c)))
            .write_mark(CODE, |_, c| Ok(Inline::Code(Attr::default(), inline_text(&c))));

        if self.strikeout {
            rules
                .read_mark("Strikeout", STRIKEOUT)
                .write_mark(STRIKEOUT, |_, c| Ok(Inline::Strikeout(c)));
        } else {
            rules.read_inline("Strikeout", |r, i| match i {
                Inline::Strikeout(inlines) => r.read_inlines(inlines),
                other => Err(super::unexpected(other.kind())),
            });
        }
    }
}

fn mark_command(id: &str, mark_type: &'static str) -> Command {
    Command::new(id, toggle_mark(mark_type))
        .active(move |state| state.mark_active(mark_type))
        .requires([mark_type])
}

/// Add or remove `mark_type` over the selection. An empty selection
/// applies to the word around the cursor.
pub fn toggle_mark(mark_type: &'static str) -> CommandFn {
    transaction_command(move |state| {
        let selection = state.selection();
        let (from, to) = if selection.is_empty() {
            word_at(state, selection.head)?
        } else {
            (selection.from(), selection.to())
        };
        let mut tf = Transform::new(state);
        if range_has_mark(state.doc(), from, to, mark_type) {
            tf.remove_mark(from, to, Mark::new(mark_type)).ok()?;
        } else {
            let mark = state.schema().mark(mark_type, Attrs::new()).ok()?;
            tf.add_mark(from, to, mark).ok()?;
        }
        Some(tf.into_transaction())
    })
}

fn clear_formatting() -> CommandFn {
    transaction_command(|state| {
        let selection = state.selection();
        if selection.is_empty() {
            return None;
        }
        let mut found: Vec<String> = Vec::new();
        state.doc().nodes_between(selection.from(), selection.to(), &mut |node, _, _| {
            for mark in node.marks() {
                if !found.contains(&mark.mark_type) {
                    found.push(mark.mark_type.clone());
                }
            }
            true
        });
        if found.is_empty() {
            return None;
        }
        let mut tf = Transform::new(state);
        for mark_type in found {
            tf.remove_mark(selection.from(), selection.to(), Mark::new(mark_type)).ok()?;
        }
        Some(tf.into_transaction())
    })
}

/// Whether every inline node in `from..to` carries `mark_type`
pub fn range_has_mark(doc: &Node, from: usize, to: usize, mark_type: &str) -> bool {
    let mut seen = false;
    let mut all = true;
    doc.nodes_between(from, to, &mut |node, _, _| {
        if node.is_inline() {
            seen = true;
            all &= Mark::find_type(mark_type, node.marks()).is_some();
        }
        true
    });
    seen && all
}

/// The word around `pos` as a document range
pub fn word_at(state: &EditorState, pos: usize) -> Option<(usize, usize)> {
    let block = state.textblock_at(pos)?;
    let chars: Vec<char> = EditorState::textblock_text(&block.node).chars().collect();
    let offset = pos - block.content_start();
    let is_word = |c: &char| c.is_alphanumeric() || *c == '_' || *c == '\'';
    let start = chars[..offset].iter().rev().take_while(|c| is_word(c)).count();
    let end = chars[offset..].iter().take_while(|c| is_word(c)).count();
    if start + end == 0 {
        return None;
    }
    Some((pos - start, pos + end))
}

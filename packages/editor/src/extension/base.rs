//! Paragraphs, hard breaks and the keys every document needs: Enter splits,
//! Backspace and Delete join, Shift-Enter breaks the line.

use super::{unexpected, Extension, ExtensionContext};
use crate::command::{transaction_command, Command, CommandFn};
use crate::state::pipeline::KeyHandler;
use crate::state::snapshot::EditorState;
use crate::transform::Transform;
use folio_convert::ast::stringify;
use folio_convert::layout::PARAGRAPH;
use folio_convert::{Block, ConversionRules, Inline};
use folio_model::{textblock_ranges, Attrs, NodeSpec, Selection, Transaction};

pub const HARD_BREAK: &str = "hard_break";

pub struct Base;

pub fn extension(_ctx: &ExtensionContext<'_>) -> Option<Box<dyn Extension>> {
    Some(Box::new(Base))
}

impl Extension for Base {
    fn name(&self) -> &str {
        "base"
    }

    fn nodes(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::new(PARAGRAPH, "inline*").group("block"),
            NodeSpec::new(HARD_BREAK, "").group("inline").inline(),
        ]
    }

    fn commands(&self) -> Vec<Command> {
        vec![
            Command::new("paragraph", paragraph())
                .keys(["Shift-Ctrl-0"])
                .active(|state| {
                    state
                        .selected_textblocks()
                        .iter()
                        .all(|b| b.node.node_type() == PARAGRAPH)
                }),
            Command::new("select_all", select_all()).keys(["Mod-a"]),
            Command::new("hard_break", hard_break()).requires([HARD_BREAK]),
        ]
    }

    fn base_keys(&self) -> Vec<KeyHandler> {
        vec![
            KeyHandler::new("Enter", split()),
            KeyHandler::new("Backspace", backspace()),
            KeyHandler::new("Delete", delete_forward()),
            KeyHandler::new("Shift-Enter", hard_break()),
        ]
    }

    fn conversion_rules(&self, rules: &mut ConversionRules) {
        let paragraph = |r: &mut folio_convert::TreeReader<'_>, b: &Block| match b {
            Block::Para(inlines) | Block::Plain(inlines) => {
                let content = r.read_inlines(inlines)?;
                Ok(vec![r.node(PARAGRAPH, Attrs::new(), content)?])
            }
            other => Err(unexpected(other.kind())),
        };
        rules
            .read_block("Para", paragraph)
            .read_block("Plain", paragraph)
            .read_block("Div", |r, b| match b {
                Block::Div(_, blocks) => r.read_blocks(blocks),
                other => Err(unexpected(other.kind())),
            })
            .read_block("Figure", |r, b| match b {
                Block::Figure(_, _, blocks) => r.read_blocks(blocks),
                other => Err(unexpected(other.kind())),
            })
            .read_block("RawBlock", |r, b| match b {
                Block::RawBlock(_, text) => {
                    let content = r.text(text);
                    Ok(vec![r.node(PARAGRAPH, Attrs::new(), content)?])
                }
                other => Err(unexpected(other.kind())),
            })
            .read_inline("LineBreak", |r, _| Ok(vec![r.atom(HARD_BREAK, Attrs::new())?]))
            .read_inline("Span", |r, i| match i {
                Inline::Span(_, inlines) => r.read_inlines(inlines),
                other => Err(unexpected(other.kind())),
            })
            .read_inline("RawInline", |r, i| match i {
                Inline::RawInline(_, text) => Ok(r.text(text)),
                other => Ok(r.text(&stringify(std::slice::from_ref(other)))),
            })
            .read_inline("Quoted", |r, i| match i {
                Inline::Quoted(quote, inlines) => {
                    let (open, close) = quote.marks();
                    let mut content = r.text(open);
                    content.extend(r.read_inlines(inlines)?);
                    content.extend(r.text(close));
                    Ok(content)
                }
                other => Err(unexpected(other.kind())),
            });
        for kind in ["SmallCaps", "Underline", "Superscript", "Subscript", "Cite"] {
            rules.read_inline(kind, |r, i| match i.styled_content() {
                Some(inlines) => r.read_inlines(inlines),
                None => Err(unexpected(i.kind())),
            });
        }

        rules
            .write_block(PARAGRAPH, |w, n| Ok(vec![Block::Para(w.write_inlines(n.children())?)]))
            .write_inline(HARD_BREAK, |_, _| Ok(vec![Inline::LineBreak]));
    }
}

fn paragraph() -> CommandFn {
    transaction_command(|state| {
        let selection = state.selection();
        let mut tf = Transform::new(state);
        let changed = tf
            .set_block_type(selection.from(), selection.to(), PARAGRAPH, Attrs::new())
            .ok()?;
        (changed > 0).then(|| tf.into_transaction())
    })
}

fn select_all() -> CommandFn {
    transaction_command(|state| {
        let ranges = textblock_ranges(state.doc());
        let (start, _) = *ranges.first()?;
        let (_, end) = *ranges.last()?;
        let selection = Selection::new(start, end);
        (selection != state.selection()).then(|| Transaction::new().set_selection(selection))
    })
}

/// Enter: split the textblock, or add a newline inside code
fn split() -> CommandFn {
    transaction_command(|state| {
        let selection = state.selection();
        let block = state.textblock_at(selection.from())?;
        let mut tf = Transform::new(state);
        tf.delete_range(selection.from(), selection.to()).ok()?;
        if block.node.is_code() {
            tf.insert_text(selection.from(), "\n", Vec::new()).ok()?;
            tf.set_selection(Selection::cursor(selection.from() + 1));
        } else {
            let cursor = tf.split_block(selection.from()).ok()?;
            tf.set_selection(Selection::cursor(cursor));
        }
        Some(tf.into_transaction().scroll_into_view())
    })
}

fn backspace() -> CommandFn {
    transaction_command(|state| {
        let selection = state.selection();
        let mut tf = Transform::new(state);
        if !selection.is_empty() {
            tf.delete_range(selection.from(), selection.to()).ok()?;
            tf.set_selection(Selection::cursor(selection.from()));
            return Some(tf.into_transaction());
        }
        let resolved = state.resolve(selection.head)?;
        if resolved.parent().is_textblock() && resolved.parent_offset() > 0 {
            tf.replace(selection.head - 1, selection.head, Vec::new()).ok()?;
            return Some(tf.into_transaction());
        }
        let cursor = tf.join_backward(selection.head).ok()??;
        tf.set_selection(Selection::cursor(cursor));
        Some(tf.into_transaction())
    })
}

/// Delete: remove the next character, or pull the next textblock into
/// this one at the end of a block
fn delete_forward() -> CommandFn {
    transaction_command(|state| {
        let selection = state.selection();
        let mut tf = Transform::new(state);
        if !selection.is_empty() {
            tf.delete_range(selection.from(), selection.to()).ok()?;
            tf.set_selection(Selection::cursor(selection.from()));
            return Some(tf.into_transaction());
        }
        let block = state.textblock_at(selection.head)?;
        if selection.head < block.content_end() {
            tf.replace(selection.head, selection.head + 1, Vec::new()).ok()?;
            return Some(tf.into_transaction());
        }
        let next = textblock_ranges(state.doc())
            .into_iter()
            .find(|(start, _)| *start > block.end())?;
        tf.join_backward(next.0).ok()??;
        tf.set_selection(Selection::cursor(selection.head));
        Some(tf.into_transaction())
    })
}

fn hard_break() -> CommandFn {
    transaction_command(|state: &EditorState| {
        let selection = state.selection();
        let block = state.textblock_at(selection.from())?;
        let mut tf = Transform::new(state);
        tf.delete_range(selection.from(), selection.to()).ok()?;
        if block.node.is_code() {
            tf.insert_text(selection.from(), "\n", Vec::new()).ok()?;
        } else {
            let node = state
                .schema()
                .node(HARD_BREAK, Attrs::new(), Vec::new())
                .ok()?
                .with_marks(state.marks_at(selection.from()));
            tf.replace(selection.from(), selection.from(), vec![node]).ok()?;
        }
        tf.set_selection(Selection::cursor(selection.from() + 1));
        Some(tf.into_transaction())
    })
}

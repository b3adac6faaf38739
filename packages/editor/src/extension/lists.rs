//! # Lists
//!
//! Bullet and ordered lists of `list_item`s, each item holding blocks.
//!
//! Tightness is a list attribute rather than a property of its paragraphs:
//! a tight list is read from `Plain` items and written back as `Plain`, a
//! loose one as `Para`. Enter inside an item splits the item; Enter in an
//! empty item leaves the list.

use super::{unexpected, Extension, ExtensionContext};
use crate::command::{transaction_command, Command, CommandFn};
use crate::errors::EditorError;
use crate::input_rule::{wrapping_rule, InputRule};
use crate::state::pipeline::KeyHandler;
use crate::state::snapshot::EditorState;
use crate::transform::{SelectionAnchors, Transform};
use folio_convert::ast::{ListAttributes, ListNumberDelim, ListNumberStyle};
use folio_convert::layout::PARAGRAPH;
use folio_convert::{Block, ConversionRules, TreeReader};
use folio_model::{attrs, AttrSpec, Attrs, Fragment, Node, NodeSpec, Selection, Step};
use serde_json::Value;

pub const BULLET_LIST: &str = "bullet_list";
pub const ORDERED_LIST: &str = "ordered_list";
pub const LIST_ITEM: &str = "list_item";

pub struct Lists;

pub fn extension(_ctx: &ExtensionContext<'_>) -> Option<Box<dyn Extension>> {
    Some(Box::new(Lists))
}

impl Extension for Lists {
    fn name(&self) -> &str {
        "lists"
    }

    fn nodes(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::new(BULLET_LIST, "list_item+")
                .group("block")
                .attr("tight", AttrSpec::with_default(true)),
            NodeSpec::new(ORDERED_LIST, "list_item+")
                .group("block")
                .attr("order", AttrSpec::with_default(1))
                .attr("delim", AttrSpec::with_default("period"))
                .attr("tight", AttrSpec::with_default(true)),
            NodeSpec::new(LIST_ITEM, "block+"),
        ]
    }

    fn commands(&self) -> Vec<Command> {
        vec![
            list_command(BULLET_LIST).keys(["Shift-Mod-8"]),
            list_command(ORDERED_LIST).keys(["Shift-Mod-9"]),
        ]
    }

    fn base_keys(&self) -> Vec<KeyHandler> {
        vec![KeyHandler::new("Enter", split_item())]
    }

    fn input_rules(&self) -> Result<Vec<InputRule>, EditorError> {
        Ok(vec![
            wrapping_rule("bullet_list", r"^[*-] $", BULLET_LIST, Some(LIST_ITEM), |_| Some(Attrs::new()))?,
            wrapping_rule("ordered_list", r"^(\d+)\. $", ORDERED_LIST, Some(LIST_ITEM), |m| {
                let order: u64 = m.group(1)?.text.parse().ok()?;
                Some(attrs([("order", order)]))
            })?,
        ])
    }

    fn conversion_rules(&self, rules: &mut ConversionRules) {
        rules
            .read_block("BulletList", |r, b| match b {
                Block::BulletList(items) => {
                    let mut a = Attrs::new();
                    a.insert("tight".into(), Value::Bool(is_tight(items)));
                    let items = read_items(r, items)?;
                    Ok(vec![r.node(BULLET_LIST, a, items)?])
                }
                other => Err(unexpected(other.kind())),
            })
            .read_block("OrderedList", |r, b| match b {
                Block::OrderedList(ListAttributes(start, _, delim), items) => {
                    let mut a = attrs([("order", *start)]);
                    a.insert("delim".into(), Value::from(delim_name(*delim)));
                    a.insert("tight".into(), Value::Bool(is_tight(items)));
                    let items = read_items(r, items)?;
                    Ok(vec![r.node(ORDERED_LIST, a, items)?])
                }
                other => Err(unexpected(other.kind())),
            })
            .write_block(BULLET_LIST, |w, n| {
                let tight = n.attr("tight").and_then(Value::as_bool).unwrap_or(true);
                let mut items = Vec::with_capacity(n.child_count());
                for item in n.children() {
                    items.push(tighten(w.write_blocks(item.children())?, tight));
                }
                Ok(vec![Block::BulletList(items)])
            })
            .write_block(ORDERED_LIST, |w, n| {
                let tight = n.attr("tight").and_then(Value::as_bool).unwrap_or(true);
                let order = n.attr("order").and_then(Value::as_i64).unwrap_or(1);
                let delim = parse_delim(n.attr_str("delim").unwrap_or_default());
                let mut items = Vec::with_capacity(n.child_count());
                for item in n.children() {
                    items.push(tighten(w.write_blocks(item.children())?, tight));
                }
                Ok(vec![Block::OrderedList(
                    ListAttributes(order, ListNumberStyle::Decimal, delim),
                    items,
                )])
            });
    }
}

fn read_items(r: &mut TreeReader<'_>, items: &[Vec<Block>]) -> Result<Vec<Node>, folio_convert::ConversionError> {
    let mut out = Vec::with_capacity(items.len());
    for blocks in items {
        let mut content = r.read_blocks(blocks)?;
        if content.is_empty() {
            content.push(r.node(PARAGRAPH, Attrs::new(), Vec::new())?);
        }
        out.push(r.node(LIST_ITEM, Attrs::new(), content)?);
    }
    Ok(out)
}

fn is_tight(items: &[Vec<Block>]) -> bool {
    items
        .iter()
        .all(|blocks| blocks.iter().all(|b| !matches!(b, Block::Para(_))))
}

fn tighten(blocks: Vec<Block>, tight: bool) -> Vec<Block> {
    if !tight {
        return blocks;
    }
    blocks
        .into_iter()
        .map(|b| match b {
            Block::Para(inlines) => Block::Plain(inlines),
            other => other,
        })
        .collect()
}

fn delim_name(delim: ListNumberDelim) -> &'static str {
    match delim {
        ListNumberDelim::OneParen => "one_paren",
        ListNumberDelim::TwoParens => "two_parens",
        ListNumberDelim::Period | ListNumberDelim::DefaultDelim => "period",
    }
}

fn parse_delim(name: &str) -> ListNumberDelim {
    match name {
        "one_paren" => ListNumberDelim::OneParen,
        "two_parens" => ListNumberDelim::TwoParens,
        _ => ListNumberDelim::Period,
    }
}

/// The innermost list around the selection head, as `(pos before, node)`
pub fn enclosing_list(state: &EditorState) -> Option<(usize, Node)> {
    let resolved = state.resolve(state.selection().head)?;
    (1..=resolved.depth())
        .rev()
        .find(|&d| matches!(resolved.node(d).node_type(), BULLET_LIST | ORDERED_LIST))
        .map(|d| (resolved.before(d), resolved.node(d).clone()))
}

fn list_command(list_type: &'static str) -> Command {
    Command::new(list_type, toggle_list(list_type))
        .active(move |state| enclosing_list(state).map_or(false, |(_, list)| list.node_type() == list_type))
        .requires([list_type, LIST_ITEM])
}

/// Leave the list when it already has this type, switch its type when it
/// is the other kind, otherwise wrap the selected blocks in a new list
fn toggle_list(list_type: &'static str) -> CommandFn {
    transaction_command(move |state| {
        let selection = state.selection();
        let anchors = SelectionAnchors::capture(state.doc(), selection);
        let mut tf = Transform::new(state);
        match enclosing_list(state) {
            Some((pos, list)) if list.node_type() == list_type => {
                tf.unwrap(pos, true).ok()?;
            }
            Some((pos, list)) => {
                let mut a = Attrs::new();
                if let Some(tight) = list.attr("tight") {
                    a.insert("tight".into(), tight.clone());
                }
                tf.step(Step::SetNodeType {
                    pos,
                    node_type: list_type.to_string(),
                    attrs: a,
                })
                .ok()?;
            }
            None => {
                tf.wrap(selection.from(), selection.to(), list_type, Attrs::new(), Some(LIST_ITEM))
                    .ok()?;
            }
        }
        let restored = anchors.restore(tf.doc());
        tf.set_selection(restored);
        Some(tf.into_transaction())
    })
}

/// Enter in a textblock directly inside a list item
fn split_item() -> CommandFn {
    transaction_command(|state| {
        let selection = state.selection();
        if !selection.is_empty() {
            return None;
        }
        let r = state.resolve(selection.head)?;
        let text_depth = r.textblock_depth()?;
        let item_depth = text_depth.checked_sub(1)?;
        let item = r.node(item_depth).clone();
        if item.node_type() != LIST_ITEM || text_depth < 2 {
            return None;
        }
        let list_depth = item_depth - 1;
        let mut tf = Transform::new(state);

        if item.child_count() == 1 && item.content_size() == 2 {
            // Empty item: leave the list, splitting it around the item
            let list = r.node(list_depth).clone();
            let index = r.index(list_depth);
            let before: Vec<Node> = list.children()[..index].to_vec();
            let after: Vec<Node> = list.children()[index + 1..].to_vec();
            let list_pos = r.before(list_depth);
            let mut content = Vec::new();
            let mut cursor = list_pos + 1;
            if !before.is_empty() {
                let head = list.with_content(Fragment::from(before));
                cursor += head.node_size();
                content.push(head);
            }
            content.push(state.schema().node(PARAGRAPH, Attrs::new(), Vec::new()).ok()?);
            if !after.is_empty() {
                content.push(list.with_content(Fragment::from(after)));
            }
            tf.replace(list_pos, r.after(list_depth), content).ok()?;
            tf.set_selection(Selection::cursor(cursor));
            return Some(tf.into_transaction().scroll_into_view());
        }

        let offset = selection.head - r.start(item_depth);
        let left = item.with_content(item.content().cut(0, offset));
        let right_content = item.content().cut(offset, item.content_size()).to_vec();
        let right = state.schema().node(LIST_ITEM, Attrs::new(), right_content).ok()?;
        let item_pos = r.before(item_depth);
        let cursor = item_pos + left.node_size() + 2;
        tf.replace(item_pos, r.after(item_depth), vec![left, right]).ok()?;
        tf.set_selection(Selection::cursor(cursor));
        Some(tf.into_transaction().scroll_into_view())
    })
}

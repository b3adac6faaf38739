//! # Links
//!
//! `link` is a non-inclusive mark: typing at the end of a link does not
//! extend it. Mod-k removes the link under the cursor or links a selected
//! URL. With `auto_link`, a URL followed by a space is linked as it is
//! typed.

use super::{unexpected, Extension, ExtensionContext};
use crate::command::{transaction_command, Command, CommandFn};
use crate::errors::EditorError;
use crate::extension::formatting::range_has_mark;
use crate::input_rule::InputRule;
use crate::post_process::PostProcessor;
use crate::state::snapshot::{EditorState, ATOM_CHAR};
use crate::transform::Transform;
use folio_convert::{Attr, ConversionRules, Inline, Target};
use folio_model::{attrs, AttrSpec, Mark, MarkSpec, Node, Transaction};
use std::sync::Arc;

pub const LINK: &str = "link";

const SCHEMES: &[&str] = &["http://", "https://", "ftp://", "mailto:"];
const TRAILING: &[char] = &['.', ',', ';', ':', '!', '?', ')', '"', '\''];

pub struct Link {
    auto_link: bool,
}

pub fn extension(ctx: &ExtensionContext<'_>) -> Option<Box<dyn Extension>> {
    Some(Box::new(Link {
        auto_link: ctx.config.auto_link,
    }))
}

impl Extension for Link {
    fn name(&self) -> &str {
        "link"
    }

    fn marks(&self) -> Vec<MarkSpec> {
        vec![MarkSpec::new(LINK)
            .attr("href", AttrSpec::required())
            .attr("title", AttrSpec::with_default(""))
            .non_inclusive()]
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::new(LINK, toggle_link())
            .keys(["Mod-k"])
            .active(|state| link_extent(state, state.selection().head).is_some())
            .requires([LINK])]
    }

    fn input_rules(&self) -> Result<Vec<InputRule>, EditorError> {
        if !self.auto_link {
            return Ok(Vec::new());
        }
        let rule = InputRule::new("auto_link", r"(?:^|\s)((?:https?|ftp)://\S+|mailto:\S+)\s$", |tf, m| {
            let g = m.group(1)?;
            let url = g.text.trim_end_matches(TRAILING);
            let to = g.from + url.chars().count();
            if !is_url(url) || range_has_mark(tf.doc(), g.from, to, LINK) {
                return None;
            }
            let mark = tf.schema().mark(LINK, attrs([("href", url)])).ok()?;
            tf.add_mark(g.from, to, mark).ok()?;
            Some(())
        })?;
        Ok(vec![rule.requires([LINK])])
    }

    fn mark_post_processors(&self) -> Vec<Arc<dyn PostProcessor>> {
        vec![Arc::new(TrimLinkWhitespace)]
    }

    fn conversion_rules(&self, rules: &mut ConversionRules) {
        rules
            .read_inline("Link", |r, i| match i {
                Inline::Link(_, content, Target(href, title)) => {
                    let mut a = attrs([("href", href.as_str())]);
                    a.insert("title".into(), title.as_str().into());
                    let mark = r.schema().mark(LINK, a)?;
                    r.with_mark(mark, |r| r.read_inlines(content))
                }
                other => Err(unexpected(other.kind())),
            })
            .write_mark(LINK, |m: &Mark, children| {
                let href = m.attr_str("href").unwrap_or_default().to_string();
                let title = m.attr_str("title").unwrap_or_default().to_string();
                Ok(Inline::Link(Attr::default(), children, Target(href, title)))
            });
    }
}

/// Whether `text` looks like a URL the editor links on its own
pub fn is_url(text: &str) -> bool {
    SCHEMES
        .iter()
        .any(|scheme| text.len() > scheme.len() && text.starts_with(scheme))
        && !text.chars().any(char::is_whitespace)
}

/// The contiguous run of text carrying one link mark around `pos`, as
/// `(from, to, mark)`
pub fn link_extent(state: &EditorState, pos: usize) -> Option<(usize, usize, Mark)> {
    let block = state.textblock_at(pos)?;
    let start = block.content_start();
    let mut spans: Vec<(usize, usize, Option<Mark>)> = Vec::new();
    let mut at = start;
    for child in block.node.children() {
        let size = child.node_size();
        spans.push((at, at + size, Mark::find_type(LINK, child.marks()).cloned()));
        at += size;
    }
    let index = spans
        .iter()
        .position(|(from, to, mark)| mark.is_some() && *from <= pos && pos <= *to)?;
    let mark = spans[index].2.clone()?;
    let same = |i: usize| spans[i].2.as_ref() == Some(&mark);
    let mut first = index;
    while first > 0 && same(first - 1) {
        first -= 1;
    }
    let mut last = index;
    while last + 1 < spans.len() && same(last + 1) {
        last += 1;
    }
    Some((spans[first].0, spans[last].1, mark))
}

fn toggle_link() -> CommandFn {
    transaction_command(|state| {
        let selection = state.selection();
        let mut tf = Transform::new(state);
        if let Some((from, to, mark)) = link_extent(state, selection.head) {
            let (from, to) = if selection.is_empty() {
                (from, to)
            } else {
                (selection.from(), selection.to())
            };
            tf.remove_mark(from, to, mark).ok()?;
            return Some(tf.into_transaction());
        }
        if selection.is_empty() {
            return None;
        }
        let text = state.doc().text_between(selection.from(), selection.to(), "\n", "");
        let url = text.trim();
        if !is_url(url) {
            return None;
        }
        let mark = state.schema().mark(LINK, attrs([("href", url)])).ok()?;
        tf.add_mark(selection.from(), selection.to(), mark).ok()?;
        Some(tf.into_transaction())
    })
}

/// Removes links from whitespace at the edges of a link, where edits
/// can leave a non-inclusive mark behind
pub struct TrimLinkWhitespace;

impl PostProcessor for TrimLinkWhitespace {
    fn name(&self) -> &str {
        "trim_link_whitespace"
    }

    fn process(&self, state: &EditorState) -> Option<Transaction> {
        let mut strip: Vec<(usize, usize, Mark)> = Vec::new();
        state.doc().descendants(&mut |node: &Node, pos: usize, _: &Node| {
            if !node.is_textblock() {
                return true;
            }
            let mut at = pos + 1;
            let mut run: Option<(usize, Mark, String)> = None;
            for child in node.children() {
                let mark = Mark::find_type(LINK, child.marks()).cloned();
                let continues = matches!((&run, &mark), (Some((_, current, _)), Some(m)) if current == m);
                if !continues {
                    if let Some((from, current, text)) = run.take() {
                        trim_run(from, &text, current, &mut strip);
                    }
                    run = mark.map(|m| (at, m, String::new()));
                }
                if let Some((_, _, text)) = run.as_mut() {
                    match child.text() {
                        Some(t) => text.push_str(t),
                        None => text.push(ATOM_CHAR),
                    }
                }
                at += child.node_size();
            }
            if let Some((from, current, text)) = run {
                trim_run(from, &text, current, &mut strip);
            }
            false
        });
        if strip.is_empty() {
            return None;
        }
        Some(
            strip
                .into_iter()
                .fold(Transaction::new(), |tr, (from, to, mark)| tr.remove_mark(from, to, mark)),
        )
    }
}

fn trim_run(from: usize, text: &str, mark: Mark, strip: &mut Vec<(usize, usize, Mark)>) {
    let len = text.chars().count();
    let leading = text.chars().take_while(|c| c.is_whitespace()).count();
    if leading == len {
        strip.push((from, from + len, mark));
        return;
    }
    let trailing = text.chars().rev().take_while(|c| c.is_whitespace()).count();
    if leading > 0 {
        strip.push((from, from + leading, mark.clone()));
    }
    if trailing > 0 {
        strip.push((from + len - trailing, from + len, mark));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::test_support::{command, machine, markdown, text_machine, text_machine_with};
    use folio_model::Selection;

    #[test]
    fn test_link_round_trip() {
        let m = machine("See [site](https://x.org \"Home\") now");
        let out = markdown(m.state());
        assert!(out.starts_with("See [site](https://x.org \"Home\") now"), "{out}");
    }

    #[test]
    fn test_link_extent_and_removal() {
        let mut m = machine("See [the site](https://x.org) now");
        m.apply_transaction(Transaction::new().set_selection(Selection::cursor(9)));
        let (from, to, mark) = link_extent(m.state(), 9).unwrap();
        assert_eq!((from, to), (6, 14));
        assert_eq!(mark.attr_str("href"), Some("https://x.org"));
        assert!(command(LINK).is_active(m.state()));

        m.handle_key("Ctrl+K").unwrap();
        assert!(markdown(m.state()).starts_with("See the site now"));
    }

    #[test]
    fn test_link_selected_url() {
        let mut m = text_machine("Go to ftp://files.org today");
        m.apply_transaction(Transaction::new().set_selection(Selection::new(8, 23)));
        m.run_command(&command(LINK).run).unwrap();
        assert!(markdown(m.state()).starts_with("Go to <ftp://files.org> today"));

        // plain words are not links
        m.apply_transaction(Transaction::new().set_selection(Selection::new(2, 4)));
        assert!(!command(LINK).is_enabled(m.state()));
    }

    #[test]
    fn test_auto_link_on_space() {
        let config = EditorConfig {
            auto_link: true,
            ..EditorConfig::default()
        };
        let mut m = text_machine_with(&config, "see https://x.org.");
        let end = 2 + "see https://x.org.".len();
        m.apply_transaction(Transaction::new().set_selection(Selection::cursor(end)));
        m.handle_text_input(" ");
        let (from, to, _) = link_extent(m.state(), 8).unwrap();
        assert_eq!((from, to), (6, 19));
    }

    #[test]
    fn test_whitespace_edge_loses_link() {
        let state = crate::test_support::state("[site](https://x.org)");
        let mark = state.schema().mark(LINK, attrs([("href", "https://x.org")])).unwrap();
        let (state, _) = state
            .apply(&Transaction::new().insert_text(6, " ", vec![mark]))
            .unwrap();
        let tr = TrimLinkWhitespace.process(&state).unwrap();
        let (fixed, _) = state.apply(&tr).unwrap();
        assert_eq!(link_extent(&fixed, 3).map(|(f, t, _)| (f, t)), Some((2, 6)));
        assert!(TrimLinkWhitespace.process(&fixed).is_none());
    }
}

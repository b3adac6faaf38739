//! Word ranges for an external spell checker. Code blocks and text carrying
//! `code`, `math` or `link` are never offered.

use super::formatting::CODE;
use super::link::LINK;
use super::math::MATH;
use super::{Extension, ExtensionContext};
use crate::state::plugin::Plugin;
use crate::state::snapshot::EditorState;
use folio_model::Node;
use serde::Serialize;
use std::sync::Arc;

pub const SPELLING: &str = "spelling";

const SKIPPED_MARKS: &[&str] = &[CODE, MATH, LINK];

pub struct Spelling;

pub fn extension(ctx: &ExtensionContext<'_>) -> Option<Box<dyn Extension>> {
    ctx.config
        .spell_check
        .then(|| Box::new(Spelling) as Box<dyn Extension>)
}

impl Extension for Spelling {
    fn name(&self) -> &str {
        "spelling"
    }

    fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        vec![Arc::new(SpellingPlugin)]
    }
}

/// Marks the plugin set as spell-checked; surfaces look it up by key and
/// call [`checkable_words`]
pub struct SpellingPlugin;

impl Plugin for SpellingPlugin {
    fn key(&self) -> &str {
        SPELLING
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordRange {
    pub from: usize,
    pub to: usize,
    pub word: String,
}

fn skipped(node: &Node) -> bool {
    node.marks()
        .iter()
        .any(|m| SKIPPED_MARKS.contains(&m.mark_type.as_str()))
}

/// Every word the spell checker should see, in document order
pub fn checkable_words(state: &EditorState) -> Vec<WordRange> {
    let mut words = Vec::new();
    state.doc().descendants(&mut |node: &Node, pos: usize, _: &Node| {
        if node.is_code() {
            return false;
        }
        if !node.is_textblock() {
            return true;
        }
        // (start, chars) of the word being collected
        let mut current: Option<(usize, String)> = None;
        let mut at = pos + 1;
        for child in node.children() {
            match child.text().filter(|_| !skipped(child)) {
                Some(text) => {
                    for c in text.chars() {
                        if c.is_alphanumeric() || c == '\'' {
                            current.get_or_insert_with(|| (at, String::new())).1.push(c);
                        } else {
                            flush(&mut current, &mut words);
                        }
                        at += 1;
                    }
                }
                None => {
                    flush(&mut current, &mut words);
                    at += child.node_size();
                }
            }
        }
        flush(&mut current, &mut words);
        false
    });
    words
}

fn flush(current: &mut Option<(usize, String)>, words: &mut Vec<WordRange>) {
    let Some((start, raw)) = current.take() else {
        return;
    };
    let leading = raw.chars().take_while(|c| *c == '\'').count();
    let word = raw.trim_matches('\'');
    if word.is_empty() || word.chars().any(|c| c.is_numeric()) {
        return;
    }
    let from = start + leading;
    words.push(WordRange {
        from,
        to: from + word.chars().count(),
        word: word.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::test_support::machine_with;

    fn words(markdown: &str) -> Vec<String> {
        let config = EditorConfig {
            spell_check: true,
            ..EditorConfig::default()
        };
        let m = machine_with(&config, markdown);
        assert!(m.state().plugins().get(SPELLING).is_some());
        checkable_words(m.state()).into_iter().map(|w| w.word).collect()
    }

    #[test]
    fn test_skips_code_math_and_links() {
        assert_eq!(
            words("Teh `cde` and $x$ see [lnk](https://x.org) don't\n\n```\nprnt\n```\n\n# Hedaing 2nd"),
            ["Teh", "and", "see", "don't", "Hedaing"]
        );
    }

    #[test]
    fn test_word_positions() {
        let config = EditorConfig {
            spell_check: true,
            ..EditorConfig::default()
        };
        let m = machine_with(&config, "'Quoted' words");
        let ranges = checkable_words(m.state());
        assert_eq!(
            ranges[0],
            WordRange {
                from: 3,
                to: 9,
                word: "Quoted".into()
            }
        );
        assert_eq!((ranges[1].from, ranges[1].to), (11, 16));
    }
}

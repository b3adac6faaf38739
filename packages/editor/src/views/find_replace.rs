//! # Find and Replace
//!
//! A session searches the text of every textblock of the current document,
//! notes included. Matches never span two blocks. Nothing is cached between
//! calls: each operation searches the snapshot current at that moment.
//!
//! Replacements are ordinary transactions, so they are undoable and emit
//! the same events as typing.

use crate::editor::Shared;
use crate::errors::EditorError;
use crate::state::snapshot::EditorState;
use folio_model::{textblock_ranges, Node, Selection, Transaction};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FindOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
    /// Treat the term as a regular expression; `$1`-style groups are
    /// expanded in replacements
    pub regex: bool,
}

/// A document range matching the current term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FindMatch {
    pub from: usize,
    pub to: usize,
}

impl FindMatch {
    fn selection(&self) -> Selection {
        Selection::new(self.from, self.to)
    }
}

/// A compiled search term
#[derive(Debug, Clone)]
pub struct FindQuery {
    term: String,
    options: FindOptions,
    pattern: Regex,
}

impl FindQuery {
    pub fn new(term: &str, options: FindOptions) -> Result<Self, EditorError> {
        let body = if options.regex {
            term.to_string()
        } else {
            regex::escape(term)
        };
        let body = if options.whole_word {
            format!(r"\b(?:{body})\b")
        } else {
            body
        };
        let pattern = RegexBuilder::new(&body)
            .case_insensitive(!options.case_sensitive)
            .build()
            .map_err(|e| EditorError::invalid_argument(format!("invalid search pattern: {e}")))?;
        Ok(Self {
            term: term.to_string(),
            options,
            pattern,
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn options(&self) -> FindOptions {
        self.options
    }

    /// Every non-empty match in document order
    pub fn matches(&self, doc: &Node) -> Vec<FindMatch> {
        if self.term.is_empty() {
            return Vec::new();
        }
        let mut found = Vec::new();
        for (start, end) in textblock_ranges(doc) {
            let text = block_text(doc, start, end);
            for m in self.pattern.find_iter(&text).filter(|m| !m.is_empty()) {
                found.push(FindMatch {
                    from: start + char_offset(&text, m.start()),
                    to: start + char_offset(&text, m.end()),
                });
            }
        }
        found
    }

    /// The replacement text for `found`, with capture groups expanded in
    /// regex mode
    fn replacement(&self, doc: &Node, found: FindMatch, text: &str) -> String {
        if !self.options.regex {
            return text.to_string();
        }
        let Some((start, end)) = textblock_ranges(doc)
            .into_iter()
            .find(|(start, end)| *start <= found.from && found.to <= *end)
        else {
            return text.to_string();
        };
        let block = block_text(doc, start, end);
        let byte_start = byte_offset(&block, found.from - start);
        match self.pattern.captures_at(&block, byte_start) {
            Some(caps) => {
                let mut out = String::new();
                caps.expand(text, &mut out);
                out
            }
            None => text.to_string(),
        }
    }

    /// Replace one match, keeping the marks of its first character
    fn replace_in(&self, state: &EditorState, found: FindMatch, text: &str, tr: Transaction) -> Transaction {
        let replacement = self.replacement(state.doc(), found, text);
        let marks = state
            .resolve(found.from)
            .and_then(|r| r.node_after())
            .map(|n| n.marks().to_vec())
            .unwrap_or_default();
        let tr = tr.delete(found.from, found.to);
        if replacement.is_empty() {
            tr
        } else {
            tr.insert_text(found.from, replacement, marks)
        }
    }
}

fn block_text(doc: &Node, start: usize, end: usize) -> String {
    doc.text_between(start, end, "", &crate::state::snapshot::ATOM_CHAR.to_string())
}

fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices().nth(chars).map_or(text.len(), |(i, _)| i)
}

/// Find/replace over one editor. Obtained from `Editor::get_find_replace`.
pub struct FindReplace {
    shared: Rc<Shared>,
    query: Option<FindQuery>,
}

impl FindReplace {
    pub(crate) fn new(shared: Rc<Shared>) -> Self {
        Self { shared, query: None }
    }

    /// Set the term and select the first match at or after the selection.
    /// Returns whether anything matched.
    pub fn find(&mut self, term: &str, options: FindOptions) -> Result<bool, EditorError> {
        let query = FindQuery::new(term, options)?;
        let state = self.shared.state()?;
        let matches = query.matches(state.doc());
        debug!(term, matches = matches.len(), "find");
        self.query = Some(query);
        let from = state.selection().from();
        match matches.iter().find(|m| m.from >= from).or(matches.first()) {
            Some(found) => self.select(*found),
            None => Ok(false),
        }
    }

    pub fn matches(&self) -> Result<Vec<FindMatch>, EditorError> {
        let state = self.shared.state()?;
        Ok(self.query.as_ref().map(|q| q.matches(state.doc())).unwrap_or_default())
    }

    pub fn match_count(&self) -> Result<usize, EditorError> {
        self.matches().map(|m| m.len())
    }

    pub fn select_first(&self) -> Result<bool, EditorError> {
        match self.matches()?.first() {
            Some(found) => self.select(*found),
            None => Ok(false),
        }
    }

    /// Select the first match after the selection, wrapping to the top
    pub fn select_next(&self) -> Result<bool, EditorError> {
        let selection = self.shared.state()?.selection();
        let matches = self.matches()?;
        let next = matches
            .iter()
            .find(|m| m.from >= selection.to() && m.selection() != selection)
            .or(matches.first());
        match next {
            Some(found) => self.select(*found),
            None => Ok(false),
        }
    }

    /// Select the last match before the selection, wrapping to the bottom
    pub fn select_previous(&self) -> Result<bool, EditorError> {
        let selection = self.shared.state()?.selection();
        let matches = self.matches()?;
        let previous = matches
            .iter()
            .rev()
            .find(|m| m.to <= selection.from() && m.selection() != selection)
            .or(matches.last());
        match previous {
            Some(found) => self.select(*found),
            None => Ok(false),
        }
    }

    /// Replace the selected match and move on to the next one. When the
    /// selection is not a match, only moves to the next match.
    pub fn replace(&self, text: &str) -> Result<bool, EditorError> {
        let Some(query) = &self.query else {
            return Ok(false);
        };
        let state = self.shared.state()?;
        let selection = state.selection();
        let Some(found) = query.matches(state.doc()).into_iter().find(|m| m.selection() == selection) else {
            self.select_next()?;
            return Ok(false);
        };
        let tr = query.replace_in(&state, found, text, Transaction::new()).scroll_into_view();
        if !self.shared.dispatch(tr)? {
            return Ok(false);
        }
        self.select_next()?;
        Ok(true)
    }

    /// Replace every match in one undoable step. Returns how many were
    /// replaced.
    pub fn replace_all(&self, text: &str) -> Result<usize, EditorError> {
        let Some(query) = &self.query else {
            return Ok(0);
        };
        let state = self.shared.state()?;
        let matches = query.matches(state.doc());
        if matches.is_empty() {
            return Ok(0);
        }
        // last to first, so earlier positions stay valid
        let tr = matches
            .iter()
            .rev()
            .fold(Transaction::new(), |tr, found| query.replace_in(&state, *found, text, tr));
        let replaced = if self.shared.dispatch(tr)? { matches.len() } else { 0 };
        debug!(replaced, "replace all");
        Ok(replaced)
    }

    /// Forget the term. The selection stays where it is.
    pub fn clear(&mut self) {
        self.query = None;
    }

    pub fn query(&self) -> Option<&FindQuery> {
        self.query.as_ref()
    }

    fn select(&self, found: FindMatch) -> Result<bool, EditorError> {
        self.shared
            .dispatch(Transaction::new().set_selection(found.selection()).scroll_into_view())
    }
}

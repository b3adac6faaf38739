//! Bracket pairing inside code blocks and chunks
//!
//! Typing an opening bracket inserts its partner, typing a closing bracket
//! in front of the same bracket steps over it, and Backspace between an
//! empty pair removes both. [`matching_brace`] gives a surface what to
//! highlight.

use super::{Extension, ExtensionContext};
use crate::state::plugin::{Dispatch, Plugin};
use crate::state::snapshot::{EditorState, TextblockRef};
use folio_model::{Selection, Transaction};
use std::sync::Arc;

pub const BRACE_MATCH: &str = "brace_match";

const PAIRS: &[(char, char)] = &[('(', ')'), ('[', ']'), ('{', '}')];

pub struct BraceMatch;

pub fn extension(ctx: &ExtensionContext<'_>) -> Option<Box<dyn Extension>> {
    ctx.config
        .brace_matching
        .then(|| Box::new(BraceMatch) as Box<dyn Extension>)
}

impl Extension for BraceMatch {
    fn name(&self) -> &str {
        "brace_match"
    }

    fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        vec![Arc::new(BracePairing)]
    }
}

fn closer_of(c: char) -> Option<char> {
    PAIRS.iter().find(|(open, _)| *open == c).map(|(_, close)| *close)
}

fn opener_of(c: char) -> Option<char> {
    PAIRS.iter().find(|(_, close)| *close == c).map(|(open, _)| *open)
}

/// The code textblock holding an empty selection, with its characters and
/// the cursor offset into them
fn code_context(state: &EditorState) -> Option<(TextblockRef, Vec<char>, usize)> {
    let selection = state.selection();
    if !selection.is_empty() {
        return None;
    }
    let block = state
        .textblock_at(selection.head)
        .filter(|b| b.node.is_code())?;
    let chars: Vec<char> = block.node.text_content().chars().collect();
    let offset = selection.head - block.content_start();
    Some((block, chars, offset))
}

pub struct BracePairing;

impl Plugin for BracePairing {
    fn key(&self) -> &str {
        BRACE_MATCH
    }

    fn handle_text_input(&self, state: &EditorState, text: &str, dispatch: Dispatch<'_>) -> bool {
        let mut typed = text.chars();
        let (Some(c), None) = (typed.next(), typed.next()) else {
            return false;
        };
        let Some((_, chars, offset)) = code_context(state) else {
            return false;
        };
        let head = state.selection().head;

        if opener_of(c).is_some() && chars.get(offset) == Some(&c) {
            dispatch(Transaction::new().set_selection(Selection::cursor(head + 1)));
            return true;
        }
        let Some(close) = closer_of(c) else {
            return false;
        };
        let pair = format!("{c}{close}");
        dispatch(
            Transaction::new()
                .insert_text(head, &pair, Vec::new())
                .set_selection(Selection::cursor(head + 1))
                .ui_event("input"),
        );
        true
    }

    fn handle_key(&self, state: &EditorState, chord: &str, dispatch: Dispatch<'_>) -> bool {
        if chord != "Backspace" {
            return false;
        }
        let Some((_, chars, offset)) = code_context(state) else {
            return false;
        };
        let (Some(&before), Some(&after)) = (offset.checked_sub(1).and_then(|i| chars.get(i)), chars.get(offset)) else {
            return false;
        };
        if closer_of(before) != Some(after) {
            return false;
        }
        let head = state.selection().head;
        dispatch(Transaction::new().delete(head - 1, head + 1));
        true
    }
}

/// Positions of the bracket next to the cursor and its partner, in
/// document order. The character after the cursor is tried before the one
/// before it.
pub fn matching_brace(state: &EditorState) -> Option<(usize, usize)> {
    let (block, chars, offset) = code_context(state)?;
    let start = block.content_start();
    let candidates = [Some(offset), offset.checked_sub(1)];
    candidates.into_iter().flatten().find_map(|at| {
        let c = *chars.get(at)?;
        let partner = if let Some(close) = closer_of(c) {
            scan_forward(&chars, at, c, close)?
        } else if let Some(open) = opener_of(c) {
            scan_backward(&chars, at, open, c)?
        } else {
            return None;
        };
        Some((start + at.min(partner), start + at.max(partner)))
    })
}

fn scan_forward(chars: &[char], from: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &c) in chars.iter().enumerate().skip(from) {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

fn scan_backward(chars: &[char], from: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..=from).rev() {
        let c = chars[i];
        if c == close {
            depth += 1;
        } else if c == open {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

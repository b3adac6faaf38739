//! Editing location: where the user was, kept across a full document
//! replacement such as a reload after an external edit.
//!
//! Positions are stored as (textblock ordinal, offset) so they land on the
//! same text even when the blocks above it changed size. Restoring against
//! a tree of a different shape clamps instead of failing.

use crate::state::snapshot::EditorState;
use crate::surface::VisualSurface;
use crate::transform::{SelectionAnchors, TextAnchor};
use folio_model::{Node, Selection, Transaction};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditingLocation {
    selection: SelectionAnchors,
    /// Text shown at the top of the viewport
    top: Option<TextAnchor>,
    scroll_top: f64,
}

impl EditingLocation {
    pub fn capture(state: &EditorState, surface: &dyn VisualSurface) -> Self {
        let scroll_top = surface.scroll_top();
        let top = surface
            .pos_at_offset(scroll_top)
            .and_then(|pos| TextAnchor::capture(state.doc(), pos));
        Self {
            selection: SelectionAnchors::capture(state.doc(), state.selection()),
            top,
            scroll_top,
        }
    }

    /// The captured selection, placed in `doc`
    pub fn selection_in(&self, doc: &Node) -> Selection {
        self.selection.restore(doc)
    }

    /// A history-free transaction moving the selection back
    pub fn selection_transaction(&self, doc: &Node) -> Transaction {
        Transaction::new()
            .set_selection(self.selection_in(doc))
            .without_history()
    }

    /// Scroll the surface back. The surface must already show `doc`.
    pub fn restore_scroll(&self, doc: &Node, surface: &mut dyn VisualSurface) {
        let anchored = self
            .top
            .and_then(|top| surface.offset_at_pos(top.restore(doc)));
        surface.set_scroll_top(anchored.unwrap_or(self.scroll_top));
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }
}

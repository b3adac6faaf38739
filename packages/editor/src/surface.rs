//! # Visual Surface
//!
//! The widget that renders the document and takes user input lives outside
//! the core. The editor drives it through [`VisualSurface`]; the surface
//! talks back through `Editor::dispatch`, `Editor::handle_key` and
//! `Editor::handle_text_input`.
//!
//! [`HeadlessSurface`] lays every textblock out as one line of fixed
//! height. It backs the CLI and tests, and shows what a real surface has to
//! answer.

use crate::state::snapshot::EditorState;
use crate::theme::Theme;
use folio_model::textblock_ranges;
use std::cell::RefCell;
use std::rc::Rc;

pub trait VisualSurface {
    /// Show a snapshot. Called once when the editor is created and after
    /// every committed change.
    fn render(&mut self, state: &EditorState);

    fn focus(&mut self);

    fn blur(&mut self);

    fn has_focus(&self) -> bool;

    /// Vertical scroll offset in surface units
    fn scroll_top(&self) -> f64;

    fn set_scroll_top(&mut self, top: f64);

    /// Vertical offset of a document position. `None` when the position is
    /// not laid out.
    fn offset_at_pos(&self, pos: usize) -> Option<f64>;

    /// Document position shown at a vertical offset
    fn pos_at_offset(&self, offset: f64) -> Option<usize>;

    /// Scroll just enough to show `pos`
    fn scroll_into_view(&mut self, pos: usize) {
        if let Some(offset) = self.offset_at_pos(pos) {
            self.set_scroll_top(offset);
        }
    }

    /// The host resized the surface
    fn resize(&mut self) {}

    fn apply_theme(&mut self, _theme: &Theme) {}

    /// Release whatever the surface holds. Called once.
    fn destroy(&mut self) {}
}

pub const LINE_HEIGHT: f64 = 20.0;
pub const DEFAULT_VIEWPORT_HEIGHT: f64 = 400.0;

#[derive(Debug)]
struct HeadlessState {
    /// (content start, content end) of each textblock, in document order
    lines: Vec<(usize, usize)>,
    viewport_height: f64,
    scroll_top: f64,
    focused: bool,
    theme: Option<Theme>,
    renders: usize,
    resizes: usize,
    destroyed: bool,
}

/// A surface without a display. Clones share one layout, so a caller can
/// keep a handle to inspect what the editor did to it.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    inner: Rc<RefCell<HeadlessState>>,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::with_viewport(DEFAULT_VIEWPORT_HEIGHT)
    }
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_viewport(viewport_height: f64) -> Self {
        Self {
            inner: Rc::new(RefCell::new(HeadlessState {
                lines: Vec::new(),
                viewport_height,
                scroll_top: 0.0,
                focused: false,
                theme: None,
                renders: 0,
                resizes: 0,
                destroyed: false,
            })),
        }
    }

    /// Change the viewport height, as a host window resize would
    pub fn set_viewport_height(&self, height: f64) {
        self.inner.borrow_mut().viewport_height = height.max(0.0);
    }

    pub fn line_count(&self) -> usize {
        self.inner.borrow().lines.len()
    }

    pub fn theme(&self) -> Option<Theme> {
        self.inner.borrow().theme.clone()
    }

    pub fn renders(&self) -> usize {
        self.inner.borrow().renders
    }

    pub fn resizes(&self) -> usize {
        self.inner.borrow().resizes
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.borrow().destroyed
    }
}

impl HeadlessState {
    fn max_scroll(&self) -> f64 {
        (self.lines.len() as f64 * LINE_HEIGHT - self.viewport_height).max(0.0)
    }

    fn line_of(&self, pos: usize) -> Option<usize> {
        self.lines.iter().position(|(_, end)| pos <= *end)
    }
}

impl VisualSurface for HeadlessSurface {
    fn render(&mut self, state: &EditorState) {
        let mut inner = self.inner.borrow_mut();
        inner.lines = textblock_ranges(state.doc());
        inner.scroll_top = inner.scroll_top.min(inner.max_scroll());
        inner.renders += 1;
    }

    fn focus(&mut self) {
        self.inner.borrow_mut().focused = true;
    }

    fn blur(&mut self) {
        self.inner.borrow_mut().focused = false;
    }

    fn has_focus(&self) -> bool {
        self.inner.borrow().focused
    }

    fn scroll_top(&self) -> f64 {
        self.inner.borrow().scroll_top
    }

    fn set_scroll_top(&mut self, top: f64) {
        let mut inner = self.inner.borrow_mut();
        inner.scroll_top = top.clamp(0.0, inner.max_scroll());
    }

    fn offset_at_pos(&self, pos: usize) -> Option<f64> {
        let inner = self.inner.borrow();
        inner.line_of(pos).map(|line| line as f64 * LINE_HEIGHT)
    }

    fn pos_at_offset(&self, offset: f64) -> Option<usize> {
        let inner = self.inner.borrow();
        if inner.lines.is_empty() {
            return None;
        }
        let line = ((offset.max(0.0) / LINE_HEIGHT) as usize).min(inner.lines.len() - 1);
        inner.lines.get(line).map(|(start, _)| *start)
    }

    fn scroll_into_view(&mut self, pos: usize) {
        let Some(offset) = self.offset_at_pos(pos) else {
            return;
        };
        let (top, viewport) = {
            let inner = self.inner.borrow();
            (inner.scroll_top, inner.viewport_height)
        };
        if offset < top {
            self.set_scroll_top(offset);
        } else if offset + LINE_HEIGHT > top + viewport {
            self.set_scroll_top(offset + LINE_HEIGHT - viewport);
        }
    }

    fn resize(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.resizes += 1;
        inner.scroll_top = inner.scroll_top.min(inner.max_scroll());
    }

    fn apply_theme(&mut self, theme: &Theme) {
        self.inner.borrow_mut().theme = Some(theme.clone());
    }

    fn destroy(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.destroyed = true;
        inner.focused = false;
    }
}

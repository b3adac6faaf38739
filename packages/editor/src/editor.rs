//! # Editor Facade
//!
//! One [`Editor`] is one editing session: the assembled grammar, the state
//! machine, the surface it drives and the event bus. There is no global
//! state, so any number of editors can live side by side.
//!
//! ## Lifecycle
//!
//! ```text
//! Editor::create ──> Ready ──destroy()──> Destroyed
//! ```
//!
//! Every operation on a destroyed editor fails with
//! [`EditorError::Destroyed`].
//!
//! ## Conversions
//!
//! `set_markdown` and `get_markdown` await the conversion engine. No borrow
//! of the session is held across an await. Each `set_markdown` (and each
//! `replace_document`) takes a new load generation; a conversion that
//! resolves after a newer load started is dropped and reports `false`.
//!
//! ## Notifications
//!
//! Events are emitted after the session borrow is released, so handlers may
//! call back into the editor.

use crate::assembler::Assembly;
use crate::command::Command;
use crate::config::EditorConfig;
use crate::errors::EditorError;
use crate::events::{EditorEvent, EventBus, EventName, Subscription};
use crate::fixup::{run_fixups, FixupKind};
use crate::keymap::{normalize_chord, KeyBindings};
use crate::state::machine::{EditingStateMachine, Transition};
use crate::state::snapshot::EditorState;
use crate::surface::VisualSurface;
use crate::theme::Theme;
use crate::views::commands::{self, EditorCommand};
use crate::views::find_replace::FindReplace;
use crate::views::location::EditingLocation;
use crate::views::outline::{outline, Outline};
use folio_convert::layout::{NOTES, REF_ATTR, TITLE_ATTR};
use folio_convert::{ConversionEngine, FormatSpec, MarkupConverter, WriterOptions};
use folio_model::{nearest_text_pos, Node, Selection, Transaction};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, instrument};

struct Session {
    config: EditorConfig,
    assembly: Assembly,
    converter: MarkupConverter,
    machine: EditingStateMachine,
    bindings: KeyBindings,
    surface: Box<dyn VisualSurface>,
    theme: Option<Theme>,
    outline: Outline,
}

impl Session {
    fn state(&self) -> &EditorState {
        self.machine.state()
    }

    /// Show the outcome of a transition and work out what to announce
    fn settle(&mut self, transition: Transition) -> Vec<EditorEvent> {
        if !transition.applied {
            return Vec::new();
        }
        let state = self.machine.state().clone();
        self.surface.render(&state);
        if transition.scroll_into_view {
            self.surface.scroll_into_view(state.selection().head);
        }

        let mut events = Vec::new();
        if transition.doc_changed {
            events.push(EditorEvent::Update);
            let next = outline(&state);
            if next != self.outline {
                self.outline = next.clone();
                events.push(EditorEvent::OutlineChange(next));
            } else {
                // keep positions current
                self.outline = next;
            }
        }
        events.push(EditorEvent::SelectionChange(state.selection()));
        events
    }

    /// Install a new document outside any transaction. History does not
    /// survive this.
    fn install(&mut self, doc: Node, emit_update: bool) -> Vec<EditorEvent> {
        let changed = doc != *self.state().doc();
        let state = self.assembly.state(doc, self.bindings.clone());
        let state = run_fixups(&self.assembly.fixups, FixupKind::Load, state);
        self.machine.replace_state(state);

        let state = self.machine.state().clone();
        self.surface.render(&state);
        self.outline = outline(&state);

        let mut events = Vec::new();
        if emit_update && changed {
            events.push(EditorEvent::Update);
        }
        events.push(EditorEvent::OutlineChange(self.outline.clone()));
        events.push(EditorEvent::SelectionChange(state.selection()));
        events
    }
}

/// State shared by an [`Editor`] and the handles it gives out
pub(crate) struct Shared {
    session: RefCell<Option<Session>>,
    events: Rc<EventBus>,
    generation: Cell<u64>,
}

impl Shared {
    /// Run `f` against the live session, then emit what it produced
    fn with_session<T>(
        &self,
        f: impl FnOnce(&mut Session) -> (T, Vec<EditorEvent>),
    ) -> Result<T, EditorError> {
        let (value, events) = {
            let mut slot = self.session.borrow_mut();
            let session = slot.as_mut().ok_or(EditorError::Destroyed)?;
            f(session)
        };
        self.events.emit_all(events);
        Ok(value)
    }

    fn read<T>(&self, f: impl FnOnce(&Session) -> T) -> Result<T, EditorError> {
        let slot = self.session.borrow();
        slot.as_ref().map(f).ok_or(EditorError::Destroyed)
    }

    fn transition(&self, f: impl FnOnce(&mut EditingStateMachine) -> Option<Transition>) -> Result<bool, EditorError> {
        self.with_session(|session| match f(&mut session.machine) {
            Some(transition) => (transition.applied, session.settle(transition)),
            None => (false, Vec::new()),
        })
    }

    pub(crate) fn state(&self) -> Result<EditorState, EditorError> {
        self.read(|session| session.state().clone())
    }

    pub(crate) fn dispatch(&self, tr: Transaction) -> Result<bool, EditorError> {
        self.transition(|machine| Some(machine.apply_transaction(tr)))
    }

    pub(crate) fn run_command(&self, command: &Command) -> Result<bool, EditorError> {
        let run = command.run.clone();
        self.with_session(|session| match session.machine.run_command(&run) {
            Some(transition) => (true, session.settle(transition)),
            None => (false, Vec::new()),
        })
    }

    pub(crate) fn focus(&self) -> Result<(), EditorError> {
        self.with_session(|session| {
            session.surface.focus();
            ((), Vec::new())
        })
    }

    fn next_generation(&self) -> u64 {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        generation
    }
}

/// A rich-document editing session. Cloning gives another handle to the
/// same session.
#[derive(Clone)]
pub struct Editor {
    shared: Rc<Shared>,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let format = self.shared.read(|s| s.assembly.format.name.clone()).ok();
        f.debug_struct("Editor")
            .field("format", &format)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl Editor {
    /// Resolve the configured format through `engine`, assemble the grammar
    /// and start with an empty document shown on `surface`
    #[instrument(skip_all, fields(format = %config.format, engine = engine.name()))]
    pub async fn create(
        config: EditorConfig,
        engine: Arc<dyn ConversionEngine>,
        mut surface: Box<dyn VisualSurface>,
    ) -> Result<Editor, EditorError> {
        let capabilities = engine
            .resolve_format(&config.format)
            .await
            .map_err(|e| EditorError::configuration(format!("cannot resolve format '{}': {}", config.format, e)))?;
        let assembly = Assembly::build(FormatSpec::new(&config.format, capabilities), &config)?;
        let bindings = assembly.key_bindings(&config.keybindings)?;
        let converter = MarkupConverter::new(
            engine,
            assembly.schema.clone(),
            assembly.rules.clone(),
            assembly.format.clone(),
        );

        let doc = EditorState::empty_doc(&assembly.schema)?;
        let state = assembly.state(doc, bindings.clone());
        let machine = EditingStateMachine::new(state, config.history_depth);
        surface.render(machine.state());
        if config.auto_focus {
            surface.focus();
        }
        let initial_outline = outline(machine.state());

        info!(
            extensions = assembly.extensions.len(),
            commands = assembly.commands.len(),
            "editor created"
        );
        let session = Session {
            config,
            assembly,
            converter,
            machine,
            bindings,
            surface,
            theme: None,
            outline: initial_outline,
        };
        Ok(Editor {
            shared: Rc::new(Shared {
                session: RefCell::new(Some(session)),
                events: EventBus::new(),
                generation: Cell::new(0),
            }),
        })
    }

    /// Tear the session down. Later calls are no-ops.
    pub fn destroy(&self) {
        let session = self.shared.session.borrow_mut().take();
        if let Some(mut session) = session {
            session.surface.destroy();
            self.shared.events.clear();
            info!("editor destroyed");
        }
    }

    /// True once [`Editor::destroy`] has run
    pub fn is_destroyed(&self) -> bool {
        self.shared.session.borrow().is_none()
    }

    /// Replace the document with `markup`. Returns `Ok(false)` when a newer
    /// load started while this one was converting; the result is dropped.
    /// On a conversion error the current document is kept.
    pub async fn set_markdown(&self, markup: &str, emit_update: bool) -> Result<bool, EditorError> {
        let generation = self.shared.next_generation();
        let converter = self.shared.read(|s| s.converter.clone())?;
        let result = converter.to_tree(markup).await;

        if self.shared.generation.get() != generation {
            debug!(generation, latest = self.shared.generation.get(), "superseded load dropped");
            return Ok(false);
        }
        let doc = result?;
        self.shared.with_session(|session| ((), session.install(doc, emit_update)))?;
        info!(bytes = markup.len(), "document loaded");
        Ok(true)
    }

    /// Install an already built tree. Supersedes any load still converting.
    pub fn replace_document(&self, doc: Node, emit_update: bool) -> Result<(), EditorError> {
        self.shared.next_generation();
        let schema = self.shared.read(|s| s.assembly.schema.clone())?;
        schema
            .check(&doc)
            .map_err(|e| EditorError::invalid_argument(format!("document does not fit the grammar: {e}")))?;
        self.shared.with_session(|session| ((), session.install(doc, emit_update)))
    }

    /// Serialize the current document in the configured format
    pub async fn get_markdown(&self, options: &WriterOptions) -> Result<String, EditorError> {
        let (converter, doc) = self
            .shared
            .read(|s| (s.converter.clone(), s.state().doc().clone()))?;
        Ok(converter.from_tree(&doc, options).await?)
    }

    /// Document title, empty when unset
    pub fn get_title(&self) -> Result<String, EditorError> {
        self.shared
            .read(|s| s.state().doc().attr_str(TITLE_ATTR).unwrap_or_default().to_string())
    }

    /// Set the document title through an undoable transaction
    pub fn set_title(&self, title: &str) -> Result<bool, EditorError> {
        let doc_attrs = self.shared.read(|s| s.state().doc().attrs().clone())?;
        let mut attrs = doc_attrs;
        attrs.insert(TITLE_ATTR.to_string(), Value::from(title));
        self.dispatch(Transaction::new().set_doc_attrs(attrs))
    }

    /// Current selection
    pub fn get_selection(&self) -> Result<Selection, EditorError> {
        self.shared.read(|s| s.state().selection())
    }

    /// Snapshot of the current editor state
    pub fn get_state(&self) -> Result<EditorState, EditorError> {
        self.shared.state()
    }

    /// Selection and scroll position, for [`Editor::restore_editing_location`]
    pub fn get_editing_location(&self) -> Result<EditingLocation, EditorError> {
        self.shared
            .read(|s| EditingLocation::capture(s.state(), s.surface.as_ref()))
    }

    /// Best effort: positions that no longer exist are clamped
    pub fn restore_editing_location(&self, location: &EditingLocation) -> Result<(), EditorError> {
        let tr = self
            .shared
            .read(|s| location.selection_transaction(s.state().doc()))?;
        self.dispatch(tr)?;
        self.shared.with_session(|session| {
            let doc = session.state().doc().clone();
            location.restore_scroll(&doc, session.surface.as_mut());
            ((), Vec::new())
        })
    }

    /// Heading outline as of the last document change
    pub fn get_outline(&self) -> Result<Outline, EditorError> {
        self.shared.read(|s| s.outline.clone())
    }

    /// Find and replace bound to this editor
    pub fn get_find_replace(&self) -> Result<FindReplace, EditorError> {
        self.shared.read(|_| ())?;
        Ok(FindReplace::new(self.shared.clone()))
    }

    /// Give the surface keyboard focus
    pub fn focus(&self) -> Result<(), EditorError> {
        self.shared.focus()
    }

    /// Take keyboard focus away from the surface
    pub fn blur(&self) -> Result<(), EditorError> {
        self.shared.with_session(|session| {
            session.surface.blur();
            ((), Vec::new())
        })
    }

    /// Whether the surface holds keyboard focus
    pub fn has_focus(&self) -> Result<bool, EditorError> {
        self.shared.read(|s| s.surface.has_focus())
    }

    /// Move the cursor to a target and scroll it into view. Targets are
    /// `heading:<id>`, `note:<ref>` or `pos:<n>`. Returns `Ok(false)` when
    /// the target does not exist in the current document.
    pub fn navigate(&self, target: &str) -> Result<bool, EditorError> {
        let target = NavigationTarget::parse(target)?;
        let pos = self.shared.read(|s| target.locate(s))?;
        let Some(pos) = pos else {
            debug!(?target, "navigation target not found");
            return Ok(false);
        };
        let selection = self
            .shared
            .read(|s| Selection::cursor(nearest_text_pos(s.state().doc(), pos)))?;
        self.dispatch(Transaction::new().set_selection(selection).scroll_into_view())
    }

    /// Tell the surface it changed size, then run resize fixups
    pub fn resize(&self) -> Result<(), EditorError> {
        self.shared.with_session(|session| {
            session.surface.resize();
            let mut events = Vec::new();
            let fixups: Vec<_> = session
                .assembly
                .fixups
                .iter()
                .filter(|f| f.kind() == FixupKind::Resize)
                .cloned()
                .collect();
            for fixup in fixups {
                if let Some(tr) = fixup.fix(session.state()) {
                    let transition = session.machine.apply_transaction(tr.without_history());
                    events.extend(session.settle(transition));
                }
            }
            ((), events)
        })
    }

    /// Every command the active extensions provide, with its bound chords
    pub fn commands(&self) -> Result<Vec<EditorCommand>, EditorError> {
        self.shared
            .read(|s| commands::list(&self.shared, &s.assembly.commands, &s.bindings))
    }

    /// Hand `theme` to the surface and remember it
    pub fn apply_theme(&self, theme: Theme) -> Result<(), EditorError> {
        self.shared.with_session(|session| {
            session.surface.apply_theme(&theme);
            session.theme = Some(theme);
            ((), Vec::new())
        })
    }

    /// Theme last applied, if any
    pub fn theme(&self) -> Result<Option<Theme>, EditorError> {
        self.shared.read(|s| s.theme.clone())
    }

    /// Replace the caller key bindings. Document, selection and history are
    /// kept.
    pub fn set_keybindings(&self, keybindings: BTreeMap<String, Vec<String>>) -> Result<(), EditorError> {
        self.shared.with_session(|session| {
            let bindings = match session.assembly.key_bindings(&keybindings) {
                Ok(bindings) => bindings,
                Err(e) => return (Err(e), Vec::new()),
            };
            session.machine.reconfigure(session.assembly.plugin_set(bindings.clone()));
            session.bindings = bindings;
            session.config.keybindings = keybindings;
            (Ok(()), Vec::new())
        })?
    }

    /// Format the editor reads and writes
    pub fn get_format(&self) -> Result<FormatSpec, EditorError> {
        self.shared.read(|s| s.assembly.format.clone())
    }

    /// Configuration the session runs with
    pub fn config(&self) -> Result<EditorConfig, EditorError> {
        self.shared.read(|s| s.config.clone())
    }

    /// Subscribe to `update`, `outlineChange` or `selectionChange`
    pub fn subscribe(
        &self,
        event: &str,
        handler: impl Fn(&EditorEvent) + 'static,
    ) -> Result<Subscription, EditorError> {
        let name: EventName = event.parse()?;
        self.shared.read(|_| ())?;
        Ok(self.shared.events.subscribe(name, handler))
    }

    /// Apply a transaction from the surface or the caller. Returns whether
    /// it was applied; a rejected transaction changes nothing.
    pub fn dispatch(&self, tr: Transaction) -> Result<bool, EditorError> {
        self.shared.dispatch(tr)
    }

    /// Offer a key chord to the plugins. Returns whether one handled it.
    pub fn handle_key(&self, chord: &str) -> Result<bool, EditorError> {
        let mac = self.shared.read(|s| s.config.mac_keys)?;
        let chord = normalize_chord(chord, mac)?;
        self.shared.with_session(|session| match session.machine.handle_key(&chord) {
            Some(transition) => (true, session.settle(transition)),
            None => (false, Vec::new()),
        })
    }

    /// Insert typed text at the selection, running input rules
    pub fn handle_text_input(&self, text: &str) -> Result<bool, EditorError> {
        self.shared
            .transition(|machine| Some(machine.handle_text_input(text)))
    }

    /// Undo the last change. Returns whether there was one.
    pub fn undo(&self) -> Result<bool, EditorError> {
        self.shared.transition(|machine| Some(machine.undo()))
    }

    /// Redo the last undone change. Returns whether there was one.
    pub fn redo(&self) -> Result<bool, EditorError> {
        self.shared.transition(|machine| Some(machine.redo()))
    }

    /// Allow or forbid document changes. Selection changes always pass.
    pub fn set_editable(&self, editable: bool) -> Result<(), EditorError> {
        self.shared.read(|s| s.assembly.editability().set(editable))
    }

    /// Consult `predicate` on every edit, on top of [`Editor::set_editable`]
    pub fn set_editable_predicate(
        &self,
        predicate: Option<Arc<dyn Fn() -> bool + Send + Sync>>,
    ) -> Result<(), EditorError> {
        self.shared.read(|s| s.assembly.editability().set_predicate(predicate))
    }

    /// Whether document changes are currently allowed
    pub fn is_editable(&self) -> Result<bool, EditorError> {
        self.shared.read(|s| s.assembly.editability().is_editable())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NavigationTarget {
    Heading(String),
    Note(String),
    Pos(usize),
}

impl NavigationTarget {
    fn parse(target: &str) -> Result<Self, EditorError> {
        let invalid = || {
            EditorError::invalid_argument(format!(
                "navigation target '{target}' is not heading:<id>, note:<ref> or pos:<n>"
            ))
        };
        let (kind, value) = target.split_once(':').ok_or_else(invalid)?;
        if value.is_empty() {
            return Err(invalid());
        }
        match kind {
            "heading" => Ok(Self::Heading(value.to_string())),
            "note" => Ok(Self::Note(value.to_string())),
            "pos" => value.parse().map(Self::Pos).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }

    /// Position to put the cursor near
    fn locate(&self, session: &Session) -> Option<usize> {
        let doc = session.state().doc();
        match self {
            Self::Heading(id) => session
                .outline
                .iter()
                .find(|entry| entry.id == *id)
                .map(|entry| entry.pos + 1),
            Self::Note(reference) => {
                let notes_index = doc.child_count().checked_sub(1)?;
                let notes = doc.child(notes_index).filter(|n| n.node_type() == NOTES)?;
                let notes_start = doc.content_size() - notes.node_size() + 1;
                let mut at = notes_start;
                for note in notes.children() {
                    if note.attr_str(REF_ATTR) == Some(reference.as_str()) {
                        return Some(at + 1);
                    }
                    at += note.node_size();
                }
                None
            }
            Self::Pos(pos) => (*pos <= doc.content_size()).then_some(*pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_navigation_targets() {
        assert_eq!(
            NavigationTarget::parse("heading:intro").unwrap(),
            NavigationTarget::Heading("intro".into())
        );
        assert_eq!(
            NavigationTarget::parse("note:note-2").unwrap(),
            NavigationTarget::Note("note-2".into())
        );
        assert_eq!(NavigationTarget::parse("pos:12").unwrap(), NavigationTarget::Pos(12));
        for bad in ["intro", "heading:", "pos:x", "line:3"] {
            assert!(
                matches!(NavigationTarget::parse(bad), Err(EditorError::InvalidArgument(_))),
                "{bad}"
            );
        }
    }
}

//! Integration tests for the editor facade

use async_trait::async_trait;
use folio_convert::{
    ConversionEngine, ConversionError, FormatCapabilities, FormatSpec, MarkdownEngine, Pandoc, WriterOptions,
};
use folio_editor::{
    EditorConfig, EditorError, EditorEvent, Editor, FindOptions, HeadlessSurface, Selection, Theme, Transaction,
    VisualSurface,
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::Notify;

async fn editor_with(config: EditorConfig, surface: HeadlessSurface) -> Editor {
    Editor::create(config, Arc::new(MarkdownEngine::new()), Box::new(surface))
        .await
        .unwrap()
}

async fn editor() -> Editor {
    editor_with(EditorConfig::default(), HeadlessSurface::new()).await
}

async fn markdown(editor: &Editor) -> String {
    editor.get_markdown(&WriterOptions::default()).await.unwrap()
}

/// Event names in delivery order
fn record_events(editor: &Editor) -> Rc<RefCell<Vec<&'static str>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    for name in ["update", "outlineChange", "selectionChange"] {
        let sink = seen.clone();
        let _subscription = editor
            .subscribe(name, move |event| sink.borrow_mut().push(event.name().as_str()))
            .unwrap();
    }
    seen
}

/// Holds back any markup starting with "slow" until released
struct GatedEngine {
    inner: MarkdownEngine,
    started: Arc<Notify>,
    gate: Arc<Notify>,
}

#[async_trait]
impl ConversionEngine for GatedEngine {
    fn name(&self) -> &str {
        "gated"
    }

    async fn resolve_format(&self, format: &str) -> Result<FormatCapabilities, ConversionError> {
        self.inner.resolve_format(format).await
    }

    async fn to_intermediate(&self, markup: &str, format: &FormatSpec) -> Result<Pandoc, ConversionError> {
        if markup.starts_with("slow") {
            self.started.notify_one();
            self.gate.notified().await;
        }
        self.inner.to_intermediate(markup, format).await
    }

    async fn from_intermediate(
        &self,
        doc: &Pandoc,
        format: &FormatSpec,
        options: &WriterOptions,
    ) -> Result<String, ConversionError> {
        self.inner.from_intermediate(doc, format, options).await
    }
}

struct Gates {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

async fn gated_editor() -> (Editor, Gates) {
    let gates = Gates {
        started: Arc::new(Notify::new()),
        release: Arc::new(Notify::new()),
    };
    let engine = GatedEngine {
        inner: MarkdownEngine::new(),
        started: gates.started.clone(),
        gate: gates.release.clone(),
    };
    let editor = Editor::create(EditorConfig::default(), Arc::new(engine), Box::new(HeadlessSurface::new()))
        .await
        .unwrap();
    (editor, gates)
}

#[tokio::test]
async fn test_heading_and_paragraph_round_trip() {
    let editor = editor().await;
    let source = "# Title\n\nHello world.";
    assert!(editor.set_markdown(source, true).await.unwrap());

    let outline = editor.get_outline().unwrap();
    assert_eq!(outline.len(), 1);
    assert_eq!(outline[0].level, 1);
    assert_eq!(outline[0].text, "Title");
    assert_eq!(markdown(&editor).await, source);
}

#[tokio::test]
async fn test_newer_load_supersedes_pending_one() {
    let (editor, gates) = gated_editor().await;
    let slow = editor.set_markdown("slow text", true);
    let fast = async {
        gates.started.notified().await;
        let loaded = editor.set_markdown("# Newer", true).await;
        gates.release.notify_one();
        loaded
    };
    let (slow, fast) = tokio::join!(slow, fast);
    assert!(!slow.unwrap());
    assert!(fast.unwrap());
    assert_eq!(markdown(&editor).await, "# Newer");
}

#[tokio::test]
async fn test_replace_document_supersedes_pending_load() {
    let (editor, gates) = gated_editor().await;
    let other = editor_with(EditorConfig::default(), HeadlessSurface::new()).await;
    other.set_markdown("Replacement", true).await.unwrap();
    let tree = other.get_state().unwrap().doc().clone();

    let slow = editor.set_markdown("slow text", true);
    let replace = async {
        gates.started.notified().await;
        editor.replace_document(tree, true).unwrap();
        gates.release.notify_one();
    };
    let (slow, ()) = tokio::join!(slow, replace);
    assert!(!slow.unwrap());
    assert_eq!(markdown(&editor).await, "Replacement");
}

#[tokio::test]
async fn test_conversion_error_keeps_document() {
    let editor = editor().await;
    editor.set_markdown("Kept", true).await.unwrap();
    let err = editor.set_markdown("Broken $$x + 1", true).await.unwrap_err();
    assert!(matches!(err, EditorError::Conversion(ConversionError::Syntax { .. })), "{err}");
    assert_eq!(markdown(&editor).await, "Kept");
}

#[tokio::test]
async fn test_unknown_format_fails_creation() {
    let config = EditorConfig::with_format("docx");
    let err = Editor::create(config, Arc::new(MarkdownEngine::new()), Box::new(HeadlessSurface::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, EditorError::Configuration(_)), "{err}");
}

#[tokio::test]
async fn test_keybinding_override() {
    let mut keybindings = BTreeMap::new();
    keybindings.insert("italic".to_string(), vec!["Ctrl+B".to_string()]);
    let config = EditorConfig {
        keybindings,
        ..EditorConfig::default()
    };
    let editor = editor_with(config, HeadlessSurface::new()).await;

    let commands = editor.commands().unwrap();
    let keymap = |id: &str| {
        commands
            .iter()
            .find(|c| c.id() == id)
            .map(|c| c.keymap().to_vec())
            .unwrap()
    };
    assert_eq!(keymap("italic"), ["Ctrl+B"]);
    assert!(!keymap("bold").contains(&"Ctrl+B".to_string()));

    editor.set_markdown("Hello world", true).await.unwrap();
    assert!(editor.handle_key("Ctrl-b").unwrap());
    assert_eq!(markdown(&editor).await, "*Hello* world");
}

#[tokio::test]
async fn test_set_keybindings_keeps_history() {
    let editor = editor().await;
    editor.set_markdown("Text", true).await.unwrap();
    editor.handle_text_input("More ").unwrap();

    let mut keybindings = BTreeMap::new();
    keybindings.insert("bold".to_string(), vec!["Ctrl+Alt+B".to_string()]);
    editor.set_keybindings(keybindings).unwrap();

    let bold = editor.commands().unwrap().into_iter().find(|c| c.id() == "bold").unwrap();
    assert_eq!(bold.keymap(), ["Ctrl+Alt+B"]);
    assert!(editor.undo().unwrap());
    assert_eq!(markdown(&editor).await, "Text");

    let mut bad = BTreeMap::new();
    bad.insert("bold".to_string(), vec!["Ctrl+".to_string()]);
    assert!(matches!(editor.set_keybindings(bad), Err(EditorError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_outline_change_only_when_headings_change() {
    let editor = editor().await;
    editor.set_markdown("# Title\n\nBody", true).await.unwrap();
    let events = record_events(&editor);

    // end of "Body"
    editor.dispatch(Transaction::new().set_selection(Selection::cursor(13))).unwrap();
    assert_eq!(*events.borrow(), ["selectionChange"]);
    events.borrow_mut().clear();

    editor.handle_text_input(" text").unwrap();
    assert_eq!(*events.borrow(), ["update", "selectionChange"]);
    events.borrow_mut().clear();

    // end of "Title"
    editor.dispatch(Transaction::new().set_selection(Selection::cursor(7))).unwrap();
    editor.handle_text_input("s").unwrap();
    assert_eq!(*events.borrow(), ["selectionChange", "update", "outlineChange", "selectionChange"]);
    assert_eq!(editor.get_outline().unwrap()[0].text, "Titles");
}

#[tokio::test]
async fn test_load_announces_outline_and_selection() {
    let editor = editor().await;
    let events = record_events(&editor);
    editor.set_markdown("# One", true).await.unwrap();
    assert_eq!(*events.borrow(), ["update", "outlineChange", "selectionChange"]);

    events.borrow_mut().clear();
    editor.set_markdown("# Two", false).await.unwrap();
    assert_eq!(*events.borrow(), ["outlineChange", "selectionChange"]);
}

#[tokio::test]
async fn test_subscriptions() {
    let editor = editor().await;
    let err = editor.subscribe("changed", |_| {}).unwrap_err();
    assert!(matches!(err, EditorError::InvalidArgument(_)));
    assert!(err.to_string().contains("selectionChange"));

    let selections = Rc::new(RefCell::new(Vec::new()));
    let sink = selections.clone();
    let subscription = editor
        .subscribe("selectionChange", move |event| {
            if let EditorEvent::SelectionChange(selection) = event {
                sink.borrow_mut().push(*selection);
            }
        })
        .unwrap();
    editor.set_markdown("Some text", true).await.unwrap();
    editor.dispatch(Transaction::new().set_selection(Selection::new(2, 6))).unwrap();
    assert_eq!(*selections.borrow(), [Selection::cursor(2), Selection::new(2, 6)]);

    assert!(subscription.unsubscribe());
    editor.dispatch(Transaction::new().set_selection(Selection::cursor(3))).unwrap();
    assert_eq!(selections.borrow().len(), 2);
}

#[tokio::test]
async fn test_selection_is_mapped_through_edits() {
    let editor = editor().await;
    editor.set_markdown("Hello", true).await.unwrap();
    editor.dispatch(Transaction::new().set_selection(Selection::cursor(7))).unwrap();

    editor.dispatch(Transaction::new().insert_text(2, "abc", Vec::new())).unwrap();
    assert_eq!(editor.get_selection().unwrap(), Selection::cursor(10));

    // "abcHello": a range around the cursor collapses to its start
    editor.dispatch(Transaction::new().set_selection(Selection::cursor(8))).unwrap();
    editor.dispatch(Transaction::new().delete(4, 10)).unwrap();
    assert_eq!(editor.get_selection().unwrap(), Selection::cursor(4));
    assert_eq!(markdown(&editor).await, "ab");
}

#[tokio::test]
async fn test_rejected_transaction_is_a_no_op() {
    let editor = editor().await;
    editor.set_markdown("Text", true).await.unwrap();
    let events = record_events(&editor);
    // deleting the body's only block would leave it empty
    assert!(!editor.dispatch(Transaction::new().delete(1, 7)).unwrap());
    assert!(events.borrow().is_empty());
    assert_eq!(markdown(&editor).await, "Text");
}

#[tokio::test]
async fn test_find_replace_is_undoable() {
    let editor = editor().await;
    editor.set_markdown("one two one", true).await.unwrap();
    let mut find = editor.get_find_replace().unwrap();

    assert!(find.find("one", FindOptions::default()).unwrap());
    assert_eq!(find.match_count().unwrap(), 2);
    assert_eq!(editor.get_selection().unwrap(), Selection::new(2, 5));

    assert_eq!(find.replace_all("three").unwrap(), 2);
    assert_eq!(markdown(&editor).await, "three two three");
    assert_eq!(find.match_count().unwrap(), 0);

    assert!(editor.undo().unwrap());
    assert_eq!(markdown(&editor).await, "one two one");
    assert_eq!(find.match_count().unwrap(), 2);

    find.clear();
    assert_eq!(find.match_count().unwrap(), 0);
}

#[tokio::test]
async fn test_replace_moves_to_next_match() {
    let editor = editor().await;
    editor.set_markdown("one two one", true).await.unwrap();
    let mut find = editor.get_find_replace().unwrap();
    find.find("one", FindOptions::default()).unwrap();

    assert!(find.replace("1").unwrap());
    assert_eq!(markdown(&editor).await, "1 two one");
    assert_eq!(editor.get_selection().unwrap(), Selection::new(8, 11));

    assert!(find.select_previous().unwrap());
    assert_eq!(editor.get_selection().unwrap(), Selection::new(8, 11));
    assert!(find.select_first().unwrap());
    assert_eq!(editor.get_selection().unwrap(), Selection::new(8, 11));
}

#[tokio::test]
async fn test_read_only_editor_rejects_edits() {
    let editor = editor().await;
    editor.set_markdown("Text", true).await.unwrap();
    editor.set_editable(false).unwrap();

    assert!(!editor.handle_text_input("x").unwrap());
    assert!(!editor.dispatch(Transaction::new().insert_text(2, "y", Vec::new())).unwrap());
    assert!(editor.dispatch(Transaction::new().set_selection(Selection::cursor(4))).unwrap());
    assert_eq!(markdown(&editor).await, "Text");

    editor.set_editable(true).unwrap();
    assert!(editor.handle_text_input("!").unwrap());
    assert_eq!(markdown(&editor).await, "Te!xt");
}

#[tokio::test]
async fn test_navigation() {
    let editor = editor().await;
    editor
        .set_markdown("# Intro\n\nText[^1]\n\n## Details\n\n[^1]: The note", true)
        .await
        .unwrap();

    // Intro: 2..7, Text + note_ref: 9..14, Details: 16..23
    assert!(editor.navigate("heading:details").unwrap());
    assert_eq!(editor.get_selection().unwrap(), Selection::cursor(16));

    assert!(editor.navigate("note:note-1").unwrap());
    let state = editor.get_state().unwrap();
    let head = state.selection().head;
    let block = state.textblock_at(head).unwrap();
    assert_eq!(block.node.text_content(), "The note");

    assert!(editor.navigate("pos:3").unwrap());
    assert_eq!(editor.get_selection().unwrap(), Selection::cursor(3));

    assert!(!editor.navigate("heading:missing").unwrap());
    assert!(!editor.navigate("note:note-9").unwrap());
    assert!(!editor.navigate("pos:100000").unwrap());
    assert!(matches!(editor.navigate("details"), Err(EditorError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_editing_location_survives_reload() {
    let surface = HeadlessSurface::with_viewport(40.0);
    let editor = editor_with(EditorConfig::default(), surface.clone()).await;
    editor.set_markdown("a\n\nb\n\nc\n\nd\n\ne\n\nf", true).await.unwrap();
    editor.dispatch(Transaction::new().set_selection(Selection::cursor(12))).unwrap();
    surface.clone().set_scroll_top(40.0);
    let location = editor.get_editing_location().unwrap();

    editor
        .set_markdown("a longer first line\n\nb\n\nc\n\nd\n\ne\n\nf", true)
        .await
        .unwrap();
    assert_eq!(editor.get_selection().unwrap(), Selection::cursor(2));
    editor.restore_editing_location(&location).unwrap();
    assert_eq!(editor.get_selection().unwrap(), Selection::cursor(30));
    assert_eq!(surface.scroll_top(), 40.0);
}

#[tokio::test]
async fn test_title() {
    let editor = editor().await;
    editor.set_markdown("Body", true).await.unwrap();
    assert_eq!(editor.get_title().unwrap(), "");
    assert!(editor.set_title("Field Notes").unwrap());
    assert_eq!(editor.get_title().unwrap(), "Field Notes");

    let text = markdown(&editor).await;
    assert!(text.contains("Field Notes"), "{text}");
    editor.set_markdown(&text, true).await.unwrap();
    assert_eq!(editor.get_title().unwrap(), "Field Notes");
}

#[tokio::test]
async fn test_commands_run_against_the_editor() {
    let surface = HeadlessSurface::new();
    let editor = editor_with(EditorConfig::default(), surface.clone()).await;
    editor.set_markdown("Make this bold", true).await.unwrap();
    editor.dispatch(Transaction::new().set_selection(Selection::new(7, 11))).unwrap();

    let commands = editor.commands().unwrap();
    let bold = commands.iter().find(|c| c.id() == "bold").unwrap();
    assert_eq!(bold.keymap(), ["Ctrl+B"]);
    assert!(bold.is_enabled());
    assert!(!bold.is_active());

    assert!(bold.execute().unwrap());
    assert!(bold.is_active());
    assert!(surface.has_focus());
    assert_eq!(markdown(&editor).await, "Make **this** bold");
}

#[tokio::test]
async fn test_command_can_run_without_taking_focus() {
    let surface = HeadlessSurface::new();
    let editor = editor_with(EditorConfig::default(), surface.clone()).await;
    editor.set_markdown("Make this italic", true).await.unwrap();
    editor.dispatch(Transaction::new().set_selection(Selection::new(7, 11))).unwrap();
    editor.blur().unwrap();

    let commands = editor.commands().unwrap();
    let italic = commands.iter().find(|c| c.id() == "italic").unwrap();
    assert!(italic.execute_without_focus().unwrap());
    assert!(italic.is_active());
    assert!(!surface.has_focus());
    assert!(!editor.has_focus().unwrap());
    assert_eq!(markdown(&editor).await, "Make *this* italic");
}

#[tokio::test]
async fn test_surface_is_driven() {
    let surface = HeadlessSurface::new();
    let config = EditorConfig {
        auto_focus: true,
        ..EditorConfig::default()
    };
    let editor = editor_with(config, surface.clone()).await;
    assert!(surface.has_focus());
    editor.blur().unwrap();
    assert!(!editor.has_focus().unwrap());

    editor.set_markdown("One\n\nTwo", true).await.unwrap();
    assert_eq!(surface.line_count(), 2);

    editor.resize().unwrap();
    assert_eq!(surface.resizes(), 1);

    let theme = Theme {
        dark_mode: true,
        ..Theme::default()
    };
    editor.apply_theme(theme.clone()).unwrap();
    assert_eq!(surface.theme(), Some(theme.clone()));
    assert_eq!(editor.theme().unwrap(), Some(theme));
}

#[tokio::test]
async fn test_destroyed_editor() {
    let surface = HeadlessSurface::new();
    let editor = editor_with(EditorConfig::default(), surface.clone()).await;
    editor.set_markdown("Text", true).await.unwrap();
    editor.destroy();

    assert!(editor.is_destroyed());
    assert!(surface.is_destroyed());
    assert!(matches!(editor.get_markdown(&WriterOptions::default()).await, Err(EditorError::Destroyed)));
    assert!(matches!(editor.dispatch(Transaction::new()), Err(EditorError::Destroyed)));
    assert!(matches!(editor.subscribe("update", |_| {}), Err(EditorError::Destroyed)));
    editor.destroy();
}

#[tokio::test]
async fn test_editors_are_independent() {
    let a = editor().await;
    let b = editor().await;
    a.set_markdown("First", true).await.unwrap();
    b.set_markdown("Second", true).await.unwrap();
    a.destroy();
    assert_eq!(markdown(&b).await, "Second");
    assert_eq!(b.get_format().unwrap().name, "markdown");
}

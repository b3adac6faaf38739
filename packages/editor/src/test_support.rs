//! Editors built from the real extension set, for unit tests

use crate::assembler::Assembly;
use crate::command::Command;
use crate::config::EditorConfig;
use crate::fixup::{run_fixups, FixupKind};
use crate::state::machine::EditingStateMachine;
use crate::state::snapshot::EditorState;
use folio_convert::layout::{BODY, NOTES, PARAGRAPH};
use folio_convert::{FormatCapabilities, FormatSpec, MarkdownEngine, MarkupConverter, Pandoc, WriterOptions};
use folio_model::{Attrs, Node, Schema};
use std::sync::Arc;

pub(crate) fn assembly_with(config: &EditorConfig) -> Assembly {
    let capabilities = FormatCapabilities::for_format(&config.format).expect("known test format");
    Assembly::build(FormatSpec::new(&config.format, capabilities), config).expect("builtin extensions assemble")
}

fn converter(assembly: &Assembly) -> MarkupConverter {
    MarkupConverter::new(
        Arc::new(MarkdownEngine::new()),
        assembly.schema.clone(),
        assembly.rules.clone(),
        assembly.format.clone(),
    )
}

fn snapshot(assembly: &Assembly, config: &EditorConfig, doc: Node) -> EditorState {
    let bindings = assembly.key_bindings(&config.keybindings).expect("test bindings are valid");
    let state = assembly.state(doc, bindings);
    run_fixups(&assembly.fixups, FixupKind::Load, state)
}

pub(crate) fn schema() -> Schema {
    assembly_with(&EditorConfig::default()).schema
}

pub(crate) fn state_with(config: &EditorConfig, markdown: &str) -> EditorState {
    let assembly = assembly_with(config);
    let intermediate = MarkdownEngine::new()
        .parse(markdown, &assembly.format)
        .expect("test markdown parses");
    let doc = converter(&assembly)
        .read_intermediate(&intermediate)
        .expect("test markdown converts");
    snapshot(&assembly, config, doc)
}

/// State read straight from intermediate JSON, bypassing the markdown parser
pub(crate) fn intermediate_state(json: &str) -> EditorState {
    let config = EditorConfig::default();
    let assembly = assembly_with(&config);
    let intermediate = Pandoc::from_json(json).expect("test json parses");
    let doc = converter(&assembly)
        .read_intermediate(&intermediate)
        .expect("test json converts");
    snapshot(&assembly, &config, doc)
}

pub(crate) fn state(markdown: &str) -> EditorState {
    state_with(&EditorConfig::default(), markdown)
}

/// A single paragraph holding `text` as typed, with no markup parsing
pub(crate) fn text_state_with(config: &EditorConfig, text: &str) -> EditorState {
    let assembly = assembly_with(config);
    let schema = &assembly.schema;
    let content = if text.is_empty() {
        Vec::new()
    } else {
        vec![schema.text(text, Vec::new()).expect("text node")]
    };
    let build = || -> Result<Node, folio_model::SchemaError> {
        let paragraph = schema.node(PARAGRAPH, Attrs::new(), content.clone())?;
        let body = schema.node(BODY, Attrs::new(), vec![paragraph])?;
        let notes = schema.node(NOTES, Attrs::new(), Vec::new())?;
        schema.node(schema.top_node(), Attrs::new(), vec![body, notes])
    };
    let doc = build().expect("test document");
    snapshot(&assembly, config, doc)
}

pub(crate) fn text_state(text: &str) -> EditorState {
    text_state_with(&EditorConfig::default(), text)
}

pub(crate) fn machine_with(config: &EditorConfig, markdown: &str) -> EditingStateMachine {
    EditingStateMachine::new(state_with(config, markdown), config.history_depth)
}

pub(crate) fn machine(markdown: &str) -> EditingStateMachine {
    machine_with(&EditorConfig::default(), markdown)
}

pub(crate) fn text_machine_with(config: &EditorConfig, text: &str) -> EditingStateMachine {
    EditingStateMachine::new(text_state_with(config, text), config.history_depth)
}

pub(crate) fn text_machine(text: &str) -> EditingStateMachine {
    text_machine_with(&EditorConfig::default(), text)
}

pub(crate) fn command_with(config: &EditorConfig, id: &str) -> Command {
    assembly_with(config)
        .command(id)
        .cloned()
        .unwrap_or_else(|| panic!("no command {id}"))
}

pub(crate) fn command(id: &str) -> Command {
    command_with(&EditorConfig::default(), id)
}

/// `type:text` for each top-level block of the body
pub(crate) fn body(state: &EditorState) -> Vec<String> {
    state
        .doc()
        .child(0)
        .map(|body| {
            body.children()
                .iter()
                .map(|n| format!("{}:{}", n.node_type(), n.text_content()))
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn markdown_with(config: &EditorConfig, state: &EditorState) -> String {
    let assembly = assembly_with(config);
    let intermediate = converter(&assembly)
        .write_intermediate(state.doc())
        .expect("test document writes");
    MarkdownEngine::new().render(&intermediate, &assembly.format, &WriterOptions::default())
}

/// The document as markdown through the default extensions
pub(crate) fn markdown(state: &EditorState) -> String {
    markdown_with(&EditorConfig::default(), state)
}

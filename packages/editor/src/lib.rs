//! # Folio Editor
//!
//! The editing core: keeps a structured document in step with a visual
//! surface and with markup text produced by a conversion engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ extension: built-in extensions, resolved    │
//! │ per format capabilities and options         │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ assembler: grammar, conversion rules,       │
//! │ commands, plugin pipeline, fixups           │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ state: immutable snapshots, transactions,   │
//! │ plugins, undo history                       │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ views: outline, editing location,           │
//! │ find/replace, commands                      │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: the public facade and its events    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The snapshot is the truth**: surface and views are derived from it
//! 2. **Edits are transactions**: applied whole or not at all
//! 3. **Extensions are declarative**: the core never names them
//! 4. **Conversions are asynchronous**: a newer load wins
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_editor::{Editor, EditorConfig, HeadlessSurface};
//! use folio_convert::{MarkdownEngine, WriterOptions};
//! use std::sync::Arc;
//!
//! let editor = Editor::create(
//!     EditorConfig::default(),
//!     Arc::new(MarkdownEngine::new()),
//!     Box::new(HeadlessSurface::new()),
//! )
//! .await?;
//!
//! let _sub = editor.subscribe("outlineChange", |event| println!("{:?}", event))?;
//! editor.set_markdown("# Title\n\nHello world.", true).await?;
//! let text = editor.get_markdown(&WriterOptions::default()).await?;
//! ```

pub mod assembler;
pub mod command;
pub mod config;
pub mod editor;
pub mod errors;
pub mod events;
pub mod extension;
pub mod fixup;
pub mod history;
pub mod input_rule;
pub mod keymap;
pub mod post_process;
pub mod state;
pub mod surface;
pub mod theme;
pub mod transform;
pub mod views;

#[cfg(test)]
mod test_support;

pub use assembler::Assembly;
pub use command::{Command, CommandFn};
pub use config::EditorConfig;
pub use editor::Editor;
pub use errors::EditorError;
pub use events::{EditorEvent, EventName, Subscription};
pub use extension::{Extension, ExtensionContext, ExtensionManager};
pub use keymap::KeyBindings;
pub use state::{EditingStateMachine, EditorState, Transition};
pub use surface::{HeadlessSurface, VisualSurface};
pub use theme::Theme;
pub use views::{EditingLocation, EditorCommand, FindMatch, FindOptions, FindReplace, Outline, OutlineEntry};

// Re-export model types callers build transactions with
pub use folio_model::{Selection, Transaction};

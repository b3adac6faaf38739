//! Editing state: immutable snapshots, the plugin pipeline and the machine
//! that commits one snapshot after another.

pub mod machine;
pub mod pipeline;
pub mod plugin;
pub mod snapshot;

pub use machine::{EditingStateMachine, Transition};
pub use pipeline::{BaseKeysPlugin, KeyHandler, KeybindingsPlugin, Pipeline};
pub use plugin::{Dispatch, Editability, EditabilityGate, Plugin, PluginSet};
pub use snapshot::{EditorState, TextblockRef, ATOM_CHAR};

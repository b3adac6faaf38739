//! Derived views: read-only projections recomputed from the current
//! snapshot on demand. None of them keeps a document tree between calls.

pub mod commands;
pub mod find_replace;
pub mod location;
pub mod outline;

pub use commands::EditorCommand;
pub use find_replace::{FindMatch, FindOptions, FindQuery, FindReplace};
pub use location::EditingLocation;
pub use outline::{outline, Outline, OutlineEntry};

//! Fixed regions every document carries, whatever extensions are active:
//!
//! ```text
//! doc
//! ├── body     primary content (block+)
//! └── notes    footnote bodies (note*), referenced from the body by note_ref
//! ```

pub const BODY: &str = "body";
pub const NOTES: &str = "notes";
pub const NOTE: &str = "note";
pub const NOTE_REF: &str = "note_ref";
pub const PARAGRAPH: &str = "paragraph";

/// Document attribute holding the title
pub const TITLE_ATTR: &str = "title";

/// Note attribute holding the stable reference id
pub const REF_ATTR: &str = "ref";

/// Note attribute holding the display ordinal
pub const ORDINAL_ATTR: &str = "ordinal";

/// Reference id of the n-th note (1-based)
pub fn note_ref_id(n: usize) -> String {
    format!("note-{}", n)
}

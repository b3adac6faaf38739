//! # Footnotes
//!
//! A footnote is two nodes: a `note_ref` atom in the text and a `note` in
//! the notes region, tied by the `ref` attribute. The pairing has to hold
//! after every edit:
//!
//! - every note is referenced; deleting the last reference deletes the note
//! - every reference has a note; a reference to a missing note is removed
//! - note ordinals follow the order of first reference in the document
//!
//! [`NoteConsistency`] restores all three, both after each change and once
//! when a document is loaded.

use super::{unexpected, Extension, ExtensionContext};
use crate::command::{transaction_command, Command, CommandFn};
use crate::fixup::{Fixup, FixupKind, ProcessorFixup};
use crate::post_process::PostProcessor;
use crate::state::snapshot::EditorState;
use crate::transform::Transform;
use folio_convert::layout::{note_ref_id, NOTE, NOTES, NOTE_REF, ORDINAL_ATTR, PARAGRAPH, REF_ATTR};
use folio_convert::{ConversionRules, Inline};
use folio_model::{attrs, AttrSpec, Attrs, Node, NodeSpec, Selection, Transaction};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct Footnote;

pub fn extension(ctx: &ExtensionContext<'_>) -> Option<Box<dyn Extension>> {
    ctx.capabilities
        .footnotes
        .then(|| Box::new(Footnote) as Box<dyn Extension>)
}

impl Extension for Footnote {
    fn name(&self) -> &str {
        "footnote"
    }

    fn nodes(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::new(NOTE_REF, "")
            .group("inline")
            .inline()
            .attr(REF_ATTR, AttrSpec::required())]
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::new("footnote", insert_footnote())
            .keys(["Mod-Alt-f"])
            .requires([NOTE_REF])]
    }

    fn post_processors(&self) -> Vec<Arc<dyn PostProcessor>> {
        vec![Arc::new(NoteConsistency)]
    }

    fn fixups(&self) -> Vec<Arc<dyn Fixup>> {
        vec![Arc::new(ProcessorFixup::new(FixupKind::Load, Arc::new(NoteConsistency)))]
    }

    fn conversion_rules(&self, rules: &mut ConversionRules) {
        rules
            .read_inline("Note", |r, i| match i {
                Inline::Note(blocks) => {
                    let id = r.add_note(blocks)?;
                    Ok(vec![r.atom(NOTE_REF, attrs([(REF_ATTR, id)]))?])
                }
                other => Err(unexpected(other.kind())),
            })
            .write_inline(NOTE_REF, |w, n| {
                let id = n.attr_str(REF_ATTR).unwrap_or_default().to_string();
                Ok(vec![Inline::Note(w.note_blocks(&id)?)])
            });
    }
}

/// A reference or note found in the document
#[derive(Debug, Clone)]
struct Located {
    pos: usize,
    node: Node,
}

fn collect(doc: &Node) -> (Vec<Located>, Vec<Located>) {
    let mut refs = Vec::new();
    let mut notes = Vec::new();
    doc.descendants(&mut |node: &Node, pos: usize, parent: &Node| {
        if node.node_type() == NOTE_REF {
            refs.push(Located {
                pos,
                node: node.clone(),
            });
        } else if node.node_type() == NOTE && parent.node_type() == NOTES {
            notes.push(Located {
                pos,
                node: node.clone(),
            });
        }
        !node.is_inline()
    });
    (refs, notes)
}

/// Keeps references and notes paired and ordinals in reading order
pub struct NoteConsistency;

impl PostProcessor for NoteConsistency {
    fn name(&self) -> &str {
        "note_consistency"
    }

    fn process(&self, state: &EditorState) -> Option<Transaction> {
        let (refs, notes) = collect(state.doc());

        let note_ids: HashSet<&str> = notes.iter().filter_map(|n| n.node.attr_str(REF_ATTR)).collect();
        let mut ordinals: HashMap<&str, u64> = HashMap::new();
        for r in &refs {
            if let Some(id) = r.node.attr_str(REF_ATTR) {
                if note_ids.contains(id) && !ordinals.contains_key(id) {
                    let next = ordinals.len() as u64 + 1;
                    ordinals.insert(id, next);
                }
            }
        }

        let mut tr = Transaction::new();
        let mut deletions: Vec<(usize, usize)> = Vec::new();

        for note in &notes {
            let id = note.node.attr_str(REF_ATTR).unwrap_or_default();
            match ordinals.get(id) {
                Some(&ordinal) if note.node.attr_u64(ORDINAL_ATTR) != Some(ordinal) => {
                    let mut a = note.node.attrs().clone();
                    a.insert(ORDINAL_ATTR.to_string(), Value::from(ordinal));
                    tr = tr.set_node_attrs(note.pos, a);
                }
                Some(_) => {}
                None => deletions.push((note.pos, note.pos + note.node.node_size())),
            }
        }
        for r in &refs {
            let id = r.node.attr_str(REF_ATTR).unwrap_or_default();
            if !note_ids.contains(id) {
                deletions.push((r.pos, r.pos + r.node.node_size()));
            }
        }

        // Back to front, so earlier positions stay valid
        deletions.sort_by(|a, b| b.0.cmp(&a.0));
        for (from, to) in deletions {
            tr = tr.delete(from, to);
        }
        tr.has_steps().then_some(tr)
    }
}

/// A reference id no note uses yet
fn next_note_id(notes: &[Located]) -> String {
    let used: HashSet<&str> = notes.iter().filter_map(|n| n.node.attr_str(REF_ATTR)).collect();
    (notes.len() + 1..)
        .map(note_ref_id)
        .find(|id| !used.contains(id.as_str()))
        .unwrap_or_else(|| note_ref_id(notes.len() + 1))
}

/// Insert a reference at the cursor and an empty note for it, and move into
/// the note
fn insert_footnote() -> CommandFn {
    transaction_command(|state| {
        let selection = state.selection();
        state.textblock_at(selection.from()).filter(|b| !b.node.is_code())?;
        let (_, notes) = collect(state.doc());
        let id = next_note_id(&notes);
        let schema = state.schema();

        let reference = schema
            .node(NOTE_REF, attrs([(REF_ATTR, id.as_str())]), Vec::new())
            .ok()?
            .with_marks(state.marks_at(selection.from()));
        let paragraph = schema.node(PARAGRAPH, Attrs::new(), Vec::new()).ok()?;
        let mut note_attrs = attrs([(REF_ATTR, id.as_str())]);
        note_attrs.insert(ORDINAL_ATTR.to_string(), Value::from(notes.len() + 1));
        let note = schema.node(NOTE, note_attrs, vec![paragraph]).ok()?;

        let mut tf = Transform::new(state);
        tf.delete_range(selection.from(), selection.to()).ok()?;
        tf.replace(selection.from(), selection.from(), vec![reference]).ok()?;

        // The notes region is the last child of the root
        let doc = tf.doc();
        let notes_region = doc.child(doc.child_count().checked_sub(1)?)?;
        let notes_end = doc.content_size() - 1;
        if notes_region.node_type() != NOTES {
            return None;
        }
        tf.replace(notes_end, notes_end, vec![note]).ok()?;
        tf.set_selection(Selection::cursor(notes_end + 2));
        Some(tf.into_transaction().scroll_into_view())
    })
}

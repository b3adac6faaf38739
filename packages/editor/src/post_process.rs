//! # Post-Processors
//!
//! Edits can leave the document in a state that is valid for the grammar
//! but inconsistent for the user: a footnote whose reference was deleted,
//! ordinals that no longer follow reading order. Post-processors look at
//! the state after each document-changing transaction and return follow-up
//! edits that restore consistency.
//!
//! ## Design
//!
//! - Processors run sequentially, each seeing the state the previous one
//!   left, and their steps are concatenated into one appended transaction
//! - A processor whose transaction does not apply is skipped with a warning;
//!   the others still run
//! - Structural processors run on every document change; mark processors
//!   only when marks changed or the change touched text that carries marks

use crate::state::plugin::Plugin;
use crate::state::snapshot::EditorState;
use folio_model::{AppliedTransaction, Assoc, Transaction};
use std::sync::Arc;
use tracing::{debug, warn};

pub const STRUCTURAL_POST_PROCESS: &str = "post_process";
pub const MARK_POST_PROCESS: &str = "mark_post_process";

/// Tag set on transactions appended by a post-processor stage
pub const APPENDED_BY: &str = "appended_by";

pub trait PostProcessor: Send + Sync {
    fn name(&self) -> &str;

    /// Follow-up edits for `state`, or `None` when it is already consistent
    fn process(&self, state: &EditorState) -> Option<Transaction>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Structural,
    Mark,
}

pub struct PostProcessorPlugin {
    stage: Stage,
    processors: Vec<Arc<dyn PostProcessor>>,
}

impl PostProcessorPlugin {
    pub fn new(stage: Stage, processors: Vec<Arc<dyn PostProcessor>>) -> Self {
        Self { stage, processors }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Run every processor against `state` and collect their steps
    pub fn run(&self, state: &EditorState) -> Option<Transaction> {
        let mut scratch = state.clone();
        let mut steps = Vec::new();
        for processor in &self.processors {
            let Some(tr) = processor.process(&scratch) else {
                continue;
            };
            match scratch.apply(&tr) {
                Ok((next, applied)) if applied.doc_changed => {
                    debug!(processor = processor.name(), steps = tr.steps().len(), "post-processor fired");
                    steps.extend(tr.steps().iter().cloned());
                    scratch = next;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(processor = processor.name(), error = %e, "skipping post-processor with invalid edits");
                }
            }
        }
        if steps.is_empty() {
            return None;
        }
        Some(Transaction::from_steps(steps).tag(APPENDED_BY, self.key()))
    }
}

impl Plugin for PostProcessorPlugin {
    fn key(&self) -> &str {
        match self.stage {
            Stage::Structural => STRUCTURAL_POST_PROCESS,
            Stage::Mark => MARK_POST_PROCESS,
        }
    }

    fn append_transaction(
        &self,
        _tr: &Transaction,
        applied: &AppliedTransaction,
        _old: &EditorState,
        new: &EditorState,
    ) -> Option<Transaction> {
        if !applied.doc_changed || self.processors.is_empty() {
            return None;
        }
        if self.stage == Stage::Mark && !applied.marks_changed && !touches_marked_text(applied, new) {
            return None;
        }
        self.run(new)
    }
}

/// Whether any range the transaction replaced lands in a textblock whose
/// inline content carries marks
fn touches_marked_text(applied: &AppliedTransaction, state: &EditorState) -> bool {
    let maps = applied.mapping.maps();
    let size = state.doc().content_size();
    for (i, map) in maps.iter().enumerate() {
        for range in map.ranges() {
            let mut from = range.start;
            let mut to = range.start + range.new_size;
            for later in &maps[i + 1..] {
                from = later.map(from, Assoc::Before);
                to = later.map(to, Assoc::After);
            }
            let mut marked = false;
            state
                .doc()
                .nodes_between(from.min(size), (to + 1).min(size), &mut |node, _, _| {
                    if node.is_textblock() {
                        marked |= node.children().iter().any(|c| !c.marks().is_empty());
                        return false;
                    }
                    !marked
                });
            if marked {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::state;
    use folio_model::Mark;

    /// Appends "!" to the first paragraph until it ends with one
    struct Exclaim;

    impl PostProcessor for Exclaim {
        fn name(&self) -> &str {
            "exclaim"
        }

        fn process(&self, state: &EditorState) -> Option<Transaction> {
            let block = state.textblock_at(2)?;
            if block.node.text_content().ends_with('!') {
                return None;
            }
            Some(Transaction::new().insert_text(block.content_end(), "!", vec![]))
        }
    }

    struct Broken;

    impl PostProcessor for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn process(&self, _state: &EditorState) -> Option<Transaction> {
            Some(Transaction::new().delete(0, 3))
        }
    }

    #[test]
    fn test_processors_run_in_sequence() {
        let plugin = PostProcessorPlugin::new(Stage::Structural, vec![Arc::new(Exclaim), Arc::new(Exclaim)]);
        let tr = plugin.run(&state("Hello")).unwrap();
        // the second run sees the first one's edit and does nothing
        assert_eq!(tr.steps().len(), 1);
        assert_eq!(tr.get_tag(APPENDED_BY), Some(STRUCTURAL_POST_PROCESS));
    }

    #[test]
    fn test_failing_processor_is_skipped() {
        let plugin = PostProcessorPlugin::new(Stage::Structural, vec![Arc::new(Broken), Arc::new(Exclaim)]);
        let tr = plugin.run(&state("Hello")).unwrap();
        assert_eq!(tr.steps().len(), 1);
    }

    #[test]
    fn test_mark_stage_ignores_unmarked_edits() {
        let plugin = PostProcessorPlugin::new(Stage::Mark, vec![Arc::new(Exclaim)]);
        let old = state("Hello\n\nOther");
        let tr = Transaction::new().insert_text(9, "x", vec![]);
        let (new, applied) = old.apply(&tr).unwrap();
        assert!(plugin.append_transaction(&tr, &applied, &old, &new).is_none());

        let tr = Transaction::new().add_mark(2, 4, Mark::new("strong"));
        let (new, applied) = old.apply(&tr).unwrap();
        assert!(plugin.append_transaction(&tr, &applied, &old, &new).is_some());
    }

    #[test]
    fn test_mark_stage_sees_edits_inside_marked_text() {
        let plugin = PostProcessorPlugin::new(Stage::Mark, vec![Arc::new(Exclaim)]);
        let old = state("**Hello**");
        let tr = Transaction::new().insert_text(4, "y", vec![]);
        let (new, applied) = old.apply(&tr).unwrap();
        assert!(!applied.marks_changed);
        assert!(plugin.append_transaction(&tr, &applied, &old, &new).is_some());
    }
}

//! Fixups repair a freshly loaded document (or one just resized) before it
//! is shown. They run outside history: nothing to undo back to.

use crate::post_process::PostProcessor;
use crate::state::snapshot::EditorState;
use folio_model::Transaction;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixupKind {
    /// After a document is loaded from markup
    Load,

    /// After the visual surface changes size
    Resize,
}

pub trait Fixup: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> FixupKind;

    fn fix(&self, state: &EditorState) -> Option<Transaction>;
}

/// A post-processor reused as a fixup
pub struct ProcessorFixup {
    kind: FixupKind,
    processor: Arc<dyn PostProcessor>,
}

impl ProcessorFixup {
    pub fn new(kind: FixupKind, processor: Arc<dyn PostProcessor>) -> Self {
        Self { kind, processor }
    }
}

impl Fixup for ProcessorFixup {
    fn name(&self) -> &str {
        self.processor.name()
    }

    fn kind(&self) -> FixupKind {
        self.kind
    }

    fn fix(&self, state: &EditorState) -> Option<Transaction> {
        self.processor.process(state)
    }
}

/// Run every fixup of `kind` in order, returning the fixed state. Each
/// fixup sees the previous one's result; a fixup producing an invalid
/// transaction is skipped.
pub fn run_fixups(fixups: &[Arc<dyn Fixup>], kind: FixupKind, state: EditorState) -> EditorState {
    let mut state = state;
    for fixup in fixups.iter().filter(|f| f.kind() == kind) {
        let Some(tr) = fixup.fix(&state) else {
            continue;
        };
        match state.apply(&tr.without_history()) {
            Ok((next, applied)) => {
                if applied.doc_changed {
                    debug!(fixup = fixup.name(), ?kind, "fixup applied");
                }
                state = next;
            }
            Err(e) => warn!(fixup = fixup.name(), error = %e, "skipping fixup with invalid edits"),
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::state;

    struct AppendText(&'static str, FixupKind);

    impl Fixup for AppendText {
        fn name(&self) -> &str {
            self.0
        }

        fn kind(&self) -> FixupKind {
            self.1
        }

        fn fix(&self, state: &EditorState) -> Option<Transaction> {
            let block = state.textblock_at(2)?;
            Some(Transaction::new().insert_text(block.content_end(), self.0, vec![]))
        }
    }

    #[test]
    fn test_only_matching_kind_runs() {
        let fixups: Vec<Arc<dyn Fixup>> = vec![
            Arc::new(AppendText("-load", FixupKind::Load)),
            Arc::new(AppendText("-resize", FixupKind::Resize)),
        ];
        let fixed = run_fixups(&fixups, FixupKind::Load, state("Doc"));
        assert_eq!(fixed.doc().text_content(), "Doc-load");
    }
}

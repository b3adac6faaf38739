//! # Plugin Pipeline
//!
//! Every snapshot carries the plugin set it was built with. The order is
//! fixed:
//!
//! ```text
//! base keys → keybindings → structural post-processors → mark post-processors
//!   → extension plugins (declaration order) → input rules → editability gate
//! ```
//!
//! - **Keys and text input** are offered to plugins from the end of the list
//!   backwards; the first plugin that handles them wins, so the base keymap
//!   only answers when nothing else did.
//! - **Filters** must all accept a transaction before it is applied.
//! - **Appended transactions** are collected front to back after a
//!   transaction applies, each plugin seeing the state left by the previous.

use crate::state::snapshot::EditorState;
use folio_model::{AppliedTransaction, Transaction};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Callback through which commands and plugins hand back transactions
pub type Dispatch<'a> = &'a mut dyn FnMut(Transaction);

pub trait Plugin: Send + Sync {
    fn key(&self) -> &str;

    fn handle_key(&self, _state: &EditorState, _chord: &str, _dispatch: Dispatch<'_>) -> bool {
        false
    }

    fn handle_text_input(&self, _state: &EditorState, _text: &str, _dispatch: Dispatch<'_>) -> bool {
        false
    }

    /// Return `false` to drop the transaction before it is applied
    fn filter_transaction(&self, _tr: &Transaction, _state: &EditorState) -> bool {
        true
    }

    /// Follow-up edits for a transaction that just applied
    fn append_transaction(
        &self,
        _tr: &Transaction,
        _applied: &AppliedTransaction,
        _old: &EditorState,
        _new: &EditorState,
    ) -> Option<Transaction> {
        None
    }
}

/// Ordered, shared plugin list
#[derive(Clone, Default)]
pub struct PluginSet {
    plugins: Arc<Vec<Arc<dyn Plugin>>>,
}

impl fmt::Debug for PluginSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.plugins.iter().map(|p| p.key())).finish()
    }
}

impl PluginSet {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self {
            plugins: Arc::new(plugins),
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Arc<dyn Plugin>> {
        self.plugins.iter()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.iter().find(|p| p.key() == key)
    }

    pub fn accepts(&self, tr: &Transaction, state: &EditorState) -> bool {
        self.plugins.iter().all(|p| p.filter_transaction(tr, state))
    }
}

type Predicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Shared flag and optional predicate deciding whether the document may be
/// edited. Clones share both.
#[derive(Clone)]
pub struct Editability {
    editable: Arc<AtomicBool>,
    predicate: Arc<RwLock<Option<Predicate>>>,
}

impl Default for Editability {
    fn default() -> Self {
        Self {
            editable: Arc::new(AtomicBool::new(true)),
            predicate: Arc::new(RwLock::new(None)),
        }
    }
}

impl fmt::Debug for Editability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editability")
            .field("editable", &self.editable.load(Ordering::SeqCst))
            .finish()
    }
}

impl Editability {
    pub fn set(&self, editable: bool) {
        self.editable.store(editable, Ordering::SeqCst);
    }

    /// Install (or with `None`, remove) a predicate consulted on every edit
    pub fn set_predicate(&self, predicate: Option<Predicate>) {
        if let Ok(mut slot) = self.predicate.write() {
            *slot = predicate;
        }
    }

    pub fn is_editable(&self) -> bool {
        if !self.editable.load(Ordering::SeqCst) {
            return false;
        }
        match self.predicate.read() {
            Ok(slot) => slot.as_ref().map_or(true, |p| p()),
            Err(_) => true,
        }
    }
}

pub const EDITABILITY_GATE: &str = "editability";

/// Rejects every document change while the document is read-only.
/// Selection-only transactions still pass.
pub struct EditabilityGate {
    editability: Editability,
}

impl EditabilityGate {
    pub fn new(editability: Editability) -> Self {
        Self { editability }
    }
}

impl Plugin for EditabilityGate {
    fn key(&self) -> &str {
        EDITABILITY_GATE
    }

    fn filter_transaction(&self, tr: &Transaction, _state: &EditorState) -> bool {
        !tr.has_steps() || self.editability.is_editable()
    }
}

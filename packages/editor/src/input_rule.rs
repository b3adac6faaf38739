//! # Input Rules
//!
//! Text patterns that rewrite the document as they are typed: `# ` starts a
//! heading, `**bold**` becomes bold, a URL followed by a space becomes a
//! link.
//!
//! Each rule's pattern runs against the text of the current textblock up to
//! the cursor with the typed text appended, and must be anchored at the end
//! (`$`). Inline atoms appear as [`ATOM_CHAR`] so character offsets and
//! document positions line up. When a rule matches, the typed text is
//! inserted first and the handler edits the result, so every position in
//! the [`RuleMatch`] refers to the document after insertion.
//!
//! Rules never fire with a non-empty selection or inside code.
//!
//! [`ATOM_CHAR`]: crate::state::snapshot::ATOM_CHAR

use crate::errors::EditorError;
use crate::state::plugin::{Dispatch, Plugin};
use crate::state::snapshot::EditorState;
use crate::transform::{TextAnchor, Transform};
use folio_model::{Attrs, Mark, Selection};
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const INPUT_RULES: &str = "input_rules";

/// Transaction tag naming the rule that produced it
pub const INPUT_RULE_TAG: &str = "input_rule";

pub type RuleHandler = Arc<dyn Fn(&mut Transform, &RuleMatch) -> Option<()> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub from: usize,
    pub to: usize,
    pub text: String,
}

/// Where a rule matched, in document positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub start: usize,
    pub end: usize,

    /// Capture groups 1.., `None` for groups that did not participate
    pub groups: Vec<Option<Group>>,
}

impl RuleMatch {
    pub fn group(&self, index: usize) -> Option<&Group> {
        self.groups.get(index.checked_sub(1)?)?.as_ref()
    }
}

#[derive(Clone)]
pub struct InputRule {
    pub name: String,
    pattern: Regex,
    handler: RuleHandler,

    /// Grammar type names the rule needs
    pub requires: Vec<String>,
}

impl fmt::Debug for InputRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputRule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

impl InputRule {
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        handler: impl Fn(&mut Transform, &RuleMatch) -> Option<()> + Send + Sync + 'static,
    ) -> Result<Self, EditorError> {
        let name = name.into();
        let pattern = Regex::new(pattern)
            .map_err(|e| EditorError::configuration(format!("input rule '{name}': {e}")))?;
        Ok(Self {
            name,
            pattern,
            handler: Arc::new(handler),
            requires: Vec::new(),
        })
    }

    pub fn requires<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires = names.into_iter().map(Into::into).collect();
        self
    }

    fn find(&self, line: &str, line_start: usize) -> Option<RuleMatch> {
        let caps = self.pattern.captures(line)?;
        let whole = caps.get(0)?;
        let to_pos = |byte: usize| line_start + line[..byte].chars().count();
        Some(RuleMatch {
            start: to_pos(whole.start()),
            end: to_pos(whole.end()),
            groups: caps
                .iter()
                .skip(1)
                .map(|g| {
                    g.map(|g| Group {
                        from: to_pos(g.start()),
                        to: to_pos(g.end()),
                        text: g.as_str().to_string(),
                    })
                })
                .collect(),
        })
    }
}

/// Delete the delimiters around group 1 and mark what they enclosed.
/// `delim` is the delimiter width on each side.
pub fn mark_rule(
    name: &str,
    pattern: &str,
    delim: usize,
    mark_type: &'static str,
) -> Result<InputRule, EditorError> {
    let rule = InputRule::new(name, pattern, move |tf, m| {
        let g = m.group(1)?;
        let open = g.from.checked_sub(delim)?;
        tf.replace(g.to, g.to + delim, Vec::new()).ok()?;
        tf.replace(open, g.from, Vec::new()).ok()?;
        tf.add_mark(open, g.to - delim, Mark::new(mark_type)).ok()?;
        Some(())
    })?;
    Ok(rule.requires([mark_type]))
}

/// Turn the textblock into `node_type` and delete the matched text.
/// `attrs` computes the attributes from the match.
pub fn block_type_rule(
    name: &str,
    pattern: &str,
    node_type: &'static str,
    attrs: impl Fn(&RuleMatch) -> Option<Attrs> + Send + Sync + 'static,
) -> Result<InputRule, EditorError> {
    let rule = InputRule::new(name, pattern, move |tf, m| {
        let attrs = attrs(m)?;
        tf.replace(m.start, m.end, Vec::new()).ok()?;
        tf.set_block_type(m.start, m.start, node_type, attrs).ok()?;
        Some(())
    })?;
    Ok(rule.requires([node_type]))
}

/// Delete the matched text and wrap the textblock in `wrapper` (with each
/// block in an `item` when given)
pub fn wrapping_rule(
    name: &str,
    pattern: &str,
    wrapper: &'static str,
    item: Option<&'static str>,
    attrs: impl Fn(&RuleMatch) -> Option<Attrs> + Send + Sync + 'static,
) -> Result<InputRule, EditorError> {
    let rule = InputRule::new(name, pattern, move |tf, m| {
        let attrs = attrs(m)?;
        tf.replace(m.start, m.end, Vec::new()).ok()?;
        let cursor = TextAnchor::capture(tf.doc(), m.start)?;
        tf.wrap(m.start, m.start, wrapper, attrs, item).ok()?;
        let restored = cursor.restore(tf.doc());
        tf.set_selection(Selection::cursor(restored));
        Some(())
    })?;
    let mut requires = vec![wrapper];
    requires.extend(item);
    Ok(rule.requires(requires))
}

/// Offers typed text to every rule in order; the first rule whose handler
/// succeeds wins
pub struct InputRulesPlugin {
    rules: Vec<InputRule>,
}

impl InputRulesPlugin {
    pub fn new(rules: Vec<InputRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[InputRule] {
        &self.rules
    }
}

impl Plugin for InputRulesPlugin {
    fn key(&self) -> &str {
        INPUT_RULES
    }

    fn handle_text_input(&self, state: &EditorState, text: &str, dispatch: Dispatch<'_>) -> bool {
        let selection = state.selection();
        if !selection.is_empty() || text.is_empty() || state.in_code(selection.head) {
            return false;
        }
        let Some(block) = state.textblock_at(selection.head) else {
            return false;
        };
        let offset = selection.head - block.content_start();
        let mut line: String = EditorState::textblock_text(&block.node)
            .chars()
            .take(offset)
            .collect();
        line.push_str(text);

        for rule in &self.rules {
            let Some(rule_match) = rule.find(&line, block.content_start()) else {
                continue;
            };
            let mut tf = Transform::new(state);
            if tf
                .insert_text(selection.head, text, state.marks_at(selection.head))
                .is_err()
            {
                return false;
            }
            if (rule.handler)(&mut tf, &rule_match).is_none() {
                continue;
            }
            let tr = tf
                .into_transaction()
                .ui_event("input")
                .tag(INPUT_RULE_TAG, rule.name.clone());
            if state.apply(&tr).is_err() {
                debug!(rule = %rule.name, "input rule produced an invalid transaction");
                continue;
            }
            debug!(rule = %rule.name, "input rule fired");
            dispatch(tr);
            return true;
        }
        false
    }
}

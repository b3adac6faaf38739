//! TeX math as a mark over its own delimited source: `$x^2$` is the text
//! `$x^2$` carrying `math` with `type: InlineMath`, and `$$..$$` the same
//! with `DisplayMath`. Keeping the delimiters in the text lets the user edit
//! them directly; a run that loses them stops being math.

use super::{unexpected, Extension, ExtensionContext};
use crate::errors::EditorError;
use crate::fixup::{Fixup, FixupKind, ProcessorFixup};
use crate::input_rule::InputRule;
use crate::post_process::PostProcessor;
use crate::state::snapshot::{EditorState, ATOM_CHAR};
use folio_convert::ast::inline_text;
use folio_convert::{ConversionError, ConversionRules, Inline, MathType};
use folio_model::{attrs, AttrSpec, Mark, MarkSpec, Node, Transaction};
use std::sync::Arc;

pub const MATH: &str = "math";

const INLINE: &str = "InlineMath";
const DISPLAY: &str = "DisplayMath";

pub struct Math;

pub fn extension(ctx: &ExtensionContext<'_>) -> Option<Box<dyn Extension>> {
    ctx.capabilities
        .tex_math
        .then(|| Box::new(Math) as Box<dyn Extension>)
}

fn delimiter(kind: &str) -> &'static str {
    if kind == DISPLAY {
        "$$"
    } else {
        "$"
    }
}

/// Whether `text` still reads as math of the given kind
fn is_delimited(text: &str, kind: &str) -> bool {
    let delim = delimiter(kind);
    text.len() > 2 * delim.len()
        && text.starts_with(delim)
        && text.ends_with(delim)
        && !text[delim.len()..text.len() - delim.len()].contains('$')
}

impl Extension for Math {
    fn name(&self) -> &str {
        "math"
    }

    fn marks(&self) -> Vec<MarkSpec> {
        vec![MarkSpec::new(MATH)
            .attr("type", AttrSpec::with_default(INLINE))
            .non_inclusive()
            .excludes("_")
            .code()]
    }

    fn input_rules(&self) -> Result<Vec<InputRule>, EditorError> {
        let rule = InputRule::new("inline_math", r"(?:^|[^$\\])(\$[^$\s](?:[^$]*[^$\s])?\$)$", |tf, m| {
            let g = m.group(1)?;
            let mark = tf.schema().mark(MATH, attrs([("type", INLINE)])).ok()?;
            tf.add_mark(g.from, g.to, mark).ok()?;
            Some(())
        })?;
        Ok(vec![rule.requires([MATH])])
    }

    fn mark_post_processors(&self) -> Vec<Arc<dyn PostProcessor>> {
        vec![Arc::new(MathDelimiters)]
    }

    fn fixups(&self) -> Vec<Arc<dyn Fixup>> {
        vec![Arc::new(ProcessorFixup::new(FixupKind::Load, Arc::new(MathDelimiters)))]
    }

    fn conversion_rules(&self, rules: &mut ConversionRules) {
        rules
            .read_inline("Math", |r, i| match i {
                Inline::Math(kind, text) => {
                    let kind = match kind {
                        MathType::DisplayMath => DISPLAY,
                        MathType::InlineMath => INLINE,
                    };
                    let mark = r.schema().mark(MATH, attrs([("type", kind)]))?;
                    let delim = delimiter(kind);
                    r.with_mark(mark, |r| Ok(r.text(&format!("{delim}{text}{delim}"))))
                }
                other => Err(unexpected(other.kind())),
            })
            .write_mark(MATH, |m: &Mark, children| {
                let kind = m.attr_str("type").unwrap_or(INLINE);
                let delim = delimiter(kind);
                let text = inline_text(&children);
                let source = text
                    .strip_prefix(delim)
                    .and_then(|t| t.strip_suffix(delim))
                    .ok_or_else(|| ConversionError::invalid_structure("math without delimiters"))?;
                let kind = if kind == DISPLAY {
                    MathType::DisplayMath
                } else {
                    MathType::InlineMath
                };
                Ok(Inline::Math(kind, source.to_string()))
            });
    }
}

/// Removes `math` from runs that lost their delimiters
pub struct MathDelimiters;

impl PostProcessor for MathDelimiters {
    fn name(&self) -> &str {
        "math_delimiters"
    }

    fn process(&self, state: &EditorState) -> Option<Transaction> {
        let mut broken: Vec<(usize, usize, Mark)> = Vec::new();
        state.doc().descendants(&mut |node: &Node, pos: usize, _: &Node| {
            if !node.is_textblock() {
                return true;
            }
            let mut at = pos + 1;
            let mut run: Option<(usize, Mark, String)> = None;
            for child in node.children() {
                let mark = Mark::find_type(MATH, child.marks()).cloned();
                let continues = matches!((&run, &mark), (Some((_, current, _)), Some(m)) if current == m);
                if !continues {
                    if let Some((from, current, text)) = run.take() {
                        check_run(from, text, current, &mut broken);
                    }
                    run = mark.map(|m| (at, m, String::new()));
                }
                if let Some((_, _, text)) = run.as_mut() {
                    match child.text() {
                        Some(t) => text.push_str(t),
                        None => text.push(ATOM_CHAR),
                    }
                }
                at += child.node_size();
            }
            if let Some((from, current, text)) = run {
                check_run(from, text, current, &mut broken);
            }
            false
        });
        if broken.is_empty() {
            return None;
        }
        Some(
            broken
                .into_iter()
                .fold(Transaction::new(), |tr, (from, to, mark)| tr.remove_mark(from, to, mark)),
        )
    }
}

fn check_run(from: usize, text: String, mark: Mark, broken: &mut Vec<(usize, usize, Mark)>) {
    let kind = mark.attr_str("type").unwrap_or(INLINE).to_string();
    if !is_delimited(&text, &kind) {
        broken.push((from, from + text.chars().count(), mark));
    }
}

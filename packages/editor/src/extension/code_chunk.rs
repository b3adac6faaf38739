//! Executable code chunks (```` ```{r, echo=FALSE} ````). The header is
//! kept verbatim so chunk options survive a round trip; `engine` is read
//! from it for display and for choosing the chunk's language.

use super::code_block::read_code_block;
use super::{unexpected, Extension, ExtensionContext};
use crate::command::{transaction_command, Command, CommandFn};
use crate::errors::EditorError;
use crate::input_rule::InputRule;
use crate::transform::Transform;
use folio_convert::{Attr, Block, ConversionRules};
use folio_model::{attrs, AttrSpec, Attrs, NodeSpec, Selection};

pub const CODE_CHUNK: &str = "code_chunk";

const DEFAULT_ENGINE: &str = "r";

pub struct CodeChunk;

pub fn extension(ctx: &ExtensionContext<'_>) -> Option<Box<dyn Extension>> {
    (ctx.config.embedded_code_chunks && ctx.capabilities.code_chunks).then(|| Box::new(CodeChunk) as Box<dyn Extension>)
}

/// Engine named by a chunk header: `{r, echo=FALSE}` is `r`
pub fn chunk_engine(header: &str) -> Option<String> {
    let inner = header.strip_prefix('{')?.strip_suffix('}')?.trim_start();
    let engine: String = inner
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!engine.is_empty()).then(|| engine.to_lowercase())
}

fn chunk_attrs(header: &str, engine: &str) -> Attrs {
    let mut a = attrs([("engine", engine)]);
    a.insert("header".into(), header.into());
    a
}

impl Extension for CodeChunk {
    fn name(&self) -> &str {
        "code_chunk"
    }

    fn nodes(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::new(CODE_CHUNK, "text*")
            .group("block")
            .code()
            .marks("")
            .attr("engine", AttrSpec::with_default(DEFAULT_ENGINE))
            .attr("header", AttrSpec::with_default(""))]
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::new(CODE_CHUNK, insert_chunk())
            .keys(["Mod-Alt-i"])
            .requires([CODE_CHUNK])]
    }

    fn input_rules(&self) -> Result<Vec<InputRule>, EditorError> {
        let rule = InputRule::new("code_chunk", r"^```(\{[A-Za-z][^}]*\})$", |tf, m| {
            let header = &m.group(1)?.text;
            let engine = chunk_engine(header)?;
            let r = tf.resolve(m.start).ok()?;
            let depth = r.textblock_depth()?;
            let (before, after) = (r.before(depth), r.after(depth));
            let chunk = tf.schema().node(CODE_CHUNK, chunk_attrs(header, &engine), Vec::new()).ok()?;
            tf.replace(before, after, vec![chunk]).ok()?;
            tf.set_selection(Selection::cursor(before + 1));
            Some(())
        })?;
        Ok(vec![rule.requires([CODE_CHUNK])])
    }

    fn conversion_rules(&self, rules: &mut ConversionRules) {
        rules
            .read_block("CodeBlock", |r, b| match b {
                Block::CodeBlock(attr, text) => {
                    let header = attr.classes().first().cloned().unwrap_or_default();
                    match chunk_engine(&header) {
                        Some(engine) => {
                            let content = r.text(text);
                            Ok(vec![r.node(CODE_CHUNK, chunk_attrs(&header, &engine), content)?])
                        }
                        None => read_code_block(r, attr, text),
                    }
                }
                other => Err(unexpected(other.kind())),
            })
            .write_block(CODE_CHUNK, |_, n| {
                let header = match n.attr_str("header").filter(|h| !h.is_empty()) {
                    Some(header) => header.to_string(),
                    None => format!("{{{}}}", n.attr_str("engine").unwrap_or(DEFAULT_ENGINE)),
                };
                Ok(vec![Block::CodeBlock(Attr::with_class(header), n.text_content())])
            });
    }
}

/// Insert an empty R chunk after the current textblock
fn insert_chunk() -> CommandFn {
    transaction_command(|state| {
        let block = state.textblock_at(state.selection().head)?;
        let chunk = state
            .schema()
            .node(CODE_CHUNK, chunk_attrs("{r}", DEFAULT_ENGINE), Vec::new())
            .ok()?;
        let at = block.end();
        let mut tf = Transform::new(state);
        tf.replace(at, at, vec![chunk]).ok()?;
        tf.set_selection(Selection::cursor(at + 1));
        Some(tf.into_transaction().scroll_into_view())
    })
}

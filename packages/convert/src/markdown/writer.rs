//! # Markdown Writer
//!
//! Emits markup from the intermediate representation. Inline runs are first
//! rendered with placeholder characters for breakable whitespace, then laid
//! out according to the wrap mode:
//!
//! ```text
//! Str Space Str SoftBreak Str  →  "a\u{1}b\u{2}c"  →  preserve: "a b\nc"
//!                                                  →  none:     "a b c"
//! ```
//!
//! Text that would change meaning at the start of a line (`#`, `>`, `-`,
//! `1.`) carries a marker that becomes a backslash only when the word lands
//! at a line start after layout.

use super::parser::{identifier_for, unique_identifier};
use crate::ast::{stringify, Attr, Block, Inline, ListNumberDelim, MathType, MetaValue, Pandoc, QuoteType, Target};
use crate::engine::{FormatCapabilities, WrapMode, WriterOptions};
use std::collections::{BTreeMap, HashSet};

const SPACE: char = '\u{1}';
const SOFT_BREAK: char = '\u{2}';
const LINE_START: char = '\u{3}';

/// Render a document as markup
pub fn write(doc: &Pandoc, caps: &FormatCapabilities, options: &WriterOptions) -> String {
    let mut writer = MarkdownWriter {
        caps,
        options,
        notes: Vec::new(),
        references: Vec::new(),
        used_ids: HashSet::new(),
    };

    let mut sections = Vec::new();
    if let Some(front) = writer.front_matter(&doc.meta) {
        sections.push(front);
    }
    let body = writer.blocks(&doc.blocks);
    if !body.is_empty() {
        sections.push(body);
    }

    let mut definitions = Vec::new();
    let mut n = 0;
    while n < writer.notes.len() {
        let blocks = writer.notes[n].clone();
        let text = writer.blocks(&blocks);
        definitions.push(format!("[^{}]: {}", n + 1, indent_continuation(&text, "    ")));
        n += 1;
    }
    if !definitions.is_empty() {
        sections.push(definitions.join("\n\n"));
    }

    if !writer.references.is_empty() {
        let lines: Vec<String> = writer
            .references
            .iter()
            .enumerate()
            .map(|(i, target)| format!("[{}]: {}{}", i + 1, destination(&target.0), title_suffix(&target.1)))
            .collect();
        sections.push(lines.join("\n"));
    }

    sections.join("\n\n")
}

struct MarkdownWriter<'a> {
    caps: &'a FormatCapabilities,
    options: &'a WriterOptions,
    notes: Vec<Vec<Block>>,
    references: Vec<Target>,
    used_ids: HashSet<String>,
}

impl MarkdownWriter<'_> {
    fn front_matter(&mut self, meta: &BTreeMap<String, MetaValue>) -> Option<String> {
        if meta.is_empty() || !self.caps.yaml_metadata {
            return None;
        }
        let mut lines = vec!["---".to_string()];
        for (key, value) in meta {
            let text = match value {
                MetaValue::MetaInlines(inlines) => self.single_line(inlines),
                other => other.to_text(),
            };
            lines.push(format!("{}: {}", key, yaml_scalar(&text)));
        }
        lines.push("---".to_string());
        Some(lines.join("\n"))
    }

    fn blocks(&mut self, blocks: &[Block]) -> String {
        self.join_blocks(blocks, "\n\n")
    }

    fn join_blocks(&mut self, blocks: &[Block], separator: &str) -> String {
        let mut parts = Vec::with_capacity(blocks.len());
        for block in blocks {
            let text = self.block(block);
            if !text.is_empty() {
                parts.push(text);
            }
        }
        parts.join(separator)
    }

    fn block(&mut self, block: &Block) -> String {
        match block {
            Block::Plain(inlines) | Block::Para(inlines) => self.paragraph(inlines),
            Block::Header(level, attr, inlines) => self.heading(*level, attr, inlines),
            Block::CodeBlock(attr, text) => code_block(attr, text),
            Block::RawBlock(_, text) => text.clone(),
            Block::BlockQuote(inner) => {
                let text = self.blocks(inner);
                text.lines()
                    .map(|line| if line.is_empty() { ">".to_string() } else { format!("> {}", line) })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            Block::BulletList(items) => {
                let markers = vec!["-".to_string(); items.len()];
                self.list(items, &markers)
            }
            Block::OrderedList(attrs, items) => {
                let delim = match attrs.2 {
                    ListNumberDelim::OneParen | ListNumberDelim::TwoParens => ')',
                    _ => '.',
                };
                let markers: Vec<String> = (0..items.len())
                    .map(|i| format!("{}{}", attrs.0 + i as i64, delim))
                    .collect();
                self.list(items, &markers)
            }
            Block::HorizontalRule => "* * *".to_string(),
            Block::Div(_, inner) | Block::Figure(_, _, inner) => self.blocks(inner),
        }
    }

    fn heading(&mut self, level: i64, attr: &Attr, inlines: &[Inline]) -> String {
        let text = self.single_line(inlines);
        let expected = unique_identifier(&identifier_for(&stringify(inlines)), &self.used_ids);
        let suffix = if attr.id().is_empty() || attr.id() == expected {
            String::new()
        } else {
            format!(" {{#{}}}", attr.id())
        };
        let id = if attr.id().is_empty() { expected } else { attr.id().to_string() };
        self.used_ids.insert(id);
        let hashes = "#".repeat(level.clamp(1, 6) as usize);
        format!("{} {}{}", hashes, text, suffix).trim_end().to_string()
    }

    /// Items are tight when none of them holds a `Para`
    fn list(&mut self, items: &[Vec<Block>], markers: &[String]) -> String {
        let tight = items
            .iter()
            .all(|blocks| blocks.iter().all(|b| !matches!(b, Block::Para(_))));
        let mut rendered = Vec::with_capacity(items.len());
        for (blocks, marker) in items.iter().zip(markers) {
            let body = if tight {
                self.join_blocks(blocks, "\n")
            } else {
                self.blocks(blocks)
            };
            let indent = " ".repeat(marker.len() + 1);
            if body.is_empty() {
                rendered.push(marker.clone());
            } else {
                rendered.push(format!("{} {}", marker, indent_continuation(&body, &indent)));
            }
        }
        rendered.join(if tight { "\n" } else { "\n\n" })
    }

    fn paragraph(&mut self, inlines: &[Inline]) -> String {
        let text = self.inlines(inlines);
        let laid = match self.options.wrap {
            WrapMode::Preserve => text.replace(SPACE, " ").replace(SOFT_BREAK, "\n"),
            WrapMode::None => text.replace([SPACE, SOFT_BREAK], " "),
            WrapMode::Column(width) => fill(&text, width.max(1)),
            WrapMode::Sentence => sentences(&text),
        };
        resolve_line_starts(&laid)
    }

    fn single_line(&mut self, inlines: &[Inline]) -> String {
        self.inlines(inlines)
            .replace([SPACE, SOFT_BREAK], " ")
            .replace("\\\n", " ")
            .replace(LINE_START, "")
    }

    fn inlines(&mut self, inlines: &[Inline]) -> String {
        let mut out = String::new();
        for inline in inlines {
            self.inline(inline, &mut out);
        }
        out
    }

    fn inline(&mut self, inline: &Inline, out: &mut String) {
        match inline {
            Inline::Str(text) => out.push_str(&self.escape(text)),
            Inline::Space => out.push(SPACE),
            Inline::SoftBreak => out.push(SOFT_BREAK),
            Inline::LineBreak => out.push_str("\\\n"),
            Inline::Emph(inner) => {
                out.push('*');
                out.push_str(&self.inlines(inner));
                out.push('*');
            }
            Inline::Strong(inner) => {
                out.push_str("**");
                out.push_str(&self.inlines(inner));
                out.push_str("**");
            }
            Inline::Strikeout(inner) => {
                out.push_str("~~");
                out.push_str(&self.inlines(inner));
                out.push_str("~~");
            }
            Inline::Code(_, text) => out.push_str(&code_span(text)),
            Inline::Math(MathType::InlineMath, text) => {
                out.push('$');
                out.push_str(text);
                out.push('$');
            }
            Inline::Math(MathType::DisplayMath, text) => {
                out.push_str("$$");
                out.push_str(text);
                out.push_str("$$");
            }
            Inline::Link(attr, content, target) => {
                let plain = stringify(content);
                if attr.has_class("uri") || (plain == target.0 && target.1.is_empty() && target.0.contains(':')) {
                    out.push('<');
                    out.push_str(&target.0);
                    out.push('>');
                    return;
                }
                let text = self.inlines(content);
                if self.options.reference_links {
                    let index = match self.references.iter().position(|t| t == target) {
                        Some(i) => i + 1,
                        None => {
                            self.references.push(target.clone());
                            self.references.len()
                        }
                    };
                    out.push_str(&format!("[{}][{}]", text, index));
                } else {
                    out.push_str(&format!("[{}]({}{})", text, destination(&target.0), title_suffix(&target.1)));
                }
            }
            Inline::Image(_, alt, target) => {
                let text = self.inlines(alt);
                out.push_str(&format!("![{}]({}{})", text, destination(&target.0), title_suffix(&target.1)));
            }
            Inline::Note(blocks) => {
                self.notes.push(blocks.clone());
                out.push_str(&format!("[^{}]", self.notes.len()));
            }
            Inline::Span(_, inner) => out.push_str(&self.inlines(inner)),
            Inline::RawInline(_, text) => out.push_str(text),
            Inline::Quoted(quote, inner) => {
                let mark = match quote {
                    QuoteType::SingleQuote => '\'',
                    QuoteType::DoubleQuote => '"',
                };
                out.push(mark);
                out.push_str(&self.inlines(inner));
                out.push(mark);
            }
            Inline::SmallCaps(inner)
            | Inline::Underline(inner)
            | Inline::Superscript(inner)
            | Inline::Subscript(inner)
            | Inline::Cite(_, inner) => out.push_str(&self.inlines(inner)),
        }
    }

    /// Backslash-escape characters that would otherwise start markup
    fn escape(&self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len() + 4);
        let line_start_at = line_start_hazard(text);
        for (i, &c) in chars.iter().enumerate() {
            if line_start_at == Some(i) {
                out.push(LINE_START);
            }
            let escaped = match c {
                '\\' | '*' | '`' | '[' | ']' => true,
                '_' => {
                    let before = i.checked_sub(1).and_then(|p| chars.get(p));
                    let after = chars.get(i + 1);
                    !before.map(|c| c.is_alphanumeric()).unwrap_or(false)
                        || !after.map(|c| c.is_alphanumeric()).unwrap_or(false)
                }
                '$' => self.caps.tex_math,
                '~' => self.caps.strikeout,
                '<' => chars.get(i + 1).map(|n| n.is_alphabetic() || *n == '/').unwrap_or(false),
                _ => false,
            };
            if escaped {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }
}

/// Char index where a line-start marker goes when `text` would begin a
/// heading, block quote, list item or rule
fn line_start_hazard(text: &str) -> Option<usize> {
    if text.is_empty() {
        return None;
    }
    if text.chars().all(|c| c == '#') || text.starts_with('>') || text == "+" || text.chars().all(|c| c == '-') {
        return Some(0);
    }
    let digits = text.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 && text.len() == digits + 1 && text.ends_with(['.', ')']) {
        return Some(digits);
    }
    None
}

/// Turn markers at the start of a line into backslashes and drop the rest
fn resolve_line_starts(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let digits = line.chars().take_while(char::is_ascii_digit).count();
            let at = if line.starts_with(LINE_START) {
                Some(0)
            } else if digits > 0 && line[digits..].starts_with(LINE_START) {
                Some(digits)
            } else {
                None
            };
            match at {
                Some(at) => format!(
                    "{}\\{}",
                    &line[..at],
                    line[at + LINE_START.len_utf8()..].replace(LINE_START, "")
                ),
                None => line.replace(LINE_START, ""),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn visible_len(word: &str) -> usize {
    word.chars().filter(|c| *c != LINE_START).count()
}

/// Greedy fill at `width` columns. Hard breaks always end a line.
fn fill(text: &str, width: usize) -> String {
    text.split('\n')
        .map(|segment| {
            let mut lines = Vec::new();
            let mut current = String::new();
            let mut len = 0;
            for word in segment.split([SPACE, SOFT_BREAK]).filter(|w| !w.is_empty()) {
                let w = visible_len(word);
                if len > 0 && len + 1 + w > width {
                    lines.push(std::mem::take(&mut current));
                    len = 0;
                }
                if len > 0 {
                    current.push(' ');
                    len += 1;
                }
                current.push_str(word);
                len += w;
            }
            lines.push(current);
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One sentence per line
fn sentences(text: &str) -> String {
    text.split('\n')
        .map(|segment| {
            let mut out = String::new();
            for word in segment.split([SPACE, SOFT_BREAK]).filter(|w| !w.is_empty()) {
                if !out.is_empty() {
                    let ended = out
                        .trim_end_matches(['"', '\'', ')', '*', '_'])
                        .ends_with(['.', '!', '?']);
                    out.push(if ended { '\n' } else { ' ' });
                }
                out.push_str(word);
            }
            out
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Indent every line after the first, leaving blank lines empty
fn indent_continuation(text: &str, indent: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 || line.is_empty() {
                line.to_string()
            } else {
                format!("{}{}", indent, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn code_block(attr: &Attr, text: &str) -> String {
    let longest = text
        .lines()
        .map(|l| l.trim_start().chars().take_while(|c| *c == '`').count())
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest.max(2) + 1);
    let info = code_info(attr);
    if text.is_empty() {
        format!("{}{}\n{}", fence, info, fence)
    } else {
        format!("{}{}\n{}\n{}", fence, info, text, fence)
    }
}

fn code_info(attr: &Attr) -> String {
    if attr.id().is_empty() && attr.2.is_empty() {
        return match attr.classes() {
            [] => String::new(),
            [single] => single.clone(),
            many => format!("{{{}}}", many.iter().map(|c| format!(".{}", c)).collect::<Vec<_>>().join(" ")),
        };
    }
    let mut parts = Vec::new();
    if !attr.id().is_empty() {
        parts.push(format!("#{}", attr.id()));
    }
    parts.extend(attr.classes().iter().map(|c| format!(".{}", c)));
    parts.extend(attr.2.iter().map(|(k, v)| format!("{}=\"{}\"", k, v)));
    format!("{{{}}}", parts.join(" "))
}

fn code_span(text: &str) -> String {
    let text = text.replace('\n', " ");
    let mut longest = 0;
    let mut run = 0;
    for c in text.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    let fence = "`".repeat(longest + 1);
    let pad = text.starts_with('`')
        || text.ends_with('`')
        || (text.len() >= 2 && text.starts_with(' ') && text.ends_with(' ') && !text.trim().is_empty());
    if pad {
        format!("{} {} {}", fence, text, fence)
    } else {
        format!("{}{}{}", fence, text, fence)
    }
}

fn destination(url: &str) -> String {
    if url.is_empty() || url.contains([' ', '(', ')']) {
        format!("<{}>", url)
    } else {
        url.to_string()
    }
}

fn title_suffix(title: &str) -> String {
    if title.is_empty() {
        String::new()
    } else {
        format!(" \"{}\"", title.replace('"', "\\\""))
    }
}

fn yaml_scalar(text: &str) -> String {
    let needs_quotes = text.is_empty()
        || text != text.trim()
        || text.contains([':', '#', '"', '\'', '*', '&', '!', '|', '>', '%', '@', '`', '[', ']', '{', '}', ',']);
    if needs_quotes {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ListAttributes;
    use crate::markdown::parser::parse;

    fn s(text: &str) -> Inline {
        Inline::Str(text.into())
    }

    fn render(doc: &Pandoc) -> String {
        write(doc, &FormatCapabilities::all(), &WriterOptions::default())
    }

    fn render_with(doc: &Pandoc, wrap: WrapMode) -> String {
        let options = WriterOptions {
            wrap,
            ..Default::default()
        };
        write(doc, &FormatCapabilities::all(), &options)
    }

    fn words(text: &str) -> Vec<Inline> {
        crate::ast::text_inlines(text)
            .into_iter()
            .map(|i| if i == Inline::SoftBreak { Inline::Space } else { i })
            .collect()
    }

    #[test]
    fn test_heading_and_paragraph() {
        let doc = Pandoc::new(vec![
            Block::Header(1, Attr::with_id("title"), vec![s("Title")]),
            Block::Para(vec![s("Hello"), Inline::Space, s("world.")]),
        ]);
        assert_eq!(render(&doc), "# Title\n\nHello world.");
    }

    #[test]
    fn test_quotes_figures_and_styling_write_their_content() {
        use crate::ast::{Caption, QuoteType};
        let image = Inline::Image(Attr::default(), vec![s("alt")], Target("a.png".into(), String::new()));
        let doc = Pandoc::new(vec![
            Block::Para(vec![
                Inline::Quoted(QuoteType::DoubleQuote, vec![s("hi")]),
                Inline::Space,
                Inline::Underline(vec![s("there")]),
            ]),
            Block::Figure(
                Attr::default(),
                Caption(None, vec![Block::Plain(vec![s("alt")])]),
                vec![Block::Plain(vec![image])],
            ),
        ]);
        assert_eq!(render(&doc), "\"hi\" there\n\n![alt](a.png)");
    }

    #[test]
    fn test_explicit_heading_id_kept() {
        let doc = Pandoc::new(vec![Block::Header(2, Attr::with_id("custom"), vec![s("Intro")])]);
        assert_eq!(render(&doc), "## Intro {#custom}");
    }

    #[test]
    fn test_marks_and_escapes() {
        let doc = Pandoc::new(vec![Block::Para(vec![
            Inline::Strong(vec![s("bold")]),
            Inline::Space,
            Inline::Emph(vec![s("it")]),
            Inline::Space,
            s("a*b"),
            Inline::Space,
            s("snake_case"),
            Inline::Space,
            s("_x"),
            Inline::Space,
            s("$5"),
            Inline::Space,
            Inline::Code(Attr::default(), "x`y".into()),
        ])]);
        assert_eq!(render(&doc), "**bold** *it* a\\*b snake_case \\_x \\$5 ``x`y``");
    }

    #[test]
    fn test_line_start_escapes() {
        let doc = Pandoc::new(vec![Block::Para(vec![
            s("#"),
            Inline::Space,
            s("not"),
            Inline::SoftBreak,
            s("1."),
            Inline::Space,
            s("heading"),
            Inline::SoftBreak,
            s("-"),
            Inline::Space,
            s("x"),
        ])]);
        assert_eq!(render(&doc), "\\# not\n1\\. heading\n\\- x");
        assert_eq!(render_with(&doc, WrapMode::None), "\\# not 1. heading - x");
    }

    #[test]
    fn test_wrap_column() {
        let doc = Pandoc::new(vec![Block::Para(words("one two three four five six"))]);
        assert_eq!(render_with(&doc, WrapMode::Column(10)), "one two\nthree four\nfive six");
    }

    #[test]
    fn test_wrap_sentence() {
        let doc = Pandoc::new(vec![Block::Para(words("First one. Second one! Third"))]);
        assert_eq!(render_with(&doc, WrapMode::Sentence), "First one.\nSecond one!\nThird");
    }

    #[test]
    fn test_lists() {
        let doc = Pandoc::new(vec![
            Block::BulletList(vec![vec![Block::Plain(vec![s("a")])], vec![Block::Plain(vec![s("b")])]]),
            Block::OrderedList(
                ListAttributes::starting_at(3),
                vec![vec![Block::Para(vec![s("c")])], vec![Block::Para(vec![s("d")])]],
            ),
        ]);
        assert_eq!(render(&doc), "- a\n- b\n\n3. c\n\n4. d");
    }

    #[test]
    fn test_notes_and_reference_links() {
        let doc = Pandoc::new(vec![Block::Para(vec![
            Inline::Link(Attr::default(), vec![s("site")], Target("https://x.org".into(), "".into())),
            Inline::Note(vec![Block::Para(vec![s("first")]), Block::Para(vec![s("second")])]),
        ])]);
        let options = WriterOptions {
            reference_links: true,
            ..Default::default()
        };
        let text = write(&doc, &FormatCapabilities::all(), &options);
        assert_eq!(
            text,
            "[site][1][^1]\n\n[^1]: first\n\n    second\n\n[1]: https://x.org"
        );
    }

    #[test]
    fn test_code_blocks() {
        let doc = Pandoc::new(vec![
            Block::CodeBlock(Attr::with_class("{r, echo=FALSE}"), "plot(x)".into()),
            Block::CodeBlock(Attr::default(), "```\nnested\n```".into()),
        ]);
        assert_eq!(
            render(&doc),
            "```{r, echo=FALSE}\nplot(x)\n```\n\n````\n```\nnested\n```\n````"
        );
    }

    #[test]
    fn test_front_matter() {
        let mut doc = Pandoc::new(vec![Block::Para(vec![s("Body")])]);
        doc.meta.insert(
            "title".into(),
            MetaValue::MetaInlines(vec![s("My"), Inline::Space, Inline::Emph(vec![s("Notes")])]),
        );
        assert_eq!(render(&doc), "---\ntitle: \"My *Notes*\"\n---\n\nBody");
    }

    #[test]
    fn test_output_reparses_to_same_tree() {
        let source = "---\ntitle: Report\n---\n\n# Intro {#start}\n\nSome *em* and **strong** text with `code`, $x^2$\nand a [link](https://x.org \"X\").[^1]\n\n> quoted\n\n- one\n- two\n\n1. first\n\n2. second\n\n```python\nprint(1)\n```\n\n* * *\n\n[^1]: A note.";
        let caps = FormatCapabilities::all();
        let first = parse(source, &caps).unwrap();
        let text = write(&first, &caps, &WriterOptions::default());
        let second = parse(&text, &caps).unwrap();
        assert_eq!(first, second);
        assert_eq!(write(&second, &caps, &WriterOptions::default()), text);
    }
}

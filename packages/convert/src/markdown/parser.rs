//! # Markdown Parser
//!
//! A line-oriented block pass followed by a token-based inline pass.
//!
//! ```text
//! source ─front matter─> lines ─note/link definitions─> blocks ─lexer─> inlines
//! ```
//!
//! Footnote and reference-link definitions are collected before any block is
//! built so references may appear ahead of their definitions.

use super::lexer::{tokenize, InlineToken, Spanned};
use crate::ast::{
    stringify, Attr, Block, Inline, ListAttributes, ListNumberDelim, ListNumberStyle, MathType, MetaValue,
    Pandoc, Target,
};
use crate::engine::FormatCapabilities;
use crate::error::{ConversionError, ConversionResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;

/// Parse markup into the intermediate representation
pub fn parse(markup: &str, caps: &FormatCapabilities) -> ConversionResult<Pandoc> {
    MarkdownParser::new(caps).parse_document(markup)
}

/// Heading identifier derived from its text: lowercase, punctuation other
/// than `_-.` dropped, whitespace runs turned into one hyphen, leading
/// non-letters removed. Falls back to `section`.
pub fn identifier_for(text: &str) -> String {
    let mut out = String::new();
    let mut pending_space = false;
    for c in text.chars() {
        if out.is_empty() && !c.is_alphabetic() {
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
        } else if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
            if pending_space {
                out.push('-');
                pending_space = false;
            }
            out.extend(c.to_lowercase());
        }
    }
    if out.is_empty() {
        "section".to_string()
    } else {
        out
    }
}

/// First free identifier for `base`, suffixing `-1`, `-2`, ...
pub fn unique_identifier(base: &str, used: &HashSet<String>) -> String {
    if !used.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[derive(Debug, Clone)]
struct Line {
    text: String,
    number: usize,
    /// Characters removed from the front of the source line
    offset: usize,
}

impl Line {
    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Remove up to `width` columns of leading whitespace
    fn strip_indent(&self, width: usize) -> Line {
        let mut columns = 0;
        let mut bytes = 0;
        for c in self.text.chars() {
            if columns >= width {
                break;
            }
            match c {
                ' ' => columns += 1,
                '\t' => columns += 4,
                _ => break,
            }
            bytes += 1;
        }
        self.strip_bytes(bytes)
    }

    fn strip_bytes(&self, bytes: usize) -> Line {
        let bytes = bytes.min(self.text.len());
        Line {
            text: self.text[bytes..].to_string(),
            number: self.number,
            offset: self.offset + bytes,
        }
    }
}

fn indentation(text: &str) -> usize {
    text.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Inline text assembled from one or more lines, remembering where each
/// line came from for error positions
struct InlineSource {
    text: String,
    /// (offset in `text`, line number, column of that offset)
    segments: Vec<(usize, usize, usize)>,
}

impl InlineSource {
    fn from_lines(lines: &[Line]) -> Self {
        let mut text = String::new();
        let mut segments = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                text.push('\n');
            }
            let trimmed = line.text.trim_start();
            let lead = line.text.len() - trimmed.len();
            segments.push((text.len(), line.number, line.offset + lead + 1));
            text.push_str(trimmed);
        }
        let end = text.trim_end().len();
        text.truncate(end);
        Self { text, segments }
    }

    fn single(text: &str, line: usize, column: usize) -> Self {
        Self {
            text: text.to_string(),
            segments: vec![(0, line, column)],
        }
    }

    fn locate(&self, offset: usize) -> (usize, usize) {
        let (start, line, column) = self
            .segments
            .iter()
            .rev()
            .find(|(start, ..)| *start <= offset)
            .copied()
            .unwrap_or((0, 1, 1));
        let chars = self.text.get(start..offset).map(|s| s.chars().count()).unwrap_or(0);
        (line, column + chars)
    }
}

#[derive(Debug, Clone)]
struct Fence {
    ch: char,
    len: usize,
    indent: usize,
    info: String,
}

fn open_fence(text: &str) -> Option<Fence> {
    let indent = indentation(text);
    if indent > 3 {
        return None;
    }
    let rest = text.trim_start();
    let ch = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = rest.chars().take_while(|c| *c == ch).count();
    if len < 3 {
        return None;
    }
    let info = rest[len..].trim();
    if ch == '`' && info.contains('`') {
        return None;
    }
    Some(Fence {
        ch,
        len,
        indent,
        info: info.to_string(),
    })
}

fn closes_fence(text: &str, fence: &Fence) -> bool {
    if indentation(text) > 3 {
        return false;
    }
    let rest = text.trim_start();
    let run = rest.chars().take_while(|c| *c == fence.ch).count();
    run >= fence.len && rest[run..].trim().is_empty()
}

struct Heading<'t> {
    level: usize,
    content: &'t str,
    start: usize,
}

fn atx_heading(text: &str) -> Option<Heading<'_>> {
    if indentation(text) > 3 {
        return None;
    }
    let rest = text.trim_start();
    let level = rest.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let after = &rest[level..];
    if !after.is_empty() && !after.starts_with([' ', '\t']) {
        return None;
    }
    let start = text.len() - rest.len() + level + (after.len() - after.trim_start().len());
    let mut content = after.trim();
    let unclosed = content.trim_end_matches('#');
    if unclosed.is_empty() {
        content = "";
    } else if unclosed.len() < content.len() && unclosed.ends_with([' ', '\t']) {
        content = unclosed.trim_end();
    }
    Some(Heading { level, content, start })
}

fn is_thematic_break(text: &str) -> bool {
    if indentation(text) > 3 {
        return false;
    }
    let rest: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let Some(ch) = rest.chars().next() else {
        return false;
    };
    matches!(ch, '*' | '-' | '_') && rest.len() >= 3 && rest.chars().all(|c| c == ch)
}

#[derive(Debug, Clone, Copy)]
struct ListMarker {
    ordered: bool,
    /// Bullet character, or the delimiter of an ordered marker
    symbol: char,
    start: i64,
    /// Bytes up to the item content
    width: usize,
    empty: bool,
}

impl ListMarker {
    fn same_list(&self, other: &ListMarker) -> bool {
        self.ordered == other.ordered && self.symbol == other.symbol
    }
}

fn list_marker(text: &str) -> Option<ListMarker> {
    if indentation(text) > 3 {
        return None;
    }
    let rest = text.trim_start();
    let lead = text.len() - rest.len();
    let first = rest.chars().next()?;
    let (marker_len, ordered, start, symbol) = if matches!(first, '-' | '+' | '*') {
        (1, false, 1, first)
    } else {
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 || digits > 9 {
            return None;
        }
        let delim = rest[digits..].chars().next().filter(|c| *c == '.' || *c == ')')?;
        let start = rest[..digits].parse().ok()?;
        (digits + 1, true, start, delim)
    };
    let after = &rest[marker_len..];
    if after.trim().is_empty() {
        return Some(ListMarker {
            ordered,
            symbol,
            start,
            width: lead + marker_len + 1,
            empty: true,
        });
    }
    let spaces = after.chars().take_while(|c| *c == ' ').count();
    if spaces == 0 {
        return None;
    }
    let spaces = if spaces > 4 { 1 } else { spaces };
    Some(ListMarker {
        ordered,
        symbol,
        start,
        width: lead + marker_len + spaces,
        empty: false,
    })
}

/// Lines that end a paragraph without a blank line in between
fn interrupts_paragraph(text: &str) -> bool {
    if atx_heading(text).is_some() || open_fence(text).is_some() || is_thematic_break(text) {
        return true;
    }
    if indentation(text) <= 3 && text.trim_start().starts_with('>') {
        return true;
    }
    match list_marker(text) {
        Some(marker) => !marker.empty && (!marker.ordered || marker.start == 1),
        None => false,
    }
}

fn footnote_definition(text: &str) -> Option<(String, usize)> {
    let rest = text.strip_prefix("[^")?;
    let close = rest.find("]:")?;
    let label = &rest[..close];
    if label.is_empty() || label.contains(char::is_whitespace) {
        return None;
    }
    let after = &rest[close + 2..];
    let lead = after.len() - after.trim_start().len();
    Some((label.to_string(), 2 + close + 2 + lead))
}

fn reference_definition(text: &str) -> Option<(String, Target)> {
    if indentation(text) > 3 {
        return None;
    }
    let rest = text.trim_start().strip_prefix('[')?;
    if rest.starts_with('^') {
        return None;
    }
    let close = rest.find("]:")?;
    let label = &rest[..close];
    if label.trim().is_empty() {
        return None;
    }
    let after = rest[close + 2..].trim();
    let (url, tail) = match after.strip_prefix('<') {
        Some(bracketed) => {
            let end = bracketed.find('>')?;
            (&bracketed[..end], bracketed[end + 1..].trim())
        }
        None => match after.find(char::is_whitespace) {
            Some(split) => (&after[..split], after[split..].trim()),
            None => (after, ""),
        },
    };
    if url.is_empty() {
        return None;
    }
    let title = link_title(tail)?;
    Some((normalize_label(label), Target(unescape(url), unescape(title))))
}

fn link_title(text: &str) -> Option<&str> {
    if text.is_empty() {
        return Some("");
    }
    let quoted = text.len() >= 2
        && ((text.starts_with('"') && text.ends_with('"'))
            || (text.starts_with('\'') && text.ends_with('\''))
            || (text.starts_with('(') && text.ends_with(')')));
    quoted.then(|| &text[1..text.len() - 1])
}

fn normalize_label(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.peek().copied().filter(char::is_ascii_punctuation) {
                out.push(next);
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return value[1..value.len() - 1].replace("\\\"", "\"").replace("\\\\", "\\");
    }
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].replace("''", "'");
    }
    value.to_string()
}

/// Pandoc attribute list: `#id .class key=value`
fn attribute_list(inner: &str) -> Attr {
    let mut attr = Attr::default();
    for token in inner.split_whitespace() {
        if let Some(id) = token.strip_prefix('#') {
            attr.0 = id.to_string();
        } else if let Some(class) = token.strip_prefix('.') {
            attr.1.push(class.to_string());
        } else if let Some((key, value)) = token.split_once('=') {
            attr.2.push((key.to_string(), unquote(value)));
        } else {
            attr.1.push(token.to_string());
        }
    }
    attr
}

/// Index of the `]` closing a bracket opened just before `from`
fn matching_bracket(text: &str, from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut escaped = false;
    for (i, c) in text[from..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '[' => depth += 1,
            ']' if depth == 0 => return Some(from + i),
            ']' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Inline destination `(url "title")` starting after the `(`; returns the
/// target and the offset after the closing `)`
fn inline_destination(text: &str, from: usize) -> Option<(Target, usize)> {
    let mut depth = 0usize;
    let mut escaped = false;
    let mut close = None;
    for (i, c) in text[from..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' if depth == 0 => {
                close = Some(from + i);
                break;
            }
            ')' => depth -= 1,
            _ => {}
        }
    }
    let close = close?;
    let inner = text[from..close].trim();
    let (url, tail) = match inner.strip_prefix('<') {
        Some(bracketed) => {
            let end = bracketed.find('>')?;
            (&bracketed[..end], bracketed[end + 1..].trim())
        }
        None => match inner.find(char::is_whitespace) {
            Some(split) => (&inner[..split], inner[split..].trim()),
            None => (inner, ""),
        },
    };
    let title = link_title(tail)?;
    Some((Target(unescape(url), unescape(title)), close + 1))
}

/// Code span contents: line endings become spaces, one surrounding space
/// is stripped when present on both sides
fn code_span_text(raw: &str) -> String {
    let text = raw.replace('\n', " ");
    if text.len() >= 2 && text.starts_with(' ') && text.ends_with(' ') && !text.trim().is_empty() {
        text[1..text.len() - 1].to_string()
    } else {
        text
    }
}

fn bare_uri_end(text: &str, start: usize) -> Option<usize> {
    let rest = &text[start..];
    if !["http://", "https://", "ftp://", "mailto:"].iter().any(|s| rest.starts_with(s)) {
        return None;
    }
    let len = rest.find(|c: char| c.is_whitespace() || c == '<').unwrap_or(rest.len());
    let trimmed = rest[..len].trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '"', '\'']);
    (trimmed.len() > rest.find(':').unwrap_or(0) + 1).then_some(start + trimmed.len())
}

enum Item {
    Inline(Inline),
    Delim(Delim),
}

struct Delim {
    ch: char,
    count: usize,
    original: usize,
    can_open: bool,
    can_close: bool,
}

fn is_punctuation(c: Option<char>) -> bool {
    c.map(|c| c.is_ascii_punctuation() || (!c.is_alphanumeric() && !c.is_whitespace()))
        .unwrap_or(false)
}

fn is_space(c: Option<char>) -> bool {
    c.map(char::is_whitespace).unwrap_or(true)
}

/// Classify a delimiter run by its flanking characters
fn delimiter(text: &str, span: &Range<usize>, ch: char) -> Delim {
    let before = text[..span.start].chars().next_back();
    let after = text[span.end..].chars().next();
    let left = !is_space(after) && (!is_punctuation(after) || is_space(before) || is_punctuation(before));
    let right = !is_space(before) && (!is_punctuation(before) || is_space(after) || is_punctuation(after));
    let (can_open, can_close) = if ch == '_' {
        (
            left && (!right || is_punctuation(before)),
            right && (!left || is_punctuation(after)),
        )
    } else {
        (left, right)
    };
    Delim {
        ch,
        count: span.len(),
        original: span.len(),
        can_open,
        can_close,
    }
}

fn push_str(items: &mut Vec<Item>, text: &str) {
    if let Some(Item::Inline(Inline::Str(last))) = items.last_mut() {
        last.push_str(text);
    } else {
        items.push(Item::Inline(Inline::Str(text.to_string())));
    }
}

/// Flatten items into inlines, turning unmatched delimiters into text
fn collapse(items: Vec<Item>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::with_capacity(items.len());
    for item in items {
        let inline = match item {
            Item::Inline(inline) => inline,
            Item::Delim(d) if d.count == 0 => continue,
            Item::Delim(d) => Inline::Str(d.ch.to_string().repeat(d.count)),
        };
        if let (Some(Inline::Str(prev)), Inline::Str(text)) = (out.last_mut(), &inline) {
            prev.push_str(text);
            continue;
        }
        out.push(inline);
    }
    out
}

fn trim_breaks(mut inlines: Vec<Inline>) -> Vec<Inline> {
    while matches!(inlines.first(), Some(Inline::Space | Inline::SoftBreak)) {
        inlines.remove(0);
    }
    while matches!(inlines.last(), Some(Inline::Space | Inline::SoftBreak | Inline::LineBreak)) {
        inlines.pop();
    }
    inlines
}

/// Pair delimiter runs into emphasis, strong emphasis and strikeout
fn process_emphasis(items: &mut Vec<Item>) {
    let mut closer = 0;
    while closer < items.len() {
        let (ch, closer_count, closer_original, closer_can_open) = match &items[closer] {
            Item::Delim(d) if d.can_close && d.count > 0 => (d.ch, d.count, d.original, d.can_open),
            _ => {
                closer += 1;
                continue;
            }
        };
        let opener = (0..closer).rev().find(|&j| match &items[j] {
            Item::Delim(o) if o.ch == ch && o.can_open && o.count > 0 => {
                let odd_match = (o.can_close || closer_can_open)
                    && (o.original + closer_original) % 3 == 0
                    && !(o.original % 3 == 0 && closer_original % 3 == 0);
                ch == '~' || !odd_match
            }
            _ => false,
        });
        let Some(open) = opener else {
            closer += 1;
            continue;
        };
        let opener_count = match &items[open] {
            Item::Delim(o) => o.count,
            Item::Inline(_) => 0,
        };
        let used = if ch == '~' || (opener_count >= 2 && closer_count >= 2) {
            2
        } else {
            1
        };

        let inner = collapse(items.drain(open + 1..closer).collect());
        let wrapped = match (ch, used) {
            ('~', _) => Inline::Strikeout(inner),
            (_, 2) => Inline::Strong(inner),
            _ => Inline::Emph(inner),
        };
        items.insert(open + 1, Item::Inline(wrapped));

        let mut close_at = open + 2;
        if let Item::Delim(o) = &mut items[open] {
            o.count -= used;
        }
        if let Item::Delim(c) = &mut items[close_at] {
            c.count -= used;
        }
        if matches!(&items[open], Item::Delim(o) if o.count == 0) {
            items.remove(open);
            close_at -= 1;
        }
        if matches!(&items[close_at], Item::Delim(c) if c.count == 0) {
            items.remove(close_at);
        }
        closer = close_at;
    }
}

struct MarkdownParser<'a> {
    caps: &'a FormatCapabilities,
    notes: HashMap<String, Vec<Line>>,
    references: HashMap<String, Target>,
    expanding: Vec<String>,
    used_ids: HashSet<String>,
}

impl<'a> MarkdownParser<'a> {
    fn new(caps: &'a FormatCapabilities) -> Self {
        Self {
            caps,
            notes: HashMap::new(),
            references: HashMap::new(),
            expanding: Vec::new(),
            used_ids: HashSet::new(),
        }
    }

    fn parse_document(&mut self, markup: &str) -> ConversionResult<Pandoc> {
        let mut lines: Vec<Line> = markup
            .lines()
            .enumerate()
            .map(|(i, text)| Line {
                text: text.to_string(),
                number: i + 1,
                offset: 0,
            })
            .collect();

        let mut meta = BTreeMap::new();
        let opens_front_matter = lines.first().map(|l| l.text.trim_end() == "---").unwrap_or(false)
            && lines.get(1).map(|l| !l.is_blank()).unwrap_or(false);
        if self.caps.yaml_metadata && opens_front_matter {
            let close = lines
                .iter()
                .skip(1)
                .position(|l| matches!(l.text.trim_end(), "---" | "..."))
                .map(|p| p + 1)
                .ok_or_else(|| ConversionError::syntax("unterminated front matter", 1, 1))?;
            meta = self.front_matter(&lines[1..close])?;
            lines.drain(..=close);
        }

        let lines = self.collect_definitions(lines);
        let mut doc = Pandoc::new(self.parse_blocks(&lines)?);
        doc.meta = meta;
        Ok(doc)
    }

    /// Top-level `key: value` pairs. `title` is read as inline markup,
    /// everything else as a plain string; nested values are skipped.
    fn front_matter(&mut self, lines: &[Line]) -> ConversionResult<BTreeMap<String, MetaValue>> {
        let mut meta = BTreeMap::new();
        for line in lines {
            if line.text.starts_with([' ', '\t', '#', '-']) {
                continue;
            }
            let Some((key, value)) = line.text.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = unquote(value);
            if key.is_empty() || value.is_empty() {
                continue;
            }
            let entry = if key == "title" {
                let column = line.text.find(value.as_str()).map(|p| p + 1).unwrap_or(1);
                let source = InlineSource::single(&value, line.number, column);
                MetaValue::MetaInlines(self.inlines(&source)?)
            } else {
                MetaValue::MetaString(value)
            };
            meta.insert(key.to_string(), entry);
        }
        Ok(meta)
    }

    /// Pull footnote and reference-link definitions out of the line list
    fn collect_definitions(&mut self, lines: Vec<Line>) -> Vec<Line> {
        let mut out = Vec::with_capacity(lines.len());
        let mut fence: Option<Fence> = None;
        let mut i = 0;
        while i < lines.len() {
            let line = &lines[i];
            if let Some(open) = &fence {
                if closes_fence(&line.text, open) {
                    fence = None;
                }
                out.push(line.clone());
                i += 1;
                continue;
            }
            if let Some(open) = open_fence(&line.text) {
                fence = Some(open);
                out.push(line.clone());
                i += 1;
                continue;
            }

            if self.caps.footnotes {
                if let Some((label, content_start)) = footnote_definition(&line.text) {
                    let mut body = vec![line.strip_bytes(content_start)];
                    i += 1;
                    while i < lines.len() {
                        let next = &lines[i];
                        if next.is_blank() {
                            let continues = lines
                                .get(i + 1)
                                .map(|l| !l.is_blank() && indentation(&l.text) >= 4)
                                .unwrap_or(false);
                            if !continues {
                                break;
                            }
                            body.push(next.clone());
                        } else if indentation(&next.text) >= 4 {
                            body.push(next.strip_indent(4));
                        } else if !body.last().map(Line::is_blank).unwrap_or(true)
                            && !interrupts_paragraph(&next.text)
                            && footnote_definition(&next.text).is_none()
                        {
                            body.push(next.clone());
                        } else {
                            break;
                        }
                        i += 1;
                    }
                    self.notes.entry(label).or_insert(body);
                    continue;
                }
            }

            if let Some((label, target)) = reference_definition(&line.text) {
                self.references.entry(label).or_insert(target);
                i += 1;
                continue;
            }

            out.push(line.clone());
            i += 1;
        }
        out
    }

    fn parse_blocks(&mut self, lines: &[Line]) -> ConversionResult<Vec<Block>> {
        let mut blocks = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let line = &lines[i];
            if line.is_blank() {
                i += 1;
                continue;
            }
            if indentation(&line.text) >= 4 {
                let (block, next) = indented_code(lines, i);
                blocks.push(block);
                i = next;
            } else if let Some(fence) = open_fence(&line.text) {
                let (block, next) = self.fenced_code(lines, i, &fence);
                blocks.push(block);
                i = next;
            } else if let Some(heading) = atx_heading(&line.text) {
                blocks.push(self.heading(line, &heading)?);
                i += 1;
            } else if is_thematic_break(&line.text) {
                blocks.push(Block::HorizontalRule);
                i += 1;
            } else if line.text.trim_start().starts_with('>') {
                let (block, next) = self.block_quote(lines, i)?;
                blocks.push(block);
                i = next;
            } else if let Some(marker) = list_marker(&line.text) {
                let (block, next) = self.list(lines, i, marker)?;
                blocks.push(block);
                i = next;
            } else {
                let mut end = i + 1;
                while end < lines.len() && !lines[end].is_blank() && !interrupts_paragraph(&lines[end].text) {
                    end += 1;
                }
                let source = InlineSource::from_lines(&lines[i..end]);
                let inlines = self.inlines(&source)?;
                if !inlines.is_empty() {
                    blocks.push(Block::Para(inlines));
                }
                i = end;
            }
        }
        Ok(blocks)
    }

    fn fenced_code(&self, lines: &[Line], start: usize, fence: &Fence) -> (Block, usize) {
        let close = lines[start + 1..]
            .iter()
            .position(|l| closes_fence(&l.text, fence))
            .map(|p| p + start + 1);
        let end = close.unwrap_or(lines.len());
        let content: Vec<String> = lines[start + 1..end]
            .iter()
            .map(|l| l.strip_indent(fence.indent).text)
            .collect();
        let next = close.map(|c| c + 1).unwrap_or(lines.len());
        (Block::CodeBlock(self.code_attr(&fence.info), content.join("\n")), next)
    }

    /// Attributes of a fence info string. Chunk headers such as
    /// `{r, echo=FALSE}` are kept verbatim as the single class.
    fn code_attr(&self, info: &str) -> Attr {
        if info.is_empty() {
            return Attr::default();
        }
        if let Some(inner) = info.strip_prefix('{').and_then(|i| i.strip_suffix('}')) {
            let inner = inner.trim();
            if self.caps.fenced_code_attributes && inner.starts_with(['.', '#']) {
                return attribute_list(inner);
            }
            return Attr::with_class(info);
        }
        Attr::with_class(info.split_whitespace().next().unwrap_or(info))
    }

    fn heading(&mut self, line: &Line, heading: &Heading<'_>) -> ConversionResult<Block> {
        let mut content = heading.content;
        let mut attr = Attr::default();
        if let Some(open) = content.rfind('{').filter(|_| content.ends_with('}')) {
            let inner = &content[open + 1..content.len() - 1];
            let spaced = open == 0 || content[..open].ends_with([' ', '\t']);
            if spaced && inner.trim_start().starts_with(['#', '.']) {
                attr = attribute_list(inner);
                content = content[..open].trim_end();
            }
        }
        let source = InlineSource::single(content, line.number, line.offset + heading.start + 1);
        let inlines = self.inlines(&source)?;
        if attr.0.is_empty() {
            attr.0 = unique_identifier(&identifier_for(&stringify(&inlines)), &self.used_ids);
        }
        self.used_ids.insert(attr.0.clone());
        Ok(Block::Header(heading.level as i64, attr, inlines))
    }

    fn block_quote(&mut self, lines: &[Line], start: usize) -> ConversionResult<(Block, usize)> {
        let mut inner: Vec<Line> = Vec::new();
        let mut i = start;
        while i < lines.len() {
            let line = &lines[i];
            let rest = line.text.trim_start();
            if indentation(&line.text) <= 3 && rest.starts_with('>') {
                let mut strip = line.text.len() - rest.len() + 1;
                if line.text[strip..].starts_with(' ') {
                    strip += 1;
                }
                inner.push(line.strip_bytes(strip));
            } else if !line.is_blank()
                && !inner.last().map(Line::is_blank).unwrap_or(true)
                && !interrupts_paragraph(&line.text)
            {
                inner.push(line.clone());
            } else {
                break;
            }
            i += 1;
        }
        Ok((Block::BlockQuote(self.parse_blocks(&inner)?), i))
    }

    fn list(&mut self, lines: &[Line], start: usize, first: ListMarker) -> ConversionResult<(Block, usize)> {
        let mut items: Vec<Vec<Line>> = Vec::new();
        let mut loose = false;
        let mut i = start;
        while i < lines.len() {
            if is_thematic_break(&lines[i].text) {
                break;
            }
            let Some(marker) = list_marker(&lines[i].text).filter(|m| m.same_list(&first)) else {
                break;
            };
            let mut item = vec![lines[i].strip_bytes(marker.width)];
            i += 1;
            while i < lines.len() {
                let line = &lines[i];
                if line.is_blank() {
                    item.push(line.clone());
                } else if indentation(&line.text) >= marker.width {
                    item.push(line.strip_indent(marker.width));
                } else if list_marker(&line.text).is_some() {
                    break;
                } else if !item.last().map(Line::is_blank).unwrap_or(false) && !interrupts_paragraph(&line.text) {
                    item.push(line.clone());
                } else {
                    break;
                }
                i += 1;
            }

            let mut trailing = 0;
            while item.last().map(Line::is_blank).unwrap_or(false) {
                item.pop();
                trailing += 1;
            }
            let continues = i < lines.len()
                && list_marker(&lines[i].text)
                    .map(|m| m.same_list(&first))
                    .unwrap_or(false);
            if (trailing > 0 && continues) || item.iter().any(Line::is_blank) {
                loose = true;
            }
            items.push(item);
            if !continues {
                break;
            }
        }

        let mut contents = Vec::with_capacity(items.len());
        for item in &items {
            let mut blocks = self.parse_blocks(item)?;
            if !loose {
                for block in blocks.iter_mut() {
                    if let Block::Para(inlines) = block {
                        *block = Block::Plain(std::mem::take(inlines));
                    }
                }
            }
            contents.push(blocks);
        }

        let block = if first.ordered {
            let delim = if first.symbol == ')' {
                ListNumberDelim::OneParen
            } else {
                ListNumberDelim::Period
            };
            Block::OrderedList(ListAttributes(first.start, ListNumberStyle::Decimal, delim), contents)
        } else {
            Block::BulletList(contents)
        };
        Ok((block, i))
    }

    fn note(&mut self, label: &str, source: &InlineSource, at: usize) -> ConversionResult<Vec<Block>> {
        let Some(lines) = self.notes.get(label).cloned() else {
            let (line, column) = source.locate(at);
            return Err(ConversionError::syntax(
                format!("undefined footnote reference [^{}]", label),
                line,
                column,
            ));
        };
        if self.expanding.iter().any(|l| l == label) {
            return Ok(Vec::new());
        }
        self.expanding.push(label.to_string());
        let blocks = self.parse_blocks(&lines);
        self.expanding.pop();
        blocks
    }

    fn inlines(&mut self, source: &InlineSource) -> ConversionResult<Vec<Inline>> {
        Ok(trim_breaks(self.inline_range(source, 0..source.text.len())?))
    }

    fn inline_range(&mut self, source: &InlineSource, range: Range<usize>) -> ConversionResult<Vec<Inline>> {
        let base = range.start;
        let text = &source.text[range];
        let tokens = tokenize(text);
        let mut items: Vec<Item> = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            let (token, span) = tokens[i].clone();
            let slice = &text[span.clone()];
            match token {
                Some(InlineToken::Word) if self.caps.autolinks => match bare_uri_end(text, span.start) {
                    Some(end) => {
                        let url = &text[span.start..end];
                        items.push(Item::Inline(uri_link(url)));
                        i = resume_at(&mut items, text, &tokens, end);
                        continue;
                    }
                    None => push_str(&mut items, slice),
                },
                None | Some(InlineToken::Word) => push_str(&mut items, slice),
                Some(InlineToken::Whitespace) => items.push(Item::Inline(Inline::Space)),
                Some(InlineToken::Newline) => {
                    let before = slice.split('\n').next().unwrap_or_default();
                    let hard = before.chars().filter(|c| *c == ' ').count() >= 2;
                    let inline = if hard { Inline::LineBreak } else { Inline::SoftBreak };
                    items.push(Item::Inline(inline));
                }
                Some(InlineToken::EscapedNewline) => items.push(Item::Inline(Inline::LineBreak)),
                Some(InlineToken::Escape) => push_str(&mut items, &slice[1..]),
                Some(InlineToken::Backslash) => push_str(&mut items, "\\"),
                Some(InlineToken::Backticks) => {
                    let close = tokens[i + 1..]
                        .iter()
                        .position(|(t, s)| *t == Some(InlineToken::Backticks) && s.len() == span.len())
                        .map(|p| p + i + 1);
                    match close {
                        Some(j) => {
                            let raw = &text[span.end..tokens[j].1.start];
                            items.push(Item::Inline(Inline::Code(Attr::default(), code_span_text(raw))));
                            i = j + 1;
                            continue;
                        }
                        None => push_str(&mut items, slice),
                    }
                }
                Some(InlineToken::DoubleDollar) if self.caps.tex_math => {
                    let close = tokens[i + 1..]
                        .iter()
                        .position(|(t, _)| *t == Some(InlineToken::DoubleDollar))
                        .map(|p| p + i + 1);
                    let Some(j) = close else {
                        let (line, column) = source.locate(base + span.start);
                        return Err(ConversionError::syntax("unterminated display math", line, column));
                    };
                    let content = &text[span.end..tokens[j].1.start];
                    items.push(Item::Inline(Inline::Math(MathType::DisplayMath, content.to_string())));
                    i = j + 1;
                    continue;
                }
                Some(InlineToken::Dollar) if self.caps.tex_math => match inline_math_close(text, &tokens, i) {
                    Some(j) => {
                        let content = &text[span.end..tokens[j].1.start];
                        items.push(Item::Inline(Inline::Math(MathType::InlineMath, content.to_string())));
                        i = j + 1;
                        continue;
                    }
                    None => push_str(&mut items, slice),
                },
                Some(InlineToken::Stars) => items.push(Item::Delim(delimiter(text, &span, '*'))),
                Some(InlineToken::Underscores) => items.push(Item::Delim(delimiter(text, &span, '_'))),
                Some(InlineToken::Tildes) if self.caps.strikeout && span.len() == 2 => {
                    items.push(Item::Delim(delimiter(text, &span, '~')))
                }
                Some(InlineToken::NoteRef) if self.caps.footnotes => {
                    let label = &slice[2..slice.len() - 1];
                    let blocks = self.note(label, source, base + span.start)?;
                    items.push(Item::Inline(Inline::Note(blocks)));
                }
                Some(InlineToken::OpenBracket) | Some(InlineToken::ImageOpen) => {
                    let image = token == Some(InlineToken::ImageOpen);
                    match self.link(source, base, text, span.start, image)? {
                        Some((inline, end)) => {
                            items.push(Item::Inline(inline));
                            i = resume_at(&mut items, text, &tokens, end);
                            continue;
                        }
                        None => push_str(&mut items, slice),
                    }
                }
                Some(InlineToken::AutoLink) => {
                    let url = &slice[1..slice.len() - 1];
                    items.push(Item::Inline(uri_link(url)));
                }
                Some(_) => push_str(&mut items, slice),
            }
            i += 1;
        }

        process_emphasis(&mut items);
        Ok(collapse(items))
    }

    /// Link or image starting at the bracket at `open` (relative to `text`)
    fn link(
        &mut self,
        source: &InlineSource,
        base: usize,
        text: &str,
        open: usize,
        image: bool,
    ) -> ConversionResult<Option<(Inline, usize)>> {
        let label_start = open + if image { 2 } else { 1 };
        let Some(label_end) = matching_bracket(text, label_start) else {
            return Ok(None);
        };
        let after = label_end + 1;
        let rest = &text[after..];
        let label_text = &text[label_start..label_end];

        let resolved = if rest.starts_with('(') {
            inline_destination(text, after + 1)
        } else if rest.starts_with('[') {
            text[after + 1..].find(']').and_then(|p| {
                let close = after + 1 + p;
                let label = &text[after + 1..close];
                let key = if label.is_empty() { label_text } else { label };
                self.references
                    .get(&normalize_label(key))
                    .map(|target| (target.clone(), close + 1))
            })
        } else {
            self.references
                .get(&normalize_label(label_text))
                .map(|target| (target.clone(), after))
        };
        let Some((target, end)) = resolved else {
            return Ok(None);
        };

        let content = self.inline_range(source, base + label_start..base + label_end)?;
        let inline = if image {
            Inline::Image(Attr::default(), content, target)
        } else {
            Inline::Link(Attr::default(), content, target)
        };
        Ok(Some((inline, end)))
    }
}

fn indented_code(lines: &[Line], start: usize) -> (Block, usize) {
    let mut content: Vec<String> = Vec::new();
    let mut i = start;
    while i < lines.len() {
        let line = &lines[i];
        if line.is_blank() {
            let continues = lines[i + 1..]
                .iter()
                .find(|l| !l.is_blank())
                .map(|l| indentation(&l.text) >= 4)
                .unwrap_or(false);
            if !continues {
                break;
            }
            content.push(String::new());
        } else if indentation(&line.text) >= 4 {
            content.push(line.strip_indent(4).text);
        } else {
            break;
        }
        i += 1;
    }
    (Block::CodeBlock(Attr::default(), content.join("\n")), i)
}

fn uri_link(url: &str) -> Inline {
    Inline::Link(
        Attr::with_class("uri"),
        vec![Inline::Str(url.to_string())],
        Target(url.to_string(), String::new()),
    )
}

/// Index of the first token starting at or after `offset`. The tail of a
/// token cut by `offset` is kept as text.
fn resume_at(items: &mut Vec<Item>, text: &str, tokens: &[Spanned], offset: usize) -> usize {
    let next = tokens
        .iter()
        .position(|(_, span)| span.start >= offset)
        .unwrap_or(tokens.len());
    if next > 0 {
        let cut = &tokens[next - 1].1;
        if cut.start < offset && cut.end > offset {
            push_str(items, &text[offset..cut.end]);
        }
    }
    next
}

/// Closing `$` of inline math opened by token `i`. The opener must be
/// followed by a non-space, the closer preceded by a non-space and not
/// followed by a digit.
fn inline_math_close(text: &str, tokens: &[Spanned], i: usize) -> Option<usize> {
    let open = &tokens[i].1;
    if is_space(text[open.end..].chars().next()) {
        return None;
    }
    tokens
        .iter()
        .enumerate()
        .skip(i + 1)
        .find(|(_, (token, span))| {
            *token == Some(InlineToken::Dollar)
                && !is_space(text[..span.start].chars().next_back())
                && !text[span.end..].chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false)
        })
        .map(|(j, _)| j)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markdown(text: &str) -> Pandoc {
        parse(text, &FormatCapabilities::all()).unwrap()
    }

    fn para(blocks: &[Block]) -> &[Inline] {
        match &blocks[0] {
            Block::Para(inlines) | Block::Plain(inlines) => inlines,
            other => panic!("expected paragraph, got {:?}", other),
        }
    }

    fn s(text: &str) -> Inline {
        Inline::Str(text.into())
    }

    #[test]
    fn test_heading_and_paragraph() {
        let doc = markdown("# Title\n\nHello world.");
        assert_eq!(
            doc.blocks,
            vec![
                Block::Header(1, Attr::with_id("title"), vec![s("Title")]),
                Block::Para(vec![s("Hello"), Inline::Space, s("world.")]),
            ]
        );
    }

    #[test]
    fn test_heading_identifiers() {
        let doc = markdown("## 1. Getting Started!\n\n# Intro\n\n# Intro\n\n# Custom {#mine}");
        let ids: Vec<&str> = doc
            .blocks
            .iter()
            .map(|b| match b {
                Block::Header(_, attr, _) => attr.id(),
                _ => "",
            })
            .collect();
        assert_eq!(ids, vec!["getting-started", "intro", "intro-1", "mine"]);
    }

    #[test]
    fn test_identifier_for() {
        assert_eq!(identifier_for("Hello, World"), "hello-world");
        assert_eq!(identifier_for("a  & b"), "a-b");
        assert_eq!(identifier_for("v1.2_beta"), "v1.2_beta");
        assert_eq!(identifier_for("123"), "section");
    }

    #[test]
    fn test_emphasis() {
        let doc = markdown("*a* **b** ***c*** ~~d~~ snake_case_name");
        assert_eq!(
            para(&doc.blocks),
            &[
                Inline::Emph(vec![s("a")]),
                Inline::Space,
                Inline::Strong(vec![s("b")]),
                Inline::Space,
                Inline::Emph(vec![Inline::Strong(vec![s("c")])]),
                Inline::Space,
                Inline::Strikeout(vec![s("d")]),
                Inline::Space,
                s("snake_case_name"),
            ]
        );
    }

    #[test]
    fn test_unmatched_delimiters_are_text() {
        let doc = markdown("2 * 3 and *open");
        assert_eq!(
            para(&doc.blocks),
            &[
                s("2"),
                Inline::Space,
                s("*"),
                Inline::Space,
                s("3"),
                Inline::Space,
                s("and"),
                Inline::Space,
                s("*open"),
            ]
        );
    }

    #[test]
    fn test_code_and_math() {
        let doc = markdown("Use `a*b` and $x^2$ or $$\\sum$$, costs $5.");
        let inlines = para(&doc.blocks);
        assert_eq!(inlines[2], Inline::Code(Attr::default(), "a*b".into()));
        assert_eq!(inlines[6], Inline::Math(MathType::InlineMath, "x^2".into()));
        assert_eq!(inlines[10], Inline::Math(MathType::DisplayMath, "\\sum".into()));
        assert_eq!(inlines.last(), Some(&s("$5.")));
    }

    #[test]
    fn test_unterminated_display_math() {
        let err = parse("Intro\n\nsee $$x^2\nmore", &FormatCapabilities::all()).unwrap_err();
        assert_eq!(err.location(), Some((3, 5)));
    }

    #[test]
    fn test_math_is_text_without_capability() {
        let caps = FormatCapabilities::for_format("commonmark").unwrap();
        let doc = parse("$$x", &caps).unwrap();
        assert_eq!(para(&doc.blocks), &[s("$$x")]);
    }

    #[test]
    fn test_links_images_and_autolinks() {
        let doc = markdown("[site](https://x.org \"X\") ![alt](a.png) <https://y.org> [ref][r]\n\n[r]: /target");
        let inlines = para(&doc.blocks);
        assert_eq!(
            inlines[0],
            Inline::Link(
                Attr::default(),
                vec![s("site")],
                Target("https://x.org".into(), "X".into())
            )
        );
        assert_eq!(
            inlines[2],
            Inline::Image(Attr::default(), vec![s("alt")], Target("a.png".into(), "".into()))
        );
        assert_eq!(inlines[4], uri_link("https://y.org"));
        assert_eq!(
            inlines[6],
            Inline::Link(Attr::default(), vec![s("ref")], Target("/target".into(), "".into()))
        );
    }

    #[test]
    fn test_bare_uri() {
        let doc = markdown("See https://x.org/a_b.");
        assert_eq!(
            para(&doc.blocks),
            &[s("See"), Inline::Space, uri_link("https://x.org/a_b"), s(".")]
        );
    }

    #[test]
    fn test_footnotes() {
        let doc = markdown("Claim[^1] here.\n\n[^1]: The source.\n    Second line.");
        let inlines = para(&doc.blocks);
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(
            inlines[1],
            Inline::Note(vec![Block::Para(vec![
                s("The"),
                Inline::Space,
                s("source."),
                Inline::SoftBreak,
                s("Second"),
                Inline::Space,
                s("line."),
            ])])
        );
    }

    #[test]
    fn test_undefined_footnote() {
        let err = parse("Text [^missing].", &FormatCapabilities::all()).unwrap_err();
        assert!(matches!(err, ConversionError::Syntax { .. }));
        assert_eq!(err.location(), Some((1, 6)));
    }

    #[test]
    fn test_breaks() {
        let doc = markdown("a\nb  \nc\\\nd");
        assert_eq!(
            para(&doc.blocks),
            &[
                s("a"),
                Inline::SoftBreak,
                s("b"),
                Inline::LineBreak,
                s("c"),
                Inline::LineBreak,
                s("d"),
            ]
        );
    }

    #[test]
    fn test_fenced_code_and_chunks() {
        let doc = markdown("```python\nprint(1)\n\nx = 2\n```\n\n```{r, echo=FALSE}\nplot(x)\n```\n\n~~~ {.sh #run}\nls\n~~~");
        assert_eq!(
            doc.blocks[0],
            Block::CodeBlock(Attr::with_class("python"), "print(1)\n\nx = 2".into())
        );
        assert_eq!(
            doc.blocks[1],
            Block::CodeBlock(Attr::with_class("{r, echo=FALSE}"), "plot(x)".into())
        );
        assert_eq!(
            doc.blocks[2],
            Block::CodeBlock(Attr("run".into(), vec!["sh".into()], vec![]), "ls".into())
        );
    }

    #[test]
    fn test_lists() {
        let doc = markdown("- one\n- two\n\n3. three\n4. four\n\n* loose\n\n* items");
        assert_eq!(
            doc.blocks[0],
            Block::BulletList(vec![vec![Block::Plain(vec![s("one")])], vec![Block::Plain(vec![s("two")])]])
        );
        match &doc.blocks[1] {
            Block::OrderedList(attrs, items) => {
                assert_eq!(attrs.0, 3);
                assert_eq!(items.len(), 2);
            }
            other => panic!("expected ordered list, got {:?}", other),
        }
        assert_eq!(
            doc.blocks[2],
            Block::BulletList(vec![vec![Block::Para(vec![s("loose")])], vec![Block::Para(vec![s("items")])]])
        );
    }

    #[test]
    fn test_nested_list_and_quote() {
        let doc = markdown("> quoted\n> - item\n>   - nested");
        let Block::BlockQuote(inner) = &doc.blocks[0] else {
            panic!("expected block quote");
        };
        assert_eq!(inner[0], Block::Para(vec![s("quoted")]));
        let Block::BulletList(items) = &inner[1] else {
            panic!("expected list");
        };
        assert!(matches!(items[0][1], Block::BulletList(_)));
    }

    #[test]
    fn test_thematic_break() {
        let doc = markdown("a\n\n* * *\n\nb");
        assert_eq!(doc.blocks[1], Block::HorizontalRule);
    }

    #[test]
    fn test_front_matter() {
        let doc = markdown("---\ntitle: \"My *Notes*\"\nauthor: Ann\n---\n\nBody");
        assert_eq!(doc.title(), Some("My Notes".into()));
        assert_eq!(doc.meta.get("author"), Some(&MetaValue::MetaString("Ann".into())));
        assert_eq!(doc.blocks, vec![Block::Para(vec![s("Body")])]);
    }

    #[test]
    fn test_unterminated_front_matter() {
        let err = parse("---\ntitle: x\n\nBody", &FormatCapabilities::all()).unwrap_err();
        assert_eq!(err.location(), Some((1, 1)));
    }

    #[test]
    fn test_escapes() {
        let doc = markdown("\\*not em\\* \\# and \\$");
        assert_eq!(
            para(&doc.blocks),
            &[
                s("*not"),
                Inline::Space,
                s("em*"),
                Inline::Space,
                s("#"),
                Inline::Space,
                s("and"),
                Inline::Space,
                s("$"),
            ]
        );
    }
}

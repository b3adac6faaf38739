//! # Content Expressions
//!
//! Compact grammar strings describing which children a node may hold:
//!
//! ```text
//! block+              one or more nodes of group "block"
//! paragraph block*    a paragraph followed by any blocks
//! (text | image)*     alternatives
//! body notes          exact sequence
//! ```
//!
//! Matching simulates the expression over the child list with a set of
//! reachable offsets, so nested quantifiers never need backtracking.

use crate::error::ContentExprError;
use crate::node::Node;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub enum ContentExpr {
    /// No content allowed (leaf)
    Empty,
    /// Node type or group name
    Name(String),
    Seq(Vec<ContentExpr>),
    Choice(Vec<ContentExpr>),
    Star(Box<ContentExpr>),
    Plus(Box<ContentExpr>),
    Opt(Box<ContentExpr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Name(String),
    LParen,
    RParen,
    Pipe,
    Star,
    Plus,
    Question,
}

fn tokenize(source: &str) -> Result<Vec<(usize, Tok)>, ContentExprError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        let tok = match c {
            c if c.is_whitespace() => continue,
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            '|' => Tok::Pipe,
            '*' => Tok::Star,
            '+' => Tok::Plus,
            '?' => Tok::Question,
            c if c.is_alphanumeric() || c == '_' => {
                let mut name = c.to_string();
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Tok::Name(name)
            }
            other => {
                return Err(ContentExprError::new(offset, format!("unexpected character '{}'", other)))
            }
        };
        tokens.push((offset, tok));
    }
    Ok(tokens)
}

struct ExprParser {
    tokens: Vec<(usize, Tok)>,
    pos: usize,
    end: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(o, _)| *o).unwrap_or(self.end)
    }

    fn parse_choice(&mut self) -> Result<ContentExpr, ContentExprError> {
        let mut alternatives = vec![self.parse_seq()?];
        while self.peek() == Some(&Tok::Pipe) {
            self.pos += 1;
            alternatives.push(self.parse_seq()?);
        }
        Ok(if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            ContentExpr::Choice(alternatives)
        })
    }

    fn parse_seq(&mut self) -> Result<ContentExpr, ContentExprError> {
        let mut items = Vec::new();
        while matches!(self.peek(), Some(Tok::Name(_)) | Some(Tok::LParen)) {
            items.push(self.parse_term()?);
        }
        match items.len() {
            0 => Err(ContentExprError::new(self.offset(), "expected a name or '('")),
            1 => Ok(items.remove(0)),
            _ => Ok(ContentExpr::Seq(items)),
        }
    }

    fn parse_term(&mut self) -> Result<ContentExpr, ContentExprError> {
        let mut expr = match self.peek().cloned() {
            Some(Tok::Name(name)) => {
                self.pos += 1;
                ContentExpr::Name(name)
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let inner = self.parse_choice()?;
                if self.peek() != Some(&Tok::RParen) {
                    return Err(ContentExprError::new(self.offset(), "expected ')'"));
                }
                self.pos += 1;
                inner
            }
            _ => return Err(ContentExprError::new(self.offset(), "expected a name or '('")),
        };
        loop {
            expr = match self.peek() {
                Some(Tok::Star) => ContentExpr::Star(Box::new(expr)),
                Some(Tok::Plus) => ContentExpr::Plus(Box::new(expr)),
                Some(Tok::Question) => ContentExpr::Opt(Box::new(expr)),
                _ => break,
            };
            self.pos += 1;
        }
        Ok(expr)
    }
}

impl ContentExpr {
    /// Parse an expression string. The empty string denotes a leaf.
    pub fn parse(source: &str) -> Result<Self, ContentExprError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Ok(ContentExpr::Empty);
        }
        let mut parser = ExprParser {
            tokens,
            pos: 0,
            end: source.len(),
        };
        let expr = parser.parse_choice()?;
        if parser.pos != parser.tokens.len() {
            return Err(ContentExprError::new(parser.offset(), "unexpected trailing input"));
        }
        Ok(expr)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ContentExpr::Empty)
    }

    /// Every type or group name referenced by the expression
    pub fn names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            ContentExpr::Empty => {}
            ContentExpr::Name(n) => out.push(n),
            ContentExpr::Seq(items) | ContentExpr::Choice(items) => {
                for item in items {
                    item.collect_names(out);
                }
            }
            ContentExpr::Star(inner) | ContentExpr::Plus(inner) | ContentExpr::Opt(inner) => {
                inner.collect_names(out)
            }
        }
    }

    /// True when the whole child list matches the expression.
    ///
    /// `is_a(node, name)` decides whether a node satisfies a type or group name.
    pub fn matches<F>(&self, nodes: &[Node], is_a: &F) -> bool
    where
        F: Fn(&Node, &str) -> bool,
    {
        let start = BTreeSet::from([0]);
        self.advance(nodes, &start, is_a).contains(&nodes.len())
    }

    fn advance<F>(&self, nodes: &[Node], starts: &BTreeSet<usize>, is_a: &F) -> BTreeSet<usize>
    where
        F: Fn(&Node, &str) -> bool,
    {
        match self {
            ContentExpr::Empty => starts.clone(),
            ContentExpr::Name(name) => starts
                .iter()
                .filter(|&&p| p < nodes.len() && is_a(&nodes[p], name))
                .map(|p| p + 1)
                .collect(),
            ContentExpr::Seq(items) => items
                .iter()
                .fold(starts.clone(), |acc, item| item.advance(nodes, &acc, is_a)),
            ContentExpr::Choice(alternatives) => alternatives
                .iter()
                .flat_map(|alt| alt.advance(nodes, starts, is_a))
                .collect(),
            ContentExpr::Star(inner) => Self::closure(inner, nodes, starts.clone(), is_a),
            ContentExpr::Plus(inner) => {
                let first = inner.advance(nodes, starts, is_a);
                Self::closure(inner, nodes, first, is_a)
            }
            ContentExpr::Opt(inner) => {
                let mut out = starts.clone();
                out.extend(inner.advance(nodes, starts, is_a));
                out
            }
        }
    }

    fn closure<F>(inner: &ContentExpr, nodes: &[Node], starts: BTreeSet<usize>, is_a: &F) -> BTreeSet<usize>
    where
        F: Fn(&Node, &str) -> bool,
    {
        let mut all = starts.clone();
        let mut frontier = starts;
        loop {
            let next = inner.advance(nodes, &frontier, is_a);
            let fresh: BTreeSet<usize> = next.difference(&all).copied().collect();
            if fresh.is_empty() {
                return all;
            }
            all.extend(fresh.iter().copied());
            frontier = fresh;
        }
    }
}

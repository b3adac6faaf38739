use logos::Logos;
use std::fmt;
use std::ops::Range;

/// Inline tokens of the reference markdown dialect
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineToken {
    /// Backslash escape of ASCII punctuation
    #[regex(r"\\[!-/:-@\[-`{-~]")]
    Escape,

    /// Backslash at end of line (hard break)
    #[token("\\\n")]
    EscapedNewline,

    /// Line break with surrounding blanks; two trailing spaces make it hard
    #[regex(r"[ \t]*\n[ \t]*")]
    Newline,

    #[regex(r"[ \t]+")]
    Whitespace,

    #[regex(r"`+")]
    Backticks,

    #[token("$$")]
    DoubleDollar,

    #[token("$")]
    Dollar,

    #[regex(r"\*+")]
    Stars,

    #[regex(r"_+")]
    Underscores,

    #[regex(r"~+")]
    Tildes,

    #[token("![")]
    ImageOpen,

    #[regex(r"\[\^[^\]\s]+\]")]
    NoteRef,

    #[token("[")]
    OpenBracket,

    #[token("]")]
    CloseBracket,

    #[regex(r"<[A-Za-z][A-Za-z0-9+.\-]+:[^\s<>]*>")]
    AutoLink,

    #[regex(r"[^\\`$*_~!\[\]<\s]+")]
    Word,

    #[token("!")]
    Bang,

    #[token("<")]
    Lt,

    #[token("\\")]
    Backslash,
}

impl fmt::Display for InlineToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InlineToken::Escape => "escape",
            InlineToken::EscapedNewline => "escaped newline",
            InlineToken::Newline => "newline",
            InlineToken::Whitespace => "whitespace",
            InlineToken::Backticks => "backticks",
            InlineToken::DoubleDollar => "$$",
            InlineToken::Dollar => "$",
            InlineToken::Stars => "*",
            InlineToken::Underscores => "_",
            InlineToken::Tildes => "~",
            InlineToken::ImageOpen => "![",
            InlineToken::NoteRef => "note reference",
            InlineToken::OpenBracket => "[",
            InlineToken::CloseBracket => "]",
            InlineToken::AutoLink => "autolink",
            InlineToken::Word => "word",
            InlineToken::Bang => "!",
            InlineToken::Lt => "<",
            InlineToken::Backslash => "\\",
        };
        f.write_str(name)
    }
}

/// A token with its byte span. `None` marks input no rule matched (kept
/// as literal text).
pub type Spanned = (Option<InlineToken>, Range<usize>);

/// Tokenize inline text
pub fn tokenize(text: &str) -> Vec<Spanned> {
    InlineToken::lexer(text)
        .spanned()
        .map(|(result, span)| (result.ok(), span))
        .collect()
}

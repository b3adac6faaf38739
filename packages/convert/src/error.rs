use thiserror::Error;

pub type ConversionResult<T> = Result<T, ConversionError>;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Unknown node kind: {0}")]
    UnknownNodeKind(String),

    #[error("Invalid document structure: {0}")]
    InvalidStructure(String),

    #[error("Conversion engine failed: {0}")]
    Engine(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConversionError {
    pub fn syntax(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            line,
            column,
        }
    }

    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure(message.into())
    }

    /// 1-based line and column, when the engine reported one
    pub fn location(&self) -> Option<(usize, usize)> {
        match self {
            Self::Syntax { line, column, .. } => Some((*line, *column)),
            _ => None,
        }
    }
}

impl From<folio_model::SchemaError> for ConversionError {
    fn from(err: folio_model::SchemaError) -> Self {
        Self::InvalidStructure(err.to_string())
    }
}

/// Byte offset of a 1-based line/column in `source`
fn offset_of(source: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (i, text) in source.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            let col = text
                .char_indices()
                .nth(column.saturating_sub(1))
                .map(|(o, _)| o)
                .unwrap_or(text.len());
            return offset + col;
        }
        offset += text.len();
    }
    source.len()
}

/// Pretty-print a conversion error with source context using ariadne
#[cfg(feature = "pretty-errors")]
pub fn format_diagnostic(source: &str, filename: &str, error: &ConversionError) -> String {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let Some((line, column)) = error.location() else {
        return error.to_string();
    };
    let start = offset_of(source, line, column).min(source.len());
    let end = (start + 1).min(source.len()).max(start);
    let message = match error {
        ConversionError::Syntax { message, .. } => message.clone(),
        other => other.to_string(),
    };

    let mut output = Vec::new();
    let report = Report::build(ReportKind::Error, filename, start)
        .with_message(error.to_string())
        .with_label(
            Label::new((filename, start..end))
                .with_color(Color::Red)
                .with_message(message),
        )
        .finish();
    if report.write((filename, Source::from(source)), &mut output).is_err() {
        return error.to_string();
    }
    String::from_utf8(output).unwrap_or_else(|_| error.to_string())
}

/// Plain rendering when ariadne is disabled
#[cfg(not(feature = "pretty-errors"))]
pub fn format_diagnostic(source: &str, filename: &str, error: &ConversionError) -> String {
    match error.location() {
        Some((line, column)) => {
            let offset = offset_of(source, line, column);
            let line_text = source[..offset].rsplit('\n').next().unwrap_or_default();
            format!("{}:{}:{}: {}\n  {}", filename, line, column, error, line_text)
        }
        None => format!("{}: {}", filename, error),
    }
}

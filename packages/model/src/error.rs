//! Error types for grammar construction and step application

use thiserror::Error;

/// Errors raised while building a grammar or creating nodes against it
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Unknown mark type: {0}")]
    UnknownMarkType(String),

    #[error("Duplicate type name: {0}")]
    DuplicateType(String),

    #[error("Invalid content expression for {node_type}: {message}")]
    InvalidContent { node_type: String, message: String },

    #[error("Missing required attribute '{attr}' on {type_name}")]
    MissingAttr { type_name: String, attr: String },

    #[error("Content of {node_type} does not match '{expected}' (found [{found}])")]
    ContentMismatch {
        node_type: String,
        expected: String,
        found: String,
    },

    #[error("Mark {mark} is not allowed in {node_type}")]
    MarkNotAllowed { mark: String, node_type: String },

    #[error("Top node {0} is not defined")]
    MissingTopNode(String),

    #[error("Grammar does not define a text node")]
    MissingText,

    #[error("Empty text nodes are not allowed")]
    EmptyText,
}

/// Errors raised when a step cannot be applied to a document
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    #[error("Position {pos} out of range (content size {size})")]
    OutOfRange { pos: usize, size: usize },

    #[error("Invalid range {from}..{to}")]
    InvalidRange { from: usize, to: usize },

    #[error("Replace range {from}..{to} crosses node boundaries")]
    CrossesParent { from: usize, to: usize },

    #[error("No node at position {0}")]
    NoNodeAt(usize),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Error in a content expression string
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at offset {offset}")]
pub struct ContentExprError {
    pub offset: usize,
    pub message: String,
}

impl ContentExprError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

//! Error types for the editor

use folio_convert::ConversionError;
use folio_model::SchemaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    /// Extension or grammar composition failed. Only raised while an editor
    /// is being created.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Editor has been destroyed")]
    Destroyed,
}

impl EditorError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl From<SchemaError> for EditorError {
    fn from(e: SchemaError) -> Self {
        EditorError::Configuration(e.to_string())
    }
}

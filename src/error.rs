//! Error types for the cleaning pipeline
//!
//! Every pass has a fallible core returning [`CleanerResult`] and a total
//! wrapper that logs the error and passes its input through unchanged, so
//! these errors never escape [`crate::clean_confluence_html`].

use std::string::FromUtf8Error;
use thiserror::Error;

/// Result type alias for pipeline passes
pub type CleanerResult<T> = Result<T, CleanerError>;

/// Error types for pipeline passes
#[derive(Debug, Error)]
pub enum CleanerError {
    /// Writing a parsed tree back to HTML failed
    #[error("Failed to serialize HTML: {0}")]
    Serialize(#[from] std::io::Error),

    /// Serialized output was not valid UTF-8
    #[error("Serialized HTML is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    /// Input could not be parsed (XML passes only; the HTML parser is total)
    #[error("Failed to parse markup: {0}")]
    Parse(String),

    /// The HTML to Markdown converter rejected its input
    #[error("Markdown conversion failed: {0}")]
    Conversion(String),

    /// A pass panicked; the payload message is kept when it is a string
    #[error("Pipeline panicked: {0}")]
    Panicked(String),
}

impl From<roxmltree::Error> for CleanerError {
    fn from(error: roxmltree::Error) -> Self {
        CleanerError::Parse(error.to_string())
    }
}

impl CleanerError {
    /// Build a [`CleanerError::Panicked`] from a `catch_unwind` payload
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        CleanerError::Panicked(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        let err = CleanerError::from_panic(payload.as_ref());
        assert_eq!(err.to_string(), "Pipeline panicked: boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let err = CleanerError::from_panic(payload.as_ref());
        assert_eq!(err.to_string(), "Pipeline panicked: owned");
    }

    #[test]
    fn test_xml_error_maps_to_parse() {
        let err: CleanerError = roxmltree::Document::parse("<a>")
            .map(|_| ())
            .expect_err("unclosed element must fail")
            .into();
        assert!(matches!(err, CleanerError::Parse(_)));
    }
}

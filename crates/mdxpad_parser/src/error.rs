//! Parse error types.

use mdxpad_ast::Place;
use thiserror::Error;

/// Errors that can occur during parsing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The source text is invalid.
    #[error("{message}")]
    InvalidSource {
        /// Error message.
        message: String,
        /// Where the error occurred, when known.
        place: Option<Place>,
        /// Byte offset into the parsed text, when no full place is known.
        offset: Option<usize>,
        /// Identifier of the check that failed (e.g. `end-tag-mismatch`).
        rule_id: Option<String>,
        /// Component that raised the error (e.g. `mdx-jsx`).
        origin: Option<String>,
    },

    /// The parser encountered an unsupported feature.
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// An internal parser error occurred.
    #[error("Internal parser error: {0}")]
    Internal(String),
}

impl ParseError {
    /// Creates a new invalid source error.
    pub fn invalid_source(message: impl Into<String>) -> Self {
        Self::InvalidSource {
            message: message.into(),
            place: None,
            offset: None,
            rule_id: None,
            origin: None,
        }
    }

    /// Creates a new invalid source error with offset.
    pub fn invalid_source_at(message: impl Into<String>, offset: usize) -> Self {
        Self::InvalidSource {
            message: message.into(),
            place: None,
            offset: Some(offset),
            rule_id: None,
            origin: None,
        }
    }

    /// Creates a new unsupported feature error.
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported(feature.into())
    }

    /// Creates a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The place of the error, if known.
    pub fn place(&self) -> Option<Place> {
        match self {
            Self::InvalidSource { place, .. } => *place,
            _ => None,
        }
    }

    /// The byte offset of the error relative to the parsed text, if known.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::InvalidSource {
                place: Some(place), ..
            } => Some(place.start().offset as usize),
            Self::InvalidSource { offset, .. } => *offset,
            _ => None,
        }
    }
}

//! Error types for compilation, rendering and configuration.

use thiserror::Error;

use crate::Diagnostic;

/// Errors that can occur while compiling a document.
///
/// These never escape the [`Compiler`](crate::Compiler); they are turned
/// into fatal diagnostics on the source unit.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Parse error from markdown-rs or the expression parser.
    #[error(transparent)]
    Parse(#[from] mdxpad_parser::ParseError),

    /// A problem already recorded on the source unit.
    #[error("{0}")]
    Reported(Box<Diagnostic>),

    /// Internal error (including a panic inside the pipeline).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CompileError {
    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Errors raised while executing compiled output.
///
/// The messages follow what a JavaScript runtime reports for the same
/// mistake, so authors recognise them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// An identifier that is not in scope.
    #[error("ReferenceError: {0} is not defined")]
    Reference(String),

    /// An operation on a value of the wrong type.
    #[error("TypeError: {0}")]
    Type(String),

    /// An object used where a child node was expected.
    #[error(
        "Objects are not valid as a React child (found: object with keys {{{0}}}). If you meant to render a collection of children, use an array instead."
    )]
    InvalidChild(String),

    /// A JSX component that nobody provided.
    #[error(
        "Expected component `{0}` to be defined: you likely forgot to import, pass, or provide it."
    )]
    MissingComponent(String),

    /// A host component returned an error.
    #[error("Error in component `{component}`: {message}")]
    Component { component: String, message: String },

    /// The document or an expression nests deeper than rendering allows.
    #[error("RangeError: Maximum nesting depth of {0} exceeded")]
    Nesting(usize),

    /// Rendering panicked.
    #[error("Render panicked: {0}")]
    Panic(String),
}

impl RenderError {
    /// Creates a type error.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration text is not valid.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Creates an invalid configuration error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

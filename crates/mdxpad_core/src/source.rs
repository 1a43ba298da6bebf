//! The unit of work a compile attempt produces.

use std::fmt;

use tracing::debug;

use crate::{CompileError, CompiledOutput, Diagnostic};

/// Raw text, the diagnostics collected while processing it and, when the
/// attempt succeeded, the compiled output.
///
/// A failed unit has at least one fatal diagnostic and no output; a
/// successful unit has output and no fatal diagnostic.
#[derive(Clone)]
pub struct SourceUnit {
    /// Basename of the document, used in messages.
    pub path: String,
    /// The text that was compiled.
    pub text: String,
    /// Diagnostics in the order they were recorded.
    pub diagnostics: Vec<Diagnostic>,
    /// Present only when compilation succeeded.
    pub compiled_output: Option<CompiledOutput>,
}

impl SourceUnit {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            diagnostics: Vec::new(),
            compiled_output: None,
        }
    }

    /// Records a diagnostic unless an equal one is already recorded.
    ///
    /// Returns `true` when the diagnostic was added.
    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) -> bool {
        if self.diagnostics.contains(&diagnostic) {
            debug!("Skipping duplicate diagnostic: {}", diagnostic);
            return false;
        }
        self.diagnostics.push(diagnostic);
        true
    }

    /// Records a non-fatal message about this unit.
    pub fn warn(&mut self, diagnostic: Diagnostic) {
        let mut diagnostic = diagnostic.with_file(self.path.clone());
        diagnostic.fatal = false;
        self.push_diagnostic(diagnostic);
    }

    /// Records a fatal message and returns the error that aborts the attempt.
    pub fn fail(&mut self, diagnostic: Diagnostic) -> CompileError {
        let mut diagnostic = diagnostic.with_file(self.path.clone());
        diagnostic.fatal = true;
        self.push_diagnostic(diagnostic.clone());
        CompileError::Reported(Box::new(diagnostic))
    }

    /// Fatal diagnostics, in order.
    pub fn fatal_diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.fatal)
    }

    pub fn has_fatal(&self) -> bool {
        self.diagnostics.iter().any(|d| d.fatal)
    }

    /// Returns true when the unit holds compiled output.
    pub fn is_success(&self) -> bool {
        self.compiled_output.is_some() && !self.has_fatal()
    }
}

impl fmt::Debug for SourceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceUnit")
            .field("path", &self.path)
            .field("text_len", &self.text.len())
            .field("diagnostics", &self.diagnostics)
            .field("compiled", &self.compiled_output.is_some())
            .finish()
    }
}

//! Diagnostic messages attached to a source unit.

use std::fmt;

use mdxpad_ast::Place;
use serde::{Deserialize, Serialize};

/// A problem found while compiling or rendering a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Human readable reason.
    pub reason: String,

    /// Whether the problem prevents output.
    pub fatal: bool,

    /// Where in the source the problem is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<Place>,

    /// Name of the file the problem is in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Component that produced the message (e.g. `mdx-jsx`, `mdxpad`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Identifier of the specific check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl Diagnostic {
    /// Creates a non-fatal diagnostic.
    pub fn warning(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            fatal: false,
            place: None,
            file: None,
            source: None,
            rule_id: None,
        }
    }

    /// Creates a fatal diagnostic.
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self {
            fatal: true,
            ..Self::warning(reason)
        }
    }

    /// Sets the place.
    pub fn with_place(mut self, place: impl Into<Place>) -> Self {
        self.place = Some(place.into());
        self
    }

    /// Sets the file name.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Sets the source and rule id.
    pub fn with_rule(mut self, source: impl Into<String>, rule_id: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self.rule_id = Some(rule_id.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:", file)?;
        }
        match &self.place {
            Some(place) => write!(f, "{}", place)?,
            None => f.write_str("1:1")?,
        }
        write!(f, ": {}", self.reason)?;
        if let (Some(source), Some(rule_id)) = (&self.source, &self.rule_id) {
            write!(f, " ({}:{})", source, rule_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdxpad_ast::{Location, Point};

    #[test]
    fn test_display_with_location() {
        let diag = Diagnostic::fatal("Expected a closing tag for `<div>`")
            .with_place(Location::new(Point::new(1, 1, 0), Point::new(1, 6, 5)))
            .with_file("example.mdx")
            .with_rule("mdx-jsx", "end-tag-mismatch");

        assert_eq!(
            diag.to_string(),
            "example.mdx:1:1-1:6: Expected a closing tag for `<div>` (mdx-jsx:end-tag-mismatch)"
        );
    }

    #[test]
    fn test_display_without_place() {
        let diag = Diagnostic::warning("Something odd");
        assert_eq!(diag.to_string(), "1:1: Something odd");
        assert!(!diag.fatal);
    }

    #[test]
    fn test_equivalence_includes_place() {
        let a = Diagnostic::fatal("x").with_place(Point::new(1, 2, 1));
        let b = Diagnostic::fatal("x").with_place(Point::new(1, 2, 1));
        let c = Diagnostic::fatal("x").with_place(Point::new(1, 3, 2));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_serialization_skips_missing_fields() {
        let json = serde_json::to_string(&Diagnostic::fatal("boom")).unwrap();
        assert_eq!(json, r#"{"reason":"boom","fatal":true}"#);
    }
}

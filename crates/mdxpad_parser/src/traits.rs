//! Parser trait definition.

use markdown::mdast::Node;
use markdown::{Constructs, ParseOptions};

use crate::ParseError;
use crate::markdown::message_to_error;

/// Trait for parsing source text into mdast.
///
/// A parser fixes the document format (which base constructs are on); the
/// caller layers extension constructs on top before calling [`Parser::parse`].
///
/// # Example
///
/// ```rust
/// use mdxpad_parser::{MdxParser, Parser};
///
/// let parser = MdxParser::new();
/// let mut constructs = parser.constructs();
/// constructs.gfm_table = true;
///
/// let tree = parser.parse("# Hello", constructs).unwrap();
/// assert!(tree.children().is_some());
/// ```
pub trait Parser {
    /// Returns the name of this parser.
    fn name(&self) -> &str;

    /// Returns the file extensions this parser handles.
    ///
    /// Extensions should not include the leading dot (e.g., `["md", "markdown"]`).
    fn extensions(&self) -> &[&str];

    /// Base constructs for this format, before any extension is enabled.
    fn constructs(&self) -> Constructs;

    /// Parses the source text into an mdast tree with the given constructs.
    fn parse(&self, source: &str, constructs: Constructs) -> Result<Node, ParseError> {
        let options = ParseOptions {
            constructs,
            ..ParseOptions::default()
        };
        markdown::to_mdast(source, &options).map_err(message_to_error)
    }

    /// Returns true if this parser can handle the given file extension.
    fn can_parse(&self, extension: &str) -> bool {
        self.extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

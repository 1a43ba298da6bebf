//! MDX and Markdown parsers using markdown-rs (wooorm/markdown-rs).
//!
//! Both produce mdast. The MDX flavour turns on JSX and `{expression}`
//! constructs and turns off HTML, autolinks and indented code, matching
//! how MDX itself reads a document.

use markdown::Constructs;
use markdown::message::{Message, Place as MessagePlace};
use markdown::unist;
use mdxpad_ast::{Location, Place, Point};

use crate::{ParseError, Parser};

/// MDX parser implementation.
///
/// Uses `markdown-rs` for parsing, which supports:
/// - CommonMark
/// - MDX JSX and expressions
/// - GFM, math and frontmatter when the caller enables them
pub struct MdxParser;

impl MdxParser {
    /// Creates a new MDX parser.
    pub fn new() -> Self {
        Self
    }
}

impl Default for MdxParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for MdxParser {
    fn name(&self) -> &str {
        "mdx"
    }

    fn extensions(&self) -> &[&str] {
        &["mdx"]
    }

    fn constructs(&self) -> Constructs {
        Constructs::mdx()
    }
}

/// Plain Markdown parser implementation (no JSX, no expressions).
pub struct MarkdownParser;

impl MarkdownParser {
    /// Creates a new Markdown parser.
    pub fn new() -> Self {
        Self
    }
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for MarkdownParser {
    fn name(&self) -> &str {
        "markdown"
    }

    fn extensions(&self) -> &[&str] {
        &["md", "markdown", "mdown", "mkdn", "mkd"]
    }

    fn constructs(&self) -> Constructs {
        Constructs::default()
    }
}

/// Converts a markdown-rs point to an mdxpad point.
pub fn convert_point(point: &unist::Point) -> Point {
    Point::new(point.line as u32, point.column as u32, point.offset as u32)
}

/// Converts a markdown-rs position to an mdxpad location.
pub fn convert_position(position: &unist::Position) -> Location {
    Location::new(convert_point(&position.start), convert_point(&position.end))
}

/// Normalizes a markdown-rs message into a parse error.
pub(crate) fn message_to_error(message: Message) -> ParseError {
    let place = message.place.map(|place| match *place {
        MessagePlace::Position(position) => Place::Location(convert_position(&position)),
        MessagePlace::Point(point) => Place::Point(convert_point(&point)),
    });

    ParseError::InvalidSource {
        message: message.reason,
        place,
        offset: None,
        rule_id: Some(*message.rule_id),
        origin: Some(*message.source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markdown::mdast::Node;

    fn first_child(node: &Node) -> &Node {
        &node.children().unwrap()[0]
    }

    #[test]
    fn test_parse_heading() {
        let parser = MdxParser::new();
        let tree = parser.parse("# Title", parser.constructs()).unwrap();

        match first_child(&tree) {
            Node::Heading(heading) => assert_eq!(heading.depth, 1),
            other => panic!("Expected heading, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_jsx_flow_element() {
        let parser = MdxParser::new();
        let tree = parser
            .parse("<div>\n  hello\n</div>", parser.constructs())
            .unwrap();

        assert!(matches!(first_child(&tree), Node::MdxJsxFlowElement(_)));
    }

    #[test]
    fn test_unclosed_jsx_is_an_error() {
        let parser = MdxParser::new();
        let err = parser.parse("<div>", parser.constructs()).unwrap_err();

        match &err {
            ParseError::InvalidSource { place, .. } => assert!(place.is_some()),
            other => panic!("Expected invalid source, got {:?}", other),
        }
    }

    #[test]
    fn test_markdown_parser_treats_jsx_as_html() {
        let parser = MarkdownParser::new();
        let tree = parser.parse("<div>", parser.constructs()).unwrap();

        assert!(matches!(first_child(&tree), Node::Html(_)));
    }

    #[test]
    fn test_gfm_table_requires_construct() {
        let parser = MdxParser::new();
        let source = "| a |\n| - |\n| b |";

        let plain = parser.parse(source, parser.constructs()).unwrap();
        assert!(matches!(first_child(&plain), Node::Paragraph(_)));

        let mut constructs = parser.constructs();
        constructs.gfm_table = true;
        let gfm = parser.parse(source, constructs).unwrap();
        assert!(matches!(first_child(&gfm), Node::Table(_)));
    }

    #[test]
    fn test_frontmatter_construct() {
        let parser = MdxParser::new();
        let mut constructs = parser.constructs();
        constructs.frontmatter = true;

        let tree = parser.parse("---\ntitle: x\n---\n\n# Hi", constructs).unwrap();
        assert!(matches!(first_child(&tree), Node::Yaml(_)));
    }

    #[test]
    fn test_extensions() {
        assert!(MdxParser::new().can_parse("MDX"));
        assert!(MarkdownParser::new().can_parse("md"));
        assert!(!MarkdownParser::new().can_parse("mdx"));
    }

    #[test]
    fn test_convert_position() {
        let position = unist::Position::new(1, 2, 1, 3, 4, 20);
        let loc = convert_position(&position);
        assert_eq!(loc.start, Point::new(1, 2, 1));
        assert_eq!(loc.end, Point::new(3, 4, 20));
    }
}

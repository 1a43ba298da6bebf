//! # mdxpad_parser
//!
//! Parser layer for mdxpad.
//!
//! This crate provides:
//! - A `Parser` trait fixing a document format's base constructs
//! - `MdxParser` and `MarkdownParser`, both built on `markdown-rs`
//! - An expression parser for the JavaScript subset allowed in `{…}`
//!
//! ## Example
//!
//! ```rust
//! use mdxpad_parser::{MdxParser, Parser, parse_expression};
//!
//! let parser = MdxParser::new();
//! let tree = parser.parse("Hello {name}", parser.constructs()).unwrap();
//! assert!(tree.children().is_some());
//!
//! let expr = parse_expression("{padding: '1rem'}").unwrap();
//! assert!(expr.is_some());
//! ```

mod error;
pub mod expression;
mod markdown;
mod traits;

pub use error::ParseError;
pub use expression::{Expr, parse_expression, parse_spread};
pub use markdown::{MarkdownParser, MdxParser, convert_point, convert_position};
pub use traits::Parser;

pub use ::markdown::Constructs;
pub use ::markdown::mdast;

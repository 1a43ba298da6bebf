//! # mdxpad_ast
//!
//! Shared data types for mdxpad.
//!
//! This crate provides:
//! - Source positions (`Point`, `Span`, `Location`, `Place`) compatible with
//!   the unist conventions used by markdown-rs
//! - `Value`, the dynamically typed result of embedded expressions
//! - `RenderNode`, the element tree a compiled document renders to
//!
//! ## Example
//!
//! ```rust
//! use mdxpad_ast::{Object, RenderNode};
//!
//! let tree = RenderNode::root(vec![RenderNode::element(
//!     "h1",
//!     Object::new(),
//!     vec![RenderNode::text("Title")],
//! )]);
//!
//! assert_eq!(tree.to_html(), "<h1>Title</h1>");
//! ```

mod node;
mod span;
mod value;

pub use node::{Element, RenderNode, style_to_css};
pub use span::{Location, Place, Point, Span};
pub use value::{Object, Value, format_number};

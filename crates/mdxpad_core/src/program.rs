//! The executable form of a compiled document.
//!
//! Lowering turns mdast into a [`Program`]: a tree that still contains
//! unevaluated expressions and unresolved component references. Running it
//! against a [`RenderContext`] yields the final [`RenderNode`] tree.

use std::fmt;
use std::sync::Arc;

use mdxpad_ast::{Place, RenderNode, Value};
use mdxpad_parser::Expr;

use crate::{RenderContext, RenderError, runtime};

/// A lowered document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub children: Vec<ProgramNode>,
}

/// A node of a lowered document.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramNode {
    /// A host element.
    ///
    /// `overridable` is set for elements produced from markdown syntax;
    /// a component registered under the same tag name replaces them.
    Element {
        tag: String,
        attributes: Vec<Attribute>,
        children: Vec<ProgramNode>,
        overridable: bool,
    },
    /// A reference to a component supplied at render time.
    Component {
        name: String,
        attributes: Vec<Attribute>,
        children: Vec<ProgramNode>,
        place: Option<Place>,
    },
    /// `<>…</>`
    Fragment(Vec<ProgramNode>),
    Text(String),
    /// An embedded `{expression}`.
    Expression { expr: Expr, place: Option<Place> },
}

/// A JSX attribute or a markdown-derived property.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Static { name: String, value: Value },
    Dynamic { name: String, expr: Expr },
    Spread(Expr),
}

impl ProgramNode {
    /// Creates a markdown-derived element.
    pub fn element(tag: impl Into<String>, attributes: Vec<Attribute>, children: Vec<ProgramNode>) -> Self {
        ProgramNode::Element {
            tag: tag.into(),
            attributes,
            children,
            overridable: true,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        ProgramNode::Text(value.into())
    }
}

impl Attribute {
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute::Static {
            name: name.into(),
            value: Value::String(value.into()),
        }
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Attribute::Static {
            name: name.into(),
            value: Value::Bool(true),
        }
    }

    /// The attribute name, `None` for spreads.
    pub fn name(&self) -> Option<&str> {
        match self {
            Attribute::Static { name, .. } | Attribute::Dynamic { name, .. } => Some(name),
            Attribute::Spread(_) => None,
        }
    }
}

/// The output of a successful compile.
///
/// Calling [`CompiledOutput::render`] executes the program; compiling never
/// renders. Cloning is cheap.
#[derive(Clone)]
pub struct CompiledOutput {
    program: Arc<Program>,
    context: RenderContext,
}

impl CompiledOutput {
    pub fn new(program: Program, context: RenderContext) -> Self {
        Self {
            program: Arc::new(program),
            context,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Produces the element tree.
    ///
    /// This may fail (or panic, inside a host component); callers that must
    /// stay alive go through the fault-isolated renderer.
    pub fn render(&self) -> Result<RenderNode, RenderError> {
        runtime::execute(&self.program, &self.context)
    }
}

impl fmt::Debug for CompiledOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledOutput")
            .field("nodes", &self.program.children.len())
            .field("context", &self.context)
            .finish()
    }
}

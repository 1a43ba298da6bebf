//! Parser for embedded expressions.
//!
//! MDX lets authors write JavaScript inside `{…}` and in JSX attribute
//! values. mdxpad evaluates a side-effect free subset of it: literals,
//! template strings, arrays, objects, identifiers, member access and the
//! usual unary, binary, logical and conditional operators. Anything with
//! side effects or closures (calls, `new`, assignment, arrow functions) is
//! reported as unsupported.
//!
//! Parsing is done by `oxc_parser`; the resulting tree is lowered into the
//! owned [`Expr`] the runtime evaluates.

use mdxpad_ast::format_number;
use oxc::allocator::Allocator;
use oxc::ast::ast::{
    ArrayExpressionElement, ChainElement, ComputedMemberExpression, Expression, ObjectPropertyKind,
    PropertyKey, PropertyKind, StaticMemberExpression, TemplateLiteral,
};
use oxc::diagnostics::OxcDiagnostic;
use oxc::parser::Parser;
use oxc::span::{GetSpan, SourceType};
use oxc::syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};

use crate::ParseError;

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Template(Vec<TemplatePart>),
    Identifier(String),
    Array(Vec<Expr>),
    Object(Vec<Property>),
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Str(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    KeyValue(String, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

/// Deepest nesting accepted inside one expression. Every bracket and every
/// operator between two commas counts as a level.
pub const MAX_NESTING: usize = 32;

/// Parses the text of a `{…}` expression.
///
/// Returns `Ok(None)` when the expression is empty or only holds comments,
/// as in `{/* note */}`.
pub fn parse_expression(source: &str) -> Result<Option<Expr>, ParseError> {
    if !scan(source)? {
        return Ok(None);
    }
    parse_with_oxc(source).map(Some)
}

/// Parses the text of a `{...spread}` JSX attribute.
pub fn parse_spread(source: &str) -> Result<Expr, ParseError> {
    let trimmed = source.trim_start();
    let Some(argument) = trimmed.strip_prefix("...") else {
        return Err(ParseError::invalid_source_at(
            "Unexpected attribute expression, expected a spread (`{...props}`)",
            source.len() - trimmed.len(),
        ));
    };
    if !scan(argument)? {
        return Err(ParseError::invalid_source_at(
            "Unexpected end of spread, expected an expression",
            source.len(),
        ));
    }
    parse_with_oxc(argument)
}

fn parse_with_oxc(source: &str) -> Result<Expr, ParseError> {
    let allocator = Allocator::default();
    let expression = Parser::new(&allocator, source, SourceType::mjs())
        .parse_expression()
        .map_err(syntax_error)?;

    let end = expression.span().end as usize;
    if end < source.len() && scan(&source[end..])? {
        return Err(ParseError::invalid_source_at(
            "Unexpected content after expression",
            end,
        ));
    }
    lower(&expression)
}

fn syntax_error(errors: Vec<OxcDiagnostic>) -> ParseError {
    let Some(error) = errors.into_iter().next() else {
        return ParseError::invalid_source("Invalid expression");
    };
    let offset = error
        .labels
        .as_ref()
        .and_then(|labels| labels.first())
        .map(|label| label.offset());

    ParseError::InvalidSource {
        message: error.to_string(),
        place: None,
        offset,
        rule_id: None,
        origin: Some("oxc".to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opener {
    Root,
    Bracket(u8),
    Template,
    Interpolation,
}

struct Frame {
    opener: Opener,
    /// Operators seen in this frame since the last comma.
    operators: usize,
}

/// Upper bound of the tree depth of the expression scanned so far.
struct Nesting {
    frames: Vec<Frame>,
    level: usize,
}

impl Nesting {
    fn new() -> Self {
        Self {
            frames: vec![Frame {
                opener: Opener::Root,
                operators: 0,
            }],
            level: 0,
        }
    }

    fn top(&self) -> Opener {
        self.frames.last().map_or(Opener::Root, |frame| frame.opener)
    }

    fn open(&mut self, opener: Opener) {
        self.frames.push(Frame {
            opener,
            operators: 0,
        });
        self.level += 1;
    }

    fn close(&mut self) {
        if self.frames.len() > 1 {
            if let Some(frame) = self.frames.pop() {
                self.level -= 1 + frame.operators;
            }
        }
    }

    fn operator(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.operators += 1;
            self.level += 1;
        }
    }

    fn separator(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            self.level -= frame.operators;
            frame.operators = 0;
        }
    }
}

const OPERATOR_KEYWORDS: &[&str] = &[
    "typeof", "void", "delete", "await", "new", "yield", "in", "instanceof",
];

/// Checks that `source` does not nest deeper than [`MAX_NESTING`] before
/// it reaches the recursive parser. Returns whether it holds anything
/// besides whitespace and comments.
fn scan(source: &str) -> Result<bool, ParseError> {
    let bytes = source.as_bytes();
    let mut nesting = Nesting::new();
    let mut significant = false;
    // Whether the previous token ends an operand.
    let mut operand = false;
    let mut i = 0;

    while i < bytes.len() {
        if nesting.level > MAX_NESTING {
            return Err(ParseError::invalid_source_at(
                format!("Expression nests too deeply (more than {} levels)", MAX_NESTING),
                i,
            ));
        }

        if nesting.top() == Opener::Template {
            match bytes[i] {
                b'\\' => i += 2,
                b'`' => {
                    nesting.close();
                    operand = true;
                    i += 1;
                }
                b'$' if bytes.get(i + 1) == Some(&b'{') => {
                    nesting.open(Opener::Interpolation);
                    operand = false;
                    i += 2;
                }
                _ => i += 1,
            }
            continue;
        }

        let byte = bytes[i];
        let next = bytes.get(i + 1).copied();
        match (byte, next) {
            (b' ' | b'\t' | b'\n' | b'\r', _) => {
                i += 1;
                continue;
            }
            (b'/', Some(b'/')) => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |end| i + end);
                continue;
            }
            (b'/', Some(b'*')) => {
                match source[i + 2..].find("*/") {
                    Some(end) => i += 2 + end + 2,
                    None => return Err(ParseError::invalid_source_at("Unterminated comment", i)),
                }
                continue;
            }
            _ => {}
        }

        significant = true;
        match byte {
            b'\'' | b'"' => {
                i = skip_string(bytes, i);
                operand = true;
                continue;
            }
            b'`' => {
                nesting.open(Opener::Template);
                i += 1;
                continue;
            }
            b'(' | b'[' | b'{' => {
                if operand {
                    // Call or computed member access.
                    nesting.operator();
                }
                nesting.open(Opener::Bracket(byte));
                operand = false;
            }
            b')' | b']' | b'}' => {
                let balanced = match nesting.top() {
                    Opener::Bracket(open) => matches!(
                        (open, byte),
                        (b'(', b')') | (b'[', b']') | (b'{', b'}')
                    ),
                    Opener::Interpolation => byte == b'}',
                    _ => false,
                };
                if balanced {
                    nesting.close();
                }
                operand = true;
            }
            b',' | b';' => {
                nesting.separator();
                operand = false;
            }
            b':' => operand = false,
            b'/' if !operand => return Err(ParseError::unsupported("regular expressions")),
            b'.' if next.is_some_and(|b| b.is_ascii_digit()) && !operand => {
                i = skip_word(bytes, i + 1);
                operand = true;
                continue;
            }
            b if is_word_byte(b) => {
                let end = skip_word(bytes, i);
                let word = &source[i..end];
                if OPERATOR_KEYWORDS.contains(&word) {
                    nesting.operator();
                    operand = false;
                } else {
                    operand = true;
                }
                i = end;
                continue;
            }
            _ => {
                // Multi-character operators count once; `+` and `-` always
                // count since they may be a chain of prefixes.
                let previous = i.checked_sub(1).map(|p| bytes[p]);
                let continues = match (previous, byte) {
                    (Some(b'=' | b'!' | b'<' | b'>'), b'=') => true,
                    (Some(b'?'), b'.') => true,
                    (Some(p), b'&' | b'|' | b'?' | b'*' | b'<' | b'>' | b'.') => p == byte,
                    _ => false,
                };
                if !continues {
                    nesting.operator();
                }
                operand = false;
            }
        }
        i += 1;
    }

    if nesting.level > MAX_NESTING {
        return Err(ParseError::invalid_source_at(
            format!("Expression nests too deeply (more than {} levels)", MAX_NESTING),
            bytes.len(),
        ));
    }
    Ok(significant)
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$' || byte >= 0x80
}

fn skip_word(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| !is_word_byte(b))
        .map_or(bytes.len(), |end| start + end)
}

/// Index after the string literal starting at `start`. An unterminated
/// string ends at the line break; the parser reports it.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn lower(expression: &Expression<'_>) -> Result<Expr, ParseError> {
    let unsupported = match expression {
        Expression::BooleanLiteral(literal) => return Ok(Expr::Bool(literal.value)),
        Expression::NullLiteral(_) => return Ok(Expr::Null),
        Expression::NumericLiteral(literal) => return Ok(Expr::Number(literal.value)),
        Expression::StringLiteral(literal) => return Ok(Expr::String(literal.value.to_string())),
        Expression::TemplateLiteral(template) => return lower_template(template).map(Expr::Template),
        Expression::Identifier(ident) => {
            return Ok(match ident.name.as_str() {
                "undefined" => Expr::Undefined,
                name => Expr::Identifier(name.to_string()),
            });
        }
        Expression::ArrayExpression(array) => {
            return array
                .elements
                .iter()
                .map(lower_element)
                .collect::<Result<Vec<_>, _>>()
                .map(Expr::Array);
        }
        Expression::ObjectExpression(object) => {
            return object
                .properties
                .iter()
                .map(lower_property)
                .collect::<Result<Vec<_>, _>>()
                .map(Expr::Object);
        }
        Expression::StaticMemberExpression(member) => return lower_static_member(member),
        Expression::ComputedMemberExpression(member) => return lower_computed_member(member),
        Expression::ChainExpression(chain) => match &chain.expression {
            ChainElement::StaticMemberExpression(member) => return lower_static_member(member),
            ChainElement::ComputedMemberExpression(member) => return lower_computed_member(member),
            ChainElement::CallExpression(_) => "function calls",
            _ => "this kind of optional chain",
        },
        Expression::ParenthesizedExpression(paren) => return lower(&paren.expression),
        Expression::UnaryExpression(unary) => {
            return Ok(Expr::Unary {
                op: unary_op(unary.operator)?,
                operand: Box::new(lower(&unary.argument)?),
            });
        }
        Expression::BinaryExpression(expr) => {
            return Ok(binary(
                binary_op(expr.operator)?,
                lower(&expr.left)?,
                lower(&expr.right)?,
            ));
        }
        Expression::LogicalExpression(expr) => {
            return Ok(logical(
                logical_op(expr.operator),
                lower(&expr.left)?,
                lower(&expr.right)?,
            ));
        }
        Expression::ConditionalExpression(expr) => {
            return Ok(Expr::Conditional {
                test: Box::new(lower(&expr.test)?),
                consequent: Box::new(lower(&expr.consequent)?),
                alternate: Box::new(lower(&expr.alternate)?),
            });
        }
        Expression::CallExpression(_) => "function calls",
        Expression::NewExpression(_) => "`new` expressions",
        Expression::ArrowFunctionExpression(_) => "arrow functions",
        Expression::FunctionExpression(_) => "functions",
        Expression::ClassExpression(_) => "classes",
        Expression::AssignmentExpression(_) => "assignment",
        Expression::UpdateExpression(_) => "`++` and `--`",
        Expression::SequenceExpression(_) => "comma expressions",
        Expression::TaggedTemplateExpression(_) => "tagged templates",
        Expression::RegExpLiteral(_) => "regular expressions",
        Expression::BigIntLiteral(_) => "BigInt literals",
        Expression::ThisExpression(_) => "`this`",
        Expression::AwaitExpression(_) | Expression::YieldExpression(_) => "`await` and `yield`",
        _ => "this kind of expression",
    };
    Err(ParseError::unsupported(unsupported))
}

fn lower_template(template: &TemplateLiteral<'_>) -> Result<Vec<TemplatePart>, ParseError> {
    let mut parts = Vec::new();
    for (index, quasi) in template.quasis.iter().enumerate() {
        let text = quasi.value.cooked.as_ref().unwrap_or(&quasi.value.raw);
        if !text.is_empty() {
            parts.push(TemplatePart::Str(text.to_string()));
        }
        if let Some(expression) = template.expressions.get(index) {
            parts.push(TemplatePart::Expr(lower(expression)?));
        }
    }
    Ok(parts)
}

fn lower_element(element: &ArrayExpressionElement<'_>) -> Result<Expr, ParseError> {
    match element {
        ArrayExpressionElement::SpreadElement(_) => Err(ParseError::unsupported("spread in arrays")),
        // A hole, as in `[1, , 3]`.
        ArrayExpressionElement::Elision(_) => Ok(Expr::Undefined),
        other => match other.as_expression() {
            Some(expression) => lower(expression),
            None => Err(ParseError::unsupported("this kind of array element")),
        },
    }
}

fn lower_property(property: &ObjectPropertyKind<'_>) -> Result<Property, ParseError> {
    match property {
        ObjectPropertyKind::SpreadProperty(spread) => Ok(Property::Spread(lower(&spread.argument)?)),
        ObjectPropertyKind::ObjectProperty(property) => {
            if property.method || !matches!(property.kind, PropertyKind::Init) {
                return Err(ParseError::unsupported("methods and accessors"));
            }
            if property.computed {
                return Err(ParseError::unsupported("computed keys"));
            }
            let key = match &property.key {
                PropertyKey::StaticIdentifier(ident) => ident.name.to_string(),
                PropertyKey::StringLiteral(literal) => literal.value.to_string(),
                PropertyKey::NumericLiteral(literal) => format_number(literal.value),
                _ => return Err(ParseError::unsupported("this kind of property key")),
            };
            Ok(Property::KeyValue(key, lower(&property.value)?))
        }
    }
}

fn lower_static_member(member: &StaticMemberExpression<'_>) -> Result<Expr, ParseError> {
    Ok(Expr::Member {
        object: Box::new(lower(&member.object)?),
        property: member.property.name.to_string(),
        optional: member.optional,
    })
}

fn lower_computed_member(member: &ComputedMemberExpression<'_>) -> Result<Expr, ParseError> {
    Ok(Expr::Index {
        object: Box::new(lower(&member.object)?),
        index: Box::new(lower(&member.expression)?),
        optional: member.optional,
    })
}

fn unary_op(operator: UnaryOperator) -> Result<UnaryOp, ParseError> {
    match operator {
        UnaryOperator::LogicalNot => Ok(UnaryOp::Not),
        UnaryOperator::UnaryNegation => Ok(UnaryOp::Neg),
        UnaryOperator::UnaryPlus => Ok(UnaryOp::Plus),
        UnaryOperator::Typeof => Ok(UnaryOp::TypeOf),
        other => Err(ParseError::unsupported(format!(
            "the `{}` operator",
            other.as_str()
        ))),
    }
}

fn binary_op(operator: BinaryOperator) -> Result<BinaryOp, ParseError> {
    Ok(match operator {
        BinaryOperator::Addition => BinaryOp::Add,
        BinaryOperator::Subtraction => BinaryOp::Sub,
        BinaryOperator::Multiplication => BinaryOp::Mul,
        BinaryOperator::Division => BinaryOp::Div,
        BinaryOperator::Remainder => BinaryOp::Rem,
        BinaryOperator::Equality => BinaryOp::Eq,
        BinaryOperator::Inequality => BinaryOp::NotEq,
        BinaryOperator::StrictEquality => BinaryOp::StrictEq,
        BinaryOperator::StrictInequality => BinaryOp::StrictNotEq,
        BinaryOperator::LessThan => BinaryOp::Lt,
        BinaryOperator::GreaterThan => BinaryOp::Gt,
        BinaryOperator::LessEqualThan => BinaryOp::LtEq,
        BinaryOperator::GreaterEqualThan => BinaryOp::GtEq,
        other => {
            return Err(ParseError::unsupported(format!(
                "the `{}` operator",
                other.as_str()
            )));
        }
    })
}

fn logical_op(operator: LogicalOperator) -> LogicalOp {
    match operator {
        LogicalOperator::And => LogicalOp::And,
        LogicalOperator::Or => LogicalOp::Or,
        LogicalOperator::Coalesce => LogicalOp::Nullish,
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    Expr::Logical {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

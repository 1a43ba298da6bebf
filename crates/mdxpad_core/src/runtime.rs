//! Program execution.
//!
//! Executing a [`Program`] evaluates its embedded expressions with
//! JavaScript semantics, resolves component references against the
//! [`RenderContext`] and builds the [`RenderNode`] tree.
//!
//! The only binding in scope is `props`. Any other identifier is a
//! `ReferenceError`, exactly as it would be in a compiled MDX module.

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use mdxpad_ast::{Object, RenderNode, Value, format_number};
use mdxpad_parser::expression::{BinaryOp, LogicalOp, Property, TemplatePart, UnaryOp};
use mdxpad_parser::Expr;

use crate::program::{Attribute, Program, ProgramNode};
use crate::RenderError;

/// A host-provided component.
///
/// Receives the evaluated attributes and the rendered children. An `Err`
/// is reported as a render fault of the document.
pub trait Component: Send + Sync {
    fn render(&self, props: &Object, children: Vec<RenderNode>) -> Result<RenderNode, String>;
}

impl<F> Component for F
where
    F: Fn(&Object, Vec<RenderNode>) -> Result<RenderNode, String> + Send + Sync,
{
    fn render(&self, props: &Object, children: Vec<RenderNode>) -> Result<RenderNode, String> {
        self(props, children)
    }
}

/// What a document can see when it runs: its `props` and the components
/// provided by the host.
#[derive(Clone, Default)]
pub struct RenderContext {
    props: Object,
    components: HashMap<String, Arc<dyn Component>>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of `props`.
    pub fn with_props(mut self, props: Object) -> Self {
        self.props = props;
        self
    }

    /// Registers a component.
    ///
    /// Names starting with an uppercase letter (or containing a dot) are
    /// used by JSX; lowercase names replace the elements markdown syntax
    /// produces, such as `h1` or `a`.
    pub fn with_component(mut self, name: impl Into<String>, component: impl Component + 'static) -> Self {
        self.components.insert(name.into(), Arc::new(component));
        self
    }

    pub fn props(&self) -> &Object {
        &self.props
    }

    pub fn component(&self, name: &str) -> Option<&Arc<dyn Component>> {
        self.components.get(name)
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.components.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("RenderContext")
            .field("props", &self.props)
            .field("components", &names)
            .finish()
    }
}

/// Executes a program.
pub(crate) fn execute(program: &Program, context: &RenderContext) -> Result<RenderNode, RenderError> {
    let runtime = Runtime {
        context,
        props: Value::Object(context.props.clone()),
        depth: Cell::new(0),
    };
    let mut children = Vec::new();
    runtime.render_all(&program.children, &mut children)?;
    Ok(RenderNode::root(children))
}

/// Evaluates a single expression with the given props in scope.
pub fn evaluate(expr: &Expr, props: &Object) -> Result<Value, RenderError> {
    let context = RenderContext::new();
    let runtime = Runtime {
        context: &context,
        props: Value::Object(props.clone()),
        depth: Cell::new(0),
    };
    runtime.eval(expr)
}

/// Deepest combined node and expression nesting a render walks through.
pub(crate) const MAX_RENDER_DEPTH: usize = 256;

struct Runtime<'a> {
    context: &'a RenderContext,
    props: Value,
    depth: Cell<usize>,
}

impl Runtime<'_> {
    fn descend<T>(&self, f: impl FnOnce() -> Result<T, RenderError>) -> Result<T, RenderError> {
        let depth = self.depth.get();
        if depth >= MAX_RENDER_DEPTH {
            return Err(RenderError::Nesting(MAX_RENDER_DEPTH));
        }
        self.depth.set(depth + 1);
        let result = f();
        self.depth.set(depth);
        result
    }

    fn render_all(&self, nodes: &[ProgramNode], out: &mut Vec<RenderNode>) -> Result<(), RenderError> {
        for node in nodes {
            self.render(node, out)?;
        }
        Ok(())
    }

    fn render(&self, node: &ProgramNode, out: &mut Vec<RenderNode>) -> Result<(), RenderError> {
        self.descend(|| self.render_node(node, out))
    }

    fn render_node(&self, node: &ProgramNode, out: &mut Vec<RenderNode>) -> Result<(), RenderError> {
        match node {
            ProgramNode::Element {
                tag,
                attributes,
                children,
                overridable,
            } => {
                let properties = self.attributes(attributes)?;
                let mut rendered = Vec::new();
                self.render_all(children, &mut rendered)?;

                match self.context.component(tag) {
                    Some(component) if *overridable => {
                        self.call(tag, component.as_ref(), &properties, rendered, out)
                    }
                    _ => {
                        out.push(RenderNode::element(tag.clone(), properties, rendered));
                        Ok(())
                    }
                }
            }
            ProgramNode::Component {
                name,
                attributes,
                children,
                ..
            } => {
                let component = self
                    .context
                    .component(name)
                    .ok_or_else(|| RenderError::MissingComponent(name.clone()))?;
                let properties = self.attributes(attributes)?;
                let mut rendered = Vec::new();
                self.render_all(children, &mut rendered)?;
                self.call(name, component.as_ref(), &properties, rendered, out)
            }
            ProgramNode::Fragment(children) => self.render_all(children, out),
            ProgramNode::Text(value) => {
                out.push(RenderNode::text(value.clone()));
                Ok(())
            }
            ProgramNode::Expression { expr, .. } => {
                let value = self.eval(expr)?;
                push_child(value, out)
            }
        }
    }

    fn call(
        &self,
        name: &str,
        component: &dyn Component,
        properties: &Object,
        children: Vec<RenderNode>,
        out: &mut Vec<RenderNode>,
    ) -> Result<(), RenderError> {
        let node = component
            .render(properties, children)
            .map_err(|message| RenderError::Component {
                component: name.to_string(),
                message,
            })?;

        match node {
            RenderNode::Root { children } => out.extend(children),
            other => out.push(other),
        }
        Ok(())
    }

    fn attributes(&self, attributes: &[Attribute]) -> Result<Object, RenderError> {
        let mut properties = Object::new();
        for attribute in attributes {
            match attribute {
                Attribute::Static { name, value } => properties.insert(name.clone(), value.clone()),
                Attribute::Dynamic { name, expr } => properties.insert(name.clone(), self.eval(expr)?),
                Attribute::Spread(expr) => spread_into(&mut properties, self.eval(expr)?),
            }
        }
        Ok(properties)
    }

    fn eval(&self, expr: &Expr) -> Result<Value, RenderError> {
        self.descend(|| self.eval_expr(expr))
    }

    fn eval_expr(&self, expr: &Expr) -> Result<Value, RenderError> {
        match expr {
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Template(parts) => {
                let mut result = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Str(s) => result.push_str(s),
                        TemplatePart::Expr(e) => result.push_str(&self.eval(e)?.to_string()),
                    }
                }
                Ok(Value::String(result))
            }
            Expr::Identifier(name) => self.lookup(name),
            Expr::Array(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Object(properties) => {
                let mut object = Object::new();
                for property in properties {
                    match property {
                        Property::KeyValue(key, value) => object.insert(key.clone(), self.eval(value)?),
                        Property::Spread(value) => spread_into(&mut object, self.eval(value)?),
                    }
                }
                Ok(Value::Object(object))
            }
            Expr::Member { .. } | Expr::Index { .. } => {
                Ok(self.eval_chain(expr)?.unwrap_or(Value::Undefined))
            }
            Expr::Unary { op, operand } => self.eval_unary(*op, operand),
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(binary(*op, &left, &right))
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit { Ok(left) } else { self.eval(right) }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
        }
    }

    /// Evaluates a member chain. `None` means an optional link short-circuited
    /// the whole chain.
    fn eval_chain(&self, expr: &Expr) -> Result<Option<Value>, RenderError> {
        let (object, key, optional) = match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => (object, Value::String(property.clone()), *optional),
            Expr::Index {
                object,
                index,
                optional,
            } => (object, self.eval(index)?, *optional),
            other => return self.eval(other).map(Some),
        };

        let Some(target) = self.descend(|| self.eval_chain(object))? else {
            return Ok(None);
        };

        if target.is_nullish() {
            if optional {
                return Ok(None);
            }
            return Err(RenderError::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                target, key
            )));
        }

        Ok(Some(get_property(&target, &key)))
    }

    fn eval_unary(&self, op: UnaryOp, operand: &Expr) -> Result<Value, RenderError> {
        if op == UnaryOp::TypeOf {
            // `typeof` never throws for an undeclared identifier.
            if let Expr::Identifier(name) = operand {
                return Ok(Value::String(
                    self.lookup(name)
                        .map(|v| v.type_name())
                        .unwrap_or("undefined")
                        .to_string(),
                ));
            }
            return Ok(Value::String(self.eval(operand)?.type_name().to_string()));
        }

        let value = self.eval(operand)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::TypeOf => Value::String(value.type_name().to_string()),
        })
    }

    fn lookup(&self, name: &str) -> Result<Value, RenderError> {
        match name {
            "props" => Ok(self.props.clone()),
            "NaN" => Ok(Value::Number(f64::NAN)),
            "Infinity" => Ok(Value::Number(f64::INFINITY)),
            _ => Err(RenderError::Reference(name.to_string())),
        }
    }
}

fn get_property(target: &Value, key: &Value) -> Value {
    match (target, key) {
        (Value::Object(object), key) => object.get(&key.to_string()).cloned().unwrap_or_default(),
        (Value::Array(items), Value::String(k)) if k == "length" => Value::Number(items.len() as f64),
        (Value::Array(items), key) => index_of(key)
            .and_then(|i| items.get(i).cloned())
            .unwrap_or_default(),
        (Value::String(s), Value::String(k)) if k == "length" => {
            Value::Number(s.encode_utf16().count() as f64)
        }
        (Value::String(s), key) => index_of(key)
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or_default(),
        _ => Value::Undefined,
    }
}

fn index_of(key: &Value) -> Option<usize> {
    let n = match key {
        Value::Number(n) => *n,
        Value::String(s) => s.parse::<f64>().ok()?,
        _ => return None,
    };
    (n >= 0.0 && n.fract() == 0.0).then_some(n as usize)
}

fn spread_into(target: &mut Object, value: Value) {
    match value {
        Value::Object(object) => {
            for (key, value) in object.iter() {
                target.insert(key, value.clone());
            }
        }
        Value::Array(items) => {
            for (i, item) in items.into_iter().enumerate() {
                target.insert(i.to_string(), item);
            }
        }
        Value::String(s) => {
            for (i, c) in s.chars().enumerate() {
                target.insert(i.to_string(), Value::String(c.to_string()));
            }
        }
        _ => {}
    }
}

fn push_child(value: Value, out: &mut Vec<RenderNode>) -> Result<(), RenderError> {
    match value {
        Value::Undefined | Value::Null | Value::Bool(_) => Ok(()),
        Value::Number(n) => {
            out.push(RenderNode::text(format_number(n)));
            Ok(())
        }
        Value::String(s) => {
            out.push(RenderNode::text(s));
            Ok(())
        }
        Value::Array(items) => items.into_iter().try_for_each(|item| push_child(item, out)),
        Value::Object(object) => Err(RenderError::InvalidChild(
            object.keys().collect::<Vec<_>>().join(", "),
        )),
    }
}

fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        other => other.clone(),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            let (l, r) = (to_primitive(left), to_primitive(right));
            if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
                Value::String(format!("{}{}", l, r))
            } else {
                Value::Number(l.to_number() + r.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Value::Bool(loose_eq(left, right)),
        BinaryOp::NotEq => Value::Bool(!loose_eq(left, right)),
        BinaryOp::StrictEq => Value::Bool(left == right),
        BinaryOp::StrictNotEq => Value::Bool(left != right),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::LtEq => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::GtEq => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (to_primitive(left), to_primitive(right)) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(&b)),
        (a, b) => a.to_number().partial_cmp(&b.to_number()),
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
        (Value::Number(_), Value::Number(_))
        | (Value::String(_), Value::String(_))
        | (Value::Bool(_), Value::Bool(_)) => left == right,
        (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => left == right,
        (Value::Array(_) | Value::Object(_), _) => loose_eq(&to_primitive(left), right),
        (_, Value::Array(_) | Value::Object(_)) => loose_eq(left, &to_primitive(right)),
        _ => left.to_number() == right.to_number(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdxpad_parser::parse_expression;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn props() -> Object {
        Object::from_iter([
            ("name", Value::from("Ada")),
            ("count", Value::from(3.0)),
            (
                "user",
                Value::Object(Object::from_iter([("email", Value::from("ada@example.com"))])),
            ),
            ("tags", Value::Array(vec![Value::from("a"), Value::from("b")])),
        ])
    }

    fn eval(source: &str) -> Result<Value, RenderError> {
        let expr = parse_expression(source).unwrap().unwrap();
        evaluate(&expr, &props())
    }

    #[rstest]
    #[case("1 + 2 * 3", Value::from(7.0))]
    #[case("'a' + 1", Value::from("a1"))]
    #[case("`Hi ${props.name}!`", Value::from("Hi Ada!"))]
    #[case("props.count > 2 ? 'many' : 'few'", Value::from("many"))]
    #[case("props.missing ?? 'fallback'", Value::from("fallback"))]
    #[case("props.name && props.count", Value::from(3.0))]
    #[case("props.tags.length", Value::from(2.0))]
    #[case("props.tags[1]", Value::from("b"))]
    #[case("props.name.length", Value::from(3.0))]
    #[case("props.user['email']", Value::from("ada@example.com"))]
    #[case("props.nothing?.deep.chain", Value::Undefined)]
    #[case("typeof notDeclared", Value::from("undefined"))]
    #[case("typeof props", Value::from("object"))]
    #[case("null == undefined", Value::from(true))]
    #[case("null === undefined", Value::from(false))]
    #[case("'3' == 3", Value::from(true))]
    #[case("!props.count", Value::from(false))]
    #[case("'b' > 'a'", Value::from(true))]
    #[case("7 % 4", Value::from(3.0))]
    fn test_evaluate(#[case] source: &str, #[case] expected: Value) {
        assert_eq!(eval(source).unwrap(), expected);
    }

    #[test]
    fn test_object_spread() {
        let value = eval("{...props.user, email: 'x', extra: 1}").unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.keys().collect::<Vec<_>>(), vec!["email", "extra"]);
        assert_eq!(object.get("email"), Some(&Value::from("x")));
    }

    #[test]
    fn test_undeclared_identifier() {
        assert_eq!(
            eval("title").unwrap_err(),
            RenderError::Reference("title".to_string())
        );
    }

    #[test]
    fn test_property_of_undefined() {
        let err = eval("props.missing.value").unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Cannot read properties of undefined (reading 'value')"
        );
    }

    #[test]
    fn test_deep_program_is_a_render_error() {
        let mut node = ProgramNode::text("leaf");
        for _ in 0..MAX_RENDER_DEPTH + 10 {
            node = ProgramNode::element("div", vec![], vec![node]);
        }
        let err = execute(&program(vec![node]), &RenderContext::new()).unwrap_err();
        assert_eq!(err, RenderError::Nesting(MAX_RENDER_DEPTH));
    }

    #[test]
    fn test_deep_expression_is_a_render_error() {
        let mut expr = Expr::Bool(true);
        for _ in 0..MAX_RENDER_DEPTH + 10 {
            expr = Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(expr),
            };
        }
        assert_eq!(evaluate(&expr, &props()), Err(RenderError::Nesting(MAX_RENDER_DEPTH)));

        let mut chain = Expr::Identifier("props".into());
        for _ in 0..MAX_RENDER_DEPTH + 10 {
            chain = Expr::Member {
                object: Box::new(chain),
                property: "user".into(),
                optional: true,
            };
        }
        assert_eq!(evaluate(&chain, &props()), Err(RenderError::Nesting(MAX_RENDER_DEPTH)));
    }

    fn program(children: Vec<ProgramNode>) -> Program {
        Program { children }
    }

    fn expression(source: &str) -> ProgramNode {
        ProgramNode::Expression {
            expr: parse_expression(source).unwrap().unwrap(),
            place: None,
        }
    }

    #[test]
    fn test_execute_children() {
        let program = program(vec![ProgramNode::element(
            "p",
            vec![],
            vec![
                ProgramNode::text("n = "),
                expression("props.count"),
                expression("null"),
                expression("false"),
                expression("['x', ['y']]"),
            ],
        )]);
        let context = RenderContext::new().with_props(props());

        let tree = execute(&program, &context).unwrap();
        assert_eq!(tree.to_html(), "<p>n = 3xy</p>");
    }

    #[test]
    fn test_object_child_is_a_fault() {
        let program = program(vec![expression("{a: 1, b: 2}")]);
        let err = execute(&program, &RenderContext::new()).unwrap_err();
        assert_eq!(err, RenderError::InvalidChild("a, b".to_string()));
    }

    #[test]
    fn test_dynamic_attributes() {
        let program = program(vec![ProgramNode::Element {
            tag: "div".to_string(),
            attributes: vec![
                Attribute::string("id", "box"),
                Attribute::Dynamic {
                    name: "style".to_string(),
                    expr: parse_expression("{padding: '1rem'}").unwrap().unwrap(),
                },
                Attribute::Spread(parse_expression("{title: props.name}").unwrap().unwrap()),
            ],
            children: vec![],
            overridable: false,
        }]);
        let context = RenderContext::new().with_props(props());

        let tree = execute(&program, &context).unwrap();
        assert_eq!(
            tree.to_html(),
            r#"<div id="box" style="padding: 1rem" title="Ada"></div>"#
        );
    }

    #[test]
    fn test_component_resolution() {
        let program = program(vec![ProgramNode::Component {
            name: "Note".to_string(),
            attributes: vec![Attribute::string("kind", "info")],
            children: vec![ProgramNode::text("body")],
            place: None,
        }]);

        let err = execute(&program, &RenderContext::new()).unwrap_err();
        assert_eq!(err, RenderError::MissingComponent("Note".to_string()));

        let context = RenderContext::new().with_component(
            "Note",
            |props: &Object, children: Vec<RenderNode>| -> Result<RenderNode, String> {
                let mut properties = Object::new();
                properties.insert("className", props.get("kind").cloned().unwrap_or_default());
                Ok(RenderNode::element("aside", properties, children))
            },
        );
        let tree = execute(&program, &context).unwrap();
        assert_eq!(tree.to_html(), r#"<aside class="info">body</aside>"#);
    }

    #[test]
    fn test_component_error() {
        let program = program(vec![ProgramNode::Component {
            name: "Broken".to_string(),
            attributes: vec![],
            children: vec![],
            place: None,
        }]);
        let context = RenderContext::new()
            .with_component(
            "Broken",
            |_: &Object, _: Vec<RenderNode>| -> Result<RenderNode, String> { Err("nope".to_string()) },
        );

        let err = execute(&program, &context).unwrap_err();
        assert_eq!(err.to_string(), "Error in component `Broken`: nope");
    }

    #[test]
    fn test_markdown_elements_can_be_overridden() {
        let program = program(vec![
            ProgramNode::element("h1", vec![], vec![ProgramNode::text("Title")]),
            ProgramNode::Element {
                tag: "h1".to_string(),
                attributes: vec![],
                children: vec![ProgramNode::text("Literal")],
                overridable: false,
            },
        ]);
        let context = RenderContext::new().with_component(
            "h1",
            |_: &Object, children: Vec<RenderNode>| -> Result<RenderNode, String> {
                Ok(RenderNode::element("h2", Object::new(), children))
            },
        );

        let tree = execute(&program, &context).unwrap();
        assert_eq!(tree.to_html(), "<h2>Title</h2><h1>Literal</h1>");
    }
}

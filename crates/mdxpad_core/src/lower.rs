//! Lowering from mdast to a [`Program`].
//!
//! Markdown nodes become the elements GitHub renders for them, JSX becomes
//! elements, component references or fragments, and every embedded
//! expression is parsed here so syntax errors surface at compile time.

use std::collections::HashMap;

use mdxpad_ast::{Place, Point, Value};
use mdxpad_parser::mdast::{
    AlignKind, AttributeContent, AttributeValue, FootnoteDefinition, List, ListItem, Node, Table,
};
use mdxpad_parser::{ParseError, convert_point, convert_position, parse_expression, parse_spread};
use tracing::debug;

use crate::program::{Attribute, Program, ProgramNode};
use crate::{CompileError, Diagnostic, SourceUnit};

/// Deepest document nesting the pipeline accepts.
pub(crate) const MAX_DEPTH: usize = 64;

/// Rejects trees nested deeper than [`MAX_DEPTH`] before any recursive walk
/// sees them. A rejected tree is taken apart iteratively so dropping it
/// does not recurse either.
pub(crate) fn check_depth(tree: &mut Node, unit: &mut SourceUnit) -> Result<(), CompileError> {
    let too_deep = {
        let mut stack = vec![(&*tree, 1usize)];
        let mut found = None;
        while let Some((node, depth)) = stack.pop() {
            if depth > MAX_DEPTH {
                found = Some(node.position().map(convert_position));
                break;
            }
            for child in node.children().into_iter().flatten() {
                stack.push((child, depth + 1));
            }
        }
        found
    };
    let Some(position) = too_deep else {
        return Ok(());
    };

    dismantle(tree);
    let mut diagnostic = Diagnostic::fatal(format!(
        "Document nests too deeply (more than {} levels)",
        MAX_DEPTH
    ))
    .with_rule("mdxpad", "nesting-depth");
    if let Some(position) = position {
        diagnostic = diagnostic.with_place(Place::Location(position));
    }
    Err(unit.fail(diagnostic))
}

fn dismantle(tree: &mut Node) {
    let mut pending = match tree.children_mut() {
        Some(children) => std::mem::take(children),
        None => return,
    };
    while let Some(mut node) = pending.pop() {
        if let Some(children) = node.children_mut() {
            pending.append(children);
        }
    }
}

/// Lowers a parsed document.
pub(crate) fn lower(tree: &Node, unit: &mut SourceUnit) -> Result<Program, CompileError> {
    let mut lowering = Lowering::new(unit);
    lowering.collect(tree);

    let mut children = Vec::new();
    match tree {
        Node::Root(root) => lowering.nodes(&root.children, &mut children)?,
        other => lowering.node(other, &mut children)?,
    }
    lowering.footnote_section(&mut children)?;

    Ok(Program { children })
}

struct Lowering<'u, 't> {
    unit: &'u mut SourceUnit,
    definitions: HashMap<&'t str, (&'t str, Option<&'t str>)>,
    footnote_definitions: HashMap<&'t str, &'t FootnoteDefinition>,
    /// Footnote identifiers in the order they were first referenced.
    footnote_order: Vec<&'t str>,
    depth: usize,
}

impl<'u, 't> Lowering<'u, 't> {
    fn new(unit: &'u mut SourceUnit) -> Self {
        Self {
            unit,
            definitions: HashMap::new(),
            footnote_definitions: HashMap::new(),
            footnote_order: Vec::new(),
            depth: 0,
        }
    }

    fn collect(&mut self, tree: &'t Node) {
        let mut stack = vec![tree];
        while let Some(node) = stack.pop() {
            match node {
                Node::Definition(def) => {
                    self.definitions
                        .entry(def.identifier.as_str())
                        .or_insert((def.url.as_str(), def.title.as_deref()));
                }
                Node::FootnoteDefinition(def) => {
                    self.footnote_definitions
                        .entry(def.identifier.as_str())
                        .or_insert(def);
                }
                _ => {}
            }
            // Reversed so the first definition of an identifier wins.
            stack.extend(node.children().into_iter().flatten().rev());
        }
    }

    fn nodes(&mut self, nodes: &'t [Node], out: &mut Vec<ProgramNode>) -> Result<(), CompileError> {
        for node in nodes {
            self.node(node, out)?;
        }
        Ok(())
    }

    fn wrap(
        &mut self,
        tag: &str,
        attributes: Vec<Attribute>,
        children: &'t [Node],
        out: &mut Vec<ProgramNode>,
    ) -> Result<(), CompileError> {
        let mut lowered = Vec::new();
        self.nodes(children, &mut lowered)?;
        out.push(ProgramNode::element(tag, attributes, lowered));
        Ok(())
    }

    fn node(&mut self, node: &'t Node, out: &mut Vec<ProgramNode>) -> Result<(), CompileError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.unit.fail(
                with_position(
                    Diagnostic::fatal(format!(
                        "Document nests too deeply (more than {} levels)",
                        MAX_DEPTH
                    )),
                    node,
                )
                .with_rule("mdxpad", "nesting-depth"),
            ));
        }
        self.depth += 1;
        let result = self.lower_node(node, out);
        self.depth -= 1;
        result
    }

    fn lower_node(&mut self, node: &'t Node, out: &mut Vec<ProgramNode>) -> Result<(), CompileError> {
        match node {
            Node::Root(root) => self.nodes(&root.children, out)?,
            Node::Paragraph(p) => self.wrap("p", vec![], &p.children, out)?,
            Node::Heading(h) => self.wrap(&format!("h{}", h.depth), vec![], &h.children, out)?,
            Node::Blockquote(b) => self.wrap("blockquote", vec![], &b.children, out)?,
            Node::Emphasis(e) => self.wrap("em", vec![], &e.children, out)?,
            Node::Strong(s) => self.wrap("strong", vec![], &s.children, out)?,
            Node::Delete(d) => self.wrap("del", vec![], &d.children, out)?,
            Node::ThematicBreak(_) => out.push(ProgramNode::element("hr", vec![], vec![])),
            Node::Break(_) => out.push(ProgramNode::element("br", vec![], vec![])),
            Node::Text(text) => out.push(ProgramNode::text(text.value.clone())),
            Node::InlineCode(code) => out.push(ProgramNode::element(
                "code",
                vec![],
                vec![ProgramNode::text(code.value.clone())],
            )),
            Node::Code(code) => {
                let mut attributes = Vec::new();
                if let Some(lang) = code.lang.as_deref().and_then(|l| l.split_whitespace().next()) {
                    attributes.push(Attribute::string("className", format!("language-{}", lang)));
                }
                let value = if code.value.is_empty() {
                    String::new()
                } else {
                    format!("{}\n", code.value)
                };
                let inner = ProgramNode::element("code", attributes, vec![ProgramNode::text(value)]);
                out.push(ProgramNode::element("pre", vec![], vec![inner]));
            }
            Node::Link(link) => {
                let attributes = link_attributes(&link.url, link.title.as_deref());
                self.wrap("a", attributes, &link.children, out)?;
            }
            Node::LinkReference(reference) => {
                match self.definitions.get(reference.identifier.as_str()).copied() {
                    Some((url, title)) => {
                        self.wrap("a", link_attributes(url, title), &reference.children, out)?
                    }
                    None => self.nodes(&reference.children, out)?,
                }
            }
            Node::Image(image) => {
                out.push(image_element(&image.url, &image.alt, image.title.as_deref()))
            }
            Node::ImageReference(reference) => {
                match self.definitions.get(reference.identifier.as_str()).copied() {
                    Some((url, title)) => out.push(image_element(url, &reference.alt, title)),
                    None => out.push(ProgramNode::text(reference.alt.clone())),
                }
            }
            Node::List(list) => self.list(list, out)?,
            Node::ListItem(item) => self.list_item(item, false, out)?,
            Node::Table(table) => self.table(table, out)?,
            Node::TableRow(_) | Node::TableCell(_) => {
                // Only reachable through `table`.
                debug!("Skipping detached table node");
            }
            Node::Math(math) => out.push(ProgramNode::element(
                "div",
                vec![Attribute::string("className", "math math-display")],
                vec![ProgramNode::text(math.value.clone())],
            )),
            Node::InlineMath(math) => out.push(ProgramNode::element(
                "span",
                vec![Attribute::string("className", "math math-inline")],
                vec![ProgramNode::text(math.value.clone())],
            )),
            Node::FootnoteReference(reference) => self.footnote_reference(
                reference.identifier.as_str(),
                reference.label.as_deref(),
                out,
            ),
            Node::MdxJsxFlowElement(element) => {
                self.jsx(element.name.as_deref(), &element.attributes, &element.children, node, out)?
            }
            Node::MdxJsxTextElement(element) => {
                self.jsx(element.name.as_deref(), &element.attributes, &element.children, node, out)?
            }
            Node::MdxFlowExpression(expression) => self.expression(&expression.value, node, out)?,
            Node::MdxTextExpression(expression) => self.expression(&expression.value, node, out)?,
            Node::MdxjsEsm(_) => {
                return Err(self.unit.fail(
                    with_position(
                        Diagnostic::warning("Cannot handle `import` or `export` in a live document"),
                        node,
                    )
                    .with_rule("mdxpad", "esm"),
                ));
            }
            // Raw HTML is never executed; definitions and frontmatter render nothing.
            Node::Html(_)
            | Node::Definition(_)
            | Node::FootnoteDefinition(_)
            | Node::Yaml(_)
            | Node::Toml(_) => {}
        }
        Ok(())
    }

    fn list(&mut self, list: &'t List, out: &mut Vec<ProgramNode>) -> Result<(), CompileError> {
        let tight = !list.spread
            && list
                .children
                .iter()
                .all(|child| !matches!(child, Node::ListItem(item) if item.spread));

        let mut attributes = Vec::new();
        if list.ordered {
            if let Some(start) = list.start.filter(|start| *start != 1) {
                attributes.push(Attribute::Static {
                    name: "start".to_string(),
                    value: Value::Number(f64::from(start)),
                });
            }
        }
        if list
            .children
            .iter()
            .any(|child| matches!(child, Node::ListItem(item) if item.checked.is_some()))
        {
            attributes.push(Attribute::string("className", "contains-task-list"));
        }

        let mut items = Vec::new();
        for child in &list.children {
            match child {
                Node::ListItem(item) => self.list_item(item, tight, &mut items)?,
                other => self.node(other, &mut items)?,
            }
        }

        let tag = if list.ordered { "ol" } else { "ul" };
        out.push(ProgramNode::element(tag, attributes, items));
        Ok(())
    }

    fn list_item(
        &mut self,
        item: &'t ListItem,
        tight: bool,
        out: &mut Vec<ProgramNode>,
    ) -> Result<(), CompileError> {
        let mut content = Vec::new();
        for child in &item.children {
            match child {
                Node::Paragraph(p) if tight => self.nodes(&p.children, &mut content)?,
                other => self.node(other, &mut content)?,
            }
        }

        let mut attributes = Vec::new();
        if let Some(checked) = item.checked {
            attributes.push(Attribute::string("className", "task-list-item"));

            let mut input = vec![
                Attribute::string("type", "checkbox"),
                Attribute::flag("disabled"),
            ];
            if checked {
                input.push(Attribute::flag("checked"));
            }
            let prefix = [
                ProgramNode::element("input", input, vec![]),
                ProgramNode::text(" "),
            ];

            match content.first_mut() {
                Some(ProgramNode::Element { tag, children, .. }) if tag == "p" => {
                    children.splice(0..0, prefix);
                }
                _ => {
                    content.splice(0..0, prefix);
                }
            }
        }

        out.push(ProgramNode::element("li", attributes, content));
        Ok(())
    }

    fn table(&mut self, table: &'t Table, out: &mut Vec<ProgramNode>) -> Result<(), CompileError> {
        let mut head = Vec::new();
        let mut body = Vec::new();

        for (index, row) in table.children.iter().enumerate() {
            let Node::TableRow(row) = row else {
                continue;
            };
            let cell_tag = if index == 0 { "th" } else { "td" };

            let mut cells = Vec::new();
            for (column, cell) in row.children.iter().enumerate() {
                let Node::TableCell(cell) = cell else {
                    continue;
                };
                let mut attributes = Vec::new();
                let align = match table.align.get(column) {
                    Some(AlignKind::Left) => Some("left"),
                    Some(AlignKind::Right) => Some("right"),
                    Some(AlignKind::Center) => Some("center"),
                    Some(AlignKind::None) | None => None,
                };
                if let Some(align) = align {
                    attributes.push(Attribute::string("align", align));
                }
                self.wrap(cell_tag, attributes, &cell.children, &mut cells)?;
            }

            let row = ProgramNode::element("tr", vec![], cells);
            if index == 0 {
                head.push(row);
            } else {
                body.push(row);
            }
        }

        let mut sections = vec![ProgramNode::element("thead", vec![], head)];
        if !body.is_empty() {
            sections.push(ProgramNode::element("tbody", vec![], body));
        }
        out.push(ProgramNode::element("table", vec![], sections));
        Ok(())
    }

    fn footnote_reference(&mut self, identifier: &'t str, label: Option<&str>, out: &mut Vec<ProgramNode>) {
        if !self.footnote_definitions.contains_key(identifier) {
            out.push(ProgramNode::text(format!("[^{}]", label.unwrap_or(identifier))));
            return;
        }

        let number = match self.footnote_order.iter().position(|id| *id == identifier) {
            Some(index) => index + 1,
            None => {
                self.footnote_order.push(identifier);
                self.footnote_order.len()
            }
        };

        let id = footnote_id(identifier);
        let link = ProgramNode::element(
            "a",
            vec![
                Attribute::string("href", format!("#user-content-fn-{}", id)),
                Attribute::string("id", format!("user-content-fnref-{}", id)),
                Attribute::flag("data-footnote-ref"),
                Attribute::string("aria-describedby", "footnote-label"),
            ],
            vec![ProgramNode::text(number.to_string())],
        );
        out.push(ProgramNode::element("sup", vec![], vec![link]));
    }

    fn footnote_section(&mut self, out: &mut Vec<ProgramNode>) -> Result<(), CompileError> {
        if self.footnote_order.is_empty() {
            return Ok(());
        }

        let mut items = Vec::new();
        // Definitions may reference further footnotes, growing the order.
        let mut index = 0;
        while index < self.footnote_order.len() {
            let identifier = self.footnote_order[index];
            index += 1;
            let Some(definition) = self.footnote_definitions.get(identifier).copied() else {
                continue;
            };

            let mut content = Vec::new();
            self.nodes(&definition.children, &mut content)?;

            let id = footnote_id(identifier);
            let backref = ProgramNode::element(
                "a",
                vec![
                    Attribute::string("href", format!("#user-content-fnref-{}", id)),
                    Attribute::flag("data-footnote-backref"),
                    Attribute::string("aria-label", format!("Back to reference {}", index)),
                    Attribute::string("className", "data-footnote-backref"),
                ],
                vec![ProgramNode::text("↩")],
            );
            match content.last_mut() {
                Some(ProgramNode::Element { tag, children, .. }) if tag == "p" => {
                    children.push(ProgramNode::text(" "));
                    children.push(backref);
                }
                _ => content.push(backref),
            }

            items.push(ProgramNode::element(
                "li",
                vec![Attribute::string("id", format!("user-content-fn-{}", id))],
                content,
            ));
        }

        out.push(ProgramNode::element(
            "section",
            vec![
                Attribute::flag("data-footnotes"),
                Attribute::string("className", "footnotes"),
            ],
            vec![
                ProgramNode::element(
                    "h2",
                    vec![
                        Attribute::string("className", "sr-only"),
                        Attribute::string("id", "footnote-label"),
                    ],
                    vec![ProgramNode::text("Footnotes")],
                ),
                ProgramNode::element("ol", vec![], items),
            ],
        ));
        Ok(())
    }

    fn jsx(
        &mut self,
        name: Option<&str>,
        attributes: &'t [AttributeContent],
        children: &'t [Node],
        node: &'t Node,
        out: &mut Vec<ProgramNode>,
    ) -> Result<(), CompileError> {
        let mut lowered = Vec::new();
        self.nodes(children, &mut lowered)?;

        let Some(name) = name else {
            out.push(ProgramNode::Fragment(lowered));
            return Ok(());
        };

        let mut lowered_attributes = Vec::with_capacity(attributes.len());
        for attribute in attributes {
            lowered_attributes.push(self.attribute(attribute, node)?);
        }

        if is_component_name(name) {
            out.push(ProgramNode::Component {
                name: name.to_string(),
                attributes: lowered_attributes,
                children: lowered,
                place: node.position().map(|p| Place::Location(convert_position(p))),
            });
        } else {
            out.push(ProgramNode::Element {
                tag: name.to_string(),
                attributes: lowered_attributes,
                children: lowered,
                overridable: false,
            });
        }
        Ok(())
    }

    fn attribute(&mut self, attribute: &'t AttributeContent, node: &Node) -> Result<Attribute, CompileError> {
        match attribute {
            AttributeContent::Property(property) => {
                let name = property.name.clone();
                match &property.value {
                    None => Ok(Attribute::Static {
                        name,
                        value: Value::Bool(true),
                    }),
                    Some(AttributeValue::Literal(value)) => Ok(Attribute::Static {
                        name,
                        value: Value::String(value.clone()),
                    }),
                    Some(AttributeValue::Expression(expression)) => {
                        match parse_expression(&expression.value) {
                            Ok(Some(expr)) => Ok(Attribute::Dynamic { name, expr }),
                            Ok(None) => Err(self.unit.fail(
                                with_position(
                                    Diagnostic::warning(format!(
                                        "Unexpected empty expression in attribute `{}`, expected a value",
                                        name
                                    )),
                                    node,
                                )
                                .with_rule("mdxpad", "expression-syntax"),
                            )),
                            Err(err) => Err(self.expression_error(err, node, None)),
                        }
                    }
                }
            }
            AttributeContent::Expression(expression) => match parse_spread(&expression.value) {
                Ok(expr) => Ok(Attribute::Spread(expr)),
                Err(err) => Err(self.expression_error(err, node, None)),
            },
        }
    }

    fn expression(&mut self, source: &str, node: &Node, out: &mut Vec<ProgramNode>) -> Result<(), CompileError> {
        match parse_expression(source) {
            Ok(Some(expr)) => {
                out.push(ProgramNode::Expression {
                    expr,
                    place: node.position().map(|p| Place::Location(convert_position(p))),
                });
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => Err(self.expression_error(err, node, Some(source))),
        }
    }

    /// Records an expression parse error. When the expression source is
    /// known, the error points inside the braces.
    fn expression_error(&mut self, err: ParseError, node: &Node, source: Option<&str>) -> CompileError {
        let (reason, rule) = match &err {
            ParseError::Unsupported(feature) => (
                format!("Unsupported in expressions: {}", feature),
                "unsupported-expression",
            ),
            other => (format!("Could not parse expression: {}", other), "expression-syntax"),
        };
        let mut diagnostic = Diagnostic::warning(reason).with_rule("mdxpad", rule);

        if let Some(position) = node.position() {
            let start = convert_point(&position.start);
            diagnostic = match (source, err.offset()) {
                (Some(source), Some(offset)) => diagnostic.with_place(point_in_braces(start, source, offset)),
                _ => diagnostic.with_place(Place::Location(convert_position(position))),
            };
        }

        self.unit.fail(diagnostic)
    }
}

fn with_position(diagnostic: Diagnostic, node: &Node) -> Diagnostic {
    match node.position() {
        Some(position) => diagnostic.with_place(Place::Location(convert_position(position))),
        None => diagnostic,
    }
}

/// The point `offset` bytes into the text of an expression whose opening
/// brace is at `start`.
fn point_in_braces(start: Point, source: &str, offset: usize) -> Point {
    let mut point = Point::new(start.line, start.column + 1, start.offset + 1);
    let before = source.get(..offset).unwrap_or(source);
    for ch in before.chars() {
        if ch == '\n' {
            point.line += 1;
            point.column = 1;
        } else {
            point.column += 1;
        }
        point.offset += ch.len_utf8() as u32;
    }
    point
}

fn is_component_name(name: &str) -> bool {
    name.contains('.') || name.chars().next().is_some_and(|c| c.is_uppercase())
}

fn footnote_id(identifier: &str) -> String {
    identifier
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect()
}

fn link_attributes(url: &str, title: Option<&str>) -> Vec<Attribute> {
    let mut attributes = vec![Attribute::string("href", url)];
    if let Some(title) = title {
        attributes.push(Attribute::string("title", title));
    }
    attributes
}

fn image_element(url: &str, alt: &str, title: Option<&str>) -> ProgramNode {
    let mut attributes = vec![Attribute::string("src", url), Attribute::string("alt", alt)];
    if let Some(title) = title {
        attributes.push(Attribute::string("title", title));
    }
    ProgramNode::element("img", attributes, vec![])
}

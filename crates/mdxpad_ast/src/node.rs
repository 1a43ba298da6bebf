//! The rendered element tree.
//!
//! A `RenderNode` is what executing a compiled document produces. It is a
//! hast-like tree of elements and text, independent of any display
//! technology: it serializes to JSON through serde and to HTML through
//! [`RenderNode::to_html`].

use serde::Serialize;

use crate::value::{Object, Value, format_number};

/// A node in the rendered tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RenderNode {
    /// The document root.
    Root { children: Vec<RenderNode> },
    /// An element with properties and children.
    Element(Element),
    /// A run of text.
    Text { value: String },
}

/// An element node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub tag_name: String,
    pub properties: Object,
    pub children: Vec<RenderNode>,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const UNITLESS_STYLES: &[&str] = &[
    "flex",
    "flexGrow",
    "flexShrink",
    "fontWeight",
    "lineHeight",
    "opacity",
    "order",
    "orphans",
    "widows",
    "zIndex",
    "zoom",
];

impl RenderNode {
    /// Creates a root node.
    pub fn root(children: Vec<RenderNode>) -> Self {
        RenderNode::Root { children }
    }

    /// Creates an element node.
    pub fn element(
        tag_name: impl Into<String>,
        properties: Object,
        children: Vec<RenderNode>,
    ) -> Self {
        RenderNode::Element(Element {
            tag_name: tag_name.into(),
            properties,
            children,
        })
    }

    /// Creates a text node.
    pub fn text(value: impl Into<String>) -> Self {
        RenderNode::Text {
            value: value.into(),
        }
    }

    /// Child nodes (empty for text).
    pub fn children(&self) -> &[RenderNode] {
        match self {
            RenderNode::Root { children } => children,
            RenderNode::Element(element) => &element.children,
            RenderNode::Text { .. } => &[],
        }
    }

    /// Concatenated text of this node and all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            RenderNode::Text { value } => out.push_str(value),
            _ => {
                for child in self.children() {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Finds the first element with the given tag name, depth-first.
    pub fn find_element(&self, tag_name: &str) -> Option<&Element> {
        if let RenderNode::Element(element) = self
            && element.tag_name == tag_name
        {
            return Some(element);
        }
        self.children()
            .iter()
            .find_map(|child| child.find_element(tag_name))
    }

    /// Serializes the tree to an HTML string.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            RenderNode::Root { children } => {
                for child in children {
                    child.write_html(out);
                }
            }
            RenderNode::Text { value } => escape_into(value, false, out),
            RenderNode::Element(element) => element.write_html(out),
        }
    }
}

impl Element {
    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag_name);
        for (name, value) in self.properties.iter() {
            write_attribute(name, value, out);
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&self.tag_name.as_str()) {
            return;
        }

        for child in &self.children {
            child.write_html(out);
        }
        out.push_str("</");
        out.push_str(&self.tag_name);
        out.push('>');
    }
}

fn write_attribute(name: &str, value: &Value, out: &mut String) {
    let name = match name {
        "className" => "class",
        "htmlFor" => "for",
        other => other,
    };

    let rendered = match value {
        Value::Undefined | Value::Null | Value::Bool(false) => return,
        Value::Bool(true) => {
            out.push(' ');
            out.push_str(name);
            return;
        }
        Value::Object(style) if name == "style" => style_to_css(style),
        Value::Array(items) if name == "class" => items
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    };

    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    escape_into(&rendered, true, out);
    out.push('"');
}

/// Converts a style object (`{backgroundColor: 'red'}`) to a CSS declaration list.
pub fn style_to_css(style: &Object) -> String {
    style
        .iter()
        .filter(|(_, value)| !value.is_nullish() && !matches!(value, Value::Bool(_)))
        .map(|(key, value)| {
            let value = match value {
                Value::Number(n)
                    if *n != 0.0 && !key.starts_with("--") && !UNITLESS_STYLES.contains(&key) =>
                {
                    format!("{}px", format_number(*n))
                }
                other => other.to_string(),
            };
            format!("{}: {}", css_property_name(key), value)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn css_property_name(key: &str) -> String {
    if key.starts_with("--") {
        return key.to_string();
    }

    let mut name = String::with_capacity(key.len() + 4);
    if key.starts_with("ms") && key.chars().nth(2).is_some_and(|c| c.is_ascii_uppercase()) {
        name.push('-');
    }
    for (i, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 || key.len() > 1 {
                name.push('-');
            }
            name.push(ch.to_ascii_lowercase());
        } else {
            name.push(ch);
        }
    }
    name
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn props(entries: &[(&str, Value)]) -> Object {
        entries.iter().cloned().collect()
    }

    #[test]
    fn test_to_html_nested() {
        let tree = RenderNode::root(vec![
            RenderNode::element("h1", Object::new(), vec![RenderNode::text("Title")]),
            RenderNode::element(
                "p",
                Object::new(),
                vec![RenderNode::text("a < b & c"), RenderNode::element("br", Object::new(), vec![])],
            ),
        ]);

        assert_eq!(tree.to_html(), "<h1>Title</h1><p>a &lt; b &amp; c<br></p>");
    }

    #[test]
    fn test_style_object_becomes_css() {
        let style = props(&[
            ("padding", Value::from("1rem")),
            ("backgroundColor", Value::from("violet")),
            ("marginTop", Value::Number(8.0)),
            ("zIndex", Value::Number(2.0)),
        ]);
        let div = RenderNode::element("div", props(&[("style", Value::Object(style))]), vec![]);

        assert_eq!(
            div.to_html(),
            r#"<div style="padding: 1rem; background-color: violet; margin-top: 8px; z-index: 2"></div>"#
        );
    }

    #[rstest]
    #[case("WebkitTransition", "-webkit-transition")]
    #[case("msTransition", "-ms-transition")]
    #[case("--brand-color", "--brand-color")]
    #[case("color", "color")]
    fn test_css_property_name(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(css_property_name(key), expected);
    }

    #[test]
    fn test_boolean_and_nullish_attributes() {
        let input = RenderNode::element(
            "input",
            props(&[
                ("type", Value::from("checkbox")),
                ("checked", Value::Bool(true)),
                ("disabled", Value::Bool(false)),
                ("title", Value::Undefined),
                ("className", Value::from("task")),
            ]),
            vec![],
        );

        assert_eq!(input.to_html(), r#"<input type="checkbox" checked class="task">"#);
    }

    #[test]
    fn test_find_element_and_text_content() {
        let tree = RenderNode::root(vec![RenderNode::element(
            "div",
            Object::new(),
            vec![RenderNode::element(
                "em",
                Object::new(),
                vec![RenderNode::text("hi")],
            )],
        )]);

        assert_eq!(tree.find_element("em").map(|e| e.children.len()), Some(1));
        assert!(tree.find_element("strong").is_none());
        assert_eq!(tree.text_content(), "hi");
    }

    #[test]
    fn test_json_shape() {
        let tree = RenderNode::element(
            "p",
            props(&[("id", Value::from("x"))]),
            vec![RenderNode::text("t")],
        );
        insta::assert_json_snapshot!(tree, @r#"
        {
          "type": "element",
          "tagName": "p",
          "properties": {
            "id": "x"
          },
          "children": [
            {
              "type": "text",
              "value": "t"
            }
          ]
        }
        "#);
    }
}

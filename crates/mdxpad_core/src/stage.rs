//! Extension stages.
//!
//! Each optional syntax extension is a [`Stage`] tagged with the
//! [`Capability`] it provides. The stage list is resolved once per
//! compilation attempt from the [`Configuration`]; every stage first turns
//! on the markdown-rs constructs it needs and later gets a chance to
//! rewrite the parsed tree before lowering.

use std::collections::HashMap;

use mdxpad_ast::Place;
use mdxpad_parser::mdast::{AttributeContent, Node};
use mdxpad_parser::{Constructs, convert_position};
use tracing::debug;

use crate::{CompileError, Configuration, Diagnostic, Format, SourceUnit};

/// What a stage adds to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// JSX and `{expressions}` (MDX documents only).
    Jsx,
    Frontmatter,
    Gfm,
    Math,
}

/// One step of the extension pipeline.
pub trait Stage: Send + Sync {
    /// Returns the capability this stage provides.
    fn capability(&self) -> Capability;

    /// Enables the parser constructs this stage needs.
    fn configure(&self, _constructs: &mut Constructs) {}

    /// Rewrites the parsed tree.
    ///
    /// Problems are reported through `unit`; returning an error aborts the
    /// attempt.
    fn transform(&self, _tree: &mut Node, _unit: &mut SourceUnit) -> Result<(), CompileError> {
        Ok(())
    }
}

/// Builds the ordered stage list for a configuration.
pub fn resolve_stages(config: &Configuration) -> Vec<Box<dyn Stage>> {
    let mut stages: Vec<Box<dyn Stage>> = Vec::new();

    if config.resolved_format() == Format::Mdx {
        stages.push(Box::new(JsxStage));
    }
    if config.extensions.frontmatter {
        stages.push(Box::new(FrontmatterStage));
    }
    if config.extensions.gfm {
        stages.push(Box::new(GfmStage));
    }
    if config.extensions.math {
        stages.push(Box::new(MathStage));
    }

    debug!(
        "Resolved stages: {:?}",
        stages.iter().map(|s| s.capability()).collect::<Vec<_>>()
    );
    stages
}

/// Checks JSX attributes.
pub struct JsxStage;

impl Stage for JsxStage {
    fn capability(&self) -> Capability {
        Capability::Jsx
    }

    fn transform(&self, tree: &mut Node, unit: &mut SourceUnit) -> Result<(), CompileError> {
        check_duplicate_attributes(tree, unit);
        Ok(())
    }
}

fn check_duplicate_attributes(node: &Node, unit: &mut SourceUnit) {
    let (name, attributes, position) = match node {
        Node::MdxJsxFlowElement(e) => (&e.name, &e.attributes, &e.position),
        Node::MdxJsxTextElement(e) => (&e.name, &e.attributes, &e.position),
        _ => {
            for child in node.children().into_iter().flatten() {
                check_duplicate_attributes(child, unit);
            }
            return;
        }
    };

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for attribute in attributes {
        if let AttributeContent::Property(property) = attribute {
            let count = seen.entry(property.name.as_str()).or_insert(0);
            *count += 1;
            if *count == 2 {
                let mut diagnostic = Diagnostic::warning(format!(
                    "Duplicate attribute `{}` on `<{}>`; the last value wins",
                    property.name,
                    name.as_deref().unwrap_or_default()
                ))
                .with_rule("mdxpad", "duplicate-attribute");
                if let Some(position) = position {
                    diagnostic = diagnostic.with_place(Place::Location(convert_position(position)));
                }
                unit.warn(diagnostic);
            }
        }
    }

    for child in node.children().into_iter().flatten() {
        check_duplicate_attributes(child, unit);
    }
}

/// Recognises frontmatter and removes it from the document body.
pub struct FrontmatterStage;

impl Stage for FrontmatterStage {
    fn capability(&self) -> Capability {
        Capability::Frontmatter
    }

    fn configure(&self, constructs: &mut Constructs) {
        constructs.frontmatter = true;
    }

    fn transform(&self, tree: &mut Node, _unit: &mut SourceUnit) -> Result<(), CompileError> {
        if let Some(children) = tree.children_mut() {
            let before = children.len();
            children.retain(|child| !matches!(child, Node::Yaml(_) | Node::Toml(_)));
            if children.len() != before {
                debug!("Stripped frontmatter");
            }
        }
        Ok(())
    }
}

/// GitHub Flavored Markdown.
///
/// Footnote definitions are moved to the end of the document in the order
/// they are first referenced; definitions nothing references are dropped.
pub struct GfmStage;

impl Stage for GfmStage {
    fn capability(&self) -> Capability {
        Capability::Gfm
    }

    fn configure(&self, constructs: &mut Constructs) {
        constructs.gfm_autolink_literal = true;
        constructs.gfm_footnote_definition = true;
        constructs.gfm_label_start_footnote = true;
        constructs.gfm_strikethrough = true;
        constructs.gfm_table = true;
        constructs.gfm_task_list_item = true;
    }

    fn transform(&self, tree: &mut Node, _unit: &mut SourceUnit) -> Result<(), CompileError> {
        let mut definitions = Vec::new();
        take_footnote_definitions(tree, &mut definitions);
        if definitions.is_empty() {
            return Ok(());
        }

        let mut order = Vec::new();
        collect_footnote_references(tree, &mut order);
        for definition in &definitions {
            collect_footnote_references(definition, &mut order);
        }

        let mut relocated = Vec::with_capacity(order.len());
        for identifier in &order {
            if let Some(index) = definitions.iter().position(|d| {
                matches!(d, Node::FootnoteDefinition(def) if &def.identifier == identifier)
            }) {
                relocated.push(definitions.swap_remove(index));
            }
        }

        if !definitions.is_empty() {
            debug!("Dropping {} unreferenced footnote definition(s)", definitions.len());
        }
        if let Some(children) = tree.children_mut() {
            children.extend(relocated);
        }
        Ok(())
    }
}

fn take_footnote_definitions(node: &mut Node, out: &mut Vec<Node>) {
    let Some(children) = node.children_mut() else {
        return;
    };

    let mut index = 0;
    while index < children.len() {
        if matches!(children[index], Node::FootnoteDefinition(_)) {
            out.push(children.remove(index));
        } else {
            take_footnote_definitions(&mut children[index], out);
            index += 1;
        }
    }
}

fn collect_footnote_references(node: &Node, order: &mut Vec<String>) {
    if let Node::FootnoteReference(reference) = node {
        if !order.contains(&reference.identifier) {
            order.push(reference.identifier.clone());
        }
    }
    for child in node.children().into_iter().flatten() {
        collect_footnote_references(child, order);
    }
}

/// `$inline$` and `$$display$$` math.
pub struct MathStage;

impl Stage for MathStage {
    fn capability(&self) -> Capability {
        Capability::Math
    }

    fn configure(&self, constructs: &mut Constructs) {
        constructs.math_flow = true;
        constructs.math_text = true;
    }
}

//! Fault-isolated rendering.
//!
//! Running compiled output can still go wrong: an identifier that does not
//! exist, a property read on `undefined`, a host component that errors or
//! panics. The renderer contains all of these and shows a fallback until
//! the author asks to try again.

use std::panic::{AssertUnwindSafe, catch_unwind};

use mdxpad_ast::RenderNode;
use serde::Serialize;
use tracing::{debug, warn};

use crate::compiler::panic_message;
use crate::{CompiledOutput, Diagnostic, RenderError, SourceUnit};

/// What the user currently sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum VisibleOutput {
    /// Nothing compiled yet.
    Nothing,
    /// The rendered document.
    Document { tree: RenderNode },
    /// The latest compile failed; these are its fatal diagnostics.
    CompileError { diagnostics: Vec<Diagnostic> },
    /// Rendering failed. The fallback stays until [`FaultIsolatedRenderer::reset`].
    Fault { diagnostic: Diagnostic },
}

impl VisibleOutput {
    pub fn is_fault(&self) -> bool {
        matches!(self, VisibleOutput::Fault { .. })
    }
}

#[derive(Debug, Default)]
enum Pane {
    #[default]
    Empty,
    Displayed(RenderNode),
    Fault(Diagnostic),
}

/// Renders source units, one result pane per unit.
///
/// A new unit (identified by the caller's sequence number) always starts
/// with an empty pane. Within one unit a successful render is kept, and a
/// fault is kept until [`reset`](Self::reset) empties the pane so the next
/// call renders the same output again. Reset never recompiles.
#[derive(Debug, Default)]
pub struct FaultIsolatedRenderer {
    unit_id: Option<u64>,
    pane: Pane,
}

impl FaultIsolatedRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produces the visible output for `unit`.
    pub fn render(&mut self, unit_id: u64, unit: &SourceUnit) -> VisibleOutput {
        if self.unit_id != Some(unit_id) {
            debug!("New source unit {}, clearing result pane", unit_id);
            self.unit_id = Some(unit_id);
            self.pane = Pane::Empty;
        }

        let Some(output) = &unit.compiled_output else {
            let diagnostics: Vec<Diagnostic> = unit.fatal_diagnostics().cloned().collect();
            if diagnostics.is_empty() {
                return VisibleOutput::Nothing;
            }
            return VisibleOutput::CompileError { diagnostics };
        };

        if let Pane::Empty = self.pane {
            self.pane = match guarded_render(output, &unit.path) {
                Ok(tree) => Pane::Displayed(tree),
                Err(diagnostic) => {
                    warn!("Render failed: {}", diagnostic);
                    Pane::Fault(diagnostic)
                }
            };
        }

        match &self.pane {
            Pane::Displayed(tree) => VisibleOutput::Document { tree: tree.clone() },
            Pane::Fault(diagnostic) => VisibleOutput::Fault {
                diagnostic: diagnostic.clone(),
            },
            Pane::Empty => VisibleOutput::Nothing,
        }
    }

    /// Clears a fault so the next render retries. Does nothing otherwise.
    pub fn reset(&mut self) -> bool {
        if let Pane::Fault(_) = self.pane {
            debug!("Resetting render fault");
            self.pane = Pane::Empty;
            return true;
        }
        false
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self.pane, Pane::Fault(_))
    }
}

/// Renders once, converting errors and panics into a fatal diagnostic.
pub fn guarded_render(output: &CompiledOutput, file: &str) -> Result<RenderNode, Diagnostic> {
    let result = catch_unwind(AssertUnwindSafe(|| output.render()))
        .unwrap_or_else(|payload| Err(RenderError::Panic(panic_message(payload.as_ref()))));

    result.map_err(|err| {
        Diagnostic::fatal(err.to_string())
            .with_file(file)
            .with_rule("mdxpad", "render")
    })
}

/// Renders a single unit with a fresh pane.
pub fn render_once(unit: &SourceUnit) -> VisibleOutput {
    FaultIsolatedRenderer::new().render(0, unit)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{Compiler, Configuration, RenderContext};
    use mdxpad_ast::Object;
    use pretty_assertions::assert_eq;

    fn compile_with(context: RenderContext, text: &str) -> SourceUnit {
        Compiler::with_context(context).compile_sync(&Configuration::new(text))
    }

    #[test]
    fn test_document() {
        let unit = compile_with(RenderContext::new(), "# Title");
        match render_once(&unit) {
            VisibleOutput::Document { tree } => assert_eq!(tree.to_html(), "<h1>Title</h1>"),
            other => panic!("Expected document, got {:?}", other),
        }
    }

    #[test]
    fn test_compile_error() {
        let unit = compile_with(RenderContext::new(), "<div>");
        match render_once(&unit) {
            VisibleOutput::CompileError { diagnostics } => assert_eq!(diagnostics.len(), 1),
            other => panic!("Expected compile error, got {:?}", other),
        }
    }

    #[test]
    fn test_reference_error_is_a_fault() {
        let unit = compile_with(RenderContext::new(), "Hello {name}");
        let output = render_once(&unit);

        let VisibleOutput::Fault { diagnostic } = output else {
            panic!("Expected fault, got {:?}", output);
        };
        assert!(diagnostic.fatal);
        assert_eq!(diagnostic.reason, "ReferenceError: name is not defined");
    }

    #[test]
    fn test_nested_read_through_empty_props_is_a_fault() {
        let unit = compile_with(RenderContext::new(), "Hi {props.user.name}");
        assert!(unit.is_success());

        let VisibleOutput::Fault { diagnostic } = render_once(&unit) else {
            panic!("Expected fault");
        };
        assert!(diagnostic.fatal);
        assert!(
            diagnostic
                .reason
                .starts_with("TypeError: Cannot read properties of undefined"),
            "unexpected reason: {}",
            diagnostic.reason
        );
        assert_eq!(
            diagnostic.reason,
            "TypeError: Cannot read properties of undefined (reading 'name')"
        );
    }

    #[test]
    fn test_deeply_nested_document_is_a_compile_error() {
        let unit = compile_with(RenderContext::new(), &format!("{}x", "> ".repeat(500)));
        assert!(matches!(
            render_once(&unit),
            VisibleOutput::CompileError { diagnostics } if diagnostics.len() == 1
        ));
    }

    #[test]
    fn test_missing_component_is_a_fault() {
        let unit = compile_with(RenderContext::new(), "<Chart />");
        let output = render_once(&unit);
        assert!(output.is_fault());
    }

    #[test]
    fn test_panicking_component_is_contained() {
        let context = RenderContext::new().with_component(
            "Bomb",
            |_: &Object, _: Vec<RenderNode>| -> Result<RenderNode, String> { panic!("kaboom") },
        );
        let unit = compile_with(context, "<Bomb />");

        let VisibleOutput::Fault { diagnostic } = render_once(&unit) else {
            panic!("Expected fault");
        };
        assert_eq!(diagnostic.reason, "Render panicked: kaboom");
    }

    #[test]
    fn test_fault_persists_until_reset_and_reset_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let context = RenderContext::new().with_component(
            "Flaky",
            move |_: &Object, _: Vec<RenderNode>| -> Result<RenderNode, String> {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("first call fails".to_string())
                } else {
                    Ok(RenderNode::text("ok"))
                }
            },
        );
        let unit = compile_with(context, "<Flaky />");
        let mut renderer = FaultIsolatedRenderer::new();

        assert!(renderer.render(1, &unit).is_fault());
        assert!(renderer.render(1, &unit).is_fault());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(renderer.reset());
        assert!(!renderer.is_faulted());
        match renderer.render(1, &unit) {
            VisibleOutput::Document { tree } => assert_eq!(tree.to_html(), "ok"),
            other => panic!("Expected document, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!renderer.reset());
    }

    #[test]
    fn test_new_unit_clears_fault() {
        let mut renderer = FaultIsolatedRenderer::new();
        let broken = compile_with(RenderContext::new(), "{nope}");
        let fixed = compile_with(RenderContext::new(), "fine");

        assert!(renderer.render(1, &broken).is_fault());
        assert!(matches!(
            renderer.render(2, &fixed),
            VisibleOutput::Document { .. }
        ));
    }

    #[test]
    fn test_serialization() {
        let unit = compile_with(RenderContext::new(), "Hi");
        let json = serde_json::to_value(render_once(&unit)).unwrap();
        insta::assert_json_snapshot!(json, @r#"
        {
          "state": "document",
          "tree": {
            "children": [
              {
                "children": [
                  {
                    "type": "text",
                    "value": "Hi"
                  }
                ],
                "properties": {},
                "tagName": "p",
                "type": "element"
              }
            ],
            "type": "root"
          }
        }
        "#);
    }
}

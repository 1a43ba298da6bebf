//! JSON output formatter

use mdxpad_core::{SourceUnit, VisibleOutput};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

pub fn output_json(unit: &SourceUnit, output: &VisibleOutput) -> Result<()> {
    let json = serde_json::json!({
        "path": unit.path,
        "diagnostics": unit.diagnostics,
        "output": output,
    });
    println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
    Ok(())
}

/// One line of the `live` protocol.
#[derive(Serialize)]
struct Frame<'a> {
    sequence: Option<u64>,
    #[serde(flatten)]
    output: &'a VisibleOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
}

impl<'a> Frame<'a> {
    fn new(sequence: Option<u64>, output: &'a VisibleOutput) -> Self {
        let html = match output {
            VisibleOutput::Document { tree } => Some(tree.to_html()),
            _ => None,
        };
        Self {
            sequence,
            output,
            html,
        }
    }
}

/// Writes the visible output as a single JSON line.
pub fn output_frame(sequence: Option<u64>, output: &VisibleOutput) -> Result<()> {
    let frame = Frame::new(sequence, output);
    println!("{}", serde_json::to_string(&frame).into_diagnostic()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdxpad_core::{Compiler, Configuration, render_once};

    #[test]
    fn test_frame_flattens_output() {
        let unit = Compiler::new().compile_sync(&Configuration::new("# Hi"));
        let output = render_once(&unit);
        let json = serde_json::to_value(Frame::new(Some(3), &output)).unwrap();

        assert_eq!(json["sequence"], 3);
        assert_eq!(json["state"], "document");
        assert_eq!(json["html"], "<h1>Hi</h1>");
        assert!(json.get("tree").is_some());
    }

    #[test]
    fn test_frame_without_output() {
        let json = serde_json::to_value(Frame::new(None, &VisibleOutput::Nothing)).unwrap();
        assert_eq!(json, serde_json::json!({"sequence": null, "state": "nothing"}));
    }
}

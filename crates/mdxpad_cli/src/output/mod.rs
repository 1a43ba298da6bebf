//! Output formatting module

mod html;
mod json;
mod text;

use mdxpad_core::{SourceUnit, VisibleOutput};
use miette::Result;

pub use json::output_frame;

/// Writes the result of a one-shot render. Returns `true` when the document
/// could not be shown.
pub fn output_render(unit: &SourceUnit, output: &VisibleOutput, format: &str) -> Result<bool> {
    let has_errors = matches!(
        output,
        VisibleOutput::CompileError { .. } | VisibleOutput::Fault { .. }
    );

    match format {
        "json" => json::output_json(unit, output)?,
        _ => {
            text::output_diagnostics(unit, output);
            html::output_html(output);
        }
    }

    Ok(has_errors)
}

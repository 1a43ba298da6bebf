//! Text output formatter

use mdxpad_core::{SourceUnit, VisibleOutput};

/// Writes diagnostics to stderr so stdout only carries the document.
pub fn output_diagnostics(unit: &SourceUnit, output: &VisibleOutput) {
    for diag in &unit.diagnostics {
        let severity = if diag.fatal { "error" } else { "warning" };
        eprintln!("{} {}", severity, diag);
    }

    if let VisibleOutput::Fault { diagnostic } = output {
        eprintln!("error {}", diagnostic);
    }
}

//! Render command implementation

use std::path::Path;

use mdxpad_core::{Compiler, Extensions, MdxpadConfig, RenderContext, render_once};
use miette::{IntoDiagnostic, Result};
use tracing::debug;

use crate::output::output_render;
use crate::utils::{create_tokio_runtime, props_object};

/// Compiles and renders `file` once. Returns `true` when the document could
/// not be shown.
pub fn run_render(
    file: &Path,
    format: &str,
    config: &MdxpadConfig,
    extensions: Extensions,
) -> Result<bool> {
    let text = std::fs::read_to_string(file).into_diagnostic()?;
    let name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let configuration = config
        .configuration(name, text)
        .with_extensions(extensions);
    debug!("Rendering {} with {:?}", file.display(), configuration.extensions);

    let compiler = Compiler::with_context(RenderContext::new().with_props(props_object(config)));
    let runtime = create_tokio_runtime()?;
    let unit = runtime.block_on(compiler.compile(configuration));

    let output = render_once(&unit);
    output_render(&unit, &output, format)
}

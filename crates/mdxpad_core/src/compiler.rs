//! The compiler: configuration in, source unit out.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use mdxpad_parser::{MarkdownParser, MdxParser, ParseError, Parser};
use tracing::{debug, error, info};

use crate::lower::{check_depth, lower};
use crate::program::Program;
use crate::{
    CompileError, CompiledOutput, Configuration, Diagnostic, Format, RenderContext, SourceUnit,
    resolve_stages,
};

/// Compiles documents into renderable output.
///
/// Compilation never fails from the caller's point of view: every problem,
/// including a panic inside the parser, ends up as a fatal diagnostic on
/// the returned [`SourceUnit`].
///
/// # Example
///
/// ```rust
/// use mdxpad_core::{Compiler, Configuration};
///
/// let unit = Compiler::new().compile_sync(&Configuration::new("# Title"));
/// assert!(unit.is_success());
///
/// let tree = unit.compiled_output.unwrap().render().unwrap();
/// assert_eq!(tree.to_html(), "<h1>Title</h1>");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    context: RenderContext,
}

impl Compiler {
    /// Creates a compiler whose output runs with empty props and no components.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a compiler whose output runs against `context`.
    pub fn with_context(context: RenderContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Compiles on the blocking thread pool.
    pub async fn compile(&self, config: Configuration) -> SourceUnit {
        let compiler = self.clone();
        let path = config.path.clone();
        let text = config.text.clone();

        match tokio::task::spawn_blocking(move || compiler.compile_sync(&config)).await {
            Ok(unit) => unit,
            Err(e) => {
                error!("Compile task failed: {}", e);
                let mut unit = SourceUnit::new(path, text);
                unit.fail(
                    Diagnostic::fatal(format!("Compile task failed: {}", e))
                        .with_rule("mdxpad", "internal"),
                );
                unit
            }
        }
    }

    /// Compiles on the current thread.
    pub fn compile_sync(&self, config: &Configuration) -> SourceUnit {
        let mut unit = SourceUnit::new(config.path.clone(), config.text.clone());
        debug!("Compiling {} ({} bytes)", unit.path, unit.text.len());

        let result = catch_unwind(AssertUnwindSafe(|| run(config, &mut unit))).unwrap_or_else(|payload| {
            Err(CompileError::internal(format!(
                "compiler panicked: {}",
                panic_message(payload.as_ref())
            )))
        });

        match result {
            Ok(program) => {
                unit.compiled_output = Some(CompiledOutput::new(program, self.context.clone()));
                info!(
                    "Compiled {} with {} diagnostic(s)",
                    unit.path,
                    unit.diagnostics.len()
                );
            }
            Err(err) => {
                let mut diagnostic = to_diagnostic(err);
                if diagnostic.file.is_none() {
                    diagnostic.file = Some(unit.path.clone());
                }
                info!("Compile failed: {}", diagnostic);
                unit.push_diagnostic(diagnostic);
            }
        }

        unit
    }
}

fn run(config: &Configuration, unit: &mut SourceUnit) -> Result<Program, CompileError> {
    let stages = resolve_stages(config);

    let parser: Box<dyn Parser> = match config.resolved_format() {
        Format::Md => Box::new(MarkdownParser::new()),
        Format::Mdx | Format::Detect => Box::new(MdxParser::new()),
    };

    let mut constructs = parser.constructs();
    for stage in &stages {
        stage.configure(&mut constructs);
    }

    let mut tree = parser.parse(&config.text, constructs)?;
    check_depth(&mut tree, unit)?;
    for stage in &stages {
        stage.transform(&mut tree, unit)?;
    }

    lower(&tree, unit)
}

/// Normalizes any compile error into a fatal diagnostic.
fn to_diagnostic(err: CompileError) -> Diagnostic {
    let mut diagnostic = match err {
        CompileError::Reported(diagnostic) => *diagnostic,
        CompileError::Parse(ParseError::InvalidSource {
            message,
            place,
            rule_id,
            origin,
            ..
        }) => Diagnostic {
            reason: message,
            fatal: true,
            place,
            file: None,
            source: origin,
            rule_id,
        },
        CompileError::Parse(other) => Diagnostic::fatal(other.to_string()).with_rule("mdxpad", "parse"),
        CompileError::Internal(message) => {
            Diagnostic::fatal(format!("Internal error: {}", message)).with_rule("mdxpad", "internal")
        }
    };
    diagnostic.fatal = true;
    diagnostic
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

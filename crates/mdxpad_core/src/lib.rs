//! # mdxpad_core
//!
//! Compiler and renderer for mdxpad.
//!
//! This crate provides:
//! - The `Compiler` that turns a `Configuration` into a `SourceUnit`
//! - Capability-tagged extension stages (GFM, frontmatter, math)
//! - The runtime that executes compiled output against props and components
//! - The `FaultIsolatedRenderer` that keeps render faults away from the host
//! - Configuration file loading
//!
//! ## Example
//!
//! ```rust
//! use mdxpad_core::{Compiler, Configuration, VisibleOutput, render_once};
//!
//! let unit = Compiler::new().compile_sync(&Configuration::new("# Hello"));
//!
//! match render_once(&unit) {
//!     VisibleOutput::Document { tree } => assert_eq!(tree.to_html(), "<h1>Hello</h1>"),
//!     other => panic!("unexpected output: {:?}", other),
//! }
//! ```

mod compiler;
mod config;
mod diagnostic;
mod error;
mod lower;
pub mod program;
mod renderer;
pub mod runtime;
mod source;
pub mod stage;

pub use compiler::Compiler;
pub use config::{
    Configuration, DEFAULT_DEBOUNCE_MS, DEFAULT_PATH, Extensions, Format, MdxpadConfig,
};
pub use diagnostic::Diagnostic;
pub use error::{CompileError, ConfigError, RenderError};
pub use program::CompiledOutput;
pub use renderer::{FaultIsolatedRenderer, VisibleOutput, guarded_render, render_once};
pub use runtime::{Component, RenderContext};
pub use source::SourceUnit;
pub use stage::{Capability, Stage, resolve_stages};

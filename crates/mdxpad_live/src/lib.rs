//! # mdxpad_live
//!
//! The live editing pipeline.
//!
//! Edits go through a leading + trailing [`Debouncer`], each fired
//! configuration is compiled off the async executor, and completions are
//! applied to the [`PipelineState`] only when they are not older than what
//! is already shown. A [`Session`] wires these together with the
//! fault-isolated renderer.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use mdxpad_core::{Compiler, Configuration};
//! use mdxpad_live::Session;
//!
//! # async fn demo() {
//! let session = Session::new(Configuration::new(""), Compiler::new(), Duration::from_millis(500));
//! session.did_change("# Hello");
//! session.settle().await;
//! println!("{:?}", session.current_output());
//! # }
//! ```

mod debounce;
mod session;
mod state;

pub use debounce::Debouncer;
pub use session::{CompileFn, Session, compile_fn};
pub use state::{PipelineState, SharedState};

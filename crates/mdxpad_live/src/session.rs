//! A live editing session.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use mdxpad_core::{Compiler, Configuration, Extensions, SourceUnit, VisibleOutput};
use tokio::sync::watch;
use tracing::debug;

use crate::debounce::Debouncer;
use crate::state::{PipelineState, SharedState};

/// Asynchronous compile function used by a [`Session`].
pub type CompileFn =
    Arc<dyn Fn(Configuration) -> Pin<Box<dyn Future<Output = SourceUnit> + Send>> + Send + Sync>;

/// Wraps an async function as a [`CompileFn`].
pub fn compile_fn<F, Fut>(f: F) -> CompileFn
where
    F: Fn(Configuration) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SourceUnit> + Send + 'static,
{
    Arc::new(
        move |config: Configuration| -> Pin<Box<dyn Future<Output = SourceUnit> + Send>> {
            Box::pin(f(config))
        },
    )
}

/// Editor events in, visible output out.
///
/// Must be created inside a tokio runtime: the debouncer and every compile
/// run as tasks on it.
#[derive(Debug)]
pub struct Session {
    state: SharedState,
    debouncer: Debouncer,
}

impl Session {
    /// Creates a session that compiles with `compiler`.
    pub fn new(configuration: Configuration, compiler: Compiler, wait: Duration) -> Self {
        let compile = compile_fn(move |config| {
            let compiler = compiler.clone();
            async move { compiler.compile(config).await }
        });
        Self::with_compile_fn(configuration, wait, compile)
    }

    /// Creates a session with a custom compile function.
    pub fn with_compile_fn(configuration: Configuration, wait: Duration, compile: CompileFn) -> Self {
        let state: SharedState = Arc::new(PipelineState::new(configuration));

        let dispatch_state = Arc::clone(&state);
        let debouncer = Debouncer::spawn(wait, move |config| {
            dispatch(Arc::clone(&dispatch_state), Arc::clone(&compile), config)
        });

        Self { state, debouncer }
    }

    /// The editor text changed.
    pub fn did_change(&self, text: impl Into<String>) {
        let text = text.into();
        let config = self.state.update_configuration(|c| c.text = text);
        self.debouncer.push(config);
    }

    /// Extension toggles changed.
    pub fn set_extensions(&self, extensions: Extensions) {
        let config = self.state.update_configuration(|c| c.extensions = extensions);
        self.debouncer.push(config);
    }

    /// The current configuration.
    pub fn configuration(&self) -> Configuration {
        self.state.configuration()
    }

    /// What the user currently sees.
    pub fn current_output(&self) -> VisibleOutput {
        self.state.visible_output()
    }

    /// The "try again" action of the render fallback. Never recompiles.
    pub fn reset_fault(&self) -> bool {
        self.state.reset_fault()
    }

    /// Watches the sequence number of the applied unit.
    pub fn subscribe(&self) -> watch::Receiver<Option<u64>> {
        self.state.subscribe()
    }

    /// Dispatches any pending edit without waiting for the quiet window.
    pub async fn flush(&self) {
        self.debouncer.flush().await;
    }

    /// Flushes and waits for every dispatched compile to finish.
    pub async fn settle(&self) {
        self.flush().await;
        self.state.wait_idle().await;
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }
}

fn dispatch(state: SharedState, compile: CompileFn, config: Configuration) {
    let sequence = state.next_sequence();
    debug!("Dispatching compile #{}", sequence);

    tokio::spawn(async move {
        let unit = compile(config).await;
        state.complete(sequence, unit);
    });
}

//! Live command implementation
//!
//! Reads one JSON event per line from stdin and writes the visible output
//! to stdout, one JSON line per applied compile.

use std::time::Duration;

use mdxpad_core::{Compiler, DEFAULT_PATH, Extensions, MdxpadConfig, RenderContext};
use mdxpad_live::Session;
use miette::{IntoDiagnostic, Result};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::output::output_frame;
use crate::utils::{create_tokio_runtime, props_object};

/// An editor event.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Event {
    /// The full document text changed.
    Change { text: String },
    /// Some extension toggles changed; absent ones keep their value.
    Toggle {
        #[serde(default)]
        gfm: Option<bool>,
        #[serde(default)]
        frontmatter: Option<bool>,
        #[serde(default)]
        math: Option<bool>,
    },
    /// "Try again" on a render fault.
    Reset,
    /// Compile a pending edit now.
    Flush,
}

impl Event {
    fn parse(line: &str) -> Option<Self> {
        match serde_json::from_str(line) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Ignoring invalid event: {}", e);
                None
            }
        }
    }
}

fn toggled(
    current: Extensions,
    gfm: Option<bool>,
    frontmatter: Option<bool>,
    math: Option<bool>,
) -> Extensions {
    Extensions {
        gfm: gfm.unwrap_or(current.gfm),
        frontmatter: frontmatter.unwrap_or(current.frontmatter),
        math: math.unwrap_or(current.math),
    }
}

pub fn run_live(config: &MdxpadConfig, path: Option<String>, debounce_ms: Option<u64>) -> Result<()> {
    let wait = Duration::from_millis(debounce_ms.unwrap_or(config.debounce_ms));
    let path = path.unwrap_or_else(|| DEFAULT_PATH.to_string());
    let configuration = config.configuration(path, "");
    let compiler = Compiler::with_context(RenderContext::new().with_props(props_object(config)));

    let runtime = create_tokio_runtime()?;
    runtime.block_on(async move {
        let session = Session::new(configuration, compiler, wait);
        info!("Live session started ({}ms debounce)", wait.as_millis());
        serve(&session).await
    })?;

    info!("Live session ended");
    Ok(())
}

async fn serve(session: &Session) -> Result<()> {
    let mut applied = session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.into_diagnostic()? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                if let Some(event) = Event::parse(&line) {
                    handle(session, event).await?;
                }
            }
            changed = applied.changed() => {
                if changed.is_ok() {
                    let sequence = *applied.borrow_and_update();
                    output_frame(sequence, &session.current_output())?;
                }
            }
        }
    }

    // End of input: let the last edit land before exiting.
    session.settle().await;
    if applied.has_changed().unwrap_or(false) {
        let sequence = *applied.borrow_and_update();
        output_frame(sequence, &session.current_output())?;
    }

    Ok(())
}

async fn handle(session: &Session, event: Event) -> Result<()> {
    debug!("Event: {:?}", event);
    match event {
        Event::Change { text } => session.did_change(text),
        Event::Toggle {
            gfm,
            frontmatter,
            math,
        } => {
            let current = session.configuration().extensions;
            session.set_extensions(toggled(current, gfm, frontmatter, math));
        }
        Event::Reset => {
            if session.reset_fault() {
                let sequence = session.state().applied_sequence();
                output_frame(sequence, &session.current_output())?;
            }
        }
        Event::Flush => session.flush().await,
    }
    Ok(())
}

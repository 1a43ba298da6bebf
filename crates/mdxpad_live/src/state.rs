//! Render pipeline state.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use mdxpad_core::{Configuration, FaultIsolatedRenderer, SourceUnit, VisibleOutput};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, info};

/// A completed compile that is currently shown.
#[derive(Debug, Clone)]
struct Applied {
    sequence: u64,
    unit: Arc<SourceUnit>,
}

/// Latest configuration, latest applied source unit and the renderer.
///
/// Every dispatched compile takes a sequence number from
/// [`next_sequence`](Self::next_sequence). A completion is applied only
/// when its number is not lower than the applied one, so a slow early
/// compile can never overwrite a later result.
pub struct PipelineState {
    /// The configuration the next edit will be compiled with.
    configuration: RwLock<Configuration>,
    latest: RwLock<Option<Applied>>,
    renderer: Mutex<FaultIsolatedRenderer>,
    next_sequence: AtomicU64,
    /// Number of compiles that finished, applied or not.
    completed: watch::Sender<u64>,
    /// Sequence number of the applied unit.
    applied: watch::Sender<Option<u64>>,
}

impl fmt::Debug for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineState")
            .field("configuration", &"<Configuration>")
            .field("applied", &self.applied_sequence())
            .field("dispatched", &self.dispatched())
            .finish()
    }
}

impl PipelineState {
    /// Creates a new empty state.
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration: RwLock::new(configuration),
            latest: RwLock::new(None),
            renderer: Mutex::new(FaultIsolatedRenderer::new()),
            next_sequence: AtomicU64::new(0),
            completed: watch::Sender::new(0),
            applied: watch::Sender::new(None),
        }
    }

    /// A copy of the current configuration.
    pub fn configuration(&self) -> Configuration {
        self.configuration.read().clone()
    }

    /// Changes the configuration and returns the new value.
    pub fn update_configuration(&self, update: impl FnOnce(&mut Configuration)) -> Configuration {
        let mut configuration = self.configuration.write();
        update(&mut configuration);
        configuration.clone()
    }

    /// Reserves the sequence number for a new dispatch.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of compiles dispatched so far.
    pub fn dispatched(&self) -> u64 {
        self.next_sequence.load(Ordering::SeqCst)
    }

    /// Records a finished compile. Returns `true` when it was applied.
    pub fn complete(&self, sequence: u64, unit: SourceUnit) -> bool {
        let applied = self.apply(sequence, unit);
        self.completed.send_modify(|count| *count += 1);
        applied
    }

    fn apply(&self, sequence: u64, unit: SourceUnit) -> bool {
        let mut latest = self.latest.write();
        if let Some(current) = latest.as_ref() {
            if current.sequence > sequence {
                debug!(
                    "Discarding stale compile #{} (showing #{})",
                    sequence, current.sequence
                );
                return false;
            }
        }

        info!(
            "Applying compile #{} ({} diagnostic(s))",
            sequence,
            unit.diagnostics.len()
        );
        *latest = Some(Applied {
            sequence,
            unit: Arc::new(unit),
        });
        drop(latest);

        self.applied.send_replace(Some(sequence));
        true
    }

    /// Sequence number of the applied unit, if any.
    pub fn applied_sequence(&self) -> Option<u64> {
        self.latest.read().as_ref().map(|applied| applied.sequence)
    }

    /// The applied unit, if any.
    pub fn latest_unit(&self) -> Option<Arc<SourceUnit>> {
        self.latest.read().as_ref().map(|applied| Arc::clone(&applied.unit))
    }

    /// What the user should see right now. Never waits for a compile.
    pub fn visible_output(&self) -> VisibleOutput {
        let Some(applied) = self.latest.read().clone() else {
            return VisibleOutput::Nothing;
        };
        self.renderer.lock().render(applied.sequence, &applied.unit)
    }

    /// Clears a render fault. Returns `true` if there was one.
    pub fn reset_fault(&self) -> bool {
        self.renderer.lock().reset()
    }

    /// Watches the sequence number of the applied unit.
    pub fn subscribe(&self) -> watch::Receiver<Option<u64>> {
        self.applied.subscribe()
    }

    /// Waits until every compile dispatched so far has finished.
    pub async fn wait_idle(&self) {
        let target = self.dispatched();
        let mut completed = self.completed.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = completed.wait_for(|count| *count >= target).await;
    }
}

/// Type alias for shared state.
pub type SharedState = Arc<PipelineState>;

//! Leading + trailing debouncing of compile requests.

use std::time::Duration;

use mdxpad_core::Configuration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

pub use mdxpad_core::DEFAULT_DEBOUNCE_MS;

enum Message {
    Edit(Configuration),
    Flush(oneshot::Sender<()>),
}

/// Debounces configurations on their way to the compiler.
///
/// The first edit after a quiet period fires immediately. Edits arriving
/// while the window is open replace each other and restart the window; when
/// it closes the most recent one fires, but only if something arrived after
/// the leading fire. The debouncer is then idle again.
///
/// Dropping the debouncer fires any pending edit and stops the task.
#[derive(Debug)]
pub struct Debouncer {
    tx: mpsc::UnboundedSender<Message>,
    handle: JoinHandle<()>,
}

impl Debouncer {
    /// Spawns the debouncing task. `fire` is called for every configuration
    /// that should be compiled.
    pub fn spawn<F>(wait: Duration, fire: F) -> Self
    where
        F: FnMut(Configuration) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(rx, wait, fire));
        Self { tx, handle }
    }

    /// Submits a configuration. Returns `false` if the task has stopped.
    pub fn push(&self, configuration: Configuration) -> bool {
        self.tx.send(Message::Edit(configuration)).is_ok()
    }

    /// Fires a pending configuration now instead of at the end of the window.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Message::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Stops the task after firing any pending configuration.
    pub async fn shutdown(self) {
        drop(self.tx);
        let _ = self.handle.await;
    }
}

async fn run<F>(mut rx: mpsc::UnboundedReceiver<Message>, wait: Duration, mut fire: F)
where
    F: FnMut(Configuration),
{
    // Idle: wait for the edit that opens a window.
    while let Some(message) = rx.recv().await {
        let configuration = match message {
            Message::Edit(configuration) => configuration,
            Message::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
        };

        debug!("Leading compile");
        fire(configuration);

        let mut deadline = Instant::now() + wait;
        let mut pending: Option<Configuration> = None;

        // Waiting: collect edits until the window closes.
        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(Message::Edit(configuration)) => {
                        pending = Some(configuration);
                        deadline = Instant::now() + wait;
                    }
                    Some(Message::Flush(ack)) => {
                        if let Some(configuration) = pending.take() {
                            debug!("Flushing pending compile");
                            fire(configuration);
                        }
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        if let Some(configuration) = pending.take() {
                            fire(configuration);
                        }
                        return;
                    }
                },
                _ = sleep_until(deadline) => {
                    if let Some(configuration) = pending.take() {
                        debug!("Trailing compile");
                        fire(configuration);
                    }
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl FnMut(Configuration) + Send + 'static) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        (fired, move |config: Configuration| sink.lock().push(config.text))
    }

    fn edit(text: &str) -> Configuration {
        Configuration::new(text)
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_edit_fires_once() {
        let (fired, fire) = recorder();
        let debouncer = Debouncer::spawn(Duration::from_millis(500), fire);

        debouncer.push(edit("a"));
        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert_eq!(*fired.lock(), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_leading_and_trailing() {
        let (fired, fire) = recorder();
        let debouncer = Debouncer::spawn(Duration::from_millis(500), fire);

        for text in ["a", "ab", "abc", "abcd"] {
            debouncer.push(edit(text));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(*fired.lock(), vec!["a"]);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(*fired.lock(), vec!["a", "abcd"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_after_quiet_period_fires_immediately() {
        let (fired, fire) = recorder();
        let debouncer = Debouncer::spawn(Duration::from_millis(500), fire);

        debouncer.push(edit("a"));
        tokio::time::sleep(Duration::from_millis(600)).await;
        debouncer.push(edit("b"));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(*fired.lock(), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_fires_pending() {
        let (fired, fire) = recorder();
        let debouncer = Debouncer::spawn(Duration::from_millis(500), fire);

        debouncer.push(edit("a"));
        debouncer.push(edit("ab"));
        debouncer.flush().await;

        assert_eq!(*fired.lock(), vec!["a", "ab"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_fires_pending() {
        let (fired, fire) = recorder();
        let debouncer = Debouncer::spawn(Duration::from_millis(500), fire);

        debouncer.push(edit("a"));
        debouncer.push(edit("ab"));
        debouncer.shutdown().await;

        assert_eq!(*fired.lock(), vec!["a", "ab"]);
    }
}

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Trailing-edge debounce over a watch channel.
///
/// The output takes the latest input only after the input has been stable
/// for `delay`. Every input change restarts the timer and there is no
/// maximum wait, so an input that never settles never propagates.
///
/// The output starts at the input's current value and only notifies
/// subscribers when the settled value differs from what it already holds.
/// Dropping the handle stops the background task.
#[derive(Debug)]
pub struct Debouncer<T> {
    output: watch::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T> Debouncer<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn spawn(mut input: watch::Receiver<T>, delay: Duration) -> Self {
        let initial = input.borrow_and_update().clone();
        let (tx, output) = watch::channel(initial);
        let task = tokio::spawn(run(input, tx, delay));
        Self { output, task }
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.output.clone()
    }

    pub fn current(&self) -> T {
        self.output.borrow().clone()
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<T>(mut input: watch::Receiver<T>, output: watch::Sender<T>, delay: Duration)
where
    T: Clone + PartialEq,
{
    while input.changed().await.is_ok() {
        loop {
            tokio::select! {
                changed = input.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(delay) => break,
            }
        }

        let latest = input.borrow_and_update().clone();
        output.send_if_modified(|current| {
            if *current == latest {
                return false;
            }
            *current = latest;
            true
        });
    }
}

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Watches a projection of another watched value.
///
/// Subscribers are only notified when the projected value changes, so a
/// center derived from a search area stays quiet while only the radius moves.
#[derive(Debug)]
pub struct Derived<U> {
    output: watch::Receiver<U>,
    task: JoinHandle<()>,
}

impl<U> Derived<U>
where
    U: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn spawn<T, F>(mut input: watch::Receiver<T>, project: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> U + Send + 'static,
    {
        let initial = project(&input.borrow_and_update());
        let (tx, output) = watch::channel(initial);
        let task = tokio::spawn(async move {
            while input.changed().await.is_ok() {
                let next = project(&input.borrow_and_update());
                tx.send_if_modified(|current| {
                    if *current == next {
                        return false;
                    }
                    *current = next;
                    true
                });
            }
        });
        Self { output, task }
    }

    pub fn subscribe(&self) -> watch::Receiver<U> {
        self.output.clone()
    }
}

impl<U> Drop for Derived<U> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::metrics::SharedMetrics;
use crate::signal::AsyncSignal;

/// Drives one [`AsyncSignal`] slot from a sequence of fetches.
///
/// Only the most recently fired fetch may write its outcome. Firing again
/// cancels the previous request before the new one starts, and the
/// cancellation check runs under the slot's lock, so a superseded response
/// can never overwrite a newer one even if it was already in flight.
pub struct FetchTrigger<T> {
    name: &'static str,
    slot: Arc<watch::Sender<AsyncSignal<T>>>,
    inflight: Option<CancellationToken>,
    metrics: SharedMetrics,
}

impl<T> FetchTrigger<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(name: &'static str, metrics: SharedMetrics) -> Self {
        let (slot, _) = watch::channel(AsyncSignal::idle());
        Self {
            name,
            slot: Arc::new(slot),
            inflight: None,
            metrics,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe(&self) -> watch::Receiver<AsyncSignal<T>> {
        self.slot.subscribe()
    }

    /// Starts a fetch, keeping the current value visible while it loads.
    pub fn fire<F, E>(&mut self, fetch: F)
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.start(fetch, AsyncSignal::begin);
    }

    /// Starts a fetch and hides the current value until it completes.
    pub fn restart<F, E>(&mut self, fetch: F)
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.start(fetch, AsyncSignal::reset);
    }

    /// Cancels any in-flight fetch without touching the slot.
    pub fn cancel(&mut self) {
        if let Some(token) = self.inflight.take() {
            token.cancel();
        }
    }

    /// Cancels any in-flight fetch and empties the slot, for when the
    /// inputs the current value was fetched for no longer exist.
    pub fn clear(&mut self) {
        self.cancel();
        self.slot.send_if_modified(|s| {
            if !s.is_loading() && s.value().is_none() && s.error().is_none() {
                return false;
            }
            s.clear();
            true
        });
    }

    fn start<F, E>(&mut self, fetch: F, mark: fn(&mut AsyncSignal<T>))
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.cancel();
        let token = CancellationToken::new();
        self.inflight = Some(token.clone());
        self.slot.send_modify(mark);
        self.metrics
            .lock()
            .inc_counter(format!("{}.started", self.name), 1);
        tracing::debug!(signal = self.name, "fetch started");

        let name = self.name;
        let slot = Arc::clone(&self.slot);
        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = fetch => Some(result.map_err(|e| e.to_string())),
            };
            let Some(result) = outcome else {
                metrics.lock().inc_counter(format!("{name}.superseded"), 1);
                return;
            };

            let failure = result.as_ref().err().cloned();
            let applied = slot.send_if_modified(|s| {
                if token.is_cancelled() {
                    return false;
                }
                match result {
                    Ok(value) => s.resolve(value),
                    Err(message) => s.fail(message),
                }
                true
            });

            let mut m = metrics.lock();
            if !applied {
                m.inc_counter(format!("{name}.superseded"), 1);
                return;
            }
            let elapsed = started.elapsed().as_millis() as u64;
            m.record_histogram(format!("{name}.latency_ms"), elapsed);
            match failure {
                None => {
                    m.inc_counter(format!("{name}.resolved"), 1);
                    tracing::debug!(signal = name, elapsed_ms = elapsed, "fetch resolved");
                }
                Some(error) => {
                    m.inc_counter(format!("{name}.failed"), 1);
                    tracing::warn!(signal = name, %error, "fetch failed");
                }
            }
        });
    }
}

impl<T: Clone> FetchTrigger<T> {
    pub fn current(&self) -> AsyncSignal<T> {
        self.slot.borrow().clone()
    }
}

impl<T> Drop for FetchTrigger<T> {
    fn drop(&mut self) {
        if let Some(token) = self.inflight.take() {
            token.cancel();
        }
    }
}

pub mod debounce;
pub mod derive;
pub mod metrics;
pub mod signal;
pub mod trigger;

pub use debounce::Debouncer;
pub use derive::Derived;
pub use metrics::{Metrics, MetricsSnapshot, SharedMetrics};
pub use signal::AsyncSignal;
pub use trigger::FetchTrigger;

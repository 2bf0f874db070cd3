use std::sync::Arc;

use foundation::SearchArea;
use protocol::AllocationRequest;
use runtime::metrics::{self, MetricsSnapshot, SharedMetrics};
use runtime::{AsyncSignal, Debouncer, Derived, FetchTrigger};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::{BoxFuture, EstimateServices};
use crate::composer::{self, ReportInputs};
use crate::config::Delays;
use crate::error::FetchError;
use crate::signals::Signals;
use crate::store::GeoState;

/// Owns every fetch effect for one mounted view.
///
/// Each signal gets its own task holding its debouncer and trigger. Dropping
/// the orchestrator aborts those tasks, which drops the triggers and cancels
/// whatever they had in flight.
pub struct Orchestrator {
    signals: Signals,
    metrics: SharedMetrics,
    tasks: Vec<JoinHandle<()>>,
}

impl Orchestrator {
    /// Wires `state` to `services`. Must be called inside a tokio runtime.
    ///
    /// Every debounced input starts at its current value, so the first round
    /// of fetches starts immediately.
    pub fn mount(services: Arc<dyn EstimateServices>, state: &GeoState, delays: Delays) -> Self {
        let metrics = metrics::shared();
        let traffic = FetchTrigger::new("traffic_signals", Arc::clone(&metrics));
        let population = FetchTrigger::new("population", Arc::clone(&metrics));
        let conditions = FetchTrigger::new("conditions", Arc::clone(&metrics));
        let wattage = FetchTrigger::new("wattage", Arc::clone(&metrics));
        let allocation = FetchTrigger::new("allocation", Arc::clone(&metrics));
        let report = FetchTrigger::new("report", Arc::clone(&metrics));

        let signals = Signals {
            traffic_signals: traffic.subscribe(),
            population: population.subscribe(),
            conditions: conditions.subscribe(),
            wattage: wattage.subscribe(),
            allocation: allocation.subscribe(),
            report: report.subscribe(),
        };

        let mut tasks = Vec::with_capacity(6);

        let (traffic_basis, traffic_basis_rx) = watch::channel(None);
        let traffic_area = Debouncer::spawn(state.watch_area(), delays.traffic);
        let svc = Arc::clone(&services);
        tasks.push(spawn_effect(
            traffic_area.subscribe(),
            traffic,
            traffic_basis,
            traffic_area,
            move |area| svc.traffic_signals(area),
        ));

        let (population_basis, population_basis_rx) = watch::channel(None);
        let population_area = Debouncer::spawn(state.watch_area(), delays.population);
        let svc = Arc::clone(&services);
        tasks.push(spawn_effect(
            population_area.subscribe(),
            population,
            population_basis,
            population_area,
            move |area| svc.population(area),
        ));

        // Radius-only moves leave the center unchanged and do not refetch.
        let (conditions_basis, conditions_basis_rx) = watch::channel(None);
        let center = Derived::spawn(state.watch_area(), |area: &SearchArea| area.center());
        let settled_center = Debouncer::spawn(center.subscribe(), delays.conditions);
        let svc = Arc::clone(&services);
        tasks.push(spawn_effect(
            settled_center.subscribe(),
            conditions,
            conditions_basis,
            (center, settled_center),
            move |center| svc.conditions(center),
        ));

        let (wattage_basis, wattage_basis_rx) = watch::channel(None);
        let profile = Debouncer::spawn(state.watch_profile(), delays.wattage);
        let svc = Arc::clone(&services);
        tasks.push(spawn_effect(
            profile.subscribe(),
            wattage,
            wattage_basis,
            profile,
            move |profile| svc.wattage(profile),
        ));

        let (allocation_basis, allocation_basis_rx) = watch::channel(None);
        tasks.push(spawn_allocation(
            Arc::clone(&services),
            signals.clone(),
            allocation,
            allocation_basis,
        ));

        let inputs = ReportInputs {
            area: state.watch_area(),
            profile: state.watch_profile(),
            refresh: state.watch_refresh(),
            traffic: signals.traffic_signals.clone(),
            traffic_basis: traffic_basis_rx,
            population: signals.population.clone(),
            population_basis: population_basis_rx,
            conditions: signals.conditions.clone(),
            conditions_basis: conditions_basis_rx,
            wattage: signals.wattage.clone(),
            wattage_basis: wattage_basis_rx,
            allocation: signals.allocation.clone(),
            allocation_basis: allocation_basis_rx,
        };
        tasks.push(composer::spawn(services, inputs, report));

        tracing::debug!(effects = tasks.len(), "orchestrator mounted");
        Self {
            signals,
            metrics,
            tasks,
        }
    }

    pub fn signals(&self) -> Signals {
        self.signals.clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.lock().snapshot()
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Refires `fetch` for every new value of `input`.
///
/// `basis` records the input the slot's latest request was made for; it is
/// published after the trigger has already marked the slot loading.
fn spawn_effect<I, T, G, F>(
    mut input: watch::Receiver<I>,
    mut trigger: FetchTrigger<T>,
    basis: watch::Sender<Option<I>>,
    guard: G,
    fetch: F,
) -> JoinHandle<()>
where
    I: Copy + Send + Sync + 'static,
    T: Send + Sync + 'static,
    G: Send + 'static,
    F: Fn(I) -> BoxFuture<'static, Result<T, FetchError>> + Send + 'static,
{
    tokio::spawn(async move {
        let _guard = guard;
        loop {
            let value = *input.borrow_and_update();
            trigger.fire(fetch(value));
            basis.send_replace(Some(value));
            if input.changed().await.is_err() {
                break;
            }
        }
    })
}

/// The allocation request the current upstream values call for, if every
/// one of them holds a value.
pub(crate) fn allocation_key(
    population: &AsyncSignal<f64>,
    traffic: &AsyncSignal<u32>,
    wattage: &AsyncSignal<f64>,
) -> Option<AllocationRequest> {
    Some(AllocationRequest {
        population: population.get()?,
        traffic_light_count: traffic.get()?,
        wattage: wattage.get()?,
    })
}

fn spawn_allocation(
    services: Arc<dyn EstimateServices>,
    mut signals: Signals,
    mut trigger: FetchTrigger<protocol::DeviceAllocation>,
    basis: watch::Sender<Option<AllocationRequest>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = None;
        loop {
            let key = allocation_key(
                &signals.population.borrow_and_update(),
                &signals.traffic_signals.borrow_and_update(),
                &signals.wattage.borrow_and_update(),
            );
            if key != last {
                match key {
                    Some(request) => {
                        tracing::debug!(?request, "allocation inputs changed");
                        trigger.fire(services.allocation(request));
                    }
                    None => trigger.clear(),
                }
                basis.send_replace(key);
                last = key;
            }

            let alive = tokio::select! {
                r = signals.population.changed() => r.is_ok(),
                r = signals.traffic_signals.changed() => r.is_ok(),
                r = signals.wattage.changed() => r.is_ok(),
            };
            if !alive {
                break;
            }
        }
    })
}

use protocol::{Conditions, DeviceAllocation, ImpactReport};
use runtime::AsyncSignal;
use serde::Serialize;
use tokio::sync::watch;

/// Read side of every signal slot. Each slot has exactly one writer, its
/// fetch trigger inside the orchestrator.
#[derive(Debug, Clone)]
pub struct Signals {
    pub traffic_signals: watch::Receiver<AsyncSignal<u32>>,
    pub population: watch::Receiver<AsyncSignal<f64>>,
    pub conditions: watch::Receiver<AsyncSignal<Conditions>>,
    pub wattage: watch::Receiver<AsyncSignal<f64>>,
    pub allocation: watch::Receiver<AsyncSignal<DeviceAllocation>>,
    pub report: watch::Receiver<AsyncSignal<ImpactReport>>,
}

/// Point-in-time copy of every slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalBoard {
    pub traffic_signals: AsyncSignal<u32>,
    pub population: AsyncSignal<f64>,
    pub conditions: AsyncSignal<Conditions>,
    pub wattage: AsyncSignal<f64>,
    pub allocation: AsyncSignal<DeviceAllocation>,
    pub report: AsyncSignal<ImpactReport>,
}

impl Signals {
    /// Snapshot of all slots, marking them seen.
    pub fn board(&mut self) -> SignalBoard {
        SignalBoard {
            traffic_signals: self.traffic_signals.borrow_and_update().clone(),
            population: self.population.borrow_and_update().clone(),
            conditions: self.conditions.borrow_and_update().clone(),
            wattage: self.wattage.borrow_and_update().clone(),
            allocation: self.allocation.borrow_and_update().clone(),
            report: self.report.borrow_and_update().clone(),
        }
    }

    /// Waits until any slot changes. Returns `false` once the orchestrator
    /// that owns the slots is gone.
    pub async fn changed(&mut self) -> bool {
        let result = tokio::select! {
            r = self.traffic_signals.changed() => r,
            r = self.population.changed() => r,
            r = self.conditions.changed() => r,
            r = self.wattage.changed() => r,
            r = self.allocation.changed() => r,
            r = self.report.changed() => r,
        };
        result.is_ok()
    }
}

impl SignalBoard {
    pub fn any_loading(&self) -> bool {
        self.traffic_signals.is_loading()
            || self.population.is_loading()
            || self.conditions.is_loading()
            || self.wattage.is_loading()
            || self.allocation.is_loading()
            || self.report.is_loading()
    }

    /// The report has resolved or failed and nothing is still loading.
    pub fn report_settled(&self) -> bool {
        !self.any_loading() && (self.report.value().is_some() || self.report.error().is_some())
    }

    pub fn errors(&self) -> Vec<(&'static str, &str)> {
        [
            ("traffic_signals", self.traffic_signals.error()),
            ("population", self.population.error()),
            ("conditions", self.conditions.error()),
            ("wattage", self.wattage.error()),
            ("allocation", self.allocation.error()),
            ("report", self.report.error()),
        ]
        .into_iter()
        .filter_map(|(name, err)| err.map(|e| (name, e)))
        .collect()
    }
}

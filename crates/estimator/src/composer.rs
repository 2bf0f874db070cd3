//! Derived impact report.
//!
//! The report is requested once per settled combination of its inputs:
//! every required signal holds a value, none is loading, and each one was
//! fetched for the inputs currently in the store. A newer combination
//! supersedes the request in flight.

use std::sync::Arc;

use foundation::{DeviceProfile, GeoPoint, SearchArea};
use protocol::{AllocationRequest, Conditions, DeviceAllocation, ImpactReport, ReportRequest};
use runtime::{AsyncSignal, FetchTrigger};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::EstimateServices;
use crate::orchestrator::allocation_key;

pub(crate) struct ReportInputs {
    pub area: watch::Receiver<SearchArea>,
    pub profile: watch::Receiver<DeviceProfile>,
    pub refresh: watch::Receiver<u64>,
    pub traffic: watch::Receiver<AsyncSignal<u32>>,
    pub traffic_basis: watch::Receiver<Option<SearchArea>>,
    pub population: watch::Receiver<AsyncSignal<f64>>,
    pub population_basis: watch::Receiver<Option<SearchArea>>,
    pub conditions: watch::Receiver<AsyncSignal<Conditions>>,
    pub conditions_basis: watch::Receiver<Option<GeoPoint>>,
    pub wattage: watch::Receiver<AsyncSignal<f64>>,
    pub wattage_basis: watch::Receiver<Option<DeviceProfile>>,
    pub allocation: watch::Receiver<AsyncSignal<DeviceAllocation>>,
    pub allocation_basis: watch::Receiver<Option<AllocationRequest>>,
}

/// Everything the composer looks at, copied out of the channels.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReportSnapshot {
    pub area: SearchArea,
    pub profile: DeviceProfile,
    pub refresh: u64,
    pub traffic: AsyncSignal<u32>,
    pub traffic_basis: Option<SearchArea>,
    pub population: AsyncSignal<f64>,
    pub population_basis: Option<SearchArea>,
    pub conditions: AsyncSignal<Conditions>,
    pub conditions_basis: Option<GeoPoint>,
    pub wattage: AsyncSignal<f64>,
    pub wattage_basis: Option<DeviceProfile>,
    pub allocation: AsyncSignal<DeviceAllocation>,
    pub allocation_basis: Option<AllocationRequest>,
}

impl ReportInputs {
    /// Copies every input, marking each channel seen.
    fn snapshot(&mut self) -> ReportSnapshot {
        ReportSnapshot {
            area: *self.area.borrow_and_update(),
            profile: *self.profile.borrow_and_update(),
            refresh: *self.refresh.borrow_and_update(),
            traffic: self.traffic.borrow_and_update().clone(),
            traffic_basis: *self.traffic_basis.borrow_and_update(),
            population: self.population.borrow_and_update().clone(),
            population_basis: *self.population_basis.borrow_and_update(),
            conditions: self.conditions.borrow_and_update().clone(),
            conditions_basis: *self.conditions_basis.borrow_and_update(),
            wattage: self.wattage.borrow_and_update().clone(),
            wattage_basis: *self.wattage_basis.borrow_and_update(),
            allocation: self.allocation.borrow_and_update().clone(),
            allocation_basis: *self.allocation_basis.borrow_and_update(),
        }
    }

    async fn changed(&mut self) -> bool {
        let r = tokio::select! {
            r = self.area.changed() => r,
            r = self.profile.changed() => r,
            r = self.refresh.changed() => r,
            r = self.traffic.changed() => r,
            r = self.traffic_basis.changed() => r,
            r = self.population.changed() => r,
            r = self.population_basis.changed() => r,
            r = self.conditions.changed() => r,
            r = self.conditions_basis.changed() => r,
            r = self.wattage.changed() => r,
            r = self.wattage_basis.changed() => r,
            r = self.allocation.changed() => r,
            r = self.allocation_basis.changed() => r,
        };
        r.is_ok()
    }
}

impl ReportSnapshot {
    /// The report request these inputs call for, or `None` while any input
    /// is missing, loading, or belongs to superseded store values.
    pub fn request(&self) -> Option<ReportRequest> {
        let current = self.traffic_basis == Some(self.area)
            && self.population_basis == Some(self.area)
            && self.conditions_basis == Some(self.area.center())
            && self.wattage_basis == Some(self.profile);
        if !current {
            return None;
        }

        let loading = self.traffic.is_loading()
            || self.population.is_loading()
            || self.conditions.is_loading()
            || self.wattage.is_loading()
            || self.allocation.is_loading();
        if loading {
            return None;
        }

        let traffic = self.traffic.get()?;
        let population = self.population.get()?;
        let conditions = self.conditions.get()?;
        let wattage = self.wattage.get()?;
        let allocation = self.allocation.value()?;

        // The allocation must have been computed for exactly these values.
        let basis = allocation_key(&self.population, &self.traffic, &self.wattage);
        if basis.is_none() || self.allocation_basis != basis {
            return None;
        }

        let refresh = self.refresh
            + self.traffic.resolutions()
            + self.population.resolutions()
            + self.conditions.resolutions()
            + self.wattage.resolutions()
            + self.allocation.resolutions();

        Some(ReportRequest {
            center: self.area.center(),
            radius_meters: self.area.radius_meters(),
            population,
            traffic_signal_count: traffic,
            wattage,
            temperature_c: conditions.weather.temperature_c,
            relative_humidity_pct: conditions.weather.relative_humidity_pct,
            us_aqi: conditions.air_quality.us_aqi,
            max_offload_capacity_kw: allocation.max_offload_capacity_kw,
            offload_needed_kw: allocation.offload_needed_kw,
            percent_offload: allocation.percent_offload,
            raw_kw_offload: allocation.raw_kw_offload,
            refresh,
        })
    }
}

pub(crate) fn spawn(
    services: Arc<dyn EstimateServices>,
    mut inputs: ReportInputs,
    mut trigger: FetchTrigger<ImpactReport>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last: Option<ReportRequest> = None;
        loop {
            let next = inputs.snapshot().request();
            if next != last {
                match next {
                    Some(request) => {
                        tracing::debug!(refresh = request.refresh, "report inputs settled");
                        trigger.restart(services.impact_report(request));
                    }
                    None if last.is_some() => trigger.clear(),
                    None => {}
                }
                last = next;
            }
            if !inputs.changed().await {
                break;
            }
        }
    })
}

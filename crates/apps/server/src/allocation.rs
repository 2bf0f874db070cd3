//! Reference device allocator.
//!
//! Estimates idle-device counts from population, gives every class a fixed
//! mid-range draw and availability, and water-fills the needed load across
//! class capacities weighted by availability.

use std::collections::BTreeMap;

use axum::Json;
use bytes::Bytes;
use protocol::{AllocationRequest, DeviceAllocation};

use crate::error::{parse_body, ProxyError};

const EPS: f64 = 1e-9;
const MAX_FILL_ROUNDS: usize = 100;

#[derive(Debug, Clone, Copy)]
struct DeviceClass {
    name: &'static str,
    /// Devices per resident.
    per_capita: f64,
    avg_watts: f64,
    availability: f64,
}

/// Traffic lights are counted directly rather than derived from population.
const TRAFFIC_LIGHT: &str = "traffic_light";

const CLASSES: [DeviceClass; 5] = [
    DeviceClass {
        name: "phone",
        per_capita: 1.0 / 100.0,
        avg_watts: 1.75,
        availability: 0.25,
    },
    DeviceClass {
        name: "laptop",
        per_capita: 0.68 / 100.0,
        avg_watts: 115.0,
        availability: 0.35,
    },
    DeviceClass {
        name: "desktop",
        per_capita: 0.37 / 100.0,
        avg_watts: 300.0,
        availability: 0.45,
    },
    DeviceClass {
        name: TRAFFIC_LIGHT,
        per_capita: 0.0,
        avg_watts: 17.5,
        availability: 0.9,
    },
    DeviceClass {
        name: "appliance",
        per_capita: 1.0 / 400.0,
        avg_watts: 7.5,
        availability: 0.7,
    },
];

pub async fn allocate_devices(body: Bytes) -> Result<Json<DeviceAllocation>, ProxyError> {
    let req: AllocationRequest = parse_body(&body)?;
    if !req.population.is_finite() || req.population < 0.0 {
        return Err(ProxyError::BadRequest(
            "population must be a non-negative number".to_string(),
        ));
    }
    if !req.wattage.is_finite() || req.wattage < 0.0 {
        return Err(ProxyError::BadRequest(
            "wattage must be a non-negative number".to_string(),
        ));
    }
    Ok(Json(allocate(&req)))
}

pub fn allocate(req: &AllocationRequest) -> DeviceAllocation {
    let counts: Vec<u64> = CLASSES
        .iter()
        .map(|c| {
            if c.name == TRAFFIC_LIGHT {
                u64::from(req.traffic_light_count)
            } else {
                (req.population.max(0.0) * c.per_capita).round() as u64
            }
        })
        .collect();
    let capacities: Vec<f64> = CLASSES
        .iter()
        .zip(&counts)
        .map(|(c, n)| *n as f64 * c.avg_watts / 1000.0)
        .collect();
    let scores: Vec<f64> = CLASSES.iter().map(|c| c.availability).collect();

    let needed_kw = req.wattage.max(0.0) / 1000.0;
    let alloc = water_fill(&scores, &capacities, needed_kw);
    let placed: f64 = alloc.iter().sum();

    let percent_offload = if needed_kw > 0.0 {
        round4((placed / needed_kw).min(1.0))
    } else {
        1.0
    };

    DeviceAllocation {
        counts_by_device_class: CLASSES
            .iter()
            .zip(&counts)
            .map(|(c, n)| (c.name.to_string(), *n))
            .collect::<BTreeMap<_, _>>(),
        offload_per_device_class_kw: CLASSES
            .iter()
            .zip(&alloc)
            .map(|(c, kw)| (c.name.to_string(), *kw))
            .collect::<BTreeMap<_, _>>(),
        max_offload_capacity_kw: capacities.iter().sum(),
        offload_needed_kw: needed_kw,
        percent_offload,
        raw_kw_offload: round4(placed),
    }
}

/// Spreads `demand` over slots in proportion to `scores`, never exceeding a
/// slot's capacity. Load that a saturated slot cannot take is redistributed
/// among the rest on the next round.
pub fn water_fill(scores: &[f64], capacities: &[f64], demand: f64) -> Vec<f64> {
    let mut alloc = vec![0.0; capacities.len()];
    let mut active: Vec<bool> = capacities.iter().map(|c| *c > 0.0).collect();
    let mut remaining = demand.max(0.0);

    for _ in 0..MAX_FILL_ROUNDS {
        if remaining <= EPS {
            break;
        }
        let weight: f64 = scores
            .iter()
            .zip(&active)
            .filter(|(_, a)| **a)
            .map(|(s, _)| s.max(0.0))
            .sum();
        if weight <= EPS {
            break;
        }

        let mut placed = 0.0;
        for i in 0..alloc.len() {
            if !active[i] {
                continue;
            }
            let room = capacities[i] - alloc[i];
            let delta = (scores[i].max(0.0) / weight * remaining).min(room);
            alloc[i] += delta;
            placed += delta;
            if room - delta <= EPS {
                active[i] = false;
            }
        }
        remaining -= placed;
    }
    alloc
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

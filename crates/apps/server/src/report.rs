//! Server-side impact report generation.
//!
//! The derived quantities are computed here and handed to the text
//! generator together with the resolved signals; its reply must parse into
//! an [`ImpactReport`].

use axum::extract::State;
use axum::Json;
use bytes::Bytes;
use protocol::report::parse_impact_report;
use protocol::{ImpactReport, ReportRequest};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{parse_body, ProxyError};
use crate::llm;
use crate::AppState;

/// US grid average, kg CO2 per kWh.
pub const GRID_CO2_KG_PER_KWH: f64 = 0.386;
/// Data-center cooling water, liters per kWh.
pub const COOLING_WATER_L_PER_KWH: f64 = 1.8;
pub const ELECTRICITY_USD_PER_KWH: f64 = 0.13;
/// CO2 one mature tree absorbs in a year.
pub const TREE_CO2_KG_PER_YEAR: f64 = 21.77;
/// Average passenger car tailpipe CO2 per mile.
pub const CAR_CO2_KG_PER_MILE: f64 = 0.404;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedImpact {
    pub daily_energy_kwh: f64,
    pub co2_avoided_kg_per_day: f64,
    /// Trees needed for a year to absorb one year of avoided CO2.
    pub tree_years: f64,
    pub car_miles_per_day: f64,
    pub cooling_water_l_per_day: f64,
    pub electricity_cost_usd_per_day: f64,
}

impl DerivedImpact {
    pub fn from_request(req: &ReportRequest) -> Self {
        let daily_energy_kwh = req.raw_kw_offload.max(0.0) * 24.0;
        let co2 = daily_energy_kwh * GRID_CO2_KG_PER_KWH;
        Self {
            daily_energy_kwh,
            co2_avoided_kg_per_day: co2,
            tree_years: co2 * 365.0 / TREE_CO2_KG_PER_YEAR,
            car_miles_per_day: co2 / CAR_CO2_KG_PER_MILE,
            cooling_water_l_per_day: daily_energy_kwh * COOLING_WATER_L_PER_KWH,
            electricity_cost_usd_per_day: daily_energy_kwh * ELECTRICITY_USD_PER_KWH,
        }
    }
}

pub fn render_prompt(req: &ReportRequest, d: &DerivedImpact) -> String {
    format!(
        "You are estimating the impact of offloading data-center compute onto idle consumer devices.\n\
         \n\
         Area: center ({lat:.6}, {lon:.6}), radius {radius} m\n\
         Population: {population:.0}\n\
         Signal-controlled intersections: {signals}\n\
         Weather: {temp:.1} C, {humidity:.0}% relative humidity, US AQI {aqi:.0}\n\
         Predicted fleet draw: {wattage:.1} W\n\
         Offload needed: {needed:.2} kW, capacity {capacity:.2} kW, placed {placed:.2} kW ({pct:.1}%)\n\
         \n\
         Derived daily figures:\n\
         - energy shifted: {kwh:.2} kWh\n\
         - CO2 avoided: {co2:.2} kg (grid {GRID_CO2_KG_PER_KWH} kg/kWh)\n\
         - equivalent to {trees:.1} trees for a year, or {miles:.1} passenger-car miles\n\
         - cooling water saved: {water:.1} L\n\
         - electricity cost shifted: ${cost:.2}\n\
         \n\
         Reply with only a JSON object of this exact shape, all values strings:\n\
         {{\"costSaving\": {{\"fuelSaved\": \"\", \"electricitySaved\": \"\", \"moneySaved\": \"\", \"roi\": \"\"}},\n\
          \"environmentalImpact\": {{\"co2Reduced\": \"\", \"waterSaved\": \"\", \"noisePollutionReduction\": \"\", \"recycling\": \"\"}},\n\
          \"aiInsights\": [five short, non-empty insight strings]}}",
        lat = req.center.latitude,
        lon = req.center.longitude,
        radius = req.radius_meters,
        population = req.population,
        signals = req.traffic_signal_count,
        temp = req.temperature_c,
        humidity = req.relative_humidity_pct,
        aqi = req.us_aqi,
        wattage = req.wattage,
        needed = req.offload_needed_kw,
        capacity = req.max_offload_capacity_kw,
        placed = req.raw_kw_offload,
        pct = req.percent_offload * 100.0,
        kwh = d.daily_energy_kwh,
        co2 = d.co2_avoided_kg_per_day,
        trees = d.tree_years,
        miles = d.car_miles_per_day,
        water = d.cooling_water_l_per_day,
        cost = d.electricity_cost_usd_per_day,
    )
}

pub async fn impact_report(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ImpactReport>, ProxyError> {
    let req: ReportRequest = parse_body(&body)?;
    let Some(gemini) = state.config.gemini.as_ref() else {
        return Err(ProxyError::Unavailable(
            "Report generation is not configured".to_string(),
        ));
    };

    let derived = DerivedImpact::from_request(&req);
    let prompt = render_prompt(&req, &derived);
    let text = llm::generate_text(&state.http, gemini, &prompt).await?;

    let report = parse_impact_report(&text).map_err(|e| {
        warn!(error = %e, "report generator reply rejected");
        ProxyError::InvalidReply(format!("Invalid impact report: {e}"))
    })?;
    info!(refresh = req.refresh, "impact report generated");
    Ok(Json(report))
}

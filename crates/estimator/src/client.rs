//! External collaborators behind one seam.
//!
//! The orchestrator only sees [`EstimateServices`]; [`HttpServices`] is the
//! reqwest implementation and tests substitute their own.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use foundation::{DeviceProfile, GeoPoint, SearchArea};
use protocol::allocation::parse_allocation;
use protocol::overpass::{count_distinct_signals, traffic_signals_query};
use protocol::population::parse_population_response;
use protocol::report::parse_impact_report;
use protocol::wattage::parse_wattage;
use protocol::weather::{AIR_QUALITY_CURRENT, FORECAST_CURRENT, parse_air_quality, parse_weather};
use protocol::{
    AllocationRequest, Conditions, DeviceAllocation, ImpactReport, PopulationQuery, ReportRequest,
    WattageRequest,
};
use serde_json::Value;

use crate::config::Endpoints;
use crate::error::FetchError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One method per external signal. Returned futures own everything they
/// need so they can run detached from the caller.
pub trait EstimateServices: Send + Sync {
    fn traffic_signals(&self, area: SearchArea) -> BoxFuture<'static, Result<u32, FetchError>>;

    fn population(&self, area: SearchArea) -> BoxFuture<'static, Result<f64, FetchError>>;

    /// Weather and air quality for one center; either failing fails both.
    fn conditions(&self, center: GeoPoint) -> BoxFuture<'static, Result<Conditions, FetchError>>;

    fn wattage(&self, profile: DeviceProfile) -> BoxFuture<'static, Result<f64, FetchError>>;

    fn allocation(
        &self,
        request: AllocationRequest,
    ) -> BoxFuture<'static, Result<DeviceAllocation, FetchError>>;

    fn impact_report(
        &self,
        request: ReportRequest,
    ) -> BoxFuture<'static, Result<ImpactReport, FetchError>>;
}

#[derive(Clone)]
pub struct HttpServices {
    http: reqwest::Client,
    endpoints: Arc<Endpoints>,
}

impl HttpServices {
    pub fn new(http: reqwest::Client, endpoints: Endpoints) -> Self {
        Self {
            http,
            endpoints: Arc::new(endpoints),
        }
    }
}

impl EstimateServices for HttpServices {
    fn traffic_signals(&self, area: SearchArea) -> BoxFuture<'static, Result<u32, FetchError>> {
        let request = self
            .http
            .post(&self.endpoints.overpass)
            .form(&[("data", traffic_signals_query(&area))]);
        Box::pin(async move {
            let body = checked_text(request.send().await?).await?;
            Ok(count_distinct_signals(&body)?)
        })
    }

    fn population(&self, area: SearchArea) -> BoxFuture<'static, Result<f64, FetchError>> {
        let request = self
            .http
            .post(&self.endpoints.population)
            .json(&PopulationQuery::for_area(&area));
        Box::pin(async move {
            let body = checked_text(request.send().await?).await?;
            Ok(parse_population_response(&body)?)
        })
    }

    fn conditions(&self, center: GeoPoint) -> BoxFuture<'static, Result<Conditions, FetchError>> {
        let at = [
            ("latitude", center.latitude.to_string()),
            ("longitude", center.longitude.to_string()),
        ];
        let forecast = self
            .http
            .get(&self.endpoints.forecast)
            .query(&at)
            .query(&[("current", FORECAST_CURRENT)]);
        let air = self
            .http
            .get(&self.endpoints.air_quality)
            .query(&at)
            .query(&[("current", AIR_QUALITY_CURRENT)]);
        Box::pin(async move {
            let (weather, air_quality) = tokio::try_join!(
                async {
                    let body = checked_text(forecast.send().await?).await?;
                    Ok::<_, FetchError>(parse_weather(&body)?)
                },
                async {
                    let body = checked_text(air.send().await?).await?;
                    Ok::<_, FetchError>(parse_air_quality(&body)?)
                },
            )?;
            Ok(Conditions {
                weather,
                air_quality,
            })
        })
    }

    fn wattage(&self, profile: DeviceProfile) -> BoxFuture<'static, Result<f64, FetchError>> {
        let request = self
            .http
            .post(&self.endpoints.wattage)
            .json(&WattageRequest::from(&profile));
        Box::pin(async move {
            let body = checked_text(request.send().await?).await?;
            Ok(parse_wattage(&body)?)
        })
    }

    fn allocation(
        &self,
        request: AllocationRequest,
    ) -> BoxFuture<'static, Result<DeviceAllocation, FetchError>> {
        let request = self.http.post(&self.endpoints.allocation).json(&request);
        Box::pin(async move {
            let body = checked_text(request.send().await?).await?;
            Ok(parse_allocation(&body)?)
        })
    }

    fn impact_report(
        &self,
        request: ReportRequest,
    ) -> BoxFuture<'static, Result<ImpactReport, FetchError>> {
        let request = self.http.post(&self.endpoints.report).json(&request);
        Box::pin(async move {
            let body = checked_text(request.send().await?).await?;
            Ok(parse_impact_report(&body)?)
        })
    }
}

/// Body of a 2xx response, or a [`FetchError::Status`] carrying the
/// server's `error` message when it sent one.
async fn checked_text(resp: reqwest::Response) -> Result<String, FetchError> {
    let status = resp.status();
    let body = resp.text().await?;
    if status.is_success() {
        return Ok(body);
    }
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            let snippet: String = body.chars().take(200).collect();
            if snippet.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                snippet
            }
        });
    Err(FetchError::Status {
        status: status.as_u16(),
        message,
    })
}

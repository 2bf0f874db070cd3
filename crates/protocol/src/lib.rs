//! Wire types shared by the estimator and the proxy server.
//!
//! Every external payload the estimator consumes is parsed strictly here: a
//! missing or non-numeric field is a [`ParseError`], never a silent default.

pub mod allocation;
pub mod error;
pub mod geojson;
pub mod overpass;
pub mod population;
pub mod report;
pub mod wattage;
pub mod weather;

pub use allocation::{AllocationRequest, DeviceAllocation};
pub use error::ParseError;
pub use population::{PopulationQuery, PopulationResponse};
pub use report::{ImpactReport, ReportRequest};
pub use wattage::WattageRequest;
pub use weather::{AirQuality, Conditions, WeatherReading};

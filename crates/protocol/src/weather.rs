//! Open-Meteo forecast and air-quality readings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ParseError, number_at};

pub const FORECAST_CURRENT: &str = "temperature_2m,relative_humidity_2m";
pub const AIR_QUALITY_CURRENT: &str = "us_aqi";

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub temperature_c: f64,
    pub relative_humidity_pct: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQuality {
    pub us_aqi: f64,
}

/// Weather and air quality for one center, fetched as a pair.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    pub weather: WeatherReading,
    pub air_quality: AirQuality,
}

pub fn parse_weather(body: &str) -> Result<WeatherReading, ParseError> {
    let v: Value = serde_json::from_str(body)?;
    Ok(WeatherReading {
        temperature_c: number_at(&v, "/current/temperature_2m", "current.temperature_2m")?,
        relative_humidity_pct: number_at(
            &v,
            "/current/relative_humidity_2m",
            "current.relative_humidity_2m",
        )?,
    })
}

pub fn parse_air_quality(body: &str) -> Result<AirQuality, ParseError> {
    let v: Value = serde_json::from_str(body)?;
    Ok(AirQuality {
        us_aqi: number_at(&v, "/current/us_aqi", "current.us_aqi")?,
    })
}

use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:9200";
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_AIR_QUALITY_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";
pub const DEFAULT_WATTAGE_URL: &str = "http://127.0.0.1:5000/predict";

/// Where each signal is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub overpass: String,
    pub population: String,
    pub forecast: String,
    pub air_quality: String,
    pub wattage: String,
    pub allocation: String,
    pub report: String,
}

impl Endpoints {
    /// Proxy-backed endpoints (population, allocation, report) on `server`,
    /// public defaults for the rest.
    pub fn with_server(server: &str) -> Self {
        let server = server.trim_end_matches('/');
        Self {
            overpass: DEFAULT_OVERPASS_URL.to_string(),
            population: format!("{server}/api/worldpop-population"),
            forecast: DEFAULT_FORECAST_URL.to_string(),
            air_quality: DEFAULT_AIR_QUALITY_URL.to_string(),
            wattage: DEFAULT_WATTAGE_URL.to_string(),
            allocation: format!("{server}/api/allocate"),
            report: format!("{server}/api/impact-report"),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::with_server(DEFAULT_SERVER_URL)
    }
}

/// Quiet periods before a changed input reaches its fetch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Delays {
    pub traffic: Duration,
    pub population: Duration,
    pub conditions: Duration,
    pub wattage: Duration,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            traffic: Duration::from_millis(300),
            population: Duration::from_millis(800),
            conditions: Duration::from_millis(800),
            wattage: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EstimatorConfig {
    pub endpoints: Endpoints,
    pub delays: Delays,
}

impl EstimatorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`; unset or unparsable values fall back
    /// to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let server = lookup("SUPA_SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        let mut endpoints = Endpoints::with_server(&server);
        let overrides = [
            ("OVERPASS_URL", &mut endpoints.overpass),
            ("OPEN_METEO_URL", &mut endpoints.forecast),
            ("AIR_QUALITY_URL", &mut endpoints.air_quality),
            ("WATTAGE_URL", &mut endpoints.wattage),
            ("ALLOCATION_URL", &mut endpoints.allocation),
            ("REPORT_URL", &mut endpoints.report),
        ];
        for (key, slot) in overrides {
            if let Some(url) = lookup(key) {
                *slot = url;
            }
        }

        let defaults = Delays::default();
        let delay = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };
        let delays = Delays {
            traffic: delay("SUPA_TRAFFIC_DELAY_MS", defaults.traffic),
            population: delay("SUPA_POPULATION_DELAY_MS", defaults.population),
            conditions: delay("SUPA_CONDITIONS_DELAY_MS", defaults.conditions),
            wattage: delay("SUPA_WATTAGE_DELAY_MS", defaults.wattage),
        };

        Self { endpoints, delays }
    }
}

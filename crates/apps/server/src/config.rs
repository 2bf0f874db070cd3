use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_ADDR: &str = "127.0.0.1:9200";
pub const DEFAULT_WORLDPOP_BASE_URL: &str = "https://api.worldpop.org/v1";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub worldpop: WorldPopConfig,
    /// `None` when no API key is configured; report generation then answers 503.
    pub gemini: Option<GeminiConfig>,
}

#[derive(Clone, Debug)]
pub struct WorldPopConfig {
    pub base_url: String,
    /// Sent as `key` when present. Never leaves the server otherwise.
    pub api_key: Option<String>,
    /// Limit for the initial stats request.
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    /// Limit for one task poll. A poll that runs out counts as an unfinished
    /// attempt.
    pub poll_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid SUPA_ADDR `{0}`")]
pub struct InvalidAddr(String);

impl ServerConfig {
    pub fn from_env() -> Result<Self, InvalidAddr> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, InvalidAddr> {
        let raw_addr = env_var_string(&lookup, "SUPA_ADDR", DEFAULT_ADDR);
        let addr = raw_addr.parse().map_err(|_| InvalidAddr(raw_addr.clone()))?;

        let worldpop = WorldPopConfig {
            base_url: env_var_string(&lookup, "WORLDPOP_BASE_URL", DEFAULT_WORLDPOP_BASE_URL),
            api_key: non_empty(lookup("WORLDPOP_API_KEY")),
            request_timeout: Duration::from_millis(env_var_u64(
                &lookup,
                "WORLDPOP_REQUEST_TIMEOUT_MS",
                30_000,
            )),
            poll_interval: Duration::from_millis(env_var_u64(
                &lookup,
                "WORLDPOP_POLL_INTERVAL_MS",
                1_000,
            )),
            poll_attempts: env_var_u32(&lookup, "WORLDPOP_POLL_ATTEMPTS", 12),
            poll_timeout: Duration::from_millis(env_var_u64(
                &lookup,
                "WORLDPOP_POLL_TIMEOUT_MS",
                5_000,
            )),
        };

        let gemini = non_empty(lookup("GEMINI_API_KEY")).map(|api_key| GeminiConfig {
            base_url: env_var_string(&lookup, "GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
            api_key,
            model: env_var_string(&lookup, "GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
        });

        Ok(Self {
            addr,
            worldpop,
            gemini,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn env_var_string(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    non_empty(lookup(key)).unwrap_or_else(|| default.to_string())
}

fn env_var_u32(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u32) -> u32 {
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

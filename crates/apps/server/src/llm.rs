//! Minimal client for a Gemini-style `generateContent` endpoint.

use std::time::Duration;

use serde_json::{json, Value};

use crate::config::GeminiConfig;
use crate::error::ProxyError;

const GENERATE_TIMEOUT: Duration = Duration::from_secs(60);

/// Sends `prompt` as a single user turn and returns the concatenated text
/// parts of the first candidate.
pub async fn generate_text(
    http: &reqwest::Client,
    config: &GeminiConfig,
    prompt: &str,
) -> Result<String, ProxyError> {
    let url = format!(
        "{}/v1beta/models/{}:generateContent",
        config.base_url.trim_end_matches('/'),
        config.model
    );
    let body = json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": { "temperature": 0.4 },
    });

    let resp = http
        .post(url)
        .header("x-goog-api-key", &config.api_key)
        .json(&body)
        .timeout(GENERATE_TIMEOUT)
        .send()
        .await
        .map_err(|e| transport_error(e, "Failed to reach report generator"))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(ProxyError::Upstream(format!(
            "Report generator returned HTTP {}",
            status.as_u16()
        )));
    }

    let text = resp
        .text()
        .await
        .map_err(|e| transport_error(e, "Failed to read report generator reply"))?;
    let reply: Value = serde_json::from_str(&text).map_err(|_| ProxyError::NonJson {
        upstream: "Report generator",
        raw_text: text.chars().take(500).collect(),
    })?;
    candidate_text(&reply)
        .ok_or_else(|| ProxyError::InvalidReply("Report generator returned no text".to_string()))
}

fn transport_error(e: reqwest::Error, context: &str) -> ProxyError {
    if e.is_timeout() {
        ProxyError::UpstreamTimeout(format!("{context}: timed out"))
    } else {
        ProxyError::Upstream(format!("{context}: {e}"))
    }
}

fn candidate_text(reply: &Value) -> Option<String> {
    let parts = reply.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

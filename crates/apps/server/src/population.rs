//! Poll-until-done proxy for the WorldPop statistics API.
//!
//! The stats endpoint either answers synchronously with a total or hands back
//! a task id. Task ids are polled at a fixed interval for a fixed number of
//! attempts; running out of attempts is a 504, distinct from an upstream
//! rejection (502).

use axum::extract::State;
use axum::Json;
use bytes::Bytes;
use protocol::{PopulationQuery, PopulationResponse};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::WorldPopConfig;
use crate::error::{parse_body, ProxyError};
use crate::AppState;

const RAW_TEXT_LIMIT: usize = 500;

/// Outcome of the initial stats request.
#[derive(Debug, Clone, PartialEq)]
pub enum StatsReply {
    Finished(f64),
    Pending { taskid: String },
    Failed(String),
}

/// Outcome of one task poll.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskReply {
    Finished(f64),
    Failed(String),
    Running,
}

pub async fn worldpop_population(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PopulationResponse>, ProxyError> {
    let query: PopulationQuery = parse_body(&body)?;
    let Some(geojson) = query.geojson.as_ref().filter(|g| g.is_object()) else {
        return Err(ProxyError::BadRequest("Missing geojson".to_string()));
    };

    let proxy = WorldPop {
        http: &state.http,
        config: &state.config.worldpop,
    };
    proxy.total_population(&query, geojson).await.map(Json)
}

struct WorldPop<'a> {
    http: &'a reqwest::Client,
    config: &'a WorldPopConfig,
}

impl WorldPop<'_> {
    async fn total_population(
        &self,
        query: &PopulationQuery,
        geojson: &Value,
    ) -> Result<PopulationResponse, ProxyError> {
        let base = self.config.base_url.trim_end_matches('/');
        let mut params = vec![
            ("dataset", query.dataset().to_string()),
            ("year", query.year().to_string()),
            ("geojson", geojson.to_string()),
            ("runasync", query.runasync().to_string()),
        ];
        if let Some(key) = &self.config.api_key {
            params.push(("key", key.clone()));
        }

        let request = self
            .http
            .get(format!("{base}/services/stats"))
            .query(&params)
            .timeout(self.config.request_timeout);
        let stats = fetch_json(request, "Failed to reach WorldPop").await?;

        let taskid = match classify_stats(&stats) {
            StatsReply::Finished(total) => return Ok(finished(total, stats)),
            StatsReply::Pending { taskid } => taskid,
            StatsReply::Failed(message) => {
                warn!(%message, "WorldPop stats request failed");
                return Err(ProxyError::Rejected { message, raw: stats });
            }
        };

        info!(%taskid, attempts = self.config.poll_attempts, "polling WorldPop task");
        let task_url = format!("{base}/tasks/{taskid}");
        for attempt in 1..=self.config.poll_attempts {
            tokio::time::sleep(self.config.poll_interval).await;

            let poll = self.http.get(&task_url).timeout(self.config.poll_timeout);
            let task = match fetch_json(poll, "Failed polling WorldPop task").await {
                Ok(task) => task,
                Err(ProxyError::UpstreamTimeout(_)) => {
                    warn!(%taskid, attempt, "WorldPop task poll timed out");
                    continue;
                }
                Err(e) => return Err(e),
            };
            match classify_task(&task) {
                TaskReply::Finished(total) => {
                    debug!(%taskid, attempt, "WorldPop task finished");
                    return Ok(finished(total, task));
                }
                TaskReply::Failed(message) => {
                    warn!(%taskid, %message, "WorldPop task failed");
                    return Err(ProxyError::Rejected { message, raw: task });
                }
                TaskReply::Running => {}
            }
        }

        warn!(%taskid, "WorldPop task did not finish in time");
        Err(ProxyError::TimedOut { taskid })
    }
}

fn finished(total_population: f64, raw: Value) -> PopulationResponse {
    PopulationResponse {
        total_population,
        raw,
    }
}

async fn fetch_json(request: reqwest::RequestBuilder, context: &str) -> Result<Value, ProxyError> {
    let upstream_error = |e: reqwest::Error| {
        if e.is_timeout() {
            ProxyError::UpstreamTimeout(format!("{context}: timed out"))
        } else {
            ProxyError::Upstream(format!("{context}: {e}"))
        }
    };
    let resp = request.send().await.map_err(upstream_error)?;
    let text = resp.text().await.map_err(upstream_error)?;
    serde_json::from_str(&text).map_err(|_| ProxyError::NonJson {
        upstream: "WorldPop",
        raw_text: text.chars().take(RAW_TEXT_LIMIT).collect(),
    })
}

/// Total from a `status: "finished"` reply, if it carries a numeric one.
fn finished_total(v: &Value) -> Option<f64> {
    if v.get("status").and_then(Value::as_str) != Some("finished") {
        return None;
    }
    v.pointer("/data/total_population").and_then(Value::as_f64)
}

pub fn classify_stats(v: &Value) -> StatsReply {
    if let Some(total) = finished_total(v) {
        return StatsReply::Finished(total);
    }
    match v.get("taskid") {
        Some(Value::String(id)) if !id.is_empty() => StatsReply::Pending { taskid: id.clone() },
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => StatsReply::Pending {
            taskid: n.to_string(),
        },
        _ => StatsReply::Failed(message_or(v, "WorldPop did not return taskid")),
    }
}

pub fn classify_task(v: &Value) -> TaskReply {
    if let Some(total) = finished_total(v) {
        return TaskReply::Finished(total);
    }
    let errored = v.get("status").and_then(Value::as_str) == Some("error")
        || v.get("error").is_some_and(is_truthy);
    if errored {
        return TaskReply::Failed(message_or(v, "WorldPop task error"));
    }
    TaskReply::Running
}

fn message_or(v: &Value, fallback: &str) -> String {
    ["error_message", "message"]
        .iter()
        .filter_map(|k| v.get(*k))
        .find(|m| is_truthy(m))
        .map(|m| match m {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| fallback.to_string())
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

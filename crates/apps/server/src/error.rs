use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Failures surfaced to proxy callers as `{ "error": ... }` JSON.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("{0}")]
    BadRequest(String),
    /// Transport failure or non-OK status from an upstream.
    #[error("{0}")]
    Upstream(String),
    #[error("{upstream} returned non-JSON response")]
    NonJson {
        upstream: &'static str,
        raw_text: String,
    },
    /// The upstream answered but refused or failed the work.
    #[error("{message}")]
    Rejected { message: String, raw: Value },
    /// An upstream request ran past its time limit.
    #[error("{0}")]
    UpstreamTimeout(String),
    #[error("Timed out waiting for WorldPop task to finish")]
    TimedOut { taskid: String },
    #[error("{0}")]
    InvalidReply(String),
    #[error("{0}")]
    Unavailable(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_)
            | Self::NonJson { .. }
            | Self::Rejected { .. }
            | Self::InvalidReply(_) => StatusCode::BAD_GATEWAY,
            Self::TimedOut { .. } | Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Decodes a JSON request body. Any failure, syntax or shape, is a 400 with
/// the usual error body.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProxyError> {
    serde_json::from_slice(body)
        .map_err(|_| ProxyError::BadRequest("Invalid JSON body".to_string()))
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.to_string();
        let body = match self {
            Self::NonJson { raw_text, .. } => json!({ "error": error, "raw_text": raw_text }),
            Self::Rejected { raw, .. } => json!({ "error": error, "raw": raw }),
            Self::TimedOut { taskid } => json!({ "error": error, "taskid": taskid }),
            _ => json!({ "error": error }),
        };
        (status, Json(body)).into_response()
    }
}

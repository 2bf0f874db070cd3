//! Supa Idle proxy server: population statistics, impact reports and the
//! reference device allocator, with every upstream credential kept
//! server-side.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod allocation;
pub mod config;
pub mod error;
pub mod llm;
pub mod population;
pub mod report;

pub use config::ServerConfig;
pub use error::ProxyError;

#[derive(Clone)]
pub struct AppState {
    pub http: reqwest::Client,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config: Arc::new(config),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/api/worldpop-population",
            post(population::worldpop_population),
        )
        .route("/api/impact-report", post(report::impact_report))
        .route("/api/allocate", post(allocation::allocate_devices))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}

use server::{create_router, AppState, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env()?;
    let addr = config.addr;
    if config.worldpop.api_key.is_none() {
        info!("WORLDPOP_API_KEY not set; using anonymous WorldPop quota");
    }
    if config.gemini.is_none() {
        warn!("GEMINI_API_KEY not set; /api/impact-report will answer 503");
    }

    let app = create_router(AppState::new(config));

    info!("supa server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

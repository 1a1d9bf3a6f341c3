mod auth;
mod clipboard;
mod config;
mod errors;
mod llm_client;
mod models;
mod routes;
mod state;
mod upload;
mod workflow;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::EntitlementGate;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::workflow::{SessionStore, WorkflowController};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on a missing token verification key)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the generation service client
    let llm = LlmClient::new(config.llm.clone())?;
    if config.llm.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; generation requests will fail until it is configured");
    }
    info!("LLM client initialized (model: {})", llm.model());

    // Initialize the entitlement gate
    let gate = EntitlementGate::new(&config.auth)?;
    info!(
        "Entitlement gate initialized (cookie: {}, feature: {})",
        config.auth.cookie_name, config.auth.feature_key
    );

    // Evict idle sessions in the background
    let sessions = SessionStore::new();
    let session_ttl = Duration::from_secs(config.session_ttl_secs.max(1));
    sessions.spawn_sweeper(session_ttl, session_ttl.min(Duration::from_secs(60)));
    info!("Session TTL: {}s", session_ttl.as_secs());

    // Build app state
    let state = AppState {
        sessions,
        workflow: WorkflowController::new(Arc::new(llm)),
        gate: Arc::new(gate),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the site that sets the session cookie

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, middleware, routing::get};
use dealflow_common::CreatePipelineRequest;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::api::{self, AppState, SharedState};
use super::auth::{self, TokenVerifier};
use super::db::{CrmDb, DbHandle};
use super::ws;

/// Configuration for the CRM server.
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
    pub api_tokens: Vec<String>,
    pub default_currency: String,
    /// Installed on first start; empty means the built-in default pipeline.
    pub seed_pipelines: Vec<CreatePipelineRequest>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3141,
            db_path: PathBuf::from(".dealflow/dealflow.db"),
            dev_mode: false,
            api_tokens: Vec::new(),
            default_currency: "RUB".to_string(),
            seed_pipelines: Vec::new(),
        }
    }
}

/// Build the full application router: `/api` and `/ws` behind the bearer
/// check, `/health` open.
pub fn build_router(state: SharedState, verifier: Arc<TokenVerifier>) -> Router {
    let ws_tx = state.ws_tx.clone();

    api::api_router()
        .route(
            "/ws",
            get(move |ws_upgrade| ws::ws_handler_with_sender(ws_upgrade, ws_tx)),
        )
        .route_layer(middleware::from_fn_with_state(verifier, auth::require_bearer))
        .route("/health", get(api::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the database, run migrations and seed an empty catalog.
pub fn open_database(config: &ServerConfig) -> Result<CrmDb> {
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
    }

    let db = CrmDb::new(&config.db_path).context("Failed to initialize CRM database")?;
    let seeded = db
        .seed_catalog(&config.seed_pipelines)
        .context("Failed to seed pipeline catalog")?;
    if seeded > 0 {
        tracing::info!(pipelines = seeded, "seeded empty pipeline catalog");
    }
    Ok(db)
}

/// Start the CRM server and run until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let db = open_database(&config)?;
    let (ws_tx, _rx) = broadcast::channel::<String>(256);

    let verifier = Arc::new(TokenVerifier::new(config.api_tokens.iter().cloned()));
    if !verifier.is_enabled() {
        tracing::warn!("no API tokens configured; authentication is disabled");
    }

    let state = Arc::new(AppState {
        db: DbHandle::new(db),
        ws_tx,
        default_currency: config.default_currency.clone(),
    });

    let mut app = build_router(state, verifier);

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, db = %config.db_path.display(), "dealflow listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

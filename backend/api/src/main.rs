//! WasteLoop API — entry point.
//!
//! Hosts the workflow engine behind a small Axum REST API serving the four
//! role surfaces (suppliers, collectors, composting centers, farmers), and
//! runs a background sweeper that keeps expired requests off the visible
//! board.

mod api;
mod config;
mod errors;
mod sweeper;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wasteloop_engine::WasteLoop;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    // Load config from environment.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // The engine is the single authoritative store; everything shares it.
    let engine = Arc::new(WasteLoop::with_policy(config.policy()));

    // ─── Background sweeper ───────────────────────────────
    tokio::spawn(sweeper::run(
        Arc::clone(&engine),
        config.sweep_interval_secs,
    ));

    // ─── REST API ─────────────────────────────────────────
    let state = Arc::new(api::ApiState { engine });

    let app = Router::new()
        .route("/health", get(api::health))
        .route("/actors", post(api::register_actor))
        .route("/actors/:id", get(api::get_actor))
        .route("/actors/:id/balance", get(api::balance))
        .route("/actors/:id/ledger", get(api::ledger_entries))
        .route("/actors/:id/history", get(api::history))
        .route("/actors/:id/redeem", post(api::redeem))
        .route("/waste", post(api::declare))
        .route("/waste/:id/collected", post(api::mark_collected))
        .route("/suppliers/:id/waste", get(api::list_own_waste))
        .route(
            "/requests",
            get(api::list_open).post(api::create_center_request),
        )
        .route("/requests/:id", get(api::get_request))
        .route("/requests/:id/claim", post(api::claim))
        .route("/requests/:id/accept", post(api::accept))
        .route("/requests/:id/reject", post(api::reject))
        .route("/requests/:id/complete", post(api::complete))
        .route("/requests/:id/events", get(api::request_events))
        .route("/collectors/:id/assignments", get(api::assignments))
        .route("/batches", get(api::batches).post(api::list_batch))
        .route("/produce", get(api::produce).post(api::list_produce))
        .route("/purchases/batch", post(api::purchase_batch))
        .route("/purchases/produce", post(api::purchase_produce))
        .route("/events", get(api::all_events))
        .route("/sweep", post(api::sweep))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! HTTP surface
//!
//! `POST /webhook` takes stream deliveries, `GET /health` and `GET /stats`
//! are for operators.

use crate::chain::{EvmChain, SavingsChain};
use crate::config::RelayConfig;
use crate::dispatch::{DispatchLedger, SavingsPipeline, StatsView};
use crate::webhook::{signature, StreamEvent, SIGNATURE_HEADER};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<SavingsPipeline>,
    secret: Arc<str>,
}

impl AppState {
    pub fn new(pipeline: Arc<SavingsPipeline>, secret: &str) -> Self {
        Self {
            pipeline,
            secret: Arc::from(secret),
        }
    }
}

fn json_error(code: StatusCode, message: impl ToString) -> Response {
    (code, Json(json!({ "error": message.to_string() }))).into_response()
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let header = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if let Err(e) = signature::verify(&body, &state.secret, header) {
        warn!("Rejected webhook: {}", e);
        let code = if e.is_auth() {
            StatusCode::UNAUTHORIZED
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        return json_error(code, e);
    }

    let event = match StreamEvent::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("Unparseable webhook: {}", e);
            return json_error(StatusCode::BAD_REQUEST, e);
        }
    };

    if event.is_test_event() {
        info!("Stream setup ping acknowledged (stream {:?})", event.stream_id);
        state.pipeline.record_test_event();
        return (StatusCode::OK, Json(json!({ "status": "ok", "test": true }))).into_response();
    }

    let report = state.pipeline.handle_event(&event).await;
    (StatusCode::OK, Json(report)).into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn stats(State(state): State<AppState>) -> Response {
    Json(StatsView::from(state.pipeline.stats().snapshot())).into_response()
}

/// Wire up chain, ledger and router, then serve until Ctrl-C
pub async fn serve(config: RelayConfig) -> Result<()> {
    let chain = EvmChain::connect(&config.rpc_url, &config.relayer_key, config.savings_contract)
        .context("Failed to set up chain client")?;

    match chain.chain_id().await {
        Ok(id) if id != config.chain_id => {
            anyhow::bail!("RPC reports chain {} but config expects {}", id, config.chain_id)
        }
        Ok(_) => {}
        Err(e) => warn!("Could not confirm chain id from RPC: {}", e),
    }

    let ledger = match &config.ledger_path {
        Some(path) => DispatchLedger::open(path)
            .with_context(|| format!("Failed to open dispatch ledger {path}"))?,
        None => DispatchLedger::in_memory(),
    };

    let chain: Arc<dyn SavingsChain> = Arc::new(chain);
    let pipeline = Arc::new(SavingsPipeline::new(
        chain,
        Arc::new(ledger),
        config.pipeline_settings(),
    ));
    let app = router(AppState::new(pipeline, &config.webhook_secret), config.body_limit_bytes);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("Listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")
}

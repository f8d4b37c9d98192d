// Copyright 2026 Gemini Relay Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP surface of the relay.
//!
//! Two routes: `/` describes the service, `/api/ask` relays one prompt.
//! Everything else is a JSON 404. Failures never escape a handler; they are
//! rendered as `{success:false, error}` bodies.

use crate::config::ServerConfig;
use crate::error::RelayError;
use crate::relay::{Relay, RelayReply, ReplyMetadata};
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Routes advertised in the 404 body.
pub const AVAILABLE_ENDPOINTS: &[&str] = &["/", "/api/ask"];

/// Shared, read-only state for all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub relay: Relay,
}

impl AppState {
    pub fn new(relay: Relay) -> Self {
        Self { relay }
    }
}

/// Body of every `/api/ask` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AskResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ReplyMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl AskResult {
    pub fn success(reply: RelayReply, prompt: String) -> Self {
        Self {
            success: true,
            response: Some(reply.body),
            metadata: Some(reply.metadata),
            error: None,
            prompt: Some(prompt),
        }
    }

    pub fn failure(err: &RelayError, prompt: Option<String>) -> Self {
        Self {
            success: false,
            response: None,
            metadata: None,
            error: Some(err.to_string()),
            prompt,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(AskResult::failure(&self, None))).into_response()
    }
}

/// Build the axum Router with all endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(home))
        .route("/api/ask", get(ask))
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(internal_error))
        .layer(cors)
        .with_state(state)
}

/// Bind `config` and serve until Ctrl-C.
pub async fn serve(config: &ServerConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let addr = config.bind_address();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("relay listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

// ── Handlers ────────────────────────────────────────────────────

async fn home() -> Json<Value> {
    Json(serde_json::json!({
        "success": true,
        "message": "Gemini AI API is running!",
        "endpoints": {
            "/api/ask": {
                "method": "GET",
                "parameters": {
                    "prompt": "Your question or message (required)"
                }
            }
        }
    }))
}

/// First `prompt` value in the query string; later duplicates are ignored.
fn first_prompt(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "prompt")
        .map(|(_, value)| value.into_owned())
}

/// Blank means only whitespace, counting the ASCII separators `\x1c`..`\x1f`.
fn is_blank(prompt: &str) -> bool {
    prompt
        .chars()
        .all(|c| c.is_whitespace() || ('\x1c'..='\x1f').contains(&c))
}

async fn ask(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> Response {
    let Some(prompt) = first_prompt(query.as_deref()).filter(|p| !is_blank(p)) else {
        return RelayError::InvalidRequest("Missing or empty prompt".to_string()).into_response();
    };

    info!(prompt_chars = prompt.chars().count(), "relaying prompt");
    match state.relay.ask(&prompt).await {
        Ok(reply) => (StatusCode::OK, Json(AskResult::success(reply, prompt))).into_response(),
        Err(e) => {
            warn!(error = %e, "relay failed");
            (e.status_code(), Json(AskResult::failure(&e, Some(prompt)))).into_response()
        }
    }
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "success": false,
            "error": "Endpoint not found",
            "available_endpoints": AVAILABLE_ENDPOINTS,
        })),
    )
}

fn internal_error(_panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "success": false,
            "error": "Internal server error",
        })),
    )
        .into_response()
}

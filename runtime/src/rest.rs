// Copyright 2026 Dashtap Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP REST API for Dashtap.
//!
//! `GET /api/v1/extract` runs one extraction and returns the report as JSON.
//! Runs share one browser and are serialized: a request arriving while a
//! run is in progress waits for it to finish.

use crate::engine::Extractor;
use crate::renderer::Renderer;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use dashtap::{ExtractionConfig, HarvestError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

/// State shared by every handler.
pub struct AppState {
    pub config: Arc<ExtractionConfig>,
    pub renderer: Arc<dyn Renderer>,
    run_lock: Mutex<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(config: Arc<ExtractionConfig>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            config,
            renderer,
            run_lock: Mutex::new(()),
            started_at: Instant::now(),
        }
    }
}

/// Build the axum Router with all REST endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/extract", get(handle_extract))
        .layer(cors)
        .with_state(state)
}

/// Start the REST API server on the given port.
pub async fn start(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("REST API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_s": state.started_at.elapsed().as_secs(),
        "active_contexts": state.renderer.active_contexts(),
        "sections": state.config.sections.len(),
    }))
}

async fn handle_extract(State(state): State<Arc<AppState>>) -> Response {
    let _guard = state.run_lock.lock().await;
    let extractor = Extractor::new(Arc::clone(&state.config), Arc::clone(&state.renderer));

    match extractor.run().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            tracing::error!("extraction failed: {e}");
            let (status, code) = match &e {
                HarvestError::BrowserFatal(_) => (StatusCode::SERVICE_UNAVAILABLE, "E_BROWSER"),
                HarvestError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "E_CONFIG"),
            };
            let body = serde_json::json!({
                "error": { "code": code, "message": e.to_string() }
            });
            (status, Json(body)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::NoopRenderer;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(
            Arc::new(ExtractionConfig::default()),
            Arc::new(NoopRenderer),
        ))
    }

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let response = router(state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sections"], 6);
        assert_eq!(body["active_contexts"], 0);
    }

    #[tokio::test]
    async fn test_extract_without_browser_is_unavailable() {
        let (status, body) = get_json("/api/v1/extract").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "E_BROWSER");
    }
}

//! Thin HTTP transport adapter.
//!
//! The transport is intentionally thin: this module does nothing but
//! unmarshal a request body into a [`crate::dispatcher::CommandRequest`] and
//! hand it to the engine. No cache logic lives here.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::cache::CacheResponse;
use crate::dispatcher::CommandRequest;
use crate::engine::Engine;

/// Build the router. Every command, read or write, goes through the single
/// `POST /cache` endpoint — the verb lives in the request body, so the
/// command surface stays transport-agnostic.
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/cache", post(handle_command))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

async fn handle_command(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<CommandRequest>,
) -> impl IntoResponse {
    let response = match request.verb.as_str() {
        "getAppMetrics" => match engine.read_app_metrics() {
            Ok(samples) => metrics_response(samples),
            Err(err) => return metrics_error_response(err),
        },
        "getSysMetrics" => match engine.read_sys_metrics() {
            Ok(samples) => metrics_response(samples),
            Err(err) => return metrics_error_response(err),
        },
        _ => engine.handle(request),
    };
    (StatusCode::OK, Json(response)).into_response()
}

fn metrics_response(samples: Vec<serde_json::Value>) -> CacheResponse {
    CacheResponse {
        gobj: crate::cache::CacheObject {
            key: None,
            value: Some(serde_json::to_string(&samples).unwrap_or_default()),
            ttl: None,
        },
        status: 1,
        message: crate::cache::OK.to_string(),
        error: String::new(),
    }
}

fn metrics_error_response(err: crate::error::EngineError) -> axum::response::Response {
    tracing::error!(error = %err, "failed to read metrics log");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
}

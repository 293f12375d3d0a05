//! System endpoints: health check and OpenAPI document.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::app_state::AppState;
use crate::error::RelayError;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"healthy"` when the hub answers.
    pub status: String,
    /// RFC 3339 timestamp of the check.
    pub timestamp: String,
    /// Crate version.
    pub version: String,
    /// Number of registered sessions.
    pub sessions: usize,
    /// Number of sessions that have sent a position.
    pub positions: usize,
}

/// OpenAPI document for the HTTP endpoints.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "pointer-relay", description = "Real-time pointer position relay"),
    paths(health_handler),
    components(schemas(HealthResponse)),
    tags((name = "System", description = "Service status"))
)]
pub struct ApiDoc;

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health, version, and the hub's session and position counts.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Hub is not running"),
    )
)]
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, RelayError> {
    let stats = state.hub.stats().await?;
    Ok((
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            sessions: stats.sessions,
            positions: stats.positions,
        }),
    ))
}

/// `GET /api-docs/openapi.json` — Generated OpenAPI document.
pub async fn openapi_handler() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api-docs/openapi.json", get(openapi_handler))
}

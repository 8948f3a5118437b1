//! HTTP endpoints: `POST /update` and `GET /health`.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, error, info_span, warn};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::pipeline::UpdateProcessor;
use crate::pipeline::types::UpdateRequest;

/// Service name reported by the health check.
pub const SERVICE_NAME: &str = "Dot Update";

/// Paths served by this router.
pub const ENDPOINTS: [&str; 2] = ["/update", "/health"];

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<UpdateProcessor>,
}

/// Build the Axum router.
pub fn update_routes(processor: Arc<UpdateProcessor>) -> Router {
    Router::new()
        .route("/update", post(update))
        .route("/health", get(health))
        .with_state(AppState { processor })
        .layer(TraceLayer::new_for_http())
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ENDPOINTS,
    }))
}

// ── Update ──────────────────────────────────────────────────────────────

async fn update(
    State(state): State<AppState>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> Response {
    let request_id = Uuid::new_v4();

    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(%request_id, error = %rejection, "Rejected update body");
            return PipelineError::InvalidBody(rejection.body_text()).into_response();
        }
    };

    let span = info_span!(
        "update",
        %request_id,
        job_number = request.job_number.as_deref().unwrap_or_default(),
    );

    match state.processor.process(request).instrument(span).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            match &e {
                PipelineError::ModelOutput { .. } | PipelineError::Internal(_) => {
                    error!(%request_id, error = %e, "Update failed");
                }
                _ => warn!(%request_id, error = %e, "Update rejected"),
            }
            e.into_response()
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            PipelineError::MissingField { field, .. } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "code": "missing_field", "field": field }),
            ),
            PipelineError::InvalidBody(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid request body", "code": "invalid_body", "details": details }),
            ),
            PipelineError::JobNotFound { job_number } => (
                StatusCode::NOT_FOUND,
                json!({ "error": "Job not found", "code": "job_not_found", "jobNumber": job_number }),
            ),
            PipelineError::ModelOutput { reason, raw } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Model returned invalid JSON",
                    "code": "invalid_model_output",
                    "details": reason,
                    "raw_response": raw,
                }),
            ),
            PipelineError::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error", "code": "internal_error", "details": details }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

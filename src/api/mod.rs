//! HTTP surface.
//!
//! | Route          | Method | Response                          |
//! |----------------|--------|-----------------------------------|
//! | `/`            | GET    | HTML form                         |
//! | `/predict`     | POST   | `{"prediction": "<label>"}`       |
//! | `/health`      | GET    | [`HealthResponse`] (200 or 503)   |

pub mod error;

pub use error::ApiError;

use crate::health::{self, HealthResponse};
use crate::service::PredictionService;
use crate::types::FeatureRecord;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info_span, Span};
use uuid::Uuid;

const INDEX_HTML: &str = include_str!("../../templates/index.html");

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: Arc<PredictionService>) -> Self {
        Self {
            service,
            started_at: Instant::now(),
        }
    }
}

/// Body of a successful prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: String,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("predict", request_id = %request_id);

    let Json(body) = payload.map_err(|rejection| {
        debug!(parent: &span, reason = %rejection.body_text(), "Rejected request body");
        ApiError::from(rejection)
    })?;
    let record = FeatureRecord::from_json(&body).map_err(|fields| {
        debug!(parent: &span, fields = fields.len(), "Request failed validation");
        ApiError::Validation(fields)
    })?;

    let service = Arc::clone(&state.service);
    let result = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        service.predict(&record)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("prediction task failed: {}", e)))??;

    Ok(Json(PredictResponse {
        prediction: result.label,
    }))
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let service = Arc::clone(&state.service);
    let started_at = state.started_at;
    let parent = Span::current();

    let response = match tokio::task::spawn_blocking(move || {
        let _entered = parent.enter();
        health::check(&service, started_at)
    })
    .await
    {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "Health check task failed");
            let mut response = HealthResponse::new(crate::VERSION, started_at);
            response.add_component(health::ComponentHealth::unhealthy(
                "storage",
                "health check failed",
            ));
            response
        }
    };

    let status = StatusCode::from_u16(response.status.to_status_code())
        .unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
    (status, Json(response))
}

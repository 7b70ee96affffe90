//! HTTP error envelopes.

use crate::error::TriageError;
use crate::types::FieldError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

/// Public detail for records the model refuses to score.
const UNSCORABLE_DETAIL: &str = "input could not be scored, check categorical fields";

/// Failure of one API request, rendered as a JSON body.
#[derive(Debug)]
pub enum ApiError {
    /// 422 with one entry per offending field.
    Validation(Vec<FieldError>),
    /// 400, body is not JSON.
    BadRequest(String),
    /// 415, body is not declared as JSON.
    UnsupportedMediaType(String),
    /// 422, the model cannot score the transformed record.
    Unscorable(String),
    /// 500, the prediction was computed but not recorded.
    NotRecorded,
    /// 500, details stay in the logs.
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Unscorable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::NotRecorded | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TriageError> for ApiError {
    fn from(err: TriageError) -> Self {
        match err {
            TriageError::Validation(fields) => ApiError::Validation(fields),
            TriageError::UnknownCategory { column, value } => ApiError::Validation(vec![
                FieldError::new(column, format!("Unknown category '{}'", value)),
            ]),
            TriageError::Scoring(reason) => ApiError::Unscorable(reason),
            TriageError::PersistenceWrite { stream, reason } => {
                error!(stream = %stream, reason = %reason, "Prediction not recorded");
                ApiError::NotRecorded
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let detail = rejection.body_text();
        if rejection.status() == StatusCode::UNSUPPORTED_MEDIA_TYPE {
            ApiError::UnsupportedMediaType(detail)
        } else {
            ApiError::BadRequest(detail)
        }
    }
}

fn body_detail(message: &str) -> serde_json::Value {
    json!([{ "field": "body", "message": message }])
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(fields) => json!({
                "error": "validation_error",
                "detail": fields,
            }),
            ApiError::BadRequest(message) | ApiError::UnsupportedMediaType(message) => json!({
                "error": "validation_error",
                "detail": body_detail(&message),
            }),
            ApiError::Unscorable(reason) => {
                warn!(reason = %reason, "Input could not be scored");
                json!({
                    "error": "unscorable_input",
                    "detail": UNSCORABLE_DETAIL,
                })
            }
            ApiError::NotRecorded => json!({
                "error": "prediction_not_recorded",
                "detail": "prediction succeeded but was not recorded",
            }),
            ApiError::Internal(reason) => {
                error!(reason = %reason, "Request failed");
                json!({ "error": "internal_error" })
            }
        };

        (status, Json(body)).into_response()
    }
}

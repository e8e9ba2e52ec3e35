//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body has the shape
//! `{"error": {"code": "<CODE>", "message": "<text>"}}`; validation failures
//! add a `fields` list.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use pr_reviewer_core::{Error as CoreError, ErrorKind};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::validate::FieldError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("invalid request body: {0}")]
  InvalidBody(String),

  #[error("invalid query: {0}")]
  InvalidQuery(String),

  #[error("validation failed")]
  Validation(Vec<FieldError>),

  #[error(transparent)]
  Service(#[from] CoreError),
}

impl ApiError {
  fn status_and_code(&self) -> (StatusCode, &'static str) {
    match self {
      Self::InvalidBody(_) | Self::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
      Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
      Self::Service(e) => match e.kind() {
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ErrorKind::AlreadyExists => match e {
          CoreError::TeamAlreadyExists(_) => (StatusCode::CONFLICT, "TEAM_EXISTS"),
          _ => (StatusCode::CONFLICT, "PR_EXISTS"),
        },
        ErrorKind::PrMerged => (StatusCode::CONFLICT, "PR_MERGED"),
        ErrorKind::ReviewerNotAssigned => (StatusCode::CONFLICT, "NOT_ASSIGNED"),
        ErrorKind::NoCandidate => (StatusCode::CONFLICT, "NO_CANDIDATE"),
        ErrorKind::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED"),
        ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code) = self.status_and_code();

    let body = match &self {
      Self::Validation(fields) => {
        let message = fields.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        json!({ "error": { "code": code, "message": message, "fields": fields } })
      }
      Self::Service(e) if status.is_server_error() => {
        if status == StatusCode::INTERNAL_SERVER_ERROR {
          error!(error = %e, "request failed");
        } else {
          warn!(error = %e, "request cancelled");
        }
        let message = match e.kind() {
          ErrorKind::Cancelled => "operation cancelled",
          _ => "internal server error",
        };
        json!({ "error": { "code": code, "message": message } })
      }
      other => json!({ "error": { "code": code, "message": other.to_string() } }),
    };

    (status, Json(body)).into_response()
  }
}

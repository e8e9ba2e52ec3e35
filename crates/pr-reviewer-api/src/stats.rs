//! Reporting and liveness handlers.

use std::sync::Arc;

use axum::{Json, extract::State};
use pr_reviewer_core::{ReviewService, pull_request::ReviewerStats, store::Transactor};
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
  pub user_stats: Vec<ReviewerStats>,
}

/// `GET /stats`: open and merged review counts for every user.
pub async fn stats<D: Transactor>(
  State(service): State<Arc<ReviewService<D>>>,
) -> Result<Json<StatsResponse>, ApiError> {
  let user_stats = service.stats().await?;
  Ok(Json(StatsResponse { user_stats }))
}

/// `GET /health`
pub async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

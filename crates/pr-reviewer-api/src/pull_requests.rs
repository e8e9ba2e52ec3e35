//! Handlers for `/pullRequest/*` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/pullRequest/create` | 201; assigns up to two reviewers |
//! | `POST` | `/pullRequest/merge` | Idempotent |
//! | `POST` | `/pullRequest/reassign` | 409 when merged, not assigned, or no candidate |
//! | `GET`  | `/pullRequest/get` | `?pull_request_id=` |

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use pr_reviewer_core::{
  ReviewService,
  pull_request::{PullRequest, Reassignment},
  store::Transactor,
};
use serde::Serialize;

use crate::{
  error::ApiError,
  requests::{CreatePullRequest, PullRequestId, Reassign, ValidJson, ValidQuery},
};

#[derive(Debug, Serialize)]
pub struct PullRequestResponse {
  pub pr: PullRequest,
}

/// `POST /pullRequest/create`
pub async fn create<D: Transactor>(
  State(service): State<Arc<ReviewService<D>>>,
  ValidJson(body): ValidJson<CreatePullRequest>,
) -> Result<impl IntoResponse, ApiError> {
  let pr = service.create_pull_request(body.into()).await?;
  Ok((StatusCode::CREATED, Json(PullRequestResponse { pr })))
}

/// `POST /pullRequest/merge`
pub async fn merge<D: Transactor>(
  State(service): State<Arc<ReviewService<D>>>,
  ValidJson(body): ValidJson<PullRequestId>,
) -> Result<Json<PullRequestResponse>, ApiError> {
  let pr = service.merge_pull_request(&body.pull_request_id).await?;
  Ok(Json(PullRequestResponse { pr }))
}

/// `POST /pullRequest/reassign`
pub async fn reassign<D: Transactor>(
  State(service): State<Arc<ReviewService<D>>>,
  ValidJson(body): ValidJson<Reassign>,
) -> Result<Json<Reassignment>, ApiError> {
  let result = service
    .reassign_reviewer(&body.pull_request_id, &body.old_user_id)
    .await?;
  Ok(Json(result))
}

/// `GET /pullRequest/get?pull_request_id=<id>`
pub async fn get<D: Transactor>(
  State(service): State<Arc<ReviewService<D>>>,
  ValidQuery(query): ValidQuery<PullRequestId>,
) -> Result<Json<PullRequestResponse>, ApiError> {
  let pr = service.pull_request(&query.pull_request_id).await?;
  Ok(Json(PullRequestResponse { pr }))
}

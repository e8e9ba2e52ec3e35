//! Handlers for `/users/*` endpoints.

use std::sync::Arc;

use axum::{Json, extract::State};
use pr_reviewer_core::{
  ReviewService,
  pull_request::ReviewAssignments,
  store::Transactor,
  team::UserWithTeam,
};
use serde::Serialize;

use crate::{
  error::ApiError,
  requests::{SetIsActive, UserId, ValidJson, ValidQuery},
};

#[derive(Debug, Serialize)]
pub struct UserResponse {
  pub user: UserWithTeam,
}

/// `POST /users/setIsActive`
pub async fn set_is_active<D: Transactor>(
  State(service): State<Arc<ReviewService<D>>>,
  ValidJson(body): ValidJson<SetIsActive>,
) -> Result<Json<UserResponse>, ApiError> {
  let user = service.set_user_active(&body.user_id, body.is_active).await?;
  Ok(Json(UserResponse { user }))
}

/// `GET /users/getReview?user_id=<id>`: pull requests the user reviews,
/// newest first. Unknown users get an empty list.
pub async fn get_review<D: Transactor>(
  State(service): State<Arc<ReviewService<D>>>,
  ValidQuery(query): ValidQuery<UserId>,
) -> Result<Json<ReviewAssignments>, ApiError> {
  Ok(Json(service.review_assignments(&query.user_id).await?))
}

//! Handlers for `/team/*` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/team/add` | Body: `{"team_name", "members": [...]}`; 409 if the name is taken |
//! | `GET`  | `/team/get` | `?team_name=`; 404 if not found |
//! | `POST` | `/team/deactivate` | Body: `{"team_name"}`; cascades reviewer replacement |

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use pr_reviewer_core::{
  ReviewService,
  cascade::DeactivationReport,
  store::Transactor,
  team::{TeamMember, TeamWithMembers},
};
use serde::Serialize;

use crate::{
  error::ApiError,
  requests::{CreateTeam, TeamName, ValidJson, ValidQuery},
};

#[derive(Debug, Serialize)]
pub struct TeamView {
  pub team_name: String,
  pub members:   Vec<TeamMember>,
}

#[derive(Debug, Serialize)]
pub struct TeamResponse {
  pub team: TeamView,
}

impl From<TeamWithMembers> for TeamResponse {
  fn from(team: TeamWithMembers) -> Self {
    Self { team: TeamView { team_name: team.name, members: team.members } }
  }
}

// ─── Add ─────────────────────────────────────────────────────────────────────

/// `POST /team/add`
pub async fn add<D: Transactor>(
  State(service): State<Arc<ReviewService<D>>>,
  ValidJson(body): ValidJson<CreateTeam>,
) -> Result<impl IntoResponse, ApiError> {
  let team = service.create_team(body.into()).await?;
  Ok((StatusCode::CREATED, Json(TeamResponse::from(team))))
}

// ─── Get ─────────────────────────────────────────────────────────────────────

/// `GET /team/get?team_name=<name>`
pub async fn get<D: Transactor>(
  State(service): State<Arc<ReviewService<D>>>,
  ValidQuery(query): ValidQuery<TeamName>,
) -> Result<Json<TeamResponse>, ApiError> {
  let team = service.team(&query.team_name).await?;
  Ok(Json(team.into()))
}

// ─── Deactivate ──────────────────────────────────────────────────────────────

/// `POST /team/deactivate`
pub async fn deactivate<D: Transactor>(
  State(service): State<Arc<ReviewService<D>>>,
  ValidJson(body): ValidJson<TeamName>,
) -> Result<Json<DeactivationReport>, ApiError> {
  let report = service.deactivate_team(&body.team_name).await?;
  Ok(Json(report))
}

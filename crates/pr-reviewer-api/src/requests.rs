//! Request bodies, query parameters, and the validating extractors that
//! produce them.

use std::collections::HashSet;

use axum::{
  Json,
  extract::{FromRequest, FromRequestParts, Query, Request},
  http::request::Parts,
};
use pr_reviewer_core::{
  pull_request::NewPullRequest,
  team::{NewTeam, TeamMember},
};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
  error::ApiError,
  validate::{Checks, FieldError, FieldErrorKind, Validate},
};

const TEAM_NAME: (usize, usize) = (3, 50);
const USERNAME: (usize, usize) = (2, 100);
const PULL_REQUEST_NAME: (usize, usize) = (5, 255);

// ─── Extractors ──────────────────────────────────────────────────────────────

/// A JSON body that parsed and passed [`Validate`].
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
  S: Send + Sync,
  T: DeserializeOwned + Validate,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    let Json(body) = Json::<T>::from_request(req, state)
      .await
      .map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    reject_invalid(&body)?;
    Ok(Self(body))
  }
}

/// Query parameters that parsed and passed [`Validate`].
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
  S: Send + Sync,
  T: DeserializeOwned + Validate,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
    let Query(params) = Query::<T>::from_request_parts(parts, state)
      .await
      .map_err(|e| ApiError::InvalidQuery(e.body_text()))?;
    reject_invalid(&params)?;
    Ok(Self(params))
  }
}

fn reject_invalid<T: Validate>(value: &T) -> Result<(), ApiError> {
  let errors = value.validate();
  if errors.is_empty() { Ok(()) } else { Err(ApiError::Validation(errors)) }
}

// ─── Teams ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateTeam {
  pub team_name: String,
  #[serde(default)]
  pub members:   Vec<Member>,
}

#[derive(Debug, Deserialize)]
pub struct Member {
  pub user_id:   String,
  pub username:  String,
  pub is_active: bool,
}

impl Validate for CreateTeam {
  fn validate(&self) -> Vec<FieldError> {
    let mut checks = Checks::new();
    checks.text("team_name", &self.team_name, TEAM_NAME.0, TEAM_NAME.1);

    let mut seen = HashSet::new();
    for (i, m) in self.members.iter().enumerate() {
      checks.id(format!("members[{i}].user_id"), &m.user_id);
      checks.text(format!("members[{i}].username"), &m.username, USERNAME.0, USERNAME.1);
      if !seen.insert(m.user_id.as_str()) {
        checks.push(format!("members[{i}].user_id"), FieldErrorKind::Duplicate);
      }
    }
    checks.finish()
  }
}

impl From<CreateTeam> for NewTeam {
  fn from(body: CreateTeam) -> Self {
    Self {
      name:    body.team_name,
      members: body
        .members
        .into_iter()
        .map(|m| TeamMember { user_id: m.user_id, username: m.username, is_active: m.is_active })
        .collect(),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct TeamName {
  pub team_name: String,
}

impl Validate for TeamName {
  fn validate(&self) -> Vec<FieldError> {
    let mut checks = Checks::new();
    checks.text("team_name", &self.team_name, TEAM_NAME.0, TEAM_NAME.1);
    checks.finish()
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SetIsActive {
  pub user_id:   String,
  pub is_active: bool,
}

impl Validate for SetIsActive {
  fn validate(&self) -> Vec<FieldError> {
    let mut checks = Checks::new();
    checks.id("user_id", &self.user_id);
    checks.finish()
  }
}

#[derive(Debug, Deserialize)]
pub struct UserId {
  pub user_id: String,
}

impl Validate for UserId {
  fn validate(&self) -> Vec<FieldError> {
    let mut checks = Checks::new();
    checks.id("user_id", &self.user_id);
    checks.finish()
  }
}

// ─── Pull requests ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreatePullRequest {
  pub pull_request_id:   String,
  pub pull_request_name: String,
  pub author_id:         String,
}

impl Validate for CreatePullRequest {
  fn validate(&self) -> Vec<FieldError> {
    let mut checks = Checks::new();
    checks.id("pull_request_id", &self.pull_request_id);
    checks.text(
      "pull_request_name",
      &self.pull_request_name,
      PULL_REQUEST_NAME.0,
      PULL_REQUEST_NAME.1,
    );
    checks.id("author_id", &self.author_id);
    checks.finish()
  }
}

impl From<CreatePullRequest> for NewPullRequest {
  fn from(body: CreatePullRequest) -> Self {
    Self {
      pull_request_id: body.pull_request_id,
      name:            body.pull_request_name,
      author_id:       body.author_id,
    }
  }
}

/// Body of `merge` and query of `get`.
#[derive(Debug, Deserialize)]
pub struct PullRequestId {
  pub pull_request_id: String,
}

impl Validate for PullRequestId {
  fn validate(&self) -> Vec<FieldError> {
    let mut checks = Checks::new();
    checks.id("pull_request_id", &self.pull_request_id);
    checks.finish()
  }
}

#[derive(Debug, Deserialize)]
pub struct Reassign {
  pub pull_request_id: String,
  pub old_user_id:     String,
}

impl Validate for Reassign {
  fn validate(&self) -> Vec<FieldError> {
    let mut checks = Checks::new();
    checks.id("pull_request_id", &self.pull_request_id);
    checks.id("old_user_id", &self.old_user_id);
    checks.finish()
  }
}

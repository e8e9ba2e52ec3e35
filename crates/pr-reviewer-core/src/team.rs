//! Teams and their members.
//!
//! Team names are unique and never change after creation. Users are owned by
//! exactly one team and are upserted by id whenever a team lists them.

use serde::{Deserialize, Serialize};

/// Surrogate key assigned by the store.
pub type TeamId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
  pub team_id: TeamId,
  pub name:    String,
}

/// A user row as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:   String,
  pub username:  String,
  pub team_id:   TeamId,
  pub is_active: bool,
}

/// A member as listed in a team submission or a team read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
  pub user_id:   String,
  pub username:  String,
  pub is_active: bool,
}

/// Input to [`ReviewService::create_team`](crate::ReviewService::create_team).
#[derive(Debug, Clone)]
pub struct NewTeam {
  pub name:    String,
  pub members: Vec<TeamMember>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamWithMembers {
  pub team_id: TeamId,
  #[serde(rename = "team_name")]
  pub name:    String,
  pub members: Vec<TeamMember>,
}

/// A user together with the name of the team that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWithTeam {
  pub user_id:   String,
  pub username:  String,
  pub team_name: String,
  pub is_active: bool,
}

//! Team deactivation and the reviewer replacement cascade it triggers.

use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
  Error, Result,
  selection::{REPLACEMENT_REVIEWERS, exclusion_set, select_reviewers},
  store::UnitOfWork,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivationReport {
  #[serde(rename = "deactivated_users_count")]
  pub deactivated_users:        usize,
  /// Open pull requests that had at least one deactivated reviewer, whether
  /// or not every slot could be refilled.
  #[serde(rename = "reassigned_prs_count")]
  pub reassigned_pull_requests: usize,
}

/// Deactivate every active member of `team_name` and try to replace each of
/// them on the open pull requests they review.
///
/// Replacements are drawn from the deactivated team. A slot with no eligible
/// candidate is logged and does not fail the cascade; the slot is not
/// vacated, so the now inactive user still appears in
/// `assigned_reviewers` and keeps counting towards that user's open reviews.
pub fn deactivate_team<R>(
  uow: &mut dyn UnitOfWork,
  rng: &mut R,
  team_name: &str,
) -> Result<DeactivationReport>
where
  R: Rng + ?Sized,
{
  let team = uow
    .team_by_name(team_name)?
    .ok_or_else(|| Error::TeamNotFound(team_name.to_owned()))?;

  let deactivated = uow.deactivate_team_members(team.team_id)?;
  if deactivated.is_empty() {
    debug!(team_name, "no active users to deactivate");
    return Ok(DeactivationReport::default());
  }

  let affected = uow.lock_open_pull_requests_reviewed_by(&deactivated)?;
  let report = DeactivationReport {
    deactivated_users:        deactivated.len(),
    reassigned_pull_requests: affected.len(),
  };
  if affected.is_empty() {
    debug!(team_name, "no open pull requests to reassign");
    return Ok(report);
  }

  let deactivated: HashSet<&str> = deactivated.iter().map(String::as_str).collect();

  for mut pr in affected {
    let original = pr.reviewers.clone();
    for old in original.iter().filter(|r| deactivated.contains(r.as_str())) {
      let exclude = exclusion_set(&pr, &pr.reviewers);
      let picked =
        select_reviewers(&*uow, rng, team.team_id, &exclude, REPLACEMENT_REVIEWERS)?;

      match picked.into_iter().next() {
        Some(new) => {
          uow.replace_reviewer(&pr.pull_request_id, old, &new)?;
          debug!(pr_id = %pr.pull_request_id, old_reviewer_id = %old, new_reviewer_id = %new, "reviewer replaced");
          pr.replace_reviewer(old, new);
        }
        None => {
          warn!(pr_id = %pr.pull_request_id, old_reviewer_id = %old, "no replacement candidate found");
        }
      }
    }
  }

  Ok(report)
}

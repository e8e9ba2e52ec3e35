//! Pull request lifecycle: create, merge, reassign.
//!
//! Each function is one unit of work and expects to run inside a write
//! transaction. Every precondition (author exists, PR not merged, reviewer
//! assigned) is checked against state read inside that same transaction.

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info};

use crate::{
  Error, Result,
  pull_request::{NewPullRequest, PullRequest, Reassignment},
  selection::{INITIAL_REVIEWERS, REPLACEMENT_REVIEWERS, exclusion_set, select_reviewers},
  store::UnitOfWork,
};

/// Create a pull request and assign up to two reviewers from the author's
/// team.
///
/// Zero or one reviewer is a valid outcome; `need_more_reviewers` records it.
pub fn create<R>(
  uow: &mut dyn UnitOfWork,
  rng: &mut R,
  new: NewPullRequest,
  now: DateTime<Utc>,
) -> Result<PullRequest>
where
  R: Rng + ?Sized,
{
  let team_id = uow
    .user_team_id(&new.author_id)?
    .ok_or_else(|| Error::UserNotFound(new.author_id.clone()))?;

  let mut pr = PullRequest::open(new, now);
  let exclude = exclusion_set(&pr, &pr.reviewers);
  let reviewers = select_reviewers(&*uow, rng, team_id, &exclude, INITIAL_REVIEWERS)?;
  debug!(pr_id = %pr.pull_request_id, ?reviewers, "selected reviewers");
  pr.assign_initial(reviewers);

  uow.insert_pull_request(&pr)?;
  if !pr.reviewers.is_empty() {
    uow.assign_reviewers(&pr.pull_request_id, &pr.reviewers)?;
  }

  Ok(pr)
}

/// Merge a pull request. Merging an already merged pull request returns its
/// current state unchanged.
pub fn merge(
  uow: &mut dyn UnitOfWork,
  pull_request_id: &str,
  now: DateTime<Utc>,
) -> Result<PullRequest> {
  let mut pr = uow
    .lock_pull_request(pull_request_id)?
    .ok_or_else(|| Error::PullRequestNotFound(pull_request_id.to_owned()))?;

  if pr.merge(now) {
    uow.mark_merged(pull_request_id, now)?;
  } else {
    info!(pr_id = pull_request_id, "pull request already merged");
  }

  pr.reviewers = uow.reviewer_ids(pull_request_id)?;
  Ok(pr)
}

/// Replace `old_reviewer_id` on an open pull request with a random active
/// member of the old reviewer's team who is neither the author nor already
/// reviewing.
pub fn reassign<R>(
  uow: &mut dyn UnitOfWork,
  rng: &mut R,
  pull_request_id: &str,
  old_reviewer_id: &str,
) -> Result<Reassignment>
where
  R: Rng + ?Sized,
{
  let mut pr = uow
    .lock_pull_request(pull_request_id)?
    .ok_or_else(|| Error::PullRequestNotFound(pull_request_id.to_owned()))?;
  pr.ensure_open()?;

  pr.reviewers = uow.reviewer_ids(pull_request_id)?;
  if !pr.has_reviewer(old_reviewer_id) {
    return Err(Error::ReviewerNotAssigned {
      pull_request_id: pull_request_id.to_owned(),
      reviewer_id:     old_reviewer_id.to_owned(),
    });
  }

  let team_id = uow
    .user_team_id(old_reviewer_id)?
    .ok_or_else(|| Error::UserNotFound(old_reviewer_id.to_owned()))?;

  let exclude = exclusion_set(&pr, &pr.reviewers);
  let replacement = select_reviewers(&*uow, rng, team_id, &exclude, REPLACEMENT_REVIEWERS)?
    .into_iter()
    .next()
    .ok_or_else(|| Error::NoCandidate {
      pull_request_id: pull_request_id.to_owned(),
      reviewer_id:     old_reviewer_id.to_owned(),
    })?;

  uow.replace_reviewer(pull_request_id, old_reviewer_id, &replacement)?;
  pr.reviewers = uow.reviewer_ids(pull_request_id)?;

  Ok(Reassignment { pull_request: pr, replaced_by: replacement })
}

//! Reviewer selection.
//!
//! Candidates are the active members of a team minus an exclusion set. When
//! there are more candidates than requested, a uniform sample without
//! replacement is drawn with a partial Fisher–Yates shuffle.

use std::collections::BTreeSet;

use rand::Rng;

use crate::{Result, pull_request::PullRequest, store::UserPullRequestStore, team::TeamId};

/// Reviewers requested when a pull request is created.
pub const INITIAL_REVIEWERS: usize = 2;

/// Reviewers requested when a single slot is replaced.
pub const REPLACEMENT_REVIEWERS: usize = 1;

/// Draw up to `count` distinct entries from `pool`.
///
/// Returns the whole pool (in its original order) when it holds `count` or
/// fewer entries.
pub fn sample<R>(mut pool: Vec<String>, count: usize, rng: &mut R) -> Vec<String>
where
  R: Rng + ?Sized,
{
  if pool.len() <= count {
    return pool;
  }

  // Only the first `count` positions need to be shuffled.
  for i in 0..count {
    let j = rng.gen_range(i..pool.len());
    pool.swap(i, j);
  }
  pool.truncate(count);
  pool
}

/// Pick up to `count` random active members of `team_id`, skipping anyone in
/// `exclude`. An empty result is a normal outcome, not an error.
pub fn select_reviewers<S, R>(
  store: &S,
  rng: &mut R,
  team_id: TeamId,
  exclude: &[String],
  count: usize,
) -> Result<Vec<String>>
where
  S: UserPullRequestStore + ?Sized,
  R: Rng + ?Sized,
{
  let pool = store.active_candidates(team_id, exclude)?;
  Ok(sample(pool, count, rng))
}

/// Ids that must never be picked as a reviewer of `pr`: its author and
/// everyone in `reviewers`.
///
/// Every assignment path (creation, reassignment, cascade) builds its
/// exclusions here.
pub fn exclusion_set(pr: &PullRequest, reviewers: &[String]) -> Vec<String> {
  let mut ids: BTreeSet<&str> = reviewers.iter().map(String::as_str).collect();
  ids.insert(&pr.author_id);
  ids.into_iter().map(str::to_owned).collect()
}

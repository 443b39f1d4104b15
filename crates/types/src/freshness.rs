use serde::{Deserialize, Serialize};

/// Output of the session-start freshness check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexFreshnessResult {
  pub is_fresh: bool,
  pub last_indexed_time: Option<i64>,
  pub last_indexed_commit: Option<String>,
  pub current_commit: Option<String>,
  pub hours_since_index: Option<f64>,
  pub commits_behind: u32,
  pub suggestion: Option<String>,
}

impl IndexFreshnessResult {
  /// `spec.md` §8 invariant 10: fresh iff within the time budget and either
  /// no commits behind or VCS information was unavailable.
  pub fn matches_freshness_semantics(&self) -> bool {
    let within_time = self.hours_since_index.is_none_or(|h| h <= 24.0);
    let within_commits = self.current_commit.is_none() || self.commits_behind == 0;
    self.is_fresh == (within_time && within_commits)
  }
}

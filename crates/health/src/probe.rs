use crate::result::SessionStartResult;
use crate::status::CheckStatus;
use pipeline_collab::{VcsClient, VectorStore};
use pipeline_types::IndexFreshnessResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

const STALE_THRESHOLD_HOURS: f64 = 24.0;

/// Runs the session-start checks: vector-DB connectivity, collection
/// existence, index freshness, and VCS context. Every check degrades to
/// a warning rather than propagating an error — nothing here should ever
/// block a session from starting.
pub struct HealthProbe {
  project_path: PathBuf,
  collection_name: String,
  store: Arc<dyn VectorStore>,
  vcs: Arc<dyn VcsClient>,
}

impl HealthProbe {
  pub fn new(project_path: impl Into<PathBuf>, collection_name: impl Into<String>, store: Arc<dyn VectorStore>, vcs: Arc<dyn VcsClient>) -> Self {
    Self {
      project_path: project_path.into(),
      collection_name: collection_name.into(),
      store,
      vcs,
    }
  }

  /// Runs every check concurrently, each bounded by its own soft deadline
  /// derived from `timeout_ms`. A slow or hung check is reported as a
  /// failure on its own fields; it never keeps the others from completing
  /// or aborts the probe as a whole. Never panics and never returns an
  /// `Err` — a timeout or internal failure is recorded on the result's
  /// per-check status fields instead.
  pub async fn execute(&self, timeout_ms: u64) -> SessionStartResult {
    let start = Instant::now();
    let deadline = Duration::from_millis(timeout_ms);

    let db_check = tokio::time::timeout(deadline, self.check_db_and_collection());
    let freshness_check = tokio::time::timeout(deadline, self.check_index_freshness_async());
    let git_check = tokio::time::timeout(deadline, self.get_git_context_async());

    let (db_outcome, freshness_outcome, git_outcome) = tokio::join!(db_check, freshness_check, git_check);

    let (db_status, db_message, collection_status, collection_message, collection_vector_count) = db_outcome.unwrap_or_else(|_| {
      tracing::warn!(timeout_ms, "db/collection check exceeded its soft deadline");
      (CheckStatus::Fail, "timed out".to_string(), CheckStatus::Skip, "skipped (db check timed out)".to_string(), 0)
    });

    let index_freshness = freshness_outcome.unwrap_or_else(|_| {
      tracing::warn!(timeout_ms, "freshness check exceeded its soft deadline");
      IndexFreshnessResult {
        is_fresh: false,
        suggestion: Some("index freshness check timed out".to_string()),
        ..Default::default()
      }
    });

    let (git_branch, uncommitted_files, recent_commits) = git_outcome.unwrap_or_else(|_| {
      tracing::warn!(timeout_ms, "git context check exceeded its soft deadline");
      (None, 0, Vec::new())
    });

    let mut result = SessionStartResult {
      project_path: self.project_path.display().to_string(),
      collection_name: self.collection_name.clone(),
      db_status,
      db_message,
      collection_status,
      collection_message,
      collection_vector_count,
      index_freshness,
      git_branch,
      uncommitted_files,
      recent_commits,
      execution_time_ms: 0.0,
      error: None,
    };

    result.execution_time_ms = start.elapsed().as_secs_f64() * 1000.0;
    result
  }

  /// Wraps the synchronous freshness check so it can race a timeout; the
  /// work itself is a single bounded file read, not expected to block.
  async fn check_index_freshness_async(&self) -> IndexFreshnessResult {
    self.check_index_freshness()
  }

  /// Wraps the synchronous git-context check so it can race a timeout on
  /// top of `GitVcsClient`'s own per-invocation timeout.
  async fn get_git_context_async(&self) -> (Option<String>, usize, Vec<String>) {
    self.get_git_context()
  }

  async fn check_db_and_collection(&self) -> (CheckStatus, String, CheckStatus, String, usize) {
    match self.store.get_collection(&self.collection_name).await {
      Ok(Some(info)) => (
        CheckStatus::Pass,
        "connected".to_string(),
        CheckStatus::Pass,
        "found".to_string(),
        info.points_count,
      ),
      Ok(None) => (
        CheckStatus::Pass,
        "connected".to_string(),
        CheckStatus::Warn,
        format!("not found - run: index -c {}", self.collection_name),
        0,
      ),
      Err(e) => (CheckStatus::Fail, format!("connection failed: {e}"), CheckStatus::Skip, "skipped (db unavailable)".to_string(), 0),
    }
  }

  /// Implements `spec.md` §7's freshness rule: fresh iff within the time
  /// budget and either no commit drift or VCS information unavailable.
  fn check_index_freshness(&self) -> IndexFreshnessResult {
    let state_path = self.project_path.join(".index_cache").join("state.json");

    let Ok(bytes) = std::fs::read(&state_path) else {
      return IndexFreshnessResult {
        is_fresh: false,
        suggestion: Some(format!("no index found. Run: index -c {}", self.collection_name)),
        ..Default::default()
      };
    };

    let Ok(state) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
      return IndexFreshnessResult {
        is_fresh: false,
        suggestion: Some(format!("index state corrupted. Run: index -c {}", self.collection_name)),
        ..Default::default()
      };
    };

    let mut result = IndexFreshnessResult { is_fresh: true, ..Default::default() };

    if let Some(last_time) = state.get("_last_indexed_time").and_then(|v| v.as_f64()) {
      result.last_indexed_time = Some(last_time as i64);
      let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(last_time);
      let hours_ago = (now - last_time) / 3600.0;
      result.hours_since_index = Some((hours_ago * 10.0).round() / 10.0);
      if hours_ago > STALE_THRESHOLD_HOURS {
        result.is_fresh = false;
      }
    }

    if let Some(last_commit) = state.get("_last_indexed_commit").and_then(|v| v.as_str()) {
      result.last_indexed_commit = Some(last_commit.to_string());
      result.current_commit = self.vcs.head();

      if let Some(current) = &result.current_commit {
        if current != last_commit {
          let commits_behind = self.vcs.commits_between(last_commit, current).unwrap_or(0);
          result.commits_behind = commits_behind;
          if commits_behind > 0 {
            result.is_fresh = false;
          }
        }
      }
    }

    if !result.is_fresh && result.suggestion.is_none() {
      result.suggestion = Some(format!("Run: index -c {}", self.collection_name));
    }

    result
  }

  fn get_git_context(&self) -> (Option<String>, usize, Vec<String>) {
    let branch = self.vcs.current_branch();
    let uncommitted = self.vcs.status_porcelain().map(|lines| lines.len()).unwrap_or(0);
    let recent = self.vcs.recent_subjects(3).unwrap_or_default();
    (branch, uncommitted, recent)
  }
}

/// Walks upward from `path` to find the nearest `.git` directory.
pub fn find_project_root(path: &Path) -> PathBuf {
  let mut current = path.to_path_buf();
  loop {
    if current.join(".git").exists() {
      return current;
    }
    if !current.pop() {
      return path.to_path_buf();
    }
  }
}

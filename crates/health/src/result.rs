use crate::status::CheckStatus;
use pipeline_types::IndexFreshnessResult;
use serde::{Deserialize, Serialize};

/// Aggregated outcome of one session-start probe run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartResult {
  pub project_path: String,
  pub collection_name: String,

  pub db_status: CheckStatus,
  pub db_message: String,

  pub collection_status: CheckStatus,
  pub collection_message: String,
  pub collection_vector_count: usize,

  pub index_freshness: IndexFreshnessResult,

  pub git_branch: Option<String>,
  pub uncommitted_files: usize,
  pub recent_commits: Vec<String>,

  pub execution_time_ms: f64,
  pub error: Option<String>,
}

impl SessionStartResult {
  pub fn has_warnings(&self) -> bool {
    self.db_status.is_warning() || self.collection_status.is_warning() || !self.index_freshness.is_fresh
  }

  /// Exit code contract from `spec.md` §7: never 2, 1 on any warning.
  pub fn exit_code(&self) -> i32 {
    if self.has_warnings() { 1 } else { 0 }
  }

  pub fn format_welcome_message(&self) -> String {
    let mut lines = vec![String::new(), "=== Indexing Pipeline - Session Start ===".to_string(), String::new()];

    lines.push("System Health:".to_string());
    lines.push(format!("  {} Vector DB: {}", self.db_status.indicator(), self.db_message));

    if self.collection_vector_count > 0 {
      lines.push(format!(
        "  {} Collection '{}' ({} vectors)",
        self.collection_status.indicator(),
        self.collection_name,
        self.collection_vector_count
      ));
    } else {
      lines.push(format!(
        "  {} Collection '{}': {}",
        self.collection_status.indicator(),
        self.collection_name,
        self.collection_message
      ));
    }

    if self.index_freshness.is_fresh {
      lines.push("  [OK] Index is current".to_string());
    } else {
      let mut reasons = Vec::new();
      if let Some(hours) = self.index_freshness.hours_since_index {
        if hours > 24.0 {
          reasons.push(format!("last indexed {hours:.0}h ago"));
        }
      }
      if self.index_freshness.commits_behind > 0 {
        reasons.push(format!("{} new commit(s)", self.index_freshness.commits_behind));
      }
      let reason = if reasons.is_empty() { "needs update".to_string() } else { reasons.join(", ") };
      lines.push(format!("  [WARN] Index stale ({reason})"));
      if let Some(suggestion) = &self.index_freshness.suggestion {
        lines.push(format!("         {suggestion}"));
      }
    }

    lines.push(String::new());
    lines.push("Git Context:".to_string());
    match &self.git_branch {
      Some(branch) => lines.push(format!("  Branch: {branch}")),
      None => lines.push("  Branch: (not a git repo)".to_string()),
    }
    if self.uncommitted_files > 0 {
      lines.push(format!("  Uncommitted: {} file(s)", self.uncommitted_files));
    }
    if !self.recent_commits.is_empty() {
      lines.push("  Recent commits:".to_string());
      for commit in self.recent_commits.iter().take(3) {
        let msg = if commit.len() > 60 {
          let cut = commit.char_indices().map(|(i, _)| i).take_while(|&i| i <= 60).last().unwrap_or(0);
          format!("{}...", &commit[..cut])
        } else {
          commit.clone()
        };
        lines.push(format!("    - {msg}"));
      }
    }

    lines.push(String::new());
    lines.push(format!("Ready in {:.0}ms", self.execution_time_ms));
    lines.push(String::new());

    lines.join("\n")
  }
}

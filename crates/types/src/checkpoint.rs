use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Persisted resume record for one (project, collection) pair.
///
/// Partitions are disjoint by construction: every mutating method removes
/// a relative path from the other two partitions before inserting it,
/// which is what keeps invariant (a)/(b) from `spec.md` §3 true across the
/// struct's lifetime rather than just at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
  #[serde(default = "default_version")]
  pub version: u32,
  pub collection_name: String,
  pub project_path: String,
  pub total_files: usize,
  pub processed_files: Vec<String>,
  pub pending_files: Vec<String>,
  pub failed_files: Vec<String>,
  pub last_batch_index: usize,
  pub entities_created: usize,
  pub relations_created: usize,
  pub chunks_created: usize,
  pub started_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[serde(default)]
  pub config: serde_json::Value,
}

fn default_version() -> u32 {
  1
}

impl CheckpointState {
  pub fn new(collection_name: impl Into<String>, project_path: impl Into<String>, pending_files: Vec<String>) -> Self {
    let now = Utc::now();
    let total_files = pending_files.len();
    Self {
      version: 1,
      collection_name: collection_name.into(),
      project_path: project_path.into(),
      total_files,
      processed_files: Vec::new(),
      pending_files,
      failed_files: Vec::new(),
      last_batch_index: 0,
      entities_created: 0,
      relations_created: 0,
      chunks_created: 0,
      started_at: now,
      updated_at: now,
      config: serde_json::Value::Null,
    }
  }

  /// Moves `path` into `processed_files`, removing it from the other two
  /// partitions wherever it was.
  pub fn mark_processed(&mut self, path: &str) {
    self.remove_from_all(path);
    self.processed_files.push(path.to_string());
    self.updated_at = Utc::now();
  }

  pub fn mark_failed(&mut self, path: &str) {
    self.remove_from_all(path);
    self.failed_files.push(path.to_string());
    self.updated_at = Utc::now();
  }

  fn remove_from_all(&mut self, path: &str) {
    self.processed_files.retain(|p| p != path);
    self.pending_files.retain(|p| p != path);
    self.failed_files.retain(|p| p != path);
  }

  pub fn progress_percent(&self) -> f64 {
    if self.total_files == 0 {
      return 0.0;
    }
    (self.processed_files.len() as f64 / self.total_files as f64) * 100.0
  }

  /// Checks invariants (a)/(b) from `spec.md` §3: partitions are pairwise
  /// disjoint and no path appears in more than one.
  pub fn partitions_are_disjoint(&self) -> bool {
    let processed: HashSet<&str> = self.processed_files.iter().map(String::as_str).collect();
    let pending: HashSet<&str> = self.pending_files.iter().map(String::as_str).collect();
    let failed: HashSet<&str> = self.failed_files.iter().map(String::as_str).collect();

    processed.intersection(&pending).next().is_none()
      && processed.intersection(&failed).next().is_none()
      && pending.intersection(&failed).next().is_none()
  }

  pub fn is_stale(&self, now: DateTime<Utc>, stale_after_hours: i64) -> bool {
    let age = now.signed_duration_since(self.updated_at);
    age.num_seconds() > stale_after_hours * 3600
  }
}

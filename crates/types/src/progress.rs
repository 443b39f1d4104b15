use serde::{Deserialize, Serialize};

/// Phases of the indexing pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Init,
  Discovery,
  Filtering,
  Parsing,
  Embedding,
  Storage,
  Cleanup,
  Complete,
}

impl Default for Phase {
  fn default() -> Self {
    Phase::Init
  }
}

/// Live snapshot of pipeline progress, suitable for pull or push consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressState {
  pub phase: Phase,
  pub total_files: usize,
  pub processed_files: usize,
  /// 1-indexed for display.
  pub current_batch: usize,
  pub total_batches: usize,
  pub files_per_second: f64,
  pub eta_seconds: f64,
  pub memory_mb: f64,
  pub current_file: Option<String>,
  pub entities_created: usize,
  pub relations_created: usize,
  pub chunks_created: usize,
  pub cache_hits: usize,
  pub cache_misses: usize,
  pub parse_time_ms: f64,
  pub embed_time_ms: f64,
  pub store_time_ms: f64,
}

impl Default for ProgressState {
  fn default() -> Self {
    Self {
      phase: Phase::Init,
      total_files: 0,
      processed_files: 0,
      current_batch: 0,
      total_batches: 0,
      files_per_second: 0.0,
      eta_seconds: 0.0,
      memory_mb: 0.0,
      current_file: None,
      entities_created: 0,
      relations_created: 0,
      chunks_created: 0,
      cache_hits: 0,
      cache_misses: 0,
      parse_time_ms: 0.0,
      embed_time_ms: 0.0,
      store_time_ms: 0.0,
    }
  }
}

impl ProgressState {
  pub fn percent_complete(&self) -> f64 {
    if self.total_files == 0 {
      0.0
    } else {
      (self.processed_files as f64 / self.total_files as f64) * 100.0
    }
  }

  /// Human-readable ETA per the formatting contract in `spec.md` §4.4.
  pub fn eta_formatted(&self) -> String {
    if self.eta_seconds <= 0.0 || self.files_per_second <= 0.0 {
      return "calculating…".to_string();
    }
    let secs = self.eta_seconds;
    if secs < 60.0 {
      format!("{}s", secs as u64)
    } else if secs < 3600.0 {
      let m = (secs / 60.0) as u64;
      let s = (secs % 60.0) as u64;
      format!("{m}m {s}s")
    } else {
      let h = (secs / 3600.0) as u64;
      let m = ((secs % 3600.0) / 60.0) as u64;
      format!("{h}h {m}m")
    }
  }
}

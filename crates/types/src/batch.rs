use serde::{Deserialize, Serialize};

/// Metrics from one completed batch, fed to the batch optimizer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatchMetrics {
  pub batch_size: usize,
  pub processing_time_ms: f64,
  pub memory_delta_mb: f64,
  pub error_count: usize,
  pub files_per_second: f64,
}

impl BatchMetrics {
  pub fn new(batch_size: usize, processing_time_ms: f64, memory_delta_mb: f64, error_count: usize) -> Self {
    let files_per_second = if processing_time_ms > 0.0 {
      batch_size as f64 / (processing_time_ms / 1000.0)
    } else {
      0.0
    };
    Self {
      batch_size,
      processing_time_ms,
      memory_delta_mb,
      error_count,
      files_per_second,
    }
  }

  pub fn error_rate(&self) -> f64 {
    if self.batch_size == 0 {
      0.0
    } else {
      self.error_count as f64 / self.batch_size as f64
    }
  }
}

/// Outcome of processing a single batch through parse/embed/store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
  pub batch_index: usize,
  pub processed_files: Vec<String>,
  pub failed_files: Vec<String>,
  pub entities_created: usize,
  pub relations_created: usize,
  pub chunks_created: usize,
  pub parse_ms: f64,
  pub embed_ms: f64,
  pub store_ms: f64,
  pub errors: Vec<String>,
}

impl BatchResult {
  pub fn new(batch_index: usize) -> Self {
    Self {
      batch_index,
      ..Default::default()
    }
  }

  pub fn total_time_ms(&self) -> f64 {
    self.parse_ms + self.embed_ms + self.store_ms
  }

  pub fn success_rate(&self) -> f64 {
    let total = self.processed_files.len() + self.failed_files.len();
    if total == 0 {
      0.0
    } else {
      self.processed_files.len() as f64 / total as f64
    }
  }
}

/// Final outcome of a complete pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineResult {
  pub success: bool,
  pub files_processed: usize,
  pub files_skipped: usize,
  pub files_failed: usize,
  pub entities_created: usize,
  pub relations_created: usize,
  pub implementation_chunks: usize,
  pub total_time_seconds: f64,
  pub batch_count: usize,
  pub checkpoint_path: Option<String>,
  pub errors: Vec<String>,
  pub warnings: Vec<String>,
  pub cache_hits: usize,
  pub cache_misses: usize,
}

impl PipelineResult {
  pub fn total_files(&self) -> usize {
    self.files_processed + self.files_skipped + self.files_failed
  }

  pub fn files_per_second(&self) -> f64 {
    if self.total_time_seconds <= 0.0 {
      0.0
    } else {
      self.files_processed as f64 / self.total_time_seconds
    }
  }

  /// Whether this result can be resumed (a checkpoint survived the run).
  pub fn is_resumable(&self) -> bool {
    self.checkpoint_path.is_some()
  }
}

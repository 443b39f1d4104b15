//! Adaptive batch-size controller with memory-aware scaling.
//!
//! Implements the decision rules from the indexing pipeline's design:
//! memory pressure forces an immediate reduction, sustained error rates
//! ramp the batch size down, and consecutive clean batches ramp it back
//! up. The optimizer never returns a size outside `[min_batch_size,
//! max_batch_size]`.
//!
//! # Example
//!
//! ```
//! use pipeline_optimizer::BatchOptimizer;
//! use pipeline_types::BatchMetrics;
//!
//! let mut optimizer = BatchOptimizer::new(25, 100, 4096);
//! let size = optimizer.get_batch_size();
//! optimizer.record_batch(BatchMetrics::new(size, 1200.0, 5.0, 0));
//! ```

use pipeline_types::ThresholdConfig;
use pipeline_types::batch::BatchMetrics;
use serde::Serialize;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Intelligent batch-size optimizer with memory-aware scaling.
pub struct BatchOptimizer {
  config: ThresholdConfig,
  current_size: usize,
  initial_size: usize,
  initial_memory_mb: f64,
  consecutive_successes: u32,
  consecutive_failures: u32,
  history: Vec<BatchMetrics>,
  reduction_reasons: Vec<String>,
  sys: System,
  pid: Pid,
}

impl BatchOptimizer {
  pub fn new(initial_size: usize, max_size: usize, memory_threshold_mb: u64) -> Self {
    Self::with_config(
      initial_size,
      ThresholdConfig {
        max_batch_size: max_size,
        memory_threshold_mb,
        ..Default::default()
      },
    )
  }

  pub fn with_config(initial_size: usize, config: ThresholdConfig) -> Self {
    let pid = Pid::from_u32(std::process::id());
    let mut sys = System::new();
    let initial_memory_mb = read_rss_mb(&mut sys, pid);

    Self {
      config,
      current_size: initial_size,
      initial_size,
      initial_memory_mb,
      consecutive_successes: 0,
      consecutive_failures: 0,
      history: Vec::new(),
      reduction_reasons: Vec::new(),
      sys,
      pid,
    }
  }

  /// Current recommended batch size, after an up-front memory check.
  pub fn get_batch_size(&mut self) -> usize {
    let (current_mb, should_reduce) = self.check_memory();
    if should_reduce {
      self.force_reduce(format!("memory pressure ({current_mb:.0}MB)"));
    }
    self.current_size
  }

  /// Records a completed batch's metrics and adjusts size per the ramp rules.
  pub fn record_batch(&mut self, metrics: BatchMetrics) {
    self.history.push(metrics);

    if metrics.error_rate() > self.config.error_rate_threshold {
      self.consecutive_successes = 0;
      self.consecutive_failures += 1;
      if self.consecutive_failures >= 2 {
        self.force_reduce("high error rate".to_string());
      }
    } else {
      self.consecutive_failures = 0;
      self.consecutive_successes += 1;
      if self.consecutive_successes >= self.config.consecutive_successes_for_ramp {
        self.increase_size();
        self.consecutive_successes = 0;
      }
    }

    let (current_mb, should_reduce) = self.check_memory();
    if should_reduce {
      self.force_reduce(format!("post-batch memory ({current_mb:.0}MB)"));
      // Advisory only: request the caller's runtime to run a GC-equivalent
      // cycle. Rust has no GC to trigger; the hook exists so downstream
      // callers that hold large arena allocations can drop them.
      tracing::debug!("batch optimizer requesting memory reclaim after reduction");
    }
  }

  pub fn check_memory(&mut self) -> (f64, bool) {
    let current_mb = read_rss_mb(&mut self.sys, self.pid);
    let should_reduce = current_mb > self.config.memory_threshold_mb as f64;
    (current_mb, should_reduce)
  }

  /// Forces an immediate reduction, floored at `min_batch_size`. Returns
  /// the new size. Multiplication rounds toward zero, matching the
  /// integer-size contract in `spec.md` §4.2.
  pub fn force_reduce(&mut self, reason: String) -> usize {
    let old_size = self.current_size;
    let reduced = (self.current_size as f64 * self.config.ramp_down_factor) as usize;
    self.current_size = reduced.max(self.config.min_batch_size);
    self.reduction_reasons.push(reason.clone());

    if self.current_size < old_size {
      tracing::info!(old_size, new_size = self.current_size, %reason, "reduced batch size");
    }
    self.current_size
  }

  fn increase_size(&mut self) {
    let old_size = self.current_size;
    let increased = (self.current_size as f64 * self.config.ramp_up_factor) as usize;
    self.current_size = increased.min(self.config.max_batch_size);

    if self.current_size > old_size {
      tracing::debug!(old_size, new_size = self.current_size, "increased batch size after consecutive successes");
    }
  }

  pub fn reset(&mut self) {
    self.current_size = self.initial_size;
    self.consecutive_successes = 0;
    self.consecutive_failures = 0;
    self.history.clear();
    self.reduction_reasons.clear();
    self.initial_memory_mb = read_rss_mb(&mut self.sys, self.pid);
  }

  pub fn get_statistics(&mut self) -> OptimizerStatistics {
    let memory_mb = read_rss_mb(&mut self.sys, self.pid);

    if self.history.is_empty() {
      return OptimizerStatistics {
        current_size: self.current_size,
        initial_size: self.initial_size,
        batches_processed: 0,
        avg_processing_time_ms: 0.0,
        avg_files_per_second: 0.0,
        total_files_processed: 0,
        total_errors: 0,
        error_rate: 0.0,
        size_reductions: self.reduction_reasons.len(),
        reduction_reasons: self.reduction_reasons.clone(),
        consecutive_successes: self.consecutive_successes,
        memory_mb,
        memory_delta_mb: memory_mb - self.initial_memory_mb,
      };
    }

    let total_time: f64 = self.history.iter().map(|m| m.processing_time_ms).sum();
    let total_files: usize = self.history.iter().map(|m| m.batch_size).sum();
    let total_errors: usize = self.history.iter().map(|m| m.error_count).sum();

    OptimizerStatistics {
      current_size: self.current_size,
      initial_size: self.initial_size,
      batches_processed: self.history.len(),
      avg_processing_time_ms: total_time / self.history.len() as f64,
      avg_files_per_second: if total_time > 0.0 {
        total_files as f64 / (total_time / 1000.0)
      } else {
        0.0
      },
      total_files_processed: total_files,
      total_errors,
      error_rate: if total_files > 0 { total_errors as f64 / total_files as f64 } else { 0.0 },
      size_reductions: self.reduction_reasons.len(),
      reduction_reasons: self.reduction_reasons.clone(),
      consecutive_successes: self.consecutive_successes,
      memory_mb,
      memory_delta_mb: memory_mb - self.initial_memory_mb,
    }
  }

  pub fn current_size(&self) -> usize {
    self.current_size
  }

  pub fn can_increase(&self) -> bool {
    self.current_size < self.config.max_batch_size
  }

  pub fn at_minimum(&self) -> bool {
    self.current_size <= self.config.min_batch_size
  }
}

fn read_rss_mb(sys: &mut System, pid: Pid) -> f64 {
  sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
  sys
    .process(pid)
    .map(|p| p.memory() as f64 / (1024.0 * 1024.0))
    .unwrap_or(0.0)
}

/// Snapshot of optimizer state and batch history, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizerStatistics {
  pub current_size: usize,
  pub initial_size: usize,
  pub batches_processed: usize,
  pub avg_processing_time_ms: f64,
  pub avg_files_per_second: f64,
  pub total_files_processed: usize,
  pub total_errors: usize,
  pub error_rate: f64,
  pub size_reductions: usize,
  pub reduction_reasons: Vec<String>,
  pub consecutive_successes: u32,
  pub memory_mb: f64,
  pub memory_delta_mb: f64,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn clean_batch(size: usize) -> BatchMetrics {
    BatchMetrics::new(size, 1000.0, 0.0, 0)
  }

  fn error_batch(size: usize, errors: usize) -> BatchMetrics {
    BatchMetrics::new(size, 1000.0, 0.0, errors)
  }

  #[test]
  fn size_never_exits_configured_bounds() {
    let mut optimizer = BatchOptimizer::new(10, 20, u64::MAX);
    for _ in 0..10 {
      let size = optimizer.get_batch_size();
      assert!(size >= 2 && size <= 20);
      optimizer.record_batch(clean_batch(size));
    }
  }

  #[test]
  fn ramps_up_after_consecutive_successes() {
    let mut optimizer = BatchOptimizer::new(10, 100, u64::MAX);
    optimizer.record_batch(clean_batch(10));
    optimizer.record_batch(clean_batch(10));
    assert_eq!(optimizer.current_size(), 10, "ramp happens on the 3rd success");
    optimizer.record_batch(clean_batch(10));
    assert!(optimizer.current_size() >= 15, "ceil(10 * 1.5) = 15");
  }

  #[test]
  fn ramp_up_is_capped_at_max_batch_size() {
    let mut optimizer = BatchOptimizer::new(90, 100, u64::MAX);
    for _ in 0..3 {
      optimizer.record_batch(clean_batch(optimizer.current_size()));
    }
    assert!(optimizer.current_size() <= 100);
  }

  #[test]
  fn ramps_down_after_two_high_error_batches() {
    let mut optimizer = BatchOptimizer::new(20, 100, u64::MAX);
    optimizer.record_batch(error_batch(20, 10)); // 50% error rate, 1st failure
    assert_eq!(optimizer.current_size(), 20);
    optimizer.record_batch(error_batch(20, 10)); // 2nd consecutive failure triggers reduction
    assert!(optimizer.current_size() <= 10, "floor(20 * 0.5) = 10");
  }

  #[test]
  fn ramp_down_is_floored_at_min_batch_size() {
    let mut optimizer = BatchOptimizer::new(3, 100, u64::MAX);
    optimizer.record_batch(error_batch(3, 3));
    optimizer.record_batch(error_batch(3, 3));
    assert!(optimizer.current_size() >= 2);
  }

  #[test]
  fn reset_restores_initial_state() {
    let mut optimizer = BatchOptimizer::new(10, 100, u64::MAX);
    optimizer.record_batch(error_batch(10, 10));
    optimizer.record_batch(error_batch(10, 10));
    assert_ne!(optimizer.current_size(), 10);

    optimizer.reset();
    assert_eq!(optimizer.current_size(), 10);
    let stats = optimizer.get_statistics();
    assert_eq!(stats.batches_processed, 0);
    assert!(stats.reduction_reasons.is_empty());
  }

  #[test]
  fn statistics_track_history_totals() {
    let mut optimizer = BatchOptimizer::new(10, 100, u64::MAX);
    optimizer.record_batch(clean_batch(10));
    optimizer.record_batch(error_batch(10, 1));
    let stats = optimizer.get_statistics();
    assert_eq!(stats.batches_processed, 2);
    assert_eq!(stats.total_files_processed, 20);
    assert_eq!(stats.total_errors, 1);
  }

  #[test]
  fn memory_pressure_forces_reduction_on_get_batch_size() {
    // Threshold of 0 MB guarantees the live RSS reading exceeds it.
    let mut optimizer = BatchOptimizer::new(20, 100, 0);
    let size = optimizer.get_batch_size();
    assert!(size <= 10, "floor(20 * 0.5) = 10");
    let stats = optimizer.get_statistics();
    assert!(stats.reduction_reasons.iter().any(|r| r.contains("memory pressure")));
  }
}

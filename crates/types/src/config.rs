use serde::{Deserialize, Serialize};

/// Immutable parameters for a single pipeline run.
///
/// Owned by the caller, read-only to the pipeline. Validated once at
/// construction via [`PipelineConfig::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  pub initial_batch_size: usize,
  pub max_batch_size: usize,
  pub ramp_up_enabled: bool,
  pub memory_threshold_mb: u64,
  pub parallel_threshold: usize,
  pub checkpoint_interval: usize,
  pub enable_resume: bool,
  /// 0 means auto: `min(cpu_count, 8)`.
  pub max_parallel_workers: usize,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      initial_batch_size: 25,
      max_batch_size: 100,
      ramp_up_enabled: true,
      memory_threshold_mb: 2000,
      parallel_threshold: 100,
      checkpoint_interval: 50,
      enable_resume: true,
      max_parallel_workers: 0,
    }
  }
}

impl PipelineConfig {
  /// Checks the invariants `spec.md` §3 requires of a config.
  pub fn validate(&self) -> Result<(), String> {
    if self.initial_batch_size < 1 {
      return Err("initial_batch_size must be >= 1".into());
    }
    if self.max_batch_size < self.initial_batch_size {
      return Err("max_batch_size must be >= initial_batch_size".into());
    }
    if self.memory_threshold_mb == 0 {
      return Err("memory_threshold_mb must be > 0".into());
    }
    if self.checkpoint_interval < 1 {
      return Err("checkpoint_interval must be >= 1".into());
    }
    Ok(())
  }

  /// Resolved worker count: `max_parallel_workers` if set, else `min(cpu_count, 8)`.
  pub fn resolved_worker_count(&self) -> usize {
    if self.max_parallel_workers > 0 {
      self.max_parallel_workers
    } else {
      num_cpus::get().min(8)
    }
  }
}

/// Optimizer tunables. Kept separate from [`PipelineConfig`] because the
/// optimizer is reusable outside a full pipeline run (see `pipeline-optimizer`
/// unit tests).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
  pub min_batch_size: usize,
  pub max_batch_size: usize,
  pub memory_threshold_mb: u64,
  pub error_rate_threshold: f64,
  pub ramp_up_factor: f64,
  pub ramp_down_factor: f64,
  pub consecutive_successes_for_ramp: u32,
}

impl Default for ThresholdConfig {
  fn default() -> Self {
    Self {
      min_batch_size: 2,
      max_batch_size: 100,
      memory_threshold_mb: 2000,
      error_rate_threshold: 0.10,
      ramp_up_factor: 1.5,
      ramp_down_factor: 0.5,
      consecutive_successes_for_ramp: 3,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_is_valid() {
    assert!(PipelineConfig::default().validate().is_ok());
  }

  #[test]
  fn rejects_max_below_initial() {
    let cfg = PipelineConfig {
      initial_batch_size: 50,
      max_batch_size: 10,
      ..Default::default()
    };
    assert!(cfg.validate().is_err());
  }

  #[test]
  fn worker_count_auto_caps_at_eight() {
    let cfg = PipelineConfig::default();
    assert!(cfg.resolved_worker_count() <= 8);
    assert!(cfg.resolved_worker_count() >= 1);
  }

  #[test]
  fn worker_count_honors_explicit_override() {
    let cfg = PipelineConfig {
      max_parallel_workers: 3,
      ..Default::default()
    };
    assert_eq!(cfg.resolved_worker_count(), 3);
  }
}

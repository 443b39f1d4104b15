//! Progress reporting for the indexing pipeline.
//!
//! Supports both pull (call [`ProgressReporter::get_state`] whenever you
//! like) and push (register a [`ProgressObserver`] and get called on every
//! update) consumption. Observer panics are caught and logged rather than
//! propagated, since a misbehaving UI callback should never abort indexing.

use pipeline_types::{Phase, ProgressState};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Receives a snapshot on every progress-affecting event.
pub trait ProgressObserver: Send + Sync {
  fn on_update(&self, state: &ProgressState);
}

/// Per-file outcome passed to [`ProgressReporter::update_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
  Processing,
  Complete,
  Failed,
}

/// Optional tier breakdown for a batch, surfaced to observers via logging
/// only (there is no terminal renderer in this crate).
#[derive(Debug, Clone, Copy, Default)]
pub struct TierStats {
  pub light: usize,
  pub standard: usize,
  pub deep: usize,
}

#[derive(Debug, Clone, Default)]
struct TimingSeries {
  count: u64,
  sum_ms: f64,
  min_ms: f64,
  max_ms: f64,
}

impl TimingSeries {
  fn record(&mut self, value_ms: f64) {
    if self.count == 0 {
      self.min_ms = value_ms;
      self.max_ms = value_ms;
    } else {
      self.min_ms = self.min_ms.min(value_ms);
      self.max_ms = self.max_ms.max(value_ms);
    }
    self.count += 1;
    self.sum_ms += value_ms;
  }

  fn avg_ms(&self) -> f64 {
    if self.count == 0 { 0.0 } else { self.sum_ms / self.count as f64 }
  }
}

/// Aggregated min/avg/max/count for one named timing series.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct PerfStats {
  pub count: u64,
  pub sum_ms: f64,
  pub avg_ms: f64,
  pub min_ms: f64,
  pub max_ms: f64,
}

/// Snapshot returned by [`ProgressReporter::get_performance_report`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct PerformanceReport {
  pub total_time_seconds: f64,
  pub files_processed: usize,
  pub files_per_second: f64,
  pub entities_created: usize,
  pub relations_created: usize,
  pub chunks_created: usize,
  pub cache_hits: usize,
  pub cache_misses: usize,
  pub parse_ms: f64,
  pub embed_ms: f64,
  pub store_ms: f64,
  pub perf_aggregates: HashMap<String, PerfStats>,
}

#[derive(Default)]
struct PerformanceAggregator {
  series: HashMap<String, TimingSeries>,
}

impl PerformanceAggregator {
  fn record(&mut self, name: &str, value_ms: f64) {
    self.series.entry(name.to_string()).or_default().record(value_ms);
  }

  fn report(&self) -> HashMap<String, PerfStats> {
    self
      .series
      .iter()
      .map(|(name, s)| {
        (
          name.clone(),
          PerfStats {
            count: s.count,
            sum_ms: s.sum_ms,
            avg_ms: s.avg_ms(),
            min_ms: s.min_ms,
            max_ms: s.max_ms,
          },
        )
      })
      .collect()
  }

  fn reset(&mut self) {
    self.series.clear();
  }
}

/// Unified progress reporter for one pipeline run.
pub struct ProgressReporter {
  state: ProgressState,
  start_time: Option<Instant>,
  observers: Vec<Arc<dyn ProgressObserver>>,
  perf: PerformanceAggregator,
  sys: System,
  pid: Pid,
}

impl Default for ProgressReporter {
  fn default() -> Self {
    Self::new()
  }
}

impl ProgressReporter {
  pub fn new() -> Self {
    Self {
      state: ProgressState::default(),
      start_time: None,
      observers: Vec::new(),
      perf: PerformanceAggregator::default(),
      sys: System::new(),
      pid: Pid::from_u32(std::process::id()),
    }
  }

  pub fn add_observer(&mut self, observer: Arc<dyn ProgressObserver>) {
    self.observers.push(observer);
  }

  pub fn remove_observer(&mut self, observer: &Arc<dyn ProgressObserver>) {
    self.observers.retain(|o| !Arc::ptr_eq(o, observer));
  }

  pub fn start(&mut self, total_files: usize, total_batches: usize) {
    self.start_time = Some(Instant::now());
    self.state = ProgressState {
      phase: Phase::Discovery,
      total_files,
      total_batches,
      memory_mb: self.memory_mb(),
      ..Default::default()
    };
    self.perf.reset();
    self.notify();
    tracing::info!(total_files, total_batches, "starting pipeline");
  }

  pub fn set_phase(&mut self, phase: Phase) {
    self.state.phase = phase;
    self.notify();
  }

  pub fn update_discovery(&mut self, files_found: usize, files_filtered: usize) {
    self.state.phase = Phase::Filtering;
    self.state.cache_hits = files_filtered;
    self.state.cache_misses = files_found.saturating_sub(files_filtered);
    self.notify();
    tracing::info!(files_found, files_filtered, "discovery complete");
  }

  /// `batch_index` is 0-based; the stored `current_batch` is 1-indexed for
  /// display, matching the convention the pipeline's terminal output uses.
  pub fn update_batch(&mut self, batch_index: usize, files_in_batch: usize, tier_stats: Option<TierStats>) {
    self.state.phase = Phase::Parsing;
    self.state.current_batch = batch_index + 1;
    self.state.memory_mb = self.memory_mb();
    if let Some(tiers) = tier_stats {
      tracing::debug!(light = tiers.light, standard = tiers.standard, deep = tiers.deep, files_in_batch, "batch tiers");
    }
    self.notify();
  }

  pub fn update_file(&mut self, file_name: &str, status: FileStatus) {
    self.state.current_file = Some(file_name.to_string());
    if status == FileStatus::Complete {
      self.state.processed_files += 1;
      self.update_speed_eta();
    }
    self.notify();
  }

  #[allow(clippy::too_many_arguments)]
  pub fn complete_batch(
    &mut self,
    batch_index: usize,
    entities: usize,
    relations: usize,
    chunks: usize,
    parse_ms: f64,
    embed_ms: f64,
    store_ms: f64,
    files_processed: usize,
  ) {
    self.state.entities_created += entities;
    self.state.relations_created += relations;
    self.state.chunks_created += chunks;
    self.state.parse_time_ms += parse_ms;
    self.state.embed_time_ms += embed_ms;
    self.state.store_time_ms += store_ms;

    if files_processed > 0 {
      self.state.processed_files = (self.state.processed_files + files_processed).min(self.state.total_files);
    }

    let batch_total_ms = parse_ms + embed_ms + store_ms;
    self.perf.record("batch", batch_total_ms);
    self.perf.record("parse", parse_ms);
    self.perf.record("embed", embed_ms);
    self.perf.record("store", store_ms);

    self.update_speed_eta();
    self.notify();
    tracing::debug!(batch = batch_index + 1, entities, relations, chunks, batch_total_ms, "batch complete");
  }

  pub fn increment_files(&mut self, count: usize, failed: bool) {
    if !failed {
      self.state.processed_files += count;
      self.update_speed_eta();
    }
    self.notify();
  }

  pub fn finish(&mut self, success: bool) -> ProgressState {
    self.state.phase = Phase::Complete;
    let elapsed = self.start_time.map(|t| t.elapsed().as_secs_f64()).unwrap_or(0.0);
    self.state.eta_seconds = 0.0;
    self.notify();

    tracing::info!(
      success,
      processed = self.state.processed_files,
      total = self.state.total_files,
      elapsed_seconds = elapsed,
      files_per_second = self.state.files_per_second,
      "pipeline finished"
    );

    self.state.clone()
  }

  pub fn get_state(&self) -> ProgressState {
    self.state.clone()
  }

  pub fn get_performance_report(&self) -> PerformanceReport {
    let elapsed = self.start_time.map(|t| t.elapsed().as_secs_f64()).unwrap_or(0.0);
    PerformanceReport {
      total_time_seconds: elapsed,
      files_processed: self.state.processed_files,
      files_per_second: self.state.files_per_second,
      entities_created: self.state.entities_created,
      relations_created: self.state.relations_created,
      chunks_created: self.state.chunks_created,
      cache_hits: self.state.cache_hits,
      cache_misses: self.state.cache_misses,
      parse_ms: self.state.parse_time_ms,
      embed_ms: self.state.embed_time_ms,
      store_ms: self.state.store_time_ms,
      perf_aggregates: self.perf.report(),
    }
  }

  fn update_speed_eta(&mut self) {
    let Some(start) = self.start_time else { return };
    let elapsed = start.elapsed().as_secs_f64();
    if elapsed > 0.0 && self.state.processed_files > 0 {
      self.state.files_per_second = self.state.processed_files as f64 / elapsed;
      let remaining = self.state.total_files.saturating_sub(self.state.processed_files);
      self.state.eta_seconds = if self.state.files_per_second > 0.0 {
        remaining as f64 / self.state.files_per_second
      } else {
        0.0
      };
    }
  }

  fn memory_mb(&mut self) -> f64 {
    self.sys.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
    self.sys.process(self.pid).map(|p| p.memory() as f64 / (1024.0 * 1024.0)).unwrap_or(0.0)
  }

  fn notify(&self) {
    let state = self.state.clone();
    for observer in &self.observers {
      let observer = observer.clone();
      let state_ref = &state;
      let result = catch_unwind(AssertUnwindSafe(|| observer.on_update(state_ref)));
      if result.is_err() {
        tracing::warn!("progress observer panicked, ignoring");
      }
    }
  }
}

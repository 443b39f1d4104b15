//! The indexing pipeline: discovery, filtering, resume, and the
//! parse/embed/store batching loop.

use crate::discovery::{CACHE_DIR_NAME, Discoverer};
use crate::filter::{FileHashCache, Filter};
use crate::retry::RetryConfig;
use pipeline_checkpoint::CheckpointManager;
use pipeline_collab::errors::EmbedError;
use pipeline_collab::types::{ParsedUnit, UpsertPoint};
use pipeline_collab::{Embedder, Parser, VcsClient, VectorStore};
use pipeline_optimizer::BatchOptimizer;
use pipeline_progress::{FileStatus, ProgressObserver, ProgressReporter};
use pipeline_types::{BatchMetrics, PipelineConfig, PipelineResult};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;

/// Marker pushed into `PipelineResult::warnings` when a run is cut short
/// by cancellation, per the pipeline's "not an error" cancellation contract.
const CANCELLED_MARKER: &str = "cancelled: run aborted at batch boundary";

const STATE_FILE: &str = "state.json";

/// A parsed-then-embedded unit still tied to its source file, carried
/// between the parse and store phases so a store failure can be blamed on
/// the right file.
struct PendingUnit {
  path: PathBuf,
  unit: ParsedUnit,
}

/// Orchestrates one indexing run over a project tree into a target
/// collection. Owns no long-lived connections of its own; `parser`,
/// `embedder`, and `store` are caller-supplied collaborators.
pub struct IndexingPipeline {
  project_path: PathBuf,
  config: PipelineConfig,
  parser: Arc<dyn Parser>,
  embedder: Arc<dyn Embedder>,
  store: Arc<dyn VectorStore>,
  vcs: Option<Arc<dyn VcsClient>>,
  retry: RetryConfig,
  cache_dir: PathBuf,
  progress: ProgressReporter,
  cancel: CancellationToken,
}

impl IndexingPipeline {
  pub fn new(project_path: impl Into<PathBuf>, config: PipelineConfig, parser: Arc<dyn Parser>, embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
    let project_path = project_path.into();
    let cache_dir = project_path.join(CACHE_DIR_NAME);
    Self {
      project_path,
      config,
      parser,
      embedder,
      store,
      vcs: None,
      retry: RetryConfig::default(),
      cache_dir,
      progress: ProgressReporter::new(),
      cancel: CancellationToken::new(),
    }
  }

  pub fn with_vcs(mut self, vcs: Arc<dyn VcsClient>) -> Self {
    self.vcs = Some(vcs);
    self
  }

  pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
    self.retry = retry;
    self
  }

  /// Wires an external cancellation signal. Checked at the top of every
  /// batch iteration in [`Self::run`]; the in-flight batch always finishes
  /// or fails as a whole before the run stops.
  pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }

  /// Returns a token that cancels this pipeline's next `run()`. Callers
  /// that didn't supply their own via [`Self::with_cancellation`] can use
  /// this to cancel a run already in progress on another task.
  pub fn cancellation_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  pub fn add_progress_observer(&mut self, observer: Arc<dyn ProgressObserver>) {
    self.progress.add_observer(observer);
  }

  /// Runs discovery through cleanup for `collection_name`. Per-file and
  /// per-batch failures are recorded in the returned [`PipelineResult`]
  /// rather than propagated; only conditions that prevent the run from
  /// starting at all (bad config, unreadable project path) return `Err`.
  pub async fn run(&mut self, collection_name: &str) -> pipeline_types::Result<PipelineResult> {
    self.config.validate().map_err(pipeline_types::PipelineError::Config)?;
    let run_start = Instant::now();

    if !self.project_path.is_dir() {
      return Err(pipeline_types::PipelineError::Fatal(format!("project path does not exist: {}", self.project_path.display())));
    }

    let discovered = Discoverer::new().discover(&self.project_path);

    let state_path = self.cache_dir.join(STATE_FILE);
    let mut hash_cache = FileHashCache::load(&state_path);
    let (mut work_set, mut files_skipped) = Filter::new(&mut hash_cache).filter(&self.project_path, &discovered);

    let mut checkpoint = CheckpointManager::new(&self.cache_dir, self.config.enable_resume);
    let resumed = self.config.enable_resume && checkpoint.exists(collection_name);

    if resumed {
      checkpoint.load(collection_name);
      let pending = checkpoint.get_pending_files(&self.project_path);
      // Resuming replaces the filtered work set with exactly what the
      // checkpoint still considers pending; files the filter would have
      // skipped as unchanged were already accounted for before the crash.
      let pending_set: std::collections::HashSet<_> = pending.iter().cloned().collect();
      files_skipped += work_set.iter().filter(|f| !pending_set.contains(*f)).count();
      work_set = pending;
      tracing::info!(collection_name, pending = work_set.len(), "resuming from checkpoint");
    } else {
      checkpoint.create(collection_name, &self.project_path, &work_set, Some(&self.config))?;
    }

    let mut optimizer = BatchOptimizer::new(self.config.initial_batch_size, self.config.max_batch_size, self.config.memory_threshold_mb);

    let total_files = work_set.len();
    let total_batches_estimate = total_files.div_ceil(self.config.initial_batch_size.max(1));
    self.progress.start(total_files, total_batches_estimate);
    self.progress.update_discovery(discovered.len(), files_skipped);

    let mut result = PipelineResult {
      files_skipped,
      cache_hits: files_skipped,
      cache_misses: discovered.len().saturating_sub(files_skipped),
      ..Default::default()
    };

    let mut remaining = work_set;
    let mut batch_index = checkpoint.get_state().map(|s| s.last_batch_index).unwrap_or(0);
    let mut files_since_checkpoint = 0usize;

    let mut cancelled = false;
    while !remaining.is_empty() {
      if self.cancel.is_cancelled() {
        cancelled = true;
        break;
      }

      let batch_size = optimizer.get_batch_size().max(1);
      let take = batch_size.min(remaining.len());
      let batch: Vec<PathBuf> = remaining.drain(..take).collect();

      self.progress.update_batch(batch_index, batch.len(), None);

      let batch_start = Instant::now();
      let (parsed, parse_failed, parse_ms) = self.parse_phase(&batch);
      let (points, point_owners, embed_failed, chunk_owners, embed_ms) = self.embed_phase(&parsed).await;
      let (store_failed, store_ms) = self.store_phase(collection_name, points, point_owners).await;

      let mut failed_this_batch = parse_failed;
      failed_this_batch.extend(embed_failed);
      for path in &store_failed {
        if !failed_this_batch.contains(path) {
          failed_this_batch.push(path.clone());
        }
      }
      let failed_set: std::collections::HashSet<_> = failed_this_batch.iter().cloned().collect();
      let processed_this_batch: Vec<PathBuf> = batch.iter().filter(|f| !failed_set.contains(*f)).cloned().collect();

      let entities: usize = parsed.iter().filter(|p| !failed_set.contains(&p.path)).map(|p| p.unit.entities.len()).sum();
      let relations: usize = parsed.iter().filter(|p| !failed_set.contains(&p.path)).map(|p| p.unit.relations.len()).sum();
      let chunks: usize = chunk_owners.iter().filter(|(path, _)| !failed_set.contains(path)).count();

      result.files_processed += processed_this_batch.len();
      result.files_failed += failed_this_batch.len();
      result.entities_created += entities;
      result.relations_created += relations;
      result.implementation_chunks += chunks;
      for path in &failed_this_batch {
        result.warnings.push(format!("failed to index {}", path.display()));
      }

      let metrics = BatchMetrics::new(batch.len(), batch_start.elapsed().as_secs_f64() * 1000.0, 0.0, failed_this_batch.len());
      optimizer.record_batch(metrics);

      checkpoint.update_batch(&processed_this_batch, &failed_this_batch, batch_index, entities, relations, chunks);
      files_since_checkpoint += batch.len();
      if files_since_checkpoint >= self.config.checkpoint_interval {
        checkpoint.save()?;
        files_since_checkpoint = 0;
      }

      self.progress.complete_batch(batch_index, entities, relations, chunks, parse_ms, embed_ms, store_ms, processed_this_batch.len());
      for path in &processed_this_batch {
        self.progress.update_file(&path.display().to_string(), FileStatus::Complete);
      }

      batch_index += 1;
      result.batch_count += 1;
    }

    checkpoint.save()?;
    result.checkpoint_path = Some(checkpoint_display_path(&self.cache_dir, collection_name));

    hash_cache.file_count = discovered.len();
    hash_cache.last_indexed_time = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0);
    if let Some(vcs) = &self.vcs {
      hash_cache.last_indexed_commit = vcs.head();
    }
    hash_cache.save(&state_path)?;

    if cancelled {
      result.warnings.push(CANCELLED_MARKER.to_string());
      tracing::info!(collection_name, batch_index, "run cancelled at batch boundary, checkpoint flushed");
    }
    result.success = result.files_failed == 0 && !cancelled;
    result.total_time_seconds = run_start.elapsed().as_secs_f64();

    if result.success {
      checkpoint.clear(collection_name)?;
      result.checkpoint_path = None;
    }

    self.progress.finish(result.success);
    Ok(result)
  }

  /// Parses a batch's files on the rayon pool. Returns successfully parsed
  /// units alongside the list of files that failed to parse.
  fn parse_phase(&self, batch: &[PathBuf]) -> (Vec<PendingUnit>, Vec<PathBuf>, f64) {
    let start = Instant::now();
    let parser = &self.parser;

    let outcomes: Vec<Result<PendingUnit, PathBuf>> = batch
      .par_iter()
      .map(|path| match parser.parse(path) {
        Ok(unit) => Ok(PendingUnit { path: path.clone(), unit }),
        Err(e) => {
          tracing::warn!(path = %path.display(), error = %e, "parse failed");
          Err(path.clone())
        }
      })
      .collect();

    let mut parsed = Vec::new();
    let mut failed = Vec::new();
    for outcome in outcomes {
      match outcome {
        Ok(unit) => parsed.push(unit),
        Err(path) => failed.push(path),
      }
    }

    (parsed, failed, start.elapsed().as_secs_f64() * 1000.0)
  }

  /// Embeds every chunk text across the batch in one call, retrying on
  /// transient [`EmbedError`] variants. A permanent embedding failure
  /// fails every file that contributed a chunk to this batch.
  async fn embed_phase(&self, parsed: &[PendingUnit]) -> (Vec<UpsertPoint>, Vec<PathBuf>, Vec<PathBuf>, Vec<(PathBuf, String)>, f64) {
    let start = Instant::now();

    let mut texts = Vec::new();
    let mut chunk_owners = Vec::new();
    for unit in parsed {
      for chunk in &unit.unit.chunks {
        texts.push(chunk.text.clone());
        chunk_owners.push((unit.path.clone(), chunk.id.clone()));
      }
    }

    if texts.is_empty() {
      return (Vec::new(), Vec::new(), Vec::new(), chunk_owners, start.elapsed().as_secs_f64() * 1000.0);
    }

    match self.embed_with_retry(&texts).await {
      Ok(vectors) => {
        let point_owners: Vec<PathBuf> = chunk_owners.iter().map(|(path, _)| path.clone()).collect();
        let points = vectors
          .into_iter()
          .zip(chunk_owners.iter())
          .map(|(vector, (_, chunk_id))| UpsertPoint {
            id: chunk_id.clone(),
            vector,
            metadata: serde_json::json!({}),
          })
          .collect();
        (points, point_owners, Vec::new(), chunk_owners, start.elapsed().as_secs_f64() * 1000.0)
      }
      Err(e) => {
        tracing::warn!(error = %e, chunks = texts.len(), "embed failed for batch");
        let failed: Vec<PathBuf> = chunk_owners.iter().map(|(path, _)| path.clone()).collect();
        (Vec::new(), Vec::new(), dedup(failed), chunk_owners, start.elapsed().as_secs_f64() * 1000.0)
      }
    }
  }

  async fn embed_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
    let mut attempt = 0;
    loop {
      let outcome = tokio::time::timeout(self.retry.request_timeout, self.embedder.embed(texts)).await;
      match outcome {
        Ok(Ok(vectors)) => return Ok(vectors),
        Ok(Err(e)) if attempt < self.retry.max_retries && is_retryable(&e) => {
          let backoff = self.retry.backoff_for_attempt(attempt);
          tracing::debug!(attempt, ?backoff, "retrying embed after transient failure");
          tokio::time::sleep(backoff).await;
          attempt += 1;
        }
        Ok(Err(e)) => return Err(e),
        Err(_) if attempt < self.retry.max_retries => {
          let backoff = self.retry.backoff_for_attempt(attempt);
          tokio::time::sleep(backoff).await;
          attempt += 1;
        }
        Err(_) => return Err(EmbedError::Failed("request timed out".to_string())),
      }
    }
  }

  /// Stores every point produced by the embed phase. On failure every file
  /// that contributed a point is treated as failed, since `upsert` has no
  /// partial-success contract to recover per-file outcomes from.
  async fn store_phase(&self, collection: &str, points: Vec<UpsertPoint>, point_owners: Vec<PathBuf>) -> (Vec<PathBuf>, f64) {
    let start = Instant::now();
    if points.is_empty() {
      return (Vec::new(), 0.0);
    }
    match self.store.upsert(collection, points).await {
      Ok(()) => (Vec::new(), start.elapsed().as_secs_f64() * 1000.0),
      Err(e) => {
        tracing::warn!(error = %e, "store upsert failed for batch");
        (dedup(point_owners), start.elapsed().as_secs_f64() * 1000.0)
      }
    }
  }
}

fn is_retryable(error: &EmbedError) -> bool {
  matches!(error, EmbedError::Unavailable(_) | EmbedError::RateLimited { .. })
}

fn dedup(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
  paths.sort();
  paths.dedup();
  paths
}

fn checkpoint_display_path(cache_dir: &Path, collection_name: &str) -> String {
  let safe_name = collection_name.replace('/', "_").replace('\\', "_");
  cache_dir
    .join(format!("{}{safe_name}.json", pipeline_checkpoint::CHECKPOINT_PREFIX))
    .display()
    .to_string()
}

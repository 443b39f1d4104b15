mod common;

use common::{ChunkingParser, write_files, FlakyEmbedder};
use pipeline_collab::doubles::InMemoryVectorStore;
use pipeline_core::{IndexingPipeline, RetryConfig};
use pipeline_types::PipelineConfig;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Two consecutive batches whose embed call fails outright (the trait
/// reports embed failures per-batch, never per-item) mark every file in
/// those batches as failed and flip the run's overall `success` to false,
/// while later batches still complete normally.
#[tokio::test]
async fn two_failing_batches_are_recorded_as_failed_files() {
  let project = TempDir::new().unwrap();
  write_files(project.path(), 100);

  let config = PipelineConfig {
    initial_batch_size: 10,
    max_batch_size: 50,
    ..Default::default()
  };
  let fast_retry = RetryConfig {
    max_retries: 1,
    initial_backoff: Duration::from_millis(1),
    max_backoff: Duration::from_millis(5),
    backoff_multiplier: 1.0,
    request_timeout: Duration::from_secs(5),
  };

  let parser = Arc::new(ChunkingParser);
  // Fails both attempts (initial + 1 retry) of the first two batches, then
  // always succeeds.
  let embedder = Arc::new(FlakyEmbedder::new(4, 8));
  let store = Arc::new(InMemoryVectorStore::new());

  let mut pipeline = IndexingPipeline::new(project.path(), config, parser, embedder, store).with_retry_config(fast_retry);
  let result = pipeline.run("error-rate").await.unwrap();

  assert_eq!(result.files_failed, 20, "both 10-file batches that failed embedding should be marked failed");
  assert_eq!(result.files_processed, 80);
  assert!(!result.success, "a run with failed files is not a clean success");
  assert_eq!(result.warnings.len(), 20);
  assert!(result.checkpoint_path.is_some(), "checkpoint survives a run that ends with failures");
}

mod common;

use common::{ChunkingParser, write_files};
use pipeline_collab::doubles::{DeterministicEmbedder, InMemoryVectorStore};
use pipeline_core::IndexingPipeline;
use pipeline_optimizer::BatchOptimizer;
use pipeline_types::{BatchMetrics, PipelineConfig};
use std::sync::Arc;
use tempfile::TempDir;

/// A `memory_threshold_mb` set below the test process's own RSS forces the
/// optimizer to reduce on every check, so the run ends up split across many
/// more (smaller) batches than the configured `initial_batch_size` implies.
#[tokio::test]
async fn low_memory_threshold_drives_the_run_to_small_batches() {
  let project = TempDir::new().unwrap();
  write_files(project.path(), 60);

  let config = PipelineConfig {
    initial_batch_size: 20,
    max_batch_size: 20,
    memory_threshold_mb: 1,
    ..Default::default()
  };
  let parser = Arc::new(ChunkingParser);
  let embedder = Arc::new(DeterministicEmbedder::new(8));
  let store = Arc::new(InMemoryVectorStore::new());

  let mut pipeline = IndexingPipeline::new(project.path(), config, parser, embedder, store);
  let result = pipeline.run("mem-pressure").await.unwrap();

  assert!(result.success);
  assert_eq!(result.files_processed, 60);
  assert!(result.batch_count > 60 / 20, "constant memory pressure should force smaller-than-configured batches");
}

/// The optimizer component itself, exercised the same way the pipeline
/// drives it: a threshold below live RSS reduces on the very first check
/// and records the reason.
#[test]
fn optimizer_records_memory_pressure_as_the_reduction_reason() {
  let mut optimizer = BatchOptimizer::new(20, 100, 1);
  let reduced = optimizer.get_batch_size();
  assert!(reduced < 20);
  optimizer.record_batch(BatchMetrics::new(reduced, 50.0, 0.0, 0));
  let stats = optimizer.get_statistics();
  assert!(stats.reduction_reasons.iter().any(|r| r.contains("memory pressure")));
}

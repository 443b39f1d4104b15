mod common;

use common::{ChunkingParser, write_files};
use pipeline_collab::doubles::{DeterministicEmbedder, InMemoryVectorStore};
use pipeline_core::IndexingPipeline;
use pipeline_types::PipelineConfig;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn first_run_over_100_files_processes_everything() {
  let project = TempDir::new().unwrap();
  write_files(project.path(), 100);

  let config = PipelineConfig::default();
  let parser = Arc::new(ChunkingParser);
  let embedder = Arc::new(DeterministicEmbedder::new(8));
  let store = Arc::new(InMemoryVectorStore::new());

  let mut pipeline = IndexingPipeline::new(project.path(), config, parser, embedder, store.clone());
  let result = pipeline.run("first-run").await.unwrap();

  assert_eq!(result.files_processed, 100);
  assert_eq!(result.files_skipped, 0);
  assert_eq!(result.files_failed, 0);
  assert!(result.batch_count >= 1);
  assert!(result.success);
  assert!(result.checkpoint_path.is_none(), "checkpoint should be cleared on full success");
  assert_eq!(store.point_count("first-run"), 100, "one chunk per file");
}

#[tokio::test]
async fn empty_project_is_a_trivial_success() {
  let project = TempDir::new().unwrap();

  let config = PipelineConfig::default();
  let parser = Arc::new(ChunkingParser);
  let embedder = Arc::new(DeterministicEmbedder::new(8));
  let store = Arc::new(InMemoryVectorStore::new());

  let mut pipeline = IndexingPipeline::new(project.path(), config, parser, embedder, store);
  let result = pipeline.run("empty").await.unwrap();

  assert_eq!(result.total_files(), 0);
  assert!(result.success);
}

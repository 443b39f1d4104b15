mod common;

use common::{ChunkingParser, write_files};
use pipeline_checkpoint::CheckpointManager;
use pipeline_collab::doubles::{DeterministicEmbedder, InMemoryVectorStore};
use pipeline_core::IndexingPipeline;
use pipeline_types::PipelineConfig;
use std::sync::Arc;
use tempfile::TempDir;

/// Simulates a crash after the second of four 25-file batches by writing a
/// checkpoint with the first 50 files already marked processed, then
/// confirms a fresh `run()` picks up exactly the 50 still pending.
#[tokio::test]
async fn resumes_from_checkpoint_after_simulated_crash() {
  let project = TempDir::new().unwrap();
  let files = write_files(project.path(), 100);
  let cache_dir = project.path().join(".index_cache");

  let mut seed = CheckpointManager::new(&cache_dir, true);
  seed.create("resume-coll", project.path(), &files, None).unwrap();
  let (done, pending) = files.split_at(50);
  seed.update_batch(done, &[], 1, done.len(), 0, done.len());
  assert_eq!(seed.get_pending_files(project.path()).len(), pending.len());
  seed.save().unwrap();

  let config = PipelineConfig::default();
  let parser = Arc::new(ChunkingParser);
  let embedder = Arc::new(DeterministicEmbedder::new(8));
  let store = Arc::new(InMemoryVectorStore::new());

  let mut pipeline = IndexingPipeline::new(project.path(), config, parser, embedder, store);
  let result = pipeline.run("resume-coll").await.unwrap();

  assert_eq!(result.files_processed, 50, "only the 50 pending files should be (re)processed");
  assert!(result.success);
  assert!(result.checkpoint_path.is_none(), "checkpoint should be cleared once the resumed run finishes clean");
}

#[tokio::test]
async fn stale_checkpoint_is_ignored_and_run_starts_fresh() {
  let project = TempDir::new().unwrap();
  let files = write_files(project.path(), 10);
  let cache_dir = project.path().join(".index_cache");

  let mut seed = CheckpointManager::new(&cache_dir, true);
  let state = seed.create("stale-coll", project.path(), &files, None).unwrap();
  seed.save().unwrap();

  // Rewrite the persisted checkpoint with an `updated_at` far enough in the
  // past to cross `pipeline_checkpoint::STALE_HOURS`.
  let path = cache_dir.join(format!("{}stale-coll.json", pipeline_checkpoint::CHECKPOINT_PREFIX));
  let mut stale = state;
  stale.updated_at = chrono::Utc::now() - chrono::Duration::hours(pipeline_checkpoint::STALE_HOURS + 1);
  std::fs::write(&path, serde_json::to_vec(&stale).unwrap()).unwrap();

  let config = PipelineConfig::default();
  let parser = Arc::new(ChunkingParser);
  let embedder = Arc::new(DeterministicEmbedder::new(8));
  let store = Arc::new(InMemoryVectorStore::new());

  let mut pipeline = IndexingPipeline::new(project.path(), config, parser, embedder, store);
  let result = pipeline.run("stale-coll").await.unwrap();

  assert_eq!(result.files_processed, 10, "stale checkpoint must not restrict the work set");
}

//! Deterministic, in-memory collaborator implementations for tests.

use crate::errors::{EmbedError, ParseError, StoreError};
use crate::traits::{Embedder, Parser, VcsClient, VectorStore};
use crate::types::{CollectionInfo, Entity, ParsedUnit, UpsertPoint};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Produces a fixed number of entities per file, named from the file's
/// path so output is stable across runs. Useful as the default `Parser`
/// in scenario tests where parse content doesn't matter.
pub struct FixtureParser {
  pub entities_per_file: usize,
}

impl FixtureParser {
  pub fn new(entities_per_file: usize) -> Self {
    Self { entities_per_file }
  }
}

impl Parser for FixtureParser {
  fn parse(&self, path: &Path) -> Result<ParsedUnit, ParseError> {
    let stem = path.to_string_lossy().to_string();
    let entities = (0..self.entities_per_file)
      .map(|i| Entity {
        id: format!("{stem}::entity{i}"),
        metadata: serde_json::json!({ "path": stem }),
      })
      .collect();
    Ok(ParsedUnit {
      entities,
      relations: Vec::new(),
      chunks: Vec::new(),
    })
  }
}

/// Fails every parse with the given error, for testing per-file error
/// attribution without aborting the batch.
pub struct FailingParser;

impl Parser for FailingParser {
  fn parse(&self, path: &Path) -> Result<ParsedUnit, ParseError> {
    Err(ParseError::Malformed(format!("synthetic failure for {}", path.display())))
  }
}

/// Computes deterministic low-dimension vectors from text content, so
/// assertions on embedding output don't depend on floating-point
/// randomness. Not a real embedding model.
pub struct DeterministicEmbedder {
  pub dims: usize,
}

impl DeterministicEmbedder {
  pub fn new(dims: usize) -> Self {
    Self { dims }
  }

  fn vector_for(&self, text: &str) -> Vec<f32> {
    let mut seed: u64 = 1469598103934665603;
    for byte in text.bytes() {
      seed ^= byte as u64;
      seed = seed.wrapping_mul(1099511628211);
    }
    (0..self.dims)
      .map(|i| {
        let bit = seed.rotate_left(i as u32 * 7);
        (bit % 1000) as f32 / 1000.0
      })
      .collect()
  }
}

#[async_trait::async_trait]
impl Embedder for DeterministicEmbedder {
  async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
    Ok(texts.iter().map(|t| self.vector_for(t)).collect())
  }
}

/// Always fails, for exercising embed-phase retry/backoff.
pub struct FailingEmbedder;

#[async_trait::async_trait]
impl Embedder for FailingEmbedder {
  async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
    Err(EmbedError::Unavailable("synthetic failure".into()))
  }
}

/// An in-process vector store backed by a mutex-guarded map, standing in
/// for a real vector database in tests.
#[derive(Default)]
pub struct InMemoryVectorStore {
  collections: Mutex<HashMap<String, Vec<UpsertPoint>>>,
}

impl InMemoryVectorStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn point_count(&self, collection: &str) -> usize {
    self.collections.lock().unwrap().get(collection).map(|v| v.len()).unwrap_or(0)
  }
}

#[async_trait::async_trait]
impl VectorStore for InMemoryVectorStore {
  async fn upsert(&self, collection: &str, points: Vec<UpsertPoint>) -> Result<(), StoreError> {
    let mut guard = self.collections.lock().unwrap();
    let entry = guard.entry(collection.to_string()).or_default();
    for point in points {
      if let Some(existing) = entry.iter_mut().find(|p| p.id == point.id) {
        *existing = point;
      } else {
        entry.push(point);
      }
    }
    Ok(())
  }

  async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError> {
    let guard = self.collections.lock().unwrap();
    Ok(guard.get(name).map(|points| CollectionInfo {
      name: name.to_string(),
      points_count: points.len(),
      status: "green".to_string(),
    }))
  }
}

/// Always unreachable, for exercising store-phase failure handling.
pub struct UnreachableVectorStore;

#[async_trait::async_trait]
impl VectorStore for UnreachableVectorStore {
  async fn upsert(&self, _collection: &str, _points: Vec<UpsertPoint>) -> Result<(), StoreError> {
    Err(StoreError::ConnectionFailed("synthetic failure".into()))
  }

  async fn get_collection(&self, _name: &str) -> Result<Option<CollectionInfo>, StoreError> {
    Err(StoreError::ConnectionFailed("synthetic failure".into()))
  }
}

/// Reports no VCS information at all, as if the project weren't a git
/// checkout.
pub struct NullVcsClient;

impl VcsClient for NullVcsClient {
  fn head(&self) -> Option<String> {
    None
  }
  fn current_branch(&self) -> Option<String> {
    None
  }
  fn status_porcelain(&self) -> Option<Vec<String>> {
    None
  }
  fn recent_subjects(&self, _n: usize) -> Option<Vec<String>> {
    None
  }
  fn commits_between(&self, _from: &str, _to: &str) -> Option<u32> {
    None
  }
}

/// Fixed, caller-supplied VCS answers for deterministic freshness tests.
pub struct FixtureVcsClient {
  pub head: Option<String>,
  pub branch: Option<String>,
  pub dirty_paths: Vec<String>,
  pub subjects: Vec<String>,
  pub commits_behind: Option<u32>,
}

impl VcsClient for FixtureVcsClient {
  fn head(&self) -> Option<String> {
    self.head.clone()
  }
  fn current_branch(&self) -> Option<String> {
    self.branch.clone()
  }
  fn status_porcelain(&self) -> Option<Vec<String>> {
    Some(self.dirty_paths.clone())
  }
  fn recent_subjects(&self, n: usize) -> Option<Vec<String>> {
    Some(self.subjects.iter().take(n).cloned().collect())
  }
  fn commits_between(&self, _from: &str, _to: &str) -> Option<u32> {
    self.commits_behind
  }
}

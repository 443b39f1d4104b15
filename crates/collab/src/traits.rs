use crate::errors::{EmbedError, ParseError, StoreError};
use crate::types::{CollectionInfo, ParsedUnit, UpsertPoint};
use std::path::Path;

/// Extracts entities, relations, and chunks from a single source file.
/// Implementations are language-specific and out of scope for this crate;
/// the pipeline only depends on this trait.
pub trait Parser: Send + Sync {
  fn parse(&self, path: &Path) -> Result<ParsedUnit, ParseError>;
}

/// Computes dense vectors for a batch of texts. Failures are reported for
/// the whole batch, never per element — a partially-embedded batch is
/// treated as a single failed unit by the pipeline's retry policy.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
  async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// The target vector database. Connection pooling and thread-safety are
/// the implementation's responsibility; the core assumes `upsert` may be
/// called concurrently from multiple store-phase tasks.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
  async fn upsert(&self, collection: &str, points: Vec<UpsertPoint>) -> Result<(), StoreError>;
  async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError>;
}

/// Read-only version control queries used by the session-start health
/// probe to judge index freshness. Every method returns `None` rather
/// than erroring when VCS information is unavailable (no repo, no
/// history, subprocess failure) — the probe treats that as "can't tell"
/// rather than "unhealthy".
pub trait VcsClient: Send + Sync {
  fn head(&self) -> Option<String>;
  fn current_branch(&self) -> Option<String>;
  fn status_porcelain(&self) -> Option<Vec<String>>;
  fn recent_subjects(&self, n: usize) -> Option<Vec<String>>;
  fn commits_between(&self, from: &str, to: &str) -> Option<u32>;
}

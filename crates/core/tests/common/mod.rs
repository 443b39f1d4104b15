use pipeline_collab::errors::{EmbedError, ParseError};
use pipeline_collab::types::{Chunk, Entity, ParsedUnit};
use pipeline_collab::{Embedder, Parser};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Parses every file into one entity and one chunk, so the embed phase
/// always has something to do.
pub struct ChunkingParser;

impl Parser for ChunkingParser {
  fn parse(&self, path: &Path) -> Result<ParsedUnit, ParseError> {
    let stem = path.to_string_lossy().to_string();
    Ok(ParsedUnit {
      entities: vec![Entity {
        id: format!("{stem}::entity"),
        metadata: serde_json::json!({}),
      }],
      relations: Vec::new(),
      chunks: vec![Chunk {
        id: format!("{stem}::chunk"),
        text: stem,
        metadata: serde_json::json!({}),
      }],
    })
  }
}

/// Deterministic embedder that fails every call in its first `fail_calls`
/// invocations, then always succeeds, for exercising the optimizer's
/// error-rate ramp-down at the pipeline level.
pub struct FlakyEmbedder {
  fail_calls: usize,
  calls: AtomicUsize,
  dims: usize,
}

impl FlakyEmbedder {
  pub fn new(fail_calls: usize, dims: usize) -> Self {
    Self {
      fail_calls,
      calls: AtomicUsize::new(0),
      dims,
    }
  }

  fn vector_for(&self, text: &str) -> Vec<f32> {
    let mut seed: u64 = 1469598103934665603;
    for byte in text.bytes() {
      seed ^= byte as u64;
      seed = seed.wrapping_mul(1099511628211);
    }
    (0..self.dims).map(|i| (seed.rotate_left(i as u32 * 7) % 1000) as f32 / 1000.0).collect()
  }
}

#[async_trait::async_trait]
impl Embedder for FlakyEmbedder {
  async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
    let call = self.calls.fetch_add(1, Ordering::SeqCst);
    if call < self.fail_calls {
      return Err(EmbedError::Unavailable("synthetic flaky failure".to_string()));
    }
    Ok(texts.iter().map(|t| self.vector_for(t)).collect())
  }
}

pub fn write_files(dir: &std::path::Path, count: usize) -> Vec<std::path::PathBuf> {
  (0..count)
    .map(|i| {
      let path = dir.join(format!("file_{i:03}.rs"));
      std::fs::write(&path, format!("fn f{i}() {{}}")).unwrap();
      path
    })
    .collect()
}

use thiserror::Error;

/// Error kinds shared across the indexing pipeline crates.
///
/// Variants mirror the taxonomy in the pipeline's error-handling design:
/// transient collaborator failures and per-file/per-batch problems are
/// folded into `BatchResult`/`PipelineResult` instead of raising here.
/// Only conditions that must abort a run before work starts, or that
/// indicate a broken local invariant, become a `PipelineError`.
#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("IO: {0}")]
  Io(#[from] std::io::Error),

  #[error("serialization: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("invalid configuration: {0}")]
  Config(String),

  #[error("fatal: {0}")]
  Fatal(String),

  #[error("collaborator error: {0}")]
  Collaborator(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

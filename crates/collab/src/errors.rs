use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
  #[error("io: {0}")]
  Io(#[from] std::io::Error),
  #[error("parse failed: {0}")]
  Malformed(String),
  #[error("unsupported file type: {0}")]
  Unsupported(String),
}

#[derive(Error, Debug)]
pub enum EmbedError {
  #[error("embedding provider unavailable: {0}")]
  Unavailable(String),
  #[error("rate limited, retry after {retry_after_ms}ms")]
  RateLimited { retry_after_ms: u64 },
  #[error("embedding failed: {0}")]
  Failed(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("connection failed: {0}")]
  ConnectionFailed(String),
  #[error("collection not found: {0}")]
  CollectionNotFound(String),
  #[error("upsert failed: {0}")]
  UpsertFailed(String),
}

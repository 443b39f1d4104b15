use serde::{Deserialize, Serialize};

/// A structural entity extracted from a source file. The core treats the
/// payload as opaque beyond its `id`; shape is a parser concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
  pub id: String,
  pub metadata: serde_json::Value,
}

/// A relation between two entities, stored by id to avoid cyclic
/// in-memory graphs (mutually recursive call graphs are common output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
  pub id: String,
  pub from_entity: String,
  pub to_entity: String,
  pub metadata: serde_json::Value,
}

/// An embeddable unit of source text, e.g. a function body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
  pub id: String,
  pub text: String,
  pub metadata: serde_json::Value,
}

/// Output of parsing one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedUnit {
  pub entities: Vec<Entity>,
  pub relations: Vec<Relation>,
  pub chunks: Vec<Chunk>,
}

/// One vector + metadata pair ready for upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertPoint {
  pub id: String,
  pub vector: Vec<f32>,
  pub metadata: serde_json::Value,
}

/// Collection metadata as reported by the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
  pub name: String,
  pub points_count: usize,
  pub status: String,
}

//! Filtering: drop files unchanged since the last index, via a
//! project-level content-fingerprint cache at `<project>/.index_cache/state.json`.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// The project's persisted file-hash cache. Reserved keys (`_file_count`,
/// `_last_indexed_time`, `_last_indexed_commit`) sit alongside a flat
/// `relative_path → fingerprint` map in the same JSON object, matching
/// the on-disk layout the health probe also reads.
#[derive(Debug, Clone, Default)]
pub struct FileHashCache {
  pub file_count: usize,
  pub last_indexed_time: f64,
  pub last_indexed_commit: Option<String>,
  pub fingerprints: HashMap<String, String>,
}

impl FileHashCache {
  pub fn load(path: &Path) -> Self {
    let Ok(bytes) = std::fs::read(path) else { return Self::default() };
    let Ok(serde_json::Value::Object(map)) = serde_json::from_slice(&bytes) else {
      return Self::default();
    };

    let mut cache = Self::default();
    for (key, value) in map {
      match key.as_str() {
        "_file_count" => cache.file_count = value.as_u64().unwrap_or(0) as usize,
        "_last_indexed_time" => cache.last_indexed_time = value.as_f64().unwrap_or(0.0),
        "_last_indexed_commit" => cache.last_indexed_commit = value.as_str().map(str::to_string),
        _ => {
          if let Some(fingerprint) = value.as_str() {
            cache.fingerprints.insert(key, fingerprint.to_string());
          }
        }
      }
    }
    cache
  }

  pub fn save(&self, path: &Path) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut map = serde_json::Map::new();
    map.insert("_file_count".to_string(), serde_json::json!(self.file_count));
    map.insert("_last_indexed_time".to_string(), serde_json::json!(self.last_indexed_time));
    if let Some(commit) = &self.last_indexed_commit {
      map.insert("_last_indexed_commit".to_string(), serde_json::json!(commit));
    }
    for (path, fingerprint) in &self.fingerprints {
      map.insert(path.clone(), serde_json::json!(fingerprint));
    }

    let bytes = serde_json::to_vec_pretty(&serde_json::Value::Object(map))?;
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(&bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
  }
}

/// Drops unchanged files from a candidate set using a size+mtime fast
/// path before falling back to a full SHA-256 content hash.
pub struct Filter<'a> {
  cache: &'a mut FileHashCache,
}

impl<'a> Filter<'a> {
  pub fn new(cache: &'a mut FileHashCache) -> Self {
    Self { cache }
  }

  /// Splits `candidates` (absolute paths) into (work set, skipped count),
  /// updating the cache in place for every file that was hashed. Files
  /// whose metadata can't be read are treated as changed (included) so a
  /// transient stat failure never silently drops work.
  pub fn filter(&mut self, project_path: &Path, candidates: &[PathBuf]) -> (Vec<PathBuf>, usize) {
    let mut work_set = Vec::new();
    let mut skipped = 0;

    for path in candidates {
      let rel = path.strip_prefix(project_path).unwrap_or(path).to_string_lossy().replace('\\', "/");

      match fast_path(path) {
        Some(fast) => {
          if self.cache.fingerprints.get(&rel).is_some_and(|stored| stored.starts_with(&fast)) {
            skipped += 1;
            continue;
          }
          let Ok(full) = full_fingerprint(path, &fast) else {
            work_set.push(path.clone());
            continue;
          };
          self.cache.fingerprints.insert(rel, full);
          work_set.push(path.clone());
        }
        None => work_set.push(path.clone()),
      }
    }

    (work_set, skipped)
  }
}

fn fast_path(path: &Path) -> Option<String> {
  let metadata = std::fs::metadata(path).ok()?;
  let mtime = metadata.modified().ok()?.duration_since(UNIX_EPOCH).ok()?.as_secs();
  Some(format!("{}:{}", metadata.len(), mtime))
}

fn full_fingerprint(path: &Path, fast: &str) -> std::io::Result<String> {
  let bytes = std::fs::read(path)?;
  let mut hasher = Sha256::new();
  hasher.update(&bytes);
  let digest = hasher.finalize();
  Ok(format!("{fast}:{}", hex::encode(digest)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn unchanged_file_is_skipped_on_second_pass() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("a.rs");
    std::fs::write(&file, "fn a() {}").unwrap();

    let mut cache = FileHashCache::default();
    let (work_set, skipped) = Filter::new(&mut cache).filter(dir.path(), &[file.clone()]);
    assert_eq!(work_set.len(), 1);
    assert_eq!(skipped, 0);

    let (work_set, skipped) = Filter::new(&mut cache).filter(dir.path(), &[file]);
    assert_eq!(work_set.len(), 0);
    assert_eq!(skipped, 1);
  }

  #[test]
  fn modified_file_is_reincluded() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("a.rs");
    std::fs::write(&file, "fn a() {}").unwrap();

    let mut cache = FileHashCache::default();
    Filter::new(&mut cache).filter(dir.path(), &[file.clone()]);

    std::fs::write(&file, "fn a() { /* changed, forces a new mtime+size */ }").unwrap();
    let (work_set, _) = Filter::new(&mut cache).filter(dir.path(), &[file]);
    assert_eq!(work_set.len(), 1);
  }

  #[test]
  fn cache_round_trips_through_disk() {
    let dir = TempDir::new().unwrap();
    let mut cache = FileHashCache {
      file_count: 2,
      last_indexed_time: 123.0,
      last_indexed_commit: Some("abc".to_string()),
      fingerprints: HashMap::from([("a.rs".to_string(), "1:2:deadbeef".to_string())]),
    };
    let path = dir.path().join("state.json");
    cache.save(&path).unwrap();

    let loaded = FileHashCache::load(&path);
    assert_eq!(loaded.file_count, 2);
    assert_eq!(loaded.last_indexed_commit, Some("abc".to_string()));
    assert_eq!(loaded.fingerprints.get("a.rs"), Some(&"1:2:deadbeef".to_string()));
    cache.fingerprints.clear();
  }
}

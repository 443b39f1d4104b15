//! Resume-checkpoint persistence for the indexing pipeline.
//!
//! One checkpoint file per collection, written atomically (temp file +
//! rename) so a crash mid-write never leaves a half-written checkpoint
//! behind. Checkpoints older than [`STALE_HOURS`] are treated as absent.

use chrono::Utc;
use pipeline_types::{CheckpointState, PipelineConfig};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CHECKPOINT_PREFIX: &str = "indexing_checkpoint_";
pub const STALE_HOURS: i64 = 24;

/// Manages checkpoint persistence for one pipeline run.
///
/// Not thread-safe on its own; callers sharing a manager across tasks must
/// hold it behind a mutex. Writes are gated by a dirty flag so repeated
/// `save()` calls with no intervening `update()` are no-ops.
pub struct CheckpointManager {
  cache_dir: PathBuf,
  enabled: bool,
  state: Option<CheckpointState>,
  dirty: bool,
}

impl CheckpointManager {
  pub fn new(cache_dir: impl Into<PathBuf>, enabled: bool) -> Self {
    Self {
      cache_dir: cache_dir.into(),
      enabled,
      state: None,
      dirty: false,
    }
  }

  fn checkpoint_path(&self, collection_name: &str) -> PathBuf {
    let safe_name = collection_name.replace('/', "_").replace('\\', "_");
    self.cache_dir.join(format!("{CHECKPOINT_PREFIX}{safe_name}.json"))
  }

  /// True if a non-stale checkpoint file exists for `collection_name`.
  pub fn exists(&self, collection_name: &str) -> bool {
    if !self.enabled {
      return false;
    }
    let path = self.checkpoint_path(collection_name);
    if !path.exists() {
      return false;
    }
    match load_state(&path) {
      Ok(Some(state)) => !is_stale(&state, Utc::now()),
      _ => false,
    }
  }

  /// Loads the checkpoint for `collection_name` if present and fresh.
  /// A stale checkpoint is cleared from disk rather than returned.
  pub fn load(&mut self, collection_name: &str) -> Option<CheckpointState> {
    if !self.enabled {
      return None;
    }
    let path = self.checkpoint_path(collection_name);
    if !path.exists() {
      return None;
    }

    match load_state(&path) {
      Ok(Some(state)) if !is_stale(&state, Utc::now()) => {
        tracing::info!(
          processed = state.processed_files.len(),
          pending = state.pending_files.len(),
          "loaded checkpoint"
        );
        self.state = Some(state.clone());
        Some(state)
      }
      Ok(Some(state)) => {
        tracing::warn!(updated_at = %state.updated_at, "checkpoint is stale, ignoring");
        let _ = self.clear(collection_name);
        None
      }
      Ok(None) | Err(_) => {
        tracing::warn!("failed to parse checkpoint, ignoring");
        None
      }
    }
  }

  /// Creates a new checkpoint at the start of a run, with every file in
  /// `all_files` pending. Paths are stored relative to `project_path`
  /// when possible, falling back to the absolute path otherwise.
  pub fn create(
    &mut self,
    collection_name: &str,
    project_path: &Path,
    all_files: &[PathBuf],
    config: Option<&PipelineConfig>,
  ) -> std::io::Result<CheckpointState> {
    if !self.enabled {
      let pending = all_files.iter().map(|f| f.display().to_string()).collect();
      return Ok(CheckpointState::new(collection_name, project_path.display().to_string(), pending));
    }

    let pending: Vec<String> = all_files.iter().map(|f| relativize(f, project_path)).collect();

    let mut state = CheckpointState::new(collection_name, project_path.display().to_string(), pending);
    if let Some(cfg) = config {
      state.config = serde_json::json!({
        "initial_batch_size": cfg.initial_batch_size,
        "max_batch_size": cfg.max_batch_size,
        "checkpoint_interval": cfg.checkpoint_interval,
      });
    }

    std::fs::create_dir_all(&self.cache_dir)?;
    self.dirty = true;
    tracing::debug!(collection_name, files = all_files.len(), "created checkpoint");
    self.state = Some(state.clone());
    Ok(state)
  }

  /// Records a single file's outcome. `entities`/`relations`/`chunks` add
  /// to the running totals and are no-ops at zero.
  pub fn update(
    &mut self,
    processed_file: Option<&Path>,
    failed_file: Option<&Path>,
    batch_index: Option<usize>,
    entities: usize,
    relations: usize,
    chunks: usize,
  ) {
    if !self.enabled {
      return;
    }
    let Some(state) = self.state.as_mut() else { return };
    let project_path = PathBuf::from(&state.project_path);

    if let Some(f) = processed_file {
      state.mark_processed(&relativize(f, &project_path));
      self.dirty = true;
    }
    if let Some(f) = failed_file {
      state.mark_failed(&relativize(f, &project_path));
      self.dirty = true;
    }
    if let Some(idx) = batch_index {
      state.last_batch_index = idx;
      self.dirty = true;
    }
    if entities > 0 {
      state.entities_created += entities;
      self.dirty = true;
    }
    if relations > 0 {
      state.relations_created += relations;
      self.dirty = true;
    }
    if chunks > 0 {
      state.chunks_created += chunks;
      self.dirty = true;
    }
    if self.dirty {
      state.updated_at = Utc::now();
    }
  }

  /// Applies every file outcome in a completed batch, then records the
  /// batch index and creation counts in a single timestamp update.
  pub fn update_batch(
    &mut self,
    processed_files: &[PathBuf],
    failed_files: &[PathBuf],
    batch_index: usize,
    entities: usize,
    relations: usize,
    chunks: usize,
  ) {
    for f in processed_files {
      self.update(Some(f), None, None, 0, 0, 0);
    }
    for f in failed_files {
      self.update(None, Some(f), None, 0, 0, 0);
    }
    self.update(None, None, Some(batch_index), entities, relations, chunks);
  }

  /// Persists the checkpoint to disk via temp file + rename. No-op if
  /// disabled, uninitialized, or unchanged since the last save.
  pub fn save(&mut self) -> std::io::Result<()> {
    if !self.enabled || !self.dirty {
      return Ok(());
    }
    let Some(state) = self.state.as_ref() else { return Ok(()) };

    std::fs::create_dir_all(&self.cache_dir)?;
    let path = self.checkpoint_path(&state.collection_name);
    let bytes = serde_json::to_vec_pretty(state)?;

    let mut temp = tempfile::NamedTempFile::new_in(&self.cache_dir)?;
    temp.write_all(&bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(&path).map_err(|e| e.error)?;

    self.dirty = false;
    tracing::debug!(
      processed = state.processed_files.len(),
      pending = state.pending_files.len(),
      "saved checkpoint"
    );
    Ok(())
  }

  /// Deletes the checkpoint file for `collection_name` after a successful
  /// run and drops any in-memory state.
  pub fn clear(&mut self, collection_name: &str) -> std::io::Result<()> {
    if !self.enabled {
      return Ok(());
    }
    let path = self.checkpoint_path(collection_name);
    if path.exists() {
      std::fs::remove_file(&path)?;
      tracing::debug!(collection_name, "cleared checkpoint");
    }
    self.state = None;
    self.dirty = false;
    Ok(())
  }

  /// Pending files as absolute paths, filtered to those that still exist
  /// on disk (a file may have been deleted since the checkpoint was saved).
  pub fn get_pending_files(&self, project_path: &Path) -> Vec<PathBuf> {
    let Some(state) = &self.state else { return Vec::new() };
    state
      .pending_files
      .iter()
      .map(|rel| project_path.join(rel))
      .filter(|p| p.exists())
      .collect()
  }

  pub fn get_state(&self) -> Option<&CheckpointState> {
    self.state.as_ref()
  }

  pub fn has_pending(&self) -> bool {
    self.state.as_ref().is_some_and(|s| !s.pending_files.is_empty())
  }

  pub fn progress_percent(&self) -> f64 {
    self.state.as_ref().map(|s| s.progress_percent()).unwrap_or(0.0)
  }
}

fn relativize(path: &Path, project_path: &Path) -> String {
  path.strip_prefix(project_path).unwrap_or(path).display().to_string()
}

fn load_state(path: &Path) -> std::io::Result<Option<CheckpointState>> {
  let bytes = std::fs::read(path)?;
  match serde_json::from_slice(&bytes) {
    Ok(state) => Ok(Some(state)),
    Err(_) => Ok(None),
  }
}

fn is_stale(state: &CheckpointState, now: chrono::DateTime<Utc>) -> bool {
  state.is_stale(now, STALE_HOURS)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"x").unwrap();
    path
  }

  #[test]
  fn create_then_save_then_load_round_trips() {
    let cache = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let files = vec![touch(project.path(), "a.rs"), touch(project.path(), "b.rs")];

    let mut mgr = CheckpointManager::new(cache.path(), true);
    mgr.create("coll", project.path(), &files, None).unwrap();
    mgr.update(Some(&files[0]), None, Some(0), 2, 1, 3);
    mgr.save().unwrap();

    let mut reloaded = CheckpointManager::new(cache.path(), true);
    let state = reloaded.load("coll").expect("checkpoint should load");
    assert_eq!(state.processed_files, vec!["a.rs".to_string()]);
    assert_eq!(state.pending_files, vec!["b.rs".to_string()]);
    assert_eq!(state.entities_created, 2);
  }

  #[test]
  fn save_is_a_noop_when_not_dirty() {
    let cache = TempDir::new().unwrap();
    let mut mgr = CheckpointManager::new(cache.path(), true);
    mgr.create("coll", Path::new("/proj"), &[], None).unwrap();
    mgr.save().unwrap();
    let path = mgr.checkpoint_path("coll");
    let modified_first = std::fs::metadata(&path).unwrap().modified().unwrap();

    mgr.save().unwrap(); // dirty flag already cleared; should not rewrite
    let modified_second = std::fs::metadata(&path).unwrap().modified().unwrap();
    assert_eq!(modified_first, modified_second);
  }

  #[test]
  fn disabled_manager_never_touches_disk() {
    let cache = TempDir::new().unwrap();
    let mut mgr = CheckpointManager::new(cache.path(), false);
    mgr.create("coll", Path::new("/proj"), &[], None).unwrap();
    mgr.save().unwrap();
    assert!(!cache.path().join(format!("{CHECKPOINT_PREFIX}coll.json")).exists());
  }

  #[test]
  fn collection_name_with_slashes_is_sanitized() {
    let cache = TempDir::new().unwrap();
    let mgr = CheckpointManager::new(cache.path(), true);
    let path = mgr.checkpoint_path("team/my collection\\x");
    assert_eq!(path.file_name().unwrap().to_str().unwrap(), "indexing_checkpoint_team_my collection_x.json");
  }

  #[test]
  fn stale_checkpoint_is_not_loaded() {
    let cache = TempDir::new().unwrap();
    let mut state = CheckpointState::new("coll", "/proj", vec!["a.rs".into()]);
    state.updated_at = Utc::now() - chrono::Duration::hours(25);
    let path = cache.path().join(format!("{CHECKPOINT_PREFIX}coll.json"));
    std::fs::write(&path, serde_json::to_vec(&state).unwrap()).unwrap();

    let mut mgr = CheckpointManager::new(cache.path(), true);
    assert!(mgr.load("coll").is_none());
    assert!(!path.exists(), "stale checkpoint should be cleared from disk");
  }

  #[test]
  fn get_pending_files_filters_deleted_files() {
    let cache = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let kept = touch(project.path(), "kept.rs");
    let deleted = project.path().join("deleted.rs");
    std::fs::write(&deleted, b"x").unwrap();

    let mut mgr = CheckpointManager::new(cache.path(), true);
    mgr.create("coll", project.path(), &[kept.clone(), deleted.clone()], None).unwrap();
    std::fs::remove_file(&deleted).unwrap();

    let pending = mgr.get_pending_files(project.path());
    assert_eq!(pending, vec![kept]);
  }

  #[test]
  fn clear_removes_file_and_resets_state() {
    let cache = TempDir::new().unwrap();
    let mut mgr = CheckpointManager::new(cache.path(), true);
    mgr.create("coll", Path::new("/proj"), &[], None).unwrap();
    mgr.save().unwrap();
    mgr.clear("coll").unwrap();
    assert!(!mgr.checkpoint_path("coll").exists());
    assert!(mgr.get_state().is_none());
  }

  #[test]
  fn update_batch_applies_all_outcomes_in_one_timestamp() {
    let cache = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let a = touch(project.path(), "a.rs");
    let b = touch(project.path(), "b.rs");

    let mut mgr = CheckpointManager::new(cache.path(), true);
    mgr.create("coll", project.path(), &[a.clone(), b.clone()], None).unwrap();
    mgr.update_batch(&[a], &[b], 1, 5, 2, 7);

    let state = mgr.get_state().unwrap();
    assert_eq!(state.processed_files, vec!["a.rs".to_string()]);
    assert_eq!(state.failed_files, vec!["b.rs".to_string()]);
    assert_eq!(state.last_batch_index, 1);
    assert_eq!(state.entities_created, 5);
  }
}

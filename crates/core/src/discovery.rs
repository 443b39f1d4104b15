//! Discovery: walk the project tree for candidate source files.

use ignore::WalkBuilder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Name of the directory the pipeline persists its own state under
/// (`crate::filter`, `pipeline_checkpoint`). Never a candidate for indexing.
pub const CACHE_DIR_NAME: &str = ".index_cache";

/// Walks `root`, respecting `.gitignore` and friends, and returns every
/// regular file found in deterministic (sorted) order. Sorting is what
/// makes batch/file assignment reproducible across runs on the same tree,
/// since `ignore::Walk` itself makes no ordering guarantee when combined
/// with parallel traversal.
pub struct Discoverer {
  follow_links: bool,
}

impl Default for Discoverer {
  fn default() -> Self {
    Self::new()
  }
}

impl Discoverer {
  pub fn new() -> Self {
    Self { follow_links: false }
  }

  pub fn discover(&self, root: &Path) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(root)
      .follow_links(self.follow_links)
      .hidden(false)
      .git_ignore(true)
      .git_global(true)
      .git_exclude(true)
      .filter_entry(|entry| entry.file_name() != CACHE_DIR_NAME)
      .build();

    let mut files: Vec<PathBuf> = walker
      .filter_map(|entry| entry.ok())
      .par_bridge()
      .filter_map(|entry| {
        if entry.file_type().is_none_or(|ft| !ft.is_file()) {
          return None;
        }
        Some(entry.path().to_path_buf())
      })
      .collect();

    files.sort();
    files
  }
}

//! Persistent stage cache shared across runs and components.
//!
//! Builders decide how to key their entries; the cache only provides a
//! deterministic layout and a size bound:
//!
//! ```text
//! <base>/<component>/<stage>/<release|snapshot>/<id>/<file>
//! ```
//!
//! Entries are advisory. Nothing may assume an entry is still present, since
//! [`Cache::enforce_max_size`] evicts the oldest files after every run.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::DistKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cache {
  base: PathBuf,
  max_files: usize,
}

impl Cache {
  pub fn new(base: impl Into<PathBuf>, max_files: usize) -> Self {
    Self {
      base: base.into(),
      max_files,
    }
  }

  pub fn base(&self) -> &Path {
    &self.base
  }

  pub fn max_files(&self) -> usize {
    self.max_files
  }

  /// The location of a cached stage output.
  pub fn path(&self, component: &str, stage: &str, dist: DistKind, id: &str, file: &str) -> PathBuf {
    self
      .base
      .join(component)
      .join(stage)
      .join(dist.as_str())
      .join(id)
      .join(file)
  }

  /// Delete the least recently modified regular files until at most
  /// `max_files` remain. Returns the number of files removed.
  pub fn enforce_max_size(&self) -> std::io::Result<usize> {
    if !self.base.is_dir() {
      return Ok(0);
    }

    let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in WalkDir::new(&self.base) {
      let entry = entry.map_err(std::io::Error::other)?;
      if !entry.file_type().is_file() {
        continue;
      }
      let modified = entry.metadata().map_err(std::io::Error::other)?.modified()?;
      files.push((modified, entry.into_path()));
    }

    if files.len() <= self.max_files {
      return Ok(0);
    }

    files.sort();
    let excess = files.len() - self.max_files;
    for (_, path) in files.iter().take(excess) {
      debug!(path = %path.display(), "evicting cache entry");
      std::fs::remove_file(path)?;
    }
    info!(removed = excess, kept = self.max_files, "cache trimmed");
    Ok(excess)
  }
}

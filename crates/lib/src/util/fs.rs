//! Filesystem helpers.

use std::fs;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use walkdir::WalkDir;

/// Recursively copy the contents of `src` into `dest`, creating `dest` if needed.
///
/// Symlinks are followed; the copy holds regular files only.
pub fn copy_tree(src: &Path, dest: &Path) -> io::Result<()> {
  fs::create_dir_all(dest)?;
  for entry in WalkDir::new(src).follow_links(true) {
    let entry = entry.map_err(io::Error::other)?;
    let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    let target = dest.join(relative);
    if entry.file_type().is_dir() {
      fs::create_dir_all(&target)?;
    } else if entry.file_type().is_file() {
      if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
      }
      fs::copy(entry.path(), &target)?;
    }
  }
  Ok(())
}

/// Copy a file or directory to `dest`.
pub fn copy_path(src: &Path, dest: &Path) -> io::Result<()> {
  if src.is_dir() {
    copy_tree(src, dest)
  } else {
    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::copy(src, dest).map(|_| ())
  }
}

/// The most recent modification time, in whole seconds since the epoch, of
/// `path` or anything below it.
pub fn last_modification(path: &Path) -> io::Result<u64> {
  let mut latest = 0;
  for entry in WalkDir::new(path) {
    let entry = entry.map_err(io::Error::other)?;
    let modified = entry.metadata().map_err(io::Error::other)?.modified()?;
    let secs = modified.duration_since(UNIX_EPOCH).map_err(io::Error::other)?.as_secs();
    latest = latest.max(secs);
  }
  Ok(latest)
}

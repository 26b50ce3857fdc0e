//! Default locations for the stage cache and component resources.

use std::path::{Path, PathBuf};

use crate::consts::{APP_NAME, RESOURCE_PATH_ENV};

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("USERPROFILE").map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("HOME").map(PathBuf::from)
}

/// Returns the directory for cache files for the application
#[cfg(windows)]
pub fn cache_dir() -> Option<PathBuf> {
  std::env::var_os("LOCALAPPDATA").map(|dir| PathBuf::from(dir).join(APP_NAME).join("Cache"))
}

/// Returns the directory for cache files for the application
#[cfg(not(windows))]
pub fn cache_dir() -> Option<PathBuf> {
  let cache_home = match std::env::var_os("XDG_CACHE_HOME") {
    Some(dir) if !dir.is_empty() => PathBuf::from(dir),
    _ => home_dir()?.join(".cache"),
  };
  Some(cache_home.join(APP_NAME))
}

/// Returns the root directory holding per-component resources
pub fn resource_dir() -> PathBuf {
  match std::env::var_os(RESOURCE_PATH_ENV) {
    Some(dir) if !dir.is_empty() => PathBuf::from(dir),
    _ => PathBuf::from("resources"),
  }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
  match path.strip_prefix("~") {
    Ok(rest) => match home_dir() {
      Some(home) => home.join(rest),
      None => path.to_path_buf(),
    },
    Err(_) => path.to_path_buf(),
  }
}

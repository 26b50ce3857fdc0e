//! Hashing utilities for image identifiers.
//!
//! - `hash_bytes()`: full SHA-256 of arbitrary bytes
//! - `short_hash()`: truncated hash used inside image tags
//! - `snapshot_id()`: identifier of a local snapshot distribution

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::consts::ID_HASH_PREFIX_LEN;
use crate::util::fs::last_modification;

/// A full 64-character SHA256 hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}

/// A hash short enough to appear in an image tag.
pub fn short_hash(data: &[u8]) -> String {
  let full = hash_bytes(data);
  full.0[..ID_HASH_PREFIX_LEN].to_string()
}

/// Identify a snapshot by where it lives and when it last changed.
///
/// The id is `<short hash of the canonical path>_<latest mtime in seconds>`, so
/// touching any file in the tree yields a new image tag.
pub fn snapshot_id(path: &Path) -> std::io::Result<String> {
  let canonical = dunce::canonicalize(path)?;
  let modified = last_modification(&canonical)?;
  Ok(format!(
    "{}_{}",
    short_hash(canonical.to_string_lossy().as_bytes()),
    modified
  ))
}

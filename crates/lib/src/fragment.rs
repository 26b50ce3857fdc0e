//! Per-component output fragments.
//!
//! A [`ManifestFragment`] is a partial compose document (top-level sections such
//! as `services` or `volumes`). A [`ConfigFragment`] is a flat listing of
//! `key=value` lines. Both are produced by builders and consumed, unchanged, by
//! the merger.

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FragmentError {
  #[error("failed to read fragment {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid manifest fragment {path}: {source}")]
  Yaml {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("manifest fragment {path} must be a mapping")]
  NotAMapping { path: PathBuf },

  #[error("{path}:{line}: expected 'key=value', got '{content}'")]
  InvalidLine {
    path: PathBuf,
    line: usize,
    content: String,
  },
}

/// A partial service-manifest document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestFragment(pub Mapping);

impl ManifestFragment {
  pub fn new(document: Mapping) -> Self {
    Self(document)
  }

  /// Parse fragment text. An empty document is an empty fragment.
  pub fn parse(path: &Path, text: &str) -> Result<Self, FragmentError> {
    if text.trim().is_empty() {
      return Ok(Self::default());
    }
    let value: Value = serde_yaml::from_str(text).map_err(|source| FragmentError::Yaml {
      path: path.to_path_buf(),
      source,
    })?;
    match value {
      Value::Mapping(document) => Ok(Self(document)),
      Value::Null => Ok(Self::default()),
      _ => Err(FragmentError::NotAMapping {
        path: path.to_path_buf(),
      }),
    }
  }

  /// Read a fragment file. A component without one contributes nothing.
  pub fn load(path: &Path) -> Result<Self, FragmentError> {
    match std::fs::read_to_string(path) {
      Ok(text) => Self::parse(path, &text),
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
      Err(source) => Err(FragmentError::Io {
        path: path.to_path_buf(),
        source,
      }),
    }
  }

  pub fn document(&self) -> &Mapping {
    &self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Names of the services this fragment declares.
  pub fn services(&self) -> Vec<String> {
    self
      .0
      .get("services")
      .and_then(Value::as_mapping)
      .map(|services| services.keys().filter_map(Value::as_str).map(str::to_string).collect())
      .unwrap_or_default()
  }
}

/// A flat configuration listing, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFragment {
  pub entries: Vec<(String, String)>,
}

impl ConfigFragment {
  pub fn new(entries: Vec<(String, String)>) -> Self {
    Self { entries }
  }

  /// Parse `key=value` lines. Blank lines and `#` comments are skipped; the
  /// value is everything after the first `=`.
  pub fn parse(path: &Path, text: &str) -> Result<Self, FragmentError> {
    let mut entries = Vec::new();
    for (index, line) in text.lines().enumerate() {
      let trimmed = line.trim();
      if trimmed.is_empty() || trimmed.starts_with('#') {
        continue;
      }
      let invalid = || FragmentError::InvalidLine {
        path: path.to_path_buf(),
        line: index + 1,
        content: trimmed.to_string(),
      };
      let (key, value) = trimmed.split_once('=').ok_or_else(invalid)?;
      let key = key.trim();
      if key.is_empty() {
        return Err(invalid());
      }
      entries.push((key.to_string(), value.trim().to_string()));
    }
    Ok(Self { entries })
  }

  /// Read a fragment file. A component without one contributes nothing.
  pub fn load(path: &Path) -> Result<Self, FragmentError> {
    match std::fs::read_to_string(path) {
      Ok(text) => Self::parse(path, &text),
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
      Err(source) => Err(FragmentError::Io {
        path: path.to_path_buf(),
        source,
      }),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

//! Per-component declarative metadata (`assembly.yaml`).
//!
//! ```yaml
//! dependencies: [hadoop]
//! url: https://archive.apache.org/dist/hive/hive-{version}/apache-hive-{version}-bin.tar.gz
//! version_command: hive --version
//! version_regex: 'Hive (\d+\.\d+\.\d+)'
//! ```
//!
//! `url`, `version_command` and `version_regex` are only meaningful to the
//! generic builder, which validates them itself.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
  #[error("failed to read descriptor {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid descriptor {path}: {source}")]
  Yaml {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("component '{component}' lists dependency '{dependency}' more than once")]
  DuplicateDependency { component: String, dependency: String },

  #[error("component '{component}' depends on itself")]
  SelfDependency { component: String },

  #[error("descriptor of '{component}' is missing '{field}'")]
  MissingField { component: String, field: &'static str },

  #[error("version_regex of '{component}' is invalid: {source}")]
  InvalidRegex {
    component: String,
    #[source]
    source: regex::Error,
  },

  #[error("version_regex of '{component}' must have exactly one capturing group, found {groups}")]
  RegexGroups { component: String, groups: usize },
}

/// Declarative metadata of one component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ComponentDescriptor {
  #[serde(default)]
  pub dependencies: Vec<String>,

  /// Release download URL with a `{version}` placeholder.
  #[serde(default)]
  pub url: Option<String>,

  /// Command run inside a snapshot image to print its version.
  #[serde(default)]
  pub version_command: Option<String>,

  /// Pattern whose single capturing group extracts the version.
  #[serde(default)]
  pub version_regex: Option<String>,
}

impl ComponentDescriptor {
  /// Parse descriptor text for `component`. An empty document is an empty descriptor.
  pub fn parse(component: &str, path: &Path, text: &str) -> Result<Self, DescriptorError> {
    let descriptor: Self = if text.trim().is_empty() {
      Self::default()
    } else {
      serde_yaml::from_str(text).map_err(|source| DescriptorError::Yaml {
        path: path.to_path_buf(),
        source,
      })?
    };
    descriptor.validate(component)?;
    Ok(descriptor)
  }

  pub fn load(component: &str, path: &Path) -> Result<Self, DescriptorError> {
    let text = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(component, path, &text)
  }

  fn validate(&self, component: &str) -> Result<(), DescriptorError> {
    let mut seen = HashSet::new();
    for dependency in &self.dependencies {
      if dependency == component {
        return Err(DescriptorError::SelfDependency {
          component: component.to_string(),
        });
      }
      if !seen.insert(dependency.as_str()) {
        return Err(DescriptorError::DuplicateDependency {
          component: component.to_string(),
          dependency: dependency.clone(),
        });
      }
    }
    Ok(())
  }

  /// The download URL for `version`.
  pub fn release_url(&self, version: &str) -> Option<String> {
    self.url.as_ref().map(|url| url.replace("{version}", version))
  }
}

//! Types describing a loaded build configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

/// Whether a component is built from a published release or a local snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistKind {
  Release,
  Snapshot,
}

impl DistKind {
  pub fn as_str(self) -> &'static str {
    match self {
      DistKind::Release => "release",
      DistKind::Snapshot => "snapshot",
    }
  }
}

impl std::fmt::Display for DistKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The distribution a component image is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dist {
  /// A released version, e.g. `3.1.1`.
  Release(String),
  /// A path to a locally built distribution.
  Snapshot(PathBuf),
}

impl Dist {
  pub fn kind(&self) -> DistKind {
    match self {
      Dist::Release(_) => DistKind::Release,
      Dist::Snapshot(_) => DistKind::Snapshot,
    }
  }

  /// The release version, if this is a release distribution.
  pub fn version(&self) -> Option<&str> {
    match self {
      Dist::Release(version) => Some(version),
      Dist::Snapshot(_) => None,
    }
  }

  /// The snapshot path, if this is a snapshot distribution.
  pub fn snapshot_path(&self) -> Option<&Path> {
    match self {
      Dist::Release(_) => None,
      Dist::Snapshot(path) => Some(path),
    }
  }
}

/// Per-component configuration supplied by the user.
///
/// Builder-specific keys are kept in `options` untouched; only the builder that
/// owns the component interprets them.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSpec {
  pub dist: Dist,

  /// Service name -> partial override of that service's manifest entry.
  pub services: BTreeMap<String, Mapping>,

  /// Every key other than `release`, `snapshot` and `services`.
  pub options: Mapping,

  /// The component mapping exactly as written in the configuration.
  pub raw: Mapping,
}

/// The root input document of a run. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfiguration {
  pub name: String,

  /// Build the security (kerberos) variant of every component.
  pub use_security: bool,

  pub components: BTreeMap<String, ComponentSpec>,
}

impl BuildConfiguration {
  /// Names of the explicitly requested components, in a stable order.
  pub fn component_names(&self) -> impl Iterator<Item = &str> {
    self.components.keys().map(String::as_str)
  }

  pub fn component(&self, name: &str) -> Option<&ComponentSpec> {
    self.components.get(name)
  }
}

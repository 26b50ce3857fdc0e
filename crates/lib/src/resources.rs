//! Locating per-component resource files.
//!
//! Every component has a directory under the resource root. When a security
//! variant sub-directory (`kerberos/` or `unsecure/`) exists, it takes the place
//! of the component directory. Resource files are read-only inputs: builders copy
//! them, never modify them.

use std::path::{Path, PathBuf};

use crate::consts::{
  ASSEMBLY_FILE, COMPOSE_PART_FILE, CONFIG_PART_FILE, DOCKER_CONTEXT_DIR, SCRIPTS_DIR, SECURE_VARIANT_DIR,
  UNSECURE_VARIANT_DIR,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLayout {
  root: PathBuf,
  secure: bool,
}

impl ResourceLayout {
  pub fn new(root: impl Into<PathBuf>, secure: bool) -> Self {
    Self {
      root: root.into(),
      secure,
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn is_secure(&self) -> bool {
    self.secure
  }

  /// The directory holding the resources of `component`.
  pub fn component_dir(&self, component: &str) -> PathBuf {
    let base = self.root.join(component);
    let variant = if self.secure {
      SECURE_VARIANT_DIR
    } else {
      UNSECURE_VARIANT_DIR
    };
    let variant_dir = base.join(variant);
    if variant_dir.is_dir() { variant_dir } else { base }
  }

  /// Whether declarative metadata exists for `component`.
  pub fn has_component(&self, component: &str) -> bool {
    self.assembly(component).is_file()
  }

  pub fn assembly(&self, component: &str) -> PathBuf {
    self.component_dir(component).join(ASSEMBLY_FILE)
  }

  pub fn compose_part(&self, component: &str) -> PathBuf {
    self.component_dir(component).join(COMPOSE_PART_FILE)
  }

  pub fn config_part(&self, component: &str) -> PathBuf {
    self.component_dir(component).join(CONFIG_PART_FILE)
  }

  pub fn docker_context(&self, component: &str) -> PathBuf {
    self.component_dir(component).join(DOCKER_CONTEXT_DIR)
  }

  /// Auxiliary files copied verbatim into the output directory, if present.
  pub fn scripts(&self, component: &str) -> Option<PathBuf> {
    let dir = self.component_dir(component).join(SCRIPTS_DIR);
    dir.is_dir().then_some(dir)
  }
}

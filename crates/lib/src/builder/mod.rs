//! The builder capability and the types that flow through a build step.
//!
//! Every component is built by a [`ComponentBuilder`]: either a statically
//! registered plugin or the [`GenericBuilder`] driven by the component's
//! `assembly.yaml`. The orchestrator only ever talks to the trait.

mod built;
pub mod default;
pub mod docker;
pub mod fetch;

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::assembly::DescriptorError;
use crate::config::{ComponentSpec, DistKind};
use crate::fragment::{ConfigFragment, FragmentError, ManifestFragment};
use crate::resources::ResourceLayout;

pub use built::{AlreadyBuilt, BuiltComponents};
pub use default::GenericBuilder;
pub use docker::{DockerCli, ImageEngine};
pub use fetch::{Fetcher, HttpFetcher};

/// Why a single component could not be built.
#[derive(Debug, Error)]
pub enum BuildFailure {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("download of {url} failed: {message}")]
  Fetch { url: String, message: String },

  #[error("command failed with exit code {code:?}: {command}{}", stderr_suffix(.stderr))]
  Command {
    command: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("could not run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("cannot split command '{0}' into arguments")]
  MalformedCommand(String),

  #[error("no version found in the output of '{command}'")]
  VersionNotFound { command: String },

  #[error("build context {0} does not exist")]
  MissingContext(PathBuf),

  #[error("dependency '{0}' has not been built")]
  MissingDependency(String),

  #[error(transparent)]
  Descriptor(#[from] DescriptorError),

  #[error(transparent)]
  Fragment(#[from] FragmentError),

  #[error("{0}")]
  Message(String),
}

fn stderr_suffix(stderr: &str) -> String {
  let stderr = stderr.trim();
  if stderr.is_empty() {
    String::new()
  } else {
    format!("\n{stderr}")
  }
}

/// A failed build step, attributed to its component.
#[derive(Debug, Error)]
#[error("failed to build '{component}': {source}")]
pub struct BuildError {
  pub component: String,
  #[source]
  pub source: BuildFailure,
}

impl BuildError {
  pub fn new(component: impl Into<String>, source: impl Into<BuildFailure>) -> Self {
    Self {
      component: component.into(),
      source: source.into(),
    }
  }
}

/// Attributes generated while building a component, visible to every
/// component built after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltAttributes {
  pub dist: DistKind,
  pub version: String,
  pub image_name: String,
  /// The image already existed locally and was not rebuilt.
  pub reused: bool,
}

impl BuiltAttributes {
  /// The tag part of the image name.
  pub fn image_tag(&self) -> &str {
    self.image_name.rsplit(':').next().unwrap_or(&self.image_name)
  }
}

/// Everything a successful build step hands back.
#[derive(Debug, Clone)]
pub struct BuildOutput {
  pub manifest: ManifestFragment,
  pub config: ConfigFragment,
  pub attributes: BuiltAttributes,
  /// Auxiliary files copied verbatim into `<output>/<component>/`.
  pub support_dir: Option<PathBuf>,
}

/// The context passed to a build step.
///
/// `built` holds every component that precedes this one in the build order,
/// not only its direct dependencies.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
  pub component: &'a str,
  pub spec: &'a ComponentSpec,
  pub resources: &'a ResourceLayout,
  pub built: &'a BuiltComponents,
  pub repository: &'a str,
  pub force_rebuild: bool,
}

impl BuildContext<'_> {
  pub fn resource_dir(&self) -> PathBuf {
    self.resources.component_dir(self.component)
  }

  /// Built attributes of `dependency`, which must precede this component.
  pub fn dependency(&self, dependency: &str) -> Result<&BuiltAttributes, BuildFailure> {
    self
      .built
      .get(dependency)
      .ok_or_else(|| BuildFailure::MissingDependency(dependency.to_string()))
  }
}

/// The capability every component builder exposes.
pub trait ComponentBuilder: Send + Sync {
  fn name(&self) -> &str;

  /// Names of the components this one must be built after.
  fn dependencies(&self) -> &[String];

  /// Build the component image and return its fragments and attributes.
  ///
  /// Must fail rather than return a partial result. May be re-run; builders
  /// rely on their own caching for idempotence.
  fn build(&self, ctx: &BuildContext<'_>) -> Result<BuildOutput, BuildError>;
}

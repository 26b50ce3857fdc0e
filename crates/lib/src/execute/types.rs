//! Types for planning and running a build.
//!
//! This module defines the run settings, per-component states, the result of a
//! run and the top-level error type.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::builder::{BuildError, BuildOutput, BuiltComponents};
use crate::config::ConfigError;
use crate::consts::DEFAULT_REPOSITORY;
use crate::output::{MergeError, OutputError};
use crate::platform::paths::resource_dir;
use crate::registry::RegistryError;

use super::dag::GraphError;

/// Components whose images are rebuilt even when they already exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ForceRebuild {
  #[default]
  None,
  All,
  Components(BTreeSet<String>),
}

impl ForceRebuild {
  pub fn applies_to(&self, component: &str) -> bool {
    match self {
      ForceRebuild::None => false,
      ForceRebuild::All => true,
      ForceRebuild::Components(components) => components.contains(component),
    }
  }
}

/// Configuration for a run.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Root of the per-component resource directories.
  pub resource_root: PathBuf,

  /// Repository prefix of built image names.
  pub repository: String,

  pub force: ForceRebuild,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      resource_root: resource_dir(),
      repository: DEFAULT_REPOSITORY.to_string(),
      force: ForceRebuild::None,
    }
  }
}

/// Lifecycle of a component within a run.
///
/// `Pending -> Building -> Built` or `Pending -> Building -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
  Pending,
  Building,
  Built,
  Failed,
}

impl ComponentState {
  pub fn is_terminal(self) -> bool {
    matches!(self, ComponentState::Built | ComponentState::Failed)
  }
}

impl std::fmt::Display for ComponentState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let state = match self {
      ComponentState::Pending => "pending",
      ComponentState::Building => "building",
      ComponentState::Built => "built",
      ComponentState::Failed => "failed",
    };
    f.write_str(state)
  }
}

/// The validated graph of a configuration, without anything built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
  pub order: Vec<String>,
  pub waves: Vec<Vec<String>>,
  /// Direct dependencies per component.
  pub dependencies: BTreeMap<String, Vec<String>>,
}

/// What a successfully built component contributed.
#[derive(Debug, Clone)]
pub struct ComponentOutput {
  pub component: String,
  pub output: BuildOutput,
}

/// Result of running the build order.
#[derive(Debug, Default)]
pub struct RunResult {
  pub order: Vec<String>,
  pub states: BTreeMap<String, ComponentState>,
  pub built: BuiltComponents,
  /// Outputs of the built components, in build order.
  pub outputs: Vec<ComponentOutput>,
  /// The build that failed and stopped the run, if any.
  pub failed: Option<BuildError>,
}

impl RunResult {
  /// Returns true if every component reached `Built`.
  pub fn is_success(&self) -> bool {
    self.failed.is_none() && self.states.values().all(|state| *state == ComponentState::Built)
  }

  pub fn state(&self, component: &str) -> Option<ComponentState> {
    self.states.get(component).copied()
  }

  pub fn failed_component(&self) -> Option<&str> {
    self.failed.as_ref().map(|err| err.component.as_str())
  }
}

/// The output directory written by a successful run.
#[derive(Debug)]
pub struct Completed {
  pub output_dir: PathBuf,
  pub result: RunResult,
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum RunError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error(transparent)]
  Build(#[from] BuildError),

  #[error(transparent)]
  Merge(#[from] MergeError),

  #[error(transparent)]
  Output(OutputError),
}

impl From<OutputError> for RunError {
  fn from(err: OutputError) -> Self {
    match err {
      OutputError::Merge(merge) => RunError::Merge(merge),
      other => RunError::Output(other),
    }
  }
}

impl RunError {
  /// Process exit status for this error.
  pub fn exit_code(&self) -> i32 {
    match self {
      RunError::Config(_) => 2,
      RunError::Registry(RegistryError::Descriptor(_)) => 2,
      RunError::Graph(GraphError::UnknownComponent { .. }) => 3,
      RunError::Registry(RegistryError::UnknownComponent(_)) => 3,
      RunError::Graph(GraphError::CyclicDependency { .. }) => 4,
      RunError::Build(_) | RunError::Registry(RegistryError::Factory { .. }) => 5,
      RunError::Merge(_) => 6,
      RunError::Output(_) => 1,
    }
  }
}
